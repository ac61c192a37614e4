//! Anode LCTs: the externally supplied counterpart stream.
//!
//! The anode view is emulated elsewhere; the motherboard only needs its
//! best/second record per bin. [`AlctSlots`] files a frame's records into
//! those slots by bx and track number.

use std::fmt;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::pulse::MAX_LCT_BINS;

/// Anode LCT. The default record is invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnodeLct {
    pub valid: bool,
    /// 0-3.
    pub quality: u32,
    /// Pattern from a beam-halo (accelerator) muon rather than a collision muon.
    pub accelerator: bool,
    pub key_wire_group: u32,
    pub bx: i32,
    /// 1 = best, 2 = second.
    pub track_number: u8,
}

impl AnodeLct {
    pub fn new(quality: u32, accelerator: bool, key_wire_group: u32, bx: i32, track_number: u8) -> Self {
        Self {
            valid: true,
            quality,
            accelerator,
            key_wire_group,
            bx,
            track_number,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

impl fmt::Display for AnodeLct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ALCT #{}: valid = {}, quality = {}, accel. = {}, key wire group = {}, bx = {}",
            self.track_number, self.valid as u8, self.quality, self.accelerator as u8, self.key_wire_group, self.bx
        )
    }
}

/// Best and second ALCT per bin.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AlctSlots {
    best: [AnodeLct; MAX_LCT_BINS],
    second: [AnodeLct; MAX_LCT_BINS],
}

impl AlctSlots {
    /// File valid records by bx: track 1 (or 0) goes to best, track 2 to
    /// second. Records outside the bin range or with another track number
    /// are dropped with a warning.
    pub fn from_records(records: &[AnodeLct]) -> Self {
        let mut slots = Self::default();
        for alct in records.iter().filter(|a| a.is_valid()) {
            let Some(bx) = usize::try_from(alct.bx).ok().filter(|&bx| bx < MAX_LCT_BINS) else {
                warn!(
                    "bx of {alct} is not within the allowed range, [0-{}); skipping it",
                    MAX_LCT_BINS
                );
                continue;
            };
            match alct.track_number {
                0 | 1 => slots.best[bx] = *alct,
                2 => slots.second[bx] = *alct,
                n => warn!("ALCT with unexpected track number {n}; skipping it"),
            }
        }
        slots
    }

    /// Best ALCT at `bx`; an invalid record for bins outside the range.
    pub fn best(&self, bx: i32) -> AnodeLct {
        Self::slot(&self.best, bx)
    }

    pub fn second(&self, bx: i32) -> AnodeLct {
        Self::slot(&self.second, bx)
    }

    fn slot(slots: &[AnodeLct; MAX_LCT_BINS], bx: i32) -> AnodeLct {
        usize::try_from(bx)
            .ok()
            .and_then(|bx| slots.get(bx))
            .copied()
            .unwrap_or_default()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
