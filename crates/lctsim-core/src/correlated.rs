//! Correlated LCT record and the lookup tables that build it from an
//! anode/cathode pair.

use std::fmt;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::alct::AnodeLct;
use crate::clct::{CathodeLct, StripType};
use crate::config::Algorithm;

const PATTERN_BIT_WIDTH: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CorrelatedLct {
    pub track_number: u8,
    pub valid: bool,
    /// 0-15.
    pub quality: u32,
    pub key_wire_group: u32,
    pub key_half_strip: u32,
    pub pattern: u32,
    pub bend: u8,
    pub bx: i32,
    /// Trigger CSC id of the chamber.
    pub csc_id: u8,
}

impl CorrelatedLct {
    /// Combine one anode and one cathode record. At least one must be valid.
    pub fn build(algorithm: Algorithm, alct: &AnodeLct, clct: &CathodeLct, csc_id: u8) -> Self {
        let quality = match algorithm {
            Algorithm::Modern => quality_2008(alct, clct),
            Algorithm::Legacy => quality_legacy(alct, clct),
        };
        Self {
            track_number: 0,
            valid: true,
            quality,
            key_wire_group: alct.key_wire_group,
            key_half_strip: clct.key_half_strip(),
            pattern: encode_pattern(algorithm, clct),
            bend: clct.bend,
            bx: if alct.is_valid() { alct.bx } else { clct.bx as i32 },
            csc_id,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

impl fmt::Display for CorrelatedLct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LCT #{}: valid = {}, quality = {}, key wire group = {}, key half-strip = {}, pattern = {}, bend = {}, bx = {}, csc id = {}",
            self.track_number,
            self.valid as u8,
            self.quality,
            self.key_wire_group,
            self.key_half_strip,
            self.pattern,
            self.bend,
            self.bx,
            self.csc_id
        )
    }
}

/// LCT pattern word. Modern firmware passes the 4-bit CLCT pattern through;
/// the legacy word is a 3-bit pattern with the top bit set for half-strips.
pub fn encode_pattern(algorithm: Algorithm, clct: &CathodeLct) -> u32 {
    let pattern = clct.pattern as u32;
    match algorithm {
        Algorithm::Modern => pattern & ((1 << PATTERN_BIT_WIDTH) - 1),
        Algorithm::Legacy => {
            let word = pattern & ((1 << (PATTERN_BIT_WIDTH - 1)) - 1);
            match clct.strip_type {
                StripType::HalfStrip => word | (1 << (PATTERN_BIT_WIDTH - 1)),
                StripType::DiStrip => word,
            }
        }
    }
}

/// 4-bit quality, 2008 definition.
pub fn quality_2008(alct: &AnodeLct, clct: &CathodeLct) -> u32 {
    match (alct.is_valid(), clct.is_valid()) {
        (true, false) => 1,
        (false, true) => 2,
        (false, false) => 0,
        (true, true) => {
            if clct.pattern == 1 {
                // layer-trigger
                return 3;
            }
            let a4 = alct.quality >= 1;
            let c4 = clct.quality >= 4;
            match (a4, c4) {
                (false, false) => 5,
                (true, false) => 6,
                (false, true) => 7,
                (true, true) if alct.accelerator => 8,
                (true, true) => match clct.pattern {
                    2 | 3 => 11,
                    4 | 5 => 12,
                    6 | 7 => 13,
                    8 | 9 => 14,
                    10 => 15,
                    other => {
                        warn!("unexpected CLCT pattern id {other} in quality lookup");
                        0
                    }
                },
            }
        }
    }
}

/// 4-bit quality, pre-2007 definition.
pub fn quality_legacy(alct: &AnodeLct, clct: &CathodeLct) -> u32 {
    let di_strip = clct.strip_type == StripType::DiStrip;
    match (alct.is_valid(), clct.is_valid()) {
        (true, false) if alct.accelerator => 1,
        (true, false) => 3,
        (false, true) if di_strip => 4,
        (false, true) => 5,
        (false, false) => 0,
        (true, true) if alct.accelerator => 2,
        (true, true) => {
            // CLCT quality counts layers; shift it onto the ALCT scale.
            let sum = alct.quality as i32 + clct.quality as i32 - 3;
            if !(1..=6).contains(&sum) {
                warn!("unexpected quality sum {sum} in quality lookup");
            }
            match sum {
                2..=6 if di_strip => (sum + 4) as u32,
                2..=6 => (sum + 9) as u32,
                _ => 0,
            }
        }
    }
}
