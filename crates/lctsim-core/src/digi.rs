//! Comparator digis: the raw cathode hits fed into a chamber frame.
//!
//! Each digi names a layer, a strip, the comparator half (0 = left half-strip,
//! 1 = right half-strip) and the time bin in which the comparator fired.
//! [`StripHits::collect`] validates a frame's digis one at a time and keeps
//! the earliest hit per (layer, strip). Nothing here fails: a malformed digi
//! is logged, counted in the [`DigiReport`] and skipped.

use log::{trace, warn};
use serde::{Deserialize, Serialize};

use crate::pulse::{Layer, NUM_LAYERS, TimeBin};

/// One raw comparator hit. `strip` is 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparatorDigi {
    pub layer: u8,
    pub strip: i32,
    pub comparator: i32,
    pub time_bin: i32,
}

impl ComparatorDigi {
    pub fn new(layer: u8, strip: i32, comparator: i32, time_bin: i32) -> Self {
        Self {
            layer,
            strip,
            comparator,
            time_bin,
        }
    }
}

/// Per-frame accounting of what happened to the raw digis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigiReport {
    /// Digis that passed validation (including those later superseded).
    pub accepted: usize,
    /// Valid digis that lost to an earlier hit on the same strip.
    pub superseded: usize,
    pub bad_layer: usize,
    pub bad_comparator: usize,
    pub bad_strip: usize,
    pub out_of_window: usize,
}

impl DigiReport {
    pub fn dropped(&self) -> usize {
        self.bad_layer + self.bad_comparator + self.bad_strip + self.out_of_window
    }
}

/// Surviving hit on one strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StripHit {
    pub time: TimeBin,
    pub comparator: u8,
}

/// Earliest hit per (layer, strip) for one chamber frame.
#[derive(Debug, Clone)]
pub struct StripHits {
    num_strips: usize,
    layers: [Vec<Option<StripHit>>; NUM_LAYERS],
}

impl StripHits {
    pub fn empty(num_strips: usize) -> Self {
        Self {
            num_strips,
            layers: std::array::from_fn(|_| vec![None; num_strips]),
        }
    }

    /// Validate `digis` against the chamber's strip count and the readout
    /// window, keeping the earliest hit on every strip.
    pub fn collect(digis: &[ComparatorDigi], num_strips: usize, fifo_tbins: u32) -> (Self, DigiReport) {
        let mut hits = Self::empty(num_strips);
        let mut report = DigiReport::default();

        for (n, digi) in digis.iter().enumerate() {
            trace!(
                "comparator digi #{n}: layer {} strip {} comparator {} time bin {}",
                digi.layer, digi.strip, digi.comparator, digi.time_bin
            );
            let Some(layer) = Layer::new(digi.layer as usize) else {
                warn!("comparator digi #{n} on nonexistent layer {}; skipping it", digi.layer);
                report.bad_layer += 1;
                continue;
            };
            let comparator = match digi.comparator {
                0 => 0u8,
                1 => 1u8,
                other => {
                    warn!("comparator digi #{n} with wrong comparator value {other}; skipping it");
                    report.bad_comparator += 1;
                    continue;
                }
            };
            if digi.strip < 0 || digi.strip as usize >= num_strips {
                warn!(
                    "comparator digi #{n} with wrong strip number {}, max strips {num_strips}; skipping it",
                    digi.strip
                );
                report.bad_strip += 1;
                continue;
            }
            let strip = digi.strip as usize;
            let Some(time) = TimeBin::new(digi.time_bin, fifo_tbins) else {
                warn!(
                    "comparator digi #{n} with bx {} outside [0-{fifo_tbins}) (layer {}, strip {strip}); skipping it",
                    digi.time_bin,
                    layer.index()
                );
                report.out_of_window += 1;
                continue;
            };

            report.accepted += 1;
            let candidate = StripHit { time, comparator };
            let slot = &mut hits.layers[layer.index()][strip];
            if let Some(existing) = slot {
                report.superseded += 1;
                if time < existing.time {
                    *existing = candidate;
                }
            } else {
                *slot = Some(candidate);
            }
        }

        (hits, report)
    }

    pub fn num_strips(&self) -> usize {
        self.num_strips
    }

    pub fn get(&self, layer: Layer, strip: usize) -> Option<StripHit> {
        self.layers[layer.index()].get(strip).copied().flatten()
    }

    /// Number of layers holding at least one surviving hit.
    pub fn layers_hit(&self) -> usize {
        self.layers
            .iter()
            .filter(|strips| strips.iter().any(Option::is_some))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.layers_hit() == 0
    }
}
