//! Pretrigger scanning: find the earliest bin in which some key position
//! collects enough layers to be worth latching.
//!
//! Bins are scanned in ascending order and, inside a bin, keys in ascending
//! order. The first (bin, key) that reaches the threshold wins.

use log::trace;

use crate::patterns::PatternLibrary;
use crate::pulse::PulseMap;
use crate::scorer::{layers_hit, score_modern};

/// Where and when the scan fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pretrigger {
    pub bx: u32,
    pub key: usize,
}

/// Bin at which the pattern search is latched after a pretrigger.
pub fn latch_bin(pretrigger_bx: u32, drift_delay: u32, fifo_tbins: u32) -> u32 {
    (pretrigger_bx + drift_delay).min(fifo_tbins.saturating_sub(1))
}

/// Legacy pretrigger over the coarse envelope of every key.
pub fn scan_legacy(library: &PatternLibrary, pulses: &PulseMap, nplanes: u32, fifo_tbins: u32) -> Option<Pretrigger> {
    for bx in 0..fifo_tbins {
        for key in 0..pulses.positions() {
            if layers_hit(library.envelope(), pulses, key, bx) >= nplanes {
                trace!("legacy pretrigger at bx {bx}, key {key}");
                return Some(Pretrigger { bx, key });
            }
        }
    }
    None
}

/// Modern pretrigger: every key from `first_key` is pattern-scored in each
/// bin from `start_bx`; a key fires when both its layer count and its best
/// pattern id reach their thresholds.
pub fn scan_modern(
    library: &PatternLibrary,
    pulses: &PulseMap,
    nplanes: u32,
    pid_thresh: u32,
    first_key: usize,
    start_bx: u32,
    fifo_tbins: u32,
) -> Option<Pretrigger> {
    for bx in start_bx..fifo_tbins {
        for key in first_key..pulses.positions() {
            let score = score_modern(library, pid_thresh, pulses, key, bx);
            if score.layers > 0 {
                trace!(
                    "bx {bx}: half-strip {key} best pid {} nhits {}",
                    score.pattern, score.layers
                );
            }
            if score.layers >= nplanes && score.pattern as u32 >= pid_thresh {
                trace!("modern pretrigger at bx {bx}, key {key}");
                return Some(Pretrigger { bx, key });
            }
        }
    }
    None
}
