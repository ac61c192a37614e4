//! Pattern scoring: count the distinct layers a template sees active at a
//! key position in a given bin.

use crate::patterns::{PatternCell, PatternLibrary};
use crate::pulse::PulseMap;

/// Best template found at one key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyScore {
    pub pattern: u8,
    /// Distinct layers hit; 0 means no candidate.
    pub layers: u32,
    pub bend: u8,
}

/// Number of distinct layers with an active cell in `bx`.
pub fn layers_hit(cells: &[PatternCell], pulses: &PulseMap, key: usize, bx: u32) -> u32 {
    let mut hit = 0u8;
    for cell in cells {
        if pulses.is_active(cell.layer, key as isize + cell.offset, bx) {
            hit |= 1 << cell.layer;
        }
    }
    hit.count_ones()
}

/// Score `ids` in the order given and keep the first strictly better one.
///
/// Callers pass ids from highest to lowest, so ties resolve to the higher id.
pub fn best_pattern(
    library: &PatternLibrary,
    ids: impl IntoIterator<Item = u8>,
    pulses: &PulseMap,
    key: usize,
    bx: u32,
) -> KeyScore {
    let mut best = KeyScore::default();
    for id in ids {
        let Some(template) = library.get(id) else {
            continue;
        };
        let layers = layers_hit(&template.cells, pulses, key, bx);
        if layers > best.layers {
            best = KeyScore {
                pattern: id,
                layers,
                bend: template.bend.unwrap_or(0),
            };
        }
    }
    best
}

/// Legacy scoring: ids 7 down to 1.
pub fn score_legacy(library: &PatternLibrary, pulses: &PulseMap, key: usize, bx: u32) -> KeyScore {
    best_pattern(library, (1..=library.straight_id()).rev(), pulses, key, bx)
}

/// Modern scoring: ids 10 down to `pid_thresh`.
pub fn score_modern(library: &PatternLibrary, pid_thresh: u32, pulses: &PulseMap, key: usize, bx: u32) -> KeyScore {
    let lowest = pid_thresh.min(u8::MAX as u32) as u8;
    best_pattern(library, (lowest..=library.straight_id()).rev(), pulses, key, bx)
}
