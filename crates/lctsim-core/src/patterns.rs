//! Fixed pattern template libraries.
//!
//! A template is a set of (layer, offset) cells relative to a key position,
//! plus a bend bit. Two families exist:
//!
//! - legacy: ids 0-7, each template a subset of a 3-wide envelope on every
//!   layer except the key layer 3, which holds only the key cell. Id 0 is
//!   empty and id 7 is the straight-through pattern.
//! - modern: ids 0-10 over a wider envelope (11/5/1/5/9/11 cells on layers
//!   0-5, key layer 2). Id 0 is "no pattern", id 1 is the OR of the whole
//!   envelope, ids 2-10 carry a bend bit; id 10 is straight-through.

use std::fmt::Write as _;

use crate::config::Algorithm;
use crate::pulse::NUM_LAYERS;

pub const NUM_LEGACY_PATTERNS: usize = 8;
pub const NUM_MODERN_PATTERNS: usize = 11;

/// Key layer of the legacy family.
pub const LEGACY_KEY_LAYER: usize = 3;
/// Key layer of the modern family.
pub const MODERN_KEY_LAYER: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternCell {
    pub layer: usize,
    pub offset: isize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternTemplate {
    pub id: u8,
    pub cells: Vec<PatternCell>,
    /// `None` for the modern "no pattern" and layer-OR templates.
    pub bend: Option<u8>,
}

impl PatternTemplate {
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// One family of templates plus its coarse pretrigger envelope.
#[derive(Debug, Clone)]
pub struct PatternLibrary {
    algorithm: Algorithm,
    envelope: Vec<PatternCell>,
    templates: Vec<PatternTemplate>,
}

// Legacy templates as (layer, offset) cells and bend.
const LEGACY_TEMPLATES: [(&[(usize, isize)], u8); NUM_LEGACY_PATTERNS] = [
    (&[], 0),
    (&[(0, 1), (1, 1), (2, 0), (2, 1), (3, 0), (4, -1), (4, 0), (5, -1)], 1),
    (&[(0, -1), (1, -1), (2, -1), (2, 0), (3, 0), (4, 0), (4, 1), (5, 1)], 0),
    (&[(0, 0), (1, 0), (2, 0), (3, 0), (4, -1), (5, -1)], 1),
    (&[(0, 0), (1, 0), (2, 0), (3, 0), (4, 1), (5, 1)], 0),
    (&[(0, 1), (1, 1), (2, 0), (2, 1), (3, 0), (4, 0), (5, 0)], 1),
    (&[(0, -1), (1, -1), (2, -1), (2, 0), (3, 0), (4, 0), (5, 0)], 0),
    (&[(0, 0), (1, 0), (2, 0), (3, 0), (4, 0), (5, 0)], 1),
];

// Modern templates as an inclusive offset range per layer.
type LayerSpan = (isize, isize);

const MODERN_ENVELOPE: [LayerSpan; NUM_LAYERS] = [(-5, 5), (-2, 2), (0, 0), (-2, 2), (-4, 4), (-5, 5)];

const MODERN_TEMPLATES: [(&[LayerSpan; NUM_LAYERS], u8); NUM_MODERN_PATTERNS - 2] = [
    (&[(3, 5), (1, 2), (0, 0), (-2, 0), (-4, -2), (-5, -3)], 0),
    (&[(-5, -3), (-2, -1), (0, 0), (0, 2), (2, 4), (3, 5)], 1),
    (&[(2, 4), (1, 2), (0, 0), (-2, -1), (-4, -2), (-4, -2)], 0),
    (&[(-4, -2), (-2, -1), (0, 0), (1, 2), (2, 4), (2, 4)], 1),
    (&[(1, 3), (0, 1), (0, 0), (-1, 0), (-2, -1), (-3, -1)], 0),
    (&[(-3, -1), (-1, 0), (0, 0), (0, 1), (1, 2), (1, 3)], 1),
    (&[(0, 2), (0, 1), (0, 0), (-1, 0), (-2, 0), (-2, 0)], 0),
    (&[(-2, 0), (-1, 0), (0, 0), (0, 1), (0, 2), (0, 2)], 1),
    (&[(-1, 1), (0, 0), (0, 0), (0, 0), (-1, 1), (-1, 1)], 0),
];

fn span_cells(spans: &[LayerSpan; NUM_LAYERS]) -> Vec<PatternCell> {
    spans
        .iter()
        .enumerate()
        .flat_map(|(layer, &(lo, hi))| (lo..=hi).map(move |offset| PatternCell { layer, offset }))
        .collect()
}

impl PatternLibrary {
    pub fn for_algorithm(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::Legacy => Self::legacy(),
            Algorithm::Modern => Self::modern(),
        }
    }

    pub fn legacy() -> Self {
        let envelope = (0..NUM_LAYERS)
            .flat_map(|layer| {
                let offsets: &[isize] = if layer == LEGACY_KEY_LAYER { &[0] } else { &[-1, 0, 1] };
                offsets.iter().map(move |&offset| PatternCell { layer, offset })
            })
            .collect();
        let templates = LEGACY_TEMPLATES
            .iter()
            .enumerate()
            .map(|(id, (cells, bend))| PatternTemplate {
                id: id as u8,
                cells: cells
                    .iter()
                    .map(|&(layer, offset)| PatternCell { layer, offset })
                    .collect(),
                bend: Some(*bend),
            })
            .collect();
        Self {
            algorithm: Algorithm::Legacy,
            envelope,
            templates,
        }
    }

    pub fn modern() -> Self {
        let envelope = span_cells(&MODERN_ENVELOPE);
        let mut templates = vec![
            PatternTemplate {
                id: 0,
                cells: Vec::new(),
                bend: None,
            },
            PatternTemplate {
                id: 1,
                cells: envelope.clone(),
                bend: None,
            },
        ];
        for (i, (spans, bend)) in MODERN_TEMPLATES.iter().enumerate() {
            templates.push(PatternTemplate {
                id: (i + 2) as u8,
                cells: span_cells(spans),
                bend: Some(*bend),
            });
        }
        Self {
            algorithm: Algorithm::Modern,
            envelope,
            templates,
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn key_layer(&self) -> usize {
        match self.algorithm {
            Algorithm::Legacy => LEGACY_KEY_LAYER,
            Algorithm::Modern => MODERN_KEY_LAYER,
        }
    }

    /// Cells of the coarse pretrigger envelope.
    pub fn envelope(&self) -> &[PatternCell] {
        &self.envelope
    }

    pub fn templates(&self) -> &[PatternTemplate] {
        &self.templates
    }

    pub fn get(&self, id: u8) -> Option<&PatternTemplate> {
        self.templates.get(id as usize)
    }

    /// Id of the straight-through template.
    pub fn straight_id(&self) -> u8 {
        (self.templates.len() - 1) as u8
    }

    /// ASCII picture of one template, key layer marked by the centre column.
    pub fn render(&self, id: u8) -> Option<String> {
        let template = self.get(id)?;
        let lo = self.envelope.iter().map(|c| c.offset).min().unwrap_or(0);
        let hi = self.envelope.iter().map(|c| c.offset).max().unwrap_or(0);
        let mut out = String::new();
        for layer in 0..NUM_LAYERS {
            let _ = write!(out, "ly{layer} ");
            for offset in lo..=hi {
                let cell = PatternCell { layer, offset };
                let ch = if template.cells.contains(&cell) {
                    'x'
                } else if self.envelope.contains(&cell) {
                    '.'
                } else {
                    ' '
                };
                out.push(ch);
            }
            out.push('\n');
        }
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_library_shape() {
        let lib = PatternLibrary::legacy();
        assert_eq!(lib.templates().len(), NUM_LEGACY_PATTERNS);
        assert_eq!(lib.envelope().len(), 16);
        assert!(lib.get(0).unwrap().is_empty());
        assert_eq!(lib.straight_id(), 7);
        assert_eq!(lib.get(7).unwrap().bend, Some(1));
        assert_eq!(lib.key_layer(), 3);
    }

    #[test]
    fn test_legacy_templates_inside_envelope() {
        let lib = PatternLibrary::legacy();
        for t in lib.templates() {
            for cell in &t.cells {
                assert!(lib.envelope().contains(cell), "pattern {} cell {cell:?}", t.id);
            }
        }
    }

    #[test]
    fn test_modern_library_shape() {
        let lib = PatternLibrary::modern();
        assert_eq!(lib.templates().len(), NUM_MODERN_PATTERNS);
        assert_eq!(lib.envelope().len(), 42);
        assert_eq!(lib.get(1).unwrap().cells.len(), 42);
        assert_eq!(lib.get(1).unwrap().bend, None);
        assert_eq!(lib.straight_id(), 10);
        assert_eq!(lib.get(10).unwrap().bend, Some(0));
        assert_eq!(lib.key_layer(), 2);
    }

    #[test]
    fn test_modern_templates_are_mirror_pairs() {
        let lib = PatternLibrary::modern();
        for id in (2..10).step_by(2) {
            let left = lib.get(id).unwrap();
            let right = lib.get(id + 1).unwrap();
            assert_eq!(left.cells.len(), right.cells.len());
            for cell in &left.cells {
                let mirrored = PatternCell {
                    layer: cell.layer,
                    offset: -cell.offset,
                };
                assert!(right.cells.contains(&mirrored), "pattern {id} vs {}", id + 1);
            }
            assert_ne!(left.bend, right.bend);
        }
    }

    #[test]
    fn test_every_template_covers_key_cell() {
        for lib in [PatternLibrary::legacy(), PatternLibrary::modern()] {
            let key = PatternCell {
                layer: lib.key_layer(),
                offset: 0,
            };
            for t in lib.templates().iter().filter(|t| !t.is_empty()) {
                assert!(t.cells.contains(&key));
            }
        }
    }

    #[test]
    fn test_render_straight_pattern() {
        let lib = PatternLibrary::modern();
        let picture = lib.render(10).unwrap();
        assert_eq!(picture.lines().count(), NUM_LAYERS);
        assert!(picture.lines().nth(2).unwrap().ends_with("     x     "));
        assert!(lib.render(11).is_none());
    }
}
