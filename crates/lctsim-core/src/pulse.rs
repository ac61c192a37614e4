//! Position spaces and the one-shot pulse model.
//!
//! Surviving strip hits are mapped onto a position space (half-strips, or
//! di-strips for the legacy algorithm) as one hit time per (layer, position).
//! [`PulseMap`] then stretches every hit into a pulse `hit_persist` bins wide,
//! stored as a `u32` per (layer, position) where bit *b* means "active in bin
//! *b*". Bits at or beyond `fifo_tbins` are never set.

use log::{trace, warn};

use crate::digi::StripHits;
use crate::geometry::ChamberLayout;

pub const NUM_LAYERS: usize = 6;

/// Number of per-bin slots kept for CLCTs, ALCTs and correlated LCTs.
pub const MAX_LCT_BINS: usize = 16;

/// A chamber layer index, always below [`NUM_LAYERS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Layer(u8);

impl Layer {
    pub fn new(index: usize) -> Option<Self> {
        (index < NUM_LAYERS).then_some(Self(index as u8))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn all() -> impl Iterator<Item = Layer> {
        (0..NUM_LAYERS as u8).map(Layer)
    }
}

/// A time bin inside the readout window of the frame it was checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeBin(u32);

impl TimeBin {
    pub fn new(bx: i32, fifo_tbins: u32) -> Option<Self> {
        (bx >= 0 && (bx as u32) < fifo_tbins).then_some(Self(bx as u32))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

/// Hit time per (layer, position) in one position space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HitTimes {
    layers: [Vec<Option<u32>>; NUM_LAYERS],
}

impl HitTimes {
    pub fn new(positions: usize) -> Self {
        Self {
            layers: std::array::from_fn(|_| vec![None; positions]),
        }
    }

    pub fn positions(&self) -> usize {
        self.layers[0].len()
    }

    pub fn get(&self, layer: Layer, position: usize) -> Option<u32> {
        self.layers[layer.index()].get(position).copied().flatten()
    }

    pub fn set(&mut self, layer: Layer, position: usize, time: Option<u32>) {
        if let Some(slot) = self.layers[layer.index()].get_mut(position) {
            *slot = time;
        }
    }

    /// Half-strip space: position `2*strip + comparator + stagger[layer]`.
    pub fn half_strips(hits: &StripHits, layout: &ChamberLayout) -> Self {
        let mut out = Self::new(layout.num_half_strips());
        for layer in Layer::all() {
            let stagger = layout.stagger[layer.index()] as usize;
            for strip in 0..hits.num_strips() {
                let Some(hit) = hits.get(layer, strip) else {
                    continue;
                };
                let hs = 2 * strip + hit.comparator as usize + stagger;
                if hs >= out.positions() {
                    warn!("found wrong half-strip number {hs}; skipping this digi");
                    continue;
                }
                out.set(layer, hs, Some(hit.time.get()));
            }
        }
        out
    }

    /// Di-strip space: position `strip / 2`, after the stagger sweep.
    ///
    /// On a staggered layer a right-half hit on an odd strip belongs to the
    /// next di-strip, so it is carried two strips up before the strip is
    /// folded into its di-strip. Once the carry has happened the strip's own
    /// di-strip slot is written with the emptied time, clearing it.
    pub fn di_strips(hits: &StripHits, layout: &ChamberLayout) -> Self {
        let mut out = Self::new(layout.num_di_strips());
        // Two spare strips leave room for a carry out of the last strip.
        let span = layout.num_strips + 2;

        for layer in Layer::all() {
            let staggered = layout.stagger[layer.index()] == 1;
            let mut time: Vec<Option<u32>> = vec![None; span];
            let mut comparator = vec![0u8; span];
            let mut moved = vec![false; span];
            for strip in 0..hits.num_strips().min(layout.num_strips) {
                if let Some(hit) = hits.get(layer, strip) {
                    time[strip] = Some(hit.time.get());
                    comparator[strip] = hit.comparator;
                }
            }

            for strip in 0..span {
                if time[strip].is_none() {
                    continue;
                }
                if staggered && strip % 2 == 1 && comparator[strip] == 1 && !moved[strip] {
                    sweep_stagger_chain(&mut time, &comparator, &mut moved, strip);
                }
                let ds = strip / 2;
                if ds >= out.positions() {
                    warn!("found wrong di-strip number {ds}; skipping this digi");
                    continue;
                }
                out.set(layer, ds, time[strip]);
            }
        }
        out
    }
}

/// Carry a chain of right-half hits on odd strips up by two strips.
///
/// The chain starts at `start` and extends while the strip two above also
/// holds an unmoved right-half hit. Members are processed top-down: the last
/// one merges into the strip above it (earliest time wins), every other one
/// lands on the slot its successor just vacated.
fn sweep_stagger_chain(time: &mut [Option<u32>], comparator: &[u8], moved: &mut [bool], start: usize) {
    let mut last = start;
    while last + 2 < time.len() && comparator[last + 2] == 1 && !moved[last + 2] {
        last += 2;
    }

    for strip in (start..=last).rev().step_by(2) {
        let carried = time[strip].take();
        moved[strip] = true;
        let target = strip + 2;
        let Some(slot) = time.get_mut(target) else {
            warn!("found wrong strip number {target}; cannot apply di-strip staggering");
            continue;
        };
        *slot = match (*slot, carried) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        trace!("di-strip stagger: strip {strip} -> {target}, time {:?}", *slot);
    }
}

/// One-shot pulses for every (layer, position) of a position space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PulseMap {
    layers: [Vec<u32>; NUM_LAYERS],
}

impl PulseMap {
    /// Stretch each hit at bin `t` to bits `t .. t + hit_persist`, clipped to
    /// the readout window.
    pub fn build(times: &HitTimes, hit_persist: u32, fifo_tbins: u32) -> Self {
        let mut layers: [Vec<u32>; NUM_LAYERS] = std::array::from_fn(|_| vec![0; times.positions()]);
        let end_cap = fifo_tbins.min(u32::BITS);
        for layer in Layer::all() {
            for (position, word) in layers[layer.index()].iter_mut().enumerate() {
                let Some(t) = times.get(layer, position) else {
                    continue;
                };
                let end = t.saturating_add(hit_persist).min(end_cap);
                for bx in t..end {
                    *word |= 1 << bx;
                }
            }
        }
        Self { layers }
    }

    pub fn positions(&self) -> usize {
        self.layers[0].len()
    }

    pub fn word(&self, layer: usize, position: usize) -> u32 {
        self.layers[layer][position]
    }

    /// Whether the pulse on `layer` at `position` is high in bin `bx`.
    /// Positions outside the chamber are never active.
    pub fn is_active(&self, layer: usize, position: isize, bx: u32) -> bool {
        if position < 0 || bx >= u32::BITS {
            return false;
        }
        self.layers[layer]
            .get(position as usize)
            .is_some_and(|word| (word >> bx) & 1 == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digi::{ComparatorDigi, StripHits};

    fn layer(i: usize) -> Layer {
        Layer::new(i).unwrap()
    }

    #[test]
    fn test_layer_and_time_bin_bounds() {
        assert!(Layer::new(5).is_some());
        assert!(Layer::new(6).is_none());
        assert_eq!(Layer::all().count(), NUM_LAYERS);
        assert!(TimeBin::new(11, 12).is_some());
        assert!(TimeBin::new(12, 12).is_none());
        assert!(TimeBin::new(-1, 12).is_none());
    }

    #[test]
    fn test_half_strip_position_includes_stagger() {
        let layout = ChamberLayout::standard(64);
        let digis = [ComparatorDigi::new(0, 10, 1, 2), ComparatorDigi::new(1, 10, 1, 2)];
        let (hits, _) = StripHits::collect(&digis, 64, 12);
        let times = HitTimes::half_strips(&hits, &layout);
        assert_eq!(times.positions(), 129);
        // Layer 0 is staggered, layer 1 is not.
        assert_eq!(times.get(layer(0), 22), Some(2));
        assert_eq!(times.get(layer(1), 21), Some(2));
    }

    #[test]
    fn test_pulse_width_and_window_clip() {
        let mut times = HitTimes::new(4);
        times.set(layer(2), 1, Some(3));
        times.set(layer(2), 2, Some(9));
        let pulses = PulseMap::build(&times, 6, 12);
        assert_eq!(pulses.word(2, 1), 0b1_1111_1000);
        // 9..15 clipped to 9..12
        assert_eq!(pulses.word(2, 2), 0b1110_0000_0000);
        assert!(pulses.is_active(2, 1, 8));
        assert!(!pulses.is_active(2, 1, 9));
        assert!(!pulses.is_active(2, -1, 3));
        assert!(!pulses.is_active(2, 4, 3));
    }

    #[test]
    fn test_di_strip_without_stagger() {
        let layout = ChamberLayout::standard(16);
        let digis = [ComparatorDigi::new(1, 5, 1, 4)];
        let (hits, _) = StripHits::collect(&digis, 16, 12);
        let times = HitTimes::di_strips(&hits, &layout);
        assert_eq!(times.positions(), 9);
        assert_eq!(times.get(layer(1), 2), Some(4));
    }

    #[test]
    fn test_di_strip_stagger_single_carry() {
        let layout = ChamberLayout::standard(16);
        // Strip 5 right half on staggered layer 0 moves to strip 7, di-strip 3.
        let digis = [ComparatorDigi::new(0, 5, 1, 4)];
        let (hits, _) = StripHits::collect(&digis, 16, 12);
        let times = HitTimes::di_strips(&hits, &layout);
        assert_eq!(times.get(layer(0), 2), None);
        assert_eq!(times.get(layer(0), 3), Some(4));
    }

    #[test]
    fn test_di_strip_stagger_chain_merges_earliest() {
        let layout = ChamberLayout::standard(16);
        let digis = [
            ComparatorDigi::new(0, 5, 1, 6),
            ComparatorDigi::new(0, 7, 1, 8),
            ComparatorDigi::new(0, 9, 0, 3),
        ];
        let (hits, _) = StripHits::collect(&digis, 16, 12);
        let times = HitTimes::di_strips(&hits, &layout);
        // 7 carries into 9 (min(8, 3) = 3), 5 lands on the vacated 7.
        assert_eq!(times.get(layer(0), 2), None);
        assert_eq!(times.get(layer(0), 3), Some(6));
        assert_eq!(times.get(layer(0), 4), Some(3));
    }

    #[test]
    fn test_di_strip_stagger_clears_even_neighbour() {
        let layout = ChamberLayout::standard(16);
        // Strip 4 fills di-strip 2, then the carry from strip 5 rewrites it.
        let digis = [ComparatorDigi::new(2, 4, 0, 1), ComparatorDigi::new(2, 5, 1, 2)];
        let (hits, _) = StripHits::collect(&digis, 16, 12);
        let times = HitTimes::di_strips(&hits, &layout);
        assert_eq!(times.get(layer(2), 2), None);
        assert_eq!(times.get(layer(2), 3), Some(2));
    }

    #[test]
    fn test_di_strip_stagger_last_strip_uses_spare_slot() {
        let layout = ChamberLayout::standard(16);
        let digis = [ComparatorDigi::new(4, 15, 1, 5)];
        let (hits, _) = StripHits::collect(&digis, 16, 12);
        let times = HitTimes::di_strips(&hits, &layout);
        assert_eq!(times.get(layer(4), 8), Some(5));
    }
}
