//! Key selection: turn a frame's pulses into at most two CLCTs.
//!
//! Both algorithms run the same three steps, pretrigger scan, pattern
//! scoring at the latch bin and best/second key selection, but differ in
//! position spaces, thresholds and the way the second key is kept apart
//! from the best one.
//!
//! Legacy selection works on half-strips and di-strips independently. The
//! second key must be more than two positions from the best, and the two
//! spaces are merged by [`legacy_order`].
//!
//! Modern selection works on half-strips only. It ranks keys by
//! `(pattern & 14) | (layers << 5)` and masks `min_separation` keys on either
//! side of the best before looking for the second. If a pretrigger yields
//! no CLCT the scan resumes one bin after the latch.

use std::cmp::Ordering;

use log::trace;

use crate::clct::{CathodeLct, StripType};
use crate::config::ClctParams;
use crate::patterns::PatternLibrary;
use crate::pretrigger::{latch_bin, scan_legacy, scan_modern};
use crate::pulse::PulseMap;
use crate::scorer::{KeyScore, score_legacy, score_modern};

/// Keys closer than this to the legacy best key cannot be the second key.
const LEGACY_ADJACENT_KEYS: usize = 2;

/// Legacy selection in one position space.
pub fn select_legacy_space(
    library: &PatternLibrary,
    pulses: &PulseMap,
    strip_type: StripType,
    params: &ClctParams,
) -> Vec<CathodeLct> {
    let Some(pre) = scan_legacy(library, pulses, params.nplanes_hit_pretrig, params.fifo_tbins) else {
        return Vec::new();
    };
    let latch = latch_bin(pre.bx, params.drift_delay, params.fifo_tbins);
    trace!("{strip_type} pretrigger at bx {}; latching at bx {latch}", pre.bx);

    let key_end = pulses.positions().saturating_sub(strip_type.bit() as usize);
    let scores: Vec<KeyScore> = (0..key_end)
        .map(|key| score_legacy(library, pulses, key, latch))
        .collect();

    let mut best = 0;
    let mut highest = 0;
    for (key, score) in scores.iter().enumerate() {
        if score.layers > highest {
            highest = score.layers;
            best = key;
        }
    }

    let mut second = None;
    let mut highest = 0;
    for (key, score) in scores.iter().enumerate() {
        if best.abs_diff(key) > LEGACY_ADJACENT_KEYS && score.layers > highest {
            highest = score.layers;
            second = Some(key);
        }
    }

    [Some(best), second]
        .into_iter()
        .flatten()
        .filter_map(|key| {
            let score = scores.get(key)?;
            (score.layers > 0 && score.layers >= params.nplanes_hit_pattern).then(|| {
                CathodeLct::new(score.layers, score.pattern, strip_type, score.bend, key as u32, pre.bx)
            })
        })
        .collect()
}

/// Descending legacy order: rank, then pattern id, then half-strips before
/// di-strips, then the lower key.
pub fn legacy_order(a: &CathodeLct, b: &CathodeLct) -> Ordering {
    b.rank()
        .cmp(&a.rank())
        .then(b.pattern.cmp(&a.pattern))
        .then(b.strip_type.bit().cmp(&a.strip_type.bit()))
        .then(a.key_half_strip().cmp(&b.key_half_strip()))
}

/// Legacy selection across both position spaces.
///
/// When the best and second entries are the same physical candidate the
/// second is replaced by the third entry, if any.
pub fn select_legacy(
    library: &PatternLibrary,
    half_strips: &PulseMap,
    di_strips: &PulseMap,
    params: &ClctParams,
) -> (Option<CathodeLct>, Option<CathodeLct>) {
    let mut list = select_legacy_space(library, half_strips, StripType::HalfStrip, params);
    list.extend(select_legacy_space(library, di_strips, StripType::DiStrip, params));
    best_two(list)
}

/// Sort candidates by [`legacy_order`] and take the first two, skipping a
/// second entry identical to the first.
fn best_two(mut list: Vec<CathodeLct>) -> (Option<CathodeLct>, Option<CathodeLct>) {
    list.sort_by(legacy_order);
    let best = list.first().copied();
    let mut second = list.get(1).copied();
    if best.is_some() && best == second {
        second = list.get(2).copied();
    }
    (best, second)
}

/// Descending modern order: layers, then pattern id, then the lower key.
///
/// Mirror patterns share a search quality, so the key scan alone can leave
/// the lower pattern id in front.
pub fn modern_order(a: &CathodeLct, b: &CathodeLct) -> Ordering {
    b.quality
        .cmp(&a.quality)
        .then(b.pattern.cmp(&a.pattern))
        .then(a.key_half_strip().cmp(&b.key_half_strip()))
}

/// Modern selection over the half-strip space, keys from `first_key`.
///
/// Best and second come back in [`modern_order`].
pub fn select_modern(
    library: &PatternLibrary,
    pulses: &PulseMap,
    params: &ClctParams,
    first_key: usize,
) -> (Option<CathodeLct>, Option<CathodeLct>) {
    let positions = pulses.positions();
    let mut start_bx = 0;

    while start_bx < params.fifo_tbins {
        let Some(pre) = scan_modern(
            library,
            pulses,
            params.nplanes_hit_pretrig,
            params.pid_thresh_pretrig,
            first_key,
            start_bx,
            params.fifo_tbins,
        ) else {
            break;
        };
        let latch = latch_bin(pre.bx, params.drift_delay, params.fifo_tbins);
        trace!("pretrigger at bx {}; latching at bx {latch}", pre.bx);
        start_bx = latch + 1;

        let mut scores = vec![KeyScore::default(); positions];
        let mut quality = vec![0u32; positions];
        for key in first_key..positions {
            let score = score_modern(library, params.pid_thresh_pretrig, pulses, key, latch);
            quality[key] = (score.pattern as u32 & 14) | (score.layers << 5);
            scores[key] = score;
        }

        let Some(best) = highest_key(&quality, first_key) else {
            continue;
        };
        let span = params.min_separation as usize;
        for q in &mut quality[best.saturating_sub(span)..=(best + span).min(positions - 1)] {
            *q = 0;
        }
        let second = highest_key(&quality, first_key);

        let stagger = first_key as u32;
        let emit = |key: usize| {
            let score = scores[key];
            (score.layers > 0 && score.layers >= params.nplanes_hit_pattern).then(|| {
                CathodeLct::new(
                    score.layers,
                    score.pattern,
                    StripType::HalfStrip,
                    score.bend,
                    key as u32 - stagger,
                    pre.bx,
                )
            })
        };
        let mut found = [Some(best), second]
            .into_iter()
            .flatten()
            .filter_map(emit)
            .collect::<Vec<_>>();
        found.sort_by(modern_order);

        if !found.is_empty() {
            let mut found = found.into_iter();
            return (found.next(), found.next());
        }
    }
    (None, None)
}

/// Lowest key with the strictly highest non-zero quality.
fn highest_key(quality: &[u32], first_key: usize) -> Option<usize> {
    let mut best = None;
    let mut highest = 0;
    for (key, &q) in quality.iter().enumerate().skip(first_key) {
        if q > highest {
            highest = q;
            best = Some(key);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pulse::{HitTimes, Layer};

    fn track(times: &mut HitTimes, position: usize, t: u32) {
        for layer in Layer::all() {
            times.set(layer, position, Some(t));
        }
    }

    // ---------------------------------------------------------------
    // Modern selection
    // ---------------------------------------------------------------

    #[test]
    fn test_modern_single_straight_track() {
        let mut times = HitTimes::new(129);
        track(&mut times, 41, 5);
        let pulses = PulseMap::build(&times, 6, 12);
        let (best, second) = select_modern(&PatternLibrary::modern(), &pulses, &ClctParams::default(), 1);
        let best = best.unwrap();
        assert_eq!(best.quality, 6);
        assert_eq!(best.pattern, 10);
        assert_eq!(best.key_half_strip(), 40);
        assert_eq!(best.bx, 5);
        assert!(second.is_none());
    }

    #[test]
    fn test_modern_busy_keys_exclude_nearby_second() {
        let mut times = HitTimes::new(129);
        track(&mut times, 41, 5);
        track(&mut times, 49, 5);
        let pulses = PulseMap::build(&times, 6, 12);
        let lib = PatternLibrary::modern();
        let (best, second) = select_modern(&lib, &pulses, &ClctParams::default(), 1);
        assert_eq!(best.unwrap().key_half_strip(), 40);
        assert!(second.is_none());

        let params = ClctParams {
            min_separation: 5,
            ..ClctParams::default()
        };
        let (best, second) = select_modern(&lib, &pulses, &params, 1);
        assert_eq!(best.unwrap().key_half_strip(), 40);
        assert_eq!(second.unwrap().key_half_strip(), 48);
    }

    /// Six-layer track with per-layer offsets from `key`.
    fn bent_track(times: &mut HitTimes, key: usize, offsets: [i32; 6], t: u32) {
        for (layer, off) in Layer::all().zip(offsets) {
            times.set(layer, (key as i32 + off) as usize, Some(t));
        }
    }

    #[test]
    fn test_modern_mirror_patterns_ordered_by_pattern_id() {
        let mut times = HitTimes::new(129);
        // Equal search quality: pattern 8 at the lower key, its mirror 9 higher up.
        bent_track(&mut times, 31, [2, 1, 0, -1, -2, -2], 5);
        bent_track(&mut times, 81, [-2, -1, 0, 1, 2, 2], 5);
        let pulses = PulseMap::build(&times, 6, 12);
        let (best, second) = select_modern(&PatternLibrary::modern(), &pulses, &ClctParams::default(), 1);
        let best = best.unwrap();
        let second = second.unwrap();
        assert_eq!(best.quality, 6);
        assert_eq!(second.quality, 6);
        assert_eq!((best.pattern, best.key_half_strip()), (9, 80));
        assert_eq!((second.pattern, second.key_half_strip()), (8, 30));
    }

    #[test]
    fn test_modern_order_ties() {
        let a = CathodeLct::new(6, 9, StripType::HalfStrip, 1, 80, 5);
        let b = CathodeLct::new(6, 8, StripType::HalfStrip, 0, 30, 5);
        let c = CathodeLct::new(5, 10, StripType::HalfStrip, 0, 10, 5);
        let d = CathodeLct::new(6, 9, StripType::HalfStrip, 1, 60, 5);
        let mut list = vec![c, b, a, d];
        list.sort_by(modern_order);
        assert_eq!(list, vec![d, a, b, c]);
    }

    #[test]
    fn test_modern_no_pretrigger() {
        let times = HitTimes::new(129);
        let pulses = PulseMap::build(&times, 6, 12);
        let (best, second) = select_modern(&PatternLibrary::modern(), &pulses, &ClctParams::default(), 1);
        assert!(best.is_none() && second.is_none());
    }

    #[test]
    fn test_modern_second_pass_after_weak_pretrigger() {
        let mut times = HitTimes::new(129);
        // Two layers pretrigger at bx 0 but never reach four layers.
        times.set(Layer::new(0).unwrap(), 20, Some(0));
        times.set(Layer::new(1).unwrap(), 20, Some(0));
        track(&mut times, 100, 6);
        let pulses = PulseMap::build(&times, 6, 12);
        let (best, _) = select_modern(&PatternLibrary::modern(), &pulses, &ClctParams::default(), 1);
        let best = best.unwrap();
        assert_eq!(best.bx, 6);
        assert_eq!(best.key_half_strip(), 99);
    }

    // ---------------------------------------------------------------
    // Legacy selection
    // ---------------------------------------------------------------

    #[test]
    fn test_legacy_space_second_key_needs_distance() {
        let mut times = HitTimes::new(129);
        track(&mut times, 40, 3);
        track(&mut times, 42, 3);
        let pulses = PulseMap::build(&times, 6, 12);
        let list = select_legacy_space(
            &PatternLibrary::legacy(),
            &pulses,
            StripType::HalfStrip,
            &ClctParams::default(),
        );
        // Key 42 is only two away from 40, so the second comes from further out
        // and falls below the pattern threshold.
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].key_half_strip(), 40);
        assert_eq!(list[0].pattern, 7);
        assert_eq!(list[0].bx, 3);
    }

    #[test]
    fn test_legacy_order_prefers_half_strips_at_equal_rank_inputs() {
        let h = CathodeLct::new(5, 7, StripType::HalfStrip, 1, 40, 3);
        let d = CathodeLct::new(6, 7, StripType::DiStrip, 1, 10, 3);
        let mut list = vec![d, h];
        list.sort_by(legacy_order);
        // 5/6H (rank 13) beats 6/6D (rank 12).
        assert_eq!(list[0], h);

        let a = CathodeLct::new(6, 7, StripType::HalfStrip, 1, 60, 3);
        let b = CathodeLct::new(6, 7, StripType::HalfStrip, 1, 20, 3);
        let mut list = vec![a, b];
        list.sort_by(legacy_order);
        assert_eq!(list[0], b);
    }

    #[test]
    fn test_legacy_duplicate_replaced_by_third() {
        let a = CathodeLct::new(6, 7, StripType::HalfStrip, 1, 40, 3);
        let c = CathodeLct::new(4, 5, StripType::DiStrip, 0, 2, 3);
        let (best, second) = best_two(vec![c, a, a]);
        assert_eq!(best, Some(a));
        assert_eq!(second, Some(c));

        let (best, second) = best_two(vec![a, a]);
        assert_eq!(best, Some(a));
        assert_eq!(second, None);
    }

    #[test]
    fn test_legacy_across_spaces() {
        let mut half = HitTimes::new(129);
        track(&mut half, 40, 3);
        let mut di = HitTimes::new(33);
        track(&mut di, 10, 3);
        let lib = PatternLibrary::legacy();
        let params = ClctParams::default();
        let (best, second) = select_legacy(
            &lib,
            &PulseMap::build(&half, 6, 12),
            &PulseMap::build(&di, 6, 12),
            &params,
        );
        let best = best.unwrap();
        let second = second.unwrap();
        assert_eq!(best.strip_type, StripType::HalfStrip);
        assert_eq!(second.strip_type, StripType::DiStrip);
        assert_eq!(second.key_half_strip(), 40);
    }
}
