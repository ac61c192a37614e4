//! Cathode LCT processor: the per-chamber CLCT pipeline.
//!
//! One processor serves one chamber for its whole lifetime. The chamber
//! layout is looked up on first use and cached; everything else is per-frame
//! state, reset by [`CathodeLctProcessor::clear`] at the start of every run.

use log::{debug, trace, warn};

use crate::clct::CathodeLct;
use crate::config::{Algorithm, ClctParams, EmulatorConfig};
use crate::digi::{ComparatorDigi, DigiReport, StripHits};
use crate::error::Result;
use crate::geometry::{ChamberId, ChamberLayout, GeometryService, resolve_layout};
use crate::patterns::{MODERN_KEY_LAYER, PatternLibrary};
use crate::pulse::{HitTimes, MAX_LCT_BINS, PulseMap};
use crate::selector::{select_legacy, select_modern};

/// Fewer layers than this with hits and the pattern search is not run.
const MIN_LAYERS_FOR_SEARCH: usize = 4;

/// Best and second CLCT per bin.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClctSlots {
    best: [CathodeLct; MAX_LCT_BINS],
    second: [CathodeLct; MAX_LCT_BINS],
}

impl ClctSlots {
    pub fn best(&self, bx: i32) -> CathodeLct {
        Self::slot(&self.best, bx)
    }

    pub fn second(&self, bx: i32) -> CathodeLct {
        Self::slot(&self.second, bx)
    }

    fn slot(slots: &[CathodeLct; MAX_LCT_BINS], bx: i32) -> CathodeLct {
        usize::try_from(bx)
            .ok()
            .and_then(|bx| slots.get(bx))
            .copied()
            .unwrap_or_default()
    }

    /// Store a CLCT in its own bin under the given track number.
    pub fn insert(&mut self, mut clct: CathodeLct, track_number: u8) -> bool {
        let bx = clct.bx as usize;
        if bx >= MAX_LCT_BINS {
            warn!("bx of CLCT candidate, {bx}, is not within the allowed range, [0-{MAX_LCT_BINS}); skipping it");
            return false;
        }
        clct.track_number = track_number;
        match track_number {
            1 => self.best[bx] = clct,
            _ => self.second[bx] = clct,
        }
        true
    }

    /// Valid CLCTs in bin order, best before second.
    pub fn valid(&self) -> Vec<CathodeLct> {
        self.best
            .iter()
            .zip(&self.second)
            .flat_map(|(b, s)| [*b, *s])
            .filter(CathodeLct::is_valid)
            .collect()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

pub struct CathodeLctProcessor {
    id: ChamberId,
    algorithm: Algorithm,
    params: ClctParams,
    library: PatternLibrary,
    layout: Option<ChamberLayout>,
    slots: ClctSlots,
    report: DigiReport,
}

impl CathodeLctProcessor {
    /// `config` is expected to be validated by the owner.
    pub fn new(id: ChamberId, config: &EmulatorConfig) -> Self {
        Self {
            id,
            algorithm: config.algorithm,
            params: config.clct,
            library: PatternLibrary::for_algorithm(config.algorithm),
            layout: None,
            slots: ClctSlots::default(),
            report: DigiReport::default(),
        }
    }

    pub fn id(&self) -> ChamberId {
        self.id
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Chamber layout, fetched from `geometry` once and cached.
    pub fn layout(&mut self, geometry: &dyn GeometryService) -> Result<ChamberLayout> {
        if let Some(layout) = self.layout {
            return Ok(layout);
        }
        let layout = resolve_layout(geometry, &self.id)?;
        debug!("{}: {} strips, stagger {:?}", self.id, layout.num_strips, layout.stagger);
        self.layout = Some(layout);
        Ok(layout)
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.report = DigiReport::default();
    }

    /// Run one frame. Returns the CLCTs found, best first.
    pub fn run(&mut self, geometry: &dyn GeometryService, digis: &[ComparatorDigi]) -> Result<Vec<CathodeLct>> {
        self.clear();
        let layout = self.layout(geometry)?;
        let (hits, report) = StripHits::collect(digis, layout.num_strips, self.params.fifo_tbins);
        self.report = report;
        if report.dropped() > 0 {
            warn!("{}: dropped {} of {} comparator digis", self.id, report.dropped(), digis.len());
        }

        let layers = hits.layers_hit();
        if layers < MIN_LAYERS_FOR_SEARCH {
            trace!("{}: {layers} layers hit; no pattern search", self.id);
            return Ok(Vec::new());
        }

        let (best, second) = self.find_clcts(&hits, &layout);
        if let Some(best) = best {
            self.slots.insert(best, 1);
        }
        if let Some(second) = second {
            self.slots.insert(second, 2);
        }

        let clcts = self.slots.valid();
        for clct in &clcts {
            debug!("{clct} found in {}", self.id);
        }
        Ok(clcts)
    }

    fn find_clcts(&self, hits: &StripHits, layout: &ChamberLayout) -> (Option<CathodeLct>, Option<CathodeLct>) {
        let p = &self.params;
        let half_strips = PulseMap::build(&HitTimes::half_strips(hits, layout), p.hit_persist, p.fifo_tbins);
        match self.algorithm {
            Algorithm::Modern => {
                let first_key = layout.stagger[MODERN_KEY_LAYER] as usize;
                select_modern(&self.library, &half_strips, p, first_key)
            }
            Algorithm::Legacy => {
                let di_strips = PulseMap::build(&HitTimes::di_strips(hits, layout), p.hit_persist, p.fifo_tbins);
                select_legacy(&self.library, &half_strips, &di_strips, p)
            }
        }
    }

    pub fn slots(&self) -> &ClctSlots {
        &self.slots
    }

    pub fn clcts(&self) -> Vec<CathodeLct> {
        self.slots.valid()
    }

    pub fn digi_report(&self) -> DigiReport {
        self.report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clct::StripType;
    use crate::config::Preset;
    use crate::error::LctError;
    use crate::geometry::StaticGeometry;

    const ID: ChamberId = ChamberId::new(1, 2, 1, 0, 4);

    /// Digis putting every layer on half-strip `hs` at bin `t`.
    fn straight_digis(layout: &ChamberLayout, hs: usize, t: i32) -> Vec<ComparatorDigi> {
        (0..6)
            .map(|layer| {
                let v = hs - layout.stagger[layer] as usize;
                ComparatorDigi::new(layer as u8, (v / 2) as i32, (v % 2) as i32, t)
            })
            .collect()
    }

    #[test]
    fn test_modern_straight_track() {
        let geometry = StaticGeometry::uniform(&[ID], 64);
        let mut proc = CathodeLctProcessor::new(ID, &EmulatorConfig::default());
        let layout = proc.layout(&geometry).unwrap();
        let clcts = proc.run(&geometry, &straight_digis(&layout, 41, 5)).unwrap();
        assert_eq!(clcts.len(), 1);
        let clct = clcts[0];
        assert_eq!(clct.track_number, 1);
        assert_eq!(clct.quality, 6);
        assert_eq!(clct.pattern, 10);
        assert_eq!(clct.bend, 0);
        assert_eq!(clct.key_half_strip(), 40);
        assert_eq!(clct.bx, 5);
        assert_eq!(proc.slots().best(5), clct);
    }

    #[test]
    fn test_legacy_straight_track() {
        let geometry = StaticGeometry::uniform(&[ID], 64);
        let mut proc = CathodeLctProcessor::new(ID, &EmulatorConfig::preset(Preset::OldMc));
        let layout = proc.layout(&geometry).unwrap();
        let clcts = proc.run(&geometry, &straight_digis(&layout, 41, 5)).unwrap();
        let best = clcts[0];
        assert_eq!(best.strip_type, StripType::HalfStrip);
        assert_eq!(best.quality, 6);
        assert_eq!(best.pattern, 7);
        assert_eq!(best.bend, 1);
        assert_eq!(best.key_half_strip(), 41);
    }

    #[test]
    fn test_three_layers_never_search() {
        let geometry = StaticGeometry::uniform(&[ID], 64);
        let mut proc = CathodeLctProcessor::new(ID, &EmulatorConfig::default());
        let layout = proc.layout(&geometry).unwrap();
        let digis: Vec<_> = straight_digis(&layout, 41, 5).into_iter().take(3).collect();
        assert!(proc.run(&geometry, &digis).unwrap().is_empty());
    }

    #[test]
    fn test_missing_chamber_is_an_error() {
        let geometry = StaticGeometry::new();
        let mut proc = CathodeLctProcessor::new(ID, &EmulatorConfig::default());
        let err = proc.run(&geometry, &[]).unwrap_err();
        assert!(matches!(err, LctError::ChamberNotFound(_)));
    }

    #[test]
    fn test_layout_is_cached() {
        let geometry = StaticGeometry::uniform(&[ID], 64);
        let mut proc = CathodeLctProcessor::new(ID, &EmulatorConfig::default());
        proc.layout(&geometry).unwrap();
        // Later runs succeed against an empty geometry.
        assert!(proc.run(&StaticGeometry::new(), &[]).is_ok());
    }

    #[test]
    fn test_clear_resets_frame_state() {
        let geometry = StaticGeometry::uniform(&[ID], 64);
        let mut proc = CathodeLctProcessor::new(ID, &EmulatorConfig::default());
        let layout = proc.layout(&geometry).unwrap();
        proc.run(&geometry, &straight_digis(&layout, 41, 5)).unwrap();
        assert_eq!(proc.clcts().len(), 1);
        proc.clear();
        assert!(proc.clcts().is_empty());
        assert_eq!(proc.digi_report(), DigiReport::default());
    }

    #[test]
    fn test_slots_reject_late_bins() {
        let mut slots = ClctSlots::default();
        let clct = CathodeLct::new(6, 10, StripType::HalfStrip, 0, 40, 16);
        assert!(!slots.insert(clct, 1));
        assert!(slots.valid().is_empty());
    }
}
