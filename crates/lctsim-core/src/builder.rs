//! Multi-chamber trigger builder.
//!
//! The builder owns one [`ChamberMotherboard`] per chamber, each behind its
//! own mutex, and emulates a frame by running every chamber on its own
//! scoped thread. A chamber that cannot be emulated (no geometry, garbled
//! strip count) or that panics is reported in its [`ChamberResult`]; the
//! other chambers are unaffected. Results come back sorted by chamber id.

use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::alct::AnodeLct;
use crate::clct::CathodeLct;
use crate::config::{ConfigSubstitution, EmulatorConfig};
use crate::correlated::CorrelatedLct;
use crate::digi::ComparatorDigi;
use crate::error::{LctError, Result};
use crate::geometry::{ChamberId, GeometryService};
use crate::motherboard::ChamberMotherboard;

/// Input of one chamber for one frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChamberFrame {
    pub id: ChamberId,
    #[serde(default)]
    pub digis: Vec<ComparatorDigi>,
    #[serde(default)]
    pub alcts: Vec<AnodeLct>,
}

impl ChamberFrame {
    pub fn new(id: ChamberId) -> Self {
        Self {
            id,
            digis: Vec::new(),
            alcts: Vec::new(),
        }
    }
}

/// One frame across any number of chambers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerFrame {
    pub event: u64,
    pub chambers: Vec<ChamberFrame>,
}

impl TriggerFrame {
    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Debug)]
pub enum Outcome {
    Emulated,
    /// The chamber could not be emulated; nothing was produced.
    Skipped(LctError),
    /// Emulation panicked. Carries the panic message.
    Failed(String),
}

impl Outcome {
    pub fn is_emulated(&self) -> bool {
        matches!(self, Self::Emulated)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Emulated => "emulated",
            Self::Skipped(_) => "skipped",
            Self::Failed(_) => "failed",
        }
    }

    pub fn reason(&self) -> Option<String> {
        match self {
            Self::Emulated => None,
            Self::Skipped(err) => Some(err.to_string()),
            Self::Failed(msg) => Some(msg.clone()),
        }
    }
}

#[derive(Debug)]
pub struct ChamberResult {
    pub id: ChamberId,
    pub outcome: Outcome,
    pub clcts: Vec<CathodeLct>,
    pub lcts: Vec<CorrelatedLct>,
}

impl ChamberResult {
    fn empty(id: ChamberId, outcome: Outcome) -> Self {
        Self {
            id,
            outcome,
            clcts: Vec::new(),
            lcts: Vec::new(),
        }
    }
}

pub struct TriggerBuilder {
    config: EmulatorConfig,
    substitutions: Vec<ConfigSubstitution>,
    geometry: Box<dyn GeometryService>,
    chambers: BTreeMap<ChamberId, Mutex<ChamberMotherboard>>,
    all_bins: bool,
}

impl TriggerBuilder {
    /// The configuration is validated once here; every motherboard gets the
    /// validated copy.
    pub fn new(mut config: EmulatorConfig, geometry: Box<dyn GeometryService>) -> Self {
        let substitutions = config.validate();
        debug!("trigger builder configuration:\n{}", config.dump());
        Self {
            config,
            substitutions,
            geometry,
            chambers: BTreeMap::new(),
            all_bins: false,
        }
    }

    /// Report the LCTs of every bin instead of the readout bin only.
    pub fn with_all_bins(mut self, all_bins: bool) -> Self {
        self.all_bins = all_bins;
        self
    }

    pub fn config(&self) -> &EmulatorConfig {
        &self.config
    }

    pub fn substitutions(&self) -> &[ConfigSubstitution] {
        &self.substitutions
    }

    /// Add a motherboard for `id` unless one exists.
    pub fn register(&mut self, id: ChamberId) {
        let config = self.config;
        self.chambers
            .entry(id)
            .or_insert_with(|| Mutex::new(ChamberMotherboard::new(id, config)));
    }

    pub fn chamber_count(&self) -> usize {
        self.chambers.len()
    }

    pub fn chamber_ids(&self) -> Vec<ChamberId> {
        self.chambers.keys().copied().collect()
    }

    /// Register every chamber of `frame`, then emulate it.
    pub fn run_frame(&mut self, frame: &TriggerFrame) -> Vec<ChamberResult> {
        for chamber in &frame.chambers {
            self.register(chamber.id);
        }
        self.emulate(frame)
    }

    /// Emulate one frame on every registered chamber in parallel. Chambers
    /// missing from the frame run with empty input; frame entries for
    /// unregistered chambers are ignored.
    pub fn emulate(&self, frame: &TriggerFrame) -> Vec<ChamberResult> {
        let mut inputs: BTreeMap<ChamberId, &ChamberFrame> = BTreeMap::new();
        for chamber in &frame.chambers {
            if !self.chambers.contains_key(&chamber.id) {
                warn!("event {}: {} is not registered; ignoring its input", frame.event, chamber.id);
                continue;
            }
            if inputs.insert(chamber.id, chamber).is_some() {
                warn!("event {}: {} appears more than once; using the last entry", frame.event, chamber.id);
            }
        }

        let geometry = self.geometry.as_ref();
        let all_bins = self.all_bins;
        let mut results: Vec<ChamberResult> = std::thread::scope(|s| {
            let handles: Vec<_> = self
                .chambers
                .iter()
                .map(|(id, motherboard)| {
                    let input = inputs.get(id).copied();
                    (*id, s.spawn(move || Self::run_one(motherboard, geometry, input, all_bins)))
                })
                .collect();

            handles
                .into_iter()
                .map(|(id, handle)| {
                    handle
                        .join()
                        .unwrap_or_else(|_| ChamberResult::empty(id, Outcome::Failed("worker thread panicked".into())))
                })
                .collect()
        });

        results.sort_by_key(|r| r.id);
        results
    }

    fn run_one(
        motherboard: &Mutex<ChamberMotherboard>,
        geometry: &dyn GeometryService,
        input: Option<&ChamberFrame>,
        all_bins: bool,
    ) -> ChamberResult {
        let mut mb = motherboard.lock().unwrap_or_else(PoisonError::into_inner);
        let id = mb.id();
        let (digis, alcts): (&[ComparatorDigi], &[AnodeLct]) = match input {
            Some(frame) => (&frame.digis, &frame.alcts),
            None => (&[], &[]),
        };

        match catch_unwind(AssertUnwindSafe(|| mb.run(geometry, digis, alcts))) {
            Ok(Ok(readout)) => ChamberResult {
                id,
                outcome: Outcome::Emulated,
                clcts: mb.processor().clcts(),
                lcts: if all_bins { mb.all_lcts() } else { readout },
            },
            Ok(Err(err)) => {
                warn!("{id}: skipped: {err}");
                ChamberResult::empty(id, Outcome::Skipped(err))
            }
            Err(payload) => {
                let msg = panic_message(payload.as_ref());
                warn!("{id}: emulation panicked: {msg}");
                mb.clear();
                ChamberResult::empty(id, Outcome::Failed(msg))
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{ChamberLayout, StaticGeometry};

    const A: ChamberId = ChamberId::new(1, 2, 1, 0, 4);
    const B: ChamberId = ChamberId::new(1, 2, 1, 0, 5);
    const MISSING: ChamberId = ChamberId::new(2, 3, 4, 0, 6);

    fn straight(id: ChamberId, hs: usize, t: i32) -> ChamberFrame {
        let layout = ChamberLayout::standard(64);
        let mut frame = ChamberFrame::new(id);
        for layer in 0..6 {
            let v = hs - layout.stagger[layer] as usize;
            frame
                .digis
                .push(ComparatorDigi::new(layer as u8, (v / 2) as i32, (v % 2) as i32, t));
        }
        frame.alcts.push(AnodeLct::new(2, false, 20, t, 1));
        frame
    }

    /// Geometry whose lookup panics for one chamber.
    struct PanickingGeometry(StaticGeometry);

    impl GeometryService for PanickingGeometry {
        fn chamber(&self, id: &ChamberId) -> Option<ChamberLayout> {
            if *id == B {
                panic!("corrupt geometry record");
            }
            self.0.chamber(id)
        }
    }

    #[test]
    fn test_frame_across_chambers() {
        let geometry = StaticGeometry::uniform(&[A, B], 64);
        let mut builder = TriggerBuilder::new(EmulatorConfig::default(), Box::new(geometry));
        let frame = TriggerFrame {
            event: 1,
            chambers: vec![straight(B, 81, 6), straight(A, 41, 5)],
        };
        let results = builder.run_frame(&frame);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, A);
        assert_eq!(results[1].id, B);
        assert!(results.iter().all(|r| r.outcome.is_emulated()));
        assert_eq!(results[0].lcts[0].key_half_strip, 40);
        assert_eq!(results[1].lcts[0].key_half_strip, 80);
        assert_eq!(results[1].clcts[0].bx, 6);
    }

    #[test]
    fn test_missing_geometry_is_skipped() {
        let geometry = StaticGeometry::uniform(&[A], 64);
        let mut builder = TriggerBuilder::new(EmulatorConfig::default(), Box::new(geometry));
        let frame = TriggerFrame {
            event: 2,
            chambers: vec![straight(A, 41, 5), straight(MISSING, 41, 5)],
        };
        let results = builder.run_frame(&frame);
        assert!(results[0].outcome.is_emulated());
        assert!(matches!(results[1].outcome, Outcome::Skipped(LctError::ChamberNotFound(id)) if id == MISSING));
        assert!(results[1].lcts.is_empty());
    }

    #[test]
    fn test_panicking_chamber_is_isolated() {
        let geometry = PanickingGeometry(StaticGeometry::uniform(&[A, B], 64));
        let mut builder = TriggerBuilder::new(EmulatorConfig::default(), Box::new(geometry));
        let frame = TriggerFrame {
            event: 3,
            chambers: vec![straight(A, 41, 5), straight(B, 41, 5)],
        };
        let results = builder.run_frame(&frame);
        assert!(results[0].outcome.is_emulated());
        assert_eq!(results[0].lcts.len(), 1);
        match &results[1].outcome {
            Outcome::Failed(msg) => assert!(msg.contains("corrupt geometry")),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn test_emulate_ignores_unregistered_chambers() {
        let geometry = StaticGeometry::uniform(&[A, B], 64);
        let mut builder = TriggerBuilder::new(EmulatorConfig::default(), Box::new(geometry));
        builder.register(A);
        let frame = TriggerFrame {
            event: 4,
            chambers: vec![straight(B, 41, 5)],
        };
        let results = builder.emulate(&frame);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, A);
        assert!(results[0].lcts.is_empty());
    }

    #[test]
    fn test_builder_validates_once() {
        let mut config = EmulatorConfig::default();
        config.clct.drift_delay = 9;
        let mut builder = TriggerBuilder::new(config, Box::new(StaticGeometry::uniform(&[A], 64)));
        assert_eq!(builder.substitutions().len(), 1);
        assert_eq!(builder.config().clct.drift_delay, 2);
        builder.register(A);
        let frame = TriggerFrame::default();
        assert!(builder.emulate(&frame)[0].outcome.is_emulated());
    }

    #[test]
    fn test_frame_json() {
        let json = r#"{
            "event": 7,
            "chambers": [
                {"id": {"endcap": 1, "station": 2, "sector": 1, "subsector": 0, "chamber": 4},
                 "digis": [{"layer": 0, "strip": 20, "comparator": 0, "time_bin": 5}]}
            ]
        }"#;
        let frame = TriggerFrame::from_json_str(json).unwrap();
        assert_eq!(frame.event, 7);
        assert_eq!(frame.chambers[0].id, A);
        assert!(frame.chambers[0].alcts.is_empty());
        let again = TriggerFrame::from_json_str(&frame.to_json_string().unwrap()).unwrap();
        assert_eq!(again, frame);
    }
}
