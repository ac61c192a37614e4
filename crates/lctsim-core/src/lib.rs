//! # lctsim-core
//!
//! **Bit-level emulation of strip chamber trigger primitives.**
//!
//! `lctsim-core` turns the raw comparator hits of a cathode strip chamber
//! into cathode local charged tracks (CLCTs), matches them in time against
//! externally supplied anode LCTs (ALCTs) and encodes the correlated LCTs
//! with their 4-bit quality, the way the trigger motherboard firmware does.
//!
//! ## Quick Start
//!
//! ```no_run
//! use lctsim_core::{ChamberId, EmulatorConfig, StaticGeometry, TriggerBuilder, TriggerFrame};
//!
//! let id = ChamberId::new(1, 2, 1, 0, 4);
//! let geometry = StaticGeometry::uniform(&[id], 64);
//! let mut builder = TriggerBuilder::new(EmulatorConfig::default(), Box::new(geometry));
//!
//! let frame = TriggerFrame::from_json_file("frame.json".as_ref()).unwrap();
//! for result in builder.run_frame(&frame) {
//!     println!("{}: {} LCTs", result.id, result.lcts.len());
//! }
//! ```
//!
//! ## Architecture
//!
//! Digis → hit times → pulses → pretrigger → pattern scoring → key selection
//! → CLCTs → correlation with ALCTs → LCTs
//!
//! Two pattern-finding algorithms are supported:
//! - **Modern** (default, 2007 firmware): 11 half-strip patterns, busy-key
//!   exclusion around the best key, 2008 quality table.
//! - **Legacy**: 8 patterns searched in both half-strip and di-strip space,
//!   ranked by layer count and strip type, pre-2007 quality table.
//!
//! Each chamber is handled by a [`ChamberMotherboard`]; the
//! [`TriggerBuilder`] runs many of them in parallel.

pub mod alct;
pub mod builder;
pub mod clct;
pub mod config;
pub mod correlated;
pub mod digi;
pub mod error;
pub mod geometry;
pub mod motherboard;
pub mod patterns;
pub mod pretrigger;
pub mod processor;
pub mod pulse;
pub mod scorer;
pub mod selector;
pub mod sim;

pub use alct::{AlctSlots, AnodeLct};
pub use builder::{ChamberFrame, ChamberResult, Outcome, TriggerBuilder, TriggerFrame};
pub use clct::{CathodeLct, StripType};
pub use config::{Algorithm, ClctParams, ConfigSubstitution, EmulatorConfig, Preset, TmbParams};
pub use correlated::CorrelatedLct;
pub use digi::{ComparatorDigi, DigiReport};
pub use error::{LctError, Result};
pub use geometry::{ChamberId, ChamberLayout, GeometryService, StaticGeometry};
pub use motherboard::ChamberMotherboard;
pub use patterns::PatternLibrary;
pub use processor::{CathodeLctProcessor, ClctSlots};
pub use sim::{SimParams, SimTrack, TrackSimulator};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
