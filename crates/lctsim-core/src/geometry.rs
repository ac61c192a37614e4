//! Chamber identifiers, per-chamber strip layout, and the geometry service seam.
//!
//! Detector geometry itself is computed elsewhere. The emulator only needs
//! two facts per chamber: how many strips a layer has and whether each
//! layer's half-strips are staggered by one. Both are fetched once per
//! chamber processor through [`GeometryService`] and cached.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{LctError, Result};
use crate::pulse::NUM_LAYERS;

/// Maximum number of cathode strips a single chamber layer can present to the
/// trigger electronics.
pub const MAX_NUM_STRIPS: usize = 80;

/// Trigger labels of one chamber.
///
/// `chamber` is the trigger CSC id within the (sub)sector, 1..=9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChamberId {
    pub endcap: u8,
    pub station: u8,
    pub sector: u8,
    pub subsector: u8,
    pub chamber: u8,
}

impl ChamberId {
    pub const fn new(endcap: u8, station: u8, sector: u8, subsector: u8, chamber: u8) -> Self {
        Self {
            endcap,
            station,
            sector,
            subsector,
            chamber,
        }
    }

    /// Ring number derived from station and trigger CSC id.
    pub fn ring(&self) -> u8 {
        if self.station == 1 {
            match self.chamber {
                1..=3 => 1,
                4..=6 => 2,
                _ => 3,
            }
        } else if self.chamber <= 3 {
            1
        } else {
            2
        }
    }

    /// ME1/1 chambers carry the ganged ME1/a strips above the regular ones.
    pub fn is_me11(&self) -> bool {
        self.station == 1 && self.ring() == 1
    }
}

impl fmt::Display for ChamberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ME{}{}/{} (sector {} subsector {} trig id. {})",
            if self.endcap == 1 { "+" } else { "-" },
            self.station,
            self.ring(),
            self.sector,
            self.subsector,
            self.chamber
        )
    }
}

/// Strip count and per-layer half-strip stagger of one chamber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChamberLayout {
    pub num_strips: usize,
    /// 1 if the layer's half-strips are shifted up by one, else 0.
    pub stagger: [u8; NUM_LAYERS],
}

impl ChamberLayout {
    /// Layout with the standard alternating stagger: layers 0, 2, 4 shifted.
    pub fn standard(num_strips: usize) -> Self {
        let mut stagger = [0u8; NUM_LAYERS];
        for (i, s) in stagger.iter_mut().enumerate() {
            *s = if (i + 1) % 2 == 0 { 0 } else { 1 };
        }
        Self {
            num_strips,
            stagger,
        }
    }

    /// Number of half-strip positions, including the slot opened by stagger.
    pub fn num_half_strips(&self) -> usize {
        2 * self.num_strips + 1
    }

    /// Number of di-strip positions, including the slot opened by stagger.
    pub fn num_di_strips(&self) -> usize {
        self.num_strips / 2 + 1
    }
}

/// Source of chamber layouts.
pub trait GeometryService: Send + Sync {
    /// Layout of the chamber, or `None` when it is absent from the geometry.
    fn chamber(&self, id: &ChamberId) -> Option<ChamberLayout>;
}

/// Look up a chamber and apply the readout conventions to what the geometry
/// reports.
///
/// ME1/1 is read out as 80 strips regardless of the geometry's own count,
/// because ME1/a arrives as strips 65-80. Anything wider than
/// [`MAX_NUM_STRIPS`] cannot be emulated.
pub fn resolve_layout(geometry: &dyn GeometryService, id: &ChamberId) -> Result<ChamberLayout> {
    let mut layout = geometry
        .chamber(id)
        .ok_or(LctError::ChamberNotFound(*id))?;
    if id.is_me11() {
        layout.num_strips = MAX_NUM_STRIPS;
    }
    if layout.num_strips > MAX_NUM_STRIPS {
        return Err(LctError::GarbledGeometry {
            id: *id,
            strips: layout.num_strips,
            max: MAX_NUM_STRIPS,
        });
    }
    Ok(layout)
}

/// Map-backed geometry, loadable from JSON.
#[derive(Debug, Clone, Default)]
pub struct StaticGeometry {
    chambers: HashMap<ChamberId, ChamberLayout>,
}

#[derive(Serialize, Deserialize)]
struct GeometryEntry {
    id: ChamberId,
    #[serde(flatten)]
    layout: ChamberLayout,
}

impl StaticGeometry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every listed chamber gets the standard layout with `num_strips` strips.
    pub fn uniform(ids: &[ChamberId], num_strips: usize) -> Self {
        let mut geometry = Self::new();
        for id in ids {
            geometry.insert(*id, ChamberLayout::standard(num_strips));
        }
        geometry
    }

    pub fn insert(&mut self, id: ChamberId, layout: ChamberLayout) {
        self.chambers.insert(id, layout);
    }

    pub fn len(&self) -> usize {
        self.chambers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chambers.is_empty()
    }

    /// Chamber ids in ascending order.
    pub fn ids(&self) -> Vec<ChamberId> {
        let mut ids: Vec<_> = self.chambers.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let entries: Vec<GeometryEntry> = serde_json::from_str(s)?;
        let mut geometry = Self::new();
        for e in entries {
            geometry.insert(e.id, e.layout);
        }
        Ok(geometry)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> Result<String> {
        let entries: Vec<GeometryEntry> = self
            .ids()
            .into_iter()
            .map(|id| GeometryEntry {
                id,
                layout: self.chambers[&id],
            })
            .collect();
        Ok(serde_json::to_string_pretty(&entries)?)
    }
}

impl GeometryService for StaticGeometry {
    fn chamber(&self, id: &ChamberId) -> Option<ChamberLayout> {
        self.chambers.get(id).copied()
    }
}
