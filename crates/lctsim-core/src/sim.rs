//! Seeded frame generator: straight tracks through uniform chambers.
//!
//! Positions are in the staggered half-strip space, where layer `l` strip
//! `s` comparator `c` sits at `2s + c + stagger[l]`. A track crosses the key
//! layer at `half_strip` and moves `slope` half-strips per layer.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::alct::AnodeLct;
use crate::builder::{ChamberFrame, TriggerFrame};
use crate::digi::ComparatorDigi;
use crate::geometry::{ChamberId, ChamberLayout, StaticGeometry};
use crate::patterns::MODERN_KEY_LAYER;
use crate::pulse::NUM_LAYERS;

/// Half-strips kept clear at either chamber edge.
const EDGE_MARGIN: i32 = 8;
/// Wire groups in the simulated chambers.
const NUM_WIRE_GROUPS: u32 = 48;

/// Comparator digis of a straight track.
///
/// Layers where the track leaves the chamber get no digi.
pub fn straight_track_digis(layout: &ChamberLayout, half_strip: i32, slope: i32, time_bin: i32) -> Vec<ComparatorDigi> {
    let limit = 2 * layout.num_strips as i32;
    (0..NUM_LAYERS)
        .filter_map(|layer| {
            let hs = half_strip + slope * (layer as i32 - MODERN_KEY_LAYER as i32);
            let v = hs - layout.stagger[layer] as i32;
            (0..limit)
                .contains(&v)
                .then(|| ComparatorDigi::new(layer as u8, v / 2, v % 2, time_bin))
        })
        .collect()
}

/// Up to `n` distinct non-ME1/1 chamber ids, in ascending order.
pub fn chamber_ids(n: usize) -> Vec<ChamberId> {
    let mut ids = Vec::with_capacity(n);
    'outer: for endcap in 1..=2 {
        for station in 2..=4 {
            for sector in 1..=6 {
                for chamber in 1..=9 {
                    if ids.len() == n {
                        break 'outer;
                    }
                    ids.push(ChamberId::new(endcap, station, sector, 0, chamber));
                }
            }
        }
    }
    ids
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimParams {
    pub num_strips: usize,
    /// Chance that a chamber carries a track in a given frame.
    pub track_probability: f64,
    /// Largest absolute slope, in half-strips per layer.
    pub max_slope: i32,
    /// Earliest and latest track bins.
    pub min_bx: i32,
    pub max_bx: i32,
    /// Random digis added per chamber per frame.
    pub noise_hits: u32,
    /// Chance that a track also yields a matching ALCT.
    pub alct_efficiency: f64,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            num_strips: 80,
            track_probability: 0.5,
            max_slope: 1,
            min_bx: 3,
            max_bx: 8,
            noise_hits: 0,
            alct_efficiency: 0.9,
        }
    }
}

/// Generated track, for comparison with what the emulator finds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimTrack {
    pub id: ChamberId,
    pub half_strip: i32,
    pub slope: i32,
    pub bx: i32,
    pub has_alct: bool,
}

#[derive(Debug, Clone)]
pub struct SimulatedFrame {
    pub frame: TriggerFrame,
    pub tracks: Vec<SimTrack>,
}

pub struct TrackSimulator {
    rng: StdRng,
    params: SimParams,
    layout: ChamberLayout,
    chambers: Vec<ChamberId>,
    event: u64,
}

impl TrackSimulator {
    pub fn new(seed: u64, chambers: Vec<ChamberId>, params: SimParams) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            params,
            layout: ChamberLayout::standard(params.num_strips),
            chambers,
            event: 0,
        }
    }

    /// Geometry matching the simulated chambers.
    pub fn geometry(&self) -> StaticGeometry {
        StaticGeometry::uniform(&self.chambers, self.params.num_strips)
    }

    pub fn chambers(&self) -> &[ChamberId] {
        &self.chambers
    }

    pub fn next_frame(&mut self) -> SimulatedFrame {
        self.event += 1;
        let mut frame = TriggerFrame {
            event: self.event,
            chambers: Vec::with_capacity(self.chambers.len()),
        };
        let mut tracks = Vec::new();

        for i in 0..self.chambers.len() {
            let id = self.chambers[i];
            let mut input = ChamberFrame::new(id);
            if self.rng.random_bool(self.params.track_probability.clamp(0.0, 1.0)) {
                let track = self.track(id);
                input
                    .digis
                    .extend(straight_track_digis(&self.layout, track.half_strip, track.slope, track.bx));
                if track.has_alct {
                    let quality = self.rng.random_range(0..=3);
                    let kwg = self.rng.random_range(0..NUM_WIRE_GROUPS);
                    input.alcts.push(AnodeLct::new(quality, false, kwg, track.bx, 1));
                }
                tracks.push(track);
            }
            for _ in 0..self.params.noise_hits {
                let digi = self.noise_digi();
                input.digis.push(digi);
            }
            frame.chambers.push(input);
        }

        SimulatedFrame { frame, tracks }
    }

    fn track(&mut self, id: ChamberId) -> SimTrack {
        let p = &self.params;
        let top = (2 * p.num_strips as i32 - EDGE_MARGIN).max(EDGE_MARGIN + 1);
        let max_slope = p.max_slope.max(0);
        let (min_bx, max_bx) = (p.min_bx.min(p.max_bx), p.max_bx.max(p.min_bx));
        let alct_efficiency = p.alct_efficiency.clamp(0.0, 1.0);
        SimTrack {
            id,
            half_strip: self.rng.random_range(EDGE_MARGIN..top),
            slope: self.rng.random_range(-max_slope..=max_slope),
            bx: self.rng.random_range(min_bx..=max_bx),
            has_alct: self.rng.random_bool(alct_efficiency),
        }
    }

    fn noise_digi(&mut self) -> ComparatorDigi {
        ComparatorDigi::new(
            self.rng.random_range(0..NUM_LAYERS as u8),
            self.rng.random_range(0..self.params.num_strips as i32),
            self.rng.random_range(0..=1),
            self.rng.random_range(0..=self.params.max_bx.max(0)),
        )
    }
}
