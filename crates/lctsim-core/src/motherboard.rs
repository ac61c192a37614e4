//! Trigger motherboard: matches the cathode LCTs of one chamber against the
//! externally supplied anode LCTs and builds correlated LCTs.
//!
//! For every bin holding a valid CLCT the motherboard looks for the earliest
//! valid ALCT within `±match_trig_window_size / 2` bins. Bins without a CLCT
//! can still produce an ALCT-only LCT from the ALCT sitting half a window
//! earlier, provided that ALCT lies past the last matched one. Which
//! combinations become LCTs is governed by the three trigger enables.

use log::{debug, warn};

use crate::alct::{AlctSlots, AnodeLct};
use crate::clct::CathodeLct;
use crate::config::{ConfigSubstitution, EmulatorConfig};
use crate::correlated::CorrelatedLct;
use crate::digi::ComparatorDigi;
use crate::error::Result;
use crate::geometry::{ChamberId, GeometryService};
use crate::processor::{CathodeLctProcessor, ClctSlots};
use crate::pulse::MAX_LCT_BINS;

/// Key half-strips above this are on ME1/a.
const ME1A_FIRST_HALF_STRIP: u32 = 128;

pub struct ChamberMotherboard {
    id: ChamberId,
    config: EmulatorConfig,
    substitutions: Vec<ConfigSubstitution>,
    clct: CathodeLctProcessor,
    first: [CorrelatedLct; MAX_LCT_BINS],
    second: [CorrelatedLct; MAX_LCT_BINS],
}

impl ChamberMotherboard {
    /// Build a motherboard. Out-of-range parameters are replaced by their
    /// defaults; the substitutions made are kept for inspection.
    pub fn new(id: ChamberId, mut config: EmulatorConfig) -> Self {
        let substitutions = config.validate();
        let clct = CathodeLctProcessor::new(id, &config);
        Self {
            id,
            config,
            substitutions,
            clct,
            first: [CorrelatedLct::default(); MAX_LCT_BINS],
            second: [CorrelatedLct::default(); MAX_LCT_BINS],
        }
    }

    pub fn id(&self) -> ChamberId {
        self.id
    }

    pub fn config(&self) -> &EmulatorConfig {
        &self.config
    }

    pub fn substitutions(&self) -> &[ConfigSubstitution] {
        &self.substitutions
    }

    pub fn processor(&self) -> &CathodeLctProcessor {
        &self.clct
    }

    pub fn clear(&mut self) {
        self.clct.clear();
        self.first = [CorrelatedLct::default(); MAX_LCT_BINS];
        self.second = [CorrelatedLct::default(); MAX_LCT_BINS];
    }

    /// Run one frame and return the LCTs sent to readout.
    pub fn run(
        &mut self,
        geometry: &dyn GeometryService,
        digis: &[ComparatorDigi],
        alcts: &[AnodeLct],
    ) -> Result<Vec<CorrelatedLct>> {
        self.clear();
        self.clct.run(geometry, digis)?;
        let alcts = AlctSlots::from_records(alcts);
        let clcts = self.clct.slots().clone();
        self.correlate_slots(&alcts, &clcts);
        Ok(self.readout_lcts())
    }

    /// Correlate pre-filled ALCT and CLCT slots.
    pub fn correlate_slots(&mut self, alcts: &AlctSlots, clcts: &ClctSlots) {
        let half_window = self.config.tmb.half_window();
        let mut bx_alct_matched = 0;

        for bx_clct in 0..MAX_LCT_BINS as i32 {
            if clcts.best(bx_clct).is_valid() {
                let window = (bx_clct - half_window)..=(bx_clct + half_window);
                let matched = window
                    .filter(|bx| (0..MAX_LCT_BINS as i32).contains(bx))
                    .find(|&bx| alcts.best(bx).is_valid());
                let bx_alct = match matched {
                    Some(bx) => {
                        debug!("{}: ALCT at bx {bx} matched to CLCT at bx {bx_clct}", self.id);
                        bx_alct_matched = bx;
                        bx
                    }
                    None => bx_clct,
                };
                self.correlate(
                    alcts.best(bx_alct),
                    alcts.second(bx_alct),
                    clcts.best(bx_clct),
                    clcts.second(bx_clct),
                );
            } else {
                let bx_alct = bx_clct - half_window;
                if bx_alct >= 0 && bx_alct > bx_alct_matched && alcts.best(bx_alct).is_valid() {
                    self.correlate(
                        alcts.best(bx_alct),
                        alcts.second(bx_alct),
                        clcts.best(bx_clct),
                        clcts.second(bx_clct),
                    );
                }
            }
        }

        for lct in self.all_lcts() {
            debug!("{lct} found in {}", self.id);
        }
    }

    /// Build up to two LCTs from one ALCT pair and one CLCT pair.
    ///
    /// A missing best or second record is filled in from its partner, so
    /// a single valid record on each side yields one LCT, not two.
    pub fn correlate(
        &mut self,
        mut best_alct: AnodeLct,
        mut second_alct: AnodeLct,
        mut best_clct: CathodeLct,
        mut second_clct: CathodeLct,
    ) {
        fill_missing(&mut best_alct, &mut second_alct, AnodeLct::is_valid);
        fill_missing(&mut best_clct, &mut second_clct, CathodeLct::is_valid);

        if self.triggers(&best_alct, &best_clct) {
            self.store(&best_alct, &best_clct, 1);
        }
        if (second_alct != best_alct || second_clct != best_clct) && self.triggers(&second_alct, &second_clct) {
            self.store(&second_alct, &second_clct, 2);
        }
    }

    fn triggers(&self, alct: &AnodeLct, clct: &CathodeLct) -> bool {
        let tmb = &self.config.tmb;
        (tmb.alct_trig_enabled() && alct.is_valid())
            || (tmb.clct_trig_enabled() && clct.is_valid())
            || (tmb.match_trig_enabled() && alct.is_valid() && clct.is_valid())
    }

    fn store(&mut self, alct: &AnodeLct, clct: &CathodeLct, track_number: u8) {
        let mut lct = CorrelatedLct::build(self.config.algorithm, alct, clct, self.id.chamber);
        lct.track_number = track_number;
        let Some(bx) = usize::try_from(lct.bx).ok().filter(|&bx| bx < MAX_LCT_BINS) else {
            warn!("bx of {lct} is not within the allowed range, [0-{MAX_LCT_BINS}); skipping it");
            return;
        };
        match track_number {
            1 => self.first[bx] = lct,
            _ => self.second[bx] = lct,
        }
    }

    /// Every valid LCT, in bin order with the first LCT of a bin before
    /// the second.
    pub fn all_lcts(&self) -> Vec<CorrelatedLct> {
        self.first
            .iter()
            .zip(&self.second)
            .flat_map(|(f, s)| [*f, *s])
            .filter(CorrelatedLct::is_valid)
            .collect()
    }

    /// LCTs sent to readout: those of the earliest bin holding any.
    ///
    /// With `mpc_block_me1a` set, ME1/1 LCTs on ME1/a strips are dropped
    /// and do not count towards choosing the bin.
    pub fn readout_lcts(&self) -> Vec<CorrelatedLct> {
        let block_me1a = self.config.tmb.mpc_block_me1a() && self.id.is_me11();
        for (first, second) in self.first.iter().zip(&self.second) {
            let bin: Vec<CorrelatedLct> = [*first, *second]
                .into_iter()
                .filter(CorrelatedLct::is_valid)
                .filter(|lct| !(block_me1a && lct.key_half_strip >= ME1A_FIRST_HALF_STRIP))
                .collect();
            if !bin.is_empty() {
                return bin;
            }
        }
        Vec::new()
    }
}

fn fill_missing<T: Copy>(best: &mut T, second: &mut T, is_valid: fn(&T) -> bool) {
    match (is_valid(best), is_valid(second)) {
        (true, false) => *second = *best,
        (false, true) => *best = *second,
        _ => {}
    }
}
