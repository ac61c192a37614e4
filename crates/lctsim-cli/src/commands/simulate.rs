//! `lctsim simulate`: random straight tracks through the parallel builder.

use std::time::Instant;

use lctsim_core::patterns::MODERN_KEY_LAYER;
use lctsim_core::sim::chamber_ids;
use lctsim_core::{Algorithm, ChamberLayout, SimParams, TrackSimulator, TriggerBuilder};

use super::{load_config, print_substitutions};

/// A found LCT counts as the track if its key is this close.
const KEY_TOLERANCE: i32 = 2;

pub fn run(chambers: usize, seed: u64, frames: usize, noise: u32, preset: &str) {
    let config = load_config(None, preset);
    let ids = chamber_ids(chambers);
    if ids.len() < chambers {
        eprintln!("Warning: only {} distinct chambers available; using all of them", ids.len());
    }
    let params = SimParams {
        noise_hits: noise,
        ..SimParams::default()
    };
    let mut sim = TrackSimulator::new(seed, ids, params);
    let mut builder = TriggerBuilder::new(config, Box::new(sim.geometry()));
    print_substitutions(builder.substitutions());

    // Modern keys are reported relative to the key layer's stagger.
    let key_shift = match builder.config().algorithm {
        Algorithm::Modern => ChamberLayout::standard(params.num_strips).stagger[MODERN_KEY_LAYER] as i32,
        Algorithm::Legacy => 0,
    };

    let mut tracks = 0usize;
    let mut found = 0usize;
    let mut with_alct = 0usize;
    let mut clct_count = 0usize;
    let mut lct_count = 0usize;
    let mut quality_hist = [0usize; 16];
    let t0 = Instant::now();

    for _ in 0..frames {
        let simulated = sim.next_frame();
        let results = builder.run_frame(&simulated.frame);
        for result in &results {
            clct_count += result.clcts.len();
            lct_count += result.lcts.len();
            for lct in &result.lcts {
                quality_hist[lct.quality as usize & 15] += 1;
            }
        }
        for track in &simulated.tracks {
            tracks += 1;
            if track.has_alct {
                with_alct += 1;
            }
            let Some(result) = results.iter().find(|r| r.id == track.id) else {
                continue;
            };
            let hit = result
                .clcts
                .iter()
                .any(|c| (c.key_half_strip() as i32 - (track.half_strip - key_shift)).abs() <= KEY_TOLERANCE);
            if hit {
                found += 1;
            }
        }
    }
    let elapsed = t0.elapsed();

    println!(
        "Simulated {frames} frame(s) over {} chamber(s), seed {seed}, {} algorithm",
        builder.chamber_count(),
        builder.config().algorithm
    );
    println!("  tracks:        {tracks} ({with_alct} with ALCT)");
    println!("  CLCTs:         {clct_count}");
    println!("  LCTs:          {lct_count}");
    if tracks > 0 {
        println!(
            "  efficiency:    {:.1}% of tracks have a CLCT within {KEY_TOLERANCE} half-strips",
            100.0 * found as f64 / tracks as f64
        );
    }
    println!("  time:          {:.3}s", elapsed.as_secs_f64());
    println!();
    println!("  LCT quality distribution:");
    for (q, n) in quality_hist.iter().enumerate().filter(|(_, n)| **n > 0) {
        println!("    {q:>2}: {n}");
    }
}
