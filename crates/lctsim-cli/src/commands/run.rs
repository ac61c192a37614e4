//! `lctsim run`: emulate every chamber of a recorded frame.

use std::path::Path;

use lctsim_core::geometry::MAX_NUM_STRIPS;
use lctsim_core::{ChamberResult, StaticGeometry, TriggerBuilder, TriggerFrame};
use log::debug;

use super::{load_config, print_substitutions};

pub struct RunCommandConfig<'a> {
    pub frame_path: &'a str,
    pub config_path: Option<&'a str>,
    pub geometry_path: Option<&'a str>,
    pub preset: &'a str,
    pub output_path: Option<&'a str>,
    pub all_bins: bool,
}

pub fn run(cfg: RunCommandConfig<'_>) {
    let frame = TriggerFrame::from_json_file(Path::new(cfg.frame_path)).unwrap_or_else(|e| {
        eprintln!("Failed to load frame {}: {e}", cfg.frame_path);
        std::process::exit(1);
    });
    debug!("loaded event {} with {} chamber(s) from {}", frame.event, frame.chambers.len(), cfg.frame_path);
    let geometry = match cfg.geometry_path {
        Some(path) => StaticGeometry::from_json_file(Path::new(path)).unwrap_or_else(|e| {
            eprintln!("Failed to load geometry {path}: {e}");
            std::process::exit(1);
        }),
        None => {
            let ids: Vec<_> = frame.chambers.iter().map(|c| c.id).collect();
            StaticGeometry::uniform(&ids, MAX_NUM_STRIPS)
        }
    };
    let config = load_config(cfg.config_path, cfg.preset);

    let mut builder = TriggerBuilder::new(config, Box::new(geometry)).with_all_bins(cfg.all_bins);
    print_substitutions(builder.substitutions());
    let results = builder.run_frame(&frame);

    println!(
        "Event {}: {} chamber(s), {} algorithm\n",
        frame.event,
        results.len(),
        builder.config().algorithm
    );
    for result in &results {
        print_result(result);
    }

    let emulated = results.iter().filter(|r| r.outcome.is_emulated()).count();
    let lcts: usize = results.iter().map(|r| r.lcts.len()).sum();
    println!("{emulated}/{} chambers emulated, {lcts} LCT(s)", results.len());

    if let Some(path) = cfg.output_path {
        write_json(path, frame.event, &results);
    }
}

fn print_result(result: &ChamberResult) {
    match result.outcome.reason() {
        Some(reason) => println!("{}  [{}] {reason}", result.id, result.outcome.label()),
        None => println!("{}", result.id),
    }
    for clct in &result.clcts {
        println!("    {clct}");
    }
    for lct in &result.lcts {
        println!("    {lct}");
    }
    if result.outcome.is_emulated() && result.clcts.is_empty() && result.lcts.is_empty() {
        println!("    (nothing found)");
    }
}

fn write_json(path: &str, event: u64, results: &[ChamberResult]) {
    let chambers: Vec<_> = results
        .iter()
        .map(|r| {
            serde_json::json!({
                "id": r.id,
                "outcome": r.outcome.label(),
                "reason": r.outcome.reason(),
                "clcts": r.clcts,
                "lcts": r.lcts,
            })
        })
        .collect();
    let doc = serde_json::json!({ "event": event, "chambers": chambers });
    match serde_json::to_string_pretty(&doc) {
        Ok(json) => match std::fs::write(path, json) {
            Ok(()) => println!("Results written to {path}"),
            Err(e) => {
                eprintln!("Failed to write {path}: {e}");
                std::process::exit(1);
            }
        },
        Err(e) => {
            eprintln!("Failed to serialize results: {e}");
            std::process::exit(1);
        }
    }
}
