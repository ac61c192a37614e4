pub mod config;
pub mod patterns;
pub mod run;
pub mod simulate;

use std::path::Path;

use lctsim_core::{EmulatorConfig, Preset};

/// Load the configuration from `config_path` if given, else the named preset.
/// Exits on failure.
pub fn load_config(config_path: Option<&str>, preset: &str) -> EmulatorConfig {
    if let Some(path) = config_path {
        return EmulatorConfig::from_json_file(Path::new(path)).unwrap_or_else(|e| {
            eprintln!("Failed to load config {path}: {e}");
            std::process::exit(1);
        });
    }
    match preset.parse::<Preset>() {
        Ok(p) => EmulatorConfig::preset(p),
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}

/// Print validation substitutions, if any.
pub fn print_substitutions(subs: &[lctsim_core::ConfigSubstitution]) {
    if subs.is_empty() {
        return;
    }
    println!("Configuration substitutions ({}):", subs.len());
    for sub in subs {
        println!("  {sub}");
    }
    println!();
}
