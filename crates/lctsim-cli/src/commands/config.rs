//! `lctsim config`: validate a configuration and print the parameter table.

use super::{load_config, print_substitutions};

pub fn run(config_path: Option<&str>, preset: &str) {
    let mut config = load_config(config_path, preset);
    let subs = config.validate();
    print_substitutions(&subs);
    print!("{}", config.dump());
}
