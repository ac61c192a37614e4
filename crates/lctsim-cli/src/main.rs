//! CLI for lctsim: trigger primitive emulation for cathode strip chambers.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "lctsim")]
#[command(about = "lctsim: emulate cathode LCTs and anode/cathode correlation for strip chambers")]
#[command(version = lctsim_core::VERSION)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Emulate every chamber of a recorded frame and print CLCTs and LCTs
    Run {
        /// Frame file (JSON): event number plus per-chamber digis and ALCTs
        #[arg(long)]
        frame: String,

        /// Configuration file (JSON). Overrides --preset.
        #[arg(long)]
        config: Option<String>,

        /// Geometry file (JSON). Defaults to 80-strip chambers for every chamber in the frame.
        #[arg(long)]
        geometry: Option<String>,

        /// Parameter preset
        #[arg(long, default_value = "tmb07", value_parser = ["tmb07", "old_mc"])]
        preset: String,

        /// Write results as JSON to this path
        #[arg(long)]
        output: Option<String>,

        /// Report LCTs from every bin, not just the readout bin
        #[arg(long)]
        all_bins: bool,
    },

    /// Print the pattern template library
    Patterns {
        /// Pattern family
        #[arg(long, default_value = "modern", value_parser = ["modern", "legacy"])]
        family: String,
    },

    /// Validate a configuration and print the parameter table
    Config {
        /// Configuration file (JSON). Overrides --preset.
        #[arg(long)]
        config: Option<String>,

        /// Parameter preset
        #[arg(long, default_value = "tmb07", value_parser = ["tmb07", "old_mc"])]
        preset: String,
    },

    /// Generate random straight tracks and summarize what the emulator finds
    Simulate {
        /// Number of chambers
        #[arg(long, default_value = "36")]
        chambers: usize,

        /// RNG seed
        #[arg(long, default_value = "1")]
        seed: u64,

        /// Number of frames
        #[arg(long, default_value = "100")]
        frames: usize,

        /// Random noise digis per chamber per frame
        #[arg(long, default_value = "0")]
        noise: u32,

        /// Parameter preset
        #[arg(long, default_value = "tmb07", value_parser = ["tmb07", "old_mc"])]
        preset: String,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Run {
            frame,
            config,
            geometry,
            preset,
            output,
            all_bins,
        } => commands::run::run(commands::run::RunCommandConfig {
            frame_path: &frame,
            config_path: config.as_deref(),
            geometry_path: geometry.as_deref(),
            preset: &preset,
            output_path: output.as_deref(),
            all_bins,
        }),
        Commands::Patterns { family } => commands::patterns::run(&family),
        Commands::Config { config, preset } => commands::config::run(config.as_deref(), &preset),
        Commands::Simulate {
            chambers,
            seed,
            frames,
            noise,
            preset,
        } => commands::simulate::run(chambers, seed, frames, noise, &preset),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}
