//! Emulator configuration: cathode processor parameters, motherboard
//! parameters, the algorithm selector, and named presets.
//!
//! Every parameter mirrors a register of the trigger hardware and has a
//! hardware maximum. [`EmulatorConfig::validate`] replaces each out-of-range
//! value with its default, logs the substitution at error level and returns
//! the list so callers can report it per instance.

use std::fmt;
use std::fmt::Write as _;
use std::path::Path;
use std::str::FromStr;

use log::error;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::geometry::MAX_NUM_STRIPS;

/// Key-selection algorithm, fixed for the lifetime of a processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    /// Half-strip and di-strip pattern search with 8 pattern ids.
    Legacy,
    /// 2007 firmware: half-strips only, 11 pattern ids, busy-key masking.
    #[default]
    Modern,
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Legacy => write!(f, "legacy"),
            Self::Modern => write!(f, "modern"),
        }
    }
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "legacy" => Ok(Self::Legacy),
            "modern" => Ok(Self::Modern),
            other => Err(format!("unknown algorithm '{other}' (expected legacy or modern)")),
        }
    }
}

/// Cathode LCT processor parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClctParams {
    /// Total number of time bins in the readout window.
    pub fifo_tbins: u32,
    /// Start of the cathode raw hits in the readout. Reported only.
    pub fifo_pretrig: u32,
    /// Width of a comparator one-shot, in bins.
    pub hit_persist: u32,
    /// Bins between pretrigger and latch.
    pub drift_delay: u32,
    pub nplanes_hit_pretrig: u32,
    pub nplanes_hit_pattern: u32,
    /// Lowest pattern id that may pretrigger. Modern algorithm only.
    pub pid_thresh_pretrig: u32,
    /// Half-strips masked on each side of the best key. Modern algorithm only.
    pub min_separation: u32,
}

impl Default for ClctParams {
    fn default() -> Self {
        Self {
            fifo_tbins: 12,
            fifo_pretrig: 7,
            hit_persist: 6,
            drift_delay: 2,
            nplanes_hit_pretrig: 2,
            nplanes_hit_pattern: 4,
            pid_thresh_pretrig: 2,
            min_separation: 10,
        }
    }
}

/// Motherboard (correlation) parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TmbParams {
    /// Drop LCTs from the ME1/a region of ME1/1 at readout.
    pub mpc_block_me1a: u32,
    /// Allow ALCT-only LCTs.
    pub alct_trig_enable: u32,
    /// Allow CLCT-only LCTs.
    pub clct_trig_enable: u32,
    /// Allow matched ALCT-CLCT LCTs.
    pub match_trig_enable: u32,
    /// Width of the ALCT search window around a CLCT, in bins. Odd.
    pub match_trig_window_size: u32,
}

impl Default for TmbParams {
    fn default() -> Self {
        Self {
            mpc_block_me1a: 1,
            alct_trig_enable: 0,
            clct_trig_enable: 0,
            match_trig_enable: 1,
            match_trig_window_size: 7,
        }
    }
}

impl TmbParams {
    pub fn mpc_block_me1a(&self) -> bool {
        self.mpc_block_me1a != 0
    }

    pub fn alct_trig_enabled(&self) -> bool {
        self.alct_trig_enable != 0
    }

    pub fn clct_trig_enabled(&self) -> bool {
        self.clct_trig_enable != 0
    }

    pub fn match_trig_enabled(&self) -> bool {
        self.match_trig_enable != 0
    }

    /// Half-width of the match window, `floor(W / 2)`.
    pub fn half_window(&self) -> i32 {
        (self.match_trig_window_size / 2) as i32
    }
}

/// Named parameter sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Preset {
    /// 2007 firmware with the production match window.
    #[default]
    Tmb07,
    /// Idealized pre-2007 algorithm used for early Monte Carlo studies.
    OldMc,
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tmb07 => write!(f, "tmb07"),
            Self::OldMc => write!(f, "old_mc"),
        }
    }
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "tmb07" => Ok(Self::Tmb07),
            "old_mc" | "oldmc" => Ok(Self::OldMc),
            other => Err(format!("unknown preset '{other}' (expected tmb07 or old_mc)")),
        }
    }
}

/// One parameter replaced by its default during validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigSubstitution {
    pub parameter: &'static str,
    pub value: u32,
    /// Largest allowed value.
    pub max_allowed: u32,
    pub default: u32,
}

impl fmt::Display for ConfigSubstitution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "value of {}, {}, exceeds max allowed, {}; proceeding with the default value, {}",
            self.parameter, self.value, self.max_allowed, self.default
        )
    }
}

/// Full emulator configuration. Defaults to the `tmb07` preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmulatorConfig {
    pub algorithm: Algorithm,
    pub clct: ClctParams,
    pub tmb: TmbParams,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self::preset(Preset::Tmb07)
    }
}

impl EmulatorConfig {
    pub fn preset(preset: Preset) -> Self {
        match preset {
            Preset::Tmb07 => Self {
                algorithm: Algorithm::Modern,
                clct: ClctParams::default(),
                tmb: TmbParams {
                    match_trig_window_size: 3,
                    ..TmbParams::default()
                },
            },
            Preset::OldMc => Self {
                algorithm: Algorithm::Legacy,
                clct: ClctParams::default(),
                tmb: TmbParams {
                    match_trig_window_size: 3,
                    ..TmbParams::default()
                },
            },
        }
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Clamp every parameter into its hardware range.
    ///
    /// Values at or above a parameter's limit fall back to the default. An
    /// even match window also falls back, since the window is centred on the
    /// CLCT bin.
    pub fn validate(&mut self) -> Vec<ConfigSubstitution> {
        let mut subs = Vec::new();
        let clct_defaults = ClctParams::default();
        let tmb_defaults = TmbParams::default();

        let c = &mut self.clct;
        check(&mut subs, "fifo_tbins", &mut c.fifo_tbins, 1 << 5, clct_defaults.fifo_tbins);
        check(&mut subs, "fifo_pretrig", &mut c.fifo_pretrig, 1 << 5, clct_defaults.fifo_pretrig);
        check(&mut subs, "hit_persist", &mut c.hit_persist, 1 << 4, clct_defaults.hit_persist);
        check(&mut subs, "drift_delay", &mut c.drift_delay, 1 << 2, clct_defaults.drift_delay);
        check(
            &mut subs,
            "nplanes_hit_pretrig",
            &mut c.nplanes_hit_pretrig,
            1 << 3,
            clct_defaults.nplanes_hit_pretrig,
        );
        check(
            &mut subs,
            "nplanes_hit_pattern",
            &mut c.nplanes_hit_pattern,
            1 << 3,
            clct_defaults.nplanes_hit_pattern,
        );
        check(
            &mut subs,
            "pid_thresh_pretrig",
            &mut c.pid_thresh_pretrig,
            1 << 4,
            clct_defaults.pid_thresh_pretrig,
        );
        check(
            &mut subs,
            "min_separation",
            &mut c.min_separation,
            (2 * MAX_NUM_STRIPS) as u32,
            clct_defaults.min_separation,
        );

        let t = &mut self.tmb;
        check(&mut subs, "mpc_block_me1a", &mut t.mpc_block_me1a, 1 << 1, tmb_defaults.mpc_block_me1a);
        check(&mut subs, "alct_trig_enable", &mut t.alct_trig_enable, 1 << 1, tmb_defaults.alct_trig_enable);
        check(&mut subs, "clct_trig_enable", &mut t.clct_trig_enable, 1 << 1, tmb_defaults.clct_trig_enable);
        check(
            &mut subs,
            "match_trig_enable",
            &mut t.match_trig_enable,
            1 << 1,
            tmb_defaults.match_trig_enable,
        );
        check(
            &mut subs,
            "match_trig_window_size",
            &mut t.match_trig_window_size,
            1 << 4,
            tmb_defaults.match_trig_window_size,
        );
        if t.match_trig_window_size % 2 == 0 {
            error!(
                "match_trig_window_size, {}, is even; proceeding with the default value, {}",
                t.match_trig_window_size, tmb_defaults.match_trig_window_size
            );
            subs.push(ConfigSubstitution {
                parameter: "match_trig_window_size",
                value: t.match_trig_window_size,
                max_allowed: (1 << 4) - 1,
                default: tmb_defaults.match_trig_window_size,
            });
            t.match_trig_window_size = tmb_defaults.match_trig_window_size;
        }

        subs
    }

    /// Human-readable parameter table.
    pub fn dump(&self) -> String {
        let c = &self.clct;
        let t = &self.tmb;
        let rule = "+".repeat(68);
        let mut out = String::new();
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "+ CLCT configuration parameters ({} algorithm)", self.algorithm);
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, " fifo_tbins   [total number of time bins in DAQ readout] = {}", c.fifo_tbins);
        let _ = writeln!(out, " fifo_pretrig [start time of cathode raw hits in DAQ readout] = {}", c.fifo_pretrig);
        let _ = writeln!(out, " hit_persist  [duration of signal pulse, in 25 ns bins] = {}", c.hit_persist);
        let _ = writeln!(out, " drift_delay  [time after pre-trigger before TMB latches LCTs] = {}", c.drift_delay);
        let _ = writeln!(out, " nplanes_hit_pretrig [min. number of layers hit for pre-trigger] = {}", c.nplanes_hit_pretrig);
        let _ = writeln!(out, " nplanes_hit_pattern [min. number of layers hit for trigger] = {}", c.nplanes_hit_pattern);
        if self.algorithm == Algorithm::Modern {
            let _ = writeln!(out, " pid_thresh_pretrig [lower threshold on pattern id] = {}", c.pid_thresh_pretrig);
            let _ = writeln!(out, " min_separation     [region of busy key strips] = {}", c.min_separation);
        }
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "+ TMB configuration parameters");
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, " mpc_block_me1a [block/not block triggers which come from ME1/A] = {}", t.mpc_block_me1a);
        let _ = writeln!(out, " alct_trig_enable [allow ALCT-only triggers] = {}", t.alct_trig_enable);
        let _ = writeln!(out, " clct_trig_enable [allow CLCT-only triggers] = {}", t.clct_trig_enable);
        let _ = writeln!(out, " match_trig_enable [allow matched ALCT-CLCT triggers] = {}", t.match_trig_enable);
        let _ = writeln!(out, " match_trig_window_size [ALCT-CLCT match window width] = {}", t.match_trig_window_size);
        let _ = write!(out, "{rule}");
        out
    }
}

fn check(subs: &mut Vec<ConfigSubstitution>, parameter: &'static str, value: &mut u32, limit: u32, default: u32) {
    if *value < limit {
        return;
    }
    let sub = ConfigSubstitution {
        parameter,
        value: *value,
        max_allowed: limit - 1,
        default,
    };
    error!("{sub}");
    *value = default;
    subs.push(sub);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let mut cfg = EmulatorConfig::default();
        assert!(cfg.validate().is_empty());
        let mut cfg = EmulatorConfig::preset(Preset::OldMc);
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn test_out_of_range_values_fall_back_to_defaults() {
        let mut cfg = EmulatorConfig::default();
        cfg.clct.fifo_tbins = 32;
        cfg.clct.hit_persist = 16;
        cfg.clct.drift_delay = 3;
        cfg.clct.min_separation = 160;
        cfg.tmb.match_trig_enable = 2;
        let subs = cfg.validate();
        let names: Vec<_> = subs.iter().map(|s| s.parameter).collect();
        assert_eq!(names, ["fifo_tbins", "hit_persist", "min_separation", "match_trig_enable"]);
        assert_eq!(cfg.clct.fifo_tbins, 12);
        assert_eq!(cfg.clct.hit_persist, 6);
        assert_eq!(cfg.clct.drift_delay, 3);
        assert_eq!(cfg.clct.min_separation, 10);
        assert_eq!(cfg.tmb.match_trig_enable, 1);
        assert_eq!(subs[0].max_allowed, 31);
        assert_eq!(subs[2].max_allowed, 159);
    }

    #[test]
    fn test_min_separation_limit_is_half_strip_count() {
        let mut cfg = EmulatorConfig::default();
        cfg.clct.min_separation = 159;
        assert!(cfg.validate().is_empty());
        assert_eq!(cfg.clct.min_separation, 159);

        cfg.clct.min_separation = 160;
        let subs = cfg.validate();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].parameter, "min_separation");
        assert_eq!(cfg.clct.min_separation, 10);
    }

    #[test]
    fn test_even_window_falls_back() {
        let mut cfg = EmulatorConfig::default();
        cfg.tmb.match_trig_window_size = 4;
        let subs = cfg.validate();
        assert_eq!(subs.len(), 1);
        assert_eq!(cfg.tmb.match_trig_window_size, 7);
        assert_eq!(cfg.tmb.half_window(), 3);
    }

    #[test]
    fn test_presets() {
        let modern = EmulatorConfig::preset(Preset::Tmb07);
        assert_eq!(modern.algorithm, Algorithm::Modern);
        assert_eq!(modern.tmb.match_trig_window_size, 3);
        assert_eq!(modern.clct, ClctParams::default());
        let legacy = EmulatorConfig::preset(Preset::OldMc);
        assert_eq!(legacy.algorithm, Algorithm::Legacy);
        assert_eq!("old_mc".parse::<Preset>().unwrap(), Preset::OldMc);
        assert!("mtcc".parse::<Preset>().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let cfg = EmulatorConfig::from_json_str(r#"{"algorithm":"legacy","clct":{"drift_delay":1}}"#).unwrap();
        assert_eq!(cfg.algorithm, Algorithm::Legacy);
        assert_eq!(cfg.clct.drift_delay, 1);
        assert_eq!(cfg.clct.hit_persist, 6);
        assert_eq!(cfg.tmb.match_trig_window_size, 3);
    }

    #[test]
    fn test_dump_mentions_every_parameter() {
        let dump = EmulatorConfig::default().dump();
        for name in ["fifo_tbins", "hit_persist", "min_separation", "match_trig_window_size"] {
            assert!(dump.contains(name), "missing {name}");
        }
        let legacy = EmulatorConfig::preset(Preset::OldMc).dump();
        assert!(!legacy.contains("min_separation"));
    }
}
