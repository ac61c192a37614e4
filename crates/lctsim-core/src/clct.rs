//! The cathode LCT record.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Half-strips served by one cathode front-end board.
pub const HALF_STRIPS_PER_CFEB: u32 = 32;
/// Di-strips served by one cathode front-end board.
pub const DI_STRIPS_PER_CFEB: u32 = 8;

/// Position space a CLCT was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StripType {
    #[default]
    DiStrip = 0,
    HalfStrip = 1,
}

impl StripType {
    pub fn bit(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for StripType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DiStrip => write!(f, "D"),
            Self::HalfStrip => write!(f, "H"),
        }
    }
}

/// Cathode LCT. The default record is invalid and carries quality 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CathodeLct {
    pub valid: bool,
    /// Number of layers hit by the pattern.
    pub quality: u32,
    pub pattern: u8,
    pub strip_type: StripType,
    pub bend: u8,
    /// Key half-strip within the CFEB.
    pub key_strip: u32,
    pub cfeb: u32,
    pub bx: u32,
    /// 1 for the best CLCT of its bin, 2 for the second; 0 until assigned.
    pub track_number: u8,
}

impl CathodeLct {
    /// Encode a candidate found at `key` in the given position space.
    /// Di-strip keys are converted to half-strips first.
    pub fn new(quality: u32, pattern: u8, strip_type: StripType, bend: u8, key: u32, bx: u32) -> Self {
        let half_strip = match strip_type {
            StripType::HalfStrip => key,
            StripType::DiStrip => 4 * key,
        };
        Self {
            valid: true,
            quality,
            pattern,
            strip_type,
            bend,
            key_strip: half_strip % HALF_STRIPS_PER_CFEB,
            cfeb: half_strip / HALF_STRIPS_PER_CFEB,
            bx,
            track_number: 0,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Absolute key position in half-strip units.
    pub fn key_half_strip(&self) -> u32 {
        self.cfeb * HALF_STRIPS_PER_CFEB + self.key_strip
    }

    /// Sort rank of the legacy algorithm: 6/6H, 5/6H, 6/6D, 4/6H, 5/6D, 4/6D.
    pub fn rank(&self) -> u32 {
        match self.strip_type {
            StripType::HalfStrip => 2 * self.quality + 3,
            StripType::DiStrip => 2 * self.quality,
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

impl fmt::Display for CathodeLct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CLCT #{}: valid = {}, quality = {}, pattern = {}, type = {}, bend = {}, key half-strip = {} (cfeb {}, offset {}), bx = {}",
            self.track_number,
            self.valid as u8,
            self.quality,
            self.pattern,
            self.strip_type,
            if self.bend == 0 { 'L' } else { 'R' },
            self.key_half_strip(),
            self.cfeb,
            self.key_strip,
            self.bx
        )
    }
}
