//! Error type for the geometry and loading paths.
//!
//! The per-frame pipeline itself never returns an error: malformed digis are
//! dropped one at a time, and a chamber that cannot be emulated becomes an
//! explicit [`Outcome::Skipped`](crate::builder::Outcome) carrying one of these.

use thiserror::Error;

use crate::geometry::ChamberId;

pub type Result<T> = std::result::Result<T, LctError>;

#[derive(Debug, Error)]
pub enum LctError {
    #[error("chamber {0} is not defined in the current geometry")]
    ChamberNotFound(ChamberId),
    #[error("chamber {id} reports {strips} strips, more than the {max} the readout supports")]
    GarbledGeometry {
        id: ChamberId,
        strips: usize,
        max: usize,
    },
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
