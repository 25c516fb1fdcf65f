// src/error.rs
use std::path::PathBuf;
use thiserror::Error;

/// Why a hand observation could not produce a control feature.
///
/// Never surfaced to the user: the session classifies these frames as
/// [`GestureEvent::None`](crate::gesture::GestureEvent::None) and holds the last value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtractError {
    #[error("insufficient landmark data: need {needed} points, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("motion region too small: {area:.0} px² < {min_area:.0} px²")]
    RegionTooSmall { area: f64, min_area: f64 },

    #[error("observation carries no region shape")]
    MissingShape,
}

/// No usable frame this cycle. The driver skips the tick and retries.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("frame source not available: {0}")]
    Unavailable(String),

    #[error("failed to capture frame: {0}")]
    Capture(String),

    #[error("malformed pose record on line {line}: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("pose stream I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("end of stream")]
    EndOfStream,
}

/// A brightness or volume backend rejected a value.
#[derive(Debug, Error)]
pub enum ActuatorError {
    #[error("{backend} backend unavailable: {reason}")]
    Unavailable { backend: &'static str, reason: String },

    #[error("{backend} command failed: {detail}")]
    CommandFailed { backend: &'static str, detail: String },

    #[error("failed to spawn {backend}: {source}")]
    Spawn {
        backend: &'static str,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}
