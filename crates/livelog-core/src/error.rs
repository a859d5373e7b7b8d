//! Error types for livelog-core.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LiveError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image encoding error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Chart rendering error: {0}")]
    Chart(String),

    /// `DVCLIVE_PATH` is set and disagrees with the path passed to the constructor.
    #[error("Live path `{explicit}` conflicts with DVCLIVE_PATH=`{env}`")]
    ConfigMismatch { explicit: PathBuf, env: PathBuf },

    #[error("Invalid value `{value}` for {var} (expected 0 or 1)")]
    InvalidEnvFlag { var: String, value: String },

    #[error("Invalid option: {0}")]
    InvalidOption(String),

    #[error("Data `{name}` has not supported type {observed}")]
    InvalidDataType { name: String, observed: String },

    #[error("Plot type `{0}` is not supported")]
    InvalidPlotType(String),
}

pub type Result<T> = std::result::Result<T, LiveError>;

impl LiveError {
    pub(crate) fn invalid_data(name: &str, observed: impl Into<String>) -> Self {
        LiveError::InvalidDataType {
            name: name.to_string(),
            observed: observed.into(),
        }
    }
}
