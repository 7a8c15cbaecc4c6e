use thiserror::Error;
use std::io;
use std::path::PathBuf;

/// Error types for band extraction and chromatogram analysis
#[derive(Error, Debug)]
pub enum ChromaError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to load configuration from {path}: {source}")]
    ConfigLoad {
        source: toml::de::Error,
        path: PathBuf,
    },

    #[error("Profile extraction failed: {0}")]
    Extraction(String),

    #[error("Inconsistent profile: {0}")]
    InvalidProfile(String),

    #[error("Filter error: {0}")]
    Filter(String),

    #[error("Peak fit failed: {0}")]
    Fit(String),

    #[error("Invalid index range {start}..={end} for a profile of {len} samples")]
    InvalidRange {
        start: usize,
        end: usize,
        len: usize,
    },

    #[error("CSV output error: {0}")]
    CsvOutput(#[from] csv::Error),

    #[error("JSON output error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Cannot import analysis: {0}")]
    Import(String),

    #[error("Invalid input path: {0}")]
    InvalidPath(PathBuf),
}

impl ChromaError {
    /// Filter and fit failures can be retried with adjusted parameters
    /// without discarding any other state.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ChromaError::Filter(_) | ChromaError::Fit(_))
    }
}

/// Type alias for Result with our custom error type
pub type Result<T> = std::result::Result<T, ChromaError>;
