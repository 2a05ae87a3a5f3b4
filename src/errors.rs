use thiserror::Error;
use std::io;
use std::path::PathBuf;

/// Custom error types for the root analysis pipeline
#[derive(Error, Debug)]
pub enum RootAnalysisError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Image decoding error: {0}")]
    Image(#[from] image::ImageError),

    /// Fatal, raised before any image is processed
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to load configuration from {path}: {source}")]
    ConfigLoad {
        source: toml::de::Error,
        path: PathBuf,
    },

    /// Recoverable, scoped to a single image
    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Descriptor extractor '{name}' failed: {message}")]
    Extractor {
        name: String,
        message: String,
    },

    #[error("CSV output error: {0}")]
    CsvOutput(#[from] csv::Error),

    #[error("Invalid input path: {0}")]
    InvalidPath(PathBuf),
}

impl RootAnalysisError {
    /// Whether the error must abort the whole batch rather than a single image
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RootAnalysisError::Config(_)
                | RootAnalysisError::ConfigLoad { .. }
                | RootAnalysisError::InvalidPath(_)
        )
    }
}

/// Type alias for Result with our custom error type
pub type Result<T> = std::result::Result<T, RootAnalysisError>;
