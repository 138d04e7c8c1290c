//! Common error types for StreetMatch

use thiserror::Error;

/// Common result type for StreetMatch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across StreetMatch crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Image manifest could not be read or had the wrong shape
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// Similarity data could not be read or had the wrong shape
    #[error("Similarity data error: {0}")]
    Similarity(String),

    /// Remote source could not be fetched
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// JSON encode/decode error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
