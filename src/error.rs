use thiserror::Error;

/// Main error type for kgbridge
#[derive(Error, Debug)]
pub enum KgbridgeError {
    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding/decoding errors (checkpoints, payloads)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client construction errors
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input (bad seed ids, out-of-range parameters)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Checkpoint file could not be used
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),
}

/// Convenient Result type using KgbridgeError
pub type Result<T> = std::result::Result<T, KgbridgeError>;
