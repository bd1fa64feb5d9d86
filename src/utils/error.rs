// src/utils/error.rs
use thiserror::Error;

// Define specific error types for different parts of the application
#[derive(Error, Debug)]
pub enum AcquireError {
    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error), // Connection failures, timeouts

    #[error("HTTP error: {0}")]
    Http(reqwest::StatusCode), // e.g., 404 Not Found, 503 Service Unavailable

    #[error("SEC rate limit exceeded (HTTP 429)")]
    RateLimited,

    #[error("Downloaded archive does not start with the ZIP signature")]
    InvalidArchive,

    #[error("Downloaded ticker file is not a symbol/CIK table: {0}")]
    InvalidTickerFile(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AcquireError {
    /// Failures worth another attempt after exponential backoff.
    /// A payload that fails validation is usually an error page served with 200.
    pub fn is_retryable(&self) -> bool {
        match self {
            AcquireError::Network(_)
            | AcquireError::InvalidArchive
            | AcquireError::InvalidTickerFile(_) => true,
            AcquireError::Http(status) => matches!(status.as_u16(), 500 | 502 | 503 | 504),
            _ => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Table parse error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Table {0} not found in archive")]
    MissingTable(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error), // Automatically convert IO errors

    #[error("Loading dataset failed: {0}")]
    Load(#[from] LoadError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Data processing failed: {0}")]
    Processing(String),
}
