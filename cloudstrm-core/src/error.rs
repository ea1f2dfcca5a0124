//! Error types for cloudstrm operations

use thiserror::Error;

/// cloudstrm error types
#[derive(Error, Debug)]
pub enum StrmError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid mapping: {0}")]
    Mapping(String),

    #[error("Unsupported cloud type: {0}")]
    UnsupportedCloudType(String),

    #[error("Naming oracle error: {0}")]
    Oracle(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Path {path} is not under root {root}")]
    PathOutsideRoot { path: String, root: String },

    #[error("Invalid pattern: {0}")]
    Pattern(String),
}

/// Result type for cloudstrm operations
pub type Result<T> = std::result::Result<T, StrmError>;

impl From<serde_json::Error> for StrmError {
    fn from(e: serde_json::Error) -> Self {
        StrmError::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for StrmError {
    fn from(e: reqwest::Error) -> Self {
        StrmError::Http(e.to_string())
    }
}

impl From<walkdir::Error> for StrmError {
    fn from(e: walkdir::Error) -> Self {
        match e.into_io_error() {
            Some(io) => StrmError::Io(io),
            None => StrmError::Io(std::io::Error::other("filesystem loop detected")),
        }
    }
}

impl From<globset::Error> for StrmError {
    fn from(e: globset::Error) -> Self {
        StrmError::Pattern(e.to_string())
    }
}

impl From<tempfile::PersistError> for StrmError {
    fn from(e: tempfile::PersistError) -> Self {
        StrmError::Io(e.error)
    }
}
