//! Error types for rescue-geo

use crate::location::FailureReason;
use thiserror::Error;

/// Main error type for rescue-geo operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(String),

    /// The geocoding vendor answered with a non-success status.
    ///
    /// `code` and `message` are the vendor's own `infocode` and `info`.
    #[error("Remote service error [{code}]: {message}")]
    RemoteService { code: String, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Address resolution failed after a position fix: {0}")]
    GeocodeMismatch(String),

    #[error("Location acquisition failed: {0}")]
    Acquisition(#[from] FailureReason),

    #[error("A location request is already in flight")]
    AcquisitionInProgress,

    #[error("Bridge error: {0}")]
    Bridge(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Server error: {0}")]
    Server(String),
}

impl Error {
    /// Build a remote service error from the vendor's diagnostic fields
    pub fn remote(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RemoteService {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Whether the failure came from the transport rather than the vendor
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Http(_))
    }
}

/// Result type alias for rescue-geo operations
pub type Result<T> = std::result::Result<T, Error>;
