//! Error types for the skydav-store crate

use thiserror::Error;

/// Result type alias using `StoreError`
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur while talking to the object store
#[derive(Error, Debug)]
pub enum StoreError {
    /// Target does not exist (HTTP 404)
    #[error("not found: {0}")]
    NotFound(String),

    /// Backend refused the operation because of the target's state (HTTP 409)
    #[error("conflict: {0}")]
    Conflict(String),

    /// Token was rejected by the storage service (HTTP 401)
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Any other non-success status
    #[error("backend returned status {status} for {target}")]
    Status { status: u16, target: String },

    /// Credentials were rejected by the auth service
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Storage or auth endpoint could not be parsed
    #[error("invalid endpoint url: {0}")]
    InvalidUrl(String),

    /// Response was missing data or could not be decoded
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Stream was used after it finished or its request ended early
    #[error("stream closed: {0}")]
    Closed(String),

    /// HTTP transport error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl StoreError {
    /// Map a non-success status to the matching error
    pub fn from_status(status: u16, target: impl Into<String>) -> Self {
        let target = target.into();
        match status {
            401 => Self::Unauthorized(target),
            404 => Self::NotFound(target),
            409 => Self::Conflict(target),
            _ => Self::Status { status, target },
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if the storage token was rejected
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }

    /// Check if the endpoint could not be reached or addressed at all
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Http(_) | Self::InvalidUrl(_))
    }
}
