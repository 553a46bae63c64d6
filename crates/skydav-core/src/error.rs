//! Error types for the skydav-core crate

use crate::phase::WritePhase;
use skydav_store::StoreError;
use thiserror::Error;

/// Result type alias using `CoreError`
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur while resolving or mutating the tree.
///
/// Partial failure of a subtree operation is not an error; it is reported
/// through [`crate::MutationOutcome`].
#[derive(Error, Debug)]
pub enum CoreError {
    /// Target does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Name is already taken by a node of the other kind
    #[error("conflict: {0}")]
    Conflict(String),

    /// Destination overlaps the source
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    /// Path cannot be addressed
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Unexpected backend failure during a destructive step
    #[error("fatal backend failure: {0}")]
    Fatal(String),

    /// Backend or auth service unreachable
    #[error("transport failure: {0}")]
    Transport(#[source] StoreError),

    /// Any other backend error
    #[error("storage error: {0}")]
    Store(#[source] StoreError),

    /// Write request driven through an impossible step
    #[error("invalid transition from {from:?} to {to:?}")]
    InvalidTransition { from: WritePhase, to: WritePhase },
}

impl From<StoreError> for CoreError {
    fn from(e: StoreError) -> Self {
        if e.is_transport() {
            Self::Transport(e)
        } else {
            Self::Store(e)
        }
    }
}

impl CoreError {
    /// Check if this is a "not found" error, from either layer
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Store(e) => e.is_not_found(),
            _ => false,
        }
    }

    /// The backend error underneath, if any
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::Transport(e) | Self::Store(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_are_classified() {
        let e: CoreError = StoreError::InvalidUrl("x".into()).into();
        assert!(matches!(e, CoreError::Transport(_)));

        let e: CoreError = StoreError::NotFound("c/o".into()).into();
        assert!(e.is_not_found());
        assert!(e.store_error().is_some());
    }
}
