//! Error types and their HTTP statuses

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use skydav_core::CoreError;
use skydav_store::StoreError;
use thiserror::Error;

/// Marker left in a response's extensions when the storage service
/// rejected the session's token, so the cached session can be dropped
#[derive(Clone, Copy, Debug)]
pub struct TokenRejected;

/// API error type
#[derive(Error, Debug)]
pub enum DavError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Please reduce your request rate")]
    SlowDown,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

impl From<StoreError> for DavError {
    fn from(e: StoreError) -> Self {
        Self::Core(e.into())
    }
}

fn store_status(e: &StoreError) -> StatusCode {
    match e {
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::Conflict(_) => StatusCode::CONFLICT,
        StoreError::Unauthorized(_) | StoreError::Auth(_) => StatusCode::UNAUTHORIZED,
        StoreError::Status { status, .. } if *status == 403 => StatusCode::FORBIDDEN,
        StoreError::Status { status, .. } if *status == 413 => StatusCode::PAYLOAD_TOO_LARGE,
        _ => StatusCode::BAD_GATEWAY,
    }
}

impl DavError {
    /// Get the HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            Self::SlowDown => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Core(e) => match e {
                CoreError::NotFound(_) => StatusCode::NOT_FOUND,
                CoreError::Conflict(_) => StatusCode::CONFLICT,
                CoreError::InvalidTarget(_) => StatusCode::FORBIDDEN,
                CoreError::InvalidPath(_) => StatusCode::BAD_REQUEST,
                CoreError::Fatal(_) | CoreError::InvalidTransition { .. } => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
                CoreError::Transport(_) => StatusCode::BAD_GATEWAY,
                CoreError::Store(e) => store_status(e),
            },
        }
    }

    /// Whether the storage service refused the session's token
    pub fn is_token_rejected(&self) -> bool {
        match self {
            Self::Core(e) => e.store_error().is_some_and(StoreError::is_unauthorized),
            _ => false,
        }
    }
}

impl IntoResponse for DavError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, status = %status.as_u16(), "Request refused");
        }

        let mut response = (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.to_string(),
        )
            .into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                header::HeaderValue::from_static("Basic realm=\"/\""),
            );
        }
        if self.is_token_rejected() {
            response.extensions_mut().insert(TokenRejected);
        }
        response
    }
}
