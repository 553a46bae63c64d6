//! WebDAV request handlers

pub mod read;
pub mod transfer;
pub mod write;

pub use read::*;
pub use transfer::*;
pub use write::*;

use crate::error::DavError;
use crate::xml;
use axum::{
    http::{header, HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use skydav_core::MutationOutcome;

/// Methods answered by the gateway
pub const ALLOWED_METHODS: &str = "OPTIONS, GET, HEAD, PUT, DELETE, MKCOL, COPY, MOVE, PROPFIND";

/// How far a PROPFIND descends
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Depth {
    Zero,
    One,
}

impl Depth {
    /// Parse the `Depth` header; infinity is answered as one level
    pub fn from_headers(headers: &HeaderMap) -> Self {
        match headers.get("Depth").and_then(|v| v.to_str().ok()) {
            Some("0") => Self::Zero,
            _ => Self::One,
        }
    }
}

/// Percent-decoded request path
pub fn request_path(uri: &Uri) -> Result<String, DavError> {
    urlencoding::decode(uri.path())
        .map(|p| p.into_owned())
        .map_err(|_| DavError::BadRequest(format!("undecodable path {}", uri.path())))
}

/// Target path of a COPY/MOVE, from an absolute URL or an absolute path
pub fn destination_path(headers: &HeaderMap) -> Result<String, DavError> {
    let raw = headers
        .get("Destination")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| DavError::BadRequest("missing Destination header".to_string()))?;

    let encoded = if raw.starts_with('/') {
        raw.to_string()
    } else {
        url::Url::parse(raw)
            .map_err(|e| DavError::BadRequest(format!("bad Destination {}: {}", raw, e)))?
            .path()
            .to_string()
    };

    urlencoding::decode(&encoded)
        .map(|p| p.into_owned())
        .map_err(|_| DavError::BadRequest(format!("undecodable Destination {}", raw)))
}

/// `Overwrite` header; absent means `T`
pub fn overwrite_allowed(headers: &HeaderMap) -> bool {
    !headers
        .get("Overwrite")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("F"))
}

/// 207 Multi-Status with an XML body
pub fn multistatus(body: String) -> Response {
    (
        StatusCode::MULTI_STATUS,
        [(header::CONTENT_TYPE, "application/xml; charset=utf-8")],
        body,
    )
        .into_response()
}

/// `success` when every key made it, otherwise a 207 naming the failures
pub fn outcome_response(outcome: &MutationOutcome, success: StatusCode) -> Result<Response, DavError> {
    if outcome.is_committed() {
        return Ok(success.into_response());
    }

    let failed: Vec<_> = outcome
        .failed
        .iter()
        .map(|f| (f.path.clone(), StatusCode::BAD_GATEWAY))
        .collect();
    let body = xml::failure_multistatus(&failed).map_err(|e| DavError::Internal(e.to_string()))?;
    Ok(multistatus(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(name: &'static str, value: &'static str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(name, HeaderValue::from_static(value));
        map
    }

    #[test]
    fn test_destination_forms() {
        let url = headers("Destination", "http://localhost:8080/c/a%20b/");
        assert_eq!(destination_path(&url).unwrap(), "/c/a b/");

        let path = headers("Destination", "/c/x");
        assert_eq!(destination_path(&path).unwrap(), "/c/x");

        assert!(destination_path(&HeaderMap::new()).is_err());
    }

    #[test]
    fn test_overwrite_and_depth() {
        assert!(overwrite_allowed(&HeaderMap::new()));
        assert!(overwrite_allowed(&headers("Overwrite", "T")));
        assert!(!overwrite_allowed(&headers("Overwrite", "F")));

        assert_eq!(Depth::from_headers(&headers("Depth", "0")), Depth::Zero);
        assert_eq!(Depth::from_headers(&headers("Depth", "infinity")), Depth::One);
        assert_eq!(Depth::from_headers(&HeaderMap::new()), Depth::One);
    }

    #[test]
    fn test_partial_outcome_is_multistatus() {
        let mut outcome = MutationOutcome::new();
        outcome.record_success();
        outcome.record_failure("/c/d/b", "status 503");

        let response = outcome_response(&outcome, StatusCode::NO_CONTENT).unwrap();
        assert_eq!(response.status(), StatusCode::MULTI_STATUS);

        let response = outcome_response(&MutationOutcome::single(), StatusCode::NO_CONTENT).unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }
}
