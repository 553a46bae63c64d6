//! Authenticated storage session

use chrono::{DateTime, Utc};

/// Storage endpoint and token obtained from the auth service.
///
/// Read-only once established; every backend handle created for one
/// authenticated client shares the same session.
#[derive(Clone, Debug, PartialEq)]
pub struct Session {
    /// Storage endpoint, e.g. `https://swift.example.com/v1/AUTH_test`
    pub storage_url: String,
    /// Value for the `X-Auth-Token` header
    pub auth_token: String,
    /// Skip TLS certificate validation
    pub insecure: bool,
    /// When the token stops being valid
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Create a session
    pub fn new(
        storage_url: impl Into<String>,
        auth_token: impl Into<String>,
        insecure: bool,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            storage_url: storage_url.into(),
            auth_token: auth_token.into(),
            insecure,
            expires_at,
        }
    }

    /// Check if the token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}
