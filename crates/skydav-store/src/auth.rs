//! Exchange account credentials for a storage session

use crate::{Session, StoreError, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Auth protocol spoken by the auth service
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthVersion {
    /// tempauth / swauth (`X-Auth-User` / `X-Auth-Key`)
    #[default]
    V1,
    /// Keystone v2 (`POST /tokens`)
    V2,
}

impl AuthVersion {
    /// Parse the numeric version used on the command line
    pub fn from_number(version: u8) -> Option<Self> {
        match version {
            1 => Some(Self::V1),
            2 => Some(Self::V2),
            _ => None,
        }
    }
}

/// Auth service configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// Auth endpoint, e.g. `http://127.0.0.1:8080/auth/v1.0`
    pub auth_url: String,
    /// Protocol version
    pub version: AuthVersion,
    /// Skip TLS certificate validation (also inherited by the session)
    pub insecure: bool,
    /// Request timeout for the auth call
    pub timeout: Duration,
    /// Session lifetime when the service does not announce one
    pub session_ttl: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            auth_url: "http://127.0.0.1:8080/auth/v1.0".to_string(),
            version: AuthVersion::V1,
            insecure: false,
            timeout: Duration::from_secs(30),
            session_ttl: Duration::from_secs(60 * 60),
        }
    }
}

impl AuthConfig {
    /// Create a config for the given endpoint
    pub fn new(auth_url: impl Into<String>, version: AuthVersion) -> Self {
        Self {
            auth_url: auth_url.into(),
            version,
            ..Default::default()
        }
    }

    /// Disable certificate validation
    pub fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }
}

/// Rewrite a WebDAV user name (`account;user`) to the storage form
/// (`account:user`); Basic auth user names cannot contain `:`.
pub fn normalize_username(username: &str) -> String {
    username.replace(';', ":")
}

/// Client for the auth service
#[derive(Clone)]
pub struct Authenticator {
    config: AuthConfig,
    http: Client,
}

impl Authenticator {
    /// Create an authenticator
    pub fn new(config: AuthConfig) -> Result<Self> {
        url::Url::parse(&config.auth_url)
            .map_err(|e| StoreError::InvalidUrl(format!("{}: {}", config.auth_url, e)))?;

        let http = Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.insecure)
            .build()?;

        Ok(Self { config, http })
    }

    /// Get the configuration
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Authenticate and return a session
    #[instrument(skip(self, password), fields(version = ?self.config.version))]
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Session> {
        let username = normalize_username(username);
        let result = match self.config.version {
            AuthVersion::V1 => self.authenticate_v1(&username, password).await,
            AuthVersion::V2 => self.authenticate_v2(&username, password).await,
        };

        if let Err(ref e) = result {
            warn!(user = %username, error = %e, "Authentication failed");
        }
        result
    }

    async fn authenticate_v1(&self, username: &str, password: &str) -> Result<Session> {
        debug!(url = %self.config.auth_url, "Requesting v1 token");
        let response = self
            .http
            .get(&self.config.auth_url)
            .header("X-Auth-User", username)
            .header("X-Auth-Key", password)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Auth(format!(
                "auth service answered {} for {}",
                status.as_u16(),
                username
            )));
        }

        let headers = response.headers();
        let storage_url = header_str(headers, "x-storage-url")
            .ok_or_else(|| StoreError::InvalidResponse("missing X-Storage-Url".to_string()))?;
        let token = header_str(headers, "x-auth-token")
            .ok_or_else(|| StoreError::InvalidResponse("missing X-Auth-Token".to_string()))?;
        let expires_at = header_str(headers, "x-auth-token-expires")
            .and_then(|v| v.parse::<i64>().ok())
            .map(|secs| Utc::now() + ChronoDuration::seconds(secs))
            .unwrap_or_else(|| self.default_expiry());

        Ok(Session::new(storage_url, token, self.config.insecure, expires_at))
    }

    async fn authenticate_v2(&self, username: &str, password: &str) -> Result<Session> {
        let (tenant, user) = username
            .split_once(':')
            .ok_or_else(|| StoreError::Auth(format!("expected tenant:user, got {}", username)))?;

        let url = format!("{}/tokens", self.config.auth_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "auth": {
                "tenantName": tenant,
                "passwordCredentials": {
                    "username": user,
                    "password": password,
                }
            }
        });

        debug!(url = %url, "Requesting v2 token");
        let response = self.http.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Auth(format!(
                "auth service answered {} for {}",
                status.as_u16(),
                username
            )));
        }

        let parsed: KeystoneResponse = response
            .json()
            .await
            .map_err(|e| StoreError::InvalidResponse(e.to_string()))?;

        let storage_url = parsed
            .access
            .service_catalog
            .iter()
            .find(|service| service.kind == "object-store")
            .and_then(|service| service.endpoints.first())
            .map(|endpoint| endpoint.public_url.clone())
            .ok_or_else(|| {
                StoreError::InvalidResponse("no object-store endpoint in catalog".to_string())
            })?;

        let expires_at = parsed
            .access
            .token
            .expires
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|| self.default_expiry());

        Ok(Session::new(
            storage_url,
            parsed.access.token.id,
            self.config.insecure,
            expires_at,
        ))
    }

    fn default_expiry(&self) -> DateTime<Utc> {
        let ttl = ChronoDuration::from_std(self.config.session_ttl)
            .unwrap_or_else(|_| ChronoDuration::hours(1));
        Utc::now() + ttl
    }
}

fn header_str(headers: &reqwest::header::HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

#[derive(Debug, Deserialize)]
struct KeystoneResponse {
    access: KeystoneAccess,
}

#[derive(Debug, Deserialize)]
struct KeystoneAccess {
    token: KeystoneToken,
    #[serde(rename = "serviceCatalog", default)]
    service_catalog: Vec<KeystoneService>,
}

#[derive(Debug, Deserialize)]
struct KeystoneToken {
    id: String,
    expires: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KeystoneService {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    endpoints: Vec<KeystoneEndpoint>,
}

#[derive(Debug, Deserialize)]
struct KeystoneEndpoint {
    #[serde(rename = "publicURL")]
    public_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_username() {
        assert_eq!(normalize_username("account;user"), "account:user");
        assert_eq!(normalize_username("plain"), "plain");
    }

    #[test]
    fn test_auth_version_from_number() {
        assert_eq!(AuthVersion::from_number(1), Some(AuthVersion::V1));
        assert_eq!(AuthVersion::from_number(2), Some(AuthVersion::V2));
        assert_eq!(AuthVersion::from_number(3), None);
    }

    #[test]
    fn test_malformed_auth_url() {
        let result = Authenticator::new(AuthConfig::new("not a url", AuthVersion::V1));
        assert!(matches!(result, Err(StoreError::InvalidUrl(_))));
    }
}
