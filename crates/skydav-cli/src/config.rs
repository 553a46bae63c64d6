//! Gateway configuration

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use skydav_core::ResolverConfig;
use skydav_store::{AuthConfig, AuthVersion};
use std::time::Duration;

/// Status answered by a successful collection COPY/MOVE onto a new name
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum MoveStatus {
    /// 201 Created
    #[default]
    Created,
    /// 204 No Content
    NoContent,
}

impl MoveStatus {
    pub fn status_code(self) -> StatusCode {
        match self {
            Self::Created => StatusCode::CREATED,
            Self::NoContent => StatusCode::NO_CONTENT,
        }
    }
}

/// Gateway server configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Swift auth endpoint
    pub auth_url: String,
    /// Auth protocol version (1 or 2)
    pub auth_version: u8,
    /// Accept invalid TLS certificates from the auth and storage services
    pub insecure: bool,
    /// Use in-memory storage (for testing/development)
    pub use_memory_store: bool,
    /// Lifetime of a cached session when the auth service gives none (seconds)
    pub session_ttl_secs: u64,
    /// Rate limit (requests per second per account)
    pub rate_limit_rps: u32,
    /// Maximum request body size (bytes)
    pub max_body_size: usize,
    /// Enable CORS
    pub cors_enabled: bool,
    /// Status for a collection COPY/MOVE that created its destination
    pub collection_move_status: MoveStatus,
    /// Drop a listing's own prefix entry when listing a collection
    pub skip_self_entry: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            auth_url: "http://127.0.0.1:8080/auth/v1.0".to_string(),
            auth_version: 1,
            insecure: false,
            use_memory_store: false,
            session_ttl_secs: 60 * 60,
            rate_limit_rps: 100,
            max_body_size: 5 * 1024 * 1024 * 1024, // 5 GB, the Swift single-object limit
            cors_enabled: true,
            collection_move_status: MoveStatus::Created,
            skip_self_entry: true,
        }
    }
}

impl GatewayConfig {
    /// Get the bind address
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Settings for the auth bridge
    pub fn auth_config(&self) -> anyhow::Result<AuthConfig> {
        let version = AuthVersion::from_number(self.auth_version)
            .ok_or_else(|| anyhow::anyhow!("unsupported auth version {}", self.auth_version))?;
        let mut config = AuthConfig::new(&self.auth_url, version).with_insecure(self.insecure);
        config.session_ttl = self.session_ttl();
        Ok(config)
    }

    /// Settings handed to every request's resolver
    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            skip_self_entry: self.skip_self_entry,
        }
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}
