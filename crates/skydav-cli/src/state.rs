//! Application state

use crate::config::GatewayConfig;
use crate::error::DavError;
use blake3::Hasher;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use skydav_core::RequestContext;
use skydav_store::{Authenticator, Backend, MemoryBackend, SwiftClient};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Cache key for a pair of credentials; the password never leaves this
/// function in the clear
pub fn session_key(username: &str, password: &str) -> String {
    let mut hasher = Hasher::new();
    hasher.update(b"skydav:session:");
    hasher.update(username.as_bytes());
    hasher.update(b"\0");
    hasher.update(password.as_bytes());
    let hash = hasher.finalize();
    hex::encode(&hash.as_bytes()[..16])
}

/// Where sessions come from
pub enum StorageMode {
    /// Swift cluster behind an auth service
    Swift(Authenticator),
    /// Process-local store shared by every account
    Memory(MemoryBackend),
}

impl StorageMode {
    pub fn is_persistent(&self) -> bool {
        matches!(self, Self::Swift(_))
    }
}

/// Application state shared across handlers
pub struct AppState {
    /// Gateway configuration
    pub config: GatewayConfig,
    /// Session source
    pub storage: StorageMode,
    /// Authenticated sessions by credential digest
    pub sessions: Arc<DashMap<String, UserSession>>,
}

impl AppState {
    /// Create a new application state
    pub fn new(config: GatewayConfig) -> anyhow::Result<Self> {
        let storage = if config.use_memory_store {
            info!("Using in-memory object store (data will not persist)");
            StorageMode::Memory(MemoryBackend::new())
        } else {
            let authenticator = Authenticator::new(config.auth_config()?)?;
            info!(auth_url = %config.auth_url, version = config.auth_version, "Using Swift storage");
            StorageMode::Swift(authenticator)
        };

        if !storage.is_persistent() {
            warn!("Storage mode: in-memory (NOT persistent, for development only)");
        }

        Ok(Self {
            config,
            storage,
            sessions: Arc::new(DashMap::new()),
        })
    }

    /// State over an existing in-memory store
    pub fn with_memory_backend(config: GatewayConfig, backend: MemoryBackend) -> Self {
        Self {
            config,
            storage: StorageMode::Memory(backend),
            sessions: Arc::new(DashMap::new()),
        }
    }

    /// Return the cached session for these credentials, authenticating
    /// when there is none or it has expired
    pub async fn login(&self, username: &str, password: &str) -> Result<UserSession, DavError> {
        let key = session_key(username, password);
        if let Some(session) = self.sessions.get(&key) {
            if !session.is_expired() {
                return Ok(session.clone());
            }
        }
        self.sweep_expired();

        let session = match &self.storage {
            StorageMode::Memory(backend) => {
                let ttl = chrono::Duration::from_std(self.config.session_ttl())
                    .unwrap_or_else(|_| chrono::Duration::hours(1));
                UserSession::new(
                    key.clone(),
                    username,
                    Arc::new(backend.clone()),
                    Utc::now() + ttl,
                )
            }
            StorageMode::Swift(authenticator) => {
                let session = authenticator.authenticate(username, password).await.map_err(|e| {
                    if e.is_transport() {
                        warn!(error = %e, "Auth service unreachable");
                    }
                    DavError::Unauthorized
                })?;
                let expires_at = session.expires_at;
                let client = SwiftClient::new(session).map_err(|e| {
                    warn!(error = %e, "Auth service returned an unusable storage url");
                    DavError::Unauthorized
                })?;
                UserSession::new(key.clone(), username, Arc::new(client), expires_at)
            }
        };

        debug!(account = %session.account, "Session established");
        self.sessions.insert(key, session.clone());
        Ok(session)
    }

    /// Drop every expired session; returns how many went
    pub fn sweep_expired(&self) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, session| !session.is_expired());
        let swept = before.saturating_sub(self.sessions.len());
        if swept > 0 {
            debug!(swept, "Expired sessions dropped");
        }
        swept
    }

    /// Drop a cached session
    pub fn evict(&self, key: &str) {
        if self.sessions.remove(key).is_some() {
            info!("Session evicted after token rejection");
        }
    }

    /// Resolver context for one request
    pub fn context(&self, session: &UserSession) -> RequestContext {
        RequestContext::new(Arc::clone(&session.backend), self.config.resolver_config())
    }
}

/// One authenticated account
#[derive(Clone)]
pub struct UserSession {
    /// Cache key (credential digest)
    pub key: String,
    /// Account as given by the client (`account;user`)
    pub account: String,
    /// Backend handle bound to the session's token
    pub backend: Arc<dyn Backend>,
    /// Expiration time
    pub expires_at: DateTime<Utc>,
}

impl UserSession {
    pub fn new(
        key: String,
        account: impl Into<String>,
        backend: Arc<dyn Backend>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            key,
            account: account.into(),
            backend,
            expires_at,
        }
    }

    /// Check if the session has expired
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

impl std::fmt::Debug for UserSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserSession")
            .field("account", &self.account)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_key() {
        let a = session_key("test;tester", "testing");
        let b = session_key("test;tester", "testing");
        let c = session_key("test;tester", "other");
        let d = session_key("test;teste", "rtesting");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_eq!(a.len(), 32);
    }

    #[tokio::test]
    async fn test_memory_login_is_cached() {
        let state = AppState::with_memory_backend(GatewayConfig::default(), MemoryBackend::new());

        let first = state.login("test;tester", "testing").await.unwrap();
        let second = state.login("test;tester", "testing").await.unwrap();
        assert_eq!(first.key, second.key);
        assert_eq!(state.sessions.len(), 1);

        state.evict(&first.key);
        assert!(state.sessions.is_empty());
    }

    #[tokio::test]
    async fn test_expired_session_is_replaced() {
        let state = AppState::with_memory_backend(GatewayConfig::default(), MemoryBackend::new());
        let mut session = state.login("a", "b").await.unwrap();
        session.expires_at = Utc::now() - chrono::Duration::seconds(1);
        state.sessions.insert(session.key.clone(), session.clone());

        let fresh = state.login("a", "b").await.unwrap();
        assert!(!fresh.is_expired());
    }

    #[tokio::test]
    async fn test_login_sweeps_abandoned_sessions() {
        let state = AppState::with_memory_backend(GatewayConfig::default(), MemoryBackend::new());
        state.login("gone;one", "secret").await.unwrap();
        state.login("gone;two", "secret").await.unwrap();
        for mut session in state.sessions.iter_mut() {
            session.expires_at = Utc::now() - chrono::Duration::seconds(1);
        }
        assert_eq!(state.sessions.len(), 2);

        let live = state.login("test;tester", "testing").await.unwrap();
        assert_eq!(state.sessions.len(), 1);
        assert!(state.sessions.contains_key(&live.key));
    }
}
