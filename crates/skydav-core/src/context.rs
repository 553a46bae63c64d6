//! Request-scoped context shared by everything resolved for one request

use serde::{Deserialize, Serialize};
use skydav_store::Backend;
use std::sync::Arc;

/// Resolver behavior that differs between backend API versions
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Drop the row whose key equals the query prefix from grouped listings
    pub skip_self_entry: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            skip_self_entry: true,
        }
    }
}

/// Backend handle and settings for one request.
///
/// Built per request from the authenticated session; never stored beyond it.
#[derive(Clone)]
pub struct RequestContext {
    backend: Arc<dyn Backend>,
    config: ResolverConfig,
}

impl RequestContext {
    /// Create a context
    pub fn new(backend: Arc<dyn Backend>, config: ResolverConfig) -> Self {
        Self { backend, config }
    }

    /// Context with default settings
    pub fn with_backend(backend: Arc<dyn Backend>) -> Self {
        Self::new(backend, ResolverConfig::default())
    }

    /// Get the backend
    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    /// Get the configuration
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }
}
