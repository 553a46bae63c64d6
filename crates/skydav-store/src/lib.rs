//! # Skydav Store
//!
//! Object storage access layer for the skydav WebDAV gateway.
//!
//! This crate provides:
//! - **Backend trait**: Account, container and object operations against a
//!   flat object store
//! - **Swift client**: HTTP implementation with paged JSON listings and
//!   server-side copy
//! - **Streaming**: Lazy downloads and chunked uploads behind file-like
//!   reader/writer traits
//! - **Authentication**: v1 (tempauth) and v2 (Keystone) token exchange
//! - **Memory backend**: In-process store with call recording, for tests
//!   and local runs
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │        Resolver / Mutation Layer        │
//! ├─────────────────────────────────────────┤
//! │              Backend Trait              │
//! ├────────────────────┬────────────────────┤
//! │    SwiftClient     │   MemoryBackend    │
//! ├────────────────────┼────────────────────┤
//! │ Authenticator (v1/v2)                   │
//! └────────────────────┴────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use skydav_store::{AuthConfig, AuthVersion, Authenticator, Backend, SwiftClient};
//!
//! let auth = Authenticator::new(AuthConfig::new("http://127.0.0.1:8080/auth/v1.0", AuthVersion::V1))?;
//! let session = auth.authenticate("test;tester", "testing").await?;
//! let client = SwiftClient::new(session)?;
//! for container in client.get_account().await? {
//!     println!("{}", container.name);
//! }
//! ```

pub mod auth;
pub mod error;
pub mod escape;
pub mod memory;
pub mod session;
pub mod stream;
pub mod swift;
pub mod types;

pub use auth::{normalize_username, AuthConfig, AuthVersion, Authenticator};
pub use error::{Result, StoreError};
pub use escape::{copy_source, parse_copy_source, quote};
pub use memory::{BackendCall, FailOp, MemoryBackend};
pub use session::Session;
pub use stream::{DownloadStream, ObjectReader, ObjectWriter, UploadStream};
pub use swift::SwiftClient;
pub use types::*;

use async_trait::async_trait;
use bytes::Bytes;

/// Key separator used for pseudo-hierarchy
pub const DELIMITER: char = '/';

/// Content type of pseudo-directory marker objects
pub const DIRECTORY_CONTENT_TYPE: &str = "application/directory";

/// Trait for object storage backends.
///
/// Probes (`head_*`) return `Ok(None)` for a missing target; everything
/// else reports a missing target as [`StoreError::NotFound`].
#[async_trait]
pub trait Backend: Send + Sync {
    /// List every container of the account
    async fn get_account(&self) -> Result<Vec<ContainerInfo>>;

    /// Container metadata, `None` if the container does not exist
    async fn head_container(&self, container: &str) -> Result<Option<ContainerHeaders>>;

    /// Create a container (no-op if it exists)
    async fn put_container(&self, container: &str) -> Result<()>;

    /// Delete an empty container
    async fn delete_container(&self, container: &str) -> Result<()>;

    /// List a container; all pages are fetched
    async fn get_container(&self, container: &str, query: &ListQuery) -> Result<Vec<ListingEntry>>;

    /// Object metadata, `None` if the object does not exist
    async fn head_object(&self, container: &str, key: &str) -> Result<Option<ObjectHeaders>>;

    /// Write a whole object, or copy one server-side via `options.copy_from`
    async fn put_object(
        &self,
        container: &str,
        key: &str,
        data: Bytes,
        options: PutOptions,
    ) -> Result<()>;

    /// Delete an object
    async fn delete_object(&self, container: &str, key: &str) -> Result<()>;

    /// Open an object for streaming reads
    async fn open_read(&self, container: &str, key: &str) -> Result<Box<dyn ObjectReader>>;

    /// Open an object for streaming writes
    async fn open_write(
        &self,
        container: &str,
        key: &str,
        options: PutOptions,
    ) -> Result<Box<dyn ObjectWriter>>;
}

/// Read a whole object into memory
pub async fn read_to_end(reader: &mut dyn ObjectReader) -> Result<Bytes> {
    let mut out = bytes::BytesMut::new();
    loop {
        let chunk = reader.read(64 * 1024).await?;
        if chunk.is_empty() {
            break;
        }
        out.extend_from_slice(&chunk);
    }
    Ok(out.freeze())
}
