//! # Skydav Gateway
//!
//! WebDAV gateway server over Swift object storage.
//!
//! This crate provides:
//! - **WebDAV API**: PROPFIND, GET, HEAD, PUT, MKCOL, DELETE, COPY, MOVE
//! - **Authentication**: HTTP Basic credentials exchanged for Swift sessions
//! - **Rate Limiting**: Per-account request throttling
//! - **Streaming**: Object bodies flow through without being buffered
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   HTTP Clients                      │
//! │        (davfs2, cadaver, Finder, Explorer)          │
//! └─────────────────────────┬───────────────────────────┘
//!                           │
//! ┌─────────────────────────▼───────────────────────────┐
//! │                  Skydav Gateway                     │
//! ├─────────────────────────────────────────────────────┤
//! │  Auth Middleware │ Rate Limiter │ Method Dispatch   │
//! ├─────────────────────────────────────────────────────┤
//! │                WebDAV Handlers                      │
//! ├─────────────────────────────────────────────────────┤
//! │                   skydav-core                       │
//! │      (Resolver, Pseudo-directories, Tree ops)       │
//! ├─────────────────────────────────────────────────────┤
//! │                   skydav-store                      │
//! │          (Swift client, Auth, Memory store)         │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;
pub mod xml;

pub use config::{GatewayConfig, MoveStatus};
pub use error::DavError;
pub use server::{run_server, run_server_with_shutdown};
pub use state::AppState;
