//! # Skydav Core
//!
//! Pseudo-hierarchy engine that presents a flat object store as a tree.
//!
//! This crate provides:
//! - **Resolution**: Map a client path to the root, a container, a
//!   pseudo-directory or an object
//! - **Subdirectory test**: Tell directories from objects using listing
//!   metadata, with a per-collection cache
//! - **Mutations**: Create, delete, copy and move for every node kind,
//!   including whole subtrees and containers
//! - **Write tracking**: The per-request write state machine
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            WebDAV Front End             │
//! ├─────────────────────────────────────────┤
//! │   resolve()  ──►  Node  ──►  ops::*     │
//! ├────────────────────┬────────────────────┤
//! │ Collection + Cache │   MutationOutcome  │
//! ├────────────────────┴────────────────────┤
//! │        skydav_store::Backend            │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use skydav_core::{ops, resolve, Intent, RequestContext, Transfer};
//!
//! let ctx = RequestContext::with_backend(backend);
//! if let Some(node) = resolve(&ctx, "/photos/2014/", Intent::Read).await? {
//!     let outcome = ops::transfer(&ctx, &node, "/archive/2014", Transfer::Move).await?;
//!     println!("{:?}", outcome.state());
//! }
//! ```

pub mod cache;
pub mod collection;
pub mod context;
pub mod error;
pub mod keys;
pub mod node;
pub mod ops;
pub mod outcome;
pub mod phase;
pub mod resolver;

pub use cache::{MetadataCache, ObjectMetadata, Probe};
pub use collection::Collection;
pub use context::{RequestContext, ResolverConfig};
pub use error::{CoreError, Result};
pub use node::{Node, NodeKind, ObjectNode, Properties, RootNode, DEFAULT_CONTENT_TYPE};
pub use ops::Transfer;
pub use outcome::{FailedKey, MutationOutcome, OutcomeState};
pub use phase::{WritePhase, WriteTracker};
pub use resolver::{check_ancestors, resolve, resolve_parent, Intent};
