//! Path resolution

use crate::{
    cache::Probe,
    collection::Collection,
    keys::{client_path, sanitize, split_path},
    node::{Node, RootNode},
    CoreError, RequestContext, Result,
};
use skydav_store::DELIMITER;
use tracing::{debug, instrument};

/// What the caller is about to do with the target
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intent {
    /// Read, list, delete or use as a copy source
    Read,
    /// Upload a body to the target
    Write,
}

/// Resolve a client path to a node.
///
/// `Ok(None)` means nothing is there: the container is missing, or no
/// object, marker or prefix matches the key. Backend probes that answer
/// 404 are never reported as errors.
#[instrument(skip(ctx))]
pub async fn resolve(ctx: &RequestContext, path: &str, intent: Intent) -> Result<Option<Node>> {
    let clean = sanitize(path);
    let Some((container, key)) = split_path(&clean) else {
        return Ok(Some(Node::Root(RootNode::new(ctx.clone()))));
    };

    if ctx.backend().head_container(&container).await?.is_none() {
        debug!(container = %container, "Container not found");
        return Ok(None);
    }

    let mut root = Collection::new(ctx.clone(), container, "");
    if key.is_empty() {
        return Ok(Some(Node::Container(root)));
    }

    root.member(&key, intent).await
}

/// Resolve the collection that would hold `path`
pub async fn resolve_parent(ctx: &RequestContext, path: &str) -> Result<Option<Node>> {
    let clean = sanitize(path);
    let trimmed = clean.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => resolve(ctx, &trimmed[..idx], Intent::Read).await,
        None => Ok(Some(Node::Root(RootNode::new(ctx.clone())))),
    }
}

/// Fail with `Conflict` when a key above `path` inside its container is
/// an object. Anything written below a file would hide it.
#[instrument(skip(ctx))]
pub async fn check_ancestors(ctx: &RequestContext, path: &str) -> Result<()> {
    let clean = sanitize(path);
    let Some((container, key)) = split_path(&clean) else {
        return Ok(());
    };
    let key = key.trim_end_matches(DELIMITER);

    let mut root = Collection::new(ctx.clone(), container.clone(), "");
    for (idx, _) in key.match_indices(DELIMITER) {
        let ancestor = &key[..idx];
        if root.is_subdir(ancestor).await? == Probe::Object {
            debug!(container = %container, ancestor, "Object in the way");
            return Err(CoreError::Conflict(client_path(&container, ancestor)));
        }
    }
    Ok(())
}
