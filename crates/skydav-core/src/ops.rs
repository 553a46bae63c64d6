//! Mutations: create, delete, copy and move over resolved nodes.
//!
//! The backend has no rename and no recursive primitive. Subtree and
//! container operations are sequences of independent per-object calls,
//! awaited one after another; a failing child never stops the rest and
//! ends up in the returned [`MutationOutcome`].

use crate::{
    keys::{client_path, marker_key, rebase, sanitize, split_path},
    node::Node,
    resolver::{check_ancestors, resolve, Intent},
    CoreError, MutationOutcome, RequestContext, Result,
};
use bytes::Bytes;
use skydav_store::{copy_source, ListQuery, ListingEntry, PutOptions, DELIMITER};
use tracing::{debug, error, info, instrument, warn};

/// Copy or move
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transfer {
    Copy,
    Move,
}

impl Transfer {
    pub fn is_move(self) -> bool {
        self == Self::Move
    }
}

// ==================== Create ====================

/// Create a container. Fails with `Conflict` if it exists.
#[instrument(skip(ctx))]
pub async fn create_container(ctx: &RequestContext, name: &str) -> Result<()> {
    let name = name.trim_matches(DELIMITER);
    if name.is_empty() || name.contains(DELIMITER) {
        return Err(CoreError::InvalidPath(name.to_string()));
    }
    if ctx.backend().head_container(name).await?.is_some() {
        return Err(CoreError::Conflict(client_path(name, "")));
    }
    ctx.backend().put_container(name).await?;
    info!(container = %name, "Container created");
    Ok(())
}

/// Create a pseudo-directory by writing its marker object.
///
/// Fails with `Conflict` when an object already exists at `key` or at the
/// marker key: a name cannot be a file and a folder at once.
#[instrument(skip(ctx))]
pub async fn create_directory(ctx: &RequestContext, container: &str, key: &str) -> Result<()> {
    let name = sanitize(key);
    let name = name.trim_matches(DELIMITER);
    if name.is_empty() {
        return Err(CoreError::InvalidPath(client_path(container, key)));
    }
    let marker = marker_key(name);

    for probe in [name, marker.as_str()] {
        if ctx.backend().head_object(container, probe).await?.is_some() {
            return Err(CoreError::Conflict(client_path(container, probe)));
        }
    }

    ctx.backend()
        .put_object(container, &marker, Bytes::new(), PutOptions::directory_marker())
        .await?;
    info!(container = %container, marker = %marker, "Pseudo-directory created");
    Ok(())
}

// ==================== Enumerate ====================

/// Every real object key below `prefix`, walked with grouped listings.
/// The object at exactly `prefix` (the marker) is included only when asked.
async fn enumerate(
    ctx: &RequestContext,
    container: &str,
    prefix: &str,
    include_marker: bool,
) -> Result<Vec<String>> {
    let mut keys = Vec::new();
    let mut pending = vec![prefix.to_string()];

    while let Some(current) = pending.pop() {
        let rows = ctx
            .backend()
            .get_container(container, &ListQuery::grouped(current.clone()))
            .await?;

        for row in rows {
            match row {
                ListingEntry::Subdir { subdir } => {
                    if subdir != current {
                        pending.push(subdir);
                    }
                }
                ListingEntry::Object(info) => {
                    if info.name == prefix && !include_marker {
                        continue;
                    }
                    keys.push(info.name);
                }
            }
        }
    }

    keys.sort();
    keys.dedup();
    debug!(container = %container, prefix = %prefix, count = keys.len(), "Enumerated subtree");
    Ok(keys)
}

/// Whether a directory-typed object sits at `prefix` without its trailing
/// delimiter (markers written by other tools)
async fn bare_marker(ctx: &RequestContext, container: &str, prefix: &str) -> Result<Option<String>> {
    let bare = prefix.trim_end_matches(DELIMITER);
    if bare.is_empty() {
        return Ok(None);
    }
    let headers = ctx.backend().head_object(container, bare).await?;
    Ok(headers
        .filter(|h| h.is_directory())
        .map(|_| bare.to_string()))
}

// ==================== Delete ====================

/// Delete whatever `node` is
pub async fn delete(ctx: &RequestContext, node: &Node) -> Result<MutationOutcome> {
    match node {
        Node::Root(_) => Err(CoreError::Conflict("/".to_string())),
        Node::Container(c) => delete_container(ctx, c.container()).await,
        Node::PseudoDirectory(c) => delete_tree(ctx, c.container(), c.prefix()).await,
        Node::Object(o) => delete_object(ctx, o.container(), o.key()).await,
    }
}

/// Delete one object. Any failure is treated as already gone.
#[instrument(skip(ctx))]
pub async fn delete_object(ctx: &RequestContext, container: &str, key: &str) -> Result<MutationOutcome> {
    if let Err(e) = ctx.backend().delete_object(container, key).await {
        if !e.is_not_found() {
            warn!(container = %container, key = %key, error = %e, "Delete failed, ignoring");
        }
    }
    Ok(MutationOutcome::single())
}

/// Delete every object below `prefix`, then its marker.
///
/// The marker is only removed once every child is gone, so a partial
/// failure leaves the directory visible.
#[instrument(skip(ctx))]
pub async fn delete_tree(ctx: &RequestContext, container: &str, prefix: &str) -> Result<MutationOutcome> {
    let prefix = marker_key(prefix);
    let keys = enumerate(ctx, container, &prefix, false).await?;

    let mut outcome = MutationOutcome::new();
    delete_keys(ctx, container, &keys, &mut outcome).await;

    if !outcome.is_committed() {
        warn!(
            container = %container,
            prefix = %prefix,
            failed = outcome.failed.len(),
            "Directory delete incomplete, keeping marker"
        );
        return Ok(outcome);
    }

    match ctx.backend().delete_object(container, &prefix).await {
        Ok(()) => outcome.record_success(),
        Err(e) if e.is_not_found() => {
            if let Some(bare) = bare_marker(ctx, container, &prefix).await? {
                match ctx.backend().delete_object(container, &bare).await {
                    Ok(()) => outcome.record_success(),
                    Err(e) if e.is_not_found() => {}
                    Err(e) => outcome.record_failure(client_path(container, &bare), e),
                }
            }
        }
        Err(e) => outcome.record_failure(client_path(container, &prefix), e),
    }

    Ok(outcome)
}

/// Empty a container, then delete it.
///
/// The container itself is only deleted when every object is gone; a
/// refusal at that point is fatal.
#[instrument(skip(ctx))]
pub async fn delete_container(ctx: &RequestContext, container: &str) -> Result<MutationOutcome> {
    let keys = enumerate(ctx, container, "", true).await?;

    let mut outcome = MutationOutcome::new();
    delete_keys(ctx, container, &keys, &mut outcome).await;

    if !outcome.is_committed() {
        warn!(container = %container, failed = outcome.failed.len(), "Container not emptied");
        return Ok(outcome);
    }

    match ctx.backend().delete_container(container).await {
        Ok(()) => {
            outcome.record_success();
            info!(container = %container, "Container deleted");
            Ok(outcome)
        }
        Err(e) if e.is_not_found() => Ok(outcome),
        Err(e) => {
            error!(container = %container, error = %e, "Container delete failed");
            Err(CoreError::Fatal(format!("{}: {}", client_path(container, ""), e)))
        }
    }
}

async fn delete_keys(ctx: &RequestContext, container: &str, keys: &[String], outcome: &mut MutationOutcome) {
    for key in keys {
        match ctx.backend().delete_object(container, key).await {
            Ok(()) => outcome.record_success(),
            Err(e) if e.is_not_found() => outcome.record_success(),
            Err(e) => {
                warn!(container = %container, key = %key, error = %e, "Child delete failed");
                outcome.record_failure(client_path(container, key), e);
            }
        }
    }
}

// ==================== Copy / Move ====================

/// Copy or move `node` to the client path `destination`.
///
/// An existing destination must be of the same kind as the source, and
/// nothing above it may be an object.
pub async fn transfer(
    ctx: &RequestContext,
    node: &Node,
    destination: &str,
    mode: Transfer,
) -> Result<MutationOutcome> {
    let (dst_container, dst_key) = split_path(&sanitize(destination))
        .ok_or_else(|| CoreError::Conflict("/".to_string()))?;

    check_ancestors(ctx, destination).await?;
    if let Some(existing) = resolve(ctx, destination, Intent::Read).await? {
        if existing.is_collection() != node.is_collection() {
            return Err(CoreError::Conflict(existing.path()));
        }
    }

    match node {
        Node::Root(_) => Err(CoreError::Conflict("/".to_string())),
        Node::Object(o) => {
            copy_object(ctx, o.container(), o.key(), &dst_container, &dst_key, mode).await
        }
        Node::PseudoDirectory(c) => {
            let dst_prefix = if dst_key.is_empty() {
                String::new()
            } else {
                marker_key(&dst_key)
            };
            copy_tree(ctx, c.container(), c.prefix(), &dst_container, &dst_prefix, mode).await
        }
        Node::Container(c) => copy_container(ctx, c.container(), &dst_container, &dst_key, mode).await,
    }
}

async fn ensure_container(ctx: &RequestContext, container: &str) -> Result<()> {
    if ctx.backend().head_container(container).await?.is_none() {
        debug!(container = %container, "Creating destination container");
        ctx.backend().put_container(container).await?;
    }
    Ok(())
}

async fn server_copy(
    ctx: &RequestContext,
    src_container: &str,
    src_key: &str,
    dst_container: &str,
    dst_key: &str,
) -> skydav_store::Result<()> {
    let options = PutOptions::new().with_copy_from(copy_source(src_container, src_key));
    ctx.backend()
        .put_object(dst_container, dst_key, Bytes::new(), options)
        .await
}

/// Copy one object with a server-side copy; a move then deletes the source.
///
/// The copy decides success. A source that cannot be deleted afterwards is
/// logged and left behind.
#[instrument(skip(ctx))]
pub async fn copy_object(
    ctx: &RequestContext,
    src_container: &str,
    src_key: &str,
    dst_container: &str,
    dst_key: &str,
    mode: Transfer,
) -> Result<MutationOutcome> {
    let dst_key = dst_key.trim_matches(DELIMITER);
    if dst_key.is_empty() {
        return Err(CoreError::Conflict(client_path(dst_container, "")));
    }
    if src_container == dst_container && src_key == dst_key {
        return Err(CoreError::InvalidTarget(client_path(dst_container, dst_key)));
    }

    if src_container != dst_container {
        ensure_container(ctx, dst_container).await?;
    }

    server_copy(ctx, src_container, src_key, dst_container, dst_key).await?;

    if mode.is_move() {
        if let Err(e) = ctx.backend().delete_object(src_container, src_key).await {
            if !e.is_not_found() {
                warn!(
                    source = %client_path(src_container, src_key),
                    error = %e,
                    "Moved object but could not delete source"
                );
            }
        }
    }

    Ok(MutationOutcome::single())
}

/// Copy `keys` from `src_prefix` to `dst_prefix`, one object at a time
#[allow(clippy::too_many_arguments)]
async fn copy_keys(
    ctx: &RequestContext,
    src_container: &str,
    src_prefix: &str,
    keys: &[String],
    dst_container: &str,
    dst_prefix: &str,
    mode: Transfer,
    outcome: &mut MutationOutcome,
) {
    for key in keys {
        let Some(new_key) = rebase(key, src_prefix, dst_prefix) else {
            continue;
        };
        let src_path = client_path(src_container, key);

        // a marker moved onto a container root has nowhere to go
        if !new_key.is_empty() {
            if let Err(e) = server_copy(ctx, src_container, key, dst_container, &new_key).await {
                warn!(source = %src_path, error = %e, "Child copy failed");
                outcome.record_failure(src_path, e);
                continue;
            }
        }

        if mode.is_move() {
            match ctx.backend().delete_object(src_container, key).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    warn!(source = %src_path, error = %e, "Child source delete failed");
                    outcome.record_failure(src_path, e);
                    continue;
                }
            }
        }

        outcome.record_success();
    }
}

/// Copy or move every object below `src_prefix` to `dst_prefix`
/// (empty for a container root), rewriting each key.
#[instrument(skip(ctx))]
pub async fn copy_tree(
    ctx: &RequestContext,
    src_container: &str,
    src_prefix: &str,
    dst_container: &str,
    dst_prefix: &str,
    mode: Transfer,
) -> Result<MutationOutcome> {
    let src_prefix = marker_key(src_prefix);
    let dst_prefix = if dst_prefix.is_empty() {
        String::new()
    } else {
        marker_key(dst_prefix)
    };
    let dst_prefix = dst_prefix.as_str();
    if src_container == dst_container && dst_prefix.starts_with(&src_prefix) {
        return Err(CoreError::InvalidTarget(client_path(dst_container, dst_prefix)));
    }

    if src_container != dst_container {
        ensure_container(ctx, dst_container).await?;
    }

    let mut keys = enumerate(ctx, src_container, &src_prefix, true).await?;
    // marker last, so a failed child keeps the source directory visible
    keys.sort_by_key(|k| *k == src_prefix);
    let mut outcome = MutationOutcome::new();
    copy_keys(
        ctx,
        src_container,
        &src_prefix,
        &keys,
        dst_container,
        dst_prefix,
        mode,
        &mut outcome,
    )
    .await;

    if !keys.contains(&src_prefix) {
        if let Some(bare) = bare_marker(ctx, src_container, &src_prefix).await? {
            carry_bare_marker(ctx, src_container, &bare, dst_container, dst_prefix, mode, &mut outcome)
                .await;
        }
    }

    info!(
        source = %client_path(src_container, &src_prefix),
        destination = %client_path(dst_container, dst_prefix),
        succeeded = outcome.succeeded,
        failed = outcome.failed.len(),
        ?mode,
        "Subtree transfer finished"
    );
    Ok(outcome)
}

async fn carry_bare_marker(
    ctx: &RequestContext,
    src_container: &str,
    bare: &str,
    dst_container: &str,
    dst_prefix: &str,
    mode: Transfer,
    outcome: &mut MutationOutcome,
) {
    if !dst_prefix.is_empty() {
        let written = ctx
            .backend()
            .put_object(dst_container, dst_prefix, Bytes::new(), PutOptions::directory_marker())
            .await;
        if let Err(e) = written {
            outcome.record_failure(client_path(dst_container, dst_prefix), e);
            return;
        }
    }
    if mode.is_move() && outcome.is_committed() {
        match ctx.backend().delete_object(src_container, bare).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => {
                outcome.record_failure(client_path(src_container, bare), e);
                return;
            }
        }
    }
    outcome.record_success();
}

/// Copy or move a whole container to another container's root
/// (`dst_key` empty) or below a key of another container.
///
/// A move deletes the source container last, and only if every object
/// made it across.
#[instrument(skip(ctx))]
pub async fn copy_container(
    ctx: &RequestContext,
    src_container: &str,
    dst_container: &str,
    dst_key: &str,
    mode: Transfer,
) -> Result<MutationOutcome> {
    if src_container == dst_container {
        return Err(CoreError::InvalidTarget(client_path(dst_container, dst_key)));
    }

    let dst_key = dst_key.trim_matches(DELIMITER);
    let dst_prefix = if dst_key.is_empty() {
        String::new()
    } else {
        marker_key(dst_key)
    };

    let keys = enumerate(ctx, src_container, "", true).await?;
    let mut outcome = MutationOutcome::new();

    ensure_container(ctx, dst_container).await?;
    if keys.is_empty() {
        if !dst_prefix.is_empty() {
            ctx.backend()
                .put_object(dst_container, &dst_prefix, Bytes::new(), PutOptions::directory_marker())
                .await?;
        }
        outcome.record_success();
    } else {
        copy_keys(
            ctx,
            src_container,
            "",
            &keys,
            dst_container,
            &dst_prefix,
            mode,
            &mut outcome,
        )
        .await;
    }

    if mode.is_move() && outcome.is_committed() {
        match ctx.backend().delete_container(src_container).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => {
                warn!(container = %src_container, error = %e, "Source container not deleted");
                outcome.record_failure(client_path(src_container, ""), e);
            }
        }
    }

    info!(
        source = %client_path(src_container, ""),
        destination = %client_path(dst_container, dst_key),
        succeeded = outcome.succeeded,
        failed = outcome.failed.len(),
        ?mode,
        "Container transfer finished"
    );
    Ok(outcome)
}
