//! COPY and MOVE

use super::{destination_path, outcome_response, overwrite_allowed};
use crate::config::MoveStatus;
use crate::error::DavError;
use axum::{
    http::{HeaderMap, StatusCode},
    response::Response,
};
use skydav_core::{
    keys::sanitize, ops, resolve, Intent, Node, RequestContext, Transfer, WritePhase,
    WriteTracker,
};
use tracing::info;

/// COPY/MOVE - server-side copy of an object, a subtree or a container.
///
/// With `Overwrite: T` the source is merged onto an existing destination;
/// nothing at the destination is deleted first.
pub async fn transfer(
    ctx: &RequestContext,
    path: &str,
    headers: &HeaderMap,
    mode: Transfer,
    collection_status: MoveStatus,
) -> Result<Response, DavError> {
    let destination = destination_path(headers)?;
    let mut tracker = WriteTracker::new(destination.as_str());
    tracker.advance(WritePhase::Resolving)?;

    let source = resolve(ctx, path, Intent::Read)
        .await?
        .ok_or_else(|| DavError::NotFound(path.to_string()))?;
    if matches!(source, Node::Root(_)) {
        return Err(DavError::Forbidden("cannot copy the root".to_string()));
    }
    if sanitize(&destination).trim_matches('/').is_empty() {
        return Err(DavError::Forbidden("cannot replace the root".to_string()));
    }

    let existed = resolve(ctx, &destination, Intent::Read).await?.is_some();
    if existed && !overwrite_allowed(headers) {
        return Err(DavError::PreconditionFailed(format!("{} exists", destination)));
    }

    tracker.advance(WritePhase::CopyingFrom(source.path()))?;
    let outcome = ops::transfer(ctx, &source, &destination, mode).await?;
    tracker.finish(&outcome)?;

    info!(
        source = %source.path(),
        destination = %destination,
        ?mode,
        existed,
        state = ?outcome.state(),
        "Transfer finished"
    );

    let success = if existed {
        StatusCode::NO_CONTENT
    } else if source.is_collection() {
        collection_status.status_code()
    } else {
        StatusCode::CREATED
    };
    outcome_response(&outcome, success)
}

/// COPY
pub async fn copy(
    ctx: &RequestContext,
    path: &str,
    headers: &HeaderMap,
    collection_status: MoveStatus,
) -> Result<Response, DavError> {
    transfer(ctx, path, headers, Transfer::Copy, collection_status).await
}

/// MOVE
pub async fn move_to(
    ctx: &RequestContext,
    path: &str,
    headers: &HeaderMap,
    collection_status: MoveStatus,
) -> Result<Response, DavError> {
    transfer(ctx, path, headers, Transfer::Move, collection_status).await
}
