//! PUT, MKCOL and DELETE

use super::outcome_response;
use crate::error::DavError;
use axum::{
    body::Body,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use skydav_core::{
    check_ancestors, keys::split_path, ops, resolve, resolve_parent, CoreError, Intent,
    MutationOutcome, Node, RequestContext, WritePhase, WriteTracker,
};
use tracing::{debug, info};

fn upload_content_type(headers: &HeaderMap, key: &str) -> Option<String> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| mime_guess::from_path(key).first_raw().map(str::to_string))
}

/// PUT - stream the request body into an object
pub async fn put(
    ctx: &RequestContext,
    path: &str,
    headers: &HeaderMap,
    body: Body,
) -> Result<Response, DavError> {
    let mut tracker = WriteTracker::new(path);
    tracker.advance(WritePhase::Resolving)?;

    let (container, key) = split_path(path).unwrap_or_default();
    if key.is_empty() {
        return Err(DavError::MethodNotAllowed(format!("PUT on collection {}", path)));
    }
    if ctx.backend().head_container(&container).await?.is_none() {
        return Err(DavError::Conflict(format!("container {} does not exist", container)));
    }
    check_ancestors(ctx, path).await?;
    if resolve(ctx, path, Intent::Read)
        .await?
        .is_some_and(|n| n.is_collection())
    {
        return Err(DavError::MethodNotAllowed(format!("PUT on collection {}", path)));
    }

    let Some(Node::Object(mut object)) = resolve(ctx, path, Intent::Write).await? else {
        return Err(DavError::Conflict(path.to_string()));
    };
    let existed = object.exists().await?;
    tracker.advance(if existed {
        WritePhase::Overwriting
    } else {
        WritePhase::Creating
    })?;

    let mut writer = object.open_write(upload_content_type(headers, &key)).await?;
    let mut frames = body.into_data_stream();
    let mut received = 0usize;
    while let Some(frame) = frames.next().await {
        let chunk = frame.map_err(|e| DavError::BadRequest(format!("request body: {}", e)))?;
        received += chunk.len();
        writer.write(chunk).await?;
    }
    writer.close().await?;

    tracker.finish(&MutationOutcome::single())?;
    info!(path = %path, bytes = received, existed, "Object written");

    Ok(if existed {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::CREATED
    }
    .into_response())
}

/// MKCOL - create a container, or a pseudo-directory below one
pub async fn mkcol(ctx: &RequestContext, path: &str) -> Result<Response, DavError> {
    let Some((container, key)) = split_path(path) else {
        return Err(DavError::MethodNotAllowed("MKCOL on the root".to_string()));
    };

    let created = if key.is_empty() {
        ops::create_container(ctx, &container).await
    } else {
        check_ancestors(ctx, path).await?;
        if !resolve_parent(ctx, path)
            .await?
            .is_some_and(|parent| parent.is_collection())
        {
            return Err(DavError::Conflict(format!("parent of {} is not a collection", path)));
        }
        if resolve(ctx, path, Intent::Read).await?.is_some() {
            return Err(DavError::MethodNotAllowed(format!("{} already exists", path)));
        }
        ops::create_directory(ctx, &container, &key).await
    };

    match created {
        Ok(()) => Ok(StatusCode::CREATED.into_response()),
        Err(CoreError::Conflict(existing)) => {
            debug!(path = %existing, "MKCOL target taken");
            Err(DavError::MethodNotAllowed(format!("{} already exists", existing)))
        }
        Err(e) => Err(e.into()),
    }
}

/// DELETE - remove an object, a pseudo-directory tree or a container
pub async fn delete(ctx: &RequestContext, path: &str) -> Result<Response, DavError> {
    let mut tracker = WriteTracker::new(path);
    tracker.advance(WritePhase::Resolving)?;

    let node = resolve(ctx, path, Intent::Read)
        .await?
        .ok_or_else(|| DavError::NotFound(path.to_string()))?;
    if matches!(node, Node::Root(_)) {
        return Err(DavError::MethodNotAllowed("DELETE on the root".to_string()));
    }

    tracker.advance(WritePhase::Deleting)?;
    let outcome = ops::delete(ctx, &node).await?;
    tracker.finish(&outcome)?;

    outcome_response(&outcome, StatusCode::NO_CONTENT)
}
