//! OPTIONS, GET, HEAD and PROPFIND

use super::{multistatus, Depth, ALLOWED_METHODS};
use crate::error::DavError;
use crate::xml::{self, http_date};
use axum::{
    body::Body,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use skydav_core::{resolve, Intent, Node, ObjectNode, Properties, RequestContext};
use skydav_store::ObjectReader;
use tracing::debug;

/// Bytes requested from the backend per body frame
const READ_CHUNK: usize = 64 * 1024;

/// OPTIONS - advertise the supported methods
pub fn options() -> Response {
    (
        StatusCode::OK,
        [
            (header::ALLOW, ALLOWED_METHODS),
            (header::HeaderName::from_static("dav"), "1"),
            (header::HeaderName::from_static("ms-author-via"), "DAV"),
        ],
    )
        .into_response()
}

async fn existing(ctx: &RequestContext, path: &str) -> Result<Node, DavError> {
    resolve(ctx, path, Intent::Read)
        .await?
        .ok_or_else(|| DavError::NotFound(path.to_string()))
}

fn object_headers(props: &Properties) -> Result<HeaderMap, DavError> {
    let mut headers = HeaderMap::new();
    let mut set = |name: header::HeaderName, value: String| -> Result<(), DavError> {
        let value = header::HeaderValue::from_str(&value)
            .map_err(|e| DavError::Internal(format!("bad {} header: {}", name, e)))?;
        headers.insert(name, value);
        Ok(())
    };

    set(header::CONTENT_LENGTH, props.content_length.unwrap_or(0).to_string())?;
    if let Some(ct) = &props.content_type {
        set(header::CONTENT_TYPE, ct.clone())?;
    }
    if let Some(etag) = &props.etag {
        set(header::ETAG, format!("\"{}\"", etag))?;
    }
    set(header::LAST_MODIFIED, http_date(&props.modified))?;
    Ok(headers)
}

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

async fn collection_index(mut node: Node) -> Result<Response, DavError> {
    let path = node.path();
    let children = node.children().await?;

    let mut html = format!(
        "<!DOCTYPE html>\n<html><head><title>Index of {0}</title></head><body>\n<h1>Index of {0}</h1>\n<ul>\n",
        html_escape(&path)
    );
    for child in &children {
        let href = xml::encode_href(&child.path(), child.is_collection());
        let mut name = child.display_name();
        if child.is_collection() {
            name.push('/');
        }
        html.push_str(&format!(
            "<li><a href=\"{}\">{}</a></li>\n",
            html_escape(&href),
            html_escape(&name)
        ));
    }
    html.push_str("</ul>\n</body></html>\n");

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        html,
    )
        .into_response())
}

fn stream_body(reader: Box<dyn ObjectReader>) -> Body {
    let stream = futures::stream::unfold(Some(reader), |state| async move {
        let mut reader = state?;
        match reader.read(READ_CHUNK).await {
            Ok(chunk) if chunk.is_empty() => {
                if let Err(e) = reader.close().await {
                    debug!(error = %e, "Reader close failed");
                }
                None
            }
            Ok(chunk) => Some((Ok(chunk), Some(reader))),
            Err(e) => Some((Err(e), None)),
        }
    });
    Body::from_stream(stream)
}

async fn object_response(mut object: ObjectNode, with_body: bool) -> Result<Response, DavError> {
    let path = object.path();
    if !object.exists().await? {
        return Err(DavError::NotFound(path));
    }
    let props = object.properties().await?;
    let headers = object_headers(&props)?;

    let body = if with_body {
        stream_body(object.open_read().await?)
    } else {
        Body::empty()
    };
    Ok((StatusCode::OK, headers, body).into_response())
}

/// GET - object bytes, or an HTML index for collections
pub async fn get(ctx: &RequestContext, path: &str) -> Result<Response, DavError> {
    match existing(ctx, path).await? {
        Node::Object(object) => object_response(object, true).await,
        collection => collection_index(collection).await,
    }
}

/// HEAD - object metadata without opening the data connection
pub async fn head(ctx: &RequestContext, path: &str) -> Result<Response, DavError> {
    match existing(ctx, path).await? {
        Node::Object(object) => object_response(object, false).await,
        _ => Ok((
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        )
            .into_response()),
    }
}

/// PROPFIND - properties of the target and, unless `Depth: 0`, its children
pub async fn propfind(ctx: &RequestContext, path: &str, headers: &HeaderMap) -> Result<Response, DavError> {
    let depth = Depth::from_headers(headers);
    let mut node = existing(ctx, path).await?;

    let mut entries = vec![(node.path(), node.properties().await?)];
    if depth == Depth::One && node.is_collection() {
        for mut child in node.children().await? {
            let props = child.properties().await?;
            entries.push((child.path(), props));
        }
    }
    debug!(path = %path, ?depth, entries = entries.len(), "PROPFIND");

    let body = xml::propfind_multistatus(&entries).map_err(|e| DavError::Internal(e.to_string()))?;
    Ok(multistatus(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_advertises_methods() {
        let response = options();
        assert_eq!(response.status(), StatusCode::OK);
        let allow = response.headers().get(header::ALLOW).unwrap().to_str().unwrap();
        assert!(allow.contains("PROPFIND"));
        assert!(allow.contains("MKCOL"));
        assert_eq!(response.headers().get("dav").unwrap(), "1");
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("<a & \"b\">"), "&lt;a &amp; &quot;b&quot;&gt;");
    }
}
