//! Swift HTTP backend

use crate::{
    escape::quote,
    stream::{DownloadStream, ObjectReader, ObjectWriter, UploadStream},
    Backend, ContainerHeaders, ContainerInfo, ListQuery, ListingEntry, ObjectHeaders, PutOptions,
    Result, Session, StoreError,
};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header, Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument};

/// Rows requested per listing page
const PAGE_SIZE: usize = 10_000;

/// Swift client bound to one authenticated session
#[derive(Clone)]
pub struct SwiftClient {
    session: Session,
    http: Client,
}

impl SwiftClient {
    /// Create a client for the given session
    pub fn new(session: Session) -> Result<Self> {
        url::Url::parse(&session.storage_url)
            .map_err(|e| StoreError::InvalidUrl(format!("{}: {}", session.storage_url, e)))?;

        let http = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .danger_accept_invalid_certs(session.insecure)
            .build()?;

        Ok(Self { session, http })
    }

    /// Get the session
    pub fn session(&self) -> &Session {
        &self.session
    }

    fn account_url(&self) -> String {
        self.session.storage_url.trim_end_matches('/').to_string()
    }

    fn container_url(&self, container: &str) -> String {
        format!("{}/{}", self.account_url(), quote(container))
    }

    fn object_url(&self, container: &str, key: &str) -> String {
        format!("{}/{}", self.container_url(container), quote(key))
    }

    async fn request(
        &self,
        method: Method,
        url: &str,
        query: Option<&[(&str, String)]>,
        headers: Option<Vec<(header::HeaderName, String)>>,
        body: Option<Bytes>,
    ) -> Result<Response> {
        let mut req = self
            .http
            .request(method.clone(), url)
            .header("X-Auth-Token", &self.session.auth_token);

        if let Some(q) = query {
            req = req.query(q);
        }

        if let Some(hdrs) = headers {
            for (k, v) in hdrs {
                req = req.header(k, v);
            }
        }

        if let Some(data) = body {
            req = req.body(data);
        }

        debug!("Sending {} request to {}", method, url);
        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::from_status(status.as_u16(), url));
        }

        Ok(response)
    }

    /// HEAD that maps 404 to `None`
    async fn probe(&self, url: &str) -> Result<Option<Response>> {
        match self.request(Method::HEAD, url, None, None, None).await {
            Ok(response) => Ok(Some(response)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Fetch every page of a JSON listing, following the marker
    async fn list_all<T, F>(&self, url: &str, base: Vec<(&str, String)>, key: F) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
        F: Fn(&T) -> String,
    {
        let mut rows = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let mut query = base.clone();
            query.push(("format", "json".to_string()));
            query.push(("limit", PAGE_SIZE.to_string()));
            if let Some(m) = &marker {
                query.push(("marker", m.clone()));
            }

            let response = self.request(Method::GET, url, Some(&query), None, None).await?;
            if response.status() == StatusCode::NO_CONTENT {
                break;
            }
            let text = response.text().await?;
            if text.trim().is_empty() {
                break;
            }
            let page: Vec<T> = serde_json::from_str(&text)
                .map_err(|e| StoreError::InvalidResponse(format!("{}: {}", url, e)))?;

            let full = page.len() >= PAGE_SIZE;
            marker = page.last().map(&key);
            rows.extend(page);
            if !full || marker.is_none() {
                break;
            }
        }

        Ok(rows)
    }
}

fn header_value(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

fn object_headers(response: &Response) -> ObjectHeaders {
    ObjectHeaders {
        content_length: header_value(response, "content-length")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0),
        content_type: header_value(response, "content-type"),
        etag: header_value(response, "etag").map(|v| v.trim_matches('"').to_string()),
        timestamp: header_value(response, "x-timestamp").and_then(|v| v.parse().ok()),
        last_modified: header_value(response, "last-modified"),
    }
}

#[async_trait]
impl Backend for SwiftClient {
    #[instrument(skip(self))]
    async fn get_account(&self) -> Result<Vec<ContainerInfo>> {
        let url = self.account_url();
        self.list_all(&url, Vec::new(), |c: &ContainerInfo| c.name.clone())
            .await
    }

    #[instrument(skip(self))]
    async fn head_container(&self, container: &str) -> Result<Option<ContainerHeaders>> {
        let url = self.container_url(container);
        Ok(self.probe(&url).await?.map(|response| ContainerHeaders {
            object_count: header_value(&response, "x-container-object-count")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            bytes_used: header_value(&response, "x-container-bytes-used")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            timestamp: header_value(&response, "x-timestamp").and_then(|v| v.parse().ok()),
        }))
    }

    #[instrument(skip(self))]
    async fn put_container(&self, container: &str) -> Result<()> {
        let url = self.container_url(container);
        self.request(Method::PUT, &url, None, None, Some(Bytes::new()))
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_container(&self, container: &str) -> Result<()> {
        let url = self.container_url(container);
        self.request(Method::DELETE, &url, None, None, None).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_container(&self, container: &str, query: &ListQuery) -> Result<Vec<ListingEntry>> {
        let url = self.container_url(container);
        let mut base = Vec::new();
        if let Some(prefix) = &query.prefix {
            base.push(("prefix", prefix.clone()));
        }
        if let Some(delimiter) = query.delimiter {
            base.push(("delimiter", delimiter.to_string()));
        }
        self.list_all(&url, base, |e: &ListingEntry| e.key().to_string())
            .await
    }

    #[instrument(skip(self))]
    async fn head_object(&self, container: &str, key: &str) -> Result<Option<ObjectHeaders>> {
        let url = self.object_url(container, key);
        Ok(self.probe(&url).await?.as_ref().map(object_headers))
    }

    #[instrument(skip(self, data), fields(len = data.len()))]
    async fn put_object(
        &self,
        container: &str,
        key: &str,
        data: Bytes,
        options: PutOptions,
    ) -> Result<()> {
        let url = self.object_url(container, key);
        let mut headers = Vec::new();
        if let Some(ct) = options.content_type {
            headers.push((header::CONTENT_TYPE, ct));
        }
        if let Some(source) = options.copy_from {
            headers.push((header::HeaderName::from_static("x-copy-from"), source));
        }
        self.request(Method::PUT, &url, None, Some(headers), Some(data))
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_object(&self, container: &str, key: &str) -> Result<()> {
        let url = self.object_url(container, key);
        self.request(Method::DELETE, &url, None, None, None).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn open_read(&self, container: &str, key: &str) -> Result<Box<dyn ObjectReader>> {
        let headers = self
            .head_object(container, key)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("{}/{}", container, key)))?;

        Ok(Box::new(DownloadStream::new(
            self.http.clone(),
            self.object_url(container, key),
            self.session.auth_token.clone(),
            headers,
        )))
    }

    #[instrument(skip(self, options))]
    async fn open_write(
        &self,
        container: &str,
        key: &str,
        options: PutOptions,
    ) -> Result<Box<dyn ObjectWriter>> {
        Ok(Box::new(UploadStream::open(
            self.http.clone(),
            self.object_url(container, key),
            self.session.auth_token.clone(),
            options,
        )))
    }
}
