//! Streaming adapters between file-like reads/writes and HTTP bodies

use crate::{ObjectHeaders, PutOptions, Result, StoreError};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::channel::mpsc;
use futures::SinkExt;
use reqwest::{Client, Response};
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

/// Frames buffered between `write` and the request body
const UPLOAD_QUEUE: usize = 8;

/// Sequential reader over one object's content
#[async_trait]
pub trait ObjectReader: Send {
    /// Read up to `size` bytes; `0` reads everything left.
    /// An empty result means end of stream.
    async fn read(&mut self, size: usize) -> Result<Bytes>;

    /// Release the underlying request
    async fn close(&mut self) -> Result<()>;

    /// Headers fetched when the reader was opened
    fn headers(&self) -> &ObjectHeaders;
}

/// Sequential writer into one object
#[async_trait]
pub trait ObjectWriter: Send {
    /// Append bytes; an empty slice is ignored
    async fn write(&mut self, data: Bytes) -> Result<()>;

    /// Finish the upload. Calling it again is a no-op.
    async fn close(&mut self) -> Result<()>;
}

/// Lazily-fetched download of a Swift object.
///
/// Metadata comes from a HEAD at open time; the GET is only issued on the
/// first `read`.
pub struct DownloadStream {
    http: Client,
    url: String,
    token: String,
    headers: ObjectHeaders,
    response: Option<Response>,
    buffer: BytesMut,
    exhausted: bool,
    closed: bool,
}

impl DownloadStream {
    pub(crate) fn new(http: Client, url: String, token: String, headers: ObjectHeaders) -> Self {
        Self {
            http,
            url,
            token,
            headers,
            response: None,
            buffer: BytesMut::new(),
            exhausted: false,
            closed: false,
        }
    }

    /// Whether the body request has been issued
    pub fn is_open(&self) -> bool {
        self.response.is_some()
    }

    async fn ensure_response(&mut self) -> Result<()> {
        if self.response.is_some() || self.exhausted {
            return Ok(());
        }

        debug!(url = %self.url, "Opening object body");
        let response = self
            .http
            .get(&self.url)
            .header("X-Auth-Token", &self.token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::from_status(status.as_u16(), self.url.clone()));
        }

        self.response = Some(response);
        Ok(())
    }

    async fn fill(&mut self, wanted: usize) -> Result<()> {
        while !self.exhausted && self.buffer.len() < wanted {
            let Some(response) = self.response.as_mut() else {
                break;
            };
            match response.chunk().await? {
                Some(chunk) => self.buffer.extend_from_slice(&chunk),
                None => {
                    self.exhausted = true;
                    self.response = None;
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectReader for DownloadStream {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn read(&mut self, size: usize) -> Result<Bytes> {
        if self.closed {
            return Err(StoreError::Closed(self.url.clone()));
        }

        let wanted = if size == 0 { usize::MAX } else { size };
        if self.buffer.len() < wanted {
            self.ensure_response().await?;
            self.fill(wanted).await?;
        }

        let n = wanted.min(self.buffer.len());
        Ok(self.buffer.split_to(n).freeze())
    }

    async fn close(&mut self) -> Result<()> {
        self.response = None;
        self.buffer.clear();
        self.closed = true;
        Ok(())
    }

    fn headers(&self) -> &ObjectHeaders {
        &self.headers
    }
}

type Frame = std::result::Result<Bytes, std::io::Error>;

/// Chunked upload of a Swift object.
///
/// The PUT runs in a background task fed through a bounded channel; every
/// `write` becomes one chunk of the request body and `close` ends it.
pub struct UploadStream {
    target: String,
    sender: Option<mpsc::Sender<Frame>>,
    task: Option<JoinHandle<Result<()>>>,
    // set once the upload failed; every later call reports it
    failure: Option<String>,
}

impl UploadStream {
    pub(crate) fn open(http: Client, url: String, token: String, options: PutOptions) -> Self {
        let (sender, receiver) = mpsc::channel::<Frame>(UPLOAD_QUEUE);
        let target = url.clone();

        let task = tokio::spawn(async move {
            let mut request = http
                .put(&url)
                .header("X-Auth-Token", token)
                .body(reqwest::Body::wrap_stream(receiver));
            if let Some(ct) = options.content_type {
                request = request.header(reqwest::header::CONTENT_TYPE, ct);
            }

            let response = request.send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(StoreError::from_status(status.as_u16(), url));
            }
            debug!(url = %url, "Upload committed");
            Ok(())
        });

        Self {
            target,
            sender: Some(sender),
            task: Some(task),
            failure: None,
        }
    }

    fn failed(&self) -> Option<StoreError> {
        self.failure
            .as_ref()
            .map(|reason| StoreError::Closed(format!("{}: {}", self.target, reason)))
    }

    async fn finish(&mut self) -> Result<()> {
        self.sender = None;
        let result = match self.task.take() {
            Some(task) => task
                .await
                .map_err(|e| StoreError::Closed(format!("{}: {}", self.target, e)))
                .and_then(|uploaded| uploaded),
            None => Ok(()),
        };
        if let Err(e) = &result {
            self.failure = Some(e.to_string());
        }
        result
    }
}

#[async_trait]
impl ObjectWriter for UploadStream {
    #[instrument(skip(self, data), fields(url = %self.target, len = data.len()))]
    async fn write(&mut self, data: Bytes) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }

        if let Some(e) = self.failed() {
            return Err(e);
        }
        let Some(sender) = self.sender.as_mut() else {
            return Err(StoreError::Closed(self.target.clone()));
        };

        if sender.send(Ok(data)).await.is_err() {
            // request ended early; surface its error if it has one
            self.finish().await?;
            self.failure = Some("request ended before the body was sent".to_string());
            return Err(StoreError::Closed(self.target.clone()));
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(e) = self.failed() {
            return Err(e);
        }
        if self.sender.is_none() && self.task.is_none() {
            return Ok(());
        }
        self.finish().await
    }
}

impl Drop for UploadStream {
    fn drop(&mut self) {
        if self.task.is_some() {
            warn!(url = %self.target, "Upload dropped without close; object may be truncated");
        }
    }
}
