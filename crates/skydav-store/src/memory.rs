//! In-memory object store for tests and local runs

use crate::{
    escape::parse_copy_source,
    stream::{ObjectReader, ObjectWriter},
    Backend, ContainerHeaders, ContainerInfo, ListQuery, ListingEntry, ObjectHeaders, ObjectInfo,
    PutOptions, Result, StoreError,
};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// A backend request, as seen by the memory store
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackendCall {
    GetAccount,
    HeadContainer(String),
    PutContainer(String),
    DeleteContainer(String),
    GetContainer {
        container: String,
        prefix: Option<String>,
        delimiter: Option<char>,
    },
    HeadObject(String, String),
    PutObject {
        container: String,
        key: String,
        copy_from: Option<String>,
    },
    DeleteObject(String, String),
    OpenRead(String, String),
    /// Body fetch, issued on the first read of an opened reader
    Get(String, String),
    WriteChunk { key: String, len: usize },
    WriteFinish(String),
}

/// Operations that can be made to fail
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailOp {
    PutObject,
    DeleteObject,
    DeleteContainer,
}

#[derive(Clone, Debug)]
struct StoredObject {
    data: Bytes,
    content_type: String,
    etag: String,
    modified: DateTime<Utc>,
}

impl StoredObject {
    fn new(data: Bytes, content_type: String) -> Self {
        let etag = hex::encode(Md5::digest(&data));
        Self {
            data,
            content_type,
            etag,
            modified: Utc::now(),
        }
    }

    fn headers(&self) -> ObjectHeaders {
        ObjectHeaders {
            content_length: self.data.len() as u64,
            content_type: Some(self.content_type.clone()),
            etag: Some(self.etag.clone()),
            timestamp: Some(epoch_seconds(&self.modified)),
            last_modified: Some(self.modified.to_rfc2822()),
        }
    }

    fn info(&self, name: &str) -> ObjectInfo {
        ObjectInfo {
            name: name.to_string(),
            bytes: self.data.len() as u64,
            hash: self.etag.clone(),
            content_type: self.content_type.clone(),
            last_modified: Some(self.modified.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()),
        }
    }
}

#[derive(Debug)]
struct StoredContainer {
    objects: BTreeMap<String, StoredObject>,
    created: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    containers: RwLock<BTreeMap<String, StoredContainer>>,
    calls: Mutex<Vec<BackendCall>>,
    failures: Mutex<HashSet<(FailOp, String, String)>>,
}

/// An in-memory object store with Swift listing semantics
#[derive(Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Inner>,
}

fn epoch_seconds(t: &DateTime<Utc>) -> f64 {
    t.timestamp_micros() as f64 / 1_000_000.0
}

fn target(container: &str, key: &str) -> String {
    format!("{}/{}", container, key)
}

impl MemoryBackend {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call made so far, oldest first
    pub fn calls(&self) -> Vec<BackendCall> {
        self.inner.calls.lock().clone()
    }

    /// Forget recorded calls
    pub fn clear_calls(&self) {
        self.inner.calls.lock().clear();
    }

    /// Make `op` on `container`/`key` fail with a 503.
    /// For container operations pass an empty key.
    pub fn inject_failure(&self, op: FailOp, container: &str, key: &str) {
        self.inner
            .failures
            .lock()
            .insert((op, container.to_string(), key.to_string()));
    }

    /// Remove all injected failures
    pub fn clear_failures(&self) {
        self.inner.failures.lock().clear();
    }

    /// Container names, sorted
    pub fn container_names(&self) -> Vec<String> {
        self.inner.containers.read().keys().cloned().collect()
    }

    /// Object keys of a container, sorted
    pub fn object_keys(&self, container: &str) -> Vec<String> {
        self.inner
            .containers
            .read()
            .get(container)
            .map(|c| c.objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Object content, bypassing call recording
    pub fn object_data(&self, container: &str, key: &str) -> Option<Bytes> {
        self.inner
            .containers
            .read()
            .get(container)
            .and_then(|c| c.objects.get(key))
            .map(|o| o.data.clone())
    }

    /// Object content type, bypassing call recording
    pub fn object_content_type(&self, container: &str, key: &str) -> Option<String> {
        self.inner
            .containers
            .read()
            .get(container)
            .and_then(|c| c.objects.get(key))
            .map(|o| o.content_type.clone())
    }

    fn record(&self, call: BackendCall) {
        self.inner.calls.lock().push(call);
    }

    fn check_failure(&self, op: FailOp, container: &str, key: &str) -> Result<()> {
        let failing = self
            .inner
            .failures
            .lock()
            .contains(&(op, container.to_string(), key.to_string()));
        if failing {
            return Err(StoreError::Status {
                status: 503,
                target: target(container, key),
            });
        }
        Ok(())
    }

    fn store(&self, container: &str, key: &str, object: StoredObject) -> Result<()> {
        let mut containers = self.inner.containers.write();
        let stored = containers
            .get_mut(container)
            .ok_or_else(|| StoreError::NotFound(container.to_string()))?;
        stored.objects.insert(key.to_string(), object);
        Ok(())
    }

    fn lookup(&self, container: &str, key: &str) -> Result<StoredObject> {
        let containers = self.inner.containers.read();
        containers
            .get(container)
            .and_then(|c| c.objects.get(key))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(target(container, key)))
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn get_account(&self) -> Result<Vec<ContainerInfo>> {
        self.record(BackendCall::GetAccount);
        let containers = self.inner.containers.read();
        Ok(containers
            .iter()
            .map(|(name, c)| ContainerInfo {
                name: name.clone(),
                count: c.objects.len() as u64,
                bytes: c.objects.values().map(|o| o.data.len() as u64).sum(),
            })
            .collect())
    }

    async fn head_container(&self, container: &str) -> Result<Option<ContainerHeaders>> {
        self.record(BackendCall::HeadContainer(container.to_string()));
        let containers = self.inner.containers.read();
        Ok(containers.get(container).map(|c| ContainerHeaders {
            object_count: c.objects.len() as u64,
            bytes_used: c.objects.values().map(|o| o.data.len() as u64).sum(),
            timestamp: Some(epoch_seconds(&c.created)),
        }))
    }

    async fn put_container(&self, container: &str) -> Result<()> {
        self.record(BackendCall::PutContainer(container.to_string()));
        self.inner
            .containers
            .write()
            .entry(container.to_string())
            .or_insert_with(|| StoredContainer {
                objects: BTreeMap::new(),
                created: Utc::now(),
            });
        Ok(())
    }

    async fn delete_container(&self, container: &str) -> Result<()> {
        self.record(BackendCall::DeleteContainer(container.to_string()));
        self.check_failure(FailOp::DeleteContainer, container, "")?;

        let mut containers = self.inner.containers.write();
        match containers.get(container) {
            None => Err(StoreError::NotFound(container.to_string())),
            Some(c) if !c.objects.is_empty() => Err(StoreError::Conflict(container.to_string())),
            Some(_) => {
                containers.remove(container);
                Ok(())
            }
        }
    }

    async fn get_container(&self, container: &str, query: &ListQuery) -> Result<Vec<ListingEntry>> {
        self.record(BackendCall::GetContainer {
            container: container.to_string(),
            prefix: query.prefix.clone(),
            delimiter: query.delimiter,
        });

        let containers = self.inner.containers.read();
        let stored = containers
            .get(container)
            .ok_or_else(|| StoreError::NotFound(container.to_string()))?;

        let prefix = query.prefix.as_deref().unwrap_or("");
        let mut rows = Vec::new();
        let mut groups = BTreeSet::new();

        for (name, object) in stored.objects.range(prefix.to_string()..) {
            let Some(rest) = name.strip_prefix(prefix) else {
                break;
            };

            let group = query
                .delimiter
                .and_then(|d| rest.find(d).map(|idx| &name[..prefix.len() + idx + d.len_utf8()]));

            match group {
                Some(subdir) => {
                    if groups.insert(subdir.to_string()) {
                        rows.push(ListingEntry::Subdir {
                            subdir: subdir.to_string(),
                        });
                    }
                }
                None => rows.push(ListingEntry::Object(object.info(name))),
            }
        }

        Ok(rows)
    }

    async fn head_object(&self, container: &str, key: &str) -> Result<Option<ObjectHeaders>> {
        self.record(BackendCall::HeadObject(container.to_string(), key.to_string()));
        let containers = self.inner.containers.read();
        Ok(containers
            .get(container)
            .and_then(|c| c.objects.get(key))
            .map(StoredObject::headers))
    }

    async fn put_object(
        &self,
        container: &str,
        key: &str,
        data: Bytes,
        options: PutOptions,
    ) -> Result<()> {
        self.record(BackendCall::PutObject {
            container: container.to_string(),
            key: key.to_string(),
            copy_from: options.copy_from.clone(),
        });
        self.check_failure(FailOp::PutObject, container, key)?;

        let object = match &options.copy_from {
            Some(source) => {
                let (src_container, src_key) = parse_copy_source(source)
                    .ok_or_else(|| StoreError::InvalidResponse(format!("bad copy source {}", source)))?;
                let mut copied = self.lookup(&src_container, &src_key)?;
                if let Some(ct) = options.content_type {
                    copied.content_type = ct;
                }
                copied.modified = Utc::now();
                copied
            }
            None => StoredObject::new(
                data,
                options
                    .content_type
                    .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
            ),
        };

        self.store(container, key, object)
    }

    async fn delete_object(&self, container: &str, key: &str) -> Result<()> {
        self.record(BackendCall::DeleteObject(container.to_string(), key.to_string()));
        self.check_failure(FailOp::DeleteObject, container, key)?;

        let mut containers = self.inner.containers.write();
        containers
            .get_mut(container)
            .and_then(|c| c.objects.remove(key))
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(target(container, key)))
    }

    async fn open_read(&self, container: &str, key: &str) -> Result<Box<dyn ObjectReader>> {
        self.record(BackendCall::OpenRead(container.to_string(), key.to_string()));
        let object = self.lookup(container, key)?;
        Ok(Box::new(MemoryReader {
            backend: self.clone(),
            container: container.to_string(),
            key: key.to_string(),
            headers: object.headers(),
            data: object.data,
            fetched: false,
            closed: false,
        }))
    }

    async fn open_write(
        &self,
        container: &str,
        key: &str,
        options: PutOptions,
    ) -> Result<Box<dyn ObjectWriter>> {
        if !self.inner.containers.read().contains_key(container) {
            return Err(StoreError::NotFound(container.to_string()));
        }
        Ok(Box::new(MemoryWriter {
            backend: self.clone(),
            container: container.to_string(),
            key: key.to_string(),
            content_type: options
                .content_type
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
            buffer: BytesMut::new(),
            closed: false,
        }))
    }
}

/// Reader over a snapshot of an object
pub struct MemoryReader {
    backend: MemoryBackend,
    container: String,
    key: String,
    headers: ObjectHeaders,
    data: Bytes,
    fetched: bool,
    closed: bool,
}

impl MemoryReader {
    /// Whether the body has been fetched
    pub fn is_open(&self) -> bool {
        self.fetched
    }
}

#[async_trait]
impl ObjectReader for MemoryReader {
    async fn read(&mut self, size: usize) -> Result<Bytes> {
        if self.closed {
            return Err(StoreError::Closed(target(&self.container, &self.key)));
        }
        if !self.fetched {
            self.fetched = true;
            self.backend
                .record(BackendCall::Get(self.container.clone(), self.key.clone()));
        }
        let n = if size == 0 {
            self.data.len()
        } else {
            size.min(self.data.len())
        };
        Ok(self.data.split_to(n))
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.data = Bytes::new();
        Ok(())
    }

    fn headers(&self) -> &ObjectHeaders {
        &self.headers
    }
}

/// Writer that commits its buffer on close
pub struct MemoryWriter {
    backend: MemoryBackend,
    container: String,
    key: String,
    content_type: String,
    buffer: BytesMut,
    closed: bool,
}

impl MemoryWriter {
    fn commit(&mut self) -> Result<()> {
        self.closed = true;
        self.backend.record(BackendCall::WriteFinish(self.key.clone()));
        self.backend
            .check_failure(FailOp::PutObject, &self.container, &self.key)?;
        let data = std::mem::take(&mut self.buffer).freeze();
        let object = StoredObject::new(data, std::mem::take(&mut self.content_type));
        self.backend.store(&self.container, &self.key, object)
    }
}

#[async_trait]
impl ObjectWriter for MemoryWriter {
    async fn write(&mut self, data: Bytes) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        if self.closed {
            return Err(StoreError::Closed(target(&self.container, &self.key)));
        }
        self.backend.record(BackendCall::WriteChunk {
            key: self.key.clone(),
            len: data.len(),
        });
        self.buffer.extend_from_slice(&data);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.commit()
    }
}

impl Drop for MemoryWriter {
    fn drop(&mut self) {
        if !self.closed {
            // unfinished upload leaves whatever was sent
            let _ = self.commit();
        }
    }
}
