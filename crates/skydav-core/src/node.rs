//! Resolved nodes of the client-visible tree

use crate::{collection::Collection, keys::last_segment, RequestContext, Result};
use chrono::{DateTime, Utc};
use skydav_store::{parse_listing_time, ObjectHeaders, ObjectReader, ObjectWriter, PutOptions};
use tracing::instrument;

/// Content type reported when the backend has none
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// The kind of a resolved node
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Root,
    Container,
    PseudoDirectory,
    Object,
}

/// Properties shown to clients
#[derive(Clone, Debug, PartialEq)]
pub struct Properties {
    pub display_name: String,
    pub is_collection: bool,
    pub content_length: Option<u64>,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl Properties {
    fn collection(display_name: String, modified: DateTime<Utc>) -> Self {
        Self {
            display_name,
            is_collection: true,
            content_length: None,
            content_type: None,
            etag: None,
            created: DateTime::UNIX_EPOCH,
            modified,
        }
    }
}

/// The account root: lists containers
#[derive(Clone)]
pub struct RootNode {
    ctx: RequestContext,
}

impl RootNode {
    pub fn new(ctx: RequestContext) -> Self {
        Self { ctx }
    }

    /// Every container as a node
    pub async fn children(&self) -> Result<Vec<Node>> {
        let containers = self.ctx.backend().get_account().await?;
        Ok(containers
            .into_iter()
            .map(|c| Node::Container(Collection::new(self.ctx.clone(), c.name, "")))
            .collect())
    }
}

/// A real object
#[derive(Clone)]
pub struct ObjectNode {
    ctx: RequestContext,
    container: String,
    key: String,
    headers: Option<ObjectHeaders>,
    loaded: bool,
}

impl ObjectNode {
    /// Object whose headers are fetched on demand
    pub fn new(ctx: RequestContext, container: String, key: String) -> Self {
        Self {
            ctx,
            container,
            key,
            headers: None,
            loaded: false,
        }
    }

    /// Object whose headers were already seen
    pub fn listed(ctx: RequestContext, container: String, key: String, headers: ObjectHeaders) -> Self {
        Self {
            ctx,
            container,
            key,
            headers: Some(headers),
            loaded: true,
        }
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn path(&self) -> String {
        crate::keys::client_path(&self.container, &self.key)
    }

    pub fn display_name(&self) -> String {
        last_segment(&self.key).to_string()
    }

    /// Headers, fetched with one HEAD the first time. `None` if the object
    /// does not exist.
    pub async fn headers(&mut self) -> Result<Option<&ObjectHeaders>> {
        if !self.loaded {
            self.headers = self
                .ctx
                .backend()
                .head_object(&self.container, &self.key)
                .await?;
            self.loaded = true;
        }
        Ok(self.headers.as_ref())
    }

    /// Whether the object exists
    pub async fn exists(&mut self) -> Result<bool> {
        Ok(self.headers().await?.is_some())
    }

    /// Client-visible properties
    pub async fn properties(&mut self) -> Result<Properties> {
        let display_name = self.display_name();
        let headers = self.headers().await?.cloned().unwrap_or_default();

        let created = headers
            .created()
            .or_else(|| headers.last_modified.as_deref().and_then(parse_http_date))
            .unwrap_or(DateTime::UNIX_EPOCH);

        Ok(Properties {
            display_name,
            is_collection: false,
            content_length: Some(headers.content_length),
            content_type: Some(
                headers
                    .content_type
                    .clone()
                    .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
            ),
            etag: headers.etag.clone(),
            created,
            modified: created,
        })
    }

    /// Open for reading; the body is fetched on the first read
    #[instrument(skip(self), fields(path = %self.path()))]
    pub async fn open_read(&self) -> Result<Box<dyn ObjectReader>> {
        Ok(self
            .ctx
            .backend()
            .open_read(&self.container, &self.key)
            .await?)
    }

    /// Open for writing
    #[instrument(skip(self), fields(path = %self.path()))]
    pub async fn open_write(&self, content_type: Option<String>) -> Result<Box<dyn ObjectWriter>> {
        let options = PutOptions {
            content_type,
            copy_from: None,
        };
        Ok(self
            .ctx
            .backend()
            .open_write(&self.container, &self.key, options)
            .await?)
    }
}

fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|d| d.with_timezone(&Utc))
        .or_else(|| parse_listing_time(value))
}

/// A resolved path
#[derive(Clone)]
pub enum Node {
    Root(RootNode),
    Container(Collection),
    PseudoDirectory(Collection),
    Object(ObjectNode),
}

impl Node {
    /// Discriminant
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Root(_) => NodeKind::Root,
            Self::Container(_) => NodeKind::Container,
            Self::PseudoDirectory(_) => NodeKind::PseudoDirectory,
            Self::Object(_) => NodeKind::Object,
        }
    }

    /// Client-visible path
    pub fn path(&self) -> String {
        match self {
            Self::Root(_) => "/".to_string(),
            Self::Container(c) | Self::PseudoDirectory(c) => c.path(),
            Self::Object(o) => o.path(),
        }
    }

    /// Owning container, `None` for the root
    pub fn container(&self) -> Option<&str> {
        match self {
            Self::Root(_) => None,
            Self::Container(c) | Self::PseudoDirectory(c) => Some(c.container()),
            Self::Object(o) => Some(o.container()),
        }
    }

    pub fn is_collection(&self) -> bool {
        !matches!(self, Self::Object(_))
    }

    pub fn display_name(&self) -> String {
        match self {
            Self::Root(_) => "/".to_string(),
            Self::Container(c) | Self::PseudoDirectory(c) => c.display_name(),
            Self::Object(o) => o.display_name(),
        }
    }

    /// Client-visible properties; may issue a HEAD for objects
    pub async fn properties(&mut self) -> Result<Properties> {
        match self {
            Self::Root(_) => Ok(Properties::collection(
                "/".to_string(),
                DateTime::UNIX_EPOCH,
            )),
            Self::Container(c) => Ok(Properties::collection(c.display_name(), DateTime::UNIX_EPOCH)),
            Self::PseudoDirectory(c) => {
                let modified = c
                    .marker()
                    .and_then(|m| m.last_modified.as_deref())
                    .and_then(parse_listing_time)
                    .unwrap_or(DateTime::UNIX_EPOCH);
                Ok(Properties::collection(c.display_name(), modified))
            }
            Self::Object(o) => o.properties().await,
        }
    }

    /// Direct children; objects have none
    pub async fn children(&mut self) -> Result<Vec<Node>> {
        match self {
            Self::Root(r) => r.children().await,
            Self::Container(c) | Self::PseudoDirectory(c) => c.children().await,
            Self::Object(_) => Ok(Vec::new()),
        }
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Node")
            .field(&self.kind())
            .field(&self.path())
            .finish()
    }
}
