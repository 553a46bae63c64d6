//! Containers and pseudo-directories: listing and the subdirectory test

use crate::{
    cache::{MetadataCache, ObjectMetadata, Probe},
    keys::{client_path, last_segment, sanitize},
    node::{Node, ObjectNode},
    resolver::Intent,
    RequestContext, Result,
};
use skydav_store::{ListQuery, ListingEntry, ObjectHeaders, DELIMITER};
use std::collections::HashMap;
use tracing::{debug, instrument};

/// One child as seen in a grouped listing
#[derive(Clone, Debug)]
struct Member {
    name: String,
    is_directory: bool,
    headers: Option<ObjectHeaders>,
}

/// A listable collection: a whole container (empty prefix) or a
/// pseudo-directory (prefix ending in the delimiter).
///
/// Owns the metadata cache for the listings it performs; the cache is
/// never shared with another collection or request.
#[derive(Clone)]
pub struct Collection {
    ctx: RequestContext,
    container: String,
    prefix: String,
    cache: MetadataCache,
}

impl Collection {
    /// Create a collection for `container` below `prefix`
    pub fn new(ctx: RequestContext, container: impl Into<String>, prefix: &str) -> Self {
        let prefix = sanitize(prefix);
        let prefix = prefix.trim_end_matches(DELIMITER);
        let prefix = if prefix.is_empty() {
            String::new()
        } else {
            format!("{}{}", prefix, DELIMITER)
        };

        Self {
            ctx,
            container: container.into(),
            prefix,
            cache: MetadataCache::new(),
        }
    }

    /// Container name
    pub fn container(&self) -> &str {
        &self.container
    }

    /// Listing prefix, empty or ending in the delimiter
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Prefix without its trailing delimiter
    pub fn key(&self) -> &str {
        self.prefix.trim_end_matches(DELIMITER)
    }

    /// Whether this is the container itself
    pub fn is_container(&self) -> bool {
        self.prefix.is_empty()
    }

    /// Client-visible path
    pub fn path(&self) -> String {
        client_path(&self.container, self.key())
    }

    pub fn display_name(&self) -> String {
        if self.is_container() {
            self.container.clone()
        } else {
            last_segment(&self.prefix).to_string()
        }
    }

    /// Rows seen so far
    pub fn cache(&self) -> &MetadataCache {
        &self.cache
    }

    /// Metadata of this collection's own marker object, if it was listed.
    /// Always `None` while the self entry is skipped.
    pub fn marker(&self) -> Option<&ObjectMetadata> {
        if self.is_container() || self.ctx.config().skip_self_entry {
            return None;
        }
        self.cache.get(&self.prefix).filter(|m| !m.is_subdir)
    }

    /// Child collection at full key `key`, carrying over what was cached
    pub fn descend(&self, key: &str) -> Collection {
        let mut child = Collection::new(self.ctx.clone(), self.container.clone(), key);
        child.cache = self.cache.clone();
        child
    }

    /// Drop the marker object of the collection at `self_key` when the
    /// self entry is configured away. Grouping rows always stay.
    fn keep_row(&self, entry: &ListingEntry, self_key: &str) -> bool {
        !(self.ctx.config().skip_self_entry
            && !entry.is_subdir()
            && entry.key() == self_key)
    }

    async fn list(&self, query: &ListQuery) -> Result<Option<Vec<ListingEntry>>> {
        match self
            .ctx
            .backend()
            .get_container(&self.container, query)
            .await
        {
            Ok(rows) => Ok(Some(rows)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Decide whether full key `name` is a directory, an object, or
    /// nothing. The cache answers when it already holds `name` or `name/`;
    /// otherwise an ungrouped and a grouped listing are fetched.
    #[instrument(skip(self), fields(container = %self.container))]
    pub async fn is_subdir(&mut self, name: &str) -> Result<Probe> {
        let name = name.trim_matches(DELIMITER);
        if name.is_empty() {
            return Ok(Probe::Directory);
        }

        if let Some(probe) = self.cache.classify(name) {
            debug!(name, ?probe, "Subdir test answered from cache");
            return Ok(probe);
        }

        let self_key = format!("{}{}", name, DELIMITER);
        let Some(all) = self.list(&ListQuery::all()).await? else {
            return Ok(Probe::Absent);
        };
        let all: Vec<_> = all
            .into_iter()
            .filter(|e| self.keep_row(e, &self_key))
            .collect();
        self.cache.absorb_flat(&all);

        let grouped_query = ListQuery::grouped(name);
        if let Some(grouped) = self.list(&grouped_query).await? {
            let kept: Vec<_> = grouped
                .into_iter()
                .filter(|e| self.keep_row(e, &self_key))
                .collect();
            self.cache.absorb(&kept);
        }

        let probe = self.cache.classify(name).unwrap_or(Probe::Absent);
        debug!(name, ?probe, "Subdir test");
        Ok(probe)
    }

    /// One grouped listing of this collection; refreshes the cache
    async fn members(&mut self) -> Result<Vec<Member>> {
        let rows = self
            .list(&ListQuery::grouped(self.prefix.clone()))
            .await?
            .ok_or_else(|| crate::CoreError::NotFound(self.path()))?;

        self.cache.clear();

        let mut members: Vec<Member> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for entry in rows {
            if !self.keep_row(&entry, &self.prefix) {
                continue;
            }
            let meta = ObjectMetadata::from_listing(&entry);
            self.cache.insert(meta.clone());

            let Some(rest) = entry.key().strip_prefix(&self.prefix) else {
                continue;
            };
            let name = rest.trim_end_matches(DELIMITER);
            if name.is_empty() {
                continue;
            }

            // an object ending in the delimiter and a subdir row collapse
            match index.get(name) {
                Some(&i) => {
                    let member = &mut members[i];
                    member.is_directory |= meta.is_directory();
                    if member.headers.is_none() {
                        member.headers = meta.headers();
                    }
                }
                None => {
                    index.insert(name.to_string(), members.len());
                    members.push(Member {
                        name: name.to_string(),
                        is_directory: meta.is_directory(),
                        headers: meta.headers(),
                    });
                }
            }
        }

        Ok(members)
    }

    /// Names of the direct children
    pub async fn member_names(&mut self) -> Result<Vec<String>> {
        Ok(self.members().await?.into_iter().map(|m| m.name).collect())
    }

    /// Direct children as nodes
    pub async fn children(&mut self) -> Result<Vec<Node>> {
        let members = self.members().await?;
        Ok(members
            .into_iter()
            .map(|m| {
                let key = format!("{}{}", self.prefix, m.name);
                if m.is_directory {
                    Node::PseudoDirectory(self.descend(&key))
                } else {
                    Node::Object(ObjectNode::listed(
                        self.ctx.clone(),
                        self.container.clone(),
                        key,
                        m.headers.unwrap_or_default(),
                    ))
                }
            })
            .collect())
    }

    /// Resolve the child `name` (relative to this collection).
    ///
    /// A write target is always an object and is never probed. Otherwise
    /// the subdirectory test decides, with a HEAD as the last resort.
    #[instrument(skip(self), fields(container = %self.container, prefix = %self.prefix))]
    pub async fn member(&mut self, name: &str, intent: Intent) -> Result<Option<Node>> {
        let relative = sanitize(name);
        let key = format!("{}{}", self.prefix, relative.trim_end_matches(DELIMITER));
        if key.is_empty() || key == self.prefix {
            return Ok(None);
        }

        if intent == Intent::Write {
            return Ok(Some(Node::Object(ObjectNode::new(
                self.ctx.clone(),
                self.container.clone(),
                key,
            ))));
        }

        match self.is_subdir(&key).await? {
            Probe::Directory => Ok(Some(Node::PseudoDirectory(self.descend(&key)))),
            Probe::Object => {
                let headers = self.cache.get(&key).and_then(|m| m.headers());
                let node = match headers {
                    Some(h) => ObjectNode::listed(self.ctx.clone(), self.container.clone(), key, h),
                    None => ObjectNode::new(self.ctx.clone(), self.container.clone(), key),
                };
                Ok(Some(Node::Object(node)))
            }
            Probe::Absent => {
                // listings may lag behind a fresh write
                let headers = self
                    .ctx
                    .backend()
                    .head_object(&self.container, &key)
                    .await?;
                Ok(headers.map(|h| {
                    Node::Object(ObjectNode::listed(
                        self.ctx.clone(),
                        self.container.clone(),
                        key,
                        h,
                    ))
                }))
            }
        }
    }
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("container", &self.container)
            .field("prefix", &self.prefix)
            .field("cached", &self.cache.len())
            .finish()
    }
}
