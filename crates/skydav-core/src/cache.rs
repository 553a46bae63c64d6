//! Listing metadata cache

use skydav_store::{ListingEntry, ObjectHeaders, DELIMITER, DIRECTORY_CONTENT_TYPE};
use std::collections::HashMap;

/// What a listing row said about one key
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectMetadata {
    /// Full key (subdir rows keep their trailing delimiter)
    pub key: String,
    /// Size in bytes
    pub bytes: u64,
    /// Content hash
    pub hash: String,
    /// Content type
    pub content_type: String,
    /// Last modified, as listed
    pub last_modified: Option<String>,
    /// Row was a `subdir` grouping entry
    pub is_subdir: bool,
    /// Row carried the directory content type
    pub is_directory_marker: bool,
}

impl ObjectMetadata {
    /// Build from a listing row
    pub fn from_listing(entry: &ListingEntry) -> Self {
        match entry {
            ListingEntry::Subdir { subdir } => Self::subdir(subdir),
            ListingEntry::Object(info) => Self {
                key: info.name.clone(),
                bytes: info.bytes,
                hash: info.hash.clone(),
                content_type: info.content_type.clone(),
                last_modified: info.last_modified.clone(),
                is_subdir: false,
                is_directory_marker: info.content_type == DIRECTORY_CONTENT_TYPE,
            },
        }
    }

    fn subdir(key: &str) -> Self {
        Self {
            key: key.to_string(),
            bytes: 0,
            hash: String::new(),
            content_type: String::new(),
            last_modified: None,
            is_subdir: true,
            is_directory_marker: false,
        }
    }

    /// Whether the row denotes a directory
    pub fn is_directory(&self) -> bool {
        self.is_subdir || self.is_directory_marker || self.key.ends_with(DELIMITER)
    }

    /// Object headers for real rows
    pub fn headers(&self) -> Option<ObjectHeaders> {
        if self.is_subdir {
            return None;
        }
        let info = skydav_store::ObjectInfo {
            name: self.key.clone(),
            bytes: self.bytes,
            hash: self.hash.clone(),
            content_type: self.content_type.clone(),
            last_modified: self.last_modified.clone(),
        };
        Some(ObjectHeaders::from_listing(&info))
    }
}

/// Result of the subdirectory test
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Probe {
    Directory,
    Object,
    Absent,
}

/// Listing rows seen by one collection, keyed by full key
#[derive(Clone, Debug, Default)]
pub struct MetadataCache {
    entries: HashMap<String, ObjectMetadata>,
}

impl MetadataCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up one key
    pub fn get(&self, key: &str) -> Option<&ObjectMetadata> {
        self.entries.get(key)
    }

    /// Store one row. A `subdir` row never replaces a real object row
    /// for the same key.
    pub fn insert(&mut self, meta: ObjectMetadata) {
        if meta.is_subdir && self.entries.get(&meta.key).is_some_and(|m| !m.is_subdir) {
            return;
        }
        self.entries.insert(meta.key.clone(), meta);
    }

    /// Store the rows of a grouped listing
    pub fn absorb(&mut self, entries: &[ListingEntry]) {
        for entry in entries {
            self.insert(ObjectMetadata::from_listing(entry));
        }
    }

    /// Store the rows of an ungrouped listing, recording every prefix that
    /// has content below it as a `subdir` row
    pub fn absorb_flat(&mut self, entries: &[ListingEntry]) {
        for entry in entries {
            let key = entry.key();
            for (idx, _) in key.match_indices(DELIMITER) {
                let prefix = &key[..idx + DELIMITER.len_utf8()];
                if prefix.len() < key.len() && !self.entries.contains_key(prefix) {
                    self.insert(ObjectMetadata::subdir(prefix));
                }
            }
            self.insert(ObjectMetadata::from_listing(entry));
        }
    }

    /// Classify `name` (no trailing delimiter) from the rows for `name`
    /// and `name/`. `None` when neither was seen.
    pub fn classify(&self, name: &str) -> Option<Probe> {
        let exact = self.entries.get(name);
        let marker = self.entries.get(&format!("{}{}", name, DELIMITER));

        match (exact, marker) {
            (None, None) => None,
            (e, m) if e.is_some_and(|x| x.is_directory()) || m.is_some() => {
                Some(Probe::Directory)
            }
            _ => Some(Probe::Object),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skydav_store::ObjectInfo;

    fn object(name: &str, content_type: &str) -> ListingEntry {
        ListingEntry::Object(ObjectInfo {
            name: name.to_string(),
            bytes: 1,
            hash: "h".to_string(),
            content_type: content_type.to_string(),
            last_modified: None,
        })
    }

    #[test]
    fn test_classify_marker_without_slash() {
        let mut cache = MetadataCache::new();
        cache.absorb(&[object("photos", DIRECTORY_CONTENT_TYPE)]);
        assert_eq!(cache.classify("photos"), Some(Probe::Directory));
    }

    #[test]
    fn test_classify_plain_object() {
        let mut cache = MetadataCache::new();
        cache.absorb(&[object("notes.txt", "text/plain")]);
        assert_eq!(cache.classify("notes.txt"), Some(Probe::Object));
        assert_eq!(cache.classify("other"), None);
    }

    #[test]
    fn test_content_below_name_wins() {
        let mut cache = MetadataCache::new();
        cache.absorb_flat(&[object("x", "text/plain"), object("x/y", "text/plain")]);
        assert_eq!(cache.classify("x"), Some(Probe::Directory));
        assert_eq!(cache.classify("x/y"), Some(Probe::Object));
        assert!(cache.get("x/").unwrap().is_subdir);
    }

    #[test]
    fn test_subdir_row_keeps_marker_row() {
        let mut cache = MetadataCache::new();
        cache.absorb_flat(&[object("d/", DIRECTORY_CONTENT_TYPE), object("d/x", "text/plain")]);
        cache.absorb(&[ListingEntry::Subdir {
            subdir: "d/".to_string(),
        }]);

        let marker = cache.get("d/").unwrap();
        assert!(!marker.is_subdir);
        assert!(marker.is_directory_marker);
        assert_eq!(cache.classify("d"), Some(Probe::Directory));
    }

    #[test]
    fn test_subdir_row_has_no_headers() {
        let meta = ObjectMetadata::from_listing(&ListingEntry::Subdir {
            subdir: "a/".to_string(),
        });
        assert!(meta.is_directory());
        assert!(meta.headers().is_none());
    }
}
