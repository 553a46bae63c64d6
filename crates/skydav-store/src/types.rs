//! Common types for the object store API

use crate::{DELIMITER, DIRECTORY_CONTENT_TYPE};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// A container in the storage account
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInfo {
    /// Container name
    pub name: String,
    /// Number of objects
    #[serde(default)]
    pub count: u64,
    /// Bytes used
    #[serde(default)]
    pub bytes: u64,
}

/// Headers returned by a container HEAD
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ContainerHeaders {
    /// Number of objects
    pub object_count: u64,
    /// Bytes used
    pub bytes_used: u64,
    /// Creation timestamp (seconds since epoch)
    pub timestamp: Option<f64>,
}

/// A real object as returned in a container listing
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectInfo {
    /// Full object key
    pub name: String,
    /// Size in bytes
    #[serde(default)]
    pub bytes: u64,
    /// Content hash (MD5 hex)
    #[serde(default)]
    pub hash: String,
    /// Content type
    #[serde(default)]
    pub content_type: String,
    /// Last modified, e.g. `2014-06-02T10:11:12.123456`
    #[serde(default)]
    pub last_modified: Option<String>,
}

/// One row of a container listing.
///
/// A delimiter-grouped listing returns `subdir` rows for every distinct
/// prefix below the query prefix; those rows have no backing object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ListingEntry {
    /// Grouping row synthesized by the delimiter query
    Subdir { subdir: String },
    /// A real object
    Object(ObjectInfo),
}

impl ListingEntry {
    /// Key of the row: object name or subdir prefix (with trailing delimiter)
    pub fn key(&self) -> &str {
        match self {
            Self::Subdir { subdir } => subdir,
            Self::Object(info) => &info.name,
        }
    }

    /// Whether this is a `subdir` grouping row
    pub fn is_subdir(&self) -> bool {
        matches!(self, Self::Subdir { .. })
    }

    /// Whether this row denotes a directory: a grouping row, a key ending in
    /// the delimiter, or an object carrying the directory content type
    pub fn is_directory(&self) -> bool {
        match self {
            Self::Subdir { .. } => true,
            Self::Object(info) => {
                info.name.ends_with(DELIMITER) || info.content_type == DIRECTORY_CONTENT_TYPE
            }
        }
    }

    /// Object details for real objects
    pub fn object(&self) -> Option<&ObjectInfo> {
        match self {
            Self::Subdir { .. } => None,
            Self::Object(info) => Some(info),
        }
    }
}

/// Query for a container listing
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListQuery {
    /// Only keys starting with this prefix
    pub prefix: Option<String>,
    /// Group keys on this delimiter
    pub delimiter: Option<char>,
}

impl ListQuery {
    /// Every object in the container
    pub fn all() -> Self {
        Self::default()
    }

    /// Delimiter-grouped listing below `prefix`
    pub fn grouped(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self {
            prefix: (!prefix.is_empty()).then_some(prefix),
            delimiter: Some(DELIMITER),
        }
    }

    /// Ungrouped listing below `prefix`
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            delimiter: None,
        }
    }
}

/// Headers returned by an object HEAD
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObjectHeaders {
    /// Content length
    pub content_length: u64,
    /// Content type
    pub content_type: Option<String>,
    /// ETag (quotes stripped)
    pub etag: Option<String>,
    /// `X-Timestamp`, seconds since epoch
    pub timestamp: Option<f64>,
    /// `Last-Modified`, as sent
    pub last_modified: Option<String>,
}

impl ObjectHeaders {
    /// Build headers from a listing row, avoiding a HEAD round trip
    pub fn from_listing(info: &ObjectInfo) -> Self {
        Self {
            content_length: info.bytes,
            content_type: (!info.content_type.is_empty()).then(|| info.content_type.clone()),
            etag: (!info.hash.is_empty()).then(|| info.hash.clone()),
            timestamp: info
                .last_modified
                .as_deref()
                .and_then(parse_listing_time)
                .map(|t| t.timestamp_micros() as f64 / 1_000_000.0),
            last_modified: info.last_modified.clone(),
        }
    }

    /// Creation time derived from `X-Timestamp`
    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.timestamp.and_then(timestamp_to_datetime)
    }

    /// Whether the object is a directory marker
    pub fn is_directory(&self) -> bool {
        self.content_type.as_deref() == Some(DIRECTORY_CONTENT_TYPE)
    }
}

/// Options for object uploads
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PutOptions {
    /// Content type of the new object
    pub content_type: Option<String>,
    /// Server-side copy source, `/<container>/<key>` (already quoted)
    pub copy_from: Option<String>,
}

impl PutOptions {
    /// Create empty options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set content type
    pub fn with_content_type(mut self, ct: impl Into<String>) -> Self {
        self.content_type = Some(ct.into());
        self
    }

    /// Copy from another object instead of sending a body
    pub fn with_copy_from(mut self, source: impl Into<String>) -> Self {
        self.copy_from = Some(source.into());
        self
    }

    /// Options for a pseudo-directory marker
    pub fn directory_marker() -> Self {
        Self::new().with_content_type(DIRECTORY_CONTENT_TYPE)
    }
}

/// Convert fractional epoch seconds to a UTC time
pub fn timestamp_to_datetime(ts: f64) -> Option<DateTime<Utc>> {
    let secs = ts.trunc() as i64;
    let nanos = ((ts - ts.trunc()) * 1e9).round() as u32;
    DateTime::from_timestamp(secs, nanos.min(999_999_999))
}

/// Parse the `last_modified` field of a listing row
pub fn parse_listing_time(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|d| d.with_timezone(&Utc))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_entry_deserialize() {
        let json = r#"[
            {"subdir": "photos/"},
            {"name": "photos", "bytes": 0, "hash": "d41d8cd98f00b204e9800998ecf8427e",
             "content_type": "application/directory", "last_modified": "2014-06-02T10:11:12.123456"},
            {"name": "notes.txt", "bytes": 5, "hash": "abc", "content_type": "text/plain"}
        ]"#;

        let entries: Vec<ListingEntry> = serde_json::from_str(json).unwrap();
        assert_eq!(entries.len(), 3);
        assert!(entries[0].is_subdir());
        assert_eq!(entries[0].key(), "photos/");
        assert!(entries[1].is_directory());
        assert!(!entries[1].is_subdir());
        assert!(!entries[2].is_directory());
        assert_eq!(entries[2].object().unwrap().bytes, 5);
    }

    #[test]
    fn test_trailing_delimiter_is_directory() {
        let entry = ListingEntry::Object(ObjectInfo {
            name: "a/".to_string(),
            bytes: 0,
            hash: String::new(),
            content_type: "application/octet-stream".to_string(),
            last_modified: None,
        });
        assert!(entry.is_directory());
    }

    #[test]
    fn test_grouped_query_drops_empty_prefix() {
        assert_eq!(ListQuery::grouped("").prefix, None);
        assert_eq!(ListQuery::grouped("a/").prefix.as_deref(), Some("a/"));
        assert_eq!(ListQuery::grouped("a/").delimiter, Some('/'));
    }

    #[test]
    fn test_headers_from_listing() {
        let info = ObjectInfo {
            name: "x".to_string(),
            bytes: 12,
            hash: "etag".to_string(),
            content_type: "text/plain".to_string(),
            last_modified: Some("2014-06-02T00:00:00.000000".to_string()),
        };
        let headers = ObjectHeaders::from_listing(&info);
        assert_eq!(headers.content_length, 12);
        assert_eq!(headers.etag.as_deref(), Some("etag"));
        assert_eq!(headers.created().unwrap().to_rfc3339(), "2014-06-02T00:00:00+00:00");
    }

    #[test]
    fn test_timestamp_to_datetime() {
        let dt = timestamp_to_datetime(1401667200.5).unwrap();
        assert_eq!(dt.timestamp(), 1401667200);
        assert_eq!(dt.timestamp_subsec_millis(), 500);
    }
}
