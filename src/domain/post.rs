//! Post metadata and the persisted artifact record.
//!
//! The artifact filename doubles as the durable sort key and the
//! invalidation key: `<YYYYMMDDHHMMSS>.<mtime_millis>.<id>.json`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Extension of every artifact file in the render cache
pub const ARTIFACT_EXTENSION: &str = "json";

/// Preview used when the rendered body has no paragraph block
pub const NO_PREVIEW: &str = "<i>No preview available...</i>";

/// Parsed form of an artifact filename
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactName {
    /// Declared date, `YYYYMMDDHHMMSS` in UTC
    pub date: String,

    /// Source modification time in epoch millis
    pub mtime: i64,

    /// Post id
    pub id: String,
}

impl ArtifactName {
    /// Build a name from a declared date, the source mtime and the id
    pub fn new(date: DateTime<Utc>, mtime: i64, id: impl Into<String>) -> Self {
        Self {
            date: sortable_date(date),
            mtime,
            id: id.into(),
        }
    }

    /// Parse a filename of the form `<date>.<mtime>.<id>.json`.
    ///
    /// The first two dot-separated parts are the date and mtime; everything
    /// between them and the extension is the id, so ids may contain dots.
    pub fn parse(file_name: &str) -> Option<Self> {
        let stem = strip_extension(file_name, ARTIFACT_EXTENSION)?;
        let mut parts = stem.splitn(3, '.');

        let date = parts.next()?;
        let mtime = parts.next()?.parse::<i64>().ok()?;
        let id = parts.next()?;

        if date.is_empty() || id.is_empty() {
            return None;
        }

        Some(Self {
            date: date.to_string(),
            mtime,
            id: id.to_string(),
        })
    }

    /// The on-disk filename
    pub fn file_name(&self) -> String {
        format!("{}.{}.{}.{}", self.date, self.mtime, self.id, ARTIFACT_EXTENSION)
    }
}

impl fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name())
    }
}

/// Index entry for one live post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostMetadata {
    /// Unique id, derived from the source filename
    pub id: String,

    /// Artifact filename; sorts by declared date first
    pub cache_key: String,

    /// Source modification time in epoch millis
    pub mtime: i64,

    /// Position in the ordered sequence (0 = most recent)
    pub pos: usize,
}

impl PostMetadata {
    /// Create metadata for an artifact name. `pos` is assigned by the index.
    pub fn from_name(name: &ArtifactName) -> Self {
        Self {
            id: name.id.clone(),
            cache_key: name.file_name(),
            mtime: name.mtime,
            pos: 0,
        }
    }
}

/// Cached, pre-rendered representation of a post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Post id
    pub id: String,

    /// Header attributes, keys lower-cased
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,

    /// Rendered body
    pub content: String,

    /// Leading excerpt of the rendered body
    pub preview: String,
}

impl Artifact {
    /// Look up a header attribute (keys are stored lower-cased)
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// The `title` header, if the post declared one
    pub fn title(&self) -> Option<&str> {
        self.attribute("title")
    }
}

/// One page of posts, most recent first
#[derive(Debug, Clone)]
pub struct Page {
    /// Artifacts on this page, in index order
    pub items: Vec<Arc<Artifact>>,

    /// 1-based page number
    pub page: usize,

    /// Total number of pages at the time the page was built
    pub page_count: usize,
}

/// Format a timestamp as `YYYYMMDDHHMMSS` in UTC
pub fn sortable_date(date: DateTime<Utc>) -> String {
    date.format("%Y%m%d%H%M%S").to_string()
}

/// Strip a case-insensitive `.ext` suffix, returning the remaining stem
pub fn strip_extension<'a>(file_name: &'a str, extension: &str) -> Option<&'a str> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() || !ext.eq_ignore_ascii_case(extension) {
        return None;
    }
    Some(stem)
}
