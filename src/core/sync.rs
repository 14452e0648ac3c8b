//! Startup reconciliation between the index and the source directory.
//!
//! Both sides are sorted by id and walked with two cursors. Every
//! difference becomes a [`Drift`], which maps onto the same [`IndexOp`]s
//! the live watcher produces.

use std::cmp::Ordering;
use std::fs::Metadata;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::fs;
use tracing::warn;

use crate::domain::{source_id, IndexOp, PostMetadata};

/// A source document found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Post id (filename without extension)
    pub id: String,

    /// Full path of the document
    pub path: PathBuf,

    /// Modification time in epoch millis
    pub mtime: i64,
}

/// One difference between the index and the source directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Drift {
    /// Source exists but is not indexed
    Created(SourceFile),

    /// Source changed since its artifact was rendered
    Modified(SourceFile),

    /// Indexed post whose source is gone
    Removed(String),
}

impl Drift {
    /// The index operation that resolves this drift
    pub fn op(&self) -> IndexOp {
        match self {
            Self::Created(source) | Self::Modified(source) => IndexOp::Upsert {
                id: source.id.clone(),
                path: source.path.clone(),
            },
            Self::Removed(id) => IndexOp::Remove { id: id.clone() },
        }
    }
}

/// Counts of reconciliation work done at startup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub created: usize,
    pub modified: usize,
    pub removed: usize,
}

impl SyncReport {
    /// Tally a set of drifts
    pub fn from_drifts(drifts: &[Drift]) -> Self {
        let mut report = Self::default();
        for drift in drifts {
            match drift {
                Drift::Created(_) => report.created += 1,
                Drift::Modified(_) => report.modified += 1,
                Drift::Removed(_) => report.removed += 1,
            }
        }
        report
    }

    /// Total number of operations
    pub fn total(&self) -> usize {
        self.created + self.modified + self.removed
    }

    /// Check if the index already matched the source directory
    pub fn is_clean(&self) -> bool {
        self.total() == 0
    }
}

/// Modification time of a file as a UTC timestamp
pub fn modified_at(metadata: &Metadata) -> std::io::Result<DateTime<Utc>> {
    Ok(metadata.modified()?.into())
}

/// Modification time of a file in epoch millis
pub fn mtime_millis(metadata: &Metadata) -> std::io::Result<i64> {
    Ok(modified_at(metadata)?.timestamp_millis())
}

/// List source documents with the given extension, sorted by id.
///
/// If two files map to the same id (e.g. `a.markdown` and `a.MARKDOWN`)
/// the one whose filename sorts first is kept.
pub async fn list_sources(dir: &Path, extension: &str) -> std::io::Result<Vec<SourceFile>> {
    let mut sources = Vec::new();
    let mut entries = fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let Some(id) = source_id(&path, extension) else {
            continue;
        };

        let metadata = match entry.metadata().await {
            Ok(m) => m,
            Err(e) => {
                warn!("Failed to stat {}: {}", path.display(), e);
                continue;
            }
        };
        if !metadata.is_file() {
            continue;
        }

        sources.push(SourceFile {
            id,
            mtime: mtime_millis(&metadata)?,
            path,
        });
    }

    sources.sort_by(|a, b| a.id.cmp(&b.id).then_with(|| a.path.cmp(&b.path)));
    sources.dedup_by(|later, first| {
        let duplicate = later.id == first.id;
        if duplicate {
            warn!(
                "Ignoring {}: id '{}' already provided by {}",
                later.path.display(),
                later.id,
                first.path.display()
            );
        }
        duplicate
    });

    Ok(sources)
}

/// Merge-join the indexed posts against the source listing.
///
/// Neither input needs to be sorted; both are copied and sorted by id.
/// Runs in O(N log N + M log M) for the sorts and O(N + M) for the walk.
pub fn reconcile(indexed: &[PostMetadata], sources: &[SourceFile]) -> Vec<Drift> {
    let mut indexed: Vec<&PostMetadata> = indexed.iter().collect();
    indexed.sort_by(|a, b| a.id.cmp(&b.id));

    let mut sources: Vec<&SourceFile> = sources.iter().collect();
    sources.sort_by(|a, b| a.id.cmp(&b.id));

    let mut drifts = Vec::new();
    let (mut i, mut j) = (0, 0);

    while i < indexed.len() && j < sources.len() {
        let (meta, source) = (indexed[i], sources[j]);
        match meta.id.cmp(&source.id) {
            Ordering::Equal => {
                if meta.mtime != source.mtime {
                    drifts.push(Drift::Modified(source.clone()));
                }
                i += 1;
                j += 1;
            }
            Ordering::Less => {
                drifts.push(Drift::Removed(meta.id.clone()));
                i += 1;
            }
            Ordering::Greater => {
                drifts.push(Drift::Created(source.clone()));
                j += 1;
            }
        }
    }

    drifts.extend(indexed[i..].iter().map(|meta| Drift::Removed(meta.id.clone())));
    drifts.extend(sources[j..].iter().map(|&source| Drift::Created(source.clone())));

    drifts
}
