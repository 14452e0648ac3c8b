//! Change events and the index operations they resolve to.
//!
//! Live notifications arrive as [`ChangeEvent`]s; startup reconciliation
//! produces [`IndexOp`]s directly. Both end up in the same dispatcher.

use std::path::{Path, PathBuf};

use super::post::strip_extension;

/// Kind of filesystem change reported by the notification layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// A file was created
    Create,

    /// A file's content changed
    Modify,

    /// A file was deleted
    Delete,

    /// A file was renamed away from this name
    MovedFrom,

    /// A file was renamed to this name
    MovedTo,
}

/// A single filesystem change
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChangeEvent {
    /// Full path of the affected file
    pub path: PathBuf,

    /// What happened to it
    pub kind: ChangeKind,

    /// Whether the path is a directory
    pub is_dir: bool,
}

impl ChangeEvent {
    /// Create an event for a regular file
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
            is_dir: false,
        }
    }

    /// Mark the event as concerning a directory
    pub fn directory(mut self) -> Self {
        self.is_dir = true;
        self
    }

    /// Resolve to an index operation.
    ///
    /// Returns `None` for directories and for files without the source
    /// extension. Create, modify and moved-to all become an idempotent upsert.
    pub fn to_op(&self, extension: &str) -> Option<IndexOp> {
        if self.is_dir {
            return None;
        }

        let id = source_id(&self.path, extension)?;

        Some(match self.kind {
            ChangeKind::Create | ChangeKind::Modify | ChangeKind::MovedTo => IndexOp::Upsert {
                id,
                path: self.path.clone(),
            },
            ChangeKind::Delete | ChangeKind::MovedFrom => IndexOp::Remove { id },
        })
    }
}

/// A mutation of the index, shared by live events and reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOp {
    /// (Re)render the source file and insert or replace its entry
    Upsert { id: String, path: PathBuf },

    /// Drop the entry and its artifact
    Remove { id: String },
}

impl IndexOp {
    /// Id of the post this operation targets
    pub fn id(&self) -> &str {
        match self {
            Self::Upsert { id, .. } | Self::Remove { id } => id,
        }
    }
}

/// Derive a post id from a source path (`<dir>/<id>.<extension>`)
pub fn source_id(path: &Path, extension: &str) -> Option<String> {
    let file_name = path.file_name()?.to_str()?;
    strip_extension(file_name, extension).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_modify_become_upsert() {
        for kind in [ChangeKind::Create, ChangeKind::Modify, ChangeKind::MovedTo] {
            let event = ChangeEvent::new("/blog/posts/hello.markdown", kind);
            assert_eq!(
                event.to_op("markdown"),
                Some(IndexOp::Upsert {
                    id: "hello".to_string(),
                    path: PathBuf::from("/blog/posts/hello.markdown"),
                })
            );
        }
    }

    #[test]
    fn test_delete_and_moved_from_become_remove() {
        for kind in [ChangeKind::Delete, ChangeKind::MovedFrom] {
            let event = ChangeEvent::new("/blog/posts/hello.markdown", kind);
            assert_eq!(
                event.to_op("markdown"),
                Some(IndexOp::Remove {
                    id: "hello".to_string()
                })
            );
        }
    }

    #[test]
    fn test_directories_and_foreign_files_are_ignored() {
        let dir = ChangeEvent::new("/blog/posts/drafts.markdown", ChangeKind::Create).directory();
        assert_eq!(dir.to_op("markdown"), None);

        let other = ChangeEvent::new("/blog/posts/image.png", ChangeKind::Create);
        assert_eq!(other.to_op("markdown"), None);
    }
}
