//! Domain types for folio.
//!
//! This module contains the core data structures:
//! - Post: index metadata, artifact names and rendered artifacts
//! - Events: filesystem changes and the index operations they map to

pub mod events;
pub mod post;

// Re-export commonly used types
pub use events::{source_id, ChangeEvent, ChangeKind, IndexOp};
pub use post::{
    sortable_date, strip_extension, Artifact, ArtifactName, Page, PostMetadata,
    ARTIFACT_EXTENSION, NO_PREVIEW,
};
