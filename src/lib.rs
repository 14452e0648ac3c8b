//! folio - Content index and render cache for a directory of posts
//!
//! Keeps an ordered, queryable index of posts in step with a directory of
//! source documents, and caches each rendered post on disk so lookups never
//! re-read or re-render a source that has not changed.
//!
//! # Architecture
//!
//! - The render cache holds one JSON artifact per post, named
//!   `<date>.<mtime>.<id>.json`, so a directory listing alone rebuilds the
//!   index in sort order
//! - Startup reconciles the index against the sources with a sorted
//!   merge-join; live filesystem events flow through the same dispatcher
//! - Item and page lookups are memoized with request coalescing and
//!   invalidated on every index change
//!
//! # Modules
//!
//! - `adapters`: Rendering seam (`Renderer` trait)
//! - `core`: Index, render cache, memo, dispatcher, reconciliation, `Folio`
//! - `domain`: Data structures (PostMetadata, Artifact, ChangeEvent)
//! - `ingest`: notify-backed posts directory watcher
//! - `config`: Layered configuration
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Bring the render cache up to date
//! folio sync
//!
//! # Keep it up to date while editing
//! folio watch
//!
//! # Browse
//! folio list --page 2
//! folio show hello-world
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod ingest;

// Re-export main types at crate root for convenience
pub use adapters::{PlainTextRenderer, Renderer};
pub use crate::core::{Applied, FetchError, Folio, FolioSettings, SyncReport};
pub use domain::{Artifact, ChangeEvent, ChangeKind, IndexOp, Page, PostMetadata};
pub use ingest::{PostWatcher, WatchHandle, WatcherError};
