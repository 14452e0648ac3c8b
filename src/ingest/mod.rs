//! Filesystem change ingestion.
//!
//! ```text
//! posts/ (notify) → PostWatcher → ChangeEvent → Folio::dispatch
//! ```

pub mod watcher;

pub use watcher::{coalesce, translate, PostWatcher, WatchHandle, WatcherError};
