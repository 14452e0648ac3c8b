//! Core indexing and caching logic.
//!
//! This module contains:
//! - PostIndex: Ordered post index with id lookup
//! - RenderCache: On-disk artifact storage
//! - SingleFlight: Async memo with request coalescing
//! - Dispatcher: Change events to index mutations
//! - Sync: Startup reconciliation against the source directory
//! - Folio: The context object tying it all together

pub mod dispatcher;
pub mod document;
pub mod engine;
pub mod index;
pub mod memo;
pub mod render_cache;
pub mod sync;

// Re-export commonly used types
pub use dispatcher::{Applied, Dispatcher, ItemMemo, PageMemo};
pub use document::{extract_preview, parse_date, Document};
pub use engine::{FetchError, Folio, FolioSettings};
pub use index::{PostIndex, Upserted};
pub use memo::{FlightAborted, SingleFlight};
pub use render_cache::{RenderCache, StoreError};
pub use sync::{list_sources, reconcile, Drift, SourceFile, SyncReport};
