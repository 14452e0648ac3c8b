//! Applies index operations: render, persist, update the index, invalidate.
//!
//! Live watcher events and startup reconciliation both end up in
//! [`Dispatcher::apply`]. A failed read, render or write drops that one
//! operation; the post keeps its previous state until the next event.

use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::fs;
use tracing::{debug, info, instrument, warn};

use crate::adapters::Renderer;
use crate::domain::{Artifact, ArtifactName, ChangeEvent, IndexOp, Page, PostMetadata};

use super::document::{extract_preview, Document};
use super::engine::FetchError;
use super::index::{PostIndex, Upserted};
use super::memo::SingleFlight;
use super::render_cache::RenderCache;
use super::sync::modified_at;

/// Per-item lookups, keyed by post id
pub type ItemMemo = SingleFlight<String, Arc<Artifact>, FetchError>;

/// Per-page lookups, keyed by 1-based page number
pub type PageMemo = SingleFlight<usize, Arc<Page>, FetchError>;

/// What an operation did to the index
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// A new post was added at `pos`
    Inserted { id: String, pos: usize },

    /// An existing post was re-rendered
    Replaced { id: String },

    /// A post was removed
    Removed { id: String },

    /// Nothing changed: the event was not for a source document, the id was
    /// not indexed, or an I/O step failed
    Skipped,
}

/// Turns change events and index operations into index mutations
#[derive(Clone)]
pub struct Dispatcher {
    index: Arc<RwLock<PostIndex>>,
    cache: RenderCache,
    renderer: Arc<dyn Renderer>,
    items: ItemMemo,
    pages: PageMemo,
    extension: String,
}

impl Dispatcher {
    /// Create a dispatcher over shared state
    pub fn new(
        index: Arc<RwLock<PostIndex>>,
        cache: RenderCache,
        renderer: Arc<dyn Renderer>,
        items: ItemMemo,
        pages: PageMemo,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            index,
            cache,
            renderer,
            items,
            pages,
            extension: extension.into(),
        }
    }

    /// Handle a raw filesystem change
    pub async fn dispatch(&self, event: ChangeEvent) -> Applied {
        match event.to_op(&self.extension) {
            Some(op) => self.apply(op).await,
            None => {
                debug!("Ignoring change to {}", event.path.display());
                Applied::Skipped
            }
        }
    }

    /// Apply one index operation
    #[instrument(skip(self), fields(id = %op.id()))]
    pub async fn apply(&self, op: IndexOp) -> Applied {
        match op {
            IndexOp::Upsert { id, path } => self.upsert(id, &path).await,
            IndexOp::Remove { id } => self.remove(id).await,
        }
    }

    async fn upsert(&self, id: String, path: &Path) -> Applied {
        // Stat before reading: if the file changes in between, the stored
        // mtime is the older one and the next reconciliation re-renders it.
        let metadata = match fs::metadata(path).await {
            Ok(m) => m,
            Err(e) => {
                warn!("Failed to stat {}: {}", path.display(), e);
                return Applied::Skipped;
            }
        };
        let modified = match modified_at(&metadata) {
            Ok(modified) => modified,
            Err(e) => {
                warn!("Failed to read mtime of {}: {}", path.display(), e);
                return Applied::Skipped;
            }
        };
        let mtime = modified.timestamp_millis();

        let source = match fs::read_to_string(path).await {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to read {}: {}", path.display(), e);
                return Applied::Skipped;
            }
        };

        let document = Document::parse(&source);
        let content = match self.renderer.render(&document.body).await {
            Ok(html) => html,
            Err(e) => {
                warn!("Renderer '{}' failed on {}: {}", self.renderer.name(), path.display(), e);
                return Applied::Skipped;
            }
        };

        let name = ArtifactName::new(document.declared_date(modified), mtime, id.clone());
        let artifact = Artifact {
            id: id.clone(),
            preview: extract_preview(&content),
            attributes: document.attributes,
            content,
        };

        let file_name = match self.cache.write(&name, &artifact).await {
            Ok(f) => f,
            Err(e) => {
                warn!("Failed to write artifact {}: {}", name, e);
                return Applied::Skipped;
            }
        };

        let upserted = self.index.write().upsert(PostMetadata::from_name(&name));

        self.items.evict(&id);
        self.pages.clear();

        match upserted {
            Upserted::Inserted { pos } => {
                info!(pos, "Indexed new post {}", file_name);
                Applied::Inserted { id, pos }
            }
            Upserted::Replaced { previous, moved } => {
                debug!(moved, "Re-rendered post {}", file_name);
                if previous.cache_key != file_name {
                    if let Err(e) = self.cache.delete(&previous.cache_key).await {
                        warn!("Failed to delete stale artifact {}: {}", previous.cache_key, e);
                    }
                }
                Applied::Replaced { id }
            }
        }
    }

    async fn remove(&self, id: String) -> Applied {
        let removed = self.index.write().remove(&id);
        let Some(meta) = removed else {
            debug!("Remove for unindexed post");
            return Applied::Skipped;
        };

        self.items.evict(&id);
        self.pages.clear();

        if let Err(e) = self.cache.delete(&meta.cache_key).await {
            warn!("Failed to delete artifact {}: {}", meta.cache_key, e);
        }

        info!("Removed post {}", meta.cache_key);
        Applied::Removed { id }
    }
}
