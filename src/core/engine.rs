//! The folio context object.
//!
//! [`Folio`] owns the index, the render cache, the renderer and both
//! lookup caches. It is cheap to clone; clones share all state, and
//! separate `Folio::open` calls produce fully independent instances.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::RwLock;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};

use crate::adapters::Renderer;
use crate::domain::{Artifact, ChangeEvent, IndexOp, Page, PostMetadata};

use super::dispatcher::{Applied, Dispatcher, ItemMemo, PageMemo};
use super::index::PostIndex;
use super::memo::FlightAborted;
use super::render_cache::{RenderCache, StoreError};
use super::sync::{list_sources, reconcile, SyncReport};

/// Errors returned by post and page lookups
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("Post not found: {0}")]
    NotFound(String),

    #[error("Failed to load artifact: {0}")]
    Store(Arc<StoreError>),

    #[error("Lookup aborted: {0}")]
    Aborted(#[from] FlightAborted),
}

impl From<StoreError> for FetchError {
    fn from(e: StoreError) -> Self {
        Self::Store(Arc::new(e))
    }
}

impl FetchError {
    /// Check if this is a not-found result
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Directories and paging settings for one folio instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolioSettings {
    /// Source documents, one `<id>.<extension>` per post
    pub posts_dir: PathBuf,

    /// Rendered artifacts
    pub cache_dir: PathBuf,

    /// Source document extension (without the dot)
    pub extension: String,

    /// Posts per page (at least 1)
    pub posts_per_page: usize,
}

impl FolioSettings {
    /// Settings for a blog root laid out as `<root>/posts` and `<root>/.cache`
    pub fn for_blog_dir(blog_dir: impl Into<PathBuf>) -> Self {
        let blog_dir = blog_dir.into();
        Self {
            posts_dir: blog_dir.join("posts"),
            cache_dir: blog_dir.join(".cache"),
            extension: "markdown".to_string(),
            posts_per_page: 5,
        }
    }
}

/// Content index plus render cache
#[derive(Clone)]
pub struct Folio {
    settings: Arc<FolioSettings>,
    index: Arc<RwLock<PostIndex>>,
    cache: RenderCache,
    items: ItemMemo,
    pages: PageMemo,
    dispatcher: Dispatcher,
}

impl Folio {
    /// Load the index from the render cache, then reconcile it against the
    /// source directory
    pub async fn open(settings: FolioSettings, renderer: Arc<dyn Renderer>) -> Result<Self> {
        let folio = Self::load(settings, renderer).await?;
        let report = folio.synchronize().await?;
        info!(
            created = report.created,
            modified = report.modified,
            removed = report.removed,
            "Folio ready with {} post(s)",
            folio.item_count()
        );
        Ok(folio)
    }

    /// Load the index from the render cache without looking at the sources.
    ///
    /// Creates both directories if needed. Superseded artifacts (older
    /// duplicates for one id) are deleted.
    #[instrument(skip_all, fields(cache = %settings.cache_dir.display()))]
    pub async fn load(settings: FolioSettings, renderer: Arc<dyn Renderer>) -> Result<Self> {
        anyhow::ensure!(settings.posts_per_page > 0, "posts_per_page must be at least 1");

        tokio::fs::create_dir_all(&settings.posts_dir)
            .await
            .with_context(|| format!("Failed to create posts directory: {}", settings.posts_dir.display()))?;

        let cache = RenderCache::new(&settings.cache_dir);
        cache
            .ensure_dir()
            .await
            .with_context(|| format!("Failed to create cache directory: {}", settings.cache_dir.display()))?;

        let names = cache
            .list()
            .await
            .with_context(|| format!("Failed to list artifacts in {}", settings.cache_dir.display()))?;

        let (index, superseded) = PostIndex::load(&names);
        for name in superseded {
            match cache.delete(&name).await {
                Ok(()) => info!("Deleted superseded artifact {}", name),
                Err(e) => warn!("Failed to delete superseded artifact {}: {}", name, e),
            }
        }
        info!("Loaded {} post(s) from the render cache", index.len());

        let index = Arc::new(RwLock::new(index));
        let items = ItemMemo::new();
        let pages = PageMemo::new();
        let dispatcher = Dispatcher::new(
            Arc::clone(&index),
            cache.clone(),
            renderer,
            items.clone(),
            pages.clone(),
            settings.extension.clone(),
        );

        Ok(Self {
            settings: Arc::new(settings),
            index,
            cache,
            items,
            pages,
            dispatcher,
        })
    }

    /// Reconcile the index against the source directory.
    ///
    /// Every difference is applied through the dispatcher, concurrently,
    /// and awaited before returning.
    #[instrument(skip_all, fields(posts = %self.settings.posts_dir.display()))]
    pub async fn synchronize(&self) -> Result<SyncReport> {
        let sources = list_sources(&self.settings.posts_dir, &self.settings.extension)
            .await
            .with_context(|| format!("Failed to list posts in {}", self.settings.posts_dir.display()))?;

        let indexed: Vec<PostMetadata> = self.index.read().entries().to_vec();
        let drifts = reconcile(&indexed, &sources);
        let report = SyncReport::from_drifts(&drifts);

        let mut tasks = JoinSet::new();
        for drift in &drifts {
            let dispatcher = self.dispatcher.clone();
            let op = drift.op();
            tasks.spawn(async move { dispatcher.apply(op).await });
        }
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!("Reconciliation task failed: {}", e);
            }
        }

        Ok(report)
    }

    /// Handle a filesystem change reported by the watcher
    pub async fn dispatch(&self, event: ChangeEvent) -> Applied {
        self.dispatcher.dispatch(event).await
    }

    /// Apply an index operation directly
    pub async fn apply(&self, op: IndexOp) -> Applied {
        self.dispatcher.apply(op).await
    }

    /// Fetch one rendered post
    pub async fn fetch_item(&self, id: &str) -> Result<Arc<Artifact>, FetchError> {
        let index = Arc::clone(&self.index);
        let cache = self.cache.clone();
        let key = id.to_string();

        self.items
            .get(id.to_string(), move || async move {
                let file_name = index
                    .read()
                    .get(&key)
                    .map(|meta| meta.cache_key.clone())
                    .ok_or_else(|| FetchError::NotFound(key.clone()))?;

                Ok(Arc::new(cache.read(&file_name).await?))
            })
            .await
    }

    /// Fetch one page of posts, most recent first. Pages are 1-based;
    /// page 0 is treated as page 1 and pages past the end are empty.
    pub async fn fetch_page(&self, page: usize) -> Result<Arc<Page>, FetchError> {
        let page = page.max(1);
        let folio = self.clone();

        self.pages
            .get(page, move || async move { folio.build_page(page).await })
            .await
    }

    /// Number of indexed posts
    pub fn item_count(&self) -> usize {
        self.index.read().len()
    }

    /// Number of pages
    pub fn page_count(&self) -> usize {
        self.item_count().div_ceil(self.settings.posts_per_page)
    }

    /// Post ids in order, most recent first
    pub fn ids(&self) -> Vec<String> {
        self.index.read().ids()
    }

    /// Index entry for a post
    pub fn metadata(&self, id: &str) -> Option<PostMetadata> {
        self.index.read().get(id).cloned()
    }

    /// The settings this instance was opened with
    pub fn settings(&self) -> &FolioSettings {
        &self.settings
    }

    async fn build_page(&self, page: usize) -> Result<Arc<Page>, FetchError> {
        let per_page = self.settings.posts_per_page;
        let start = (page - 1).saturating_mul(per_page);
        let (ids, page_count) = {
            let index = self.index.read();
            (
                index.ids_in(start..start.saturating_add(per_page)),
                index.len().div_ceil(per_page),
            )
        };

        let handles: Vec<_> = ids
            .into_iter()
            .map(|id| {
                let folio = self.clone();
                tokio::spawn(async move { folio.fetch_item(&id).await })
            })
            .collect();

        let mut items = Vec::with_capacity(handles.len());
        for handle in handles {
            let artifact = handle.await.map_err(|_| FetchError::Aborted(FlightAborted))??;
            items.push(artifact);
        }

        Ok(Arc::new(Page {
            items,
            page,
            page_count,
        }))
    }
}
