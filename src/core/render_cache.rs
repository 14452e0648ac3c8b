//! On-disk artifact storage.
//!
//! One JSON file per post, named `<date>.<mtime>.<id>.json`. Files are
//! written under a unique temporary name and renamed into place, so a
//! listing never returns a half-written artifact.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::Builder;
use thiserror::Error;
use tokio::fs;

use crate::domain::{strip_extension, Artifact, ArtifactName, ARTIFACT_EXTENSION};

/// Errors that can occur in the render cache
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Directory of rendered artifacts
#[derive(Debug, Clone)]
pub struct RenderCache {
    dir: PathBuf,
}

impl RenderCache {
    /// Create a cache rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Get the cache directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Full path of an artifact file
    pub fn path_of(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    /// Ensure the cache directory exists
    pub async fn ensure_dir(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    /// List artifact filenames (anything ending in `.json`), sorted
    pub async fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if strip_extension(name, ARTIFACT_EXTENSION).is_some() {
                    names.push(name.to_string());
                }
            }
        }

        names.sort();
        Ok(names)
    }

    /// Persist an artifact, returning the filename it was stored under.
    ///
    /// Every write stages through its own uniquely named temporary file, so
    /// concurrent writes of one name never collide; the last rename wins.
    pub async fn write(&self, name: &ArtifactName, artifact: &Artifact) -> Result<String, StoreError> {
        let file_name = name.file_name();
        let json = serde_json::to_vec(artifact)?;
        let dir = self.dir.clone();
        let target = self.path_of(&file_name);

        tokio::task::spawn_blocking(move || stage_and_persist(&dir, &target, &json))
            .await
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))??;

        Ok(file_name)
    }

    /// Load an artifact by filename
    pub async fn read(&self, file_name: &str) -> Result<Artifact, StoreError> {
        let content = fs::read_to_string(self.path_of(file_name)).await?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Delete an artifact by filename
    pub async fn delete(&self, file_name: &str) -> Result<(), StoreError> {
        fs::remove_file(self.path_of(file_name)).await?;
        Ok(())
    }
}

/// Write `bytes` to a fresh temporary file in `dir` and rename it onto
/// `target`. The temporary file is removed if anything fails.
fn stage_and_persist(dir: &Path, target: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut staging = Builder::new().prefix(".").suffix(".tmp").tempfile_in(dir)?;
    staging.write_all(bytes)?;
    staging.as_file().sync_all()?;
    staging.persist(target).map_err(|e| e.error)?;
    Ok(())
}
