//! Configuration for folio paths and paging.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (FOLIO_HOME, FOLIO_POSTS_PER_PAGE)
//! 2. Config file (.folio/config.yaml)
//! 3. Defaults (./blog, 5 posts per page)
//!
//! Config file discovery:
//! - Searches current directory and parents for .folio/config.yaml
//! - Falls back to the user config directory (e.g. ~/.config/folio/config.yaml)
//! - `paths.blog` is relative to the project root (parent of .folio/);
//!   `paths.posts` and `paths.cache` are relative to the blog root

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::FolioSettings;

pub const HOME_ENV: &str = "FOLIO_HOME";
pub const POSTS_PER_PAGE_ENV: &str = "FOLIO_POSTS_PER_PAGE";

const DEFAULT_BLOG_DIR: &str = "blog";
const DEFAULT_POSTS_DIR: &str = "posts";
const DEFAULT_CACHE_DIR: &str = ".cache";
const DEFAULT_POSTS_PER_PAGE: usize = 5;
const DEFAULT_EXTENSION: &str = "markdown";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub blog: BlogConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Blog root (relative to the project root)
    pub blog: Option<String>,
    /// Source documents (relative to the blog root)
    pub posts: Option<String>,
    /// Rendered artifacts (relative to the blog root)
    pub cache: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlogConfig {
    pub posts_per_page: Option<usize>,
    pub extension: Option<String>,
}

/// Resolved configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    /// Blog root
    pub blog_dir: PathBuf,
    /// Posts directory, relative to the blog root unless absolute
    pub posts: String,
    /// Cache directory, relative to the blog root unless absolute
    pub cache: String,
    pub posts_per_page: usize,
    /// Source document extension (without the dot)
    pub extension: String,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl ResolvedConfig {
    /// Absolute posts directory
    pub fn posts_dir(&self) -> PathBuf {
        resolve_path(&self.blog_dir, &self.posts)
    }

    /// Absolute cache directory
    pub fn cache_dir(&self) -> PathBuf {
        resolve_path(&self.blog_dir, &self.cache)
    }

    /// Replace the blog root, keeping the relative layout beneath it
    pub fn with_blog_dir(mut self, blog_dir: impl Into<PathBuf>) -> Self {
        self.blog_dir = blog_dir.into();
        self
    }

    /// Settings for `Folio::open`
    pub fn settings(&self) -> FolioSettings {
        FolioSettings {
            posts_dir: self.posts_dir(),
            cache_dir: self.cache_dir(),
            extension: self.extension.clone(),
            posts_per_page: self.posts_per_page,
        }
    }
}

/// Find config file by searching `start` and its parents, then the user
/// config directory
fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(".folio").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    dirs::config_dir()
        .map(|dir| dir.join("folio").join("config.yaml"))
        .filter(|path| path.exists())
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to `base`
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

fn parse_posts_per_page(raw: &str) -> Result<usize> {
    raw.trim()
        .parse()
        .with_context(|| format!("{} is not a number: {:?}", POSTS_PER_PAGE_ENV, raw))
}

/// Load configuration from all sources, starting discovery at the current
/// directory
pub fn load_config() -> Result<ResolvedConfig> {
    let cwd = std::env::current_dir().context("Failed to determine current directory")?;
    resolve(
        &cwd,
        find_config_file(&cwd),
        std::env::var(HOME_ENV).ok(),
        std::env::var(POSTS_PER_PAGE_ENV).ok(),
    )
}

/// Combine a config file and environment overrides into a resolved config
fn resolve(
    cwd: &Path,
    config_file: Option<PathBuf>,
    env_home: Option<String>,
    env_posts_per_page: Option<String>,
) -> Result<ResolvedConfig> {
    let (file, base_dir) = match config_file {
        Some(ref config_path) => {
            let config = load_config_file(config_path)?;
            // Base directory is the parent of .folio/ (i.e., grandparent of config.yaml)
            let base_dir = config_path
                .parent()
                .and_then(|p| p.parent())
                .unwrap_or(cwd)
                .to_path_buf();
            (Some(config), base_dir)
        }
        None => (None, cwd.to_path_buf()),
    };

    let paths = file.as_ref().map(|f| f.paths.clone()).unwrap_or_default();
    let blog = file.as_ref().map(|f| f.blog.clone()).unwrap_or_default();

    let blog_dir = match env_home {
        Some(home) => resolve_path(cwd, &home),
        None => resolve_path(&base_dir, paths.blog.as_deref().unwrap_or(DEFAULT_BLOG_DIR)),
    };

    let posts_per_page = match env_posts_per_page {
        Some(raw) => parse_posts_per_page(&raw)?,
        None => blog.posts_per_page.unwrap_or(DEFAULT_POSTS_PER_PAGE),
    };
    anyhow::ensure!(posts_per_page > 0, "posts_per_page must be at least 1");

    let extension = blog
        .extension
        .map(|ext| ext.trim_start_matches('.').to_string())
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());
    anyhow::ensure!(!extension.is_empty(), "blog.extension must not be empty");

    Ok(ResolvedConfig {
        blog_dir,
        posts: paths.posts.unwrap_or_else(|| DEFAULT_POSTS_DIR.to_string()),
        cache: paths.cache.unwrap_or_else(|| DEFAULT_CACHE_DIR.to_string()),
        posts_per_page,
        extension,
        config_file,
    })
}
