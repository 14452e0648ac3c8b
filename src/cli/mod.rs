//! Command-line interface for folio.
//!
//! Provides commands for synchronizing the render cache, watching the
//! posts directory, and browsing the index.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::adapters::PlainTextRenderer;
use crate::config::{self, ResolvedConfig};
use crate::core::Folio;
use crate::domain::ArtifactName;
use crate::ingest::PostWatcher;

/// folio - Content index and render cache for a directory of posts
#[derive(Parser, Debug)]
#[command(name = "folio")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Blog root (overrides FOLIO_HOME and the config file)
    #[arg(long, global = true)]
    pub blog_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Reconcile the render cache with the posts directory
    Sync,

    /// Sync, then keep the render cache up to date until Ctrl+C
    Watch,

    /// List one page of posts, most recent first
    List {
        /// Page number (1-based)
        #[arg(short, long, default_value = "1")]
        page: usize,
    },

    /// Show a rendered post
    Show {
        /// Post ID (filename without extension)
        id: String,

        /// Show full content instead of the preview
        #[arg(short, long)]
        full: bool,
    },

    /// Show index statistics
    Stats,

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let mut cfg = config::load_config()?;
        if let Some(dir) = self.blog_dir {
            cfg = cfg.with_blog_dir(dir);
        }

        match self.command {
            Commands::Sync => sync(&cfg).await,
            Commands::Watch => watch(&cfg).await,
            Commands::List { page } => list_posts(&cfg, page).await,
            Commands::Show { id, full } => show_post(&cfg, &id, full).await,
            Commands::Stats => show_stats(&cfg).await,
            Commands::Config => show_config(&cfg),
        }
    }
}

/// Load the index and reconcile it with the posts directory
async fn open(cfg: &ResolvedConfig) -> Result<Folio> {
    Folio::open(cfg.settings(), Arc::new(PlainTextRenderer::new()))
        .await
        .with_context(|| format!("Failed to open blog at {}", cfg.blog_dir.display()))
}

async fn sync(cfg: &ResolvedConfig) -> Result<()> {
    let folio = Folio::load(cfg.settings(), Arc::new(PlainTextRenderer::new())).await?;
    let report = folio.synchronize().await?;

    if report.is_clean() {
        println!("Up to date ({} posts)", folio.item_count());
    } else {
        println!(
            "Synced {} posts: {} created, {} modified, {} removed",
            folio.item_count(),
            report.created,
            report.modified,
            report.removed
        );
    }

    Ok(())
}

async fn watch(cfg: &ResolvedConfig) -> Result<()> {
    let folio = open(cfg).await?;
    println!(
        "Watching {} ({} posts). Press Ctrl+C to stop.",
        cfg.posts_dir().display(),
        folio.item_count()
    );

    let handle = PostWatcher::new(folio).watch()?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    eprintln!("\nStopping watcher...");
    handle.stop().await?;
    Ok(())
}

async fn list_posts(cfg: &ResolvedConfig, page: usize) -> Result<()> {
    let folio = open(cfg).await?;
    let page = folio.fetch_page(page).await?;

    if page.items.is_empty() {
        println!("No posts on page {} of {}", page.page, page.page_count);
        return Ok(());
    }

    println!("{:<16} {:<30} {}", "DATE", "ID", "TITLE");
    println!("{}", "-".repeat(75));
    for artifact in &page.items {
        let date = folio
            .metadata(&artifact.id)
            .and_then(|meta| ArtifactName::parse(&meta.cache_key))
            .map(|name| format_date(&name.date))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<16} {:<30} {}",
            date,
            artifact.id,
            artifact.title().unwrap_or("(untitled)")
        );
    }
    println!("\nPage {} of {}", page.page, page.page_count);

    Ok(())
}

async fn show_post(cfg: &ResolvedConfig, id: &str, full: bool) -> Result<()> {
    let folio = open(cfg).await?;
    let artifact = folio.fetch_item(id).await?;

    println!("ID: {}", artifact.id);
    for (key, value) in &artifact.attributes {
        println!("{}: {}", key, value);
    }
    println!();
    if full {
        println!("{}", artifact.content);
    } else {
        println!("{}", artifact.preview);
    }

    Ok(())
}

async fn show_stats(cfg: &ResolvedConfig) -> Result<()> {
    let folio = open(cfg).await?;

    println!("Posts:          {}", folio.item_count());
    println!("Pages:          {}", folio.page_count());
    println!("Posts per page: {}", cfg.posts_per_page);
    if let Some(latest) = folio.ids().first() {
        println!("Latest:         {}", latest);
    }

    Ok(())
}

fn show_config(cfg: &ResolvedConfig) -> Result<()> {
    println!("folio configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Blog:   {}", cfg.blog_dir.display());
    println!("  Posts:  {}", cfg.posts_dir().display());
    println!("  Cache:  {}", cfg.cache_dir().display());
    println!();
    println!("Blog:");
    println!("  Posts per page: {}", cfg.posts_per_page);
    println!("  Extension:      .{}", cfg.extension);

    Ok(())
}

/// `YYYYMMDDHHMMSS` as `YYYY-MM-DD HH:MM`
fn format_date(sortable: &str) -> String {
    match chrono::NaiveDateTime::parse_from_str(sortable, "%Y%m%d%H%M%S") {
        Ok(date) => date.format("%Y-%m-%d %H:%M").to_string(),
        Err(_) => sortable.to_string(),
    }
}
