//! Adapter interfaces for external systems.
//!
//! Rendering a post body to HTML is delegated to a [`Renderer`]. folio
//! ships a plain-text renderer; a markdown engine plugs in behind the same
//! trait.

pub mod plain;

use anyhow::Result;
use async_trait::async_trait;

// Re-export the built-in renderer
pub use plain::PlainTextRenderer;

/// Trait for body renderers
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Human-readable renderer name
    fn name(&self) -> &str;

    /// Render a document body (header already stripped) to HTML
    async fn render(&self, body: &str) -> Result<String>;
}
