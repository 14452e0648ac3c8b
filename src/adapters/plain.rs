//! Plain-text renderer.
//!
//! Escapes HTML and wraps each blank-line separated block in `<p>`. Enough
//! for previews and for running folio without a markdown engine.

use anyhow::Result;
use async_trait::async_trait;

use super::Renderer;

/// Renderer that treats the body as plain text paragraphs
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextRenderer;

impl PlainTextRenderer {
    /// Create a new plain-text renderer
    pub fn new() -> Self {
        Self
    }

    fn to_html(body: &str) -> String {
        let mut html = String::with_capacity(body.len() + 16);
        let mut paragraph: Vec<&str> = Vec::new();

        for line in body.lines() {
            if line.trim().is_empty() {
                flush(&mut paragraph, &mut html);
            } else {
                paragraph.push(line.trim_end());
            }
        }
        flush(&mut paragraph, &mut html);

        html
    }
}

#[async_trait]
impl Renderer for PlainTextRenderer {
    fn name(&self) -> &str {
        "plain"
    }

    async fn render(&self, body: &str) -> Result<String> {
        Ok(Self::to_html(body))
    }
}

fn flush(paragraph: &mut Vec<&str>, html: &mut String) {
    if paragraph.is_empty() {
        return;
    }
    if !html.is_empty() {
        html.push('\n');
    }
    html.push_str("<p>");
    html.push_str(&escape(&paragraph.join("\n")));
    html.push_str("</p>");
    paragraph.clear();
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
