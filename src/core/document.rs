//! Source document parsing: header block, declared date and preview.
//!
//! A source document starts with zero or more `key: value` lines (key made
//! of word characters). The first line that does not match ends the header;
//! there is no malformed header, only a shorter one.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};

use crate::domain::NO_PREVIEW;

/// Header attribute holding the declared publication date
pub const DATE_ATTRIBUTE: &str = "date";

/// A source document split into header attributes and body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    /// Header attributes, keys lower-cased
    pub attributes: BTreeMap<String, String>,

    /// Everything after the header block
    pub body: String,
}

impl Document {
    /// Split a source document into header attributes and body.
    ///
    /// Blank lines after a header line are consumed with it, so the body
    /// starts at the first non-blank, non-header line.
    pub fn parse(source: &str) -> Self {
        let mut attributes = BTreeMap::new();
        let mut rest = source;

        while !rest.is_empty() {
            let (line, remainder) = rest.split_once('\n').unwrap_or((rest, ""));
            let Some((key, value)) = parse_header_line(line) else {
                break;
            };

            attributes.insert(key.to_ascii_lowercase(), value.to_string());
            rest = remainder.trim_start();
        }

        Self {
            attributes,
            body: rest.to_string(),
        }
    }

    /// The declared date, or `fallback` if it is missing or unparseable
    pub fn declared_date(&self, fallback: DateTime<Utc>) -> DateTime<Utc> {
        self.attributes
            .get(DATE_ATTRIBUTE)
            .and_then(|raw| parse_date(raw))
            .unwrap_or(fallback)
    }
}

fn parse_header_line(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    let is_word = !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    is_word.then(|| (key, value.trim()))
}

/// Parse a declared date. Values without an offset are taken as UTC.
///
/// Years outside 0..=9999 are rejected: they cannot be written as the
/// fixed-width `YYYYMMDDHHMMSS` sort key.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    parse_any_date(raw.trim()).filter(|date| (0..=9999).contains(&date.year()))
}

fn parse_any_date(raw: &str) -> Option<DateTime<Utc>> {

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];
    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Leading excerpt of rendered HTML: everything up to the end of the
/// second `<p>` block (or the first, if there is only one).
pub fn extract_preview(html: &str) -> String {
    // ASCII lower-casing keeps byte offsets aligned with `html`
    let lower = html.to_ascii_lowercase();
    let mut end = 0;
    let mut blocks = 0;

    while blocks < 2 {
        let Some(open) = lower[end..].find("<p>") else {
            break;
        };
        let body_start = end + open + "<p>".len();
        let Some(close) = lower[body_start..].find("</p>") else {
            break;
        };
        end = body_start + close + "</p>".len();
        blocks += 1;
    }

    if blocks == 0 {
        NO_PREVIEW.to_string()
    } else {
        html[..end].to_string()
    }
}
