//! Types for the enumerated catalog and its cached snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A tag attached to a catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogTag {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// One downloadable work as listed on a catalog page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    /// Display name.
    pub name: String,
    /// Detail page URL; unique key for the item.
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<CatalogTag>,
}

impl CatalogItem {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            image_url: None,
            tags: Vec::new(),
        }
    }

    /// Apply text repairs to the captured display strings.
    pub(crate) fn repaired(mut self) -> Self {
        self.name = repair_text(&self.name);
        for tag in &mut self.tags {
            tag.name = repair_text(&tag.name);
        }
        self
    }
}

/// The full enumerated catalog as persisted on disk.
///
/// Serialized as `{"ts": "<rfc3339>", "data": [...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "data")]
    pub items: Vec<CatalogItem>,
}

impl CatalogSnapshot {
    pub fn new(items: Vec<CatalogItem>) -> Self {
        Self {
            timestamp: Utc::now(),
            items,
        }
    }

    /// Whether the snapshot is younger than `window` at `now`.
    pub fn is_fresh(&self, now: DateTime<Utc>, window: chrono::Duration) -> bool {
        now.signed_duration_since(self.timestamp) < window
    }
}

impl Default for CatalogSnapshot {
    fn default() -> Self {
        Self {
            timestamp: DateTime::<Utc>::UNIX_EPOCH,
            items: Vec::new(),
        }
    }
}

/// Errors for catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed catalog snapshot {path}: {reason}")]
    Malformed { path: String, reason: String },

    #[error("Renderer error while scanning page {page}: {source}")]
    Renderer {
        page: u32,
        #[source]
        source: crate::renderer::RendererError,
    },

    #[error("Crawl exceeded the configured limit of {max_pages} pages")]
    PageLimitExceeded { max_pages: u32 },
}

impl CatalogError {
    /// Whether the crawl failed because the catalog page layout drifted.
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Renderer { source, .. } if source.is_structural())
    }
}

/// Replacement table for encoding damage seen in scraped names.
const TEXT_REPAIRS: &[(&str, &str)] = &[
    ("Ã¶", "ö"),
    ("Ã¤", "ä"),
    ("Ã¼", "ü"),
    ("ÃŸ", "ß"),
    ("Â´", "'"),
    ("├Â", "ö"),
    ("&amp;", "&"),
];

/// Undo double-encoded UTF-8 and stray HTML entities in a scraped string.
pub fn repair_text(value: &str) -> String {
    TEXT_REPAIRS
        .iter()
        .fold(value.to_string(), |acc, (from, to)| acc.replace(from, to))
}
