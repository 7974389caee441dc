//! Types exchanged with the external page renderer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::CatalogItem;

/// Errors that can occur while talking to the renderer.
#[derive(Debug, Error)]
pub enum RendererError {
    /// The rendered page no longer has the expected structure.
    #[error("Page structure changed: {0}")]
    StructureDrift(String),

    /// The renderer process could not be reached or died.
    #[error("Renderer unavailable: {0}")]
    Unavailable(String),

    /// The renderer sent something we could not interpret.
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RendererError {
    /// Whether this error signals upstream layout drift rather than a broken bridge.
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::StructureDrift(_))
    }
}

/// Response to a catalog page scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogPage {
    /// Items on the page, newest first.
    Items(Vec<CatalogItem>),
    /// The page is past the end of the catalog.
    EndOfList,
}

/// A direct download variant listed on a detail page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadLink {
    /// Label as shown on the page, e.g. `1920x1080.mp4`.
    pub name: String,
    pub link: String,
}

impl DownloadLink {
    pub fn new(name: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            link: link.into(),
        }
    }
}

/// Metadata and link set scraped from one item's detail page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Publication date as displayed, e.g. `27 March 2021`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub download_links: Vec<DownloadLink>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_manifest_url: Option<String>,
}

/// Outcome of scanning an item's detail page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailScan {
    Media(MediaDescriptor),
    /// The item was moved elsewhere on the site.
    Moved,
    /// The page renders but neither links nor a player could be found.
    Broken,
    /// A player exists but no downloads are offered.
    NoDownloadLinks,
}
