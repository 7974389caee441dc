//! JSON-lines protocol spoken with the renderer helper process.
//!
//! Requests are written to the helper's stdin, one JSON object per line:
//!
//! ```json
//! {"op": "scan_catalog_page", "id": 1, "page": 3}
//! {"op": "scan_item_detail", "id": 2, "url": "https://site/video/1/"}
//! ```
//!
//! The helper answers on stdout. Every message carries an `event` tag:
//!
//! ```json
//! {"event": "navigate", "authenticated": true}
//! {"event": "warning", "message": "thumbnail missing"}
//! {"event": "structure_error", "message": "list container not found"}
//! {"event": "catalog_page", "id": 1, "items": [...]}
//! {"event": "end_of_list", "id": 1}
//! {"event": "item_detail", "id": 2, "result": {"kind": "media", "title": "..."}}
//! ```

use serde::{Deserialize, Serialize};

use super::types::{DetailScan, MediaDescriptor};
use crate::catalog::CatalogItem;

/// A request sent to the renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub(crate) enum RendererRequest {
    ScanCatalogPage { id: u64, page: u32 },
    ScanItemDetail { id: u64, url: String },
}

impl RendererRequest {
    pub(crate) fn id(&self) -> u64 {
        match self {
            RendererRequest::ScanCatalogPage { id, .. } => *id,
            RendererRequest::ScanItemDetail { id, .. } => *id,
        }
    }
}

/// Any line the renderer may emit.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub(crate) enum RendererMessage {
    Navigate {
        authenticated: bool,
        #[serde(default)]
        location: Option<String>,
    },
    Warning {
        message: String,
    },
    StructureError {
        message: String,
    },
    CatalogPage {
        id: u64,
        items: Vec<CatalogItem>,
    },
    EndOfList {
        id: u64,
    },
    ItemDetail {
        id: u64,
        result: DetailResult,
    },
}

/// Payload of an `item_detail` answer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum DetailResult {
    Media(MediaDescriptor),
    Moved,
    Broken,
    NoDownloadLinks,
    /// The renderer produced nothing usable for this page.
    None,
}

impl DetailResult {
    pub(crate) fn into_scan(self) -> Option<DetailScan> {
        match self {
            DetailResult::Media(descriptor) => Some(DetailScan::Media(descriptor)),
            DetailResult::Moved => Some(DetailScan::Moved),
            DetailResult::Broken => Some(DetailScan::Broken),
            DetailResult::NoDownloadLinks => Some(DetailScan::NoDownloadLinks),
            DetailResult::None => None,
        }
    }
}

pub(crate) fn encode_request(request: &RendererRequest) -> Result<String, serde_json::Error> {
    let mut line = serde_json::to_string(request)?;
    line.push('\n');
    Ok(line)
}

pub(crate) fn parse_message(line: &str) -> Result<RendererMessage, serde_json::Error> {
    serde_json::from_str(line)
}
