//! Page renderer abstraction.
//!
//! Rendering and scraping the member site happens outside this crate. The
//! core only sees a typed request/response contract: scan a catalog page,
//! scan an item's detail page, and read the latest authentication signal.

mod process;
mod protocol;
mod session;
mod types;

pub use process::ProcessRenderer;
pub use session::{SessionPublisher, SessionState};
pub use types::*;

use async_trait::async_trait;

/// A component that renders site pages and returns structured records.
///
/// Each call is a blocking round trip; callers issue one request at a time.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Scan catalog page `page` (1-based).
    async fn scan_catalog_page(&self, page: u32) -> Result<CatalogPage, RendererError>;

    /// Scan the detail page of one catalog item.
    ///
    /// `Ok(None)` means the renderer produced nothing usable for this page.
    async fn scan_item_detail(&self, url: &str) -> Result<Option<DetailScan>, RendererError>;
}
