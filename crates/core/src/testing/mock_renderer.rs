//! Mock page renderer for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::catalog::CatalogItem;
use crate::renderer::{
    CatalogPage, DetailScan, PageRenderer, RendererError, SessionPublisher, SessionState,
};

/// Mock implementation of the PageRenderer trait.
///
/// Provides controllable behavior for testing:
/// - Serve configured catalog pages and detail results
/// - Track which pages and details were scanned
/// - Inject renderer errors and session loss
///
/// # Example
///
/// ```rust,ignore
/// use reelsync_core::testing::{fixtures, MockRenderer};
///
/// let renderer = MockRenderer::new();
/// renderer.set_pages(vec![vec![fixtures::catalog_item(2), fixtures::catalog_item(1)]]).await;
/// renderer.set_detail(&fixtures::catalog_item(1).url, DetailScan::Moved).await;
///
/// let page = renderer.scan_catalog_page(1).await?;
/// assert_eq!(renderer.scanned_pages().await, vec![1]);
/// ```
pub struct MockRenderer {
    /// Catalog pages; index 0 is page 1.
    pages: Arc<RwLock<Vec<Vec<CatalogItem>>>>,
    /// One-shot errors per page.
    page_errors: Arc<RwLock<HashMap<u32, RendererError>>>,
    /// Detail results by URL; `None` means "nothing usable".
    details: Arc<RwLock<HashMap<String, Option<DetailScan>>>>,
    /// One-shot errors per detail URL.
    detail_errors: Arc<RwLock<HashMap<String, RendererError>>>,
    /// Scanning these URLs drops the session afterwards.
    logout_urls: Arc<RwLock<HashSet<String>>>,
    scanned_pages: Arc<RwLock<Vec<u32>>>,
    scanned_details: Arc<RwLock<Vec<String>>>,
    session: SessionPublisher,
}

impl std::fmt::Debug for MockRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockRenderer")
            .field("pages", &"<pages>")
            .field("details", &"<details>")
            .finish()
    }
}

impl Default for MockRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRenderer {
    /// Create a renderer with an empty catalog and an authenticated session.
    pub fn new() -> Self {
        let (session, _) = SessionState::channel(true);
        Self {
            pages: Arc::new(RwLock::new(Vec::new())),
            page_errors: Arc::new(RwLock::new(HashMap::new())),
            details: Arc::new(RwLock::new(HashMap::new())),
            detail_errors: Arc::new(RwLock::new(HashMap::new())),
            logout_urls: Arc::new(RwLock::new(HashSet::new())),
            scanned_pages: Arc::new(RwLock::new(Vec::new())),
            scanned_details: Arc::new(RwLock::new(Vec::new())),
            session,
        }
    }

    /// Authentication signal driven by this renderer.
    pub fn session(&self) -> SessionState {
        self.session.subscribe()
    }

    /// Set the catalog pages (newest first within each page).
    pub async fn set_pages(&self, pages: Vec<Vec<CatalogItem>>) {
        *self.pages.write().await = pages;
    }

    /// Make the next scan of `page` fail.
    pub async fn fail_page(&self, page: u32, error: RendererError) {
        self.page_errors.write().await.insert(page, error);
    }

    pub async fn set_detail(&self, url: &str, scan: DetailScan) {
        self.details.write().await.insert(url.to_string(), Some(scan));
    }

    /// Make the detail scan of `url` return nothing usable.
    pub async fn set_no_detail(&self, url: &str) {
        self.details.write().await.insert(url.to_string(), None);
    }

    /// Make the next detail scan of `url` fail.
    pub async fn fail_detail(&self, url: &str, error: RendererError) {
        self.detail_errors.write().await.insert(url.to_string(), error);
    }

    /// Drop the session right after `url`'s detail page is scanned.
    pub async fn logout_after(&self, url: &str) {
        self.logout_urls.write().await.insert(url.to_string());
    }

    pub async fn scanned_pages(&self) -> Vec<u32> {
        self.scanned_pages.read().await.clone()
    }

    pub async fn scanned_details(&self) -> Vec<String> {
        self.scanned_details.read().await.clone()
    }
}

#[async_trait]
impl PageRenderer for MockRenderer {
    async fn scan_catalog_page(&self, page: u32) -> Result<CatalogPage, RendererError> {
        self.scanned_pages.write().await.push(page);

        if let Some(error) = self.page_errors.write().await.remove(&page) {
            return Err(error);
        }

        let pages = self.pages.read().await;
        match page.checked_sub(1).and_then(|i| pages.get(i as usize)) {
            Some(items) if !items.is_empty() => Ok(CatalogPage::Items(items.clone())),
            _ => Ok(CatalogPage::EndOfList),
        }
    }

    async fn scan_item_detail(&self, url: &str) -> Result<Option<DetailScan>, RendererError> {
        self.scanned_details.write().await.push(url.to_string());

        if self.logout_urls.read().await.contains(url) {
            self.session.publish(false);
        }

        if let Some(error) = self.detail_errors.write().await.remove(url) {
            return Err(error);
        }

        Ok(self.details.read().await.get(url).cloned().flatten())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[tokio::test]
    async fn test_pages_then_end_of_list() {
        let renderer = MockRenderer::new();
        renderer
            .set_pages(vec![vec![fixtures::catalog_item(1)]])
            .await;

        assert!(matches!(
            renderer.scan_catalog_page(1).await.unwrap(),
            CatalogPage::Items(items) if items.len() == 1
        ));
        assert_eq!(
            renderer.scan_catalog_page(2).await.unwrap(),
            CatalogPage::EndOfList
        );
        assert_eq!(renderer.scanned_pages().await, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_logout_publishes_session_loss() {
        let renderer = MockRenderer::new();
        let session = renderer.session();
        let url = fixtures::catalog_item(1).url;
        renderer.logout_after(&url).await;

        assert!(session.is_authenticated());
        renderer.scan_item_detail(&url).await.unwrap();
        assert!(!session.is_authenticated());
    }
}
