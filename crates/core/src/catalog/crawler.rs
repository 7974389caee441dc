//! Catalog crawl coordinator.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::{CatalogCache, CatalogError, CatalogItem, CatalogSnapshot};
use crate::config::CrawlConfig;
use crate::metrics;
use crate::renderer::{CatalogPage, PageRenderer};

/// Walks catalog pages through the renderer and maintains the snapshot cache.
pub struct CrawlCoordinator {
    renderer: Arc<dyn PageRenderer>,
    cache: Arc<dyn CatalogCache>,
    config: CrawlConfig,
}

impl CrawlCoordinator {
    pub fn new(
        renderer: Arc<dyn PageRenderer>,
        cache: Arc<dyn CatalogCache>,
        config: CrawlConfig,
    ) -> Self {
        Self {
            renderer,
            cache,
            config,
        }
    }

    /// Get the catalog, oldest item first.
    ///
    /// A snapshot younger than the freshness window is returned verbatim;
    /// anything else (or `force_refresh`) triggers a full recrawl.
    pub async fn load(&self, force_refresh: bool) -> Result<Vec<CatalogItem>, CatalogError> {
        if !force_refresh {
            match self.cache.read() {
                Ok(snapshot) if snapshot.is_fresh(Utc::now(), self.config.freshness_window()) => {
                    info!(
                        items = snapshot.items.len(),
                        taken_at = %snapshot.timestamp,
                        "Using cached catalog snapshot"
                    );
                    return Ok(snapshot.items);
                }
                Ok(snapshot) => {
                    debug!(taken_at = %snapshot.timestamp, "Catalog snapshot is stale");
                }
                Err(e) => {
                    warn!("Ignoring unreadable catalog snapshot: {}", e);
                }
            }
        }

        self.crawl().await
    }

    /// Enumerate every catalog page and write a fresh snapshot.
    pub async fn crawl(&self) -> Result<Vec<CatalogItem>, CatalogError> {
        let mut page: u32 = 1;
        let mut items: Vec<CatalogItem> = Vec::new();

        loop {
            if let Some(max_pages) = self.config.max_pages {
                if page > max_pages {
                    return Err(CatalogError::PageLimitExceeded { max_pages });
                }
            }

            let scanned = self
                .renderer
                .scan_catalog_page(page)
                .await
                .map_err(|source| CatalogError::Renderer { page, source })?;
            metrics::CATALOG_PAGES_SCANNED.inc();

            match scanned {
                CatalogPage::Items(batch) => {
                    debug!(page, count = batch.len(), "Scanned catalog page");
                    items.extend(batch.into_iter().map(CatalogItem::repaired));
                    page += 1;
                }
                CatalogPage::EndOfList => {
                    // The page that signalled the end holds nothing.
                    page -= 1;
                    break;
                }
            }
        }

        // Pages list newest first; downloads run oldest first.
        items.reverse();
        let items = dedup_by_url(items);

        if items.is_empty() {
            warn!("Catalog crawl found no items; the snapshot is left untouched");
            return Ok(items);
        }
        info!(pages = page, items = items.len(), "Catalog crawl finished");

        self.cache.write(&CatalogSnapshot::new(items.clone()))?;
        Ok(items)
    }
}

/// Drop repeated URLs (items shifting across page boundaries mid-crawl),
/// keeping the first occurrence.
fn dedup_by_url(items: Vec<CatalogItem>) -> Vec<CatalogItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| {
            let fresh = seen.insert(item.url.clone());
            if !fresh {
                debug!(url = %item.url, "Skipping duplicate catalog entry");
            }
            fresh
        })
        .collect()
}
