//! Catalog enumeration and its time-windowed snapshot cache.
//!
//! The crawler walks catalog pages through the renderer until the end of the
//! list and stores the result, so repeated runs inside the freshness window
//! never touch the catalog pages again.

mod cache;
mod crawler;
mod types;

pub use cache::JsonCatalogCache;
pub use crawler::CrawlCoordinator;
pub use types::*;

/// Durable store for the catalog snapshot.
///
/// A dumb store: staleness is decided by the consumer.
pub trait CatalogCache: Send + Sync {
    /// Read the stored snapshot, or the default (epoch, empty) when absent.
    fn read(&self) -> Result<CatalogSnapshot, CatalogError>;

    /// Replace the stored snapshot.
    fn write(&self, snapshot: &CatalogSnapshot) -> Result<(), CatalogError>;
}
