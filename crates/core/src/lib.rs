pub mod catalog;
pub mod config;
pub mod connectivity;
pub mod fetch;
mod json_file;
pub mod metrics;
pub mod orchestrator;
pub mod renderer;
pub mod selector;
pub mod status;
pub mod stream;
pub mod testing;

pub use catalog::{
    CatalogCache, CatalogError, CatalogItem, CatalogSnapshot, CatalogTag, CrawlCoordinator,
    JsonCatalogCache,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
    StreamOverrides,
};
pub use connectivity::{ConnectivityError, ConnectivityGate, ReachabilityProbe, TcpProbe};
pub use fetch::{DirectDownloader, FetchError, HttpFetcher, MediaFetcher};
pub use orchestrator::{
    DownloadOrchestrator, ItemOutcome, OrchestratorConfig, OrchestratorError, RunOptions,
    RunSummary,
};
pub use renderer::{
    CatalogPage, DetailScan, DownloadLink, MediaDescriptor, PageRenderer, ProcessRenderer,
    RendererError, SessionPublisher, SessionState,
};
pub use selector::select_best_link;
pub use status::{DownloadRecord, DownloadStatus, JsonStatusStore, StatusStore, StatusStoreError};
pub use stream::{SegmentStreamDownloader, StreamError};
