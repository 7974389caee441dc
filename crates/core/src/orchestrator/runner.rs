//! Download orchestrator implementation.
//!
//! Walks the catalog strictly sequentially. For each item it decides
//! whether to skip, asks the renderer for the detail page, records a
//! provisional `TODO`, and then drives the direct and stream download
//! paths until a terminal status can be recorded.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::catalog::CatalogItem;
use crate::config::{DirectConfig, StreamConfig, StreamOverrides};
use crate::connectivity::ConnectivityGate;
use crate::fetch::{DirectDownloader, FetchError, MediaFetcher};
use crate::metrics;
use crate::renderer::{DetailScan, MediaDescriptor, PageRenderer, SessionState};
use crate::selector::select_best_link;
use crate::status::{DownloadRecord, DownloadStatus, StatusStore};
use crate::stream::{SegmentStreamDownloader, StreamError};

use super::config::OrchestratorConfig;
use super::filename;
use super::types::{ItemOutcome, OrchestratorError, RunOptions, RunSummary, SkipReason};

/// Drives every catalog item to a recorded outcome.
pub struct DownloadOrchestrator {
    config: OrchestratorConfig,
    store: Arc<dyn StatusStore>,
    renderer: Arc<dyn PageRenderer>,
    session: SessionState,
    gate: ConnectivityGate,
    fetcher: Arc<dyn MediaFetcher>,
    direct_config: DirectConfig,
    stream_config: StreamConfig,
    overrides: StreamOverrides,
}

impl DownloadOrchestrator {
    /// Create an orchestrator with default transfer settings and no
    /// stream overrides.
    pub fn new(
        config: OrchestratorConfig,
        store: Arc<dyn StatusStore>,
        renderer: Arc<dyn PageRenderer>,
        session: SessionState,
        gate: ConnectivityGate,
        fetcher: Arc<dyn MediaFetcher>,
    ) -> Self {
        Self {
            config,
            store,
            renderer,
            session,
            gate,
            fetcher,
            direct_config: DirectConfig::default(),
            stream_config: StreamConfig::default(),
            overrides: StreamOverrides::default(),
        }
    }

    pub fn with_direct_config(mut self, config: DirectConfig) -> Self {
        self.direct_config = config;
        self
    }

    pub fn with_stream_config(mut self, config: StreamConfig) -> Self {
        self.stream_config = config;
        self
    }

    pub fn with_overrides(mut self, overrides: StreamOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Process `items` in order.
    ///
    /// Returns early only on run-fatal conditions (lost session, exhausted
    /// connectivity guard, store or bridge failures).
    pub async fn run(
        &self,
        items: &[CatalogItem],
        options: &RunOptions,
    ) -> Result<RunSummary, OrchestratorError> {
        let dir = &self.config.download_dir;
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| OrchestratorError::Io {
                path: dir.display().to_string(),
                source,
            })?;

        let total = items.len();
        let mut summary = RunSummary::default();
        info!(total, ?options, "Starting download run");

        for (index, item) in items.iter().enumerate() {
            info!(
                item = index + 1,
                total,
                name = %item.name,
                url = %item.url,
                "Processing catalog item"
            );

            let outcome = self.process_item(item, options).await?;
            metrics::ITEMS_PROCESSED
                .with_label_values(&[outcome.label()])
                .inc();
            summary.record(&outcome);
        }

        info!(
            done = summary.done,
            failed = summary.failed,
            skipped = summary.skipped,
            "Download run finished"
        );
        Ok(summary)
    }

    /// Run one item through the state machine.
    pub async fn process_item(
        &self,
        item: &CatalogItem,
        options: &RunOptions,
    ) -> Result<ItemOutcome, OrchestratorError> {
        let existing = self.store.get(&item.url)?;
        if let Some(reason) = skip_reason(existing.as_ref(), options) {
            debug!(url = %item.url, ?reason, "Skipping item");
            return Ok(ItemOutcome::Skipped(reason));
        }

        self.gate.wait_until_reachable().await?;
        if !self.session.is_authenticated() {
            error!(url = %item.url, "Member session lost, stopping run");
            return Err(OrchestratorError::AuthenticationLost);
        }

        let scan = match self.renderer.scan_item_detail(&item.url).await {
            Ok(Some(scan)) => scan,
            Ok(None) => {
                warn!(url = %item.url, "No details returned for item, leaving it unrecorded");
                return Ok(ItemOutcome::Unresolved);
            }
            Err(e) if e.is_structural() => {
                warn!(url = %item.url, "Detail page layout changed: {}", e);
                return Ok(ItemOutcome::Unresolved);
            }
            Err(e) => return Err(e.into()),
        };

        let descriptor = match &scan {
            DetailScan::Media(descriptor) => Some(descriptor),
            _ => None,
        };
        let record = self.provisional_record(item, existing, descriptor)?;
        self.store.upsert(record.clone())?;

        match scan {
            DetailScan::Moved => self.finish(record, DownloadStatus::Moved, None),
            DetailScan::Broken => self.finish(record, DownloadStatus::PageBroken, None),
            DetailScan::NoDownloadLinks => self.finish(record, DownloadStatus::NoDownloads, None),
            DetailScan::Media(descriptor) => self.download_media(item, record, &descriptor).await,
        }
    }

    fn provisional_record(
        &self,
        item: &CatalogItem,
        existing: Option<DownloadRecord>,
        descriptor: Option<&MediaDescriptor>,
    ) -> Result<DownloadRecord, OrchestratorError> {
        let mut record = match existing {
            Some(mut record) => {
                record.reopen(item, descriptor);
                record
            }
            None => DownloadRecord::provisional(item, descriptor),
        };

        if record.filename.is_empty() {
            if let Some(descriptor) = descriptor {
                record.filename = self.allocate_filename(item, descriptor)?;
            }
        }
        Ok(record)
    }

    /// Pick a file stem no other item's record has claimed.
    fn allocate_filename(
        &self,
        item: &CatalogItem,
        descriptor: &MediaDescriptor,
    ) -> Result<String, OrchestratorError> {
        let stem = filename::build_stem(&descriptor.tags, descriptor.title.as_deref(), &item.name);
        if !self.config.unique_filenames {
            return Ok(stem);
        }

        let mut candidate = stem.clone();
        let mut n = 1;
        while self.store.is_filename_claimed(&candidate, &item.url)? {
            n += 1;
            candidate = filename::numbered(&stem, n);
        }
        if n > 1 {
            debug!(url = %item.url, filename = %candidate, "Filename taken, numbered");
        }
        Ok(candidate)
    }

    async fn download_media(
        &self,
        item: &CatalogItem,
        mut record: DownloadRecord,
        descriptor: &MediaDescriptor,
    ) -> Result<ItemOutcome, OrchestratorError> {
        let direct_path = self.config.direct_path(&record.filename);
        let stream_path = self.config.stream_path(&record.filename);

        if direct_path.exists() || stream_path.exists() {
            info!(url = %item.url, filename = %record.filename, "Already on disk");
            record.transition(DownloadStatus::Done);
            self.store.upsert(record)?;
            return Ok(ItemOutcome::AlreadyPresent);
        }

        let manifest = descriptor
            .stream_manifest_url
            .as_deref()
            .filter(|m| !m.trim().is_empty());

        if descriptor.download_links.is_empty() || self.overrides.contains(&item.url) {
            return match manifest {
                Some(manifest) => self.stream_attempt(record, manifest, &stream_path).await,
                None => self.finish(record, DownloadStatus::NoDownloads, None),
            };
        }

        let Some(best) = select_best_link(&descriptor.download_links) else {
            warn!(url = %item.url, "No best url among the download links, leaving it as TODO");
            return Ok(ItemOutcome::NoQualityMatch);
        };
        info!(url = %item.url, quality = %best.name, "Downloading direct file");

        self.gate.wait_until_reachable().await?;
        let downloader = DirectDownloader::new(
            Arc::clone(&self.fetcher),
            self.gate.clone(),
            self.direct_config.clone(),
        );

        match downloader.download(&best.link, &direct_path).await {
            Ok(_) => self.finish(record, DownloadStatus::Done, None),
            Err(FetchError::Connectivity(e)) => Err(e.into()),
            Err(e) => match manifest {
                Some(manifest) => {
                    warn!(url = %item.url, "Direct download failed, falling back to stream: {}", e);
                    metrics::STREAM_FALLBACKS.inc();
                    self.stream_attempt(record, manifest, &stream_path).await
                }
                None => {
                    warn!(url = %item.url, "Direct download failed: {}", e);
                    self.finish(record, DownloadStatus::Error, Some(e.to_string()))
                }
            },
        }
    }

    async fn stream_attempt(
        &self,
        record: DownloadRecord,
        manifest: &str,
        dest: &Path,
    ) -> Result<ItemOutcome, OrchestratorError> {
        let downloader = SegmentStreamDownloader::new(
            Arc::clone(&self.fetcher),
            self.gate.clone(),
            self.stream_config.clone(),
        );

        match downloader.download(manifest, dest).await {
            Ok(_) => self.finish(record, DownloadStatus::Done, None),
            Err(StreamError::Connectivity(e)) => Err(e.into()),
            Err(e) => {
                warn!(url = %record.url, "Stream download failed: {}", e);
                self.finish(record, DownloadStatus::Error, Some(e.to_string()))
            }
        }
    }

    /// Record a terminal status.
    fn finish(
        &self,
        mut record: DownloadRecord,
        status: DownloadStatus,
        error: Option<String>,
    ) -> Result<ItemOutcome, OrchestratorError> {
        match error {
            Some(message) => record.fail(message),
            None => record.transition(status),
        }
        info!(url = %record.url, status = %record.status, "Item finished");
        let status = record.status;
        self.store.upsert(record)?;
        Ok(ItemOutcome::Finished(status))
    }
}

fn skip_reason(existing: Option<&DownloadRecord>, options: &RunOptions) -> Option<SkipReason> {
    match existing.map(|r| r.status) {
        Some(DownloadStatus::Done) if !options.redownload_done => Some(SkipReason::AlreadyDone),
        Some(DownloadStatus::Error) if options.ignore_broken => Some(SkipReason::PreviouslyFailed),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with(status: DownloadStatus) -> DownloadRecord {
        let item = CatalogItem::new("Clip", "https://site.test/video/1/");
        let mut record = DownloadRecord::provisional(&item, None);
        record.status = status;
        record
    }

    #[test]
    fn test_skip_rules() {
        let default = RunOptions::default();
        let redownload = RunOptions {
            redownload_done: true,
            ..Default::default()
        };
        let ignore_broken = RunOptions {
            ignore_broken: true,
            ..Default::default()
        };

        let done = record_with(DownloadStatus::Done);
        let failed = record_with(DownloadStatus::Error);
        let todo = record_with(DownloadStatus::Todo);

        assert_eq!(skip_reason(None, &default), None);
        assert_eq!(skip_reason(Some(&done), &default), Some(SkipReason::AlreadyDone));
        assert_eq!(skip_reason(Some(&done), &redownload), None);
        assert_eq!(skip_reason(Some(&failed), &default), None);
        assert_eq!(
            skip_reason(Some(&failed), &ignore_broken),
            Some(SkipReason::PreviouslyFailed)
        );
        assert_eq!(skip_reason(Some(&todo), &ignore_broken), None);
    }
}
