//! Types for the download orchestrator.

use serde::Serialize;
use thiserror::Error;

use crate::status::DownloadStatus;

/// Errors that end the whole run.
///
/// Per-item failures are recorded in the status store instead.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The renderer reported the member session is gone.
    #[error("authentication lost")]
    AuthenticationLost,

    #[error(transparent)]
    Connectivity(#[from] crate::connectivity::ConnectivityError),

    #[error("status store error: {0}")]
    StatusStore(#[from] crate::status::StatusStoreError),

    /// The renderer bridge itself failed (not a page-level drift).
    #[error("renderer error: {0}")]
    Renderer(#[from] crate::renderer::RendererError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl OrchestratorError {
    pub fn is_auth_lost(&self) -> bool {
        matches!(self, Self::AuthenticationLost)
    }

    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connectivity(_))
    }
}

/// Flags controlling which items are retried.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Process items already `DONE` again.
    pub redownload_done: bool,
    /// Leave items that previously ended in `ERROR` alone.
    pub ignore_broken: bool,
}

/// Why an item was skipped without touching the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyDone,
    PreviouslyFailed,
}

/// What happened to one catalog item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Left alone because of its existing record.
    Skipped(SkipReason),
    /// The renderer returned nothing usable; nothing recorded.
    Unresolved,
    /// Direct links exist but none carried a resolution hint; left as `TODO`.
    NoQualityMatch,
    /// The output file already exists on disk; recorded as `DONE`.
    AlreadyPresent,
    /// A terminal status was recorded.
    Finished(DownloadStatus),
}

impl ItemOutcome {
    /// Metric label for this outcome.
    pub fn label(&self) -> &'static str {
        match self {
            ItemOutcome::Skipped(_) => "skipped",
            ItemOutcome::Unresolved => "unresolved",
            ItemOutcome::NoQualityMatch => "no_quality_match",
            ItemOutcome::AlreadyPresent => "already_present",
            ItemOutcome::Finished(DownloadStatus::Todo) => "todo",
            ItemOutcome::Finished(DownloadStatus::Done) => "done",
            ItemOutcome::Finished(DownloadStatus::Error) => "error",
            ItemOutcome::Finished(DownloadStatus::Moved) => "moved",
            ItemOutcome::Finished(DownloadStatus::NoDownloads) => "no_downloads",
            ItemOutcome::Finished(DownloadStatus::PageBroken) => "page_broken",
        }
    }
}

/// Counters for one orchestrator run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub processed: usize,
    pub skipped: usize,
    pub unresolved: usize,
    pub no_quality_match: usize,
    pub already_present: usize,
    pub done: usize,
    pub failed: usize,
    pub moved: usize,
    pub page_broken: usize,
    pub no_downloads: usize,
}

impl RunSummary {
    pub fn record(&mut self, outcome: &ItemOutcome) {
        self.processed += 1;
        match outcome {
            ItemOutcome::Skipped(_) => self.skipped += 1,
            ItemOutcome::Unresolved => self.unresolved += 1,
            ItemOutcome::NoQualityMatch => self.no_quality_match += 1,
            ItemOutcome::AlreadyPresent => self.already_present += 1,
            ItemOutcome::Finished(status) => match status {
                DownloadStatus::Done => self.done += 1,
                DownloadStatus::Error => self.failed += 1,
                DownloadStatus::Moved => self.moved += 1,
                DownloadStatus::PageBroken => self.page_broken += 1,
                DownloadStatus::NoDownloads => self.no_downloads += 1,
                DownloadStatus::Todo => {}
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts() {
        let mut summary = RunSummary::default();
        for outcome in [
            ItemOutcome::Skipped(SkipReason::AlreadyDone),
            ItemOutcome::Finished(DownloadStatus::Done),
            ItemOutcome::Finished(DownloadStatus::Done),
            ItemOutcome::Finished(DownloadStatus::Error),
            ItemOutcome::Unresolved,
            ItemOutcome::AlreadyPresent,
        ] {
            summary.record(&outcome);
        }

        assert_eq!(summary.processed, 6);
        assert_eq!(summary.done, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.unresolved, 1);
        assert_eq!(summary.already_present, 1);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            OrchestratorError::AuthenticationLost.to_string(),
            "authentication lost"
        );
        assert!(OrchestratorError::AuthenticationLost.is_auth_lost());
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(ItemOutcome::Finished(DownloadStatus::PageBroken).label(), "page_broken");
        assert_eq!(ItemOutcome::Skipped(SkipReason::PreviouslyFailed).label(), "skipped");
    }
}
