//! Download orchestrator.
//!
//! One logical worker walks the catalog oldest-first. Items never download
//! concurrently; only segments inside a stream batch do. The status store
//! is touched only from this worker.

mod config;
pub mod filename;
mod runner;
mod types;

pub use config::OrchestratorConfig;
pub use runner::DownloadOrchestrator;
pub use types::{ItemOutcome, OrchestratorError, RunOptions, RunSummary, SkipReason};
