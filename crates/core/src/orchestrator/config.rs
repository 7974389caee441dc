//! Orchestrator configuration.

use std::path::PathBuf;

use crate::config::Config;

/// Settings the orchestrator needs from the loaded config.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Where finished `.mp4` / `.ts` files are placed.
    pub download_dir: PathBuf,

    /// Suffix filenames already claimed by another item's record.
    pub unique_filenames: bool,
}

impl OrchestratorConfig {
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            download_dir: download_dir.into(),
            unique_filenames: true,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            download_dir: config.paths.download_dir.clone(),
            unique_filenames: config.filenames.unique,
        }
    }

    pub fn direct_path(&self, stem: &str) -> PathBuf {
        self.download_dir.join(format!("{}.mp4", stem))
    }

    pub fn stream_path(&self, stem: &str) -> PathBuf {
        self.download_dir.join(format!("{}.ts", stem))
    }
}
