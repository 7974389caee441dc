//! List of catalog URLs that must always be fetched through the stream path.

use std::collections::HashSet;
use std::path::Path;

use super::ConfigError;

/// Catalog URLs forced onto the adaptive-stream download path.
#[derive(Debug, Clone, Default)]
pub struct StreamOverrides {
    urls: HashSet<String>,
}

impl StreamOverrides {
    /// Load the override list (a JSON array of URLs).
    ///
    /// Unlike the status and catalog stores, a missing file is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))?;
        let urls: Vec<String> = serde_json::from_str(&raw)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))?;

        Ok(Self::from_urls(urls))
    }

    pub fn from_urls<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            urls: urls.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls.contains(url)
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}
