//! JSON-file backed catalog snapshot cache.

use std::path::{Path, PathBuf};

use super::{CatalogCache, CatalogError, CatalogSnapshot};
use crate::json_file::{read_json, write_json_pretty, JsonFileError};

/// Catalog cache stored as a single JSON document.
#[derive(Debug, Clone)]
pub struct JsonCatalogCache {
    path: PathBuf,
}

impl JsonCatalogCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn map_err(&self, e: JsonFileError) -> CatalogError {
        let path = self.path.display().to_string();
        match e {
            JsonFileError::Io(source) => CatalogError::Io { path, source },
            JsonFileError::Json(e) => CatalogError::Malformed {
                path,
                reason: e.to_string(),
            },
        }
    }
}

impl CatalogCache for JsonCatalogCache {
    fn read(&self) -> Result<CatalogSnapshot, CatalogError> {
        let snapshot = read_json(&self.path).map_err(|e| self.map_err(e))?;
        Ok(snapshot.unwrap_or_default())
    }

    fn write(&self, snapshot: &CatalogSnapshot) -> Result<(), CatalogError> {
        write_json_pretty(&self.path, snapshot).map_err(|e| self.map_err(e))
    }
}
