//! JSON-file backed status store.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use super::{DownloadRecord, DownloadStatus, StatusStore, StatusStoreError};
use crate::json_file::{read_json, write_json_pretty, JsonFileError};

/// Status store persisted as one pretty-printed JSON array.
///
/// Records are loaded on first access and kept in memory; every upsert
/// rewrites the whole file.
#[derive(Debug)]
pub struct JsonStatusStore {
    path: PathBuf,
    records: Mutex<Option<Vec<DownloadRecord>>>,
}

impl JsonStatusStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<Vec<DownloadRecord>>>, StatusStoreError> {
        self.records.lock().map_err(|_| StatusStoreError::Poisoned)
    }

    fn read_file(&self) -> Result<Vec<DownloadRecord>, StatusStoreError> {
        let records: Option<Vec<DownloadRecord>> =
            read_json(&self.path).map_err(|e| self.map_err(e))?;
        let records = records.unwrap_or_default();
        debug!(path = %self.path.display(), count = records.len(), "Loaded status records");
        Ok(records)
    }

    /// Populate the cache if this is the first access.
    fn loaded<'a>(
        &self,
        guard: &'a mut MutexGuard<'_, Option<Vec<DownloadRecord>>>,
    ) -> Result<&'a mut Vec<DownloadRecord>, StatusStoreError> {
        if guard.is_none() {
            **guard = Some(self.read_file()?);
        }
        Ok(guard.get_or_insert_with(Vec::new))
    }

    fn map_err(&self, e: JsonFileError) -> StatusStoreError {
        let path = self.path.display().to_string();
        match e {
            JsonFileError::Io(source) => StatusStoreError::Io { path, source },
            JsonFileError::Json(e) => StatusStoreError::Malformed {
                path,
                reason: e.to_string(),
            },
        }
    }
}

impl StatusStore for JsonStatusStore {
    fn load(&self, force_reload: bool) -> Result<Vec<DownloadRecord>, StatusStoreError> {
        let mut guard = self.lock()?;
        if force_reload {
            *guard = Some(self.read_file()?);
        }
        Ok(self.loaded(&mut guard)?.clone())
    }

    fn get(&self, url: &str) -> Result<Option<DownloadRecord>, StatusStoreError> {
        let mut guard = self.lock()?;
        let records = self.loaded(&mut guard)?;
        Ok(records.iter().find(|r| r.url == url).cloned())
    }

    fn upsert(&self, record: DownloadRecord) -> Result<(), StatusStoreError> {
        let mut guard = self.lock()?;
        let records = self.loaded(&mut guard)?;

        match records.iter_mut().find(|r| r.url == record.url) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }

        write_json_pretty(&self.path, &*records).map_err(|e| self.map_err(e))
    }

    fn pending_review(&self) -> Result<Vec<DownloadRecord>, StatusStoreError> {
        let mut guard = self.lock()?;
        let records = self.loaded(&mut guard)?;
        Ok(records
            .iter()
            .filter(|r| r.status != DownloadStatus::Done)
            .cloned()
            .collect())
    }

    fn is_filename_claimed(&self, filename: &str, url: &str) -> Result<bool, StatusStoreError> {
        let mut guard = self.lock()?;
        let records = self.loaded(&mut guard)?;
        Ok(records
            .iter()
            .any(|r| r.url != url && r.filename.eq_ignore_ascii_case(filename)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogItem;
    use tempfile::TempDir;

    fn record(url: &str, status: DownloadStatus) -> DownloadRecord {
        let mut record = DownloadRecord::provisional(&CatalogItem::new("Clip", url), None);
        record.status = status;
        record
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonStatusStore::new(dir.path().join("db.json"));
        assert!(store.load(false).unwrap().is_empty());
        assert!(store.get("https://site.test/a/").unwrap().is_none());
    }

    #[test]
    fn test_upsert_never_duplicates_keys() {
        let dir = TempDir::new().unwrap();
        let store = JsonStatusStore::new(dir.path().join("db.json"));

        let sequence = [
            ("https://site.test/a/", DownloadStatus::Todo),
            ("https://site.test/b/", DownloadStatus::Todo),
            ("https://site.test/a/", DownloadStatus::Error),
            ("https://site.test/c/", DownloadStatus::Moved),
            ("https://site.test/a/", DownloadStatus::Done),
            ("https://site.test/b/", DownloadStatus::PageBroken),
        ];
        for (url, status) in sequence {
            store.upsert(record(url, status)).unwrap();
        }

        let records = store.load(true).unwrap();
        assert_eq!(records.len(), 3);
        let mut urls: Vec<_> = records.iter().map(|r| r.url.as_str()).collect();
        urls.sort();
        urls.dedup();
        assert_eq!(urls.len(), 3);

        // Latest upsert wins.
        assert_eq!(
            store.get("https://site.test/a/").unwrap().unwrap().status,
            DownloadStatus::Done
        );
        assert_eq!(
            store.get("https://site.test/b/").unwrap().unwrap().status,
            DownloadStatus::PageBroken
        );
    }

    #[test]
    fn test_every_upsert_is_persisted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db.json");
        let store = JsonStatusStore::new(&path);
        store
            .upsert(record("https://site.test/a/", DownloadStatus::Todo))
            .unwrap();

        // A fresh store sees the write without any explicit flush.
        let reopened = JsonStatusStore::new(&path);
        let records = reopened.load(false).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, DownloadStatus::Todo);

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\n  "), "expected pretty-printed JSON");
        assert!(raw.contains("\"lastStatusUpdate\""));
    }

    #[test]
    fn test_load_is_cached_until_forced() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db.json");
        let store = JsonStatusStore::new(&path);
        assert!(store.load(false).unwrap().is_empty());

        // Written behind the store's back.
        let other = JsonStatusStore::new(&path);
        other
            .upsert(record("https://site.test/a/", DownloadStatus::Done))
            .unwrap();

        assert!(store.load(false).unwrap().is_empty());
        assert_eq!(store.load(true).unwrap().len(), 1);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db.json");
        std::fs::write(&path, "{ not an array").unwrap();

        let store = JsonStatusStore::new(&path);
        let err = store.load(false).unwrap_err();
        assert!(matches!(err, StatusStoreError::Malformed { .. }));
    }

    #[test]
    fn test_pending_review_excludes_done() {
        let dir = TempDir::new().unwrap();
        let store = JsonStatusStore::new(dir.path().join("db.json"));
        store
            .upsert(record("https://site.test/a/", DownloadStatus::Done))
            .unwrap();
        store
            .upsert(record("https://site.test/b/", DownloadStatus::Error))
            .unwrap();
        store
            .upsert(record("https://site.test/c/", DownloadStatus::Todo))
            .unwrap();

        let pending: Vec<_> = store
            .pending_review()
            .unwrap()
            .into_iter()
            .map(|r| r.url)
            .collect();
        assert_eq!(pending, ["https://site.test/b/", "https://site.test/c/"]);
    }

    #[test]
    fn test_filename_claims_ignore_own_record() {
        let dir = TempDir::new().unwrap();
        let store = JsonStatusStore::new(dir.path().join("db.json"));
        let mut a = record("https://site.test/a/", DownloadStatus::Done);
        a.filename = "tag - Clip".to_string();
        store.upsert(a).unwrap();

        assert!(!store
            .is_filename_claimed("tag - Clip", "https://site.test/a/")
            .unwrap());
        assert!(store
            .is_filename_claimed("tag - Clip", "https://site.test/b/")
            .unwrap());
        assert!(!store
            .is_filename_claimed("tag - Other", "https://site.test/b/")
            .unwrap());
    }
}
