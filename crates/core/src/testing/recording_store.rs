//! Status store wrapper that records every write.

use std::sync::{Arc, Mutex};

use crate::status::{DownloadRecord, DownloadStatus, StatusStore, StatusStoreError};

/// Delegates to an inner store and keeps a copy of each upserted record.
pub struct RecordingStatusStore {
    inner: Arc<dyn StatusStore>,
    upserts: Mutex<Vec<DownloadRecord>>,
}

impl RecordingStatusStore {
    pub fn new(inner: Arc<dyn StatusStore>) -> Self {
        Self {
            inner,
            upserts: Mutex::new(Vec::new()),
        }
    }

    /// Every record written so far, in write order.
    pub fn upserts(&self) -> Vec<DownloadRecord> {
        self.upserts.lock().unwrap().clone()
    }

    /// Records written for `url`, in write order.
    pub fn upserts_for(&self, url: &str) -> Vec<DownloadRecord> {
        self.upserts()
            .into_iter()
            .filter(|r| r.url == url)
            .collect()
    }

    /// Statuses written for `url`, in write order.
    pub fn statuses_for(&self, url: &str) -> Vec<DownloadStatus> {
        self.upserts_for(url).iter().map(|r| r.status).collect()
    }

    pub fn clear(&self) {
        self.upserts.lock().unwrap().clear();
    }
}

impl StatusStore for RecordingStatusStore {
    fn load(&self, force_reload: bool) -> Result<Vec<DownloadRecord>, StatusStoreError> {
        self.inner.load(force_reload)
    }

    fn get(&self, url: &str) -> Result<Option<DownloadRecord>, StatusStoreError> {
        self.inner.get(url)
    }

    fn upsert(&self, record: DownloadRecord) -> Result<(), StatusStoreError> {
        self.upserts.lock().unwrap().push(record.clone());
        self.inner.upsert(record)
    }

    fn pending_review(&self) -> Result<Vec<DownloadRecord>, StatusStoreError> {
        self.inner.pending_review()
    }

    fn is_filename_claimed(&self, filename: &str, url: &str) -> Result<bool, StatusStoreError> {
        self.inner.is_filename_claimed(filename, url)
    }
}
