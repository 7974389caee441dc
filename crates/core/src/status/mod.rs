//! Durable per-item download status.
//!
//! The store exclusively owns [`DownloadRecord`] lifetimes. Callers work on
//! copies and hand them back through [`StatusStore::upsert`]; the record
//! whose `url` matches is replaced (last writer wins).

mod store;
mod types;

pub use store::JsonStatusStore;
pub use types::*;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StatusStoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed status database {path}: {reason}")]
    Malformed { path: String, reason: String },

    #[error("Status store lock poisoned")]
    Poisoned,
}

/// Mapping from catalog URL to [`DownloadRecord`].
///
/// Implementations must keep `url` unique and persist after every mutation.
pub trait StatusStore: Send + Sync {
    /// All records. Loaded from storage on first call or when forced.
    fn load(&self, force_reload: bool) -> Result<Vec<DownloadRecord>, StatusStoreError>;

    fn get(&self, url: &str) -> Result<Option<DownloadRecord>, StatusStoreError>;

    /// Replace the record with the same `url`, or append it, then persist.
    fn upsert(&self, record: DownloadRecord) -> Result<(), StatusStoreError>;

    /// Records that did not end in `DONE`, in storage order.
    fn pending_review(&self) -> Result<Vec<DownloadRecord>, StatusStoreError>;

    /// Whether a record other than `url`'s already uses `filename`.
    fn is_filename_claimed(&self, filename: &str, url: &str) -> Result<bool, StatusStoreError>;
}
