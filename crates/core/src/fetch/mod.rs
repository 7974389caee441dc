//! HTTP transfer primitives.
//!
//! [`MediaFetcher`] is the seam between download logic and the network:
//! manifests are fetched as text, segments as whole byte buffers, and direct
//! files as a resumable byte stream.

mod direct;
mod http;
mod progress;

pub use direct::DirectDownloader;
pub use http::HttpFetcher;
pub use progress::StallDetector;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use thiserror::Error;

use crate::connectivity::ConnectivityError;

#[derive(Debug, Error)]
pub enum FetchError {
    /// The request never produced a response (DNS, connect, timeout).
    #[error("Request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },

    /// The body stream broke or ended early.
    #[error("Transfer from {url} interrupted: {reason}")]
    Interrupted { url: String, reason: String },

    #[error("Download stalled: {jumps} backward progress jumps")]
    Stalled { jumps: u32 },

    #[error("Gave up after {attempts} reopen attempts: {last}")]
    ResumesExhausted { attempts: u32, last: String },

    #[error("HTTP client setup failed: {0}")]
    Setup(String),

    #[error(transparent)]
    Connectivity(#[from] ConnectivityError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    /// Whether reopening the transfer may help.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Request { .. } | Self::Interrupted { .. })
    }

    pub fn is_stall(&self) -> bool {
        matches!(self, Self::Stalled { .. })
    }

    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Byte stream of a response body.
pub type ByteStream = BoxStream<'static, Result<Bytes, FetchError>>;

/// An opened direct transfer.
pub struct FetchResponse {
    /// Full size of the resource, when known.
    pub total: Option<u64>,
    /// Whether the body starts at the requested offset (range honoured).
    pub resumed: bool,
    pub body: ByteStream,
}

impl std::fmt::Debug for FetchResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchResponse")
            .field("total", &self.total)
            .field("resumed", &self.resumed)
            .field("body", &"<stream>")
            .finish()
    }
}

#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Fetch a small text document (playlists).
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError>;

    /// Fetch a whole body into memory (stream segments).
    async fn fetch_bytes(&self, url: &str) -> Result<Bytes, FetchError>;

    /// Open a streaming transfer starting at byte `offset`.
    ///
    /// Servers may ignore the offset; check [`FetchResponse::resumed`].
    async fn open(&self, url: &str, offset: u64) -> Result<FetchResponse, FetchError>;
}

/// `<dest>.part`, where a transfer lands before it is complete.
pub(crate) fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}
