//! Adaptive-stream (HLS) downloads.
//!
//! The master playlist's highest-resolution variant is resolved to a segment
//! list, segments are fetched in fixed-size concurrent batches, and each
//! batch is appended to the output in playlist order.

mod downloader;
mod manifest;

pub use downloader::SegmentStreamDownloader;
pub use manifest::{media_segments, resolve, select_variant};

use thiserror::Error;

use crate::connectivity::ConnectivityError;
use crate::fetch::FetchError;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("No variant playlist found in {url}")]
    NoManifest { url: String },

    #[error("Invalid playlist reference {reference}: {reason}")]
    InvalidUrl { reference: String, reason: String },

    #[error("Could not parse playlist {url}: {reason}")]
    Parse { url: String, reason: String },

    #[error("Playlist {url} lists no media segments")]
    EmptyPlaylist { url: String },

    #[error("Playlist fetch failed: {0}")]
    Playlist(#[source] FetchError),

    #[error("Segment {index} failed: {source}")]
    Segment {
        index: usize,
        #[source]
        source: FetchError,
    },

    #[error(transparent)]
    Connectivity(#[from] ConnectivityError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl StreamError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}
