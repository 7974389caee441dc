//! Mock media fetcher for testing.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use futures::StreamExt;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::fetch::{FetchError, FetchResponse, MediaFetcher};

/// Body chunk size served by [`MockFetcher::open`].
const CHUNK: usize = 100;

/// Scripted behavior for one `open` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenScript {
    /// Serve the body, optionally breaking after `cut_after` bytes.
    Deliver { cut_after: Option<usize> },
    /// Answer with an HTTP error status.
    Status(u16),
    /// Fail before any response arrives.
    TransportError,
}

impl OpenScript {
    pub fn cut_after(bytes: usize) -> Self {
        Self::Deliver {
            cut_after: Some(bytes),
        }
    }

    pub fn full() -> Self {
        Self::Deliver { cut_after: None }
    }
}

#[derive(Debug, Clone)]
struct Served {
    body: Bytes,
    delay: Option<Duration>,
}

/// Mock implementation of the MediaFetcher trait.
///
/// Provides controllable behavior for testing:
/// - Serve text, byte and streamed bodies by URL
/// - Script broken transfers and servers that ignore ranges
/// - Inject HTTP status and transport failures
/// - Track requested URLs and open offsets
///
/// Unknown URLs answer with HTTP 404.
pub struct MockFetcher {
    texts: Arc<RwLock<HashMap<String, String>>>,
    bytes: Arc<RwLock<HashMap<String, Served>>>,
    files: Arc<RwLock<HashMap<String, Bytes>>>,
    scripts: Arc<RwLock<HashMap<String, VecDeque<OpenScript>>>>,
    no_range: Arc<RwLock<HashSet<String>>>,
    statuses: Arc<RwLock<HashMap<String, u16>>>,
    broken: Arc<RwLock<HashSet<String>>>,
    requested: Arc<RwLock<Vec<String>>>,
    opens: Arc<RwLock<Vec<(String, u64)>>>,
}

impl std::fmt::Debug for MockFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockFetcher")
            .field("texts", &"<texts>")
            .field("files", &"<files>")
            .finish()
    }
}

impl Default for MockFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl MockFetcher {
    pub fn new() -> Self {
        Self {
            texts: Arc::new(RwLock::new(HashMap::new())),
            bytes: Arc::new(RwLock::new(HashMap::new())),
            files: Arc::new(RwLock::new(HashMap::new())),
            scripts: Arc::new(RwLock::new(HashMap::new())),
            no_range: Arc::new(RwLock::new(HashSet::new())),
            statuses: Arc::new(RwLock::new(HashMap::new())),
            broken: Arc::new(RwLock::new(HashSet::new())),
            requested: Arc::new(RwLock::new(Vec::new())),
            opens: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Serve `text` from `fetch_text(url)`.
    pub async fn set_text(&self, url: &str, text: String) {
        self.texts.write().await.insert(url.to_string(), text);
    }

    /// Serve `body` from `fetch_bytes(url)`.
    pub async fn set_bytes(&self, url: &str, body: Vec<u8>) {
        self.bytes.write().await.insert(
            url.to_string(),
            Served {
                body: Bytes::from(body),
                delay: None,
            },
        );
    }

    /// Serve `body` from `fetch_bytes(url)` after `delay`.
    pub async fn set_bytes_delayed(&self, url: &str, body: Vec<u8>, delay: Duration) {
        self.bytes.write().await.insert(
            url.to_string(),
            Served {
                body: Bytes::from(body),
                delay: Some(delay),
            },
        );
    }

    /// Serve `body` from `open(url, offset)`.
    pub async fn set_file(&self, url: &str, body: Vec<u8>) {
        self.files
            .write()
            .await
            .insert(url.to_string(), Bytes::from(body));
    }

    /// Queue behaviors for the next `open` calls; full deliveries afterwards.
    pub async fn script_opens(&self, url: &str, scripts: Vec<OpenScript>) {
        self.scripts
            .write()
            .await
            .entry(url.to_string())
            .or_default()
            .extend(scripts);
    }

    /// Whether `open` honours the offset for `url` (default: yes).
    pub async fn set_range_support(&self, url: &str, supported: bool) {
        let mut no_range = self.no_range.write().await;
        if supported {
            no_range.remove(url);
        } else {
            no_range.insert(url.to_string());
        }
    }

    /// Answer every request for `url` with `status`.
    pub async fn fail_status(&self, url: &str, status: u16) {
        self.statuses.write().await.insert(url.to_string(), status);
    }

    /// Fail every request for `url` before a response arrives.
    pub async fn fail_transport(&self, url: &str) {
        self.broken.write().await.insert(url.to_string());
    }

    /// URLs requested so far, in order.
    pub async fn requested_urls(&self) -> Vec<String> {
        self.requested.read().await.clone()
    }

    /// Offsets passed to `open(url, ..)`, in order.
    pub async fn open_offsets(&self, url: &str) -> Vec<u64> {
        self.opens
            .read()
            .await
            .iter()
            .filter(|(u, _)| u == url)
            .map(|(_, offset)| *offset)
            .collect()
    }

    async fn check_failures(&self, url: &str) -> Result<(), FetchError> {
        self.requested.write().await.push(url.to_string());

        if self.broken.read().await.contains(url) {
            return Err(transport_error(url));
        }
        if let Some(status) = self.statuses.read().await.get(url) {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: *status,
            });
        }
        Ok(())
    }
}

fn transport_error(url: &str) -> FetchError {
    FetchError::Request {
        url: url.to_string(),
        reason: "connection refused".to_string(),
    }
}

fn not_found(url: &str) -> FetchError {
    FetchError::Status {
        url: url.to_string(),
        status: 404,
    }
}

#[async_trait]
impl MediaFetcher for MockFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        self.check_failures(url).await?;
        self.texts
            .read()
            .await
            .get(url)
            .cloned()
            .ok_or_else(|| not_found(url))
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Bytes, FetchError> {
        self.check_failures(url).await?;
        let served = self
            .bytes
            .read()
            .await
            .get(url)
            .cloned()
            .ok_or_else(|| not_found(url))?;
        if let Some(delay) = served.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(served.body)
    }

    async fn open(&self, url: &str, offset: u64) -> Result<FetchResponse, FetchError> {
        self.opens.write().await.push((url.to_string(), offset));
        self.check_failures(url).await?;

        let script = self
            .scripts
            .write()
            .await
            .get_mut(url)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(OpenScript::full);
        let cut_after = match script {
            OpenScript::Deliver { cut_after } => cut_after,
            OpenScript::Status(status) => {
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status,
                })
            }
            OpenScript::TransportError => return Err(transport_error(url)),
        };

        let file = self
            .files
            .read()
            .await
            .get(url)
            .cloned()
            .ok_or_else(|| not_found(url))?;
        let resumed = offset > 0 && !self.no_range.read().await.contains(url);
        let start = if resumed {
            (offset as usize).min(file.len())
        } else {
            0
        };

        let mut remaining = file.slice(start..);
        if let Some(cut) = cut_after {
            remaining.truncate(cut.min(remaining.len()));
        }

        let mut chunks: Vec<Result<Bytes, FetchError>> = Vec::new();
        while !remaining.is_empty() {
            let take = CHUNK.min(remaining.len());
            chunks.push(Ok(remaining.split_to(take)));
        }
        if cut_after.is_some_and(|cut| start + cut < file.len()) {
            chunks.push(Err(FetchError::Interrupted {
                url: url.to_string(),
                reason: "connection reset by peer".to_string(),
            }));
        }

        Ok(FetchResponse {
            total: Some(file.len() as u64),
            resumed,
            body: stream::iter(chunks).boxed(),
        })
    }
}
