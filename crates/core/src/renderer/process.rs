//! Renderer backed by an external helper process speaking JSON lines.

use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use super::protocol::{encode_request, parse_message, DetailResult, RendererMessage, RendererRequest};
use super::session::{SessionPublisher, SessionState};
use super::types::{CatalogPage, DetailScan, RendererError};
use super::PageRenderer;
use crate::catalog::CatalogItem;
use crate::config::RendererConfig;

/// Answers routed from the reader task to the pending request.
#[derive(Debug)]
enum Reply {
    CatalogPage { id: u64, items: Vec<CatalogItem> },
    EndOfList { id: u64 },
    ItemDetail { id: u64, result: DetailResult },
    StructureError { id: u64, message: String },
}

impl Reply {
    fn id(&self) -> u64 {
        match self {
            Reply::CatalogPage { id, .. }
            | Reply::EndOfList { id }
            | Reply::ItemDetail { id, .. }
            | Reply::StructureError { id, .. } => *id,
        }
    }
}

/// Id of the request currently awaiting an answer; 0 while idle.
type InFlight = Arc<AtomicU64>;

/// Marks a request as pending until dropped.
struct PendingRequest<'a>(&'a AtomicU64);

impl<'a> PendingRequest<'a> {
    fn start(in_flight: &'a AtomicU64, id: u64) -> Self {
        in_flight.store(id, Ordering::SeqCst);
        Self(in_flight)
    }
}

impl Drop for PendingRequest<'_> {
    fn drop(&mut self) {
        self.0.store(0, Ordering::SeqCst);
    }
}

struct BridgeIo {
    writer: Box<dyn AsyncWrite + Send + Unpin>,
    replies: mpsc::Receiver<Reply>,
}

/// Page renderer driven over a JSON-lines pipe.
///
/// Only one request is outstanding at a time; the bridge lock is held from
/// writing the request until its answer arrives.
pub struct ProcessRenderer {
    io: Mutex<BridgeIo>,
    child: Mutex<Option<Child>>,
    session: SessionState,
    next_id: AtomicU64,
    in_flight: InFlight,
}

impl ProcessRenderer {
    /// Spawn the configured helper and attach to its stdio.
    pub fn spawn(config: &RendererConfig) -> Result<Self, RendererError> {
        info!(command = %config.command, "Starting renderer helper");

        let mut child = Command::new(&config.command)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                RendererError::Unavailable(format!("failed to spawn {}: {}", config.command, e))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| RendererError::Unavailable("missing stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RendererError::Unavailable("missing stdout".to_string()))?;

        Ok(Self::attach(stdout, stdin, Some(child)))
    }

    /// Attach to an already-connected pair of streams.
    ///
    /// Must be called inside a Tokio runtime: a reader task is spawned.
    pub fn from_streams<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self::attach(reader, writer, None)
    }

    fn attach<R, W>(reader: R, writer: W, child: Option<Child>) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (publisher, session) = SessionState::channel(false);
        let (tx, rx) = mpsc::channel(16);
        let in_flight = InFlight::default();
        tokio::spawn(read_messages(reader, publisher, tx, Arc::clone(&in_flight)));

        Self {
            io: Mutex::new(BridgeIo {
                writer: Box::new(writer),
                replies: rx,
            }),
            child: Mutex::new(child),
            session,
            next_id: AtomicU64::new(1),
            in_flight,
        }
    }

    /// The authentication signal fed by `navigate` events.
    pub fn session(&self) -> SessionState {
        self.session.clone()
    }

    /// Kill the helper process, if one was spawned.
    pub async fn shutdown(&self) {
        if let Some(mut child) = self.child.lock().await.take() {
            if let Err(e) = child.kill().await {
                warn!("Failed to stop renderer helper: {}", e);
            }
        }
    }

    async fn request(&self, request: RendererRequest) -> Result<Reply, RendererError> {
        let line = encode_request(&request).map_err(|e| RendererError::Protocol(e.to_string()))?;
        let id = request.id();

        let mut io = self.io.lock().await;
        let _pending = PendingRequest::start(&self.in_flight, id);
        io.writer.write_all(line.as_bytes()).await?;
        io.writer.flush().await?;

        loop {
            let reply = io
                .replies
                .recv()
                .await
                .ok_or_else(|| RendererError::Unavailable("renderer closed its output".to_string()))?;

            match reply {
                Reply::StructureError { id: reply_id, message } if reply_id == id => {
                    return Err(RendererError::StructureDrift(message))
                }
                reply if reply.id() == id => return Ok(reply),
                stale => debug!(?stale, expected = id, "Dropping stale renderer reply"),
            }
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

#[async_trait]
impl PageRenderer for ProcessRenderer {
    async fn scan_catalog_page(&self, page: u32) -> Result<CatalogPage, RendererError> {
        let reply = self
            .request(RendererRequest::ScanCatalogPage {
                id: self.next_id(),
                page,
            })
            .await?;

        match reply {
            Reply::CatalogPage { items, .. } if items.is_empty() => Ok(CatalogPage::EndOfList),
            Reply::CatalogPage { items, .. } => Ok(CatalogPage::Items(items)),
            Reply::EndOfList { .. } => Ok(CatalogPage::EndOfList),
            other => Err(RendererError::Protocol(format!(
                "unexpected answer to catalog scan: {:?}",
                other
            ))),
        }
    }

    async fn scan_item_detail(&self, url: &str) -> Result<Option<DetailScan>, RendererError> {
        let reply = self
            .request(RendererRequest::ScanItemDetail {
                id: self.next_id(),
                url: url.to_string(),
            })
            .await?;

        match reply {
            Reply::ItemDetail { result, .. } => Ok(result.into_scan()),
            other => Err(RendererError::Protocol(format!(
                "unexpected answer to detail scan: {:?}",
                other
            ))),
        }
    }
}

/// Pump helper output: session updates and warnings are handled here,
/// answers are forwarded to whoever holds the bridge.
///
/// A structure error answers the request in flight when it is read; with
/// nothing pending it is only logged.
async fn read_messages<R>(
    reader: R,
    publisher: SessionPublisher,
    replies: mpsc::Sender<Reply>,
    in_flight: InFlight,
) where
    R: AsyncRead + Send + Unpin,
{
    let mut lines = BufReader::new(reader).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("Renderer output unreadable: {}", e);
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let message = match parse_message(&line) {
            Ok(message) => message,
            Err(e) => {
                warn!("Ignoring malformed renderer line ({}): {}", e, line);
                continue;
            }
        };

        let reply = match message {
            RendererMessage::Navigate {
                authenticated,
                location,
            } => {
                debug!(authenticated, location = ?location, "Renderer navigated");
                publisher.publish(authenticated);
                continue;
            }
            RendererMessage::Warning { message } => {
                warn!("Page structure warning: {}. Code update may be required", message);
                continue;
            }
            RendererMessage::StructureError { message } => {
                match in_flight.load(Ordering::SeqCst) {
                    0 => {
                        warn!("Page structure error outside any scan: {}", message);
                        continue;
                    }
                    id => Reply::StructureError { id, message },
                }
            }
            RendererMessage::CatalogPage { id, items } => Reply::CatalogPage { id, items },
            RendererMessage::EndOfList { id } => Reply::EndOfList { id },
            RendererMessage::ItemDetail { id, result } => Reply::ItemDetail { id, result },
        };

        if replies.send(reply).await.is_err() {
            break;
        }
    }

    debug!("Renderer output closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};

    /// Connect a renderer to an in-memory "helper" and return the helper's ends.
    fn connected() -> (ProcessRenderer, BufReader<DuplexStream>, DuplexStream) {
        let (renderer_out, helper_in) = duplex(64 * 1024);
        let (helper_out, renderer_in) = duplex(64 * 1024);
        let renderer = ProcessRenderer::from_streams(renderer_in, renderer_out);
        (renderer, BufReader::new(helper_in), helper_out)
    }

    async fn read_request(helper_in: &mut BufReader<DuplexStream>) -> serde_json::Value {
        let mut line = String::new();
        helper_in.read_line(&mut line).await.unwrap();
        serde_json::from_str(&line).unwrap()
    }

    #[tokio::test]
    async fn test_catalog_page_round_trip() {
        let (renderer, mut helper_in, mut helper_out) = connected();

        let helper = tokio::spawn(async move {
            let req = read_request(&mut helper_in).await;
            assert_eq!(req["op"], "scan_catalog_page");
            assert_eq!(req["page"], 4);
            let id = req["id"].as_u64().unwrap();
            let answer = format!(
                "{{\"event\":\"catalog_page\",\"id\":{},\"items\":[{{\"name\":\"A\",\"url\":\"https://site.test/v/1/\"}}]}}\n",
                id
            );
            helper_out.write_all(answer.as_bytes()).await.unwrap();
            (helper_in, helper_out)
        });

        let page = renderer.scan_catalog_page(4).await.unwrap();
        let CatalogPage::Items(items) = page else {
            panic!("expected items");
        };
        assert_eq!(items[0].url, "https://site.test/v/1/");
        let _ = helper.await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_page_is_end_of_list() {
        let (renderer, mut helper_in, mut helper_out) = connected();

        tokio::spawn(async move {
            let req = read_request(&mut helper_in).await;
            let id = req["id"].as_u64().unwrap();
            let answer = format!("{{\"event\":\"catalog_page\",\"id\":{},\"items\":[]}}\n", id);
            helper_out.write_all(answer.as_bytes()).await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        });

        assert_eq!(
            renderer.scan_catalog_page(9).await.unwrap(),
            CatalogPage::EndOfList
        );
    }

    #[tokio::test]
    async fn test_structure_error_answers_pending_request() {
        let (renderer, mut helper_in, mut helper_out) = connected();

        tokio::spawn(async move {
            let _ = read_request(&mut helper_in).await;
            helper_out
                .write_all(b"{\"event\":\"structure_error\",\"message\":\"list container missing\"}\n")
                .await
                .unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        });

        let err = renderer.scan_catalog_page(1).await.unwrap_err();
        assert!(err.is_structural());
        assert!(err.to_string().contains("list container missing"));
    }

    #[tokio::test]
    async fn test_idle_structure_error_does_not_fail_next_scan() {
        let (renderer, mut helper_in, mut helper_out) = connected();

        helper_out
            .write_all(b"{\"event\":\"structure_error\",\"message\":\"login form changed\"}\n")
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        tokio::spawn(async move {
            let req = read_request(&mut helper_in).await;
            let id = req["id"].as_u64().unwrap();
            let answer = format!(
                "{{\"event\":\"catalog_page\",\"id\":{},\"items\":[{{\"name\":\"A\",\"url\":\"https://site.test/v/1/\"}}]}}\n",
                id
            );
            helper_out.write_all(answer.as_bytes()).await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        });

        let page = renderer.scan_catalog_page(1).await.unwrap();
        let CatalogPage::Items(items) = page else {
            panic!("expected items");
        };
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn test_navigate_updates_session_and_stale_replies_are_skipped() {
        let (renderer, mut helper_in, mut helper_out) = connected();
        let session = renderer.session();
        assert!(!session.is_authenticated());

        tokio::spawn(async move {
            let req = read_request(&mut helper_in).await;
            let id = req["id"].as_u64().unwrap();
            let lines = format!(
                concat!(
                    "{{\"event\":\"navigate\",\"authenticated\":true}}\n",
                    "{{\"event\":\"warning\",\"message\":\"category missing\"}}\n",
                    "{{\"event\":\"end_of_list\",\"id\":{}}}\n",
                    "{{\"event\":\"item_detail\",\"id\":{},\"result\":{{\"kind\":\"moved\"}}}}\n"
                ),
                id + 100,
                id
            );
            helper_out.write_all(lines.as_bytes()).await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        });

        let scan = renderer
            .scan_item_detail("https://site.test/v/1/")
            .await
            .unwrap();
        assert_eq!(scan, Some(DetailScan::Moved));
        assert!(session.is_authenticated());
    }

    #[tokio::test]
    async fn test_closed_helper_is_unavailable() {
        let (renderer, helper_in, helper_out) = connected();
        drop(helper_out);
        drop(helper_in);

        let err = renderer.scan_catalog_page(1).await.unwrap_err();
        assert!(matches!(
            err,
            RendererError::Unavailable(_) | RendererError::Io(_)
        ));
    }
}
