//! Resumable single-file downloads.

use std::io::SeekFrom;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use tokio::fs::{self, File};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, info, warn};

use super::progress::ProgressLog;
use super::{part_path, FetchError, MediaFetcher, StallDetector};
use crate::config::DirectConfig;
use crate::connectivity::ConnectivityGate;
use crate::metrics;

/// Downloads one file, reopening broken transfers until it completes,
/// stalls, or runs out of attempts.
pub struct DirectDownloader {
    fetcher: Arc<dyn MediaFetcher>,
    gate: ConnectivityGate,
    config: DirectConfig,
}

impl DirectDownloader {
    pub fn new(fetcher: Arc<dyn MediaFetcher>, gate: ConnectivityGate, config: DirectConfig) -> Self {
        Self {
            fetcher,
            gate,
            config,
        }
    }

    /// Download `url` to `dest`. Returns the number of bytes written.
    ///
    /// Bytes land in `<dest>.part`, renamed into place on success and
    /// removed on failure.
    pub async fn download(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        let part = part_path(dest);
        let started = Instant::now();

        let result = match self.transfer(url, &part).await {
            Ok(written) => fs::rename(&part, dest)
                .await
                .map(|_| written)
                .map_err(|e| FetchError::io(dest, e)),
            Err(e) => Err(e),
        };

        let label = if result.is_ok() { "ok" } else { "failed" };
        metrics::DOWNLOAD_DURATION
            .with_label_values(&["direct", label])
            .observe(started.elapsed().as_secs_f64());

        match result {
            Ok(written) => {
                info!(url, bytes = written, dest = %dest.display(), "Direct download complete");
                Ok(written)
            }
            Err(e) => {
                if e.is_stall() {
                    metrics::STALL_ABORTS.inc();
                }
                if let Err(rm) = fs::remove_file(&part).await {
                    if rm.kind() != std::io::ErrorKind::NotFound {
                        warn!(path = %part.display(), "Failed to remove partial file: {}", rm);
                    }
                }
                Err(e)
            }
        }
    }

    async fn transfer(&self, url: &str, part: &Path) -> Result<u64, FetchError> {
        let mut file = File::create(part).await.map_err(|e| FetchError::io(part, e))?;
        let mut written: u64 = 0;
        let mut total: Option<u64> = None;
        let mut stall = StallDetector::from_config(&self.config);
        let mut progress = ProgressLog::default();
        let mut reopens: u32 = 0;

        loop {
            let response = match self.fetcher.open(url, written).await {
                Ok(response) => response,
                Err(e) if e.is_transient() => {
                    self.before_reopen(url, &mut reopens, written, e).await?;
                    continue;
                }
                Err(e) => return Err(e),
            };

            if written > 0 && !response.resumed {
                debug!(url, discarded = written, "Server ignored range, restarting from zero");
                file.set_len(0).await.map_err(|e| FetchError::io(part, e))?;
                file.seek(SeekFrom::Start(0))
                    .await
                    .map_err(|e| FetchError::io(part, e))?;
                written = 0;
                progress.reset();
                if stall.observe(0.0) {
                    return Err(FetchError::Stalled {
                        jumps: stall.jumps(),
                    });
                }
            }
            total = response.total.or(total);

            let mut body = response.body;
            let mut broken = None;
            while let Some(chunk) = body.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        broken = Some(e);
                        break;
                    }
                };

                file.write_all(&chunk)
                    .await
                    .map_err(|e| FetchError::io(part, e))?;
                written += chunk.len() as u64;
                metrics::BYTES_DOWNLOADED
                    .with_label_values(&["direct"])
                    .inc_by(chunk.len() as u64);

                if let Some(total) = total.filter(|t| *t > 0) {
                    let ratio = written as f64 / total as f64;
                    if let Some(percent) = progress.step(ratio) {
                        debug!(url, percent, "Direct download progress");
                    }
                    if stall.observe(ratio) {
                        warn!(url, jumps = stall.jumps(), "Direct download is looping, cancelling");
                        return Err(FetchError::Stalled {
                            jumps: stall.jumps(),
                        });
                    }
                }
            }

            let failure = match (broken, total) {
                (Some(e), _) => e,
                (None, Some(total)) if written < total => FetchError::Interrupted {
                    url: url.to_string(),
                    reason: format!("connection closed after {} of {} bytes", written, total),
                },
                (None, _) => {
                    file.flush().await.map_err(|e| FetchError::io(part, e))?;
                    return Ok(written);
                }
            };

            self.before_reopen(url, &mut reopens, written, failure).await?;
        }
    }

    /// Count a reopen attempt and wait for the network to come back.
    async fn before_reopen(
        &self,
        url: &str,
        reopens: &mut u32,
        written: u64,
        failure: FetchError,
    ) -> Result<(), FetchError> {
        if *reopens >= self.config.max_resumes {
            return Err(FetchError::ResumesExhausted {
                attempts: *reopens,
                last: failure.to_string(),
            });
        }
        *reopens += 1;
        warn!(
            url,
            written,
            attempt = *reopens,
            "Direct transfer broke, reopening: {}",
            failure
        );
        self.gate.wait_until_reachable().await?;
        Ok(())
    }
}
