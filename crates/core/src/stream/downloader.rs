use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use url::Url;

use super::manifest::{media_segments, parse_url, resolve, select_variant};
use super::StreamError;
use crate::config::StreamConfig;
use crate::connectivity::ConnectivityGate;
use crate::fetch::{part_path, MediaFetcher};
use crate::metrics;

/// Downloads an HLS stream into a single transport-stream file.
pub struct SegmentStreamDownloader {
    fetcher: Arc<dyn MediaFetcher>,
    gate: ConnectivityGate,
    config: StreamConfig,
}

impl SegmentStreamDownloader {
    pub fn new(fetcher: Arc<dyn MediaFetcher>, gate: ConnectivityGate, config: StreamConfig) -> Self {
        Self {
            fetcher,
            gate,
            config,
        }
    }

    /// Resolve the master playlist at `manifest_url` to absolute segment URLs.
    pub async fn resolve_segments(&self, manifest_url: &str) -> Result<Vec<Url>, StreamError> {
        let master_url = parse_url(manifest_url)?;
        let master = self
            .fetcher
            .fetch_text(master_url.as_str())
            .await
            .map_err(StreamError::Playlist)?;

        let reference = select_variant(&master).ok_or_else(|| StreamError::NoManifest {
            url: manifest_url.to_string(),
        })?;
        let variant_url = resolve(&master_url, &reference)?;
        debug!(variant = %variant_url, "Selected stream variant");

        let playlist = self
            .fetcher
            .fetch_text(variant_url.as_str())
            .await
            .map_err(StreamError::Playlist)?;
        let segments = media_segments(&playlist, &variant_url, &self.config.media_extensions)?;
        if segments.is_empty() {
            return Err(StreamError::EmptyPlaylist {
                url: variant_url.to_string(),
            });
        }
        Ok(segments)
    }

    /// Download the stream to `dest`. Returns the number of bytes written.
    ///
    /// Output is staged in `<dest>.part`; any failure removes it.
    pub async fn download(&self, manifest_url: &str, dest: &Path) -> Result<u64, StreamError> {
        let part = part_path(dest);
        let started = Instant::now();

        let result = match self.write_segments(manifest_url, &part).await {
            Ok(written) => fs::rename(&part, dest)
                .await
                .map(|_| written)
                .map_err(|e| StreamError::io(dest, e)),
            Err(e) => Err(e),
        };

        let label = if result.is_ok() { "ok" } else { "failed" };
        metrics::DOWNLOAD_DURATION
            .with_label_values(&["stream", label])
            .observe(started.elapsed().as_secs_f64());

        if result.is_err() {
            if let Err(rm) = fs::remove_file(&part).await {
                if rm.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %part.display(), "Failed to remove partial stream: {}", rm);
                }
            }
        }
        result
    }

    async fn write_segments(&self, manifest_url: &str, part: &Path) -> Result<u64, StreamError> {
        let segments = self.resolve_segments(manifest_url).await?;
        let batch_size = self.config.batch_size.max(1);
        let batches = segments.len().div_ceil(batch_size);
        info!(
            segments = segments.len(),
            batches,
            dest = %part.display(),
            "Downloading stream"
        );

        let mut file = File::create(part).await.map_err(|e| StreamError::io(part, e))?;
        let mut written: u64 = 0;

        for (batch_index, batch) in segments.chunks(batch_size).enumerate() {
            self.gate.wait_until_reachable().await?;

            let fetches = batch.iter().map(|url| self.fetcher.fetch_bytes(url.as_str()));
            let bodies = join_all(fetches)
                .await
                .into_iter()
                .enumerate()
                .map(|(offset, result)| {
                    result.map_err(|source| StreamError::Segment {
                        index: batch_index * batch_size + offset,
                        source,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            // join_all keeps input order, so this is playlist order.
            for body in &bodies {
                file.write_all(body)
                    .await
                    .map_err(|e| StreamError::io(part, e))?;
                written += body.len() as u64;
            }

            let batch_bytes: u64 = bodies.iter().map(|b| b.len() as u64).sum();
            metrics::SEGMENTS_FETCHED.inc_by(batch.len() as u64);
            metrics::BYTES_DOWNLOADED
                .with_label_values(&["stream"])
                .inc_by(batch_bytes);
            debug!(batch = batch_index + 1, of = batches, bytes = written, "Stream batch written");
        }

        file.flush().await.map_err(|e| StreamError::io(part, e))?;
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::ReachabilityProbe;
    use crate::testing::{fixtures, MockFetcher, MockProbe};
    use std::time::Duration;
    use tempfile::TempDir;

    const MASTER: &str = "https://cdn.test/v/master.m3u8";
    const VARIANT: &str = "https://cdn.test/v/hi/index.m3u8";

    fn downloader(
        fetcher: &Arc<MockFetcher>,
        probe: &Arc<MockProbe>,
        batch_size: usize,
    ) -> SegmentStreamDownloader {
        let gate = ConnectivityGate::new(
            Arc::clone(probe) as Arc<dyn ReachabilityProbe>,
            Duration::from_millis(1),
        );
        let config = StreamConfig {
            batch_size,
            ..Default::default()
        };
        SegmentStreamDownloader::new(Arc::clone(fetcher) as Arc<dyn MediaFetcher>, gate, config)
    }

    async fn serve_stream(fetcher: &MockFetcher, segments: usize) -> Vec<u8> {
        fetcher
            .set_text(
                MASTER,
                fixtures::master_playlist(&[(640, 360, "lo/index.m3u8"), (1920, 1080, "hi/index.m3u8")]),
            )
            .await;
        let names: Vec<String> = (0..segments).map(|i| format!("s{}.ts", i)).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        fetcher.set_text(VARIANT, fixtures::media_playlist(&refs)).await;

        let mut expected = Vec::new();
        for (i, name) in names.iter().enumerate() {
            let body = format!("<segment {}>", i).into_bytes();
            expected.extend_from_slice(&body);
            // Earlier segments arrive later.
            let delay = Duration::from_millis(((segments - i) * 5) as u64);
            fetcher
                .set_bytes_delayed(&format!("https://cdn.test/v/hi/{}", name), body, delay)
                .await;
        }
        expected
    }

    #[tokio::test]
    async fn test_segments_written_in_playlist_order() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("clip.ts");
        let fetcher = Arc::new(MockFetcher::new());
        let probe = Arc::new(MockProbe::reachable());
        let expected = serve_stream(&fetcher, 10).await;

        let written = downloader(&fetcher, &probe, 4)
            .download(MASTER, &dest)
            .await
            .unwrap();

        assert_eq!(written, expected.len() as u64);
        assert_eq!(std::fs::read(&dest).unwrap(), expected);
        assert!(!part_path(&dest).exists());
        // One connectivity check per batch: 4 + 4 + 2.
        assert_eq!(probe.probe_count(), 3);
    }

    #[tokio::test]
    async fn test_only_the_best_variant_is_fetched() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(MockFetcher::new());
        let probe = Arc::new(MockProbe::reachable());
        serve_stream(&fetcher, 2).await;

        downloader(&fetcher, &probe, 64)
            .download(MASTER, &dir.path().join("clip.ts"))
            .await
            .unwrap();

        let urls = fetcher.requested_urls().await;
        assert!(urls.iter().any(|u| u == VARIANT));
        assert!(!urls.iter().any(|u| u.contains("/lo/")));
    }

    #[tokio::test]
    async fn test_failed_segment_aborts_and_cleans_up() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("clip.ts");
        let fetcher = Arc::new(MockFetcher::new());
        let probe = Arc::new(MockProbe::reachable());
        serve_stream(&fetcher, 6).await;
        fetcher.fail_status("https://cdn.test/v/hi/s4.ts", 500).await;

        let err = downloader(&fetcher, &probe, 4)
            .download(MASTER, &dest)
            .await
            .unwrap_err();

        assert!(matches!(err, StreamError::Segment { index: 4, .. }));
        assert!(!dest.exists());
        assert!(!part_path(&dest).exists());
    }

    #[tokio::test]
    async fn test_master_without_references() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(MockFetcher::new());
        let probe = Arc::new(MockProbe::reachable());
        fetcher.set_text(MASTER, "#EXTM3U\n#EXT-X-VERSION:3\n".to_string()).await;

        let err = downloader(&fetcher, &probe, 64)
            .download(MASTER, &dir.path().join("clip.ts"))
            .await
            .unwrap_err();
        assert!(matches!(err, StreamError::NoManifest { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_master_is_a_playlist_error() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(MockFetcher::new());
        let probe = Arc::new(MockProbe::reachable());
        fetcher.fail_status(MASTER, 404).await;

        let err = downloader(&fetcher, &probe, 64)
            .download(MASTER, &dir.path().join("clip.ts"))
            .await
            .unwrap_err();
        assert!(matches!(err, StreamError::Playlist(_)));
    }
}
