//! Testing utilities and mock implementations.
//!
//! Mocks for every seam the core talks through: the page renderer, the
//! media fetcher and the reachability probe. Together with an on-disk
//! status store in a temp dir they allow full runs without a browser or
//! network. [`RecordingStatusStore`] wraps a store to observe its writes.
//!
//! # Example
//!
//! ```rust,ignore
//! use reelsync_core::testing::{fixtures, MockFetcher, MockProbe, MockRenderer};
//!
//! let renderer = MockRenderer::new();
//! let fetcher = MockFetcher::new();
//! let probe = MockProbe::with_sequence(vec![false, true]);
//!
//! renderer.set_pages(vec![vec![fixtures::catalog_item(1)]]).await;
//! fetcher.set_file("https://cdn.test/1.mp4", vec![0; 1024]).await;
//! ```

mod mock_fetcher;
mod mock_probe;
mod mock_renderer;
mod recording_store;

pub use mock_fetcher::{MockFetcher, OpenScript};
pub use mock_probe::MockProbe;
pub use mock_renderer::MockRenderer;
pub use recording_store::RecordingStatusStore;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::catalog::{CatalogItem, CatalogTag};
    use crate::renderer::{DownloadLink, MediaDescriptor};

    /// Catalog entry `n` with a unique detail URL.
    pub fn catalog_item(n: u32) -> CatalogItem {
        CatalogItem {
            name: format!("Item {}", n),
            url: format!("https://site.test/video/{}/", n),
            image_url: Some(format!("https://site.test/thumbs/{}.jpg", n)),
            tags: vec![CatalogTag {
                name: "Anna".to_string(),
                url: Some("https://site.test/tag/anna/".to_string()),
            }],
        }
    }

    /// Detail metadata with the given direct links and optional manifest.
    pub fn media_descriptor(
        title: &str,
        links: &[(&str, &str)],
        manifest: Option<&str>,
    ) -> MediaDescriptor {
        MediaDescriptor {
            title: Some(title.to_string()),
            published: Some("27 March 2021".to_string()),
            category: Some("Outdoor".to_string()),
            tags: vec!["Anna".to_string()],
            download_links: links
                .iter()
                .map(|(name, link)| DownloadLink::new(*name, *link))
                .collect(),
            stream_manifest_url: manifest.map(str::to_string),
        }
    }

    /// Master playlist with one variant per `(width, height, reference)`.
    pub fn master_playlist(variants: &[(u32, u32, &str)]) -> String {
        let mut playlist = String::from("#EXTM3U\n#EXT-X-VERSION:3\n");
        for (width, height, reference) in variants {
            playlist.push_str(&format!(
                "#EXT-X-STREAM-INF:BANDWIDTH={},RESOLUTION={}x{}\n{}\n",
                width * height,
                width,
                height,
                reference
            ));
        }
        playlist
    }

    /// Media playlist listing `segments` in order.
    pub fn media_playlist(segments: &[&str]) -> String {
        let mut playlist =
            String::from("#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:10\n#EXT-X-MEDIA-SEQUENCE:0\n");
        for segment in segments {
            playlist.push_str("#EXTINF:10.0,\n");
            playlist.push_str(segment);
            playlist.push('\n');
        }
        playlist.push_str("#EXT-X-ENDLIST\n");
        playlist
    }
}
