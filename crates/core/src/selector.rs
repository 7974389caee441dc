//! Picks the highest-resolution direct download link.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use tracing::debug;

use crate::renderer::DownloadLink;

static DIMENSIONS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\s*[xX×]\s*(\d+)").expect("valid dimensions pattern"));

static TRAILING_HEIGHT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d+)p?\.mp4\s*$").expect("valid height pattern"));

/// Resolution hint parsed from a link label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// 0 when only a height was given.
    pub width: u32,
    pub height: u32,
}

/// Parse `WxH` from a label, falling back to a bare height before `.mp4`.
pub fn parse_resolution(label: &str) -> Option<Resolution> {
    if let Some(caps) = DIMENSIONS.captures(label) {
        let width = caps.get(1)?.as_str().parse().ok()?;
        let height = caps.get(2)?.as_str().parse().ok()?;
        return Some(Resolution { width, height });
    }

    let caps = TRAILING_HEIGHT.captures(label)?;
    let height = caps.get(1)?.as_str().parse().ok()?;
    Some(Resolution { width: 0, height })
}

/// Choose the link with the greatest height.
///
/// Candidates are examined from the last listed to the first. If the first
/// one examined carries no resolution hint the list is considered
/// unreliable and nothing is chosen; later unparsable entries are skipped.
/// Ties keep the earlier-examined candidate.
pub fn select_best_link(links: &[DownloadLink]) -> Option<&DownloadLink> {
    let mut best: Option<(&DownloadLink, u32)> = None;

    for (index, link) in links.iter().rev().enumerate() {
        let Some(resolution) = parse_resolution(&link.name) else {
            if index == 0 {
                debug!(label = %link.name, "No resolution hint on first candidate");
                return None;
            }
            continue;
        };

        let better = match best {
            Some((_, height)) => resolution.height > height,
            None => true,
        };
        if better {
            best = Some((link, resolution.height));
        }
    }

    best.map(|(link, _)| link)
}
