//! HLS playlist handling: variant choice and segment list extraction.

use m3u8_rs::{MediaPlaylist, Playlist};
use tracing::debug;
use url::Url;

use super::StreamError;

fn is_reference(line: &str) -> bool {
    !line.is_empty() && !line.starts_with('#')
}

/// Pick the sub-playlist reference of the highest-resolution variant.
///
/// I-frame variants are ignored; on equal heights the first variant wins.
/// A master with no resolution-tagged variant falls back to its last
/// non-empty, non-comment line.
pub fn select_variant(master: &str) -> Option<String> {
    let parsed = m3u8_rs::parse_playlist_res(master.as_bytes());
    if let Ok(Playlist::MasterPlaylist(playlist)) = parsed {
        let mut best: Option<(u64, &str)> = None;
        for variant in playlist.variants.iter().filter(|v| !v.is_i_frame) {
            let Some(resolution) = &variant.resolution else {
                continue;
            };
            if best.is_none_or(|(max, _)| resolution.height > max) {
                best = Some((resolution.height, variant.uri.as_str()));
            }
        }
        if let Some((height, reference)) = best {
            debug!(height, reference, "Highest-resolution variant");
            return Some(reference.to_string());
        }
    }

    master
        .lines()
        .map(str::trim)
        .rev()
        .find(|line| is_reference(line))
        .map(str::to_string)
}

/// Resolve `reference` against the playlist it came from.
pub fn resolve(base: &Url, reference: &str) -> Result<Url, StreamError> {
    base.join(reference).map_err(|e| StreamError::InvalidUrl {
        reference: reference.to_string(),
        reason: e.to_string(),
    })
}

pub fn parse_url(url: &str) -> Result<Url, StreamError> {
    Url::parse(url).map_err(|e| StreamError::InvalidUrl {
        reference: url.to_string(),
        reason: e.to_string(),
    })
}

/// Absolute segment URLs of a media playlist, in playback order.
///
/// An `EXT-X-MAP` initialization section is listed before the first segment
/// it applies to. Trailing entries that are not media files (by path
/// extension) are dropped so the list ends on a real segment.
pub fn media_segments(
    playlist: &str,
    base: &Url,
    media_extensions: &[String],
) -> Result<Vec<Url>, StreamError> {
    let playlist = parse_media_playlist(playlist, base)?;

    let mut segments = Vec::with_capacity(playlist.segments.len() + 1);
    let mut current_map: Option<&str> = None;
    for segment in &playlist.segments {
        if let Some(map) = &segment.map {
            if current_map != Some(map.uri.as_str()) {
                segments.push(resolve(base, &map.uri)?);
                current_map = Some(map.uri.as_str());
            }
        }
        segments.push(resolve(base, segment.uri.trim())?);
    }

    while segments
        .last()
        .is_some_and(|url| !has_media_extension(url, media_extensions))
    {
        segments.pop();
    }

    Ok(segments)
}

fn parse_media_playlist(playlist: &str, base: &Url) -> Result<MediaPlaylist, StreamError> {
    match m3u8_rs::parse_playlist_res(playlist.as_bytes()) {
        Ok(Playlist::MediaPlaylist(playlist)) => Ok(playlist),
        Ok(Playlist::MasterPlaylist(_)) => Err(StreamError::Parse {
            url: base.to_string(),
            reason: "expected a media playlist, got a master playlist".to_string(),
        }),
        Err(e) => {
            debug!(url = %base, "Unparseable media playlist: {}", e);
            Err(StreamError::Parse {
                url: base.to_string(),
                reason: "not an HLS media playlist".to_string(),
            })
        }
    }
}

fn has_media_extension(url: &Url, media_extensions: &[String]) -> bool {
    let Some(name) = url.path_segments().and_then(|mut s| s.next_back()) else {
        return false;
    };
    let Some((_, ext)) = name.rsplit_once('.') else {
        return false;
    };
    media_extensions.iter().any(|m| m.eq_ignore_ascii_case(ext))
}
