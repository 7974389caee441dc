//! Output file naming.

const MAX_STEM_BYTES: usize = 180;
const RESERVED: &[char] = &['/', '\\', '<', '>', ':', '"', '|', '?', '*'];

/// File stem for an item: `"tag1, tag2 - title"`.
///
/// Tags are dropped when empty; a missing title falls back to the catalog
/// name. The result is always a safe, non-empty file stem.
pub fn build_stem(tags: &[String], title: Option<&str>, catalog_name: &str) -> String {
    let title = title
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(catalog_name);

    let tags: Vec<&str> = tags
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect();

    let raw = if tags.is_empty() {
        title.to_string()
    } else {
        format!("{} - {}", tags.join(", "), title)
    };
    sanitize(&raw)
}

/// Make `raw` usable as a file stem on common filesystems.
pub fn sanitize(raw: &str) -> String {
    let replaced: String = raw
        .chars()
        .map(|c| {
            if RESERVED.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = trim_edges(&collapsed);
    let truncated = trim_edges(truncate_on_char_boundary(trimmed, MAX_STEM_BYTES));

    if truncated.is_empty() {
        "untitled".to_string()
    } else {
        truncated.to_string()
    }
}

/// Variant of `stem` used for the `n`th claimant (`n >= 2`).
///
/// The base is shortened so the numbered stem stays within the length cap.
pub fn numbered(stem: &str, n: u32) -> String {
    let suffix = format!(" ({})", n);
    let budget = MAX_STEM_BYTES.saturating_sub(suffix.len());
    let base = trim_edges(truncate_on_char_boundary(stem, budget));
    let base = if base.is_empty() { "untitled" } else { base };
    format!("{}{}", base, suffix)
}

fn trim_edges(s: &str) -> &str {
    s.trim_matches(|c: char| c == '.' || c.is_whitespace())
}

fn truncate_on_char_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
