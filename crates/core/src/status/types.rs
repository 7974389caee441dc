use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::CatalogItem;
use crate::renderer::MediaDescriptor;

/// Persisted per-item outcome.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DownloadStatus {
    /// Metadata resolved, download not finished yet.
    #[serde(rename = "TODO")]
    Todo,
    #[serde(rename = "DONE")]
    Done,
    #[serde(rename = "ERROR")]
    Error,
    /// The item's page redirects elsewhere.
    #[serde(rename = "MOVED")]
    Moved,
    /// Neither direct links nor a stream manifest.
    #[serde(rename = "NO-DOWNLOADS")]
    NoDownloads,
    #[serde(rename = "PAGE-BROKEN")]
    PageBroken,
}

impl DownloadStatus {
    /// Literal name as stored on disk.
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadStatus::Todo => "TODO",
            DownloadStatus::Done => "DONE",
            DownloadStatus::Error => "ERROR",
            DownloadStatus::Moved => "MOVED",
            DownloadStatus::NoDownloads => "NO-DOWNLOADS",
            DownloadStatus::PageBroken => "PAGE-BROKEN",
        }
    }

    /// Whether this status ends an attempt.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DownloadStatus::Todo)
    }
}

impl std::fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable record for one catalog item, keyed by `url`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRecord {
    pub url: String,
    /// Name as listed in the catalog.
    #[serde(default)]
    pub name: String,
    /// Output file stem (no extension).
    #[serde(default)]
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub status: DownloadStatus,
    pub last_status_update: DateTime<Utc>,
    /// Last failure message; cleared on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DownloadRecord {
    /// Provisional `TODO` record for an item whose metadata just resolved.
    pub fn provisional(item: &CatalogItem, descriptor: Option<&MediaDescriptor>) -> Self {
        let mut record = Self {
            url: item.url.clone(),
            name: String::new(),
            filename: String::new(),
            title: None,
            published: None,
            category: None,
            tags: Vec::new(),
            status: DownloadStatus::Todo,
            last_status_update: Utc::now(),
            error: None,
        };
        record.absorb(item, descriptor);
        record
    }

    /// Reset to `TODO` for a new attempt, taking the latest metadata.
    ///
    /// The filename is kept so outputs stay stable across runs.
    pub fn reopen(&mut self, item: &CatalogItem, descriptor: Option<&MediaDescriptor>) {
        self.absorb(item, descriptor);
        self.transition(DownloadStatus::Todo);
        self.error = None;
    }

    fn absorb(&mut self, item: &CatalogItem, descriptor: Option<&MediaDescriptor>) {
        self.name = item.name.clone();
        if let Some(descriptor) = descriptor {
            self.title = descriptor.title.clone();
            self.published = descriptor.published.clone();
            self.category = descriptor.category.clone();
            self.tags = descriptor.tags.clone();
        }
    }

    /// Move to `status` and stamp the update time.
    pub fn transition(&mut self, status: DownloadStatus) {
        self.status = status;
        self.last_status_update = Utc::now();
        if status == DownloadStatus::Done {
            self.error = None;
        }
    }

    /// Move to `ERROR`, keeping the failure message.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.transition(DownloadStatus::Error);
        self.error = Some(error.into());
    }

    /// Human label for summaries: title, else filename, else catalog name.
    pub fn label(&self) -> &str {
        self.title
            .as_deref()
            .filter(|t| !t.is_empty())
            .or_else(|| Some(self.filename.as_str()).filter(|f| !f.is_empty()))
            .unwrap_or(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_literals() {
        let json = serde_json::to_string(&DownloadStatus::NoDownloads).unwrap();
        assert_eq!(json, "\"NO-DOWNLOADS\"");
        let parsed: DownloadStatus = serde_json::from_str("\"PAGE-BROKEN\"").unwrap();
        assert_eq!(parsed, DownloadStatus::PageBroken);
        assert_eq!(DownloadStatus::Todo.to_string(), "TODO");
        assert!(!DownloadStatus::Todo.is_terminal());
        assert!(DownloadStatus::Moved.is_terminal());
    }

    #[test]
    fn test_record_json_is_camel_case() {
        let item = CatalogItem::new("Clip", "https://site.test/video/1/");
        let record = DownloadRecord::provisional(&item, None);
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("lastStatusUpdate").is_some());
        assert_eq!(json["status"], "TODO");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_transition_to_done_clears_error() {
        let item = CatalogItem::new("Clip", "https://site.test/video/1/");
        let mut record = DownloadRecord::provisional(&item, None);
        let created = record.last_status_update;

        record.fail("segment 3: connection reset");
        assert_eq!(record.status, DownloadStatus::Error);
        assert!(record.error.is_some());

        record.transition(DownloadStatus::Done);
        assert_eq!(record.status, DownloadStatus::Done);
        assert!(record.error.is_none());
        assert!(record.last_status_update >= created);
    }

    #[test]
    fn test_reopen_keeps_filename() {
        let item = CatalogItem::new("Clip", "https://site.test/video/1/");
        let mut record = DownloadRecord::provisional(&item, None);
        record.filename = "Anna - Clip".to_string();
        record.fail("HTTP 500");

        let descriptor = MediaDescriptor {
            title: Some("Clip, remastered".to_string()),
            tags: vec!["Anna".to_string()],
            ..Default::default()
        };
        record.reopen(&item, Some(&descriptor));

        assert_eq!(record.status, DownloadStatus::Todo);
        assert_eq!(record.filename, "Anna - Clip");
        assert_eq!(record.title.as_deref(), Some("Clip, remastered"));
        assert!(record.error.is_none());
    }

    #[test]
    fn test_label_fallbacks() {
        let item = CatalogItem::new("Catalog Name", "https://site.test/video/1/");
        let mut record = DownloadRecord::provisional(&item, None);
        assert_eq!(record.label(), "Catalog Name");

        record.filename = "tag - Clip".to_string();
        assert_eq!(record.label(), "tag - Clip");

        record.title = Some("Real Title".to_string());
        assert_eq!(record.label(), "Real Title");
    }
}
