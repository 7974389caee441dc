use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub renderer: RendererConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub connectivity: ConnectivityConfig,
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub direct: DirectConfig,
    #[serde(default)]
    pub filenames: FilenameConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

/// External page renderer helper
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RendererConfig {
    /// Executable spawned as the renderer helper
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// On-disk locations
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathsConfig {
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
    /// Status database; relative paths live under `download_dir`
    #[serde(default = "default_status_db")]
    pub status_db: PathBuf,
    /// Catalog snapshot; relative paths live under `download_dir`
    #[serde(default = "default_catalog_cache")]
    pub catalog_cache: PathBuf,
    /// URLs that always go through the stream path
    #[serde(default = "default_stream_overrides")]
    pub stream_overrides: PathBuf,
}

impl PathsConfig {
    pub fn status_db_path(&self) -> PathBuf {
        self.under_download_dir(&self.status_db)
    }

    pub fn catalog_cache_path(&self) -> PathBuf {
        self.under_download_dir(&self.catalog_cache)
    }

    fn under_download_dir(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.download_dir.join(path)
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            status_db: default_status_db(),
            catalog_cache: default_catalog_cache(),
            stream_overrides: default_stream_overrides(),
        }
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("out")
}

fn default_status_db() -> PathBuf {
    PathBuf::from("db.json")
}

fn default_catalog_cache() -> PathBuf {
    PathBuf::from("catalog-cache.json")
}

fn default_stream_overrides() -> PathBuf {
    PathBuf::from("stream-overrides.json")
}

/// Reachability polling
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConnectivityConfig {
    #[serde(default = "default_probe_host")]
    pub host: String,
    #[serde(default = "default_probe_port")]
    pub port: u16,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_ms: u64,
    /// Give up after this many failed probes (None = wait forever)
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

impl ConnectivityConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            host: default_probe_host(),
            port: default_probe_port(),
            poll_interval_ms: default_poll_interval(),
            probe_timeout_ms: default_probe_timeout(),
            max_attempts: None,
        }
    }
}

fn default_probe_host() -> String {
    "example.com".to_string()
}

fn default_probe_port() -> u16 {
    443
}

fn default_poll_interval() -> u64 {
    2048
}

fn default_probe_timeout() -> u64 {
    5000
}

/// Catalog enumeration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CrawlConfig {
    /// Snapshots younger than this are reused instead of recrawled
    #[serde(default = "default_freshness_hours")]
    pub freshness_hours: u32,
    /// Abort the crawl past this page (None = until end of list)
    #[serde(default)]
    pub max_pages: Option<u32>,
}

impl CrawlConfig {
    pub fn freshness_window(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.freshness_hours))
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            freshness_hours: default_freshness_hours(),
            max_pages: None,
        }
    }
}

fn default_freshness_hours() -> u32 {
    12
}

/// Adaptive-stream downloads
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Extensions accepted as the final entry of a segment list
    #[serde(default = "default_media_extensions")]
    pub media_extensions: Vec<String>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            media_extensions: default_media_extensions(),
        }
    }
}

fn default_batch_size() -> usize {
    64
}

fn default_media_extensions() -> Vec<String> {
    ["ts", "m4s", "mp4", "m4a", "aac", "m4v"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Direct single-file downloads
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DirectConfig {
    /// A drop in progress larger than this fraction counts as a backward jump
    #[serde(default = "default_jump_threshold")]
    pub backward_jump_threshold: f64,
    /// Cancel once the jump count exceeds this
    #[serde(default = "default_max_jumps")]
    pub max_backward_jumps: u32,
    /// Reopen attempts after a broken transfer
    #[serde(default = "default_max_resumes")]
    pub max_resumes: u32,
}

impl Default for DirectConfig {
    fn default() -> Self {
        Self {
            backward_jump_threshold: default_jump_threshold(),
            max_backward_jumps: default_max_jumps(),
            max_resumes: default_max_resumes(),
        }
    }
}

fn default_jump_threshold() -> f64 {
    0.15
}

fn default_max_jumps() -> u32 {
    3
}

fn default_max_resumes() -> u32 {
    8
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FilenameConfig {
    /// Suffix names already claimed by another item
    #[serde(default = "default_unique")]
    pub unique: bool,
}

impl Default for FilenameConfig {
    fn default() -> Self {
        Self {
            unique: default_unique(),
        }
    }
}

fn default_unique() -> bool {
    true
}

/// HTTP client settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Timeout for manifest and segment requests (direct downloads are never timed out)
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    /// Extra headers, e.g. the member session cookie
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            request_timeout_secs: None,
            headers: BTreeMap::new(),
        }
    }
}

fn default_user_agent() -> String {
    concat!("reelsync/", env!("CARGO_PKG_VERSION")).to_string()
}

/// Sanitized config for logging (header values redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub renderer: RendererConfig,
    pub paths: PathsConfig,
    pub connectivity: ConnectivityConfig,
    pub crawl: CrawlConfig,
    pub stream: SanitizedStreamConfig,
    pub direct: DirectConfig,
    pub filenames: FilenameConfig,
    pub http: SanitizedHttpConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedStreamConfig {
    pub batch_size: usize,
}

/// HTTP config with header values hidden
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedHttpConfig {
    pub user_agent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
    pub header_names: Vec<String>,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            renderer: config.renderer.clone(),
            paths: config.paths.clone(),
            connectivity: config.connectivity.clone(),
            crawl: config.crawl.clone(),
            stream: SanitizedStreamConfig {
                batch_size: config.stream.batch_size,
            },
            direct: config.direct.clone(),
            filenames: config.filenames.clone(),
            http: SanitizedHttpConfig {
                user_agent: config.http.user_agent.clone(),
                request_timeout_secs: config.http.request_timeout_secs,
                header_names: config.http.headers.keys().cloned().collect(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[renderer]
command = "./renderer"
"#;

    #[test]
    fn test_deserialize_minimal_uses_defaults() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.renderer.command, "./renderer");
        assert!(config.renderer.args.is_empty());
        assert_eq!(config.stream.batch_size, 64);
        assert_eq!(config.crawl.freshness_hours, 12);
        assert!(config.crawl.max_pages.is_none());
        assert_eq!(config.connectivity.poll_interval_ms, 2048);
        assert!(config.connectivity.max_attempts.is_none());
        assert_eq!(config.direct.max_backward_jumps, 3);
        assert_eq!(config.direct.backward_jump_threshold, 0.15);
        assert!(config.filenames.unique);
    }

    #[test]
    fn test_deserialize_missing_renderer_fails() {
        let toml = r#"
[stream]
batch_size = 8
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_relative_store_paths_resolve_under_download_dir() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.paths.status_db_path(), PathBuf::from("out/db.json"));
        assert_eq!(
            config.paths.catalog_cache_path(),
            PathBuf::from("out/catalog-cache.json")
        );
    }

    #[test]
    fn test_absolute_store_paths_are_kept() {
        let toml = r#"
[renderer]
command = "./renderer"

[paths]
download_dir = "/media"
status_db = "/var/lib/reelsync/db.json"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(
            config.paths.status_db_path(),
            PathBuf::from("/var/lib/reelsync/db.json")
        );
        assert_eq!(
            config.paths.catalog_cache_path(),
            PathBuf::from("/media/catalog-cache.json")
        );
    }

    #[test]
    fn test_freshness_window() {
        let config = CrawlConfig {
            freshness_hours: 6,
            max_pages: None,
        };
        assert_eq!(config.freshness_window(), chrono::Duration::hours(6));
    }

    #[test]
    fn test_sanitized_config_hides_header_values() {
        let toml = r#"
[renderer]
command = "./renderer"

[http]
headers = { Cookie = "session=secret" }
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let sanitized = SanitizedConfig::from(&config);
        assert_eq!(sanitized.http.header_names, vec!["Cookie".to_string()]);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("secret"));
    }
}
