//! Go release metadata.
//!
//! The Go download site publishes its releases as JSON, newest first:
//!
//! ```json
//! [
//!   {
//!     "version": "go1.22.3",
//!     "stable": true,
//!     "files": [
//!       {
//!         "filename": "go1.22.3.linux-amd64.tar.gz",
//!         "os": "linux",
//!         "arch": "amd64",
//!         "version": "go1.22.3",
//!         "sha256": "8920ea52...",
//!         "size": 68958123,
//!         "kind": "archive"
//!       }
//!     ]
//!   }
//! ]
//! ```
//!
//! The default query only lists the current stable releases; `include=all`
//! adds every historical release. Stable-only responses are cached for
//! fifteen minutes under the configured cache directory.

use log::{debug, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use super::Platform;
use crate::config::Config;
use crate::errors::ReleaseError;

/// How long a cached stable release list stays valid.
const CACHE_TTL_SECS: u64 = 15 * 60;

/// Cache file name inside the cache directory.
const CACHE_FILE: &str = "releases.json";

/// One downloadable file of a release.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReleaseFile {
    pub filename: String,
    /// `GOOS`, empty for source archives.
    #[serde(default)]
    pub os: String,
    /// `GOARCH`, empty for source archives.
    #[serde(default)]
    pub arch: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub sha256: String,
    #[serde(default)]
    pub size: u64,
    /// `archive`, `installer` or `source`.
    #[serde(default)]
    pub kind: String,
}

/// A Go release and its files.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GoRelease {
    /// The version string, e.g. `go1.22.3`.
    pub version: String,
    pub stable: bool,
    #[serde(default)]
    pub files: Vec<ReleaseFile>,
}

impl GoRelease {
    /// Finds the gzip tar archive for `platform`.
    #[must_use = "returns file info without side effects"]
    pub fn archive_for(&self, platform: Platform) -> Option<&ReleaseFile> {
        self.files.iter().find(|f| {
            f.os == platform.os()
                && f.arch == platform.arch()
                && f.kind == "archive"
                && f.filename.ends_with(".tar.gz")
        })
    }
}

/// Full download URL for a release file.
#[must_use]
pub fn download_url(config: &Config, file: &ReleaseFile) -> String {
    config.archive_url(&file.filename)
}

/// The newest stable release, or the newest release if none is stable.
#[must_use = "returns version info without side effects"]
pub fn latest_stable(releases: &[GoRelease]) -> Option<&GoRelease> {
    releases
        .iter()
        .find(|r| r.stable)
        .or_else(|| releases.first())
}

/// Finds a release by version, with or without the `go` prefix.
#[must_use = "returns version info without side effects"]
pub fn find_release<'a>(releases: &'a [GoRelease], version: &str) -> Option<&'a GoRelease> {
    let wanted = normalize_version(version);
    releases.iter().find(|r| r.version == wanted)
}

/// Adds the `go` prefix if missing.
#[must_use]
pub fn normalize_version(version: &str) -> String {
    let version = version.trim();
    if version.starts_with("go") {
        version.to_string()
    } else {
        format!("go{version}")
    }
}

/// Extracts a `goX.Y[.Z]` label from a URL or file name.
#[must_use]
pub fn version_label(text: &str) -> Option<&str> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = PATTERN
        .get_or_init(|| Regex::new(r"go[1-9][0-9]*\.[0-9]+(?:\.[0-9]+|(?:rc|beta)[0-9]+)?").ok())
        .as_ref()?;
    pattern.find(text).map(|m| m.as_str())
}

/// Fetches the release list.
///
/// With `include_all` every historical release is listed; otherwise only the
/// current stable ones, served from the cache when it is fresh.
///
/// # Errors
///
/// Returns an error if the endpoint cannot be reached, answers with a
/// non-success status, or returns a body that is not a release list.
pub async fn fetch_releases(
    config: &Config,
    include_all: bool,
) -> Result<Vec<GoRelease>, ReleaseError> {
    let url = releases_url(&config.release_url, include_all);
    let cache = config
        .cache_dir
        .as_deref()
        .filter(|_| !include_all)
        .map(|dir| dir.join(CACHE_FILE));

    if let Some(releases) = cache.as_deref().and_then(|path| load_from_cache(path, &url)) {
        debug!("using cached release list for {url}");
        return Ok(releases);
    }

    let releases = fetch_from_network(config, &url).await?;
    if let Some(path) = cache.as_deref() {
        save_to_cache(path, &url, &releases);
    }
    Ok(releases)
}

fn releases_url(base: &str, include_all: bool) -> String {
    let base = base.trim();
    if !include_all {
        return base.to_string();
    }
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{base}{separator}include=all")
}

async fn fetch_from_network(config: &Config, url: &str) -> Result<Vec<GoRelease>, ReleaseError> {
    let client = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()
        .map_err(ReleaseError::Client)?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|source| ReleaseError::Request {
            url: url.to_string(),
            source,
        })?;

    if !response.status().is_success() {
        return Err(ReleaseError::Status {
            url: url.to_string(),
            status: response.status().as_u16(),
        });
    }

    let body = response
        .bytes()
        .await
        .map_err(|source| ReleaseError::Request {
            url: url.to_string(),
            source,
        })?;

    serde_json::from_slice(&body).map_err(|source| ReleaseError::Parse {
        url: url.to_string(),
        source,
    })
}

/// Cached release list with the URL it came from.
#[derive(Debug, Serialize, Deserialize)]
struct CachedReleases {
    url: String,
    timestamp: u64,
    releases: Vec<GoRelease>,
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

/// Loads a fresh cache entry for `url`. Unreadable caches are deleted.
fn load_from_cache(path: &Path, url: &str) -> Option<Vec<GoRelease>> {
    let content = std::fs::read_to_string(path).ok()?;

    let Ok(cached) = serde_json::from_str::<CachedReleases>(&content) else {
        warn!("discarding unreadable release cache {}", path.display());
        let _ = std::fs::remove_file(path);
        return None;
    };

    let age = current_timestamp().saturating_sub(cached.timestamp);
    (cached.url == url && age < CACHE_TTL_SECS).then_some(cached.releases)
}

fn save_to_cache(path: &Path, url: &str, releases: &[GoRelease]) {
    let cached = CachedReleases {
        url: url.to_string(),
        timestamp: current_timestamp(),
        releases: releases.to_vec(),
    };

    let result = path
        .parent()
        .map_or(Ok(()), std::fs::create_dir_all)
        .and_then(|()| {
            serde_json::to_vec(&cached)
                .map_err(std::io::Error::other)
                .and_then(|bytes| std::fs::write(path, bytes))
        });
    if let Err(e) = result {
        warn!("failed to write release cache {}: {e}", path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const RELEASES_JSON: &str = r#"[
        {
            "version": "go1.23rc1",
            "stable": false,
            "files": [
                {"filename": "go1.23rc1.linux-amd64.tar.gz", "os": "linux", "arch": "amd64",
                 "version": "go1.23rc1", "sha256": "aa", "size": 10, "kind": "archive"}
            ]
        },
        {
            "version": "go1.22.3",
            "stable": true,
            "files": [
                {"filename": "go1.22.3.src.tar.gz", "os": "", "arch": "",
                 "version": "go1.22.3", "sha256": "bb", "size": 20, "kind": "source"},
                {"filename": "go1.22.3.darwin-arm64.pkg", "os": "darwin", "arch": "arm64",
                 "version": "go1.22.3", "sha256": "cc", "size": 30, "kind": "installer"},
                {"filename": "go1.22.3.darwin-arm64.tar.gz", "os": "darwin", "arch": "arm64",
                 "version": "go1.22.3", "sha256": "dd", "size": 40, "kind": "archive"},
                {"filename": "go1.22.3.linux-amd64.tar.gz", "os": "linux", "arch": "amd64",
                 "version": "go1.22.3", "sha256": "ee", "size": 50, "kind": "archive"}
            ]
        },
        {
            "version": "go1.21.10",
            "stable": true,
            "files": []
        }
    ]"#;

    fn releases() -> Vec<GoRelease> {
        serde_json::from_str(RELEASES_JSON).expect("valid JSON")
    }

    fn test_config(server_url: &str, cache_dir: Option<PathBuf>) -> Config {
        let mut config = Config::new(Platform::LinuxAmd64);
        config.release_url = format!("{server_url}/dl/?mode=json");
        config.cache_dir = cache_dir;
        config
    }

    #[test]
    fn archive_for_picks_platform_tarball() {
        let releases = releases();
        let release = &releases[1];

        let linux = release.archive_for(Platform::LinuxAmd64).expect("linux");
        assert_eq!(linux.filename, "go1.22.3.linux-amd64.tar.gz");

        let darwin = release.archive_for(Platform::DarwinArm64).expect("darwin");
        assert_eq!(darwin.filename, "go1.22.3.darwin-arm64.tar.gz");

        assert!(release.archive_for(Platform::LinuxArm64).is_none());
    }

    #[test]
    fn latest_stable_skips_prereleases() {
        let releases = releases();
        assert_eq!(
            latest_stable(&releases).map(|r| r.version.as_str()),
            Some("go1.22.3")
        );
    }

    #[test]
    fn latest_stable_falls_back_to_newest() {
        let releases: Vec<GoRelease> = releases().into_iter().take(1).collect();
        assert_eq!(
            latest_stable(&releases).map(|r| r.version.as_str()),
            Some("go1.23rc1")
        );
        assert!(latest_stable(&[]).is_none());
    }

    #[test]
    fn find_release_accepts_bare_versions() {
        let releases = releases();
        assert!(find_release(&releases, "go1.21.10").is_some());
        assert!(find_release(&releases, "1.21.10").is_some());
        assert!(find_release(&releases, "1.20").is_none());
    }

    #[test]
    fn download_url_joins_base() {
        let config = Config::new(Platform::LinuxAmd64);
        let releases = releases();
        let file = releases[1]
            .archive_for(Platform::LinuxAmd64)
            .expect("linux");
        assert_eq!(
            download_url(&config, file),
            "https://dl.google.com/go/go1.22.3.linux-amd64.tar.gz"
        );
    }

    #[test]
    fn version_label_finds_version_in_url() {
        assert_eq!(
            version_label("https://dl.google.com/go/go1.22.3.linux-amd64.tar.gz"),
            Some("go1.22.3")
        );
        assert_eq!(version_label("go1.21.linux-amd64.tar.gz"), Some("go1.21"));
        assert_eq!(version_label("/tmp/go1.23rc1.tar.gz"), Some("go1.23rc1"));
        assert_eq!(version_label("https://example.com/archive.tar.gz"), None);
    }

    #[test]
    fn include_all_extends_query() {
        assert_eq!(
            releases_url("https://go.dev/dl/?mode=json", true),
            "https://go.dev/dl/?mode=json&include=all"
        );
        assert_eq!(
            releases_url("http://localhost/releases", true),
            "http://localhost/releases?include=all"
        );
        assert_eq!(
            releases_url("https://go.dev/dl/?mode=json", false),
            "https://go.dev/dl/?mode=json"
        );
    }

    #[tokio::test]
    async fn fetch_releases_parses_endpoint() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/dl/")
            .match_query(mockito::Matcher::UrlEncoded("mode".into(), "json".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(RELEASES_JSON)
            .create_async()
            .await;

        let config = test_config(&server.url(), None);
        let releases = fetch_releases(&config, false).await.expect("fetch");
        assert_eq!(releases.len(), 3);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn fetch_releases_uses_fresh_cache() {
        let cache = tempfile::tempdir().expect("tempdir");
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/dl/")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(RELEASES_JSON)
            .expect(1)
            .create_async()
            .await;

        let config = test_config(&server.url(), Some(cache.path().to_path_buf()));
        let first = fetch_releases(&config, false).await.expect("network");
        let second = fetch_releases(&config, false).await.expect("cache");
        assert_eq!(first, second);
        assert!(cache.path().join(CACHE_FILE).is_file());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn include_all_bypasses_cache() {
        let cache = tempfile::tempdir().expect("tempdir");
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/dl/")
            .match_query(mockito::Matcher::UrlEncoded(
                "include".into(),
                "all".into(),
            ))
            .with_status(200)
            .with_body(RELEASES_JSON)
            .expect(2)
            .create_async()
            .await;

        let config = test_config(&server.url(), Some(cache.path().to_path_buf()));
        fetch_releases(&config, true).await.expect("first");
        fetch_releases(&config, true).await.expect("second");
        assert!(!cache.path().join(CACHE_FILE).exists());
        mock.assert_async().await;
    }

    #[test]
    fn stale_or_foreign_cache_is_ignored() {
        let cache = tempfile::tempdir().expect("tempdir");
        let path = cache.path().join(CACHE_FILE);

        save_to_cache(&path, "http://a/releases", &releases());
        assert!(load_from_cache(&path, "http://a/releases").is_some());
        assert!(load_from_cache(&path, "http://b/releases").is_none());

        let stale = CachedReleases {
            url: "http://a/releases".to_string(),
            timestamp: current_timestamp() - CACHE_TTL_SECS - 1,
            releases: releases(),
        };
        std::fs::write(&path, serde_json::to_vec(&stale).expect("serialize")).expect("write");
        assert!(load_from_cache(&path, "http://a/releases").is_none());
    }

    #[test]
    fn corrupt_cache_is_deleted() {
        let cache = tempfile::tempdir().expect("tempdir");
        let path = cache.path().join(CACHE_FILE);
        std::fs::write(&path, b"{ not json").expect("write");

        assert!(load_from_cache(&path, "http://a/releases").is_none());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/dl/")
            .match_query(mockito::Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        let config = test_config(&server.url(), None);
        let err = fetch_releases(&config, false).await.expect_err("503");
        assert!(matches!(err, ReleaseError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn malformed_body_is_parse_error() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/dl/")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body("<html>not json</html>")
            .create_async()
            .await;

        let config = test_config(&server.url(), None);
        let err = fetch_releases(&config, false).await.expect_err("html");
        assert!(matches!(err, ReleaseError::Parse { .. }));
    }
}
