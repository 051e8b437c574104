//! Runtime configuration for goversion.
//!
//! All tunables are collected into a single [`Config`] value that is passed
//! to the downloader and installer. Values come from built-in defaults,
//! overridden by environment variables, overridden by command-line flags.
//!
//! ## Environment Variables
//!
//! - `GOVERSION_WORKERS` - number of concurrent range requests
//! - `GOVERSION_ROOT` - Go installation root (default `/usr/local/go`)
//! - `GOVERSION_RELEASE_URL` - release metadata endpoint
//! - `GOVERSION_DOWNLOAD_BASE` - base URL archive file names are appended to
//! - `GOVERSION_CACHE_DIR` - directory for the release metadata cache

use anyhow::{Context, Result};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use crate::toolchain::Platform;

pub const WORKERS_ENV: &str = "GOVERSION_WORKERS";
pub const ROOT_ENV: &str = "GOVERSION_ROOT";
pub const RELEASE_URL_ENV: &str = "GOVERSION_RELEASE_URL";
pub const DOWNLOAD_BASE_ENV: &str = "GOVERSION_DOWNLOAD_BASE";
pub const CACHE_DIR_ENV: &str = "GOVERSION_CACHE_DIR";

const DEFAULT_ROOT: &str = "/usr/local/go";
const DEFAULT_RELEASE_URL: &str = "https://go.dev/dl/?mode=json";
const DEFAULT_DOWNLOAD_BASE: &str = "https://dl.google.com/go/";

/// Top-level directory inside official Go archives.
const DEFAULT_ARCHIVE_ROOT: &str = "go";

/// Concurrent range requests per logical core.
const WORKERS_PER_CORE: usize = 4;

/// Request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 300;

/// Configuration threaded through the upgrade pipeline.
#[derive(Debug, Clone)]
pub struct Config {
    /// Number of concurrent range requests (at least 1).
    pub workers: usize,
    /// Target platform whose archive is downloaded.
    pub platform: Platform,
    /// Directory that is replaced wholesale on upgrade.
    pub install_root: PathBuf,
    /// Structured release metadata endpoint.
    pub release_url: String,
    /// Base URL that archive file names are appended to.
    pub download_base: String,
    /// Top-level directory inside the archive that becomes the install root.
    pub archive_root: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Release metadata cache directory; `None` disables caching.
    pub cache_dir: Option<PathBuf>,
}

impl Config {
    /// Builds a configuration for `platform` from defaults alone.
    #[must_use]
    pub fn new(platform: Platform) -> Self {
        Self {
            workers: default_workers(),
            platform,
            install_root: PathBuf::from(DEFAULT_ROOT),
            release_url: DEFAULT_RELEASE_URL.to_string(),
            download_base: DEFAULT_DOWNLOAD_BASE.to_string(),
            archive_root: DEFAULT_ARCHIVE_ROOT.to_string(),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            cache_dir: dirs::cache_dir().map(|dir| dir.join("goversion")),
        }
    }

    /// Builds a configuration from defaults and environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform is unsupported or `GOVERSION_WORKERS`
    /// is not a positive integer.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::new(Platform::detect()?);

        if let Some(workers) = env_value(WORKERS_ENV) {
            let workers: usize = workers
                .parse()
                .with_context(|| format!("Invalid {WORKERS_ENV} value: {workers}"))?;
            config = config.with_workers(Some(workers));
        }
        if let Some(root) = env_value(ROOT_ENV) {
            config.install_root = PathBuf::from(root);
        }
        if let Some(url) = env_value(RELEASE_URL_ENV) {
            config.release_url = url;
        }
        if let Some(base) = env_value(DOWNLOAD_BASE_ENV) {
            config.download_base = base;
        }
        if let Some(dir) = env_value(CACHE_DIR_ENV) {
            config.cache_dir = Some(PathBuf::from(dir));
        }

        Ok(config)
    }

    /// Overrides the worker count; zero is raised to one.
    #[must_use]
    pub fn with_workers(mut self, workers: Option<usize>) -> Self {
        if let Some(workers) = workers {
            self.workers = workers.max(1);
        }
        self
    }

    /// Overrides the installation root.
    #[must_use]
    pub fn with_install_root(mut self, root: Option<PathBuf>) -> Self {
        if let Some(root) = root {
            self.install_root = root;
        }
        self
    }

    /// Full download URL for an archive file name.
    #[must_use]
    pub fn archive_url(&self, filename: &str) -> String {
        let base = self.download_base.trim();
        if base.ends_with('/') {
            format!("{base}{filename}")
        } else {
            format!("{base}/{filename}")
        }
    }
}

/// Default worker count: a multiple of the available parallelism.
#[must_use]
pub fn default_workers() -> usize {
    std::thread::available_parallelism().map_or(1, NonZeroUsize::get) * WORKERS_PER_CORE
}

/// Reads an environment variable, treating empty or whitespace-only values as unset.
fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    /// Runs `f` with the given environment variables set, restoring them afterwards.
    fn with_env<F: FnOnce()>(vars: &[(&str, &str)], f: F) {
        let saved: Vec<_> = vars
            .iter()
            .map(|(name, _)| (*name, std::env::var(name).ok()))
            .collect();

        // SAFETY: callers are marked #[serial] so no other test touches the environment.
        unsafe {
            for (name, value) in vars {
                std::env::set_var(name, value);
            }
        }

        f();

        unsafe {
            for (name, value) in saved {
                match value {
                    Some(v) => std::env::set_var(name, v),
                    None => std::env::remove_var(name),
                }
            }
        }
    }

    #[test]
    fn default_workers_is_multiple_of_core_count() {
        let workers = default_workers();
        assert!(workers >= WORKERS_PER_CORE);
        assert_eq!(workers % WORKERS_PER_CORE, 0);
    }

    #[test]
    fn with_workers_never_goes_below_one() {
        let config = Config::new(Platform::LinuxAmd64).with_workers(Some(0));
        assert_eq!(config.workers, 1);

        let config = Config::new(Platform::LinuxAmd64).with_workers(Some(7));
        assert_eq!(config.workers, 7);
    }

    #[test]
    fn with_workers_none_keeps_default() {
        let config = Config::new(Platform::LinuxAmd64).with_workers(None);
        assert_eq!(config.workers, default_workers());
    }

    #[test]
    fn archive_url_joins_base_and_filename() {
        let mut config = Config::new(Platform::LinuxAmd64);
        assert_eq!(
            config.archive_url("go1.22.3.linux-amd64.tar.gz"),
            "https://dl.google.com/go/go1.22.3.linux-amd64.tar.gz"
        );

        config.download_base = "http://127.0.0.1:8080/files".to_string();
        assert_eq!(
            config.archive_url("go.tar.gz"),
            "http://127.0.0.1:8080/files/go.tar.gz"
        );
    }

    #[test]
    #[serial]
    fn from_env_applies_overrides() {
        with_env(
            &[
                (WORKERS_ENV, "3"),
                (ROOT_ENV, "/opt/go"),
                (RELEASE_URL_ENV, "http://localhost/releases"),
                (DOWNLOAD_BASE_ENV, "  "),
            ],
            || {
                let config = Config::from_env().expect("supported platform");
                assert_eq!(config.workers, 3);
                assert_eq!(config.install_root, PathBuf::from("/opt/go"));
                assert_eq!(config.release_url, "http://localhost/releases");
                assert_eq!(config.download_base, DEFAULT_DOWNLOAD_BASE);
            },
        );
    }

    #[test]
    #[serial]
    fn from_env_rejects_non_numeric_workers() {
        with_env(&[(WORKERS_ENV, "many")], || {
            let err = Config::from_env().expect_err("should reject");
            assert!(err.to_string().contains(WORKERS_ENV));
        });
    }
}
