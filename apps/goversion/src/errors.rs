//! Error types for the goversion CLI.
//!
//! Each stage of the upgrade pipeline has its own error enum so that a
//! failure always names the step and the resource or path involved. The
//! command layer wraps these in `anyhow::Error` with additional context.
//!
//! ## Stages
//!
//! - [`ReleaseError`] - fetching or parsing the release metadata endpoint
//! - [`ProbeError`] - the metadata (HEAD) request against the archive URL
//! - [`ChunkFetchError`] / [`AggregateDownloadError`] - concurrent range fetches
//! - [`DownloadError`] - either download path as a whole
//! - [`ExtractError`] - gzip decompression and tar unpacking
//! - [`InstallError`] - the install pipeline, including the final directory swap

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::toolchain::chunk::ByteRange;

/// Top-level error type for goversion CLI operations.
#[derive(Debug, Error)]
pub enum GoversionError {
    /// The requested Go version does not exist in the release metadata.
    #[error("release not found: {version}")]
    ReleaseNotFound {
        /// The version that was requested.
        version: String,
    },

    /// A release exists but ships no gzip tar archive for this platform.
    #[error("no archive for {platform} in release {version}")]
    NoArchive {
        /// The release version.
        version: String,
        /// The platform identifier (e.g. `linux-amd64`).
        platform: String,
    },

    /// A required external tool is not on PATH.
    #[error("{tool} not found in PATH")]
    ToolNotFound {
        /// Name of the missing executable.
        tool: String,
    },

    /// Subprocess exited with non-zero code.
    ///
    /// The subprocess already printed its own diagnostics, so the exit code
    /// is propagated to the parent process without further output.
    #[error("process exited with code {code}")]
    ProcessExitCode {
        /// The exit code from the subprocess.
        code: i32,
    },
}

impl GoversionError {
    /// Creates a new `ReleaseNotFound` error.
    #[must_use]
    pub fn release_not_found(version: impl Into<String>) -> Self {
        Self::ReleaseNotFound {
            version: version.into(),
        }
    }

    /// Creates a new `ProcessExitCode` error.
    #[must_use]
    pub const fn process_exit_code(code: i32) -> Self {
        Self::ProcessExitCode { code }
    }
}

/// Failure to fetch the structured release metadata.
#[derive(Debug, Error)]
pub enum ReleaseError {
    #[error("create HTTP client")]
    Client(#[source] reqwest::Error),

    #[error("request {url}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("response status is {status}: {url}")]
    Status { url: String, status: u16 },

    #[error("decode response body from {url}")]
    Parse {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Failure of the metadata request that precedes a download.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The request could not be sent or the remote was unreachable.
    #[error("probe {url}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The remote answered the metadata request with an error status.
    #[error("probe {url}: response status is {status}")]
    Status { url: String, status: u16 },
}

/// Why a single chunk could not be fetched.
#[derive(Debug, Error)]
pub enum ChunkFailure {
    #[error("request failed: {0}")]
    Request(reqwest::Error),

    /// Anything other than `206 Partial Content`.
    #[error("expected partial content, got status {0}")]
    Status(u16),

    #[error("read body: {0}")]
    Body(reqwest::Error),

    #[error("expected {expected} bytes, received {actual}")]
    Length { expected: u64, actual: u64 },

    /// The worker task panicked or was aborted before producing a result.
    #[error("worker did not complete: {0}")]
    Worker(String),
}

/// One worker's range request failed.
#[derive(Debug, Error)]
#[error("chunk {index} (bytes {range}): {reason}")]
pub struct ChunkFetchError {
    /// Position of the chunk in the planned range list.
    pub index: usize,
    /// The byte range the worker was responsible for.
    pub range: ByteRange,
    /// The underlying failure, rendered inline.
    pub reason: ChunkFailure,
}

/// Every chunk failure of a concurrent download, ordered by chunk index.
#[derive(Debug)]
pub struct AggregateDownloadError {
    /// Number of chunks that were planned.
    pub total: usize,
    /// All failed chunks, never empty.
    pub failures: Vec<ChunkFetchError>,
}

impl AggregateDownloadError {
    /// Indices of the failed chunks in ascending order.
    #[must_use]
    pub fn failed_indices(&self) -> Vec<usize> {
        self.failures.iter().map(|f| f.index).collect()
    }
}

impl fmt::Display for AggregateDownloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} chunks failed",
            self.failures.len(),
            self.total
        )?;
        for failure in &self.failures {
            write!(f, "\n  {failure}")?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateDownloadError {}

/// Failure of either download path.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The HTTP client could not be constructed.
    #[error("create HTTP client")]
    Client(#[source] reqwest::Error),

    /// One or more chunks of a concurrent download failed.
    #[error(transparent)]
    Aggregate(#[from] AggregateDownloadError),

    /// The sequential fallback request could not be sent.
    #[error("request {url}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The sequential fallback answered with a non-success status.
    #[error("response status is {status}: {url}")]
    Sequential { url: String, status: u16 },

    /// The sequential response body could not be read to the end.
    #[error("read body from {url}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Failure while decompressing or unpacking an archive.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("open {}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The archive is not valid gzip.
    #[error("decompress {}", path.display())]
    Decompress {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The archive name does not end with a known archive suffix.
    #[error("cannot derive a destination directory from {}", path.display())]
    ArchiveName { path: PathBuf },

    /// The destination directory is already present.
    #[error("destination {} already exists", path.display())]
    DestinationExists { path: PathBuf },

    #[error("make {} directory", path.display())]
    CreateDestination {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("read tar entry")]
    ReadEntry {
        #[source]
        source: std::io::Error,
    },

    /// Entry paths must be relative and must not climb out of the destination.
    #[error("refusing to extract {}", path.display())]
    UnsafePath { path: PathBuf },

    #[error("create {}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("create {}", path.display())]
    CreateFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("copy to {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure of the install pipeline, naming the step that failed.
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("probe archive")]
    Probe(#[from] ProbeError),

    #[error("download archive")]
    Download(#[from] DownloadError),

    #[error("write temporary archive")]
    TempFile {
        #[source]
        source: std::io::Error,
    },

    #[error("extract archive")]
    Extract(#[from] ExtractError),

    /// The extracted archive does not contain the expected top-level directory.
    #[error("archive does not contain {}", path.display())]
    MissingTree { path: PathBuf },

    #[error("read confirmation")]
    Prompt {
        #[source]
        source: std::io::Error,
    },

    #[error("remove {}", path.display())]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("rename from {} to {}", from.display(), to.display())]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Removal or move of the installation root was refused by the OS.
    #[error("permission denied modifying {} (try running with sudo)", path.display())]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl InstallError {
    /// Classifies a filesystem failure on `path`, singling out permission errors.
    pub(crate) fn remove(path: PathBuf, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::PermissionDenied {
            Self::PermissionDenied { path, source }
        } else {
            Self::Remove { path, source }
        }
    }

    /// Like [`InstallError::remove`] for the move step.
    pub(crate) fn moving(from: PathBuf, to: PathBuf, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::PermissionDenied {
            Self::PermissionDenied { path: to, source }
        } else {
            Self::Move { from, to, source }
        }
    }
}
