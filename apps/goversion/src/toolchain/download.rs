//! HTTP download of release archives into memory.
//!
//! Two strategies are available and chosen from the probe result:
//!
//! - [`ConcurrentDownloader`] splits the archive into byte ranges, fetches
//!   every range on its own task, waits for all of them, and concatenates
//!   the buffers in range order.
//! - [`SequentialDownloader`] streams the whole archive with one request.
//!
//! Both hold the complete archive in memory and report transferred bytes to
//! a shared [`ProgressSink`]. Nothing is retried; a failed download surfaces
//! to the caller.
//!
//! ## Failure aggregation
//!
//! The concurrent path is a join-all barrier, not a race: every range task
//! runs to completion and every failure is collected into one
//! [`AggregateDownloadError`]. No partial buffer is ever returned.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use futures_util::future::join_all;
use log::{debug, info};
use reqwest::header::RANGE;
use reqwest::{Client, StatusCode};

use super::chunk::{self, ByteRange};
use super::probe::DownloadTarget;
use super::progress::ProgressSink;
use crate::errors::{AggregateDownloadError, ChunkFailure, ChunkFetchError, DownloadError};

/// User-Agent header for HTTP requests.
const USER_AGENT: &str = concat!("goversion/", env!("CARGO_PKG_VERSION"));

/// Builds the HTTP client shared by the probe and both downloaders.
///
/// # Errors
///
/// Returns [`DownloadError::Client`] if the TLS backend cannot be initialised.
pub fn http_client(timeout: Duration) -> Result<Client, DownloadError> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(DownloadError::Client)
}

/// Which download path a target calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Concurrent byte-range requests.
    Concurrent,
    /// One streaming request.
    Sequential,
}

impl Strategy {
    /// Picks the concurrent path only for range-capable targets of known size.
    #[must_use]
    pub fn for_target(target: &DownloadTarget) -> Self {
        if target.supports_chunking() {
            Self::Concurrent
        } else {
            Self::Sequential
        }
    }
}

/// Outcome of fetching one planned range.
#[derive(Debug)]
pub struct ChunkResult {
    /// Position in the ordered range list.
    pub index: usize,
    /// The fetched bytes, or why they could not be fetched.
    pub data: Result<Vec<u8>, ChunkFetchError>,
}

/// Fetches exactly `range` of `url` into an owned buffer.
///
/// The server must answer `206 Partial Content` with exactly `range.len()`
/// bytes. Received bytes are reported to `progress` as they arrive.
pub async fn fetch_range(
    client: &Client,
    url: &str,
    index: usize,
    range: ByteRange,
    progress: &ProgressSink,
) -> ChunkResult {
    let data = fetch_range_bytes(client, url, range, progress)
        .await
        .map_err(|reason| ChunkFetchError {
            index,
            range,
            reason,
        });
    ChunkResult { index, data }
}

async fn fetch_range_bytes(
    client: &Client,
    url: &str,
    range: ByteRange,
    progress: &ProgressSink,
) -> Result<Vec<u8>, ChunkFailure> {
    let response = client
        .get(url)
        .header(RANGE, range.header_value())
        .send()
        .await
        .map_err(ChunkFailure::Request)?;

    if response.status() != StatusCode::PARTIAL_CONTENT {
        return Err(ChunkFailure::Status(response.status().as_u16()));
    }

    let expected = range.len();
    let mut buffer = Vec::with_capacity(usize::try_from(expected).unwrap_or(0));
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(ChunkFailure::Body)?;
        buffer.extend_from_slice(&chunk);
        progress.add(chunk.len() as u64);
    }

    let actual = buffer.len() as u64;
    if actual != expected {
        return Err(ChunkFailure::Length { expected, actual });
    }
    Ok(buffer)
}

/// Joins chunk results into one buffer in ascending index order.
///
/// Completion order is irrelevant: results are placed by index. If any
/// chunk failed, every failure is returned and the buffers are dropped.
///
/// # Errors
///
/// Returns an [`AggregateDownloadError`] listing all failed chunks.
pub fn assemble(mut results: Vec<ChunkResult>) -> Result<Vec<u8>, AggregateDownloadError> {
    results.sort_by_key(|r| r.index);
    let total = results.len();

    let mut buffers = Vec::with_capacity(total);
    let mut failures = Vec::new();
    for result in results {
        match result.data {
            Ok(buffer) => buffers.push(buffer),
            Err(e) => failures.push(e),
        }
    }

    if !failures.is_empty() {
        return Err(AggregateDownloadError { total, failures });
    }
    Ok(buffers.concat())
}

/// Fetches a range-capable target as concurrent byte-range requests.
pub struct ConcurrentDownloader {
    client: Client,
    workers: usize,
    progress: Arc<ProgressSink>,
}

impl ConcurrentDownloader {
    /// Creates a downloader that splits targets across `workers` requests.
    #[must_use]
    pub fn new(client: Client, workers: usize, progress: Arc<ProgressSink>) -> Self {
        Self {
            client,
            workers: workers.max(1),
            progress,
        }
    }

    /// Downloads `target` and returns its bytes in order.
    ///
    /// Every planned range runs on its own task; the call returns only after
    /// all of them finished.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Aggregate`] carrying every chunk failure.
    pub async fn download(&self, target: &DownloadTarget) -> Result<Vec<u8>, DownloadError> {
        let size = target.size.unwrap_or(0);
        let ranges = chunk::plan(size, self.workers);
        info!(
            "downloading {} in {} ranges of up to {} bytes",
            target.url,
            ranges.len(),
            ranges.first().map_or(0, ByteRange::len)
        );
        self.progress.start(Some(size));

        let handles: Vec<_> = ranges
            .iter()
            .copied()
            .enumerate()
            .map(|(index, range)| {
                let client = self.client.clone();
                let url = target.url.clone();
                let progress = Arc::clone(&self.progress);
                tokio::spawn(async move {
                    let result = fetch_range(&client, &url, index, range, &progress).await;
                    debug!("chunk {index} ({range}) finished: ok={}", result.data.is_ok());
                    result
                })
            })
            .collect();

        let results = join_all(handles)
            .await
            .into_iter()
            .zip(ranges)
            .enumerate()
            .map(|(index, (joined, range))| {
                joined.unwrap_or_else(|e| ChunkResult {
                    index,
                    data: Err(ChunkFetchError {
                        index,
                        range,
                        reason: ChunkFailure::Worker(e.to_string()),
                    }),
                })
            })
            .collect();

        let bytes = assemble(results).inspect_err(|e| {
            self.progress.fail();
            debug!("failed chunks: {:?}", e.failed_indices());
        })?;
        self.progress.finish();
        debug!("received {} bytes", self.progress.downloaded());
        Ok(bytes)
    }
}

/// Fetches a target as one streaming request.
pub struct SequentialDownloader {
    client: Client,
    progress: Arc<ProgressSink>,
}

impl SequentialDownloader {
    /// Creates a single-stream downloader.
    #[must_use]
    pub fn new(client: Client, progress: Arc<ProgressSink>) -> Self {
        Self { client, progress }
    }

    /// Downloads the whole body of `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent, the status is not a
    /// success status, or the body cannot be read to the end.
    pub async fn download(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
        info!("downloading {url} as a single stream");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| DownloadError::Request {
                url: url.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(DownloadError::Sequential {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let total = response.content_length();
        self.progress.start(total);

        let mut buffer = Vec::with_capacity(
            total.and_then(|t| usize::try_from(t).ok()).unwrap_or(0),
        );
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|source| {
                self.progress.fail();
                DownloadError::Body {
                    url: url.to_string(),
                    source,
                }
            })?;
            buffer.extend_from_slice(&chunk);
            self.progress.add(chunk.len() as u64);
        }

        self.progress.finish();
        Ok(buffer)
    }
}
