//! Metadata probe for download targets.
//!
//! A `HEAD` request tells us how large the archive is and whether the server
//! will serve byte ranges. Only an explicit `Accept-Ranges: bytes` counts as
//! range support; a known, non-zero `Content-Length` is also required before
//! the concurrent path is chosen.

use log::{debug, warn};
use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, HeaderMap};
use reqwest::{Client, StatusCode};

use crate::errors::ProbeError;

/// A resolved download target. Immutable once probed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTarget {
    /// The archive URL.
    pub url: String,
    /// Total size in bytes, if the server reported it.
    pub size: Option<u64>,
    /// Whether the server supports byte-range requests for this resource.
    pub range_capable: bool,
}

impl DownloadTarget {
    /// Returns whether the concurrent range path can be used.
    #[must_use]
    pub fn supports_chunking(&self) -> bool {
        self.range_capable && self.size.is_some_and(|size| size > 0)
    }
}

/// Issues a metadata request for `url`.
///
/// Servers that refuse `HEAD` (405/501) are treated as not range-capable
/// with an unknown size, so the caller falls back to a sequential download.
///
/// # Errors
///
/// Returns [`ProbeError::Request`] if the request cannot be sent, and
/// [`ProbeError::Status`] for any other non-success status.
pub async fn probe(client: &Client, url: &str) -> Result<DownloadTarget, ProbeError> {
    let response = client
        .head(url)
        .send()
        .await
        .map_err(|source| ProbeError::Request {
            url: url.to_string(),
            source,
        })?;

    let status = response.status();
    if matches!(
        status,
        StatusCode::METHOD_NOT_ALLOWED | StatusCode::NOT_IMPLEMENTED
    ) {
        warn!("{url} does not answer HEAD ({status}); falling back to a single stream");
        return Ok(DownloadTarget {
            url: url.to_string(),
            size: None,
            range_capable: false,
        });
    }
    if !status.is_success() {
        return Err(ProbeError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let target = target_from_headers(url, response.headers());
    debug!(
        "probed {url}: size={:?} range_capable={}",
        target.size, target.range_capable
    );
    Ok(target)
}

/// Builds a target from `HEAD` response headers.
fn target_from_headers(url: &str, headers: &HeaderMap) -> DownloadTarget {
    let size = headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok());

    let accepts_bytes = headers
        .get_all(ACCEPT_RANGES)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|unit| unit.trim().eq_ignore_ascii_case("bytes"));

    DownloadTarget {
        url: url.to_string(),
        size,
        range_capable: accepts_bytes && size.is_some_and(|s| s > 0),
    }
}
