//! Byte-range planning for concurrent downloads.
//!
//! A resource of `size` bytes is split into contiguous, non-overlapping,
//! inclusive ranges that are ordered by start offset and together cover
//! exactly `[0, size)`.

use std::fmt;

/// An inclusive, zero-indexed byte range `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ByteRange {
    /// First byte offset.
    pub start: u64,
    /// Last byte offset (inclusive).
    pub end: u64,
}

impl ByteRange {
    /// Creates a range covering `start..=end`.
    #[must_use]
    pub const fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Number of bytes covered by this range.
    #[must_use]
    #[allow(clippy::len_without_is_empty)]
    pub const fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Value for the HTTP `Range` request header.
    #[must_use]
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Splits `size` bytes into at most `workers` ranges.
///
/// Every range has length `ceil(size / workers)` except the last, which
/// extends to the end of the resource. When `size` is smaller than the
/// worker count, the effective worker count shrinks so that no range is
/// empty. A zero `size` or zero `workers` yields no ranges.
#[must_use]
pub fn plan(size: u64, workers: usize) -> Vec<ByteRange> {
    if size == 0 || workers == 0 {
        return Vec::new();
    }

    let workers = (workers as u64).min(size);
    let chunk_size = size.div_ceil(workers);

    let mut ranges = Vec::with_capacity(usize::try_from(workers).unwrap_or(0));
    let mut start = 0;
    while start < size {
        let end = (start + chunk_size).min(size) - 1;
        ranges.push(ByteRange::new(start, end));
        start = end + 1;
    }

    if let Some(last) = ranges.last_mut() {
        last.end = size - 1;
    }
    ranges
}
