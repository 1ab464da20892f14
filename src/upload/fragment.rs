//! Fragment planning
//!
//! Splits `[0, total_size)` into contiguous, ascending, non-overlapping
//! groups of at most `group_size` bytes. An empty file is planned as a single
//! zero-length fragment so the session is still finalized by one request.

use super::UploadError;

/// One ranged upload request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment {
    pub offset: u64,
    pub length: u64,
    pub total_size: u64,
}

impl Fragment {
    /// Exclusive end offset
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }

    /// Whether this fragment covers the final byte of the file
    pub fn is_last(&self) -> bool {
        self.end() == self.total_size
    }

    /// `Content-Range` header value
    ///
    /// `bytes <start>-<end>/<total>` with an inclusive end, or `bytes */0` for
    /// the zero-length fragment of an empty file.
    pub fn content_range(&self) -> String {
        if self.length == 0 {
            format!("bytes */{}", self.total_size)
        } else {
            format!(
                "bytes {}-{}/{}",
                self.offset,
                self.end() - 1,
                self.total_size
            )
        }
    }
}

/// Lazy sequence of the fragments of one session
#[derive(Debug, Clone)]
pub struct FragmentPlan {
    total_size: u64,
    group_size: u64,
    next_offset: u64,
    exhausted: bool,
}

impl FragmentPlan {
    pub fn new(total_size: u64, group_size: u64) -> Result<Self, UploadError> {
        if group_size == 0 {
            return Err(UploadError::InvalidFragmentSize);
        }
        Ok(Self {
            total_size,
            group_size,
            next_offset: 0,
            exhausted: false,
        })
    }

    /// Total number of requests the plan produces
    pub fn request_count(&self) -> u64 {
        if self.total_size == 0 {
            1
        } else {
            self.total_size.div_ceil(self.group_size)
        }
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn group_size(&self) -> u64 {
        self.group_size
    }
}

impl Iterator for FragmentPlan {
    type Item = Fragment;

    fn next(&mut self) -> Option<Fragment> {
        if self.exhausted {
            return None;
        }

        let remaining = self.total_size - self.next_offset;
        let length = remaining.min(self.group_size);
        let fragment = Fragment {
            offset: self.next_offset,
            length,
            total_size: self.total_size,
        };

        self.next_offset += length;
        if self.next_offset == self.total_size {
            self.exhausted = true;
        }
        Some(fragment)
    }
}
