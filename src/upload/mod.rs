//! Upload module
//!
//! The resumable chunked-upload engine: bytes are staged in a local scratch
//! file, optionally seeded with the remote item's current content, and sent
//! on close as a sequence of contiguous ranged requests against a
//! server-issued upload session.

use crate::config::{PreloadFailure, UploadConfig};
use std::path::PathBuf;
use thiserror::Error;

pub mod fragment;
pub mod handle;
pub mod preload;
pub mod session;
pub mod staging;

#[cfg(test)]
pub(crate) mod testing;

pub use fragment::{Fragment, FragmentPlan};
pub use handle::{HandleState, OpenMode, UploadHandle};
pub use preload::{AppendPreloader, PreloadOutcome};
pub use session::UploadSessionClient;
pub use staging::{FragmentReader, StagingBuffer};

/// Upload errors
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("{operation} rejected with status {status}: {body}")]
    RemoteRejected {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("Append preload failed with status {status}: {body}")]
    PreloadFailed { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Incomplete upload: {0}")]
    IncompleteUpload(String),

    #[error("Staged size {actual} does not match declared size {declared}")]
    SizeMismatch { declared: u64, actual: u64 },

    #[error("Upload handle is closed")]
    HandleClosed,

    #[error("Fragment group size must be greater than zero")]
    InvalidFragmentSize,
}

impl UploadError {
    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RemoteRejected { status, .. } | Self::PreloadFailed { status, .. } => {
                Some(*status)
            }
            Self::HttpError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Short label used for error metrics
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::IoError(_) => "io",
            Self::HttpError(_) => "http",
            Self::RemoteRejected { .. } => "remote_rejected",
            Self::PreloadFailed { .. } => "preload_failed",
            Self::InvalidResponse(_) => "invalid_response",
            Self::IncompleteUpload(_) => "incomplete_upload",
            Self::SizeMismatch { .. } => "size_mismatch",
            Self::HandleClosed => "handle_closed",
            Self::InvalidFragmentSize => "invalid_fragment_size",
        }
    }
}

/// Tunables for one upload handle
#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Bytes sent per ranged request; the last request may be shorter
    pub fragment_group_size: u64,
    /// Largest single write into the staging file during append preload
    pub preload_chunk_size: usize,
    pub preload_failure: PreloadFailure,
    /// Directory for the scratch file, system temp dir when `None`
    pub staging_dir: Option<PathBuf>,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self::from(&UploadConfig::default())
    }
}

impl From<&UploadConfig> for UploadOptions {
    fn from(config: &UploadConfig) -> Self {
        Self {
            fragment_group_size: config.fragment_group_size,
            preload_chunk_size: config.preload_chunk_size,
            preload_failure: config.preload_failure,
            staging_dir: config.staging_dir.clone(),
        }
    }
}
