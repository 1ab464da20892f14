//! Append preload
//!
//! Seeds a staging buffer with the remote item's current content so that
//! caller writes extend the file instead of replacing it.

use super::{StagingBuffer, UploadError};
use crate::config::PreloadFailure;
use crate::graph::{ContentFetch, DriveApi, UploadTarget};
use crate::metrics;
use futures::StreamExt;

/// What the preload found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreloadOutcome {
    /// Existing content was copied into the buffer
    Loaded { bytes: u64 },
    /// The item does not exist yet; the buffer stays empty
    NotFound,
    /// The read was rejected and `PreloadFailure::Ignore` let it pass
    Skipped { status: u16 },
}

impl PreloadOutcome {
    fn label(&self) -> &'static str {
        match self {
            Self::Loaded { .. } => "loaded",
            Self::NotFound => "not_found",
            Self::Skipped { .. } => "skipped",
        }
    }
}

/// Copies remote content into a [`StagingBuffer`] without holding it in memory
pub struct AppendPreloader<'a, A: DriveApi + ?Sized> {
    api: &'a A,
    chunk_size: usize,
    on_failure: PreloadFailure,
}

impl<'a, A: DriveApi + ?Sized> AppendPreloader<'a, A> {
    pub fn new(api: &'a A, chunk_size: usize, on_failure: PreloadFailure) -> Self {
        Self {
            api,
            chunk_size: chunk_size.max(1),
            on_failure,
        }
    }

    /// Stream the content of `target` into `staging`
    #[tracing::instrument(
        name = "upload.preload",
        skip(self, staging),
        fields(
            drive.target = %target,
            preload.outcome = tracing::field::Empty,
            preload.bytes = tracing::field::Empty
        ),
        err
    )]
    pub async fn preload(
        &self,
        target: &UploadTarget,
        staging: &mut StagingBuffer,
    ) -> Result<PreloadOutcome, UploadError> {
        let outcome = match self.load(target, staging).await {
            Ok(outcome) => outcome,
            Err(e) => {
                metrics::record_error(e.kind());
                return Err(e);
            }
        };

        let span = tracing::Span::current();
        span.record("preload.outcome", outcome.label());
        if let PreloadOutcome::Loaded { bytes } = outcome {
            span.record("preload.bytes", bytes);
        }
        metrics::record_preload(outcome.label());

        Ok(outcome)
    }

    async fn load(
        &self,
        target: &UploadTarget,
        staging: &mut StagingBuffer,
    ) -> Result<PreloadOutcome, UploadError> {
        match self.api.fetch_content(target).await? {
            ContentFetch::NotFound => Ok(PreloadOutcome::NotFound),
            ContentFetch::Rejected { status, body } => match self.on_failure {
                PreloadFailure::Fail => Err(UploadError::PreloadFailed { status, body }),
                PreloadFailure::Ignore => {
                    tracing::warn!(
                        status = status,
                        "Append preload rejected; continuing with empty content"
                    );
                    Ok(PreloadOutcome::Skipped { status })
                }
            },
            ContentFetch::Found(mut stream) => {
                let mut copied = 0u64;
                while let Some(chunk) = stream.next().await {
                    let chunk = chunk?;
                    for piece in chunk.chunks(self.chunk_size) {
                        staging.write(piece).await?;
                    }
                    copied += chunk.len() as u64;
                }
                Ok(PreloadOutcome::Loaded { bytes: copied })
            }
        }
    }
}
