//! Upload session client
//!
//! Transfers a staging buffer to the remote store through one upload session.
//!
//! # Protocol
//!
//! 1. `total_size` is the staged size, fixed for the session
//! 2. POST `createUploadSession` with `{"fileSize": total_size}`
//! 3. PUT each fragment group to the session URL, strictly in order, one at a time
//! 4. The response to the last range carries the committed item
//!
//! A rejected request aborts the transfer immediately. The session is
//! abandoned as-is; the remote side expires it on its own schedule.

use super::{StagingBuffer, UploadError};
use crate::graph::{DriveApi, DriveItem, FragmentResponse, UploadTarget};
use crate::metrics;
use std::time::Instant;

/// Drives the fragment-upload state machine for one file
pub struct UploadSessionClient<'a, A: DriveApi + ?Sized> {
    api: &'a A,
    group_size: u64,
}

impl<'a, A: DriveApi + ?Sized> UploadSessionClient<'a, A> {
    pub fn new(api: &'a A, group_size: u64) -> Self {
        Self { api, group_size }
    }

    /// Upload everything currently in `staging` to `target`
    #[tracing::instrument(
        name = "upload.session",
        skip(self, staging),
        fields(
            drive.target = %target,
            upload.total_size = staging.size(),
            upload.fragments = tracing::field::Empty,
            drive.item_id = tracing::field::Empty
        ),
        err
    )]
    pub async fn upload(
        &self,
        target: &UploadTarget,
        staging: &mut StagingBuffer,
    ) -> Result<DriveItem, UploadError> {
        let start_time = Instant::now();
        let result = self.transfer(target, staging).await;
        let duration = start_time.elapsed();
        metrics::record_upload_duration(duration.as_secs_f64());

        match &result {
            Ok(item) => {
                metrics::record_upload_success(staging.size());
                tracing::Span::current().record("drive.item_id", item.id.as_str());
                tracing::info!(
                    item_id = %item.id,
                    bytes_written = staging.size(),
                    duration_ms = duration.as_millis(),
                    "Upload session completed"
                );
            }
            Err(e) => {
                metrics::record_upload_failure();
                metrics::record_error(e.kind());
                tracing::error!(
                    error = %e,
                    duration_ms = duration.as_millis(),
                    "Upload session failed"
                );
            }
        }

        result
    }

    async fn transfer(
        &self,
        target: &UploadTarget,
        staging: &mut StagingBuffer,
    ) -> Result<DriveItem, UploadError> {
        let total_size = staging.size();
        // Flushes and validates the staged size before anything goes on the wire.
        let mut reader = staging.fragments(self.group_size).await?;
        let expected = reader.request_count();
        tracing::Span::current().record("upload.fragments", expected);

        let session = self.api.create_upload_session(target, total_size).await?;

        let mut final_item = None;
        while let Some((fragment, body)) = reader.next_fragment().await? {
            let response = self.api.upload_fragment(&session, &fragment, body).await?;

            match response {
                FragmentResponse::Completed(item) if fragment.is_last() => {
                    metrics::record_fragment(fragment.length);
                    final_item = Some(item);
                }
                FragmentResponse::Completed(_) => {
                    return Err(UploadError::IncompleteUpload(format!(
                        "session completed before final range ({})",
                        fragment.content_range()
                    )));
                }
                FragmentResponse::Accepted { .. } if fragment.is_last() => {
                    return Err(UploadError::IncompleteUpload(
                        "final range acknowledged without a committed item".into(),
                    ));
                }
                FragmentResponse::Accepted {
                    next_expected_ranges,
                } => {
                    metrics::record_fragment(fragment.length);
                    tracing::debug!(
                        range = %fragment.content_range(),
                        next_expected = ?next_expected_ranges,
                        "Fragment accepted"
                    );
                }
            }
        }

        let item = final_item.ok_or_else(|| {
            UploadError::IncompleteUpload("no fragment requests were issued".into())
        })?;

        if item.size != total_size {
            tracing::warn!(
                declared = total_size,
                reported = item.size,
                "Remote item size differs from uploaded size"
            );
        }
        metrics::record_fragments_per_upload(expected);

        Ok(item)
    }
}
