//! Caller-facing upload handle
//!
//! ```text
//! Opened --write--> Writing --close--> Closing --ok--> Closed
//!    |                                    |
//!    +--------------close-----------------+--err--> Failed
//! ```
//!
//! Writes only touch the staging buffer; the network is used at open (append
//! preload) and at close (upload session). A close whose future is dropped
//! before it finishes leaves the handle in `Closing`; the next call to
//! `close` moves it to `Failed`.
//!
//! # Example
//!
//! ```no_run
//! use drive_uploadr::graph::{GraphClient, GraphClientConfig, UploadTarget};
//! use drive_uploadr::upload::{OpenMode, UploadHandle, UploadOptions};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Arc::new(GraphClient::new(GraphClientConfig {
//!     api_base: "https://graph.microsoft.com/v1.0".into(),
//!     token: None,
//!     timeout: None,
//! })?);
//!
//! let target = UploadTarget::new("/me/drive/root", "notes.txt");
//! let mut handle =
//!     UploadHandle::open(client, target, OpenMode::Append, UploadOptions::default()).await?;
//! handle.write(b"one more line\n").await?;
//!
//! if let Some(item) = handle.close().await? {
//!     println!("{} is now {} bytes", item.name, item.size);
//! }
//! # Ok(())
//! # }
//! ```

use super::{
    AppendPreloader, PreloadOutcome, StagingBuffer, UploadError, UploadOptions, UploadSessionClient,
};
use crate::graph::{DriveApi, DriveItem, UploadTarget};
use std::sync::Arc;

/// How the handle treats existing remote content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Replace whatever is there
    Write,
    /// Start from the current remote content
    Append,
}

/// Lifecycle state of an [`UploadHandle`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Opened,
    Writing,
    Closing,
    Closed,
    Failed,
}

/// Write handle for one remote file
pub struct UploadHandle<A: DriveApi + ?Sized> {
    api: Arc<A>,
    target: UploadTarget,
    options: UploadOptions,
    staging: Option<StagingBuffer>,
    state: HandleState,
    preload: Option<PreloadOutcome>,
}

impl<A: DriveApi + ?Sized> UploadHandle<A> {
    /// Open a handle on `target`
    ///
    /// In [`OpenMode::Append`] the current remote content is copied into the
    /// staging buffer before this returns.
    #[tracing::instrument(
        name = "upload.open",
        skip(api, options),
        fields(drive.target = %target),
        err
    )]
    pub async fn open(
        api: Arc<A>,
        target: UploadTarget,
        mode: OpenMode,
        options: UploadOptions,
    ) -> Result<Self, UploadError> {
        let mut staging = StagingBuffer::create(options.staging_dir.as_deref()).await?;

        let preload = match mode {
            OpenMode::Append => {
                let preloader = AppendPreloader::new(
                    api.as_ref(),
                    options.preload_chunk_size,
                    options.preload_failure,
                );
                Some(preloader.preload(&target, &mut staging).await?)
            }
            OpenMode::Write => None,
        };

        Ok(Self {
            api,
            target,
            options,
            staging: Some(staging),
            state: HandleState::Opened,
            preload,
        })
    }

    pub fn target(&self) -> &UploadTarget {
        &self.target
    }

    pub fn state(&self) -> HandleState {
        self.state
    }

    /// True once `close` has run, whether it succeeded or failed
    pub fn is_closed(&self) -> bool {
        matches!(self.state, HandleState::Closed | HandleState::Failed)
    }

    /// Result of the append preload, `None` in write mode
    pub fn preload_outcome(&self) -> Option<PreloadOutcome> {
        self.preload
    }

    /// Bytes staged so far, including preloaded content
    pub fn size(&self) -> u64 {
        self.staging.as_ref().map_or(0, StagingBuffer::size)
    }

    /// Append `data` to the file
    pub async fn write(&mut self, data: &[u8]) -> Result<usize, UploadError> {
        if !matches!(self.state, HandleState::Opened | HandleState::Writing) {
            return Err(UploadError::HandleClosed);
        }
        let staging = self.staging.as_mut().ok_or(UploadError::HandleClosed)?;

        staging.write(data).await?;
        self.state = HandleState::Writing;
        Ok(data.len())
    }

    /// Upload the staged bytes and release the staging buffer
    ///
    /// Returns the committed item on the call that performs the upload and
    /// `Ok(None)` on every later call. The staging buffer is released whether
    /// or not the upload succeeds. `Closed` is only reached when the remote
    /// store returned the committed item.
    #[tracing::instrument(
        name = "upload.close",
        skip(self),
        fields(drive.target = %self.target, upload.bytes = self.size()),
        err
    )]
    pub async fn close(&mut self) -> Result<Option<DriveItem>, UploadError> {
        if self.is_closed() {
            return Ok(None);
        }
        let Some(mut staging) = self.staging.take() else {
            // A previous close was cancelled mid-upload; nothing was committed.
            self.state = HandleState::Failed;
            return Ok(None);
        };
        self.state = HandleState::Closing;

        let client = UploadSessionClient::new(self.api.as_ref(), self.options.fragment_group_size);
        let result = client.upload(&self.target, &mut staging).await;

        if let Err(e) = staging.close().await {
            tracing::warn!(error = %e, "Failed to release staging buffer");
        }

        match result {
            Ok(item) => {
                self.state = HandleState::Closed;
                Ok(Some(item))
            }
            Err(e) => {
                self.state = HandleState::Failed;
                Err(e)
            }
        }
    }
}

impl<A: DriveApi + ?Sized> Drop for UploadHandle<A> {
    fn drop(&mut self) {
        if self.staging.is_some() {
            tracing::warn!(
                target_item = %self.target,
                bytes = self.size(),
                "Upload handle dropped without close; staged bytes discarded"
            );
        }
    }
}
