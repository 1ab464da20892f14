//! Local staging buffer
//!
//! Accumulates the bytes of one logical file in a uniquely named scratch file
//! before they are sent to the remote store.
//!
//! # Flow
//!
//! 1. `create` allocates the scratch file (append-only writes)
//! 2. Writes (caller data or preloaded remote content) extend it
//! 3. `fragments` re-reads it from offset 0 in bounded groups
//! 4. `close` (or `Drop` on any other exit path) removes it
//!
//! # Example
//!
//! ```no_run
//! use drive_uploadr::upload::StagingBuffer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut staging = StagingBuffer::create(None).await?;
//! staging.write(b"Hello, World!").await?;
//!
//! let mut fragments = staging.fragments(5).await?;
//! while let Some((fragment, bytes)) = fragments.next_fragment().await? {
//!     println!("{} -> {} bytes", fragment.content_range(), bytes.len());
//! }
//!
//! staging.close().await?;
//! # Ok(())
//! # }
//! ```

use super::fragment::{Fragment, FragmentPlan};
use super::UploadError;
use bytes::{Bytes, BytesMut};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

/// Scratch file owned by exactly one upload handle
///
/// Removed on `close`, or on drop if `close` was never reached.
#[derive(Debug)]
pub struct StagingBuffer {
    path: PathBuf,
    file: File,
    size: u64,
}

impl StagingBuffer {
    /// Allocate a new, empty scratch file
    ///
    /// Uses `dir` when given, otherwise the system temp directory.
    pub async fn create(dir: Option<&Path>) -> Result<Self, UploadError> {
        let dir = dir.map(Path::to_path_buf).unwrap_or_else(std::env::temp_dir);
        let path = dir.join(format!("drive-uploadr-{}.part", uuid::Uuid::new_v4()));

        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create_new(true)
            .open(&path)
            .await?;

        tracing::debug!(path = %path.display(), "Staging file created");

        Ok(Self {
            path,
            file,
            size: 0,
        })
    }

    /// Path of the scratch file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes written so far
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Append `data` at the current end
    pub async fn write(&mut self, data: &[u8]) -> Result<(), UploadError> {
        self.file.write_all(data).await?;
        self.size += data.len() as u64;
        Ok(())
    }

    /// Flush buffered writes and check the on-disk length matches what was written
    pub async fn flush(&mut self) -> Result<(), UploadError> {
        self.file.flush().await?;
        self.file.sync_data().await?;

        let actual = self.file.metadata().await?.len();
        if actual != self.size {
            return Err(UploadError::SizeMismatch {
                declared: self.size,
                actual,
            });
        }
        Ok(())
    }

    /// Re-read the whole buffer from offset 0 in groups of at most `group_size` bytes
    ///
    /// Each call starts a fresh pass over the data.
    pub async fn fragments(&mut self, group_size: u64) -> Result<FragmentReader<'_>, UploadError> {
        let plan = FragmentPlan::new(self.size, group_size)?;
        self.flush().await?;
        self.file.seek(SeekFrom::Start(0)).await?;
        Ok(FragmentReader {
            file: &mut self.file,
            plan,
        })
    }

    /// Remove the scratch file
    pub async fn close(mut self) -> Result<(), UploadError> {
        let path = std::mem::take(&mut self.path);
        // `self` drops here with an empty path, so Drop does not remove twice.
        drop(self);
        tokio::fs::remove_file(&path).await?;
        tracing::debug!(path = %path.display(), "Staging file removed");
        Ok(())
    }
}

impl Drop for StagingBuffer {
    fn drop(&mut self) {
        if self.path.as_os_str().is_empty() {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to clean up staging file"
            );
        }
    }
}

/// One sequential pass over a [`StagingBuffer`]
pub struct FragmentReader<'a> {
    file: &'a mut File,
    plan: FragmentPlan,
}

impl FragmentReader<'_> {
    /// Number of fragments this pass yields in total
    pub fn request_count(&self) -> u64 {
        self.plan.request_count()
    }

    /// Read the next fragment's bytes, `None` once the buffer is covered
    pub async fn next_fragment(&mut self) -> Result<Option<(Fragment, Bytes)>, UploadError> {
        let Some(fragment) = self.plan.next() else {
            return Ok(None);
        };

        let mut buf = BytesMut::zeroed(fragment.length as usize);
        self.file.read_exact(&mut buf).await?;
        Ok(Some((fragment, buf.freeze())))
    }
}
