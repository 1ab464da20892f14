//! Path-level facade over the upload engine
//!
//! [`DriveFs`] maps slash-separated paths under a configured root item to
//! [`UploadTarget`]s. Writes go through [`UploadHandle`]s; reads, metadata
//! lookups and file removal go straight to the [`DriveApi`]. It is the only
//! place that knows about paths; the engine itself only sees targets.

use crate::config::Config;
use crate::graph::{
    ContentFetch, ContentStream, CredentialsError, CredentialsProvider, DriveApi, DriveItem,
    GraphClient, GraphClientConfig, UploadTarget,
};
use chrono::{DateTime, Utc};
use crate::upload::{OpenMode, UploadError, UploadHandle, UploadOptions};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Filesystem errors
#[derive(Error, Debug)]
pub enum FsError {
    #[error("Filesystem is read-only")]
    ReadOnly,

    #[error("Expected a file path, got '{0}'")]
    FileExpected(String),

    #[error("'{0}' already exists")]
    FileExists(String),

    #[error("'{0}' not found")]
    NotFound(String),

    #[error("Credentials error: {0}")]
    Credentials(#[from] CredentialsError),

    #[error(transparent)]
    Upload(#[from] UploadError),
}

/// How an existing file is treated when opened for writing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Create or replace
    Create,
    /// Create or extend
    Append,
    /// Create, failing if the file already exists
    Exclusive,
}

/// Kind of resource behind a path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    File,
    Directory,
    Unknown,
}

/// Metadata of one drive item
#[derive(Debug, Clone, PartialEq)]
pub struct FileInfo {
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    pub resource_type: ResourceType,
}

impl From<DriveItem> for FileInfo {
    fn from(item: DriveItem) -> Self {
        let resource_type = if item.is_file() {
            ResourceType::File
        } else if item.is_dir() {
            ResourceType::Directory
        } else {
            ResourceType::Unknown
        };

        Self {
            is_dir: item.is_dir(),
            name: item.name,
            size: item.size,
            created: item.created_date_time,
            modified: item.last_modified_date_time,
            resource_type,
        }
    }
}

/// Strip leading `/` and `./` segments from a path
pub fn clean_path(path: &str) -> &str {
    let mut path = path;
    loop {
        if let Some(rest) = path.strip_prefix('/') {
            path = rest;
        } else if let Some(rest) = path.strip_prefix("./") {
            path = rest;
        } else if path == "." {
            return "";
        } else {
            return path;
        }
    }
}

/// Drive rooted at one remote item
pub struct DriveFs<A: DriveApi + ?Sized> {
    api: Arc<A>,
    root: String,
    writeable: bool,
    options: UploadOptions,
}

impl DriveFs<GraphClient> {
    /// Build a Graph-backed drive from configuration
    pub fn from_config(config: &Config) -> Result<Self, FsError> {
        let token = CredentialsProvider::from_config(&config.drive)?;
        let client = GraphClient::new(GraphClientConfig {
            api_base: config.drive.api_base.clone(),
            token: Some(token),
            timeout: Some(Duration::from_secs(config.drive.timeout_seconds)),
        })?;

        Ok(Self::new(
            Arc::new(client),
            config.drive.root.clone(),
            config.drive.writeable,
            UploadOptions::from(&config.upload),
        ))
    }
}

impl<A: DriveApi + ?Sized> DriveFs<A> {
    pub fn new(api: Arc<A>, root: impl Into<String>, writeable: bool, options: UploadOptions) -> Self {
        Self {
            api,
            root: root.into(),
            writeable,
            options,
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn is_writeable(&self) -> bool {
        self.writeable
    }

    /// Resolve `path` to a target under the root item
    pub fn target_for(&self, path: &str) -> Result<UploadTarget, FsError> {
        let cleaned = clean_path(path);
        if cleaned.is_empty() || cleaned.ends_with('/') {
            return Err(FsError::FileExpected(path.to_string()));
        }
        Ok(UploadTarget::new(self.root.clone(), cleaned))
    }

    /// Open `path` for writing
    #[tracing::instrument(name = "fs.open_write", skip(self), err)]
    pub async fn open_write(
        &self,
        path: &str,
        mode: WriteMode,
    ) -> Result<UploadHandle<A>, FsError> {
        if !self.writeable {
            return Err(FsError::ReadOnly);
        }
        let target = self.target_for(path)?;

        if mode == WriteMode::Exclusive && self.api.stat(&target).await?.is_some() {
            return Err(FsError::FileExists(target.name().to_string()));
        }

        let open_mode = match mode {
            WriteMode::Append => OpenMode::Append,
            WriteMode::Create | WriteMode::Exclusive => OpenMode::Write,
        };

        let handle =
            UploadHandle::open(self.api.clone(), target, open_mode, self.options.clone()).await?;
        Ok(handle)
    }

    /// Open `path` for reading
    ///
    /// The returned stream yields the item's content in order.
    #[tracing::instrument(name = "fs.open_read", skip(self), err)]
    pub async fn open_read(&self, path: &str) -> Result<ContentStream, FsError> {
        let target = self.target_for(path)?;

        match self.api.fetch_content(&target).await? {
            ContentFetch::Found(stream) => Ok(stream),
            ContentFetch::NotFound => Err(FsError::NotFound(target.name().to_string())),
            ContentFetch::Rejected { status, body } => Err(UploadError::RemoteRejected {
                operation: "fetch_content",
                status,
                body,
            }
            .into()),
        }
    }

    /// Metadata of the item at `path`
    #[tracing::instrument(name = "fs.getinfo", skip(self), err)]
    pub async fn getinfo(&self, path: &str) -> Result<FileInfo, FsError> {
        let target = self.target_for(path)?;
        self.api
            .stat(&target)
            .await?
            .map(FileInfo::from)
            .ok_or_else(|| FsError::NotFound(target.name().to_string()))
    }

    /// Delete the file at `path`; folders are refused
    #[tracing::instrument(name = "fs.remove", skip(self), err)]
    pub async fn remove(&self, path: &str) -> Result<(), FsError> {
        if !self.writeable {
            return Err(FsError::ReadOnly);
        }
        let target = self.target_for(path)?;

        let item = self
            .api
            .stat(&target)
            .await?
            .ok_or_else(|| FsError::NotFound(target.name().to_string()))?;
        if !item.is_file() {
            return Err(FsError::FileExpected(target.name().to_string()));
        }

        self.api.delete(&target).await?;
        tracing::info!(item_id = %item.id, "Removed drive item");
        Ok(())
    }
}
