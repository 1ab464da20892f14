//! Drive API module
//!
//! The remote store as the upload engine sees it: a [`DriveApi`] trait with a
//! reqwest-backed [`GraphClient`] implementation, plus the wire types shared
//! between them.
//!
//! # Requests
//!
//! | Operation | Method | Target | Auth |
//! |-----------|--------|--------|------|
//! | `fetch_content` | GET | `{parent}:/{name}:/content` | bearer |
//! | `create_upload_session` | POST | `{parent}:/{name}:/createUploadSession` | bearer |
//! | `upload_fragment` | PUT | `<uploadUrl>` | none |
//! | `stat` | GET | `{parent}:/{name}:` | bearer |

use crate::upload::{Fragment, UploadError};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::{Deserialize, Serialize};

mod client;
pub mod credentials;

pub use client::{GraphClient, GraphClientConfig};
pub use credentials::{AccessToken, CredentialsError, CredentialsProvider};

/// Characters escaped inside a name segment. `/` is kept so nested paths
/// resolve under the parent reference.
const NAME_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b':')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Parent container reference plus a file name, fixed for one upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    parent_ref: String,
    name: String,
}

impl UploadTarget {
    /// Create a new target
    ///
    /// `parent_ref` is an API reference such as `/me/drive/root` or
    /// `/drives/{drive-id}/items/{item-id}`.
    pub fn new(parent_ref: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            parent_ref: parent_ref.into(),
            name: name.into(),
        }
    }

    pub fn parent_ref(&self) -> &str {
        &self.parent_ref
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path addressing the item itself: `{parent}:/{name}:`
    pub fn item_path(&self) -> String {
        format!(
            "{}:/{}:",
            self.parent_ref.trim_end_matches('/'),
            utf8_percent_encode(&self.name, NAME_SEGMENT)
        )
    }

    /// Path of the item's raw content
    pub fn content_path(&self) -> String {
        format!("{}/content", self.item_path())
    }

    /// Path that issues a new upload session for the item
    pub fn session_path(&self) -> String {
        format!("{}/createUploadSession", self.item_path())
    }
}

impl std::fmt::Display for UploadTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:/{}", self.parent_ref, self.name)
    }
}

/// Server-issued upload session, valid for exactly one total size
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSession {
    /// Authorization-bearing URL that fragment requests target directly
    pub upload_url: String,
    pub total_size: u64,
    pub expiration: Option<DateTime<Utc>>,
}

/// The remote store's descriptor of a file or folder
///
/// Returned as the final resource of a completed upload, and by [`DriveApi::stat`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_date_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_date_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<serde_json::Value>,
}

impl DriveItem {
    pub fn is_file(&self) -> bool {
        self.file.is_some()
    }

    pub fn is_dir(&self) -> bool {
        self.folder.is_some()
    }
}

/// Body chunks of a streamed content read
pub type ContentStream = BoxStream<'static, Result<Bytes, UploadError>>;

/// Outcome of reading an item's current content
pub enum ContentFetch {
    /// The item exists; its bytes arrive in order on the stream
    Found(ContentStream),
    /// The item does not exist remotely
    NotFound,
    /// Any other non-success response
    Rejected { status: u16, body: String },
}

impl std::fmt::Debug for ContentFetch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Found(_) => f.write_str("Found(..)"),
            Self::NotFound => f.write_str("NotFound"),
            Self::Rejected { status, .. } => write!(f, "Rejected({})", status),
        }
    }
}

/// Response to one fragment upload
#[derive(Debug, Clone, PartialEq)]
pub enum FragmentResponse {
    /// Intermediate acknowledgement
    Accepted { next_expected_ranges: Vec<String> },
    /// The session is complete and the item has been committed
    Completed(DriveItem),
}

/// Remote store operations the upload engine depends on
///
/// Implementations must not attach caller credentials to `upload_fragment`:
/// the session URL is itself authorization-bearing.
#[async_trait]
pub trait DriveApi: Send + Sync {
    /// Stream the current content of `target`
    async fn fetch_content(&self, target: &UploadTarget) -> Result<ContentFetch, UploadError>;

    /// Negotiate an upload session for `total_size` bytes
    async fn create_upload_session(
        &self,
        target: &UploadTarget,
        total_size: u64,
    ) -> Result<UploadSession, UploadError>;

    /// Upload the bytes of one fragment group
    async fn upload_fragment(
        &self,
        session: &UploadSession,
        fragment: &Fragment,
        body: Bytes,
    ) -> Result<FragmentResponse, UploadError>;

    /// Look up the item at `target`, `None` when it does not exist
    async fn stat(&self, target: &UploadTarget) -> Result<Option<DriveItem>, UploadError>;

    /// Delete the item at `target`
    async fn delete(&self, target: &UploadTarget) -> Result<(), UploadError>;
}
