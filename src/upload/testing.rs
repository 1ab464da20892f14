//! In-memory `DriveApi` used by the engine's unit tests

use crate::graph::{
    ContentFetch, DriveApi, DriveItem, FragmentResponse, UploadSession, UploadTarget,
};
use crate::upload::{Fragment, UploadError};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Fetch,
    CreateSession(u64),
    Fragment(Fragment),
    Stat,
    Delete,
}

#[derive(Default)]
pub(crate) struct FakeDrive {
    /// Remote content; `None` means the item does not exist
    pub content: Mutex<Option<Vec<u8>>>,
    /// Status returned by content reads instead of the content
    pub fetch_status: Option<u16>,
    /// Zero-based index of the fragment request to reject
    pub fail_fragment_at: Option<usize>,
    /// Bytes per chunk of a content read stream
    pub stream_chunk: Option<usize>,
    /// Number of chunks a content read yields before the stream breaks
    pub stream_fail_after: Option<usize>,
    /// Answer the first fragment with a committed item regardless of its range
    pub complete_early: bool,
    /// The item is a folder rather than a file
    pub folder: bool,
    /// Delay before each fragment request is answered
    pub fragment_delay: Option<Duration>,
    pub calls: Mutex<Vec<Call>>,
    pub(crate) received: Mutex<Vec<u8>>,
}

impl FakeDrive {
    pub fn with_content(content: &[u8]) -> Self {
        Self {
            content: Mutex::new(Some(content.to_vec())),
            ..Default::default()
        }
    }

    /// Content reads answer `status` instead of the content
    pub fn rejecting_fetch(status: u16) -> Self {
        Self {
            fetch_status: Some(status),
            ..Default::default()
        }
    }

    /// The fragment request at zero-based `index` is rejected with 500
    pub fn failing_fragment(index: usize) -> Self {
        Self {
            fail_fragment_at: Some(index),
            ..Default::default()
        }
    }

    /// Content reads break with an I/O error after `chunks` chunks
    pub fn breaking_stream(content: &[u8], chunks: usize) -> Self {
        Self {
            stream_fail_after: Some(chunks),
            ..Self::with_content(content)
        }
    }

    /// The first fragment is answered with a committed item
    pub fn completing_early() -> Self {
        Self {
            complete_early: true,
            ..Default::default()
        }
    }

    /// Every fragment request stalls for `delay` before it is answered
    pub fn stalling_fragments(delay: Duration) -> Self {
        Self {
            fragment_delay: Some(delay),
            ..Default::default()
        }
    }

    /// An existing folder item
    pub fn folder() -> Self {
        Self {
            folder: true,
            ..Self::with_content(b"")
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fragment_calls(&self) -> Vec<Fragment> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Fragment(f) => Some(f),
                _ => None,
            })
            .collect()
    }

    pub fn remote_content(&self) -> Option<Vec<u8>> {
        self.content.lock().unwrap().clone()
    }
}

#[async_trait]
impl DriveApi for FakeDrive {
    async fn fetch_content(&self, _target: &UploadTarget) -> Result<ContentFetch, UploadError> {
        self.calls.lock().unwrap().push(Call::Fetch);

        if let Some(status) = self.fetch_status {
            return Ok(ContentFetch::Rejected {
                status,
                body: "unavailable".into(),
            });
        }

        match self.remote_content() {
            None => Ok(ContentFetch::NotFound),
            Some(content) => {
                let size = self.stream_chunk.unwrap_or(3).max(1);
                let mut chunks: Vec<Result<Bytes, UploadError>> = content
                    .chunks(size)
                    .map(|c| Ok(Bytes::copy_from_slice(c)))
                    .collect();
                if let Some(after) = self.stream_fail_after {
                    chunks.truncate(after);
                    chunks.push(Err(UploadError::IoError(std::io::Error::new(
                        std::io::ErrorKind::ConnectionReset,
                        "stream reset",
                    ))));
                }
                Ok(ContentFetch::Found(futures::stream::iter(chunks).boxed()))
            }
        }
    }

    async fn create_upload_session(
        &self,
        target: &UploadTarget,
        total_size: u64,
    ) -> Result<UploadSession, UploadError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::CreateSession(total_size));
        self.received.lock().unwrap().clear();

        Ok(UploadSession {
            upload_url: format!("fake://session/{}", target.name()),
            total_size,
            expiration: None,
        })
    }

    async fn upload_fragment(
        &self,
        session: &UploadSession,
        fragment: &Fragment,
        body: Bytes,
    ) -> Result<FragmentResponse, UploadError> {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(Call::Fragment(*fragment));
            calls.iter().filter(|c| matches!(c, Call::Fragment(_))).count() - 1
        };

        if let Some(delay) = self.fragment_delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_fragment_at == Some(index) {
            return Err(UploadError::RemoteRejected {
                operation: "upload_fragment",
                status: 500,
                body: "boom".into(),
            });
        }

        assert_eq!(body.len() as u64, fragment.length);
        let mut received = self.received.lock().unwrap();
        assert_eq!(received.len() as u64, fragment.offset);
        received.extend_from_slice(&body);

        if !fragment.is_last() && !self.complete_early {
            return Ok(FragmentResponse::Accepted {
                next_expected_ranges: vec![format!("{}-", fragment.end())],
            });
        }

        *self.content.lock().unwrap() = Some(received.clone());
        Ok(FragmentResponse::Completed(DriveItem {
            id: "item-1".into(),
            name: session
                .upload_url
                .rsplit('/')
                .next()
                .unwrap_or_default()
                .to_string(),
            size: session.total_size,
            created_date_time: None,
            last_modified_date_time: None,
            file: Some(serde_json::json!({})),
            folder: None,
        }))
    }

    async fn stat(&self, target: &UploadTarget) -> Result<Option<DriveItem>, UploadError> {
        self.calls.lock().unwrap().push(Call::Stat);
        let facet = Some(serde_json::json!({}));
        Ok(self.remote_content().map(|c| DriveItem {
            id: "item-1".into(),
            name: target.name().to_string(),
            size: c.len() as u64,
            created_date_time: None,
            last_modified_date_time: None,
            file: if self.folder { None } else { facet.clone() },
            folder: if self.folder { facet.clone() } else { None },
        }))
    }

    async fn delete(&self, _target: &UploadTarget) -> Result<(), UploadError> {
        self.calls.lock().unwrap().push(Call::Delete);
        *self.content.lock().unwrap() = None;
        Ok(())
    }
}
