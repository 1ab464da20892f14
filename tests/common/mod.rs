//! Common Test Infrastructure
//!
//! Provides shared utilities for the integration tests:
//! - Graph client construction against a wiremock server
//! - A stateful fake drive item (content read, upload session, fragment PUTs)
//! - Test data generation

#![allow(dead_code)]

use drive_uploadr::graph::{
    AccessToken, ContentFetch, DriveApi, GraphClient, GraphClientConfig, UploadTarget,
};
use futures::StreamExt;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Drive root every test target lives under
pub const ROOT: &str = "/me/drive/root";

/// Bearer token the client is configured with
pub const TOKEN: &str = "test-token";

/// Path prefix the fake API is served under
pub const API_PREFIX: &str = "/v1.0";

/// Path of the upload session URL handed out by the fake
pub const SESSION_PATH: &str = "/upload/session-1";

pub fn api_base(server: &MockServer) -> String {
    format!("{}{}", server.uri(), API_PREFIX)
}

pub fn client_for(server: &MockServer) -> Arc<GraphClient> {
    Arc::new(
        GraphClient::new(GraphClientConfig {
            api_base: api_base(server),
            token: Some(AccessToken::new(TOKEN)),
            timeout: Some(Duration::from_secs(10)),
        })
        .expect("client builds"),
    )
}

pub fn target(name: &str) -> UploadTarget {
    UploadTarget::new(ROOT, name)
}

/// Full request path of `suffix` on the item `name`
pub fn item_path(name: &str, suffix: &str) -> String {
    format!("{}{}:/{}:{}", API_PREFIX, ROOT, name, suffix)
}

/// Deterministic test payload
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

pub fn drive_item_json(name: &str, size: usize) -> serde_json::Value {
    json!({
        "id": format!("item-{}", name),
        "name": name,
        "size": size,
        "createdDateTime": "2024-05-01T10:00:00Z",
        "lastModifiedDateTime": "2024-05-01T10:00:01Z",
        "file": {"mimeType": "application/octet-stream"}
    })
}

/// Remote state of one fake drive item
#[derive(Clone, Default)]
pub struct RemoteFile {
    committed: Arc<Mutex<Option<Vec<u8>>>>,
    staged: Arc<Mutex<Vec<u8>>>,
}

impl RemoteFile {
    pub fn content(&self) -> Option<Vec<u8>> {
        self.committed.lock().unwrap().clone()
    }
}

struct ContentResponder(RemoteFile);

impl Respond for ContentResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        match self.0.content() {
            Some(content) => ResponseTemplate::new(200).set_body_bytes(content),
            None => ResponseTemplate::new(404)
                .set_body_json(json!({"error": {"code": "itemNotFound"}})),
        }
    }
}

struct CreateSessionResponder {
    file: RemoteFile,
    upload_url: String,
}

impl Respond for CreateSessionResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        self.file.staged.lock().unwrap().clear();
        ResponseTemplate::new(200).set_body_json(json!({
            "uploadUrl": self.upload_url,
            "expirationDateTime": "2030-01-01T00:00:00Z",
            "nextExpectedRanges": ["0-"]
        }))
    }
}

struct FragmentResponder {
    file: RemoteFile,
    name: String,
}

/// Parse `bytes a-b/total` or `bytes */total` into (start, total)
fn parse_content_range(value: &str) -> Option<(usize, usize)> {
    let rest = value.strip_prefix("bytes ")?;
    let (range, total) = rest.split_once('/')?;
    let total = total.parse().ok()?;
    if range == "*" {
        return Some((0, total));
    }
    let (start, _end) = range.split_once('-')?;
    Some((start.parse().ok()?, total))
}

impl Respond for FragmentResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let range = request
            .headers
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range);
        let Some((start, total)) = range else {
            return ResponseTemplate::new(400);
        };

        let mut staged = self.file.staged.lock().unwrap();
        if start != staged.len() {
            return ResponseTemplate::new(416);
        }
        staged.extend_from_slice(&request.body);

        if staged.len() == total {
            *self.file.committed.lock().unwrap() = Some(staged.clone());
            ResponseTemplate::new(201).set_body_json(drive_item_json(&self.name, total))
        } else {
            ResponseTemplate::new(202)
                .set_body_json(json!({ "nextExpectedRanges": [format!("{}-", staged.len())] }))
        }
    }
}

/// Mount a fake item `name` that behaves like the remote store
///
/// Serves content reads, upload session creation and fragment uploads.
pub async fn mount_drive(server: &MockServer, name: &str, initial: Option<Vec<u8>>) -> RemoteFile {
    let file = RemoteFile::default();
    *file.committed.lock().unwrap() = initial;

    Mock::given(method("GET"))
        .and(path(item_path(name, "/content")))
        .respond_with(ContentResponder(file.clone()))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path(item_path(name, "/createUploadSession")))
        .respond_with(CreateSessionResponder {
            file: file.clone(),
            upload_url: format!("{}{}", server.uri(), SESSION_PATH),
        })
        .mount(server)
        .await;

    Mock::given(method("PUT"))
        .and(path(SESSION_PATH))
        .respond_with(FragmentResponder {
            file: file.clone(),
            name: name.to_string(),
        })
        .mount(server)
        .await;

    file
}

/// Fragment PUTs the server received, in arrival order
pub async fn fragment_requests(server: &MockServer) -> Vec<Request> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.method.as_str() == "PUT" && r.url.path() == SESSION_PATH)
        .collect()
}

/// Download the current content of `target` through the client
pub async fn download(client: &GraphClient, target: &UploadTarget) -> Option<Vec<u8>> {
    match client.fetch_content(target).await.expect("content read") {
        ContentFetch::Found(mut stream) => {
            let mut out = Vec::new();
            while let Some(chunk) = stream.next().await {
                out.extend_from_slice(&chunk.expect("content chunk"));
            }
            Some(out)
        }
        ContentFetch::NotFound => None,
        ContentFetch::Rejected { status, .. } => panic!("content read rejected: {}", status),
    }
}

pub fn header_value(request: &Request, name: &str) -> Option<String> {
    request
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}
