//! reqwest implementation of [`DriveApi`]

use super::{
    AccessToken, ContentFetch, DriveApi, DriveItem, FragmentResponse, UploadSession, UploadTarget,
};
use crate::upload::{Fragment, UploadError};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{StreamExt, TryStreamExt};
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;

/// Graph client configuration
#[derive(Debug, Clone)]
pub struct GraphClientConfig {
    pub api_base: String,
    pub token: Option<AccessToken>,
    pub timeout: Option<Duration>,
}

/// Drive API client over HTTP
pub struct GraphClient {
    config: GraphClientConfig,
    http_client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionResponse {
    upload_url: Option<String>,
    expiration_date_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AcceptedResponse {
    #[serde(default)]
    next_expected_ranges: Vec<String>,
}

impl GraphClient {
    /// Create a new Graph client
    pub fn new(config: GraphClientConfig) -> Result<Self, UploadError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder.build()?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// Get the API base URL
    pub fn api_base(&self) -> &str {
        &self.config.api_base
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base.trim_end_matches('/'), path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.token {
            Some(token) => request.bearer_auth(token.secret()),
            None => request,
        }
    }
}

/// Turn a non-success response into a `RemoteRejected` error
async fn rejected(operation: &'static str, response: Response) -> UploadError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    UploadError::RemoteRejected {
        operation,
        status,
        body,
    }
}

#[async_trait]
impl DriveApi for GraphClient {
    #[tracing::instrument(
        name = "graph.fetch_content",
        skip(self),
        fields(
            drive.target = %target,
            http.method = "GET",
            http.status_code = tracing::field::Empty
        ),
        err
    )]
    async fn fetch_content(&self, target: &UploadTarget) -> Result<ContentFetch, UploadError> {
        let response = self
            .authorized(self.http_client.get(self.url(&target.content_path())))
            .send()
            .await?;

        let status = response.status();
        tracing::Span::current().record("http.status_code", status.as_u16());

        if status == StatusCode::NOT_FOUND {
            return Ok(ContentFetch::NotFound);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Ok(ContentFetch::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let stream = response.bytes_stream().map_err(UploadError::from).boxed();
        Ok(ContentFetch::Found(stream))
    }

    #[tracing::instrument(
        name = "graph.create_upload_session",
        skip(self),
        fields(
            drive.target = %target,
            http.method = "POST",
            upload.total_size = total_size,
            http.status_code = tracing::field::Empty
        ),
        err
    )]
    async fn create_upload_session(
        &self,
        target: &UploadTarget,
        total_size: u64,
    ) -> Result<UploadSession, UploadError> {
        let response = self
            .authorized(self.http_client.post(self.url(&target.session_path())))
            .json(&serde_json::json!({ "fileSize": total_size }))
            .send()
            .await?;

        let status = response.status();
        tracing::Span::current().record("http.status_code", status.as_u16());

        if !status.is_success() {
            return Err(rejected("create_upload_session", response).await);
        }

        let parsed: CreateSessionResponse = response
            .json()
            .await
            .map_err(|e| UploadError::InvalidResponse(format!("upload session: {}", e)))?;

        let upload_url = parsed.upload_url.ok_or_else(|| {
            UploadError::InvalidResponse("upload session response has no uploadUrl".into())
        })?;

        tracing::debug!(expiration = ?parsed.expiration_date_time, "Upload session created");

        Ok(UploadSession {
            upload_url,
            total_size,
            expiration: parsed.expiration_date_time,
        })
    }

    #[tracing::instrument(
        name = "graph.upload_fragment",
        skip(self, session, body),
        fields(
            http.method = "PUT",
            upload.range = %fragment.content_range(),
            upload.bytes = body.len(),
            http.status_code = tracing::field::Empty
        ),
        err
    )]
    async fn upload_fragment(
        &self,
        session: &UploadSession,
        fragment: &Fragment,
        body: Bytes,
    ) -> Result<FragmentResponse, UploadError> {
        // No bearer token here: the session URL carries its own authorization.
        let response = self
            .http_client
            .put(&session.upload_url)
            .header(CONTENT_LENGTH, fragment.length.to_string())
            .header(CONTENT_RANGE, fragment.content_range())
            .body(body)
            .send()
            .await?;

        let status = response.status();
        tracing::Span::current().record("http.status_code", status.as_u16());

        if !status.is_success() {
            return Err(rejected("upload_fragment", response).await);
        }

        if status == StatusCode::OK || status == StatusCode::CREATED {
            let item: DriveItem = response
                .json()
                .await
                .map_err(|e| UploadError::InvalidResponse(format!("completed upload: {}", e)))?;
            return Ok(FragmentResponse::Completed(item));
        }

        // 202 and friends: the body, when present, lists the ranges still missing.
        let text = response.text().await?;
        let accepted: AcceptedResponse = serde_json::from_str(&text).unwrap_or_default();
        Ok(FragmentResponse::Accepted {
            next_expected_ranges: accepted.next_expected_ranges,
        })
    }

    #[tracing::instrument(
        name = "graph.stat",
        skip(self),
        fields(
            drive.target = %target,
            http.method = "GET",
            http.status_code = tracing::field::Empty
        ),
        err
    )]
    async fn stat(&self, target: &UploadTarget) -> Result<Option<DriveItem>, UploadError> {
        let response = self
            .authorized(self.http_client.get(self.url(&target.item_path())))
            .send()
            .await?;

        let status = response.status();
        tracing::Span::current().record("http.status_code", status.as_u16());

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(rejected("stat", response).await);
        }

        let item = response
            .json()
            .await
            .map_err(|e| UploadError::InvalidResponse(format!("item metadata: {}", e)))?;
        Ok(Some(item))
    }

    #[tracing::instrument(
        name = "graph.delete",
        skip(self),
        fields(
            drive.target = %target,
            http.method = "DELETE",
            http.status_code = tracing::field::Empty
        ),
        err
    )]
    async fn delete(&self, target: &UploadTarget) -> Result<(), UploadError> {
        let response = self
            .authorized(self.http_client.delete(self.url(&target.item_path())))
            .send()
            .await?;

        let status = response.status();
        tracing::Span::current().record("http.status_code", status.as_u16());

        if !status.is_success() {
            return Err(rejected("delete", response).await);
        }
        Ok(())
    }
}
