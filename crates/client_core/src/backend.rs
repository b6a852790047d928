//! Transport seam between the stream consumer and the text generation service.

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{stream::BoxStream, StreamExt, TryStreamExt};
use reqwest::{Client, StatusCode};
use shared::protocol::GenerateExcuseRequest;
use tracing::debug;
use url::Url;

pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Status line plus the unread body of a generation response.
pub struct BackendResponse {
    pub status: StatusCode,
    /// `None` when the response carries no readable body.
    pub body: Option<ByteStream>,
}

impl BackendResponse {
    pub fn new(status: StatusCode, body: Option<ByteStream>) -> Self {
        Self { status, body }
    }
}

#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Issues one generation request. Resolves once the response status is known; the
    /// body is returned unread.
    async fn send(&self, request: &GenerateExcuseRequest) -> Result<BackendResponse>;
}

/// `POST`s the prompt as JSON and hands back the chunked body.
///
/// The client has no request timeout: a stalled server stalls the caller.
pub struct HttpGenerationBackend {
    http: Client,
    endpoint: Url,
}

impl HttpGenerationBackend {
    pub fn new(server_url: &str, endpoint_path: &str) -> Result<Self> {
        let base = Url::parse(server_url)
            .with_context(|| format!("invalid generation server url '{server_url}'"))?;
        let endpoint = base.join(endpoint_path).with_context(|| {
            format!("invalid generation endpoint path '{endpoint_path}' for '{server_url}'")
        })?;
        Ok(Self {
            http: Client::new(),
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl GenerationBackend for HttpGenerationBackend {
    async fn send(&self, request: &GenerateExcuseRequest) -> Result<BackendResponse> {
        let res = self
            .http
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await
            .with_context(|| format!("failed to reach {}", self.endpoint))?;
        let status = res.status();
        debug!(
            endpoint = %self.endpoint,
            status = status.as_u16(),
            content_length = ?res.content_length(),
            "generate: response headers received"
        );

        let body = if res.content_length() == Some(0) {
            None
        } else {
            Some(res.bytes_stream().map_err(anyhow::Error::from).boxed())
        };
        Ok(BackendResponse::new(status, body))
    }
}
