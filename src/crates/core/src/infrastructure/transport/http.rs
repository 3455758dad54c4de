//! `reqwest`-backed [`ChatTransport`].

use super::{ByteStream, ChatTransport};
use crate::service::config::ClientConfig;
use crate::util::errors::{TabbyError, TabbyResult};
use async_trait::async_trait;
use futures::StreamExt;
use log::{debug, error};
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::{Client, Response};
use std::time::Duration;
use tabby_core_types::{ChatReply, ChatRequest, SessionResponse};

const EVENT_STREAM_MIME_TYPE: &str = "text/event-stream";
/// Upper bound on how much of an error body ends up in logs and errors.
const MAX_ERROR_BODY_CHARS: usize = 500;

#[derive(Debug, Clone)]
pub struct HttpChatTransport {
    client: Client,
    session_url: String,
    stream_url: String,
    chat_url: String,
    /// Applies to session and non-streaming chat calls; the stream is bounded
    /// by the reader's idle timeout instead.
    request_timeout: Duration,
}

impl HttpChatTransport {
    pub fn new(config: &ClientConfig) -> TabbyResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| TabbyError::config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: Client, config: &ClientConfig) -> Self {
        Self {
            client,
            session_url: config.endpoint(&config.session_path),
            stream_url: config.endpoint(&config.stream_path),
            chat_url: config.endpoint(&config.chat_path),
            request_timeout: config.request_timeout(),
        }
    }

    async fn ensure_success(response: Response) -> TabbyResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let body: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
        error!("Backend returned HTTP {}: {}", status.as_u16(), body);
        Err(TabbyError::HttpStatus {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl ChatTransport for HttpChatTransport {
    async fn create_session(&self) -> TabbyResult<String> {
        debug!("Requesting new session: url={}", self.session_url);
        let response = self
            .client
            .get(&self.session_url)
            .timeout(self.request_timeout)
            .send()
            .await?;
        let response = Self::ensure_success(response).await?;
        let session: SessionResponse = response
            .json()
            .await
            .map_err(|e| TabbyError::session(format!("Invalid session response: {}", e)))?;
        if session.thread_id.trim().is_empty() {
            return Err(TabbyError::session("Backend returned an empty thread_id"));
        }
        Ok(session.thread_id)
    }

    async fn open_stream(&self, request: &ChatRequest) -> TabbyResult<ByteStream> {
        debug!(
            "Opening chat stream: url={}, thread_id={}",
            self.stream_url, request.thread_id
        );
        let response = self
            .client
            .post(&self.stream_url)
            .header(ACCEPT, EVENT_STREAM_MIME_TYPE)
            .header(CACHE_CONTROL, "no-cache")
            .json(request)
            .send()
            .await?;
        let response = Self::ensure_success(response).await?;

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(TabbyError::from))
            .boxed();
        Ok(stream)
    }

    async fn send_message(&self, request: &ChatRequest) -> TabbyResult<String> {
        debug!(
            "Sending non-streaming chat request: url={}, thread_id={}",
            self.chat_url, request.thread_id
        );
        let response = self
            .client
            .post(&self.chat_url)
            .timeout(self.request_timeout)
            .json(request)
            .send()
            .await?;
        let response = Self::ensure_success(response).await?;
        let reply: ChatReply = response.json().await?;
        Ok(reply.response)
    }
}
