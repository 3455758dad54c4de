//! Transport layer for the chat backend.
//!
//! The controller only talks to [`ChatTransport`]; [`HttpChatTransport`] is the
//! production implementation and tests substitute their own.

pub mod http;

use crate::util::errors::TabbyResult;
use async_trait::async_trait;
use futures::stream::BoxStream;
use tabby_core_types::ChatRequest;

pub use http::HttpChatTransport;

/// Raw response body, chunked however the network delivered it.
pub type ByteStream = BoxStream<'static, TabbyResult<Vec<u8>>>;

#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// `GET /session`: returns a fresh conversation thread id.
    async fn create_session(&self) -> TabbyResult<String>;

    /// `POST /chat/stream`: resolves once response headers arrived with a
    /// success status.
    async fn open_stream(&self, request: &ChatRequest) -> TabbyResult<ByteStream>;

    /// `POST /chat`: non-streaming variant returning the final answer.
    async fn send_message(&self, request: &ChatRequest) -> TabbyResult<String>;
}
