use serde::{Deserialize, Serialize};

/// Body of `POST /chat/stream` and `POST /chat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub thread_id: String,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>, thread_id: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            thread_id: thread_id.into(),
        }
    }
}

/// Body returned by the non-streaming `POST /chat` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
}
