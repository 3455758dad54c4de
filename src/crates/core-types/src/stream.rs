use serde::{Deserialize, Serialize};

/// Marker that starts every record line of `POST /chat/stream`.
pub const DATA_LINE_PREFIX: &str = "data: ";

/// `type` field of a streamed payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireEventType {
    Thinking,
    ToolCall,
    ToolResult,
    /// Intermediate agent message.
    Step,
    Final,
}

/// JSON payload carried after [`DATA_LINE_PREFIX`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamPayload {
    #[serde(rename = "type")]
    pub event_type: WireEventType,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_final: Option<bool>,
}

impl StreamPayload {
    pub fn new(event_type: WireEventType, content: impl Into<String>) -> Self {
        Self {
            event_type,
            content: content.into(),
            is_final: Some(event_type == WireEventType::Final),
        }
    }
}
