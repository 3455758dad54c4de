use tabby_core_types::{StreamPayload, WireEventType};

/// Classification of a decoded record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    StatusStep,
    Thinking,
    ToolCall,
    ToolResult,
    Final,
}

impl RecordKind {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Final)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::StatusStep => "status_step",
            Self::Thinking => "thinking",
            Self::ToolCall => "tool_call",
            Self::ToolResult => "tool_result",
            Self::Final => "final",
        }
    }
}

impl From<WireEventType> for RecordKind {
    fn from(event_type: WireEventType) -> Self {
        match event_type {
            WireEventType::Step => Self::StatusStep,
            WireEventType::Thinking => Self::Thinking,
            WireEventType::ToolCall => Self::ToolCall,
            WireEventType::ToolResult => Self::ToolResult,
            WireEventType::Final => Self::Final,
        }
    }
}

/// One decoded unit of a response stream.
///
/// Fields are private so that `is_terminal` can never disagree with `kind`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEventRecord {
    kind: RecordKind,
    content: String,
}

impl StreamEventRecord {
    pub fn new(kind: RecordKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
        }
    }

    pub fn final_record(content: impl Into<String>) -> Self {
        Self::new(RecordKind::Final, content)
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn is_terminal(&self) -> bool {
        self.kind.is_terminal()
    }
}

impl From<StreamPayload> for StreamEventRecord {
    fn from(payload: StreamPayload) -> Self {
        Self::new(payload.event_type.into(), payload.content)
    }
}
