// Tabby Core Library - Streaming chat client logic
// Layers: Util -> Infrastructure -> Service -> Chat

pub mod chat; // Chat layer - Request lifecycle, dispatch, view contract
pub mod infrastructure; // Infrastructure layer - HTTP transport, stream decoding
pub mod markdown; // Markdown rendering contract
pub mod service; // Service layer - Config
pub mod util; // Utility layer - Errors, record types

// Export main types
pub use util::errors::*;
pub use util::types::*;

pub use chat::{ChatClient, ChatView, ClientOptions, SlotContent, SlotId, TranscriptView};
pub use infrastructure::{ChatTransport, FrameDecoder, HttpChatTransport};
pub use markdown::{HtmlMarkdownRenderer, MarkdownRenderer, SafeMarkup};
pub use service::ClientConfig;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
