//! Wire types exchanged with the Tabby chat backend.
//!
//! Kept free of any runtime dependency so that both the client library and
//! test servers can share them.

pub mod chat;
pub mod session;
pub mod stream;

pub use chat::{ChatReply, ChatRequest};
pub use session::SessionResponse;
pub use stream::{StreamPayload, WireEventType, DATA_LINE_PREFIX};
