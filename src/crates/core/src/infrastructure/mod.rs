//! Infrastructure layer
//!
//! HTTP transport and the byte/line plumbing of the response stream.

pub mod stream;
pub mod transport;

pub use stream::{DecodeOutcome, FragmentReader, FrameDecoder, ReadOutcome, Utf8ChunkDecoder};
pub use transport::{ByteStream, ChatTransport, HttpChatTransport};
