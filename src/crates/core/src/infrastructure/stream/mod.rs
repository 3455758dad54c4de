//! Response stream handling: bytes to text, text to records.

pub mod frame_decoder;
pub mod reader;
pub mod utf8;

pub use frame_decoder::{DecodeOutcome, FrameDecoder};
pub use reader::{FragmentReader, ReadOutcome};
pub use utf8::Utf8ChunkDecoder;
