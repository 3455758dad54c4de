pub mod event;
pub mod message;

pub use event::*;
pub use message::*;
