pub mod errors;
pub mod types;

pub use errors::{DecodeError, TabbyError, TabbyResult};
