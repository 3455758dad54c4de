//! Chat layer
//!
//! Request lifecycle, record dispatch and the view contract the front ends
//! implement.

pub mod client;
pub mod dispatcher;
pub mod session;
pub mod state;
pub mod transcript;
pub mod view;

pub use client::{ChatClient, ClientMessages, ClientOptions};
pub use dispatcher::{progress_label, render_record, DispatchStatus, EventDispatcher, LiveSlot};
pub use session::SessionHandle;
pub use state::RequestState;
pub use transcript::{TranscriptView, ViewEvent};
pub use view::{ChatView, PrimaryAction, SlotContent, SlotId};
