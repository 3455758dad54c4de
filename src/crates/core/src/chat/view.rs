//! The view surface driven by the chat controller.

use crate::markdown::SafeMarkup;
use crate::util::types::{ChatRole, RecordKind};

/// Identifies one live slot for the lifetime of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub u64);

/// What the view shows in a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotContent {
    /// Provisional presentation before the first record arrives.
    Working,
    /// "What is happening now": replaces the previous progress line.
    InProgress {
        kind: RecordKind,
        icon: &'static str,
        label: &'static str,
        body: SafeMarkup,
    },
    Final { body: SafeMarkup },
}

/// What the primary button does right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimaryAction {
    Send,
    Cancel,
}

/// Implemented by front ends. Calls are made from the task running the
/// controller, never concurrently for the same slot.
pub trait ChatView: Send + Sync {
    /// Adds a permanent entry to the message log.
    fn append_message(&self, role: ChatRole, body: &SafeMarkup);

    /// Adds a live, streaming-styled slot showing `content`.
    fn open_live_slot(&self, slot: SlotId, content: &SlotContent);

    /// Replaces the whole content of `slot`.
    fn update_slot(&self, slot: SlotId, content: &SlotContent);

    /// Drops the streaming styling; the slot becomes a permanent message.
    fn finalize_slot(&self, slot: SlotId);

    fn scroll_to_slot(&self, slot: SlotId);

    fn set_input_enabled(&self, enabled: bool);

    fn set_primary_action(&self, action: PrimaryAction);

    fn focus_input(&self);
}
