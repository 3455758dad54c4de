//! Applies decoded records to the live slot.

use super::view::{ChatView, SlotContent, SlotId};
use crate::markdown::MarkdownRenderer;
use crate::util::types::{RecordKind, StreamEventRecord};
use log::{debug, trace};

/// The slot that renders the response currently streaming.
#[derive(Debug, PartialEq, Eq)]
pub struct LiveSlot {
    id: SlotId,
    permanent: bool,
}

impl LiveSlot {
    pub fn new(id: SlotId) -> Self {
        Self {
            id,
            permanent: false,
        }
    }

    pub fn id(&self) -> SlotId {
        self.id
    }

    pub fn is_permanent(&self) -> bool {
        self.permanent
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStatus {
    Continue,
    /// A terminal record was applied; nothing more should be dispatched.
    Finished,
    /// The slot was already permanent.
    Ignored,
}

/// Icon and label shown in front of an in-progress record.
pub fn progress_label(kind: RecordKind) -> (&'static str, &'static str) {
    match kind {
        RecordKind::StatusStep => ("⏳", "Working"),
        RecordKind::Thinking => ("💭", "Thinking"),
        RecordKind::ToolCall => ("🔧", "Calling tool"),
        RecordKind::ToolResult => ("📋", "Tool result"),
        RecordKind::Final => ("", ""),
    }
}

/// Presentation of `record`; a pure function of its kind and content.
pub fn render_record(renderer: &dyn MarkdownRenderer, record: &StreamEventRecord) -> SlotContent {
    let body = renderer.render(record.content());
    match record.kind() {
        RecordKind::Final => SlotContent::Final { body },
        kind => {
            let (icon, label) = progress_label(kind);
            SlotContent::InProgress {
                kind,
                icon,
                label,
                body,
            }
        }
    }
}

pub struct EventDispatcher<'a> {
    view: &'a dyn ChatView,
    renderer: &'a dyn MarkdownRenderer,
    scroll_on_progress: bool,
}

impl<'a> EventDispatcher<'a> {
    pub fn new(
        view: &'a dyn ChatView,
        renderer: &'a dyn MarkdownRenderer,
        scroll_on_progress: bool,
    ) -> Self {
        Self {
            view,
            renderer,
            scroll_on_progress,
        }
    }

    pub fn dispatch(&self, slot: &mut LiveSlot, record: &StreamEventRecord) -> DispatchStatus {
        if slot.permanent {
            debug!(
                "Ignoring {} record for finalized slot {:?}",
                record.kind().as_str(),
                slot.id
            );
            return DispatchStatus::Ignored;
        }

        trace!("Dispatching {} record to slot {:?}", record.kind().as_str(), slot.id);
        let content = render_record(self.renderer, record);
        self.view.update_slot(slot.id, &content);

        if record.is_terminal() {
            self.view.finalize_slot(slot.id);
            slot.permanent = true;
            self.view.scroll_to_slot(slot.id);
            return DispatchStatus::Finished;
        }

        if self.scroll_on_progress {
            self.view.scroll_to_slot(slot.id);
        }
        DispatchStatus::Continue
    }
}
