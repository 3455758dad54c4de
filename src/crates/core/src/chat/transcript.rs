//! In-memory [`ChatView`] for headless embedding and tests.
//!
//! The event log and the set of finalized slots are bounded; the oldest
//! entries are dropped first once the limit is reached.

use super::view::{ChatView, PrimaryAction, SlotContent, SlotId};
use crate::markdown::SafeMarkup;
use crate::util::types::ChatRole;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

pub const DEFAULT_EVENT_LIMIT: usize = 4096;

/// Every call the controller made, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    Message { role: ChatRole, body: SafeMarkup },
    SlotOpened { slot: SlotId, content: SlotContent },
    SlotUpdated { slot: SlotId, content: SlotContent },
    SlotFinalized(SlotId),
    Scrolled(SlotId),
    InputEnabled(bool),
    PrimaryAction(PrimaryAction),
    Focused,
}

#[derive(Debug)]
struct SlotState {
    content: SlotContent,
    live: bool,
}

#[derive(Debug)]
struct TranscriptState {
    events: VecDeque<ViewEvent>,
    slots: BTreeMap<SlotId, SlotState>,
    input_enabled: bool,
    primary_action: PrimaryAction,
}

impl Default for TranscriptState {
    fn default() -> Self {
        Self {
            events: VecDeque::new(),
            slots: BTreeMap::new(),
            input_enabled: true,
            primary_action: PrimaryAction::Send,
        }
    }
}

impl TranscriptState {
    fn push(&mut self, event: ViewEvent, limit: usize) {
        if self.events.len() >= limit {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// Forgets the oldest finalized slots beyond `limit`. Live slots stay.
    fn prune_slots(&mut self, limit: usize) {
        while self.slots.len() > limit {
            let oldest = self
                .slots
                .iter()
                .find(|(_, slot)| !slot.live)
                .map(|(id, _)| *id);
            let Some(id) = oldest else {
                return;
            };
            self.slots.remove(&id);
        }
    }
}

#[derive(Debug)]
pub struct TranscriptView {
    state: Mutex<TranscriptState>,
    limit: usize,
}

impl Default for TranscriptView {
    fn default() -> Self {
        Self::with_event_limit(DEFAULT_EVENT_LIMIT)
    }
}

impl TranscriptView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps at most `limit` events and `limit` slots (at least one of each).
    pub fn with_event_limit(limit: usize) -> Self {
        Self {
            state: Mutex::new(TranscriptState::default()),
            limit: limit.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TranscriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, event: ViewEvent) {
        self.lock().push(event, self.limit);
    }

    pub fn events(&self) -> Vec<ViewEvent> {
        self.lock().events.iter().cloned().collect()
    }

    /// Permanent log entries (user and bot messages, not slots).
    pub fn messages(&self) -> Vec<(ChatRole, String)> {
        self.lock()
            .events
            .iter()
            .filter_map(|event| match event {
                ViewEvent::Message { role, body } => Some((*role, body.as_str().to_string())),
                _ => None,
            })
            .collect()
    }

    pub fn slot_content(&self, slot: SlotId) -> Option<SlotContent> {
        self.lock().slots.get(&slot).map(|s| s.content.clone())
    }

    /// Every content the slot displayed, in order, including the opening one.
    pub fn slot_history(&self, slot: SlotId) -> Vec<SlotContent> {
        self.lock()
            .events
            .iter()
            .filter_map(|event| match event {
                ViewEvent::SlotOpened { slot: s, content } | ViewEvent::SlotUpdated { slot: s, content }
                    if *s == slot =>
                {
                    Some(content.clone())
                }
                _ => None,
            })
            .collect()
    }

    pub fn is_slot_live(&self, slot: SlotId) -> bool {
        self.lock().slots.get(&slot).map(|s| s.live).unwrap_or(false)
    }

    pub fn live_slot_count(&self) -> usize {
        self.lock().slots.values().filter(|s| s.live).count()
    }

    pub fn slot_ids(&self) -> Vec<SlotId> {
        self.lock().slots.keys().copied().collect()
    }

    pub fn input_enabled(&self) -> bool {
        self.lock().input_enabled
    }

    pub fn primary_action(&self) -> PrimaryAction {
        self.lock().primary_action
    }
}

impl ChatView for TranscriptView {
    fn append_message(&self, role: ChatRole, body: &SafeMarkup) {
        self.record(ViewEvent::Message {
            role,
            body: body.clone(),
        });
    }

    fn open_live_slot(&self, slot: SlotId, content: &SlotContent) {
        let mut state = self.lock();
        state.slots.insert(
            slot,
            SlotState {
                content: content.clone(),
                live: true,
            },
        );
        state.prune_slots(self.limit);
        state.push(
            ViewEvent::SlotOpened {
                slot,
                content: content.clone(),
            },
            self.limit,
        );
    }

    fn update_slot(&self, slot: SlotId, content: &SlotContent) {
        let mut state = self.lock();
        if let Some(existing) = state.slots.get_mut(&slot) {
            existing.content = content.clone();
        }
        state.push(
            ViewEvent::SlotUpdated {
                slot,
                content: content.clone(),
            },
            self.limit,
        );
    }

    fn finalize_slot(&self, slot: SlotId) {
        let mut state = self.lock();
        if let Some(existing) = state.slots.get_mut(&slot) {
            existing.live = false;
        }
        state.push(ViewEvent::SlotFinalized(slot), self.limit);
    }

    fn scroll_to_slot(&self, slot: SlotId) {
        self.record(ViewEvent::Scrolled(slot));
    }

    fn set_input_enabled(&self, enabled: bool) {
        let mut state = self.lock();
        state.input_enabled = enabled;
        state.push(ViewEvent::InputEnabled(enabled), self.limit);
    }

    fn set_primary_action(&self, action: PrimaryAction) {
        let mut state = self.lock();
        state.primary_action = action;
        state.push(ViewEvent::PrimaryAction(action), self.limit);
    }

    fn focus_input(&self) {
        self.record(ViewEvent::Focused);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn markup(text: &str) -> SafeMarkup {
        SafeMarkup::from_rendered(text.to_string())
    }

    #[test]
    fn event_log_drops_oldest_entries() {
        let view = TranscriptView::with_event_limit(3);
        for text in ["a", "b", "c", "d"] {
            view.append_message(ChatRole::Bot, &markup(text));
        }
        let texts: Vec<String> = view.messages().into_iter().map(|(_, t)| t).collect();
        assert_eq!(texts, vec!["b", "c", "d"]);
        assert_eq!(view.events().len(), 3);
    }

    #[test]
    fn finalized_slots_are_pruned_but_live_ones_kept() {
        let view = TranscriptView::with_event_limit(2);
        view.open_live_slot(SlotId(1), &SlotContent::Working);
        view.open_live_slot(SlotId(2), &SlotContent::Working);
        view.finalize_slot(SlotId(2));
        view.open_live_slot(SlotId(3), &SlotContent::Working);

        assert_eq!(view.slot_ids(), vec![SlotId(1), SlotId(3)]);
        assert!(view.is_slot_live(SlotId(1)));
        assert_eq!(view.live_slot_count(), 2);
    }
}
