//! Line-oriented terminal implementation of [`ChatView`].
//!
//! Permanent messages are printed once with a role prefix. The live slot is a
//! single status line that is cleared and redrawn on every update; its final
//! content replaces the status line and is printed in full.

use super::string_utils::{display_width, first_line, strip_ansi, truncate_to_width};
use crossterm::cursor::MoveToColumn;
use crossterm::style::{Attribute, Print, SetAttribute};
use crossterm::terminal::{Clear, ClearType};
use crossterm::{queue, terminal};
use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tabby_core::chat::{ChatView, PrimaryAction, SlotContent, SlotId};
use tabby_core::markdown::SafeMarkup;
use tabby_core::ChatRole;

const FALLBACK_WIDTH: usize = 80;
pub const INPUT_PROMPT: &str = "you> ";
pub const STOP_HINT: &str = "(Ctrl-C to stop)";

fn role_prefix(role: ChatRole) -> &'static str {
    match role {
        ChatRole::User => "you>",
        ChatRole::Bot => "bot>",
    }
}

struct ViewState<W> {
    out: W,
    /// The status line is on screen and must be cleared before printing.
    status_visible: bool,
    live_slot: Option<SlotId>,
    input_enabled: bool,
    primary_action: PrimaryAction,
}

pub struct TerminalView<W: Write + Send> {
    state: Mutex<ViewState<W>>,
    fixed_width: Option<usize>,
}

impl TerminalView<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> TerminalView<W> {
    pub fn new(out: W) -> Self {
        Self {
            state: Mutex::new(ViewState {
                out,
                status_visible: false,
                live_slot: None,
                input_enabled: true,
                primary_action: PrimaryAction::Send,
            }),
            fixed_width: None,
        }
    }

    /// Uses `width` columns instead of querying the terminal.
    #[cfg(test)]
    pub fn with_width(mut self, width: usize) -> Self {
        self.fixed_width = Some(width);
        self
    }

    fn lock(&self) -> MutexGuard<'_, ViewState<W>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn width(&self) -> usize {
        self.fixed_width.unwrap_or_else(|| {
            terminal::size()
                .map(|(cols, _)| cols as usize)
                .unwrap_or(FALLBACK_WIDTH)
        })
    }

    /// Prompt matching the current input state.
    pub fn prompt(&self) -> &'static str {
        let state = self.lock();
        if state.input_enabled && state.primary_action == PrimaryAction::Send {
            INPUT_PROMPT
        } else {
            STOP_HINT
        }
    }

    /// Prints plain informational text (help, command feedback).
    pub fn notice(&self, text: &str) {
        let mut state = self.lock();
        let result = clear_status(&mut state).and_then(|_| {
            queue!(state.out, Print(text), Print("\r\n"))?;
            state.out.flush()
        });
        report(result);
    }

    pub fn show_prompt(&self) {
        let prompt = self.prompt();
        let mut state = self.lock();
        if state.status_visible {
            return;
        }
        let result = queue!(state.out, Print(prompt)).and_then(|_| state.out.flush());
        report(result);
    }

    fn status_line(&self, content: &SlotContent) -> String {
        let text = match content {
            SlotContent::Working => "⏳ Working…".to_string(),
            SlotContent::InProgress {
                icon, label, body, ..
            } => {
                let plain = strip_ansi(body.as_str());
                let detail = first_line(&plain);
                if detail.is_empty() {
                    format!("{} {}…", icon, label)
                } else {
                    format!("{} {}: {}", icon, label, detail)
                }
            }
            SlotContent::Final { body } => strip_ansi(first_line(body.as_str())),
        };
        let width = self.width().saturating_sub(1);
        if self.lock().primary_action != PrimaryAction::Cancel {
            return truncate_to_width(&text, width);
        }
        let room = width.saturating_sub(display_width(STOP_HINT) + 2);
        format!("{}  {}", truncate_to_width(&text, room), STOP_HINT)
    }

    #[cfg(test)]
    fn into_output(self) -> W {
        self.state
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .out
    }
}

fn clear_status<W: Write>(state: &mut ViewState<W>) -> io::Result<()> {
    if state.status_visible {
        queue!(state.out, MoveToColumn(0), Clear(ClearType::CurrentLine))?;
        state.status_visible = false;
    }
    Ok(())
}

fn draw_status<W: Write>(state: &mut ViewState<W>, line: &str) -> io::Result<()> {
    queue!(
        state.out,
        MoveToColumn(0),
        Clear(ClearType::CurrentLine),
        SetAttribute(Attribute::Dim),
        Print(line),
        SetAttribute(Attribute::Reset)
    )?;
    state.status_visible = true;
    state.out.flush()
}

fn print_block<W: Write>(out: &mut W, prefix: &str, body: &SafeMarkup) -> io::Result<()> {
    queue!(out, SetAttribute(Attribute::Bold), Print(prefix), SetAttribute(Attribute::Reset))?;
    let mut lines = body.as_str().split('\n');
    if let Some(first) = lines.next() {
        queue!(out, Print(" "), Print(first))?;
    }
    for line in lines {
        queue!(out, Print("\r\n"), Print(line))?;
    }
    queue!(out, Print("\r\n"))?;
    out.flush()
}

/// Terminal writes are best effort; a broken stdout should not abort a
/// request that is still streaming.
fn report(result: io::Result<()>) {
    if let Err(e) = result {
        log::warn!("Terminal write failed: {}", e);
    }
}

impl<W: Write + Send> ChatView for TerminalView<W> {
    fn append_message(&self, role: ChatRole, body: &SafeMarkup) {
        let mut state = self.lock();
        let result = clear_status(&mut state).and_then(|_| {
            // The user's line is already on screen from the input prompt.
            if role == ChatRole::User {
                return Ok(());
            }
            print_block(&mut state.out, role_prefix(role), body)
        });
        report(result);
    }

    fn open_live_slot(&self, slot: SlotId, content: &SlotContent) {
        let line = self.status_line(content);
        let mut state = self.lock();
        state.live_slot = Some(slot);
        report(draw_status(&mut state, &line));
    }

    fn update_slot(&self, slot: SlotId, content: &SlotContent) {
        let line = self.status_line(content);
        let mut state = self.lock();
        if state.live_slot != Some(slot) {
            return;
        }
        let result = match content {
            SlotContent::Final { body } => clear_status(&mut state)
                .and_then(|_| print_block(&mut state.out, role_prefix(ChatRole::Bot), body)),
            _ => draw_status(&mut state, &line),
        };
        report(result);
    }

    fn finalize_slot(&self, slot: SlotId) {
        let mut state = self.lock();
        if state.live_slot == Some(slot) {
            state.live_slot = None;
            report(clear_status(&mut state));
        }
    }

    fn scroll_to_slot(&self, _slot: SlotId) {
        // Output is append-only; the newest line is always in view.
        report(self.lock().out.flush());
    }

    fn set_input_enabled(&self, enabled: bool) {
        self.lock().input_enabled = enabled;
    }

    fn set_primary_action(&self, action: PrimaryAction) {
        self.lock().primary_action = action;
    }

    fn focus_input(&self) {
        self.show_prompt();
    }
}
