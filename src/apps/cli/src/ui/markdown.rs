//! Markdown rendering for the terminal
//!
//! Input text is stripped of control characters before any styling is
//! applied, so only escape sequences emitted here reach the terminal.

use super::string_utils::strip_controls;
use crossterm::style::{Attribute, Color, ResetColor, SetAttribute, SetForegroundColor};
use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use std::fmt::Display;
use std::fmt::Write as _;
use tabby_core::markdown::{is_unsafe_link, MarkdownRenderer, SafeMarkup};

const RULE: &str = "────────────────────────";
const CODE_INDENT: &str = "    ";

#[derive(Debug, Clone, Copy)]
pub struct TerminalMarkdownRenderer {
    ansi: bool,
}

impl Default for TerminalMarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalMarkdownRenderer {
    pub fn new() -> Self {
        Self { ansi: true }
    }

    /// Structure only, no escape sequences (for pipes and log files).
    pub fn without_styles() -> Self {
        Self { ansi: false }
    }
}

struct Writer {
    ansi: bool,
    out: String,
    /// `Some(n)` for ordered lists, holding the next number.
    lists: Vec<Option<u64>>,
    link: Option<String>,
    in_code_block: bool,
    code_line_start: bool,
}

impl Writer {
    fn style(&mut self, code: impl Display) {
        if self.ansi {
            let _ = write!(self.out, "{}", code);
        }
    }

    fn text(&mut self, text: &str) {
        let text = strip_controls(text);
        if !self.in_code_block {
            self.out.push_str(&text);
            return;
        }
        for line in text.split_inclusive('\n') {
            if self.code_line_start {
                self.out.push_str(CODE_INDENT);
            }
            self.out.push_str(line);
            self.code_line_start = line.ends_with('\n');
        }
    }

    fn ensure_line_start(&mut self) {
        if !self.out.is_empty() && !self.out.ends_with('\n') {
            self.out.push('\n');
        }
    }

    fn end_block(&mut self) {
        self.ensure_line_start();
        if self.lists.is_empty() {
            self.out.push('\n');
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Heading { .. } => {
                self.ensure_line_start();
                self.style(SetAttribute(Attribute::Bold));
                self.style(SetAttribute(Attribute::Underlined));
            }
            Tag::Strong => self.style(SetAttribute(Attribute::Bold)),
            Tag::Emphasis => self.style(SetAttribute(Attribute::Italic)),
            Tag::Strikethrough => self.style(SetAttribute(Attribute::CrossedOut)),
            Tag::CodeBlock(kind) => {
                self.ensure_line_start();
                if let CodeBlockKind::Fenced(lang) = kind {
                    if !lang.is_empty() {
                        self.style(SetAttribute(Attribute::Dim));
                        self.text(&format!("[{}]\n", lang));
                        self.style(SetAttribute(Attribute::NormalIntensity));
                    }
                }
                self.in_code_block = true;
                self.code_line_start = true;
                self.style(SetForegroundColor(Color::Cyan));
            }
            Tag::List(start) => {
                self.ensure_line_start();
                self.lists.push(start);
            }
            Tag::Item => {
                self.ensure_line_start();
                let depth = self.lists.len().saturating_sub(1);
                self.out.push_str(&"  ".repeat(depth));
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{}. ", n);
                        *n += 1;
                        marker
                    }
                    _ => "• ".to_string(),
                };
                self.out.push_str(&marker);
            }
            Tag::Link { dest_url, .. } => {
                self.style(SetAttribute(Attribute::Underlined));
                self.link = (!dest_url.is_empty() && !is_unsafe_link(&dest_url))
                    .then(|| strip_controls(&dest_url));
            }
            Tag::Image { dest_url, .. } => {
                self.out.push_str("[image: ");
                self.link = (!is_unsafe_link(&dest_url)).then(|| strip_controls(&dest_url));
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => self.end_block(),
            TagEnd::Heading(_) => {
                self.style(SetAttribute(Attribute::Reset));
                self.end_block();
            }
            TagEnd::Strong => self.style(SetAttribute(Attribute::NormalIntensity)),
            TagEnd::Emphasis => self.style(SetAttribute(Attribute::NoItalic)),
            TagEnd::Strikethrough => self.style(SetAttribute(Attribute::NotCrossedOut)),
            TagEnd::CodeBlock => {
                self.in_code_block = false;
                self.end_block();
                self.style(ResetColor);
            }
            TagEnd::List(_) => {
                self.lists.pop();
                if self.lists.is_empty() {
                    self.end_block();
                }
            }
            TagEnd::Item => self.ensure_line_start(),
            TagEnd::Link => {
                self.style(SetAttribute(Attribute::NoUnderline));
                if let Some(url) = self.link.take() {
                    let _ = write!(self.out, " ({})", url);
                }
            }
            TagEnd::Image => {
                if let Some(url) = self.link.take() {
                    let _ = write!(self.out, " {}", url);
                }
                self.out.push(']');
            }
            _ => {}
        }
    }

    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) | Event::Html(text) | Event::InlineHtml(text) => self.text(&text),
            Event::Code(code) => {
                self.style(SetForegroundColor(Color::Cyan));
                self.text(&code);
                self.style(ResetColor);
            }
            Event::SoftBreak | Event::HardBreak => self.out.push('\n'),
            Event::Rule => {
                self.ensure_line_start();
                self.out.push_str(RULE);
                self.end_block();
            }
            Event::TaskListMarker(checked) => {
                self.out.push_str(if checked { "[x] " } else { "[ ] " })
            }
            _ => {}
        }
    }

    fn finish(self) -> String {
        self.out.trim_end().to_string()
    }
}

impl MarkdownRenderer for TerminalMarkdownRenderer {
    fn render(&self, text: &str) -> SafeMarkup {
        let options = Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS;
        let mut writer = Writer {
            ansi: self.ansi,
            out: String::with_capacity(text.len()),
            lists: Vec::new(),
            link: None,
            in_code_block: false,
            code_line_start: false,
        };
        for event in Parser::new_ext(text, options) {
            writer.event(event);
        }
        SafeMarkup::from_rendered(writer.finish())
    }

    fn render_plain(&self, text: &str) -> SafeMarkup {
        SafeMarkup::from_rendered(strip_controls(&text.replace("\r\n", "\n")))
    }
}
