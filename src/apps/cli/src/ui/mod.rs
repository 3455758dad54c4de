//! Terminal interface module
//!
//! Line-oriented output built with crossterm: a markdown renderer producing
//! styled text and a view with a single rewritable status line.

pub mod markdown;
pub mod string_utils;
pub mod view;

pub use markdown::TerminalMarkdownRenderer;
pub use view::TerminalView;
