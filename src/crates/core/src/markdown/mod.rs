//! Markdown rendering contract.
//!
//! Renderers turn model-generated text into a display fragment. Every
//! renderer must escape raw text before applying structure, so the model can
//! never inject markup (HTML tags, terminal escape sequences) into the view.

pub mod html;

use std::fmt;

pub use html::HtmlMarkdownRenderer;

/// A rendered fragment whose raw text has been escaped for its target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SafeMarkup(String);

impl SafeMarkup {
    /// Wraps renderer output. Only renderers should call this.
    pub fn from_rendered(rendered: String) -> Self {
        Self(rendered)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for SafeMarkup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub trait MarkdownRenderer: Send + Sync {
    /// Renders markdown (headings, lists, emphasis, code spans, links).
    fn render(&self, text: &str) -> SafeMarkup;

    /// Renders text verbatim: escaped, line breaks preserved, no markdown.
    fn render_plain(&self, text: &str) -> SafeMarkup;
}

/// Whether a link target uses a scheme that can execute code when followed.
pub fn is_unsafe_link(url: &str) -> bool {
    const UNSAFE_SCHEMES: [&str; 3] = ["javascript:", "vbscript:", "data:"];
    let normalized: String = url
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .take(16)
        .collect::<String>()
        .to_ascii_lowercase();
    UNSAFE_SCHEMES
        .iter()
        .any(|scheme| normalized.starts_with(scheme))
}
