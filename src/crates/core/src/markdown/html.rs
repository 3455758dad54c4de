//! Markdown to HTML fragment renderer.

use super::{is_unsafe_link, MarkdownRenderer, SafeMarkup};
use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag};

const NEUTRAL_LINK: &str = "#";

/// Renders markdown to an HTML fragment safe for insertion into a page.
///
/// Raw HTML in the input is emitted as escaped text, soft breaks become
/// `<br />` (chat messages are line oriented) and script-capable link targets
/// are replaced with `#`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlMarkdownRenderer;

impl HtmlMarkdownRenderer {
    pub fn new() -> Self {
        Self
    }

    fn options() -> Options {
        Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TABLES | Options::ENABLE_TASKLISTS
    }
}

fn neutralize(url: CowStr<'_>) -> CowStr<'_> {
    if is_unsafe_link(&url) {
        CowStr::Borrowed(NEUTRAL_LINK)
    } else {
        url
    }
}

fn sanitize(event: Event<'_>) -> Event<'_> {
    match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        Event::SoftBreak => Event::HardBreak,
        Event::Start(Tag::Link {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Link {
            link_type,
            dest_url: neutralize(dest_url),
            title,
            id,
        }),
        Event::Start(Tag::Image {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Image {
            link_type,
            dest_url: neutralize(dest_url),
            title,
            id,
        }),
        other => other,
    }
}

impl MarkdownRenderer for HtmlMarkdownRenderer {
    fn render(&self, text: &str) -> SafeMarkup {
        let parser = Parser::new_ext(text, Self::options()).map(sanitize);
        let mut out = String::with_capacity(text.len() + text.len() / 2);
        html::push_html(&mut out, parser);
        SafeMarkup::from_rendered(out.trim_end().to_string())
    }

    fn render_plain(&self, text: &str) -> SafeMarkup {
        let mut events = Vec::new();
        for (index, line) in text.split('\n').enumerate() {
            if index > 0 {
                events.push(Event::HardBreak);
            }
            let line = line.strip_suffix('\r').unwrap_or(line);
            events.push(Event::Text(CowStr::Borrowed(line)));
        }
        let mut out = String::with_capacity(text.len());
        html::push_html(&mut out, events.into_iter());
        SafeMarkup::from_rendered(out)
    }
}
