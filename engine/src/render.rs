//! Markdown rendering for plugin pages
//!
//! Turns user-supplied markdown into HTML that is safe to embed:
//! - raw HTML in the source is escaped and shown as text
//! - link and image targets outside http/https/mailto (or relative) are dropped
//! - every link opens in a new tab with `rel="noopener noreferrer"`
//!
//! Only used for display; nothing is validated or stored from the output.

use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag, TagEnd};

const SAFE_SCHEMES: [&str; 3] = ["http", "https", "mailto"];

/// Render markdown to sanitized HTML
pub fn render_markdown(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let events = Parser::new_ext(markdown, options).map(sanitize_event);

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, events);
    out
}

fn sanitize_event(event: Event<'_>) -> Event<'_> {
    match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        Event::Start(Tag::Link {
            dest_url, title, ..
        }) => Event::Html(CowStr::from(anchor_open(&dest_url, &title))),
        Event::End(TagEnd::Link) => Event::Html(CowStr::Borrowed("</a>")),
        Event::Start(Tag::Image {
            link_type,
            dest_url,
            title,
            id,
        }) => {
            let dest_url = if is_safe_url(&dest_url) {
                dest_url
            } else {
                CowStr::Borrowed("")
            };
            Event::Start(Tag::Image {
                link_type,
                dest_url,
                title,
                id,
            })
        }
        other => other,
    }
}

fn anchor_open(href: &str, title: &str) -> String {
    let mut tag = String::from("<a");
    if is_safe_url(href) {
        tag.push_str(" href=\"");
        tag.push_str(&escape_attr(href));
        tag.push('"');
    }
    if !title.is_empty() {
        tag.push_str(" title=\"");
        tag.push_str(&escape_attr(title));
        tag.push('"');
    }
    tag.push_str(" target=\"_blank\" rel=\"noopener noreferrer\">");
    tag
}

/// Whether a URL is relative or uses an allowed scheme
///
/// Browsers ignore whitespace and control characters inside a scheme, so
/// those are removed before looking at it.
fn is_safe_url(url: &str) -> bool {
    let compact: String = url
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect();

    match compact.find(':') {
        Some(idx) => {
            let scheme = &compact[..idx];
            if scheme.contains(['/', '?', '#']) {
                // The colon is past the first path segment: relative URL
                true
            } else {
                SAFE_SCHEMES.contains(&scheme.to_ascii_lowercase().as_str())
            }
        }
        None => true,
    }
}

fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
