//! Markdown rendering for announcements and articles
//!
//! Content is authored in CommonMark (tables, strikethrough and task lists
//! enabled). Raw HTML in the source is escaped instead of passed through and
//! links with script-capable schemes are neutralised, so the stored
//! `content_html` is safe to embed in the intranet front-end.

use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag, TagEnd};

/// Link schemes that survive rendering; anything else becomes `#`
const SAFE_SCHEMES: &[&str] = &["http:", "https:", "mailto:", "tel:"];

/// Markdown renderer
#[derive(Debug, Clone, Default)]
pub struct MarkdownRenderer {
    smart_punctuation: bool,
}

impl MarkdownRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render typographic quotes and dashes
    pub fn with_smart_punctuation(mut self) -> Self {
        self.smart_punctuation = true;
        self
    }

    fn options(&self) -> Options {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        if self.smart_punctuation {
            options.insert(Options::ENABLE_SMART_PUNCTUATION);
        }
        options
    }

    /// Render markdown to sanitized HTML.
    pub fn render(&self, markdown: &str) -> String {
        if markdown.trim().is_empty() {
            return String::new();
        }

        let parser = Parser::new_ext(markdown, self.options()).map(sanitize_event);

        let mut html_output = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut html_output, parser);
        html_output
    }

    /// Plain-text excerpt of at most `max_chars` characters, cut on a word
    /// boundary where possible. Used when an article has no summary.
    pub fn excerpt(&self, markdown: &str, max_chars: usize) -> String {
        let mut text = String::new();
        for event in Parser::new_ext(markdown, self.options()) {
            match event {
                Event::Text(t) | Event::Code(t) => text.push_str(&t),
                Event::SoftBreak
                | Event::HardBreak
                | Event::End(
                    TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::Item | TagEnd::TableCell,
                ) => {
                    if !text.ends_with(' ') {
                        text.push(' ');
                    }
                }
                _ => {}
            }
        }

        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if text.chars().count() <= max_chars {
            return text;
        }

        let cut: String = text.chars().take(max_chars).collect();
        let trimmed = match cut.rfind(' ') {
            Some(pos) if pos > 0 => &cut[..pos],
            _ => cut.as_str(),
        };
        format!("{}…", trimmed.trim_end())
    }
}

fn sanitize_event(event: Event<'_>) -> Event<'_> {
    match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        Event::Start(Tag::Link { link_type, dest_url, title, id }) => Event::Start(Tag::Link {
            link_type,
            dest_url: safe_url(dest_url),
            title,
            id,
        }),
        Event::Start(Tag::Image { link_type, dest_url, title, id }) => Event::Start(Tag::Image {
            link_type,
            dest_url: safe_url(dest_url),
            title,
            id,
        }),
        other => other,
    }
}

/// Relative links and the allowed schemes pass; everything else is dropped.
fn safe_url(url: CowStr<'_>) -> CowStr<'_> {
    let lower = url.trim().to_ascii_lowercase();
    let scheme_end = lower.find(':');
    let path_start = lower.find(['/', '?', '#']);

    let has_scheme = match (scheme_end, path_start) {
        (Some(colon), Some(slash)) => colon < slash,
        (Some(_), None) => true,
        _ => false,
    };

    if !has_scheme || SAFE_SCHEMES.iter().any(|scheme| lower.starts_with(scheme)) {
        url
    } else {
        CowStr::Borrowed("#")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(md: &str) -> String {
        MarkdownRenderer::new().render(md)
    }

    #[test]
    fn test_render_basic_blocks() {
        let html = render("# Staff meeting\n\nBring **reports** and *coffee*.");
        assert!(html.contains("<h1>Staff meeting</h1>"));
        assert!(html.contains("<strong>reports</strong>"));
        assert!(html.contains("<em>coffee</em>"));
    }

    #[test]
    fn test_render_lists_and_tables() {
        let html = render("- [x] grades\n- [ ] reports\n\n| Room | Time |\n|------|------|\n| 101 | 9:00 |");
        assert!(html.contains("<li>"));
        assert!(html.contains("checkbox"));
        assert!(html.contains("<table>"));
        assert!(html.contains("<td>101</td>"));
    }

    #[test]
    fn test_render_strikethrough() {
        assert!(render("~~cancelled~~").contains("<del>cancelled</del>"));
    }

    #[test]
    fn test_raw_html_is_escaped() {
        let html = render("Hello <script>alert(1)</script>\n\n<div onclick=\"x()\">hi</div>");
        assert!(!html.contains("<script>"));
        assert!(!html.contains("<div"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_unsafe_links_are_neutralised() {
        let html = render("[click](javascript:alert(1)) and [ok](https://school.example/plan)");
        assert!(!html.contains("javascript:"));
        assert!(html.contains("href=\"#\""));
        assert!(html.contains("href=\"https://school.example/plan\""));
    }

    #[test]
    fn test_relative_links_pass() {
        let html = render("[handbook](/resources/12) [mail](mailto:office@school.example)");
        assert!(html.contains("href=\"/resources/12\""));
        assert!(html.contains("href=\"mailto:office@school.example\""));
    }

    #[test]
    fn test_code_is_escaped() {
        let html = render("```\nif a < b && c > d {}\n```");
        assert!(html.contains("<pre><code>"));
        assert!(html.contains("&lt;") && html.contains("&amp;&amp;"));
    }

    #[test]
    fn test_smart_punctuation_is_opt_in() {
        assert!(!render("\"quoted\"").contains('\u{201c}'));
        let smart = MarkdownRenderer::new().with_smart_punctuation().render("\"quoted\"");
        assert!(smart.contains('\u{201c}'));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(render(""), "");
        assert_eq!(render("   \n\n"), "");
    }

    #[test]
    fn test_excerpt() {
        let renderer = MarkdownRenderer::new();
        let md = "# Title\n\nThe **new** timetable starts on Monday for all year groups.";

        assert_eq!(
            renderer.excerpt(md, 200),
            "Title The new timetable starts on Monday for all year groups."
        );

        let short = renderer.excerpt(md, 20);
        assert!(short.ends_with('…'));
        assert!(short.chars().count() <= 21);
        assert!(short.starts_with("Title The new"));
    }
}
