//! XHTML helpers for chapter documents

use regex::Regex;
use scraper::{Html, Selector};
use std::sync::OnceLock;

/// Titles longer than this are assumed to be body text
const MAX_TITLE_CHARS: usize = 100;

/// Characters shown by `show-chapters --detailed`
pub const PREVIEW_CHARS: usize = 250;

fn body_open() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<body\b[^>]*>").expect("valid body regex"))
}

fn body_close() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)</body\s*>").expect("valid body regex"))
}

fn blank_lines() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n\s*\n+").expect("valid whitespace regex"))
}

fn heading_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| Selector::parse("h1, h2, h3, title").expect("valid heading selector"))
}

fn body_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| Selector::parse("body").expect("valid body selector"))
}

/// A document cut around the contents of its `<body>` element.
///
/// `head` ends with the opening body tag and `tail` starts with the closing
/// one, so `head + body + tail` is always the original document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentParts<'a> {
    pub head: &'a str,
    pub body: &'a str,
    pub tail: &'a str,
}

impl DocumentParts<'_> {
    /// Rebuild the document around a new body
    pub fn with_body(&self, body: &str) -> String {
        let mut out = String::with_capacity(self.head.len() + body.len() + self.tail.len());
        out.push_str(self.head);
        out.push_str(body);
        out.push_str(self.tail);
        out
    }
}

/// Split a document into head, body and tail.
///
/// Fragments without a `<body>` tag are treated as all body.
pub fn split_body(document: &str) -> DocumentParts<'_> {
    let Some(open) = body_open().find(document) else {
        return DocumentParts {
            head: "",
            body: document,
            tail: "",
        };
    };

    let close = body_close()
        .find_iter(&document[open.end()..])
        .last()
        .map(|m| open.end() + m.start())
        .unwrap_or(document.len());

    DocumentParts {
        head: &document[..open.end()],
        body: &document[open.end()..close],
        tail: &document[close..],
    }
}

/// First short `h1`/`h2`/`h3`/`title` text in document order
pub fn extract_title(document: &str) -> Option<String> {
    let html = Html::parse_document(document);
    html.select(heading_selector())
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .find(|title| !title.is_empty())
        .filter(|title| title.chars().count() < MAX_TITLE_CHARS)
}

/// Visible text of the body, or of the whole document when it has none
pub fn plain_text(document: &str) -> String {
    let html = Html::parse_document(document);
    let text: String = match html.select(body_selector()).next() {
        Some(body) => body.text().collect(),
        None => html.root_element().text().collect(),
    };
    text.trim().to_string()
}

/// Opening characters of the chapter text with blank lines squeezed
pub fn preview(document: &str, max_chars: usize) -> String {
    let text = plain_text(document);
    let head: String = text.chars().take(max_chars).collect();
    blank_lines().replace_all(&head, "\n").trim().to_string()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<html xmlns="http://www.w3.org/1999/xhtml">
<head><title>Head Title</title></head>
<body class="chapter">
<h1>  The
 Beginning </h1>
<p>It was a <em>dark</em> night.</p>


<p>Second paragraph.</p>
</body>
</html>"#;

    #[test]
    fn test_split_body_is_lossless() {
        let parts = split_body(DOC);
        assert!(parts.head.ends_with(r#"<body class="chapter">"#));
        assert!(parts.body.contains("<h1>"));
        assert!(parts.tail.starts_with("</body>"));
        assert_eq!(parts.with_body(parts.body), DOC);
    }

    #[test]
    fn test_split_without_body_tag() {
        let parts = split_body("<p>fragment</p>");
        assert_eq!(parts.head, "");
        assert_eq!(parts.body, "<p>fragment</p>");
        assert_eq!(parts.tail, "");
    }

    #[test]
    fn test_title_prefers_first_heading_in_document_order() {
        // <title> in <head> comes first in document order
        assert_eq!(extract_title(DOC).as_deref(), Some("Head Title"));

        let no_head = "<html><body><h2>Part Two</h2><p>x</p></body></html>";
        assert_eq!(extract_title(no_head).as_deref(), Some("Part Two"));
    }

    #[test]
    fn test_long_or_missing_title_is_rejected() {
        let long = format!("<html><body><h1>{}</h1></body></html>", "word ".repeat(40));
        assert_eq!(extract_title(&long), None);
        assert_eq!(extract_title("<html><body><p>text</p></body></html>"), None);
    }

    #[test]
    fn test_plain_text_and_preview() {
        let text = plain_text(DOC);
        assert!(text.starts_with("The"));
        assert!(!text.contains("Head Title"));
        assert!(text.contains("It was a dark night."));

        let short = preview(DOC, 40);
        assert!(short.chars().count() <= 40);
        assert!(!short.contains("\n\n"));
    }
}
