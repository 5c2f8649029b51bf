//! Split chapter bodies into provider-sized pieces
//!
//! Chunks are contiguous slices of the input, so joining them always yields
//! the original body. Cuts are made after block-level closing tags; a single
//! block that is still too large is cut at sentence ends, and as a last
//! resort at a character boundary. No cut ever falls inside a tag, so a chunk
//! may run past the limit by the length of the tag it would have split.

use regex::Regex;
use std::ops::Range;
use std::sync::OnceLock;

fn block_end() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)</(?:p|div|h[1-6]|li|ul|ol|dl|dd|dt|blockquote|section|article|aside|header|footer|figure|figcaption|table|tr|pre|nav)\s*>|<(?:hr|br)\b[^>]*>",
        )
        .expect("valid block regex")
    })
}

fn sentence_end() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"[.!?…。！？]["'”’)]*\s+"#).expect("valid sentence regex")
    })
}

/// Cut `body` into chunks of at most `max_chars` characters
pub fn chunk_html(body: &str, max_chars: usize) -> Vec<&str> {
    let max_chars = max_chars.max(1);
    if body.is_empty() {
        return Vec::new();
    }
    if char_len(body) <= max_chars {
        return vec![body];
    }

    let mut pieces = Vec::new();
    for block in split_after(body, 0..body.len(), block_end()) {
        if char_len(&body[block.clone()]) <= max_chars {
            pieces.push(block);
            continue;
        }
        for sentence in split_after(body, block, sentence_end()) {
            if char_len(&body[sentence.clone()]) <= max_chars {
                pieces.push(sentence);
            } else {
                pieces.extend(hard_split(body, sentence, max_chars));
            }
        }
    }

    pack(body, pieces, max_chars)
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Whether byte offset `at` lies between a `<` and its closing `>`
fn inside_tag(text: &str, at: usize) -> bool {
    let before = &text[..at];
    before
        .rfind('<')
        .is_some_and(|open| !before[open..].contains('>'))
}

/// Contiguous ranges of `range`, each ending right after a match of `re`
fn split_after(text: &str, range: Range<usize>, re: &Regex) -> Vec<Range<usize>> {
    let mut out = Vec::new();
    let mut start = range.start;
    for m in re.find_iter(&text[range.clone()]) {
        let end = range.start + m.end();
        if end > start && !inside_tag(text, end) {
            out.push(start..end);
            start = end;
        }
    }
    if start < range.end {
        out.push(start..range.end);
    }
    out
}

fn hard_split(text: &str, range: Range<usize>, max_chars: usize) -> Vec<Range<usize>> {
    let mut out = Vec::new();
    let mut start = range.start;
    let mut count = 0;
    for (offset, _) in text[range.clone()].char_indices() {
        let at = range.start + offset;
        if count >= max_chars && !inside_tag(text, at) {
            out.push(start..at);
            start = at;
            count = 0;
        }
        count += 1;
    }
    if start < range.end {
        out.push(start..range.end);
    }
    out
}

/// Greedily merge neighbouring ranges while they fit
fn pack(text: &str, pieces: Vec<Range<usize>>, max_chars: usize) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut current: Option<Range<usize>> = None;
    let mut current_len = 0;

    for piece in pieces {
        let len = char_len(&text[piece.clone()]);
        match current.as_mut() {
            Some(cur) if current_len + len <= max_chars => {
                cur.end = piece.end;
                current_len += len;
            }
            _ => {
                if let Some(done) = current.take() {
                    chunks.push(&text[done]);
                }
                current = Some(piece);
                current_len = len;
            }
        }
    }
    if let Some(done) = current {
        chunks.push(&text[done]);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraphs(n: usize) -> String {
        (1..=n)
            .map(|i| format!("\n<p>Paragraph number {} with some text.</p>", i))
            .collect()
    }

    #[test]
    fn test_small_body_is_single_chunk() {
        let body = "<p>Short.</p>";
        assert_eq!(chunk_html(body, 100), vec![body]);
        assert!(chunk_html("", 100).is_empty());
    }

    #[test]
    fn test_splits_after_block_tags() {
        let body = paragraphs(20);
        let chunks = chunk_html(&body, 200);

        assert!(chunks.len() > 1);
        assert_eq!(chunks.concat(), body);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 200);
            assert!(chunk.trim_end().ends_with("</p>"));
        }
    }

    #[test]
    fn test_oversize_block_falls_back_to_sentences() {
        let body = format!(
            "<p>{}</p><p>tail</p>",
            "This is one sentence. ".repeat(20)
        );
        let chunks = chunk_html(&body, 100);

        assert_eq!(chunks.concat(), body);
        assert!(chunks.iter().all(|c| c.chars().count() <= 100));
        assert!(chunks[0].ends_with("sentence. "));
    }

    #[test]
    fn test_hard_split_respects_char_boundaries() {
        let body = "ż".repeat(25);
        let chunks = chunk_html(&body, 10);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].chars().count(), 10);
        assert_eq!(chunks.concat(), body);
    }

    #[test]
    fn test_trailing_text_after_last_block_is_kept() {
        let body = format!("{}\n  ", paragraphs(10));
        let chunks = chunk_html(&body, 120);
        assert_eq!(chunks.concat(), body);
    }

    fn tags_balanced(chunk: &str) -> bool {
        chunk.matches('<').count() == chunk.matches('>').count()
    }

    #[test]
    fn test_sentence_ends_inside_attributes_are_not_cut() {
        let body = format!(
            "<p>{}<img alt=\"A cat. Asleep on a mat. Dreaming.\" src=\"images/pic.png\"/> {}</p>",
            "Short words here. ".repeat(3),
            "More text. ".repeat(3)
        );
        let chunks = chunk_html(&body, 70);

        assert!(chunks.len() > 1);
        assert_eq!(chunks.concat(), body);
        assert!(chunks.iter().all(|c| tags_balanced(c)));
        assert!(chunks
            .iter()
            .any(|c| c.contains(r#"<img alt="A cat. Asleep on a mat. Dreaming." src="images/pic.png"/>"#)));
    }

    #[test]
    fn test_hard_split_moves_past_tags() {
        let img = format!(r#"<img src="{}.png"/>"#, "b".repeat(40));
        let body = format!("<p>{}{}{}</p>", "a".repeat(30), img, "c".repeat(30));
        let chunks = chunk_html(&body, 50);

        assert_eq!(chunks.concat(), body);
        assert!(chunks.iter().all(|c| tags_balanced(c)));
        assert!(chunks.iter().any(|c| c.contains(&img)));
    }
}
