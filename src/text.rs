//! Text helpers for Telegram HTML messages.

use std::sync::LazyLock;

use regex::Regex;

/// Telegram's hard limit for one message.
pub const TELEGRAM_MAX_LEN: usize = 4096;

/// Chunk size for long generated reports, leaving room for the part header.
pub const REPORT_CHUNK_LEN: usize = 4000;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("static regex"));

/// Escape text for Telegram HTML parse mode.
pub fn escape(s: &str) -> String {
    teloxide::utils::html::escape(s)
}

/// Truncate to `max` characters, appending `...` when cut.
pub fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((idx, _)) => format!("{}...", &s[..idx]),
    }
}

/// Collapse runs of whitespace (arXiv titles and abstracts contain hard wraps).
pub fn squash_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove HTML tags and decode the entities `escape` produces.
pub fn strip_html(s: &str) -> String {
    TAG_RE
        .replace_all(s, "")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Split a Telegram HTML message into pieces of about `max` characters.
///
/// Prefers paragraph breaks, then line breaks, then spaces, all outside any
/// element. Never cuts inside a tag or an entity. An element that has to be
/// cut is closed at the end of one piece and reopened at the start of the
/// next, so a piece can exceed `max` by those tags.
pub fn split_message(text: &str, max: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut rest = text.trim().to_string();

    while !rest.is_empty() {
        if rest.chars().count() <= max {
            chunks.push(rest);
            break;
        }

        let limit = rest.char_indices().nth(max).map(|(i, _)| i).unwrap_or(rest.len());
        let Some(cut) = pick_cut(&rest, limit) else {
            chunks.push(rest);
            break;
        };

        let mut chunk = rest[..cut.index].trim_end().to_string();
        for (name, _) in cut.open.iter().rev() {
            chunk.push_str(&format!("</{name}>"));
        }
        chunks.push(chunk);

        let reopen: String = cut.open.iter().map(|(_, markup)| markup.as_str()).collect();
        rest = format!("{reopen}{}", rest[cut.index..].trim_start());
        if strip_html(&rest).trim().is_empty() {
            break;
        }
    }

    chunks
}

/// A byte offset where a message may be cut, with the elements open there
/// as `(name, opening markup)`.
struct Cut {
    index: usize,
    open: Vec<(String, String)>,
}

/// Every offset outside tags and entities that has visible text before it.
fn cut_points(text: &str) -> Vec<Cut> {
    let mut out = Vec::new();
    let mut open: Vec<(String, String)> = Vec::new();
    let mut tag_start: Option<usize> = None;
    let mut in_entity = false;
    let mut has_content = false;

    for (i, c) in text.char_indices() {
        if tag_start.is_none() && !in_entity && has_content {
            out.push(Cut { index: i, open: open.clone() });
        }
        match (tag_start, c) {
            (None, '<') => tag_start = Some(i),
            (Some(start), '>') => {
                let inner = &text[start + 1..i];
                if let Some(name) = inner.strip_prefix('/') {
                    let name = name.trim();
                    if let Some(pos) = open.iter().rposition(|(n, _)| n == name) {
                        open.truncate(pos);
                    }
                } else if !inner.ends_with('/') {
                    let name = inner.split_whitespace().next().unwrap_or_default().to_string();
                    open.push((name, text[start..=i].to_string()));
                }
                tag_start = None;
            }
            (Some(_), _) => {}
            (None, '&') => in_entity = true,
            (None, ';') if in_entity => {
                in_entity = false;
                has_content = true;
            }
            (None, c) if in_entity => in_entity = !c.is_whitespace(),
            (None, c) => has_content |= !c.is_whitespace(),
        }
    }
    out
}

/// 0 paragraph break, 1 line break, 2 space, 3 anything else.
fn break_rank(text: &str, index: usize) -> u8 {
    let after = &text[index..];
    if after.starts_with("\n\n") {
        0
    } else if after.starts_with('\n') {
        1
    } else if after.starts_with(' ') {
        2
    } else {
        3
    }
}

/// The best cut at or before `limit`, or the first one after it when a
/// single word or entity is longer than the limit.
fn pick_cut(text: &str, limit: usize) -> Option<Cut> {
    // (outside every element, worst acceptable rank), best first
    const ORDER: [(bool, u8); 7] = [(true, 0), (true, 1), (true, 2), (false, 1), (false, 2), (true, 3), (false, 3)];

    let mut points = cut_points(text);
    let within = points.iter().rposition(|p| p.index <= limit);
    let chosen = within.and_then(|last| {
        ORDER.iter().find_map(|&(balanced, rank)| {
            points[..=last]
                .iter()
                .rposition(|p| (!balanced || p.open.is_empty()) && break_rank(text, p.index) <= rank)
        })
    });
    match chosen {
        Some(i) => Some(points.swap_remove(i)),
        None if points.is_empty() => None,
        None => Some(points.swap_remove(0)),
    }
}

/// Split a long report and label each piece `Part i/n` when there is more than one.
pub fn split_into_parts(text: &str, max: usize) -> Vec<String> {
    let chunks = split_message(text, max);
    let total = chunks.len();
    if total <= 1 {
        return chunks;
    }
    chunks
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| format!("📄 Part {}/{}\n\n{}", i + 1, total, chunk))
        .collect()
}

/// File name for a downloaded paper: alphanumerics, spaces, `-` and `_`, at most 50 chars.
pub fn sanitize_filename(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .take(50)
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        "paper.pdf".to_string()
    } else {
        format!("{cleaned}.pdf")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world", 5), "hello...");
        assert_eq!(truncate("héllo", 2), "hé...");
    }

    #[test]
    fn test_strip_html_round_trips_escape() {
        let raw = "a < b & \"c\"";
        let html = format!("<b>{}</b>", escape(raw));
        assert_eq!(strip_html(&html), raw);
    }

    #[test]
    fn test_split_short_message() {
        assert_eq!(split_message("short", 100), vec!["short"]);
        assert!(split_message("   ", 100).is_empty());
    }

    #[test]
    fn test_split_prefers_paragraphs() {
        let text = format!("{}\n\n{}", "a".repeat(30), "b".repeat(30));
        let chunks = split_message(&text, 40);
        assert_eq!(chunks, vec!["a".repeat(30), "b".repeat(30)]);
    }

    #[test]
    fn test_split_hard_cuts_long_words() {
        let text = "x".repeat(25);
        let chunks = split_message(&text, 10);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_split_keeps_elements_balanced() {
        let text = format!("<b>{}</b>", ["alpha"; 8].join(" "));
        let chunks = split_message(&text, 20);
        assert_eq!(chunks.len(), 3);
        for chunk in &chunks {
            assert!(chunk.starts_with("<b>") && chunk.ends_with("</b>"), "unbalanced: {chunk}");
        }
        let words: Vec<String> = chunks.iter().map(|c| strip_html(c)).collect();
        assert_eq!(words.join(" "), ["alpha"; 8].join(" "));
    }

    #[test]
    fn test_split_never_cuts_tags_or_entities() {
        let link = "<a href=\"https://arxiv.org/abs/1\">link</a>";
        let text = format!("{} {link}", "a".repeat(10));
        assert_eq!(split_message(&text, 45), vec!["a".repeat(10), link.to_string()]);

        let chunks = split_message(&"&amp;".repeat(10), 12);
        assert_eq!(chunks.len(), 5);
        assert!(chunks.iter().all(|c| c == "&amp;&amp;"));
    }

    #[test]
    fn test_split_into_parts_labels() {
        let text = format!("{} {}", "a".repeat(20), "b".repeat(20));
        let parts = split_into_parts(&text, 25);
        assert_eq!(parts.len(), 2);
        assert!(parts[0].starts_with("📄 Part 1/2"));
        assert!(parts[1].starts_with("📄 Part 2/2"));
        assert_eq!(split_into_parts("tiny", 25), vec!["tiny"]);
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("Attention: Is All/You Need?"), "Attention Is AllYou Need.pdf");
        assert_eq!(sanitize_filename("???"), "paper.pdf");
        let long = "a".repeat(80);
        assert_eq!(sanitize_filename(&long), format!("{}.pdf", "a".repeat(50)));
    }

    #[test]
    fn test_squash_whitespace() {
        assert_eq!(squash_whitespace("Deep\n  Learning\tfor  All"), "Deep Learning for All");
    }
}
