//! Locates domain-rooted URL references inside JSON-encoded document bodies.
//!
//! Content arrives as a serialized document string (mobiledoc/lexical), so
//! references end at JSON string delimiters and escape sequences as well as
//! at ordinary URL boundaries.

use regex::Regex;

/// Find every reference starting at `domain` in `content`.
///
/// A match runs from the domain to the nearest terminator: `"`, `)`, `'`,
/// whitespace, `<`, `\`, `&quot;`, a comma immediately followed by
/// `http(s)://`, or end of input. Matching is case-insensitive; the caller
/// dedupes before fetching.
pub fn find_references(content: &str, domain: &str) -> Vec<String> {
    let pattern = Regex::new(&format!("(?i){}", regex::escape(domain)))
        .expect("escaped domain literal is a valid pattern");

    let mut references = Vec::new();
    let mut last_end = 0;
    for m in pattern.find_iter(content) {
        // A domain occurrence nested inside a previous match is already
        // part of that reference.
        if m.start() < last_end {
            continue;
        }
        let end = terminator_index(content, m.start());
        last_end = end;

        let raw = &content[m.start()..end];
        let raw = raw.strip_suffix(',').unwrap_or(raw);
        if !raw.is_empty() {
            references.push(raw.to_string());
        }
    }
    references
}

/// Byte index of the first terminator at or after `from`.
fn terminator_index(content: &str, from: usize) -> usize {
    let tail = &content[from..];
    for (offset, c) in tail.char_indices() {
        let rest = &tail[offset..];
        match c {
            '"' | ')' | '\'' | '<' | '\\' => return from + offset,
            '&' if rest.starts_with("&quot;") => return from + offset,
            ',' if followed_by_http(&rest[1..]) => return from + offset,
            c if c.is_whitespace() => return from + offset,
            _ => {}
        }
    }
    content.len()
}

fn followed_by_http(rest: &str) -> bool {
    let lower = rest.get(..8).map(|s| s.to_ascii_lowercase());
    match lower {
        Some(head) => head.starts_with("http://") || head.starts_with("https://"),
        None => {
            let head = rest.to_ascii_lowercase();
            head.starts_with("http://")
        }
    }
}
