//! Slug-safe filename derivation from a request URL.

/// Longest slug kept, measured from the tail: for CDN-style URLs the tail is
/// far more discriminating than the head.
const MAX_SLUG_LEN: usize = 248;

/// Derive `<slug>.<ext>` from the request URL.
///
/// The material is everything after the last `/`, including any query
/// string - query parameters often carry the only uniqueness a CDN URL has.
/// One occurrence of `.<ext>` is stripped so the extension is not doubled.
pub fn derive_filename(request_url: &str, extension: &str) -> String {
    let segment = request_url.rsplit('/').next().unwrap_or(request_url);
    let stem = segment.replacen(&format!(".{extension}"), "", 1);

    let slug = slugify(&stem);
    let slug = tail(&slug, MAX_SLUG_LEN);
    let slug = slug.strip_prefix('-').unwrap_or(slug);
    let slug = slug.strip_suffix('-').unwrap_or(slug);
    let slug = if slug.is_empty() { "media" } else { slug };

    format!("{slug}.{extension}")
}

/// Minimal-change slugification: safe characters pass through (letters
/// lowercased), every run of anything else collapses to a single `-`.
///
/// `%` is kept so percent-encoded triplets survive as filename material.
fn slugify(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_dash = false;
    for c in input.chars() {
        let mapped = match c {
            'a'..='z' | '0'..='9' | '.' | '_' | '~' | '%' => Some(c),
            'A'..='Z' => Some(c.to_ascii_lowercase()),
            _ => None,
        };
        match mapped {
            Some(c) => {
                if pending_dash && !out.is_empty() {
                    out.push('-');
                }
                pending_dash = false;
                out.push(c);
            }
            None => pending_dash = true,
        }
    }
    out
}

/// Last `n` bytes of an ASCII slug.
///
/// May split a percent-encoded triplet; the result is still filesystem-safe.
fn tail(s: &str, n: usize) -> &str {
    if s.len() <= n {
        s
    } else {
        &s[s.len() - n..]
    }
}
