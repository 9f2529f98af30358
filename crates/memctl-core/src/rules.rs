//! Deterministic rule-based compression

use std::collections::HashSet;

use crate::fence::{map_text_spans, split_fenced};
use crate::markdown::{collapse_blank_lines, header_of, trim_trailing_whitespace};

/// Lines that take part in duplicate removal: anything with a letter or
/// digit that is not a header. Separators, rules and headers are structure.
fn dedupable(line: &str) -> bool {
    line.chars().any(char::is_alphanumeric) && header_of(line).is_none()
}

fn dedup_lines(text: &str, seen: &mut HashSet<String>) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.split_inclusive('\n') {
        let key = line.trim();
        if dedupable(key) && !seen.insert(key.to_string()) {
            continue;
        }
        out.push_str(line);
    }
    out
}

/// Rule compression: drop repeated lines (first occurrence wins), trim
/// trailing whitespace, collapse blank runs to two lines and end the text
/// with exactly one newline. Fenced code is left alone, including the
/// trailing blank lines of a fence left open at the end of the text.
///
/// Idempotent. Whitespace-only input yields the empty string.
pub fn rule_compress(text: &str) -> String {
    if text.trim().is_empty() {
        return String::new();
    }

    let mut seen = HashSet::new();
    let compressed = map_text_spans(text, |span| {
        let trimmed = trim_trailing_whitespace(span);
        let deduped = dedup_lines(&trimmed, &mut seen);
        collapse_blank_lines(&deduped)
    });

    let ends_in_code = split_fenced(&compressed)
        .last()
        .is_some_and(|span| span.is_code());
    let mut out = if ends_in_code {
        compressed
    } else {
        compressed.trim_end_matches(['\n', '\r']).to_string()
    };
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}
