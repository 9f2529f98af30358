//! Rewrites aimed at BPE tokenizer inefficiencies

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

use memctl_core::{map_text_spans, rewrite_tables, Table};
use memctl_tokens::estimate_tokens;

static BOLD_RE: OnceLock<Regex> = OnceLock::new();
static ITALIC_RE: OnceLock<Regex> = OnceLock::new();
static BACKTICK_RE: OnceLock<Regex> = OnceLock::new();
static BULLET_RE: OnceLock<Regex> = OnceLock::new();

/// Fullwidth and typographic punctuation with ASCII equivalents
const PUNCTUATION: &[(char, &str)] = &[
    ('，', ","),
    ('。', "."),
    ('；', ";"),
    ('：', ":"),
    ('！', "!"),
    ('？', "?"),
    ('“', "\""),
    ('”', "\""),
    ('‘', "'"),
    ('’', "'"),
    ('（', "("),
    ('）', ")"),
    ('【', "["),
    ('】', "]"),
    ('、', ","),
    ('…', "..."),
    ('～', "~"),
];

pub fn normalize_punctuation(text: &str) -> String {
    map_text_spans(text, |span| {
        let span = span.replace("——", "--");
        let mut out = String::with_capacity(span.len());
        for c in span.chars() {
            match PUNCTUATION.iter().find(|(from, _)| *from == c) {
                Some((_, to)) => out.push_str(to),
                None => out.push(c),
            }
        }
        out
    })
}

fn table_lines(table: &Table) -> Vec<String> {
    if table.columns() == 2 {
        return table
            .rows
            .iter()
            .filter(|row| !row[0].is_empty() || !row[1].is_empty())
            .map(|row| format!("{}: {}", row[0], row[1]))
            .collect();
    }
    let mut lines = vec![table.header.join("|")];
    lines.extend(table.rows.iter().map(|row| row.join("|")));
    lines
}

/// Two-column tables become `key: value` lines; wider tables become bare
/// pipe-joined rows under a compact header. A table that would not get
/// cheaper is left alone.
pub fn compress_table_to_kv(text: &str) -> String {
    let out = rewrite_tables(text, |table| {
        let lines = table_lines(table);
        if !lines.is_empty()
            && estimate_tokens(&lines.join("\n")) <= estimate_tokens(&table.raw.join("\n")) {
            lines
        } else {
            table.raw.clone()
        }
    });
    if estimate_tokens(&out) > estimate_tokens(text) {
        return text.to_string();
    }
    out
}

fn minimize_line(line: &str) -> String {
    let body = line.trim_start_matches([' ', '\t']);
    let indent = &line[..line.len() - body.len()];
    let mut out = String::with_capacity(line.len());
    if indent.chars().count() > 4 {
        out.push_str("    ");
    } else {
        out.push_str(indent);
    }
    let mut previous_space = false;
    for c in body.chars() {
        if c == ' ' {
            if previous_space {
                continue;
            }
            previous_space = true;
        } else {
            previous_space = false;
        }
        out.push(c);
    }
    out
}

/// Collapse repeated spaces, cap indentation at four spaces and squeeze
/// three or more newlines down to two
pub fn minimize_whitespace(text: &str) -> String {
    map_text_spans(text, |span| {
        let mut out = String::with_capacity(span.len());
        let mut newlines = 0;
        for line in span.split_inclusive('\n') {
            let content = line.trim_end_matches('\n');
            let content = if content.trim().is_empty() {
                String::new()
            } else {
                minimize_line(content)
            };
            if content.is_empty() && newlines >= 2 {
                // a blank line after a blank line
                continue;
            }
            out.push_str(&content);
            if line.ends_with('\n') {
                out.push('\n');
                newlines = if content.is_empty() { newlines + 1 } else { 1 };
            }
        }
        out
    })
}

/// Remove `**bold**` and `*italic*` wrappers
pub fn strip_bold_italic(text: &str) -> String {
    let bold = BOLD_RE.get_or_init(|| Regex::new(r"\*\*([^*\n]+?)\*\*").unwrap());
    let italic =
        ITALIC_RE.get_or_init(|| Regex::new(r"\*([^*\s](?:[^*\n]*[^*\s])?)\*").unwrap());
    map_text_spans(text, |span| {
        let span = bold.replace_all(span, "$1");
        italic.replace_all(&span, "$1").into_owned()
    })
}

/// Drop backticks around a single word
pub fn strip_trivial_backticks(text: &str) -> String {
    let re = BACKTICK_RE.get_or_init(|| Regex::new(r"`([^`\s]+)`").unwrap());
    map_text_spans(text, |span| re.replace_all(span, "$1").into_owned())
}

fn bullet_re() -> &'static Regex {
    BULLET_RE.get_or_init(|| Regex::new(r"^(\s*)[-*+]\s+(.*)$").unwrap())
}

/// Bullet content that stays plain text once its marker is gone
fn safe_to_unbullet(content: &str) -> bool {
    !content.is_empty() && !content.starts_with(['#', '`', '~', '-', '*', '+', '>', '|'])
}

fn flush_bullets(run: &mut Vec<&str>, out: &mut String) {
    let strip = run.len() >= 3;
    for line in run.drain(..) {
        let (content, terminator) = match line.strip_suffix('\n') {
            Some(c) => (c, "\n"),
            None => (line, ""),
        };
        match bullet_re().captures(content) {
            Some(caps) if strip && safe_to_unbullet(&caps[2]) => {
                out.push_str(&caps[1]);
                out.push_str(&caps[2]);
                out.push_str(terminator);
            }
            _ => out.push_str(line),
        }
    }
}

/// In runs of three or more consecutive bullet lines, drop the markers
pub fn compact_bullets(text: &str) -> String {
    map_text_spans(text, |span| {
        let mut out = String::with_capacity(span.len());
        let mut run: Vec<&str> = Vec::new();
        for line in span.split_inclusive('\n') {
            if bullet_re().is_match(line.trim_end_matches('\n')) {
                run.push(line);
            } else {
                flush_bullets(&mut run, &mut out);
                out.push_str(line);
            }
        }
        flush_bullets(&mut run, &mut out);
        out
    })
}

/// Default: punctuation, tables, whitespace. Aggressive adds markup,
/// backtick and bullet stripping.
pub fn optimize_tokens(text: &str, aggressive: bool) -> String {
    let mut text = normalize_punctuation(text);
    text = compress_table_to_kv(&text);
    if aggressive {
        text = strip_bold_italic(&text);
        text = strip_trivial_backticks(&text);
        text = compact_bullets(&text);
    }
    minimize_whitespace(&text)
}

/// Size of a text before and after optimization
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavingsEstimate {
    pub original_chars: usize,
    pub optimized_chars: usize,
    pub original_tokens: usize,
    pub optimized_tokens: usize,
    pub reduction_pct: f64,
}

pub fn estimate_savings(original: &str, optimized: &str) -> SavingsEstimate {
    let original_tokens = estimate_tokens(original);
    let optimized_tokens = estimate_tokens(optimized);
    let reduction_pct = if original_tokens == 0 {
        0.0
    } else {
        let saved = original_tokens as f64 - optimized_tokens as f64;
        let pct = saved / original_tokens as f64 * 100.0;
        (pct * 10.0).round() / 10.0
    };
    SavingsEstimate {
        original_chars: original.chars().count(),
        optimized_chars: optimized.chars().count(),
        original_tokens,
        optimized_tokens,
        reduction_pct,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_punctuation() {
        assert_eq!(normalize_punctuation("你好，世界。"), "你好,世界.");
        assert_eq!(normalize_punctuation("wait……——ok"), "wait......--ok");
        assert_eq!(normalize_punctuation("“quote”（x）"), "\"quote\"(x)");
        assert_eq!(normalize_punctuation("```\n，\n```\n"), "```\n，\n```\n");
    }

    #[test]
    fn test_two_column_table_to_kv() {
        let text = "| Key | Value |\n|-----|-------|\n| host | db.internal |\n| port | 5432 |\n";
        assert_eq!(compress_table_to_kv(text), "host: db.internal\nport: 5432\n");
    }

    #[test]
    fn test_wide_table_compact_rows() {
        let text = "| Name | Role | Team |\n|---|---|---|\n| ann | lead | core |\n";
        assert_eq!(compress_table_to_kv(text), "Name|Role|Team\nann|lead|core\n");
    }

    #[test]
    fn test_minimize_whitespace() {
        assert_eq!(minimize_whitespace("a  b   c\n"), "a b c\n");
        assert_eq!(minimize_whitespace("        deep\n  two\n"), "    deep\n  two\n");
        assert_eq!(minimize_whitespace("a\n\n\n\nb\n"), "a\n\nb\n");
        assert_eq!(minimize_whitespace("a\n   \n\t\nb"), "a\n\nb");
        assert_eq!(minimize_whitespace("```\na    b\n```\n"), "```\na    b\n```\n");
    }

    #[test]
    fn test_strip_bold_italic() {
        assert_eq!(strip_bold_italic("**bold** and *it* x"), "bold and it x");
        assert_eq!(strip_bold_italic("***both***"), "both");
        assert_eq!(strip_bold_italic("2 * 3 * 4"), "2 * 3 * 4");
        assert_eq!(strip_bold_italic("* bullet"), "* bullet");
    }

    #[test]
    fn test_strip_trivial_backticks() {
        assert_eq!(strip_trivial_backticks("run `cargo` now"), "run cargo now");
        assert_eq!(strip_trivial_backticks("keep `two words`"), "keep `two words`");
    }

    #[test]
    fn test_compact_bullets() {
        assert_eq!(compact_bullets("- a\n- b\n- c\ntext\n"), "a\nb\nc\ntext\n");
        assert_eq!(compact_bullets("- a\n- b\ntext\n"), "- a\n- b\ntext\n");
        assert_eq!(compact_bullets("- a\n- # h\n  * c\n"), "a\n- # h\n  c\n");
    }

    #[test]
    fn test_optimize_modes() {
        let text = "**Note**：use  `make`\n- a\n- b\n- c\n";
        assert_eq!(optimize_tokens(text, false), "**Note**:use `make`\n- a\n- b\n- c\n");
        assert_eq!(optimize_tokens(text, true), "Note:use make\na\nb\nc\n");
    }

    #[test]
    fn test_estimate_savings() {
        let estimate = estimate_savings("abcdefgh", "abcd");
        assert_eq!(estimate.original_tokens, 2);
        assert_eq!(estimate.optimized_tokens, 1);
        assert_eq!(estimate.reduction_pct, 50.0);
        assert_eq!(estimate_savings("", "").reduction_pct, 0.0);
    }
}
