//! Markdown parsing and structural cleanup

use regex::Regex;
use std::sync::OnceLock;

use memctl_tokens::estimate_tokens;

use crate::fence::{map_text_spans, split_fenced};

static HEADER_RE: OnceLock<Regex> = OnceLock::new();
static SEPARATOR_RE: OnceLock<Regex> = OnceLock::new();
static BULLET_RE: OnceLock<Regex> = OnceLock::new();

fn header_re() -> &'static Regex {
    HEADER_RE.get_or_init(|| Regex::new(r"^(#{1,6})\s(.*)$").unwrap())
}

/// One header-delimited slice of a markdown file.
///
/// `header_line + body` over all sections reproduces the file exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// 0 for the preamble, 1-6 for headers
    pub level: u8,
    pub heading: String,
    /// Raw header line including its terminator (empty for the preamble)
    pub header_line: String,
    pub body: String,
    /// 0-based line of the header (or of the preamble start)
    pub start_line: usize,
}

impl Section {
    fn preamble() -> Self {
        Self {
            level: 0,
            heading: String::new(),
            header_line: String::new(),
            body: String::new(),
            start_line: 0,
        }
    }

    pub fn is_preamble(&self) -> bool {
        self.level == 0
    }

    pub fn body_is_blank(&self) -> bool {
        self.body.trim().is_empty()
    }

    /// Header line plus body, as it appears in the file
    pub fn render(&self) -> String {
        format!("{}{}", self.header_line, self.body)
    }
}

/// Header level and text if `line` is a markdown header
pub fn header_of(line: &str) -> Option<(u8, String)> {
    let line = line.trim_end_matches(['\n', '\r']);
    let caps = header_re().captures(line)?;
    let level = caps.get(1)?.as_str().len() as u8;
    let heading = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("");
    Some((level, heading.to_string()))
}

/// Split `text` into sections. Headers inside fenced code are body text.
pub fn parse_sections(text: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut current = Section::preamble();
    let mut line_no = 0;

    for span in split_fenced(text) {
        for line in span.text.split_inclusive('\n') {
            let header = if span.is_code() { None } else { header_of(line) };
            match header {
                Some((level, heading)) => {
                    if !current.header_line.is_empty() || !current.body.is_empty() {
                        sections.push(current);
                    }
                    current = Section {
                        level,
                        heading,
                        header_line: line.to_string(),
                        body: String::new(),
                        start_line: line_no,
                    };
                }
                None => current.body.push_str(line),
            }
            line_no += 1;
        }
    }

    if !current.header_line.is_empty() || !current.body.is_empty() {
        sections.push(current);
    }
    sections
}

/// Whether `c` falls in one of the emoji blocks (or is a joiner/variation selector)
pub fn is_emoji(c: char) -> bool {
    matches!(c as u32,
        0x1F600..=0x1F64F
        | 0x1F300..=0x1F5FF
        | 0x1F680..=0x1F6FF
        | 0x1F1E0..=0x1F1FF
        | 0x2702..=0x27B0
        | 0x1F900..=0x1F9FF
        | 0x1FA00..=0x1FAFF
        | 0x2600..=0x26FF
        | 0xFE0F
        | 0x200D)
}

pub fn has_emoji(text: &str) -> bool {
    split_fenced(text)
        .iter()
        .filter(|s| !s.is_code())
        .any(|s| s.text.chars().any(is_emoji))
}

/// Remove emoji. One space next to a removed run goes with it.
pub fn strip_emoji(text: &str) -> String {
    map_text_spans(text, |span| {
        let mut out = String::with_capacity(span.len());
        let mut chars = span.chars().peekable();
        while let Some(c) = chars.next() {
            if !is_emoji(c) {
                out.push(c);
                continue;
            }
            while chars.peek().copied().is_some_and(is_emoji) {
                chars.next();
            }
            let at_line_start = out.is_empty() || out.ends_with('\n');
            match chars.peek().copied() {
                Some(' ') if at_line_start || out.ends_with(' ') => {
                    chars.next();
                }
                Some('\n') | Some('\r') | None if out.ends_with(' ') => {
                    out.pop();
                }
                _ => {}
            }
        }
        out
    })
}

// ── Tables ─────────────────────────────────────────────────────

/// A pipe table found in a text span
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub header: Vec<String>,
    /// Raw separator cells (`---`, `:--`, `:-:`, ...)
    pub separator: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Source lines without terminators
    pub raw: Vec<String>,
}

impl Table {
    pub fn columns(&self) -> usize {
        self.header.len()
    }
}

fn separator_re() -> &'static Regex {
    SEPARATOR_RE.get_or_init(|| Regex::new(r"^[\s|:\-]+$").unwrap())
}

fn is_separator(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.contains('|') && trimmed.contains('-') && separator_re().is_match(trimmed)
}

fn split_cells(line: &str) -> Vec<String> {
    let trimmed = line.trim();
    let trimmed = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix('|').unwrap_or(trimmed);
    trimmed.split('|').map(|c| c.trim().to_string()).collect()
}

fn parse_table(lines: &[&str]) -> Table {
    let mut header = split_cells(lines[0]);
    let mut separator = split_cells(lines[1]);
    let mut rows: Vec<Vec<String>> = lines[2..].iter().map(|l| split_cells(l)).collect();

    let width = rows
        .iter()
        .map(Vec::len)
        .chain([header.len(), separator.len()])
        .max()
        .unwrap_or(0);
    header.resize(width, String::new());
    separator.resize(width, "---".to_string());
    for row in &mut rows {
        row.resize(width, String::new());
    }
    Table {
        header,
        separator,
        rows,
        raw: lines
            .iter()
            .map(|l| l.trim_end_matches(['\n', '\r']).to_string())
            .collect(),
    }
}

/// Rewrite every pipe table outside fenced code.
///
/// `f` returns the replacement lines (without terminators); an empty vector
/// removes the table.
pub fn rewrite_tables<F>(text: &str, mut f: F) -> String
where
    F: FnMut(&Table) -> Vec<String>,
{
    map_text_spans(text, |span| {
        let lines: Vec<&str> = span.split_inclusive('\n').collect();
        let mut out = String::with_capacity(span.len());
        let mut i = 0;
        while i < lines.len() {
            let starts_table =
                lines[i].contains('|') && i + 1 < lines.len() && is_separator(lines[i + 1]);
            if !starts_table {
                out.push_str(lines[i]);
                i += 1;
                continue;
            }
            let mut end = i + 2;
            while end < lines.len() && lines[end].contains('|') && !lines[end].trim().is_empty() {
                end += 1;
            }
            let table = parse_table(&lines[i..end]);
            let terminated = lines[end - 1].ends_with('\n');
            let replacement = f(&table);
            let count = replacement.len();
            for (n, line) in replacement.into_iter().enumerate() {
                out.push_str(&line);
                if n + 1 < count || terminated {
                    out.push('\n');
                }
            }
            i = end;
        }
        out
    })
}

pub fn has_table(text: &str) -> bool {
    let mut found = false;
    rewrite_tables(text, |_| {
        found = true;
        Vec::new()
    });
    found
}

fn render_row(cells: &[&str]) -> String {
    format!("|{}|", cells.join("|"))
}

fn compact_separator(cell: &str) -> String {
    let left = if cell.starts_with(':') { ":" } else { "" };
    let right = if cell.len() > 1 && cell.ends_with(':') { ":" } else { "" };
    format!("{}---{}", left, right)
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn compact_table(table: &Table) -> Vec<String> {
    let width = table.columns();
    let mut keep = vec![true; width];
    let mut hoisted = Vec::new();

    for col in 0..width {
        if table.rows.iter().all(|r| r[col].is_empty()) && !table.rows.is_empty() {
            keep[col] = false;
            continue;
        }
        if table.rows.len() < 2 {
            continue;
        }
        let value = &table.rows[0][col];
        if value.is_empty() || table.rows.iter().any(|r| &r[col] != value) {
            continue;
        }
        let label = if table.header[col].is_empty() {
            format!("Column {}", col + 1)
        } else {
            table.header[col].clone()
        };
        let note = format!("{}: {} (all rows)", label, value);
        // Cells removed: header, separator and one per row, each with its pipe.
        let removed = char_len(&table.header[col]) + 4 + 1 + table.rows.len() * (char_len(value) + 1);
        if removed > char_len(&note) + 1 {
            keep[col] = false;
            hoisted.push((col, note));
        }
    }

    if !keep.iter().any(|&k| k) && width > 0 {
        keep[0] = true;
        hoisted.retain(|(col, _)| *col != 0);
    }

    fn pick_cells<'a>(cells: &'a [String], keep: &[bool]) -> Vec<&'a str> {
        cells
            .iter()
            .zip(keep)
            .filter(|(_, &k)| k)
            .map(|(c, _)| c.as_str())
            .collect()
    }

    let separator: Vec<String> = pick_cells(&table.separator, &keep)
        .into_iter()
        .map(compact_separator)
        .collect();
    let separator: Vec<&str> = separator.iter().map(String::as_str).collect();

    let mut lines = vec![render_row(&pick_cells(&table.header, &keep)), render_row(&separator)];
    for row in &table.rows {
        lines.push(render_row(&pick_cells(row, &keep)));
    }
    lines.extend(hoisted.into_iter().map(|(_, note)| note));
    lines
}

/// Strip cell padding and drop all-empty or constant columns.
///
/// A constant column is recorded once below the table as
/// `Header: value (all rows)`. A table whose compact form would cost more
/// tokens than its padded form is left as it was.
pub fn compress_markdown_table(text: &str) -> String {
    rewrite_tables(text, |table| {
        let compact = compact_table(table);
        if estimate_tokens(&compact.join("\n")) <= estimate_tokens(&table.raw.join("\n")) {
            compact
        } else {
            table.raw.clone()
        }
    })
}

// ── Line-level cleanup ─────────────────────────────────────────

/// Trim trailing whitespace on every line, keeping line terminators
pub fn trim_trailing_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.split_inclusive('\n') {
        let terminated = line.ends_with('\n');
        out.push_str(line.trim_end());
        if terminated {
            out.push('\n');
        }
    }
    out
}

/// Collapse runs of three or more blank lines to two
pub fn collapse_blank_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;
    for line in text.split_inclusive('\n') {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 2 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
    }
    out
}

fn drop_consecutive_duplicates(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous: Option<&str> = None;
    for line in text.split_inclusive('\n') {
        let key = line.trim_end();
        if !key.is_empty() && previous == Some(key) {
            continue;
        }
        previous = Some(key);
        out.push_str(line);
    }
    out
}

/// Collapse blank runs, trim trailing whitespace and drop consecutive
/// duplicate lines
pub fn strip_markdown_redundancy(text: &str) -> String {
    map_text_spans(text, |span| {
        let trimmed = trim_trailing_whitespace(span);
        let deduped = drop_consecutive_duplicates(&trimmed);
        collapse_blank_lines(&deduped)
    })
}

// ── Bullets ────────────────────────────────────────────────────

const SIMILAR_BULLET_RATIO: f64 = 0.80;
const SHORT_BULLET_WORDS: usize = 3;
const SHORT_BULLET_RUN: usize = 10;

fn bullet_re() -> &'static Regex {
    BULLET_RE.get_or_init(|| Regex::new(r"^(\s*[-*+]\s+)(.*)$").unwrap())
}

/// Bullet marker (with its indent and trailing blanks) and content
fn bullet_parts(line: &str) -> Option<(&str, &str)> {
    let caps = bullet_re().captures(line.trim_end_matches(['\n', '\r']))?;
    Some((caps.get(1)?.as_str(), caps.get(2)?.as_str()))
}

fn longest_common_block(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    let mut prev = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        let mut row = vec![0usize; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            if ca == cb {
                let len = prev[j] + 1;
                row[j + 1] = len;
                if len > best.2 {
                    best = (i + 1 - len, j + 1 - len, len);
                }
            }
        }
        prev = row;
    }
    best
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    let (i, j, len) = longest_common_block(a, b);
    if len == 0 {
        return 0;
    }
    len + matching_chars(&a[..i], &b[..j]) + matching_chars(&a[i + len..], &b[j + len..])
}

/// Ratcliff/Obershelp similarity `2M / (|a| + |b|)` over chars, where `M`
/// counts the chars in recursively matched longest common blocks.
/// Two empty strings are identical.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_chars(&a, &b) as f64 / total as f64
}

fn flush_similar(group: &mut Vec<(&str, &str)>, threshold: f64, out: &mut String) {
    let mut dropped = vec![false; group.len()];
    for i in 0..group.len() {
        if dropped[i] {
            continue;
        }
        for j in i + 1..group.len() {
            if dropped[j] || similarity(group[i].1, group[j].1) < threshold {
                continue;
            }
            if group[j].1.chars().count() > group[i].1.chars().count() {
                dropped[i] = true;
                break;
            }
            dropped[j] = true;
        }
    }
    for ((line, _), drop) in group.drain(..).zip(dropped) {
        if !drop {
            out.push_str(line);
        }
    }
}

/// Within each run of consecutive bullet lines, drop a bullet whose content
/// is at least `threshold` similar to another one, keeping the longer.
/// On equal length the earlier bullet stays.
pub fn merge_similar_bullets(text: &str, threshold: f64) -> String {
    map_text_spans(text, |span| {
        let mut out = String::with_capacity(span.len());
        let mut group = Vec::new();
        for line in span.split_inclusive('\n') {
            match bullet_parts(line) {
                Some((_, content)) => group.push((line, content)),
                None => {
                    flush_similar(&mut group, threshold, &mut out);
                    out.push_str(line);
                }
            }
        }
        flush_similar(&mut group, threshold, &mut out);
        out
    })
}

fn flush_short(run: &mut Vec<(&str, &str, &str)>, out: &mut String) {
    if run.len() < 3 {
        for (line, _, _) in run.drain(..) {
            out.push_str(line);
        }
        return;
    }
    let prefix = run[0].1;
    let items: Vec<&str> = run.iter().map(|(_, _, content)| content.trim()).collect();
    let last = run[run.len() - 1].0;
    out.push_str(prefix);
    out.push_str(&items.join(", "));
    out.push_str(&last[last.trim_end_matches(['\n', '\r']).len()..]);
    run.clear();
}

/// Fold runs of three or more consecutive bullets of at most `max_words`
/// words into one comma-joined bullet. A run holds at most `max_merge`
/// items; bullets with a different marker or indent start a new run.
pub fn merge_short_bullets(text: &str, max_words: usize, max_merge: usize) -> String {
    map_text_spans(text, |span| {
        let mut out = String::with_capacity(span.len());
        let mut run: Vec<(&str, &str, &str)> = Vec::new();
        for line in span.split_inclusive('\n') {
            let short = bullet_parts(line).filter(|(_, content)| {
                let words = content.split_whitespace().count();
                words > 0 && words <= max_words
            });
            match short {
                Some((prefix, content)) => {
                    if run.first().is_some_and(|(_, p, _)| *p != prefix) {
                        flush_short(&mut run, &mut out);
                    }
                    run.push((line, prefix, content));
                    if run.len() >= max_merge {
                        flush_short(&mut run, &mut out);
                    }
                }
                None => {
                    flush_short(&mut run, &mut out);
                    out.push_str(line);
                }
            }
        }
        flush_short(&mut run, &mut out);
        out
    })
}

// ── Sections ───────────────────────────────────────────────────

fn empty_leaf_flags(sections: &[Section]) -> Vec<bool> {
    sections
        .iter()
        .enumerate()
        .map(|(idx, section)| {
            let has_child = sections
                .get(idx + 1)
                .is_some_and(|next| next.level > section.level);
            !section.is_preamble() && section.body_is_blank() && !has_child
        })
        .collect()
}

/// Number of header sections with a blank body and no children
pub fn count_empty_sections(text: &str) -> usize {
    let sections = parse_sections(text);
    empty_leaf_flags(&sections).into_iter().filter(|&e| e).count()
}

/// Drop header sections whose body is blank. A header that has child
/// sections is kept.
pub fn remove_empty_sections(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let sections = parse_sections(&current);
        let empty = empty_leaf_flags(&sections);
        if !empty.iter().any(|&e| e) {
            return current;
        }
        current = sections
            .iter()
            .zip(empty)
            .filter(|(_, e)| !e)
            .map(|(s, _)| s.render())
            .collect();
    }
}

/// Structural cleanup used by `compress --clean`
pub fn markdown_cleanup(text: &str) -> String {
    let text = strip_emoji(text);
    let text = remove_empty_sections(&text);
    let text = compress_markdown_table(&text);
    let text = merge_similar_bullets(&text, SIMILAR_BULLET_RATIO);
    let text = merge_short_bullets(&text, SHORT_BULLET_WORDS, SHORT_BULLET_RUN);
    strip_markdown_redundancy(&text)
}
