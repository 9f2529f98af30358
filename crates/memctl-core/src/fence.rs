//! Fenced code block tokenizer.
//!
//! Every transform in the toolkit works on the text spans produced here and
//! leaves code spans untouched, so "inside a fence" has exactly one meaning.

/// What a span contains
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanKind {
    Text,
    Code,
}

/// A contiguous slice of the input. Concatenating all spans reproduces it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span<'a> {
    pub kind: SpanKind,
    pub text: &'a str,
}

impl<'a> Span<'a> {
    pub fn is_code(&self) -> bool {
        self.kind == SpanKind::Code
    }
}

/// Fence opener on this line: (fence char, run length)
fn fence_open(line: &str) -> Option<(char, usize)> {
    let trimmed = line.trim_start_matches([' ', '\t']);
    let first = trimmed.chars().next()?;
    if first != '`' && first != '~' {
        return None;
    }
    let run = trimmed.chars().take_while(|&c| c == first).count();
    if run >= 3 {
        Some((first, run))
    } else {
        None
    }
}

fn fence_closes(line: &str, fence: char, len: usize) -> bool {
    let trimmed = line.trim_start_matches([' ', '\t']);
    let run = trimmed.chars().take_while(|&c| c == fence).count();
    run >= len && trimmed[run * fence.len_utf8()..].trim().is_empty()
}

/// Split `text` into alternating text and code spans.
///
/// A fence opens on a line starting (after blanks) with at least three
/// backticks or tildes and closes on a later line with at least as many of
/// the same character. An unclosed fence runs to the end of the input.
pub fn split_fenced(text: &str) -> Vec<Span<'_>> {
    let mut spans = Vec::new();
    let mut start = 0;
    let mut pos = 0;
    let mut open: Option<(char, usize)> = None;

    for line in text.split_inclusive('\n') {
        let line_end = pos + line.len();
        match open {
            None => {
                if let Some(fence) = fence_open(line) {
                    if pos > start {
                        spans.push(Span {
                            kind: SpanKind::Text,
                            text: &text[start..pos],
                        });
                    }
                    start = pos;
                    open = Some(fence);
                }
            }
            Some((fence, len)) => {
                if fence_closes(line, fence, len) {
                    spans.push(Span {
                        kind: SpanKind::Code,
                        text: &text[start..line_end],
                    });
                    start = line_end;
                    open = None;
                }
            }
        }
        pos = line_end;
    }

    if start < text.len() {
        let kind = if open.is_some() {
            SpanKind::Code
        } else {
            SpanKind::Text
        };
        spans.push(Span {
            kind,
            text: &text[start..],
        });
    }
    spans
}

/// Apply `f` to every text span, copying code spans verbatim
pub fn map_text_spans<F>(text: &str, mut f: F) -> String
where
    F: FnMut(&str) -> String,
{
    let mut out = String::with_capacity(text.len());
    for span in split_fenced(text) {
        match span.kind {
            SpanKind::Text => out.push_str(&f(span.text)),
            SpanKind::Code => out.push_str(span.text),
        }
    }
    out
}

/// Byte ranges of every fenced code span
pub fn code_ranges(text: &str) -> Vec<std::ops::Range<usize>> {
    let mut ranges = Vec::new();
    let mut offset = 0;
    for span in split_fenced(text) {
        let end = offset + span.text.len();
        if span.is_code() {
            ranges.push(offset..end);
        }
        offset = end;
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_fences_single_text_span() {
        let spans = split_fenced("a\nb\n");
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].kind, SpanKind::Text);
    }

    #[test]
    fn test_fence_split_reassembles() {
        let text = "before\n```rust\nlet x = 1;\n```\nafter\n";
        let spans = split_fenced(text);
        let kinds: Vec<SpanKind> = spans.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![SpanKind::Text, SpanKind::Code, SpanKind::Text]);
        assert_eq!(spans[1].text, "```rust\nlet x = 1;\n```\n");
        let joined: String = spans.iter().map(|s| s.text).collect();
        assert_eq!(joined, text);
    }

    #[test]
    fn test_closing_fence_needs_same_char_and_length() {
        let text = "````\n```\n~~~~\n````\ntail";
        let spans = split_fenced(text);
        assert_eq!(spans[0].kind, SpanKind::Code);
        assert_eq!(spans[0].text, "````\n```\n~~~~\n````\n");
        assert_eq!(spans[1].text, "tail");
    }

    #[test]
    fn test_unclosed_fence_runs_to_end() {
        let spans = split_fenced("x\n~~~\ncode\nmore");
        assert_eq!(spans.len(), 2);
        assert!(spans[1].is_code());
        assert_eq!(spans[1].text, "~~~\ncode\nmore");
    }

    #[test]
    fn test_map_text_spans_skips_code() {
        let text = "hello\n```\nhello\n```\nhello";
        let out = map_text_spans(text, |t| t.replace("hello", "bye"));
        assert_eq!(out, "bye\n```\nhello\n```\nbye");
    }

    #[test]
    fn test_code_ranges() {
        let text = "a\n```\nb\n```\n";
        let ranges = code_ranges(text);
        assert_eq!(ranges, vec![2..text.len()]);
    }
}
