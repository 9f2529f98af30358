//! Dictionary codec: frequent phrases learned from the workspace are replaced
//! by short `$XX` codes.
//!
//! All codes in one codebook have the same width, so the code set is
//! prefix-free. A literal `$` is doubled only where the decoder would
//! otherwise misread it, which keeps `decompress(compress(t)) == t` for any
//! input.

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::Path;

use memctl_core::{map_text_spans, split_fenced, CodebookConfig, CompactError, Result};
use memctl_tokens::atomic_write;

/// Code prefixes owned by the RLE codec
const RESERVED: [&str; 2] = ["WS", "IP"];
const TWO_LETTER_CAPACITY: usize = 26 * 26 - RESERVED.len();
const MIN_NGRAM: usize = 2;
const MAX_NGRAM: usize = 6;

/// Ordered phrase -> code mapping
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Codebook {
    /// (phrase, code) in rank order
    entries: Vec<(String, String)>,
}

fn is_code_like(s: &str) -> bool {
    s.strip_prefix('$')
        .is_some_and(|rest| (2..=3).contains(&rest.len()) && rest.bytes().all(|b| b.is_ascii_uppercase()))
}

impl Codebook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from (phrase, code) pairs, rejecting anything that would make
    /// decoding ambiguous
    pub fn from_pairs(pairs: Vec<(String, String)>) -> std::result::Result<Self, String> {
        let mut width = None;
        let mut codes = BTreeSet::new();
        let mut phrases = BTreeSet::new();
        for (phrase, code) in &pairs {
            if phrase.is_empty() {
                return Err(format!("empty phrase for code {}", code));
            }
            if !is_code_like(code) {
                return Err(format!("invalid code {:?}", code));
            }
            let letters = &code[1..];
            if RESERVED.iter().any(|r| letters.starts_with(r)) {
                return Err(format!("code {} collides with a reserved token", code));
            }
            match width {
                None => width = Some(letters.len()),
                Some(w) if w != letters.len() => {
                    return Err("codes of mixed width are not prefix-free".to_string())
                }
                Some(_) => {}
            }
            if !codes.insert(code.as_str()) {
                return Err(format!("duplicate code {}", code));
            }
            if !phrases.insert(phrase.as_str()) {
                return Err(format!("duplicate phrase {:?}", phrase));
            }
        }
        Ok(Self { entries: pairs })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// (phrase, code) pairs in rank order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(p, c)| (p.as_str(), c.as_str()))
    }

    pub fn code_for(&self, phrase: &str) -> Option<&str> {
        self.iter().find(|(p, _)| *p == phrase).map(|(_, c)| c)
    }

    pub fn phrase_for(&self, code: &str) -> Option<&str> {
        self.iter().find(|(_, c)| *c == code).map(|(p, _)| p)
    }

    /// Letters per code (0 for an empty codebook)
    pub fn code_width(&self) -> usize {
        self.entries.first().map_or(0, |(_, c)| c.len() - 1)
    }

    fn letter_index(&self) -> HashMap<&str, usize> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, (_, code))| (&code[1..], i))
            .collect()
    }
}

impl Serialize for Codebook {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (phrase, code) in &self.entries {
            map.serialize_entry(phrase, code)?;
        }
        map.end()
    }
}

struct CodebookVisitor;

impl<'de> Visitor<'de> for CodebookVisitor {
    type Value = Codebook;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of phrases to codes")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Codebook, A::Error> {
        let mut pairs: Vec<(String, String)> = Vec::new();
        while let Some((key, value)) = access.next_entry::<String, String>()? {
            pairs.push((key, value));
        }
        // {code: phrase} as written by older tools
        let flipped = !pairs.is_empty()
            && pairs.iter().all(|(k, _)| is_code_like(k))
            && !pairs.iter().all(|(_, v)| is_code_like(v));
        if flipped {
            pairs = pairs.into_iter().map(|(code, phrase)| (phrase, code)).collect();
        }
        Codebook::from_pairs(pairs).map_err(de::Error::custom)
    }
}

impl<'de> Deserialize<'de> for Codebook {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_map(CodebookVisitor)
    }
}

// ── Building ───────────────────────────────────────────────────

/// Words usable inside a phrase: no inline code, no `$`, at least one
/// letter or digit (so markers like `##` or `-` never get encoded)
fn phrase_token(word: &str) -> bool {
    !word.contains('`') && !word.contains('$') && word.chars().any(char::is_alphanumeric)
}

fn count_ngrams(text: &str, counts: &mut HashMap<String, usize>) {
    for span in split_fenced(text) {
        if span.is_code() {
            continue;
        }
        for line in span.text.lines() {
            let words: Vec<&str> = line.split_whitespace().collect();
            for run in words.split(|w| !phrase_token(w)) {
                for n in MIN_NGRAM..=MAX_NGRAM.min(run.len()) {
                    for window in run.windows(n) {
                        *counts.entry(window.join(" ")).or_insert(0) += 1;
                    }
                }
            }
        }
    }
}

fn generate_codes(n: usize, width: usize) -> Vec<String> {
    let total = 26usize.pow(width as u32);
    let mut codes = Vec::with_capacity(n);
    for mut idx in 0..total {
        if codes.len() >= n {
            break;
        }
        let mut letters = vec![b'A'; width];
        for slot in letters.iter_mut().rev() {
            *slot = b'A' + (idx % 26) as u8;
            idx /= 26;
        }
        let letters = String::from_utf8_lossy(&letters).to_string();
        if RESERVED.iter().any(|r| letters.starts_with(r)) {
            continue;
        }
        codes.push(format!("${}", letters));
    }
    codes
}

/// Learn a codebook from the corpus.
///
/// Candidates are 2- to 6-word n-grams outside fenced code, kept when they
/// occur at least `min_freq` times and are at least `min_phrase_len` chars.
/// They are ranked by `freq * (len - code_len)`; a candidate overlapping an
/// already chosen phrase as a substring is skipped.
pub fn build_codebook<S: AsRef<str>>(texts: &[S], config: &CodebookConfig) -> Codebook {
    let mut counts = HashMap::new();
    for text in texts {
        count_ngrams(text.as_ref(), &mut counts);
    }

    let width = if config.max_entries <= TWO_LETTER_CAPACITY { 2 } else { 3 };
    let code_len = width + 1;

    let mut candidates: Vec<(String, usize)> = counts
        .into_iter()
        .filter_map(|(phrase, freq)| {
            let len = phrase.chars().count();
            if freq < config.min_freq || len < config.min_phrase_len || len <= code_len {
                return None;
            }
            Some((phrase, freq * (len - code_len)))
        })
        .collect();
    candidates.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let mut selected: Vec<String> = Vec::new();
    for (phrase, _) in candidates {
        if selected.len() >= config.max_entries {
            break;
        }
        let overlaps = selected
            .iter()
            .any(|s| s.contains(phrase.as_str()) || phrase.contains(s.as_str()));
        if !overlaps {
            selected.push(phrase);
        }
    }

    let codes = generate_codes(selected.len(), width);
    let entries: Vec<(String, String)> = selected.into_iter().zip(codes).collect();
    tracing::debug!("codebook built with {} entries", entries.len());
    Codebook { entries }
}

// ── Encoding ───────────────────────────────────────────────────

enum Piece {
    Lit(String),
    Code(usize),
}

enum Item {
    Char(char),
    Code(usize),
}

fn spells_code(items: &[Item], width: usize, index: &HashMap<&str, usize>) -> bool {
    if items.len() < width {
        return false;
    }
    let mut letters = String::with_capacity(width);
    for item in &items[..width] {
        match item {
            Item::Char(c) if c.is_ascii_uppercase() => letters.push(*c),
            _ => return false,
        }
    }
    index.contains_key(letters.as_str())
}

fn render(pieces: Vec<Piece>, codebook: &Codebook, index: &HashMap<&str, usize>) -> String {
    let mut items = Vec::new();
    for piece in pieces {
        match piece {
            Piece::Lit(s) => items.extend(s.chars().map(Item::Char)),
            Piece::Code(i) => items.push(Item::Code(i)),
        }
    }

    let width = codebook.code_width();
    let mut out = String::new();
    for (pos, item) in items.iter().enumerate() {
        match item {
            Item::Code(i) => out.push_str(&codebook.entries[*i].1),
            Item::Char('$') => {
                let rest = &items[pos + 1..];
                let ambiguous = match rest.first() {
                    Some(Item::Code(_)) | Some(Item::Char('$')) => true,
                    Some(_) => spells_code(rest, width, index),
                    None => false,
                };
                out.push('$');
                if ambiguous {
                    out.push('$');
                }
            }
            Item::Char(c) => out.push(*c),
        }
    }
    out
}

fn encode(text: &str, codebook: &Codebook) -> (String, BTreeSet<usize>) {
    let mut used = BTreeSet::new();
    if codebook.is_empty() {
        return (text.to_string(), used);
    }

    let mut order: Vec<usize> = (0..codebook.len()).collect();
    order.sort_by(|&a, &b| {
        let (pa, pb) = (&codebook.entries[a].0, &codebook.entries[b].0);
        pb.chars().count().cmp(&pa.chars().count()).then_with(|| pa.cmp(pb))
    });
    let index = codebook.letter_index();

    let out = map_text_spans(text, |span| {
        let mut pieces = vec![Piece::Lit(span.to_string())];
        for &idx in &order {
            let phrase = codebook.entries[idx].0.as_str();
            let mut next = Vec::with_capacity(pieces.len());
            for piece in pieces {
                match piece {
                    Piece::Lit(s) if s.contains(phrase) => {
                        let mut last = 0;
                        for (pos, _) in s.match_indices(phrase) {
                            if pos > last {
                                next.push(Piece::Lit(s[last..pos].to_string()));
                            }
                            next.push(Piece::Code(idx));
                            used.insert(idx);
                            last = pos + phrase.len();
                        }
                        if last < s.len() {
                            next.push(Piece::Lit(s[last..].to_string()));
                        }
                    }
                    other => next.push(other),
                }
            }
            pieces = next;
        }
        render(pieces, codebook, &index)
    });
    (out, used)
}

/// Replace codebook phrases with their codes, longest phrase first.
/// Fenced code is not touched.
pub fn compress_text(text: &str, codebook: &Codebook) -> String {
    encode(text, codebook).0
}

fn decode(text: &str, codebook: &Codebook) -> (String, usize) {
    if codebook.is_empty() {
        return (text.to_string(), 0);
    }
    let width = codebook.code_width();
    let index = codebook.letter_index();
    let mut decoded = 0;

    let out = map_text_spans(text, |span| {
        let chars: Vec<char> = span.chars().collect();
        let mut out = String::with_capacity(span.len());
        let mut i = 0;
        while i < chars.len() {
            if chars[i] != '$' {
                out.push(chars[i]);
                i += 1;
                continue;
            }
            if chars.get(i + 1) == Some(&'$') {
                out.push('$');
                i += 2;
                continue;
            }
            let end = i + 1 + width;
            if end <= chars.len() && chars[i + 1..end].iter().all(char::is_ascii_uppercase) {
                let letters: String = chars[i + 1..end].iter().collect();
                if let Some(&idx) = index.get(letters.as_str()) {
                    out.push_str(&codebook.entries[idx].0);
                    decoded += 1;
                    i = end;
                    continue;
                }
            }
            out.push('$');
            i += 1;
        }
        out
    });
    (out, decoded)
}

/// Inverse of [`compress_text`]
pub fn decompress_text(text: &str, codebook: &Codebook) -> String {
    decode(text, codebook).0
}

/// Apply `codebook` to text that may already carry codes from an earlier
/// run. Text holding no codes is compressed as is.
pub fn recompress_text(text: &str, codebook: &Codebook) -> String {
    let (decoded, codes) = decode(text, codebook);
    if codes == 0 {
        compress_text(text, codebook)
    } else {
        compress_text(&decoded, codebook)
    }
}

// ── Stats and persistence ──────────────────────────────────────

/// How well a codebook covers a corpus
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodebookStats {
    pub codebook_entries: usize,
    pub codes_used: usize,
    pub original_chars: usize,
    pub compressed_chars: usize,
    pub gross_reduction_pct: f64,
    /// Reduction after paying for the codebook itself
    pub net_reduction_pct: f64,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn compression_stats<S: AsRef<str>>(texts: &[S], codebook: &Codebook) -> CodebookStats {
    let mut used = BTreeSet::new();
    let mut original_chars = 0;
    let mut compressed_chars = 0;
    for text in texts {
        let text = text.as_ref();
        let (compressed, codes) = encode(text, codebook);
        original_chars += text.chars().count();
        compressed_chars += compressed.chars().count();
        used.extend(codes);
    }

    let overhead: usize = codebook
        .iter()
        .map(|(p, c)| p.chars().count() + c.len() + 2)
        .sum();
    let pct = |saved: f64| {
        if original_chars == 0 {
            0.0
        } else {
            round2(saved / original_chars as f64 * 100.0)
        }
    };
    let gross = original_chars as f64 - compressed_chars as f64;

    CodebookStats {
        codebook_entries: codebook.len(),
        codes_used: used.len(),
        original_chars,
        compressed_chars,
        gross_reduction_pct: pct(gross),
        net_reduction_pct: pct(gross - overhead as f64),
    }
}

/// Persist the codebook atomically as `{phrase: code}` JSON
pub fn save_codebook(path: &Path, codebook: &Codebook) -> Result<()> {
    let json = serde_json::to_string_pretty(codebook)?;
    atomic_write(path, json.as_bytes()).map_err(|e| CompactError::write(path, e))
}

pub fn load_codebook(path: &Path) -> Result<Codebook> {
    if !path.exists() {
        return Err(CompactError::CodebookMissing(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path).map_err(|e| CompactError::read(path, e))?;
    serde_json::from_str(&content).map_err(|e| CompactError::InvalidCodebook {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(pairs: &[(&str, &str)]) -> Codebook {
        Codebook::from_pairs(
            pairs
                .iter()
                .map(|(p, c)| (p.to_string(), c.to_string()))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_generate_codes_skips_reserved() {
        let codes = generate_codes(674, 2);
        assert_eq!(codes[0], "$AA");
        assert_eq!(codes.len(), 674);
        assert!(!codes.contains(&"$WS".to_string()));
        assert!(!codes.contains(&"$IP".to_string()));
        let wide = generate_codes(3, 3);
        assert_eq!(wide, vec!["$AAA", "$AAB", "$AAC"]);
    }

    #[test]
    fn test_build_prefers_high_savings() {
        let doc = "configure the development environment before you start\n";
        let texts: Vec<String> = (0..5).map(|_| doc.to_string()).collect();
        let cb = build_codebook(&texts, &CodebookConfig::new());
        assert!(!cb.is_empty());
        // Two 6-grams cover the line; every shorter n-gram is inside one of them.
        assert_eq!(
            cb.code_for("configure the development environment before you"),
            Some("$AA")
        );
        assert_eq!(cb.len(), 2);
    }

    #[test]
    fn test_build_respects_min_freq_and_fences() {
        let texts = [
            "```\nrepeated phrase inside code\n```\n",
            "```\nrepeated phrase inside code\n```\n",
            "```\nrepeated phrase inside code\n```\n",
            "rare words appear once\n",
        ];
        let cb = build_codebook(&texts, &CodebookConfig::new());
        assert!(cb.is_empty());
    }

    #[test]
    fn test_compress_roundtrip() {
        let cb = book(&[("the staging cluster", "$AA"), ("load balancer", "$AB")]);
        let text = "Restart the staging cluster, then the load balancer.\n```\nthe staging cluster\n```\n";
        let compressed = compress_text(text, &cb);
        assert_eq!(
            compressed,
            "Restart $AA, then the $AB.\n```\nthe staging cluster\n```\n"
        );
        assert_eq!(decompress_text(&compressed, &cb), text);
    }

    #[test]
    fn test_literal_dollars_survive() {
        let cb = book(&[("monthly budget", "$AA")]);
        for text in ["cost $AA", "$$", "$", "pay $5 monthly budget", "$monthly budget", "A$ABC"] {
            let compressed = compress_text(text, &cb);
            assert_eq!(decompress_text(&compressed, &cb), text, "text {:?}", text);
        }
        assert_eq!(compress_text("cost $5", &cb), "cost $5");
        assert_eq!(compress_text("cost $AA", &cb), "cost $$AA");
    }

    #[test]
    fn test_recompress_is_stable() {
        let cb = book(&[("deployment pipeline", "$AA")]);
        let once = compress_text("the deployment pipeline failed", &cb);
        assert_eq!(recompress_text(&once, &cb), once);
        assert_eq!(recompress_text("pid $$ here", &cb), compress_text("pid $$ here", &cb));
    }

    #[test]
    fn test_codebook_json_orientations() {
        let cb = book(&[("first phrase here", "$AA"), ("second phrase", "$AB")]);
        let json = serde_json::to_string(&cb).unwrap();
        assert_eq!(json, r#"{"first phrase here":"$AA","second phrase":"$AB"}"#);
        let parsed: Codebook = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, cb);

        let flipped: Codebook =
            serde_json::from_str(r#"{"$AA":"first phrase here","$AB":"second phrase"}"#).unwrap();
        assert_eq!(flipped, cb);
    }

    #[test]
    fn test_invalid_codebooks_rejected() {
        assert!(serde_json::from_str::<Codebook>(r#"{"a phrase":"$AA","other":"$ABC"}"#).is_err());
        assert!(serde_json::from_str::<Codebook>(r#"{"a phrase":"$WS"}"#).is_err());
        assert!(serde_json::from_str::<Codebook>(r#"{"a phrase":"AA"}"#).is_err());
        assert!(serde_json::from_str::<Codebook>(r#"{"a":"$AA","b":"$AA"}"#).is_err());
    }

    #[test]
    fn test_save_and_load() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("memory/.codebook.json");
        assert!(matches!(
            load_codebook(&path),
            Err(CompactError::CodebookMissing(_))
        ));

        let cb = book(&[("persisted phrase", "$AA")]);
        save_codebook(&path, &cb).unwrap();
        assert_eq!(load_codebook(&path).unwrap(), cb);

        std::fs::write(&path, "[1, 2]").unwrap();
        assert!(matches!(
            load_codebook(&path),
            Err(CompactError::InvalidCodebook { .. })
        ));
    }

    #[test]
    fn test_stats() {
        let cb = book(&[("deployment pipeline", "$AA"), ("never used phrase", "$AB")]);
        let stats = compression_stats(&["deployment pipeline ok"], &cb);
        assert_eq!(stats.codebook_entries, 2);
        assert_eq!(stats.codes_used, 1);
        assert_eq!(stats.original_chars, 22);
        assert_eq!(stats.compressed_chars, 6);
        assert!(stats.gross_reduction_pct > 70.0);
        assert!(stats.net_reduction_pct < stats.gross_reduction_pct);
    }
}
