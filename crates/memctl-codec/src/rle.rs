//! Run-length style folding of structured repeats: workspace paths, IPv4
//! families, upper-case enumerations and repeated headers.
//!
//! `$WS` and `$IPn.d` already present in the text count as compressed, so
//! every transform is idempotent.

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::OnceLock;

use memctl_core::{map_text_spans, parse_sections, split_fenced, CompactError, Result, Section};
use memctl_tokens::atomic_write;

/// Token standing in for the workspace root
pub const WS_TOKEN: &str = "$WS";

/// Label -> /24 prefix (with trailing dot), e.g. `"$IP1" -> "10.0.1."`
pub type IpFamilies = BTreeMap<String, String>;

static IPV4_RE: OnceLock<Regex> = OnceLock::new();
static IP_TOKEN_RE: OnceLock<Regex> = OnceLock::new();
static ENUM_RE: OnceLock<Regex> = OnceLock::new();

fn ipv4_re() -> &'static Regex {
    IPV4_RE.get_or_init(|| {
        let octet = r"(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)";
        Regex::new(&format!(r"\b({o}\.{o}\.{o}\.)({o})\b", o = octet)).unwrap()
    })
}

fn ip_token_re() -> &'static Regex {
    IP_TOKEN_RE.get_or_init(|| Regex::new(r"\$IP(\d*)\.(\d{1,3})").unwrap())
}

fn enum_re() -> &'static Regex {
    ENUM_RE.get_or_init(|| {
        Regex::new(r"\b[A-Z][A-Z0-9_]{1,9}(?:, +[A-Z][A-Z0-9_]{1,9}){3,}\b").unwrap()
    })
}

// ── Paths ──────────────────────────────────────────────────────

fn path_boundary(next: Option<char>) -> bool {
    !next.is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '-')
}

/// Replace each workspace path spelling with `$WS`. `paths` should be
/// ordered longest first; spellings no longer than the token are ignored.
pub fn compress_paths<S: AsRef<str>>(text: &str, paths: &[S]) -> String {
    map_text_spans(text, |span| {
        let mut current = span.to_string();
        for path in paths {
            let path = path.as_ref();
            if path.len() <= WS_TOKEN.len() || !current.contains(path) {
                continue;
            }
            let mut out = String::with_capacity(current.len());
            let mut last = 0;
            for (pos, _) in current.match_indices(path) {
                let end = pos + path.len();
                if !path_boundary(current[end..].chars().next()) {
                    continue;
                }
                out.push_str(&current[last..pos]);
                out.push_str(WS_TOKEN);
                last = end;
            }
            out.push_str(&current[last..]);
            current = out;
        }
        current
    })
}

/// Expand `$WS` back to `workspace`
pub fn decompress_paths(text: &str, workspace: &str) -> String {
    map_text_spans(text, |span| span.replace(WS_TOKEN, workspace))
}

// ── IP families ────────────────────────────────────────────────

fn ip_label(n: usize) -> String {
    if n == 0 {
        "$IP".to_string()
    } else {
        format!("$IP{}", n)
    }
}

/// An address match that is not part of a longer dotted run
fn standalone<'t>(text: &'t str, caps: &Captures<'t>) -> bool {
    let Some(whole) = caps.get(0) else {
        return false;
    };
    let before = text[..whole.start()].chars().next_back();
    if before.is_some_and(|c| c == '.' || c == '$') {
        return false;
    }
    let mut after = text[whole.end()..].chars();
    !(after.next() == Some('.') && after.next().is_some_and(|c| c.is_ascii_digit()))
}

/// Fold IPv4 addresses that share a /24 prefix into `$IPn.d`.
///
/// A prefix is folded when it appears at least `min_occurrences` times or
/// already has a label in `existing`. Returns the rewritten text and the
/// full label map (existing labels plus new ones, assigned in order of
/// first appearance).
pub fn compress_ip_families(
    text: &str,
    min_occurrences: usize,
    existing: &IpFamilies,
) -> (String, IpFamilies) {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut first_seen: Vec<String> = Vec::new();
    for span in split_fenced(text).iter().filter(|s| !s.is_code()) {
        for caps in ipv4_re().captures_iter(span.text) {
            if !standalone(span.text, &caps) {
                continue;
            }
            let prefix = caps[1].to_string();
            let count = counts.entry(prefix.clone()).or_insert(0);
            if *count == 0 {
                first_seen.push(prefix);
            }
            *count += 1;
        }
    }

    let mut families = existing.clone();
    let mut by_prefix: HashMap<String, String> = existing
        .iter()
        .map(|(label, prefix)| (prefix.clone(), label.clone()))
        .collect();
    let mut next = 0;
    for prefix in first_seen {
        if by_prefix.contains_key(&prefix) || counts[&prefix] < min_occurrences {
            continue;
        }
        while families.contains_key(&ip_label(next)) {
            next += 1;
        }
        let label = ip_label(next);
        // Folding must shorten every address.
        if label.len() + 1 >= prefix.len() {
            continue;
        }
        families.insert(label.clone(), prefix.clone());
        by_prefix.insert(prefix, label);
    }

    let compressed = map_text_spans(text, |span| {
        let mut out = String::with_capacity(span.len());
        let mut last = 0;
        for caps in ipv4_re().captures_iter(span) {
            let Some(whole) = caps.get(0) else { continue };
            let Some(label) = by_prefix.get(&caps[1]) else { continue };
            if !standalone(span, &caps) {
                continue;
            }
            out.push_str(&span[last..whole.start()]);
            out.push_str(label);
            out.push('.');
            out.push_str(&caps[2]);
            last = whole.end();
        }
        out.push_str(&span[last..]);
        out
    });
    (compressed, families)
}

/// Expand `$IPn.d` tokens using `families`. Unknown labels stay as they are.
pub fn decompress_ip_families(text: &str, families: &IpFamilies) -> String {
    map_text_spans(text, |span| {
        ip_token_re()
            .replace_all(span, |caps: &Captures| {
                let label = format!("$IP{}", &caps[1]);
                match families.get(&label) {
                    Some(prefix) => format!("{}{}", prefix, &caps[2]),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    })
}

/// Per-file IP family maps persisted under `memory/.ip-families.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IpFamilyStore {
    pub files: BTreeMap<String, IpFamilies>,
}

impl IpFamilyStore {
    /// Missing file gives an empty store
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| CompactError::read(path, e))?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        atomic_write(path, json.as_bytes()).map_err(|e| CompactError::write(path, e))
    }

    pub fn get(&self, file: &str) -> IpFamilies {
        self.files.get(file).cloned().unwrap_or_default()
    }

    pub fn set(&mut self, file: &str, families: IpFamilies) {
        if families.is_empty() {
            self.files.remove(file);
        } else {
            self.files.insert(file.to_string(), families);
        }
    }
}

// ── Enumerations ───────────────────────────────────────────────

/// Rewrite `FOO, BAR, BAZ, QUX` (four or more tokens) as `[FOO,BAR,BAZ,QUX]`.
/// A run whose first token is the tail of a `$` code is left alone.
pub fn compress_enumerations(text: &str) -> String {
    map_text_spans(text, |span| {
        let mut out = String::with_capacity(span.len());
        let mut last = 0;
        for m in enum_re().find_iter(span) {
            if span[..m.start()].ends_with('$') {
                continue;
            }
            let items: Vec<&str> = m.as_str().split(',').map(str::trim).collect();
            out.push_str(&span[last..m.start()]);
            out.push('[');
            out.push_str(&items.join(","));
            out.push(']');
            last = m.end();
        }
        out.push_str(&span[last..]);
        out
    })
}

// ── Repeated headers ───────────────────────────────────────────

struct Node {
    section: Section,
    children: Vec<Node>,
}

fn build_tree(sections: Vec<Section>) -> Node {
    let mut root = Node {
        section: Section {
            level: 0,
            heading: String::new(),
            header_line: String::new(),
            body: String::new(),
            start_line: 0,
        },
        children: Vec::new(),
    };
    // Path of open nodes as child indices from the root.
    let mut path: Vec<(u8, usize)> = Vec::new();

    for section in sections {
        if section.is_preamble() {
            root.section.body.push_str(&section.body);
            continue;
        }
        while path.last().is_some_and(|(level, _)| *level >= section.level) {
            path.pop();
        }
        let mut parent = &mut root;
        for &(_, idx) in &path {
            parent = &mut parent.children[idx];
        }
        let level = section.level;
        parent.children.push(Node {
            section,
            children: Vec::new(),
        });
        path.push((level, parent.children.len() - 1));
    }
    root
}

fn coalesce(children: Vec<Node>) -> Vec<Node> {
    let mut merged: Vec<Node> = Vec::new();
    for node in children {
        let twin = merged.iter_mut().find(|m| {
            m.section.level == node.section.level && m.section.heading == node.section.heading
        });
        match twin {
            Some(first) => {
                if !first.section.body.is_empty() && !first.section.body.ends_with('\n') {
                    first.section.body.push('\n');
                }
                first.section.body.push_str(&node.section.body);
                first.children.extend(node.children);
            }
            None => merged.push(node),
        }
    }
    merged
        .into_iter()
        .map(|mut node| {
            node.children = coalesce(std::mem::take(&mut node.children));
            node
        })
        .collect()
}

fn render(node: &Node, out: &mut String) {
    if !node.section.header_line.is_empty() && !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(&node.section.header_line);
    out.push_str(&node.section.body);
    for child in &node.children {
        render(child, out);
    }
}

/// Merge sibling sections that repeat the same header: the first keeps its
/// place and absorbs the bodies and subsections of the later ones.
pub fn coalesce_headers(text: &str) -> String {
    let sections = parse_sections(text);
    let mut root = build_tree(sections);
    root.children = coalesce(std::mem::take(&mut root.children));
    let mut out = String::with_capacity(text.len());
    render(&root, &mut out);
    out
}

// ── Pipeline ───────────────────────────────────────────────────

/// Inputs for one file's RLE pass
#[derive(Debug, Clone, Default)]
pub struct RleContext {
    /// Workspace path spellings, longest first
    pub workspace_paths: Vec<String>,
    pub ip_min_occurrences: usize,
    /// Labels already issued for this file
    pub ip_families: IpFamilies,
}

/// Paths, IP families, enumerations and headers, in that order
pub fn rle_compress(text: &str, ctx: &RleContext) -> (String, IpFamilies) {
    let text = compress_paths(text, &ctx.workspace_paths);
    let (text, families) = compress_ip_families(&text, ctx.ip_min_occurrences, &ctx.ip_families);
    let text = compress_enumerations(&text);
    (coalesce_headers(&text), families)
}

/// Reverse the reversible transforms (paths and IP families)
pub fn rle_decompress(text: &str, workspace: &str, families: &IpFamilies) -> String {
    decompress_paths(&decompress_ip_families(text, families), workspace)
}
