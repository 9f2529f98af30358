//! JSONL I/O, atomic file operations and the dry-run aware write path

use serde::Deserialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::types::FileChange;

/// Lines kept from the diff body of a single file
const MAX_DIFF_LINES: usize = 40;

/// Records decoded from a JSONL file
#[derive(Debug, Clone)]
pub struct JsonlRecords<T> {
    pub records: Vec<T>,
    /// Non-empty lines that failed to decode
    pub malformed: usize,
}

/// Decode JSONL text one line at a time, skipping malformed lines
pub fn parse_jsonl<T: for<'de> Deserialize<'de>>(text: &str) -> JsonlRecords<T> {
    let mut records = Vec::new();
    let mut malformed = 0;

    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(line) {
            Ok(record) => records.push(record),
            Err(_) => malformed += 1,
        }
    }

    JsonlRecords { records, malformed }
}

/// Sibling path used while a write is in flight: `<name>.tmp`
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("memctl"));
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write data atomically using temp file + rename
pub fn atomic_write(path: &Path, data: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let temp = temp_path(path);
    std::fs::write(&temp, data)?;
    std::fs::rename(temp, path)?;
    Ok(())
}

/// Single write path for every pass.
///
/// With `dry_run` nothing touches the disk and the returned change carries a
/// line diff instead. Unchanged content is never rewritten.
pub fn write_text(
    path: &Path,
    original: &str,
    updated: &str,
    dry_run: bool,
) -> std::io::Result<FileChange> {
    let mut change = FileChange::new(path, original, updated);
    if !change.changed {
        return Ok(change);
    }
    if dry_run {
        change.diff = Some(line_diff(original, updated));
    } else {
        atomic_write(path, updated.as_bytes())?;
    }
    Ok(change)
}

/// Compact line diff: the differing middle block after trimming the common
/// prefix and suffix
pub fn line_diff(original: &str, updated: &str) -> String {
    let old: Vec<&str> = original.lines().collect();
    let new: Vec<&str> = updated.lines().collect();

    let prefix = old
        .iter()
        .zip(new.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let max_suffix = old.len().min(new.len()) - prefix;
    let suffix = old
        .iter()
        .rev()
        .zip(new.iter().rev())
        .take(max_suffix)
        .take_while(|(a, b)| a == b)
        .count();

    let removed = &old[prefix..old.len() - suffix];
    let added = &new[prefix..new.len() - suffix];

    let mut lines = vec![format!(
        "@@ -{},{} +{},{} @@",
        prefix + 1,
        removed.len(),
        prefix + 1,
        added.len()
    )];
    let body: Vec<String> = removed
        .iter()
        .map(|l| format!("-{}", l))
        .chain(added.iter().map(|l| format!("+{}", l)))
        .collect();
    let hidden = body.len().saturating_sub(MAX_DIFF_LINES);
    lines.extend(body.into_iter().take(MAX_DIFF_LINES));
    if hidden > 0 {
        lines.push(format!("... ({} more lines)", hidden));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct TestRecord {
        id: u32,
        name: String,
    }

    #[test]
    fn test_parse_jsonl_skips_malformed() {
        let text = "{\"id\":1,\"name\":\"Alice\"}\nnot json\n\n{\"id\":2,\"name\":\"Bob\"}\n";
        let read: JsonlRecords<TestRecord> = parse_jsonl(text);
        assert_eq!(read.records.len(), 2);
        assert_eq!(read.records[1].name, "Bob");
        assert_eq!(read.malformed, 1);
    }

    #[test]
    fn test_atomic_write() {
        let temp = tempfile::TempDir::new().unwrap();
        let file = temp.path().join("nested").join("out.json");

        atomic_write(&file, b"Hello, world!").unwrap();

        assert_eq!(std::fs::read(&file).unwrap(), b"Hello, world!");
        assert!(!temp_path(&file).exists());
    }

    #[test]
    fn test_temp_path_appends_suffix() {
        let tmp = temp_path(Path::new("/w/memory/.codebook.json"));
        assert_eq!(tmp, PathBuf::from("/w/memory/.codebook.json.tmp"));
    }

    #[test]
    fn test_write_text_dry_run_leaves_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let file = temp.path().join("MEMORY.md");
        std::fs::write(&file, "a\nb\n").unwrap();

        let change = write_text(&file, "a\nb\n", "a\nc\n", true).unwrap();
        assert!(change.changed);
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "a\nb\n");
        let diff = change.diff.unwrap();
        assert!(diff.contains("-b"));
        assert!(diff.contains("+c"));
    }

    #[test]
    fn test_write_text_writes_changes() {
        let temp = tempfile::TempDir::new().unwrap();
        let file = temp.path().join("MEMORY.md");
        std::fs::write(&file, "a\n").unwrap();

        let change = write_text(&file, "a\n", "b\n", false).unwrap();
        assert!(change.changed);
        assert!(change.diff.is_none());
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "b\n");
    }

    #[test]
    fn test_line_diff_trims_common_context() {
        let diff = line_diff("x\ny\nz\n", "x\nY\nz\n");
        assert_eq!(diff, "@@ -2,1 +2,1 @@\n-y\n+Y");
    }
}
