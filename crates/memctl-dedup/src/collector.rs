//! Workspace-wide duplicate detection over memory file lines

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use memctl_core::{header_of, split_fenced, MemoryFile};
use memctl_tokens::estimate_tokens;

use crate::shingle::{dropped_indices, find_duplicates, keeper, DuplicateGroup};

/// A candidate line for duplicate detection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry {
    pub text: String,
    /// Workspace-relative file name
    pub source: String,
    pub section: String,
    /// 0-based line in the source file
    pub line: usize,
    #[serde(skip)]
    pub file_index: usize,
}

/// Collect trimmed body lines longer than `min_len` characters from text
/// spans of every file
pub fn collect_entries(files: &[MemoryFile], min_len: usize) -> Vec<Entry> {
    let mut entries = Vec::new();
    for (file_index, file) in files.iter().enumerate() {
        let mut section = String::new();
        let mut line_no = 0;
        for span in split_fenced(&file.text) {
            for line in span.text.split_inclusive('\n') {
                let current = line_no;
                line_no += 1;
                if span.is_code() {
                    continue;
                }
                if let Some((_, heading)) = header_of(line) {
                    section = heading;
                    continue;
                }
                let trimmed = line.trim();
                if trimmed.chars().count() > min_len {
                    entries.push(Entry {
                        text: trimmed.to_string(),
                        source: file.name.clone(),
                        section: section.clone(),
                        line: current,
                        file_index,
                    });
                }
            }
        }
    }
    entries
}

/// Remove the given 0-based lines from `text`
pub fn remove_lines(text: &str, lines: &BTreeSet<usize>) -> String {
    text.split_inclusive('\n')
        .enumerate()
        .filter(|(i, _)| !lines.contains(i))
        .map(|(_, line)| line)
        .collect()
}

/// One member of a reported group
#[derive(Debug, Clone, Serialize)]
pub struct GroupMember {
    #[serde(flatten)]
    pub entry: Entry,
    pub kept: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupReport {
    pub similarity: f64,
    pub members: Vec<GroupMember>,
}

/// Duplicate groups across the workspace and the per-file line removals
/// that merging them implies
#[derive(Debug, Clone)]
pub struct DedupPlan {
    pub entries: Vec<Entry>,
    pub groups: Vec<DuplicateGroup>,
    /// file index -> lines to drop
    pub removals: BTreeMap<usize, BTreeSet<usize>>,
}

impl DedupPlan {
    pub fn build(files: &[MemoryFile], threshold: f64, k: usize, min_len: usize) -> Self {
        let entries = collect_entries(files, min_len);
        let texts: Vec<&str> = entries.iter().map(|e| e.text.as_str()).collect();
        let groups = find_duplicates(&texts, threshold, k);

        let mut removals: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
        for idx in dropped_indices(&texts, &groups) {
            let entry = &entries[idx];
            removals.entry(entry.file_index).or_default().insert(entry.line);
        }
        tracing::debug!(
            "{} entries, {} duplicate groups, {} lines to drop",
            entries.len(),
            groups.len(),
            removals.values().map(BTreeSet::len).sum::<usize>()
        );

        Self {
            entries,
            groups,
            removals,
        }
    }

    pub fn lines_removed(&self) -> usize {
        self.removals.values().map(BTreeSet::len).sum()
    }

    /// New text for every file that loses lines
    pub fn rewrites(&self, files: &[MemoryFile]) -> Vec<(usize, String)> {
        self.removals
            .iter()
            .filter_map(|(&idx, lines)| {
                files
                    .get(idx)
                    .map(|f| (idx, remove_lines(&f.text, lines)))
            })
            .collect()
    }

    pub fn report(&self, files: &[MemoryFile]) -> DedupReport {
        let texts: Vec<&str> = self.entries.iter().map(|e| e.text.as_str()).collect();
        let groups = self
            .groups
            .iter()
            .map(|group| {
                let keep = keeper(&texts, group);
                GroupReport {
                    similarity: (group.similarity * 1000.0).round() / 1000.0,
                    members: group
                        .indices
                        .iter()
                        .map(|&i| GroupMember {
                            entry: self.entries[i].clone(),
                            kept: Some(i) == keep,
                        })
                        .collect(),
                }
            })
            .collect();

        let tokens_before: usize = files.iter().map(MemoryFile::tokens).sum();
        let rewrites: BTreeMap<usize, String> = self.rewrites(files).into_iter().collect();
        let tokens_after: usize = files
            .iter()
            .enumerate()
            .map(|(i, f)| rewrites.get(&i).map_or_else(|| f.tokens(), |t| estimate_tokens(t)))
            .sum();
        let files_modified: Vec<String> = rewrites
            .keys()
            .filter_map(|&i| files.get(i))
            .map(|f| f.name.clone())
            .collect();

        DedupReport {
            total_entries: self.entries.len(),
            groups,
            lines_removed: self.lines_removed(),
            tokens_before,
            tokens_after,
            files_modified,
        }
    }
}

/// Result of a dedup run (projected unless merged)
#[derive(Debug, Clone, Serialize)]
pub struct DedupReport {
    pub total_entries: usize,
    pub groups: Vec<GroupReport>,
    pub lines_removed: usize,
    pub tokens_before: usize,
    pub tokens_after: usize,
    pub files_modified: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn file(name: &str, text: &str) -> MemoryFile {
        MemoryFile {
            path: PathBuf::from(name),
            name: name.to_string(),
            text: text.to_string(),
            modified: None,
        }
    }

    #[test]
    fn test_collect_entries_filters_and_tracks_sections() {
        let files = vec![file(
            "MEMORY.md",
            "# Setup\nshort\nInstall the toolchain first\n```\nInstall the toolchain first\n```\n## Later\n  Deploy on fridays only  \n",
        )];
        let entries = collect_entries(&files, 10);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].section, "Setup");
        assert_eq!(entries[0].line, 2);
        assert_eq!(entries[1].text, "Deploy on fridays only");
        assert_eq!(entries[1].section, "Later");
        assert_eq!(entries[1].line, 7);
    }

    #[test]
    fn test_plan_removes_shorter_duplicate_across_files() {
        let files = vec![
            file("MEMORY.md", "# Notes\nUse the staging cluster for load tests\nKeep this\n"),
            file(
                "memory/2026-01-01.md",
                "# Day\nUse the staging cluster for load tests today\nanother distinct line here\n",
            ),
        ];
        let plan = DedupPlan::build(&files, 0.6, 3, 10);
        assert_eq!(plan.groups.len(), 1);
        assert_eq!(plan.lines_removed(), 1);

        let rewrites = plan.rewrites(&files);
        assert_eq!(rewrites, vec![(0, "# Notes\nKeep this\n".to_string())]);

        let report = plan.report(&files);
        assert_eq!(report.files_modified, vec!["MEMORY.md"]);
        assert!(report.tokens_after < report.tokens_before);
        assert!(report.groups[0].members[1].kept);
    }

    #[test]
    fn test_remove_lines() {
        let lines = BTreeSet::from([1, 3]);
        assert_eq!(remove_lines("a\nb\nc\nd", &lines), "a\nc\n");
    }
}
