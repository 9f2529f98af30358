//! k-word shingling and Jaccard-based near-duplicate grouping

use serde::Serialize;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

/// Default words per shingle
pub const DEFAULT_SHINGLE_SIZE: usize = 3;

fn hash_str(s: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    s.hash(&mut hasher);
    hasher.finish()
}

/// Hashes of every k-word window of the lower-cased text.
///
/// Text with fewer than `k` words hashes as a whole; text without words
/// gives the empty set.
pub fn shingles(text: &str, k: usize) -> HashSet<u64> {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower.split_whitespace().collect();
    if words.is_empty() {
        return HashSet::new();
    }
    let k = k.max(1);
    if words.len() < k {
        return HashSet::from([hash_str(&words.join(" "))]);
    }
    words
        .windows(k)
        .map(|window| hash_str(&window.join(" ")))
        .collect()
}

/// |A ∩ B| / |A ∪ B|; 0.0 when either set is empty
pub fn jaccard(a: &HashSet<u64>, b: &HashSet<u64>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

/// Entries found to be near-duplicates of the group's first member
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateGroup {
    pub indices: Vec<usize>,
    /// Mean similarity between the anchor and each other member
    pub similarity: f64,
}

/// Group entries whose similarity to an ungrouped anchor reaches `threshold`.
///
/// Every index belongs to at most one group; groups have at least two members.
pub fn find_duplicates<S: AsRef<str>>(entries: &[S], threshold: f64, k: usize) -> Vec<DuplicateGroup> {
    let sets: Vec<HashSet<u64>> = entries.iter().map(|e| shingles(e.as_ref(), k)).collect();
    let mut grouped = vec![false; entries.len()];
    let mut groups = Vec::new();

    for i in 0..entries.len() {
        if grouped[i] {
            continue;
        }
        let mut indices = vec![i];
        let mut total = 0.0;
        for j in (i + 1)..entries.len() {
            if grouped[j] {
                continue;
            }
            let similarity = jaccard(&sets[i], &sets[j]);
            if similarity >= threshold {
                indices.push(j);
                total += similarity;
            }
        }
        if indices.len() < 2 {
            continue;
        }
        for &idx in &indices {
            grouped[idx] = true;
        }
        let similarity = total / (indices.len() - 1) as f64;
        groups.push(DuplicateGroup {
            indices,
            similarity,
        });
    }
    groups
}

/// Index kept for a group: the longest entry, first on ties
pub fn keeper<S: AsRef<str>>(entries: &[S], group: &DuplicateGroup) -> Option<usize> {
    let mut best: Option<usize> = None;
    for &idx in &group.indices {
        let len = entries[idx].as_ref().chars().count();
        match best {
            Some(b) if entries[b].as_ref().chars().count() >= len => {}
            _ => best = Some(idx),
        }
    }
    best
}

/// Indices dropped by merging
pub fn dropped_indices<S: AsRef<str>>(entries: &[S], groups: &[DuplicateGroup]) -> HashSet<usize> {
    let mut dropped = HashSet::new();
    for group in groups {
        let keep = keeper(entries, group);
        dropped.extend(group.indices.iter().copied().filter(|&i| Some(i) != keep));
    }
    dropped
}

/// Keep the longest entry of every group, preserving original order
pub fn merge_duplicates<S: AsRef<str>>(entries: &[S], groups: &[DuplicateGroup]) -> Vec<String> {
    let dropped = dropped_indices(entries, groups);
    entries
        .iter()
        .enumerate()
        .filter(|(i, _)| !dropped.contains(i))
        .map(|(_, e)| e.as_ref().to_string())
        .collect()
}
