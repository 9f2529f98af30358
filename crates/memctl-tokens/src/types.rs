//! Per-file change records

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::estimate_tokens;

/// Outcome of writing (or projecting) one file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileChange {
    pub path: PathBuf,
    pub tokens_before: usize,
    pub tokens_after: usize,
    pub changed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
}

impl FileChange {
    pub fn new(path: &Path, original: &str, updated: &str) -> Self {
        Self {
            path: path.to_path_buf(),
            tokens_before: estimate_tokens(original),
            tokens_after: estimate_tokens(updated),
            changed: original != updated,
            diff: None,
        }
    }

    pub fn saved(&self) -> i64 {
        self.tokens_before as i64 - self.tokens_after as i64
    }

    /// Reduction in percent, rounded to one decimal
    pub fn reduction_pct(&self) -> f64 {
        if self.tokens_before == 0 {
            return 0.0;
        }
        let pct = self.saved() as f64 / self.tokens_before as f64 * 100.0;
        (pct * 10.0).round() / 10.0
    }
}
