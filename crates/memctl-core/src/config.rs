//! Tunables for every compression pass

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use memctl_tokens::{expand_home, Workspace};

use crate::Warnings;

/// Dictionary codec limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodebookConfig {
    pub min_freq: usize,
    pub max_entries: usize,
    /// Minimum phrase length in characters
    pub min_phrase_len: usize,
}

impl CodebookConfig {
    pub fn new() -> Self {
        Self {
            min_freq: 3,
            max_entries: 200,
            min_phrase_len: 8,
        }
    }
}

impl Default for CodebookConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Token budgets for the three summary tiers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierBudgets {
    pub level0: usize,
    pub level1: usize,
    pub level2: usize,
}

impl TierBudgets {
    pub fn new() -> Self {
        Self {
            level0: 300,
            level1: 1500,
            level2: 5000,
        }
    }

    pub fn as_array(&self) -> [usize; 3] {
        [self.level0, self.level1, self.level2]
    }
}

impl Default for TierBudgets {
    fn default() -> Self {
        Self::new()
    }
}

/// Audit budgets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub stale_days: i64,
    /// Per-file token budgets keyed by file name
    pub file_budgets: BTreeMap<String, usize>,
    pub workspace_budget: usize,
}

impl AuditConfig {
    pub fn new() -> Self {
        let mut file_budgets = BTreeMap::new();
        file_budgets.insert("MEMORY.md".to_string(), 2000);
        file_budgets.insert("TOOLS.md".to_string(), 1500);
        file_budgets.insert("AGENTS.md".to_string(), 2000);

        Self {
            stale_days: 14,
            file_budgets,
            workspace_budget: 15000,
        }
    }

    pub fn file_budget(&self, name: &str) -> Option<usize> {
        self.file_budgets.get(name).copied()
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Truncation limits for observation extraction (in characters)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserveLimits {
    pub max_input_chars: usize,
    pub max_output_chars: usize,
    pub max_text_chars: usize,
    pub max_facts: usize,
    pub max_fact_chars: usize,
}

impl ObserveLimits {
    pub fn new() -> Self {
        Self {
            max_input_chars: 200,
            max_output_chars: 500,
            max_text_chars: 200,
            max_facts: 5,
            max_fact_chars: 100,
        }
    }
}

impl Default for ObserveLimits {
    fn default() -> Self {
        Self::new()
    }
}

/// Workspace configuration, optionally overridden by `memory/.memctl.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Jaccard threshold for near-duplicate detection
    pub dedup_threshold: f64,

    /// Words per shingle
    pub shingle_size: usize,

    /// Lines this short (after trimming) are never dedup candidates
    pub min_chunk_len: usize,

    pub codebook: CodebookConfig,

    /// IPs sharing a /24 needed before the prefix gets a label
    pub ip_min_occurrences: usize,

    pub tiers: TierBudgets,

    pub audit: AuditConfig,

    pub observe: ObserveLimits,

    /// Session transcript directory (`~/` allowed)
    pub sessions_dir: Option<String>,

    /// Extra path spellings folded to `$WS`
    pub workspace_paths: Vec<String>,
}

impl Config {
    pub fn new() -> Self {
        Self {
            dedup_threshold: 0.6,
            shingle_size: 3,
            min_chunk_len: 10,
            codebook: CodebookConfig::new(),
            ip_min_occurrences: 2,
            tiers: TierBudgets::new(),
            audit: AuditConfig::new(),
            observe: ObserveLimits::new(),
            sessions_dir: None,
            workspace_paths: Vec::new(),
        }
    }

    /// Load the workspace override file. A missing file gives the defaults;
    /// an unreadable or malformed one gives the defaults plus a warning.
    pub fn load(workspace: &Workspace, warnings: &mut Warnings) -> Self {
        let path = workspace.config_path();
        if !path.exists() {
            return Self::new();
        }
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                warnings.push(format!("cannot read {}: {}", path.display(), e));
                return Self::new();
            }
        };
        match serde_json::from_str(&content) {
            Ok(config) => {
                tracing::debug!("loaded config from {}", path.display());
                config
            }
            Err(e) => {
                warnings.push(format!(
                    "ignoring malformed config {}: {}",
                    path.display(),
                    e
                ));
                Self::new()
            }
        }
    }

    /// Resolve the sessions directory: explicit flag, then config, then
    /// `W/sessions`
    pub fn sessions_dir(&self, workspace: &Workspace, flag: Option<&Path>) -> PathBuf {
        if let Some(dir) = flag {
            return dir.to_path_buf();
        }
        match &self.sessions_dir {
            Some(dir) => {
                let expanded = expand_home(dir);
                if expanded.is_relative() {
                    workspace.root.join(expanded)
                } else {
                    expanded
                }
            }
            None => workspace.default_sessions_dir(),
        }
    }

    /// Every spelling of the workspace root folded to `$WS`, longest first
    pub fn workspace_paths(&self, workspace: &Workspace) -> Vec<String> {
        let mut paths = workspace.path_aliases();
        for extra in &self.workspace_paths {
            let trimmed = extra.trim_end_matches('/');
            if trimmed.len() > 1 {
                paths.push(trimmed.to_string());
            }
        }
        paths.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        paths.dedup();
        paths
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::new();
        assert_eq!(config.dedup_threshold, 0.6);
        assert_eq!(config.codebook.min_freq, 3);
        assert_eq!(config.codebook.max_entries, 200);
        assert_eq!(config.tiers.as_array(), [300, 1500, 5000]);
        assert_eq!(config.audit.file_budget("TOOLS.md"), Some(1500));
        assert_eq!(config.audit.file_budget("notes.md"), None);
        assert_eq!(config.observe.max_output_chars, 500);
    }

    #[test]
    fn test_partial_override() {
        let config: Config =
            serde_json::from_str(r#"{"dedup_threshold": 0.8, "tiers": {"level0": 100}}"#).unwrap();
        assert_eq!(config.dedup_threshold, 0.8);
        assert_eq!(config.tiers.level0, 100);
        assert_eq!(config.tiers.level1, 1500);
        assert_eq!(config.shingle_size, 3);
    }

    #[test]
    fn test_load_missing_and_malformed() {
        let temp = tempfile::TempDir::new().unwrap();
        let ws = Workspace::new(temp.path());
        let mut warnings = Warnings::quiet();
        assert_eq!(Config::load(&ws, &mut warnings), Config::new());
        assert!(warnings.is_empty());

        std::fs::create_dir_all(ws.memory_dir()).unwrap();
        std::fs::write(ws.config_path(), "{not json").unwrap();
        assert_eq!(Config::load(&ws, &mut warnings), Config::new());
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_sessions_dir_resolution() {
        let ws = Workspace::new("/w");
        let mut config = Config::new();
        assert_eq!(config.sessions_dir(&ws, None), PathBuf::from("/w/sessions"));
        config.sessions_dir = Some("logs".to_string());
        assert_eq!(config.sessions_dir(&ws, None), PathBuf::from("/w/logs"));
        assert_eq!(
            config.sessions_dir(&ws, Some(Path::new("/elsewhere"))),
            PathBuf::from("/elsewhere")
        );
    }

    #[test]
    fn test_workspace_paths_include_extras() {
        let ws = Workspace::new("/w");
        let mut config = Config::new();
        config.workspace_paths = vec!["/srv/agent/workspace/".to_string()];
        let paths = config.workspace_paths(&ws);
        assert_eq!(paths[0], "/srv/agent/workspace");
    }
}
