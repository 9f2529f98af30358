//! Path resolution for workspace files

use std::path::{Path, PathBuf};

/// Root markdown files every agent workspace is expected to carry
pub const CORE_FILES: &[&str] = &["MEMORY.md", "TOOLS.md", "AGENTS.md", "SOUL.md", "USER.md"];

/// Resolves standard paths inside an agent workspace
#[derive(Debug, Clone)]
pub struct Workspace {
    pub root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Get memory directory path
    pub fn memory_dir(&self) -> PathBuf {
        self.root.join("memory")
    }

    /// Get .codebook.json path
    pub fn codebook_path(&self) -> PathBuf {
        self.memory_dir().join(".codebook.json")
    }

    /// Get .observed-sessions.json path
    pub fn tracker_path(&self) -> PathBuf {
        self.memory_dir().join(".observed-sessions.json")
    }

    /// Get .ip-families.json path
    pub fn ip_families_path(&self) -> PathBuf {
        self.memory_dir().join(".ip-families.json")
    }

    /// Get .memctl.json path
    pub fn config_path(&self) -> PathBuf {
        self.memory_dir().join(".memctl.json")
    }

    /// Directory of per-session observation documents. Not part of the
    /// memory-file set.
    pub fn observations_dir(&self) -> PathBuf {
        self.memory_dir().join("observations")
    }

    /// Observation document for a session file (`abc.jsonl` -> `abc.md`)
    pub fn observation_path(&self, session_file: &str) -> PathBuf {
        let stem = session_file.strip_suffix(".jsonl").unwrap_or(session_file);
        self.observations_dir().join(format!("{}.md", stem))
    }

    /// Default location of session transcripts
    pub fn default_sessions_dir(&self) -> PathBuf {
        self.root.join("sessions")
    }

    /// Memory files: root `*.md` then `memory/*.md`, each sorted by path.
    /// Dot-files are skipped.
    pub fn memory_files(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut files = markdown_in(&self.root)?;
        let memory_dir = self.memory_dir();
        if memory_dir.is_dir() {
            files.extend(markdown_in(&memory_dir)?);
        }
        Ok(files)
    }

    /// Path relative to the workspace root, with `/` separators
    pub fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }

    /// Spellings of the workspace root that may appear inside memory text,
    /// longest first
    pub fn path_aliases(&self) -> Vec<String> {
        let mut aliases = Vec::new();
        let canonical = self
            .root
            .canonicalize()
            .unwrap_or_else(|_| self.root.clone());
        let canonical = canonical.to_string_lossy().trim_end_matches('/').to_string();
        if let Some(home) = dirs::home_dir() {
            let home = home.to_string_lossy().trim_end_matches('/').to_string();
            if let Some(rest) = canonical.strip_prefix(&home) {
                if !home.is_empty() && rest.starts_with('/') {
                    aliases.push(format!("~{}", rest));
                }
            }
        }
        if canonical.len() > 1 {
            aliases.push(canonical);
        }
        aliases.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        aliases.dedup();
        aliases
    }
}

/// Expand a leading `~/` against the home directory
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

fn markdown_in(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)?.flatten() {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') || !path.is_file() {
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) == Some("md") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
