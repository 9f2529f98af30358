//! Workspace validation and memory file loading

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

use memctl_tokens::{estimate_tokens, Workspace};

use crate::error::{CompactError, Result};
use crate::Warnings;

/// A memory markdown file read into memory
#[derive(Debug, Clone)]
pub struct MemoryFile {
    pub path: PathBuf,
    /// Path relative to the workspace root
    pub name: String,
    pub text: String,
    pub modified: Option<DateTime<Utc>>,
}

impl MemoryFile {
    pub fn read(workspace: &Workspace, path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| CompactError::read(path, e))?;
        let modified = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from);
        Ok(Self {
            path: path.to_path_buf(),
            name: workspace.relative(path),
            text,
            modified,
        })
    }

    pub fn tokens(&self) -> usize {
        estimate_tokens(&self.text)
    }

    /// File name without directories
    pub fn file_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    /// Whole days since the last modification
    pub fn age_days(&self, now: DateTime<Utc>) -> Option<i64> {
        self.modified
            .map(|modified| (now - modified).num_days().max(0))
    }
}

/// Check that `root` is an existing directory
pub fn open_workspace(root: &Path) -> Result<Workspace> {
    if !root.exists() {
        return Err(CompactError::WorkspaceMissing(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(CompactError::NotADirectory(root.to_path_buf()));
    }
    Ok(Workspace::new(root))
}

/// Read every memory file in sorted order. Unreadable files are skipped
/// with a warning.
pub fn load_memory_files(workspace: &Workspace, warnings: &mut Warnings) -> Result<Vec<MemoryFile>> {
    let paths = workspace
        .memory_files()
        .map_err(|e| CompactError::read(&workspace.root, e))?;

    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        match MemoryFile::read(workspace, &path) {
            Ok(file) => {
                tracing::debug!("loaded {} ({} tokens)", file.name, file.tokens());
                files.push(file);
            }
            Err(e) => warnings.push(format!("skipping {}", e)),
        }
    }
    Ok(files)
}

/// Token total over all memory files currently on disk
pub fn workspace_tokens(workspace: &Workspace) -> Result<usize> {
    let files = load_memory_files(workspace, &mut Warnings::quiet())?;
    Ok(files.iter().map(MemoryFile::tokens).sum())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_workspace_errors() {
        let temp = tempfile::TempDir::new().unwrap();
        let missing = temp.path().join("nope");
        assert!(matches!(
            open_workspace(&missing),
            Err(CompactError::WorkspaceMissing(_))
        ));

        let file = temp.path().join("file.md");
        std::fs::write(&file, "x").unwrap();
        assert!(matches!(
            open_workspace(&file),
            Err(CompactError::NotADirectory(_))
        ));
        assert!(open_workspace(temp.path()).is_ok());
    }

    #[test]
    fn test_load_skips_invalid_utf8() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::write(temp.path().join("MEMORY.md"), "# Memory\nfacts\n").unwrap();
        std::fs::write(temp.path().join("BROKEN.md"), [0xff, 0xfe, 0x00]).unwrap();

        let ws = Workspace::new(temp.path());
        let mut warnings = Warnings::quiet();
        let files = load_memory_files(&ws, &mut warnings).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "MEMORY.md");
        assert_eq!(files[0].file_name(), "MEMORY.md");
        assert_eq!(warnings.len(), 1);
        assert!(files[0].age_days(Utc::now()).unwrap() <= 1);
    }

    #[test]
    fn test_workspace_tokens() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("memory")).unwrap();
        std::fs::write(temp.path().join("MEMORY.md"), "abcd").unwrap();
        std::fs::write(temp.path().join("memory/2026-01-01.md"), "abcdefgh").unwrap();
        assert_eq!(workspace_tokens(&Workspace::new(temp.path())).unwrap(), 3);
    }
}
