use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the compaction passes.
///
/// File-scoped variants are normally recovered by the caller and turned into
/// warnings; workspace-scoped ones abort the invocation.
#[derive(Error, Debug)]
pub enum CompactError {
    // ── Workspace errors ───────────────────────────────────────
    #[error("workspace not found: {0}")]
    WorkspaceMissing(PathBuf),

    #[error("workspace is not a directory: {0}")]
    NotADirectory(PathBuf),

    // ── File errors ────────────────────────────────────────────
    #[error("cannot read {path}: {source}")]
    FileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write {path}: {source}")]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Codec / session errors ─────────────────────────────────
    #[error("codebook not found: {0} (run `dict --build` first)")]
    CodebookMissing(PathBuf),

    #[error("invalid codebook {path}: {reason}")]
    InvalidCodebook { path: PathBuf, reason: String },

    #[error("sessions directory not found: {0}")]
    SessionsDirMissing(PathBuf),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CompactError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            CompactError::WorkspaceMissing(_) | CompactError::NotADirectory(_) => 2,
            _ => 1,
        }
    }

    /// Errors that `full` skips with a warning instead of aborting
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CompactError::CodebookMissing(_)
                | CompactError::InvalidCodebook { .. }
                | CompactError::SessionsDirMissing(_)
                | CompactError::FileUnreadable { .. }
        )
    }

    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CompactError::WriteFailure {
            path: path.into(),
            source,
        }
    }

    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CompactError::FileUnreadable {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, CompactError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CompactError::WorkspaceMissing(PathBuf::from("/x")).exit_code(), 2);
        assert_eq!(CompactError::NotADirectory(PathBuf::from("/x")).exit_code(), 2);
        assert_eq!(CompactError::CodebookMissing(PathBuf::from("/x")).exit_code(), 1);
    }

    #[test]
    fn test_recoverable() {
        assert!(CompactError::SessionsDirMissing(PathBuf::from("/s")).is_recoverable());
        assert!(!CompactError::WorkspaceMissing(PathBuf::from("/w")).is_recoverable());
        let write = CompactError::write("/w/a.md", std::io::Error::other("disk full"));
        assert!(!write.is_recoverable());
        assert!(write.to_string().contains("disk full"));
    }
}
