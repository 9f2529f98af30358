//! ObservedSessions sidecar: which transcripts are already folded into memory

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use memctl_core::{CompactError, Result, Warnings};
use memctl_tokens::atomic_write;

/// `session file name -> ISO 8601 time it was observed`.
///
/// Entries are only ever added or refreshed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionTracker {
    entries: BTreeMap<String, String>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the tracker. A missing file is an empty tracker; a corrupt one is
    /// moved aside to `<name>.bak` and replaced by an empty tracker.
    pub fn load(path: &Path, warnings: &mut Warnings) -> Result<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => return Err(CompactError::read(path, e)),
        };
        match serde_json::from_str(&text) {
            Ok(tracker) => Ok(tracker),
            Err(e) => {
                let backup = path.with_extension("json.bak");
                std::fs::rename(path, &backup).map_err(|e| CompactError::write(&backup, e))?;
                warnings.push(format!(
                    "tracker {} is unreadable ({}); moved to {} and starting fresh",
                    path.display(),
                    e,
                    backup.display()
                ));
                Ok(Self::new())
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        atomic_write(path, json.as_bytes()).map_err(|e| CompactError::write(path, e))
    }

    /// Unseen, or modified after it was last observed. Compared at whole
    /// seconds, the resolution the tracker stores.
    pub fn is_pending(&self, name: &str, modified: Option<DateTime<Utc>>) -> bool {
        let Some(seen) = self.entries.get(name) else {
            return true;
        };
        let Ok(seen) = DateTime::parse_from_rfc3339(seen) else {
            // Unparseable timestamps still count as observed.
            return false;
        };
        modified.is_some_and(|m| m.timestamp() > seen.timestamp())
    }

    pub fn mark(&mut self, name: &str, now: DateTime<Utc>) {
        self.entries
            .insert(name.to_string(), now.to_rfc3339_opts(SecondsFormat::Secs, true));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let mut warnings = Warnings::quiet();
        let tracker = SessionTracker::load(&dir.path().join("t.json"), &mut warnings).unwrap();
        assert!(tracker.is_empty());
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".observed-sessions.json");
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let mut tracker = SessionTracker::new();
        tracker.mark("s1.jsonl", now);
        tracker.save(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"s1.jsonl\": \"2026-03-01T12:00:00Z\""));
        let loaded = SessionTracker::load(&path, &mut Warnings::quiet()).unwrap();
        assert_eq!(loaded, tracker);
    }

    #[test]
    fn test_corrupt_tracker_moved_aside() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".observed-sessions.json");
        std::fs::write(&path, "{not json").unwrap();
        let mut warnings = Warnings::quiet();
        let tracker = SessionTracker::load(&path, &mut warnings).unwrap();
        assert!(tracker.is_empty());
        assert_eq!(warnings.len(), 1);
        assert!(dir.path().join(".observed-sessions.json.bak").exists());
        assert!(!path.exists());
    }

    #[test]
    fn test_pending_rules() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let mut tracker = SessionTracker::new();
        tracker.mark("s1.jsonl", now);
        assert!(tracker.is_pending("s2.jsonl", None));
        assert!(!tracker.is_pending("s1.jsonl", None));
        assert!(!tracker.is_pending("s1.jsonl", Some(now - Duration::hours(1))));
        assert!(tracker.is_pending("s1.jsonl", Some(now + Duration::hours(1))));
    }

    #[test]
    fn test_mark_never_drops_entries() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let mut tracker = SessionTracker::new();
        tracker.mark("a.jsonl", now);
        tracker.mark("b.jsonl", now);
        tracker.mark("a.jsonl", now + Duration::days(1));
        assert_eq!(tracker.len(), 2);
        assert!(tracker.contains("a.jsonl") && tracker.contains("b.jsonl"));
    }
}
