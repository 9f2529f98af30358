use chrono::{NaiveDate, Utc};
use memctl_core::{ObserveLimits, Warnings};
use memctl_observe::{observe_sessions, ObserveOptions, SessionTracker};
use memctl_tokens::Workspace;
use proptest::prelude::*;
use std::path::Path;
use tempfile::TempDir;

const UPTIME_SESSION: &str = concat!(
    r#"{"type":"session","id":"s1","timestamp":"2026-01-01T09:00:00Z","cwd":"/w"}"#,
    "\n",
    r#"{"type":"message","id":"m1","timestamp":"2026-01-01T09:00:01Z","message":{"role":"user","content":"how loaded is the box?"}}"#,
    "\n",
    r#"{"type":"message","id":"m2","timestamp":"2026-01-01T09:00:02Z","message":{"role":"assistant","content":[{"type":"toolCall","toolName":"exec","toolUseId":"t1","input":{"command":"uptime"}}]}}"#,
    "\n",
    r#"{"type":"message","id":"m3","timestamp":"2026-01-01T09:00:03Z","message":{"role":"tool","content":[{"type":"toolResult","toolUseId":"t1","result":"09:00 up 12 days, load average: 0.42"}]}}"#,
    "\n",
    "this line is not json\n",
);

fn workspace() -> (TempDir, Workspace) {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("memory")).unwrap();
    std::fs::create_dir_all(dir.path().join("sessions")).unwrap();
    std::fs::write(
        dir.path().join("memory/2026-01-01.md"),
        "# Notes\nInstalled the gateway.\n",
    )
    .unwrap();
    let ws = Workspace::new(dir.path());
    (dir, ws)
}

fn options(root: &Path) -> ObserveOptions {
    ObserveOptions {
        sessions_dir: root.join("sessions"),
        since: None,
        limits: ObserveLimits::default(),
        dry_run: false,
    }
}

#[test]
fn test_single_exec_session_yields_one_observation() {
    let (dir, ws) = workspace();
    std::fs::write(dir.path().join("sessions/s1.jsonl"), UPTIME_SESSION).unwrap();

    let report = observe_sessions(&ws, &options(dir.path()), &mut Warnings::quiet(), Utc::now()).unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(report.total_tracked, 1);
    assert_eq!(report.sessions[0].malformed_lines, 1);

    let doc = std::fs::read_to_string(ws.observation_path("s1.jsonl")).unwrap();
    assert_eq!(doc.matches("<observation ").count(), 1);
    assert_eq!(doc.matches("<observation type=\"command-executed\">").count(), 1);
    assert!(doc.starts_with("# Session s1.jsonl (2026-01-01)\n"));
    assert_eq!(report.sessions[0].output.as_deref(), Some("memory/observations/s1.md"));
    assert!(doc.contains("    - Command: uptime\n"));

    let tracker = SessionTracker::load(&ws.tracker_path(), &mut Warnings::quiet()).unwrap();
    assert!(tracker.contains("s1.jsonl"));

    // Memory files are left alone.
    let note = std::fs::read_to_string(dir.path().join("memory/2026-01-01.md")).unwrap();
    assert_eq!(note, "# Notes\nInstalled the gateway.\n");
}

#[test]
fn test_second_run_skips_observed_sessions() {
    let (dir, ws) = workspace();
    std::fs::write(dir.path().join("sessions/s1.jsonl"), UPTIME_SESSION).unwrap();
    observe_sessions(&ws, &options(dir.path()), &mut Warnings::quiet(), Utc::now()).unwrap();
    let first = std::fs::read_to_string(ws.observation_path("s1.jsonl")).unwrap();

    let report = observe_sessions(&ws, &options(dir.path()), &mut Warnings::quiet(), Utc::now()).unwrap();
    assert_eq!(report.processed, 0);
    assert_eq!(report.skipped_seen, 1);
    assert_eq!(std::fs::read_to_string(ws.observation_path("s1.jsonl")).unwrap(), first);
}

#[test]
fn test_since_filters_by_header_date() {
    let (dir, ws) = workspace();
    std::fs::write(dir.path().join("sessions/s1.jsonl"), UPTIME_SESSION).unwrap();
    let opts = ObserveOptions {
        since: NaiveDate::from_ymd_opt(2026, 2, 1),
        ..options(dir.path())
    };
    let report = observe_sessions(&ws, &opts, &mut Warnings::quiet(), Utc::now()).unwrap();
    assert_eq!(report.processed, 0);
    assert_eq!(report.skipped_since, 1);
    assert_eq!(report.total_tracked, 0);
    assert!(!ws.observations_dir().exists());
}

#[test]
fn test_sessions_without_tool_calls_are_tracked() {
    let (dir, ws) = workspace();
    std::fs::write(
        dir.path().join("sessions/chat.jsonl"),
        r#"{"type":"message","message":{"role":"user","content":"hello"}}"#,
    )
    .unwrap();
    let report = observe_sessions(&ws, &options(dir.path()), &mut Warnings::quiet(), Utc::now()).unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(report.observation_tokens, 0);
    assert!(!ws.observations_dir().exists());
    assert!(ws.tracker_path().exists());
}

const TWO_COMMAND_SESSION: &str = concat!(
    r#"{"type":"session","id":"s2","timestamp":"2026-01-02T10:00:00Z"}"#,
    "\n",
    r#"{"type":"message","message":{"role":"assistant","content":[{"type":"toolCall","toolName":"exec","toolUseId":"a","input":{"command":"uptime"}},{"type":"toolCall","toolName":"exec","toolUseId":"b","input":{"command":"df -h"}}]}}"#,
    "\n",
    r#"{"type":"message","message":{"role":"tool","content":[{"type":"toolResult","toolUseId":"a","result":"up 3 days, load average 0.1"},{"type":"toolResult","toolUseId":"b","result":"output of df -h here"}]}}"#,
    "\n",
);

#[test]
fn test_observation_documents_stay_out_of_memory_files() {
    let (dir, ws) = workspace();
    std::fs::write(dir.path().join("sessions/s2.jsonl"), TWO_COMMAND_SESSION).unwrap();
    let report = observe_sessions(&ws, &options(dir.path()), &mut Warnings::quiet(), Utc::now()).unwrap();
    assert_eq!(report.sessions[0].observations, 2);

    let doc = std::fs::read_to_string(ws.observation_path("s2.jsonl")).unwrap();
    assert_eq!(doc.matches("<observation type=\"command-executed\">").count(), 2);
    assert_eq!(doc.matches("<facts>").count(), 2);
    assert_eq!(doc.matches("</observation>").count(), 2);
    assert_eq!(doc.matches("- Tool: exec").count(), 2);

    let memory = ws.memory_files().unwrap();
    assert!(memory.iter().all(|p| !p.starts_with(ws.observations_dir())));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn tracker_entries_are_never_dropped(batches in prop::collection::vec(prop::collection::vec(0u8..6, 0..4), 1..4)) {
        let (dir, ws) = workspace();
        let mut seen: Vec<String> = Vec::new();
        for batch in batches {
            for id in batch {
                std::fs::write(dir.path().join(format!("sessions/s{}.jsonl", id)), UPTIME_SESSION).unwrap();
            }
            observe_sessions(&ws, &options(dir.path()), &mut Warnings::quiet(), Utc::now()).unwrap();
            let tracker = SessionTracker::load(&ws.tracker_path(), &mut Warnings::quiet()).unwrap();
            for name in &seen {
                prop_assert!(tracker.contains(name));
            }
            for entry in std::fs::read_dir(dir.path().join("sessions")).unwrap().flatten() {
                let name = entry.file_name().to_string_lossy().to_string();
                prop_assert!(tracker.contains(&name));
                if !seen.contains(&name) {
                    seen.push(name);
                }
            }
        }
    }
}
