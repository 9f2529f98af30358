//! Distil pending session transcripts into one observation document per
//! session under `memory/observations/`

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::extractor::{extract_observation, format_observations};
use crate::session::{extract_interactions, session_timestamp, SessionLine};
use crate::tracker::SessionTracker;
use memctl_core::{CompactError, ObserveLimits, Result, Warnings};
use memctl_tokens::{atomic_write, estimate_tokens, parse_jsonl, Workspace};

#[derive(Debug, Clone)]
pub struct ObserveOptions {
    pub sessions_dir: PathBuf,
    /// Skip sessions dated before this day
    pub since: Option<NaiveDate>,
    pub limits: ObserveLimits,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub file: String,
    pub date: Option<NaiveDate>,
    pub interactions: usize,
    pub observations: usize,
    pub malformed_lines: usize,
    pub transcript_tokens: usize,
    pub observation_tokens: usize,
    /// Workspace-relative observation document, when the session had any
    /// tool calls
    pub output: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ObserveReport {
    pub processed: usize,
    pub total_tracked: usize,
    /// Already in the tracker and unchanged
    pub skipped_seen: usize,
    /// Dated before `--since`
    pub skipped_since: usize,
    pub transcript_tokens: usize,
    pub observation_tokens: usize,
    pub sessions: Vec<SessionSummary>,
}

/// Parse a `--since` argument: `YYYY-MM-DD` or a full RFC 3339 timestamp
pub fn parse_since(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(value.trim())
                .ok()
                .map(|dt| dt.with_timezone(&Utc).date_naive())
        })
}

fn modified_at(path: &Path) -> Option<DateTime<Utc>> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}

fn session_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| CompactError::read(dir, e))?;
    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().and_then(|e| e.to_str()) == Some("jsonl"))
        .collect();
    files.sort();
    Ok(files)
}

/// Render the observation document of one session
pub fn session_document(name: &str, date: Option<NaiveDate>, observations: &str) -> String {
    let date_label = date.map_or_else(|| "undated".to_string(), |d| d.to_string());
    format!("# Session {} ({})

{}", name, date_label, observations)
}

/// Observe every pending session in `opts.sessions_dir`, in file-name order.
///
/// Each session's document replaces any earlier one for the same session.
/// Documents are written before the tracker, so an interrupted run only ever
/// re-observes a session, it never loses one.
pub fn observe_sessions(
    ws: &Workspace,
    opts: &ObserveOptions,
    warnings: &mut Warnings,
    now: DateTime<Utc>,
) -> Result<ObserveReport> {
    if !opts.sessions_dir.is_dir() {
        return Err(CompactError::SessionsDirMissing(opts.sessions_dir.clone()));
    }
    let tracker_path = ws.tracker_path();
    let mut tracker = SessionTracker::load(&tracker_path, warnings)?;

    let mut report = ObserveReport {
        processed: 0,
        total_tracked: tracker.len(),
        skipped_seen: 0,
        skipped_since: 0,
        transcript_tokens: 0,
        observation_tokens: 0,
        sessions: Vec::new(),
    };
    let mut documents: Vec<(PathBuf, String)> = Vec::new();

    for path in session_files(&opts.sessions_dir)? {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let modified = modified_at(&path);
        if !tracker.is_pending(&name, modified) {
            report.skipped_seen += 1;
            continue;
        }

        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                warnings.push(format!("skipping session {}: {}", path.display(), e));
                continue;
            }
        };
        let parsed = parse_jsonl::<SessionLine>(&text);
        if parsed.malformed > 0 {
            tracing::debug!("{}: {} malformed lines ignored", name, parsed.malformed);
        }

        let date = session_timestamp(&parsed.records)
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .map(|dt| dt.with_timezone(&Utc).date_naive())
            .or_else(|| modified.map(|m| m.date_naive()));
        if let (Some(since), Some(date)) = (opts.since, date) {
            if date < since {
                report.skipped_since += 1;
                continue;
            }
        }

        let interactions = extract_interactions(&parsed.records, &opts.limits);
        let observations: Vec<_> = interactions
            .iter()
            .map(|i| extract_observation(i, &opts.limits))
            .collect();

        let mut observation_tokens = 0;
        let mut output = None;
        if !observations.is_empty() {
            let document = session_document(&name, date, &format_observations(&observations));
            observation_tokens = estimate_tokens(&document);
            let out_path = ws.observation_path(&name);
            output = Some(ws.relative(&out_path));
            documents.push((out_path, document));
        }

        let transcript_tokens = estimate_tokens(&text);
        tracing::debug!(
            "{}: {} interactions, {} -> {} tokens",
            name,
            interactions.len(),
            transcript_tokens,
            observation_tokens
        );
        report.transcript_tokens += transcript_tokens;
        report.observation_tokens += observation_tokens;
        report.processed += 1;
        report.sessions.push(SessionSummary {
            file: name.clone(),
            date,
            interactions: interactions.len(),
            observations: observations.len(),
            malformed_lines: parsed.malformed,
            transcript_tokens,
            observation_tokens,
            output,
        });
        tracker.mark(&name, now);
    }

    if !opts.dry_run && report.processed > 0 {
        for (out_path, document) in &documents {
            atomic_write(out_path, document.as_bytes())
                .map_err(|e| CompactError::write(out_path, e))?;
        }
        tracker.save(&tracker_path)?;
    }
    report.total_tracked = tracker.len();
    Ok(report)
}
