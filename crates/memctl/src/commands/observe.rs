use chrono::NaiveDate;
use std::path::Path;

use super::Context;
use memctl_core::CompactError;
use memctl_observe::{observe_sessions, ObserveOptions, ObserveReport};

/// Observe pending sessions, resolving the sessions directory from the flag
/// or the config
pub fn observe(
    ctx: &mut Context,
    since: Option<NaiveDate>,
    sessions_dir: Option<&Path>,
) -> Result<ObserveReport, CompactError> {
    let opts = ObserveOptions {
        sessions_dir: ctx.config.sessions_dir(&ctx.ws, sessions_dir),
        since,
        limits: ctx.config.observe.clone(),
        dry_run: false,
    };
    tracing::debug!("observing sessions in {}", opts.sessions_dir.display());
    observe_sessions(&ctx.ws, &opts, &mut ctx.warnings, ctx.now)
}

fn render(report: &ObserveReport) -> String {
    let mut out = String::new();
    for session in &report.sessions {
        out.push_str(&format!(
            "{}: {} tool calls -> {} observations ({} -> {} tokens)\n",
            session.file,
            session.interactions,
            session.observations,
            session.transcript_tokens,
            session.observation_tokens
        ));
        if let Some(output) = &session.output {
            out.push_str(&format!("  wrote {}\n", output));
        }
    }
    out.push_str(&format!(
        "Processed {} new session(s), {} total tracked.\n",
        report.processed, report.total_tracked
    ));
    if report.skipped_since > 0 {
        out.push_str(&format!("{} session(s) older than --since\n", report.skipped_since));
    }
    out
}

/// Token figures are transcript tokens in, observation tokens out
pub fn run(ctx: &mut Context, since: Option<NaiveDate>, sessions_dir: Option<&Path>) -> anyhow::Result<()> {
    let report = observe(ctx, since, sessions_dir)?;
    let (before, after) = (report.transcript_tokens, report.observation_tokens);
    ctx.finish("observe", before, after, &report, &render(&report))
}
