use serde::Serialize;

use super::{render_changes, Context};
use memctl_dedup::{DedupPlan, DedupReport};
use memctl_tokens::FileChange;

#[derive(Serialize)]
struct DedupResult {
    threshold: f64,
    merged: bool,
    #[serde(flatten)]
    report: DedupReport,
}

fn render_groups(report: &DedupReport) -> String {
    let mut out = format!(
        "{} entries, {} duplicate groups\n",
        report.total_entries,
        report.groups.len()
    );
    for (n, group) in report.groups.iter().enumerate() {
        out.push_str(&format!("\nGroup {} (similarity {:.3})\n", n + 1, group.similarity));
        for member in &group.members {
            let mark = if member.kept { "keep" } else { "drop" };
            out.push_str(&format!(
                "  [{}] {}:{} {}\n",
                mark,
                member.entry.source,
                member.entry.line + 1,
                member.entry.text
            ));
        }
    }
    out
}

pub fn run(ctx: &mut Context, auto_merge: bool, threshold: Option<f64>) -> anyhow::Result<()> {
    let files = ctx.load_files()?;
    let threshold = threshold.unwrap_or(ctx.config.dedup_threshold);
    let plan = DedupPlan::build(&files, threshold, ctx.config.shingle_size, ctx.config.min_chunk_len);
    let report = plan.report(&files);

    let mut human = render_groups(&report);
    if auto_merge {
        let mut changes: Vec<FileChange> = Vec::new();
        for (idx, text) in plan.rewrites(&files) {
            changes.push(ctx.write(&files[idx], &text, false)?);
        }
        human.push('\n');
        human.push_str(&render_changes(&changes));
    } else if plan.lines_removed() > 0 {
        human.push_str(&format!(
            "\n{} duplicate lines found; rerun with --auto-merge to remove them\n",
            plan.lines_removed()
        ));
    }

    let (before, after) = (report.tokens_before, report.tokens_after);
    let result = DedupResult {
        threshold,
        merged: auto_merge,
        report,
    };
    ctx.finish("dedup", before, after, &result, &human)
}

/// Merge duplicates in place, returning the changes written
pub fn merge(ctx: &mut Context) -> anyhow::Result<Vec<FileChange>> {
    let files = ctx.load_files()?;
    let plan = DedupPlan::build(
        &files,
        ctx.config.dedup_threshold,
        ctx.config.shingle_size,
        ctx.config.min_chunk_len,
    );
    let mut changes = Vec::new();
    for (idx, text) in plan.rewrites(&files) {
        changes.push(ctx.write(&files[idx], &text, false)?);
    }
    Ok(changes)
}
