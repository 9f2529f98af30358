//! Every pass in order: observe, rule, dictionary, RLE, optimizer, optional
//! dedup, then the tier and audit reports.
//!
//! Each pass reloads the workspace from disk, so no pass sees another's
//! in-memory state. Recoverable failures skip their step with a warning.

use chrono::NaiveDate;
use serde::Serialize;
use std::path::Path;

use super::{dedup, dict, observe, optimize, total_tokens, Context};
use memctl_codec::{load_codebook, rle_compress, IpFamilyStore, RleContext};
use memctl_core::{rule_compress, workspace_tokens, CompactError};
use memctl_report::{audit_files, format_report, generate_tiers, AuditReport};
use memctl_tokens::FileChange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum StepStatus {
    Ok,
    Skipped,
}

#[derive(Serialize)]
struct StepReport {
    step: &'static str,
    status: StepStatus,
    detail: String,
    /// Workspace tokens once the step finished
    tokens_after: usize,
}

#[derive(Serialize)]
struct TierSummary {
    level: u8,
    sections: usize,
    tokens_used: usize,
    budget: usize,
}

#[derive(Serialize)]
struct FullResult {
    steps: Vec<StepReport>,
    tiers: Vec<TierSummary>,
    audit: AuditReport,
}

fn changed(changes: &[FileChange]) -> usize {
    changes.iter().filter(|c| c.changed).count()
}

struct Pipeline<'c> {
    ctx: &'c mut Context,
    steps: Vec<StepReport>,
}

impl Pipeline<'_> {
    fn record(&mut self, step: &'static str, status: StepStatus, detail: String) -> anyhow::Result<()> {
        let tokens_after = workspace_tokens(&self.ctx.ws)?;
        tracing::info!("{}: {} ({} tokens)", step, detail, tokens_after);
        self.steps.push(StepReport {
            step,
            status,
            detail,
            tokens_after,
        });
        Ok(())
    }

    fn skip(&mut self, step: &'static str, error: CompactError) -> anyhow::Result<()> {
        self.ctx.warnings.push(format!("{} skipped: {}", step, error));
        self.record(step, StepStatus::Skipped, error.to_string())
    }

    fn observe(&mut self, since: Option<NaiveDate>, sessions_dir: Option<&Path>) -> anyhow::Result<()> {
        match observe::observe(self.ctx, since, sessions_dir) {
            Ok(report) => self.record(
                "observe",
                StepStatus::Ok,
                format!(
                    "{} new session(s), {} -> {} transcript tokens",
                    report.processed, report.transcript_tokens, report.observation_tokens
                ),
            ),
            Err(e) if e.is_recoverable() => self.skip("observe", e),
            Err(e) => Err(e.into()),
        }
    }

    fn rules(&mut self) -> anyhow::Result<()> {
        let files = self.ctx.load_files()?;
        let mut changes = Vec::with_capacity(files.len());
        for file in &files {
            changes.push(self.ctx.write(file, &rule_compress(&file.text), false)?);
        }
        self.record(
            "compress",
            StepStatus::Ok,
            format!("{} of {} files rewritten", changed(&changes), files.len()),
        )
    }

    fn dictionary(&mut self) -> anyhow::Result<()> {
        let path = self.ctx.ws.codebook_path();
        let files = self.ctx.load_files()?;
        let codebook = match load_codebook(&path) {
            Ok(codebook) => codebook,
            Err(CompactError::CodebookMissing(_)) => dict::build(self.ctx, &files, &path, false)?.0,
            Err(e) if e.is_recoverable() => return self.skip("dict", e),
            Err(e) => return Err(e.into()),
        };
        if codebook.is_empty() {
            return self.record("dict", StepStatus::Ok, "no phrases worth a code".to_string());
        }
        let changes = dict::apply(self.ctx, &files, &codebook, false)?;
        self.record(
            "dict",
            StepStatus::Ok,
            format!(
                "{} entries, {} files rewritten",
                codebook.len(),
                changed(&changes)
            ),
        )
    }

    fn rle(&mut self) -> anyhow::Result<()> {
        let store_path = self.ctx.ws.ip_families_path();
        let mut store = IpFamilyStore::load(&store_path)?;
        let workspace_paths = self.ctx.config.workspace_paths(&self.ctx.ws);
        let files = self.ctx.load_files()?;

        let mut changes = Vec::with_capacity(files.len());
        for file in &files {
            let rle = RleContext {
                workspace_paths: workspace_paths.clone(),
                ip_min_occurrences: self.ctx.config.ip_min_occurrences,
                ip_families: store.get(&file.name),
            };
            let (text, families) = rle_compress(&file.text, &rle);
            changes.push(self.ctx.write(file, &text, false)?);
            store.set(&file.name, families);
        }
        store.save(&store_path)?;
        self.record(
            "rle",
            StepStatus::Ok,
            format!("{} files rewritten", changed(&changes)),
        )
    }

    fn optimize(&mut self) -> anyhow::Result<()> {
        let files = self.ctx.load_files()?;
        let (changes, _) = optimize::apply(self.ctx, &files, false, false)?;
        self.record(
            "optimize",
            StepStatus::Ok,
            format!("{} files rewritten", changed(&changes)),
        )
    }

    fn dedup(&mut self) -> anyhow::Result<()> {
        let changes = dedup::merge(self.ctx)?;
        self.record(
            "dedup",
            StepStatus::Ok,
            format!("{} files rewritten", changed(&changes)),
        )
    }
}

pub fn run(
    ctx: &mut Context,
    since: Option<NaiveDate>,
    sessions_dir: Option<&Path>,
    with_dedup: bool,
) -> anyhow::Result<()> {
    let before = total_tokens(&ctx.load_files()?);

    let mut pipeline = Pipeline {
        ctx: &mut *ctx,
        steps: Vec::new(),
    };
    pipeline.observe(since, sessions_dir)?;
    pipeline.rules()?;
    pipeline.dictionary()?;
    pipeline.rle()?;
    pipeline.optimize()?;
    if with_dedup {
        pipeline.dedup()?;
    }
    let steps = pipeline.steps;

    let files = ctx.load_files()?;
    let after = total_tokens(&files);
    let tiers = generate_tiers(&files, &ctx.config.tiers)
        .tiers
        .into_iter()
        .map(|t| TierSummary {
            level: t.level,
            sections: t.sections.len(),
            tokens_used: t.tokens_used,
            budget: t.budget,
        })
        .collect::<Vec<_>>();
    let audit = audit_files(&files, &ctx.config.audit, ctx.now);

    let mut human = String::new();
    for step in &steps {
        let status = match step.status {
            StepStatus::Ok => "",
            StepStatus::Skipped => " [skipped]",
        };
        human.push_str(&format!("  {:<9} {}{}\n", step.step, step.detail, status));
    }
    for tier in &tiers {
        human.push_str(&format!(
            "  tier {}    {} sections, {}/{} tokens\n",
            tier.level, tier.sections, tier.tokens_used, tier.budget
        ));
    }
    human.push('\n');
    human.push_str(&format_report(&audit));

    let result = FullResult { steps, tiers, audit };
    ctx.finish("full", before, after, &result, &human)
}
