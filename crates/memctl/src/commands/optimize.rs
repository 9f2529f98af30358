use serde::Serialize;

use super::{projected_tokens, render_changes, total_tokens, Context};
use memctl_codec::{estimate_savings, optimize_tokens, SavingsEstimate};
use memctl_core::MemoryFile;
use memctl_tokens::FileChange;

#[derive(Serialize)]
struct OptimizedFile {
    file: String,
    #[serde(flatten)]
    savings: SavingsEstimate,
    #[serde(skip_serializing_if = "Option::is_none")]
    diff: Option<String>,
}

#[derive(Serialize)]
struct OptimizeResult {
    aggressive: bool,
    dry_run: bool,
    files: Vec<OptimizedFile>,
}

/// Optimize every file, returning the writes plus per-file savings
pub fn apply(
    ctx: &Context,
    files: &[MemoryFile],
    aggressive: bool,
    dry_run: bool,
) -> anyhow::Result<(Vec<FileChange>, Vec<SavingsEstimate>)> {
    let mut changes = Vec::with_capacity(files.len());
    let mut savings = Vec::with_capacity(files.len());
    for file in files {
        let optimized = optimize_tokens(&file.text, aggressive);
        savings.push(estimate_savings(&file.text, &optimized));
        changes.push(ctx.write(file, &optimized, dry_run)?);
    }
    Ok((changes, savings))
}

pub fn run(ctx: &mut Context, aggressive: bool, dry_run: bool) -> anyhow::Result<()> {
    let files = ctx.load_files()?;
    let before = total_tokens(&files);
    let (changes, savings) = apply(ctx, &files, aggressive, dry_run)?;
    let after = projected_tokens(before, &changes);

    let human = render_changes(&changes);
    let result = OptimizeResult {
        aggressive,
        dry_run,
        files: changes
            .into_iter()
            .zip(savings)
            .map(|(change, savings)| OptimizedFile {
                file: change.path.display().to_string(),
                savings,
                diff: change.diff,
            })
            .collect(),
    };
    ctx.finish("optimize", before, after, &result, &human)
}
