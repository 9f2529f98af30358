use serde::Serialize;

use super::{projected_tokens, render_changes, total_tokens, Context};
use memctl_core::{markdown_cleanup, rule_compress};

#[derive(Serialize)]
struct CompressedFile {
    file: String,
    original_tokens: usize,
    rule_compressed_tokens: usize,
    rule_reduction_pct: f64,
    changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    diff: Option<String>,
}

#[derive(Serialize)]
struct CompressResult {
    dry_run: bool,
    clean: bool,
    files: Vec<CompressedFile>,
    skipped_recent: usize,
}

pub fn run(ctx: &mut Context, dry_run: bool, older_than: Option<i64>, clean: bool) -> anyhow::Result<()> {
    let files = ctx.load_files()?;
    let before = total_tokens(&files);

    let mut changes = Vec::new();
    let mut skipped_recent = 0;
    for file in &files {
        if let Some(days) = older_than {
            if !file.age_days(ctx.now).is_some_and(|age| age > days) {
                skipped_recent += 1;
                continue;
            }
        }
        let updated = if clean {
            rule_compress(&markdown_cleanup(&file.text))
        } else {
            rule_compress(&file.text)
        };
        changes.push(ctx.write(file, &updated, dry_run)?);
    }
    let after = projected_tokens(before, &changes);

    let mut human = render_changes(&changes);
    if skipped_recent > 0 {
        human.push_str(&format!("{} recent files left alone\n", skipped_recent));
    }
    let result = CompressResult {
        dry_run,
        clean,
        files: changes
            .into_iter()
            .map(|c| CompressedFile {
                file: c.path.display().to_string(),
                original_tokens: c.tokens_before,
                rule_compressed_tokens: c.tokens_after,
                rule_reduction_pct: c.reduction_pct(),
                changed: c.changed,
                diff: c.diff,
            })
            .collect(),
        skipped_recent,
    };
    ctx.finish("compress", before, after, &result, &human)
}
