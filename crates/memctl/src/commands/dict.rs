use serde::Serialize;
use std::path::{Path, PathBuf};

use super::{projected_tokens, render_changes, total_tokens, Context};
use crate::cli::DictArgs;
use memctl_codec::{
    build_codebook, compress_text, compression_stats, decompress_text, load_codebook,
    recompress_text, save_codebook, Codebook, CodebookStats,
};
use memctl_core::{CompactError, MemoryFile};
use memctl_tokens::FileChange;

#[derive(Serialize)]
struct DictResult {
    action: &'static str,
    codebook_path: PathBuf,
    codebook_entries: usize,
    files_scanned: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    stats: Option<CodebookStats>,
    files: Vec<FileChange>,
}

/// Learn a codebook from the workspace and save it.
///
/// Text is decoded with the previous codebook first, so codes never become
/// phrases, and files encoded with it are re-encoded with the new one.
pub fn build(
    ctx: &mut Context,
    files: &[MemoryFile],
    path: &Path,
    dry_run: bool,
) -> anyhow::Result<(Codebook, Vec<FileChange>)> {
    let previous = match load_codebook(path) {
        Ok(codebook) => Some(codebook),
        Err(CompactError::CodebookMissing(_)) => None,
        Err(e) => {
            ctx.warnings.push(format!("replacing codebook: {}", e));
            None
        }
    };
    let plain: Vec<String> = files
        .iter()
        .map(|f| match &previous {
            Some(old) => decompress_text(&f.text, old),
            None => f.text.clone(),
        })
        .collect();

    let codebook = build_codebook(&plain, &ctx.config.codebook);
    tracing::debug!("learned {} phrases from {} files", codebook.len(), files.len());
    if !dry_run {
        save_codebook(path, &codebook)?;
    }

    let mut changes = Vec::new();
    if previous.as_ref().is_some_and(|old| *old != codebook) {
        for (file, text) in files.iter().zip(&plain) {
            if *text != file.text {
                changes.push(ctx.write(file, &compress_text(text, &codebook), dry_run)?);
            }
        }
    }
    Ok((codebook, changes))
}

/// Encode every file with `codebook`, replacing any earlier encoding
pub fn apply(
    ctx: &Context,
    files: &[MemoryFile],
    codebook: &Codebook,
    dry_run: bool,
) -> anyhow::Result<Vec<FileChange>> {
    let mut changes = Vec::with_capacity(files.len());
    for file in files {
        changes.push(ctx.write(file, &recompress_text(&file.text, codebook), dry_run)?);
    }
    Ok(changes)
}

pub fn run(ctx: &mut Context, args: &DictArgs) -> anyhow::Result<()> {
    let path = args
        .codebook
        .clone()
        .unwrap_or_else(|| ctx.ws.codebook_path());
    let files = ctx.load_files()?;
    let before = total_tokens(&files);
    let action = &args.action;

    let (name, codebook, changes, stats) = if action.compress {
        let codebook = load_codebook(&path)?;
        let changes = apply(ctx, &files, &codebook, args.dry_run)?;
        ("compress", codebook, changes, None)
    } else if action.decompress {
        let codebook = load_codebook(&path)?;
        let mut changes = Vec::with_capacity(files.len());
        for file in &files {
            changes.push(ctx.write(file, &decompress_text(&file.text, &codebook), args.dry_run)?);
        }
        ("decompress", codebook, changes, None)
    } else if action.stats {
        let codebook = load_codebook(&path)?;
        let plain: Vec<String> = files
            .iter()
            .map(|f| decompress_text(&f.text, &codebook))
            .collect();
        let stats = compression_stats(&plain, &codebook);
        ("stats", codebook, Vec::new(), Some(stats))
    } else {
        let (codebook, changes) = build(ctx, &files, &path, args.dry_run)?;
        ("build", codebook, changes, None)
    };
    let after = projected_tokens(before, &changes);

    let mut human = format!(
        "Codebook: {} entries from {} files\n",
        codebook.len(),
        files.len()
    );
    if name == "build" {
        let verb = if args.dry_run { "Would save to" } else { "Saved to" };
        human.push_str(&format!("{}: {}\n", verb, path.display()));
    }
    if let Some(stats) = &stats {
        human.push_str(&format!(
            "Codes used: {} of {}\nChars: {} -> {}\nReduction: {:.2}% gross, {:.2}% net of the codebook\n",
            stats.codes_used,
            stats.codebook_entries,
            stats.original_chars,
            stats.compressed_chars,
            stats.gross_reduction_pct,
            stats.net_reduction_pct
        ));
    }
    human.push_str(&render_changes(&changes));

    let result = DictResult {
        action: name,
        codebook_path: path,
        codebook_entries: codebook.len(),
        files_scanned: files.len(),
        stats,
        files: changes,
    };
    ctx.finish("dict", before, after, &result, &human)
}
