//! One module per subcommand, sharing the workspace context and the report
//! envelope

pub mod audit;
pub mod benchmark;
pub mod compress;
pub mod dedup;
pub mod dict;
pub mod estimate;
pub mod full;
pub mod observe;
pub mod optimize;
pub mod tiers;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::cli::{Cli, Commands};
use memctl_core::{load_memory_files, open_workspace, CompactError, Config, MemoryFile, Warnings};
use memctl_tokens::{write_text, FileChange, Workspace};

pub fn run(cli: Cli) -> anyhow::Result<()> {
    let mut ctx = Context::open(&cli.workspace, cli.json)?;
    match cli.command {
        Commands::Estimate { threshold } => estimate::run(&mut ctx, threshold),
        Commands::Compress {
            dry_run,
            older_than,
            clean,
        } => compress::run(&mut ctx, dry_run, older_than, clean),
        Commands::Dedup {
            auto_merge,
            threshold_val,
        } => dedup::run(&mut ctx, auto_merge, threshold_val),
        Commands::Tiers { level } => tiers::run(&mut ctx, level),
        Commands::Audit { stale_days } => audit::run(&mut ctx, stale_days),
        Commands::Observe {
            since,
            sessions_dir,
        } => observe::run(&mut ctx, since, sessions_dir.as_deref()),
        Commands::Dict(args) => dict::run(&mut ctx, &args),
        Commands::Optimize {
            aggressive,
            dry_run,
        } => optimize::run(&mut ctx, aggressive, dry_run),
        Commands::Full {
            since,
            sessions_dir,
            dedup,
        } => full::run(&mut ctx, since, sessions_dir.as_deref(), dedup),
        Commands::Benchmark => benchmark::run(&mut ctx),
    }
}

/// State shared by every command for one invocation
pub struct Context {
    pub ws: Workspace,
    pub config: Config,
    pub warnings: Warnings,
    pub json: bool,
    pub now: DateTime<Utc>,
}

impl Context {
    pub fn open(root: &Path, json: bool) -> Result<Self, CompactError> {
        let ws = open_workspace(root)?;
        let mut warnings = if json {
            Warnings::quiet()
        } else {
            Warnings::logged()
        };
        let config = Config::load(&ws, &mut warnings);
        Ok(Self {
            ws,
            config,
            warnings,
            json,
            now: Utc::now(),
        })
    }

    pub fn load_files(&mut self) -> Result<Vec<MemoryFile>, CompactError> {
        load_memory_files(&self.ws, &mut self.warnings)
    }

    /// Write `updated` over `file` (or project it under `dry_run`). The
    /// returned change names the file relative to the workspace.
    pub fn write(&self, file: &MemoryFile, updated: &str, dry_run: bool) -> Result<FileChange, CompactError> {
        let mut change = write_text(&file.path, &file.text, updated, dry_run)
            .map_err(|e| CompactError::write(&file.path, e))?;
        if change.changed {
            tracing::debug!(
                "{} {}: {} -> {} tokens",
                if dry_run { "would rewrite" } else { "rewrote" },
                file.name,
                change.tokens_before,
                change.tokens_after
            );
        }
        change.path = PathBuf::from(&file.name);
        Ok(change)
    }

    /// Print the report: the JSON envelope, or `human` followed by the token
    /// summary
    pub fn finish<T: Serialize>(
        &self,
        command: &'static str,
        tokens_before: usize,
        tokens_after: usize,
        result: &T,
        human: &str,
    ) -> anyhow::Result<()> {
        let tokens_saved = tokens_before as i64 - tokens_after as i64;
        if self.json {
            let envelope = Envelope {
                command,
                workspace: self.ws.root.display().to_string(),
                tokens_before,
                tokens_after,
                tokens_saved,
                warnings: self.warnings.messages(),
                result,
            };
            println!("{}", serde_json::to_string_pretty(&envelope)?);
            return Ok(());
        }
        if !human.is_empty() {
            print!("{}", human);
            if !human.ends_with('\n') {
                println!();
            }
            println!();
        }
        println!("Before: {} tokens", tokens_before);
        println!("After:  {} tokens", tokens_after);
        println!("Saved:  {} tokens ({:.1}%)", tokens_saved, percent(tokens_saved, tokens_before));
        Ok(())
    }
}

#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    command: &'static str,
    workspace: String,
    tokens_before: usize,
    tokens_after: usize,
    tokens_saved: i64,
    warnings: &'a [String],
    result: &'a T,
}

/// `saved` as a percentage of `before`, one decimal
pub fn percent(saved: i64, before: usize) -> f64 {
    if before == 0 {
        return 0.0;
    }
    (saved as f64 / before as f64 * 1000.0).round() / 10.0
}

pub fn total_tokens(files: &[MemoryFile]) -> usize {
    files.iter().map(MemoryFile::tokens).sum()
}

/// Token total after applying `changes` to a workspace holding `before`
pub fn projected_tokens(before: usize, changes: &[FileChange]) -> usize {
    let saved: i64 = changes.iter().map(FileChange::saved).sum();
    (before as i64 - saved).max(0) as usize
}

/// Per-file lines plus, for dry runs, the diff of each changed file
pub fn render_changes(changes: &[FileChange]) -> String {
    let mut out = String::new();
    for change in changes {
        let marker = if change.changed { "" } else { " (unchanged)" };
        out.push_str(&format!(
            "{}: {} -> {} tokens{}\n",
            change.path.display(),
            change.tokens_before,
            change.tokens_after,
            marker
        ));
    }
    for change in changes {
        if let Some(diff) = &change.diff {
            out.push_str(&format!("\n--- {}\n{}\n", change.path.display(), diff));
        }
    }
    out
}
