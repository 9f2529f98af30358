use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "memctl")]
#[command(version)]
#[command(about = "Token compaction for agent memory workspaces")]
pub struct Cli {
    /// Workspace directory holding the memory markdown files
    pub workspace: PathBuf,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print a JSON report instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    memctl_observe::parse_since(value).ok_or_else(|| format!("expected YYYY-MM-DD, got {:?}", value))
}

#[derive(Subcommand)]
pub enum Commands {
    /// Count tokens per memory file
    Estimate {
        /// Only list files with at least this many tokens
        #[arg(long, default_value_t = 0)]
        threshold: usize,
    },

    /// Apply the rule engine to every memory file
    Compress {
        #[arg(long)]
        dry_run: bool,

        /// Only touch files last modified more than DAYS ago
        #[arg(long, value_name = "DAYS")]
        older_than: Option<i64>,

        /// Also strip emoji, empty sections and table padding
        #[arg(long)]
        clean: bool,
    },

    /// Find near-duplicate lines across memory files
    Dedup {
        /// Remove the duplicates instead of only reporting them
        #[arg(long)]
        auto_merge: bool,

        /// Jaccard similarity threshold
        #[arg(long, value_name = "FLOAT")]
        threshold_val: Option<f64>,
    },

    /// Build the three budgeted summary tiers
    Tiers {
        /// Print the summary document for one level
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=2))]
        level: Option<u8>,
    },

    /// Report budgets, staleness and cleanup suggestions
    Audit {
        #[arg(long)]
        stale_days: Option<i64>,
    },

    /// Distil new session transcripts into memory/observations/<session>.md
    Observe {
        /// Skip sessions dated before this day
        #[arg(long, value_parser = parse_date, value_name = "ISO_DATE")]
        since: Option<NaiveDate>,

        #[arg(long, value_name = "PATH")]
        sessions_dir: Option<PathBuf>,
    },

    /// Learned phrase dictionary
    Dict(DictArgs),

    /// Tokenizer-level rewrites (punctuation, tables, whitespace)
    Optimize {
        /// Also strip emphasis, trivial backticks and bullet markers
        #[arg(long)]
        aggressive: bool,

        #[arg(long)]
        dry_run: bool,
    },

    /// Run every pass in order
    Full {
        #[arg(long, value_parser = parse_date, value_name = "ISO_DATE")]
        since: Option<NaiveDate>,

        #[arg(long, value_name = "PATH")]
        sessions_dir: Option<PathBuf>,

        /// Merge near-duplicates after the optimizer
        #[arg(long)]
        dedup: bool,
    },

    /// Measure each pass on an in-memory copy of the workspace
    Benchmark,
}

#[derive(Args)]
pub struct DictArgs {
    #[command(flatten)]
    pub action: DictAction,

    /// Codebook location (default: memory/.codebook.json)
    #[arg(long, value_name = "PATH")]
    pub codebook: Option<PathBuf>,

    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args)]
#[group(multiple = false)]
pub struct DictAction {
    /// Learn a codebook from the workspace (default)
    #[arg(long)]
    pub build: bool,

    /// Replace phrases with their codes
    #[arg(long)]
    pub compress: bool,

    /// Expand codes back to phrases
    #[arg(long)]
    pub decompress: bool,

    /// Report codebook coverage without writing
    #[arg(long)]
    pub stats: bool,
}
