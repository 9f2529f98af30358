//! Measure each compression pass on an in-memory copy of the workspace

use serde::Serialize;
use std::fmt::Write as _;

use super::{percent, Context};
use memctl_codec::{build_codebook, compress_text, optimize_tokens, rle_compress, IpFamilyStore, RleContext};
use memctl_core::{rule_compress, MemoryFile};
use memctl_tokens::{engine_name, estimate_tokens};

#[derive(Debug, Clone, Serialize)]
struct StepResult {
    name: &'static str,
    before: usize,
    after: usize,
    saved: usize,
    pct: f64,
}

#[derive(Serialize)]
struct BenchmarkResult {
    date: String,
    engine: &'static str,
    files: usize,
    steps: Vec<StepResult>,
    total_before: usize,
    total_after: usize,
    total_saved: usize,
    total_pct: f64,
    session_files: usize,
    recommendations: Vec<String>,
}

fn corpus_tokens(texts: &[String]) -> usize {
    texts.iter().map(|t| estimate_tokens(t)).sum()
}

/// Run one pass over `texts`. A pass that would add tokens is recorded as
/// saving nothing and its input is carried forward.
fn step<F>(name: &'static str, texts: &mut Vec<String>, pass: F) -> StepResult
where
    F: FnOnce(&[String]) -> Vec<String>,
{
    let before = corpus_tokens(texts.as_slice());
    let output = pass(texts.as_slice());
    let after = corpus_tokens(&output);
    if after > before {
        tracing::debug!("{} would add {} tokens, ignored", name, after - before);
        return StepResult {
            name,
            before,
            after: before,
            saved: 0,
            pct: 0.0,
        };
    }
    *texts = output;
    let saved = before - after;
    StepResult {
        name,
        before,
        after,
        saved,
        pct: percent(saved as i64, before),
    }
}

fn recommendations(steps: &[StepResult], total_pct: f64, session_files: usize) -> Vec<String> {
    let mut out = Vec::new();
    let pct_of = |name: &str| steps.iter().find(|s| s.name == name).map_or(0.0, |s| s.pct);
    if total_pct < 5.0 {
        out.push("Workspace is already well-optimized".to_string());
    } else {
        if pct_of(RULES) > 3.0 {
            out.push("Run 'compress' to apply rule engine savings".to_string());
        }
        if pct_of(DICTIONARY) > 2.0 {
            out.push("Run 'dict' to apply dictionary compression".to_string());
        }
        if pct_of(OPTIMIZER) > 1.0 {
            out.push("Run 'optimize' for tokenizer-level savings".to_string());
        }
    }
    if session_files > 0 {
        out.push(format!(
            "Run 'observe' to compress {} session transcript(s)",
            session_files
        ));
    }
    out
}

const RULES: &str = "Rule Engine";
const DICTIONARY: &str = "Dictionary Compress";
const RLE: &str = "RLE Patterns";
const OPTIMIZER: &str = "Tokenizer Optimize";

fn count_sessions(ctx: &Context) -> usize {
    let dir = ctx.config.sessions_dir(&ctx.ws, None);
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .flatten()
                .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("jsonl"))
                .count()
        })
        .unwrap_or(0)
}

fn render(result: &BenchmarkResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== memctl Performance Report ===");
    let _ = writeln!(out, "Date: {}", result.date);
    let _ = writeln!(out, "Engine: {}", result.engine);
    let _ = writeln!(out, "Files: {}", result.files);
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:<22} | {:>8} | {:>8} | {:>6} | {:>6}",
        "Step", "Before", "After", "Saved", "%"
    );
    let _ = writeln!(out, "{}", "-".repeat(62));
    for s in &result.steps {
        let _ = writeln!(
            out,
            "{:<22} | {:>8} | {:>8} | {:>6} | {:>5.1}%",
            s.name, s.before, s.after, s.saved, s.pct
        );
    }
    let _ = writeln!(out, "{}", "-".repeat(62));
    let _ = writeln!(
        out,
        "{:<22} | {:>8} | {:>8} | {:>6} | {:>5.1}%",
        "TOTAL (memory)", result.total_before, result.total_after, result.total_saved, result.total_pct
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "Session transcripts: {} files found", result.session_files);
    let _ = writeln!(out);
    let _ = writeln!(out, "Recommendations:");
    for rec in &result.recommendations {
        let _ = writeln!(out, "  - {}", rec);
    }
    out
}

pub fn run(ctx: &mut Context) -> anyhow::Result<()> {
    let files = ctx.load_files()?;
    if files.is_empty() {
        anyhow::bail!("no memory files found in {}", ctx.ws.root.display());
    }
    let ip_store = IpFamilyStore::load(&ctx.ws.ip_families_path())?;
    let workspace_paths = ctx.config.workspace_paths(&ctx.ws);
    let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();

    let mut texts: Vec<String> = files.iter().map(|f: &MemoryFile| f.text.clone()).collect();
    let total_before = corpus_tokens(&texts);
    let steps = vec![
        step(RULES, &mut texts, |texts| texts.iter().map(|t| rule_compress(t)).collect()),
        step(DICTIONARY, &mut texts, |texts| {
            let codebook = build_codebook(texts, &ctx.config.codebook);
            texts.iter().map(|t| compress_text(t, &codebook)).collect()
        }),
        step(RLE, &mut texts, |texts| {
            texts
                .iter()
                .zip(&names)
                .map(|(t, name)| {
                    let rle = RleContext {
                        workspace_paths: workspace_paths.clone(),
                        ip_min_occurrences: ctx.config.ip_min_occurrences,
                        ip_families: ip_store.get(name),
                    };
                    rle_compress(t, &rle).0
                })
                .collect()
        }),
        step(OPTIMIZER, &mut texts, |texts| {
            texts.iter().map(|t| optimize_tokens(t, true)).collect()
        }),
    ];
    let total_after = corpus_tokens(&texts);
    let total_saved = total_before.saturating_sub(total_after);
    let total_pct = percent(total_saved as i64, total_before);
    let session_files = count_sessions(ctx);

    let result = BenchmarkResult {
        date: ctx.now.format("%Y-%m-%d").to_string(),
        engine: engine_name(),
        files: files.len(),
        recommendations: recommendations(&steps, total_pct, session_files),
        steps,
        total_before,
        total_after,
        total_saved,
        total_pct,
        session_files,
    };
    let human = render(&result);
    ctx.finish("benchmark", total_before, total_after, &result, &human)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_never_adds_tokens() {
        let mut texts = vec!["short".to_string()];
        let result = step("grow", &mut texts, |t| t.iter().map(|s| s.repeat(10)).collect());
        assert_eq!(result.saved, 0);
        assert_eq!(result.after, result.before);
        assert_eq!(texts, vec!["short".to_string()]);
    }

    #[test]
    fn test_step_applies_savings() {
        let mut texts = vec!["a long line of text\n\n\n\n".to_string(), "x".repeat(40)];
        let result = step(RULES, &mut texts, |t| t.iter().map(|s| s[..4].to_string()).collect());
        assert!(result.saved > 0);
        assert_eq!(texts[1], "xxxx");
    }

    #[test]
    fn test_recommendations() {
        let steps = vec![
            StepResult {
                name: RULES,
                before: 100,
                after: 90,
                saved: 10,
                pct: 10.0,
            },
            StepResult {
                name: DICTIONARY,
                before: 90,
                after: 89,
                saved: 1,
                pct: 1.1,
            },
        ];
        let recs = recommendations(&steps, 11.0, 2);
        assert_eq!(
            recs,
            vec![
                "Run 'compress' to apply rule engine savings".to_string(),
                "Run 'observe' to compress 2 session transcript(s)".to_string(),
            ]
        );
        assert_eq!(
            recommendations(&steps, 1.0, 0),
            vec!["Workspace is already well-optimized".to_string()]
        );
    }
}
