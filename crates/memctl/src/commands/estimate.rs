use serde::Serialize;

use super::{total_tokens, Context};
use memctl_tokens::engine_name;

#[derive(Serialize)]
struct FileEstimate {
    file: String,
    tokens: usize,
    chars: usize,
}

#[derive(Serialize)]
struct EstimateResult {
    engine: &'static str,
    threshold: usize,
    files: Vec<FileEstimate>,
    total_tokens: usize,
}

pub fn run(ctx: &mut Context, threshold: usize) -> anyhow::Result<()> {
    let files = ctx.load_files()?;
    let total = total_tokens(&files);
    let listed: Vec<FileEstimate> = files
        .iter()
        .filter(|f| f.tokens() >= threshold)
        .map(|f| FileEstimate {
            file: f.name.clone(),
            tokens: f.tokens(),
            chars: f.text.chars().count(),
        })
        .collect();

    let mut human = format!("Token estimate ({} engine)\n", engine_name());
    for entry in &listed {
        human.push_str(&format!("{:>8}  {}\n", entry.tokens, entry.file));
    }
    if listed.len() < files.len() {
        human.push_str(&format!(
            "({} files under {} tokens not shown)\n",
            files.len() - listed.len(),
            threshold
        ));
    }
    human.push_str(&format!("{:>8}  total over {} files\n", total, files.len()));

    let result = EstimateResult {
        engine: engine_name(),
        threshold,
        files: listed,
        total_tokens: total,
    };
    ctx.finish("estimate", total, total, &result, &human)
}
