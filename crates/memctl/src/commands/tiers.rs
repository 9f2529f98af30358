use serde::Serialize;

use super::{total_tokens, Context};
use memctl_report::{format_tier_template, generate_tiers, TierResult};

#[derive(Serialize)]
struct TiersResult {
    #[serde(flatten)]
    tiers: TierResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    template: Option<String>,
}

fn render_summary(result: &TierResult) -> String {
    let mut out = format!(
        "{} sections, {} tokens in the workspace\n",
        result.total_sections, result.total_tokens
    );
    for tier in &result.tiers {
        out.push_str(&format!(
            "Level {}: {} sections, {}/{} tokens\n",
            tier.level,
            tier.sections.len(),
            tier.tokens_used,
            tier.budget
        ));
    }
    out
}

pub fn run(ctx: &mut Context, level: Option<u8>) -> anyhow::Result<()> {
    let files = ctx.load_files()?;
    let total = total_tokens(&files);
    let result = generate_tiers(&files, &ctx.config.tiers);

    let template = level.map(|l| format_tier_template(&result, l));
    let human = match &template {
        Some(doc) => doc.clone(),
        None => render_summary(&result),
    };
    let result = TiersResult {
        tiers: result,
        template,
    };
    ctx.finish("tiers", total, total, &result, &human)
}
