use super::{total_tokens, Context};
use memctl_report::{audit_files, format_report};

pub fn run(ctx: &mut Context, stale_days: Option<i64>) -> anyhow::Result<()> {
    let files = ctx.load_files()?;
    let total = total_tokens(&files);
    let mut config = ctx.config.audit.clone();
    if let Some(days) = stale_days {
        config.stale_days = days;
    }
    let report = audit_files(&files, &config, ctx.now);
    let human = format_report(&report);
    ctx.finish("audit", total, total, &report, &human)
}
