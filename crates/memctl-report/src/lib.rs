//! Budgeted summary tiers and the workspace audit

mod audit;
mod tiers;

pub use audit::{audit_files, format_report, AgeBuckets, AuditReport, FileAudit, Suggestion, SuggestionKind};
pub use tiers::{format_tier_template, generate_tiers, score_heading, ScoredSection, Tier, TierResult};
