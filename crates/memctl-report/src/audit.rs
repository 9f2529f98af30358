//! Advisory health check over the memory files

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write as _;

use memctl_core::{count_empty_sections, has_emoji, has_table, parse_sections, AuditConfig, MemoryFile};
use memctl_tokens::CORE_FILES;

/// Label used for findings about the workspace as a whole
const WORKSPACE_LABEL: &str = "(workspace)";

/// Suggestion kinds, in report order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SuggestionKind {
    OverBudget,
    Stale,
    Table,
    Emoji,
    EmptySections,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub kind: SuggestionKind,
    pub file: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileAudit {
    pub name: String,
    pub tokens: usize,
    pub budget: Option<usize>,
    pub age_days: Option<i64>,
    pub is_stale: bool,
    pub sections: usize,
    pub has_table: bool,
    pub has_emoji: bool,
    pub empty_sections: usize,
    pub suggestions: Vec<String>,
}

/// File counts by age since last modification
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AgeBuckets {
    #[serde(rename = "<7d")]
    pub under_week: usize,
    #[serde(rename = "7-30d")]
    pub under_month: usize,
    #[serde(rename = "30-90d")]
    pub under_quarter: usize,
    #[serde(rename = ">90d")]
    pub older: usize,
}

impl AgeBuckets {
    fn add(&mut self, age_days: i64) {
        match age_days {
            d if d < 7 => self.under_week += 1,
            d if d <= 30 => self.under_month += 1,
            d if d <= 90 => self.under_quarter += 1,
            _ => self.older += 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditReport {
    pub files: Vec<FileAudit>,
    pub total_tokens: usize,
    pub workspace_budget: usize,
    pub stale_days: i64,
    pub age_distribution: AgeBuckets,
    /// Core files that do not exist at the workspace root
    pub missing_core_files: Vec<String>,
    pub suggestions: Vec<Suggestion>,
}

fn file_suggestions(audit: &FileAudit, stale_days: i64) -> Vec<Suggestion> {
    let mut out = Vec::new();
    let mut add = |kind, message: String| {
        out.push(Suggestion {
            kind,
            file: audit.name.clone(),
            message,
        })
    };

    if let Some(budget) = audit.budget {
        if audit.tokens > budget {
            add(
                SuggestionKind::OverBudget,
                format!(
                    "{} is {} tokens over its {}-token budget; run compress or dedup",
                    audit.name,
                    audit.tokens - budget,
                    budget
                ),
            );
        }
    }
    if audit.is_stale {
        let age = audit.age_days.unwrap_or_default();
        add(
            SuggestionKind::Stale,
            format!(
                "{} has not changed in {} days (threshold {}); archive or summarise it",
                audit.name, age, stale_days
            ),
        );
    }
    if audit.has_table {
        add(
            SuggestionKind::Table,
            format!(
                "{} contains a markdown table; optimize rewrites tables as key: value lines",
                audit.name
            ),
        );
    }
    if audit.has_emoji {
        add(
            SuggestionKind::Emoji,
            format!("{} contains emoji; compress --clean strips them", audit.name),
        );
    }
    if audit.empty_sections > 0 {
        add(
            SuggestionKind::EmptySections,
            format!(
                "{} has {} empty section(s); compress --clean removes them",
                audit.name, audit.empty_sections
            ),
        );
    }
    out
}

/// Audit `files` as of `now`
pub fn audit_files(files: &[MemoryFile], config: &AuditConfig, now: DateTime<Utc>) -> AuditReport {
    let mut audits = Vec::with_capacity(files.len());
    let mut suggestions = Vec::new();
    let mut age_distribution = AgeBuckets::default();

    for file in files {
        let age_days = file.age_days(now);
        if let Some(age) = age_days {
            age_distribution.add(age);
        }
        let mut audit = FileAudit {
            name: file.name.clone(),
            tokens: file.tokens(),
            budget: config.file_budget(file.file_name()),
            age_days,
            is_stale: age_days.is_some_and(|age| age > config.stale_days),
            sections: parse_sections(&file.text)
                .iter()
                .filter(|s| !s.is_preamble())
                .count(),
            has_table: has_table(&file.text),
            has_emoji: has_emoji(&file.text),
            empty_sections: count_empty_sections(&file.text),
            suggestions: Vec::new(),
        };
        let found = file_suggestions(&audit, config.stale_days);
        audit.suggestions = found.iter().map(|s| s.message.clone()).collect();
        suggestions.extend(found);
        audits.push(audit);
    }

    let total_tokens: usize = audits.iter().map(|a| a.tokens).sum();
    if total_tokens > config.workspace_budget {
        suggestions.push(Suggestion {
            kind: SuggestionKind::OverBudget,
            file: WORKSPACE_LABEL.to_string(),
            message: format!(
                "workspace holds {} tokens, {} over the {}-token budget; run full",
                total_tokens,
                total_tokens - config.workspace_budget,
                config.workspace_budget
            ),
        });
    }
    suggestions.sort_by(|a, b| a.kind.cmp(&b.kind).then_with(|| a.file.cmp(&b.file)));

    let missing_core_files = CORE_FILES
        .iter()
        .filter(|core| !files.iter().any(|f| f.name == **core))
        .map(|core| core.to_string())
        .collect();

    AuditReport {
        files: audits,
        total_tokens,
        workspace_budget: config.workspace_budget,
        stale_days: config.stale_days,
        age_distribution,
        missing_core_files,
        suggestions,
    }
}

/// Human-readable rendering of an audit
pub fn format_report(report: &AuditReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Memory audit: {} files, {} tokens (budget {})",
        report.files.len(),
        report.total_tokens,
        report.workspace_budget
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "{:<32} {:>8} {:>8} {:>6}", "File", "Tokens", "Budget", "Age");
    for file in &report.files {
        let budget = file.budget.map_or_else(|| "-".to_string(), |b| b.to_string());
        let age = file.age_days.map_or_else(|| "?".to_string(), |d| format!("{}d", d));
        let stale = if file.is_stale { " (stale)" } else { "" };
        let _ = writeln!(
            out,
            "{:<32} {:>8} {:>8} {:>6}{}",
            file.name, file.tokens, budget, age, stale
        );
    }

    let ages = &report.age_distribution;
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Age: <7d {} | 7-30d {} | 30-90d {} | >90d {}",
        ages.under_week, ages.under_month, ages.under_quarter, ages.older
    );
    if !report.missing_core_files.is_empty() {
        let _ = writeln!(out, "Missing core files: {}", report.missing_core_files.join(", "));
    }

    let _ = writeln!(out);
    if report.suggestions.is_empty() {
        let _ = writeln!(out, "No suggestions. Memory looks healthy.");
    } else {
        let _ = writeln!(out, "Suggestions:");
        for suggestion in &report.suggestions {
            let _ = writeln!(out, "  - {}", suggestion.message);
        }
    }
    out
}
