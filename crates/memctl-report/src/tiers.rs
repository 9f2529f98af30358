//! Three nested, token-budgeted summaries of the workspace.
//!
//! Every non-empty section is scored by its heading and rendered as a
//! `## heading (file)` block. Level 0 takes the best blocks that fit its
//! budget; level 1 starts from level 0 and keeps filling; level 2 likewise.
//! Budgets are charged for the whole block, header line included.

use serde::Serialize;
use std::collections::BTreeSet;

use memctl_core::{parse_sections, MemoryFile, TierBudgets};
use memctl_tokens::estimate_tokens;

/// Heading keywords and the score they give, first match wins
const KEYWORDS: &[(&[&str], u8)] = &[
    (&["critical"], 10),
    (&["decision", "bug", "security", "incident"], 9),
    (&["action", "task", "todo"], 8),
    (&["config", "setup", "install"], 6),
    (&["notes"], 3),
    (&["history"], 2),
    (&["archive"], 1),
];

const DEFAULT_SCORE: u8 = 5;
const UNTITLED: &str = "Overview";

/// Importance of a section in `0..=10`, judged from its heading
pub fn score_heading(heading: &str) -> u8 {
    let heading = heading.to_lowercase();
    KEYWORDS
        .iter()
        .find(|(words, _)| words.iter().any(|w| heading.contains(w)))
        .map_or(DEFAULT_SCORE, |(_, score)| *score)
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredSection {
    pub file: String,
    pub heading: String,
    pub score: u8,
    /// Cost of the rendered block
    pub tokens: usize,
    #[serde(skip)]
    pub body: String,
}

impl ScoredSection {
    pub fn block(&self) -> String {
        format!("## {} ({})\n{}\n", self.heading, self.file, self.body)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Tier {
    pub level: u8,
    pub budget: usize,
    pub tokens_used: usize,
    /// Indices into [`TierResult::sections`], in file order
    pub sections: Vec<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TierResult {
    pub total_sections: usize,
    pub total_tokens: usize,
    /// Candidate sections in file order
    pub sections: Vec<ScoredSection>,
    pub tiers: Vec<Tier>,
}

impl TierResult {
    pub fn tier(&self, level: u8) -> Option<&Tier> {
        self.tiers.iter().find(|t| t.level == level)
    }
}

fn collect_sections(files: &[MemoryFile]) -> Vec<ScoredSection> {
    let mut sections = Vec::new();
    for file in files {
        for section in parse_sections(&file.text) {
            let body = section.body.trim();
            if body.is_empty() {
                continue;
            }
            let heading = if section.heading.trim().is_empty() {
                UNTITLED.to_string()
            } else {
                section.heading.trim().to_string()
            };
            let mut scored = ScoredSection {
                file: file.name.clone(),
                score: score_heading(&heading),
                heading,
                tokens: 0,
                body: body.to_string(),
            };
            scored.tokens = estimate_tokens(&scored.block());
            sections.push(scored);
        }
    }
    sections
}

/// Build the level 0, 1 and 2 summaries
pub fn generate_tiers(files: &[MemoryFile], budgets: &TierBudgets) -> TierResult {
    let sections = collect_sections(files);

    // Best score first; the sort is stable so file order breaks ties.
    let mut ranked: Vec<usize> = (0..sections.len()).collect();
    ranked.sort_by(|&a, &b| sections[b].score.cmp(&sections[a].score));

    let mut chosen: BTreeSet<usize> = BTreeSet::new();
    let mut used = 0;
    let mut floor = 0;
    let mut tiers = Vec::with_capacity(3);
    for (level, budget) in budgets.as_array().into_iter().enumerate() {
        // A tier never gets less room than the one it extends.
        let budget = budget.max(floor);
        floor = budget;
        for &idx in &ranked {
            if chosen.contains(&idx) {
                continue;
            }
            let cost = sections[idx].tokens;
            if used + cost <= budget {
                chosen.insert(idx);
                used += cost;
            }
        }
        tracing::debug!("tier {} uses {}/{} tokens", level, used, budget);
        tiers.push(Tier {
            level: level as u8,
            budget,
            tokens_used: used,
            sections: chosen.iter().copied().collect(),
        });
    }

    TierResult {
        total_sections: sections.len(),
        total_tokens: files.iter().map(MemoryFile::tokens).sum(),
        sections,
        tiers,
    }
}

/// Render one level as a markdown document
pub fn format_tier_template(result: &TierResult, level: u8) -> String {
    let Some(tier) = result.tier(level) else {
        return String::new();
    };
    let mut out = format!(
        "# Memory Summary (Level {})\n\n> Budget: {} tokens | Used: {} tokens | Sections: {} of {}\n\n",
        tier.level,
        tier.budget,
        tier.tokens_used,
        tier.sections.len(),
        result.total_sections
    );
    for &idx in &tier.sections {
        out.push_str(&result.sections[idx].block());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, text: &str) -> MemoryFile {
        MemoryFile {
            path: name.into(),
            name: name.to_string(),
            text: text.to_string(),
            modified: None,
        }
    }

    #[test]
    fn test_keyword_scores() {
        assert_eq!(score_heading("Critical Decisions"), 10);
        assert_eq!(score_heading("Bug log"), 9);
        assert_eq!(score_heading("Open Tasks"), 8);
        assert_eq!(score_heading("Setup"), 6);
        assert_eq!(score_heading("Random notes"), 3);
        assert_eq!(score_heading("History"), 2);
        assert_eq!(score_heading("Archive 2024"), 1);
        assert_eq!(score_heading("People"), 5);
    }

    #[test]
    fn test_empty_sections_are_not_candidates() {
        let files = [file("MEMORY.md", "# Empty\n\n# Tasks\n- ship it\n")];
        let result = generate_tiers(&files, &TierBudgets::default());
        assert_eq!(result.total_sections, 1);
        assert_eq!(result.sections[0].heading, "Tasks");
    }

    #[test]
    fn test_high_scores_fill_the_smallest_tier() {
        let filler = "word ".repeat(40);
        let text = format!("# Archive\n{filler}\n# Decisions\nuse sqlite\n# Notes\n{filler}\n");
        let files = [file("MEMORY.md", &text)];
        let decision_cost = {
            let result = generate_tiers(&files, &TierBudgets::default());
            result.sections[1].tokens
        };
        let budgets = TierBudgets {
            level0: decision_cost,
            level1: decision_cost + 5,
            level2: 10_000,
        };
        let result = generate_tiers(&files, &budgets);
        assert_eq!(result.tiers[0].sections, vec![1]);
        assert_eq!(result.tiers[1].sections, vec![1]);
        assert_eq!(result.tiers[2].sections, vec![0, 1, 2]);
        for tier in &result.tiers {
            assert!(tier.tokens_used <= tier.budget);
        }
    }

    #[test]
    fn test_oversized_section_skipped_not_fatal() {
        let big = "token ".repeat(400);
        let text = format!("# Critical\n{big}\n# Tasks\nsmall item\n");
        let result = generate_tiers(&[file("MEMORY.md", &text)], &TierBudgets::default());
        // The critical block is too big for level 0, the task still fits.
        assert_eq!(result.tiers[0].sections, vec![1]);
        assert_eq!(result.tiers[1].sections, vec![0, 1]);
    }

    #[test]
    fn test_template_header_and_blocks() {
        let files = [file("memory/2026-01-01.md", "intro line\n## Setup\nrun make\n")];
        let result = generate_tiers(&files, &TierBudgets::default());
        let doc = format_tier_template(&result, 0);
        assert!(doc.starts_with("# Memory Summary (Level 0)\n"));
        assert!(doc.contains("Sections: 2 of 2"));
        assert!(doc.contains("## Overview (memory/2026-01-01.md)\nintro line\n"));
        assert!(doc.contains("## Setup (memory/2026-01-01.md)\nrun make\n"));
        assert_eq!(format_tier_template(&result, 7), "");
    }
}
