//! Markdown toolkit, rule engine, configuration and error types

mod config;
mod error;
mod fence;
mod markdown;
mod rules;
mod types;
mod warnings;

pub use config::{AuditConfig, CodebookConfig, Config, ObserveLimits, TierBudgets};
pub use error::{CompactError, Result};
pub use fence::{code_ranges, map_text_spans, split_fenced, Span, SpanKind};
pub use markdown::{
    collapse_blank_lines, compress_markdown_table, count_empty_sections, has_emoji, has_table,
    header_of, is_emoji, markdown_cleanup, merge_short_bullets, merge_similar_bullets,
    parse_sections, remove_empty_sections, rewrite_tables, similarity, strip_emoji,
    strip_markdown_redundancy, trim_trailing_whitespace, Section, Table,
};
pub use rules::rule_compress;
pub use types::{load_memory_files, open_workspace, workspace_tokens, MemoryFile};
pub use warnings::Warnings;
