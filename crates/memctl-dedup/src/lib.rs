//! Near-duplicate detection with shingles and Jaccard similarity

mod collector;
mod shingle;

pub use collector::{collect_entries, remove_lines, DedupPlan, DedupReport, Entry, GroupMember, GroupReport};
pub use shingle::{
    dropped_indices, find_duplicates, jaccard, keeper, merge_duplicates, shingles, DuplicateGroup,
    DEFAULT_SHINGLE_SIZE,
};
