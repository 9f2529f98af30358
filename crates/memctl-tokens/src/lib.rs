//! Token estimation, workspace paths and file I/O shared by every pass

mod io;
mod paths;
mod tokens;
mod types;

pub use io::{atomic_write, line_diff, parse_jsonl, temp_path, write_text, JsonlRecords};
pub use paths::{expand_home, Workspace, CORE_FILES};
pub use tokens::{engine_name, estimate_tokens, using_tiktoken};
pub use types::FileChange;
