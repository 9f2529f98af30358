//! Session transcripts to observations.
//!
//! A transcript is a JSONL file of session and message lines. Tool calls are
//! paired with their results, each pair becomes one rule-based observation,
//! and a sidecar tracker remembers which transcripts were already folded in.

mod extractor;
mod observe;
mod session;
mod tracker;

pub use extractor::{classify, extract_observation, format_observations, Observation, ObservationKind};
pub use observe::{observe_sessions, parse_since, ObserveOptions, ObserveReport, SessionSummary};
pub use session::{
    extract_interactions, session_timestamp, truncate_chars, Content, Message, Part, Role, SessionLine,
    ToolInteraction,
};
pub use tracker::SessionTracker;
