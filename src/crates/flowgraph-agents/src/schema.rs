//! State layout shared by the research agent graphs

use flowgraph_core::{MergeReducer, MessagesReducer, StateSchema};

/// Conversation history, merged with replace-by-ID append semantics
pub const MESSAGES: &str = "messages";

/// Clarified research objective; unset while the request is still vague
pub const OBJECTIVE: &str = "objective";

/// Ordered list of research task strings
pub const PLAN: &str = "plan";

/// The streamed final report text
pub const FINAL_REPORT: &str = "final_report";

/// Per-task findings from the research fan-out, keyed by task
pub const RAW_RESULTS: &str = "raw_results";

/// Per-task failures from the research fan-out, keyed by task
pub const TASK_ERRORS: &str = "task_errors";

/// Schema for the top-level research agent state
///
/// `messages` accumulates, `raw_results` and `task_errors` merge per key so
/// concurrent batches never clobber each other, and everything else is
/// last-writer-wins.
pub fn research_schema() -> StateSchema {
    StateSchema::new()
        .with_field(MESSAGES, Box::new(MessagesReducer))
        .with_field(RAW_RESULTS, Box::new(MergeReducer))
        .with_field(TASK_ERRORS, Box::new(MergeReducer))
}

/// Schema for a single researcher sub-graph run
///
/// Only the transcript needs merge semantics; the task string and the loop
/// counter are plain replace fields.
pub fn researcher_schema() -> StateSchema {
    StateSchema::new().with_field(MESSAGES, Box::new(MessagesReducer))
}
