//! Commands for combined state update and explicit routing
//!
//! A node that needs to pick its own successor returns a [`Command`]:
//! an optional state patch plus an optional `goto` target. The target must
//! be one of the node's declared ends; routing anywhere else is a
//! [`RoutingViolation`](crate::error::GraphError::RoutingViolation).

use crate::graph::NodeId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// State update paired with an explicit routing decision
///
/// # Examples
///
/// ```rust
/// use flowgraph_core::command::Command;
/// use flowgraph_core::graph::END;
/// use serde_json::json;
///
/// // Patch state and pick the next node
/// let cmd = Command::new()
///     .with_update(json!({"objective": "research Rust"}))
///     .with_goto("planner");
///
/// // Routing to END terminates the run
/// let done = Command::goto(END);
/// assert!(done.update.is_none());
/// # let _ = cmd;
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Command {
    /// State patch to apply before routing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<Value>,

    /// Explicit successor; must appear in the node's declared ends
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goto: Option<NodeId>,
}

impl Command {
    /// Create a new empty command
    pub fn new() -> Self {
        Self::default()
    }

    /// Command that only routes, with no state update
    pub fn goto(target: impl Into<NodeId>) -> Self {
        Self::new().with_goto(target)
    }

    /// Set the state update
    pub fn with_update(mut self, update: Value) -> Self {
        self.update = Some(update);
        self
    }

    /// Set the goto target
    pub fn with_goto(mut self, goto: impl Into<NodeId>) -> Self {
        self.goto = Some(goto.into());
        self
    }

    /// Check if command carries neither update nor route
    pub fn is_empty(&self) -> bool {
        self.update.is_none() && self.goto.is_none()
    }
}
