//! Node outcomes
//!
//! Every node invocation resolves to exactly one [`NodeOutcome`]: a state
//! patch that follows the graph's edges, a [`Command`] that patches and
//! routes explicitly, or a suspension carrying an [`InterruptEnvelope`].
//! Making suspension a first-class variant keeps the control flow in the
//! type system instead of threading it through error values.

use crate::command::Command;
use crate::interrupt::InterruptEnvelope;
use serde_json::Value;

/// What a node produced when it finished
///
/// # Examples
///
/// ```rust
/// use flowgraph_core::{Command, InterruptEnvelope, NodeOutcome};
/// use serde_json::json;
///
/// // Patch state, let the graph's edges pick the successor
/// let outcome = NodeOutcome::Update(json!({"plan": ["step 1"]}));
///
/// // Patch state and route explicitly
/// let outcome = NodeOutcome::Command(
///     Command::new().with_update(json!({"objective": "x"})).with_goto("planner"),
/// );
///
/// // Suspend for a human decision
/// let outcome = NodeOutcome::Suspend(InterruptEnvelope::new("approve_plan"));
/// # let _ = outcome;
/// ```
#[derive(Debug, Clone)]
pub enum NodeOutcome {
    /// State patch; the successor comes from the node's outgoing edge
    Update(Value),

    /// State patch plus an explicit routing decision
    Command(Command),

    /// Suspend the run and wait for a caller decision
    Suspend(InterruptEnvelope),
}

impl NodeOutcome {
    /// State patch carried by this outcome, if any
    pub fn update(&self) -> Option<&Value> {
        match self {
            NodeOutcome::Update(value) => Some(value),
            NodeOutcome::Command(cmd) => cmd.update.as_ref(),
            NodeOutcome::Suspend(_) => None,
        }
    }

    /// Whether this outcome suspends the run
    pub fn is_suspend(&self) -> bool {
        matches!(self, NodeOutcome::Suspend(_))
    }
}

impl From<Value> for NodeOutcome {
    fn from(value: Value) -> Self {
        NodeOutcome::Update(value)
    }
}

impl From<Command> for NodeOutcome {
    fn from(cmd: Command) -> Self {
        NodeOutcome::Command(cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_outcome_update_accessor() {
        let outcome = NodeOutcome::Update(json!({"a": 1}));
        assert_eq!(outcome.update(), Some(&json!({"a": 1})));

        let outcome = NodeOutcome::Command(Command::goto("next"));
        assert_eq!(outcome.update(), None);

        let outcome = NodeOutcome::Suspend(InterruptEnvelope::new("gate"));
        assert!(outcome.is_suspend());
        assert_eq!(outcome.update(), None);
    }
}
