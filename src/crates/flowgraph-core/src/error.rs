//! Error types for graph construction and execution
//!
//! [`GraphError`] covers the full lifecycle: definition-time validation,
//! runtime routing, checkpoint persistence, the interrupt protocol, and
//! failures from external model or tool calls. Errors abort the run they
//! occur in; they are surfaced to the caller, never swallowed.

use crate::state::StateError;
use thiserror::Error;

/// Convenience result type using [`GraphError`]
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors that can occur during graph operations
///
/// # Examples
///
/// ```rust
/// use flowgraph_core::error::GraphError;
///
/// let err = GraphError::node_execution("planner", "model returned no plan");
/// assert_eq!(
///     format!("{}", err),
///     "Node 'planner' execution failed: model returned no plan"
/// );
/// ```
#[derive(Error, Debug)]
pub enum GraphError {
    /// Graph structure is invalid, caught at compile time
    ///
    /// Common causes: a referenced node does not exist, a node has no way
    /// forward, the entry point is missing.
    #[error("Graph definition invalid: {0}")]
    Definition(String),

    /// A node routed to a target it never declared
    ///
    /// Raised when an explicit `goto` names a node outside the source node's
    /// declared ends, or a router returns a name outside its allowed list.
    /// This is a fatal defect in the graph wiring, not a recoverable
    /// condition.
    #[error("Node '{node}' attempted to route to undeclared target '{target}'")]
    RoutingViolation {
        /// Node that produced the route
        node: String,
        /// The undeclared target
        target: String,
    },

    /// A resume was issued for a thread with no outstanding interrupt
    #[error("No pending interrupt for thread '{0}'")]
    NoPendingInterrupt(String),

    /// A decision kind the pending interrupt does not permit
    ///
    /// The run is left untouched; the caller may retry with a permitted kind.
    #[error("Decision '{kind}' is not permitted here (permitted: {permitted:?})")]
    UnsupportedDecision {
        /// The rejected decision kind
        kind: String,
        /// Kinds the envelope permits
        permitted: Vec<String>,
    },

    /// A reducer could not merge a node's update into the state
    #[error("State merge conflict on field '{field}': {message}")]
    MergeConflict {
        /// State field whose reducer failed
        field: String,
        /// Reducer failure detail
        message: String,
    },

    /// State operation failed outside of a field merge
    #[error("State error: {0}")]
    State(StateError),

    /// Node execution failed with context
    #[error("Node '{node}' execution failed: {error}")]
    NodeExecution {
        /// Name of the node that failed
        node: String,
        /// Error message from node execution
        error: String,
    },

    /// A model or tool call failed
    ///
    /// Surfaced to the invoking node, which owns the retry/surface/abort
    /// policy. Propagating it aborts the run.
    #[error("External call failed: {0}")]
    ExternalCall(String),

    /// Generic execution error without specific node context
    #[error("Execution failed: {0}")]
    Execution(String),

    /// Checkpoint persistence error
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] flowgraph_checkpoint::CheckpointError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl GraphError {
    /// Create a node execution error with context
    pub fn node_execution(node: impl Into<String>, error: impl std::fmt::Display) -> Self {
        GraphError::NodeExecution {
            node: node.into(),
            error: error.to_string(),
        }
    }

    /// Create a routing violation error
    pub fn routing_violation(node: impl Into<String>, target: impl Into<String>) -> Self {
        GraphError::RoutingViolation {
            node: node.into(),
            target: target.into(),
        }
    }

    /// Create an external call error
    pub fn external_call(error: impl std::fmt::Display) -> Self {
        GraphError::ExternalCall(error.to_string())
    }

    /// Create a generic execution error
    pub fn execution(error: impl std::fmt::Display) -> Self {
        GraphError::Execution(error.to_string())
    }
}

impl From<StateError> for GraphError {
    fn from(error: StateError) -> Self {
        match error {
            StateError::FieldConflict { field, message } => {
                GraphError::MergeConflict { field, message }
            }
            other => GraphError::State(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GraphError::routing_violation("clarify", "executor");
        assert_eq!(
            format!("{}", err),
            "Node 'clarify' attempted to route to undeclared target 'executor'"
        );

        let err = GraphError::NoPendingInterrupt("thread-1".to_string());
        assert_eq!(format!("{}", err), "No pending interrupt for thread 'thread-1'");
    }

    #[test]
    fn test_field_conflict_maps_to_merge_conflict() {
        let state_err = StateError::FieldConflict {
            field: "messages".to_string(),
            message: "append requires array values".to_string(),
        };
        let err: GraphError = state_err.into();
        assert!(matches!(err, GraphError::MergeConflict { ref field, .. } if field == "messages"));
    }
}
