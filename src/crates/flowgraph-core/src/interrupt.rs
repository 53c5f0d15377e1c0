//! Interrupt/resume protocol for human-in-the-loop gates
//!
//! A node that needs a human decision suspends the run with an
//! [`InterruptEnvelope`] describing what is being asked and which
//! [`DecisionKind`]s it will accept. The engine persists the envelope in the
//! thread's checkpoint; the run resumes when the caller supplies a
//! [`Decision`], which re-enters the same node with the decision in its
//! context. Exactly one envelope can be outstanding per thread.
//!
//! # Example
//!
//! ```rust
//! use flowgraph_core::interrupt::{Decision, DecisionKind, InterruptEnvelope};
//! use serde_json::json;
//!
//! let envelope = InterruptEnvelope::new("approve_plan")
//!     .with_description("Review the research plan before execution")
//!     .with_permitted(vec![DecisionKind::Approve, DecisionKind::Reject, DecisionKind::Edit])
//!     .with_args(json!({"plan": ["Find sources", "Summarize"]}));
//!
//! assert!(envelope.permits(&DecisionKind::Approve));
//! assert!(!envelope.permits(&DecisionKind::Custom("defer".into())));
//!
//! let decision = Decision::edit(json!("Drop the second step"));
//! assert_eq!(decision.kind, DecisionKind::Edit);
//! ```

use crate::graph::NodeId;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Kind of decision a caller can take on a pending interrupt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionKind {
    /// Proceed as proposed
    Approve,
    /// Refuse; the suspended node decides what rejection means
    Reject,
    /// Proceed with caller-supplied changes (feedback carries them)
    Edit,
    /// Application-defined decision kind
    Custom(String),
}

impl DecisionKind {
    /// Canonical wire name of this kind
    pub fn as_str(&self) -> &str {
        match self {
            DecisionKind::Approve => "approve",
            DecisionKind::Reject => "reject",
            DecisionKind::Edit => "edit",
            DecisionKind::Custom(name) => name,
        }
    }
}

impl From<&str> for DecisionKind {
    fn from(name: &str) -> Self {
        match name {
            "approve" => DecisionKind::Approve,
            "reject" => DecisionKind::Reject,
            "edit" => DecisionKind::Edit,
            other => DecisionKind::Custom(other.to_string()),
        }
    }
}

impl std::fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for DecisionKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DecisionKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(DecisionKind::from(name.as_str()))
    }
}

/// A caller's decision resolving a pending interrupt
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Decision {
    /// The kind of decision taken
    pub kind: DecisionKind,

    /// Free-form payload accompanying the decision (edit text, reject reason)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Value>,
}

impl Decision {
    pub fn new(kind: DecisionKind) -> Self {
        Self {
            kind,
            feedback: None,
        }
    }

    /// Approve without feedback
    pub fn approve() -> Self {
        Self::new(DecisionKind::Approve)
    }

    /// Reject, optionally with a reason in feedback
    pub fn reject() -> Self {
        Self::new(DecisionKind::Reject)
    }

    /// Edit with the caller's changes as feedback
    pub fn edit(feedback: Value) -> Self {
        Self::new(DecisionKind::Edit).with_feedback(feedback)
    }

    /// Attach feedback to this decision
    pub fn with_feedback(mut self, feedback: Value) -> Self {
        self.feedback = Some(feedback);
        self
    }
}

/// Description of a suspension: what is asked, and what answers are valid
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InterruptEnvelope {
    /// Stable name identifying the gate (e.g. "approve_plan")
    pub name: String,

    /// Human-readable summary of what is being asked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Decision kinds the suspended node will accept
    pub permitted: Vec<DecisionKind>,

    /// Payload for the caller to review (the plan, the diff, the draft)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Value>,
}

impl InterruptEnvelope {
    /// Create an envelope permitting approve only
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            permitted: vec![DecisionKind::Approve],
            args: None,
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the permitted decision kinds
    pub fn with_permitted(mut self, permitted: Vec<DecisionKind>) -> Self {
        self.permitted = permitted;
        self
    }

    /// Set the review payload
    pub fn with_args(mut self, args: Value) -> Self {
        self.args = Some(args);
        self
    }

    /// Whether the envelope permits a decision kind
    pub fn permits(&self, kind: &DecisionKind) -> bool {
        self.permitted.contains(kind)
    }
}

/// A suspended node paired with its envelope, as persisted in a checkpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingInterrupt {
    /// The node that suspended; resume re-enters it
    pub node: NodeId,

    /// The envelope awaiting a decision
    pub envelope: InterruptEnvelope,
}

impl PendingInterrupt {
    pub fn new(node: impl Into<NodeId>, envelope: InterruptEnvelope) -> Self {
        Self {
            node: node.into(),
            envelope,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decision_kind_wire_names() {
        assert_eq!(DecisionKind::Approve.as_str(), "approve");
        assert_eq!(DecisionKind::Custom("defer".into()).as_str(), "defer");
        assert_eq!(DecisionKind::from("edit"), DecisionKind::Edit);
        assert_eq!(
            DecisionKind::from("escalate"),
            DecisionKind::Custom("escalate".into())
        );
    }

    #[test]
    fn test_decision_kind_serde() {
        let json = serde_json::to_string(&DecisionKind::Reject).unwrap();
        assert_eq!(json, "\"reject\"");

        let kind: DecisionKind = serde_json::from_str("\"approve\"").unwrap();
        assert_eq!(kind, DecisionKind::Approve);

        let kind: DecisionKind = serde_json::from_str("\"defer\"").unwrap();
        assert_eq!(kind, DecisionKind::Custom("defer".into()));
    }

    #[test]
    fn test_envelope_permits() {
        let envelope = InterruptEnvelope::new("approve_plan")
            .with_permitted(vec![DecisionKind::Approve, DecisionKind::Edit]);

        assert!(envelope.permits(&DecisionKind::Approve));
        assert!(envelope.permits(&DecisionKind::Edit));
        assert!(!envelope.permits(&DecisionKind::Reject));
    }

    #[test]
    fn test_pending_interrupt_roundtrip() {
        let pending = PendingInterrupt::new(
            "approval",
            InterruptEnvelope::new("approve_plan").with_args(json!({"plan": []})),
        );

        let value = serde_json::to_value(&pending).unwrap();
        let back: PendingInterrupt = serde_json::from_value(value).unwrap();
        assert_eq!(pending, back);
    }
}
