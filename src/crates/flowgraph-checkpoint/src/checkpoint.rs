//! Core checkpoint data structures
//!
//! A [`Checkpoint`] is a complete snapshot of one thread's run: the merged
//! state document, plus either the next node to execute or a serialized
//! pending interrupt waiting on a caller decision. Checkpoints are keyed by
//! thread ID through [`CheckpointConfig`] and carry [`CheckpointMetadata`]
//! describing how they were produced.
//!
//! The engine writes one checkpoint per node completion and one per
//! suspension. Storage backends treat a write as a full replacement of the
//! thread's snapshot; there is no partial merge at this layer.
//!
//! # Example
//!
//! ```rust
//! use flowgraph_checkpoint::{Checkpoint, CheckpointConfig, CheckpointMetadata, CheckpointSource};
//! use serde_json::json;
//!
//! let checkpoint = Checkpoint::new(json!({"messages": []}), Some("planner".to_string()));
//! let config = CheckpointConfig::for_thread("session-1");
//! let metadata = CheckpointMetadata::new()
//!     .with_source(CheckpointSource::Loop)
//!     .with_step(3);
//! assert_eq!(checkpoint.v, Checkpoint::CURRENT_VERSION);
//! assert_eq!(config.thread_id.as_deref(), Some("session-1"));
//! # let _ = metadata;
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Checkpoint ID type
pub type CheckpointId = String;

/// How a checkpoint came to exist
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointSource {
    /// Written when a run starts from caller input
    Input,
    /// Written after a node completes inside the execution loop
    Loop,
    /// Written from a manual state update outside the loop
    Update,
}

/// Metadata associated with a checkpoint
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CheckpointMetadata {
    /// The source of the checkpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<CheckpointSource>,

    /// Step number within the run.
    /// -1 for the initial "input" checkpoint, 0 for the first node, n after.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<i64>,

    /// Additional custom metadata
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl CheckpointMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the source
    pub fn with_source(mut self, source: CheckpointSource) -> Self {
        self.source = Some(source);
        self
    }

    /// Set the step number
    pub fn with_step(mut self, step: i64) -> Self {
        self.step = Some(step);
        self
    }

    /// Add custom metadata
    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// State snapshot for one thread at a point in a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Checkpoint format version (currently 1)
    pub v: i32,

    /// Unique checkpoint ID
    pub id: CheckpointId,

    /// The timestamp of the checkpoint
    pub ts: DateTime<Utc>,

    /// The merged state document at the time of the checkpoint
    pub values: serde_json::Value,

    /// The node the run will execute next, if the run is still in flight.
    /// `None` when the run reached the end marker or is suspended.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_node: Option<String>,

    /// Serialized pending interrupt, present only while the thread is
    /// suspended awaiting a caller decision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_interrupt: Option<serde_json::Value>,
}

impl Checkpoint {
    /// Current checkpoint format version
    pub const CURRENT_VERSION: i32 = 1;

    /// Create a checkpoint for an in-flight run
    pub fn new(values: serde_json::Value, next_node: Option<String>) -> Self {
        Self {
            v: Self::CURRENT_VERSION,
            id: Uuid::new_v4().to_string(),
            ts: Utc::now(),
            values,
            next_node,
            pending_interrupt: None,
        }
    }

    /// Create a checkpoint for a suspended run awaiting a decision
    pub fn suspended(values: serde_json::Value, pending_interrupt: serde_json::Value) -> Self {
        Self {
            v: Self::CURRENT_VERSION,
            id: Uuid::new_v4().to_string(),
            ts: Utc::now(),
            values,
            next_node: None,
            pending_interrupt: Some(pending_interrupt),
        }
    }

    /// Create an empty checkpoint
    pub fn empty() -> Self {
        Self::new(serde_json::Value::Object(serde_json::Map::new()), None)
    }

    /// Whether this checkpoint represents a suspended run
    pub fn is_suspended(&self) -> bool {
        self.pending_interrupt.is_some()
    }
}

/// Configuration for checkpoint operations
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CheckpointConfig {
    /// Thread ID grouping related checkpoints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,

    /// Specific checkpoint ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint_id: Option<CheckpointId>,

    /// Additional configuration
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl CheckpointConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Config addressing the latest checkpoint of a thread
    pub fn for_thread(thread_id: impl Into<String>) -> Self {
        Self::new().with_thread_id(thread_id.into())
    }

    /// Set the thread ID
    pub fn with_thread_id(mut self, thread_id: String) -> Self {
        self.thread_id = Some(thread_id);
        self
    }

    /// Set the checkpoint ID
    pub fn with_checkpoint_id(mut self, checkpoint_id: CheckpointId) -> Self {
        self.checkpoint_id = Some(checkpoint_id);
        self
    }
}

/// A checkpoint together with its config and metadata
#[derive(Debug, Clone)]
pub struct CheckpointTuple {
    /// Configuration of the stored checkpoint
    pub config: CheckpointConfig,

    /// The checkpoint itself
    pub checkpoint: Checkpoint,

    /// Metadata associated with the checkpoint
    pub metadata: CheckpointMetadata,
}

impl CheckpointTuple {
    pub fn new(
        config: CheckpointConfig,
        checkpoint: Checkpoint,
        metadata: CheckpointMetadata,
    ) -> Self {
        Self {
            config,
            checkpoint,
            metadata,
        }
    }
}
