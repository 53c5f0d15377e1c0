//! # flowgraph-checkpoint - State Persistence for Graph Runs
//!
//! Trait-based checkpoint abstractions and storage backends for persisting
//! and restoring graph run state. Checkpoints make runs resumable: a thread
//! can be suspended at a human-in-the-loop gate, survive a restart, and pick
//! up where it left off.
//!
//! ## Core concepts
//!
//! - [`Checkpoint`] - a full snapshot of one thread's state, plus either the
//!   next node to run or the pending interrupt the thread is suspended on
//! - [`CheckpointSaver`] - the persistence trait; `put()` fully replaces a
//!   thread's snapshot (last-write-wins), `get_tuple()` loads it back
//! - [`InMemoryCheckpointSaver`] - volatile reference backend for tests and
//!   development
//! - [`FileCheckpointSaver`] - one file per thread through a pluggable
//!   [`SerializerProtocol`] ([`JsonSerializer`] by default)
//!
//! ## Quick start
//!
//! ```rust
//! use flowgraph_checkpoint::{
//!     Checkpoint, CheckpointConfig, CheckpointMetadata, CheckpointSaver,
//!     InMemoryCheckpointSaver,
//! };
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let saver = InMemoryCheckpointSaver::new();
//!
//!     let config = CheckpointConfig::for_thread("thread-123");
//!     let checkpoint = Checkpoint::new(json!({"messages": []}), Some("planner".to_string()));
//!     let saved = saver.put(&config, checkpoint, CheckpointMetadata::new()).await?;
//!     assert!(saved.checkpoint_id.is_some());
//!
//!     let tuple = saver.get_tuple(&config).await?.expect("stored above");
//!     assert_eq!(tuple.checkpoint.next_node.as_deref(), Some("planner"));
//!     Ok(())
//! }
//! ```
//!
//! Production backends (PostgreSQL, Redis, object storage) implement
//! [`CheckpointSaver`] themselves; the engine only ever sees the trait.

pub mod checkpoint;
pub mod error;
pub mod file;
pub mod memory;
pub mod serializer;
pub mod traits;

pub use checkpoint::{
    Checkpoint, CheckpointConfig, CheckpointId, CheckpointMetadata, CheckpointSource,
    CheckpointTuple,
};
pub use error::{CheckpointError, Result};
pub use file::FileCheckpointSaver;
pub use memory::InMemoryCheckpointSaver;
pub use serializer::{JsonSerializer, SerializerProtocol};
pub use traits::CheckpointSaver;
