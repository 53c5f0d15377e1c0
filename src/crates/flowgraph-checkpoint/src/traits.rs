//! Checkpoint persistence trait
//!
//! [`CheckpointSaver`] is the seam between the execution engine and storage.
//! The engine calls `put()` after every node completion and suspension and
//! `get_tuple()` when a thread is resumed or re-entered; implementations
//! decide where the bytes live.
//!
//! # Contract
//!
//! - `put()` for a thread ID **fully replaces** the thread's snapshot.
//!   Last write wins; backends must not merge old and new state.
//! - `get_tuple()` with only a `thread_id` returns the latest snapshot,
//!   `None` (not an error) when the thread has never been checkpointed.
//! - The engine never deletes checkpoints; `delete()` exists for callers
//!   managing retention themselves.
//!
//! # Implementing a backend
//!
//! ```rust,ignore
//! use flowgraph_checkpoint::{
//!     CheckpointSaver, Checkpoint, CheckpointConfig, CheckpointMetadata, CheckpointTuple,
//! };
//! use async_trait::async_trait;
//!
//! struct RedisCheckpointSaver { /* connection */ }
//!
//! #[async_trait]
//! impl CheckpointSaver for RedisCheckpointSaver {
//!     async fn put(
//!         &self,
//!         config: &CheckpointConfig,
//!         checkpoint: Checkpoint,
//!         metadata: CheckpointMetadata,
//!     ) -> flowgraph_checkpoint::Result<CheckpointConfig> {
//!         // SET thread:{thread_id} <serialized tuple>
//!         todo!()
//!     }
//!
//!     async fn get_tuple(
//!         &self,
//!         config: &CheckpointConfig,
//!     ) -> flowgraph_checkpoint::Result<Option<CheckpointTuple>> {
//!         // GET thread:{thread_id}
//!         todo!()
//!     }
//!
//!     async fn delete(&self, config: &CheckpointConfig) -> flowgraph_checkpoint::Result<()> {
//!         // DEL thread:{thread_id}
//!         todo!()
//!     }
//! }
//! ```

use crate::{
    checkpoint::{Checkpoint, CheckpointConfig, CheckpointMetadata, CheckpointTuple},
    error::Result,
};
use async_trait::async_trait;

/// Interface for checkpoint persistence backends
#[async_trait]
pub trait CheckpointSaver: Send + Sync {
    /// Save a checkpoint, replacing any prior snapshot for the thread.
    ///
    /// Returns the config of the stored checkpoint with its `checkpoint_id`
    /// filled in.
    async fn put(
        &self,
        config: &CheckpointConfig,
        checkpoint: Checkpoint,
        metadata: CheckpointMetadata,
    ) -> Result<CheckpointConfig>;

    /// Retrieve the checkpoint tuple addressed by the config.
    ///
    /// With only a `thread_id`, returns the latest snapshot for that thread.
    /// Returns `Ok(None)` when no checkpoint exists.
    async fn get_tuple(&self, config: &CheckpointConfig) -> Result<Option<CheckpointTuple>>;

    /// Fetch just the checkpoint, without config and metadata
    async fn get(&self, config: &CheckpointConfig) -> Result<Option<Checkpoint>> {
        Ok(self.get_tuple(config).await?.map(|tuple| tuple.checkpoint))
    }

    /// Delete the thread's checkpoint, if any
    async fn delete(&self, config: &CheckpointConfig) -> Result<()>;
}
