//! In-memory checkpoint storage for development and testing
//!
//! [`InMemoryCheckpointSaver`] keeps the latest snapshot per thread in a
//! thread-safe map. Writes replace the prior entry wholesale, matching the
//! last-write-wins contract of [`CheckpointSaver`]. Data does not survive a
//! restart; use a persistent backend such as
//! [`FileCheckpointSaver`](crate::file::FileCheckpointSaver) when runs must
//! outlive the process.
//!
//! # Example
//!
//! ```rust
//! use flowgraph_checkpoint::{
//!     Checkpoint, CheckpointConfig, CheckpointMetadata, CheckpointSaver, InMemoryCheckpointSaver,
//! };
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let saver = InMemoryCheckpointSaver::new();
//! let config = CheckpointConfig::for_thread("session-1");
//!
//! let checkpoint = Checkpoint::new(json!({"step": 1}), Some("planner".to_string()));
//! saver.put(&config, checkpoint, CheckpointMetadata::new()).await?;
//!
//! let tuple = saver.get_tuple(&config).await?.expect("just stored");
//! assert_eq!(tuple.checkpoint.values, json!({"step": 1}));
//! # Ok(())
//! # }
//! ```

use crate::{
    checkpoint::{Checkpoint, CheckpointConfig, CheckpointMetadata, CheckpointTuple},
    error::{CheckpointError, Result},
    traits::CheckpointSaver,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Storage entry holding one thread's latest snapshot
#[derive(Debug, Clone)]
struct CheckpointEntry {
    checkpoint: Checkpoint,
    metadata: CheckpointMetadata,
    config: CheckpointConfig,
}

type CheckpointStorage = Arc<RwLock<HashMap<String, CheckpointEntry>>>;

/// In-memory checkpoint saver
///
/// Keeps the latest checkpoint per thread. Clones share the same storage.
#[derive(Debug, Clone)]
pub struct InMemoryCheckpointSaver {
    storage: CheckpointStorage,
}

impl InMemoryCheckpointSaver {
    pub fn new() -> Self {
        Self {
            storage: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Get the number of threads being tracked
    pub async fn thread_count(&self) -> usize {
        self.storage.read().await.len()
    }

    /// Clear all checkpoints (useful for testing)
    pub async fn clear(&self) {
        self.storage.write().await.clear();
    }
}

impl Default for InMemoryCheckpointSaver {
    fn default() -> Self {
        Self::new()
    }
}

fn require_thread_id(config: &CheckpointConfig) -> Result<&String> {
    config
        .thread_id
        .as_ref()
        .ok_or_else(|| CheckpointError::Invalid("thread_id is required".to_string()))
}

#[async_trait]
impl CheckpointSaver for InMemoryCheckpointSaver {
    async fn put(
        &self,
        config: &CheckpointConfig,
        checkpoint: Checkpoint,
        metadata: CheckpointMetadata,
    ) -> Result<CheckpointConfig> {
        let thread_id = require_thread_id(config)?;

        let checkpoint_config = CheckpointConfig {
            thread_id: Some(thread_id.clone()),
            checkpoint_id: Some(checkpoint.id.clone()),
            extra: config.extra.clone(),
        };

        let entry = CheckpointEntry {
            checkpoint,
            metadata,
            config: checkpoint_config.clone(),
        };

        // Full replacement of the thread's snapshot
        self.storage.write().await.insert(thread_id.clone(), entry);

        Ok(checkpoint_config)
    }

    async fn get_tuple(&self, config: &CheckpointConfig) -> Result<Option<CheckpointTuple>> {
        let thread_id = require_thread_id(config)?;
        let storage = self.storage.read().await;

        Ok(storage.get(thread_id).map(|entry| CheckpointTuple {
            config: entry.config.clone(),
            checkpoint: entry.checkpoint.clone(),
            metadata: entry.metadata.clone(),
        }))
    }

    async fn delete(&self, config: &CheckpointConfig) -> Result<()> {
        let thread_id = require_thread_id(config)?;
        self.storage.write().await.remove(thread_id);
        Ok(())
    }
}
