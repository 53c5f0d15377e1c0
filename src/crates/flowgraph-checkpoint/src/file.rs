//! File-backed checkpoint storage
//!
//! [`FileCheckpointSaver`] persists one file per thread under a base
//! directory, encoded through a [`SerializerProtocol`]. It carries the same
//! last-write-wins contract as the in-memory saver: each `put` rewrites the
//! thread's file in full. Suitable for single-process deployments that need
//! runs to survive a restart.
//!
//! ```rust,ignore
//! use flowgraph_checkpoint::{FileCheckpointSaver, JsonSerializer};
//!
//! let saver = FileCheckpointSaver::new("/var/lib/myapp/checkpoints", JsonSerializer::new());
//! ```

use crate::{
    checkpoint::{Checkpoint, CheckpointConfig, CheckpointMetadata, CheckpointTuple},
    error::{CheckpointError, Result},
    serializer::{JsonSerializer, SerializerProtocol},
    traits::CheckpointSaver,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// On-disk representation of one thread's snapshot
#[derive(Debug, Serialize, Deserialize)]
struct StoredTuple {
    config: CheckpointConfig,
    checkpoint: Checkpoint,
    metadata: CheckpointMetadata,
}

/// Checkpoint saver writing one file per thread
#[derive(Debug, Clone)]
pub struct FileCheckpointSaver<S = JsonSerializer> {
    base_dir: PathBuf,
    serializer: S,
}

impl FileCheckpointSaver<JsonSerializer> {
    /// Create a saver using the default JSON serializer
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self::with_serializer(base_dir, JsonSerializer::new())
    }
}

impl<S: SerializerProtocol> FileCheckpointSaver<S> {
    /// Create a saver with a custom serializer
    pub fn with_serializer(base_dir: impl Into<PathBuf>, serializer: S) -> Self {
        Self {
            base_dir: base_dir.into(),
            serializer,
        }
    }

    /// The directory checkpoints are written under
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn thread_path(&self, thread_id: &str) -> PathBuf {
        // Thread IDs may contain path separators; flatten to a safe name.
        let safe: String = thread_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.base_dir.join(format!("{safe}.ckpt"))
    }

    fn require_thread_id<'a>(config: &'a CheckpointConfig) -> Result<&'a String> {
        config
            .thread_id
            .as_ref()
            .ok_or_else(|| CheckpointError::Invalid("thread_id is required".to_string()))
    }
}

#[async_trait]
impl<S: SerializerProtocol> CheckpointSaver for FileCheckpointSaver<S> {
    async fn put(
        &self,
        config: &CheckpointConfig,
        checkpoint: Checkpoint,
        metadata: CheckpointMetadata,
    ) -> Result<CheckpointConfig> {
        let thread_id = Self::require_thread_id(config)?;

        let checkpoint_config = CheckpointConfig {
            thread_id: Some(thread_id.clone()),
            checkpoint_id: Some(checkpoint.id.clone()),
            extra: config.extra.clone(),
        };

        let stored = StoredTuple {
            config: checkpoint_config.clone(),
            checkpoint,
            metadata,
        };
        let bytes = self.serializer.dumps(&stored)?;

        tokio::fs::create_dir_all(&self.base_dir).await?;

        let path = self.thread_path(thread_id);
        let tmp = path.with_extension("ckpt.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;

        tracing::debug!(thread_id = %thread_id, path = %path.display(), "checkpoint written");
        Ok(checkpoint_config)
    }

    async fn get_tuple(&self, config: &CheckpointConfig) -> Result<Option<CheckpointTuple>> {
        let thread_id = Self::require_thread_id(config)?;
        let path = self.thread_path(thread_id);

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let stored: StoredTuple = self.serializer.loads(&bytes)?;
        Ok(Some(CheckpointTuple {
            config: stored.config,
            checkpoint: stored.checkpoint,
            metadata: stored.metadata,
        }))
    }

    async fn delete(&self, config: &CheckpointConfig) -> Result<()> {
        let thread_id = Self::require_thread_id(config)?;
        let path = self.thread_path(thread_id);

        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("flowgraph-ckpt-{}", Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_roundtrip_json() {
        let dir = scratch_dir();
        let saver = FileCheckpointSaver::new(&dir);
        let config = CheckpointConfig::for_thread("thread-1");

        let checkpoint = Checkpoint::new(json!({"messages": ["hi"]}), Some("planner".to_string()));
        saver
            .put(&config, checkpoint.clone(), CheckpointMetadata::new().with_step(0))
            .await
            .unwrap();

        let loaded = saver.get_tuple(&config).await.unwrap().unwrap();
        assert_eq!(loaded.checkpoint.id, checkpoint.id);
        assert_eq!(loaded.checkpoint.values, json!({"messages": ["hi"]}));
        assert_eq!(loaded.metadata.step, Some(0));

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_roundtrip_suspended() {
        let dir = scratch_dir();
        let saver = FileCheckpointSaver::new(&dir);
        let config = CheckpointConfig::for_thread("thread-1");

        let checkpoint = Checkpoint::suspended(json!({"plan": ["step"]}), json!({"name": "approve"}));
        saver
            .put(&config, checkpoint.clone(), CheckpointMetadata::new())
            .await
            .unwrap();

        let loaded = saver.get_tuple(&config).await.unwrap().unwrap();
        assert!(loaded.checkpoint.is_suspended());
        assert_eq!(loaded.checkpoint.id, checkpoint.id);

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_thread_returns_none() {
        let dir = scratch_dir();
        let saver = FileCheckpointSaver::new(&dir);
        let loaded = saver
            .get_tuple(&CheckpointConfig::for_thread("nobody"))
            .await
            .unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_put_replaces_file() {
        let dir = scratch_dir();
        let saver = FileCheckpointSaver::new(&dir);
        let config = CheckpointConfig::for_thread("thread-1");

        saver
            .put(&config, Checkpoint::new(json!({"v": 1}), None), CheckpointMetadata::new())
            .await
            .unwrap();
        saver
            .put(&config, Checkpoint::new(json!({"v": 2}), None), CheckpointMetadata::new())
            .await
            .unwrap();

        let loaded = saver.get_tuple(&config).await.unwrap().unwrap();
        assert_eq!(loaded.checkpoint.values, json!({"v": 2}));

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_missing_is_ok() {
        let dir = scratch_dir();
        let saver = FileCheckpointSaver::new(&dir);
        saver
            .delete(&CheckpointConfig::for_thread("nobody"))
            .await
            .unwrap();
    }
}
