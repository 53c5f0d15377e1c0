//! Streaming events
//!
//! Runs started through the streaming APIs emit a flat sequence of
//! [`StreamEvent`]s over a bounded channel. The enum is closed: every event
//! a consumer can receive is one of these four variants, tagged on the wire
//! as `{"event": ..., "data": ...}`. Consumers match exhaustively instead of
//! probing untyped payloads.
//!
//! [`EventEmitter`] is the producer half handed to nodes through their
//! context; it degrades to a no-op when the run was started without
//! streaming, so node code never branches on the run mode.

use crate::interrupt::InterruptEnvelope;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::pin::Pin;
use tokio::sync::mpsc;

/// Events emitted during a streaming run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A token fragment produced by a node, in generation order
    MessageChunk {
        /// Node that produced the fragment
        node: String,
        /// The fragment text
        delta: String,
    },

    /// The run suspended on a human-in-the-loop gate
    Interrupt {
        /// The envelope awaiting a decision
        envelope: InterruptEnvelope,
    },

    /// The run aborted; this is the stream's final event
    Error {
        /// Rendered error message
        message: String,
    },

    /// The run completed; carries the final state
    Done {
        /// Final merged state
        state: Value,
    },
}

/// Stream of [`StreamEvent`]s for one run
pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// Producer handle nodes use to emit events mid-run
///
/// Cheap to clone. A disabled emitter (non-streaming run) drops every event.
/// A send to a consumer that has gone away is ignored; the run continues.
#[derive(Clone)]
pub struct EventEmitter {
    tx: Option<mpsc::Sender<StreamEvent>>,
}

impl EventEmitter {
    /// Emitter feeding a stream consumer
    pub fn new(tx: mpsc::Sender<StreamEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Emitter that discards every event
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Whether events reach a consumer
    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    /// Emit an event, waiting for channel capacity when the consumer lags
    pub async fn emit(&self, event: StreamEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event).await;
        }
    }

    /// Emit a token fragment from a node
    pub async fn emit_chunk(&self, node: impl Into<String>, delta: impl Into<String>) {
        self.emit(StreamEvent::MessageChunk {
            node: node.into(),
            delta: delta.into(),
        })
        .await;
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_wire_format() {
        let event = StreamEvent::MessageChunk {
            node: "summarize".to_string(),
            delta: "Hel".to_string(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({"event": "message_chunk", "data": {"node": "summarize", "delta": "Hel"}})
        );

        let event = StreamEvent::Done { state: json!({}) };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "done");
    }

    #[tokio::test]
    async fn test_emitter_sends() {
        let (tx, mut rx) = mpsc::channel(4);
        let emitter = EventEmitter::new(tx);
        assert!(emitter.is_enabled());

        emitter.emit_chunk("node", "hi").await;
        let event = rx.recv().await.unwrap();
        assert_eq!(
            event,
            StreamEvent::MessageChunk {
                node: "node".to_string(),
                delta: "hi".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_disabled_emitter_is_noop() {
        let emitter = EventEmitter::disabled();
        assert!(!emitter.is_enabled());
        emitter.emit_chunk("node", "dropped").await;
    }

    #[tokio::test]
    async fn test_emit_after_consumer_dropped_is_ignored() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let emitter = EventEmitter::new(tx);
        emitter.emit_chunk("node", "late").await;
    }
}
