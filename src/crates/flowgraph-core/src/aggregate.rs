//! Streaming message aggregation
//!
//! [`MessageAggregator`] folds a run's [`StreamEvent`] sequence into the
//! message list a caller renders. Token fragments are appended to the
//! **last** assistant message in place, so a UI repainting the list on each
//! event shows one message growing token by token rather than a new entry
//! per fragment. Fragments apply strictly in arrival order.
//!
//! Interrupt events are parked in a side slot, separate from the message
//! list; the pending gate is presented alongside the conversation, not
//! inside it.
//!
//! # Example
//!
//! ```rust
//! use flowgraph_core::aggregate::MessageAggregator;
//! use flowgraph_core::stream::StreamEvent;
//!
//! let mut agg = MessageAggregator::new();
//! agg.begin_turn("Summarize Rust's ownership model");
//!
//! for delta in ["Owner", "ship ", "moves."] {
//!     agg.apply(&StreamEvent::MessageChunk {
//!         node: "summarize".to_string(),
//!         delta: delta.to_string(),
//!     });
//! }
//!
//! assert_eq!(agg.last_assistant_text(), Some("Ownership moves."));
//! assert_eq!(agg.messages().len(), 2); // human turn + one assistant message
//! ```

use crate::interrupt::InterruptEnvelope;
use crate::messages::{Message, MessageRole};
use crate::stream::StreamEvent;

/// Folds stream events into a renderable message list
#[derive(Debug, Default)]
pub struct MessageAggregator {
    messages: Vec<Message>,
    pending_interrupt: Option<InterruptEnvelope>,
    error: Option<String>,
    done: bool,
}

impl MessageAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the aggregator with existing history (e.g. from a checkpoint)
    pub fn with_history(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    /// Start a caller turn: append the human message and an empty assistant
    /// placeholder for fragments to land in.
    ///
    /// The placeholder keeps the list length constant while fragments
    /// arrive, which is what lets a UI treat the list as stable during
    /// generation.
    pub fn begin_turn(&mut self, user_text: impl Into<String>) {
        self.messages.push(Message::human(user_text.into()));
        self.messages.push(Message::assistant(""));
        self.done = false;
        self.error = None;
    }

    /// Apply one event in arrival order
    pub fn apply(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::MessageChunk { delta, .. } => {
                match self.messages.last_mut() {
                    Some(last) if last.role == MessageRole::Assistant => {
                        last.append_text(delta);
                    }
                    _ => {
                        // No open assistant message; open one with this fragment
                        self.messages.push(Message::assistant(delta.clone()));
                    }
                }
            }
            StreamEvent::Interrupt { envelope } => {
                self.pending_interrupt = Some(envelope.clone());
            }
            StreamEvent::Error { message } => {
                self.error = Some(message.clone());
            }
            StreamEvent::Done { .. } => {
                self.done = true;
            }
        }
    }

    /// The aggregated message list
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Text of the last assistant message, if any
    pub fn last_assistant_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::Assistant)
            .and_then(|m| m.text())
    }

    /// Take the parked interrupt, leaving the slot empty
    pub fn take_interrupt(&mut self) -> Option<InterruptEnvelope> {
        self.pending_interrupt.take()
    }

    /// Whether an interrupt is parked awaiting a decision
    pub fn has_interrupt(&self) -> bool {
        self.pending_interrupt.is_some()
    }

    /// Error recorded by an `Error` event, if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Whether a `Done` event closed the current turn
    pub fn is_done(&self) -> bool {
        self.done
    }
}
