//! # flowgraph-core
//!
//! A graph execution engine for agent workflows: typed shared state with
//! per-field merge policies, node scheduling with conditional routing,
//! durable checkpoints per step, a human-in-the-loop interrupt protocol,
//! and token-level event streaming.
//!
//! Build a [`StateGraph`], wire nodes with direct or conditional edges,
//! `compile()` it, and drive it with [`CompiledGraph::invoke`] for one-shot
//! runs or [`CompiledGraph::run`]/[`CompiledGraph::resume`] for streaming,
//! checkpointed threads.
//!
//! ```rust
//! use flowgraph_core::{NodeOutcome, StateGraph, END, START};
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut graph = StateGraph::new();
//! graph.add_node("shout", |ctx| async move {
//!     let text = ctx.state["text"].as_str().unwrap_or_default().to_uppercase();
//!     Ok(NodeOutcome::Update(json!({"text": text})))
//! });
//! graph.add_edge(START, "shout");
//! graph.add_edge("shout", END);
//!
//! let result = graph.compile()?.invoke(json!({"text": "hello"})).await?;
//! assert_eq!(result["text"], "HELLO");
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod command;
pub mod engine;
pub mod error;
pub mod graph;
pub mod interrupt;
pub mod llm;
pub mod messages;
pub mod outcome;
pub mod state;
pub mod stream;
pub mod subgraph;
pub mod tool;

pub use aggregate::MessageAggregator;
pub use command::Command;
pub use engine::{CompiledGraph, NodeContext, StateGraph};
pub use error::{GraphError, Result};
pub use graph::{BoxError, Edge, Graph, NodeFn, NodeId, NodeSpec, RouterFn, END, START};
pub use interrupt::{Decision, DecisionKind, InterruptEnvelope, PendingInterrupt};
pub use llm::{ChatModel, ChatRequest, ChatResponse, TokenStream, ToolDefinition};
pub use messages::{add_messages, Message, MessageContent, MessageRole, MessagesReducer, ToolCall};
pub use outcome::NodeOutcome;
pub use state::{
    AppendReducer, MergeReducer, OverwriteReducer, Reducer, StateError, StateSchema,
};
pub use stream::{EventEmitter, EventStream, StreamEvent};
pub use subgraph::{fan_out, FanOut, SubgraphExecutor};
pub use tool::{Tool, ToolRegistry};
