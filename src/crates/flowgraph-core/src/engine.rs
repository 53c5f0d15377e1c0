//! Graph construction and execution
//!
//! [`StateGraph`] is the builder: add nodes and edges, then `compile()` into
//! a [`CompiledGraph`]. Compilation validates the structure; execution runs
//! one node at a time from [`START`] until control reaches [`END`], the run
//! suspends on an interrupt, or a node fails.
//!
//! Each node receives a [`NodeContext`] carrying a snapshot of the state, a
//! resume decision when the node is being re-entered after an interrupt,
//! and an emitter for token streaming. The node's patch is folded into the
//! state through the graph's [`StateSchema`] exactly once per completion,
//! and when a checkpointer is attached the merged state is persisted under
//! the run's thread ID after every step.
//!
//! # Example
//!
//! ```rust
//! use flowgraph_core::{NodeOutcome, StateGraph, END, START};
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut graph = StateGraph::new();
//! graph.add_node("greet", |ctx| async move {
//!     let name = ctx.state["name"].as_str().unwrap_or("world").to_string();
//!     Ok(NodeOutcome::Update(json!({"greeting": format!("hello, {name}")})))
//! });
//! graph.add_edge(START, "greet");
//! graph.add_edge("greet", END);
//!
//! let compiled = graph.compile()?;
//! let result = compiled.invoke(json!({"name": "graph"})).await?;
//! assert_eq!(result["greeting"], "hello, graph");
//! # Ok(())
//! # }
//! ```

use crate::error::{GraphError, Result};
use crate::graph::{BoxError, Edge, Graph, NodeFn, NodeId, NodeSpec, END, START};
use crate::interrupt::{Decision, PendingInterrupt};
use crate::outcome::NodeOutcome;
use crate::state::StateSchema;
use crate::stream::{EventEmitter, EventStream, StreamEvent};
use flowgraph_checkpoint::{
    Checkpoint, CheckpointConfig, CheckpointMetadata, CheckpointSaver, CheckpointSource,
};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Everything a node sees when it runs
pub struct NodeContext {
    /// Snapshot of the merged state when the node was scheduled
    pub state: Value,

    /// Name of the executing node
    pub node: NodeId,

    /// The caller's decision, present only when re-entering after an
    /// interrupt this node raised
    pub resume: Option<Decision>,

    emitter: EventEmitter,
}

impl NodeContext {
    /// Emit a token fragment attributed to this node
    pub async fn emit_chunk(&self, delta: impl Into<String>) {
        self.emitter.emit_chunk(self.node.clone(), delta).await;
    }

    /// The run's event emitter
    pub fn emitter(&self) -> &EventEmitter {
        &self.emitter
    }
}

impl std::fmt::Debug for NodeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeContext")
            .field("node", &self.node)
            .field("resume", &self.resume)
            .finish()
    }
}

/// Builder for executable graphs
#[derive(Default)]
pub struct StateGraph {
    graph: Graph,
    schema: StateSchema,
}

impl StateGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder with a state schema defining per-field merge policies
    pub fn with_schema(schema: StateSchema) -> Self {
        Self {
            graph: Graph::new(),
            schema,
        }
    }

    /// Add a node whose successor comes from its outgoing edge
    pub fn add_node<F, Fut>(&mut self, name: impl Into<NodeId>, body: F) -> &mut Self
    where
        F: Fn(NodeContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<NodeOutcome, BoxError>> + Send + 'static,
    {
        self.add_node_with_ends(name, body, Vec::new())
    }

    /// Add a node that may route itself to any of `ends` via `goto`
    pub fn add_node_with_ends<F, Fut>(
        &mut self,
        name: impl Into<NodeId>,
        body: F,
        ends: Vec<NodeId>,
    ) -> &mut Self
    where
        F: Fn(NodeContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<NodeOutcome, BoxError>> + Send + 'static,
    {
        let name = name.into();
        let body: NodeFn = Arc::new(move |ctx| Box::pin(body(ctx)));
        self.graph.add_node(
            name.clone(),
            NodeSpec {
                name,
                body,
                ends,
            },
        );
        self
    }

    /// Add a direct edge
    pub fn add_edge(&mut self, from: impl Into<NodeId>, to: impl Into<NodeId>) -> &mut Self {
        self.graph.add_edge(from.into(), to.into());
        self
    }

    /// Add a conditional edge: `router` picks the successor from `allowed`
    pub fn add_conditional_edge<R>(
        &mut self,
        from: impl Into<NodeId>,
        router: R,
        allowed: Vec<NodeId>,
    ) -> &mut Self
    where
        R: Fn(&Value) -> NodeId + Send + Sync + 'static,
    {
        self.graph
            .add_conditional_edge(from.into(), Arc::new(router), allowed);
        self
    }

    /// Validate the structure and produce an executable graph
    pub fn compile(self) -> Result<CompiledGraph> {
        self.graph.validate().map_err(GraphError::Definition)?;
        Ok(CompiledGraph {
            graph: Arc::new(self.graph),
            schema: Arc::new(self.schema),
            checkpointer: None,
            name: "graph".to_string(),
        })
    }
}

/// How a single engine pass ended
enum RunEnd {
    /// Control reached [`END`]
    Complete(Value),
    /// A node suspended on an interrupt; state is as-of suspension
    Suspended(Value),
}

/// State and position a run starts from
struct PreparedRun {
    state: Value,
    start: NodeId,
    step: i64,
}

/// An executable graph
///
/// Cheap to clone; clones share the graph, schema, and checkpointer.
#[derive(Clone)]
pub struct CompiledGraph {
    graph: Arc<Graph>,
    schema: Arc<StateSchema>,
    checkpointer: Option<Arc<dyn CheckpointSaver>>,
    name: String,
}

impl CompiledGraph {
    /// Attach a checkpointer; required for threads, interrupts, and resume
    pub fn with_checkpointer(mut self, checkpointer: Arc<dyn CheckpointSaver>) -> Self {
        self.checkpointer = Some(checkpointer);
        self
    }

    /// Name this graph (used when embedded as a sub-graph)
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run to completion without a thread; final state out
    ///
    /// An interrupt raised during an untracked run is an error: there is no
    /// checkpoint to resume from.
    pub async fn invoke(&self, input: Value) -> Result<Value> {
        self.invoke_with_config(input, None).await
    }

    /// Run to completion (or suspension) under an optional thread
    ///
    /// With a thread ID in `config` and a checkpointer attached, a prior
    /// completed checkpoint is loaded and `input` is merged into it through
    /// the schema, continuing the conversation. On suspension the state
    /// as-of suspension is returned; inspect the thread's checkpoint for
    /// the pending envelope.
    #[tracing::instrument(skip(self, input, config), fields(nodes = self.graph.nodes.len()))]
    pub async fn invoke_with_config(
        &self,
        input: Value,
        config: Option<CheckpointConfig>,
    ) -> Result<Value> {
        tracing::info!("starting graph run");
        let thread = config.and_then(|c| c.thread_id);
        let prepared = self.prepare_run(input, thread.as_deref()).await?;
        let emitter = EventEmitter::disabled();

        let end = self
            .execute(
                prepared.state,
                prepared.start,
                None,
                thread.as_deref(),
                &emitter,
                prepared.step,
            )
            .await?;

        match end {
            RunEnd::Complete(state) => {
                tracing::info!("graph run completed");
                Ok(state)
            }
            RunEnd::Suspended(state) => Ok(state),
        }
    }

    /// Resume a suspended thread and wait for the next completion or
    /// suspension; final state out
    pub async fn resume_invoke(&self, thread_id: &str, decision: Decision) -> Result<Value> {
        let prepared = self.prepare_resume(thread_id, &decision).await?;
        let emitter = EventEmitter::disabled();

        let end = self
            .execute(
                prepared.state,
                prepared.start,
                Some(decision),
                Some(thread_id),
                &emitter,
                prepared.step,
            )
            .await?;

        match end {
            RunEnd::Complete(state) | RunEnd::Suspended(state) => Ok(state),
        }
    }

    /// Start or continue a thread, streaming events as the run progresses
    ///
    /// Fails if the thread is suspended on an interrupt; such a thread must
    /// be [`resume`](Self::resume)d with a decision instead.
    pub async fn run(&self, thread_id: &str, input: Value) -> Result<EventStream> {
        if self.checkpointer.is_none() {
            return Err(GraphError::execution("run requires a checkpointer"));
        }
        let prepared = self.prepare_run(input, Some(thread_id)).await?;
        Ok(self.spawn_stream(prepared, None, Some(thread_id.to_string())))
    }

    /// Resume a suspended thread with a decision, streaming events
    ///
    /// Fails with [`GraphError::NoPendingInterrupt`] when the thread has no
    /// outstanding envelope, and [`GraphError::UnsupportedDecision`] when
    /// the envelope does not permit the decision's kind; in the latter case
    /// the run is left untouched and a permitted decision may be retried.
    pub async fn resume(&self, thread_id: &str, decision: Decision) -> Result<EventStream> {
        let prepared = self.prepare_resume(thread_id, &decision).await?;
        Ok(self.spawn_stream(prepared, Some(decision), Some(thread_id.to_string())))
    }

    /// Stream an ad-hoc run without a thread
    pub async fn stream(&self, input: Value) -> Result<EventStream> {
        let prepared = self.prepare_run(input, None).await?;
        Ok(self.spawn_stream(prepared, None, None))
    }

    /// Latest persisted state for a thread, if any
    pub async fn get_state(&self, thread_id: &str) -> Result<Option<Value>> {
        let Some(saver) = &self.checkpointer else {
            return Ok(None);
        };
        let tuple = saver
            .get_tuple(&CheckpointConfig::for_thread(thread_id))
            .await?;
        Ok(tuple.map(|t| t.checkpoint.values))
    }

    /// Pending interrupt for a thread, if it is suspended
    pub async fn get_pending_interrupt(&self, thread_id: &str) -> Result<Option<PendingInterrupt>> {
        let Some(saver) = &self.checkpointer else {
            return Ok(None);
        };
        let tuple = saver
            .get_tuple(&CheckpointConfig::for_thread(thread_id))
            .await?;
        match tuple.and_then(|t| t.checkpoint.pending_interrupt) {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    fn spawn_stream(
        &self,
        prepared: PreparedRun,
        resume: Option<Decision>,
        thread: Option<String>,
    ) -> EventStream {
        // Bounded for backpressure; a slow consumer slows the run
        let (tx, rx) = mpsc::channel(100);
        let emitter = EventEmitter::new(tx);
        let this = self.clone();

        tokio::spawn(async move {
            let end = this
                .execute(
                    prepared.state,
                    prepared.start,
                    resume,
                    thread.as_deref(),
                    &emitter,
                    prepared.step,
                )
                .await;

            match end {
                Ok(RunEnd::Complete(state)) => {
                    emitter.emit(StreamEvent::Done { state }).await;
                }
                // Suspension already emitted its Interrupt event
                Ok(RunEnd::Suspended(_)) => {}
                Err(err) => {
                    tracing::error!(error = %err, "streaming run failed");
                    emitter
                        .emit(StreamEvent::Error {
                            message: err.to_string(),
                        })
                        .await;
                }
            }
        });

        Box::pin(ReceiverStream::new(rx))
    }

    /// Load or initialize the state and starting position for a run
    async fn prepare_run(&self, input: Value, thread: Option<&str>) -> Result<PreparedRun> {
        if let (Some(thread_id), Some(saver)) = (thread, &self.checkpointer) {
            let existing = saver
                .get_tuple(&CheckpointConfig::for_thread(thread_id))
                .await?;

            if let Some(tuple) = existing {
                if tuple.checkpoint.is_suspended() {
                    return Err(GraphError::execution(format!(
                        "thread '{thread_id}' has a pending interrupt; resume it with a decision"
                    )));
                }

                let mut state = tuple.checkpoint.values;
                if !input.is_null() {
                    self.schema.apply(&mut state, &input)?;
                }
                let start = match tuple.checkpoint.next_node {
                    // Interrupted mid-run (e.g. process restart): pick up where we left off
                    Some(node) => node,
                    // Completed thread: a new turn re-enters from the top
                    None => self.resolve_edge(START, &state)?,
                };
                let step = tuple.metadata.step.map(|s| s + 1).unwrap_or(0);

                // Persist the merged input before the first node runs, so a
                // crash mid-turn does not drop it from the thread
                self.put_checkpoint(
                    thread_id,
                    Checkpoint::new(state.clone(), Some(start.clone())),
                    CheckpointSource::Input,
                    step - 1,
                )
                .await?;

                tracing::debug!(thread_id = %thread_id, start = %start, "continuing thread");
                return Ok(PreparedRun { state, start, step });
            }
        }

        let state = if input.is_null() { json!({}) } else { input };
        if !state.is_object() {
            return Err(GraphError::execution("input state must be a JSON object"));
        }

        let start = self.resolve_edge(START, &state)?;
        if let Some(thread_id) = thread {
            self.put_checkpoint(
                thread_id,
                Checkpoint::new(state.clone(), Some(start.clone())),
                CheckpointSource::Input,
                -1,
            )
            .await?;
        }
        Ok(PreparedRun {
            state,
            start,
            step: 0,
        })
    }

    /// Validate a resume against the thread's pending interrupt
    async fn prepare_resume(&self, thread_id: &str, decision: &Decision) -> Result<PreparedRun> {
        let saver = self
            .checkpointer
            .as_ref()
            .ok_or_else(|| GraphError::execution("resume requires a checkpointer"))?;

        let tuple = saver
            .get_tuple(&CheckpointConfig::for_thread(thread_id))
            .await?
            .ok_or_else(|| GraphError::NoPendingInterrupt(thread_id.to_string()))?;

        let pending_value = tuple
            .checkpoint
            .pending_interrupt
            .ok_or_else(|| GraphError::NoPendingInterrupt(thread_id.to_string()))?;
        let pending: PendingInterrupt = serde_json::from_value(pending_value)?;

        if !pending.envelope.permits(&decision.kind) {
            return Err(GraphError::UnsupportedDecision {
                kind: decision.kind.to_string(),
                permitted: pending
                    .envelope
                    .permitted
                    .iter()
                    .map(|k| k.as_str().to_string())
                    .collect(),
            });
        }

        tracing::info!(thread_id = %thread_id, node = %pending.node, decision = %decision.kind, "resuming thread");
        Ok(PreparedRun {
            state: tuple.checkpoint.values,
            start: pending.node,
            step: tuple.metadata.step.map(|s| s + 1).unwrap_or(0),
        })
    }

    /// The engine loop: run nodes until END, suspension, or failure
    async fn execute(
        &self,
        mut state: Value,
        mut current: NodeId,
        mut resume: Option<Decision>,
        thread: Option<&str>,
        emitter: &EventEmitter,
        mut step: i64,
    ) -> Result<RunEnd> {
        loop {
            if current == END {
                return Ok(RunEnd::Complete(state));
            }

            let spec = self
                .graph
                .nodes
                .get(&current)
                .ok_or_else(|| GraphError::execution(format!("node '{current}' not found")))?;

            tracing::debug!(node = %current, step, "executing node");
            let ctx = NodeContext {
                state: state.clone(),
                node: current.clone(),
                resume: resume.take(),
                emitter: emitter.clone(),
            };

            let outcome = (spec.body)(ctx).await.map_err(|err| {
                tracing::error!(node = %current, error = %err, "node execution failed");
                GraphError::node_execution(&current, err)
            })?;

            let next = match outcome {
                NodeOutcome::Suspend(envelope) => {
                    let thread_id = thread.ok_or_else(|| {
                        GraphError::execution(
                            "interrupt raised without a thread; run under a thread id to suspend",
                        )
                    })?;

                    let pending = PendingInterrupt::new(current.clone(), envelope.clone());
                    let checkpoint =
                        Checkpoint::suspended(state.clone(), serde_json::to_value(&pending)?);
                    self.put_checkpoint(thread_id, checkpoint, CheckpointSource::Loop, step)
                        .await?;

                    tracing::info!(node = %current, gate = %envelope.name, "run suspended");
                    emitter.emit(StreamEvent::Interrupt { envelope }).await;
                    return Ok(RunEnd::Suspended(state));
                }
                NodeOutcome::Update(patch) => {
                    self.schema.apply(&mut state, &patch)?;
                    self.resolve_edge(&current, &state)?
                }
                NodeOutcome::Command(cmd) => {
                    if let Some(patch) = &cmd.update {
                        self.schema.apply(&mut state, patch)?;
                    }
                    match cmd.goto {
                        Some(target) => {
                            if spec.ends.iter().any(|end| end == &target) {
                                target
                            } else {
                                return Err(GraphError::routing_violation(&current, target));
                            }
                        }
                        None => self.resolve_edge(&current, &state)?,
                    }
                }
            };

            if let Some(thread_id) = thread {
                let next_node = (next != END).then(|| next.clone());
                self.put_checkpoint(
                    thread_id,
                    Checkpoint::new(state.clone(), next_node),
                    CheckpointSource::Loop,
                    step,
                )
                .await?;
            }

            tracing::debug!(node = %current, next = %next, "node complete");
            step += 1;
            current = next;
        }
    }

    /// Resolve the successor of `current` from its outgoing edge
    fn resolve_edge(&self, current: &str, state: &Value) -> Result<NodeId> {
        match self.graph.edges.get(current) {
            Some(Edge::Direct(to)) => Ok(to.clone()),
            Some(Edge::Conditional { router, allowed }) => {
                let target = router(state);
                if allowed.iter().any(|a| a == &target) {
                    Ok(target)
                } else {
                    Err(GraphError::routing_violation(current, target))
                }
            }
            None => Err(GraphError::execution(format!(
                "node '{current}' produced no route and has no outgoing edge"
            ))),
        }
    }

    async fn put_checkpoint(
        &self,
        thread_id: &str,
        checkpoint: Checkpoint,
        source: CheckpointSource,
        step: i64,
    ) -> Result<()> {
        let saver = self.checkpointer.as_ref().ok_or_else(|| {
            GraphError::execution("thread id configured but no checkpointer attached")
        })?;

        let config = CheckpointConfig::for_thread(thread_id);
        let metadata = CheckpointMetadata::new().with_source(source).with_step(step);
        saver.put(&config, checkpoint, metadata).await?;
        tracing::debug!(thread_id = %thread_id, step, "checkpoint persisted");
        Ok(())
    }
}

impl std::fmt::Debug for CompiledGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledGraph")
            .field("name", &self.name)
            .field("nodes", &self.graph.nodes.len())
            .field("checkpointer", &self.checkpointer.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use crate::interrupt::{DecisionKind, InterruptEnvelope};
    use crate::state::{AppendReducer, StateSchema};
    use flowgraph_checkpoint::InMemoryCheckpointSaver;

    fn counting_graph() -> StateGraph {
        let mut graph = StateGraph::new();
        graph.add_node("increment", |ctx| async move {
            let count = ctx.state["count"].as_i64().unwrap_or(0);
            Ok(NodeOutcome::Update(json!({"count": count + 1})))
        });
        graph.add_edge(START, "increment");
        graph.add_edge("increment", END);
        graph
    }

    #[tokio::test]
    async fn test_linear_invoke() {
        let compiled = counting_graph().compile().unwrap();
        let result = compiled.invoke(json!({"count": 41})).await.unwrap();
        assert_eq!(result["count"], 42);
    }

    #[tokio::test]
    async fn test_compile_rejects_invalid_graph() {
        let mut graph = StateGraph::new();
        graph.add_edge(START, "missing");
        assert!(matches!(graph.compile(), Err(GraphError::Definition(_))));
    }

    #[tokio::test]
    async fn test_conditional_routing() {
        let mut graph = StateGraph::new();
        graph.add_node("check", |_ctx| async move {
            Ok(NodeOutcome::Update(json!({})))
        });
        graph.add_node("high", |_ctx| async move {
            Ok(NodeOutcome::Update(json!({"branch": "high"})))
        });
        graph.add_node("low", |_ctx| async move {
            Ok(NodeOutcome::Update(json!({"branch": "low"})))
        });
        graph.add_edge(START, "check");
        graph.add_conditional_edge(
            "check",
            |state| {
                if state["value"].as_i64().unwrap_or(0) > 10 {
                    "high".to_string()
                } else {
                    "low".to_string()
                }
            },
            vec!["high".to_string(), "low".to_string()],
        );
        graph.add_edge("high", END);
        graph.add_edge("low", END);

        let compiled = graph.compile().unwrap();
        let result = compiled.invoke(json!({"value": 20})).await.unwrap();
        assert_eq!(result["branch"], "high");
        let result = compiled.invoke(json!({"value": 3})).await.unwrap();
        assert_eq!(result["branch"], "low");
    }

    #[tokio::test]
    async fn test_router_outside_allow_list_is_violation() {
        let mut graph = StateGraph::new();
        graph.add_node("a", |_ctx| async move { Ok(NodeOutcome::Update(json!({}))) });
        graph.add_node("b", |_ctx| async move { Ok(NodeOutcome::Update(json!({}))) });
        graph.add_edge(START, "a");
        // Router returns "b" but only END is allowed
        graph.add_conditional_edge("a", |_| "b".to_string(), vec![END.to_string()]);
        graph.add_edge("b", END);

        let compiled = graph.compile().unwrap();
        let err = compiled.invoke(json!({})).await.unwrap_err();
        assert!(matches!(err, GraphError::RoutingViolation { .. }));
    }

    #[tokio::test]
    async fn test_goto_outside_ends_is_violation() {
        let mut graph = StateGraph::new();
        graph.add_node_with_ends(
            "chooser",
            |_ctx| async move { Ok(NodeOutcome::Command(Command::goto("forbidden"))) },
            vec![END.to_string()],
        );
        graph.add_node("forbidden", |_ctx| async move {
            Ok(NodeOutcome::Update(json!({})))
        });
        graph.add_edge(START, "chooser");
        graph.add_edge("forbidden", END);

        let compiled = graph.compile().unwrap();
        let err = compiled.invoke(json!({})).await.unwrap_err();
        assert!(
            matches!(err, GraphError::RoutingViolation { ref node, ref target }
                if node == "chooser" && target == "forbidden")
        );
    }

    #[tokio::test]
    async fn test_node_failure_aborts_run() {
        let mut graph = StateGraph::new();
        graph.add_node("fails", |_ctx| async move {
            Err::<NodeOutcome, BoxError>("boom".into())
        });
        graph.add_edge(START, "fails");
        graph.add_edge("fails", END);

        let compiled = graph.compile().unwrap();
        let err = compiled.invoke(json!({})).await.unwrap_err();
        assert!(matches!(err, GraphError::NodeExecution { ref node, .. } if node == "fails"));
    }

    #[tokio::test]
    async fn test_merge_conflict_surfaces_field() {
        let mut schema = StateSchema::new();
        schema.add_field("log", Box::new(AppendReducer));

        let mut graph = StateGraph::with_schema(schema);
        graph.add_node("writer", |_ctx| async move {
            Ok(NodeOutcome::Update(json!({"log": ["entry"]})))
        });
        graph.add_edge(START, "writer");
        graph.add_edge("writer", END);

        let compiled = graph.compile().unwrap();
        // "log" starts as a non-array scalar, so the append reducer fails
        let err = compiled.invoke(json!({"log": 7})).await.unwrap_err();
        assert!(matches!(err, GraphError::MergeConflict { ref field, .. } if field == "log"));
    }

    #[tokio::test]
    async fn test_checkpoint_written_per_step() {
        let saver = Arc::new(InMemoryCheckpointSaver::new());
        let compiled = counting_graph()
            .compile()
            .unwrap()
            .with_checkpointer(saver.clone());

        let config = Some(CheckpointConfig::for_thread("t-1"));
        compiled
            .invoke_with_config(json!({"count": 0}), config)
            .await
            .unwrap();

        let state = compiled.get_state("t-1").await.unwrap().unwrap();
        assert_eq!(state["count"], 1);
    }

    #[tokio::test]
    async fn test_thread_continuation_merges_input() {
        let mut schema = StateSchema::new();
        schema.add_field("log", Box::new(AppendReducer));

        let mut graph = StateGraph::with_schema(schema);
        graph.add_node("append_turn", |_ctx| async move {
            Ok(NodeOutcome::Update(json!({"log": ["ran"]})))
        });
        graph.add_edge(START, "append_turn");
        graph.add_edge("append_turn", END);

        let saver = Arc::new(InMemoryCheckpointSaver::new());
        let compiled = graph.compile().unwrap().with_checkpointer(saver);

        let config = Some(CheckpointConfig::for_thread("conv"));
        compiled
            .invoke_with_config(json!({"log": ["turn-1"]}), config.clone())
            .await
            .unwrap();
        let result = compiled
            .invoke_with_config(json!({"log": ["turn-2"]}), config)
            .await
            .unwrap();

        assert_eq!(result["log"], json!(["turn-1", "ran", "turn-2", "ran"]));
    }

    #[tokio::test]
    async fn test_continuation_input_persisted_before_first_node() {
        let mut schema = StateSchema::new();
        schema.add_field("log", Box::new(AppendReducer));

        let mut graph = StateGraph::with_schema(schema);
        graph.add_node("append_turn", |ctx| async move {
            if ctx.state["poison"] == json!(true) {
                return Err::<NodeOutcome, BoxError>("node blew up".into());
            }
            Ok(NodeOutcome::Update(json!({"log": ["ran"]})))
        });
        graph.add_edge(START, "append_turn");
        graph.add_edge("append_turn", END);

        let saver = Arc::new(InMemoryCheckpointSaver::new());
        let compiled = graph.compile().unwrap().with_checkpointer(saver.clone());

        let config = Some(CheckpointConfig::for_thread("conv"));
        compiled
            .invoke_with_config(json!({"log": ["turn-1"]}), config.clone())
            .await
            .unwrap();

        // The second turn's node crashes before it can commit
        compiled
            .invoke_with_config(json!({"log": ["turn-2"], "poison": true}), config)
            .await
            .unwrap_err();

        // The merged input survived the crash
        let tuple = saver
            .get_tuple(&CheckpointConfig::for_thread("conv"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            tuple.checkpoint.values["log"],
            json!(["turn-1", "ran", "turn-2"])
        );
        assert_eq!(tuple.metadata.source, Some(CheckpointSource::Input));
    }

    fn gated_graph() -> StateGraph {
        let mut graph = StateGraph::new();
        graph.add_node_with_ends(
            "gate",
            |ctx| async move {
                match ctx.resume {
                    None => Ok(NodeOutcome::Suspend(
                        InterruptEnvelope::new("confirm")
                            .with_permitted(vec![DecisionKind::Approve, DecisionKind::Reject]),
                    )),
                    Some(decision) if decision.kind == DecisionKind::Approve => {
                        Ok(NodeOutcome::Command(
                            Command::new()
                                .with_update(json!({"approved": true}))
                                .with_goto(END),
                        ))
                    }
                    Some(_) => Ok(NodeOutcome::Command(
                        Command::new()
                            .with_update(json!({"approved": false}))
                            .with_goto(END),
                    )),
                }
            },
            vec![END.to_string()],
        );
        graph.add_edge(START, "gate");
        graph
    }

    #[tokio::test]
    async fn test_interrupt_suspends_and_resume_reenters() {
        let saver = Arc::new(InMemoryCheckpointSaver::new());
        let compiled = gated_graph().compile().unwrap().with_checkpointer(saver);

        let config = Some(CheckpointConfig::for_thread("hitl"));
        compiled
            .invoke_with_config(json!({}), config)
            .await
            .unwrap();

        let pending = compiled
            .get_pending_interrupt("hitl")
            .await
            .unwrap()
            .expect("thread suspended");
        assert_eq!(pending.envelope.name, "confirm");
        assert_eq!(pending.node, "gate");

        let result = compiled
            .resume_invoke("hitl", Decision::approve())
            .await
            .unwrap();
        assert_eq!(result["approved"], true);

        // Envelope consumed; a second resume has nothing to act on
        let err = compiled
            .resume_invoke("hitl", Decision::approve())
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::NoPendingInterrupt(_)));
    }

    #[tokio::test]
    async fn test_unsupported_decision_leaves_run_resumable() {
        let saver = Arc::new(InMemoryCheckpointSaver::new());
        let compiled = gated_graph().compile().unwrap().with_checkpointer(saver);

        compiled
            .invoke_with_config(json!({}), Some(CheckpointConfig::for_thread("hitl")))
            .await
            .unwrap();

        let err = compiled
            .resume_invoke("hitl", Decision::edit(json!("change it")))
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::UnsupportedDecision { .. }));

        // The envelope is still pending; a permitted decision succeeds
        let result = compiled
            .resume_invoke("hitl", Decision::reject())
            .await
            .unwrap();
        assert_eq!(result["approved"], false);
    }

    #[tokio::test]
    async fn test_resume_without_interrupt_fails() {
        let saver = Arc::new(InMemoryCheckpointSaver::new());
        let compiled = counting_graph()
            .compile()
            .unwrap()
            .with_checkpointer(saver);

        let err = compiled
            .resume_invoke("fresh", Decision::approve())
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::NoPendingInterrupt(ref t) if t == "fresh"));
    }

    #[tokio::test]
    async fn test_run_on_suspended_thread_is_rejected() {
        let saver = Arc::new(InMemoryCheckpointSaver::new());
        let compiled = gated_graph().compile().unwrap().with_checkpointer(saver);

        compiled
            .invoke_with_config(json!({}), Some(CheckpointConfig::for_thread("hitl")))
            .await
            .unwrap();

        let err = match compiled.run("hitl", json!({})).await {
            Err(err) => err,
            Ok(_) => panic!("expected run to fail"),
        };
        assert!(matches!(err, GraphError::Execution(_)));
    }

    #[tokio::test]
    async fn test_interrupt_without_thread_is_error() {
        let compiled = gated_graph().compile().unwrap();
        let err = compiled.invoke(json!({})).await.unwrap_err();
        assert!(matches!(err, GraphError::Execution(_)));
    }

    #[tokio::test]
    async fn test_loop_until_condition() {
        let mut graph = StateGraph::new();
        graph.add_node("work", |ctx| async move {
            let count = ctx.state["count"].as_i64().unwrap_or(0);
            Ok(NodeOutcome::Update(json!({"count": count + 1})))
        });
        graph.add_edge(START, "work");
        graph.add_conditional_edge(
            "work",
            |state| {
                if state["count"].as_i64().unwrap_or(0) < 5 {
                    "work".to_string()
                } else {
                    END.to_string()
                }
            },
            vec!["work".to_string(), END.to_string()],
        );

        let compiled = graph.compile().unwrap();
        let result = compiled.invoke(json!({"count": 0})).await.unwrap();
        assert_eq!(result["count"], 5);
    }
}
