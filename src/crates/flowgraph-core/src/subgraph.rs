//! Sub-graph embedding and parallel fan-out
//!
//! A compiled graph can serve as a node in a larger graph, and a batch of
//! independent tasks can be dispatched across clones of one sub-graph with
//! bounded concurrency via [`fan_out`]. Results land in a map keyed by task
//! so a reducer can fold them into the parent state without ordering
//! ambiguity.

use crate::engine::CompiledGraph;
use crate::error::Result;
use futures::stream::{self, StreamExt};
use serde_json::{Map, Value};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Anything that can run to completion over a JSON state
///
/// [`CompiledGraph`] implements this, so graphs nest without the parent
/// knowing anything about the child's internals.
pub trait SubgraphExecutor: Send + Sync {
    /// Run the sub-graph over `state` and return its final state
    fn invoke(&self, state: Value) -> Pin<Box<dyn Future<Output = Result<Value>> + Send + '_>>;

    /// Name used for logging and attribution
    fn name(&self) -> &str;
}

impl SubgraphExecutor for CompiledGraph {
    fn invoke(&self, state: Value) -> Pin<Box<dyn Future<Output = Result<Value>> + Send + '_>> {
        Box::pin(CompiledGraph::invoke(self, state))
    }

    fn name(&self) -> &str {
        CompiledGraph::name(self)
    }
}

/// Per-task outcomes of a [`fan_out`] dispatch
///
/// Keys are the task strings. A failing task records its error message
/// under `errors` and never aborts its siblings.
#[derive(Debug, Default)]
pub struct FanOut {
    pub results: Map<String, Value>,
    pub errors: Map<String, Value>,
}

impl FanOut {
    pub fn is_complete_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Run one sub-graph instance per task with at most `concurrency` in flight
///
/// `make_input` builds the initial state for a task. Duplicate task strings
/// collapse onto one key; the last finisher wins. Task identity, not finish
/// order, determines where a result lands.
pub async fn fan_out<F>(
    subgraph: Arc<dyn SubgraphExecutor>,
    tasks: &[String],
    make_input: F,
    concurrency: usize,
) -> FanOut
where
    F: Fn(&str) -> Value,
{
    let concurrency = concurrency.max(1);
    tracing::info!(
        subgraph = subgraph.name(),
        tasks = tasks.len(),
        concurrency,
        "dispatching fan-out"
    );

    let mut runs = Vec::with_capacity(tasks.len());
    for task in tasks {
        let subgraph = Arc::clone(&subgraph);
        let input = make_input(task);
        let task = task.clone();
        runs.push(async move {
            let outcome = subgraph.invoke(input).await;
            (task, outcome)
        });
    }

    let outcomes: Vec<(String, Result<Value>)> = stream::iter(runs)
        .buffer_unordered(concurrency)
        .collect()
        .await;

    let mut out = FanOut::default();
    for (task, outcome) in outcomes {
        match outcome {
            Ok(state) => {
                out.results.insert(task, state);
            }
            Err(err) => {
                tracing::warn!(task = %task, error = %err, "fan-out task failed");
                out.errors.insert(task, Value::String(err.to_string()));
            }
        }
    }
    out
}
