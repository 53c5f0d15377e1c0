//! Researcher sub-graph: a bounded tool-use loop over one research task
//!
//! The `researcher` node calls the model with the registry's tools bound.
//! While the assistant keeps requesting tools and the loop budget holds,
//! control hops to the `tools` node, which runs each requested call and
//! appends tool-result messages before looping back. A tool failure becomes
//! a failure-describing tool message, so one bad lookup never aborts the
//! whole task.

use crate::schema::{researcher_schema, MESSAGES};
use flowgraph_core::{
    ChatModel, ChatRequest, CompiledGraph, GraphError, Message, NodeOutcome, StateGraph,
    ToolRegistry, END, START,
};
use serde_json::{json, Value};
use std::sync::Arc;

pub const RESEARCHER: &str = "researcher";
pub const TOOLS: &str = "tools";

/// Tool-call rounds taken so far in this run
const SEARCH_LOOPS: &str = "search_loops";

/// The task string this run is investigating
const TASK: &str = "task";

const RESEARCHER_PROMPT: &str = "You are a focused researcher working on a single task. \
Use the available tools to gather evidence, then write a concise summary of your findings.";

/// Deserialize the transcript out of a state value; absent means empty
pub(crate) fn conversation_from(state: &Value) -> Result<Vec<Message>, serde_json::Error> {
    match state.get(MESSAGES) {
        Some(value) if value.is_array() => serde_json::from_value(value.clone()),
        _ => Ok(Vec::new()),
    }
}

/// The text of the last assistant message, used as the run's findings
pub(crate) fn final_text(state: &Value) -> Option<String> {
    let messages = conversation_from(state).ok()?;
    messages
        .iter()
        .rev()
        .find(|m| m.role == flowgraph_core::MessageRole::Assistant)
        .and_then(|m| m.text())
        .map(String::from)
}

/// Whether the transcript's last message carries unanswered tool calls
fn wants_tools(state: &Value) -> bool {
    state[MESSAGES]
        .as_array()
        .and_then(|m| m.last())
        .and_then(|m| m.get("tool_calls"))
        .and_then(Value::as_array)
        .map(|calls| !calls.is_empty())
        .unwrap_or(false)
}

/// Build the researcher sub-graph
///
/// `max_search_loops` caps how many tool-call rounds the model gets; once
/// spent, the next assistant turn is taken as-is even if it asks for more.
pub fn build_researcher(
    model: Arc<dyn ChatModel>,
    tools: ToolRegistry,
    max_search_loops: u32,
) -> Result<CompiledGraph, GraphError> {
    let mut graph = StateGraph::with_schema(researcher_schema());

    let definitions = tools.definitions();
    graph.add_node(RESEARCHER, move |ctx| {
        let model = model.clone();
        let definitions = definitions.clone();
        async move {
            let mut messages = conversation_from(&ctx.state)?;
            if messages.is_empty() {
                let task = ctx.state[TASK].as_str().unwrap_or_default();
                messages.push(Message::system(RESEARCHER_PROMPT));
                messages.push(Message::human(task));
            }

            let request = ChatRequest::new(messages).with_tools(definitions);
            let response = model.chat(request).await?;

            let loops = ctx.state[SEARCH_LOOPS].as_u64().unwrap_or(0);
            let loops = if response.message.has_tool_calls() {
                loops + 1
            } else {
                loops
            };
            Ok(NodeOutcome::Update(json!({
                MESSAGES: [serde_json::to_value(&response.message)?],
                SEARCH_LOOPS: loops,
            })))
        }
    });

    graph.add_node(TOOLS, move |ctx| {
        let registry = tools.clone();
        async move {
            let messages = conversation_from(&ctx.state)?;
            let calls = messages
                .last()
                .and_then(|m| m.tool_calls.clone())
                .unwrap_or_default();

            let mut results = Vec::with_capacity(calls.len());
            for call in calls {
                let outcome = match registry.get(&call.name) {
                    Some(tool) => tool.invoke(call.args.clone()).await,
                    None => Err(GraphError::external_call(format!(
                        "unknown tool '{}'",
                        call.name
                    ))),
                };
                let content = match outcome {
                    Ok(value) => value.to_string(),
                    Err(err) => {
                        tracing::warn!(tool = %call.name, error = %err, "tool call failed");
                        format!("tool '{}' failed: {err}", call.name)
                    }
                };
                let message = Message::tool(content, call.id).with_name(call.name);
                results.push(serde_json::to_value(message)?);
            }
            Ok(NodeOutcome::Update(json!({ MESSAGES: results })))
        }
    });

    graph.add_edge(START, RESEARCHER);
    let budget = u64::from(max_search_loops);
    graph.add_conditional_edge(
        RESEARCHER,
        move |state| {
            let loops = state[SEARCH_LOOPS].as_u64().unwrap_or(0);
            if wants_tools(state) && loops <= budget {
                TOOLS.to_string()
            } else {
                END.to_string()
            }
        },
        vec![TOOLS.to_string(), END.to_string()],
    );
    graph.add_edge(TOOLS, RESEARCHER);

    Ok(graph.compile()?.with_name("researcher"))
}
