//! The deep-research agent graph
//!
//! Five stages. `clarify` decides whether the request is specific enough to
//! research; `planner` drafts an ordered task list; `approval` suspends the
//! run and waits for a human decision on the plan; `executor` fans the plan
//! out across researcher sub-graph instances; `summarize` streams the final
//! report. Rejection ends the run, an edit sends the feedback back to the
//! planner for another draft.
//!
//! # Example
//!
//! ```rust,no_run
//! use flowgraph_agents::ResearchAgentBuilder;
//! use flowgraph_checkpoint::InMemoryCheckpointSaver;
//! use flowgraph_core::{ChatModel, Decision, StreamEvent, ToolRegistry};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn run(model: Arc<dyn ChatModel>) -> Result<(), Box<dyn std::error::Error>> {
//! let agent = ResearchAgentBuilder::new(model)
//!     .with_tools(ToolRegistry::new())
//!     .with_checkpointer(Arc::new(InMemoryCheckpointSaver::new()))
//!     .build()?;
//!
//! let mut events = agent
//!     .run("thread-1", json!({"messages": [{"role": "human", "content": "compare rust async runtimes"}]}))
//!     .await?;
//! // ... consume events until StreamEvent::Interrupt, then:
//! let mut events = agent.resume("thread-1", Decision::approve()).await?;
//! # Ok(())
//! # }
//! ```

use crate::researcher::{build_researcher, conversation_from, final_text};
use crate::schema::{
    research_schema, FINAL_REPORT, MESSAGES, OBJECTIVE, PLAN, RAW_RESULTS, TASK_ERRORS,
};
use flowgraph_checkpoint::CheckpointSaver;
use flowgraph_core::{
    fan_out, ChatModel, ChatRequest, Command, CompiledGraph, DecisionKind, GraphError,
    InterruptEnvelope, Message, NodeOutcome, StateGraph, SubgraphExecutor, ToolRegistry, END,
    START,
};
use futures::StreamExt;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::Arc;

pub const CLARIFY: &str = "clarify";
pub const PLANNER: &str = "planner";
pub const APPROVAL: &str = "approval";
pub const EXECUTOR: &str = "executor";
pub const SUMMARIZE: &str = "summarize";

/// Envelope name the approval gate suspends with
pub const APPROVE_PLAN: &str = "approve_plan";

const CLARIFY_PROMPT: &str = "Decide whether the user's research request is specific enough to \
act on. Reply with a JSON object: {\"reason\": why, \"is_vague\": bool, \"objective\": the \
clarified research objective when the request is actionable}.";

const PLANNER_PROMPT: &str = "Break the research objective into a short ordered list of \
independent research tasks. Reply with a JSON object: {\"plan\": [task, ...]}. Each task must \
stand alone; researchers will work them in parallel.";

const SUMMARIZE_PROMPT: &str = "Write the final research report from the objective and the \
per-task findings below. Be direct and cite which task each claim came from.";

/// Extract an ordered task list from numbered-list text
///
/// Fallback for models that ignore the structured-output schema.
fn parse_numbered_list(pattern: &Regex, text: &str) -> Vec<String> {
    pattern
        .captures_iter(text)
        .map(|captures| captures[1].to_string())
        .collect()
}

fn message_values(messages: Vec<Message>) -> Result<Value, serde_json::Error> {
    serde_json::to_value(messages)
}

/// Builder for the deep-research agent
pub struct ResearchAgentBuilder {
    model: Arc<dyn ChatModel>,
    tools: ToolRegistry,
    checkpointer: Option<Arc<dyn CheckpointSaver>>,
    max_concurrency: usize,
    max_search_loops: u32,
}

impl ResearchAgentBuilder {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            tools: ToolRegistry::new(),
            checkpointer: None,
            max_concurrency: 4,
            max_search_loops: 3,
        }
    }

    /// Tools available to researcher sub-graphs
    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    /// Checkpointer backing threads and the approval interrupt
    pub fn with_checkpointer(mut self, checkpointer: Arc<dyn CheckpointSaver>) -> Self {
        self.checkpointer = Some(checkpointer);
        self
    }

    /// Cap on concurrent researcher sub-graph runs
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    /// Cap on tool-call rounds per researcher run
    pub fn with_max_search_loops(mut self, max_search_loops: u32) -> Self {
        self.max_search_loops = max_search_loops;
        self
    }

    /// Wire and compile the agent graph
    pub fn build(self) -> Result<CompiledGraph, GraphError> {
        let plan_pattern = Regex::new(r"(?m)^\s*\d+[.)]\s*(.+?)\s*$")
            .map_err(|err| GraphError::execution(format!("plan list pattern: {err}")))?;

        let researcher: Arc<dyn SubgraphExecutor> = Arc::new(build_researcher(
            self.model.clone(),
            self.tools.clone(),
            self.max_search_loops,
        )?);

        let mut graph = StateGraph::with_schema(research_schema());

        let clarify_model = self.model.clone();
        graph.add_node_with_ends(
            CLARIFY,
            move |ctx| {
                let model = clarify_model.clone();
                async move {
                    let mut messages = vec![Message::system(CLARIFY_PROMPT)];
                    messages.extend(conversation_from(&ctx.state)?);

                    let schema = json!({
                        "type": "object",
                        "properties": {
                            "reason": {"type": "string"},
                            "objective": {"type": "string"},
                            "is_vague": {"type": "boolean"}
                        },
                        "required": ["reason", "is_vague"]
                    });
                    let response = model
                        .chat(ChatRequest::new(messages).with_response_schema(schema))
                        .await?;
                    let verdict = response
                        .structured
                        .clone()
                        .or_else(|| {
                            response
                                .message
                                .text()
                                .and_then(|text| serde_json::from_str(text).ok())
                        })
                        .ok_or_else(|| {
                            GraphError::external_call("clarify call returned no verdict")
                        })?;

                    let reason = verdict["reason"].as_str().unwrap_or_default().to_string();
                    if verdict["is_vague"].as_bool().unwrap_or(false) {
                        tracing::info!("request too vague, asking for clarification");
                        // The objective stays unset; the reply asks the user to narrow down
                        let update = json!({
                            MESSAGES: [serde_json::to_value(Message::assistant(reason))?],
                        });
                        return Ok(NodeOutcome::Command(
                            Command::new().with_update(update).with_goto(END),
                        ));
                    }

                    let objective = verdict[OBJECTIVE].as_str().unwrap_or_default().to_string();
                    tracing::info!(objective = %objective, "request clarified");
                    Ok(NodeOutcome::Command(
                        Command::new()
                            .with_update(json!({ OBJECTIVE: objective }))
                            .with_goto(PLANNER),
                    ))
                }
            },
            vec![PLANNER.to_string(), END.to_string()],
        );

        let planner_model = self.model.clone();
        graph.add_node(PLANNER, move |ctx| {
            let model = planner_model.clone();
            let pattern = plan_pattern.clone();
            async move {
                let objective = ctx.state[OBJECTIVE].as_str().unwrap_or_default().to_string();
                let mut messages = vec![Message::system(PLANNER_PROMPT)];
                messages.extend(conversation_from(&ctx.state)?);
                messages.push(Message::human(format!("Research objective: {objective}")));

                let schema = json!({
                    "type": "object",
                    "properties": {
                        "plan": {"type": "array", "items": {"type": "string"}}
                    },
                    "required": ["plan"]
                });
                let response = model
                    .chat(ChatRequest::new(messages).with_response_schema(schema))
                    .await?;

                let plan = response
                    .structured
                    .as_ref()
                    .and_then(|verdict| verdict.get(PLAN))
                    .and_then(Value::as_array)
                    .map(|tasks| {
                        tasks
                            .iter()
                            .filter_map(Value::as_str)
                            .map(String::from)
                            .collect::<Vec<_>>()
                    })
                    .filter(|tasks| !tasks.is_empty())
                    .or_else(|| {
                        response
                            .message
                            .text()
                            .map(|text| parse_numbered_list(&pattern, text))
                            .filter(|tasks| !tasks.is_empty())
                    })
                    .ok_or_else(|| GraphError::external_call("planner produced no tasks"))?;

                tracing::info!(tasks = plan.len(), "plan drafted");
                Ok(NodeOutcome::Update(json!({ PLAN: plan })))
            }
        });

        graph.add_node_with_ends(
            APPROVAL,
            |ctx| async move {
                let Some(decision) = ctx.resume else {
                    return Ok(NodeOutcome::Suspend(
                        InterruptEnvelope::new(APPROVE_PLAN)
                            .with_description("Review the research plan before execution")
                            .with_permitted(vec![
                                DecisionKind::Approve,
                                DecisionKind::Reject,
                                DecisionKind::Edit,
                            ])
                            .with_args(json!({ PLAN: ctx.state[PLAN].clone() })),
                    ));
                };

                match decision.kind {
                    DecisionKind::Approve => {
                        Ok(NodeOutcome::Command(Command::goto(EXECUTOR)))
                    }
                    DecisionKind::Reject => {
                        let note =
                            Message::assistant("The research plan was rejected; stopping here.");
                        let update = json!({ MESSAGES: [serde_json::to_value(note)?] });
                        Ok(NodeOutcome::Command(
                            Command::new().with_update(update).with_goto(END),
                        ))
                    }
                    DecisionKind::Edit | DecisionKind::Custom(_) => {
                        let feedback = match decision.feedback {
                            Some(Value::String(text)) => text,
                            Some(other) => other.to_string(),
                            None => "Please revise the plan.".to_string(),
                        };
                        let update =
                            json!({ MESSAGES: [serde_json::to_value(Message::human(feedback))?] });
                        Ok(NodeOutcome::Command(
                            Command::new().with_update(update).with_goto(PLANNER),
                        ))
                    }
                }
            },
            vec![EXECUTOR.to_string(), PLANNER.to_string(), END.to_string()],
        );

        let concurrency = self.max_concurrency;
        graph.add_node(EXECUTOR, move |ctx| {
            let researcher = researcher.clone();
            async move {
                let tasks: Vec<String> = ctx.state[PLAN]
                    .as_array()
                    .map(|plan| {
                        plan.iter()
                            .filter_map(Value::as_str)
                            .map(String::from)
                            .collect()
                    })
                    .unwrap_or_default();
                if tasks.is_empty() {
                    return Err(GraphError::execution("no approved plan to execute").into());
                }

                let out = fan_out(
                    researcher,
                    &tasks,
                    |task| json!({ "task": task }),
                    concurrency,
                )
                .await;

                let mut results = serde_json::Map::new();
                for (task, sub_state) in out.results {
                    let findings =
                        final_text(&sub_state).unwrap_or_else(|| "no findings".to_string());
                    results.insert(task, Value::String(findings));
                }
                Ok(NodeOutcome::Update(json!({
                    RAW_RESULTS: results,
                    TASK_ERRORS: out.errors,
                })))
            }
        });

        let summarize_model = self.model;
        graph.add_node_with_ends(
            SUMMARIZE,
            move |ctx| {
                let model = summarize_model.clone();
                async move {
                    let objective = ctx.state[OBJECTIVE].as_str().unwrap_or_default();
                    let mut digest = String::new();
                    if let Some(results) = ctx.state[RAW_RESULTS].as_object() {
                        for (task, findings) in results {
                            digest.push_str(&format!(
                                "## {task}\n{}\n\n",
                                findings.as_str().unwrap_or_default()
                            ));
                        }
                    }
                    if let Some(errors) = ctx.state[TASK_ERRORS].as_object() {
                        for (task, error) in errors {
                            digest.push_str(&format!(
                                "## {task} (failed)\n{}\n\n",
                                error.as_str().unwrap_or_default()
                            ));
                        }
                    }

                    let messages = vec![
                        Message::system(SUMMARIZE_PROMPT),
                        Message::human(format!("Objective: {objective}\n\nFindings:\n{digest}")),
                    ];
                    let mut tokens = model.stream(ChatRequest::new(messages)).await?;

                    let mut report = String::new();
                    while let Some(token) = tokens.next().await {
                        let token = token?;
                        ctx.emit_chunk(token.as_str()).await;
                        report.push_str(&token);
                    }

                    let note = serde_json::to_value(Message::assistant(report.clone()))?;
                    Ok(NodeOutcome::Command(
                        Command::new()
                            .with_update(json!({ FINAL_REPORT: report, MESSAGES: [note] }))
                            .with_goto(END),
                    ))
                }
            },
            vec![END.to_string()],
        );

        graph.add_edge(START, CLARIFY);
        graph.add_edge(PLANNER, APPROVAL);
        graph.add_edge(EXECUTOR, SUMMARIZE);

        let mut compiled = graph.compile()?.with_name("research_agent");
        if let Some(checkpointer) = self.checkpointer {
            compiled = compiled.with_checkpointer(checkpointer);
        }
        Ok(compiled)
    }
}

/// One human turn in the shape the agent state expects
pub fn user_turn(text: impl Into<String>) -> Result<Value, GraphError> {
    let messages = message_values(vec![Message::human(text.into())])?;
    Ok(json!({ MESSAGES: messages }))
}
