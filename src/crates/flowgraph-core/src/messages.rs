//! Message types for conversational graph state
//!
//! [`Message`] is the unit of conversation history: role, content, and for
//! assistant messages the tool calls they requested. Messages serialize to
//! plain JSON, so they live directly inside graph state under an
//! append-style field.
//!
//! [`add_messages`] is the merge policy for message lists: append, but
//! replace in place when an incoming message carries the ID of an existing
//! one. [`MessagesReducer`] exposes the same policy as a
//! [`Reducer`](crate::state::Reducer) for use in a
//! [`StateSchema`](crate::state::StateSchema).
//!
//! # Examples
//!
//! ```rust
//! use flowgraph_core::messages::{add_messages, Message};
//!
//! let history = vec![Message::human("What is Rust?")];
//! let update = vec![Message::assistant("A systems programming language.")];
//!
//! let merged = add_messages(history, update);
//! assert_eq!(merged.len(), 2);
//! ```

use crate::state::{Reducer, StateError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Role of the message sender
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System message providing instructions or constraints
    System,
    /// Human/user input
    Human,
    /// Model-generated response
    Assistant,
    /// Tool execution result
    Tool,
}

/// Message content - plain text or structured JSON
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    /// Simple text content
    Text(String),
    /// Structured content (parsed model output, rich tool results)
    Structured(Value),
}

impl MessageContent {
    /// Get the text if this is text content
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(text) => Some(text),
            MessageContent::Structured(_) => None,
        }
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        MessageContent::Text(text.to_string())
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        MessageContent::Text(text)
    }
}

impl From<Value> for MessageContent {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => MessageContent::Text(text),
            other => MessageContent::Structured(other),
        }
    }
}

/// A tool invocation requested by an assistant message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    /// Unique ID correlating the call with its tool result message
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Arguments for the tool
    pub args: Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, args: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            args,
        }
    }
}

/// A single message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Unique identifier for this message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Role of the message sender
    pub role: MessageRole,

    /// Message content
    pub content: MessageContent,

    /// Optional sender name (originating node, agent label)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Tool calls (for assistant messages)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,

    /// Tool call ID (for tool messages)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Additional metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl Message {
    fn with_role(role: MessageRole, content: impl Into<MessageContent>) -> Self {
        Self {
            id: Some(Uuid::new_v4().to_string()),
            role,
            content: content.into(),
            name: None,
            tool_calls: None,
            tool_call_id: None,
            metadata: None,
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<MessageContent>) -> Self {
        Self::with_role(MessageRole::System, content)
    }

    /// Create a human message
    pub fn human(content: impl Into<MessageContent>) -> Self {
        Self::with_role(MessageRole::Human, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<MessageContent>) -> Self {
        Self::with_role(MessageRole::Assistant, content)
    }

    /// Create a tool result message correlated to a tool call
    pub fn tool(content: impl Into<MessageContent>, tool_call_id: impl Into<String>) -> Self {
        let mut message = Self::with_role(MessageRole::Tool, content);
        message.tool_call_id = Some(tool_call_id.into());
        message
    }

    /// Set the message ID
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the sender name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set tool calls (assistant messages)
    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = Some(tool_calls);
        self
    }

    /// Set metadata
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Get the text content, if any
    pub fn text(&self) -> Option<&str> {
        self.content.as_text()
    }

    /// Append a text fragment to this message's content in place
    ///
    /// Structured content is left untouched.
    pub fn append_text(&mut self, delta: &str) {
        if let MessageContent::Text(text) = &mut self.content {
            text.push_str(delta);
        }
    }

    /// Whether this message requests any tool calls
    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls
            .as_ref()
            .map(|calls| !calls.is_empty())
            .unwrap_or(false)
    }
}

/// Merge two message lists: append, replacing entries whose ID matches
///
/// Messages in `right` with an ID already present in `left` replace the
/// existing message in place (same position); all others are appended in
/// order. This lets a node edit a prior message (a human correcting a plan,
/// a model revising its own turn) without duplicating it.
pub fn add_messages(left: Vec<Message>, right: Vec<Message>) -> Vec<Message> {
    let mut merged = left;
    for message in right {
        let existing = message.id.as_ref().and_then(|id| {
            merged
                .iter()
                .position(|m| m.id.as_deref() == Some(id.as_str()))
        });
        match existing {
            Some(index) => merged[index] = message,
            None => merged.push(message),
        }
    }
    merged
}

/// Reducer applying [`add_messages`] semantics at the JSON level
///
/// Works directly on JSON arrays so state can hold messages produced by any
/// serializer. Items with an `id` string matching an existing item replace
/// it in place; everything else appends.
#[derive(Debug, Clone)]
pub struct MessagesReducer;

fn message_id(value: &Value) -> Option<&str> {
    value.get("id").and_then(Value::as_str)
}

impl Reducer for MessagesReducer {
    fn reduce(&self, current: &Value, update: &Value) -> crate::state::Result<Value> {
        let current_items = match current {
            Value::Array(items) => items.clone(),
            Value::Null => Vec::new(),
            _ => {
                return Err(StateError::ReducerError(
                    "messages reducer requires array values".to_string(),
                ))
            }
        };

        let update_items = match update {
            Value::Array(items) => items.clone(),
            Value::Null => Vec::new(),
            single => vec![single.clone()],
        };

        let mut merged = current_items;
        for item in update_items {
            let existing = message_id(&item)
                .and_then(|id| merged.iter().position(|m| message_id(m) == Some(id)));
            match existing {
                Some(index) => merged[index] = item,
                None => merged.push(item),
            }
        }

        Ok(Value::Array(merged))
    }

    fn name(&self) -> &str {
        "messages"
    }
}
