//! Chat model interface
//!
//! [`ChatModel`] is the seam between graph nodes and whatever LLM provider
//! the application wires in. Nodes depend on the trait only; providers
//! implement conversion, transport, and authentication behind it. Failures
//! surface as [`GraphError::ExternalCall`](crate::error::GraphError) to the
//! invoking node, which owns the retry/surface/abort policy.
//!
//! Two call shapes:
//!
//! - [`ChatModel::chat`] - one request, one complete [`ChatResponse`].
//!   When the request carries a `response_schema`, providers that support
//!   structured output populate [`ChatResponse::structured`] with the
//!   parsed value.
//! - [`ChatModel::stream`] - token-by-token [`TokenStream`]. The stream is
//!   finite and not restartable; each item is a `Result` so a mid-stream
//!   provider failure reaches the consumer instead of silently truncating
//!   the output.

use crate::error::Result;
use crate::messages::Message;
use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::pin::Pin;

/// Stream of generated token fragments
///
/// Finite; ends when generation completes. An `Err` item reports a
/// mid-stream provider failure, after which no further items arrive.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// A tool made available to the model for function calling
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    /// Tool name the model refers to in tool calls
    pub name: String,

    /// What the tool does, for the model's benefit
    pub description: String,

    /// JSON schema of the tool's arguments
    pub parameters: Value,
}

/// A chat completion request
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Conversation history, oldest first
    pub messages: Vec<Message>,

    /// Tools the model may call
    pub tools: Vec<ToolDefinition>,

    /// JSON schema the response must conform to, for structured output
    pub response_schema: Option<Value>,
}

impl ChatRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            tools: Vec::new(),
            response_schema: None,
        }
    }

    /// Bind tools onto this request
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    /// Request structured output conforming to the schema
    pub fn with_response_schema(mut self, schema: Value) -> Self {
        self.response_schema = Some(schema);
        self
    }
}

/// A complete chat response
#[derive(Debug, Clone)]
pub struct ChatResponse {
    /// The assistant message (text and/or tool calls)
    pub message: Message,

    /// Parsed structured output, when the request carried a schema
    pub structured: Option<Value>,
}

impl ChatResponse {
    pub fn new(message: Message) -> Self {
        Self {
            message,
            structured: None,
        }
    }

    /// Attach parsed structured output
    pub fn with_structured(mut self, structured: Value) -> Self {
        self.structured = Some(structured);
        self
    }
}

/// Provider-agnostic interface for chat-based language models
///
/// Implementations must be `Send + Sync`; share them across nodes as
/// `Arc<dyn ChatModel>`.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Generate a complete response
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse>;

    /// Stream a response token by token
    async fn stream(&self, request: ChatRequest) -> Result<TokenStream>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_builders() {
        let request = ChatRequest::new(vec![Message::human("hi")])
            .with_tools(vec![ToolDefinition {
                name: "search".to_string(),
                description: "Web search".to_string(),
                parameters: json!({"type": "object"}),
            }])
            .with_response_schema(json!({"type": "object"}));

        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.tools.len(), 1);
        assert!(request.response_schema.is_some());
    }

    #[test]
    fn test_response_builders() {
        let response =
            ChatResponse::new(Message::assistant("ok")).with_structured(json!({"is_vague": false}));
        assert_eq!(response.structured, Some(json!({"is_vague": false})));
    }
}
