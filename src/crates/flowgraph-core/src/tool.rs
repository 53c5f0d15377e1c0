//! Tool interface and registry
//!
//! [`Tool`] is the callable side of function calling: a name, a
//! description, a parameter schema, and an async `invoke`. The
//! [`ToolRegistry`] resolves a model's tool calls by name at runtime and
//! produces the [`ToolDefinition`]s bound onto model requests.
//!
//! Tool failures are [`GraphError::ExternalCall`](crate::error::GraphError);
//! whether a failure aborts the run or becomes a tool-result message
//! describing it is the invoking node's call.

use crate::error::Result;
use crate::llm::ToolDefinition;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// A callable tool exposed to models
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model uses to call this tool
    fn name(&self) -> &str;

    /// What the tool does, for the model's benefit
    fn description(&self) -> &str;

    /// JSON schema of the tool's arguments
    fn parameters(&self) -> Value {
        serde_json::json!({"type": "object", "properties": {}})
    }

    /// Execute the tool with the given arguments
    async fn invoke(&self, args: Value) -> Result<Value>;

    /// The definition bound onto model requests
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Registry resolving tools by name
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its own name
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Builder-style variant of [`register`](Self::register)
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    /// Look up a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Definitions of every registered tool
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|tool| tool.definition()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort();
        f.debug_struct("ToolRegistry").field("tools", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echoes its arguments"
        }

        async fn invoke(&self, args: Value) -> Result<Value> {
            Ok(args)
        }
    }

    #[tokio::test]
    async fn test_registry_lookup_and_invoke() {
        let registry = ToolRegistry::new().with_tool(Arc::new(EchoTool));

        assert_eq!(registry.len(), 1);
        assert!(registry.get("missing").is_none());

        let tool = registry.get("echo").unwrap();
        let result = tool.invoke(json!({"x": 1})).await.unwrap();
        assert_eq!(result, json!({"x": 1}));
    }

    #[test]
    fn test_definitions() {
        let registry = ToolRegistry::new().with_tool(Arc::new(EchoTool));
        let defs = registry.definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "echo");
    }
}
