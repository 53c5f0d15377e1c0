//! Core graph data structures
//!
//! A graph is a set of named nodes joined by edges. Execution enters at
//! [`START`], runs one node at a time, and terminates when control reaches
//! [`END`]. Two edge kinds cover routing:
//!
//! - [`Edge::Direct`] - unconditional transition to one node
//! - [`Edge::Conditional`] - a router function picks the successor from a
//!   declared allow-list using the current state
//!
//! Nodes that route themselves (by returning a
//! [`Command`](crate::command::Command) with `goto`) must declare the
//! targets they may name in [`NodeSpec::ends`]; the engine rejects routes
//! outside that list at runtime.
//!
//! Graphs are built through [`StateGraph`](crate::engine::StateGraph),
//! which validates the structure at compile time.

use crate::outcome::NodeOutcome;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Node identifier - unique name for each node in the graph
pub type NodeId = String;

/// Virtual node marking where execution begins
pub const START: &str = "__start__";

/// Virtual node marking successful termination
pub const END: &str = "__end__";

/// Error type node bodies may return; the engine wraps it with node context
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Async node body: current context in, [`NodeOutcome`] out
pub type NodeFn = Arc<
    dyn Fn(
            crate::engine::NodeContext,
        ) -> Pin<Box<dyn Future<Output = Result<NodeOutcome, BoxError>> + Send>>
        + Send
        + Sync,
>;

/// Router function for conditional edges
///
/// Receives the current state and returns the name of the next node. The
/// returned name must be in the edge's allow-list (which may include
/// [`END`]).
pub type RouterFn = Arc<dyn Fn(&Value) -> NodeId + Send + Sync>;

/// Edge type defining transitions between nodes
#[derive(Clone)]
pub enum Edge {
    /// Unconditional edge to a specific node
    Direct(NodeId),

    /// Conditional edge: the router picks one target from `allowed`
    Conditional {
        /// Router deciding the successor from the current state
        router: RouterFn,
        /// Every target the router may return; used for validation
        allowed: Vec<NodeId>,
    },
}

impl std::fmt::Debug for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Edge::Direct(node_id) => f.debug_tuple("Direct").field(node_id).finish(),
            Edge::Conditional { allowed, .. } => f
                .debug_struct("Conditional")
                .field("router", &"<function>")
                .field("allowed", allowed)
                .finish(),
        }
    }
}

/// Node specification: body plus its routing declarations
#[derive(Clone)]
pub struct NodeSpec {
    /// Node name; duplicated from the map key for logging
    pub name: String,

    /// Async body executed when the node runs
    pub body: NodeFn,

    /// Targets this node may name in an explicit `goto`
    ///
    /// Empty when the node only ever follows its outgoing edge.
    pub ends: Vec<NodeId>,
}

impl std::fmt::Debug for NodeSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeSpec")
            .field("name", &self.name)
            .field("body", &"<function>")
            .field("ends", &self.ends)
            .finish()
    }
}

/// Core graph structure containing nodes and edges
#[derive(Debug, Clone, Default)]
pub struct Graph {
    /// All nodes mapped by their unique IDs
    pub nodes: HashMap<NodeId, NodeSpec>,

    /// Outgoing edge per node (at most one; conditional edges branch inside)
    pub edges: HashMap<NodeId, Edge>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node to the graph
    pub fn add_node(&mut self, id: NodeId, spec: NodeSpec) {
        self.nodes.insert(id, spec);
    }

    /// Add a direct edge between two nodes
    pub fn add_edge(&mut self, from: NodeId, to: NodeId) {
        self.edges.insert(from, Edge::Direct(to));
    }

    /// Add a conditional edge with a router and its allow-list
    pub fn add_conditional_edge(&mut self, from: NodeId, router: RouterFn, allowed: Vec<NodeId>) {
        self.edges.insert(from, Edge::Conditional { router, allowed });
    }

    fn target_exists(&self, target: &str) -> bool {
        target == END || self.nodes.contains_key(target)
    }

    /// Validate the graph structure
    ///
    /// Checks that an entry edge exists, every referenced target exists (or
    /// is [`END`]), and every node has a way forward: an outgoing edge or a
    /// non-empty `ends` declaration. Nodes unreachable from [`START`] are
    /// logged at warn level but allowed; they may be entered directly as
    /// sub-graph entry points.
    pub fn validate(&self) -> Result<(), String> {
        if !self.edges.contains_key(START) {
            return Err(format!("no entry edge from {START}"));
        }

        for (from, edge) in &self.edges {
            if from != START && !self.nodes.contains_key(from) {
                return Err(format!("edge source '{from}' does not exist"));
            }

            match edge {
                Edge::Direct(to) => {
                    if !self.target_exists(to) {
                        return Err(format!("edge target '{to}' does not exist"));
                    }
                }
                Edge::Conditional { allowed, .. } => {
                    if allowed.is_empty() {
                        return Err(format!("conditional edge from '{from}' has an empty allow-list"));
                    }
                    for to in allowed {
                        if !self.target_exists(to) {
                            return Err(format!("allowed target '{to}' does not exist"));
                        }
                    }
                }
            }
        }

        for (id, spec) in &self.nodes {
            for end in &spec.ends {
                if !self.target_exists(end) {
                    return Err(format!("declared end '{end}' of node '{id}' does not exist"));
                }
            }
            if !self.edges.contains_key(id) && spec.ends.is_empty() {
                return Err(format!("node '{id}' has no outgoing edge and declares no ends"));
            }
        }

        for id in self.unreachable_nodes() {
            tracing::warn!(node = %id, "node is unreachable from the entry edge");
        }

        Ok(())
    }

    /// Nodes not reachable from [`START`] through edges or declared ends
    fn unreachable_nodes(&self) -> Vec<NodeId> {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        queue.push_back(START);

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }

            if let Some(edge) = self.edges.get(current) {
                match edge {
                    Edge::Direct(to) => queue.push_back(to),
                    Edge::Conditional { allowed, .. } => {
                        for to in allowed {
                            queue.push_back(to);
                        }
                    }
                }
            }
            if let Some(spec) = self.nodes.get(current) {
                for end in &spec.ends {
                    queue.push_back(end);
                }
            }
        }

        let mut unreachable: Vec<NodeId> = self
            .nodes
            .keys()
            .filter(|id| !visited.contains(id.as_str()))
            .cloned()
            .collect();
        unreachable.sort();
        unreachable
    }
}
