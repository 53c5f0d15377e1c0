//! # flowgraph-agents
//!
//! Prebuilt agent graphs on top of `flowgraph-core`. The headline graph is
//! the deep-research agent: clarify the request, draft a plan, gate it on
//! human approval, fan the approved tasks out across tool-using researcher
//! sub-graphs, and stream a final report.
//!
//! Everything is wired through [`ResearchAgentBuilder`]; the researcher
//! sub-graph is also exported standalone via [`build_researcher`] for
//! callers composing their own topologies.

pub mod builder;
pub mod researcher;
pub mod schema;

pub use builder::{
    ResearchAgentBuilder, user_turn, APPROVAL, APPROVE_PLAN, CLARIFY, EXECUTOR, PLANNER, SUMMARIZE,
};
pub use researcher::{build_researcher, RESEARCHER, TOOLS};
pub use schema::{research_schema, researcher_schema};
