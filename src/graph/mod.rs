//! State graphs: nodes that update a shared state, joined by fixed and
//! conditional edges, optionally checkpointed per thread.

mod compiled;
mod mermaid;
mod node;
mod state_graph;

pub use compiled::CompiledGraph;
pub use mermaid::MERMAID_INK_URL;
pub use node::{Branch, FnNode, Node, Router};
pub use state_graph::{StateGraph, DEFAULT_RECURSION_LIMIT};

/// Virtual entry node.
pub const START: &str = "__start__";
/// Virtual exit node.
pub const END: &str = "__end__";
