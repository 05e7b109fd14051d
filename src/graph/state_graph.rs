//! Graph builder: register nodes and edges, then compile.

use std::collections::HashMap;
use std::sync::Arc;

use crate::checkpoint::Checkpointer;
use crate::error::{AgentError, Result};
use crate::state::GraphState;

use super::compiled::{CompiledGraph, Transition};
use super::node::{Branch, Node};
use super::{END, START};

pub const DEFAULT_RECURSION_LIMIT: usize = 25;

/// Mutable graph definition. Problems found while building are collected and
/// reported together by `compile`.
pub struct StateGraph<S: GraphState> {
    name: String,
    nodes: HashMap<String, Arc<dyn Node<S>>>,
    order: Vec<String>,
    edges: Vec<(String, String)>,
    branches: Vec<(String, Branch<S>)>,
    recursion_limit: usize,
    problems: Vec<String>,
}

impl<S: GraphState> Default for StateGraph<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: GraphState> StateGraph<S> {
    pub fn new() -> Self {
        Self {
            name: "graph".into(),
            nodes: HashMap::new(),
            order: Vec::new(),
            edges: Vec::new(),
            branches: Vec::new(),
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            problems: Vec::new(),
        }
    }

    /// Name used in log spans.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit.max(1);
        self
    }

    pub fn add_node<N>(&mut self, name: impl Into<String>, node: N) -> &mut Self
    where
        N: Node<S> + 'static,
    {
        self.add_shared_node(name, Arc::new(node))
    }

    pub fn add_shared_node(&mut self, name: impl Into<String>, node: Arc<dyn Node<S>>) -> &mut Self {
        let name = name.into();
        if name == START || name == END {
            self.problems
                .push(format!("`{name}` is reserved and cannot be used as a node name"));
        } else if self.nodes.contains_key(&name) {
            self.problems.push(format!("node `{name}` is already present"));
        } else {
            self.order.push(name.clone());
            self.nodes.insert(name, node);
        }
        self
    }

    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<String>) -> &mut Self {
        self.edges.push((from.into(), to.into()));
        self
    }

    pub fn add_conditional_edges(&mut self, from: impl Into<String>, branch: Branch<S>) -> &mut Self {
        self.branches.push((from.into(), branch));
        self
    }

    pub fn compile(self) -> Result<CompiledGraph<S>> {
        self.build(None)
    }

    pub fn compile_with_checkpointer(
        self,
        checkpointer: Arc<dyn Checkpointer<S>>,
    ) -> Result<CompiledGraph<S>> {
        self.build(Some(checkpointer))
    }

    fn is_source(&self, name: &str) -> bool {
        name == START || self.nodes.contains_key(name)
    }

    fn is_target(&self, name: &str) -> bool {
        name == END || self.nodes.contains_key(name)
    }

    fn build(self, checkpointer: Option<Arc<dyn Checkpointer<S>>>) -> Result<CompiledGraph<S>> {
        let mut problems = self.problems.clone();
        let mut transitions: HashMap<String, Transition<S>> = HashMap::new();

        for (from, branch) in &self.branches {
            if !self.is_source(from) {
                problems.push(format!("conditional edge starts at unknown node `{from}`"));
                continue;
            }
            if branch.destinations().is_empty() {
                problems.push(format!("conditional edge from `{from}` has no destinations"));
            }
            for dest in branch.destinations() {
                if !self.is_target(dest) {
                    problems.push(format!(
                        "conditional edge from `{from}` leads to unknown node `{dest}`"
                    ));
                }
            }
            if transitions
                .insert(from.clone(), Transition::Branch(branch.clone()))
                .is_some()
            {
                problems.push(format!("node `{from}` has more than one conditional edge"));
            }
        }

        for (from, to) in &self.edges {
            if !self.is_source(from) {
                problems.push(format!("edge starts at unknown node `{from}`"));
                continue;
            }
            if !self.is_target(to) {
                problems.push(format!("edge from `{from}` leads to unknown node `{to}`"));
                continue;
            }
            match transitions.get(from) {
                // The branch already decides when to stop.
                Some(Transition::Branch(_)) if to == END => {}
                Some(Transition::Branch(_)) => problems.push(format!(
                    "node `{from}` has both a conditional edge and an edge to `{to}`"
                )),
                Some(Transition::Static(existing)) if existing == to => {}
                Some(Transition::Static(existing)) => problems.push(format!(
                    "node `{from}` has edges to both `{existing}` and `{to}`"
                )),
                None => {
                    transitions.insert(from.clone(), Transition::Static(to.clone()));
                }
            }
        }

        if !transitions.contains_key(START) {
            problems.push(format!("graph must have an entrypoint: add an edge from `{START}`"));
        }

        if !problems.is_empty() {
            return Err(AgentError::Graph(problems.join("; ")));
        }

        Ok(CompiledGraph {
            name: self.name,
            project: None,
            nodes: self.nodes,
            order: self.order,
            transitions,
            checkpointer,
            recursion_limit: self.recursion_limit,
        })
    }
}
