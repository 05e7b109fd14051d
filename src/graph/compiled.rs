//! Compiled graph: immutable structure that runs invocations.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::Instrument;

use crate::checkpoint::{Checkpoint, CheckpointSource, Checkpointer, RunnableConfig};
use crate::error::{AgentError, Result};
use crate::state::GraphState;

use super::node::{Branch, Node};
use super::{END, START};

pub(crate) enum Transition<S> {
    Static(String),
    Branch(Branch<S>),
}

/// Built by `StateGraph::compile`. Runs from `__start__`, one node at a time,
/// until a transition reaches `__end__` or a node has no successor.
pub struct CompiledGraph<S: GraphState> {
    pub(super) name: String,
    pub(super) project: Option<String>,
    pub(super) nodes: HashMap<String, Arc<dyn Node<S>>>,
    pub(super) order: Vec<String>,
    pub(super) transitions: HashMap<String, Transition<S>>,
    pub(super) checkpointer: Option<Arc<dyn Checkpointer<S>>>,
    pub(super) recursion_limit: usize,
}

impl<S: GraphState> CompiledGraph<S> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tracing project recorded on every run span.
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn project(&self) -> Option<&str> {
        self.project.as_deref()
    }

    /// Node names in registration order.
    pub fn node_names(&self) -> &[String] {
        &self.order
    }

    pub fn has_checkpointer(&self) -> bool {
        self.checkpointer.is_some()
    }

    /// Apply `input` to the thread's latest state (or a fresh one) and run the
    /// graph to completion. Returns the final state.
    pub async fn invoke(&self, input: S::Update, config: &RunnableConfig) -> Result<S> {
        let span = tracing::info_span!(
            "graph.invoke",
            graph = %self.name,
            project = self.project.as_deref().unwrap_or("-"),
            thread_id = config.thread_id.as_deref().unwrap_or("-"),
        );
        self.run(input, config).instrument(span).await
    }

    async fn run(&self, input: S::Update, config: &RunnableConfig) -> Result<S> {
        let mut state = match &self.checkpointer {
            Some(checkpointer) => {
                config.require_thread()?;
                checkpointer
                    .get(config)
                    .await?
                    .map(|checkpoint| checkpoint.state)
                    .unwrap_or_default()
            }
            None => S::default(),
        };
        state.apply(input);

        let mut current = self.successor(START, &state)?;
        self.save(config, &state, CheckpointSource::Input, 0, None, &current)
            .await?;

        let limit = config.recursion_limit.unwrap_or(self.recursion_limit);
        let mut steps = 0;
        while let Some(name) = current {
            if steps >= limit {
                tracing::warn!(limit, "recursion limit reached");
                return Err(AgentError::RecursionLimit(limit));
            }
            let node = self
                .nodes
                .get(&name)
                .ok_or_else(|| AgentError::Graph(format!("node `{name}` is not registered")))?;

            tracing::debug!(node = %name, step = steps, "running node");
            let update = node.run(&state).await?;
            state.apply(update);
            steps += 1;

            current = self.successor(&name, &state)?;
            self.save(config, &state, CheckpointSource::Loop, steps, Some(&name), &current)
                .await?;
        }

        tracing::debug!(steps, "graph finished");
        Ok(state)
    }

    /// Next node after `from`, or `None` when the run ends.
    fn successor(&self, from: &str, state: &S) -> Result<Option<String>> {
        let next = match self.transitions.get(from) {
            None => return Ok(None),
            Some(Transition::Static(to)) => to.clone(),
            Some(Transition::Branch(branch)) => {
                let route = branch.route(state);
                if !branch.destinations().iter().any(|dest| dest == &route) {
                    return Err(AgentError::InvalidRoute {
                        node: from.to_string(),
                        route,
                    });
                }
                route
            }
        };
        Ok(if next == END { None } else { Some(next) })
    }

    async fn save(
        &self,
        config: &RunnableConfig,
        state: &S,
        source: CheckpointSource,
        step: usize,
        node: Option<&str>,
        next: &Option<String>,
    ) -> Result<()> {
        let Some(checkpointer) = &self.checkpointer else {
            return Ok(());
        };
        let mut checkpoint = Checkpoint::new(config.require_thread()?, state.clone(), source, step)
            .with_next(next.clone());
        if let Some(node) = node {
            checkpoint = checkpoint.with_node(node);
        }
        checkpointer.put(checkpoint).await?;
        Ok(())
    }

    fn checkpointer(&self) -> Result<&Arc<dyn Checkpointer<S>>> {
        self.checkpointer
            .as_ref()
            .ok_or_else(|| AgentError::Checkpoint("graph was compiled without a checkpointer".into()))
    }

    /// Latest saved checkpoint of the thread.
    pub async fn get_state(&self, config: &RunnableConfig) -> Result<Option<Checkpoint<S>>> {
        self.checkpointer()?.get(config).await
    }

    /// Every saved checkpoint of the thread, newest first.
    pub async fn get_state_history(&self, config: &RunnableConfig) -> Result<Vec<Checkpoint<S>>> {
        self.checkpointer()?.list(config).await
    }

    /// Edges as `(from, to, conditional)` in drawing order.
    pub(crate) fn drawn_edges(&self) -> Vec<(String, String, bool)> {
        let mut edges = Vec::new();
        let sources = std::iter::once(START.to_string()).chain(self.order.iter().cloned());
        for source in sources {
            match self.transitions.get(&source) {
                Some(Transition::Static(to)) => edges.push((source.clone(), to.clone(), false)),
                Some(Transition::Branch(branch)) => {
                    let mut dests = branch.destinations().to_vec();
                    dests.sort();
                    dests.dedup();
                    for dest in dests {
                        edges.push((source.clone(), dest, true));
                    }
                }
                None if source != START => edges.push((source.clone(), END.to_string(), false)),
                None => {}
            }
        }
        edges
    }
}
