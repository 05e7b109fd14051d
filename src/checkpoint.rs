//! Per-thread checkpoints of graph state.
//!
//! A compiled graph with a checkpointer saves the state after the input is
//! applied and after every node, keyed by the run's `thread_id`. The next
//! invoke on the same thread resumes from the latest checkpoint.

use std::collections::HashMap;
use std::time::SystemTime;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{AgentError, Result};
use crate::state::GraphState;

/// Per-invoke settings: which thread to resume and how far a run may go.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunnableConfig {
    pub thread_id: Option<String>,
    /// Resume from this checkpoint instead of the latest one.
    pub checkpoint_id: Option<String>,
    /// Overrides the graph's recursion limit for this run.
    pub recursion_limit: Option<usize>,
}

impl RunnableConfig {
    pub fn thread(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: Some(thread_id.into()),
            ..Self::default()
        }
    }

    pub fn with_checkpoint(mut self, checkpoint_id: impl Into<String>) -> Self {
        self.checkpoint_id = Some(checkpoint_id.into());
        self
    }

    pub fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = Some(limit);
        self
    }

    pub(crate) fn require_thread(&self) -> Result<&str> {
        self.thread_id
            .as_deref()
            .ok_or_else(|| AgentError::Checkpoint("thread_id required when a checkpointer is set".into()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointSource {
    /// Saved right after the invoke input was applied.
    Input,
    /// Saved after a node ran.
    Loop,
}

#[derive(Debug, Clone)]
pub struct Checkpoint<S> {
    pub id: String,
    pub thread_id: String,
    /// Node executions since the input of the run that produced this checkpoint.
    pub step: usize,
    pub source: CheckpointSource,
    /// Node that produced this state, if any.
    pub node: Option<String>,
    /// Nodes scheduled to run next; empty when the run finished.
    pub next: Vec<String>,
    pub state: S,
    pub created_at: SystemTime,
}

impl<S> Checkpoint<S> {
    pub fn new(
        thread_id: impl Into<String>,
        state: S,
        source: CheckpointSource,
        step: usize,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            thread_id: thread_id.into(),
            step,
            source,
            node: None,
            next: Vec::new(),
            state,
            created_at: SystemTime::now(),
        }
    }

    pub fn with_node(mut self, node: impl Into<String>) -> Self {
        self.node = Some(node.into());
        self
    }

    pub fn with_next(mut self, next: Option<String>) -> Self {
        self.next = next.into_iter().collect();
        self
    }
}

/// Saves and loads checkpoints by thread id.
#[async_trait]
pub trait Checkpointer<S>: Send + Sync
where
    S: GraphState,
{
    /// Persist a checkpoint; returns its id.
    async fn put(&self, checkpoint: Checkpoint<S>) -> Result<String>;

    /// Latest checkpoint of the thread, or the one named by `config.checkpoint_id`.
    async fn get(&self, config: &RunnableConfig) -> Result<Option<Checkpoint<S>>>;

    /// All checkpoints of the thread, newest first.
    async fn list(&self, config: &RunnableConfig) -> Result<Vec<Checkpoint<S>>>;
}

/// In-process checkpointer; state lives as long as the saver does.
pub struct MemorySaver<S> {
    threads: RwLock<HashMap<String, Vec<Checkpoint<S>>>>,
}

impl<S> Default for MemorySaver<S> {
    fn default() -> Self {
        Self {
            threads: RwLock::new(HashMap::new()),
        }
    }
}

impl<S> MemorySaver<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn thread_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.threads.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn clear(&self, thread_id: &str) {
        self.threads.write().await.remove(thread_id);
    }
}

#[async_trait]
impl<S> Checkpointer<S> for MemorySaver<S>
where
    S: GraphState,
{
    async fn put(&self, checkpoint: Checkpoint<S>) -> Result<String> {
        let id = checkpoint.id.clone();
        self.threads
            .write()
            .await
            .entry(checkpoint.thread_id.clone())
            .or_default()
            .push(checkpoint);
        Ok(id)
    }

    async fn get(&self, config: &RunnableConfig) -> Result<Option<Checkpoint<S>>> {
        let thread_id = config.require_thread()?;
        let threads = self.threads.read().await;
        let Some(history) = threads.get(thread_id) else {
            return match &config.checkpoint_id {
                Some(id) => Err(AgentError::Checkpoint(format!(
                    "checkpoint `{id}` not found for thread `{thread_id}`"
                ))),
                None => Ok(None),
            };
        };
        match &config.checkpoint_id {
            Some(id) => history
                .iter()
                .find(|checkpoint| &checkpoint.id == id)
                .cloned()
                .map(Some)
                .ok_or_else(|| {
                    AgentError::Checkpoint(format!(
                        "checkpoint `{id}` not found for thread `{thread_id}`"
                    ))
                }),
            None => Ok(history.last().cloned()),
        }
    }

    async fn list(&self, config: &RunnableConfig) -> Result<Vec<Checkpoint<S>>> {
        let thread_id = config.require_thread()?;
        Ok(self
            .threads
            .read()
            .await
            .get(thread_id)
            .map(|history| history.iter().rev().cloned().collect())
            .unwrap_or_default())
    }
}
