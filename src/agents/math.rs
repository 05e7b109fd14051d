//! Arithmetic assistant that remembers earlier turns of a thread.

use std::sync::Arc;

use crate::checkpoint::{MemorySaver, RunnableConfig};
use crate::config::AppConfig;
use crate::error::Result;
use crate::graph::{CompiledGraph, StateGraph};
use crate::llm::{build_model, LanguageModel};
use crate::message::Message;
use crate::prebuilt::{react_agent_graph, ModelNode};
use crate::state::MessagesState;
use crate::tools::calculator_toolkit;

pub const MATH_SYSTEM_PROMPT: &str = "You are a mathematical assistant. You can use the tools to do math operations. You will response in brazilian portuguese.";

/// `assistant ⇄ tools` over the calculator toolkit.
pub fn math_agent_graph(model: Arc<dyn LanguageModel>, stream: bool) -> StateGraph<MessagesState> {
    let assistant = ModelNode::new(model)
        .with_system_prompt(MATH_SYSTEM_PROMPT)
        .with_streaming(stream);
    react_agent_graph(assistant, calculator_toolkit()).with_name("math_agent")
}

pub struct MathAgent {
    graph: CompiledGraph<MessagesState>,
    memory: Arc<MemorySaver<MessagesState>>,
    recursion_limit: Option<usize>,
}

impl MathAgent {
    pub fn new(model: Arc<dyn LanguageModel>) -> Result<Self> {
        Self::new_with_streaming(model, false)
    }

    /// `stream` asks the model for server-sent deltas on every turn.
    pub fn new_with_streaming(model: Arc<dyn LanguageModel>, stream: bool) -> Result<Self> {
        let memory: Arc<MemorySaver<MessagesState>> = Arc::new(MemorySaver::new());
        let graph = math_agent_graph(model, stream).compile_with_checkpointer(memory.clone())?;
        Ok(Self {
            graph,
            memory,
            recursion_limit: None,
        })
    }

    /// Model, streaming and recursion limit from `cfg.model` and `cfg.agent`;
    /// runs are traced under `cfg.tracing.project`.
    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        let model = build_model(&cfg.model)?;
        Ok(Self::new_with_streaming(model, cfg.model.stream)?
            .with_recursion_limit(cfg.agent.recursion_limit)
            .with_project(cfg.tracing.project.clone()))
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.graph = self.graph.with_project(project);
        self
    }

    pub fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = Some(limit);
        self
    }

    /// Send one user turn on `thread_id` and return the thread's full
    /// transcript after the run.
    pub async fn ask(&self, thread_id: &str, text: impl Into<String>) -> Result<MessagesState> {
        let mut config = RunnableConfig::thread(thread_id);
        if let Some(limit) = self.recursion_limit {
            config = config.with_recursion_limit(limit);
        }
        self.graph.invoke(vec![Message::user(text)], &config).await
    }

    pub fn graph(&self) -> &CompiledGraph<MessagesState> {
        &self.graph
    }

    pub fn memory(&self) -> &MemorySaver<MessagesState> {
        &self.memory
    }
}
