//! Small graph-based agents over hosted chat models.
//!
//! The crate provides:
//! - A language model abstraction (`LanguageModel`) with OpenAI, Azure OpenAI,
//!   Azure AI Inference and Perplexity clients.
//! - A tool interface (`Tool` and `ToolRegistry`) plus calculator and web search tools.
//! - A `StateGraph` that runs nodes over a shared state, with per-thread
//!   checkpoints (`MemorySaver`).
//! - Prebuilt model/tool nodes and the math, clipping and Perplexity agents.

pub mod agents;
mod checkpoint;
mod config;
mod error;
pub mod graph;
mod llm;
mod message;
mod prebuilt;
mod state;
pub mod telemetry;
mod tool;
pub mod tools;

pub use checkpoint::{Checkpoint, CheckpointSource, Checkpointer, MemorySaver, RunnableConfig};
pub use config::{AgentConfig, AppConfig, ModelConfig, ProviderConfig, TracingConfig};
pub use error::{AgentError, Result};
pub use graph::{
    Branch, CompiledGraph, FnNode, Node, Router, StateGraph, DEFAULT_RECURSION_LIMIT, END, START,
};
pub use llm::{
    build_model, AzureInferenceClient, AzureOpenAIClient, ChatStream, LanguageModel,
    ModelCompletion, OpenAIClient, StubModel, AZURE_INFERENCE_API_VERSION,
    AZURE_OPENAI_API_VERSION, OPENAI_BASE_URL, PERPLEXITY_BASE_URL,
};
pub use message::{add_messages, Message, Role, ToolCall, ToolResult};
pub use prebuilt::{
    create_react_agent, react_agent_graph, tools_condition, ModelNode, ToolNode, AGENT_NODE,
    TOOLS_NODE,
};
pub use state::{GraphState, HasMessages, MessagesState};
pub use tool::{Tool, ToolDescription, ToolRegistry};
