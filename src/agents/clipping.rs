//! Clipping agent: turns a question into a search query, searches the web
//! and summarizes what it found.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::checkpoint::RunnableConfig;
use crate::config::AppConfig;
use crate::error::Result;
use crate::graph::{CompiledGraph, Node, StateGraph, END, START};
use crate::llm::{build_model, LanguageModel};
use crate::message::{add_messages, Message};
use crate::prebuilt::{tools_condition, ModelNode, ToolNode, TOOLS_NODE};
use crate::state::{GraphState, HasMessages};
use crate::tool::ToolRegistry;
use crate::tools::web_search_toolkit;

pub const PROMPT_ENGINEER: &str = "You are a prompt engineer. You will be given a question and you need format it to be used in a search engine.";

pub const CLIPPING_SYSTEM_PROMPT: &str = "You are a clipping agent. You will be given a question and you need to search the web and summarize the results.";

pub const QUERY_WRITER_NODE: &str = "query_writer";
pub const SEARCH_AGENT_NODE: &str = "search_agent";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClippingState {
    /// The user's question.
    pub prompt: String,
    /// Search-engine query derived from `prompt`.
    pub query: String,
    /// Final summary.
    pub response: String,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Default)]
pub struct ClippingUpdate {
    pub prompt: Option<String>,
    pub query: Option<String>,
    pub response: Option<String>,
    pub messages: Vec<Message>,
}

impl ClippingUpdate {
    pub fn prompt(prompt: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
            ..Self::default()
        }
    }

    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }
}

impl GraphState for ClippingState {
    type Update = ClippingUpdate;

    fn apply(&mut self, update: ClippingUpdate) {
        if let Some(prompt) = update.prompt {
            self.prompt = prompt;
        }
        if let Some(query) = update.query {
            self.query = query;
        }
        if let Some(response) = update.response {
            self.response = response;
        }
        add_messages(&mut self.messages, update.messages);
    }
}

impl HasMessages for ClippingState {
    fn messages(&self) -> &[Message] {
        &self.messages
    }

    fn messages_update(messages: Vec<Message>) -> ClippingUpdate {
        ClippingUpdate::default().with_messages(messages)
    }
}

/// Rewrite `question` as a search-engine query. An empty answer falls back to
/// the question itself.
pub async fn search_instructions(model: &dyn LanguageModel, question: &str) -> Result<String> {
    let prompt = [Message::system(PROMPT_ENGINEER), Message::user(question)];
    let completion = model.complete_chat(&prompt, &[], false).await?;
    let query = completion.content.unwrap_or_default().trim().to_string();
    if query.is_empty() {
        tracing::warn!("query writer returned nothing; searching the raw question");
        return Ok(question.to_string());
    }
    Ok(query)
}

struct QueryWriter {
    model: Arc<dyn LanguageModel>,
}

#[async_trait]
impl Node<ClippingState> for QueryWriter {
    async fn run(&self, state: &ClippingState) -> Result<ClippingUpdate> {
        let query = search_instructions(self.model.as_ref(), &state.prompt).await?;
        tracing::info!(%query, "search query written");
        Ok(ClippingUpdate {
            messages: vec![Message::user(query.clone())],
            query: Some(query),
            ..ClippingUpdate::default()
        })
    }
}

/// Model turn that records its final answer as the response.
struct SearchAgent {
    inner: ModelNode,
}

#[async_trait]
impl Node<ClippingState> for SearchAgent {
    async fn run(&self, state: &ClippingState) -> Result<ClippingUpdate> {
        let reply = self.inner.complete(&state.messages).await?;
        let response = (!reply.has_tool_calls()).then(|| reply.content.clone());
        Ok(ClippingUpdate {
            response,
            messages: vec![reply],
            ..ClippingUpdate::default()
        })
    }
}

/// `query_writer → search_agent ⇄ tools`. `stream` applies to the search
/// agent's turns.
pub fn clipping_agent_graph(
    model: Arc<dyn LanguageModel>,
    tools: ToolRegistry,
    stream: bool,
) -> StateGraph<ClippingState> {
    let search_agent = SearchAgent {
        inner: ModelNode::new(model.clone())
            .with_system_prompt(CLIPPING_SYSTEM_PROMPT)
            .with_tools(&tools)
            .with_streaming(stream),
    };

    let mut graph = StateGraph::new().with_name("clipping_agent");
    graph
        .add_node(QUERY_WRITER_NODE, QueryWriter { model })
        .add_node(SEARCH_AGENT_NODE, search_agent)
        .add_node(TOOLS_NODE, ToolNode::new(tools))
        .add_edge(START, QUERY_WRITER_NODE)
        .add_edge(QUERY_WRITER_NODE, SEARCH_AGENT_NODE)
        .add_conditional_edges(SEARCH_AGENT_NODE, tools_condition())
        .add_edge(TOOLS_NODE, SEARCH_AGENT_NODE)
        .add_edge(SEARCH_AGENT_NODE, END);
    graph
}

pub struct ClippingAgent {
    graph: CompiledGraph<ClippingState>,
    recursion_limit: Option<usize>,
}

impl ClippingAgent {
    pub fn new(model: Arc<dyn LanguageModel>, tools: ToolRegistry) -> Result<Self> {
        Self::new_with_streaming(model, tools, false)
    }

    pub fn new_with_streaming(
        model: Arc<dyn LanguageModel>,
        tools: ToolRegistry,
        stream: bool,
    ) -> Result<Self> {
        Ok(Self {
            graph: clipping_agent_graph(model, tools, stream).compile()?,
            recursion_limit: None,
        })
    }

    /// Model from `cfg.model`, Tavily search from `cfg.search`; runs are
    /// traced under `cfg.tracing.project`.
    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        let model = build_model(&cfg.model)?;
        let tools = web_search_toolkit(&cfg.search)?;
        Ok(Self::new_with_streaming(model, tools, cfg.model.stream)?
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

    pub async fn run(&self, question: impl Into<String>) -> Result<ClippingState> {
        let mut config = RunnableConfig::default();
        if let Some(limit) = self.recursion_limit {
            config = config.with_recursion_limit(limit);
        }
        self.graph
            .invoke(ClippingUpdate::prompt(question), &config)
            .await
    }

    pub fn graph(&self) -> &CompiledGraph<ClippingState> {
        &self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    use crate::llm::StubModel;
    use crate::message::Role;
    use crate::tool::Tool;

    struct FakeSearch;

    #[async_trait]
    impl Tool for FakeSearch {
        fn name(&self) -> &str {
            "web_search"
        }

        fn description(&self) -> &str {
            "Search the web for a query."
        }

        async fn call(&self, input: Value) -> Result<Value> {
            Ok(json!({
                "query": input["query"],
                "results": [{"title": "Brasília", "url": "https://example.com", "content": "Capital do Brasil"}],
            }))
        }
    }

    fn fake_tools() -> ToolRegistry {
        let mut tools = ToolRegistry::new();
        tools.register(FakeSearch);
        tools
    }

    #[tokio::test]
    async fn writes_query_searches_and_summarizes() {
        let model = StubModel::new(vec![
            "capital do Brasil".into(),
            r#"{"action":"call_tool","name":"web_search","arguments":{"query":"capital do Brasil"}}"#
                .into(),
            "A capital do Brasil é Brasília.".into(),
        ]);
        let agent = ClippingAgent::new(model.clone(), fake_tools()).unwrap();

        let state = agent.run("Qual é a capital do Brasil?").await.unwrap();

        assert_eq!(state.prompt, "Qual é a capital do Brasil?");
        assert_eq!(state.query, "capital do Brasil");
        assert_eq!(state.response, "A capital do Brasil é Brasília.");
        let roles: Vec<Role> = state.messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::User, Role::Assistant, Role::Tool, Role::Assistant]
        );
        assert!(state.messages[2].content.contains("Brasília"));
        assert_eq!(model.remaining(), 0);
    }

    #[tokio::test]
    async fn blank_query_falls_back_to_question() {
        let model = StubModel::new(vec!["   ".into()]);
        let query = search_instructions(model.as_ref(), "Paraná Clube").await.unwrap();
        assert_eq!(query, "Paraná Clube");
    }

    #[test]
    fn graph_has_three_nodes() {
        let agent = ClippingAgent::new(StubModel::new(Vec::new()), fake_tools()).unwrap();
        assert_eq!(
            agent.graph().node_names(),
            &["query_writer".to_string(), "search_agent".into(), "tools".into()]
        );
    }
}
