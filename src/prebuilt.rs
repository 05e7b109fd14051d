//! Ready-made nodes for the usual model ⇄ tools loop.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{AgentError, Result};
use crate::graph::{Branch, Node, StateGraph, END, START};
use crate::llm::LanguageModel;
use crate::message::Message;
use crate::state::{HasMessages, MessagesState};
use crate::tool::{ToolDescription, ToolRegistry};

pub const AGENT_NODE: &str = "assistant";
pub const TOOLS_NODE: &str = "tools";

/// Calls the model with the state's transcript and appends its reply.
pub struct ModelNode {
    model: Arc<dyn LanguageModel>,
    system_prompt: Option<String>,
    tools: Vec<ToolDescription>,
    stream: bool,
}

impl ModelNode {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            system_prompt: None,
            tools: Vec::new(),
            stream: false,
        }
    }

    /// Sent ahead of the transcript on every call; never stored in the state.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Advertise the registry's tools to the model.
    pub fn with_tools(mut self, tools: &ToolRegistry) -> Self {
        self.tools = tools.describe();
        self
    }

    pub fn with_streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn tools(&self) -> &[ToolDescription] {
        &self.tools
    }

    /// One model turn over `history`.
    pub async fn complete(&self, history: &[Message]) -> Result<Message> {
        let mut prompt = Vec::with_capacity(history.len() + 1);
        if let Some(system) = &self.system_prompt {
            prompt.push(Message::system(system.clone()));
        }
        prompt.extend(history.iter().cloned());

        let completion = self
            .model
            .complete_chat(&prompt, &self.tools, self.stream)
            .await?;
        let content = completion.content.unwrap_or_default();
        if completion.tool_calls.is_empty() {
            return Ok(Message::assistant(content));
        }

        let calls = completion
            .tool_calls
            .into_iter()
            .map(|mut call| {
                if call.id.is_none() {
                    call.id = Some(format!("call_{}", Uuid::new_v4().simple()));
                }
                call
            })
            .collect::<Vec<_>>();
        tracing::debug!(
            tools = ?calls.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            "model requested tool calls"
        );
        Ok(Message::assistant_with_tool_calls(content, calls))
    }
}

#[async_trait]
impl<S: HasMessages> Node<S> for ModelNode {
    async fn run(&self, state: &S) -> Result<S::Update> {
        let reply = self.complete(state.messages()).await?;
        Ok(S::messages_update(vec![reply]))
    }
}

/// Runs the tool calls of the last message, one tool message per call.
pub struct ToolNode {
    tools: ToolRegistry,
    handle_tool_errors: bool,
}

impl ToolNode {
    pub fn new(tools: ToolRegistry) -> Self {
        Self {
            tools,
            handle_tool_errors: true,
        }
    }

    /// When disabled, the first failing tool aborts the run.
    pub fn with_error_handling(mut self, enabled: bool) -> Self {
        self.handle_tool_errors = enabled;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.tools
    }

    pub async fn execute(&self, message: &Message) -> Result<Vec<Message>> {
        let mut results = Vec::with_capacity(message.tool_calls.len());
        for call in &message.tool_calls {
            tracing::debug!(tool = %call.name, "calling tool");
            match self.tools.call(&call.name, call.arguments.clone()).await {
                Ok(output) => results.push(Message::tool_result(call, output)),
                Err(err) if self.handle_tool_errors => {
                    tracing::warn!(tool = %call.name, error = %err, "tool failed");
                    results.push(Message::tool_error(
                        call,
                        format!("Error: {err}\n Please fix your mistakes."),
                    ));
                }
                Err(err) => return Err(err),
            }
        }
        Ok(results)
    }
}

#[async_trait]
impl<S: HasMessages> Node<S> for ToolNode {
    async fn run(&self, state: &S) -> Result<S::Update> {
        let last = state
            .last_message()
            .filter(|message| message.has_tool_calls())
            .ok_or_else(|| AgentError::Graph("tools node reached without pending tool calls".into()))?;
        let results = self.execute(last).await?;
        Ok(S::messages_update(results))
    }
}

/// Route to `tools` when the last message asks for tool calls, else finish.
pub fn tools_condition<S: HasMessages>() -> Branch<S> {
    Branch::new([TOOLS_NODE, END], |state: &S| {
        match state.last_message() {
            Some(message) if message.has_tool_calls() => TOOLS_NODE.to_string(),
            _ => END.to_string(),
        }
    })
}

/// `__start__ → assistant ⇄ tools`, uncompiled so the caller picks the
/// checkpointer.
pub fn create_react_agent(
    model: Arc<dyn LanguageModel>,
    tools: ToolRegistry,
    system_prompt: Option<&str>,
) -> StateGraph<MessagesState> {
    let mut agent = ModelNode::new(model);
    if let Some(prompt) = system_prompt {
        agent = agent.with_system_prompt(prompt);
    }
    react_agent_graph(agent, tools)
}

/// Same graph around a caller-configured model node; the node is bound to
/// `tools` here.
pub fn react_agent_graph(agent: ModelNode, tools: ToolRegistry) -> StateGraph<MessagesState> {
    let agent = agent.with_tools(&tools);
    let mut graph = StateGraph::new().with_name("react_agent");
    graph
        .add_node(AGENT_NODE, agent)
        .add_node(TOOLS_NODE, ToolNode::new(tools))
        .add_edge(START, AGENT_NODE)
        .add_conditional_edges(AGENT_NODE, tools_condition())
        .add_edge(TOOLS_NODE, AGENT_NODE);
    graph
}
