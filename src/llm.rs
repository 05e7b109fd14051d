//! Language model implementations and abstractions.
//!
//! Every hosted provider used here speaks the OpenAI chat-completions wire
//! format; they differ only in URL layout, auth header and whether the model
//! name travels in the body. `ChatEndpoint` holds that difference.

use std::collections::{BTreeMap, VecDeque};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::config::ModelConfig;
use crate::error::{AgentError, Result};
use crate::message::{Message, Role, ToolCall};
use crate::tool::ToolDescription;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const PERPLEXITY_BASE_URL: &str = "https://api.perplexity.ai";
pub const AZURE_OPENAI_API_VERSION: &str = "2024-12-01-preview";
pub const AZURE_INFERENCE_API_VERSION: &str = "2024-05-01-preview";

/// Result of a chat completion request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelCompletion {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

/// Content deltas of a streamed completion.
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Minimal abstraction around a chat completion provider.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete_chat(
        &self,
        messages: &[Message],
        tools: &[ToolDescription],
        stream: bool,
    ) -> Result<ModelCompletion>;
}

/// Build the provider named by `cfg.provider`.
pub fn build_model(cfg: &ModelConfig) -> Result<Arc<dyn LanguageModel>> {
    match cfg.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAIClient::from_config(cfg)?)),
        "perplexity" => Ok(Arc::new(OpenAIClient::perplexity_from_config(cfg)?)),
        "azure" => Ok(Arc::new(AzureOpenAIClient::from_config(cfg)?)),
        "azure_inference" => Ok(Arc::new(AzureInferenceClient::from_config(cfg)?)),
        "stub" => Ok(StubModel::new(Vec::new())),
        other => Err(AgentError::Config(format!(
            "unknown model provider `{other}`"
        ))),
    }
}

fn coalesce_error(status: reqwest::StatusCode, body: &str, provider: &str) -> AgentError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return AgentError::LanguageModel(format!("{provider} rate limit exceeded: {body}"));
    }
    AgentError::LanguageModel(format!("{provider} request failed with {status}: {body}"))
}

fn serialize_tool_arguments(args: &Value) -> String {
    serde_json::to_string(args).unwrap_or_else(|_| args.to_string())
}

fn parse_tool_arguments(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|err| AgentError::LanguageModel(format!("http client error: {err}")))
}

fn require_key(key: Option<String>, provider: &str) -> Result<String> {
    key.ok_or_else(|| AgentError::Config(format!("missing {provider} API key in model config")))
}

/// Where and how to send an OpenAI-format chat request.
#[derive(Clone)]
struct ChatEndpoint {
    http: reqwest::Client,
    provider: &'static str,
    url: String,
    headers: Vec<(&'static str, String)>,
    model: Option<String>,
}

impl ChatEndpoint {
    fn payload(&self, messages: &[Message], tools: &[ToolDescription], stream: bool) -> Value {
        let mut payload = json!({
            "messages": to_openai_messages(messages),
            "stream": stream,
        });
        if let Some(model) = &self.model {
            payload["model"] = Value::String(model.clone());
        }
        if let Some(tools) = to_openai_tools(tools) {
            payload["tools"] = serde_json::to_value(tools).unwrap_or(Value::Null);
            payload["tool_choice"] = Value::String("auto".into());
        }
        payload
    }

    async fn send(&self, payload: &Value) -> Result<reqwest::Response> {
        let mut builder = self.http.post(&self.url);
        for (name, value) in &self.headers {
            builder = builder.header(*name, value);
        }
        let resp = builder.json(payload).send().await.map_err(|err| {
            AgentError::LanguageModel(format!("{} request error: {err}", self.provider))
        })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(coalesce_error(status, &body, self.provider));
        }
        Ok(resp)
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDescription],
        stream: bool,
    ) -> Result<ModelCompletion> {
        tracing::debug!(
            provider = self.provider,
            messages = messages.len(),
            tools = tools.len(),
            stream,
            "requesting chat completion"
        );
        let resp = self.send(&self.payload(messages, tools, stream)).await?;
        if stream {
            return self.collect_stream(resp).await;
        }

        let body: OpenAiResponse = resp.json().await.map_err(|err| {
            AgentError::LanguageModel(format!("{} response parse error: {err}", self.provider))
        })?;

        let first = body.choices.into_iter().next().ok_or_else(|| {
            AgentError::LanguageModel(format!("{} returned no choices", self.provider))
        })?;

        let tool_calls = first
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| ToolCall {
                id: call.id,
                name: call.function.name,
                arguments: parse_tool_arguments(&call.function.arguments),
            })
            .collect();

        Ok(ModelCompletion {
            content: first.message.content.filter(|c| !c.is_empty()),
            tool_calls,
        })
    }

    async fn collect_stream(&self, resp: reqwest::Response) -> Result<ModelCompletion> {
        let mut content = String::new();
        let mut calls: BTreeMap<usize, ToolCallState> = BTreeMap::new();
        let mut decoder = SseDecoder::default();
        let mut bytes = resp.bytes_stream();

        'outer: while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(|err| {
                AgentError::LanguageModel(format!("{} stream error: {err}", self.provider))
            })?;
            for data in decoder.push(&chunk) {
                if data == "[DONE]" {
                    break 'outer;
                }
                let parsed = parse_stream_chunk(&data, self.provider)?;
                for choice in parsed.choices {
                    if let Some(delta) = choice.delta.content {
                        content.push_str(&delta);
                    }
                    for (position, delta) in
                        choice.delta.tool_calls.unwrap_or_default().into_iter().enumerate()
                    {
                        let state = calls.entry(delta.index.unwrap_or(position)).or_default();
                        if delta.id.is_some() {
                            state.id = delta.id;
                        }
                        if let Some(function) = delta.function {
                            if let Some(name) = function.name {
                                state.name = Some(name);
                            }
                            if let Some(args) = function.arguments {
                                state.arguments.push_str(&args);
                            }
                        }
                    }
                }
            }
        }

        let tool_calls = calls
            .into_values()
            .filter_map(|state| {
                let name = state.name?;
                Some(ToolCall {
                    id: state.id,
                    name,
                    arguments: parse_tool_arguments(&state.arguments),
                })
            })
            .collect();

        Ok(ModelCompletion {
            content: if content.is_empty() {
                None
            } else {
                Some(content)
            },
            tool_calls,
        })
    }

    async fn stream_content(&self, messages: &[Message]) -> Result<ChatStream> {
        let resp = self.send(&self.payload(messages, &[], true)).await?;
        let provider = self.provider;
        let (tx, rx) = mpsc::channel(64);

        tokio::spawn(async move {
            let mut decoder = SseDecoder::default();
            let mut bytes = resp.bytes_stream();
            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(err) => {
                        let _ = tx
                            .send(Err(AgentError::LanguageModel(format!(
                                "{provider} stream error: {err}"
                            ))))
                            .await;
                        return;
                    }
                };
                for data in decoder.push(&chunk) {
                    if data == "[DONE]" {
                        return;
                    }
                    let deltas = parse_stream_chunk(&data, provider).map(|parsed| {
                        parsed
                            .choices
                            .into_iter()
                            .filter_map(|choice| choice.delta.content)
                            .filter(|delta| !delta.is_empty())
                            .collect::<Vec<_>>()
                    });
                    match deltas {
                        Ok(deltas) => {
                            for delta in deltas {
                                if tx.send(Ok(delta)).await.is_err() {
                                    return;
                                }
                            }
                        }
                        Err(err) => {
                            let _ = tx.send(Err(err)).await;
                            return;
                        }
                    }
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

fn parse_stream_chunk(data: &str, provider: &str) -> Result<OpenAiStreamChunk> {
    serde_json::from_str(data).map_err(|err| {
        AgentError::LanguageModel(format!("{provider} stream parse error `{data}`: {err}"))
    })
}

/// Splits a server-sent-event byte stream into `data:` payloads, carrying
/// partial lines over to the next chunk.
///
/// Lines are split on raw bytes and decoded only once complete, so a
/// multibyte character cut by a chunk boundary survives.
#[derive(Default)]
struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim();
            if let Some(data) = line.strip_prefix("data:") {
                let data = data.trim();
                if !data.is_empty() {
                    payloads.push(data.to_string());
                }
            }
        }
        payloads
    }
}

fn to_openai_messages(messages: &[Message]) -> Vec<OpenAiMessage> {
    messages
        .iter()
        .map(|message| {
            let role = match message.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::Tool => "tool",
            }
            .to_string();

            let tool_calls = if message.tool_calls.is_empty() {
                None
            } else {
                Some(
                    message
                        .tool_calls
                        .iter()
                        .map(|call| OpenAiToolCall {
                            id: call.id.clone(),
                            r#type: "function".to_string(),
                            function: OpenAiFunctionCall {
                                name: call.name.clone(),
                                arguments: serialize_tool_arguments(&call.arguments),
                            },
                        })
                        .collect(),
                )
            };

            let content = if tool_calls.is_some() && message.content.is_empty() {
                None
            } else {
                Some(message.content.clone())
            };

            OpenAiMessage {
                role,
                content,
                tool_call_id: message
                    .tool_result
                    .as_ref()
                    .and_then(|result| result.tool_call_id.clone()),
                tool_calls,
            }
        })
        .collect()
}

fn to_openai_tools(tools: &[ToolDescription]) -> Option<Vec<OpenAiTool>> {
    if tools.is_empty() {
        return None;
    }

    Some(
        tools
            .iter()
            .map(|tool| OpenAiTool {
                r#type: "function".to_string(),
                function: OpenAiFunction {
                    name: tool.name.clone(),
                    description: Some(tool.description.clone()),
                    parameters: tool.parameters.clone(),
                },
            })
            .collect(),
    )
}

/// OpenAI chat completions, also used for OpenAI-compatible hosts such as Perplexity.
#[derive(Clone)]
pub struct OpenAIClient {
    endpoint: ChatEndpoint,
}

impl OpenAIClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::build(api_key.into(), OPENAI_BASE_URL, "gpt-4o-mini", None, 60, "openai")
    }

    /// Client for Perplexity's OpenAI-compatible API.
    pub fn perplexity(api_key: impl Into<String>) -> Result<Self> {
        Self::build(
            api_key.into(),
            PERPLEXITY_BASE_URL,
            "sonar-pro",
            None,
            60,
            "perplexity",
        )
    }

    pub fn from_config(cfg: &ModelConfig) -> Result<Self> {
        let api_key = require_key(
            cfg.openai.api_key.clone().or_else(|| cfg.api_key.clone()),
            "OpenAI",
        )?;
        let base_url = cfg
            .openai
            .endpoint
            .clone()
            .or_else(|| cfg.base_url.clone())
            .unwrap_or_else(|| OPENAI_BASE_URL.to_string());
        Self::build(
            api_key,
            &base_url,
            &cfg.model,
            cfg.openai.organization.clone(),
            cfg.timeout_secs,
            "openai",
        )
    }

    pub fn perplexity_from_config(cfg: &ModelConfig) -> Result<Self> {
        let api_key = require_key(
            cfg.perplexity.api_key.clone().or_else(|| cfg.api_key.clone()),
            "Perplexity",
        )?;
        let base_url = cfg
            .perplexity
            .endpoint
            .clone()
            .unwrap_or_else(|| PERPLEXITY_BASE_URL.to_string());
        Self::build(
            api_key,
            &base_url,
            &cfg.model,
            None,
            cfg.timeout_secs,
            "perplexity",
        )
    }

    fn build(
        api_key: String,
        base_url: &str,
        model: &str,
        organization: Option<String>,
        timeout_secs: u64,
        provider: &'static str,
    ) -> Result<Self> {
        let mut headers = vec![("authorization", format!("Bearer {api_key}"))];
        if let Some(org) = organization {
            headers.push(("openai-organization", org));
        }
        Ok(Self {
            endpoint: ChatEndpoint {
                http: http_client(timeout_secs)?,
                provider,
                url: format!("{}/chat/completions", base_url.trim_end_matches('/')),
                headers,
                model: Some(model.to_string()),
            },
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.endpoint.model = Some(model.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl AsRef<str>) -> Self {
        self.endpoint.url = format!(
            "{}/chat/completions",
            base_url.as_ref().trim_end_matches('/')
        );
        self
    }

    /// Stream the assistant's reply as it is generated.
    pub async fn stream_chat(&self, messages: &[Message]) -> Result<ChatStream> {
        self.endpoint.stream_content(messages).await
    }
}

#[async_trait]
impl LanguageModel for OpenAIClient {
    async fn complete_chat(
        &self,
        messages: &[Message],
        tools: &[ToolDescription],
        stream: bool,
    ) -> Result<ModelCompletion> {
        self.endpoint.complete(messages, tools, stream).await
    }
}

/// Azure OpenAI deployment (`{account}/openai/deployments/{deployment}`).
#[derive(Clone)]
pub struct AzureOpenAIClient {
    endpoint: ChatEndpoint,
}

impl AzureOpenAIClient {
    pub fn new(
        account: &str,
        deployment: &str,
        api_key: impl Into<String>,
        api_version: Option<&str>,
    ) -> Result<Self> {
        Self::build(account, deployment, api_key.into(), api_version, 60)
    }

    pub fn from_config(cfg: &ModelConfig) -> Result<Self> {
        let api_key = require_key(
            cfg.azure.api_key.clone().or_else(|| cfg.api_key.clone()),
            "Azure OpenAI",
        )?;
        let account = cfg
            .azure
            .endpoint
            .clone()
            .or_else(|| cfg.base_url.clone())
            .ok_or_else(|| {
                AgentError::Config("missing Azure OpenAI account endpoint in model config".into())
            })?;
        let deployment = cfg.azure.deployment.as_deref().unwrap_or(&cfg.model);
        Self::build(
            &account,
            deployment,
            api_key,
            cfg.azure.api_version.as_deref(),
            cfg.timeout_secs,
        )
    }

    fn build(
        account: &str,
        deployment: &str,
        api_key: String,
        api_version: Option<&str>,
        timeout_secs: u64,
    ) -> Result<Self> {
        let url = format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            account.trim_end_matches('/'),
            deployment,
            api_version.unwrap_or(AZURE_OPENAI_API_VERSION)
        );
        Ok(Self {
            endpoint: ChatEndpoint {
                http: http_client(timeout_secs)?,
                provider: "azure-openai",
                url,
                headers: vec![("api-key", api_key)],
                model: None,
            },
        })
    }
}

#[async_trait]
impl LanguageModel for AzureOpenAIClient {
    async fn complete_chat(
        &self,
        messages: &[Message],
        tools: &[ToolDescription],
        stream: bool,
    ) -> Result<ModelCompletion> {
        self.endpoint.complete(messages, tools, stream).await
    }
}

/// Azure AI Foundry model inference endpoint; the model is chosen in the body.
#[derive(Clone)]
pub struct AzureInferenceClient {
    endpoint: ChatEndpoint,
}

impl AzureInferenceClient {
    pub fn new(endpoint: &str, api_key: impl Into<String>, model: &str) -> Result<Self> {
        Self::build(endpoint, api_key.into(), model, None, 60)
    }

    pub fn from_config(cfg: &ModelConfig) -> Result<Self> {
        let api_key = require_key(
            cfg.azure_inference
                .api_key
                .clone()
                .or_else(|| cfg.api_key.clone()),
            "Azure AI inference",
        )?;
        let endpoint = cfg
            .azure_inference
            .endpoint
            .clone()
            .or_else(|| cfg.base_url.clone())
            .ok_or_else(|| {
                AgentError::Config("missing Azure AI inference endpoint in model config".into())
            })?;
        Self::build(
            &endpoint,
            api_key,
            &cfg.model,
            cfg.azure_inference.api_version.as_deref(),
            cfg.timeout_secs,
        )
    }

    fn build(
        endpoint: &str,
        api_key: String,
        model: &str,
        api_version: Option<&str>,
        timeout_secs: u64,
    ) -> Result<Self> {
        let url = format!(
            "{}/chat/completions?api-version={}",
            endpoint.trim_end_matches('/'),
            api_version.unwrap_or(AZURE_INFERENCE_API_VERSION)
        );
        Ok(Self {
            endpoint: ChatEndpoint {
                http: http_client(timeout_secs)?,
                provider: "azure-inference",
                url,
                headers: vec![("api-key", api_key)],
                model: Some(model.to_string()),
            },
        })
    }
}

#[async_trait]
impl LanguageModel for AzureInferenceClient {
    async fn complete_chat(
        &self,
        messages: &[Message],
        tools: &[ToolDescription],
        stream: bool,
    ) -> Result<ModelCompletion> {
        self.endpoint.complete(messages, tools, stream).await
    }
}

/// A deterministic model used for tests and demos.
///
/// Each scripted response is either a JSON directive (`respond`, `call_tool`,
/// `call_tools`) or plain text, which is returned as content.
pub struct StubModel {
    responses: Mutex<VecDeque<String>>,
}

impl StubModel {
    pub fn new(responses: Vec<String>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
        })
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().map(|r| r.len()).unwrap_or(0)
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum StubDirective {
    Respond { content: String },
    CallTool { name: String, arguments: Value },
    CallTools { calls: Vec<StubCall> },
}

#[derive(Debug, Deserialize)]
struct StubCall {
    name: String,
    arguments: Value,
}

#[async_trait]
impl LanguageModel for StubModel {
    async fn complete_chat(
        &self,
        _messages: &[Message],
        _tools: &[ToolDescription],
        _stream: bool,
    ) -> Result<ModelCompletion> {
        let raw = self
            .responses
            .lock()
            .map_err(|_| AgentError::LanguageModel("StubModel lock poisoned".into()))?
            .pop_front()
            .ok_or_else(|| {
                AgentError::LanguageModel("StubModel ran out of scripted responses".into())
            })?;

        match serde_json::from_str::<StubDirective>(&raw) {
            Ok(StubDirective::Respond { content }) => Ok(ModelCompletion {
                content: Some(content),
                tool_calls: Vec::new(),
            }),
            Ok(StubDirective::CallTool { name, arguments }) => Ok(ModelCompletion {
                content: None,
                tool_calls: vec![ToolCall {
                    id: None,
                    name,
                    arguments,
                }],
            }),
            Ok(StubDirective::CallTools { calls }) => Ok(ModelCompletion {
                content: None,
                tool_calls: calls
                    .into_iter()
                    .map(|call| ToolCall {
                        id: None,
                        name: call.name,
                        arguments: call.arguments,
                    })
                    .collect(),
            }),
            Err(_) => Ok(ModelCompletion {
                content: Some(raw),
                tool_calls: Vec::new(),
            }),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiToolCall {
    #[serde(default)]
    id: Option<String>,
    #[serde(default = "function_type")]
    r#type: String,
    function: OpenAiFunctionCall,
}

fn function_type() -> String {
    "function".into()
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiTool {
    r#type: String,
    function: OpenAiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiFunction {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

#[derive(Default)]
struct ToolCallState {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAiDeltaChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiDeltaChoice {
    delta: OpenAiDelta,
}

#[derive(Debug, Deserialize)]
struct OpenAiDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OpenAiToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
struct OpenAiToolCallDelta {
    #[serde(default)]
    index: Option<usize>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<OpenAiFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct OpenAiFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sse_decoder_carries_partial_lines() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"data: {\"a\"").is_empty());
        let payloads = decoder.push(b":1}\n\ndata: [DONE]\n");
        assert_eq!(payloads, vec!["{\"a\":1}".to_string(), "[DONE]".to_string()]);
    }

    #[test]
    fn sse_decoder_keeps_multibyte_characters_split_across_chunks() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"data: {\"c\":\"Paran\xC3").is_empty());
        let payloads = decoder.push(b"\xA1\"}\n\n");
        assert_eq!(payloads, vec!["{\"c\":\"Paraná\"}".to_string()]);
    }

    #[test]
    fn converts_tool_messages_to_openai_format() {
        let call = ToolCall {
            id: Some("call_1".into()),
            name: "add".into(),
            arguments: json!({"a": 3, "b": 4}),
        };
        let tool = Message::tool_result(&call, json!(7));
        let converted = to_openai_messages(&[
            Message::assistant_with_tool_calls("", vec![call]),
            tool,
        ]);

        assert_eq!(converted[0].role, "assistant");
        assert!(converted[0].content.is_none());
        let calls = converted[0].tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.arguments, r#"{"a":3,"b":4}"#);
        assert_eq!(converted[1].role, "tool");
        assert_eq!(converted[1].tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(converted[1].content.as_deref(), Some("7"));
    }

    #[test]
    fn unparseable_arguments_are_kept_as_string() {
        assert_eq!(parse_tool_arguments("{\"a\":1}"), json!({"a": 1}));
        assert_eq!(parse_tool_arguments("not json"), json!("not json"));
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let cfg = ModelConfig {
            provider: "nope".into(),
            ..ModelConfig::default()
        };
        assert!(matches!(build_model(&cfg), Err(AgentError::Config(_))));
    }

    #[test]
    fn missing_key_is_a_config_error() {
        let cfg = ModelConfig::default();
        assert!(matches!(
            OpenAIClient::from_config(&cfg),
            Err(AgentError::Config(_))
        ));
    }

    #[tokio::test]
    async fn stub_model_scripts_tool_calls() {
        let model = StubModel::new(vec![
            r#"{"action":"call_tools","calls":[{"name":"add","arguments":{"a":1,"b":2}},{"name":"multiply","arguments":{"a":2,"b":3}}]}"#.into(),
            "plain text".into(),
        ]);

        let first = model.complete_chat(&[], &[], false).await.unwrap();
        assert_eq!(first.tool_calls.len(), 2);
        assert_eq!(first.tool_calls[1].name, "multiply");

        let second = model.complete_chat(&[], &[], false).await.unwrap();
        assert_eq!(second.content.as_deref(), Some("plain text"));
        assert!(model.complete_chat(&[], &[], false).await.is_err());
    }
}
