//! Web search toolkit backed by the Tavily search API.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{AgentError, Result};
use crate::tool::{Tool, ToolRegistry};

pub const DEFAULT_TAVILY_URL: &str = "https://api.tavily.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchTopic {
    #[default]
    General,
    News,
    Finance,
}

/// One hit returned by the search engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub results: Vec<SearchResult>,
    #[serde(default)]
    pub response_time: Option<f64>,
}

/// Configuration for the web search tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebSearchConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default)]
    pub topic: SearchTopic,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            max_results: default_max_results(),
            topic: SearchTopic::General,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_TAVILY_URL.into()
}

fn default_max_results() -> usize {
    5
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Clone)]
pub struct TavilyClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    max_results: usize,
    topic: SearchTopic,
}

impl TavilyClient {
    pub fn from_config(cfg: &WebSearchConfig) -> Result<Self> {
        let api_key = cfg
            .api_key
            .clone()
            .ok_or_else(|| AgentError::Config("missing Tavily API key in search config".into()))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|err| AgentError::Search(format!("http client error: {err}")))?;
        Ok(Self {
            http,
            api_key,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            max_results: cfg.max_results,
            topic: cfg.topic,
        })
    }

    pub async fn search(&self, query: &str, max_results: Option<usize>) -> Result<SearchResponse> {
        let payload = json!({
            "query": query,
            "topic": self.topic,
            "max_results": max_results.unwrap_or(self.max_results),
        });

        tracing::debug!(query, "sending web search request");
        let resp = self
            .http
            .post(format!("{}/search", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|err| AgentError::Search(format!("Tavily request error: {err}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(AgentError::Search(format!(
                "Tavily request failed with {status}: {body}"
            )));
        }

        resp.json()
            .await
            .map_err(|err| AgentError::Search(format!("Tavily response parse error: {err}")))
    }
}

/// Create a toolkit holding the `web_search` tool.
pub fn web_search_toolkit(config: &WebSearchConfig) -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry.register(WebSearchTool {
        client: TavilyClient::from_config(config)?,
    });
    Ok(registry)
}

pub struct WebSearchTool {
    client: TavilyClient,
}

impl WebSearchTool {
    pub fn new(client: TavilyClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for a query."
    }

    fn parameters(&self) -> Option<Value> {
        Some(json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "The query to search for."},
                "max_results": {"type": "integer", "description": "Maximum number of results."},
            },
            "required": ["query"],
        }))
    }

    async fn call(&self, input: Value) -> Result<Value> {
        let query = input
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::Protocol("missing `query` for web_search".into()))?;
        let max_results = input
            .get("max_results")
            .and_then(Value::as_u64)
            .map(|n| n as usize);

        let response = self.client.search(query, max_results).await?;
        Ok(json!({ "query": response.query, "results": response.results }))
    }
}
