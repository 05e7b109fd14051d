use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};
use crate::tools::WebSearchConfig;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub api_version: Option<String>,
    /// Azure OpenAI deployment name; defaults to the model name.
    #[serde(default)]
    pub deployment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub openai: ProviderConfig,
    #[serde(default)]
    pub azure: ProviderConfig,
    #[serde(default)]
    pub azure_inference: ProviderConfig,
    #[serde(default)]
    pub perplexity: ProviderConfig,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: None,
            base_url: None,
            stream: false,
            timeout_secs: default_timeout_secs(),
            openai: ProviderConfig::default(),
            azure: ProviderConfig::default(),
            azure_inference: ProviderConfig::default(),
            perplexity: ProviderConfig::default(),
        }
    }
}

fn default_provider() -> String {
    "openai".into()
}

fn default_model() -> String {
    "gpt-4o-mini".into()
}

fn default_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TracingConfig {
    /// Project label attached to every graph run span.
    #[serde(default = "default_project")]
    pub project: String,
    #[serde(default = "default_filter")]
    pub filter: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            project: default_project(),
            filter: default_filter(),
            json: false,
        }
    }
}

fn default_project() -> String {
    "clipping-agents".into()
}

fn default_filter() -> String {
    "info".into()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    #[serde(default = "default_recursion_limit")]
    pub recursion_limit: usize,
    #[serde(default = "default_thread_id")]
    pub thread_id: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            recursion_limit: default_recursion_limit(),
            thread_id: default_thread_id(),
        }
    }
}

fn default_recursion_limit() -> usize {
    25
}

fn default_thread_id() -> String {
    "1".into()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub search: WebSearchConfig,
    #[serde(default)]
    pub tracing: TracingConfig,
    #[serde(default)]
    pub agent: AgentConfig,
}

impl AppConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let cfg: Self = toml::from_str(&raw)
            .map_err(|err| AgentError::Config(format!("Failed to parse configuration: {err}")))?;
        Ok(cfg)
    }

    pub fn from_env_or_file(path: impl AsRef<Path>) -> Result<Self> {
        let mut cfg = Self::from_file(path)?;
        cfg.apply_overrides(|key| env::var(key).ok());
        Ok(cfg)
    }

    /// Defaults plus environment overrides, for runs without a config file.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.apply_overrides(|key| env::var(key).ok());
        cfg
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(provider) = lookup("AGENT_MODEL_PROVIDER") {
            self.model.provider = provider.to_ascii_lowercase();
        }
        if let Some(model) = lookup("AGENT_MODEL") {
            self.model.model = model;
        }
        if let Some(stream) = lookup("AGENT_STREAMING") {
            if let Ok(parsed) = stream.parse::<bool>() {
                self.model.stream = parsed;
            }
        }
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.model.openai.api_key = Some(key);
        }
        if let Some(endpoint) = lookup("OPENAI_BASE_URL") {
            self.model.openai.endpoint = Some(endpoint);
        }
        if let Some(org) = lookup("OPENAI_ORG") {
            self.model.openai.organization = Some(org);
        }
        if let Some(key) = lookup("AZURE_OPENAI_API_KEY") {
            self.model.azure.api_key = Some(key);
        }
        if let Some(account) = lookup("AZURE_OPENAI_ACCOUNT") {
            self.model.azure.endpoint = Some(account);
        }
        if let Some(version) = lookup("AZURE_OPENAI_API_VERSION") {
            self.model.azure.api_version = Some(version);
        }
        if let Some(endpoint) = lookup("AZURE_INFERENCE_ENDPOINT") {
            self.model.azure_inference.endpoint = Some(endpoint);
        }
        if let Some(key) = lookup("AZURE_INFERENCE_API_KEY") {
            self.model.azure_inference.api_key = Some(key);
        }
        if let Some(key) = lookup("PERPLEXITY_API_KEY") {
            self.model.perplexity.api_key = Some(key);
        }
        if let Some(key) = lookup("TAVILY_API_KEY") {
            self.search.api_key = Some(key);
        }
        if let Some(project) = lookup("LANGSMITH_PROJECT") {
            self.tracing.project = project;
        }
        if let Some(filter) = lookup("AGENT_LOG") {
            self.tracing.filter = filter;
        }
        if let Some(limit) = lookup("AGENT_RECURSION_LIMIT") {
            if let Ok(parsed) = limit.parse::<usize>() {
                self.agent.recursion_limit = parsed.max(1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn loads_partial_file_with_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[model]\nprovider='azure'\nmodel='gpt-4o-mini'\n[model.azure]\nendpoint='https://acct.openai.azure.com'\n[search]\nmax_results=3"
        )
        .unwrap();

        let cfg = AppConfig::from_file(file.path()).unwrap();

        assert_eq!(cfg.model.provider, "azure");
        assert_eq!(
            cfg.model.azure.endpoint.as_deref(),
            Some("https://acct.openai.azure.com")
        );
        assert_eq!(cfg.search.max_results, 3);
        assert_eq!(cfg.agent.recursion_limit, 25);
        assert_eq!(cfg.tracing.filter, "info");
    }

    #[test]
    fn applies_environment_overrides() {
        let vars: HashMap<&str, &str> = [
            ("AGENT_MODEL_PROVIDER", "Perplexity"),
            ("PERPLEXITY_API_KEY", "pplx-key"),
            ("TAVILY_API_KEY", "tvly-key"),
            ("LANGSMITH_PROJECT", "memory agent test"),
            ("AGENT_RECURSION_LIMIT", "0"),
        ]
        .into_iter()
        .collect();

        let mut cfg = AppConfig::default();
        cfg.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(cfg.model.provider, "perplexity");
        assert_eq!(cfg.model.perplexity.api_key.as_deref(), Some("pplx-key"));
        assert_eq!(cfg.search.api_key.as_deref(), Some("tvly-key"));
        assert_eq!(cfg.tracing.project, "memory agent test");
        assert_eq!(cfg.agent.recursion_limit, 1);
    }

    #[test]
    fn rejects_malformed_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[model\nprovider=").unwrap();
        let err = AppConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, AgentError::Config(_)));
    }
}
