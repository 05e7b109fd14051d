//! Subscriber setup for the crate's `tracing` output.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::TracingConfig;
use crate::error::{AgentError, Result};

/// Install a global subscriber: `RUST_LOG` when set, otherwise
/// `config.filter`; JSON lines when `config.json` is on.
pub fn init_tracing(config: &TracingConfig) -> Result<()> {
    let filter = build_filter(std::env::var("RUST_LOG").ok(), &config.filter)?;

    let installed = if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().flatten_event(true))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .try_init()
    };
    installed.map_err(|err| AgentError::Config(format!("tracing already initialised: {err}")))?;

    tracing::debug!(project = %config.project, "tracing initialised");
    Ok(())
}

fn build_filter(from_env: Option<String>, fallback: &str) -> Result<EnvFilter> {
    let directives = from_env
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| fallback.to_string());
    EnvFilter::try_new(&directives)
        .map_err(|err| AgentError::Config(format!("invalid log filter `{directives}`: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_directive_wins_over_config() {
        let filter = build_filter(Some("clipping_agents=trace".into()), "info").unwrap();
        assert_eq!(filter.to_string(), "clipping_agents=trace");
    }

    #[test]
    fn blank_env_falls_back_to_config() {
        let filter = build_filter(Some("  ".into()), "warn").unwrap();
        assert_eq!(filter.to_string(), "warn");
    }

    #[test]
    fn rejects_malformed_filter() {
        assert!(build_filter(None, "clipping_agents=loud").is_err());
    }
}
