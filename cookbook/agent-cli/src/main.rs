use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use clipping_agents::agents::{
    ask_perplexity, clipping_agent_graph, collect_stream, math_agent_graph, stream_perplexity,
    ClippingAgent, MathAgent,
};
use clipping_agents::telemetry::init_tracing;
use clipping_agents::{AppConfig, CompiledGraph, GraphState, OpenAIClient, StubModel, ToolRegistry};

#[derive(Parser)]
#[command(name = "agent-cli")]
#[command(about = "Run the math, clipping and Perplexity agents")]
#[command(version)]
struct Cli {
    /// TOML configuration; environment variables override it
    #[arg(long, short, default_value = "agent.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask the math agent; every argument is one turn on the same thread
    Math {
        #[arg(required = true)]
        turns: Vec<String>,
        #[arg(long)]
        thread: Option<String>,
    },
    /// Search the web and summarize the answer to a question
    Clip { question: String },
    /// Ask Perplexity directly
    Perplexity {
        question: String,
        #[arg(long)]
        stream: bool,
        /// Overrides the configured model
        #[arg(long)]
        model: Option<String>,
    },
    /// Render an agent's graph
    Diagram {
        #[arg(value_enum)]
        agent: DiagramTarget,
        #[arg(long, short)]
        output: PathBuf,
        /// Write Mermaid source instead of a PNG
        #[arg(long)]
        mermaid: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum DiagramTarget {
    Math,
    Clip,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to load configuration: {err}");
            process::exit(1);
        }
    };
    if let Err(err) = init_tracing(&config.tracing) {
        eprintln!("{err}");
    }

    if let Err(err) = run(cli.command, &config).await {
        tracing::error!(error = %err, "command failed");
        process::exit(1);
    }
}

fn load_config(path: &Path) -> clipping_agents::Result<AppConfig> {
    if path.exists() {
        AppConfig::from_env_or_file(path)
    } else {
        Ok(AppConfig::from_env())
    }
}

async fn run(command: Commands, config: &AppConfig) -> clipping_agents::Result<()> {
    match command {
        Commands::Math { turns, thread } => {
            let agent = MathAgent::from_config(config)?;
            let thread = thread.unwrap_or_else(|| config.agent.thread_id.clone());

            let mut last = None;
            for turn in turns {
                last = Some(agent.ask(&thread, turn).await?);
            }
            if let Some(state) = last {
                for message in &state.messages {
                    println!("{}", message.pretty());
                }
            }
        }
        Commands::Clip { question } => {
            let agent = ClippingAgent::from_config(config)?;
            let state = agent.run(question).await?;
            println!("query: {}\n", state.query);
            println!("{}", state.response);
        }
        Commands::Perplexity {
            question,
            stream,
            model,
        } => {
            let mut client = OpenAIClient::perplexity_from_config(&config.model)?;
            if let Some(model) = model {
                client = client.with_model(model);
            }
            if stream {
                let deltas = stream_perplexity(&client, &question).await?;
                collect_stream(deltas, |delta| {
                    print!("{delta}");
                    let _ = io::stdout().flush();
                })
                .await?;
                println!();
            } else {
                println!("{}", ask_perplexity(&client, &question).await?);
            }
        }
        Commands::Diagram {
            agent,
            output,
            mermaid,
        } => {
            // Structure only: the diagram never calls the model or the tools.
            let model = StubModel::new(Vec::new());
            match agent {
                DiagramTarget::Math => {
                    write_diagram(&math_agent_graph(model, false).compile()?, &output, mermaid).await?
                }
                DiagramTarget::Clip => {
                    let graph = clipping_agent_graph(model, ToolRegistry::new(), false).compile()?;
                    write_diagram(&graph, &output, mermaid).await?
                }
            }
            println!("Graph saved as '{}'", output.display());
        }
    }
    Ok(())
}

async fn write_diagram<S: GraphState>(
    graph: &CompiledGraph<S>,
    output: &Path,
    mermaid: bool,
) -> clipping_agents::Result<()> {
    if mermaid {
        graph.save_mermaid(output).await
    } else {
        graph.save_mermaid_png(output).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perplexity_model_defaults_to_config() {
        let cli = Cli::try_parse_from(["agent-cli", "perplexity", "Quem ganhou?"]).unwrap();
        assert!(matches!(cli.command, Commands::Perplexity { model: None, .. }));

        let cli = Cli::try_parse_from(["agent-cli", "perplexity", "Quem ganhou?", "--model", "sonar"])
            .unwrap();
        assert!(
            matches!(cli.command, Commands::Perplexity { model: Some(ref m), .. } if m == "sonar")
        );
    }
}
