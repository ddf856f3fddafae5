use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use braid_agent::{CallPolicy, LlmPromptAgent};
use braid_core::config::WorkflowConfig;
use braid_core::traits::ChatClient;
use braid_llm::ChatModule;
use braid_workflow::{to_dot, AgentNode, Binding, WorkflowGraph, WorkflowInputs};

#[derive(Parser)]
#[command(name = "braid", version, about = "Agentic workflow orchestration")]
struct Cli {
    /// Path to the workflow config file
    #[arg(short, long, default_value = "braid.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the workflow graph without executing it
    Validate,
    /// Print the workflow graph as Graphviz DOT
    Graph,
    /// Execute the workflow and print the report as JSON
    Run {
        /// Workflow inputs as KEY=VALUE pairs (KEY may be `node.input`)
        #[arg(short, long = "input", value_name = "KEY=VALUE")]
        inputs: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("braid=info,warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = WorkflowConfig::load(&cli.config)?;
    let mut graph = build_graph(&config)?;

    match cli.command {
        Commands::Validate => {
            graph.validate()?;
            println!(
                "workflow '{}' is valid ({} nodes)",
                graph.name(),
                graph.len()
            );
        }
        Commands::Graph => {
            graph.validate()?;
            print!("{}", to_dot(&graph));
        }
        Commands::Run { inputs } => {
            let inputs = parse_inputs(&inputs)?;
            let report = graph.execute(&inputs).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.succeeded() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

/// Build the workflow graph declared by the config: one prompt-template
/// LLM agent per node, all sharing a single chat client.
fn build_graph(config: &WorkflowConfig) -> anyhow::Result<WorkflowGraph> {
    let client: Arc<dyn ChatClient> = Arc::new(ChatModule::from_config(&config.llm));
    let policy = CallPolicy::new(config.call.max_retries, config.call.retry_backoff_secs)?;

    let mut graph = WorkflowGraph::new(&config.workflow.name).with_policy(policy);
    for node_config in &config.nodes {
        let mut agent =
            LlmPromptAgent::new(&node_config.name, client.clone(), &node_config.prompt);
        if let Some(system) = &node_config.system {
            agent = agent.with_system_instructions(system);
        }

        let mut node = AgentNode::new(&node_config.name, Arc::new(agent));
        for (input, source) in &node_config.inputs {
            node = node.bind(input, Binding::parse(source)?);
        }
        for dep in &node_config.depends_on {
            node = node.with_dependency(dep);
        }
        graph.add_node(node)?;
    }
    Ok(graph)
}

/// Parse `KEY=VALUE` pairs; values that parse as JSON are kept as JSON,
/// anything else is taken as a plain string.
fn parse_inputs(pairs: &[String]) -> anyhow::Result<WorkflowInputs> {
    let mut inputs = WorkflowInputs::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("input '{}' must have the form KEY=VALUE", pair))?;
        let value = serde_json::from_str(value)
            .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
        inputs.insert(key.to_string(), value);
    }
    Ok(inputs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_inputs_json_and_string() {
        let inputs = parse_inputs(&[
            "topic=Rust async".to_string(),
            "Double.value=5".to_string(),
            "flag=true".to_string(),
        ])
        .unwrap();

        assert_eq!(inputs["topic"], serde_json::json!("Rust async"));
        assert_eq!(inputs["Double.value"], serde_json::json!(5));
        assert_eq!(inputs["flag"], serde_json::json!(true));
    }

    #[test]
    fn test_parse_inputs_rejects_bare_key() {
        assert!(parse_inputs(&["novalue".to_string()]).is_err());
    }
}
