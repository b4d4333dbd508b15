use clap::{Parser, Subcommand};

use std::path::PathBuf;

use super::config::PlannerKind;
use super::constants::{
    ENV_CONFIG, ENV_HOST, ENV_LOG_JSON, ENV_MAX_STEPS, ENV_MCP_ENABLED, ENV_PLANNER,
    ENV_PLANNER_BASE_URL, ENV_PLANNER_MODEL, ENV_PLANNER_TEMPERATURE, ENV_PORT,
    ENV_STEP_TIMEOUT_SECS, ENV_TOOL_TIMEOUT_SECS,
};

#[derive(Parser)]
#[command(name = "queryscope")]
#[command(version, about = "Agentic query performance diagnostics", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Server host address
    #[arg(long, short = 'H', global = true, env = ENV_HOST)]
    pub host: Option<String>,

    /// Server port
    #[arg(long, short = 'p', global = true, env = ENV_PORT)]
    pub port: Option<u16>,

    /// Path to config file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// Enable or disable the MCP tool endpoint
    #[arg(long, global = true, env = ENV_MCP_ENABLED)]
    pub mcp: Option<bool>,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = ENV_LOG_JSON)]
    pub log_json: Option<bool>,

    /// Planner driving the agent (heuristic or chat)
    #[arg(long, global = true, env = ENV_PLANNER, value_parser = parse_planner_kind)]
    pub planner: Option<PlannerKind>,

    /// OpenAI-compatible base URL for the chat planner
    #[arg(long, global = true, env = ENV_PLANNER_BASE_URL)]
    pub planner_base_url: Option<String>,

    /// Chat model name
    #[arg(long, global = true, env = ENV_PLANNER_MODEL)]
    pub planner_model: Option<String>,

    /// Chat sampling temperature
    #[arg(long, global = true, env = ENV_PLANNER_TEMPERATURE)]
    pub planner_temperature: Option<f32>,

    /// Maximum agent reasoning steps per query
    #[arg(long, global = true, env = ENV_MAX_STEPS)]
    pub max_steps: Option<u32>,

    /// Timeout for a single planner step, in seconds
    #[arg(long, global = true, env = ENV_STEP_TIMEOUT_SECS)]
    pub step_timeout_secs: Option<u64>,

    /// Timeout for a single tool call attempt, in seconds
    #[arg(long, global = true, env = ENV_TOOL_TIMEOUT_SECS)]
    pub tool_timeout_secs: Option<u64>,
}

/// Parse planner kind from CLI/env string
fn parse_planner_kind(s: &str) -> Result<PlannerKind, String> {
    match s.to_lowercase().as_str() {
        "heuristic" => Ok(PlannerKind::Heuristic),
        "chat" => Ok(PlannerKind::Chat),
        _ => Err(format!(
            "Invalid planner '{}'. Valid options: heuristic, chat",
            s
        )),
    }
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Start the MCP tool server (default command)
    Serve,
    /// Analyze one query in-process and print the analysis as JSON
    Analyze(AnalyzeArgs),
}

#[derive(clap::Args, Clone, Debug)]
pub struct AnalyzeArgs {
    /// Warehouse query id to analyze
    #[arg(long)]
    pub query_id: String,

    /// User that ran the query
    #[arg(long, default_value = "cli")]
    pub user: String,

    #[arg(long, default_value = "default")]
    pub workspace_name: String,

    #[arg(long, default_value = "default")]
    pub workspace_id: String,

    #[arg(long, default_value = "default")]
    pub tenant_id: String,

    /// Warehouse size or type the query ran on
    #[arg(long, default_value = "unknown")]
    pub warehouse_type: String,
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub config: Option<PathBuf>,
    pub mcp: Option<bool>,
    pub log_json: Option<bool>,
    pub planner: Option<PlannerKind>,
    pub planner_base_url: Option<String>,
    pub planner_model: Option<String>,
    pub planner_temperature: Option<f32>,
    pub max_steps: Option<u32>,
    pub step_timeout_secs: Option<u64>,
    pub tool_timeout_secs: Option<u64>,
}

/// Parse CLI arguments and return config with command
pub fn parse() -> (CliConfig, Option<Commands>) {
    from_cli(Cli::parse())
}

fn from_cli(cli: Cli) -> (CliConfig, Option<Commands>) {
    let config = CliConfig {
        host: cli.host,
        port: cli.port,
        config: cli.config,
        mcp: cli.mcp,
        log_json: cli.log_json,
        planner: cli.planner,
        planner_base_url: cli.planner_base_url,
        planner_model: cli.planner_model,
        planner_temperature: cli.planner_temperature,
        max_steps: cli.max_steps,
        step_timeout_secs: cli.step_timeout_secs,
        tool_timeout_secs: cli.tool_timeout_secs,
    };
    (config, cli.command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_planner_kind() {
        assert_eq!(parse_planner_kind("CHAT").unwrap(), PlannerKind::Chat);
        assert_eq!(
            parse_planner_kind("heuristic").unwrap(),
            PlannerKind::Heuristic
        );
        assert!(parse_planner_kind("llm").unwrap_err().contains("heuristic, chat"));
    }

    #[test]
    fn test_analyze_subcommand_with_global_flags() {
        let cli = Cli::try_parse_from([
            "queryscope",
            "analyze",
            "--query-id",
            "Q1",
            "--planner",
            "heuristic",
            "--max-steps",
            "4",
        ])
        .unwrap();
        let (config, command) = from_cli(cli);

        assert_eq!(config.planner, Some(PlannerKind::Heuristic));
        assert_eq!(config.max_steps, Some(4));
        match command {
            Some(Commands::Analyze(args)) => {
                assert_eq!(args.query_id, "Q1");
                assert_eq!(args.user, "cli");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_analyze_requires_query_id() {
        assert!(Cli::try_parse_from(["queryscope", "analyze"]).is_err());
    }
}
