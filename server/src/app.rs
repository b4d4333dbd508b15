//! Core application

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing_subscriber::EnvFilter;

use crate::api::ApiServer;
use crate::core::cli::{self, AnalyzeArgs, Commands};
use crate::core::config::{AppConfig, PlannerConfig, PlannerKind};
use crate::core::constants::{APP_NAME_LOWER, ENV_LOG};
use crate::core::shutdown::ShutdownService;
use crate::data::types::QueryMetadata;
use crate::data::{InMemoryCheckpointStore, SimulatedMetricSource};
use crate::domain::agent::planner::{ChatCompletionsPlanner, HeuristicPlanner};
use crate::domain::{
    AnalyzerNode, DiagnosticAgent, MetricToolService, Orchestrator, Planner, WorkflowNode,
};

pub struct CoreApp {
    pub shutdown: ShutdownService,
    pub config: AppConfig,
    pub tools: Arc<MetricToolService>,
    pub orchestrator: Arc<Orchestrator>,
}

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();

        let (cli_config, command) = cli::parse();

        // Config warnings go to a compact logger until the configured one is installed
        let bootstrap = tracing_subscriber::fmt()
            .with_target(false)
            .compact()
            .with_env_filter(Self::log_filter())
            .finish();
        let config = tracing::subscriber::with_default(bootstrap, || AppConfig::load(&cli_config))?;
        Self::init_logging(config.log.json);

        tracing::debug!(command = ?command, "Application starting");

        let app = Self::init(config)?;
        match command {
            Some(Commands::Analyze(args)) => app.analyze(args).await,
            Some(Commands::Serve) | None => Self::start_server(app).await,
        }
    }

    /// Wire the metric source, tool service, agent and orchestrator
    pub fn init(config: AppConfig) -> Result<Self> {
        let source = Arc::new(SimulatedMetricSource::new());
        let tools = Arc::new(MetricToolService::new(source));
        tracing::debug!(source = tools.source_name(), "Metric source initialized");

        let planner = Self::build_planner(&config.planner)?;
        tracing::debug!(planner = planner.planner_name(), "Planner initialized");

        let agent = Arc::new(DiagnosticAgent::new(
            planner,
            tools.clone(),
            config.agent.agent_config(),
        ));
        let store = Arc::new(InMemoryCheckpointStore::new());
        let analyzer: Arc<dyn WorkflowNode> = Arc::new(AnalyzerNode::new(agent));
        let orchestrator = Arc::new(Orchestrator::new(store, vec![analyzer]));

        Ok(Self {
            shutdown: ShutdownService::new(),
            config,
            tools,
            orchestrator,
        })
    }

    fn build_planner(config: &PlannerConfig) -> Result<Arc<dyn Planner>> {
        match config.kind {
            PlannerKind::Heuristic => Ok(Arc::new(HeuristicPlanner::new())),
            PlannerKind::Chat => {
                let planner = ChatCompletionsPlanner::new(config.chat_config()?)
                    .context("Failed to initialize chat planner")?;
                Ok(Arc::new(planner))
            }
        }
    }

    /// Run one workflow in-process and print the analysis as JSON
    async fn analyze(&self, args: AnalyzeArgs) -> Result<()> {
        let query = QueryMetadata {
            user: args.user,
            query_id: args.query_id,
            workspace_name: args.workspace_name,
            workspace_id: args.workspace_id,
            tenant_id: args.tenant_id,
            warehouse_type: args.warehouse_type,
            timestamp: Utc::now(),
        };

        let analysis = self.orchestrator.run_query_analysis(query).await;
        let output =
            serde_json::to_string_pretty(&analysis).context("Failed to encode analysis")?;
        println!("{}", output);
        Ok(())
    }

    /// Log filter from QUERYSCOPE_LOG, then RUST_LOG, then the default
    fn log_filter() -> EnvFilter {
        let default_filter = format!("info,{}=info", APP_NAME_LOWER);

        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new("info"))
    }

    fn init_logging(json: bool) {
        let builder = tracing_subscriber::fmt()
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_env_filter(Self::log_filter());

        if json {
            builder.json().init();
        } else {
            builder.with_ansi(true).compact().init();
        }
    }

    async fn start_server(app: Self) -> Result<()> {
        // Install signal handlers FIRST (before any blocking calls)
        app.shutdown.install_signal_handlers();

        let server = ApiServer::new(app);
        let app = server.start().await?;
        app.shutdown.shutdown().await;

        Ok(())
    }
}
