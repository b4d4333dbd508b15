use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::agent::AgentConfig;
use crate::domain::agent::planner::ChatPlannerConfig;
use crate::utils::file::expand_path;
use crate::utils::retry::RetryPolicy;

use super::cli::CliConfig;
use super::constants::{
    APP_DOT_FOLDER, CONFIG_FILE_NAME, DEFAULT_HOST, DEFAULT_MAX_STEPS, DEFAULT_PLANNER_BASE_URL,
    DEFAULT_PLANNER_MODEL, DEFAULT_PLANNER_TEMPERATURE, DEFAULT_PORT, DEFAULT_STEP_TIMEOUT_SECS,
    DEFAULT_TOOL_RETRY_ATTEMPTS, DEFAULT_TOOL_RETRY_BASE_DELAY_MS, DEFAULT_TOOL_TIMEOUT_SECS,
    ENV_PLANNER_API_KEY, FALLBACK_API_KEY_VARS, PLANNER_REQUEST_TIMEOUT_SECS,
};
use super::secret::Secret;

// =============================================================================
// Planner Kind Enum
// =============================================================================

/// Which planner drives the diagnostic agent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlannerKind {
    /// Deterministic rule-based planner, no credentials needed
    #[default]
    Heuristic,
    /// OpenAI-compatible chat completions model
    Chat,
}

impl fmt::Display for PlannerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlannerKind::Heuristic => write!(f, "heuristic"),
            PlannerKind::Chat => write!(f, "chat"),
        }
    }
}

// =============================================================================
// File Config Structs (for JSON parsing with optional fields)
// =============================================================================

/// Server configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ServerFileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub mcp: Option<McpFileConfig>,
}

/// MCP endpoint configuration section (nested under server)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct McpFileConfig {
    pub enabled: Option<bool>,
}

/// Agent loop limits
#[derive(Debug, Default, Clone, Deserialize)]
pub struct AgentFileConfig {
    pub max_steps: Option<u32>,
    pub step_timeout_secs: Option<u64>,
    pub tool_timeout_secs: Option<u64>,
    pub tool_retry_attempts: Option<u32>,
    pub tool_retry_base_delay_ms: Option<u64>,
}

/// Planner configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct PlannerFileConfig {
    pub kind: Option<PlannerKind>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
}

/// Logging configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct LogFileConfig {
    pub json: Option<bool>,
}

/// File-based configuration (JSON)
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub server: Option<ServerFileConfig>,
    pub agent: Option<AgentFileConfig>,
    pub planner: Option<PlannerFileConfig>,
    pub log: Option<LogFileConfig>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

/// Overwrite `target` when `value` is set
fn merge_field<T: fmt::Debug>(target: &mut Option<T>, value: Option<T>, field: &'static str) {
    if value.is_some() {
        tracing::trace!(field, value = ?value, "Merging config field");
        *target = value;
    }
}

impl FileConfig {
    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        tracing::trace!(config = ?config, "Parsed config file");
        Ok(config)
    }

    /// Top-level keys that match no known section
    fn unknown_fields(&self) -> Vec<&str> {
        match &self.extra {
            serde_json::Value::Object(map) => map.keys().map(|k| k.as_str()).collect(),
            _ => Vec::new(),
        }
    }

    /// Warn about unknown fields in the config
    fn warn_unknown_fields(&self) {
        let keys = self.unknown_fields();
        if !keys.is_empty() {
            tracing::warn!(
                fields = %keys.join(", "),
                "Unknown fields in config file (possible typos)"
            );
        }
    }

    /// Merge another FileConfig into this one (other takes precedence)
    fn merge(&mut self, other: FileConfig) {
        if let Some(server) = other.server {
            let current = self.server.get_or_insert_with(ServerFileConfig::default);
            merge_field(&mut current.host, server.host, "server.host");
            merge_field(&mut current.port, server.port, "server.port");
            if let Some(mcp) = server.mcp {
                let current_mcp = current.mcp.get_or_insert_with(McpFileConfig::default);
                merge_field(&mut current_mcp.enabled, mcp.enabled, "server.mcp.enabled");
            }
        }

        if let Some(agent) = other.agent {
            let current = self.agent.get_or_insert_with(AgentFileConfig::default);
            merge_field(&mut current.max_steps, agent.max_steps, "agent.max_steps");
            merge_field(
                &mut current.step_timeout_secs,
                agent.step_timeout_secs,
                "agent.step_timeout_secs",
            );
            merge_field(
                &mut current.tool_timeout_secs,
                agent.tool_timeout_secs,
                "agent.tool_timeout_secs",
            );
            merge_field(
                &mut current.tool_retry_attempts,
                agent.tool_retry_attempts,
                "agent.tool_retry_attempts",
            );
            merge_field(
                &mut current.tool_retry_base_delay_ms,
                agent.tool_retry_base_delay_ms,
                "agent.tool_retry_base_delay_ms",
            );
        }

        if let Some(planner) = other.planner {
            let current = self.planner.get_or_insert_with(PlannerFileConfig::default);
            merge_field(&mut current.kind, planner.kind, "planner.kind");
            merge_field(&mut current.base_url, planner.base_url, "planner.base_url");
            merge_field(&mut current.model, planner.model, "planner.model");
            merge_field(
                &mut current.temperature,
                planner.temperature,
                "planner.temperature",
            );
        }

        if let Some(log) = other.log {
            let current = self.log.get_or_insert_with(LogFileConfig::default);
            merge_field(&mut current.json, log.json, "log.json");
        }
    }
}

// =============================================================================
// Runtime Config Structs (final merged configuration)
// =============================================================================

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// MCP endpoint configuration
#[derive(Debug, Clone)]
pub struct McpConfig {
    pub enabled: bool,
}

/// Agent loop limits
#[derive(Debug, Clone)]
pub struct AgentLoopConfig {
    pub max_steps: u32,
    pub step_timeout_secs: u64,
    pub tool_timeout_secs: u64,
    pub tool_retry_attempts: u32,
    pub tool_retry_base_delay_ms: u64,
}

impl AgentLoopConfig {
    /// Runtime settings for the diagnostic agent
    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            max_steps: self.max_steps,
            step_timeout: Duration::from_secs(self.step_timeout_secs),
            tool_timeout: Duration::from_secs(self.tool_timeout_secs),
            retry: RetryPolicy::new(self.tool_retry_attempts, self.tool_retry_base_delay_ms),
        }
    }
}

/// Planner configuration
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    pub kind: PlannerKind,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub api_key: Option<Secret>,
}

impl PlannerConfig {
    /// Settings for the chat completions planner
    ///
    /// Fails when no API key was found.
    pub fn chat_config(&self) -> Result<ChatPlannerConfig> {
        let api_key = self.api_key.clone().with_context(|| {
            format!(
                "Chat planner requires an API key; set {} (or {})",
                ENV_PLANNER_API_KEY,
                FALLBACK_API_KEY_VARS.join(", ")
            )
        })?;
        Ok(ChatPlannerConfig {
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            temperature: self.temperature,
            api_key,
            request_timeout: Duration::from_secs(PLANNER_REQUEST_TIMEOUT_SECS),
        })
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub json: bool,
}

/// Final merged application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub mcp: McpConfig,
    pub agent: AgentLoopConfig,
    pub planner: PlannerConfig,
    pub log: LogConfig,
}

impl AppConfig {
    /// Load configuration from all sources
    ///
    /// Priority (lowest to highest):
    /// 1. Defaults
    /// 2. Profile directory config (~/.queryscope/queryscope.json)
    /// 3. Local directory config OR CLI-specified config path
    /// 4. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        Self::load_with(cli, |var| std::env::var(var).ok())
    }

    /// Same as [`AppConfig::load`] with an explicit environment lookup for credentials
    pub fn load_with<F>(cli: &CliConfig, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        tracing::debug!("Loading application configuration");
        tracing::trace!(cli = ?cli, "CLI config");

        let mut file_config = FileConfig::default();
        let mut found_configs: Vec<String> = Vec::new();

        // 1. Profile dir (~/.queryscope/queryscope.json), skipped if absent
        if let Some(profile_path) = get_profile_config_path()
            && profile_path.exists()
        {
            let profile_config = FileConfig::load_from_file(&profile_path)?;
            profile_config.warn_unknown_fields();
            file_config.merge(profile_config);
            found_configs.push(profile_path.display().to_string());
        }

        // 2. CLI-specified path OR local directory
        let overlay_path = if let Some(ref path) = cli.config {
            let expanded = expand_path(&path.to_string_lossy());
            if !expanded.exists() {
                anyhow::bail!("Config file not found: {}", expanded.display());
            }
            Some(expanded)
        } else {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() { Some(local) } else { None }
        };

        if let Some(path) = overlay_path {
            let overlay_config = FileConfig::load_from_file(&path)?;
            overlay_config.warn_unknown_fields();
            file_config.merge(overlay_config);
            found_configs.push(path.display().to_string());
        }

        tracing::debug!(configs = ?found_configs, "Config files loaded");

        let config = Self::from_layers(file_config, cli, lookup);
        config.validate()?;

        tracing::debug!(
            host = %config.server.host,
            port = config.server.port,
            mcp_enabled = config.mcp.enabled,
            max_steps = config.agent.max_steps,
            planner = %config.planner.kind,
            planner_model = %config.planner.model,
            api_key = ?config.planner.api_key,
            log_json = config.log.json,
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Layer defaults, merged file config and CLI/env overrides
    fn from_layers<F>(file_config: FileConfig, cli: &CliConfig, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let file_server = file_config.server.unwrap_or_default();
        let file_mcp = file_server.mcp.unwrap_or_default();
        let file_agent = file_config.agent.unwrap_or_default();
        let file_planner = file_config.planner.unwrap_or_default();
        let file_log = file_config.log.unwrap_or_default();

        let server = ServerConfig {
            host: cli
                .host
                .clone()
                .or(file_server.host)
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: cli.port.or(file_server.port).unwrap_or(DEFAULT_PORT),
        };

        let mcp = McpConfig {
            enabled: cli.mcp.or(file_mcp.enabled).unwrap_or(true),
        };

        let agent = AgentLoopConfig {
            max_steps: cli
                .max_steps
                .or(file_agent.max_steps)
                .unwrap_or(DEFAULT_MAX_STEPS),
            step_timeout_secs: cli
                .step_timeout_secs
                .or(file_agent.step_timeout_secs)
                .unwrap_or(DEFAULT_STEP_TIMEOUT_SECS),
            tool_timeout_secs: cli
                .tool_timeout_secs
                .or(file_agent.tool_timeout_secs)
                .unwrap_or(DEFAULT_TOOL_TIMEOUT_SECS),
            tool_retry_attempts: file_agent
                .tool_retry_attempts
                .unwrap_or(DEFAULT_TOOL_RETRY_ATTEMPTS),
            tool_retry_base_delay_ms: file_agent
                .tool_retry_base_delay_ms
                .unwrap_or(DEFAULT_TOOL_RETRY_BASE_DELAY_MS),
        };

        let key_vars: Vec<&'static str> = std::iter::once(ENV_PLANNER_API_KEY)
            .chain(FALLBACK_API_KEY_VARS.iter().copied())
            .collect();

        let planner = PlannerConfig {
            kind: cli.planner.or(file_planner.kind).unwrap_or_default(),
            base_url: cli
                .planner_base_url
                .clone()
                .or(file_planner.base_url)
                .unwrap_or_else(|| DEFAULT_PLANNER_BASE_URL.to_string()),
            model: cli
                .planner_model
                .clone()
                .or(file_planner.model)
                .unwrap_or_else(|| DEFAULT_PLANNER_MODEL.to_string()),
            temperature: cli
                .planner_temperature
                .or(file_planner.temperature)
                .unwrap_or(DEFAULT_PLANNER_TEMPERATURE),
            api_key: Secret::from_vars(&key_vars, lookup),
        };

        let log = LogConfig {
            json: cli.log_json.or(file_log.json).unwrap_or(false),
        };

        Self {
            server,
            mcp,
            agent,
            planner,
            log,
        }
    }

    /// Validate the configuration for consistency and correctness
    fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            anyhow::bail!("Configuration error: server.host must not be empty");
        }

        // Port 0 would bind an ephemeral port clients cannot find
        if self.server.port == 0 {
            anyhow::bail!("Configuration error: server.port must be greater than 0");
        }

        if self.agent.max_steps == 0 {
            anyhow::bail!("Configuration error: agent.max_steps must be at least 1");
        }
        if self.agent.step_timeout_secs == 0 {
            anyhow::bail!("Configuration error: agent.step_timeout_secs must be greater than 0");
        }
        if self.agent.tool_timeout_secs == 0 {
            anyhow::bail!("Configuration error: agent.tool_timeout_secs must be greater than 0");
        }
        if self.agent.tool_retry_attempts == 0 {
            anyhow::bail!("Configuration error: agent.tool_retry_attempts must be at least 1");
        }

        if self.planner.kind == PlannerKind::Chat {
            if self.planner.api_key.is_none() {
                anyhow::bail!(
                    "Configuration error: planner.kind is 'chat' but no API key is set. \
                     Set {} (or {}).",
                    ENV_PLANNER_API_KEY,
                    FALLBACK_API_KEY_VARS.join(", ")
                );
            }
            if self.planner.model.trim().is_empty() {
                anyhow::bail!("Configuration error: planner.model must not be empty");
            }
            let base_url = self.planner.base_url.as_str();
            if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
                anyhow::bail!(
                    "Configuration error: planner.base_url must be an http(s) URL, got '{}'",
                    base_url
                );
            }
        }

        Ok(())
    }
}

/// Get the profile config path (~/.queryscope/queryscope.json)
fn get_profile_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(APP_DOT_FOLDER).join(CONFIG_FILE_NAME))
}
