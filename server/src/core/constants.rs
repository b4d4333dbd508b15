// =============================================================================
// Application Identity
// =============================================================================

/// Application name in title case (for display and user agents)
pub const APP_NAME: &str = "QueryScope";

/// Application name in lowercase (for paths and log filters)
pub const APP_NAME_LOWER: &str = "queryscope";

/// Unix-style dotfile folder name
pub const APP_DOT_FOLDER: &str = ".queryscope";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name
pub const CONFIG_FILE_NAME: &str = "queryscope.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "QUERYSCOPE_CONFIG";

// =============================================================================
// Environment Variables - Server
// =============================================================================

/// Environment variable for server host
pub const ENV_HOST: &str = "QUERYSCOPE_HOST";

/// Environment variable for server port
pub const ENV_PORT: &str = "QUERYSCOPE_PORT";

/// Environment variable to enable/disable the MCP tool endpoint
pub const ENV_MCP_ENABLED: &str = "QUERYSCOPE_MCP_ENABLED";

// =============================================================================
// Environment Variables - Logging
// =============================================================================

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "QUERYSCOPE_LOG";

/// Environment variable to switch logs to JSON lines
pub const ENV_LOG_JSON: &str = "QUERYSCOPE_LOG_JSON";

// =============================================================================
// Server Defaults
// =============================================================================

/// Default server host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default server port
pub const DEFAULT_PORT: u16 = 8000;

/// Mount path of the MCP streamable HTTP endpoint
pub const MCP_PATH: &str = "/mcp";

// =============================================================================
// Environment Variables - Agent
// =============================================================================

/// Environment variable for the agent step cap
pub const ENV_MAX_STEPS: &str = "QUERYSCOPE_MAX_STEPS";

/// Environment variable for the per-step planner timeout
pub const ENV_STEP_TIMEOUT_SECS: &str = "QUERYSCOPE_STEP_TIMEOUT_SECS";

/// Environment variable for the per-call tool timeout
pub const ENV_TOOL_TIMEOUT_SECS: &str = "QUERYSCOPE_TOOL_TIMEOUT_SECS";

// =============================================================================
// Agent Defaults
// =============================================================================

/// Maximum reasoning steps per run
pub const DEFAULT_MAX_STEPS: u32 = 10;

/// Wall-clock budget for a single planner step
pub const DEFAULT_STEP_TIMEOUT_SECS: u64 = 60;

/// Wall-clock budget for a single tool call attempt
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 15;

/// Attempts per tool call (first try included)
pub const DEFAULT_TOOL_RETRY_ATTEMPTS: u32 = 3;

/// Base delay for exponential backoff between tool attempts
pub const DEFAULT_TOOL_RETRY_BASE_DELAY_MS: u64 = 100;

// =============================================================================
// Environment Variables - Planner
// =============================================================================

/// Environment variable selecting the planner (`heuristic` or `chat`)
pub const ENV_PLANNER: &str = "QUERYSCOPE_PLANNER";

/// Environment variable for the chat completions base URL
pub const ENV_PLANNER_BASE_URL: &str = "QUERYSCOPE_PLANNER_BASE_URL";

/// Environment variable for the chat model name
pub const ENV_PLANNER_MODEL: &str = "QUERYSCOPE_PLANNER_MODEL";

/// Environment variable for the chat sampling temperature
pub const ENV_PLANNER_TEMPERATURE: &str = "QUERYSCOPE_PLANNER_TEMPERATURE";

/// Environment variable for the chat planner API key
pub const ENV_PLANNER_API_KEY: &str = "QUERYSCOPE_PLANNER_API_KEY";

/// Provider keys accepted when `QUERYSCOPE_PLANNER_API_KEY` is unset, in order
pub const FALLBACK_API_KEY_VARS: &[&str] = &["GROQ_API_KEY", "OPENAI_API_KEY"];

// =============================================================================
// Planner Defaults
// =============================================================================

/// Default OpenAI-compatible endpoint
pub const DEFAULT_PLANNER_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Default chat model
pub const DEFAULT_PLANNER_MODEL: &str = "openai/gpt-oss-120b";

/// Default sampling temperature
pub const DEFAULT_PLANNER_TEMPERATURE: f32 = 0.0;

/// Timeout for a single chat completions request
pub const PLANNER_REQUEST_TIMEOUT_SECS: u64 = 60;

// =============================================================================
// Shutdown
// =============================================================================

/// Maximum time to wait for background tasks during shutdown
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 30;
