use config::{Config as ConfigLoader, ConfigError, Environment, File};
use serde::Deserialize;
use tandem_types::{GatePolicy, GraphConfig};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub graph: GraphSettings,
    #[serde(default)]
    pub hrms: HrmsSettings,
    #[serde(default)]
    pub mcp: McpConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,

    // Secrets (from ENV only)
    #[serde(skip)]
    pub openai_api_key: String,
    #[serde(skip)]
    pub mongodb_uri: Option<String>,
    #[serde(skip)]
    pub hrms_username: String,
    #[serde(skip)]
    pub hrms_password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub enabled: bool,
    pub origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            origins: vec!["*".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub temperature: f32,
    pub embedding_model: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.0,
            embedding_model: "text-embedding-3-small".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GraphSettings {
    pub max_iterations: usize,
    pub approval_enabled: bool,
    pub document_review_enabled: bool,
    /// Overrides the default sensitive-tool list when present.
    pub sensitive_tools: Option<Vec<String>>,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            approval_enabled: true,
            document_review_enabled: false,
            sensitive_tools: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HrmsSettings {
    /// Base URL of the HRMS backend. Empty disables the HRMS action tools.
    pub base_url: String,
    /// Employee id used when a turn carries no actor context.
    pub default_employee_id: i64,
}

impl Default for HrmsSettings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            default_employee_id: 335,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct McpConfig {
    /// Comma-separated streamable-HTTP MCP server URLs.
    pub servers: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// "memory" or "mongodb".
    pub backend: String,
    pub database: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            database: "tandem".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from TOML files and environment variables.
    ///
    /// Hierarchy (weakest to strongest):
    /// 1. config/default.toml
    /// 2. config/{ENV}.toml (if ENV is set)
    /// 3. Environment variables (SERVER_, LLM_, GRAPH_, HRMS_, MCP_,
    ///    PERSISTENCE_, LOG_ prefixes)
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("ENV").unwrap_or_else(|_| "dev".to_string());

        let builder = ConfigLoader::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(
                Environment::default()
                    .prefix("SERVER")
                    .separator("_")
                    .try_parsing(true),
            )
            .add_source(
                Environment::default()
                    .prefix("LLM")
                    .separator("_")
                    .try_parsing(true),
            )
            .add_source(
                Environment::default()
                    .prefix("GRAPH")
                    .separator("_")
                    .try_parsing(true),
            )
            .add_source(
                Environment::default()
                    .prefix("MCP")
                    .separator("_")
                    .try_parsing(true),
            )
            .add_source(
                Environment::default()
                    .prefix("PERSISTENCE")
                    .separator("_")
                    .try_parsing(true),
            )
            .add_source(
                Environment::default()
                    .prefix("LOG")
                    .separator("_")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        let mut cfg: Config = config.try_deserialize()?;

        // Secrets come from ENV only, never from TOML.
        cfg.openai_api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            ConfigError::Message("OPENAI_API_KEY environment variable is required".to_string())
        })?;
        cfg.mongodb_uri = std::env::var("MONGODB_URI").ok();
        cfg.hrms_username = std::env::var("HRMS_USERNAME").unwrap_or_default();
        cfg.hrms_password = std::env::var("HRMS_PASSWORD").unwrap_or_default();

        if cfg.persistence.backend == "mongodb" && cfg.mongodb_uri.is_none() {
            return Err(ConfigError::Message(
                "MONGODB_URI is required when persistence.backend = \"mongodb\"".to_string(),
            ));
        }

        Ok(cfg)
    }

    pub fn graph_config(&self) -> GraphConfig {
        let mut gates = GatePolicy::default();
        gates.approval_enabled = self.graph.approval_enabled;
        gates.document_review_enabled = self.graph.document_review_enabled;
        if let Some(tools) = &self.graph.sensitive_tools {
            gates.sensitive_tools = tools.clone();
        }

        let mut graph = GraphConfig::default()
            .with_model(&self.llm.model)
            .with_max_iterations(self.graph.max_iterations)
            .with_gates(gates);
        graph.temperature = Some(self.llm.temperature);
        graph
    }
}
