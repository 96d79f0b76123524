use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tandem_api::{build_router, AppState, Config};
use tandem_graph::Graph;
use tandem_llm::OpenAIClient;
use tandem_persist::{
    CheckpointStore, MemoryCheckpointStore, MemorySessionStore, MongoCheckpointStore,
    MongoSessionStore, SessionStore,
};
use tandem_retrieval::{MemoryVectorStore, OpenAIEmbedder, RetrieverTool};
use tandem_tools::hrms::{
    ApplyAttendanceTool, ApplyLeaveForEmployeeTool, ApplyLeaveTool,
    ApproveAttendanceForEmployeeTool, CancelLeaveForEmployeeTool, EmployeeInfoTool,
    LeaveBalanceTool,
};
use tandem_tools::{HrmsClient, HrmsConfig, McpSource, ToolRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::load()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    init_logging(&config);

    tracing::info!("Starting Tandem API server");
    tracing::info!("Config loaded: {}:{}", config.server.host, config.server.port);

    // LLM client
    let llm: Arc<dyn tandem_llm::ChatClient> =
        Arc::new(OpenAIClient::new(config.openai_api_key.clone())?);

    // Tool registry: retrieval, HRMS actions, remote MCP tools
    let registry = Arc::new(ToolRegistry::new());

    let embedder = Arc::new(
        OpenAIEmbedder::new(config.openai_api_key.clone())?
            .with_model(&config.llm.embedding_model),
    );
    let vector_store = Arc::new(MemoryVectorStore::new(embedder));
    registry
        .register(Arc::new(RetrieverTool::new(vector_store)))
        .await;

    if config.hrms.base_url.is_empty() {
        tracing::warn!("hrms.base_url not configured, HRMS action tools disabled");
    } else {
        let hrms = Arc::new(HrmsClient::new(HrmsConfig {
            base_url: config.hrms.base_url.clone(),
            username: config.hrms_username.clone(),
            password: config.hrms_password.clone(),
            default_employee_id: config.hrms.default_employee_id,
        })?);
        registry
            .register(Arc::new(ApplyLeaveTool::new(Arc::clone(&hrms))))
            .await;
        registry
            .register(Arc::new(LeaveBalanceTool::new(Arc::clone(&hrms))))
            .await;
        registry
            .register(Arc::new(ApplyLeaveForEmployeeTool::new(Arc::clone(&hrms))))
            .await;
        registry
            .register(Arc::new(CancelLeaveForEmployeeTool::new(Arc::clone(&hrms))))
            .await;
        registry
            .register(Arc::new(ApplyAttendanceTool::new(Arc::clone(&hrms))))
            .await;
        registry
            .register(Arc::new(ApproveAttendanceForEmployeeTool::new(Arc::clone(&hrms))))
            .await;
        registry
            .register(Arc::new(EmployeeInfoTool::new(Arc::clone(&hrms))))
            .await;
        tracing::info!(base_url = %config.hrms.base_url, "HRMS action tools registered");
    }

    for (idx, url) in config.mcp.servers.split(',').enumerate() {
        let url = url.trim();
        if url.is_empty() {
            continue;
        }
        match McpSource::connect_http(format!("mcp-server-{}", idx), url).await {
            Ok(source) => {
                registry.add_remote_source(Arc::new(source)).await?;
                tracing::info!("Connected to MCP server: {}", url);
            }
            Err(e) => {
                tracing::warn!("Failed to connect to MCP server {}: {}", url, e);
            }
        }
    }

    // Persistence
    let (checkpoints, sessions): (Arc<dyn CheckpointStore>, Arc<dyn SessionStore>) =
        match config.persistence.backend.as_str() {
            "mongodb" => {
                let uri = config.mongodb_uri.as_deref().ok_or_else(|| {
                    anyhow::anyhow!("MONGODB_URI is required when persistence.backend = \"mongodb\"")
                })?;
                tracing::info!(database = %config.persistence.database, "Connecting to MongoDB");
                let checkpoints =
                    MongoCheckpointStore::connect(uri, &config.persistence.database).await?;
                let sessions =
                    MongoSessionStore::connect(uri, &config.persistence.database).await?;
                (Arc::new(checkpoints), Arc::new(sessions))
            }
            _ => {
                tracing::warn!("using in-memory persistence, state is lost on restart");
                (
                    Arc::new(MemoryCheckpointStore::new()),
                    Arc::new(MemorySessionStore::new()),
                )
            }
        };

    let graph = Graph::new(
        llm,
        registry,
        Arc::clone(&checkpoints),
        config.graph_config(),
    );

    let state = AppState::new(config.clone(), graph, sessions, checkpoints);
    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.logging.format.as_str() {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }
}
