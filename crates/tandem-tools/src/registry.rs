use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tandem_llm::Tool;
use tandem_types::ActorContext;
use tokio::sync::RwLock;

/// Schema-described callable action.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON Schema for the arguments object.
    pub parameters: Value,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    pub fn to_llm_tool(&self) -> Tool {
        Tool::new(&self.name, &self.description, self.parameters.clone())
    }

    fn to_llm_tool_named(&self, name: &str) -> Tool {
        Tool::new(name, &self.description, self.parameters.clone())
    }
}

/// A locally implemented tool.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn spec(&self) -> ToolSpec;

    /// Execute with the turn's actor identity. Errors returned here are
    /// converted to textual results by the registry; they never abort a turn.
    async fn call(&self, args: Value, actor: Option<&ActorContext>) -> Result<String>;
}

/// A process or service exposing tools over a side-channel protocol (MCP).
/// Tools from remote sources are merged into the registry namespace under
/// `source:tool` qualified names.
#[async_trait]
pub trait RemoteToolSource: Send + Sync {
    fn name(&self) -> &str;

    async fn list_tools(&self) -> Result<Vec<ToolSpec>>;

    async fn call_tool(&self, name: &str, args: Value) -> Result<String>;
}

struct RemoteTools {
    source: Arc<dyn RemoteToolSource>,
    tools: Vec<ToolSpec>,
}

/// Catalog of all callable actions with a uniform invoke interface.
///
/// Invocation failures are caught and returned as error text so the model
/// sees them and decides how to proceed; a failing tool cannot abort a turn.
#[derive(Default)]
pub struct ToolRegistry {
    local: RwLock<HashMap<String, Arc<dyn ToolHandler>>>,
    remote: RwLock<Vec<RemoteTools>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, handler: Arc<dyn ToolHandler>) {
        let name = handler.spec().name;
        let mut local = self.local.write().await;
        if local.insert(name.clone(), handler).is_some() {
            tracing::warn!(tool = %name, "replacing previously registered tool");
        }
    }

    /// Connect a remote source and merge its tool catalog. The catalog is
    /// listed once at registration; remote servers that change their tool
    /// set require re-registration.
    pub async fn add_remote_source(&self, source: Arc<dyn RemoteToolSource>) -> Result<()> {
        let tools = source.list_tools().await?;
        tracing::info!(
            source = source.name(),
            count = tools.len(),
            "merged remote tool source"
        );
        self.remote.write().await.push(RemoteTools { source, tools });
        Ok(())
    }

    /// All tools in model-facing format. Remote tools whose plain name
    /// collides with another entry are advertised under their qualified name.
    pub async fn llm_tools(&self) -> Vec<Tool> {
        let local = self.local.read().await;
        let remote = self.remote.read().await;

        let mut tools: Vec<Tool> = local.values().map(|h| h.spec().to_llm_tool()).collect();

        for entry in remote.iter() {
            for spec in &entry.tools {
                let collides = local.contains_key(&spec.name)
                    || remote
                        .iter()
                        .filter(|other| other.source.name() != entry.source.name())
                        .any(|other| other.tools.iter().any(|t| t.name == spec.name));
                if collides {
                    let qualified = format!("{}:{}", entry.source.name(), spec.name);
                    tools.push(spec.to_llm_tool_named(&qualified));
                } else {
                    tools.push(spec.to_llm_tool());
                }
            }
        }

        tools
    }

    /// Execute a tool by name, always producing a textual result.
    pub async fn invoke(&self, name: &str, args: Value, actor: Option<&ActorContext>) -> String {
        // Local tools take precedence over remote ones.
        if let Some(handler) = self.local.read().await.get(name).cloned() {
            return match handler.call(args, actor).await {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!(tool = name, error = %e, "tool execution failed");
                    format!("Tool execution failed: {}", e)
                }
            };
        }

        let remote = self.remote.read().await;

        // Qualified `source:tool` lookup.
        if let Some((source_name, tool_name)) = name.split_once(':') {
            if let Some(entry) = remote.iter().find(|e| e.source.name() == source_name) {
                if entry.tools.iter().any(|t| t.name == tool_name) {
                    return Self::call_remote(&entry.source, tool_name, args).await;
                }
            }
            return format!("Tool '{}' not found", name);
        }

        // Unqualified lookup across sources.
        let matches: Vec<&RemoteTools> = remote
            .iter()
            .filter(|e| e.tools.iter().any(|t| t.name == name))
            .collect();

        match matches.as_slice() {
            [] => format!("Tool '{}' not found", name),
            [entry] => Self::call_remote(&entry.source, name, args).await,
            many => {
                let sources: Vec<String> = many
                    .iter()
                    .map(|e| format!("{}:{}", e.source.name(), name))
                    .collect();
                format!(
                    "Tool name '{}' is ambiguous; use a qualified name: {}",
                    name,
                    sources.join(", ")
                )
            }
        }
    }

    async fn call_remote(source: &Arc<dyn RemoteToolSource>, name: &str, args: Value) -> String {
        match source.call_tool(name, args).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(source = source.name(), tool = name, error = %e, "remote tool failed");
                format!("Tool execution failed: {}", e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl ToolHandler for EchoTool {
        fn spec(&self) -> ToolSpec {
            ToolSpec::new(
                "echo",
                "Echo the input back",
                serde_json::json!({"type": "object", "properties": {"text": {"type": "string"}}}),
            )
        }

        async fn call(&self, args: Value, _actor: Option<&ActorContext>) -> Result<String> {
            Ok(args["text"].as_str().unwrap_or_default().to_string())
        }
    }

    struct FailingTool;

    #[async_trait]
    impl ToolHandler for FailingTool {
        fn spec(&self) -> ToolSpec {
            ToolSpec::new("boom", "Always fails", serde_json::json!({"type": "object"}))
        }

        async fn call(&self, _args: Value, _actor: Option<&ActorContext>) -> Result<String> {
            anyhow::bail!("connection refused")
        }
    }

    struct FakeSource {
        name: &'static str,
        tools: Vec<&'static str>,
    }

    #[async_trait]
    impl RemoteToolSource for FakeSource {
        fn name(&self) -> &str {
            self.name
        }

        async fn list_tools(&self) -> Result<Vec<ToolSpec>> {
            Ok(self
                .tools
                .iter()
                .map(|t| ToolSpec::new(*t, "remote tool", serde_json::json!({"type": "object"})))
                .collect())
        }

        async fn call_tool(&self, name: &str, _args: Value) -> Result<String> {
            Ok(format!("{} handled {}", self.name, name))
        }
    }

    #[tokio::test]
    async fn local_invoke_and_error_to_text() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).await;
        registry.register(Arc::new(FailingTool)).await;

        let out = registry
            .invoke("echo", serde_json::json!({"text": "hi"}), None)
            .await;
        assert_eq!(out, "hi");

        let out = registry.invoke("boom", serde_json::json!({}), None).await;
        assert!(out.starts_with("Tool execution failed:"));
        assert!(out.contains("connection refused"));
    }

    #[tokio::test]
    async fn unknown_tool_is_textual() {
        let registry = ToolRegistry::new();
        let out = registry.invoke("nope", serde_json::json!({}), None).await;
        assert_eq!(out, "Tool 'nope' not found");
    }

    #[tokio::test]
    async fn qualified_and_unqualified_remote_lookup() {
        let registry = ToolRegistry::new();
        registry
            .add_remote_source(Arc::new(FakeSource {
                name: "hrms",
                tools: vec!["lookup"],
            }))
            .await
            .unwrap();

        let out = registry
            .invoke("hrms:lookup", serde_json::json!({}), None)
            .await;
        assert_eq!(out, "hrms handled lookup");

        // Unqualified falls back to the single source that has it.
        let out = registry.invoke("lookup", serde_json::json!({}), None).await;
        assert_eq!(out, "hrms handled lookup");
    }

    #[tokio::test]
    async fn colliding_remote_names_require_qualification() {
        let registry = ToolRegistry::new();
        registry
            .add_remote_source(Arc::new(FakeSource {
                name: "alpha",
                tools: vec!["lookup"],
            }))
            .await
            .unwrap();
        registry
            .add_remote_source(Arc::new(FakeSource {
                name: "beta",
                tools: vec!["lookup"],
            }))
            .await
            .unwrap();

        let out = registry.invoke("lookup", serde_json::json!({}), None).await;
        assert!(out.contains("ambiguous"));
        assert!(out.contains("alpha:lookup"));

        let out = registry
            .invoke("beta:lookup", serde_json::json!({}), None)
            .await;
        assert_eq!(out, "beta handled lookup");

        // Advertised catalog qualifies both colliding entries.
        let tools = registry.llm_tools().await;
        let names: Vec<_> = tools.iter().map(|t| t.function.name.as_str()).collect();
        assert!(names.contains(&"alpha:lookup"));
        assert!(names.contains(&"beta:lookup"));
    }
}
