use crate::registry::{RemoteToolSource, ToolSpec};
use anyhow::Result;
use async_trait::async_trait;
use rmcp::model::CallToolRequestParam;
use rmcp::service::{RoleClient, RunningService};
use rmcp::transport::{ConfigureCommandExt, StreamableHttpClientTransport, TokioChildProcess};
use rmcp::ServiceExt;
use serde_json::Value;
use std::process::Stdio;
use tokio::process::Command;

/// Remote tool source speaking the Model Context Protocol.
///
/// Supports streamable-HTTP servers and locally spawned stdio servers.
pub struct McpSource {
    server_name: String,
    service: RunningService<RoleClient, ()>,
}

impl McpSource {
    /// Connect to an MCP server over streamable HTTP.
    pub async fn connect_http(server_name: impl Into<String>, url: &str) -> Result<Self> {
        let transport = StreamableHttpClientTransport::from_uri(url);
        let service = ().serve(transport).await?;

        Ok(Self {
            server_name: server_name.into(),
            service,
        })
    }

    /// Spawn a local MCP server process and connect over stdio.
    pub async fn connect_stdio(
        server_name: impl Into<String>,
        command: impl Into<String>,
        args: Vec<String>,
    ) -> Result<Self> {
        let command = command.into();
        let cmd = Command::new(&command).configure(|c| {
            for arg in &args {
                c.arg(arg);
            }
            c.stdin(Stdio::piped());
            c.stdout(Stdio::piped());
            c.stderr(Stdio::inherit());
        });

        let transport = TokioChildProcess::new(cmd)?;
        let service = ().serve(transport).await?;

        Ok(Self {
            server_name: server_name.into(),
            service,
        })
    }
}

#[async_trait]
impl RemoteToolSource for McpSource {
    fn name(&self) -> &str {
        &self.server_name
    }

    async fn list_tools(&self) -> Result<Vec<ToolSpec>> {
        let result = self.service.list_tools(Default::default()).await?;

        Ok(result
            .tools
            .into_iter()
            .map(|tool| {
                ToolSpec::new(
                    tool.name.to_string(),
                    tool.description
                        .map(|d| d.to_string())
                        .unwrap_or_default(),
                    Value::Object((*tool.input_schema).clone()),
                )
            })
            .collect())
    }

    async fn call_tool(&self, name: &str, args: Value) -> Result<String> {
        let result = self
            .service
            .call_tool(CallToolRequestParam {
                name: name.to_string().into(),
                arguments: args.as_object().cloned(),
            })
            .await?;

        let text: Vec<String> = result
            .content
            .iter()
            .filter_map(|c| c.as_text().map(|t| t.text.clone()))
            .collect();

        if result.is_error.unwrap_or(false) {
            anyhow::bail!("MCP tool '{}' returned an error: {}", name, text.join("\n"));
        }

        Ok(text.join("\n"))
    }
}
