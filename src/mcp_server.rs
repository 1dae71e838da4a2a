use crate::client::GotoUsageClient;
use crate::types::*;

use anyhow::{Context, Result};
use rmcp::{
    ErrorData as McpError, RoleServer, ServerHandler, ServiceExt,
    handler::server::{router::prompt::PromptRouter, tool::ToolRouter, wrapper::Parameters},
    model::*,
    prompt, prompt_handler, prompt_router,
    service::RequestContext,
    tool, tool_handler, tool_router,
};
use serde::Serialize;
use std::sync::Arc;

fn to_json<T: Serialize>(response: &T) -> Result<String, String> {
    serde_json::to_string_pretty(response).map_err(|e| format!("Serialization failed: {}", e))
}

#[derive(Clone)]
pub struct GotoUsageMcpServer {
    client: Arc<GotoUsageClient>,
    tool_router: ToolRouter<Self>,
    prompt_router: PromptRouter<Self>,
}

impl GotoUsageMcpServer {
    /// Create a server with the default configuration
    pub fn new() -> Result<Self> {
        let client = GotoUsageClient::new()?;
        Self::with_client(Arc::new(client))
    }

    /// Create a server around an existing client
    pub fn with_client(client: Arc<GotoUsageClient>) -> Result<Self> {
        Ok(Self {
            client,
            tool_router: Self::tool_router(),
            prompt_router: Self::prompt_router(),
        })
    }

    pub fn client(&self) -> &GotoUsageClient {
        &self.client
    }
}

#[tool_router(router = tool_router)]
impl GotoUsageMcpServer {
    #[tool(
        description = "Find usages of the class, function or variable defined at (or nearest above) a line of a JavaScript/TypeScript file. Only files that transitively import the defining file are scanned, using a cached import dependency graph that is built on first use."
    )]
    async fn goto_usage(
        &self,
        Parameters(req): Parameters<GotoUsageRequest>,
    ) -> Result<String, String> {
        req.validate()?;

        let response = self
            .client
            .goto_usage(req)
            .await
            .map_err(|e| format!("{:#}", e))?;

        to_json(&response)
    }

    #[tool(description = "Find usages of a named symbol defined in a given file")]
    async fn find_usages(
        &self,
        Parameters(req): Parameters<FindUsagesRequest>,
    ) -> Result<String, String> {
        req.validate()?;

        let response = self
            .client
            .find_usages(req)
            .await
            .map_err(|e| format!("{:#}", e))?;

        to_json(&response)
    }

    #[tool(description = "Rebuild a project's import dependency graph from scratch")]
    async fn rebuild_dependency_graph(
        &self,
        Parameters(req): Parameters<RebuildRequest>,
    ) -> Result<String, String> {
        req.validate()?;

        let response = self
            .client
            .rebuild_dependency_graph(req)
            .await
            .map_err(|e| format!("{:#}", e))?;

        to_json(&response)
    }

    #[tool(description = "Drop every cached dependency graph, in memory and on disk")]
    async fn clear_dependency_graphs(
        &self,
        Parameters(_req): Parameters<ClearRequest>,
    ) -> Result<String, String> {
        let response = self
            .client
            .clear_dependency_graphs()
            .await
            .map_err(|e| format!("{:#}", e))?;

        to_json(&response)
    }

    #[tool(description = "Drop the cached dependency graph of one project")]
    async fn invalidate_dependency_graph(
        &self,
        Parameters(req): Parameters<InvalidateRequest>,
    ) -> Result<String, String> {
        req.validate()?;

        let response = self
            .client
            .invalidate_dependency_graph(req)
            .await
            .map_err(|e| format!("{:#}", e))?;

        to_json(&response)
    }

    #[tool(
        description = "Notify that a file was saved or deleted so the cached dependency graph stays current"
    )]
    async fn file_saved(
        &self,
        Parameters(req): Parameters<FileSavedRequest>,
    ) -> Result<String, String> {
        req.validate()?;

        let response = self
            .client
            .file_saved(req)
            .await
            .map_err(|e| format!("{:#}", e))?;

        to_json(&response)
    }

    #[tool(description = "List what a file imports and which files import it")]
    async fn file_dependencies(
        &self,
        Parameters(req): Parameters<FileDependenciesRequest>,
    ) -> Result<String, String> {
        req.validate()?;

        let response = self
            .client
            .file_dependencies(req)
            .await
            .map_err(|e| format!("{:#}", e))?;

        to_json(&response)
    }

    #[tool(description = "Get statistics about the cached dependency graphs")]
    async fn graph_statistics(
        &self,
        Parameters(req): Parameters<StatisticsRequest>,
    ) -> Result<String, String> {
        let response = self
            .client
            .graph_statistics(req)
            .await
            .map_err(|e| format!("{:#}", e))?;

        to_json(&response)
    }
}

// Prompts for slash commands
#[prompt_router]
impl GotoUsageMcpServer {
    #[prompt(
        name = "usages",
        description = "Find usages of the symbol defined at a line of a file"
    )]
    async fn usages_prompt(
        &self,
        Parameters(args): Parameters<serde_json::Value>,
    ) -> Result<GetPromptResult, McpError> {
        let file = args.get("file").and_then(|v| v.as_str()).unwrap_or("");
        let line = args.get("line").and_then(|v| v.as_u64()).unwrap_or(1);

        let messages = vec![PromptMessage::new_text(
            PromptMessageRole::User,
            format!(
                "Please find usages of the symbol defined at line {} of '{}'.",
                line, file
            ),
        )];

        Ok(GetPromptResult {
            description: Some(format!("Find usages from {}:{}", file, line)),
            messages,
        })
    }

    #[prompt(
        name = "rebuild",
        description = "Rebuild the dependency graph of a project folder"
    )]
    async fn rebuild_prompt(
        &self,
        Parameters(args): Parameters<serde_json::Value>,
    ) -> Result<Vec<PromptMessage>, McpError> {
        let path = args.get("path").and_then(|v| v.as_str()).unwrap_or(".");

        Ok(vec![PromptMessage::new_text(
            PromptMessageRole::User,
            format!(
                "Please rebuild the dependency graph for the project at '{}'.",
                path
            ),
        )])
    }

    #[prompt(
        name = "stats",
        description = "Get statistics about the cached dependency graphs"
    )]
    async fn stats_prompt(&self) -> Vec<PromptMessage> {
        vec![PromptMessage::new_text(
            PromptMessageRole::User,
            "Please get statistics about the cached dependency graphs.",
        )]
    }
}

#[tool_handler(router = self.tool_router)]
#[prompt_handler]
impl ServerHandler for GotoUsageMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::default(),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_prompts()
                .build(),
            server_info: Implementation {
                name: "goto-usage".into(),
                title: Some("Goto Usage - Find Symbol Usages via Import Graphs".into()),
                version: env!("CARGO_PKG_VERSION").into(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Find usages of JavaScript/TypeScript symbols. \
                Use goto_usage with a file and line, or find_usages with a symbol name. \
                Call file_saved after edits and rebuild_dependency_graph after large changes."
                    .into(),
            ),
        }
    }
}

impl GotoUsageMcpServer {
    /// Serve MCP over stdin/stdout until the peer disconnects
    pub async fn serve_stdio(self) -> Result<()> {
        tracing::info!("Starting goto-usage MCP server");

        let transport = rmcp::transport::io::stdio();

        self.serve(transport)
            .await
            .context("Failed to start MCP server")?
            .waiting()
            .await?;

        Ok(())
    }
}
