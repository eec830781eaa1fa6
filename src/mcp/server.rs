//! MCP server implementation for docqa.
//!
//! Exposes conversation turns as an MCP tool and the loaded collections as
//! MCP resources. Store queries run under `spawn_blocking`.

use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    AnnotateAble, CallToolResult, Content, Implementation, ListResourceTemplatesResult,
    ListResourcesResult, PaginatedRequestParams, ProtocolVersion, RawResource, RawResourceTemplate,
    ReadResourceRequestParams, ReadResourceResult, ResourceContents, ServerCapabilities,
    ServerInfo,
};
use rmcp::service::RequestContext;
use rmcp::{ErrorData as McpError, RoleServer, ServerHandler, tool, tool_handler, tool_router};
use tracing::info;

use crate::agent::config::AgentConfig;
use crate::agent::orchestrator::Orchestrator;
use crate::retrieval::{CollectionInfo, RetrieverConfig, SqliteRetrieverProvider, SqliteStore, open_store};

use super::params::AskParams;

/// URI scheme for collection resources.
const URI_PREFIX: &str = "docqa://collections/";

/// Lists collections off the async runtime.
async fn collections(store: &SqliteStore) -> Result<Vec<CollectionInfo>, McpError> {
    let store = store.clone();
    tokio::task::spawn_blocking(move || store.collections())
        .await
        .map_err(|e| McpError::internal_error(format!("Task join error: {e}"), None))?
        .map_err(|e| McpError::internal_error(format!("Failed to list collections: {e}"), None))
}

/// docqa MCP server.
///
/// Provides the `ask` tool and one resource per loaded collection.
#[derive(Clone)]
pub struct DocQaMcpServer {
    tool_router: ToolRouter<Self>,
    retrieval: RetrieverConfig,
    store: SqliteStore,
    orchestrator: Arc<Orchestrator>,
}

#[tool_router]
impl DocQaMcpServer {
    /// Run one conversation turn and return the reply with its research report.
    #[tool(
        name = "ask",
        description = "Ask a question about the loaded documentation. Classifies the question, asks for clarification or declines when appropriate, otherwise plans research steps, searches the document collections in parallel and answers with inline [n] citations. Pass earlier messages in `conversation` to continue a conversation. Returns JSON with the reply, category, plan, queries and cited documents."
    )]
    async fn ask(
        &self,
        Parameters(params): Parameters<AskParams>,
    ) -> Result<CallToolResult, McpError> {
        if params.question.trim().is_empty() {
            return Err(McpError::invalid_params("question cannot be empty", None));
        }

        let output = self
            .orchestrator
            .run_turn(params.to_input())
            .await
            .map_err(|e| McpError::internal_error(format!("Turn failed: {e}"), None))?;
        info!(category = %output.category, "mcp ask complete");

        let json = serde_json::to_string_pretty(&output)
            .map_err(|e| McpError::internal_error(format!("Serialization error: {e}"), None))?;

        Ok(CallToolResult::success(vec![Content::text(json)]))
    }
}

#[tool_handler]
impl ServerHandler for DocQaMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            server_info: Implementation {
                name: "docqa".to_string(),
                title: Some("docqa MCP Server".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "docqa answers questions about loaded documentation collections with cited \
                 sources. Use the `ask` tool for questions. Browse collections via resources."
                    .to_string(),
            ),
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        let resources = collections(&self.store)
            .await?
            .into_iter()
            .map(|c| {
                let mut raw =
                    RawResource::new(format!("{URI_PREFIX}{}", c.name), format!("Collection: {}", c.name));
                raw.description = Some(format!(
                    "{} documents, embedding model {}",
                    c.document_count, c.embedding_model
                ));
                raw.mime_type = Some("application/json".to_string());
                raw.no_annotation()
            })
            .collect();

        Ok(ListResourcesResult {
            resources,
            next_cursor: None,
            meta: None,
        })
    }

    async fn read_resource(
        &self,
        ReadResourceRequestParams { uri, .. }: ReadResourceRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        let name = uri.strip_prefix(URI_PREFIX).ok_or_else(|| {
            McpError::invalid_params(
                format!("Invalid URI, expected {URI_PREFIX}{{collection}}: {uri}"),
                None,
            )
        })?;

        let info = collections(&self.store)
            .await?
            .into_iter()
            .find(|c| c.name == name)
            .ok_or_else(|| {
                McpError::resource_not_found(format!("Collection not found: {name}"), None)
            })?;

        let json = serde_json::to_string_pretty(&info)
            .map_err(|e| McpError::internal_error(format!("Serialization error: {e}"), None))?;

        Ok(ReadResourceResult {
            contents: vec![ResourceContents::text(json, uri.clone())],
        })
    }

    async fn list_resource_templates(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourceTemplatesResult, McpError> {
        let template = RawResourceTemplate {
            uri_template: format!("{URI_PREFIX}{{collection}}"),
            name: "Collection metadata".to_string(),
            title: None,
            description: Some(
                "Returns JSON metadata for the named collection: document count, embedding model and creation time."
                    .to_string(),
            ),
            mime_type: Some("application/json".to_string()),
            icons: None,
        };

        Ok(ListResourceTemplatesResult {
            resource_templates: vec![template.no_annotation()],
            next_cursor: None,
            meta: None,
        })
    }
}

impl DocQaMcpServer {
    /// Returns the retrieval configuration the server was built from.
    #[must_use]
    pub const fn retrieval(&self) -> &RetrieverConfig {
        &self.retrieval
    }

    /// Creates a new MCP server.
    ///
    /// # Errors
    ///
    /// Returns an error if the agent configuration cannot be loaded from
    /// environment variables, a model names an unsupported provider, or the
    /// document store cannot be opened.
    pub fn new(retrieval: RetrieverConfig) -> Result<Self, crate::error::Error> {
        let config = AgentConfig::from_env().map_err(|e| {
            crate::error::CommandError::ExecutionFailed(format!("Agent configuration error: {e}"))
        })?;

        let store = open_store(&retrieval)?;
        let retrievers = Arc::new(SqliteRetrieverProvider::new(store.clone()));
        let orchestrator = Arc::new(Orchestrator::from_config(
            &config,
            retrievers,
            retrieval.search_options(),
        )?);

        Ok(Self {
            tool_router: Self::tool_router(),
            retrieval,
            store,
            orchestrator,
        })
    }
}
