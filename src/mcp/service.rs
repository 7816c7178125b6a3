//! MCP service implementation using rmcp.
//!
//! This module defines the GateService struct exposing the tool surface via
//! the MCP protocol using the rmcp framework's macros. Tool bodies live in
//! `tools`; this layer only deserializes parameters and forwards calls.

use std::sync::Arc;

use rmcp::{
    ServerHandler,
    handler::server::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::{Implementation, ProtocolVersion, ServerCapabilities, ServerInfo},
    schemars::JsonSchema,
    tool, tool_handler, tool_router,
};
use serde::Deserialize;

use crate::tools::{self, GateContext};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ExecuteSqlInput {
    /// SQL statement to execute
    pub sql: String,
    /// Output format: "table" (default), "json", or "csv"
    #[serde(default)]
    pub format: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListTablesInput {
    /// Restrict the listing to one schema
    #[serde(default)]
    pub schema: Option<String>,
    /// Maximum number of tables to return (default 200, capped at 1000)
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SchemaDiscoveryInput {
    /// Restrict discovery to one schema
    #[serde(default)]
    pub schema: Option<String>,
}

#[derive(Clone)]
pub struct GateService {
    /// Shared context for all tool calls
    ctx: Arc<GateContext>,
    /// Tool router for MCP tool dispatch (auto-generated)
    tool_router: ToolRouter<Self>,
}

impl GateService {
    pub fn new(ctx: Arc<GateContext>) -> Self {
        Self {
            ctx,
            tool_router: Self::tool_router(),
        }
    }

    pub fn context(&self) -> &Arc<GateContext> {
        &self.ctx
    }
}

#[tool_router]
impl GateService {
    #[tool(
        description = "Execute a SQL statement against the connected database.\nStatements are checked against the server's safety policy before running; in read-only mode only SELECT statements are allowed.\nResults are capped at the configured row limit and rendered as table (default), json, or csv.\nFailures come back as a single line: ERROR: <kind>: <detail>."
    )]
    async fn execute_sql(&self, Parameters(input): Parameters<ExecuteSqlInput>) -> String {
        tools::query::execute_sql(&self.ctx, &input.sql, input.format.as_deref().unwrap_or(""))
            .await
    }

    #[tool(description = "List schemas (namespaces) visible in the connected database.")]
    async fn list_schemas(&self) -> String {
        tools::schema::list_schemas(&self.ctx).await
    }

    #[tool(
        description = "List tables and views.\nOptionally filter by schema name. Default limit is 200 rows, capped at 1000."
    )]
    async fn list_tables(&self, Parameters(input): Parameters<ListTablesInput>) -> String {
        tools::schema::list_tables(&self.ctx, input.schema.as_deref(), input.limit).await
    }

    #[tool(
        description = "Discover the full column inventory of the database: every table with its columns, data types, and nullability.\nOptionally filter by schema name."
    )]
    async fn schema_discovery(
        &self,
        Parameters(input): Parameters<SchemaDiscoveryInput>,
    ) -> String {
        tools::schema::schema_discovery(&self.ctx, input.schema.as_deref()).await
    }

    #[tool(
        description = "Get server identity and effective limits: database type, name, server version, query mode, row cap, and timeout."
    )]
    async fn get_database_info(&self) -> String {
        tools::schema::get_database_info(&self.ctx).await
    }

    #[tool(
        description = "Describe the active safety policy: query mode, banned statement verbs, and limits.\nCall this before composing queries to learn what will be rejected."
    )]
    async fn get_policy_info(&self) -> String {
        tools::status::get_policy_info(&self.ctx).await
    }

    #[tool(
        description = "Check database connectivity with a quick round-trip probe (5 second deadline)."
    )]
    async fn check_db_connection(&self) -> String {
        tools::status::check_db_connection(&self.ctx).await
    }
}

#[tool_handler]
impl ServerHandler for GateService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "sqlgate-mcp".to_owned(),
                title: Some("SQL Gate MCP Server".to_owned()),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Policy-gated SQL access to one configured database.\n\
                \n\
                ## Workflow\n\
                1. Call `get_policy_info` to learn the active query mode and limits\n\
                2. Explore structure with `list_schemas`, `list_tables`, and `schema_discovery`\n\
                3. Run statements with `execute_sql`\n\
                \n\
                ## Policy\n\
                - In read-only mode only SELECT statements are accepted; write and DDL verbs are rejected before execution\n\
                - Multi-statement requests are rejected; send one statement per call\n\
                - Results are truncated at the configured row cap; add your own LIMIT/ORDER BY for paging\n\
                \n\
                ## Errors\n\
                Failures are returned as a single line `ERROR: <kind>: <detail>` in the tool result, not as protocol errors."
                    .to_string(),
            ),
        }
    }
}
