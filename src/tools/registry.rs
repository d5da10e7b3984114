//! Tool registry - name-keyed dispatch of the database tools

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::agent::types::ToolDefinition;
use crate::database::DatabaseGateway;
use crate::error::Result;

use super::sql::{ToolInvocation, ToolKind, ToolOutput};
use super::traits::{ToolCall, ToolResult};

/// Registry of available tools, all backed by one gateway
#[derive(Clone)]
pub struct ToolRegistry {
    gateway: Arc<dyn DatabaseGateway>,
    tools: HashMap<&'static str, ToolKind>,
}

impl ToolRegistry {
    /// Create a registry exposing every database tool
    pub fn new(gateway: Arc<dyn DatabaseGateway>) -> Self {
        Self::with_tools(gateway, &ToolKind::ALL)
    }

    /// Create a registry exposing only `kinds`
    pub fn with_tools(gateway: Arc<dyn DatabaseGateway>, kinds: &[ToolKind]) -> Self {
        ToolRegistry {
            gateway,
            tools: kinds.iter().map(|kind| (kind.name(), *kind)).collect(),
        }
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<ToolKind> {
        self.tools.get(name).copied()
    }

    /// Tool definitions in a stable order
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.kinds().into_iter().map(ToolKind::to_definition).collect()
    }

    /// Tool kinds in the same order as [`ToolRegistry::definitions`]
    pub fn kinds(&self) -> Vec<ToolKind> {
        ToolKind::ALL
            .into_iter()
            .filter(|kind| self.tools.contains_key(kind.name()))
            .collect()
    }

    /// Execute a model-generated tool call.
    ///
    /// Unknown tools yield a failed result; arguments that do not match the
    /// tool's schema yield `Error::InvalidInput` without touching the database.
    pub async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
        let Some(kind) = self.get(&call.name) else {
            return Ok(ToolResult::failure(format!("Unknown tool: {}", call.name)));
        };

        let invocation = kind.parse_call(call)?;
        let output = self.invoke(invocation).await?;
        Ok(output.into_tool_result())
    }

    /// Run a validated invocation against the gateway
    pub async fn invoke(&self, invocation: ToolInvocation) -> Result<ToolOutput> {
        match invocation {
            ToolInvocation::RunPostgresqlQuery(args) => {
                info!(query = %args.query, "run_postgresql_query");
                let result = self.gateway.run_query(&args.query).await;
                debug!(failed = result.is_failure(), "Query finished");
                Ok(ToolOutput::Query(result))
            }
            ToolInvocation::DescribeTables(args) => {
                info!(tables = ?args.tables_names, "describe_tables");
                let columns = self.gateway.describe_tables(&args.tables_names).await?;
                Ok(ToolOutput::Columns(columns))
            }
        }
    }

    /// The gateway behind the tools
    pub fn gateway(&self) -> &Arc<dyn DatabaseGateway> {
        &self.gateway
    }

    /// Get tool count
    pub fn count(&self) -> usize {
        self.tools.len()
    }

    /// List tool names
    pub fn names(&self) -> Vec<&'static str> {
        self.kinds().into_iter().map(ToolKind::name).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::QueryResult;
    use crate::testing::InMemoryGateway;
    use serde_json::json;

    fn call(name: &str, arguments: serde_json::Value) -> ToolCall {
        ToolCall {
            id: "call_1".into(),
            name: name.into(),
            arguments,
        }
    }

    #[test]
    fn test_registry_lists_both_tools() {
        let registry = ToolRegistry::new(Arc::new(InMemoryGateway::new()));
        assert_eq!(registry.count(), 2);
        assert_eq!(registry.names(), vec!["run_postgresql_query", "describe_tables"]);
        assert!(registry.get("describe_tables").is_some());
        assert!(registry.get("unknown").is_none());
    }

    #[test]
    fn test_subset_registry() {
        let registry = ToolRegistry::with_tools(
            Arc::new(InMemoryGateway::new()),
            &[ToolKind::DescribeTables],
        );
        let defs = registry.definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].function.name, "describe_tables");
    }

    #[tokio::test]
    async fn test_execute_runs_query() {
        let gateway = Arc::new(InMemoryGateway::new().with_result(QueryResult::Executed));
        let registry = ToolRegistry::new(gateway.clone());

        let result = registry
            .execute(&call(
                "run_postgresql_query",
                json!({"query": "INSERT INTO customer (name) VALUES ('Acme')"}),
            ))
            .await
            .unwrap();

        assert_eq!(result.to_string(), "Query executed.");
        assert_eq!(
            gateway.executed(),
            vec!["INSERT INTO customer (name) VALUES ('Acme')"]
        );
    }

    #[tokio::test]
    async fn test_execute_describes_tables() {
        let gateway = Arc::new(InMemoryGateway::new().with_table("tasks", &["id", "title"]));
        let registry = ToolRegistry::new(gateway);

        let result = registry
            .execute(&call("describe_tables", json!({"tables_names": ["tasks"]})))
            .await
            .unwrap();

        assert_eq!(result.to_string(), r#"[["tasks","id"],["tasks","title"]]"#);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_failed_result() {
        let registry = ToolRegistry::new(Arc::new(InMemoryGateway::new()));
        let result = registry.execute(&call("drop_everything", json!({}))).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.to_string(), "Error: Unknown tool: drop_everything");
    }

    #[tokio::test]
    async fn test_invalid_arguments_never_reach_gateway() {
        let gateway = Arc::new(InMemoryGateway::new());
        let registry = ToolRegistry::new(gateway.clone());

        let err = registry
            .execute(&call("run_postgresql_query", json!({"sql": "SELECT 1"})))
            .await
            .unwrap_err();

        assert!(err.is_client_error());
        assert!(gateway.executed().is_empty());
    }
}
