//! The database tools offered to the model
//!
//! The set is closed: each [`ToolKind`] has a typed argument struct whose JSON
//! schema is advertised to the model and enforced before the gateway runs.

use schemars::gen::SchemaSettings;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::traits::{ToolCall, ToolResult};
use crate::agent::types::{FunctionDefinition, ToolDefinition};
use crate::database::{ColumnInfo, QueryResult};
use crate::error::Result;

/// Arguments of `run_postgresql_query`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RunQueryArgs {
    /// The PostgreSQL statement to execute
    pub query: String,
}

/// Arguments of `describe_tables`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct DescribeTablesArgs {
    /// Names of the tables to describe
    pub tables_names: Vec<String>,
}

/// Every tool the registry can dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    RunPostgresqlQuery,
    DescribeTables,
}

impl ToolKind {
    pub const ALL: [ToolKind; 2] = [ToolKind::RunPostgresqlQuery, ToolKind::DescribeTables];

    pub fn name(self) -> &'static str {
        match self {
            ToolKind::RunPostgresqlQuery => "run_postgresql_query",
            ToolKind::DescribeTables => "describe_tables",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ToolKind::RunPostgresqlQuery => "Run a postgresql query.",
            ToolKind::DescribeTables => {
                "Given a list of table names, returns the column names of each table."
            }
        }
    }

    /// JSON Schema of the arguments, without the meta-schema header
    pub fn parameters_schema(self) -> Value {
        match self {
            ToolKind::RunPostgresqlQuery => schema_of::<RunQueryArgs>(),
            ToolKind::DescribeTables => schema_of::<DescribeTablesArgs>(),
        }
    }

    /// Function-calling definition sent with every model request
    pub fn to_definition(self) -> ToolDefinition {
        ToolDefinition {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: self.name().to_string(),
                description: self.description().to_string(),
                parameters: self.parameters_schema(),
            },
        }
    }

    /// Validate a model-generated call against this tool's argument type
    pub fn parse_call(self, call: &ToolCall) -> Result<ToolInvocation> {
        Ok(match self {
            ToolKind::RunPostgresqlQuery => ToolInvocation::RunPostgresqlQuery(call.parse_arguments()?),
            ToolKind::DescribeTables => ToolInvocation::DescribeTables(call.parse_arguments()?),
        })
    }
}

impl std::str::FromStr for ToolKind {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        ToolKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| crate::error::Error::InvalidInput(format!("Unknown tool: {}", s)))
    }
}

/// A validated tool call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolInvocation {
    RunPostgresqlQuery(RunQueryArgs),
    DescribeTables(DescribeTablesArgs),
}

impl ToolInvocation {
    pub fn kind(&self) -> ToolKind {
        match self {
            ToolInvocation::RunPostgresqlQuery(_) => ToolKind::RunPostgresqlQuery,
            ToolInvocation::DescribeTables(_) => ToolKind::DescribeTables,
        }
    }
}

/// Typed result of a tool invocation
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Query(QueryResult),
    Columns(Vec<ColumnInfo>),
}

impl ToolOutput {
    /// Render for the model.
    ///
    /// Query failures are still successful tool results: the error text is
    /// ordinary output the model is expected to read and rephrase.
    pub fn into_tool_result(self) -> ToolResult {
        match self {
            ToolOutput::Query(QueryResult::Failed(ref err)) => ToolResult::success_with_metadata(
                self.to_string(),
                serde_json::json!({ "error_kind": err.kind, "sqlstate": err.code }),
            ),
            ToolOutput::Query(ref result) => ToolResult::success(result.to_string()),
            ToolOutput::Columns(ref columns) => {
                let tuples: Vec<(&str, &str)> = columns
                    .iter()
                    .map(|c| (c.table_name.as_str(), c.column_name.as_str()))
                    .collect();
                ToolResult::success(serde_json::to_string(&tuples).unwrap_or_default())
            }
        }
    }
}

impl std::fmt::Display for ToolOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolOutput::Query(result) => write!(f, "{}", result),
            ToolOutput::Columns(columns) => write!(f, "{} columns", columns.len()),
        }
    }
}

fn schema_of<T: JsonSchema>() -> Value {
    let generator = SchemaSettings::draft07()
        .with(|s| {
            s.inline_subschemas = true;
            s.meta_schema = None;
        })
        .into_generator();
    let root = generator.into_root_schema_for::<T>();
    let mut value = serde_json::to_value(root).unwrap_or_else(|_| serde_json::json!({"type": "object"}));
    if let Some(obj) = value.as_object_mut() {
        obj.remove("title");
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{QueryError, QueryErrorKind};
    use serde_json::json;

    fn call(name: &str, arguments: Value) -> ToolCall {
        ToolCall {
            id: "call_1".into(),
            name: name.into(),
            arguments,
        }
    }

    #[test]
    fn test_tool_names() {
        assert_eq!(
            "run_postgresql_query".parse::<ToolKind>().unwrap(),
            ToolKind::RunPostgresqlQuery
        );
        assert_eq!(
            "describe_tables".parse::<ToolKind>().unwrap(),
            ToolKind::DescribeTables
        );
        assert!("drop_database".parse::<ToolKind>().is_err());
    }

    #[test]
    fn test_run_query_schema() {
        let schema = ToolKind::RunPostgresqlQuery.parameters_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["query"]["type"], "string");
        assert_eq!(schema["required"], json!(["query"]));
        assert_eq!(schema["additionalProperties"], json!(false));
        assert!(schema.get("$schema").is_none());
    }

    #[test]
    fn test_describe_tables_schema() {
        let schema = ToolKind::DescribeTables.parameters_schema();
        assert_eq!(schema["properties"]["tables_names"]["type"], "array");
        assert_eq!(schema["properties"]["tables_names"]["items"]["type"], "string");
        assert_eq!(schema["required"], json!(["tables_names"]));
    }

    #[test]
    fn test_parse_valid_calls() {
        let invocation = ToolKind::RunPostgresqlQuery
            .parse_call(&call("run_postgresql_query", json!({"query": "SELECT 1"})))
            .unwrap();
        assert_eq!(
            invocation,
            ToolInvocation::RunPostgresqlQuery(RunQueryArgs {
                query: "SELECT 1".into()
            })
        );

        let invocation = ToolKind::DescribeTables
            .parse_call(&call("describe_tables", json!({"tables_names": ["tasks"]})))
            .unwrap();
        assert_eq!(invocation.kind(), ToolKind::DescribeTables);
    }

    #[test]
    fn test_parse_rejects_schema_violations() {
        let missing = ToolKind::RunPostgresqlQuery.parse_call(&call("run_postgresql_query", json!({})));
        assert!(missing.is_err());

        let wrong_type = ToolKind::DescribeTables
            .parse_call(&call("describe_tables", json!({"tables_names": "tasks"})));
        assert!(wrong_type.is_err());

        let extra = ToolKind::RunPostgresqlQuery.parse_call(&call(
            "run_postgresql_query",
            json!({"query": "SELECT 1", "dry_run": true}),
        ));
        assert!(extra.is_err());
    }

    #[test]
    fn test_failed_query_is_successful_tool_output() {
        let output = ToolOutput::Query(QueryResult::Failed(QueryError {
            kind: QueryErrorKind::ConstraintViolation,
            code: Some("23505".into()),
            message: "duplicate key value violates unique constraint \"customer_pkey\"".into(),
        }));
        let result = output.into_tool_result();
        assert!(result.success);
        assert!(result
            .to_string()
            .starts_with("The following error occurred: duplicate key"));
        assert_eq!(
            result.metadata.unwrap()["error_kind"],
            json!("constraint_violation")
        );
    }

    #[test]
    fn test_columns_render_as_tuples() {
        let output = ToolOutput::Columns(vec![
            ColumnInfo {
                table_name: "tasks".into(),
                column_name: "id".into(),
            },
            ColumnInfo {
                table_name: "tasks".into(),
                column_name: "title".into(),
            },
        ]);
        assert_eq!(
            output.into_tool_result().to_string(),
            r#"[["tasks","id"],["tasks","title"]]"#
        );
    }
}
