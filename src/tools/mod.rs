//! Tools module - the database operations the agent may call
//!
//! - **run_postgresql_query**: execute SQL text through the gateway
//! - **describe_tables**: list the columns of named tables
//!
//! Calls are validated against each tool's typed arguments before the
//! gateway is touched, then dispatched by name through the `ToolRegistry`.

mod registry;
mod sql;
mod traits;

pub use registry::ToolRegistry;
pub use sql::{DescribeTablesArgs, RunQueryArgs, ToolInvocation, ToolKind, ToolOutput};
pub use traits::{ToolCall, ToolResult};
