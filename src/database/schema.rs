//! Catalog lookups: table listing and column inspection

use serde::Serialize;
use sqlx::postgres::PgConnection;
use tracing::debug;

use crate::error::Result;

/// One `(table_name, column_name)` pair from `information_schema.columns`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct ColumnInfo {
    pub table_name: String,
    pub column_name: String,
}

/// Names of the tables in the `public` schema, in catalog order
pub async fn list_tables(conn: &mut PgConnection) -> Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT table_name::text FROM information_schema.tables WHERE table_schema = 'public'",
    )
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(|(name,)| name).collect())
}

/// Column names for the given tables. An empty list matches nothing.
pub async fn describe_tables(
    conn: &mut PgConnection,
    table_names: &[String],
) -> Result<Vec<ColumnInfo>> {
    debug!(tables = ?table_names, "Describing tables");

    let columns: Vec<ColumnInfo> = sqlx::query_as(
        r#"
        SELECT table_name::text AS table_name, column_name::text AS column_name
        FROM information_schema.columns
        WHERE table_name::text = ANY($1)
        ORDER BY table_name, ordinal_position
        "#,
    )
    .bind(table_names.to_vec())
    .fetch_all(&mut *conn)
    .await?;

    debug!(count = columns.len(), "Described columns");
    Ok(columns)
}
