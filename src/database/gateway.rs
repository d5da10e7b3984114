//! Database gateway - the single owner of the PostgreSQL connection
//!
//! Every statement the agent produces goes through [`DatabaseGateway::run_query`].
//! Execution failures never escape as `Err`: they are rolled back and returned
//! as [`QueryResult::Failed`] so the model can read them like any other output.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use sqlx::postgres::{PgConnection, PgDatabaseError, PgRow};
use sqlx::{Connection, Executor};
use std::fmt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::schema::{self, ColumnInfo};
use super::value;
use crate::config::DatabaseConfig;
use crate::error::Result;

/// Operations the tools need from the database
#[async_trait]
pub trait DatabaseGateway: Send + Sync {
    /// Table names in the `public` schema
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Execute one piece of SQL text
    async fn run_query(&self, sql: &str) -> QueryResult;

    /// `(table_name, column_name)` pairs for the given tables
    async fn describe_tables(&self, table_names: &[String]) -> Result<Vec<ColumnInfo>>;
}

/// Outcome of [`DatabaseGateway::run_query`]
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    /// Rows fetched by a non-insert statement
    Rows(QueryRows),
    /// An insert was executed and committed
    Executed,
    /// The statement failed and was rolled back
    Failed(QueryError),
}

impl QueryResult {
    /// Confirmation text returned for committed inserts
    pub const EXECUTED: &'static str = "Query executed.";

    /// Prefix of the text returned for failed statements
    pub const ERROR_PREFIX: &'static str = "The following error occurred: ";

    pub fn is_failure(&self) -> bool {
        matches!(self, QueryResult::Failed(_))
    }
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryResult::Rows(rows) => {
                let text = serde_json::to_string(&rows.rows).map_err(|_| fmt::Error)?;
                f.write_str(&text)
            }
            QueryResult::Executed => f.write_str(Self::EXECUTED),
            QueryResult::Failed(err) => write!(f, "{}{}", Self::ERROR_PREFIX, err.message),
        }
    }
}

/// Rows returned by a statement, each row a tuple of decoded values
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryRows {
    /// Column names (empty when no rows came back)
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryRows {
    pub fn from_pg_rows(rows: &[PgRow]) -> Self {
        QueryRows {
            columns: rows.first().map(value::row_columns).unwrap_or_default(),
            rows: rows.iter().map(value::row_values).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Broad category of an execution failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryErrorKind {
    /// SQLSTATE class 23: unique, foreign key, not-null or check violation
    ConstraintViolation,
    /// SQLSTATE class 42: syntax error, undefined table or column
    InvalidStatement,
    /// SQLSTATE class 22: bad literal, division by zero, overflow
    DataException,
    /// Any other error reported by the server
    Database,
    /// The connection itself failed
    Connection,
    /// Driver-side failure (decoding, protocol misuse)
    Other,
}

impl QueryErrorKind {
    /// Classify by SQLSTATE class
    pub fn from_sqlstate(code: Option<&str>) -> Self {
        match code.map(|c| c.get(..2).unwrap_or(c)) {
            Some("23") => QueryErrorKind::ConstraintViolation,
            Some("42") => QueryErrorKind::InvalidStatement,
            Some("22") => QueryErrorKind::DataException,
            Some("08") => QueryErrorKind::Connection,
            _ => QueryErrorKind::Database,
        }
    }
}

/// Structured execution failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryError {
    pub kind: QueryErrorKind,
    /// SQLSTATE code when the server reported one
    pub code: Option<String>,
    pub message: String,
}

impl QueryError {
    pub fn from_sqlx(err: &sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) => {
                let code = db.code().map(|c| c.into_owned());
                let mut message = db.message().to_string();
                if let Some(detail) = db
                    .try_downcast_ref::<PgDatabaseError>()
                    .and_then(|pg| pg.detail())
                {
                    message.push_str("\nDETAIL: ");
                    message.push_str(detail);
                }
                QueryError {
                    kind: QueryErrorKind::from_sqlstate(code.as_deref()),
                    code,
                    message,
                }
            }
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => QueryError {
                kind: QueryErrorKind::Connection,
                code: None,
                message: err.to_string(),
            },
            _ => QueryError {
                kind: QueryErrorKind::Other,
                code: None,
                message: err.to_string(),
            },
        }
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// True when the statement should be committed and answered with
/// [`QueryResult::EXECUTED`] instead of fetched rows.
pub fn is_insert(sql: &str) -> bool {
    sql.trim_start()
        .get(..6)
        .is_some_and(|head| head.eq_ignore_ascii_case("insert"))
}

/// Blank SQL is an error, not an empty result set.
pub fn reject_blank(sql: &str) -> Option<QueryResult> {
    sql.trim().is_empty().then(|| {
        QueryResult::Failed(QueryError {
            kind: QueryErrorKind::InvalidStatement,
            code: None,
            message: "can't execute an empty query".to_string(),
        })
    })
}

/// Gateway over one injected PostgreSQL connection
pub struct PgGateway {
    conn: Mutex<PgConnection>,
}

impl PgGateway {
    /// Wrap an already-open connection
    pub fn new(conn: PgConnection) -> Self {
        PgGateway {
            conn: Mutex::new(conn),
        }
    }

    /// Open a connection from configuration and wrap it
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let conn = super::postgres::connect(config).await?;
        Ok(Self::new(conn))
    }
}

#[async_trait]
impl DatabaseGateway for PgGateway {
    async fn list_tables(&self) -> Result<Vec<String>> {
        let mut conn = self.conn.lock().await;
        let tables = schema::list_tables(&mut conn).await?;
        debug!(count = tables.len(), "Listed public tables");
        Ok(tables)
    }

    async fn run_query(&self, sql: &str) -> QueryResult {
        if let Some(rejected) = reject_blank(sql) {
            warn!("Refusing to run an empty query");
            return rejected;
        }

        let mut conn = self.conn.lock().await;
        debug!(sql, "Running query");

        let mut tx = match conn.begin().await {
            Ok(tx) => tx,
            Err(e) => {
                warn!("Could not open transaction: {}", e);
                return QueryResult::Failed(QueryError::from_sqlx(&e));
            }
        };

        // A bare `&str` runs over the simple query protocol: text-format
        // results, several statements allowed.
        let outcome = if is_insert(sql) {
            (&mut *tx).execute(sql).await.map(|done| {
                info!(rows_affected = done.rows_affected(), "Insert executed");
                QueryResult::Executed
            })
        } else {
            (&mut *tx).fetch_all(sql).await.map(|rows| {
                info!(rows = rows.len(), "Query returned rows");
                QueryResult::Rows(QueryRows::from_pg_rows(&rows))
            })
        };

        match outcome {
            Ok(result) => match tx.commit().await {
                Ok(()) => result,
                Err(e) => {
                    warn!("Commit failed: {}", e);
                    QueryResult::Failed(QueryError::from_sqlx(&e))
                }
            },
            Err(e) => {
                let error = QueryError::from_sqlx(&e);
                warn!(kind = ?error.kind, code = ?error.code, "Query failed, rolling back: {}", error.message);
                if let Err(rollback_err) = tx.rollback().await {
                    warn!("Rollback failed: {}", rollback_err);
                }
                QueryResult::Failed(error)
            }
        }
    }

    async fn describe_tables(&self, table_names: &[String]) -> Result<Vec<ColumnInfo>> {
        let mut conn = self.conn.lock().await;
        schema::describe_tables(&mut conn, table_names).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_is_insert() {
        assert!(is_insert("INSERT INTO customer (name) VALUES ('Acme')"));
        assert!(is_insert("insert into tasks values (1)"));
        assert!(is_insert("  \n\tInSeRt INTO project DEFAULT VALUES"));
        assert!(!is_insert("SELECT * FROM customer"));
        assert!(!is_insert("UPDATE tasks SET done = true"));
        assert!(!is_insert("ins"));
        assert!(!is_insert(""));
    }

    #[test]
    fn test_blank_sql_is_rejected() {
        for sql in ["", "   ", "\n\t "] {
            let rejected = reject_blank(sql).unwrap();
            assert!(rejected.is_failure());
            assert_eq!(
                rejected.to_string(),
                "The following error occurred: can't execute an empty query"
            );
        }
        assert!(reject_blank(" SELECT 1").is_none());
    }

    #[test]
    fn test_executed_display() {
        assert_eq!(QueryResult::Executed.to_string(), "Query executed.");
    }

    #[test]
    fn test_failed_display_has_prefix() {
        let result = QueryResult::Failed(QueryError {
            kind: QueryErrorKind::InvalidStatement,
            code: Some("42P01".into()),
            message: "relation \"customers\" does not exist".into(),
        });
        assert!(result.is_failure());
        assert_eq!(
            result.to_string(),
            "The following error occurred: relation \"customers\" does not exist"
        );
    }

    #[test]
    fn test_rows_display_as_tuples() {
        let result = QueryResult::Rows(QueryRows {
            columns: vec!["id".into(), "name".into()],
            rows: vec![vec![json!(1), json!("Acme")], vec![json!(2), json!(null)]],
        });
        assert_eq!(result.to_string(), r#"[[1,"Acme"],[2,null]]"#);
        assert_eq!(QueryResult::Rows(QueryRows::default()).to_string(), "[]");
    }

    #[test]
    fn test_sqlstate_classification() {
        assert_eq!(
            QueryErrorKind::from_sqlstate(Some("23505")),
            QueryErrorKind::ConstraintViolation
        );
        assert_eq!(
            QueryErrorKind::from_sqlstate(Some("42601")),
            QueryErrorKind::InvalidStatement
        );
        assert_eq!(
            QueryErrorKind::from_sqlstate(Some("22012")),
            QueryErrorKind::DataException
        );
        assert_eq!(
            QueryErrorKind::from_sqlstate(Some("08006")),
            QueryErrorKind::Connection
        );
        assert_eq!(
            QueryErrorKind::from_sqlstate(Some("40001")),
            QueryErrorKind::Database
        );
        assert_eq!(QueryErrorKind::from_sqlstate(None), QueryErrorKind::Database);
    }

    #[test]
    fn test_driver_errors_are_classified() {
        let err = QueryError::from_sqlx(&sqlx::Error::PoolTimedOut);
        assert_eq!(err.kind, QueryErrorKind::Connection);
        assert!(err.code.is_none());

        let err = QueryError::from_sqlx(&sqlx::Error::RowNotFound);
        assert_eq!(err.kind, QueryErrorKind::Other);
    }
}
