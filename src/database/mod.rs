//! Database module - PostgreSQL gateway
//!
//! - gateway.rs: the connection owner and SQL execution boundary
//! - schema.rs: catalog lookups (tables, columns)
//! - postgres.rs: connection setup from `DB_*` settings
//! - value.rs: text-format row decoding

mod gateway;
mod postgres;
mod schema;
mod value;

pub use gateway::{
    is_insert, DatabaseGateway, PgGateway, QueryError, QueryErrorKind, QueryResult, QueryRows,
};
pub use postgres::{connect, connect_options};
pub use schema::ColumnInfo;
pub use value::coerce_text;
