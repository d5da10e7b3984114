//! # aidb
//!
//! Manage a PostgreSQL database by chatting with a tool-calling LLM agent.
//!
//! The agent sees two tools, `run_postgresql_query` and `describe_tables`,
//! both backed by a single database connection owned by the gateway.
//!
//! - [`agent`]: chat model client, conversation memory, the tool loop
//! - [`database`]: connection, query execution, catalog lookups
//! - [`tools`]: tool definitions and name-keyed dispatch
//! - [`config`]: layered configuration (defaults, TOML file, environment)
//! - [`testing`]: in-process fakes for the model and the database

pub mod agent;
pub mod config;
pub mod database;
pub mod error;
pub mod testing;
pub mod tools;

pub use config::Config;
pub use error::{Error, Result};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const NAME: &str = env!("CARGO_PKG_NAME");
