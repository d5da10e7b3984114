//! Configuration module
//!
//! - types/mod.rs: Core configuration types (Config, AgentConfig, LogConfig)
//! - types/provider.rs: LLM provider configuration
//! - types/storage.rs: Database connection configuration
//! - io.rs: Configuration loading and environment overrides
//! - validation.rs: Configuration warnings
//! - paths.rs: Configuration file paths

mod io;
mod paths;
mod types;
mod validation;

pub use types::{AgentConfig, Config, LogConfig, LogFormat, MemoryPolicy};
pub use types::provider::OpenAiConfig;
pub use types::storage::DatabaseConfig;

pub use io::{apply_env_overrides, apply_overrides_from, load_config, load_config_from_path};
pub use paths::{config_dir, config_path};
pub use validation::{validate_config, ValidationIssue};
