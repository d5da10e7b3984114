//! Configuration types module

pub mod provider;
pub mod storage;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Database connection settings
    #[serde(default)]
    pub database: storage::DatabaseConfig,

    /// LLM provider settings
    #[serde(default)]
    pub openai: provider::OpenAiConfig,

    /// Agent behaviour
    #[serde(default)]
    pub agent: AgentConfig,

    /// Logging
    #[serde(default)]
    pub log: LogConfig,
}

impl Config {
    /// Load configuration from the default file location and environment variables
    ///
    /// Layers, lowest precedence first:
    /// 1. Default values
    /// 2. Config file (if present)
    /// 3. Environment variable overrides
    pub fn from_env() -> crate::error::Result<Self> {
        crate::config::load_config(None)
    }
}

/// Agent-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Tables the assistant is scoped to
    #[serde(default = "default_managed_tables")]
    pub managed_tables: Vec<String>,
    /// Optional handlebars template replacing the built-in system instruction
    pub system_prompt_file: Option<PathBuf>,
    /// Conversation memory policy
    #[serde(default)]
    pub memory: MemoryPolicy,
    /// Maximum model round-trips per turn
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Maximum tool invocations per turn
    #[serde(default = "default_max_tool_calls")]
    pub max_tool_calls: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            managed_tables: default_managed_tables(),
            system_prompt_file: None,
            memory: MemoryPolicy::default(),
            max_iterations: default_max_iterations(),
            max_tool_calls: default_max_tool_calls(),
        }
    }
}

fn default_managed_tables() -> Vec<String> {
    vec!["customer".into(), "project".into(), "tasks".into()]
}

fn default_max_iterations() -> u32 {
    10
}

fn default_max_tool_calls() -> u32 {
    20
}

/// How much conversation history is replayed to the model each turn
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum MemoryPolicy {
    /// Keep every turn for the lifetime of the session
    #[default]
    Unbounded,
    /// Keep only the most recent `turns` exchanges
    SlidingWindow {
        /// Number of human/AI exchanges retained
        turns: usize,
    },
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> crate::error::Result<Self> {
        match s.to_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(crate::error::Error::Config(format!(
                "Invalid log format: {}. Valid options: pretty, json",
                s
            ))),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level filter (`RUST_LOG` syntax)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "warn,aidb=info".to_string()
}
