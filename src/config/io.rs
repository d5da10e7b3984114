//! Configuration I/O - Loading configuration
//!
//! Handles reading configuration from files and environment variables.

use std::path::Path;

use secrecy::SecretString;

use super::types::{Config, MemoryPolicy};
use crate::error::{Error, Result};

/// Load configuration with layered precedence:
/// 1. Config file (`path`, else the default location) if it exists, otherwise defaults
/// 2. Environment variable overrides (includes `.env`)
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    dotenvy::dotenv().ok();
    let mut config = match path {
        Some(path) => load_config_from_path(path)?,
        None => {
            let default_path = super::paths::config_path();
            if default_path.exists() {
                load_config_from_path(&default_path)?
            } else {
                Config::default()
            }
        }
    };

    apply_env_overrides(&mut config);

    Ok(config)
}

/// Load configuration from a specific TOML file
pub fn load_config_from_path(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;

    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Invalid TOML config {}: {}", path.display(), e)))
}

/// Apply environment variable overrides to an existing config.
///
/// Loads `.env` from the working directory first. Env vars have the highest
/// precedence in the config layering: defaults < file < env.
pub fn apply_env_overrides(config: &mut Config) {
    dotenvy::dotenv().ok();
    apply_overrides_from(config, |key| std::env::var(key).ok());
}

/// Apply overrides from an arbitrary variable lookup.
pub fn apply_overrides_from<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    // Database
    if let Some(name) = lookup("DB_NAME") {
        config.database.name = name;
    }
    if let Some(host) = lookup("DB_HOST") {
        config.database.host = host;
    }
    if let Some(port) = lookup("DB_PORT") {
        config.database.port = port;
    }
    if let Some(user) = lookup("DB_USER") {
        config.database.user = user;
    }
    if let Some(pass) = lookup("DB_PASS") {
        config.database.password = SecretString::from(pass);
    }

    // Provider
    if let Some(api_key) = lookup("OPENAI_API_KEY") {
        config.openai.api_key = SecretString::from(api_key);
    }
    if let Some(model) = lookup("OPENAI_MODEL") {
        config.openai.model = model;
    }
    if let Some(url) = lookup("OPENAI_BASE_URL") {
        config.openai.base_url = url;
    }
    if let Some(timeout) = lookup("OPENAI_TIMEOUT") {
        if let Ok(v) = timeout.parse() {
            config.openai.timeout_secs = v;
        }
    }

    // Agent
    if let Some(window) = lookup("AIDB_MEMORY_WINDOW") {
        if let Ok(turns) = window.parse() {
            config.agent.memory = MemoryPolicy::SlidingWindow { turns };
        }
    }
    if let Some(max) = lookup("AIDB_MAX_ITERATIONS") {
        if let Ok(v) = max.parse() {
            config.agent.max_iterations = v;
        }
    }

    // Logging
    if let Some(level) = lookup("RUST_LOG") {
        config.log.level = level;
    }
    if let Some(format) = lookup("LOG_FORMAT") {
        if let Ok(format) = format.parse() {
            config.log.format = format;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogFormat;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_database_overrides() {
        let mut config = Config::default();
        apply_overrides_from(
            &mut config,
            lookup_from(&[
                ("DB_NAME", "crm"),
                ("DB_HOST", "db.internal"),
                ("DB_PORT", "6543"),
                ("DB_USER", "agent"),
                ("DB_PASS", "hunter2"),
            ]),
        );

        assert_eq!(config.database.name, "crm");
        assert_eq!(config.database.host, "db.internal");
        assert_eq!(config.database.port, "6543");
        assert_eq!(config.database.user, "agent");
        assert_eq!(config.database.password.expose_secret(), "hunter2");
    }

    #[test]
    fn test_unset_variables_keep_empty_defaults() {
        let mut config = Config::default();
        apply_overrides_from(&mut config, lookup_from(&[]));

        assert!(config.database.name.is_empty());
        assert!(config.openai.api_key.expose_secret().is_empty());
        assert_eq!(config.agent.memory, MemoryPolicy::Unbounded);
    }

    #[test]
    fn test_agent_and_log_overrides() {
        let mut config = Config::default();
        apply_overrides_from(
            &mut config,
            lookup_from(&[
                ("OPENAI_API_KEY", "sk-abc"),
                ("OPENAI_MODEL", "gpt-4o-mini"),
                ("AIDB_MEMORY_WINDOW", "3"),
                ("AIDB_MAX_ITERATIONS", "not-a-number"),
                ("LOG_FORMAT", "json"),
            ]),
        );

        assert_eq!(config.openai.api_key.expose_secret(), "sk-abc");
        assert_eq!(config.openai.model, "gpt-4o-mini");
        assert_eq!(config.agent.memory, MemoryPolicy::SlidingWindow { turns: 3 });
        assert_eq!(config.agent.max_iterations, 10);
        assert_eq!(config.log.format, LogFormat::Json);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let err = load_config_from_path(Path::new("/nonexistent/aidb.toml")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
