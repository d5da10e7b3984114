//! Database connection configuration
//!
//! Mirrors the `DB_NAME`, `DB_HOST`, `DB_PORT`, `DB_USER` and `DB_PASS`
//! environment variables. Every field defaults to an empty string; empty
//! fields fall back to libpq-style defaults when connecting.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use super::provider::empty_secret;

/// PostgreSQL connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database name
    #[serde(default)]
    pub name: String,
    /// Server host
    #[serde(default)]
    pub host: String,
    /// Server port, kept as text so an unset variable stays empty
    #[serde(default)]
    pub port: String,
    /// User name
    #[serde(default)]
    pub user: String,
    /// Password
    #[serde(skip_serializing, default = "empty_secret")]
    pub password: SecretString,
    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            name: String::new(),
            host: String::new(),
            port: String::new(),
            user: String::new(),
            password: empty_secret(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

fn default_connect_timeout() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_defaults_are_empty() {
        let config = DatabaseConfig::default();
        assert!(config.name.is_empty());
        assert!(config.host.is_empty());
        assert!(config.port.is_empty());
        assert!(config.user.is_empty());
        assert_eq!(config.connect_timeout_secs, 30);
    }
}
