//! Configuration validation
//!
//! Startup never fails on these findings; the shell logs them as warnings.

use secrecy::ExposeSecret;

use super::types::{Config, MemoryPolicy};

/// A validation issue
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Path to the config field
    pub path: String,
    /// Issue message
    pub message: String,
    /// Suggested fix
    pub suggestion: Option<String>,
}

impl ValidationIssue {
    /// Create a new issue
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationIssue {
            path: path.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    /// Add a suggestion
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, " ({})", suggestion)?;
        }
        Ok(())
    }
}

/// Collect warnings about a configuration
pub fn validate_config(config: &Config) -> Vec<ValidationIssue> {
    let mut warnings = Vec::new();

    if config.openai.api_key.expose_secret().is_empty() {
        warnings.push(
            ValidationIssue::new("openai.api_key", "No API key configured; model calls will be rejected")
                .with_suggestion("Set OPENAI_API_KEY in the environment or .env"),
        );
    }

    if config.database.name.is_empty() {
        warnings.push(
            ValidationIssue::new("database.name", "No database name configured")
                .with_suggestion("Set DB_NAME in the environment or .env"),
        );
    }

    if config.agent.managed_tables.is_empty() {
        warnings.push(ValidationIssue::new(
            "agent.managed_tables",
            "No managed tables listed; the system instruction will not name any table",
        ));
    }

    if let MemoryPolicy::SlidingWindow { turns: 0 } = config.agent.memory {
        warnings.push(
            ValidationIssue::new("agent.memory.turns", "Sliding window of 0 turns disables memory")
                .with_suggestion("Use a window of at least 1 turn"),
        );
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    #[test]
    fn test_default_config_warns_about_missing_credentials() {
        let warnings = validate_config(&Config::default());
        let paths: Vec<&str> = warnings.iter().map(|w| w.path.as_str()).collect();
        assert!(paths.contains(&"openai.api_key"));
        assert!(paths.contains(&"database.name"));
    }

    #[test]
    fn test_complete_config_has_no_warnings() {
        let mut config = Config::default();
        config.openai.api_key = SecretString::from("sk-test");
        config.database.name = "crm".into();
        assert!(validate_config(&config).is_empty());
    }

    #[test]
    fn test_zero_window_warns() {
        let mut config = Config::default();
        config.agent.memory = MemoryPolicy::SlidingWindow { turns: 0 };
        let warnings = validate_config(&config);
        assert!(warnings.iter().any(|w| w.path == "agent.memory.turns"));
    }
}
