//! System instruction templating

use std::path::Path;

use handlebars::Handlebars;
use serde::Serialize;

use crate::error::{Error, Result};

/// Built-in system instruction; `{{tables}}` expands to the managed table list
pub const DEFAULT_SYSTEM_PROMPT: &str = "Your role involves managing database operations for the {{tables}} tables. Understand table structures with 'describe_tables' function, gather any missing information from users, ensure data is correct, craft and execute PostgresSQL insertion queries using 'run_postgresql_query' function. Communicate clearly and professionally, avoiding technical jargon or exposing errors directly.";

/// Shell greeting shown before the first turn
pub const GREETING: &str = "Hello, I am your AI assistant to manage your database. How can I help you?";

/// A prompt template using Handlebars syntax
pub struct PromptTemplate {
    /// Template name
    name: String,
    /// Handlebars registry
    registry: Handlebars<'static>,
}

impl PromptTemplate {
    /// Create a new prompt template
    pub fn new(name: impl Into<String>, template: &str) -> Result<Self> {
        let name = name.into();
        let mut registry = Handlebars::new();
        // Prompts are plain text, not HTML
        registry.register_escape_fn(handlebars::no_escape);

        registry
            .register_template_string(&name, template)
            .map_err(|e| Error::Internal(format!("Invalid template: {}", e)))?;

        Ok(PromptTemplate { name, registry })
    }

    /// Load a template from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let template = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read prompt template {}: {}", path.display(), e))
        })?;
        Self::new(path.to_string_lossy(), &template)
    }

    /// Render the template with given data
    pub fn render<T: Serialize>(&self, data: &T) -> Result<String> {
        self.registry
            .render(&self.name, data)
            .map_err(|e| Error::Internal(format!("Template render error: {}", e)))
    }
}

#[derive(Serialize)]
struct SystemPromptData<'a> {
    tables: String,
    table_names: &'a [String],
}

/// Render the system instruction scoped to `tables`.
///
/// Custom templates see `{{tables}}` (quoted, comma-joined) and
/// `{{#each table_names}}`.
pub fn system_prompt(template: Option<&Path>, tables: &[String]) -> Result<String> {
    let template = match template {
        Some(path) => PromptTemplate::from_file(path)?,
        None => PromptTemplate::new("system", DEFAULT_SYSTEM_PROMPT)?,
    };
    template.render(&SystemPromptData {
        tables: quoted_list(tables),
        table_names: tables,
    })
}

/// `'a'`, `'a' and 'b'`, `'a', 'b', and 'c'`
fn quoted_list(items: &[String]) -> String {
    let quoted: Vec<String> = items.iter().map(|item| format!("'{}'", item)).collect();
    match quoted.as_slice() {
        [] => String::new(),
        [one] => one.clone(),
        [first, second] => format!("{} and {}", first, second),
        [init @ .., last] => format!("{}, and {}", init.join(", "), last),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn tables(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_prompt_template() {
        let template = PromptTemplate::new("test", "Hello, {{name}}!").unwrap();
        let result = template.render(&serde_json::json!({"name": "World"})).unwrap();
        assert_eq!(result, "Hello, World!");
    }

    #[test]
    fn test_default_prompt_names_tables() {
        let prompt = system_prompt(None, &tables(&["customer", "project", "tasks"])).unwrap();
        assert!(prompt.starts_with(
            "Your role involves managing database operations for the 'customer', 'project', and 'tasks' tables."
        ));
        assert!(prompt.contains("'describe_tables'"));
        assert!(prompt.contains("'run_postgresql_query'"));
    }

    #[test]
    fn test_quoted_list() {
        assert_eq!(quoted_list(&tables(&[])), "");
        assert_eq!(quoted_list(&tables(&["tasks"])), "'tasks'");
        assert_eq!(quoted_list(&tables(&["a", "b"])), "'a' and 'b'");
    }

    #[test]
    fn test_custom_template_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "Only touch {{{{#each table_names}}}}[{{{{this}}}}]{{{{/each}}}}.").unwrap();

        let prompt = system_prompt(Some(file.path()), &tables(&["orders", "items"])).unwrap();
        assert_eq!(prompt, "Only touch [orders][items].");
    }

    #[test]
    fn test_missing_template_file() {
        let err = system_prompt(Some(Path::new("/nonexistent/prompt.hbs")), &[]).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
