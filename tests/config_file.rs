use std::io::Write;

use aidb::config::{
    apply_overrides_from, load_config, load_config_from_path, validate_config, LogFormat,
    MemoryPolicy,
};
use aidb::Error;
use secrecy::ExposeSecret;
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_full_file() {
    let file = write_config(
        r#"
[database]
name = "crm"
host = "localhost"
port = "5432"
user = "agent"

[openai]
model = "gpt-4o-mini"
timeout_secs = 30

[agent]
managed_tables = ["orders", "items"]
max_iterations = 5
memory = { policy = "sliding_window", turns = 4 }

[log]
level = "debug"
format = "json"
"#,
    );

    let config = load_config_from_path(file.path()).unwrap();

    assert_eq!(config.database.name, "crm");
    assert_eq!(config.database.port, "5432");
    assert_eq!(config.openai.model, "gpt-4o-mini");
    assert_eq!(config.openai.timeout_secs, 30);
    assert_eq!(config.openai.base_url, "https://api.openai.com/v1");
    assert_eq!(config.agent.managed_tables, vec!["orders", "items"]);
    assert_eq!(config.agent.max_iterations, 5);
    assert_eq!(config.agent.max_tool_calls, 20);
    assert_eq!(config.agent.memory, MemoryPolicy::SlidingWindow { turns: 4 });
    assert_eq!(config.log.format, LogFormat::Json);
}

#[test]
fn test_empty_file_is_all_defaults() {
    let file = write_config("");

    let config = load_config_from_path(file.path()).unwrap();

    assert_eq!(config.openai.model, "gpt-3.5-turbo");
    assert_eq!(config.agent.managed_tables, vec!["customer", "project", "tasks"]);
    assert_eq!(config.agent.memory, MemoryPolicy::Unbounded);
    assert!(config.database.password.expose_secret().is_empty());
}

#[test]
fn test_environment_beats_file() {
    let file = write_config(
        r#"
[database]
name = "from_file"

[openai]
model = "gpt-4o-mini"
"#,
    );

    let mut config = load_config_from_path(file.path()).unwrap();
    apply_overrides_from(&mut config, |key: &str| match key {
        "DB_NAME" => Some("from_env".to_string()),
        "DB_PASS" => Some("s3cret".to_string()),
        _ => None,
    });

    assert_eq!(config.database.name, "from_env");
    assert_eq!(config.database.password.expose_secret(), "s3cret");
    assert_eq!(config.openai.model, "gpt-4o-mini");
}

#[test]
fn test_secrets_are_never_serialized() {
    let file = write_config("[database]\nname = \"crm\"\n");
    let mut config = load_config_from_path(file.path()).unwrap();
    apply_overrides_from(&mut config, |key: &str| match key {
        "DB_PASS" => Some("s3cret".to_string()),
        "OPENAI_API_KEY" => Some("sk-live".to_string()),
        _ => None,
    });

    let rendered = serde_json::to_string(&config).unwrap();
    assert!(!rendered.contains("s3cret"));
    assert!(!rendered.contains("sk-live"));
}

#[test]
fn test_invalid_toml() {
    let file = write_config("[agent\nmax_iterations = ");

    let err = load_config_from_path(file.path()).unwrap_err();
    assert!(matches!(err, Error::Config(ref msg) if msg.contains("Invalid TOML")));
}

#[test]
fn test_explicit_missing_path_fails() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");

    assert!(load_config(Some(missing.as_path())).is_err());
}

#[test]
fn test_validation_flags_zero_window() {
    let file = write_config("[agent]\nmemory = { policy = \"sliding_window\", turns = 0 }\n");
    let config = load_config_from_path(file.path()).unwrap();

    let issues = validate_config(&config);
    assert!(issues.iter().any(|issue| issue.path == "agent.memory.turns"));
}
