//! Decoding of untyped result rows into JSON values
//!
//! Ad-hoc SQL is sent over the simple query protocol, so every column comes
//! back in text format. Values are coerced by column type so the model sees
//! numbers and booleans rather than quoted strings.

use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{Column, Row, TypeInfo};
use tracing::debug;

/// Decode every column of a text-format row
pub fn row_values(row: &PgRow) -> Vec<Value> {
    row.columns()
        .iter()
        .map(|column| {
            let type_name = column.type_info().name();
            match row.try_get_unchecked::<Option<String>, _>(column.ordinal()) {
                Ok(Some(text)) => coerce_text(type_name, &text),
                Ok(None) => Value::Null,
                Err(e) => {
                    debug!(column = column.name(), type_name, "Undecodable column: {}", e);
                    Value::String(format!("<{} value>", type_name.to_lowercase()))
                }
            }
        })
        .collect()
}

/// Column names of a row, in select-list order
pub fn row_columns(row: &PgRow) -> Vec<String> {
    row.columns().iter().map(|c| c.name().to_string()).collect()
}

/// Coerce the text form of a PostgreSQL value into JSON
pub fn coerce_text(type_name: &str, text: &str) -> Value {
    let as_string = || Value::String(text.to_owned());

    match type_name {
        "BOOL" => match text {
            "t" | "true" => Value::Bool(true),
            "f" | "false" => Value::Bool(false),
            _ => as_string(),
        },
        "INT2" | "INT4" | "INT8" | "OID" => text
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| as_string()),
        "FLOAT4" | "FLOAT8" => text
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(as_string),
        "JSON" | "JSONB" => serde_json::from_str(text).unwrap_or_else(|_| as_string()),
        _ => as_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_coercion() {
        assert_eq!(coerce_text("INT4", "42"), json!(42));
        assert_eq!(coerce_text("INT8", "-7"), json!(-7));
        assert_eq!(coerce_text("BOOL", "t"), json!(true));
        assert_eq!(coerce_text("BOOL", "f"), json!(false));
        assert_eq!(coerce_text("FLOAT8", "1.5"), json!(1.5));
    }

    #[test]
    fn test_non_finite_float_stays_text() {
        assert_eq!(coerce_text("FLOAT8", "NaN"), json!("NaN"));
        assert_eq!(coerce_text("FLOAT4", "Infinity"), json!("Infinity"));
    }

    #[test]
    fn test_json_columns_are_parsed() {
        assert_eq!(
            coerce_text("JSONB", r#"{"priority": "high"}"#),
            json!({"priority": "high"})
        );
    }

    #[test]
    fn test_other_types_pass_through_as_text() {
        assert_eq!(coerce_text("NUMERIC", "12.50"), json!("12.50"));
        assert_eq!(coerce_text("DATE", "2024-03-01"), json!("2024-03-01"));
        assert_eq!(coerce_text("VARCHAR", "Acme Corp"), json!("Acme Corp"));
    }
}
