// runlog-config/src/docs.rs
// ============================================================================
// Module: Config Docs Generator
// Description: Markdown generator for the RunlogConfig field reference.
// Purpose: Keep operator-facing config docs in sync with the schema.
// Dependencies: serde_json, std
// ============================================================================

//! ## Overview
//! Generates a markdown reference table from [`crate::schema::config_schema`].
//! Output is deterministic: the same schema always produces the same text,
//! so this can be diffed against a committed copy in CI.

use std::fmt::Write as _;

use serde_json::Value;

use crate::schema::config_schema;

/// Renders the `RunlogConfig` field reference as a markdown table.
#[must_use]
pub fn config_docs_markdown() -> String {
    let schema = config_schema();
    let mut out = String::new();

    out.push_str("# Run Event Substrate Configuration Reference\n\n");
    out.push_str("This file is generated from `runlog_config::schema::config_schema`.\n\n");
    out.push_str("| Field | Type | Constraints | Description |\n");
    out.push_str("|---|---|---|---|\n");

    let Some(Value::Object(properties)) = schema.get("properties") else {
        return out;
    };
    let required: Vec<&str> =
        schema.get("required").and_then(Value::as_array).map(|items| items.iter().filter_map(Value::as_str).collect()).unwrap_or_default();

    for (name, field) in properties {
        let field_type = field.get("type").and_then(Value::as_str).unwrap_or("any");
        let constraints = render_constraints(field, required.contains(&name.as_str()));
        let description = field.get("description").and_then(Value::as_str).unwrap_or("");
        let _ = writeln!(out, "| `{name}` | `{field_type}` | {constraints} | {description} |");
    }

    out
}

fn render_constraints(field: &Value, required: bool) -> String {
    let mut parts = Vec::new();
    if required {
        parts.push("required".to_string());
    }
    if let Some(minimum) = field.get("minimum").and_then(Value::as_u64) {
        parts.push(format!("min {minimum}"));
    }
    if let Some(min_length) = field.get("minLength").and_then(Value::as_u64) {
        parts.push(format!("minLength {min_length}"));
    }
    if parts.is_empty() {
        "-".to_string()
    } else {
        parts.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn docs_mention_every_schema_field() {
        let markdown = config_docs_markdown();
        let schema = config_schema();
        let properties = schema.get("properties").and_then(Value::as_object).expect("properties");
        for name in properties.keys() {
            assert!(markdown.contains(&format!("`{name}`")), "missing field {name} in generated docs");
        }
    }

    #[test]
    fn docs_are_deterministic() {
        assert_eq!(config_docs_markdown(), config_docs_markdown());
    }
}
