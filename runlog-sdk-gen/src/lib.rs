// runlog-sdk-gen/src/lib.rs
// ============================================================================
// Module: SDK Generator Library
// Description: Deterministic generator for client SDK artifacts over the
//              substrate's tool catalog.
// Purpose: Render Python/TypeScript client stubs and an OpenAPI-flavored
//          view of /tools/invoke from a registry's tool manifests.
// Dependencies: runlog-core, runlog-contract, serde_json, thiserror
// ============================================================================

//! ## Overview
//! This crate generates client SDK artifacts from a registry's installed
//! [`runlog_core::ToolManifest`] catalog (a JSON array, by default
//! `registry/tools.json`). It produces deterministic Python and TypeScript
//! client surfaces plus an OpenAPI view of the `/tools/invoke` endpoint.
//!
//! ### Design Notes
//! - Output is deterministic: object keys are rendered in the tool's own
//!   declared property order via `object_properties`'s sort, and tool order
//!   follows the manifest list's input order.
//! - `$ref` values inside a manifest's schemas are treated as opaque and
//!   rendered as `Any`/`JsonValue`, matching the inputs/outputs schemas'
//!   flat shape (no cross-schema references are ever emitted by
//!   `runlog-contract`).
//! - Schema-to-type mapping is best-effort and intentionally conservative.
//!
//! ### Security Posture
//! Tool manifests are treated as untrusted input. The generator enforces a
//! hard input size limit and fails closed on parsing errors.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::Read;
use std::path::Path;
use std::path::PathBuf;

use runlog_core::ToolManifest;
use serde_json::Value;
use thiserror::Error;

/// Default tool manifest catalog path relative to the workspace root.
pub const DEFAULT_MANIFESTS_PATH: &str = "registry/tools.json";

/// Maximum manifest catalog size accepted by the generator.
pub const MAX_MANIFESTS_BYTES: u64 = 4 * 1024 * 1024;

/// Errors raised by the SDK generator.
#[derive(Debug, Error)]
pub enum SdkGenError {
    /// IO error while reading or writing files.
    #[error("io error: {0}")]
    Io(String),
    /// JSON serialization or parsing error.
    #[error("json error: {0}")]
    Json(String),
    /// Manifest catalog error.
    #[error("tooling error: {0}")]
    Tooling(String),
}

/// SDK generator loaded with a tool manifest catalog.
///
/// # Invariants
/// - Tool order matches the manifest catalog input.
/// - Rendering is deterministic for a fixed catalog.
#[derive(Debug, Clone)]
pub struct SdkGenerator {
    /// Path to the manifest catalog backing this generator.
    manifests_path: PathBuf,
    /// Loaded manifests used to render SDK artifacts.
    manifests: Vec<ToolManifest>,
}

impl SdkGenerator {
    /// Loads a tool manifest catalog from the given path.
    ///
    /// # Errors
    ///
    /// Returns [`SdkGenError`] when the catalog cannot be read or parsed, or
    /// when it exceeds [`MAX_MANIFESTS_BYTES`].
    pub fn load(manifests_path: impl AsRef<Path>) -> Result<Self, SdkGenError> {
        let manifests_path = manifests_path.as_ref().to_path_buf();
        let bytes = read_manifests_bytes(&manifests_path)?;
        let manifests: Vec<ToolManifest> =
            serde_json::from_slice(&bytes).map_err(|err| SdkGenError::Json(err.to_string()))?;
        Ok(Self { manifests_path, manifests })
    }

    /// Returns the manifest catalog path used by the generator.
    #[must_use]
    pub fn manifests_path(&self) -> &Path {
        &self.manifests_path
    }

    /// Generates the Python client `_generated.py` content.
    ///
    /// # Errors
    ///
    /// Returns [`SdkGenError`] if JSON rendering fails.
    pub fn generate_python(&self) -> Result<String, SdkGenError> {
        render_python(&self.manifests)
    }

    /// Generates the TypeScript client `_generated.ts` content.
    ///
    /// # Errors
    ///
    /// Returns [`SdkGenError`] if JSON rendering fails.
    pub fn generate_typescript(&self) -> Result<String, SdkGenError> {
        render_typescript(&self.manifests)
    }

    /// Generates the OpenAPI JSON document for `/tools/invoke`.
    ///
    /// # Errors
    ///
    /// Returns [`SdkGenError`] if JSON serialization fails.
    pub fn generate_openapi(&self) -> Result<String, SdkGenError> {
        render_openapi(&self.manifests)
    }
}

/// Reads the manifest catalog with size limits to avoid memory exhaustion.
fn read_manifests_bytes(path: &Path) -> Result<Vec<u8>, SdkGenError> {
    let file = fs::File::open(path).map_err(|err| SdkGenError::Io(err.to_string()))?;
    let metadata = file.metadata().map_err(|err| SdkGenError::Io(err.to_string()))?;
    if metadata.len() > MAX_MANIFESTS_BYTES {
        return Err(SdkGenError::Tooling(format!("manifest catalog exceeds {MAX_MANIFESTS_BYTES} bytes")));
    }
    let mut bytes = Vec::new();
    let mut limited = file.take(MAX_MANIFESTS_BYTES + 1);
    limited.read_to_end(&mut bytes).map_err(|err| SdkGenError::Io(err.to_string()))?;
    let size = u64::try_from(bytes.len())
        .map_err(|_| SdkGenError::Tooling("manifest catalog size exceeds addressable memory".to_string()))?;
    if size > MAX_MANIFESTS_BYTES {
        return Err(SdkGenError::Tooling(format!("manifest catalog exceeds {MAX_MANIFESTS_BYTES} bytes")));
    }
    Ok(bytes)
}

/// Internal representation of a schema-derived type.
#[derive(Debug, Clone, PartialEq)]
enum TypeSpec {
    /// Arbitrary JSON value.
    Any,
    /// JSON null literal.
    Null,
    /// Boolean value.
    Bool,
    /// Integer number.
    Int,
    /// Floating point number.
    Number,
    /// String value.
    String,
    /// Array of items with a shared type.
    Array(Box<Self>),
    /// Object with arbitrary properties.
    Object,
    /// Union of multiple candidate types.
    Union(Vec<Self>),
    /// Literal set of JSON values.
    Literal(Vec<Value>),
}

/// Object property metadata for SDK type rendering.
#[derive(Debug, Clone)]
struct Property {
    /// Property name in the schema.
    name: String,
    /// Resolved property type.
    ty: TypeSpec,
    /// True when the property is required.
    required: bool,
    /// Original schema fragment for this property.
    schema: Value,
}

// ============================================================================
// SECTION: Python Rendering
// ============================================================================

/// Renders the Python client generated file from a manifest catalog.
#[allow(clippy::too_many_lines, reason = "Generator output is assembled in one pass for determinism.")]
fn render_python(manifests: &[ToolManifest]) -> Result<String, SdkGenError> {
    let mut out = String::new();
    out.push_str("# This file is @generated by runlog-sdk-gen. DO NOT EDIT.\n");
    out.push_str("# Source: ");
    out.push_str(DEFAULT_MANIFESTS_PATH);
    out.push('\n');
    out.push_str("# fmt: off\n\n");
    out.push_str("from __future__ import annotations\n\n");
    out.push_str("import json as _json\n");
    out.push_str("from typing import Any, Dict, List, Mapping, Sequence, TypedDict, Union, Literal, cast\n");
    out.push_str("try:\n");
    out.push_str("    from typing import NotRequired\n");
    out.push_str("except ImportError:\n");
    out.push_str("    try:\n");
    out.push_str("        from typing_extensions import NotRequired\n");
    out.push_str("    except ImportError:\n");
    out.push_str("        class _NotRequired:\n");
    out.push_str("            def __class_getitem__(cls, item):\n");
    out.push_str("                return item\n");
    out.push_str("        NotRequired = _NotRequired\n\n");
    out.push_str("JsonPrimitive = Union[str, int, float, bool, None]\n");
    out.push_str("JsonValue = Union[JsonPrimitive, List[\"JsonValue\"], Dict[str, \"JsonValue\"]]\n\n");

    out.push_str("TOOL_IDS: Sequence[str] = (\n");
    for manifest in manifests {
        out.push_str("    ");
        out.push_str(&python_string_literal(&manifest.tool_id));
        out.push_str(",\n");
    }
    out.push_str(")\n\n");

    out.push_str("TOOL_VERSIONS: Mapping[str, str] = {\n");
    for manifest in manifests {
        out.push_str("    ");
        out.push_str(&python_string_literal(&manifest.tool_id));
        out.push_str(": ");
        out.push_str(&python_string_literal(&manifest.version));
        out.push_str(",\n");
    }
    out.push_str("}\n\n");

    out.push_str("TOOL_SCOPES_REQUIRED: Mapping[str, Sequence[str]] = {\n");
    for manifest in manifests {
        out.push_str("    ");
        out.push_str(&python_string_literal(&manifest.tool_id));
        out.push_str(": [\n");
        for scope in &manifest.risk.scopes_required {
            out.push_str("        ");
            out.push_str(&python_string_literal(scope));
            out.push_str(",\n");
        }
        out.push_str("    ],\n");
    }
    out.push_str("}\n\n");

    for manifest in manifests {
        let pascal = pascal_case(&manifest.tool_id);
        let input_type = format!("{pascal}Inputs");
        let output_type = format!("{pascal}Outputs");
        render_python_typed_dict(&mut out, &input_type, &manifest.inputs_schema);
        render_python_typed_dict(&mut out, &output_type, &manifest.outputs_schema);
        render_python_schema_constant(&mut out, &pascal, "INPUTS_SCHEMA", &manifest.inputs_schema)?;
        render_python_schema_constant(&mut out, &pascal, "OUTPUTS_SCHEMA", &manifest.outputs_schema)?;
    }

    out.push_str("class GeneratedRunlogClient:\n");
    out.push_str("    \"\"\"Generated Run Event Substrate client methods. Implement `_invoke_tool`.\"\"\"\n\n");
    out.push_str("    def _invoke_tool(self, tool_id: str, version: str, inputs: JsonValue) -> JsonValue:\n");
    out.push_str("        raise NotImplementedError(\"_invoke_tool must be implemented by subclasses\")\n\n");

    for manifest in manifests {
        let pascal = pascal_case(&manifest.tool_id);
        let method = python_method_name(&manifest.tool_id);
        let input_type = format!("{pascal}Inputs");
        let output_type = format!("{pascal}Outputs");
        out.push_str("    def ");
        out.push_str(&method);
        out.push_str("(self, inputs: ");
        out.push_str(&input_type);
        out.push_str(") -> ");
        out.push_str(&output_type);
        out.push_str(":\n");
        out.push_str("        \"\"\"Invokes `");
        out.push_str(&manifest.tool_id);
        out.push_str("` (version ");
        out.push_str(&manifest.version);
        out.push_str(").\"\"\"\n");
        out.push_str("        return cast(");
        out.push_str(&output_type);
        out.push_str(", self._invoke_tool(");
        out.push_str(&python_string_literal(&manifest.tool_id));
        out.push_str(", ");
        out.push_str(&python_string_literal(&manifest.version));
        out.push_str(", inputs))\n\n");
    }
    Ok(out)
}

/// Renders a `TypedDict` for a JSON object schema.
fn render_python_typed_dict(out: &mut String, name: &str, schema: &Value) {
    out.push_str("class ");
    out.push_str(name);
    out.push_str("(TypedDict):\n");
    let class_doc = schema_doc(schema).unwrap_or_else(|| format!("Schema for {name}."));
    out.push_str("    \"\"\"");
    out.push_str(&class_doc);
    out.push_str("\"\"\"\n");
    match object_properties(schema) {
        Some(properties) if !properties.is_empty() => {
            for property in properties {
                if let Some(comment) = schema_doc(&property.schema) {
                    for line in wrap_doc(&comment, 88) {
                        out.push_str("    #: ");
                        out.push_str(&line);
                        out.push('\n');
                    }
                }
                out.push_str("    ");
                out.push_str(&property.name);
                out.push_str(": ");
                if property.required {
                    out.push_str(&python_type(&property.ty));
                } else {
                    out.push_str("NotRequired[");
                    out.push_str(&python_type(&property.ty));
                    out.push(']');
                }
                out.push('\n');
            }
        }
        _ => out.push_str("    pass\n"),
    }
    out.push('\n');
}

/// Renders a Python constant holding the JSON schema.
fn render_python_schema_constant(out: &mut String, pascal: &str, suffix: &str, schema: &Value) -> Result<(), SdkGenError> {
    let constant_name = format!("{pascal}_{suffix}");
    let json = serde_json::to_string_pretty(schema).map_err(|err| SdkGenError::Json(err.to_string()))?;
    out.push_str(&constant_name);
    out.push_str(" = _json.loads(r\"\"\"\n");
    out.push_str(&json);
    out.push_str("\n\"\"\")\n\n");
    Ok(())
}

// ============================================================================
// SECTION: TypeScript Rendering
// ============================================================================

/// Renders the TypeScript client generated file from a manifest catalog.
fn render_typescript(manifests: &[ToolManifest]) -> Result<String, SdkGenError> {
    let mut out = String::new();
    out.push_str("// This file is @generated by runlog-sdk-gen. DO NOT EDIT.\n");
    out.push_str("// Source: ");
    out.push_str(DEFAULT_MANIFESTS_PATH);
    out.push('\n');
    out.push_str("// fmt: off\n\n");
    out.push_str("export type JsonPrimitive = string | number | boolean | null;\n");
    out.push_str("export type JsonValue = JsonPrimitive | JsonValue[] | { [key: string]: JsonValue };\n\n");

    out.push_str("export const TOOL_IDS = [\n");
    for manifest in manifests {
        out.push_str("  ");
        out.push_str(&typescript_string_literal(&manifest.tool_id));
        out.push_str(",\n");
    }
    out.push_str("] as const;\n\n");

    out.push_str("export const TOOL_VERSIONS: Record<string, string> = {\n");
    for manifest in manifests {
        out.push_str("  ");
        out.push_str(&typescript_string_literal(&manifest.tool_id));
        out.push_str(": ");
        out.push_str(&typescript_string_literal(&manifest.version));
        out.push_str(",\n");
    }
    out.push_str("};\n\n");

    for manifest in manifests {
        let pascal = pascal_case(&manifest.tool_id);
        let input_type = format!("{pascal}Inputs");
        let output_type = format!("{pascal}Outputs");
        render_typescript_interface(&mut out, &input_type, &manifest.inputs_schema);
        render_typescript_interface(&mut out, &output_type, &manifest.outputs_schema);
        render_typescript_schema_constant(&mut out, &pascal, "INPUTS_SCHEMA", &manifest.inputs_schema)?;
        render_typescript_schema_constant(&mut out, &pascal, "OUTPUTS_SCHEMA", &manifest.outputs_schema)?;
    }

    out.push_str("export abstract class GeneratedRunlogClient {\n");
    out.push_str("  protected abstract invokeTool(toolId: string, version: string, inputs: JsonValue): Promise<JsonValue>;\n\n");
    for manifest in manifests {
        let pascal = pascal_case(&manifest.tool_id);
        let method = typescript_method_name(&manifest.tool_id);
        let input_type = format!("{pascal}Inputs");
        let output_type = format!("{pascal}Outputs");
        out.push_str("  /** Invokes `");
        out.push_str(&manifest.tool_id);
        out.push_str("` (version ");
        out.push_str(&manifest.version);
        out.push_str("). */\n");
        out.push_str("  async ");
        out.push_str(&method);
        out.push_str("(inputs: ");
        out.push_str(&input_type);
        out.push_str("): Promise<");
        out.push_str(&output_type);
        out.push_str("> {\n");
        out.push_str("    return (await this.invokeTool(");
        out.push_str(&typescript_string_literal(&manifest.tool_id));
        out.push_str(", ");
        out.push_str(&typescript_string_literal(&manifest.version));
        out.push_str(", inputs)) as ");
        out.push_str(&output_type);
        out.push_str(";\n  }\n\n");
    }
    out.push_str("}\n");
    Ok(out)
}

/// Renders a TypeScript interface for a JSON object schema.
fn render_typescript_interface(out: &mut String, name: &str, schema: &Value) {
    if let Some(doc) = schema_doc(schema) {
        out.push_str("/** ");
        out.push_str(&doc);
        out.push_str(" */\n");
    }
    out.push_str("export interface ");
    out.push_str(name);
    out.push_str(" {\n");
    if let Some(properties) = object_properties(schema) {
        for property in properties {
            if let Some(comment) = schema_doc(&property.schema) {
                out.push_str("  /** ");
                out.push_str(&comment);
                out.push_str(" */\n");
            }
            out.push_str("  ");
            out.push_str(&property.name);
            if !property.required {
                out.push('?');
            }
            out.push_str(": ");
            out.push_str(&typescript_type(&property.ty));
            out.push_str(";\n");
        }
    }
    out.push_str("}\n\n");
}

/// Renders a TypeScript constant holding the JSON schema.
fn render_typescript_schema_constant(out: &mut String, pascal: &str, suffix: &str, schema: &Value) -> Result<(), SdkGenError> {
    let constant_name = format!("{pascal}_{suffix}");
    let json = serde_json::to_string_pretty(schema).map_err(|err| SdkGenError::Json(err.to_string()))?;
    out.push_str("export const ");
    out.push_str(&constant_name);
    out.push_str(": JsonValue = ");
    out.push_str(&json);
    out.push_str(" as const;\n\n");
    Ok(())
}

// ============================================================================
// SECTION: OpenAPI Rendering
// ============================================================================

/// Renders an OpenAPI-flavored JSON document for `/tools/invoke`, one
/// `oneOf` branch per manifest, plus the `system_config` schema so SDK
/// consumers can validate `GET /system/config` responses.
fn render_openapi(manifests: &[ToolManifest]) -> Result<String, SdkGenError> {
    let mut schemas = serde_json::Map::new();
    schemas.insert("SystemConfig".to_string(), runlog_contract::schemas::system_config_schema());

    let mut invoke_request_branches = Vec::new();
    let mut invoke_response_branches = Vec::new();
    for manifest in manifests {
        let pascal = pascal_case(&manifest.tool_id);
        let request_name = format!("{pascal}InvokeRequest");
        let response_name = format!("{pascal}InvokeResponse");

        schemas.insert(
            request_name.clone(),
            serde_json::json!({
                "type": "object",
                "properties": {
                    "tool_id": { "const": manifest.tool_id },
                    "version": { "const": manifest.version },
                    "inputs": manifest.inputs_schema.clone()
                },
                "required": ["tool_id", "inputs"],
                "additionalProperties": false
            }),
        );
        schemas.insert(
            response_name.clone(),
            serde_json::json!({
                "type": "object",
                "properties": {
                    "outcome": { "enum": ["completed", "denied", "waiting_approval"] },
                    "outputs": manifest.outputs_schema.clone()
                },
                "required": ["outcome"],
                "additionalProperties": false
            }),
        );
        invoke_request_branches.push(serde_json::json!({ "$ref": format!("#/components/schemas/{request_name}") }));
        invoke_response_branches.push(serde_json::json!({ "$ref": format!("#/components/schemas/{response_name}") }));
    }

    let document = serde_json::json!({
        "openapi": "3.0.3",
        "info": {
            "title": "Run Event Substrate",
            "version": "1.0.0"
        },
        "paths": {
            "/tools/invoke": {
                "post": {
                    "operationId": "invokeTool",
                    "requestBody": {
                        "content": {
                            "application/json": {
                                "schema": { "oneOf": invoke_request_branches }
                            }
                        }
                    },
                    "responses": {
                        "200": {
                            "description": "Tool invocation outcome.",
                            "content": {
                                "application/json": {
                                    "schema": { "oneOf": invoke_response_branches }
                                }
                            }
                        }
                    }
                }
            },
            "/system/config": {
                "get": {
                    "operationId": "getSystemConfig",
                    "responses": {
                        "200": {
                            "description": "Operator-visible configuration snapshot.",
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/SystemConfig" }
                                }
                            }
                        }
                    }
                }
            }
        },
        "components": {
            "schemas": sorted_json_value(&Value::Object(schemas))
        }
    });
    serde_json::to_string_pretty(&document).map_err(|err| SdkGenError::Json(err.to_string()))
}

// ============================================================================
// SECTION: Schema Helpers
// ============================================================================

/// Extracts property metadata from a JSON object schema, sorted by name for
/// deterministic output.
fn object_properties(schema: &Value) -> Option<Vec<Property>> {
    let properties = schema.get("properties")?.as_object()?;
    let required_list = schema.get("required").and_then(|value| value.as_array());
    let mut required = BTreeMap::new();
    if let Some(list) = required_list {
        for value in list {
            if let Some(name) = value.as_str() {
                required.insert(name.to_string(), true);
            }
        }
    }
    let mut output = Vec::new();
    let mut names: Vec<&String> = properties.keys().collect();
    names.sort();
    for name in names {
        let schema = &properties[name];
        let ty = schema_to_typespec(schema);
        let is_required = required.contains_key(name.as_str());
        output.push(Property { name: name.clone(), ty, required: is_required, schema: schema.clone() });
    }
    Some(output)
}

/// Builds a combined documentation string for a schema.
fn schema_doc(schema: &Value) -> Option<String> {
    let desc = schema.get("description").and_then(Value::as_str).map(normalize_doc).filter(|value| !value.is_empty());
    let mut constraints = Vec::new();
    if let Some(enum_values) = schema.get("enum").and_then(Value::as_array) {
        let values: Vec<String> = enum_values.iter().map(json_inline).collect();
        if !values.is_empty() {
            constraints.push(format!("Allowed values: {}", values.join(", ")));
        }
    }
    if let Some(minimum) = schema.get("minimum") {
        constraints.push(format!("Minimum: {}", json_inline(minimum)));
    }
    if let Some(maximum) = schema.get("maximum") {
        constraints.push(format!("Maximum: {}", json_inline(maximum)));
    }
    match (desc, constraints.is_empty()) {
        (None, true) => None,
        (Some(description), true) => Some(description),
        (None, false) => Some(format!("Constraints: {}.", constraints.join("; "))),
        (Some(description), false) => Some(format!("{description} Constraints: {}.", constraints.join("; "))),
    }
}

/// Renders a JSON value as a compact inline string.
fn json_inline(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "<unprintable>".to_string())
}

/// Normalizes documentation strings by collapsing whitespace and defusing
/// comment or docstring terminators in generated outputs.
fn normalize_doc(value: &str) -> String {
    let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");
    let collapsed = collapsed.replace("*/", "* /");
    collapsed.replace("\"\"\"", "\\\"\\\"\\\"")
}

/// Wraps documentation text to a target width.
fn wrap_doc(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }
        if current.len() + 1 + word.len() > width {
            lines.push(current);
            current = word.to_string();
        } else {
            current.push(' ');
            current.push_str(word);
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Sorts JSON object keys recursively for deterministic output.
fn sorted_json_value(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().map(sorted_json_value).collect()),
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = serde_json::Map::new();
            for key in keys {
                if let Some(value) = map.get(key) {
                    sorted.insert(key.clone(), sorted_json_value(value));
                }
            }
            Value::Object(sorted)
        }
        _ => value.clone(),
    }
}

/// Maps a JSON schema to an internal type representation. Conservative:
/// `$ref` becomes `Any`, enums of JSON literals become `Literal`, and
/// unrecognized types fall back to `Any`.
fn schema_to_typespec(schema: &Value) -> TypeSpec {
    if let Some(one_of) = schema.get("oneOf").and_then(|value| value.as_array()) {
        return union_types(one_of.iter().map(schema_to_typespec));
    }
    if let Some(any_of) = schema.get("anyOf").and_then(|value| value.as_array()) {
        return union_types(any_of.iter().map(schema_to_typespec));
    }
    if let Some(enum_values) = schema.get("enum").and_then(|value| value.as_array()) {
        if enum_values.iter().all(is_literal_value) {
            return TypeSpec::Literal(enum_values.clone());
        }
    }
    if schema.get("$ref").is_some() {
        return TypeSpec::Any;
    }
    match schema.get("type") {
        Some(Value::String(ty)) => type_from_name(ty, schema),
        Some(Value::Array(types)) => {
            union_types(types.iter().filter_map(|value| value.as_str()).map(|ty| type_from_name(ty, schema)))
        }
        _ => TypeSpec::Any,
    }
}

/// Maps a JSON schema type tag to an internal type representation.
fn type_from_name(name: &str, schema: &Value) -> TypeSpec {
    match name {
        "null" => TypeSpec::Null,
        "boolean" => TypeSpec::Bool,
        "integer" => TypeSpec::Int,
        "number" => TypeSpec::Number,
        "string" => TypeSpec::String,
        "array" => {
            let inner = schema.get("items").map_or(TypeSpec::Any, schema_to_typespec);
            TypeSpec::Array(Box::new(inner))
        }
        "object" => TypeSpec::Object,
        _ => TypeSpec::Any,
    }
}

/// Collapses multiple types into a union, deduplicating where possible. If
/// any type is `Any`, the union collapses to `Any`.
fn union_types<I>(types: I) -> TypeSpec
where
    I: IntoIterator<Item = TypeSpec>,
{
    let mut output = Vec::new();
    for ty in types {
        if ty == TypeSpec::Any {
            return TypeSpec::Any;
        }
        if !output.contains(&ty) {
            output.push(ty);
        }
    }
    if output.is_empty() {
        TypeSpec::Any
    } else if output.len() == 1 {
        output.remove(0)
    } else {
        TypeSpec::Union(output)
    }
}

/// Renders a Python type annotation for the internal type representation.
fn python_type(ty: &TypeSpec) -> String {
    match ty {
        TypeSpec::Any => "JsonValue".to_string(),
        TypeSpec::Null => "None".to_string(),
        TypeSpec::Bool => "bool".to_string(),
        TypeSpec::Int => "int".to_string(),
        TypeSpec::Number => "float".to_string(),
        TypeSpec::String => "str".to_string(),
        TypeSpec::Array(inner) => format!("List[{}]", python_type(inner)),
        TypeSpec::Object => "Dict[str, JsonValue]".to_string(),
        TypeSpec::Union(types) => {
            let mut rendered: Vec<String> = types.iter().map(python_type).collect();
            rendered.sort();
            if rendered.len() == 1 { rendered.remove(0) } else { format!("Union[{}]", rendered.join(", ")) }
        }
        TypeSpec::Literal(values) => {
            let literals: Vec<String> = values.iter().map(python_literal_value).collect();
            format!("Literal[{}]", literals.join(", "))
        }
    }
}

/// Renders a JSON literal as a Python literal expression.
fn python_literal_value(value: &Value) -> String {
    match value {
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(number) => number.to_string(),
        Value::String(value) => python_string_literal(value),
        _ => "None".to_string(),
    }
}

/// Renders a TypeScript type annotation for the internal type representation.
fn typescript_type(ty: &TypeSpec) -> String {
    match ty {
        TypeSpec::Any => "JsonValue".to_string(),
        TypeSpec::Null => "null".to_string(),
        TypeSpec::Bool => "boolean".to_string(),
        TypeSpec::Int | TypeSpec::Number => "number".to_string(),
        TypeSpec::String => "string".to_string(),
        TypeSpec::Array(inner) => format!("Array<{}>", typescript_type(inner)),
        TypeSpec::Object => "Record<string, JsonValue>".to_string(),
        TypeSpec::Union(types) => {
            let mut rendered: Vec<String> = types.iter().map(typescript_type).collect();
            rendered.sort();
            if rendered.len() == 1 { rendered.remove(0) } else { rendered.join(" | ") }
        }
        TypeSpec::Literal(values) => {
            let literals: Vec<String> = values.iter().map(typescript_literal_value).collect();
            literals.join(" | ")
        }
    }
}

/// Renders a JSON literal as a TypeScript literal expression.
fn typescript_literal_value(value: &Value) -> String {
    match value {
        Value::Bool(true) => "true".to_string(),
        Value::Bool(false) => "false".to_string(),
        Value::Number(number) => number.to_string(),
        Value::String(value) => typescript_string_literal(value),
        _ => "null".to_string(),
    }
}

/// Renders a JSON string as a Python string literal, using JSON encoding for
/// correct escaping.
fn python_string_literal(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{}\"", value.replace('"', "\\\"")))
}

/// Renders a JSON string as a TypeScript string literal.
fn typescript_string_literal(value: &str) -> String {
    python_string_literal(value)
}

/// Returns true if a JSON value can be represented as a literal in SDK types.
const fn is_literal_value(value: &Value) -> bool {
    matches!(value, Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_))
}

/// Converts a `tool_id` (dot- or underscore-separated, e.g. `file.read`) into
/// `PascalCase`.
fn pascal_case(value: &str) -> String {
    let mut output = String::new();
    for segment in value.split(['.', '_', '-']) {
        let mut chars = segment.chars();
        if let Some(first) = chars.next() {
            output.push(first.to_ascii_uppercase());
            for ch in chars {
                output.push(ch.to_ascii_lowercase());
            }
        }
    }
    if output.is_empty() { "Tool".to_string() } else { output }
}

/// Converts a `tool_id` into a `snake_case` Python method name.
fn python_method_name(tool_id: &str) -> String {
    tool_id.chars().map(|ch| if ch == '.' || ch == '-' { '_' } else { ch.to_ascii_lowercase() }).collect()
}

/// Converts a `tool_id` into a `camelCase` TypeScript method name.
fn typescript_method_name(tool_id: &str) -> String {
    let pascal = pascal_case(tool_id);
    let mut chars = pascal.chars();
    match chars.next() {
        Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
        None => "tool".to_string(),
    }
}

impl fmt::Display for TypeSpec {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&python_type(self))
    }
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::missing_docs_in_private_items,
        missing_docs,
        reason = "Test-only assertions and helpers are permitted."
    )]

    use std::io::Write;

    use runlog_core::BindingType;
    use runlog_core::RiskProfile;
    use runlog_core::ToolBindingSpec;

    use super::*;

    fn sample_manifest() -> ToolManifest {
        ToolManifest {
            tool_id: "file.read".to_string(),
            version: "1.0.0".to_string(),
            inputs_schema: serde_json::json!({
                "type": "object",
                "properties": { "path": { "type": "string", "description": "Workspace-relative path." } },
                "required": ["path"],
                "additionalProperties": false
            }),
            outputs_schema: serde_json::json!({
                "type": "object",
                "properties": { "contents": { "type": "string" } },
                "required": ["contents"],
                "additionalProperties": false
            }),
            binding: ToolBindingSpec { binding_type: BindingType::InprocSafe, entrypoint: "read_file".to_string() },
            risk: RiskProfile { scopes_required: vec!["read_fs".to_string()], external_write: false, network_egress: false },
        }
    }

    fn write_catalog(manifests: &[ToolManifest]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("creates temp file");
        let bytes = serde_json::to_vec(manifests).expect("serializes");
        file.write_all(&bytes).expect("writes");
        file
    }

    #[test]
    fn loads_and_renders_python() {
        let manifests = vec![sample_manifest()];
        let file = write_catalog(&manifests);
        let generator = SdkGenerator::load(file.path()).expect("loads");
        let python = generator.generate_python().expect("renders");
        assert!(python.contains("class FileReadInputs(TypedDict)"));
        assert!(python.contains("def file_read(self, inputs: FileReadInputs) -> FileReadOutputs:"));
    }

    #[test]
    fn loads_and_renders_typescript() {
        let manifests = vec![sample_manifest()];
        let file = write_catalog(&manifests);
        let generator = SdkGenerator::load(file.path()).expect("loads");
        let typescript = generator.generate_typescript().expect("renders");
        assert!(typescript.contains("export interface FileReadInputs"));
        assert!(typescript.contains("async fileRead(inputs: FileReadInputs): Promise<FileReadOutputs>"));
    }

    #[test]
    fn renders_openapi_with_tool_and_system_config_schemas() {
        let manifests = vec![sample_manifest()];
        let file = write_catalog(&manifests);
        let generator = SdkGenerator::load(file.path()).expect("loads");
        let openapi = generator.generate_openapi().expect("renders");
        let document: Value = serde_json::from_str(&openapi).expect("parses");
        assert!(document["components"]["schemas"]["FileReadInvokeRequest"].is_object());
        assert!(document["components"]["schemas"]["SystemConfig"].is_object());
    }

    #[test]
    fn rejects_a_catalog_over_the_size_limit() {
        let mut file = tempfile::NamedTempFile::new().expect("creates temp file");
        let padding = "x".repeat(usize::try_from(MAX_MANIFESTS_BYTES).expect("fits") + 1);
        file.write_all(format!("[{padding}]").as_bytes()).expect("writes");
        let result = SdkGenerator::load(file.path());
        assert!(matches!(result, Err(SdkGenError::Tooling(_))));
    }

    #[test]
    fn pascal_case_splits_on_dots_and_dashes() {
        assert_eq!(pascal_case("file.read"), "FileRead");
        assert_eq!(pascal_case("http-fetch"), "HttpFetch");
    }
}
