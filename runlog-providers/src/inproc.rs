// runlog-providers/src/inproc.rs
// ============================================================================
// Module: In-Process Safe Bindings
// Description: Plain-function ToolBinding implementations constrained to a
//              project's workspace root.
// Purpose: Dispatch `inproc_safe` manifests without spawning a subprocess or
//          leaving the process boundary.
// Dependencies: runlog-core
// ============================================================================

//! ## Overview
//! An `inproc_safe` binding's entrypoint names a function registered in an
//! [`InprocFunctionTable`]. Every built-in function resolves its `path`
//! input against [`InprocContext::workspace_root`]: joined, canonicalized,
//! and rejected if the result escapes the root.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use runlog_core::InprocContext;
use runlog_core::ToolBinding;
use runlog_core::ToolBindingError;
use serde_json::Value;

/// Maximum bytes `read_file` returns before failing closed.
const MAX_READ_BYTES: u64 = 4 * 1024 * 1024;

/// Signature every built-in and caller-registered in-process function must
/// match.
pub type InprocFn = fn(&Value, &InprocContext) -> Result<Value, ToolBindingError>;

/// Named table of in-process functions, shared across every
/// [`InprocBinding`] instance in a registry.
#[derive(Clone)]
pub struct InprocFunctionTable {
    /// Registered functions keyed by entrypoint name.
    functions: BTreeMap<String, InprocFn>,
}

impl InprocFunctionTable {
    /// Returns an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            functions: BTreeMap::new(),
        }
    }

    /// Returns a table seeded with `read_file`, `write_file`, and
    /// `list_dir`.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut table = Self::new();
        table.register("read_file", read_file);
        table.register("write_file", write_file);
        table.register("list_dir", list_dir);
        table
    }

    /// Registers or replaces a named function.
    pub fn register(&mut self, name: impl Into<String>, f: InprocFn) {
        self.functions.insert(name.into(), f);
    }

    /// Looks up a function by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<InprocFn> {
        self.functions.get(name).copied()
    }
}

impl Default for InprocFunctionTable {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// A [`ToolBinding`] that dispatches to a named entry in an
/// [`InprocFunctionTable`].
pub struct InprocBinding {
    /// Function name to resolve in `table` at invocation time.
    entrypoint: String,
    /// Shared function table this binding dispatches through.
    table: Arc<InprocFunctionTable>,
}

impl InprocBinding {
    /// Creates a binding for `entrypoint`, resolved against `table` at
    /// invocation time.
    #[must_use]
    pub fn new(entrypoint: impl Into<String>, table: Arc<InprocFunctionTable>) -> Self {
        Self {
            entrypoint: entrypoint.into(),
            table,
        }
    }
}

impl ToolBinding for InprocBinding {
    fn invoke(&self, inputs: &Value, ctx: &InprocContext) -> Result<Value, ToolBindingError> {
        let f = self.table.get(&self.entrypoint).ok_or_else(|| {
            ToolBindingError::ExecutionFailed(format!("unknown inproc function: {}", self.entrypoint))
        })?;
        f(inputs, ctx)
    }
}

/// Resolves `raw` against `ctx.workspace_root`, requiring the result to
/// exist and stay within the root.
fn resolve_existing(ctx: &InprocContext, raw: &str) -> Result<PathBuf, ToolBindingError> {
    let candidate = reject_absolute(raw)?;
    let joined = ctx.workspace_root.join(candidate);
    let resolved = joined
        .canonicalize()
        .map_err(|_| ToolBindingError::UnsafePath(format!("unable to resolve path: {raw}")))?;
    require_within_root(&ctx.workspace_root, &resolved)?;
    Ok(resolved)
}

/// Resolves `raw` against `ctx.workspace_root` for a file that may not yet
/// exist; the parent directory must already exist and stay within the
/// root.
fn resolve_for_write(ctx: &InprocContext, raw: &str) -> Result<PathBuf, ToolBindingError> {
    let candidate = reject_absolute(raw)?;
    let joined = ctx.workspace_root.join(candidate);
    let Some(parent) = joined.parent() else {
        return Err(ToolBindingError::UnsafePath(format!("path has no parent: {raw}")));
    };
    let resolved_parent = parent
        .canonicalize()
        .map_err(|_| ToolBindingError::UnsafePath(format!("unable to resolve parent of: {raw}")))?;
    require_within_root(&ctx.workspace_root, &resolved_parent)?;
    let Some(file_name) = joined.file_name() else {
        return Err(ToolBindingError::UnsafePath(format!("path has no file name: {raw}")));
    };
    Ok(resolved_parent.join(file_name))
}

/// Rejects an absolute or empty path before it is ever joined to the root.
fn reject_absolute(raw: &str) -> Result<PathBuf, ToolBindingError> {
    if raw.is_empty() {
        return Err(ToolBindingError::UnsafePath("path is empty".to_string()));
    }
    let candidate = PathBuf::from(raw);
    if candidate.is_absolute() {
        return Err(ToolBindingError::UnsafePath(format!("absolute paths are forbidden: {raw}")));
    }
    Ok(candidate)
}

/// Confirms `resolved` stays within `root` after canonicalization.
fn require_within_root(root: &Path, resolved: &Path) -> Result<(), ToolBindingError> {
    if resolved.starts_with(root) {
        Ok(())
    } else {
        Err(ToolBindingError::UnsafePath(format!("{} escapes workspace root", resolved.display())))
    }
}

/// Extracts a required string field from an inputs object.
fn string_field<'a>(inputs: &'a Value, field: &str) -> Result<&'a str, ToolBindingError> {
    inputs
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolBindingError::ExecutionFailed(format!("inputs missing string field: {field}")))
}

/// Reads a UTF-8 text file under the workspace root.
fn read_file(inputs: &Value, ctx: &InprocContext) -> Result<Value, ToolBindingError> {
    let raw_path = string_field(inputs, "path")?;
    let resolved = resolve_existing(ctx, raw_path)?;
    let metadata = fs::metadata(&resolved)
        .map_err(|err| ToolBindingError::ExecutionFailed(format!("stat failed: {err}")))?;
    if metadata.len() > MAX_READ_BYTES {
        return Err(ToolBindingError::ExecutionFailed(format!(
            "file exceeds {MAX_READ_BYTES} byte limit"
        )));
    }
    let contents = fs::read_to_string(&resolved)
        .map_err(|err| ToolBindingError::ExecutionFailed(format!("read failed: {err}")))?;
    Ok(serde_json::json!({ "contents": contents }))
}

/// Writes a UTF-8 text file under the workspace root, creating it if
/// absent.
fn write_file(inputs: &Value, ctx: &InprocContext) -> Result<Value, ToolBindingError> {
    let raw_path = string_field(inputs, "path")?;
    let contents = string_field(inputs, "contents")?;
    let resolved = resolve_for_write(ctx, raw_path)?;
    fs::write(&resolved, contents)
        .map_err(|err| ToolBindingError::ExecutionFailed(format!("write failed: {err}")))?;
    Ok(serde_json::json!({ "bytes_written": contents.len() }))
}

/// Lists the immediate entries of a directory under the workspace root.
fn list_dir(inputs: &Value, ctx: &InprocContext) -> Result<Value, ToolBindingError> {
    let raw_path = string_field(inputs, "path")?;
    let resolved = resolve_existing(ctx, raw_path)?;
    let entries = fs::read_dir(&resolved)
        .map_err(|err| ToolBindingError::ExecutionFailed(format!("list_dir failed: {err}")))?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| ToolBindingError::ExecutionFailed(format!("list_dir failed: {err}")))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        names.push(name);
    }
    names.sort();
    Ok(serde_json::json!({ "entries": names }))
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        clippy::missing_docs_in_private_items,
        clippy::missing_panics_doc,
        missing_docs,
        reason = "Test-only assertions and helpers are permitted."
    )]

    use super::*;

    fn ctx(root: &Path) -> InprocContext {
        InprocContext {
            workspace_root: root.to_path_buf(),
        }
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let ctx = ctx(dir.path());
        let write_inputs = serde_json::json!({ "path": "note.txt", "contents": "hello" });
        let table = InprocFunctionTable::with_builtins();
        let write = table.get("write_file").expect("write_file registered");
        write(&write_inputs, &ctx).expect("write succeeds");

        let read_inputs = serde_json::json!({ "path": "note.txt" });
        let read = table.get("read_file").expect("read_file registered");
        let result = read(&read_inputs, &ctx).expect("read succeeds");
        assert_eq!(result["contents"], "hello");
    }

    #[test]
    fn escaping_path_is_rejected() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let ctx = ctx(dir.path());
        let inputs = serde_json::json!({ "path": "../escape.txt", "contents": "x" });
        let err = write_file(&inputs, &ctx).unwrap_err();
        assert!(matches!(err, ToolBindingError::UnsafePath(_)));
    }

    #[test]
    fn absolute_path_is_rejected() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let ctx = ctx(dir.path());
        let inputs = serde_json::json!({ "path": "/etc/passwd" });
        let err = read_file(&inputs, &ctx).unwrap_err();
        assert!(matches!(err, ToolBindingError::UnsafePath(_)));
    }

    #[test]
    fn unknown_entrypoint_fails_closed() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let ctx = ctx(dir.path());
        let binding = InprocBinding::new("does_not_exist", Arc::new(InprocFunctionTable::with_builtins()));
        let err = binding.invoke(&serde_json::json!({}), &ctx).unwrap_err();
        assert!(matches!(err, ToolBindingError::ExecutionFailed(_)));
    }
}
