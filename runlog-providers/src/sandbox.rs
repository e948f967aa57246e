// runlog-providers/src/sandbox.rs
// ============================================================================
// Module: Sandboxed Subprocess Binding
// Description: ToolBinding implementation that runs `sandbox_job` manifests
//              as a timed, output-capped subprocess.
// Purpose: Dispatch `sandbox_job` entries without ever blocking the caller
//          past its declared timeout or letting stdout grow unbounded.
// Dependencies: runlog-core, tokio, serde_json
// ============================================================================

//! ## Overview
//! `SandboxBinding::invoke` is synchronous, matching
//! [`runlog_core::ToolBinding`], but the subprocess plumbing underneath is
//! `tokio::process::Command` plus `tokio::time::timeout`. Each invocation
//! builds a short-lived current-thread `tokio::runtime::Runtime` and blocks
//! on it. Inputs are written to the child's stdin as a JSON payload;
//! stdout and stderr are each read back under their own byte cap and
//! stdout is parsed as JSON once the child exits successfully.

use std::process::Stdio;
use std::time::Duration;

use runlog_core::InprocContext;
use runlog_core::ToolBinding;
use runlog_core::ToolBindingError;
use serde_json::Value;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::runtime::Builder;
use tracing::warn;

/// A [`ToolBinding`] that runs `entrypoint` as a subprocess under a
/// wall-clock timeout with a capped stdout read.
pub struct SandboxBinding {
    /// Program name or path to execute; arguments are fixed at
    /// registration time rather than taken from caller-supplied inputs.
    program: String,
    /// Extra arguments passed to `program` ahead of the JSON stdin payload.
    args: Vec<String>,
    /// Wall-clock timeout, in milliseconds.
    timeout_ms: u64,
    /// Maximum stdout bytes read before the binding fails closed.
    max_output_bytes: usize,
}

impl SandboxBinding {
    /// Creates a binding that runs `program args...` with `timeout_ms`
    /// wall-clock budget and `max_output_bytes` of captured stdout.
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout_ms: u64, max_output_bytes: usize) -> Self {
        Self {
            program: program.into(),
            args,
            timeout_ms,
            max_output_bytes,
        }
    }
}

impl ToolBinding for SandboxBinding {
    fn invoke(&self, inputs: &Value, ctx: &InprocContext) -> Result<Value, ToolBindingError> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| ToolBindingError::ExecutionFailed(format!("sandbox runtime build failed: {err}")))?;
        runtime.block_on(run_child(self, inputs, ctx))
    }
}

/// Bytes allotted to stderr for error-message context; independent of
/// `max_output_bytes`, which governs the stdout result payload only.
const MAX_STDERR_BYTES: usize = 16 * 1024;

/// Spawns the child, writes `inputs` to stdin, reads stdout/stderr under a
/// byte cap, waits for exit under a wall-clock timeout, and parses stdout
/// as JSON.
async fn run_child(binding: &SandboxBinding, inputs: &Value, ctx: &InprocContext) -> Result<Value, ToolBindingError> {
    let payload = serde_json::to_vec(inputs)
        .map_err(|err| ToolBindingError::ExecutionFailed(format!("inputs serialization failed: {err}")))?;

    let mut child = Command::new(&binding.program)
        .args(&binding.args)
        .current_dir(&ctx.workspace_root)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|err| ToolBindingError::ExecutionFailed(format!("spawn failed: {err}")))?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| ToolBindingError::ExecutionFailed("child has no stdin handle".to_string()))?;
    let mut stdout_pipe = child
        .stdout
        .take()
        .ok_or_else(|| ToolBindingError::ExecutionFailed("child has no stdout handle".to_string()))?;
    let mut stderr_pipe = child
        .stderr
        .take()
        .ok_or_else(|| ToolBindingError::ExecutionFailed("child has no stderr handle".to_string()))?;

    let timeout = Duration::from_millis(binding.timeout_ms);
    let run = async {
        stdin
            .write_all(&payload)
            .await
            .map_err(|err| ToolBindingError::ExecutionFailed(format!("stdin write failed: {err}")))?;
        drop(stdin);

        let stdout_bytes = read_capped(&mut stdout_pipe, binding.max_output_bytes).await?;
        let stderr_bytes = read_capped(&mut stderr_pipe, MAX_STDERR_BYTES).await?;
        let status = child
            .wait()
            .await
            .map_err(|err| ToolBindingError::ExecutionFailed(format!("wait failed: {err}")))?;
        Ok::<_, ToolBindingError>((stdout_bytes, stderr_bytes, status))
    };

    let (stdout, stderr, status) = tokio::time::timeout(timeout, run).await.map_err(|_| {
        warn!(program = %binding.program, timeout_ms = binding.timeout_ms, "sandbox job timed out");
        ToolBindingError::Timeout(binding.timeout_ms)
    })??;

    if !status.success() {
        let stderr = String::from_utf8_lossy(&stderr);
        return Err(ToolBindingError::ExecutionFailed(format!("exit status {status}: {stderr}")));
    }

    serde_json::from_slice(&stdout)
        .map_err(|err| ToolBindingError::ExecutionFailed(format!("stdout is not valid json: {err}")))
}

/// Reads at most `max_bytes` from `pipe`, failing closed if more remains.
async fn read_capped<R: AsyncReadExt + Unpin>(pipe: &mut R, max_bytes: usize) -> Result<Vec<u8>, ToolBindingError> {
    let limit = u64::try_from(max_bytes)
        .map_err(|_| ToolBindingError::ExecutionFailed("output size limit exceeds u64".to_string()))?
        .saturating_add(1);
    let mut buf = Vec::new();
    pipe.take(limit)
        .read_to_end(&mut buf)
        .await
        .map_err(|err| ToolBindingError::ExecutionFailed(format!("read failed: {err}")))?;
    if buf.len() > max_bytes {
        return Err(ToolBindingError::ExecutionFailed(format!("output exceeds {max_bytes} byte limit")));
    }
    Ok(buf)
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

    fn ctx() -> (tempfile::TempDir, InprocContext) {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let ctx = InprocContext {
            workspace_root: dir.path().to_path_buf(),
        };
        (dir, ctx)
    }

    #[test]
    fn echoing_cat_returns_stdin_as_json() {
        let (_dir, ctx) = ctx();
        let binding = SandboxBinding::new("cat", vec![], 2_000, 4096);
        let result = binding.invoke(&serde_json::json!({"x": 1}), &ctx).expect("cat echoes stdin");
        assert_eq!(result, serde_json::json!({"x": 1}));
    }

    #[test]
    fn missing_program_fails_closed() {
        let (_dir, ctx) = ctx();
        let binding = SandboxBinding::new("no-such-binary-xyz", vec![], 2_000, 4096);
        let err = binding.invoke(&serde_json::json!({}), &ctx).unwrap_err();
        assert!(matches!(err, ToolBindingError::ExecutionFailed(_)));
    }

    #[test]
    fn slow_child_times_out() {
        let (_dir, ctx) = ctx();
        let binding = SandboxBinding::new("sleep", vec!["5".to_string()], 50, 4096);
        let err = binding.invoke(&serde_json::json!({}), &ctx).unwrap_err();
        assert!(matches!(err, ToolBindingError::Timeout(_)));
    }
}
