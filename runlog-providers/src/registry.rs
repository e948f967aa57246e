// runlog-providers/src/registry.rs
// ============================================================================
// Module: Tool Registry
// Description: Registry of ToolBinding instances keyed by (tool_id, version).
// Purpose: Resolve a manifest's binding at dispatch time for ToolExecutor.
// Dependencies: runlog-core
// ============================================================================

//! ## Overview
//! `ToolRegistry` resolves bindings by `(tool_id, version)` per
//! `ToolExecutor`'s `bindings: Arc<dyn Fn(&str, &str) -> Option<Arc<dyn
//! ToolBinding>>>` contract. [`ToolRegistry::into_resolver`] hands back
//! exactly that closure.

use std::collections::BTreeMap;
use std::sync::Arc;

use runlog_core::BindingType;
use runlog_core::ToolBinding;
use runlog_core::ToolManifest;

use crate::inproc::InprocBinding;
use crate::inproc::InprocFunctionTable;
use crate::remote::RemoteBinding;
use crate::remote::RemoteBindingConfig;
use crate::sandbox::SandboxBinding;

/// Maps `(tool_id, version)` to a registered [`ToolBinding`] instance.
#[derive(Default)]
pub struct ToolRegistry {
    /// Registered bindings keyed by `(tool_id, version)`.
    bindings: BTreeMap<(String, String), Arc<dyn ToolBinding>>,
}

impl ToolRegistry {
    /// Returns an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            bindings: BTreeMap::new(),
        }
    }

    /// Registers `binding` for `(tool_id, version)`, replacing any prior
    /// registration for the same key.
    pub fn register(&mut self, tool_id: impl Into<String>, version: impl Into<String>, binding: Arc<dyn ToolBinding>) {
        self.bindings.insert((tool_id.into(), version.into()), binding);
    }

    /// Looks up the binding registered for `(tool_id, version)`.
    #[must_use]
    pub fn get(&self, tool_id: &str, version: &str) -> Option<Arc<dyn ToolBinding>> {
        self.bindings.get(&(tool_id.to_string(), version.to_string())).cloned()
    }

    /// Builds a registry from a store's installed manifests, dispatching
    /// each `(tool_id, version)` by its declared [`BindingType`].
    /// `mcp_remote`/`openapi_proxy` manifests are skipped when
    /// `allow_remote_mcp` is false, or when their entrypoint URL fails
    /// [`RemoteBinding::new`]'s scheme/host policy; a skipped manifest
    /// resolves to `None` at dispatch time, surfacing as `tool_not_found`.
    #[must_use]
    pub fn from_manifests(manifests: &[ToolManifest], allow_remote_mcp: bool) -> Self {
        let mut registry = Self::new();
        let inproc_table = Arc::new(InprocFunctionTable::with_builtins());
        for manifest in manifests {
            let binding: Option<Arc<dyn ToolBinding>> = match manifest.binding.binding_type {
                BindingType::InprocSafe => {
                    Some(Arc::new(InprocBinding::new(manifest.binding.entrypoint.clone(), Arc::clone(&inproc_table))))
                }
                BindingType::SandboxJob => {
                    let mut parts = manifest.binding.entrypoint.split_whitespace();
                    let program = parts.next().unwrap_or_default().to_string();
                    let args = parts.map(str::to_string).collect();
                    Some(Arc::new(SandboxBinding::new(program, args, 30_000, 1024 * 1024)))
                }
                BindingType::McpRemote | BindingType::OpenapiProxy if allow_remote_mcp => {
                    RemoteBinding::new(&manifest.binding.entrypoint, RemoteBindingConfig::default())
                        .map(|binding| Arc::new(binding) as Arc<dyn ToolBinding>)
                        .ok()
                }
                BindingType::McpRemote | BindingType::OpenapiProxy => None,
            };
            if let Some(binding) = binding {
                registry.register(manifest.tool_id.clone(), manifest.version.clone(), binding);
            }
        }
        registry
    }

    /// Wraps this registry in the resolver closure shape
    /// `ToolExecutor::new` expects.
    #[must_use]
    pub fn into_resolver(self: Arc<Self>) -> Arc<dyn Fn(&str, &str) -> Option<Arc<dyn ToolBinding>> + Send + Sync> {
        Arc::new(move |tool_id: &str, version: &str| self.get(tool_id, version))
    }
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

    use std::sync::Arc;

    use runlog_core::InprocContext;
    use runlog_core::ToolBindingError;

    use super::*;
    use crate::inproc::InprocBinding;
    use crate::inproc::InprocFunctionTable;

    fn inproc_manifest(tool_id: &str, entrypoint: &str) -> ToolManifest {
        ToolManifest {
            tool_id: tool_id.to_string(),
            version: "1.0.0".to_string(),
            inputs_schema: serde_json::json!({}),
            outputs_schema: serde_json::json!({}),
            binding: runlog_core::ToolBindingSpec { binding_type: BindingType::InprocSafe, entrypoint: entrypoint.to_string() },
            risk: runlog_core::RiskProfile::default(),
        }
    }

    #[test]
    fn from_manifests_registers_inproc_bindings() {
        let manifests = vec![inproc_manifest("file.read", "read_file")];
        let registry = ToolRegistry::from_manifests(&manifests, false);
        assert!(registry.get("file.read", "1.0.0").is_some());
    }

    #[test]
    fn from_manifests_skips_remote_bindings_when_disallowed() {
        let mut manifest = inproc_manifest("remote.call", "https://example.com/tool");
        manifest.binding.binding_type = BindingType::McpRemote;
        let registry = ToolRegistry::from_manifests(&[manifest], false);
        assert!(registry.get("remote.call", "1.0.0").is_none());
    }

    #[test]
    fn unregistered_key_resolves_to_none() {
        let registry = ToolRegistry::new();
        assert!(registry.get("missing", "1.0.0").is_none());
    }

    #[test]
    fn registered_binding_is_resolvable_by_exact_key() {
        let mut registry = ToolRegistry::new();
        let table = Arc::new(InprocFunctionTable::with_builtins());
        let binding: Arc<dyn ToolBinding> = Arc::new(InprocBinding::new("read_file", table));
        registry.register("file.read", "1.0.0", binding);

        assert!(registry.get("file.read", "1.0.0").is_some());
        assert!(registry.get("file.read", "2.0.0").is_none());
    }

    #[test]
    fn resolver_closure_matches_tool_executor_contract() {
        let mut registry = ToolRegistry::new();
        let table = Arc::new(InprocFunctionTable::with_builtins());
        let binding: Arc<dyn ToolBinding> = Arc::new(InprocBinding::new("list_dir", table));
        registry.register("dir.list", "1.0.0", binding);

        let resolver = Arc::new(registry).into_resolver();
        let resolved = resolver("dir.list", "1.0.0").expect("binding resolves");
        let ctx = InprocContext {
            workspace_root: std::env::temp_dir(),
        };
        let outcome = resolved.invoke(&serde_json::json!({"path": "."}), &ctx);
        assert!(matches!(outcome, Ok(_) | Err(ToolBindingError::ExecutionFailed(_))));
    }
}
