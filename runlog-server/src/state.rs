// runlog-server/src/state.rs
// ============================================================================
// Module: Server State
// Description: Wires Store, runtime collaborators, and the auth/contract
//              layers into one handle shared by every route.
// Purpose: One construction site for the object graph every handler reads
//          from via axum's State extractor.
// Dependencies: axum, runlog-broker, runlog-core, runlog-contract
// ============================================================================

//! ## Overview
//! [`AppState`] is cloned into every request (everything inside is an
//! `Arc`, so the clone is cheap). [`AppState::new`] is the one place the
//! runtime components (`EventLog`, `ToolExecutor`, `ApprovalLedger`,
//! `ProvenanceService`, `IdempotencyCache`) are stitched together.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use runlog_broker::CompositeBroker;
use runlog_core::ApprovalLedger;
use runlog_core::Clock;
use runlog_core::EventLog;
use runlog_core::EventLogConfig;
use runlog_core::IdGenerator;
use runlog_core::IdempotencyCache;
use runlog_core::NotificationRouter;
use runlog_core::PolicyEngine;
use runlog_core::ProvenanceService;
use runlog_core::QuotaLimits;
use runlog_core::Store;
use runlog_core::ToolBinding;
use runlog_core::ToolErrorNotifyPolicy;
use runlog_core::ToolExecutor;

use crate::auth::BearerAuthority;
use crate::blobstore::LocalDiskBlobStore;
use crate::config::ServerConfig;
use crate::notify::NotificationService;
use crate::sse::StreamLimiter;

/// Shared application state, cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Durable store backing every collaborator below.
    pub store: Arc<dyn Store>,
    /// Clock used for timestamping new rows.
    pub clock: Arc<dyn Clock>,
    /// Id generator used for new rows.
    pub id_gen: Arc<dyn IdGenerator>,
    /// The only write path for run events.
    pub event_log: Arc<EventLog>,
    /// Validates inputs/outputs, dispatches bindings, records tool events.
    pub tool_executor: Arc<ToolExecutor>,
    /// Pending/approved/denied tool-call decisions.
    pub approvals: Arc<ApprovalLedger>,
    /// Computes and caches provenance graphs.
    pub provenance: Arc<ProvenanceService>,
    /// Replays idempotent responses by `(user, endpoint, key)`.
    pub idempotency: Arc<IdempotencyCache>,
    /// Resolves recipients, routes, and dispatches notifications.
    pub notify: Arc<NotificationService>,
    /// Contract schema registry, for manifest and system-config validation.
    pub contracts: Arc<runlog_contract::ContractRegistry>,
    /// Operator-facing knobs.
    pub config: ServerConfig,
    /// Static bearer-token-to-user map.
    pub auth: BearerAuthority,
    /// Bounds concurrent SSE streams per `(user, stream kind)`.
    pub stream_limiter: Arc<StreamLimiter>,
    /// Content-addressed blob storage backing artifact bytes.
    pub blobstore: Arc<LocalDiskBlobStore>,
    /// In-progress multipart upload buffers, keyed by upload id. Assembly
    /// scratch space only; nothing here is durable until `finalize_upload`
    /// writes the assembled bytes through `blobstore`.
    pub uploads: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

/// Errors that can occur while wiring [`AppState::new`]'s object graph.
#[derive(Debug, thiserror::Error)]
pub enum AppStateError {
    /// The contract schema registry failed to compile.
    #[error(transparent)]
    Contract(#[from] runlog_contract::ContractError),
    /// The artifact blob store's root could not be prepared.
    #[error(transparent)]
    Blobstore(#[from] crate::blobstore::BlobStoreError),
}

impl AppState {
    /// Builds the full object graph from its durable and operational
    /// inputs. `bindings` resolves a registered [`ToolBinding`] by
    /// `(tool_id, version)`, matching [`ToolExecutor::new`].
    ///
    /// # Errors
    ///
    /// Returns an error if the contract schema registry fails to compile
    /// or the artifact blob store's root cannot be created.
    pub fn new(
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        id_gen: Arc<dyn IdGenerator>,
        bindings: Arc<dyn Fn(&str, &str) -> Option<Arc<dyn ToolBinding>> + Send + Sync>,
        config: ServerConfig,
        auth: BearerAuthority,
    ) -> Result<Self, AppStateError> {
        let contracts = Arc::new(runlog_contract::ContractRegistry::new()?);
        let tool_error_policy = ToolErrorNotifyPolicy {
            enabled: config.notify_tool_errors,
            only_codes: config.notify_tool_errors_only_codes.clone(),
            only_bindings: config.notify_tool_errors_only_bindings.clone(),
            max_per_run: config.notify_tool_errors_max_per_run,
        };
        // EventLog needs a uniform EventObserver; NotificationRouter's own
        // impl is a no-op since it lacks the recipient context only a
        // handler can supply, so a second instance serves `notify` below.
        let commit_observer = NotificationRouter::new(
            Arc::clone(&store),
            Arc::clone(&id_gen),
            tool_error_policy.clone(),
        );
        let event_log_config = EventLogConfig {
            quota_limits: QuotaLimits {
                max_events_per_run: config.max_events_per_run,
                max_bytes_per_run: config.max_bytes_per_run,
            },
            write_retry_budget: config.write_retry_budget,
        };
        let event_log = Arc::new(EventLog::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            Arc::clone(&id_gen),
            contracts.clone() as Arc<dyn runlog_core::PayloadValidator>,
            Arc::new(commit_observer),
            event_log_config,
        ));
        let policy = Arc::new(PolicyEngine::new(Arc::clone(&store)));
        let approvals = Arc::new(ApprovalLedger::new(Arc::clone(&store), Arc::clone(&id_gen)));
        let tool_executor = Arc::new(ToolExecutor::new(
            Arc::clone(&store),
            Arc::clone(&event_log),
            policy,
            Arc::clone(&approvals),
            Arc::clone(&id_gen),
            bindings,
        ));
        let provenance = Arc::new(ProvenanceService::new(Arc::clone(&store), Arc::clone(&clock)));
        let idempotency = Arc::new(IdempotencyCache::new(Arc::clone(&store), Arc::clone(&clock)));
        let router = NotificationRouter::new(Arc::clone(&store), Arc::clone(&id_gen), tool_error_policy);
        let broker = Arc::new(
            CompositeBroker::builder()
                .sink(runlog_broker::LogSink::new(Arc::clone(&clock)))
                .build()
                .expect("at least one sink is always registered"),
        );
        let notify = Arc::new(NotificationService::new(Arc::clone(&store), router, broker));
        let stream_limiter = Arc::new(StreamLimiter::new(config.sse_max_concurrent_per_user));
        let blobstore = Arc::new(LocalDiskBlobStore::new(config.workspace_root.join("artifacts"))?);
        let uploads = Arc::new(Mutex::new(HashMap::new()));
        Ok(Self {
            store,
            clock,
            id_gen,
            event_log,
            tool_executor,
            approvals,
            provenance,
            idempotency,
            notify,
            contracts,
            config,
            auth,
            stream_limiter,
            blobstore,
            uploads,
        })
    }
}
