// runlog-core/tests/integration.rs
// ============================================================================
// Module: Integration Tests
// Description: End-to-end scenarios over EventLog, PolicyEngine,
//              ToolExecutor, ApprovalLedger, IdempotencyCache, and
//              ProvenanceService, backed by an in-memory Store.
// ============================================================================

#![allow(
    missing_docs,
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::missing_docs_in_private_items,
    clippy::missing_panics_doc,
    reason = "Test-only assertions and helpers are permitted."
)]

mod common;

use std::sync::Arc;

use common::InMemoryStore;
use runlog_core::core::identifiers::Id;
use runlog_core::core::identifiers::ProjectId;
use runlog_core::core::identifiers::RunId;
use runlog_core::core::identifiers::ThreadId;
use runlog_core::core::identifiers::UserId;
use runlog_core::core::model::Actor;
use runlog_core::core::model::EventIntent;
use runlog_core::core::model::Pins;
use runlog_core::core::model::Privacy;
use runlog_core::core::model::RiskProfile;
use runlog_core::core::model::Run;
use runlog_core::core::model::RunStatus;
use runlog_core::core::model::ScopeGrant;
use runlog_core::core::model::Thread;
use runlog_core::core::model::ToolBindingSpec;
use runlog_core::core::model::ToolManifest;
use runlog_core::core::model::BindingType;
use runlog_core::core::time::FixedClock;
use runlog_core::core::time::RandomIdGenerator;
use runlog_core::interfaces::Store;
use runlog_core::runtime::ApprovalLedger;
use runlog_core::runtime::EventLog;
use runlog_core::runtime::EventLogConfig;
use runlog_core::runtime::EventLogError;
use runlog_core::runtime::IdempotencyCache;
use runlog_core::runtime::IdempotencyOutcome;
use runlog_core::runtime::PayloadValidator;
use runlog_core::runtime::PolicyDecision;
use runlog_core::runtime::PolicyEngine;
use runlog_core::runtime::ProvenanceLimits;
use runlog_core::runtime::ProvenanceService;
use runlog_core::runtime::QuotaLimits;
use runlog_core::runtime::ToolExecutor;
use runlog_core::runtime::ToolOutcome;
use runlog_core::runtime::eventlog::NoopObserver;

struct AllowAllValidator;

impl PayloadValidator for AllowAllValidator {
    fn validate(&self, _kind: &str, _payload: &serde_json::Value) -> Result<(), String> {
        Ok(())
    }
}

fn setup(
    store: &Arc<InMemoryStore>,
    quota_limits: QuotaLimits,
) -> (EventLog, RunId, ProjectId) {
    let thread_id = ThreadId::from(Id::from_raw(1));
    let project_id = ProjectId::from(Id::from_raw(2));
    let run_id = RunId::from(Id::from_raw(3));
    let user_id = UserId::from(Id::from_raw(4));

    store.seed_thread(Thread {
        thread_id,
        project_id: Some(project_id),
        owner_user_id: None,
        title: "test thread".to_string(),
    });

    let clock = Arc::new(FixedClock::new(1_000));
    store
        .create_run(Run {
            run_id,
            thread_id,
            status: RunStatus::Running,
            created_by_user_id: user_id,
            pins: Pins::default(),
            created_at: clock.now(),
        })
        .expect("create run");

    let event_log = EventLog::new(
        store.clone(),
        clock,
        Arc::new(RandomIdGenerator),
        Arc::new(AllowAllValidator),
        Arc::new(NoopObserver),
        EventLogConfig {
            quota_limits,
            write_retry_budget: 3,
        },
    );

    (event_log, run_id, project_id)
}

fn max_limits() -> QuotaLimits {
    QuotaLimits {
        max_events_per_run: u64::MAX,
        max_bytes_per_run: u64::MAX,
    }
}

fn user_message(run_id: RunId, text: &str) -> EventIntent {
    EventIntent {
        run_id,
        kind: "user_message".to_string(),
        payload: serde_json::json!({ "text": text }),
        actor: Actor::User,
        parent_event_id: None,
        correlation_id: None,
        privacy: Privacy::Standard,
        pins: Pins::default(),
        event_id: None,
        ts: None,
    }
}

#[test]
fn event_log_assigns_increasing_seq() {
    let store = InMemoryStore::new();
    let (event_log, run_id, _project_id) = setup(&store, max_limits());

    let first = event_log.append(user_message(run_id, "hello")).expect("append 1");
    let second = event_log.append(user_message(run_id, "world")).expect("append 2");

    assert_eq!(first.seq, 1);
    assert_eq!(second.seq, 2);
}

#[test]
fn event_count_quota_rejects_without_appending() {
    let store = InMemoryStore::new();
    let limits = QuotaLimits {
        max_events_per_run: 1,
        max_bytes_per_run: u64::MAX,
    };
    let (event_log, run_id, _project_id) = setup(&store, limits);

    event_log.append(user_message(run_id, "first")).expect("append 1");
    let err = event_log
        .append(user_message(run_id, "second"))
        .expect_err("should exceed event quota");
    assert_eq!(err.error_kind(), "quota_exceeded");

    let events = store.list_events(run_id, 0).expect("list events");
    assert_eq!(events.len(), 1, "the rejected write must not append a row");
}

#[test]
fn byte_quota_rejection_appends_best_effort_audit_event() {
    let store = InMemoryStore::new();
    let limits = QuotaLimits {
        max_events_per_run: u64::MAX,
        // Large enough that the small quota_exceeded audit payload itself
        // fits, but small enough that the oversized message below does not.
        max_bytes_per_run: 100,
    };
    let (event_log, run_id, _project_id) = setup(&store, limits);

    let oversized_text = "x".repeat(500);
    match event_log.append(user_message(run_id, &oversized_text)) {
        Err(EventLogError::QuotaExceeded(_)) => {}
        other => panic!("expected quota_exceeded, got {other:?}"),
    }

    let events = store.list_events(run_id, 0).expect("list events");
    assert_eq!(events.len(), 1, "the quota_exceeded audit event should still land");
    assert_eq!(events[0].kind, "quota_exceeded");
}

fn risky_manifest(scopes: Vec<&str>, external_write: bool) -> ToolManifest {
    ToolManifest {
        tool_id: "web.fetch".to_string(),
        version: "1.0.0".to_string(),
        inputs_schema: serde_json::json!({}),
        outputs_schema: serde_json::json!({}),
        binding: ToolBindingSpec {
            binding_type: BindingType::InprocSafe,
            entrypoint: "fetch_url".to_string(),
        },
        risk: RiskProfile {
            scopes_required: scopes.into_iter().map(str::to_string).collect(),
            external_write,
            network_egress: true,
        },
    }
}

#[test]
fn policy_engine_denies_missing_scope() {
    let store = InMemoryStore::new();
    let (_event_log, run_id, project_id) = setup(&store, max_limits());
    store.seed_manifest(risky_manifest(vec!["read_web"], false));

    let policy = PolicyEngine::new(store.clone());
    let manifest = store.get_manifest("web.fetch", None).expect("manifest");
    let decision = policy
        .evaluate(
            run_id,
            project_id,
            &manifest.tool_id,
            &manifest.version,
            &manifest.risk,
            false,
            false,
            false,
        )
        .expect("evaluate");

    assert!(matches!(decision, PolicyDecision::Deny { .. }));
}

#[test]
fn policy_engine_requires_approval_for_external_write_without_prior_grant() {
    let store = InMemoryStore::new();
    let (_event_log, run_id, project_id) = setup(&store, max_limits());
    store.seed_manifest(risky_manifest(vec!["read_web"], true));
    store.seed_scope_grant(ScopeGrant {
        project_id,
        scope: "read_web".to_string(),
        granted_by: UserId::from(Id::from_raw(99)),
        granted_at: FixedClock::new(0).now(),
    });

    let policy = PolicyEngine::new(store.clone());
    let manifest = store.get_manifest("web.fetch", None).expect("manifest");
    let decision = policy
        .evaluate(
            run_id,
            project_id,
            &manifest.tool_id,
            &manifest.version,
            &manifest.risk,
            false,
            false,
            false,
        )
        .expect("evaluate");

    assert!(matches!(decision, PolicyDecision::ApprovalRequired));
}

#[test]
fn tool_executor_denies_then_reports_tool_error() {
    let store = InMemoryStore::new();
    let (event_log, run_id, project_id) = setup(&store, max_limits());
    store.seed_manifest(risky_manifest(vec!["read_web"], false));

    let event_log = Arc::new(event_log);
    let policy = Arc::new(PolicyEngine::new(store.clone()));
    let approvals = Arc::new(ApprovalLedger::new(store.clone(), Arc::new(RandomIdGenerator)));
    let bindings: Arc<dyn Fn(&str, &str) -> Option<Arc<dyn runlog_core::interfaces::ToolBinding>> + Send + Sync> =
        Arc::new(|_tool_id: &str, _version: &str| None);
    let executor = ToolExecutor::new(
        store.clone(),
        event_log.clone(),
        policy,
        approvals,
        Arc::new(RandomIdGenerator),
        bindings,
    );

    let outcome = executor
        .invoke(
            run_id,
            project_id,
            "web.fetch",
            None,
            serde_json::json!({ "url": "https://example.com" }),
            UserId::from(Id::from_raw(4)),
            std::path::PathBuf::from("/tmp/workspace"),
            false,
        )
        .expect("invoke");

    match outcome {
        ToolOutcome::Denied { event } => {
            assert_eq!(event.kind, "tool_error");
            assert_eq!(
                event.payload.get("error_code").and_then(serde_json::Value::as_str),
                Some("POLICY_DENIED")
            );
        }
        other => panic!("expected Denied, got {other:?}"),
    }
}

#[test]
fn tool_executor_approval_then_resume_completes() {
    let store = InMemoryStore::new();
    let (event_log, run_id, project_id) = setup(&store, max_limits());
    store.seed_manifest(risky_manifest(vec!["read_web"], true));
    store.seed_scope_grant(ScopeGrant {
        project_id,
        scope: "read_web".to_string(),
        granted_by: UserId::from(Id::from_raw(99)),
        granted_at: FixedClock::new(0).now(),
    });

    let event_log = Arc::new(event_log);
    let policy = Arc::new(PolicyEngine::new(store.clone()));
    let approvals = Arc::new(ApprovalLedger::new(store.clone(), Arc::new(RandomIdGenerator)));
    let bindings: Arc<dyn Fn(&str, &str) -> Option<Arc<dyn runlog_core::interfaces::ToolBinding>> + Send + Sync> =
        Arc::new(|_tool_id: &str, _version: &str| Some(Arc::new(EchoBinding) as Arc<dyn runlog_core::interfaces::ToolBinding>));
    let executor = ToolExecutor::new(
        store.clone(),
        event_log.clone(),
        policy,
        approvals.clone(),
        Arc::new(RandomIdGenerator),
        bindings,
    );

    let first = executor
        .invoke(
            run_id,
            project_id,
            "web.fetch",
            None,
            serde_json::json!({ "url": "https://example.com" }),
            UserId::from(Id::from_raw(4)),
            std::path::PathBuf::from("/tmp/workspace"),
            false,
        )
        .expect("invoke");

    let approval_id = match first {
        ToolOutcome::WaitingApproval { approval_id } => approval_id,
        other => panic!("expected WaitingApproval, got {other:?}"),
    };

    approvals.approve(approval_id).expect("approve");

    let resumed = executor
        .invoke(
            run_id,
            project_id,
            "web.fetch",
            None,
            serde_json::json!({ "url": "https://example.com" }),
            UserId::from(Id::from_raw(4)),
            std::path::PathBuf::from("/tmp/workspace"),
            true,
        )
        .expect("resumed invoke");

    assert!(matches!(resumed, ToolOutcome::Completed { .. }));
}

struct EchoBinding;

impl runlog_core::interfaces::ToolBinding for EchoBinding {
    fn invoke(
        &self,
        inputs: &serde_json::Value,
        _ctx: &runlog_core::interfaces::InprocContext,
    ) -> Result<serde_json::Value, runlog_core::interfaces::ToolBindingError> {
        Ok(inputs.clone())
    }
}

#[test]
fn idempotency_cache_replays_same_key_same_body() {
    let store = InMemoryStore::new();
    let clock = Arc::new(FixedClock::new(0));
    let cache = IdempotencyCache::new(store.clone(), clock);
    let user_id = UserId::from(Id::from_raw(5));
    let body = serde_json::json!({ "amount": 42 });

    match cache
        .resolve(user_id, "create_run", "key-1", &body)
        .expect("resolve")
    {
        IdempotencyOutcome::Miss { composite_key } => {
            cache
                .store(user_id, "create_run", &composite_key, serde_json::json!({ "run_id": "abc" }))
                .expect("store");
        }
        IdempotencyOutcome::Hit { .. } => panic!("expected first call to miss"),
    }

    match cache
        .resolve(user_id, "create_run", "key-1", &body)
        .expect("resolve again")
    {
        IdempotencyOutcome::Hit { response } => {
            assert_eq!(response, serde_json::json!({ "run_id": "abc" }));
        }
        IdempotencyOutcome::Miss { .. } => panic!("expected replay to hit"),
    }
}

#[test]
fn idempotency_cache_same_key_different_body_is_a_miss() {
    let store = InMemoryStore::new();
    let clock = Arc::new(FixedClock::new(0));
    let cache = IdempotencyCache::new(store.clone(), clock);
    let user_id = UserId::from(Id::from_raw(6));

    let body_a = serde_json::json!({ "amount": 1 });
    let outcome_a = cache.resolve(user_id, "create_run", "shared-key", &body_a).expect("resolve a");
    let key_a = match outcome_a {
        IdempotencyOutcome::Miss { composite_key } => composite_key,
        IdempotencyOutcome::Hit { .. } => panic!("unexpected hit"),
    };
    cache
        .store(user_id, "create_run", &key_a, serde_json::json!({ "run_id": "a" }))
        .expect("store a");

    let body_b = serde_json::json!({ "amount": 2 });
    match cache
        .resolve(user_id, "create_run", "shared-key", &body_b)
        .expect("resolve b")
    {
        IdempotencyOutcome::Miss { .. } => {}
        IdempotencyOutcome::Hit { .. } => panic!("different body must not replay the first response"),
    }
}

#[test]
fn provenance_graph_links_artifact_to_producing_event() {
    let store = InMemoryStore::new();
    let (event_log, run_id, _project_id) = setup(&store, max_limits());

    let call_event = event_log
        .append(EventIntent {
            run_id,
            kind: "tool_call".to_string(),
            payload: serde_json::json!({ "tool_id": "img.gen" }),
            actor: Actor::User,
            parent_event_id: None,
            correlation_id: None,
            privacy: Privacy::Standard,
            pins: Pins::default(),
            event_id: None,
            ts: None,
        })
        .expect("append tool_call");

    let artifact_id = runlog_core::core::identifiers::ArtifactId::from(Id::from_raw(777));
    event_log
        .append(EventIntent {
            run_id,
            kind: "artifact_ref".to_string(),
            payload: serde_json::json!({ "artifact_id": artifact_id.to_string() }),
            actor: Actor::Tool,
            parent_event_id: Some(call_event.event_id),
            correlation_id: None,
            privacy: Privacy::Standard,
            pins: Pins::default(),
            event_id: None,
            ts: None,
        })
        .expect("append artifact_ref");

    let provenance = ProvenanceService::new(store.clone(), Arc::new(FixedClock::new(0)));
    let graph = provenance
        .graph(run_id, ProvenanceLimits::default(), true)
        .expect("compute graph");

    assert!(graph.nodes.iter().any(|n| n.id == artifact_id.to_string()));
    assert!(graph.edges.iter().any(|e| e.to == artifact_id.to_string()));

    let cached = provenance
        .graph(run_id, ProvenanceLimits::default(), true)
        .expect("cache hit");
    assert_eq!(cached.last_seq, graph.last_seq);
}
