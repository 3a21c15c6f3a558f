//! Orchestrator pipeline tests over in-memory fakes.
//!
//! These pin the accounting and cleanup contracts: exactly one usage
//! mutation per successful generation and zero per failure, delete count
//! equal to upload count on every exit path, fail-open gate reads, and the
//! deliberate under-charge semantics of multi-credit deduction.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use async_trait::async_trait;

use pixshop_core::intent::{GenerationIntent, GenerationKind, GenerationResult, SourceImage};
use pixshop_core::provider::{ProviderId, ProviderProfile};
use pixshop_core::usage::{DenyReason, GateDecision};
use pixshop_db::models::usage_log::CreateUsageLog;
use pixshop_pipeline::gate::UsageGate;
use pixshop_pipeline::ledger::CreditLedger;
use pixshop_pipeline::store::{UsageStore, UsageStoreError};
use pixshop_pipeline::{Caller, GenerationOutcome, Orchestrator, PipelineError};
use pixshop_providers::{GenerationBackend, ProviderError};
use pixshop_store::{AssetStore, StoreError, StoredAsset};

const QUOTA: i64 = 20;
const SIGNUP_GRANT: i64 = 30;

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

#[derive(Default)]
struct UsageState {
    anon: HashMap<(String, String), i64>,
    balances: HashMap<i64, i64>,
    logs: Vec<CreateUsageLog>,
    /// Chronological record of mutating/logging calls, for ordering asserts.
    events: Vec<&'static str>,
    deduct_attempts: u32,
    /// Fail the Nth deduction attempt (1-based) and all later ones.
    fail_deduct_from: Option<u32>,
    /// Make all reads fail, to exercise the fail-open policy.
    fail_reads: bool,
}

#[derive(Default)]
struct FakeUsageStore {
    state: Mutex<UsageState>,
}

impl FakeUsageStore {
    fn with_balance(user_id: i64, balance: i64) -> Self {
        let store = Self::default();
        store.state.lock().unwrap().balances.insert(user_id, balance);
        store
    }

    fn with_anon_count(session: &str, ip: &str, count: i64) -> Self {
        let store = Self::default();
        store
            .state
            .lock()
            .unwrap()
            .anon
            .insert((session.into(), ip.into()), count);
        store
    }

    fn balance(&self, user_id: i64) -> i64 {
        *self.state.lock().unwrap().balances.get(&user_id).unwrap()
    }

    fn anon_count(&self, session: &str, ip: &str) -> i64 {
        *self
            .state
            .lock()
            .unwrap()
            .anon
            .get(&(session.into(), ip.into()))
            .unwrap_or(&0)
    }

    fn mutation_count(&self) -> usize {
        let state = self.state.lock().unwrap();
        state
            .events
            .iter()
            .filter(|e| **e == "deduct_ok" || **e == "increment")
            .count()
    }

    fn log_count(&self) -> usize {
        self.state.lock().unwrap().logs.len()
    }

    fn events(&self) -> Vec<&'static str> {
        self.state.lock().unwrap().events.clone()
    }
}

#[async_trait]
impl UsageStore for FakeUsageStore {
    async fn credit_balance(
        &self,
        user_id: i64,
        signup_grant: i64,
    ) -> Result<i64, UsageStoreError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_reads {
            return Err(UsageStoreError("connection reset".into()));
        }
        Ok(*state.balances.entry(user_id).or_insert(signup_grant))
    }

    async fn anonymous_count(
        &self,
        session_id: &str,
        ip_address: &str,
    ) -> Result<i64, UsageStoreError> {
        let state = self.state.lock().unwrap();
        if state.fail_reads {
            return Err(UsageStoreError("connection reset".into()));
        }
        Ok(*state
            .anon
            .get(&(session_id.into(), ip_address.into()))
            .unwrap_or(&0))
    }

    async fn increment_anonymous(
        &self,
        session_id: &str,
        ip_address: &str,
    ) -> Result<i64, UsageStoreError> {
        let mut state = self.state.lock().unwrap();
        state.events.push("increment");
        let count = state
            .anon
            .entry((session_id.into(), ip_address.into()))
            .or_insert(0);
        *count += 1;
        Ok(*count)
    }

    async fn deduct_one_credit(&self, user_id: i64) -> Result<Option<i64>, UsageStoreError> {
        let mut state = self.state.lock().unwrap();
        state.deduct_attempts += 1;
        let attempt = state.deduct_attempts;
        if state.fail_deduct_from.is_some_and(|n| attempt >= n) {
            state.events.push("deduct_err");
            return Err(UsageStoreError("write timeout".into()));
        }
        let balance = state.balances.entry(user_id).or_insert(0);
        if *balance >= 1 {
            *balance -= 1;
            let remaining = *balance;
            state.events.push("deduct_ok");
            Ok(Some(remaining))
        } else {
            Ok(None)
        }
    }

    async fn append_usage_log(&self, entry: CreateUsageLog) -> Result<(), UsageStoreError> {
        let mut state = self.state.lock().unwrap();
        state.events.push("log");
        state.logs.push(entry);
        Ok(())
    }
}

#[derive(Default)]
struct AssetState {
    uploads: u32,
    deletes: u32,
    live_keys: Vec<String>,
    /// Fail the Nth upload (1-based).
    fail_upload_at: Option<u32>,
}

#[derive(Default)]
struct FakeAssetStore {
    state: Mutex<AssetState>,
}

impl FakeAssetStore {
    fn failing_upload_at(n: u32) -> Self {
        let store = Self::default();
        store.state.lock().unwrap().fail_upload_at = Some(n);
        store
    }

    fn uploads(&self) -> u32 {
        self.state.lock().unwrap().uploads
    }

    fn deletes(&self) -> u32 {
        self.state.lock().unwrap().deletes
    }

    fn live_keys(&self) -> Vec<String> {
        self.state.lock().unwrap().live_keys.clone()
    }
}

#[async_trait]
impl AssetStore for FakeAssetStore {
    async fn upload(
        &self,
        _data: Vec<u8>,
        _mime: &str,
        _owner_tag: &str,
    ) -> Result<StoredAsset, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.uploads += 1;
        if state.fail_upload_at == Some(state.uploads) {
            return Err(StoreError::Upload("bucket unavailable".into()));
        }
        let key = format!("tmp/{}.png", state.uploads);
        state.live_keys.push(key.clone());
        Ok(StoredAsset {
            url: format!("https://assets.example/{key}"),
            key,
        })
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state.deletes += 1;
        state.live_keys.retain(|k| k != key);
        Ok(())
    }
}

type BackendScript = Box<dyn Fn() -> Result<GenerationResult, ProviderError> + Send + Sync>;

struct FakeBackend {
    script: BackendScript,
    calls: AtomicU32,
}

impl FakeBackend {
    fn succeeding() -> Self {
        Self::new(Box::new(|| {
            Ok(GenerationResult::Inline {
                data: vec![0xAB; 64],
                mime: "image/png".into(),
            })
        }))
    }

    fn new(script: BackendScript) -> Self {
        Self {
            script,
            calls: AtomicU32::new(0),
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationBackend for FakeBackend {
    fn id(&self) -> ProviderId {
        ProviderId::Nano
    }

    async fn generate(
        &self,
        _intent: &GenerationIntent,
    ) -> Result<GenerationResult, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.script)()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn profile(cost: i64) -> ProviderProfile {
    let mut profile = ProviderProfile::defaults_for(ProviderId::Nano);
    profile.credit_cost = cost;
    profile
}

fn orchestrator(
    profile: ProviderProfile,
    backend: Arc<FakeBackend>,
    assets: Arc<FakeAssetStore>,
    usage: Arc<FakeUsageStore>,
) -> Orchestrator {
    Orchestrator::new(
        profile,
        backend,
        assets,
        usage,
        UsageGate::new(QUOTA, SIGNUP_GRANT),
        CreditLedger::new(QUOTA),
    )
}

fn intent(n_images: usize) -> GenerationIntent {
    let sources = (0..n_images)
        .map(|_| SourceImage::Bytes {
            data: vec![0u8; 32],
            mime: "image/png".into(),
        })
        .collect::<Vec<_>>();
    let kind = if n_images > 1 {
        GenerationKind::Combine
    } else {
        GenerationKind::Edit
    };
    GenerationIntent::new(kind, sources, "brighten the foreground").unwrap()
}

fn anon(session: &str) -> Caller {
    Caller::Anonymous {
        session_id: Some(session.into()),
        ip_address: "203.0.113.9".into(),
    }
}

fn user(id: i64) -> Caller {
    Caller::User { user_id: id }
}

fn assert_success(outcome: &GenerationOutcome) {
    assert_eq!(outcome.mime, "image/png");
    assert!(!outcome.data.is_empty());
}

// ---------------------------------------------------------------------------
// Accounting: exactly-once per success, zero on failure
// ---------------------------------------------------------------------------

#[tokio::test]
async fn anonymous_happy_path_counts_to_quota_then_denies() {
    let usage = Arc::new(FakeUsageStore::with_anon_count("sess-1", "203.0.113.9", 19));
    let assets = Arc::new(FakeAssetStore::default());
    let backend = Arc::new(FakeBackend::succeeding());
    let orch = orchestrator(profile(1), backend, assets, usage.clone());

    let outcome = orch.run(anon("sess-1"), intent(1)).await.unwrap();
    assert_success(&outcome);
    assert_eq!(outcome.remaining, Some(0));
    assert_eq!(outcome.credits_charged, 0);
    assert_eq!(usage.anon_count("sess-1", "203.0.113.9"), 20);

    // The very next request from the same session is over quota.
    let err = orch.run(anon("sess-1"), intent(1)).await.unwrap_err();
    assert_matches!(
        err,
        PipelineError::Denied(DenyReason::QuotaExceeded { limit: 20, used: 20 })
    );
    // Still exactly one mutation from the successful run.
    assert_eq!(usage.mutation_count(), 1);
}

#[tokio::test]
async fn authenticated_unit_cost_drains_to_zero_then_denies() {
    let usage = Arc::new(FakeUsageStore::with_balance(42, 1));
    let assets = Arc::new(FakeAssetStore::default());
    let backend = Arc::new(FakeBackend::succeeding());
    let orch = orchestrator(profile(1), backend, assets, usage.clone());

    let outcome = orch.run(user(42), intent(1)).await.unwrap();
    assert_success(&outcome);
    assert_eq!(outcome.remaining, Some(0));
    assert_eq!(outcome.credits_charged, 1);
    assert_eq!(usage.balance(42), 0);

    let err = orch.run(user(42), intent(1)).await.unwrap_err();
    assert_matches!(
        err,
        PipelineError::Denied(DenyReason::InsufficientCredits {
            balance: 0,
            required: 1
        })
    );
}

#[tokio::test]
async fn two_credit_cost_deducts_twice() {
    let usage = Arc::new(FakeUsageStore::with_balance(7, 5));
    let assets = Arc::new(FakeAssetStore::default());
    let backend = Arc::new(FakeBackend::succeeding());
    let orch = orchestrator(profile(2), backend, assets, usage.clone());

    let outcome = orch.run(user(7), intent(1)).await.unwrap();
    assert_eq!(outcome.credits_charged, 2);
    assert_eq!(outcome.remaining, Some(3));
    assert_eq!(usage.balance(7), 3);
    assert_eq!(usage.mutation_count(), 2);
}

#[tokio::test]
async fn balance_one_denied_for_two_credit_provider() {
    let usage = Arc::new(FakeUsageStore::with_balance(7, 1));
    let assets = Arc::new(FakeAssetStore::default());
    let backend = Arc::new(FakeBackend::succeeding());
    let orch = orchestrator(profile(2), backend.clone(), assets, usage);

    let err = orch.run(user(7), intent(1)).await.unwrap_err();
    assert_matches!(
        err,
        PipelineError::Denied(DenyReason::InsufficientCredits {
            balance: 1,
            required: 2
        })
    );
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn partial_deduction_under_charges_never_over_charges() {
    // Balance 2, cost 2: the first single-credit deduction succeeds, the
    // second fails. The user keeps the image and ends at balance 1 --
    // under-charged, not over-charged. This exact outcome is the contract.
    let usage = Arc::new(FakeUsageStore::with_balance(9, 2));
    usage.state.lock().unwrap().fail_deduct_from = Some(2);
    let assets = Arc::new(FakeAssetStore::default());
    let backend = Arc::new(FakeBackend::succeeding());
    let orch = orchestrator(profile(2), backend, assets, usage.clone());

    let outcome = orch.run(user(9), intent(1)).await.unwrap();
    assert_success(&outcome);
    assert_eq!(outcome.credits_charged, 1);
    assert_eq!(outcome.remaining, Some(1));
    assert_eq!(usage.balance(9), 1);
}

#[tokio::test]
async fn usage_log_precedes_deduction_and_only_on_success() {
    let usage = Arc::new(FakeUsageStore::with_balance(5, 10));
    let assets = Arc::new(FakeAssetStore::default());
    let backend = Arc::new(FakeBackend::succeeding());
    let orch = orchestrator(profile(2), backend, assets, usage.clone());

    orch.run(user(5), intent(1)).await.unwrap();

    assert_eq!(usage.log_count(), 1);
    let events = usage.events();
    assert_eq!(events, vec!["log", "deduct_ok", "deduct_ok"]);

    let logged = &usage.state.lock().unwrap().logs[0];
    assert_eq!(logged.provider, "nano");
    assert_eq!(logged.kind, "edit");
    assert_eq!(logged.outcome, "success");
    assert_eq!(logged.credits_charged, 2);
}

#[tokio::test]
async fn ledger_write_failure_still_returns_the_image() {
    // Deduction fails outright; the caller already has the image, so the
    // request succeeds with the remainder unknown and nothing charged.
    let usage = Arc::new(FakeUsageStore::with_balance(3, 4));
    usage.state.lock().unwrap().fail_deduct_from = Some(1);
    let assets = Arc::new(FakeAssetStore::default());
    let backend = Arc::new(FakeBackend::succeeding());
    let orch = orchestrator(profile(1), backend, assets, usage.clone());

    let outcome = orch.run(user(3), intent(1)).await.unwrap();
    assert_success(&outcome);
    assert_eq!(outcome.credits_charged, 0);
    assert_eq!(outcome.remaining, None);
    assert_eq!(usage.balance(3), 4);
}

// ---------------------------------------------------------------------------
// Failure paths: zero mutations, full cleanup
// ---------------------------------------------------------------------------

#[tokio::test]
async fn timeout_is_distinct_mutates_nothing_and_cleans_up() {
    let usage = Arc::new(FakeUsageStore::with_balance(11, 10));
    let assets = Arc::new(FakeAssetStore::default());
    let backend = Arc::new(FakeBackend::new(Box::new(|| {
        Err(ProviderError::Timeout { attempts: 60 })
    })));
    let orch = orchestrator(profile(1), backend, assets.clone(), usage.clone());

    let err = orch.run(user(11), intent(1)).await.unwrap_err();
    assert_matches!(err, PipelineError::Timeout { attempts: 60 });

    assert_eq!(usage.mutation_count(), 0);
    assert_eq!(usage.log_count(), 0);
    assert_eq!(usage.balance(11), 10);
    assert_eq!(assets.uploads(), 1);
    assert_eq!(assets.deletes(), 1);
    assert!(assets.live_keys().is_empty());
}

#[tokio::test]
async fn provider_reported_failure_mutates_nothing_and_cleans_up() {
    let usage = Arc::new(FakeUsageStore::with_anon_count("sess-2", "203.0.113.9", 3));
    let assets = Arc::new(FakeAssetStore::default());
    let backend = Arc::new(FakeBackend::new(Box::new(|| {
        Err(ProviderError::TaskFailed {
            code: Some("400".into()),
            message: "prompt rejected".into(),
        })
    })));
    let orch = orchestrator(profile(1), backend, assets.clone(), usage.clone());

    let err = orch.run(anon("sess-2"), intent(1)).await.unwrap_err();
    assert_matches!(err, PipelineError::Provider(_));

    assert_eq!(usage.anon_count("sess-2", "203.0.113.9"), 3);
    assert_eq!(usage.mutation_count(), 0);
    assert_eq!(assets.uploads(), assets.deletes());
}

#[tokio::test]
async fn conversion_failure_mutates_nothing_and_cleans_up() {
    // The backend hands back a URL nothing is listening on; the fetch
    // fails, which is a conversion error -- the image exists upstream but
    // cannot be delivered.
    let usage = Arc::new(FakeUsageStore::with_balance(13, 10));
    let assets = Arc::new(FakeAssetStore::default());
    let backend = Arc::new(FakeBackend::new(Box::new(|| {
        Ok(GenerationResult::Remote {
            url: "http://127.0.0.1:1/out.png".into(),
        })
    })));
    let orch = orchestrator(profile(1), backend, assets.clone(), usage.clone());

    let err = orch.run(user(13), intent(1)).await.unwrap_err();
    assert_matches!(err, PipelineError::Conversion(_));

    assert_eq!(usage.mutation_count(), 0);
    assert_eq!(usage.balance(13), 10);
    assert_eq!(assets.uploads(), assets.deletes());
}

#[tokio::test]
async fn upload_failure_aborts_before_provider_and_reclaims_siblings() {
    // Three-image combine; the second upload fails. The batch fails, the
    // provider is never called, and the uploads that did complete are
    // deleted.
    let usage = Arc::new(FakeUsageStore::with_balance(17, 10));
    let assets = Arc::new(FakeAssetStore::failing_upload_at(2));
    let backend = Arc::new(FakeBackend::succeeding());
    let orch = orchestrator(profile(1), backend.clone(), assets.clone(), usage.clone());

    let err = orch.run(user(17), intent(3)).await.unwrap_err();
    assert_matches!(err, PipelineError::Upload(_));

    assert_eq!(backend.calls(), 0);
    assert_eq!(usage.mutation_count(), 0);
    // Two of three uploads completed; both were deleted.
    assert_eq!(assets.deletes(), 2);
    assert!(assets.live_keys().is_empty());
}

#[tokio::test]
async fn combine_success_deletes_every_upload() {
    let usage = Arc::new(FakeUsageStore::with_balance(21, 10));
    let assets = Arc::new(FakeAssetStore::default());
    let backend = Arc::new(FakeBackend::succeeding());
    let orch = orchestrator(profile(1), backend, assets.clone(), usage);

    orch.run(user(21), intent(4)).await.unwrap();

    assert_eq!(assets.uploads(), 4);
    assert_eq!(assets.deletes(), 4);
    assert!(assets.live_keys().is_empty());
}

#[tokio::test]
async fn combine_over_provider_ceiling_is_a_build_error() {
    let usage = Arc::new(FakeUsageStore::with_balance(23, 10));
    let assets = Arc::new(FakeAssetStore::default());
    let backend = Arc::new(FakeBackend::succeeding());
    // Nano's ceiling is five source images.
    let orch = orchestrator(profile(1), backend.clone(), assets.clone(), usage);

    let err = orch.run(user(23), intent(6)).await.unwrap_err();
    assert_matches!(err, PipelineError::BuildRequest(_));
    assert_eq!(assets.uploads(), 0);
    assert_eq!(backend.calls(), 0);
}

// ---------------------------------------------------------------------------
// Gate behaviour
// ---------------------------------------------------------------------------

#[tokio::test]
async fn denied_request_has_no_side_effects() {
    let usage = Arc::new(FakeUsageStore::with_anon_count("sess-3", "203.0.113.9", 20));
    let assets = Arc::new(FakeAssetStore::default());
    let backend = Arc::new(FakeBackend::succeeding());
    let orch = orchestrator(profile(1), backend.clone(), assets.clone(), usage.clone());

    let err = orch.run(anon("sess-3"), intent(1)).await.unwrap_err();
    assert_matches!(err, PipelineError::Denied(DenyReason::QuotaExceeded { .. }));

    assert_eq!(assets.uploads(), 0);
    assert_eq!(backend.calls(), 0);
    assert_eq!(usage.mutation_count(), 0);
    assert_eq!(usage.log_count(), 0);
}

#[tokio::test]
async fn missing_session_is_session_required_not_quota() {
    let usage = Arc::new(FakeUsageStore::default());
    let assets = Arc::new(FakeAssetStore::default());
    let backend = Arc::new(FakeBackend::succeeding());
    let orch = orchestrator(profile(1), backend, assets, usage);

    let caller = Caller::Anonymous {
        session_id: None,
        ip_address: "203.0.113.9".into(),
    };
    let err = orch.run(caller, intent(1)).await.unwrap_err();
    assert_matches!(err, PipelineError::Denied(DenyReason::SessionRequired));
}

#[tokio::test]
async fn gate_check_is_read_only_and_idempotent() {
    let usage = FakeUsageStore::with_anon_count("sess-4", "203.0.113.9", 7);
    let gate = UsageGate::new(QUOTA, SIGNUP_GRANT);
    let caller = anon("sess-4");

    let first = gate.check(&usage, &caller, 1).await;
    let second = gate.check(&usage, &caller, 1).await;

    assert_eq!(first, GateDecision::Allow { remaining: 13 });
    assert_eq!(first, second);
    assert_eq!(usage.mutation_count(), 0);
}

#[tokio::test]
async fn gate_read_errors_fail_open() {
    // Counter and balance reads both fail; the deliberate policy is to
    // treat unreadable usage as zero rather than block all traffic.
    let usage = Arc::new(FakeUsageStore::default());
    usage.state.lock().unwrap().fail_reads = true;
    let assets = Arc::new(FakeAssetStore::default());
    let backend = Arc::new(FakeBackend::succeeding());
    let orch = orchestrator(profile(1), backend, assets, usage.clone());

    let outcome = orch.run(anon("sess-5"), intent(1)).await.unwrap();
    assert_success(&outcome);

    let outcome = orch.run(user(99), intent(1)).await.unwrap();
    assert_success(&outcome);
}

// ---------------------------------------------------------------------------
// Sync providers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn inline_provider_skips_the_asset_store_entirely() {
    let usage = Arc::new(FakeUsageStore::with_balance(31, 10));
    let assets = Arc::new(FakeAssetStore::default());
    let backend = Arc::new(FakeBackend::succeeding());
    let mut profile = ProviderProfile::defaults_for(ProviderId::Gemini);
    profile.credit_cost = 1;
    let orch = orchestrator(profile, backend, assets.clone(), usage);

    let outcome = orch.run(user(31), intent(1)).await.unwrap();
    assert_success(&outcome);
    assert_eq!(assets.uploads(), 0);
    assert_eq!(assets.deletes(), 0);
}
