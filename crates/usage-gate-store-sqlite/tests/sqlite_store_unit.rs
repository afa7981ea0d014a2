// crates/usage-gate-store-sqlite/tests/sqlite_store_unit.rs
// ============================================================================
// Module: SQLite Store Unit Tests
// Description: Durability, counting, and merge semantics of the SQLite ports.
// Purpose: Validate path safety, schema versioning, window and distinct
//          counting, first-write-wins upserts, and concurrency safety.
// ============================================================================

//! ## Overview
//! Unit-level tests for the `SQLite` store:
//! - Path safety checks (directory and overlong-component rejection)
//! - Schema version validation across reopen
//! - Plan and subscription snapshot round trips
//! - Usage counting with half-open windows and distinct dimensions
//! - First-write-wins enforcement-state upserts
//! - Concurrency safety (multi-threaded writes through one handle)

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::collections::BTreeMap;
use std::thread;

use rusqlite::Connection;
use usage_gate_core::BillingInterval;
use usage_gate_core::EffectivePolicy;
use usage_gate_core::EnforcementEvaluation;
use usage_gate_core::EnforcementState;
use usage_gate_core::EnforcementStateStore;
use usage_gate_core::MeterKey;
use usage_gate_core::PeriodWindow;
use usage_gate_core::Plan;
use usage_gate_core::PlanId;
use usage_gate_core::PlanLimits;
use usage_gate_core::PlanStore;
use usage_gate_core::QuotaOverride;
use usage_gate_core::Subscription;
use usage_gate_core::SubscriptionId;
use usage_gate_core::SubscriptionStatus;
use usage_gate_core::SubscriptionStore;
use usage_gate_core::TenantId;
use usage_gate_core::Timestamp;
use usage_gate_core::UsageStore;
use usage_gate_store_sqlite::SqliteStoreConfig;
use usage_gate_store_sqlite::SqliteStoreError;
use usage_gate_store_sqlite::SqliteStores;

/// Billing period start used across fixtures.
const PERIOD_START: i64 = 1_700_000_000_000;
/// Billing period end used across fixtures (30 days later).
const PERIOD_END: i64 = PERIOD_START + 30 * 24 * 60 * 60 * 1_000;
/// A timestamp inside the billing period.
const IN_PERIOD: i64 = PERIOD_START + 1_000_000;

/// Opens a store on a fresh temporary database.
fn temp_store() -> (tempfile::TempDir, SqliteStores) {
    let dir = tempfile::tempdir().unwrap();
    let config = SqliteStoreConfig::new(dir.path().join("usage-gate.db"));
    let store = SqliteStores::open(&config).unwrap();
    (dir, store)
}

/// Plan fixture with a handful of limits.
fn plan() -> Plan {
    Plan {
        id: PlanId::new("plan-free"),
        name: "free".to_string(),
        display_name: "Free".to_string(),
        price_cents: 0,
        currency: "USD".to_string(),
        interval: BillingInterval::Month,
        retention_days: Some(30),
        limits: PlanLimits {
            max_api_requests: Some(1_000),
            max_logs: Some(10_000),
            ..PlanLimits::default()
        },
        enforcement: None,
    }
}

/// Subscription fixture with one quota override.
fn subscription(tenant_id: &TenantId) -> Subscription {
    let mut quota_overrides = BTreeMap::new();
    quota_overrides.insert(MeterKey::Logs, QuotaOverride::Unlimited);
    Subscription {
        id: SubscriptionId::new("sub-1"),
        tenant_id: tenant_id.clone(),
        plan_id: PlanId::new("plan-free"),
        status: SubscriptionStatus::Active,
        enabled: true,
        current_period_start: Timestamp::from_unix_millis(PERIOD_START),
        current_period_end: Timestamp::from_unix_millis(PERIOD_END),
        quota_overrides,
    }
}

/// Builds an evaluation fixture for a state at a timestamp.
fn evaluation(state: EnforcementState, at: i64) -> EnforcementEvaluation {
    let evaluated_at = Timestamp::from_unix_millis(at);
    EnforcementEvaluation {
        state,
        triggered_meters: Vec::new(),
        effective_policy: EffectivePolicy::full_fidelity(30),
        grace_ends_at: (state == EnforcementState::Grace).then(|| evaluated_at.add_hours(48)),
        evaluated_at,
        next_evaluation_at: evaluated_at.add_minutes(5),
    }
}

#[test]
fn directory_paths_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = SqliteStoreConfig::new(dir.path());

    let result = SqliteStores::open(&config);

    assert!(matches!(result, Err(SqliteStoreError::Invalid(_))));
}

#[test]
fn overlong_path_components_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = SqliteStoreConfig::new(dir.path().join("a".repeat(300)));

    let result = SqliteStores::open(&config);

    assert!(matches!(result, Err(SqliteStoreError::Invalid(_))));
}

#[test]
fn schema_version_mismatch_fails_closed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("usage-gate.db");
    let config = SqliteStoreConfig::new(path.clone());
    {
        let _store = SqliteStores::open(&config).unwrap();
    }
    let connection = Connection::open(&path).unwrap();
    connection.execute("UPDATE store_meta SET version = 99", []).unwrap();
    drop(connection);

    let result = SqliteStores::open(&config);

    assert!(matches!(result, Err(SqliteStoreError::VersionMismatch(_))));
}

#[test]
fn plan_and_subscription_snapshots_round_trip() {
    let (_dir, store) = temp_store();
    let tenant = TenantId::new("tenant-a");
    let plan = plan();
    let sub = subscription(&tenant);

    store.put_plan(&plan).unwrap();
    store.put_subscription(&sub).unwrap();

    assert_eq!(store.plan(&plan.id).unwrap(), Some(plan.clone()));
    assert_eq!(store.subscription_for_tenant(&tenant).unwrap(), Some(sub));
    assert_eq!(store.plan(&PlanId::new("plan-ghost")).unwrap(), None);
    assert_eq!(store.subscription_for_tenant(&TenantId::new("ghost")).unwrap(), None);
}

#[test]
fn snapshots_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = SqliteStoreConfig::new(dir.path().join("usage-gate.db"));
    let plan = plan();
    {
        let store = SqliteStores::open(&config).unwrap();
        store.put_plan(&plan).unwrap();
    }

    let store = SqliteStores::open(&config).unwrap();
    assert_eq!(store.plan(&plan.id).unwrap(), Some(plan));
}

#[test]
fn counts_respect_the_half_open_window() {
    let (_dir, store) = temp_store();
    let tenant = TenantId::new("tenant-a");
    let window = PeriodWindow::new(
        Timestamp::from_unix_millis(PERIOD_START),
        Timestamp::from_unix_millis(PERIOD_END),
    );

    store
        .record_usage(&tenant, MeterKey::Logs, Timestamp::from_unix_millis(PERIOD_START), None)
        .unwrap();
    store
        .record_usage(&tenant, MeterKey::Logs, Timestamp::from_unix_millis(IN_PERIOD), None)
        .unwrap();
    // Exactly at the exclusive end: outside.
    store
        .record_usage(&tenant, MeterKey::Logs, Timestamp::from_unix_millis(PERIOD_END), None)
        .unwrap();
    // Different meter and tenant: never counted.
    store
        .record_usage(&tenant, MeterKey::Crashes, Timestamp::from_unix_millis(IN_PERIOD), None)
        .unwrap();
    store
        .record_usage(
            &TenantId::new("tenant-b"),
            MeterKey::Logs,
            Timestamp::from_unix_millis(IN_PERIOD),
            None,
        )
        .unwrap();

    assert_eq!(store.count(&tenant, MeterKey::Logs, Some(&window)).unwrap(), 2);
    assert_eq!(store.count(&tenant, MeterKey::Logs, None).unwrap(), 3);
}

#[test]
fn distinct_meters_count_dimension_values() {
    let (_dir, store) = temp_store();
    let tenant = TenantId::new("tenant-a");
    let at = Timestamp::from_unix_millis(IN_PERIOD);

    store.record_usage(&tenant, MeterKey::ApiEndpoints, at, Some("/v1/users")).unwrap();
    store.record_usage(&tenant, MeterKey::ApiEndpoints, at, Some("/v1/users")).unwrap();
    store.record_usage(&tenant, MeterKey::ApiEndpoints, at, Some("/v1/orders")).unwrap();
    // Keyless events each count once.
    store.record_usage(&tenant, MeterKey::ApiEndpoints, at, None).unwrap();
    store.record_usage(&tenant, MeterKey::ApiEndpoints, at, None).unwrap();

    assert_eq!(store.count(&tenant, MeterKey::ApiEndpoints, None).unwrap(), 4);
}

#[test]
fn upsert_creates_then_merges_with_first_write_wins() {
    let (_dir, store) = temp_store();
    let tenant = TenantId::new("tenant-a");

    let first = store.upsert(&tenant, &evaluation(EnforcementState::Grace, IN_PERIOD)).unwrap();
    assert_eq!(first.state, EnforcementState::Grace);
    let original_entered = first.grace_entered_at.unwrap();
    let original_ends = first.grace_ends_at.unwrap();

    // A later grace evaluation with a fresher deadline never moves the
    // original entry timestamp or deadline.
    let second = store
        .upsert(&tenant, &evaluation(EnforcementState::Grace, IN_PERIOD + 3_600_000))
        .unwrap();
    assert_eq!(second.grace_entered_at, Some(original_entered));
    assert_eq!(second.grace_ends_at, Some(original_ends));

    // Leaving grace clears the deadline but keeps the entry timestamp.
    let third = store
        .upsert(&tenant, &evaluation(EnforcementState::Active, IN_PERIOD + 7_200_000))
        .unwrap();
    assert_eq!(third.state, EnforcementState::Active);
    assert_eq!(third.grace_ends_at, None);
    assert_eq!(third.grace_entered_at, Some(original_entered));

    let loaded = store.load(&tenant).unwrap().unwrap();
    assert_eq!(loaded, third);
}

#[test]
fn missing_record_loads_as_none() {
    let (_dir, store) = temp_store();

    assert_eq!(store.load(&TenantId::new("ghost")).unwrap(), None);
}

#[test]
fn concurrent_writes_through_one_handle_stay_consistent() {
    let (_dir, store) = temp_store();
    let tenant = TenantId::new("tenant-a");

    let mut handles = Vec::new();
    for worker in 0..8i64 {
        let store = store.clone();
        let tenant = tenant.clone();
        handles.push(thread::spawn(move || {
            for step in 0..10i64 {
                let at = IN_PERIOD + worker * 1_000 + step;
                store.record_usage(&tenant, MeterKey::Logs, Timestamp::from_unix_millis(at), None)
                    .unwrap();
                store.upsert(&tenant, &evaluation(EnforcementState::Grace, at)).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.count(&tenant, MeterKey::Logs, None).unwrap(), 80);
    let record = store.load(&tenant).unwrap().unwrap();
    assert_eq!(record.state, EnforcementState::Grace);
    // Whichever writer landed first fixed the timestamps; both must agree
    // with the 48-hour window shape.
    let entered = record.grace_entered_at.unwrap();
    assert_eq!(record.grace_ends_at, Some(entered.add_hours(48)));
}
