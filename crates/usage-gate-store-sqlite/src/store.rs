// crates/usage-gate-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Usage Gate Store
// Description: Durable storage ports backed by SQLite WAL.
// Purpose: Persist plans, subscriptions, usage events, and enforcement state.
// Dependencies: usage-gate-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! This module implements all four Usage Gate storage ports over a single
//! `SQLite` database. Plans, subscriptions, and enforcement records are
//! stored as JSON snapshots; usage events are stored as one row per event so
//! counts (including distinct-dimension counts) are answered by SQL
//! aggregates over a half-open billing window.
//!
//! The enforcement-state upsert runs inside an immediate transaction so the
//! read-merge-write required by first-write-wins "entered" timestamps is
//! atomic across concurrent callers and across processes sharing the file.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;

use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::TransactionBehavior;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;
use usage_gate_core::EnforcementEvaluation;
use usage_gate_core::EnforcementRecord;
use usage_gate_core::EnforcementStateStore;
use usage_gate_core::MeterKey;
use usage_gate_core::PeriodWindow;
use usage_gate_core::Plan;
use usage_gate_core::PlanId;
use usage_gate_core::PlanStore;
use usage_gate_core::StoreError;
use usage_gate_core::Subscription;
use usage_gate_core::SubscriptionStore;
use usage_gate_core::TenantId;
use usage_gate_core::Timestamp;
use usage_gate_core::UsageStore;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
pub const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the pragma value for the journal mode.
    const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "WAL",
            Self::Delete => "DELETE",
        }
    }
}

/// `SQLite` synchronous mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full durability on every commit.
    #[default]
    Full,
    /// Reduced durability with WAL checkpointing.
    Normal,
}

impl SqliteSyncMode {
    /// Returns the pragma value for the synchronous mode.
    const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "FULL",
            Self::Normal => "NORMAL",
        }
    }
}

/// Configuration for the `SQLite` store.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the database file.
    pub path: PathBuf,
    /// Journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// Synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

/// Serde default for [`SqliteStoreConfig::busy_timeout_ms`].
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

impl SqliteStoreConfig {
    /// Creates a config for the given database path with default pragmas.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors produced by the `SQLite` store.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Store corruption detected while decoding a persisted payload.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store configuration or input.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
}

impl From<SqliteStoreError> for StoreError {
    fn from(err: SqliteStoreError) -> Self {
        match err {
            SqliteStoreError::Corrupt(message) => Self::Corrupt(message),
            other => Self::Store(other.to_string()),
        }
    }
}

/// Maps a `rusqlite` error into the store error space.
fn db_err(err: &rusqlite::Error) -> SqliteStoreError {
    SqliteStoreError::Db(err.to_string())
}

// ============================================================================
// SECTION: Store Handle
// ============================================================================

/// `SQLite`-backed implementation of all four storage ports.
///
/// # Invariants
/// - Cloning shares the underlying connection; the handle is thread-safe.
/// - The enforcement-state upsert is atomic and first-write-wins for
///   "entered" timestamps.
#[derive(Debug, Clone)]
pub struct SqliteStores {
    /// Shared connection guarded for exclusive statement execution.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteStores {
    /// Opens (creating if needed) the database and initializes the schema.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the path is invalid, the database
    /// cannot be opened, or the schema version does not match.
    pub fn open(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Locks the shared connection.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Db`] when the mutex is poisoned.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection
            .lock()
            .map_err(|_| SqliteStoreError::Db("connection mutex poisoned".to_string()))
    }

    /// Inserts or replaces a plan snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when serialization or the write fails.
    pub fn put_plan(&self, plan: &Plan) -> Result<(), SqliteStoreError> {
        let plan_json = serde_json::to_string(plan)
            .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
        let guard = self.lock()?;
        guard
            .execute(
                "INSERT INTO plans (plan_id, plan_json) VALUES (?1, ?2) ON CONFLICT(plan_id) DO \
                 UPDATE SET plan_json = excluded.plan_json",
                params![plan.id.as_str(), plan_json],
            )
            .map_err(|err| db_err(&err))?;
        Ok(())
    }

    /// Inserts or replaces a tenant's subscription snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when serialization or the write fails.
    pub fn put_subscription(&self, subscription: &Subscription) -> Result<(), SqliteStoreError> {
        let subscription_json = serde_json::to_string(subscription)
            .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
        let guard = self.lock()?;
        guard
            .execute(
                "INSERT INTO subscriptions (tenant_id, subscription_json) VALUES (?1, ?2) ON \
                 CONFLICT(tenant_id) DO UPDATE SET subscription_json = \
                 excluded.subscription_json",
                params![subscription.tenant_id.as_str(), subscription_json],
            )
            .map_err(|err| db_err(&err))?;
        Ok(())
    }

    /// Records one usage event for a tenant's meter.
    ///
    /// `distinct_key` is the dimension value for distinct-counting meters
    /// (endpoint URL, member user id); pass `None` for plain event meters.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the write fails.
    pub fn record_usage(
        &self,
        tenant_id: &TenantId,
        meter: MeterKey,
        at: Timestamp,
        distinct_key: Option<&str>,
    ) -> Result<(), SqliteStoreError> {
        let guard = self.lock()?;
        guard
            .execute(
                "INSERT INTO usage_events (tenant_id, meter, recorded_at, distinct_key) VALUES \
                 (?1, ?2, ?3, ?4)",
                params![tenant_id.as_str(), meter.as_str(), at.as_unix_millis(), distinct_key],
            )
            .map_err(|err| db_err(&err))?;
        Ok(())
    }

    /// Counts usage events for one meter, optionally bounded by a window.
    fn count_events(
        &self,
        tenant_id: &TenantId,
        meter: MeterKey,
        window: Option<&PeriodWindow>,
    ) -> Result<u64, SqliteStoreError> {
        // Distinct meters count each dimension value once; events recorded
        // without a dimension key each count once.
        let projection = if meter.counts_distinct() {
            "COUNT(DISTINCT distinct_key) + COUNT(CASE WHEN distinct_key IS NULL THEN 1 END)"
        } else {
            "COUNT(*)"
        };
        let guard = self.lock()?;
        let count: i64 = match window {
            Some(window) => guard
                .query_row(
                    &format!(
                        "SELECT {projection} FROM usage_events WHERE tenant_id = ?1 AND meter = \
                         ?2 AND recorded_at >= ?3 AND recorded_at < ?4"
                    ),
                    params![
                        tenant_id.as_str(),
                        meter.as_str(),
                        window.start.as_unix_millis(),
                        window.end.as_unix_millis()
                    ],
                    |row| row.get(0),
                )
                .map_err(|err| db_err(&err))?,
            None => guard
                .query_row(
                    &format!(
                        "SELECT {projection} FROM usage_events WHERE tenant_id = ?1 AND meter = \
                         ?2"
                    ),
                    params![tenant_id.as_str(), meter.as_str()],
                    |row| row.get(0),
                )
                .map_err(|err| db_err(&err))?,
        };
        u64::try_from(count)
            .map_err(|_| SqliteStoreError::Corrupt("negative usage count".to_string()))
    }

    /// Loads the persisted enforcement record for a tenant.
    fn load_record(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Option<EnforcementRecord>, SqliteStoreError> {
        let guard = self.lock()?;
        let record_json: Option<String> = guard
            .query_row(
                "SELECT record_json FROM enforcement_states WHERE tenant_id = ?1",
                params![tenant_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| db_err(&err))?;
        match record_json {
            Some(record_json) => {
                let record = serde_json::from_str(&record_json).map_err(|err| {
                    SqliteStoreError::Corrupt(format!(
                        "enforcement record for tenant {}: {err}",
                        tenant_id.as_str()
                    ))
                })?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Applies an evaluation to a tenant's record inside one transaction.
    ///
    /// The merge (last-write state and policy, set-if-absent "entered"
    /// timestamps) runs between the read and the write, so the whole upsert
    /// takes an immediate transaction to stay atomic across writers.
    fn upsert_record(
        &self,
        tenant_id: &TenantId,
        evaluation: &EnforcementEvaluation,
    ) -> Result<EnforcementRecord, SqliteStoreError> {
        let mut guard = self.lock()?;
        let tx = guard
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|err| db_err(&err))?;
        let existing: Option<String> = tx
            .query_row(
                "SELECT record_json FROM enforcement_states WHERE tenant_id = ?1",
                params![tenant_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| db_err(&err))?;
        let record = match existing {
            Some(record_json) => {
                let mut record: EnforcementRecord =
                    serde_json::from_str(&record_json).map_err(|err| {
                        SqliteStoreError::Corrupt(format!(
                            "enforcement record for tenant {}: {err}",
                            tenant_id.as_str()
                        ))
                    })?;
                record.apply(evaluation);
                record
            }
            None => EnforcementRecord::from_evaluation(evaluation),
        };
        let record_json = serde_json::to_string(&record)
            .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
        tx.execute(
            "INSERT INTO enforcement_states (tenant_id, record_json) VALUES (?1, ?2) ON \
             CONFLICT(tenant_id) DO UPDATE SET record_json = excluded.record_json",
            params![tenant_id.as_str(), record_json],
        )
        .map_err(|err| db_err(&err))?;
        tx.commit().map_err(|err| db_err(&err))?;
        Ok(record)
    }
}

// ============================================================================
// SECTION: Port Implementations
// ============================================================================

impl SubscriptionStore for SqliteStores {
    fn subscription_for_tenant(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Option<Subscription>, StoreError> {
        let guard = self.lock().map_err(StoreError::from)?;
        let subscription_json: Option<String> = guard
            .query_row(
                "SELECT subscription_json FROM subscriptions WHERE tenant_id = ?1",
                params![tenant_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| StoreError::from(db_err(&err)))?;
        match subscription_json {
            Some(subscription_json) => {
                let subscription =
                    serde_json::from_str(&subscription_json).map_err(|err| {
                        StoreError::Corrupt(format!(
                            "subscription for tenant {}: {err}",
                            tenant_id.as_str()
                        ))
                    })?;
                Ok(Some(subscription))
            }
            None => Ok(None),
        }
    }
}

impl PlanStore for SqliteStores {
    fn plan(&self, plan_id: &PlanId) -> Result<Option<Plan>, StoreError> {
        let guard = self.lock().map_err(StoreError::from)?;
        let plan_json: Option<String> = guard
            .query_row(
                "SELECT plan_json FROM plans WHERE plan_id = ?1",
                params![plan_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| StoreError::from(db_err(&err)))?;
        match plan_json {
            Some(plan_json) => {
                let plan = serde_json::from_str(&plan_json).map_err(|err| {
                    StoreError::Corrupt(format!("plan {}: {err}", plan_id.as_str()))
                })?;
                Ok(Some(plan))
            }
            None => Ok(None),
        }
    }
}

impl UsageStore for SqliteStores {
    fn count(
        &self,
        tenant_id: &TenantId,
        meter: MeterKey,
        window: Option<&PeriodWindow>,
    ) -> Result<u64, StoreError> {
        self.count_events(tenant_id, meter, window).map_err(StoreError::from)
    }
}

impl EnforcementStateStore for SqliteStores {
    fn load(&self, tenant_id: &TenantId) -> Result<Option<EnforcementRecord>, StoreError> {
        self.load_record(tenant_id).map_err(StoreError::from)
    }

    fn upsert(
        &self,
        tenant_id: &TenantId,
        evaluation: &EnforcementEvaluation,
    ) -> Result<EnforcementRecord, StoreError> {
        self.upsert_record(tenant_id, evaluation).map_err(StoreError::from)
    }
}

// ============================================================================
// SECTION: Connection Setup
// ============================================================================

/// Validates the database path before opening.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    if path.as_os_str().is_empty() {
        return Err(SqliteStoreError::Invalid("store path must not be empty".to_string()));
    }
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.exists() && path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Creates the parent directory for the database file when missing.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))?;
    }
    Ok(())
}

/// Opens an `SQLite` connection with secure defaults.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection =
        Connection::open_with_flags(&config.path, flags).map_err(|err| db_err(&err))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    connection.execute_batch("PRAGMA foreign_keys = ON;").map_err(|err| db_err(&err))?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| db_err(&err))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| db_err(&err))?;
    connection
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| db_err(&err))?;
    Ok(())
}

/// Initializes the `SQLite` schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(|err| db_err(&err))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| db_err(&err))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| db_err(&err))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| db_err(&err))?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS plans (
                     plan_id TEXT PRIMARY KEY,
                     plan_json TEXT NOT NULL
                 );
                 CREATE TABLE IF NOT EXISTS subscriptions (
                     tenant_id TEXT PRIMARY KEY,
                     subscription_json TEXT NOT NULL
                 );
                 CREATE TABLE IF NOT EXISTS usage_events (
                     tenant_id TEXT NOT NULL,
                     meter TEXT NOT NULL,
                     recorded_at INTEGER NOT NULL,
                     distinct_key TEXT
                 );
                 CREATE INDEX IF NOT EXISTS idx_usage_events_tenant_meter_time
                     ON usage_events (tenant_id, meter, recorded_at);
                 CREATE TABLE IF NOT EXISTS enforcement_states (
                     tenant_id TEXT PRIMARY KEY,
                     record_json TEXT NOT NULL
                 );",
            )
            .map_err(|err| db_err(&err))?;
        }
        Some(found) if found == SCHEMA_VERSION => {}
        Some(found) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "found schema version {found}, expected {SCHEMA_VERSION}"
            )));
        }
    }
    tx.commit().map_err(|err| db_err(&err))?;
    Ok(())
}
