// crates/socratic-bench-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Index Store
// Description: Durable IndexStore backed by SQLite WAL.
// Purpose: Persist composite-key records with conditional-write semantics.
// Dependencies: socratic-bench-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! This module implements a durable [`IndexStore`] using `SQLite`. One table
//! holds every record keyed by (partition key, sort key); the revision
//! column backs versioned conditional writes and conditional creates, which
//! make duplicate deliveries and concurrent workers safe. Secondary columns
//! carry the model and manifest identifiers of run metadata records so the
//! run-listing queries stay indexed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::sync::Mutex;

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Deserialize;
use socratic_bench_core::CasOutcome;
use socratic_bench_core::CreateOutcome;
use socratic_bench_core::IndexError;
use socratic_bench_core::IndexKey;
use socratic_bench_core::IndexRecord;
use socratic_bench_core::IndexStore;
use socratic_bench_core::Timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;

/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

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
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` index store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

/// Returns the default busy timeout.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

impl SqliteStoreConfig {
    /// Creates a configuration with defaults for the given database path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Durable [`IndexStore`] backed by `SQLite`.
///
/// # Invariants
/// - All access serializes through one connection guarded by a mutex; the
///   busy timeout covers cross-process contention.
pub struct SqliteIndexStore {
    /// Shared connection.
    conn: Mutex<Connection>,
}

impl SqliteIndexStore {
    /// Opens (and migrates) a store at the configured path.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] when the database cannot be opened or migrated.
    pub fn open(config: &SqliteStoreConfig) -> Result<Self, IndexError> {
        let conn = Connection::open(&config.path)
            .map_err(|err| IndexError::Io(format!("open {}: {err}", config.path.display())))?;
        Self::initialize(conn, config)
    }

    /// Opens an in-memory store (tests and ephemeral hosts).
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] when the database cannot be opened.
    pub fn open_in_memory() -> Result<Self, IndexError> {
        let conn = Connection::open_in_memory()
            .map_err(|err| IndexError::Io(format!("open in-memory: {err}")))?;
        let config = SqliteStoreConfig::new(":memory:");
        Self::initialize(conn, &config)
    }

    /// Applies pragmas and the schema.
    fn initialize(conn: Connection, config: &SqliteStoreConfig) -> Result<Self, IndexError> {
        let timeout = i64::try_from(config.busy_timeout_ms).unwrap_or(i64::MAX);
        conn.pragma_update(None, "busy_timeout", timeout)
            .map_err(|err| IndexError::Io(format!("busy_timeout pragma: {err}")))?;
        conn.pragma_update(None, "journal_mode", config.journal_mode.pragma_value())
            .map_err(|err| IndexError::Io(format!("journal_mode pragma: {err}")))?;
        conn.pragma_update(None, "synchronous", config.sync_mode.pragma_value())
            .map_err(|err| IndexError::Io(format!("synchronous pragma: {err}")))?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS index_records (
                partition_key TEXT NOT NULL,
                sort_key TEXT NOT NULL,
                payload TEXT NOT NULL,
                blob_pointer TEXT,
                model_id TEXT,
                manifest_id TEXT,
                revision INTEGER NOT NULL,
                written_at INTEGER NOT NULL,
                PRIMARY KEY (partition_key, sort_key)
            );
            CREATE INDEX IF NOT EXISTS idx_index_records_model
                ON index_records (model_id, partition_key);
            CREATE INDEX IF NOT EXISTS idx_index_records_manifest
                ON index_records (manifest_id, partition_key);
            CREATE INDEX IF NOT EXISTS idx_index_records_sort
                ON index_records (sort_key, partition_key);",
        )
        .map_err(|err| IndexError::Io(format!("schema: {err}")))?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)
            .map_err(|err| IndexError::Io(format!("user_version pragma: {err}")))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Runs an operation against the shared connection.
    fn with_conn<T>(
        &self,
        operation: impl FnOnce(&Connection) -> Result<T, IndexError>,
    ) -> Result<T, IndexError> {
        let guard = self
            .conn
            .lock()
            .map_err(|_poisoned| IndexError::Store("connection mutex poisoned".to_string()))?;
        operation(&guard)
    }
}

// ============================================================================
// SECTION: Row Mapping
// ============================================================================

/// Raw row shape fetched before JSON decoding.
struct RawRow {
    /// Partition key.
    partition_key: String,
    /// Sort key.
    sort_key: String,
    /// JSON payload text.
    payload: String,
    /// Optional blob pointer.
    blob_pointer: Option<String>,
    /// Optional secondary model identifier.
    model_id: Option<String>,
    /// Optional secondary manifest identifier.
    manifest_id: Option<String>,
    /// Record revision.
    revision: i64,
    /// Write timestamp (unix millis).
    written_at: i64,
}

/// Column list shared by every select.
const RECORD_COLUMNS: &str = "partition_key, sort_key, payload, blob_pointer, model_id, \
                              manifest_id, revision, written_at";

/// Maps a rusqlite row into the raw shape.
fn read_raw_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        partition_key: row.get(0)?,
        sort_key: row.get(1)?,
        payload: row.get(2)?,
        blob_pointer: row.get(3)?,
        model_id: row.get(4)?,
        manifest_id: row.get(5)?,
        revision: row.get(6)?,
        written_at: row.get(7)?,
    })
}

/// Decodes a raw row into an index record.
fn decode_raw_row(raw: RawRow) -> Result<IndexRecord, IndexError> {
    let payload = serde_json::from_str(&raw.payload).map_err(|err| {
        IndexError::Corrupt(format!(
            "payload for ({}, {}): {err}",
            raw.partition_key, raw.sort_key
        ))
    })?;
    let revision = u64::try_from(raw.revision).map_err(|_err| {
        IndexError::Corrupt(format!(
            "negative revision for ({}, {})",
            raw.partition_key, raw.sort_key
        ))
    })?;
    Ok(IndexRecord {
        key: IndexKey::new(raw.partition_key, raw.sort_key),
        payload,
        blob_pointer: raw.blob_pointer,
        model_id: raw.model_id,
        manifest_id: raw.manifest_id,
        revision,
        written_at: Timestamp::from_unix_millis(raw.written_at),
    })
}

/// Serializes a record payload to JSON text.
fn payload_text(record: &IndexRecord) -> Result<String, IndexError> {
    serde_json::to_string(&record.payload)
        .map_err(|err| IndexError::Invalid(format!("payload encode: {err}")))
}

/// Runs a select returning many records.
fn select_records(
    conn: &Connection,
    sql: &str,
    bind: &[&dyn rusqlite::ToSql],
) -> Result<Vec<IndexRecord>, IndexError> {
    let mut statement =
        conn.prepare(sql).map_err(|err| IndexError::Store(format!("prepare: {err}")))?;
    let rows = statement
        .query_map(bind, read_raw_row)
        .map_err(|err| IndexError::Store(format!("query: {err}")))?;
    let mut records = Vec::new();
    for row in rows {
        let raw = row.map_err(|err| IndexError::Store(format!("row: {err}")))?;
        records.push(decode_raw_row(raw)?);
    }
    Ok(records)
}

// ============================================================================
// SECTION: IndexStore Implementation
// ============================================================================

impl IndexStore for SqliteIndexStore {
    fn get(&self, key: &IndexKey) -> Result<Option<IndexRecord>, IndexError> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {RECORD_COLUMNS} FROM index_records \
                 WHERE partition_key = ?1 AND sort_key = ?2"
            );
            let raw = conn
                .query_row(&sql, params![key.partition_key, key.sort_key], read_raw_row)
                .optional()
                .map_err(|err| IndexError::Store(format!("get: {err}")))?;
            raw.map(decode_raw_row).transpose()
        })
    }

    fn put(&self, record: &IndexRecord) -> Result<(), IndexError> {
        let payload = payload_text(record)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO index_records (partition_key, sort_key, payload, blob_pointer, \
                 model_id, manifest_id, revision, written_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7) \
                 ON CONFLICT (partition_key, sort_key) DO UPDATE SET \
                 payload = excluded.payload, blob_pointer = excluded.blob_pointer, \
                 model_id = excluded.model_id, manifest_id = excluded.manifest_id, \
                 revision = index_records.revision + 1, written_at = excluded.written_at",
                params![
                    record.key.partition_key,
                    record.key.sort_key,
                    payload,
                    record.blob_pointer,
                    record.model_id,
                    record.manifest_id,
                    record.written_at.as_unix_millis(),
                ],
            )
            .map_err(|err| IndexError::Store(format!("put: {err}")))?;
            Ok(())
        })
    }

    fn create(&self, record: &IndexRecord) -> Result<CreateOutcome, IndexError> {
        let payload = payload_text(record)?;
        self.with_conn(|conn| {
            let changed = conn
                .execute(
                    "INSERT OR IGNORE INTO index_records (partition_key, sort_key, payload, \
                     blob_pointer, model_id, manifest_id, revision, written_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7)",
                    params![
                        record.key.partition_key,
                        record.key.sort_key,
                        payload,
                        record.blob_pointer,
                        record.model_id,
                        record.manifest_id,
                        record.written_at.as_unix_millis(),
                    ],
                )
                .map_err(|err| IndexError::Store(format!("create: {err}")))?;
            if changed == 1 {
                Ok(CreateOutcome::Created)
            } else {
                Ok(CreateOutcome::AlreadyExists)
            }
        })
    }

    fn put_versioned(
        &self,
        record: &IndexRecord,
        expected_revision: u64,
    ) -> Result<CasOutcome, IndexError> {
        if expected_revision == 0 {
            return match self.create(record)? {
                CreateOutcome::Created => Ok(CasOutcome::Applied),
                CreateOutcome::AlreadyExists => Ok(CasOutcome::Conflict),
            };
        }
        let payload = payload_text(record)?;
        let expected = i64::try_from(expected_revision)
            .map_err(|_err| IndexError::Invalid("revision overflow".to_string()))?;
        self.with_conn(|conn| {
            let changed = conn
                .execute(
                    "UPDATE index_records SET payload = ?3, blob_pointer = ?4, model_id = ?5, \
                     manifest_id = ?6, revision = revision + 1, written_at = ?7 \
                     WHERE partition_key = ?1 AND sort_key = ?2 AND revision = ?8",
                    params![
                        record.key.partition_key,
                        record.key.sort_key,
                        payload,
                        record.blob_pointer,
                        record.model_id,
                        record.manifest_id,
                        record.written_at.as_unix_millis(),
                        expected,
                    ],
                )
                .map_err(|err| IndexError::Store(format!("put_versioned: {err}")))?;
            if changed == 1 {
                Ok(CasOutcome::Applied)
            } else {
                Ok(CasOutcome::Conflict)
            }
        })
    }

    fn query_partition(
        &self,
        partition_key: &str,
        sort_prefix: &str,
    ) -> Result<Vec<IndexRecord>, IndexError> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {RECORD_COLUMNS} FROM index_records \
                 WHERE partition_key = ?1 AND sort_key LIKE ?2 || '%' \
                 ORDER BY sort_key"
            );
            select_records(conn, &sql, &[&partition_key, &sort_prefix])
        })
    }

    fn count_partition(&self, partition_key: &str, sort_prefix: &str) -> Result<u64, IndexError> {
        self.with_conn(|conn| {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM index_records \
                     WHERE partition_key = ?1 AND sort_key LIKE ?2 || '%'",
                    params![partition_key, sort_prefix],
                    |row| row.get(0),
                )
                .map_err(|err| IndexError::Store(format!("count: {err}")))?;
            Ok(u64::try_from(count).unwrap_or(0))
        })
    }

    fn query_runs_by_model(&self, model_id: &str) -> Result<Vec<IndexRecord>, IndexError> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {RECORD_COLUMNS} FROM index_records \
                 WHERE model_id = ?1 AND sort_key = ?2 AND partition_key LIKE 'RUN#%' \
                 ORDER BY partition_key"
            );
            select_records(conn, &sql, &[&model_id, &"META"])
        })
    }

    fn query_runs_by_manifest(&self, manifest_id: &str) -> Result<Vec<IndexRecord>, IndexError> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {RECORD_COLUMNS} FROM index_records \
                 WHERE manifest_id = ?1 AND sort_key = ?2 AND partition_key LIKE 'RUN#%' \
                 ORDER BY partition_key"
            );
            select_records(conn, &sql, &[&manifest_id, &"META"])
        })
    }

    fn scan_sort_key(&self, sort_key: &str) -> Result<Vec<IndexRecord>, IndexError> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {RECORD_COLUMNS} FROM index_records \
                 WHERE sort_key = ?1 ORDER BY partition_key"
            );
            select_records(conn, &sql, &[&sort_key])
        })
    }

    fn readiness(&self) -> Result<(), IndexError> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                .map_err(|err| IndexError::Store(format!("readiness: {err}")))?;
            Ok(())
        })
    }
}
