//! SQLite implementation of `RegistryStore`.
//!
//! This provides persistent storage that survives service restarts.
//!
//! # Schema Versioning
//!
//! The database has a `schema_version` table that tracks the schema version.
//! When the schema needs to change, increment `CURRENT_SCHEMA_VERSION` and add
//! a migration in `run_migrations()`. Migrations run sequentially from the
//! current version to the target version.
//!
//! # Units of work
//!
//! Every unit of work is a `BEGIN IMMEDIATE` transaction, so the writer lock
//! is held from the first read of a recomputation until commit.

mod events;
mod registry;


use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::{ffi, params, Connection, OptionalExtension, TransactionBehavior};
use simtani_core::RegistryError;
use tracing::warn;

use super::{RegistryStore, RegistryTx};
use registry::SqliteTx;

/// Current schema version. Increment this when making schema changes and add
/// corresponding migration logic in `run_migrations()`.
const CURRENT_SCHEMA_VERSION: i64 = 2;

/// SQLite-backed registry store.
///
/// A single connection is shared behind a mutex; the service calls
/// [`RegistryStore::atomically`] from `tokio::task::spawn_blocking`.
pub struct SqliteStore {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and bring its schema up to date.
    ///
    /// # Durability
    ///
    /// The database is configured with:
    /// - `journal_mode = WAL` for better concurrency and crash safety
    /// - `synchronous = FULL` so a committed unit of work survives power loss
    /// - `busy_timeout = 5000ms` to wait out other writers
    /// - `foreign_keys = ON` so references to districts and groups stay valid
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, RegistryError> {
        let path_ref = path.as_ref();

        let path_str = path_ref.to_string_lossy();
        let is_in_memory = path_str == ":memory:";
        if !is_in_memory && !path_str.is_empty() {
            if let Some(parent) = path_ref.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        RegistryError::storage(
                            "create database directory",
                            format!("{}: {}", parent.display(), e),
                        )
                    })?;
                }
            }
        }

        let conn = Connection::open(path_ref)
            .map_err(|e| RegistryError::storage("open database", e.to_string()))?;

        #[cfg(unix)]
        if !is_in_memory && !path_str.is_empty() {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            if let Err(e) = std::fs::set_permissions(path_ref, permissions) {
                warn!(
                    "Failed to set restrictive permissions on database file: {}",
                    e
                );
            }
        }

        // SQLite silently keeps the old journal mode on filesystems without
        // shared memory support, so check what it actually chose.
        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .map_err(|e| RegistryError::storage("set journal_mode", e.to_string()))?;

        let journal_mode_ok = journal_mode.eq_ignore_ascii_case("wal")
            || (is_in_memory && journal_mode.eq_ignore_ascii_case("memory"));

        if !journal_mode_ok {
            return Err(RegistryError::storage(
                "configure journal_mode",
                format!(
                    "Failed to enable WAL mode: SQLite returned '{}' instead of 'wal'",
                    journal_mode
                ),
            ));
        }

        conn.execute_batch(
            r#"
            PRAGMA synchronous = FULL;
            PRAGMA busy_timeout = 5000;
            PRAGMA foreign_keys = ON;
            "#,
        )
        .map_err(|e| RegistryError::storage("configure pragmas", e.to_string()))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                version INTEGER NOT NULL
            );
            "#,
        )
        .map_err(|e| RegistryError::storage("create schema_version table", e.to_string()))?;

        let current_version: i64 = conn
            .query_row(
                "SELECT version FROM schema_version WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| RegistryError::storage("get schema version", e.to_string()))?
            .unwrap_or(0);

        Self::run_migrations(&conn, current_version)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run migrations from `from_version` to `CURRENT_SCHEMA_VERSION`.
    fn run_migrations(conn: &Connection, from_version: i64) -> Result<(), RegistryError> {
        if from_version > CURRENT_SCHEMA_VERSION {
            return Err(RegistryError::storage(
                "schema version",
                format!(
                    "Database schema version {} is newer than supported version {}. \
                     Please upgrade the application.",
                    from_version, CURRENT_SCHEMA_VERSION
                ),
            ));
        }

        if from_version == CURRENT_SCHEMA_VERSION {
            return Ok(());
        }

        // Version 1: registry tables.
        if from_version < 1 {
            conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS districts (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL UNIQUE,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS farmer_groups (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    leader TEXT NOT NULL,
                    district_id TEXT NOT NULL REFERENCES districts(id),
                    address TEXT,
                    contact TEXT,
                    member_count INTEGER NOT NULL DEFAULT 0 CHECK (member_count >= 0),
                    total_land_area REAL NOT NULL DEFAULT 0 CHECK (total_land_area >= 0),
                    verification_status TEXT NOT NULL DEFAULT 'PENDING'
                        CHECK (verification_status IN ('PENDING', 'DITERIMA', 'DITOLAK')),
                    verified_by TEXT,
                    verified_at TEXT,
                    note TEXT,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS farmers (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    nik TEXT NOT NULL UNIQUE,
                    address TEXT NOT NULL,
                    contact TEXT,
                    land_area REAL NOT NULL CHECK (land_area > 0),
                    crop_type TEXT NOT NULL,
                    district_id TEXT NOT NULL REFERENCES districts(id),
                    group_id TEXT REFERENCES farmer_groups(id),
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_farmers_group
                    ON farmers(group_id) WHERE group_id IS NOT NULL;

                CREATE TABLE IF NOT EXISTS commodities (
                    id TEXT PRIMARY KEY,
                    crop_type TEXT NOT NULL,
                    area_planted REAL NOT NULL CHECK (area_planted > 0),
                    estimated_yield REAL,
                    fertilizer TEXT,
                    pesticide TEXT,
                    group_id TEXT REFERENCES farmer_groups(id),
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_commodities_group
                    ON commodities(group_id) WHERE group_id IS NOT NULL;
                "#,
            )
            .map_err(|e| RegistryError::storage("migration v1", e.to_string()))?;
        }

        // Version 2: per-group audit timeline. Rows outlive their group.
        if from_version < 2 {
            conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS group_events (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    group_id TEXT NOT NULL,
                    event_type TEXT NOT NULL,
                    event_data TEXT NOT NULL,
                    recorded_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_group_events_lookup
                    ON group_events(group_id, recorded_at DESC);
                "#,
            )
            .map_err(|e| RegistryError::storage("migration v2", e.to_string()))?;
        }

        conn.execute(
            "INSERT OR REPLACE INTO schema_version (id, version) VALUES (1, ?1)",
            params![CURRENT_SCHEMA_VERSION],
        )
        .map_err(|e| RegistryError::storage("update schema version", e.to_string()))?;

        Ok(())
    }

    /// Create a new in-memory SQLite store (for testing).
    pub fn new_in_memory() -> Result<Self, RegistryError> {
        Self::new(":memory:")
    }
}

impl RegistryStore for SqliteStore {
    fn atomically(
        &self,
        work: &mut dyn FnMut(&mut dyn RegistryTx) -> Result<(), RegistryError>,
    ) -> Result<(), RegistryError> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| RegistryError::storage("lock connection", "mutex poisoned"))?;

        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| RegistryError::storage("begin transaction", e.to_string()))?;

        // Dropping `tx` on the error path rolls the transaction back.
        work(&mut SqliteTx::new(&tx))?;

        tx.commit()
            .map_err(|e| RegistryError::storage("commit transaction", e.to_string()))
    }
}

// =============================================================================
// Conversion helpers
// =============================================================================

/// Map a rusqlite error, turning uniqueness violations into `Conflict`.
pub(super) fn write_error(
    operation: &'static str,
    conflict_message: &'static str,
) -> impl Fn(rusqlite::Error) -> RegistryError {
    move |e| match &e {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            RegistryError::conflict(conflict_message)
        }
        _ => RegistryError::storage(operation, e.to_string()),
    }
}

/// Convert a usize limit to i64 for a SQLite LIMIT clause without wrapping.
pub(super) fn usize_to_i64_limit(
    limit: usize,
    operation: &'static str,
) -> Result<i64, RegistryError> {
    i64::try_from(limit).map_err(|_| {
        RegistryError::storage(
            operation,
            format!(
                "limit {} exceeds maximum storable value ({})",
                limit,
                i64::MAX
            ),
        )
    })
}

/// Convert a count or member total to the u32 the model uses.
pub(super) fn i64_to_member_count(value: i64) -> Result<u32, RegistryError> {
    u32::try_from(value).map_err(|_| RegistryError::corruption("group member_count"))
}

/// Fail when a write that targets one row touched none.
pub(super) fn expect_one_row(
    changed: usize,
    operation: &'static str,
    id: &str,
) -> Result<(), RegistryError> {
    if changed == 0 {
        return Err(RegistryError::storage(
            operation,
            format!("no row with id {}", id),
        ));
    }
    Ok(())
}
