use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rusqlite::{Connection, params};

use crate::models::{CoreError, CoreErrorKind, TurnId, TurnRecord};
use crate::persistence::{MigrationStore, PersistenceResult, TurnStore};
use crate::sqlite::migrations::{SqliteMigration, current_schema_version, migration, migrations};

const MIGRATIONS_TABLE: &str = "waypoint_schema_migrations";

pub struct SqliteStore {
    database_path: PathBuf,
}

impl SqliteStore {
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
        }
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn planned_migrations(&self, from_version: i64) -> Vec<&'static SqliteMigration> {
        migrations()
            .iter()
            .filter(|entry| entry.version > from_version)
            .collect()
    }

    pub fn migrate_to_latest(&self) -> PersistenceResult<()> {
        self.apply_migration(current_schema_version())
    }

    fn with_connection<T>(
        &self,
        operation_name: &str,
        operation: impl FnOnce(&mut Connection) -> rusqlite::Result<T>,
    ) -> PersistenceResult<T> {
        let mut connection = open_connection(&self.database_path)
            .map_err(|error| storage_error(operation_name, error))?;
        operation(&mut connection).map_err(|error| storage_error(operation_name, error))
    }
}

impl MigrationStore for SqliteStore {
    fn current_version(&self) -> PersistenceResult<i64> {
        self.with_connection("current_version", |connection| {
            ensure_migrations_table(connection)?;
            read_current_version(connection)
        })
    }

    fn apply_migration(&self, target_version: i64) -> PersistenceResult<()> {
        if target_version < 0 || target_version > current_schema_version() {
            return Err(storage_error_text(
                "apply_migration",
                format!("invalid migration target version '{target_version}'"),
            ));
        }

        self.with_connection("apply_migration", |connection| {
            ensure_migrations_table(connection)?;
            let current_version = read_current_version(connection)?;

            if target_version == current_version {
                // Recorded versions may outlive dropped tables; all DDL is IF NOT EXISTS.
                for version in 1..=target_version {
                    execute_batch_tolerant(connection, defined_migration(version)?.up_sql)?;
                }
                return Ok(());
            }

            if target_version > current_version {
                for version in (current_version + 1)..=target_version {
                    apply_up_migration(connection, defined_migration(version)?)?;
                }
            } else {
                for version in ((target_version + 1)..=current_version).rev() {
                    apply_down_migration(connection, defined_migration(version)?)?;
                }
            }

            Ok(())
        })
    }
}

impl TurnStore for SqliteStore {
    fn record_turn(&self, turn: &TurnRecord) -> PersistenceResult<()> {
        self.with_connection("record_turn", |connection| {
            ensure_schema_ready(connection)?;
            connection.execute(
                "
INSERT INTO conversation_turns (
    turn_id, query, quick_response, complete_response, quick_ms, complete_ms, created_at_unix
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
",
                params![
                    turn_id_to_i64(turn.id)?,
                    turn.query.as_str(),
                    turn.quick_response.as_str(),
                    turn.complete_response.as_str(),
                    u64_to_i64(turn.quick_ms)?,
                    u64_to_i64(turn.complete_ms)?,
                    to_unix_seconds(turn.created_at)?,
                ],
            )?;
            Ok(())
        })
    }

    fn list_recent_turns(&self, limit: usize) -> PersistenceResult<Vec<TurnRecord>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        self.with_connection("list_recent_turns", |connection| {
            ensure_schema_ready(connection)?;
            let mut statement = connection.prepare(
                "
SELECT turn_id, query, quick_response, complete_response, quick_ms, complete_ms, created_at_unix
FROM conversation_turns
ORDER BY created_at_unix DESC, turn_id DESC
LIMIT ?1
",
            )?;
            let rows = statement.query_map(params![usize_to_i64(limit)?], |row| {
                let turn_id_raw: i64 = row.get(0)?;
                let quick_ms_raw: i64 = row.get(4)?;
                let complete_ms_raw: i64 = row.get(5)?;
                let created_at_unix: i64 = row.get(6)?;

                Ok(TurnRecord {
                    id: TurnId(i64_to_u64(turn_id_raw)?),
                    query: row.get(1)?,
                    quick_response: row.get(2)?,
                    complete_response: row.get(3)?,
                    quick_ms: i64_to_u64(quick_ms_raw)?,
                    complete_ms: i64_to_u64(complete_ms_raw)?,
                    created_at: from_unix_seconds(created_at_unix)?,
                })
            })?;

            rows.collect()
        })
    }

    fn next_turn_id(&self) -> PersistenceResult<TurnId> {
        self.with_connection("next_turn_id", |connection| {
            ensure_schema_ready(connection)?;
            let max_id: Option<i64> =
                connection.query_row("SELECT MAX(turn_id) FROM conversation_turns", [], |row| {
                    row.get(0)
                })?;
            match max_id {
                Some(id) => Ok(TurnId(i64_to_u64(id)?.saturating_add(1))),
                None => Ok(TurnId(0)),
            }
        })
    }

    fn delete_all_turns(&self) -> PersistenceResult<()> {
        self.with_connection("delete_all_turns", |connection| {
            ensure_schema_ready(connection)?;
            connection.execute("DELETE FROM conversation_turns", [])?;
            Ok(())
        })
    }
}

fn open_connection(database_path: &Path) -> rusqlite::Result<Connection> {
    if let Some(parent) = database_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|error| rusqlite::Error::ToSqlConversionFailure(Box::new(error)))?;
    }
    Connection::open(database_path)
}

fn ensure_migrations_table(connection: &Connection) -> rusqlite::Result<()> {
    connection.execute_batch(&format!(
        "
CREATE TABLE IF NOT EXISTS {MIGRATIONS_TABLE} (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at_unix INTEGER NOT NULL
);
"
    ))
}

fn ensure_schema_ready(connection: &Connection) -> rusqlite::Result<()> {
    ensure_migrations_table(connection)?;
    let version = read_current_version(connection)?;
    if version <= 0 {
        return Err(storage_error_sqlite(
            "database schema is not initialized; apply migrations before recording turns",
        ));
    }
    Ok(())
}

fn read_current_version(connection: &Connection) -> rusqlite::Result<i64> {
    connection.query_row(
        &format!("SELECT COALESCE(MAX(version), 0) FROM {MIGRATIONS_TABLE}"),
        [],
        |row| row.get(0),
    )
}

fn defined_migration(version: i64) -> rusqlite::Result<&'static SqliteMigration> {
    migration(version).ok_or_else(|| {
        storage_error_sqlite(&format!("migration version '{version}' is not defined"))
    })
}

fn apply_up_migration(
    connection: &mut Connection,
    migration: &SqliteMigration,
) -> rusqlite::Result<()> {
    let transaction = connection.transaction()?;
    execute_batch_tolerant(&transaction, migration.up_sql)?;
    transaction.execute(
        &format!(
            "INSERT INTO {MIGRATIONS_TABLE} (version, name, applied_at_unix)
             VALUES (?1, ?2, strftime('%s', 'now'))"
        ),
        (migration.version, migration.name),
    )?;
    transaction.commit()?;
    Ok(())
}

/// Tolerates "duplicate column name", since `ALTER TABLE ADD COLUMN` is not idempotent.
fn execute_batch_tolerant(connection: &Connection, sql: &str) -> rusqlite::Result<()> {
    match connection.execute_batch(sql) {
        Ok(()) => Ok(()),
        Err(e) if e.to_string().contains("duplicate column name") => Ok(()),
        Err(e) => Err(e),
    }
}

fn apply_down_migration(
    connection: &mut Connection,
    migration: &SqliteMigration,
) -> rusqlite::Result<()> {
    let transaction = connection.transaction()?;
    transaction.execute_batch(migration.down_sql)?;
    transaction.execute(
        &format!("DELETE FROM {MIGRATIONS_TABLE} WHERE version = ?1"),
        [migration.version],
    )?;
    transaction.commit()?;
    Ok(())
}

fn storage_error(operation: &str, error: rusqlite::Error) -> CoreError {
    storage_error_text(operation, error.to_string())
}

fn storage_error_sqlite(message: &str) -> rusqlite::Error {
    rusqlite::Error::ToSqlConversionFailure(Box::new(std::io::Error::other(message.to_string())))
}

fn to_unix_seconds(value: SystemTime) -> rusqlite::Result<i64> {
    let duration = value.duration_since(UNIX_EPOCH).map_err(|error| {
        storage_error_sqlite(&format!("time before unix epoch is not supported: {error}"))
    })?;
    i64::try_from(duration.as_secs())
        .map_err(|_| storage_error_sqlite("unix timestamp seconds exceed i64 range"))
}

fn from_unix_seconds(value: i64) -> rusqlite::Result<SystemTime> {
    let seconds = u64::try_from(value)
        .map_err(|_| storage_error_sqlite("negative unix timestamps are not supported"))?;
    Ok(UNIX_EPOCH + Duration::from_secs(seconds))
}

fn turn_id_to_i64(value: TurnId) -> rusqlite::Result<i64> {
    i64::try_from(value.0).map_err(|_| storage_error_sqlite("turn id exceeds i64 range"))
}

fn u64_to_i64(value: u64) -> rusqlite::Result<i64> {
    i64::try_from(value).map_err(|_| storage_error_sqlite("value exceeds i64 range"))
}

fn i64_to_u64(value: i64) -> rusqlite::Result<u64> {
    u64::try_from(value).map_err(|_| storage_error_sqlite("negative value in sqlite record"))
}

fn usize_to_i64(value: usize) -> rusqlite::Result<i64> {
    i64::try_from(value).map_err(|_| storage_error_sqlite("value exceeds i64 range"))
}

fn storage_error_text(operation: &str, message: impl AsRef<str>) -> CoreError {
    CoreError::new(
        CoreErrorKind::StorageFailure,
        format!("sqlite store '{operation}' failed: {}", message.as_ref()),
    )
}
