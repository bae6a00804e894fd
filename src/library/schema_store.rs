//! Schema creation, version detection and migration of a library database.

use super::error::{LibraryError, LibraryResult};
use crate::sqlite_persistence::{VersionedSchema, BASE_DB_VERSION};
use anyhow::anyhow;
use rusqlite::{Connection, TransactionBehavior};
use tracing::{info, warn};

fn table_count(conn: &Connection) -> LibraryResult<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        [],
        |r| r.get(0),
    )?)
}

fn has_column(conn: &Connection, table: &str, column: &str) -> LibraryResult<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2",
        [table, column],
        |r| r.get(0),
    )?;
    Ok(count > 0)
}

/// Version recorded in `user_version`, or the version inferred from the
/// layout of a database written before versioning existed.
pub fn stored_version(conn: &Connection) -> LibraryResult<usize> {
    let db_version: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    if db_version >= BASE_DB_VERSION as i64 {
        return Ok((db_version - BASE_DB_VERSION as i64) as usize);
    }
    if has_column(conn, "tracks", "cover_path")? {
        Ok(1)
    } else {
        Ok(0)
    }
}

fn is_versioned(conn: &Connection) -> LibraryResult<bool> {
    let db_version: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(db_version >= BASE_DB_VERSION as i64)
}

/// Prepares a freshly opened connection and returns its schema version.
///
/// An empty database gets the latest schema. A versioned database is
/// validated against the schema of its recorded version, a legacy one is
/// taken as is.
pub fn initialize(conn: &Connection, schemas: &[VersionedSchema]) -> LibraryResult<usize> {
    let latest = schemas
        .last()
        .ok_or_else(|| LibraryError::StoreUnavailable("no schema versions declared".into()))?;

    if table_count(conn)? == 0 {
        info!("Creating library db schema at version {}", latest.version);
        latest
            .create(conn)
            .map_err(|source| LibraryError::MigrationFailure {
                version: latest.version,
                source,
            })?;
        return Ok(latest.version);
    }

    let version = stored_version(conn)?;
    if version > latest.version {
        return Err(LibraryError::MigrationFailure {
            version,
            source: anyhow!(
                "Database version {} is too new, latest known is {}",
                version,
                latest.version
            ),
        });
    }

    if is_versioned(conn)? {
        schemas[version]
            .validate(conn)
            .map_err(|source| LibraryError::MigrationFailure { version, source })?;
    } else {
        info!("Found unversioned library db, treating it as version {}", version);
    }

    if version < latest.version {
        warn!(
            "Library db is at version {}, {} migration(s) pending",
            version,
            latest.version - version
        );
    }
    Ok(version)
}

pub fn pending_migrations(conn: &Connection, schemas: &[VersionedSchema]) -> LibraryResult<usize> {
    let version = stored_version(conn)?;
    Ok(schemas.len().saturating_sub(version + 1))
}

/// Applies every migration above the stored version, one transaction per
/// step. A failing step is rolled back and earlier steps stay committed.
pub fn apply_pending(conn: &mut Connection, schemas: &[VersionedSchema]) -> LibraryResult<usize> {
    let mut current_version = stored_version(conn)?;
    let mut applied = 0;

    for schema in schemas.iter().skip(current_version + 1) {
        let version = schema.version;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let step = || -> anyhow::Result<()> {
            if let Some(migration_fn) = schema.migration {
                migration_fn(&tx)?;
            }
            schema.validate(&tx)?;
            tx.pragma_update(None, "user_version", (BASE_DB_VERSION + version) as i64)?;
            Ok(())
        };

        if let Err(source) = step() {
            warn!(
                "Migration of library db from version {} to {} failed: {:#}",
                current_version, version, source
            );
            // Dropping the transaction rolls it back
            drop(tx);
            return Err(LibraryError::MigrationFailure { version, source });
        }
        tx.commit()?;

        info!(
            "Migrated library db from version {} to {}",
            current_version, version
        );
        current_version = version;
        applied += 1;
    }

    Ok(applied)
}
