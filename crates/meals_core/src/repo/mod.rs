//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for the catalog, the
//!   schedule ledger and the roast timing sheet.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository writes must enforce `Meal::validate()` or
//!   `Timings::validate()` before persistence.
//! - Each mutation is one SQLite transaction or one statement, so checks
//!   and writes cannot interleave with another writer.
//! - Repositories refuse connections that are not fully migrated.

pub mod meal_repo;
pub mod plan_repo;
pub mod timing_repo;

use crate::db::migrations::{current_user_version, latest_version};
use meal_repo::{RepoError, RepoResult};
use rusqlite::Connection;

/// Verifies migration version and required tables on a connection.
pub(crate) fn ensure_connection_ready(
    conn: &Connection,
    required_tables: &[&'static str],
) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = current_user_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in required_tables {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
