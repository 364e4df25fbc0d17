//! SQLite storage layer
//!
//! Each entity module provides `add_*` constructors, `search_*` readers and
//! `sync_*` operations which reconcile a whole partition of a table with a
//! desired collection. Multi-statement operations run in one transaction.

pub mod facility;
pub mod init;
pub mod jcmt;
pub mod people;
pub mod proposal;
pub mod review;
pub mod sync;
pub mod value;

pub use init::{init_database, init_memory_database, init_schema};
pub use sync::{sync_records, SyncCounts, SyncKey, SyncOptions, SyncRecord, TableDef};
pub use value::SqlValue;

use sqlx::SqliteConnection;

use crate::{Error, Result};

/// Fail with a consistency error unless `table` has a row with this id.
///
/// `table` must be a name from the schema, never user input.
pub(crate) async fn ensure_exists(conn: &mut SqliteConnection, table: &str, id: i64) -> Result<()> {
    let sql = format!("SELECT 1 FROM \"{}\" WHERE \"id\" = ?", table);

    let found: Option<i64> = sqlx::query_scalar(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    match found {
        Some(_) => Ok(()),
        None => Err(Error::consistency(format!(
            "{} does not exist with id={}",
            table, id
        ))),
    }
}

