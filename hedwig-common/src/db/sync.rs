//! Record set reconciliation
//!
//! `sync_records` brings the rows of one partition of a table (all rows
//! matching a key) into line with a desired collection of records, issuing
//! only the inserts, updates and deletes which are necessary.
//!
//! Statements run in a fixed order: deletes, then updates, then inserts.
//! Updates which change unique column values are further ordered so that no
//! row ever takes values still held by another row of the partition.

use serde::Serialize;
use sqlx::{Row, SqliteConnection};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use tracing::debug;

use super::value::SqlValue;
use crate::types::ResultCollection;
use crate::{Error, Result};

/// Record which can take part in reconciliation
pub trait SyncRecord {
    /// Identifier of the stored row, `None` for new records
    fn id(&self) -> Option<i64>;

    /// Value for the named column, `None` if the record has no such column
    fn column(&self, name: &str) -> Option<SqlValue>;
}

/// Table layout: every column apart from `id`
#[derive(Debug, Clone, Copy)]
pub struct TableDef {
    pub name: &'static str,
    pub columns: &'static [&'static str],
}

/// Column values selecting the partition to reconcile
#[derive(Debug, Clone)]
pub struct SyncKey {
    columns: Vec<&'static str>,
    values: Vec<SqlValue>,
}

impl SyncKey {
    pub fn single(column: &'static str, value: impl Into<SqlValue>) -> Self {
        Self {
            columns: vec![column],
            values: vec![value.into()],
        }
    }

    pub fn composite(columns: &[&'static str], values: Vec<SqlValue>) -> Result<Self> {
        if columns.len() != values.len() {
            return Err(Error::consistency(format!(
                "key columns ({}) and key values ({}) differ in length",
                columns.len(),
                values.len()
            )));
        }

        Ok(Self {
            columns: columns.to_vec(),
            values,
        })
    }

    pub fn columns(&self) -> &[&'static str] {
        &self.columns
    }

    fn condition(&self) -> String {
        self.columns
            .iter()
            .map(|column| format!("{} = ?", quote(column)))
            .collect::<Vec<_>>()
            .join(" AND ")
    }
}

/// Reconciliation behaviour for one call of `sync_records`
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Columns compared and written; all non-key columns when `None`
    pub update_columns: Option<Vec<&'static str>>,
    /// Changing any of these resets the `verified` column to false
    pub verified_columns: Vec<&'static str>,
    /// Columns whose combined values must be unique within the partition
    pub unique_columns: Vec<&'static str>,
    pub forbid_add: bool,
    pub forbid_delete: bool,
}

impl SyncOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_columns(mut self, columns: &[&'static str]) -> Self {
        self.update_columns = Some(columns.to_vec());
        self
    }

    pub fn verified_columns(mut self, columns: &[&'static str]) -> Self {
        self.verified_columns = columns.to_vec();
        self
    }

    pub fn unique_columns(mut self, columns: &[&'static str]) -> Self {
        self.unique_columns = columns.to_vec();
        self
    }

    pub fn forbid_add(mut self) -> Self {
        self.forbid_add = true;
        self
    }

    pub fn forbid_delete(mut self) -> Self {
        self.forbid_delete = true;
        self
    }
}

/// Number of rows inserted, updated and deleted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncCounts {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl SyncCounts {
    pub fn as_tuple(&self) -> (usize, usize, usize) {
        (self.inserted, self.updated, self.deleted)
    }
}

struct PlannedUpdate {
    id: i64,
    changes: Vec<(&'static str, SqlValue)>,
    old_unique: Option<Vec<String>>,
    new_unique: Option<Vec<String>>,
}

/// Update the rows of `table` matching `key` to match `records`.
///
/// Records are matched to stored rows by their `id`; the collection keys are
/// ignored. Records without an identifier, or with one which does not match
/// a stored row, are inserted. Stored rows which no record matches are
/// deleted.
///
/// Must be called within a transaction: on error some statements may
/// already have been executed.
pub async fn sync_records<R: SyncRecord>(
    conn: &mut SqliteConnection,
    table: &TableDef,
    key: &SyncKey,
    records: &ResultCollection<R>,
    options: &SyncOptions,
) -> Result<SyncCounts> {
    let update_columns: Vec<&'static str> = match &options.update_columns {
        Some(columns) => columns.clone(),
        None => table
            .columns
            .iter()
            .copied()
            .filter(|column| !key.columns.contains(column))
            .collect(),
    };

    let mut fetch_columns = update_columns.clone();
    for column in &options.unique_columns {
        if !fetch_columns.contains(column) {
            fetch_columns.push(column);
        }
    }

    let unique_index: Vec<usize> = options
        .unique_columns
        .iter()
        .map(|column| fetch_columns.iter().position(|c| c == column).unwrap_or_default())
        .collect();

    let existing = fetch_existing(conn, table, key, &fetch_columns).await?;
    let mut unmatched: BTreeSet<i64> = existing.keys().copied().collect();

    let mut considered = HashSet::new();
    let mut desired_unique = HashSet::new();
    let mut inserts = Vec::new();
    let mut updates = Vec::new();

    for record in records.values() {
        let previous = match record.id() {
            None => None,
            Some(id) => {
                if !considered.insert(id) {
                    return Err(Error::consistency(format!(
                        "the identifier {} appears more than once",
                        id
                    )));
                }

                if unmatched.remove(&id) {
                    existing.get(&id).map(|row| (id, row))
                } else {
                    None
                }
            }
        };

        let values = record_values(record, table, &fetch_columns)?;
        let new_unique = unique_token(unique_index.iter().map(|i| &values[*i]));

        if let Some(token) = &new_unique {
            if !desired_unique.insert(token.clone()) {
                return Err(Error::user(format!(
                    "The records contain duplicate values for {}.",
                    options.unique_columns.join(", ")
                )));
            }
        }

        match previous {
            None => {
                if options.forbid_add {
                    return Err(Error::user("New entries can not be added here."));
                }

                inserts.push(values[..update_columns.len()].to_vec());
            }

            Some((id, row)) => {
                let mut changes = Vec::new();
                let mut reset_verified = false;

                for (i, column) in update_columns.iter().enumerate() {
                    if !row[i].same_as(&values[i]) {
                        changes.push((*column, values[i].clone()));
                        if options.verified_columns.contains(column) {
                            reset_verified = true;
                        }
                    }
                }

                if reset_verified && !changes.iter().any(|(c, _)| *c == "verified") {
                    changes.push(("verified", SqlValue::from(false)));
                }

                if !changes.is_empty() {
                    updates.push(PlannedUpdate {
                        id,
                        changes,
                        old_unique: unique_token(unique_index.iter().map(|i| &row[*i])),
                        new_unique,
                    });
                }
            }
        }
    }

    if options.forbid_delete && !unmatched.is_empty() {
        return Err(Error::user("Entries can not be deleted here."));
    }

    let mut counts = SyncCounts::default();

    let delete_sql = format!("DELETE FROM {} WHERE \"id\" = ?", quote(table.name));
    for id in &unmatched {
        sqlx::query(&delete_sql).bind(*id).execute(&mut *conn).await?;
        counts.deleted += 1;
    }

    // Unique values currently held by the remaining rows.
    let mut holders: HashMap<Vec<String>, i64> = existing
        .iter()
        .filter(|(id, _)| !unmatched.contains(id))
        .filter_map(|(id, row)| {
            unique_token(unique_index.iter().map(|i| &row[*i])).map(|token| (token, *id))
        })
        .collect();

    let mut pending = VecDeque::new();
    for update in updates {
        if update.old_unique == update.new_unique {
            execute_update(conn, table, &update).await?;
            counts.updated += 1;
        } else {
            pending.push_back(update);
        }
    }

    while !pending.is_empty() {
        let ready = pending.iter().position(|update| match &update.new_unique {
            None => true,
            Some(token) => holders.get(token).map_or(true, |holder| *holder == update.id),
        });

        let Some(position) = ready else {
            return Err(Error::user(format!(
                "Circular update of unique values for {}.",
                options.unique_columns.join(", ")
            )));
        };

        let Some(update) = pending.remove(position) else {
            break;
        };

        execute_update(conn, table, &update).await?;
        counts.updated += 1;

        if let Some(token) = &update.old_unique {
            if holders.get(token) == Some(&update.id) {
                holders.remove(token);
            }
        }
        if let Some(token) = update.new_unique {
            holders.insert(token, update.id);
        }
    }

    if !inserts.is_empty() {
        let columns: Vec<&str> = key.columns.iter().chain(update_columns.iter()).copied().collect();
        let insert_sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote(table.name),
            columns.iter().map(|c| quote(c)).collect::<Vec<_>>().join(", "),
            vec!["?"; columns.len()].join(", ")
        );

        for values in inserts {
            let mut query = sqlx::query(&insert_sql);
            for value in key.values.iter().chain(values.iter()) {
                query = value.bind(query);
            }
            query.execute(&mut *conn).await?;
            counts.inserted += 1;
        }
    }

    debug!(
        table = table.name,
        inserted = counts.inserted,
        updated = counts.updated,
        deleted = counts.deleted,
        "Synchronised records"
    );

    Ok(counts)
}

async fn fetch_existing(
    conn: &mut SqliteConnection,
    table: &TableDef,
    key: &SyncKey,
    columns: &[&'static str],
) -> Result<BTreeMap<i64, Vec<SqlValue>>> {
    let mut select = vec!["\"id\"".to_string()];
    select.extend(columns.iter().map(|c| quote(c)));

    let sql = format!(
        "SELECT {} FROM {} WHERE {}",
        select.join(", "),
        quote(table.name),
        key.condition()
    );

    let mut query = sqlx::query(&sql);
    for value in &key.values {
        query = value.bind(query);
    }

    let rows = query.fetch_all(&mut *conn).await?;

    let mut existing = BTreeMap::new();
    for row in rows {
        let id: i64 = row.try_get(0)?;
        let values = (0..columns.len()).map(|i| SqlValue::from_row(&row, i + 1)).collect();
        existing.insert(id, values);
    }

    Ok(existing)
}

async fn execute_update(
    conn: &mut SqliteConnection,
    table: &TableDef,
    update: &PlannedUpdate,
) -> Result<()> {
    let assignments = update
        .changes
        .iter()
        .map(|(column, _)| format!("{} = ?", quote(column)))
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!(
        "UPDATE {} SET {} WHERE \"id\" = ?",
        quote(table.name),
        assignments
    );

    let mut query = sqlx::query(&sql);
    for (_, value) in &update.changes {
        query = value.bind(query);
    }
    query.bind(update.id).execute(&mut *conn).await?;

    Ok(())
}

fn record_values<R: SyncRecord>(
    record: &R,
    table: &TableDef,
    columns: &[&'static str],
) -> Result<Vec<SqlValue>> {
    columns
        .iter()
        .map(|column| {
            record.column(column).ok_or_else(|| {
                Error::consistency(format!(
                    "record for table {} has no column {}",
                    table.name, column
                ))
            })
        })
        .collect()
}

/// Comparable form of a tuple of unique values.
///
/// `None` when there are no unique columns or any value is NULL: such
/// tuples never collide.
fn unique_token<'a>(values: impl Iterator<Item = &'a SqlValue>) -> Option<Vec<String>> {
    let token: Option<Vec<String>> = values.map(SqlValue::unique_token).collect();
    token.filter(|t| !t.is_empty())
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier)
}
