//! Facilities, queues, semesters, calls and the per-facility lookup lists
//! (affiliations and science categories)

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use tracing::info;

use super::sync::{sync_records, SyncKey, SyncOptions, SyncRecord, TableDef};
use super::value::SqlValue;
use super::{ensure_exists, SyncCounts};
use crate::types::{Affiliation, Call, Category, ResultCollection};
use crate::{Error, Result};

const AFFILIATION: TableDef = TableDef {
    name: "affiliation",
    columns: &["queue_id", "name", "hidden"],
};

const CATEGORY: TableDef = TableDef {
    name: "category",
    columns: &["facility_id", "name", "hidden"],
};

impl SyncRecord for Affiliation {
    fn id(&self) -> Option<i64> {
        self.id
    }

    fn column(&self, name: &str) -> Option<SqlValue> {
        match name {
            "queue_id" => Some(self.queue_id.into()),
            "name" => Some(self.name.as_str().into()),
            "hidden" => Some(self.hidden.into()),
            _ => None,
        }
    }
}

impl SyncRecord for Category {
    fn id(&self) -> Option<i64> {
        self.id
    }

    fn column(&self, name: &str) -> Option<SqlValue> {
        match name {
            "facility_id" => Some(self.facility_id.into()),
            "name" => Some(self.name.as_str().into()),
            "hidden" => Some(self.hidden.into()),
            _ => None,
        }
    }
}

/// Identifier of the facility with this code, adding it if necessary
pub async fn ensure_facility(db: &SqlitePool, code: &str) -> Result<i64> {
    if code.is_empty() {
        return Err(Error::consistency("The facility code can not be blank."));
    }

    let mut tx = db.begin().await?;

    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM facility WHERE code = ?")
        .bind(code)
        .fetch_optional(&mut *tx)
        .await?;

    let id = match existing {
        Some(id) => id,
        None => {
            let id = sqlx::query("INSERT INTO facility (code) VALUES (?)")
                .bind(code)
                .execute(&mut *tx)
                .await?
                .last_insert_rowid();
            info!("Added facility {} with id={}", code, id);
            id
        }
    };

    tx.commit().await?;

    Ok(id)
}

pub async fn add_queue(db: &SqlitePool, facility_id: i64, name: &str, code: &str) -> Result<i64> {
    let mut tx = db.begin().await?;
    ensure_exists(&mut tx, "facility", facility_id).await?;

    let id = sqlx::query("INSERT INTO queue (facility_id, name, code) VALUES (?, ?, ?)")
        .bind(facility_id)
        .bind(name)
        .bind(code)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

    tx.commit().await?;

    Ok(id)
}

pub async fn add_semester(
    db: &SqlitePool,
    facility_id: i64,
    name: &str,
    code: &str,
    date_start: DateTime<Utc>,
    date_end: DateTime<Utc>,
) -> Result<i64> {
    if date_end < date_start {
        return Err(Error::user("Semester end date is before start date."));
    }

    let mut tx = db.begin().await?;
    ensure_exists(&mut tx, "facility", facility_id).await?;

    let id = sqlx::query(
        r#"
        INSERT INTO semester (facility_id, name, code, date_start, date_end)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(facility_id)
    .bind(name)
    .bind(code)
    .bind(date_start)
    .bind(date_end)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    tx.commit().await?;

    Ok(id)
}

pub async fn add_call(
    db: &SqlitePool,
    semester_id: i64,
    queue_id: i64,
    date_open: DateTime<Utc>,
    date_close: DateTime<Utc>,
) -> Result<i64> {
    if date_close < date_open {
        return Err(Error::user("Closing date is before opening date."));
    }

    let mut tx = db.begin().await?;
    ensure_exists(&mut tx, "semester", semester_id).await?;
    ensure_exists(&mut tx, "queue", queue_id).await?;

    let id = sqlx::query(
        r#"
        INSERT INTO call (semester_id, queue_id, date_open, date_close)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(semester_id)
    .bind(queue_id)
    .bind(date_open)
    .bind(date_close)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    tx.commit().await?;

    Ok(id)
}

pub async fn get_call(db: &SqlitePool, call_id: i64) -> Result<Call> {
    let row = sqlx::query(
        "SELECT id, semester_id, queue_id, date_open, date_close FROM call WHERE id = ?",
    )
    .bind(call_id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| Error::NoSuchRecord(format!("call with id={}", call_id)))?;

    Ok(Call {
        id: row.get("id"),
        semester_id: row.get("semester_id"),
        queue_id: row.get("queue_id"),
        date_open: row.get("date_open"),
        date_close: row.get("date_close"),
    })
}

/// Affiliations of a queue, by name unless `order_by_id` is set
pub async fn search_affiliation(
    db: &SqlitePool,
    queue_id: i64,
    hidden: Option<bool>,
    order_by_id: bool,
) -> Result<ResultCollection<Affiliation>> {
    let sql = format!(
        r#"
        SELECT id, queue_id, name, hidden FROM affiliation
        WHERE queue_id = ? AND (? IS NULL OR hidden = ?)
        ORDER BY {}
        "#,
        if order_by_id { "id" } else { "name" }
    );

    let rows = sqlx::query(&sql)
        .bind(queue_id)
        .bind(hidden)
        .bind(hidden)
        .fetch_all(db)
        .await?;

    Ok(rows
        .iter()
        .map(|row| {
            let id: i64 = row.get("id");
            let record = Affiliation {
                id: Some(id),
                queue_id: row.get("queue_id"),
                name: row.get("name"),
                hidden: row.get("hidden"),
            };
            (id, record)
        })
        .collect())
}

pub async fn sync_queue_affiliation(
    db: &SqlitePool,
    queue_id: i64,
    records: &ResultCollection<Affiliation>,
) -> Result<SyncCounts> {
    if records.values().any(|r| r.name.trim().is_empty()) {
        return Err(Error::user("Affiliation names can not be blank."));
    }

    let mut tx = db.begin().await?;
    ensure_exists(&mut tx, "queue", queue_id).await?;

    let counts = sync_records(
        &mut tx,
        &AFFILIATION,
        &SyncKey::single("queue_id", queue_id),
        records,
        &SyncOptions::new().unique_columns(&["name"]),
    )
    .await?;

    tx.commit().await?;

    Ok(counts)
}

/// Categories of a facility, by name
pub async fn search_category(
    db: &SqlitePool,
    facility_id: i64,
    hidden: Option<bool>,
) -> Result<ResultCollection<Category>> {
    let rows = sqlx::query(
        r#"
        SELECT id, facility_id, name, hidden FROM category
        WHERE facility_id = ? AND (? IS NULL OR hidden = ?)
        ORDER BY name
        "#,
    )
    .bind(facility_id)
    .bind(hidden)
    .bind(hidden)
    .fetch_all(db)
    .await?;

    Ok(rows
        .iter()
        .map(|row| {
            let id: i64 = row.get("id");
            let record = Category {
                id: Some(id),
                facility_id: row.get("facility_id"),
                name: row.get("name"),
                hidden: row.get("hidden"),
            };
            (id, record)
        })
        .collect())
}

pub async fn sync_facility_category(
    db: &SqlitePool,
    facility_id: i64,
    records: &ResultCollection<Category>,
) -> Result<SyncCounts> {
    if records.values().any(|r| r.name.trim().is_empty()) {
        return Err(Error::user("Category names can not be blank."));
    }

    let mut tx = db.begin().await?;
    ensure_exists(&mut tx, "facility", facility_id).await?;

    let counts = sync_records(
        &mut tx,
        &CATEGORY,
        &SyncKey::single("facility_id", facility_id),
        records,
        &SyncOptions::new().unique_columns(&["name"]),
    )
    .await?;

    tx.commit().await?;

    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_database;

    #[tokio::test]
    async fn test_ensure_facility_is_idempotent() {
        let db = init_memory_database().await.unwrap();

        let id = ensure_facility(&db, "jcmt").await.unwrap();
        assert_eq!(ensure_facility(&db, "jcmt").await.unwrap(), id);
        assert_ne!(ensure_facility(&db, "ukirt").await.unwrap(), id);
        assert!(ensure_facility(&db, "").await.is_err());
    }

    #[tokio::test]
    async fn test_add_queue_requires_facility() {
        let db = init_memory_database().await.unwrap();

        let err = add_queue(&db, 42, "Queue", "Q").await.unwrap_err();
        assert_eq!(err.to_string(), "Consistency error: facility does not exist with id=42");
    }

    #[tokio::test]
    async fn test_sync_category_round_trip() {
        let db = init_memory_database().await.unwrap();
        let facility_id = ensure_facility(&db, "test").await.unwrap();

        let records = ResultCollection::from_values(["Stars", "Galaxies"].map(|name| Category {
            id: None,
            facility_id,
            name: name.to_string(),
            hidden: false,
        }));

        let counts = sync_facility_category(&db, facility_id, &records).await.unwrap();
        assert_eq!(counts.as_tuple(), (2, 0, 0));

        let mut stored = search_category(&db, facility_id, None).await.unwrap();
        let names: Vec<_> = stored.values().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Galaxies", "Stars"]);

        for category in stored.values_mut() {
            category.hidden = category.name == "Stars";
        }
        let counts = sync_facility_category(&db, facility_id, &stored).await.unwrap();
        assert_eq!(counts.as_tuple(), (0, 1, 0));

        let visible = search_category(&db, facility_id, Some(false)).await.unwrap();
        assert_eq!(visible.get_single().unwrap().name, "Galaxies");
    }
}
