//! JCMT observing time: requests and allocations by proposal, available
//! time by call

use sqlx::{Row, SqlitePool};

use super::sync::{sync_records, SyncKey, SyncOptions, SyncRecord, TableDef};
use super::value::SqlValue;
use super::{ensure_exists, SyncCounts};
use crate::types::{JcmtAvailable, JcmtRequest, ResultCollection};
use crate::Result;

const JCMT_AVAILABLE: TableDef = TableDef {
    name: "jcmt_available",
    columns: &["call_id", "weather", "time"],
};

const JCMT_REQUEST: TableDef = TableDef {
    name: "jcmt_request",
    columns: &["proposal_id", "instrument", "weather", "time"],
};

const JCMT_ALLOCATION: TableDef = TableDef {
    name: "jcmt_allocation",
    columns: &["proposal_id", "instrument", "weather", "time"],
};

impl SyncRecord for JcmtAvailable {
    fn id(&self) -> Option<i64> {
        self.id
    }

    fn column(&self, name: &str) -> Option<SqlValue> {
        match name {
            "call_id" => Some(self.call_id.into()),
            "weather" => Some(self.weather.into()),
            "time" => Some(self.time.into()),
            _ => None,
        }
    }
}

impl SyncRecord for JcmtRequest {
    fn id(&self) -> Option<i64> {
        self.id
    }

    fn column(&self, name: &str) -> Option<SqlValue> {
        match name {
            "proposal_id" => Some(self.proposal_id.into()),
            "instrument" => Some(self.instrument.into()),
            "weather" => Some(self.weather.into()),
            "time" => Some(self.time.into()),
            _ => None,
        }
    }
}

pub async fn search_jcmt_available(
    db: &SqlitePool,
    call_id: i64,
) -> Result<ResultCollection<JcmtAvailable>> {
    let rows = sqlx::query(
        "SELECT id, call_id, weather, time FROM jcmt_available WHERE call_id = ? ORDER BY weather",
    )
    .bind(call_id)
    .fetch_all(db)
    .await?;

    Ok(rows
        .iter()
        .map(|row| {
            let id: i64 = row.get("id");
            let record = JcmtAvailable {
                id: Some(id),
                call_id: row.get("call_id"),
                weather: row.get("weather"),
                time: row.get("time"),
            };
            (id, record)
        })
        .collect())
}

pub async fn sync_jcmt_call_available(
    db: &SqlitePool,
    call_id: i64,
    records: &ResultCollection<JcmtAvailable>,
) -> Result<SyncCounts> {
    records.validate()?;

    let mut tx = db.begin().await?;
    ensure_exists(&mut tx, "call", call_id).await?;

    let counts = sync_records(
        &mut tx,
        &JCMT_AVAILABLE,
        &SyncKey::single("call_id", call_id),
        records,
        &SyncOptions::new().unique_columns(&["weather"]),
    )
    .await?;

    tx.commit().await?;

    Ok(counts)
}

async fn search_time(
    db: &SqlitePool,
    table: &TableDef,
    proposal_id: i64,
) -> Result<ResultCollection<JcmtRequest>> {
    let sql = format!(
        "SELECT id, proposal_id, instrument, weather, time FROM {} WHERE proposal_id = ? ORDER BY instrument, weather",
        table.name
    );

    let rows = sqlx::query(&sql).bind(proposal_id).fetch_all(db).await?;

    Ok(rows
        .iter()
        .map(|row| {
            let id: i64 = row.get("id");
            let record = JcmtRequest {
                id: Some(id),
                proposal_id: row.get("proposal_id"),
                instrument: row.get("instrument"),
                weather: row.get("weather"),
                time: row.get("time"),
            };
            (id, record)
        })
        .collect())
}

async fn sync_time(
    db: &SqlitePool,
    table: &TableDef,
    proposal_id: i64,
    records: &ResultCollection<JcmtRequest>,
) -> Result<SyncCounts> {
    records.validate()?;

    let mut tx = db.begin().await?;
    ensure_exists(&mut tx, "proposal", proposal_id).await?;

    let counts = sync_records(
        &mut tx,
        table,
        &SyncKey::single("proposal_id", proposal_id),
        records,
        &SyncOptions::new().unique_columns(&["instrument", "weather"]),
    )
    .await?;

    tx.commit().await?;

    Ok(counts)
}

/// Time requested by a proposal
pub async fn search_jcmt_request(
    db: &SqlitePool,
    proposal_id: i64,
) -> Result<ResultCollection<JcmtRequest>> {
    search_time(db, &JCMT_REQUEST, proposal_id).await
}

pub async fn sync_jcmt_proposal_request(
    db: &SqlitePool,
    proposal_id: i64,
    records: &ResultCollection<JcmtRequest>,
) -> Result<SyncCounts> {
    sync_time(db, &JCMT_REQUEST, proposal_id, records).await
}

/// Time allocated to a proposal by the committee
pub async fn search_jcmt_allocation(
    db: &SqlitePool,
    proposal_id: i64,
) -> Result<ResultCollection<JcmtRequest>> {
    search_time(db, &JCMT_ALLOCATION, proposal_id).await
}

pub async fn sync_jcmt_proposal_allocation(
    db: &SqlitePool,
    proposal_id: i64,
    records: &ResultCollection<JcmtRequest>,
) -> Result<SyncCounts> {
    sync_time(db, &JCMT_ALLOCATION, proposal_id, records).await
}
