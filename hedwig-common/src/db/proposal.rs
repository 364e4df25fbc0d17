//! Proposals and the collections attached to them: members, targets and
//! science categories

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::sync::{sync_records, SyncKey, SyncOptions, SyncRecord, TableDef};
use super::value::SqlValue;
use super::{ensure_exists, SyncCounts};
use crate::types::{Member, Proposal, ProposalCategory, ProposalState, ResultCollection, Target};
use crate::{Error, Result};

const MEMBER: TableDef = TableDef {
    name: "member",
    columns: &[
        "proposal_id",
        "sort_order",
        "person_id",
        "pi",
        "editor",
        "observer",
        "student",
        "affiliation_id",
        "institution_id",
    ],
};

const TARGET: TableDef = TableDef {
    name: "target",
    columns: &["proposal_id", "sort_order", "name", "system", "x", "y", "time", "priority"],
};

const PROPOSAL_CATEGORY: TableDef = TableDef {
    name: "proposal_category",
    columns: &["proposal_id", "category_id"],
};

impl SyncRecord for Member {
    fn id(&self) -> Option<i64> {
        self.id
    }

    fn column(&self, name: &str) -> Option<SqlValue> {
        match name {
            "proposal_id" => Some(self.proposal_id.into()),
            "sort_order" => Some(self.sort_order.into()),
            "person_id" => Some(self.person_id.into()),
            "pi" => Some(self.pi.into()),
            "editor" => Some(self.editor.into()),
            "observer" => Some(self.observer.into()),
            "student" => Some(self.student.into()),
            "affiliation_id" => Some(self.affiliation_id.into()),
            "institution_id" => Some(self.institution_id.into()),
            _ => None,
        }
    }
}

impl SyncRecord for Target {
    fn id(&self) -> Option<i64> {
        self.id
    }

    fn column(&self, name: &str) -> Option<SqlValue> {
        match name {
            "proposal_id" => Some(self.proposal_id.into()),
            "sort_order" => Some(self.sort_order.into()),
            "name" => Some(self.name.as_str().into()),
            "system" => Some(self.system.into()),
            "x" => Some(self.x.into()),
            "y" => Some(self.y.into()),
            "time" => Some(self.time.into()),
            "priority" => Some(self.priority.into()),
            _ => None,
        }
    }
}

impl SyncRecord for ProposalCategory {
    fn id(&self) -> Option<i64> {
        self.id
    }

    fn column(&self, name: &str) -> Option<SqlValue> {
        match name {
            "proposal_id" => Some(self.proposal_id.into()),
            "category_id" => Some(self.category_id.into()),
            _ => None,
        }
    }
}

/// Add a proposal with the next free number in its call
pub async fn add_proposal(db: &SqlitePool, call_id: i64, title: &str) -> Result<i64> {
    let mut tx = db.begin().await?;
    ensure_exists(&mut tx, "call", call_id).await?;

    let number: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(number), 0) + 1 FROM proposal WHERE call_id = ?")
        .bind(call_id)
        .fetch_one(&mut *tx)
        .await?;

    let id = sqlx::query("INSERT INTO proposal (call_id, number, state, title) VALUES (?, ?, ?, ?)")
        .bind(call_id)
        .bind(number)
        .bind(ProposalState::Preparation.code())
        .bind(title)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

    tx.commit().await?;

    Ok(id)
}

fn proposal_from_row(row: &SqliteRow) -> Result<Proposal> {
    let state: i64 = row.get("state");

    Ok(Proposal {
        id: row.get("id"),
        call_id: row.get("call_id"),
        number: row.get("number"),
        state: ProposalState::from_code(state)
            .ok_or_else(|| Error::consistency(format!("proposal state not recognised: {}", state)))?,
        title: row.get("title"),
    })
}

pub async fn get_proposal(db: &SqlitePool, proposal_id: i64) -> Result<Proposal> {
    let row = sqlx::query("SELECT id, call_id, number, state, title FROM proposal WHERE id = ?")
        .bind(proposal_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| Error::NoSuchRecord(format!("proposal with id={}", proposal_id)))?;

    proposal_from_row(&row)
}

/// Proposals of a call, optionally restricted to some states, by number
pub async fn search_proposal(
    db: &SqlitePool,
    call_id: i64,
    states: Option<&[ProposalState]>,
) -> Result<ResultCollection<Proposal>> {
    let rows = sqlx::query(
        "SELECT id, call_id, number, state, title FROM proposal WHERE call_id = ? ORDER BY number",
    )
    .bind(call_id)
    .fetch_all(db)
    .await?;

    let mut proposals = ResultCollection::new();
    for row in &rows {
        let proposal = proposal_from_row(row)?;
        if states.map_or(true, |states| states.contains(&proposal.state)) {
            proposals.insert(proposal.id, proposal);
        }
    }

    Ok(proposals)
}

pub async fn update_proposal_state(db: &SqlitePool, proposal_id: i64, state: ProposalState) -> Result<()> {
    let result = sqlx::query("UPDATE proposal SET state = ? WHERE id = ?")
        .bind(state.code())
        .bind(proposal_id)
        .execute(db)
        .await?;

    if result.rows_affected() != 1 {
        return Err(Error::consistency(format!(
            "proposal does not exist with id={}",
            proposal_id
        )));
    }

    Ok(())
}

/// Add a member at the end of a proposal's member list
pub async fn add_member(
    db: &SqlitePool,
    proposal_id: i64,
    person_id: i64,
    affiliation_id: i64,
    pi: bool,
    editor: bool,
    observer: bool,
) -> Result<i64> {
    let mut tx = db.begin().await?;
    ensure_exists(&mut tx, "proposal", proposal_id).await?;
    ensure_exists(&mut tx, "person", person_id).await?;
    ensure_exists(&mut tx, "affiliation", affiliation_id).await?;

    let sort_order: i64 = sqlx::query_scalar(
        "SELECT COALESCE(MAX(sort_order), 0) + 1 FROM member WHERE proposal_id = ?",
    )
    .bind(proposal_id)
    .fetch_one(&mut *tx)
    .await?;

    let id = sqlx::query(
        r#"
        INSERT INTO member (proposal_id, sort_order, person_id, pi, editor, observer, affiliation_id)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(proposal_id)
    .bind(sort_order)
    .bind(person_id)
    .bind(pi)
    .bind(editor)
    .bind(observer)
    .bind(affiliation_id)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    tx.commit().await?;

    Ok(id)
}

/// Members of a proposal in display order
pub async fn search_member(db: &SqlitePool, proposal_id: i64) -> Result<ResultCollection<Member>> {
    let rows = sqlx::query(
        r#"
        SELECT m.id, m.proposal_id, m.sort_order, m.person_id, m.pi, m.editor,
               m.observer, m.student, m.affiliation_id, m.institution_id,
               p.name AS person_name
        FROM member m
        JOIN person p ON p.id = m.person_id
        WHERE m.proposal_id = ?
        ORDER BY m.sort_order, m.id
        "#,
    )
    .bind(proposal_id)
    .fetch_all(db)
    .await?;

    Ok(rows
        .iter()
        .map(|row| {
            let id: i64 = row.get("id");
            let record = Member {
                id: Some(id),
                proposal_id: row.get("proposal_id"),
                sort_order: row.get("sort_order"),
                person_id: row.get("person_id"),
                pi: row.get("pi"),
                editor: row.get("editor"),
                observer: row.get("observer"),
                student: row.get("student"),
                affiliation_id: row.get("affiliation_id"),
                institution_id: row.get("institution_id"),
                person_name: row.get("person_name"),
            };
            (id, record)
        })
        .collect())
}

/// Update the roles of a proposal's members.
///
/// Members can be reordered, edited and removed, but new members are only
/// added with `add_member`. When `editor_person_id` is given, that person
/// must remain an editor.
pub async fn sync_proposal_member(
    db: &SqlitePool,
    proposal_id: i64,
    records: &ResultCollection<Member>,
    editor_person_id: Option<i64>,
) -> Result<SyncCounts> {
    records.validate(editor_person_id)?;

    let mut records = records.clone();
    records.ensure_sort_order();

    let mut tx = db.begin().await?;
    ensure_exists(&mut tx, "proposal", proposal_id).await?;

    let counts = sync_records(
        &mut tx,
        &MEMBER,
        &SyncKey::single("proposal_id", proposal_id),
        &records,
        &SyncOptions::new()
            .update_columns(&["sort_order", "pi", "editor", "observer", "affiliation_id"])
            .forbid_add(),
    )
    .await?;

    tx.commit().await?;

    Ok(counts)
}

/// Record the institutions members belonged to when the proposal was
/// submitted
pub async fn sync_proposal_member_institution(
    db: &SqlitePool,
    proposal_id: i64,
    records: &ResultCollection<Member>,
) -> Result<SyncCounts> {
    let mut tx = db.begin().await?;
    ensure_exists(&mut tx, "proposal", proposal_id).await?;

    let counts = sync_records(
        &mut tx,
        &MEMBER,
        &SyncKey::single("proposal_id", proposal_id),
        records,
        &SyncOptions::new()
            .update_columns(&["institution_id"])
            .forbid_add()
            .forbid_delete(),
    )
    .await?;

    tx.commit().await?;

    Ok(counts)
}

pub async fn sync_proposal_member_student(
    db: &SqlitePool,
    proposal_id: i64,
    records: &ResultCollection<Member>,
) -> Result<SyncCounts> {
    let mut tx = db.begin().await?;
    ensure_exists(&mut tx, "proposal", proposal_id).await?;

    let counts = sync_records(
        &mut tx,
        &MEMBER,
        &SyncKey::single("proposal_id", proposal_id),
        records,
        &SyncOptions::new()
            .update_columns(&["student"])
            .forbid_add()
            .forbid_delete(),
    )
    .await?;

    tx.commit().await?;

    Ok(counts)
}

/// Targets of a proposal in display order
pub async fn search_target(db: &SqlitePool, proposal_id: i64) -> Result<ResultCollection<Target>> {
    let rows = sqlx::query(
        r#"
        SELECT id, proposal_id, sort_order, name, system, x, y, time, priority
        FROM target
        WHERE proposal_id = ?
        ORDER BY sort_order, id
        "#,
    )
    .bind(proposal_id)
    .fetch_all(db)
    .await?;

    Ok(rows
        .iter()
        .map(|row| {
            let id: i64 = row.get("id");
            let record = Target {
                id: Some(id),
                proposal_id: row.get("proposal_id"),
                sort_order: row.get("sort_order"),
                name: row.get("name"),
                system: row.get("system"),
                x: row.get("x"),
                y: row.get("y"),
                time: row.get("time"),
                priority: row.get("priority"),
            };
            (id, record)
        })
        .collect())
}

pub async fn sync_proposal_target(
    db: &SqlitePool,
    proposal_id: i64,
    records: &ResultCollection<Target>,
) -> Result<SyncCounts> {
    records.validate()?;

    let mut records = records.clone();
    records.ensure_sort_order();

    let mut tx = db.begin().await?;
    ensure_exists(&mut tx, "proposal", proposal_id).await?;

    let counts = sync_records(
        &mut tx,
        &TARGET,
        &SyncKey::single("proposal_id", proposal_id),
        &records,
        &SyncOptions::new(),
    )
    .await?;

    tx.commit().await?;

    Ok(counts)
}

/// Categories selected for a proposal, by category name
pub async fn search_proposal_category(
    db: &SqlitePool,
    proposal_id: i64,
) -> Result<ResultCollection<ProposalCategory>> {
    let rows = sqlx::query(
        r#"
        SELECT pc.id, pc.proposal_id, pc.category_id, c.name AS category_name
        FROM proposal_category pc
        JOIN category c ON c.id = pc.category_id
        WHERE pc.proposal_id = ?
        ORDER BY c.name
        "#,
    )
    .bind(proposal_id)
    .fetch_all(db)
    .await?;

    Ok(rows
        .iter()
        .map(|row| {
            let id: i64 = row.get("id");
            let record = ProposalCategory {
                id: Some(id),
                proposal_id: row.get("proposal_id"),
                category_id: row.get("category_id"),
                category_name: row.get("category_name"),
            };
            (id, record)
        })
        .collect())
}

pub async fn sync_proposal_category(
    db: &SqlitePool,
    proposal_id: i64,
    records: &ResultCollection<ProposalCategory>,
) -> Result<SyncCounts> {
    let mut tx = db.begin().await?;
    ensure_exists(&mut tx, "proposal", proposal_id).await?;

    let counts = sync_records(
        &mut tx,
        &PROPOSAL_CATEGORY,
        &SyncKey::single("proposal_id", proposal_id),
        records,
        &SyncOptions::new().unique_columns(&["category_id"]),
    )
    .await?;

    tx.commit().await?;

    Ok(counts)
}
