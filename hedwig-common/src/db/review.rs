//! Reviewer assignments, reviews and review group membership

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::sync::{sync_records, SyncKey, SyncOptions, SyncRecord, TableDef};
use super::value::SqlValue;
use super::{ensure_exists, SyncCounts};
use crate::types::{
    GroupMember, GroupType, ResultCollection, ReviewInput, Reviewer, ReviewerRole, RoleCatalog,
};
use crate::{Error, Result};

const GROUP_MEMBER: TableDef = TableDef {
    name: "group_member",
    columns: &["queue_id", "group_type", "person_id"],
};

impl SyncRecord for GroupMember {
    fn id(&self) -> Option<i64> {
        self.id
    }

    fn column(&self, name: &str) -> Option<SqlValue> {
        match name {
            "queue_id" => Some(self.queue_id.into()),
            "group_type" => Some(self.group_type.code().into()),
            "person_id" => Some(self.person_id.into()),
            _ => None,
        }
    }
}

/// Assign a person to review a proposal in the given role
pub async fn add_reviewer(
    db: &SqlitePool,
    roles: &dyn RoleCatalog,
    proposal_id: i64,
    person_id: i64,
    role: ReviewerRole,
) -> Result<i64> {
    let mut tx = db.begin().await?;
    ensure_exists(&mut tx, "proposal", proposal_id).await?;
    ensure_exists(&mut tx, "person", person_id).await?;

    if roles.role_info(role).unique {
        let existing: Option<i64> =
            sqlx::query_scalar("SELECT id FROM reviewer WHERE proposal_id = ? AND role = ?")
                .bind(proposal_id)
                .bind(role.code())
                .fetch_optional(&mut *tx)
                .await?;

        if existing.is_some() {
            return Err(Error::user(format!(
                "There is already a \"{}\" reviewer for this proposal.",
                roles.role_info(role).name
            )));
        }
    }

    let id = sqlx::query("INSERT INTO reviewer (proposal_id, person_id, role) VALUES (?, ?, ?)")
        .bind(proposal_id)
        .bind(person_id)
        .bind(role.code())
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

    tx.commit().await?;

    Ok(id)
}

/// Store the review written by a reviewer.
///
/// Each field must be given exactly when the reviewer's role uses it.
/// With `is_update` the review must already exist; without it, it must not.
pub async fn set_review(
    db: &SqlitePool,
    roles: &dyn RoleCatalog,
    reviewer_id: i64,
    review: &ReviewInput,
    is_update: bool,
) -> Result<()> {
    let mut tx = db.begin().await?;

    let role: Option<i64> = sqlx::query_scalar("SELECT role FROM reviewer WHERE id = ?")
        .bind(reviewer_id)
        .fetch_optional(&mut *tx)
        .await?;
    let role = role
        .and_then(ReviewerRole::from_code)
        .ok_or_else(|| Error::consistency(format!("reviewer does not exist with id={}", reviewer_id)))?;

    let info = roles.role_info(role);
    for (attribute, expected, present) in [
        ("text", info.text, review.text.is_some()),
        ("assessment", info.assessment, review.assessment.is_some()),
        ("rating", info.rating, review.rating.is_some()),
        ("weight", info.weight, review.weight.is_some()),
    ] {
        if expected && !present {
            return Err(Error::user(format!("The {} should be specified.", attribute)));
        }
        if present && !expected {
            return Err(Error::user(format!("The {} should not be specified.", attribute)));
        }
    }

    if let Some(rating) = review.rating {
        if !(0..=100).contains(&rating) {
            return Err(Error::user("The rating should be between 0 and 100."));
        }
    }
    if let Some(weight) = review.weight {
        if !(0..=100).contains(&weight) {
            return Err(Error::user("The weight should be between 0 and 100."));
        }
    }

    let exists: Option<i64> = sqlx::query_scalar("SELECT reviewer_id FROM review WHERE reviewer_id = ?")
        .bind(reviewer_id)
        .fetch_optional(&mut *tx)
        .await?;

    match (is_update, exists.is_some()) {
        (true, false) => {
            return Err(Error::consistency(format!(
                "review does not exist for reviewer {}",
                reviewer_id
            )))
        }
        (false, true) => {
            return Err(Error::consistency(format!(
                "review already exists for reviewer {}",
                reviewer_id
            )))
        }
        _ => {}
    }

    let sql = if is_update {
        "UPDATE review SET text = ?, assessment = ?, rating = ?, weight = ?, edited = ? WHERE reviewer_id = ?"
    } else {
        "INSERT INTO review (text, assessment, rating, weight, edited, reviewer_id) VALUES (?, ?, ?, ?, ?, ?)"
    };

    let result = sqlx::query(sql)
        .bind(review.text.clone())
        .bind(review.assessment)
        .bind(review.rating)
        .bind(review.weight)
        .bind(Utc::now())
        .bind(reviewer_id)
        .execute(&mut *tx)
        .await?;

    if result.rows_affected() != 1 {
        return Err(Error::consistency(format!(
            "no rows matched writing review {}",
            reviewer_id
        )));
    }

    tx.commit().await?;

    Ok(())
}

const REVIEWER_SELECT: &str = r#"
    SELECT r.id, r.proposal_id, r.person_id, r.role, p.name AS person_name,
           rv.reviewer_id IS NOT NULL AS review_present,
           rv.text AS review_text, rv.assessment AS review_assessment,
           rv.rating AS review_rating, rv.weight AS review_weight,
           rv.edited AS review_edited
    FROM reviewer r
    JOIN person p ON p.id = r.person_id
    LEFT JOIN review rv ON rv.reviewer_id = r.id
"#;

fn reviewer_from_row(row: &SqliteRow) -> Result<Reviewer> {
    let role: i64 = row.get("role");

    Ok(Reviewer {
        id: row.get("id"),
        proposal_id: row.get("proposal_id"),
        person_id: row.get("person_id"),
        role: ReviewerRole::from_code(role)
            .ok_or_else(|| Error::consistency(format!("reviewer role not recognised: {}", role)))?,
        person_name: row.get("person_name"),
        review_present: row.get("review_present"),
        review_text: row.get("review_text"),
        review_assessment: row.get("review_assessment"),
        review_rating: row.get("review_rating"),
        review_weight: row.get("review_weight"),
        review_edited: row.get("review_edited"),
    })
}

fn reviewer_collection(rows: &[SqliteRow]) -> Result<ResultCollection<Reviewer>> {
    let mut reviewers = ResultCollection::new();
    for row in rows {
        let reviewer = reviewer_from_row(row)?;
        reviewers.insert(reviewer.id, reviewer);
    }
    Ok(reviewers)
}

/// Reviewers of one proposal, with their reviews
pub async fn search_reviewer(db: &SqlitePool, proposal_id: i64) -> Result<ResultCollection<Reviewer>> {
    let sql = format!("{} WHERE r.proposal_id = ? ORDER BY r.role, r.id", REVIEWER_SELECT);

    let rows = sqlx::query(&sql).bind(proposal_id).fetch_all(db).await?;

    reviewer_collection(&rows)
}

/// Reviewers of every proposal in a call
pub async fn search_reviewer_by_call(
    db: &SqlitePool,
    call_id: i64,
) -> Result<ResultCollection<Reviewer>> {
    let sql = format!(
        "{} JOIN proposal pr ON pr.id = r.proposal_id WHERE pr.call_id = ? ORDER BY pr.number, r.role, r.id",
        REVIEWER_SELECT
    );

    let rows = sqlx::query(&sql).bind(call_id).fetch_all(db).await?;

    reviewer_collection(&rows)
}

pub async fn add_group_member(
    db: &SqlitePool,
    queue_id: i64,
    group_type: GroupType,
    person_id: i64,
) -> Result<i64> {
    let mut tx = db.begin().await?;
    ensure_exists(&mut tx, "queue", queue_id).await?;
    ensure_exists(&mut tx, "person", person_id).await?;

    let id = sqlx::query("INSERT INTO group_member (queue_id, group_type, person_id) VALUES (?, ?, ?)")
        .bind(queue_id)
        .bind(group_type.code())
        .bind(person_id)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

    tx.commit().await?;

    Ok(id)
}

/// Members of a queue's review groups, by person name
pub async fn search_group_member(
    db: &SqlitePool,
    queue_id: i64,
    group_type: Option<GroupType>,
) -> Result<ResultCollection<GroupMember>> {
    let rows = sqlx::query(
        r#"
        SELECT g.id, g.queue_id, g.group_type, g.person_id, p.name AS person_name
        FROM group_member g
        JOIN person p ON p.id = g.person_id
        WHERE g.queue_id = ? AND (? IS NULL OR g.group_type = ?)
        ORDER BY p.name, g.id
        "#,
    )
    .bind(queue_id)
    .bind(group_type.map(GroupType::code))
    .bind(group_type.map(GroupType::code))
    .fetch_all(db)
    .await?;

    let mut members = ResultCollection::new();
    for row in &rows {
        let id: i64 = row.get("id");
        let code: i64 = row.get("group_type");
        let group_type = GroupType::from_code(code)
            .ok_or_else(|| Error::consistency(format!("group type not recognised: {}", code)))?;

        members.insert(
            id,
            GroupMember {
                id: Some(id),
                queue_id: row.get("queue_id"),
                group_type,
                person_id: row.get("person_id"),
                person_name: row.get("person_name"),
            },
        );
    }

    Ok(members)
}

/// Remove people from a review group.
///
/// Only deletions are possible here: members are added with
/// `add_group_member`.
pub async fn sync_group_member(
    db: &SqlitePool,
    queue_id: i64,
    group_type: GroupType,
    records: &ResultCollection<GroupMember>,
) -> Result<SyncCounts> {
    let key = SyncKey::composite(
        &["queue_id", "group_type"],
        vec![queue_id.into(), group_type.code().into()],
    )?;

    let mut tx = db.begin().await?;
    ensure_exists(&mut tx, "queue", queue_id).await?;

    let counts = sync_records(
        &mut tx,
        &GROUP_MEMBER,
        &key,
        records,
        &SyncOptions::new().update_columns(&[]).forbid_add(),
    )
    .await?;

    tx.commit().await?;

    Ok(counts)
}
