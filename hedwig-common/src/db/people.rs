//! People, institutions and email addresses

use sqlx::{Row, SqlitePool};

use super::sync::{sync_records, SyncKey, SyncOptions, SyncRecord, TableDef};
use super::value::SqlValue;
use super::{ensure_exists, SyncCounts};
use crate::types::{Email, Institution, Person, ResultCollection};
use crate::{Error, Result};

const EMAIL: TableDef = TableDef {
    name: "email",
    columns: &["person_id", "address", "primary", "verified", "public"],
};

impl SyncRecord for Email {
    fn id(&self) -> Option<i64> {
        self.id
    }

    fn column(&self, name: &str) -> Option<SqlValue> {
        match name {
            "person_id" => Some(self.person_id.into()),
            "address" => Some(self.address.as_str().into()),
            "primary" => Some(self.primary.into()),
            "verified" => Some(self.verified.into()),
            "public" => Some(self.public.into()),
            _ => None,
        }
    }
}

pub async fn add_institution(
    db: &SqlitePool,
    name: &str,
    organization: &str,
    address: &str,
    country: &str,
) -> Result<i64> {
    let id = sqlx::query(
        "INSERT INTO institution (name, organization, address, country) VALUES (?, ?, ?, ?)",
    )
    .bind(name)
    .bind(organization)
    .bind(address)
    .bind(country)
    .execute(db)
    .await?
    .last_insert_rowid();

    Ok(id)
}

pub async fn get_institution(db: &SqlitePool, institution_id: i64) -> Result<Institution> {
    let row = sqlx::query(
        "SELECT id, name, organization, address, country FROM institution WHERE id = ?",
    )
    .bind(institution_id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| Error::NoSuchRecord(format!("institution with id={}", institution_id)))?;

    Ok(Institution {
        id: row.get("id"),
        name: row.get("name"),
        organization: row.get("organization"),
        address: row.get("address"),
        country: row.get("country"),
    })
}

pub async fn add_person(
    db: &SqlitePool,
    name: &str,
    public: bool,
    institution_id: Option<i64>,
    admin: bool,
) -> Result<i64> {
    if name.trim().is_empty() {
        return Err(Error::user("The person's name can not be blank."));
    }

    let mut tx = db.begin().await?;
    if let Some(institution_id) = institution_id {
        ensure_exists(&mut tx, "institution", institution_id).await?;
    }

    let id = sqlx::query(
        "INSERT INTO person (name, public, institution_id, admin) VALUES (?, ?, ?, ?)",
    )
    .bind(name)
    .bind(public)
    .bind(institution_id)
    .bind(admin)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    tx.commit().await?;

    Ok(id)
}

pub async fn get_person(db: &SqlitePool, person_id: i64) -> Result<Person> {
    let row = sqlx::query("SELECT id, name, public, institution_id, admin FROM person WHERE id = ?")
        .bind(person_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| Error::NoSuchRecord(format!("person with id={}", person_id)))?;

    Ok(Person {
        id: row.get("id"),
        name: row.get("name"),
        public: row.get("public"),
        institution_id: row.get("institution_id"),
        admin: row.get("admin"),
    })
}

/// Email addresses of a person, primary address first
pub async fn search_email(db: &SqlitePool, person_id: i64) -> Result<ResultCollection<Email>> {
    let rows = sqlx::query(
        r#"
        SELECT id, person_id, address, "primary", verified, public FROM email
        WHERE person_id = ?
        ORDER BY "primary" DESC, address
        "#,
    )
    .bind(person_id)
    .fetch_all(db)
    .await?;

    Ok(rows
        .iter()
        .map(|row| {
            let id: i64 = row.get("id");
            let record = Email {
                id: Some(id),
                person_id: row.get("person_id"),
                address: row.get("address"),
                primary: row.get("primary"),
                verified: row.get("verified"),
                public: row.get("public"),
            };
            (id, record)
        })
        .collect())
}

/// Replace a person's email addresses.
///
/// Verification status is never taken from the records: changing an
/// address marks it unverified.
pub async fn sync_person_email(
    db: &SqlitePool,
    person_id: i64,
    records: &ResultCollection<Email>,
) -> Result<SyncCounts> {
    records.validate()?;

    let mut tx = db.begin().await?;
    ensure_exists(&mut tx, "person", person_id).await?;

    let counts = sync_records(
        &mut tx,
        &EMAIL,
        &SyncKey::single("person_id", person_id),
        records,
        &SyncOptions::new()
            .update_columns(&["address", "primary", "public"])
            .verified_columns(&["address"])
            .unique_columns(&["address"]),
    )
    .await?;

    tx.commit().await?;

    Ok(counts)
}

/// Mark one of a person's addresses as verified
pub async fn set_email_verified(db: &SqlitePool, person_id: i64, address: &str) -> Result<()> {
    let result = sqlx::query("UPDATE email SET verified = 1 WHERE person_id = ? AND address = ?")
        .bind(person_id)
        .bind(address)
        .execute(db)
        .await?;

    if result.rows_affected() != 1 {
        return Err(Error::consistency(format!(
            "no address {} for person {}",
            address, person_id
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_database;

    fn email(address: &str, primary: bool) -> Email {
        Email {
            id: None,
            person_id: 0,
            address: address.to_string(),
            primary,
            verified: false,
            public: false,
        }
    }

    #[tokio::test]
    async fn test_person_requires_existing_institution() {
        let db = init_memory_database().await.unwrap();

        assert!(add_person(&db, "Someone", false, Some(5), false).await.is_err());

        let institution_id = add_institution(&db, "Observatory", "", "", "US").await.unwrap();
        let person_id = add_person(&db, "Someone", true, Some(institution_id), false).await.unwrap();

        let person = get_person(&db, person_id).await.unwrap();
        assert_eq!(person.institution_id, Some(institution_id));
        assert!(person.public);
        assert_eq!(get_institution(&db, institution_id).await.unwrap().country, "US");
    }

    #[tokio::test]
    async fn test_changed_address_loses_verification() {
        let db = init_memory_database().await.unwrap();
        let person_id = add_person(&db, "Someone", false, None, false).await.unwrap();

        let records = ResultCollection::from_values([email("a@example.org", true), email("b@example.org", false)]);
        let counts = sync_person_email(&db, person_id, &records).await.unwrap();
        assert_eq!(counts.as_tuple(), (2, 0, 0));

        set_email_verified(&db, person_id, "a@example.org").await.unwrap();
        set_email_verified(&db, person_id, "b@example.org").await.unwrap();

        // Swapping the primary flag keeps verification, editing an address
        // does not.
        let mut stored = search_email(&db, person_id).await.unwrap();
        for record in stored.values_mut() {
            record.primary = !record.primary;
            if record.address == "a@example.org" {
                record.address = "c@example.org".to_string();
            }
        }
        let counts = sync_person_email(&db, person_id, &stored).await.unwrap();
        assert_eq!(counts.as_tuple(), (0, 2, 0));

        let stored = search_email(&db, person_id).await.unwrap();
        assert_eq!(stored.get_primary().unwrap().address, "b@example.org");
        assert!(stored.get_primary().unwrap().verified);
        assert!(stored.values().any(|e| e.address == "c@example.org" && !e.verified));
    }

    #[tokio::test]
    async fn test_invalid_email_set_rejected() {
        let db = init_memory_database().await.unwrap();
        let person_id = add_person(&db, "Someone", false, None, false).await.unwrap();

        let records = ResultCollection::from_values([email("a@example.org", false)]);
        let err = sync_person_email(&db, person_id, &records).await.unwrap_err();
        assert_eq!(err.to_string(), "There is no primary address.");

        let records = ResultCollection::from_values([email("a@example.org", true)]);
        let err = sync_person_email(&db, person_id + 1, &records).await.unwrap_err();
        assert!(matches!(err, Error::Consistency(_)));
    }
}
