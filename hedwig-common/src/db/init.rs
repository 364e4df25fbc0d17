//! Database initialization
//!
//! Opens (creating if necessary) the SQLite database and creates any
//! missing tables. Table creation is idempotent, so this runs on every
//! startup.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

const BUSY_TIMEOUT_MS: u64 = 5000;

/// Open the database file and make sure the schema exists
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    init_schema(&pool).await?;

    Ok(pool)
}

/// In-memory database with the full schema.
///
/// Limited to a single connection: every connection to `sqlite::memory:`
/// would otherwise see its own empty database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    init_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables which do not exist yet
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }

    Ok(())
}

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS settings (
        key TEXT PRIMARY KEY,
        value TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS facility (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        code TEXT NOT NULL UNIQUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS queue (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        facility_id INTEGER NOT NULL REFERENCES facility (id),
        name TEXT NOT NULL,
        code TEXT NOT NULL,
        UNIQUE (facility_id, name),
        UNIQUE (facility_id, code)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS affiliation (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        queue_id INTEGER NOT NULL REFERENCES queue (id),
        name TEXT NOT NULL,
        hidden INTEGER NOT NULL DEFAULT 0,
        UNIQUE (queue_id, name)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS semester (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        facility_id INTEGER NOT NULL REFERENCES facility (id),
        name TEXT NOT NULL,
        code TEXT NOT NULL,
        date_start TIMESTAMP NOT NULL,
        date_end TIMESTAMP NOT NULL,
        UNIQUE (facility_id, name),
        UNIQUE (facility_id, code)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS call (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        semester_id INTEGER NOT NULL REFERENCES semester (id),
        queue_id INTEGER NOT NULL REFERENCES queue (id),
        date_open TIMESTAMP NOT NULL,
        date_close TIMESTAMP NOT NULL,
        UNIQUE (semester_id, queue_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS category (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        facility_id INTEGER NOT NULL REFERENCES facility (id),
        name TEXT NOT NULL,
        hidden INTEGER NOT NULL DEFAULT 0,
        UNIQUE (facility_id, name)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS institution (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        organization TEXT NOT NULL DEFAULT '',
        address TEXT NOT NULL DEFAULT '',
        country TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS person (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        public INTEGER NOT NULL DEFAULT 0,
        institution_id INTEGER REFERENCES institution (id),
        admin INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS email (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        person_id INTEGER NOT NULL REFERENCES person (id) ON DELETE CASCADE,
        address TEXT NOT NULL,
        "primary" INTEGER NOT NULL DEFAULT 0,
        verified INTEGER NOT NULL DEFAULT 0,
        public INTEGER NOT NULL DEFAULT 0,
        UNIQUE (person_id, address)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS proposal (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        call_id INTEGER NOT NULL REFERENCES call (id),
        number INTEGER NOT NULL,
        state INTEGER NOT NULL,
        title TEXT NOT NULL,
        UNIQUE (call_id, number)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS member (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        proposal_id INTEGER NOT NULL REFERENCES proposal (id) ON DELETE CASCADE,
        sort_order INTEGER,
        person_id INTEGER NOT NULL REFERENCES person (id),
        pi INTEGER NOT NULL DEFAULT 0,
        editor INTEGER NOT NULL DEFAULT 0,
        observer INTEGER NOT NULL DEFAULT 0,
        student INTEGER NOT NULL DEFAULT 0,
        affiliation_id INTEGER NOT NULL REFERENCES affiliation (id),
        institution_id INTEGER REFERENCES institution (id),
        UNIQUE (proposal_id, person_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS proposal_category (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        proposal_id INTEGER NOT NULL REFERENCES proposal (id) ON DELETE CASCADE,
        category_id INTEGER NOT NULL REFERENCES category (id),
        UNIQUE (proposal_id, category_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS target (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        proposal_id INTEGER NOT NULL REFERENCES proposal (id) ON DELETE CASCADE,
        sort_order INTEGER,
        name TEXT NOT NULL,
        system INTEGER,
        x REAL,
        y REAL,
        time REAL,
        priority INTEGER
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS reviewer (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        proposal_id INTEGER NOT NULL REFERENCES proposal (id) ON DELETE CASCADE,
        person_id INTEGER NOT NULL REFERENCES person (id),
        role INTEGER NOT NULL,
        UNIQUE (proposal_id, person_id, role)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS review (
        reviewer_id INTEGER PRIMARY KEY REFERENCES reviewer (id) ON DELETE CASCADE,
        text TEXT,
        assessment INTEGER,
        rating INTEGER,
        weight INTEGER,
        edited TIMESTAMP NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS group_member (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        queue_id INTEGER NOT NULL REFERENCES queue (id),
        group_type INTEGER NOT NULL,
        person_id INTEGER NOT NULL REFERENCES person (id),
        UNIQUE (queue_id, group_type, person_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS jcmt_available (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        call_id INTEGER NOT NULL REFERENCES call (id),
        weather INTEGER NOT NULL,
        time REAL NOT NULL,
        UNIQUE (call_id, weather)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS jcmt_request (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        proposal_id INTEGER NOT NULL REFERENCES proposal (id) ON DELETE CASCADE,
        instrument INTEGER NOT NULL,
        weather INTEGER NOT NULL,
        time REAL NOT NULL,
        UNIQUE (proposal_id, instrument, weather)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS jcmt_allocation (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        proposal_id INTEGER NOT NULL REFERENCES proposal (id) ON DELETE CASCADE,
        instrument INTEGER NOT NULL,
        weather INTEGER NOT NULL,
        time REAL NOT NULL,
        UNIQUE (proposal_id, instrument, weather)
    )
    "#,
];
