//! Dynamically typed column values used by the reconciliation engine

use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Row, Sqlite, ValueRef};

/// A single SQLite column value
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Value equality as SQLite sees it: integers and reals compare
    /// numerically.
    pub fn same_as(&self, other: &SqlValue) -> bool {
        match (self, other) {
            (SqlValue::Integer(a), SqlValue::Real(b)) | (SqlValue::Real(b), SqlValue::Integer(a)) => {
                (*a as f64) == *b
            }
            _ => self == other,
        }
    }

    /// Hashable representation for uniqueness checks, `None` for NULL
    /// (NULLs never collide under a UNIQUE constraint).
    pub(crate) fn unique_token(&self) -> Option<String> {
        match self {
            SqlValue::Null => None,
            SqlValue::Integer(i) => Some(format!("n:{}", *i as f64)),
            SqlValue::Real(r) => Some(format!("n:{}", r)),
            SqlValue::Text(s) => Some(format!("t:{}", s)),
        }
    }

    /// Read column `index` of a row
    pub fn from_row(row: &SqliteRow, index: usize) -> SqlValue {
        match row.try_get_raw(index) {
            Ok(raw) if raw.is_null() => SqlValue::Null,
            Ok(_) => row
                .try_get::<i64, _>(index)
                .map(SqlValue::Integer)
                .or_else(|_| row.try_get::<f64, _>(index).map(SqlValue::Real))
                .or_else(|_| row.try_get::<String, _>(index).map(SqlValue::Text))
                .unwrap_or(SqlValue::Null),
            Err(_) => SqlValue::Null,
        }
    }

    pub(crate) fn bind<'q>(
        &self,
        query: Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> Query<'q, Sqlite, SqliteArguments<'q>> {
        match self {
            SqlValue::Null => query.bind(None::<i64>),
            SqlValue::Integer(i) => query.bind(*i),
            SqlValue::Real(r) => query.bind(*r),
            SqlValue::Text(s) => query.bind(s.clone()),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Integer(v as i64)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Real(v)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}
