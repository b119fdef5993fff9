mod downloads;
mod sessions;
mod users;
mod videos;

use std::str::FromStr;

use rusqlite::types::{Type, Value};
use rusqlite::{ErrorCode, Row};

use crate::{DbError, Result};
use reel_types::models::UnknownVariant;

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Read a TEXT column holding one of the string enums from reel-types.
pub(crate) fn get_enum<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = UnknownVariant>,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e: UnknownVariant| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Turn CHECK / FOREIGN KEY failures into `DbError::Invalid` with a readable message.
pub(crate) fn constraint_as_invalid(err: rusqlite::Error, what: &str) -> DbError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation => {
            DbError::Invalid(what.to_string())
        }
        _ => err.into(),
    }
}

/// `column = ?N` pairs for a partial UPDATE.
#[derive(Default)]
pub(crate) struct Assignments {
    columns: Vec<&'static str>,
    values: Vec<Value>,
}

impl Assignments {
    pub fn push(&mut self, column: &'static str, value: impl Into<Value>) {
        self.columns.push(column);
        self.values.push(value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Builds `UPDATE {table} SET ... WHERE {key} = ?N` with the key bound last.
    pub fn into_update(self, table: &str, key: &str, key_value: impl Into<Value>) -> (String, Vec<Value>) {
        let set = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, col)| format!("{} = ?{}", col, i + 1))
            .collect::<Vec<_>>()
            .join(", ");

        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?{}",
            table,
            set,
            key,
            self.columns.len() + 1
        );

        let mut values = self.values;
        values.push(key_value.into());
        (sql, values)
    }
}
