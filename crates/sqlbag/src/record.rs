//! Row and record helpers: table naming, printable rows, change sets and
//! table listings.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::any::AnyRow;
use sqlx::{AnyConnection, Column, Row};

use crate::error::{SqlbagError, SqlbagResult};
use crate::url::Dialect;

/// Convert a CamelCase type name to a snake_case table name.
///
/// `BookAuthor` becomes `book_author`; every upper-case letter after the first
/// character starts a new word.
pub fn table_name(type_name: &str) -> String {
    let mut chars = type_name.chars();
    let mut out = String::with_capacity(type_name.len() + 4);
    if let Some(first) = chars.next() {
        out.extend(first.to_lowercase());
    }
    for c in chars {
        if c.is_uppercase() {
            out.push('_');
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// [`table_name`] of a Rust type's own name (module path and generics
/// stripped).
pub fn table_name_of<T: ?Sized>() -> String {
    table_name(short_type_name::<T>())
}

fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// An ordered set of column values with a type name, printable as
/// `Name(col=value, ...)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    name: String,
    values: Map<String, Value>,
}

impl Record {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Map::new(),
        }
    }

    /// Add a column, keeping insertion order.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(column.into(), value.into());
        self
    }

    /// Build a record from a fetched row.
    ///
    /// Values are decoded as integer, float, boolean, text or bytes, in that
    /// order; anything else (and SQL `NULL`) becomes `null`.
    pub fn from_row(name: impl Into<String>, row: &AnyRow) -> Self {
        let mut values = Map::new();
        for (i, column) in row.columns().iter().enumerate() {
            values.insert(column.name().to_owned(), decode_value(row, i));
        }
        Self {
            name: name.into(),
            values,
        }
    }

    /// Build a record from any struct that serializes to a JSON object,
    /// named after the struct's type.
    pub fn from_serialize<T: Serialize>(value: &T) -> SqlbagResult<Self> {
        match serde_json::to_value(value)? {
            Value::Object(values) => Ok(Self {
                name: short_type_name::<T>().to_owned(),
                values,
            }),
            other => Err(SqlbagError::Config(format!(
                "{} does not serialize to an object: {other}",
                short_type_name::<T>()
            ))),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    /// Column names, in order.
    pub fn properties(&self) -> Vec<&str> {
        self.values.keys().map(String::as_str).collect()
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, (column, value)) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{column}={value}")?;
        }
        f.write_str(")")
    }
}

fn decode_value(row: &AnyRow, index: usize) -> Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return v.map_or(Value::Null, Value::from);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
        return v.map_or(Value::Null, Value::from);
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(index) {
        return v.map_or(Value::Null, Value::from);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return v.map_or(Value::Null, Value::from);
    }
    if let Ok(Some(bytes)) = row.try_get::<Option<Vec<u8>>, _>(index) {
        return Value::from(bytes);
    }
    Value::Null
}

/// Columns whose values differ between `before` and `after`, as
/// `{column: [old, new]}`.
///
/// A column present on one side only pairs with `null` on the other.
pub fn changes(before: &Record, after: &Record) -> Map<String, Value> {
    let mut out = Map::new();
    for (column, old) in &before.values {
        let new = after.values.get(column).unwrap_or(&Value::Null);
        if old != new {
            out.insert(column.clone(), Value::Array(vec![old.clone(), new.clone()]));
        }
    }
    for (column, new) in &after.values {
        if !before.values.contains_key(column) && !new.is_null() {
            out.insert(column.clone(), Value::Array(vec![Value::Null, new.clone()]));
        }
    }
    out
}

/// Names of the tables in the current database, sorted.
pub async fn list_tables(conn: &mut AnyConnection, dialect: Dialect) -> SqlbagResult<Vec<String>> {
    let sql = match dialect {
        Dialect::Postgres => {
            "SELECT tablename::text FROM pg_catalog.pg_tables \
             WHERE schemaname = current_schema() ORDER BY tablename"
        }
        Dialect::MySql => {
            "SELECT CAST(table_name AS CHAR) FROM information_schema.tables \
             WHERE table_schema = DATABASE() AND table_type = 'BASE TABLE' ORDER BY table_name"
        }
        Dialect::Sqlite => {
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name"
        }
    };

    let rows = sqlx::query(sql).fetch_all(&mut *conn).await?;
    rows.iter()
        .map(|row| row.try_get::<String, _>(0).map_err(SqlbagError::from))
        .collect()
}

/// Whether a table called `name` exists in the current database.
pub async fn table_exists(
    conn: &mut AnyConnection,
    dialect: Dialect,
    name: &str,
) -> SqlbagResult<bool> {
    Ok(list_tables(conn, dialect).await?.iter().any(|t| t == name))
}

// ── tests ────────────────────────────────────────────────────────────
