//! SQLite store.
//!
//! One table per entity kind, created from the schema registry when the
//! store opens. Dates and timestamps are stored as ISO text. Each insert
//! call runs in its own transaction: a failed table rolls back alone and
//! leaves the tables written before it committed.

use std::path::Path;
use std::time::{Duration, Instant};

use omop_model::value::DATE_FORMAT;
use omop_model::{EntityKind, FieldRole, LOAD_ORDER, TableSchema, TableShapeError, Value};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, params_from_iter};

use super::{Probe, Store};
use crate::error::StoreError;

/// Bound parameters per probe query, under SQLite's default limit.
pub const MAX_PROBE_PARAMETERS: usize = 900;

/// Stored timestamps keep sub-second precision when present.
const STORED_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (or creates) a database file and ensures every entity table.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let started = Instant::now();
        let conn = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let store = Self::bootstrap(conn).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(
            path = %path.display(),
            duration_ms = started.elapsed().as_millis() as u64,
            "opened sqlite store"
        );
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|source| StoreError::Open {
            path: ":memory:".into(),
            source,
        })?;
        Self::bootstrap(conn).map_err(|source| StoreError::Open {
            path: ":memory:".into(),
            source,
        })
    }

    fn bootstrap(conn: Connection) -> rusqlite::Result<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        for kind in LOAD_ORDER {
            conn.execute_batch(&create_table_sql(kind.schema()))?;
        }
        Ok(Self { conn })
    }

    /// Number of rows currently in a table.
    pub fn count(&self, kind: EntityKind) -> Result<usize, StoreError> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote(kind.table_name()));
        let count: i64 = self
            .conn
            .query_row(&sql, [], |row| row.get(0))
            .map_err(|source| sql_error(kind, source))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    fn select(
        &self,
        schema: &'static TableSchema,
        filter: Option<(&'static str, &[Value])>,
    ) -> Result<Vec<Vec<Value>>, StoreError> {
        let kind = schema.kind;
        let columns: Vec<String> = schema.fields.iter().map(|f| quote(f.name)).collect();
        let mut sql = format!(
            "SELECT {} FROM {}",
            columns.join(", "),
            quote(kind.table_name())
        );
        let params: Vec<SqlValue> = match filter {
            Some((column, values)) => {
                let placeholders = vec!["?"; values.len()].join(", ");
                sql.push_str(&format!(" WHERE {} IN ({placeholders})", quote(column)));
                values.iter().map(to_sql).collect()
            }
            None => Vec::new(),
        };

        let mut stmt = self.conn.prepare(&sql).map_err(|source| sql_error(kind, source))?;
        let raw_rows = stmt
            .query_map(params_from_iter(params), |row| {
                (0..schema.width())
                    .map(|idx| row.get_ref(idx).map(from_sql))
                    .collect::<rusqlite::Result<Vec<Value>>>()
            })
            .map_err(|source| sql_error(kind, source))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|source| sql_error(kind, source))?;

        raw_rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .zip(schema.fields)
                    .map(|(value, field)| {
                        value.coerce(field.ty).map_err(|source| StoreError::InvalidValue {
                            table: kind.table_name(),
                            column: field.name,
                            source,
                        })
                    })
                    .collect()
            })
            .collect()
    }
}

impl Store for SqliteStore {
    fn read_existing(
        &mut self,
        kind: EntityKind,
        probe: Option<&Probe>,
    ) -> Result<Vec<Vec<Value>>, StoreError> {
        let schema = kind.schema();
        let Some(probe) = probe else {
            return self.select(schema, None);
        };
        if schema.field(probe.column).is_none() {
            return Err(StoreError::UnknownColumn {
                table: kind.table_name(),
                column: probe.column,
            });
        }
        let mut rows = Vec::new();
        for chunk in probe.values.chunks(MAX_PROBE_PARAMETERS) {
            rows.extend(self.select(schema, Some((probe.column, chunk)))?);
        }
        tracing::debug!(
            table = kind.table_name(),
            probe = probe.column,
            values = probe.values.len(),
            rows = rows.len(),
            "probed existing rows"
        );
        Ok(rows)
    }

    fn max_id(&mut self, kind: EntityKind, column: &'static str) -> Result<i64, StoreError> {
        if kind.schema().field(column).is_none() {
            return Err(StoreError::UnknownColumn {
                table: kind.table_name(),
                column,
            });
        }
        let sql = format!(
            "SELECT COALESCE(MAX({}), 0) FROM {}",
            quote(column),
            quote(kind.table_name())
        );
        self.conn
            .query_row(&sql, [], |row| row.get(0))
            .map_err(|source| sql_error(kind, source))
    }

    fn insert(&mut self, kind: EntityKind, rows: &[Vec<Value>]) -> Result<usize, StoreError> {
        let schema = kind.schema();
        if let Some((row, found)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != schema.width())
            .map(|(idx, row)| (idx, row.len()))
        {
            return Err(TableShapeError {
                table: kind.table_name(),
                row,
                expected: schema.width(),
                found,
            }
            .into());
        }
        if rows.is_empty() {
            return Ok(0);
        }

        let columns: Vec<String> = schema.fields.iter().map(|f| quote(f.name)).collect();
        let placeholders: Vec<String> = (1..=schema.width()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote(kind.table_name()),
            columns.join(", "),
            placeholders.join(", ")
        );

        let tx = self
            .conn
            .transaction()
            .map_err(|source| sql_error(kind, source))?;
        {
            let mut stmt = tx.prepare(&sql).map_err(|source| sql_error(kind, source))?;
            for row in rows {
                stmt.execute(params_from_iter(row.iter().map(to_sql)))
                    .map_err(|source| sql_error(kind, source))?;
            }
        }
        tx.commit().map_err(|source| sql_error(kind, source))?;
        Ok(rows.len())
    }
}

fn sql_error(kind: EntityKind, source: rusqlite::Error) -> StoreError {
    StoreError::Sqlite {
        table: kind.table_name(),
        source,
    }
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn create_table_sql(schema: &TableSchema) -> String {
    let columns: Vec<String> = schema
        .fields
        .iter()
        .map(|field| {
            let mut column = format!("{} {}", quote(field.name), field.ty.sql_type());
            if field.role == FieldRole::PrimaryKey {
                column.push_str(" PRIMARY KEY");
            }
            column
        })
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({});",
        quote(schema.kind.table_name()),
        columns.join(", ")
    )
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(v) => SqlValue::Integer(*v),
        Value::Float(v) if v.is_nan() => SqlValue::Null,
        Value::Float(v) => SqlValue::Real(*v),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Date(d) => SqlValue::Text(d.format(DATE_FORMAT).to_string()),
        Value::DateTime(dt) => SqlValue::Text(dt.format(STORED_DATETIME_FORMAT).to_string()),
    }
}

fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Integer(v),
        ValueRef::Real(v) => Value::Float(v),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn vocabulary_row(id: &str) -> Vec<Value> {
        vec![
            Value::text(id),
            Value::text("name"),
            Value::Null,
            Value::text("1"),
            Value::Integer(0),
        ]
    }

    #[test]
    fn creates_one_table_per_entity() {
        let store = SqliteStore::open_in_memory().unwrap();
        for kind in LOAD_ORDER {
            assert_eq!(store.count(kind).unwrap(), 0);
        }
        assert!(create_table_sql(EntityKind::Person.schema())
            .contains("\"person_id\" INTEGER PRIMARY KEY"));
    }

    #[test]
    fn rows_read_back_in_schema_types() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let start = day.and_hms_opt(8, 0, 0).unwrap();
        let row = vec![
            Value::Integer(1),
            Value::Integer(1),
            Value::Integer(4230911),
            Value::Date(day),
            Value::DateTime(start),
            Value::Date(day),
            Value::DateTime(start),
            Value::Integer(32817),
            Value::Integer(1),
            Value::text("ptb/s0001"),
        ];
        store.insert(EntityKind::ProcedureOccurrence, &[row.clone()]).unwrap();
        let rows = store.read_existing(EntityKind::ProcedureOccurrence, None).unwrap();
        assert_eq!(rows, vec![row]);
        assert_eq!(
            store.max_id(EntityKind::ProcedureOccurrence, "procedure_occurrence_id").unwrap(),
            1
        );
    }

    #[test]
    fn probes_are_chunked() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let rows: Vec<Vec<Value>> = (0..1000).map(|i| vocabulary_row(&format!("V{i}"))).collect();
        store.insert(EntityKind::Vocabulary, &rows).unwrap();

        let values: Vec<Value> = (0..2000).map(|i| Value::text(format!("V{}", i * 2))).collect();
        let probe = Probe {
            column: "vocabulary_id",
            values,
        };
        let found = store.read_existing(EntityKind::Vocabulary, Some(&probe)).unwrap();
        assert_eq!(found.len(), 500);
    }

    #[test]
    fn empty_tables_report_zero_max_id() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.max_id(EntityKind::Person, "person_id").unwrap(), 0);
        assert!(matches!(
            store.max_id(EntityKind::Person, "visit_id"),
            Err(StoreError::UnknownColumn { .. })
        ));
    }
}
