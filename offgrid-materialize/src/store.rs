//! The storage collaborator interface and a SQLite reference adapter.

use crate::error::{MaterializeError, MaterializeResult};
use offgrid_types::CellValue;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// The embedded relational storage engine, as the core sees it.
///
/// Schema DDL is managed externally; the core only executes and queries.
/// Implementations must be transactional per call.
pub trait RelationalStore: Send + Sync {
    /// Executes a statement, returning the number of affected rows.
    fn execute(&self, statement: &str, params: &[CellValue]) -> MaterializeResult<usize>;

    /// Runs a query, returning rows of cell values.
    fn query(&self, statement: &str, params: &[CellValue])
        -> MaterializeResult<Vec<Vec<CellValue>>>;
}

/// SQLite-backed [`RelationalStore`].
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens (or creates) a database at the given path.
    pub fn open(path: &Path) -> MaterializeResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| MaterializeError::Storage(format!("failed to open database: {e}")))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens an in-memory database (for testing).
    pub fn open_in_memory() -> MaterializeResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| MaterializeError::Storage(format!("failed to open database: {e}")))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

fn to_sql(value: &CellValue) -> rusqlite::types::Value {
    use rusqlite::types::Value;
    match value {
        CellValue::Absent => Value::Null,
        CellValue::Integer(i) => Value::Integer(*i),
        CellValue::Real(r) => Value::Real(*r),
        CellValue::Text(s) => Value::Text(s.clone()),
        CellValue::Blob(b) => Value::Blob(b.clone()),
    }
}

fn from_sql(value: ValueRef<'_>) -> MaterializeResult<CellValue> {
    Ok(match value {
        ValueRef::Null => CellValue::Absent,
        ValueRef::Integer(i) => CellValue::Integer(i),
        ValueRef::Real(r) => CellValue::Real(r),
        ValueRef::Text(t) => CellValue::Text(
            std::str::from_utf8(t)
                .map_err(|e| MaterializeError::Storage(format!("non-utf8 text column: {e}")))?
                .to_string(),
        ),
        ValueRef::Blob(b) => CellValue::Blob(b.to_vec()),
    })
}

impl RelationalStore for SqliteStore {
    fn execute(&self, statement: &str, params: &[CellValue]) -> MaterializeResult<usize> {
        let conn = self.conn.lock().unwrap();
        let affected = conn.execute(
            statement,
            rusqlite::params_from_iter(params.iter().map(to_sql)),
        )?;
        Ok(affected)
    }

    fn query(
        &self,
        statement: &str,
        params: &[CellValue],
    ) -> MaterializeResult<Vec<Vec<CellValue>>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(statement)?;
        let column_count = stmt.column_count();

        let mut rows = stmt.query(rusqlite::params_from_iter(params.iter().map(to_sql)))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut cells = Vec::with_capacity(column_count);
            for i in 0..column_count {
                cells.push(from_sql(row.get_ref(i)?)?);
            }
            out.push(cells);
        }
        Ok(out)
    }
}
