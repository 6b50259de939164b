use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Connection, Row, ToSql};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};

/// Core value types for SQLite operations
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    /// Stored as 0/1; SQLite has no boolean storage class.
    Boolean(bool),
}

impl Value {
    /// Name of the storage class, used in decode errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Text(_) => "text",
            Value::Blob(_) => "blob",
            Value::Boolean(_) => "boolean",
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Real(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Blob(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(f) => Value::Real(f),
            // TEXT that is not valid UTF-8 is kept byte for byte as a blob.
            ValueRef::Text(t) => match std::str::from_utf8(t) {
                Ok(text) => Value::Text(text.to_string()),
                Err(_) => Value::Blob(t.to_vec()),
            },
            ValueRef::Blob(b) => Value::Blob(b.to_vec()),
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(rusqlite::types::Value::Null),
            Value::Integer(i) => ToSqlOutput::from(*i),
            Value::Real(f) => ToSqlOutput::from(*f),
            Value::Text(s) => ToSqlOutput::from(s.as_str()),
            Value::Blob(b) => ToSqlOutput::from(b.as_slice()),
            Value::Boolean(b) => ToSqlOutput::from(*b),
        })
    }
}

/// Positional parameter bindings, bound to `?1`, `?2`, ... in order.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Params {
    pub values: Vec<Value>,
}

impl Params {
    /// Create an empty parameter list
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the next positional value
    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.values.push(value.into());
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn iter(&self) -> impl Iterator<Item = &Value> {
        self.values.iter()
    }
}

impl From<Vec<Value>> for Params {
    fn from(values: Vec<Value>) -> Self {
        Self { values }
    }
}

/// SQL statement with its bound parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    pub statement: String,
    pub params: Params,
}

impl SqlQuery {
    pub fn new(statement: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            params: Params::new(),
        }
    }

    pub fn with_params(mut self, params: impl Into<Params>) -> Self {
        self.params = params.into();
        self
    }
}

/// A result row addressable by column name or position.
///
/// Columns keep the order of the result set. When a name appears more than
/// once, lookups by name return the first column with that name.
///
/// Typed records are decoded from this at the repository boundary; see
/// [`crate::repository::Entity::from_record`].
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Record {
    pub columns: Vec<String>,
    pub values: Vec<Value>,
}

impl Record {
    fn from_row(columns: &[String], row: &Row<'_>) -> rusqlite::Result<Self> {
        let values = (0..columns.len())
            .map(|idx| row.get_ref(idx).map(Value::from))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Self {
            columns: columns.to_vec(),
            values,
        })
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|name| name == column)
            .and_then(|idx| self.values.get(idx))
    }

    /// Value at a zero-based column position.
    pub fn get_index(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn require(&self, column: &str) -> Result<&Value> {
        self.get(column).ok_or_else(|| Error::MissingColumn {
            column: column.to_string(),
        })
    }

    /// Non-null integer column.
    pub fn integer(&self, column: &str) -> Result<i64> {
        match self.require(column)? {
            Value::Integer(i) => Ok(*i),
            other => Err(unexpected(column, "integer", other)),
        }
    }

    pub fn optional_integer(&self, column: &str) -> Result<Option<i64>> {
        match self.require(column)? {
            Value::Null => Ok(None),
            Value::Integer(i) => Ok(Some(*i)),
            other => Err(unexpected(column, "integer", other)),
        }
    }

    /// Non-null text column. TEXT that was not valid UTF-8 arrives as
    /// [`Value::Blob`] and is reported as a type mismatch here.
    pub fn text(&self, column: &str) -> Result<String> {
        match self.require(column)? {
            Value::Text(s) => Ok(s.clone()),
            other => Err(unexpected(column, "text", other)),
        }
    }

    pub fn optional_text(&self, column: &str) -> Result<Option<String>> {
        match self.require(column)? {
            Value::Null => Ok(None),
            Value::Text(s) => Ok(Some(s.clone())),
            other => Err(unexpected(column, "text", other)),
        }
    }
}

fn unexpected(column: &str, expected: &'static str, found: &Value) -> Error {
    Error::UnexpectedType {
        column: column.to_string(),
        expected,
        found: found.type_name(),
    }
}

/// SQLite configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    /// Path to the SQLite database file, or `:memory:`
    pub db_path: String,
    /// Turn on `PRAGMA foreign_keys` for the connection. SQLite leaves it
    /// off by default, in which case references are declared only.
    pub enforce_foreign_keys: bool,
}

impl SqliteConfig {
    pub const IN_MEMORY: &'static str = ":memory:";

    /// Create a config pointing at a database file
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
            enforce_foreign_keys: false,
        }
    }

    /// Private in-memory database, discarded on close.
    pub fn in_memory() -> Self {
        Self::new(Self::IN_MEMORY)
    }

    pub fn with_foreign_keys(mut self, enforce: bool) -> Self {
        self.enforce_foreign_keys = enforce;
        self
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self::new("app.db")
    }
}

/// Outcome of a committed [`Database::run_batch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub statements: usize,
    pub rows_affected: usize,
}

/// Owner of the single connection to the database file.
///
/// The connection is opened on first use and closed either explicitly via
/// [`Database::close`] or when the `Database` is dropped. Single statements
/// run in autocommit mode, so each one is committed as soon as it returns.
#[derive(Debug)]
pub struct Database {
    config: SqliteConfig,
    connection: RefCell<Option<Connection>>,
}

impl Database {
    /// Create a manager for `config`; nothing is opened yet.
    pub fn new(config: SqliteConfig) -> Self {
        Self {
            config,
            connection: RefCell::new(None),
        }
    }

    pub fn config(&self) -> &SqliteConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.connection.borrow().is_some()
    }

    /// Open the connection if it is not live yet. Repeated calls are no-ops.
    pub fn open(&self) -> Result<()> {
        let mut slot = self.connection.borrow_mut();
        self.ensure_open(&mut slot)?;
        Ok(())
    }

    /// Release the connection. A no-op when nothing is open.
    ///
    /// If SQLite refuses to close, the connection stays live and the error
    /// is returned.
    pub fn close(&self) -> Result<()> {
        let taken = self.connection.borrow_mut().take();
        let Some(conn) = taken else {
            return Ok(());
        };
        match conn.close() {
            Ok(()) => {
                info!(path = %self.config.db_path, "closed sqlite connection");
                Ok(())
            }
            Err((conn, err)) => {
                *self.connection.borrow_mut() = Some(conn);
                Err(err.into())
            }
        }
    }

    /// Run one statement and return the number of rows it changed.
    pub fn execute(&self, query: &SqlQuery) -> Result<usize> {
        self.with_connection(|conn| Ok(run(conn, query)?))
    }

    /// First row of the result set, if any.
    pub fn fetch_one(&self, query: &SqlQuery) -> Result<Option<Record>> {
        self.with_connection(|conn| {
            trace!(statement = %query.statement, params = query.params.len(), "fetching one");
            let mut stmt = conn.prepare(&query.statement)?;
            let columns = column_names(&stmt);
            let mut rows = stmt.query(params_from_iter(query.params.iter()))?;
            let record = match rows.next()? {
                Some(row) => Some(Record::from_row(&columns, row)?),
                None => None,
            };
            Ok(record)
        })
    }

    pub fn fetch_all(&self, query: &SqlQuery) -> Result<Vec<Record>> {
        self.with_connection(|conn| {
            trace!(statement = %query.statement, params = query.params.len(), "fetching all");
            let mut stmt = conn.prepare(&query.statement)?;
            let columns = column_names(&stmt);
            let records = stmt
                .query_map(params_from_iter(query.params.iter()), |row| {
                    Record::from_row(&columns, row)
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(records)
        })
    }

    /// Rowid generated by the most recent successful insert on this connection.
    pub fn last_insert_rowid(&self) -> Result<i64> {
        self.with_connection(|conn| Ok(conn.last_insert_rowid()))
    }

    /// Run every statement inside a single transaction.
    ///
    /// Either all statements are committed together or, on the first
    /// failure, the whole transaction is rolled back and
    /// [`Error::BatchAborted`] names the failing statement. Nothing from the
    /// batch is visible after a failure.
    pub fn run_batch(&self, queries: &[SqlQuery]) -> Result<BatchReport> {
        self.with_connection(|conn| {
            let tx = conn.transaction()?;
            let mut rows_affected = 0;
            for (index, query) in queries.iter().enumerate() {
                match run(&tx, query) {
                    Ok(changed) => rows_affected += changed,
                    Err(source) => {
                        warn!(index, statement = %query.statement, error = %source, "batch statement failed, rolling back");
                        return Err(match tx.rollback() {
                            Ok(()) => Error::BatchAborted {
                                index,
                                statement: query.statement.clone(),
                                source,
                            },
                            Err(rollback) => Error::RollbackFailed {
                                index,
                                source,
                                rollback,
                            },
                        });
                    }
                }
            }
            tx.commit()?;
            debug!(statements = queries.len(), rows_affected, "batch committed");
            Ok(BatchReport {
                statements: queries.len(),
                rows_affected,
            })
        })
    }

    fn with_connection<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut slot = self.connection.borrow_mut();
        let conn = self.ensure_open(&mut slot)?;
        f(conn)
    }

    fn ensure_open<'a>(&self, slot: &'a mut Option<Connection>) -> Result<&'a mut Connection> {
        let conn = match slot.take() {
            Some(conn) => conn,
            None => self.connect()?,
        };
        Ok(slot.insert(conn))
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.config.db_path)?;
        conn.pragma_update(None, "foreign_keys", self.config.enforce_foreign_keys)?;
        info!(
            path = %self.config.db_path,
            foreign_keys = self.config.enforce_foreign_keys,
            "opened sqlite connection"
        );
        Ok(conn)
    }
}

/// Run one statement. Statements that return rows are stepped to completion
/// and report no changed rows.
fn run(conn: &Connection, query: &SqlQuery) -> rusqlite::Result<usize> {
    trace!(statement = %query.statement, params = query.params.len(), "executing");
    let mut stmt = conn.prepare(&query.statement)?;
    let params = params_from_iter(query.params.iter());
    if stmt.column_count() == 0 {
        return stmt.execute(params);
    }
    let mut rows = stmt.query(params)?;
    while rows.next()?.is_some() {}
    Ok(0)
}

fn column_names(stmt: &rusqlite::Statement<'_>) -> Vec<String> {
    stmt.column_names().into_iter().map(String::from).collect()
}
