use super::context::Context;
use super::errors::Error;

use std::fmt;

/// Opens connections for a backend.
pub trait DBTrait: Send + Sync {
    fn open(&mut self, name: String) -> Result<Connection, Error>;
}

/// Runs a statement that returns no rows.
pub trait Exec: Send + Sync {
    fn exec(&self, query: &str, params: &[DBValue]) -> Result<ExecResult, Error>;
}

/// Runs a statement that returns rows.
pub trait Query: Send + Sync {
    fn query(&self, query: &str, params: &[DBValue]) -> Result<Rows, Error>;
}

/// Runs a statement that returns rows, honouring cancellation and deadlines.
pub trait QueryContext: Send + Sync {
    fn query_context(&self, ctx: &Context, query: &str, params: &[DBValue])
        -> Result<Rows, Error>;
}

/// Runs a statement expected to return at most one row.
///
/// Errors may be deferred: a backend is free to return a handle right away
/// and only report the failure once [`DBRow::prefetch`] or [`DBRow::take`]
/// is called.
pub trait QueryRow: Send + Sync {
    fn query_row(&self, query: &str, params: &[DBValue]) -> RowHandle;
}

pub trait QueryRowContext: Send + Sync {
    fn query_row_context(&self, ctx: &Context, query: &str, params: &[DBValue]) -> RowHandle;
}

/// Compiles a reusable statement.
pub trait Prepare: Send + Sync {
    fn prepare(&self, query: &str) -> Result<Statement, Error>;

    /// The context covers preparation only, not later executions.
    fn prepare_context(&self, ctx: &Context, query: &str) -> Result<Statement, Error>;
}

/// A connection offering every capability.
pub trait DBConnection:
    Exec + Query + QueryContext + QueryRow + QueryRowContext + Prepare
{
    fn close(&mut self) -> Result<(), Error>;
}

pub trait DBStatement: Send + Sync {
    fn exec(&self, params: &[DBValue]) -> Result<ExecResult, Error>;
    fn exec_context(&self, ctx: &Context, params: &[DBValue]) -> Result<ExecResult, Error>;
    fn query(&self, params: &[DBValue]) -> Result<Rows, Error>;
    fn query_context(&self, ctx: &Context, params: &[DBValue]) -> Result<Rows, Error>;
    fn query_row(&self, params: &[DBValue]) -> RowHandle;
    fn query_row_context(&self, ctx: &Context, params: &[DBValue]) -> RowHandle;
    fn number_parameters(&self) -> Result<u32, Error>;
    fn close(&mut self) -> Result<(), Error>;
}

pub trait DBRows: Send + Sync {
    fn columns(&self) -> Vec<String>;
    /// `Ok(None)` once the result set is exhausted.
    fn next(&mut self) -> Result<Option<Row>, Error>;
    fn close(&mut self) -> Result<(), Error>;
}

pub trait DBRow: Send + Sync {
    fn columns(&self) -> Vec<String>;
    /// Fetch the pending row without handing it out. A deferred error is
    /// returned here, and the handle is spent afterwards.
    fn prefetch(&mut self) -> Result<(), Error>;
    /// Hand out the row, fetching it first if needed.
    fn take(&mut self) -> Result<Row, Error>;
}

/// A backend-defined DB Connection
pub struct Connection(Box<dyn DBConnection>);
impl From<Box<dyn DBConnection>> for Connection {
    fn from(value: Box<dyn DBConnection>) -> Self {
        Self(value)
    }
}
impl std::ops::Deref for Connection {
    type Target = dyn DBConnection;
    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}
impl std::ops::DerefMut for Connection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0.as_mut()
    }
}

/// A backend-defined prepared statement
pub struct Statement(Box<dyn DBStatement>);
impl From<Box<dyn DBStatement>> for Statement {
    fn from(value: Box<dyn DBStatement>) -> Self {
        Self(value)
    }
}
impl std::ops::Deref for Statement {
    type Target = dyn DBStatement;
    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}
impl std::ops::DerefMut for Statement {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0.as_mut()
    }
}

pub struct Rows(Box<dyn DBRows>);
impl From<Box<dyn DBRows>> for Rows {
    fn from(value: Box<dyn DBRows>) -> Self {
        Self(value)
    }
}
impl std::ops::Deref for Rows {
    type Target = dyn DBRows;
    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}
impl std::ops::DerefMut for Rows {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0.as_mut()
    }
}

/// A backend-defined single-row result
pub struct RowHandle(Box<dyn DBRow>);
impl From<Box<dyn DBRow>> for RowHandle {
    fn from(value: Box<dyn DBRow>) -> Self {
        Self(value)
    }
}
impl std::ops::Deref for RowHandle {
    type Target = dyn DBRow;
    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}
impl std::ops::DerefMut for RowHandle {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0.as_mut()
    }
}

/// Outcome of a statement that returns no rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub rows_affected: u64,
    pub last_insert_id: Option<i64>,
}

/// A single row of DB values.
#[derive(Debug, Clone, PartialEq)]
pub struct Row(pub Vec<DBValue>);

impl Row {
    pub fn get(&self, index: usize) -> Option<&DBValue> {
        self.0.get(index)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Database value types
#[derive(Debug, Clone, PartialEq)]
pub enum DBValue {
    Int32(i32),
    Int64(i64),
    Uint32(u32),
    Uint64(u64),
    Float(f64),
    Double(f64),
    Str(String),
    Boolean(bool),
    Date(String),
    Time(String),
    Timestamp(String),
    Binary(Vec<u8>),
    Null,
}

impl DBValue {
    /// Check if the value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, DBValue::Null)
    }

    /// Get the type name as a string
    pub fn type_name(&self) -> &'static str {
        match self {
            DBValue::Int32(_) => "int32",
            DBValue::Int64(_) => "int64",
            DBValue::Uint32(_) => "uint32",
            DBValue::Uint64(_) => "uint64",
            DBValue::Float(_) => "float",
            DBValue::Double(_) => "double",
            DBValue::Str(_) => "str",
            DBValue::Boolean(_) => "boolean",
            DBValue::Date(_) => "date",
            DBValue::Time(_) => "time",
            DBValue::Timestamp(_) => "timestamp",
            DBValue::Binary(_) => "binary",
            DBValue::Null => "null",
        }
    }
}

impl fmt::Display for DBValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DBValue::Int32(i) => write!(f, "{}", i),
            DBValue::Int64(i) => write!(f, "{}", i),
            DBValue::Uint32(i) => write!(f, "{}", i),
            DBValue::Uint64(i) => write!(f, "{}", i),
            DBValue::Float(v) => write!(f, "{}", v),
            DBValue::Double(v) => write!(f, "{}", v),
            DBValue::Str(s) => write!(f, "{}", s),
            DBValue::Boolean(b) => write!(f, "{}", b),
            DBValue::Date(s) => write!(f, "{}", s),
            DBValue::Time(s) => write!(f, "{}", s),
            DBValue::Timestamp(s) => write!(f, "{}", s),
            DBValue::Binary(b) => write!(f, "\\x{}", bytes_to_hex(b)),
            DBValue::Null => write!(f, "NULL"),
        }
    }
}

fn bytes_to_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<String>()
}

impl From<bool> for DBValue {
    fn from(value: bool) -> Self {
        DBValue::Boolean(value)
    }
}

impl From<i16> for DBValue {
    fn from(value: i16) -> Self {
        DBValue::Int32(value as i32)
    }
}

impl From<i32> for DBValue {
    fn from(value: i32) -> Self {
        DBValue::Int32(value)
    }
}

impl From<i64> for DBValue {
    fn from(value: i64) -> Self {
        DBValue::Int64(value)
    }
}

impl From<u32> for DBValue {
    fn from(value: u32) -> Self {
        DBValue::Uint32(value)
    }
}

impl From<u64> for DBValue {
    fn from(value: u64) -> Self {
        DBValue::Uint64(value)
    }
}

impl From<f32> for DBValue {
    fn from(value: f32) -> Self {
        DBValue::Float(value as f64)
    }
}

impl From<f64> for DBValue {
    fn from(value: f64) -> Self {
        DBValue::Double(value)
    }
}

impl From<String> for DBValue {
    fn from(value: String) -> Self {
        DBValue::Str(value)
    }
}

impl From<&str> for DBValue {
    fn from(value: &str) -> Self {
        DBValue::Str(value.to_string())
    }
}

impl From<Vec<u8>> for DBValue {
    fn from(value: Vec<u8>) -> Self {
        DBValue::Binary(value)
    }
}

impl From<&[u8]> for DBValue {
    fn from(value: &[u8]) -> Self {
        DBValue::Binary(value.to_vec())
    }
}

impl From<chrono::NaiveDate> for DBValue {
    fn from(value: chrono::NaiveDate) -> Self {
        DBValue::Date(value.format("%Y-%m-%d").to_string())
    }
}

impl From<chrono::NaiveTime> for DBValue {
    fn from(value: chrono::NaiveTime) -> Self {
        DBValue::Time(value.format("%H:%M:%S%.f").to_string())
    }
}

impl From<chrono::NaiveDateTime> for DBValue {
    fn from(value: chrono::NaiveDateTime) -> Self {
        DBValue::Timestamp(value.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
    }
}

impl From<chrono::DateTime<chrono::Utc>> for DBValue {
    fn from(value: chrono::DateTime<chrono::Utc>) -> Self {
        DBValue::Timestamp(value.to_rfc3339())
    }
}

impl<T> From<Option<T>> for DBValue
where
    T: Into<DBValue>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(val) => val.into(),
            None => DBValue::Null,
        }
    }
}

/// Build a `Vec<DBValue>` from values of mixed types.
///
/// ```
/// use sqlnote_host_traits::{params, db::DBValue};
///
/// let params = params![42, "bob", None::<i64>];
/// assert_eq!(params[2], DBValue::Null);
/// ```
#[macro_export]
macro_rules! params {
    () => {
        ::std::vec::Vec::<$crate::db::DBValue>::new()
    };
    ($($value:expr),+ $(,)?) => {
        ::std::vec![$($crate::db::DBValue::from($value)),+]
    };
}
