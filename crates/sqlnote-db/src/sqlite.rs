use sqlnote_host_traits::db::{
    Context, DBConnection, DBRow, DBRows, DBStatement, DBValue, Error, ErrorCode, Exec,
    ExecResult, Prepare, Query, QueryContext, QueryRow, QueryRowContext, Row, RowHandle, Rows,
    Statement,
};

use rusqlite::{params_from_iter, Connection as SqliteConnection};
use std::sync::{Arc, Mutex};

use crate::connection_string;

type SharedConnection = Arc<Mutex<Option<SqliteConnection>>>;

pub struct SQLiteDBConnection {
    connection: SharedConnection,
}

impl SQLiteDBConnection {
    /// Open a database from a path or `sqlite:` / `file:` connection string.
    pub fn new(conn_str: &str) -> Result<Self, Error> {
        let path = connection_string::sqlite_path(conn_str);
        let connection = SqliteConnection::open(&path)
            .map_err(|e| sqlite_error(ErrorCode::ConnectionFailed, e))?;
        log::debug!("SQLiteDBConnection opened {}", path);

        Ok(SQLiteDBConnection {
            connection: Arc::new(Mutex::new(Some(connection))),
        })
    }

    pub fn open_in_memory() -> Result<Self, Error> {
        Self::new(":memory:")
    }
}

impl Exec for SQLiteDBConnection {
    fn exec(&self, query: &str, params: &[DBValue]) -> Result<ExecResult, Error> {
        run_exec(&self.connection, None, query, params)
    }
}

impl Query for SQLiteDBConnection {
    fn query(&self, query: &str, params: &[DBValue]) -> Result<Rows, Error> {
        run_query(&self.connection, None, query, params)
    }
}

impl QueryContext for SQLiteDBConnection {
    fn query_context(
        &self,
        ctx: &Context,
        query: &str,
        params: &[DBValue],
    ) -> Result<Rows, Error> {
        run_query(&self.connection, Some(ctx), query, params)
    }
}

impl QueryRow for SQLiteDBConnection {
    fn query_row(&self, query: &str, params: &[DBValue]) -> RowHandle {
        pending_row(&self.connection, None, query, params)
    }
}

impl QueryRowContext for SQLiteDBConnection {
    fn query_row_context(&self, ctx: &Context, query: &str, params: &[DBValue]) -> RowHandle {
        pending_row(&self.connection, Some(ctx), query, params)
    }
}

impl Prepare for SQLiteDBConnection {
    fn prepare(&self, query: &str) -> Result<Statement, Error> {
        prepare_statement(&self.connection, None, query)
    }

    fn prepare_context(&self, ctx: &Context, query: &str) -> Result<Statement, Error> {
        prepare_statement(&self.connection, Some(ctx), query)
    }
}

impl DBConnection for SQLiteDBConnection {
    fn close(&mut self) -> Result<(), Error> {
        let mut connection_guard = self
            .connection
            .lock()
            .map_err(|_| Error::msg(ErrorCode::CloseFailed, "connection lock poisoned"))?;
        if let Some(conn) = connection_guard.take() {
            if let Err((conn, e)) = conn.close() {
                *connection_guard = Some(conn);
                return Err(sqlite_error(ErrorCode::CloseFailed, e));
            }
            log::debug!("SQLiteDBConnection closed");
        }
        Ok(())
    }
}

/// Run `f` against the open connection, or fail with `code` if it is closed.
fn with_connection<T>(
    connection: &SharedConnection,
    code: ErrorCode,
    f: impl FnOnce(&SqliteConnection) -> Result<T, Error>,
) -> Result<T, Error> {
    let connection_guard = connection
        .lock()
        .map_err(|_| Error::msg(code, "connection lock poisoned"))?;
    match connection_guard.as_ref() {
        Some(conn) => f(conn),
        None => Err(Error::msg(ErrorCode::ConnectionFailed, "connection is closed")),
    }
}

fn check_context(ctx: Option<&Context>) -> Result<(), Error> {
    match ctx {
        Some(ctx) => ctx.check(),
        None => Ok(()),
    }
}

fn run_exec(
    connection: &SharedConnection,
    ctx: Option<&Context>,
    query: &str,
    params: &[DBValue],
) -> Result<ExecResult, Error> {
    check_context(ctx)?;
    with_connection(connection, ErrorCode::ExecuteFailed, |conn| {
        let mut stmt = conn
            .prepare_cached(query)
            .map_err(|e| sqlite_error(ErrorCode::ExecuteFailed, e))?;

        let sqlite_params: Vec<rusqlite::types::Value> =
            params.iter().map(dbvalue_to_sqlite_value).collect();

        let rows_affected = stmt
            .execute(params_from_iter(sqlite_params.iter()))
            .map_err(|e| sqlite_error(ErrorCode::ExecuteFailed, e))?;

        Ok(ExecResult {
            rows_affected: rows_affected as u64,
            last_insert_id: Some(conn.last_insert_rowid()),
        })
    })
}

fn run_query(
    connection: &SharedConnection,
    ctx: Option<&Context>,
    query: &str,
    params: &[DBValue],
) -> Result<Rows, Error> {
    check_context(ctx)?;
    let (rows, columns) = with_connection(connection, ErrorCode::QueryFailed, |conn| {
        collect_rows(conn, ctx, query, params, None)
    })?;
    log::debug!("SQLite query returned {} rows", rows.len());

    let boxed_rows: Box<dyn DBRows> = Box::new(SQLiteRows::new(rows, columns));
    Ok(boxed_rows.into())
}

/// Run `query` and collect up to `limit` rows. SQLite results are not streamed.
fn collect_rows(
    conn: &SqliteConnection,
    ctx: Option<&Context>,
    query: &str,
    params: &[DBValue],
    limit: Option<usize>,
) -> Result<(Vec<Row>, Vec<String>), Error> {
    let mut stmt = conn
        .prepare_cached(query)
        .map_err(|e| sqlite_error(ErrorCode::QueryFailed, e))?;
    let column_names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();

    let sqlite_params: Vec<rusqlite::types::Value> =
        params.iter().map(dbvalue_to_sqlite_value).collect();

    let mut rows = stmt
        .query(params_from_iter(sqlite_params.iter()))
        .map_err(|e| sqlite_error(ErrorCode::QueryFailed, e))?;

    let mut collected_rows = Vec::new();
    while let Some(row) = rows
        .next()
        .map_err(|e| sqlite_error(ErrorCode::QueryFailed, e))?
    {
        check_context(ctx)?;
        collected_rows.push(
            sqlite_row_to_dbvalue_row(row).map_err(|e| sqlite_error(ErrorCode::QueryFailed, e))?,
        );
        if limit.is_some_and(|limit| collected_rows.len() >= limit) {
            break;
        }
    }

    Ok((collected_rows, column_names))
}

fn pending_row(
    connection: &SharedConnection,
    ctx: Option<&Context>,
    query: &str,
    params: &[DBValue],
) -> RowHandle {
    let row: Box<dyn DBRow> = Box::new(SQLiteRow {
        connection: connection.clone(),
        columns: Vec::new(),
        state: RowState::Pending {
            ctx: ctx.cloned(),
            query: query.to_string(),
            params: params.to_vec(),
        },
    });
    row.into()
}

fn prepare_statement(
    connection: &SharedConnection,
    ctx: Option<&Context>,
    query: &str,
) -> Result<Statement, Error> {
    check_context(ctx)?;
    with_connection(connection, ErrorCode::PrepareFailed, |conn| {
        // Compile once up front so syntax errors surface here; later runs hit the cache.
        conn.prepare_cached(query)
            .map_err(|e| sqlite_error(ErrorCode::PrepareFailed, e))?;
        Ok(())
    })?;

    let boxed_statement: Box<dyn DBStatement> =
        Box::new(SQLiteStatement::new(connection.clone(), query.to_string()));
    Ok(boxed_statement.into())
}

struct SQLiteStatement {
    connection: SharedConnection,
    query: String,
    closed: bool,
}

impl SQLiteStatement {
    fn new(connection: SharedConnection, query: String) -> Self {
        Self {
            connection,
            query,
            closed: false,
        }
    }

    fn ensure_open(&self, code: ErrorCode) -> Result<(), Error> {
        if self.closed {
            return Err(Error::msg(code, "statement is closed"));
        }
        Ok(())
    }

    /// A closed statement still hands out a row, but it fails on first fetch.
    fn row(&self, ctx: Option<&Context>, params: &[DBValue]) -> RowHandle {
        match self.ensure_open(ErrorCode::QueryFailed) {
            Ok(()) => pending_row(&self.connection, ctx, &self.query, params),
            Err(err) => {
                let row: Box<dyn DBRow> = Box::new(SQLiteRow {
                    connection: self.connection.clone(),
                    columns: Vec::new(),
                    state: RowState::Failed(err),
                });
                row.into()
            }
        }
    }
}

impl DBStatement for SQLiteStatement {
    fn exec(&self, params: &[DBValue]) -> Result<ExecResult, Error> {
        self.ensure_open(ErrorCode::ExecuteFailed)?;
        run_exec(&self.connection, None, &self.query, params)
    }

    fn exec_context(&self, ctx: &Context, params: &[DBValue]) -> Result<ExecResult, Error> {
        self.ensure_open(ErrorCode::ExecuteFailed)?;
        run_exec(&self.connection, Some(ctx), &self.query, params)
    }

    fn query(&self, params: &[DBValue]) -> Result<Rows, Error> {
        self.ensure_open(ErrorCode::QueryFailed)?;
        run_query(&self.connection, None, &self.query, params)
    }

    fn query_context(&self, ctx: &Context, params: &[DBValue]) -> Result<Rows, Error> {
        self.ensure_open(ErrorCode::QueryFailed)?;
        run_query(&self.connection, Some(ctx), &self.query, params)
    }

    fn query_row(&self, params: &[DBValue]) -> RowHandle {
        self.row(None, params)
    }

    fn query_row_context(&self, ctx: &Context, params: &[DBValue]) -> RowHandle {
        self.row(Some(ctx), params)
    }

    fn number_parameters(&self) -> Result<u32, Error> {
        self.ensure_open(ErrorCode::PrepareFailed)?;
        with_connection(&self.connection, ErrorCode::PrepareFailed, |conn| {
            let stmt = conn
                .prepare_cached(&self.query)
                .map_err(|e| sqlite_error(ErrorCode::PrepareFailed, e))?;
            Ok(stmt.parameter_count() as u32)
        })
    }

    fn close(&mut self) -> Result<(), Error> {
        self.ensure_open(ErrorCode::CloseFailed)?;
        self.closed = true;
        log::debug!("SQLiteStatement closed");
        Ok(())
    }
}

struct SQLiteRows {
    rows: std::vec::IntoIter<Row>,
    columns: Vec<String>,
}

impl SQLiteRows {
    fn new(rows: Vec<Row>, columns: Vec<String>) -> Self {
        Self {
            rows: rows.into_iter(),
            columns,
        }
    }
}

impl DBRows for SQLiteRows {
    fn columns(&self) -> Vec<String> {
        self.columns.clone()
    }

    fn next(&mut self) -> Result<Option<Row>, Error> {
        Ok(self.rows.next())
    }

    fn close(&mut self) -> Result<(), Error> {
        log::debug!("SQLiteRows closed");
        Ok(())
    }
}

enum RowState {
    Pending {
        ctx: Option<Context>,
        query: String,
        params: Vec<DBValue>,
    },
    Ready(Row),
    Failed(Error),
    Spent,
}

/// Single-row result. The statement runs on the first `prefetch` or `take`.
struct SQLiteRow {
    connection: SharedConnection,
    columns: Vec<String>,
    state: RowState,
}

impl DBRow for SQLiteRow {
    fn columns(&self) -> Vec<String> {
        self.columns.clone()
    }

    fn prefetch(&mut self) -> Result<(), Error> {
        match std::mem::replace(&mut self.state, RowState::Spent) {
            RowState::Pending { ctx, query, params } => {
                check_context(ctx.as_ref())?;
                let (mut rows, columns) =
                    with_connection(&self.connection, ErrorCode::QueryFailed, |conn| {
                        collect_rows(conn, ctx.as_ref(), &query, &params, Some(1))
                    })?;
                self.columns = columns;
                match rows.pop() {
                    Some(row) => {
                        self.state = RowState::Ready(row);
                        Ok(())
                    }
                    None => Err(Error::msg(ErrorCode::NoRows, "no rows in result set")),
                }
            }
            RowState::Ready(row) => {
                self.state = RowState::Ready(row);
                Ok(())
            }
            RowState::Failed(err) => Err(err),
            RowState::Spent => Err(Error::msg(ErrorCode::RowConsumed, "row already consumed")),
        }
    }

    fn take(&mut self) -> Result<Row, Error> {
        self.prefetch()?;
        match std::mem::replace(&mut self.state, RowState::Spent) {
            RowState::Ready(row) => Ok(row),
            _ => Err(Error::msg(ErrorCode::RowConsumed, "row already consumed")),
        }
    }
}

/// Map a rusqlite error onto an error code, keeping the original as the source.
fn sqlite_error(fallback: ErrorCode, err: rusqlite::Error) -> Error {
    let code = match &err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation => {
            ErrorCode::ConstraintViolation
        }
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::OperationInterrupted =>
        {
            ErrorCode::Cancelled
        }
        rusqlite::Error::QueryReturnedNoRows => ErrorCode::NoRows,
        _ => fallback,
    };
    log::warn!("SQLite {} error: {}", code, err);
    Error::new(code, err)
}

fn dbvalue_to_sqlite_value(dbvalue: &DBValue) -> rusqlite::types::Value {
    use rusqlite::types::Value;

    match dbvalue {
        DBValue::Null => Value::Null,
        DBValue::Int32(i) => Value::Integer(*i as i64),
        DBValue::Int64(i) => Value::Integer(*i),
        DBValue::Uint32(i) => Value::Integer(*i as i64),
        // SQLite integers are signed 64-bit; larger values are stored as text
        DBValue::Uint64(i) => i64::try_from(*i)
            .map(Value::Integer)
            .unwrap_or_else(|_| Value::Text(i.to_string())),
        DBValue::Float(f) => Value::Real(*f),
        DBValue::Double(f) => Value::Real(*f),
        DBValue::Str(s) => Value::Text(s.clone()),
        DBValue::Boolean(b) => Value::Integer(if *b { 1 } else { 0 }),
        DBValue::Date(s) => Value::Text(s.clone()),
        DBValue::Time(s) => Value::Text(s.clone()),
        DBValue::Timestamp(s) => Value::Text(s.clone()),
        DBValue::Binary(b) => Value::Blob(b.clone()),
    }
}

fn sqlite_row_to_dbvalue_row(row: &rusqlite::Row) -> Result<Row, rusqlite::Error> {
    let mut values = Vec::new();

    for i in 0..row.as_ref().column_count() {
        let value = match row.get_ref(i)? {
            rusqlite::types::ValueRef::Null => DBValue::Null,
            rusqlite::types::ValueRef::Integer(i) => DBValue::Int64(i),
            rusqlite::types::ValueRef::Real(f) => DBValue::Double(f),
            rusqlite::types::ValueRef::Text(s) => {
                DBValue::Str(String::from_utf8_lossy(s).to_string())
            }
            rusqlite::types::ValueRef::Blob(b) => DBValue::Binary(b.to_vec()),
        };
        values.push(value);
    }

    Ok(Row(values))
}
