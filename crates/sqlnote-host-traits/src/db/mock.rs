use super::{
    Connection, Context, DBConnection, DBRow, DBRows, DBStatement, DBTrait, DBValue, Error,
    ErrorCode, Exec, ExecResult, Prepare, Query, QueryContext, QueryRow, QueryRowContext, Row,
    RowHandle, Rows, Statement,
};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Hands out clones of a scripted [`MockConnection`].
#[derive(Default)]
pub struct MockBackend {
    connection: MockConnection,
}

impl MockBackend {
    pub fn new(connection: MockConnection) -> Self {
        Self { connection }
    }
}

impl DBTrait for MockBackend {
    fn open(&mut self, _name: String) -> Result<Connection, Error> {
        let connection: Box<dyn DBConnection> = Box::new(self.connection.clone());
        Ok(connection.into())
    }
}

#[derive(Default)]
struct Shared {
    calls: Mutex<Vec<String>>,
    closes: AtomicUsize,
}

/// A connection whose results and failures are fixed up front.
///
/// Single-row queries always defer their outcome until the handle is
/// prefetched or taken. Clones share the call log and close counter.
#[derive(Clone, Default)]
pub struct MockConnection {
    columns: Vec<String>,
    rows: Vec<Row>,
    exec_result: ExecResult,
    failure: Option<ErrorCode>,
    statement_failure: Option<ErrorCode>,
    close_failure: Option<ErrorCode>,
    shared: Arc<Shared>,
}

impl MockConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(mut self, columns: Vec<String>, rows: Vec<Row>) -> Self {
        self.columns = columns;
        self.rows = rows;
        self
    }

    pub fn exec_result(mut self, exec_result: ExecResult) -> Self {
        self.exec_result = exec_result;
        self
    }

    /// Make every operation fail with `code`.
    pub fn fail_with(mut self, code: ErrorCode) -> Self {
        self.failure = Some(code);
        self
    }

    /// Let `prepare` succeed but make every statement operation fail with `code`.
    pub fn fail_statements_with(mut self, code: ErrorCode) -> Self {
        self.statement_failure = Some(code);
        self
    }

    /// Make statement close fail with `code`.
    pub fn fail_close_with(mut self, code: ErrorCode) -> Self {
        self.close_failure = Some(code);
        self
    }

    /// Operations seen so far, as `"<op>: <query>"`.
    pub fn calls(&self) -> Vec<String> {
        match self.shared.calls.lock() {
            Ok(calls) => calls.clone(),
            Err(_) => Vec::new(),
        }
    }

    /// Number of statement closes seen so far.
    pub fn closes(&self) -> usize {
        self.shared.closes.load(Ordering::SeqCst)
    }

    fn record(&self, op: &str, query: &str) {
        if let Ok(mut calls) = self.shared.calls.lock() {
            calls.push(format!("{}: {}", op, query));
        }
    }

    fn fail(&self) -> Result<(), Error> {
        match self.failure {
            Some(code) => Err(Error::msg(code, "mock failure")),
            None => Ok(()),
        }
    }

    fn do_exec(&self, op: &str, ctx: Option<&Context>, query: &str) -> Result<ExecResult, Error> {
        self.record(op, query);
        if let Some(ctx) = ctx {
            ctx.check()?;
        }
        self.fail()?;
        Ok(self.exec_result)
    }

    fn do_query(&self, op: &str, ctx: Option<&Context>, query: &str) -> Result<Rows, Error> {
        self.record(op, query);
        if let Some(ctx) = ctx {
            ctx.check()?;
        }
        self.fail()?;
        let rows: Box<dyn DBRows> = Box::new(MockRows {
            columns: self.columns.clone(),
            rows: self.rows.clone().into_iter(),
        });
        Ok(rows.into())
    }

    fn do_query_row(&self, op: &str, ctx: Option<&Context>, query: &str) -> RowHandle {
        self.record(op, query);
        let outcome = match ctx.map(Context::check).unwrap_or(Ok(())) {
            Err(err) => Err(err.code),
            Ok(()) => match self.failure {
                Some(code) => Err(code),
                None => Ok(self.rows.first().cloned()),
            },
        };
        let row: Box<dyn DBRow> = Box::new(MockRow {
            columns: self.columns.clone(),
            state: RowState::Pending(outcome),
        });
        row.into()
    }

    fn do_prepare(&self, op: &str, ctx: Option<&Context>, query: &str) -> Result<Statement, Error> {
        self.record(op, query);
        if let Some(ctx) = ctx {
            ctx.check()?;
        }
        self.fail()?;
        let mut connection = self.clone();
        if let Some(code) = self.statement_failure {
            connection.failure = Some(code);
        }
        let statement: Box<dyn DBStatement> = Box::new(MockStatement {
            connection,
            query: query.to_string(),
        });
        Ok(statement.into())
    }
}

impl Exec for MockConnection {
    fn exec(&self, query: &str, _params: &[DBValue]) -> Result<ExecResult, Error> {
        self.do_exec("exec", None, query)
    }
}

impl Query for MockConnection {
    fn query(&self, query: &str, _params: &[DBValue]) -> Result<Rows, Error> {
        self.do_query("query", None, query)
    }
}

impl QueryContext for MockConnection {
    fn query_context(
        &self,
        ctx: &Context,
        query: &str,
        _params: &[DBValue],
    ) -> Result<Rows, Error> {
        self.do_query("query_context", Some(ctx), query)
    }
}

impl QueryRow for MockConnection {
    fn query_row(&self, query: &str, _params: &[DBValue]) -> RowHandle {
        self.do_query_row("query_row", None, query)
    }
}

impl QueryRowContext for MockConnection {
    fn query_row_context(&self, ctx: &Context, query: &str, _params: &[DBValue]) -> RowHandle {
        self.do_query_row("query_row_context", Some(ctx), query)
    }
}

impl Prepare for MockConnection {
    fn prepare(&self, query: &str) -> Result<Statement, Error> {
        self.do_prepare("prepare", None, query)
    }

    fn prepare_context(&self, ctx: &Context, query: &str) -> Result<Statement, Error> {
        self.do_prepare("prepare_context", Some(ctx), query)
    }
}

impl DBConnection for MockConnection {
    fn close(&mut self) -> Result<(), Error> {
        self.record("close", "");
        Ok(())
    }
}

struct MockStatement {
    connection: MockConnection,
    query: String,
}

impl DBStatement for MockStatement {
    fn exec(&self, _params: &[DBValue]) -> Result<ExecResult, Error> {
        self.connection.do_exec("stmt.exec", None, &self.query)
    }

    fn exec_context(&self, ctx: &Context, _params: &[DBValue]) -> Result<ExecResult, Error> {
        self.connection.do_exec("stmt.exec_context", Some(ctx), &self.query)
    }

    fn query(&self, _params: &[DBValue]) -> Result<Rows, Error> {
        self.connection.do_query("stmt.query", None, &self.query)
    }

    fn query_context(&self, ctx: &Context, _params: &[DBValue]) -> Result<Rows, Error> {
        self.connection
            .do_query("stmt.query_context", Some(ctx), &self.query)
    }

    fn query_row(&self, _params: &[DBValue]) -> RowHandle {
        self.connection
            .do_query_row("stmt.query_row", None, &self.query)
    }

    fn query_row_context(&self, ctx: &Context, _params: &[DBValue]) -> RowHandle {
        self.connection
            .do_query_row("stmt.query_row_context", Some(ctx), &self.query)
    }

    fn number_parameters(&self) -> Result<u32, Error> {
        Ok(self.query.matches('?').count() as u32)
    }

    fn close(&mut self) -> Result<(), Error> {
        self.connection.record("stmt.close", &self.query);
        self.connection.shared.closes.fetch_add(1, Ordering::SeqCst);
        match self.connection.close_failure {
            Some(code) => Err(Error::msg(code, "mock close failure")),
            None => Ok(()),
        }
    }
}

struct MockRows {
    columns: Vec<String>,
    rows: std::vec::IntoIter<Row>,
}

impl DBRows for MockRows {
    fn columns(&self) -> Vec<String> {
        self.columns.clone()
    }

    fn next(&mut self) -> Result<Option<Row>, Error> {
        Ok(self.rows.next())
    }

    fn close(&mut self) -> Result<(), Error> {
        Ok(())
    }
}

enum RowState {
    Pending(Result<Option<Row>, ErrorCode>),
    Ready(Row),
    Spent,
}

struct MockRow {
    columns: Vec<String>,
    state: RowState,
}

impl DBRow for MockRow {
    fn columns(&self) -> Vec<String> {
        self.columns.clone()
    }

    fn prefetch(&mut self) -> Result<(), Error> {
        match std::mem::replace(&mut self.state, RowState::Spent) {
            RowState::Pending(Ok(Some(row))) | RowState::Ready(row) => {
                self.state = RowState::Ready(row);
                Ok(())
            }
            RowState::Pending(Ok(None)) => Err(Error::msg(ErrorCode::NoRows, "no rows in result set")),
            RowState::Pending(Err(code)) => Err(Error::msg(code, "mock failure")),
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
