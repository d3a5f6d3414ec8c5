use crate::instrumented::{annotate_failure, materialize};

use sqlnote_host_traits::db::{Context, DBValue, ExecResult, RowHandle, Rows, Statement};

use std::fmt;
use std::panic::Location;

/// A prepared statement that tags failures with the text it was prepared from.
///
/// The statement is released by [`Stmt::close`] only; dropping a `Stmt`
/// does not close it.
pub struct Stmt {
    statement: Statement,
    query: String,
}

impl Stmt {
    pub(crate) fn new(statement: Statement, query: &str) -> Self {
        Self {
            statement,
            query: query.to_string(),
        }
    }

    pub fn query_text(&self) -> &str {
        &self.query
    }

    #[track_caller]
    pub fn number_parameters(&self) -> anyhow::Result<u32> {
        let location = Location::caller();
        self.statement.number_parameters().map_err(|err| {
            annotate_failure(err, "stmt.number_parameters", &self.query, &[], None, location)
        })
    }

    #[track_caller]
    pub fn exec(&self, params: &[DBValue]) -> anyhow::Result<ExecResult> {
        let location = Location::caller();
        self.statement
            .exec(params)
            .map_err(|err| annotate_failure(err, "stmt.exec", &self.query, params, None, location))
    }

    #[track_caller]
    pub fn exec_context(&self, ctx: &Context, params: &[DBValue]) -> anyhow::Result<ExecResult> {
        let location = Location::caller();
        self.statement.exec_context(ctx, params).map_err(|err| {
            annotate_failure(err, "stmt.exec_context", &self.query, params, Some(ctx), location)
        })
    }

    #[track_caller]
    pub fn query(&self, params: &[DBValue]) -> anyhow::Result<Rows> {
        let location = Location::caller();
        self.statement
            .query(params)
            .map_err(|err| annotate_failure(err, "stmt.query", &self.query, params, None, location))
    }

    #[track_caller]
    pub fn query_context(&self, ctx: &Context, params: &[DBValue]) -> anyhow::Result<Rows> {
        let location = Location::caller();
        self.statement.query_context(ctx, params).map_err(|err| {
            annotate_failure(err, "stmt.query_context", &self.query, params, Some(ctx), location)
        })
    }

    /// Single-row query; deferred failures are fetched and annotated here.
    #[track_caller]
    pub fn query_row(&self, params: &[DBValue]) -> anyhow::Result<RowHandle> {
        let location = Location::caller();
        materialize(self.statement.query_row(params)).map_err(|err| {
            annotate_failure(err, "stmt.query_row", &self.query, params, None, location)
        })
    }

    #[track_caller]
    pub fn query_row_context(&self, ctx: &Context, params: &[DBValue]) -> anyhow::Result<RowHandle> {
        let location = Location::caller();
        materialize(self.statement.query_row_context(ctx, params)).map_err(|err| {
            annotate_failure(err, "stmt.query_row_context", &self.query, params, Some(ctx), location)
        })
    }

    /// Release the statement. A failure is tagged with the statement text and
    /// no parameters.
    #[track_caller]
    pub fn close(mut self) -> anyhow::Result<()> {
        let location = Location::caller();
        self.statement
            .close()
            .map_err(|err| annotate_failure(err, "stmt.close", &self.query, &[], None, location))
    }
}

impl fmt::Debug for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Stmt").field("query", &self.query).finish()
    }
}
