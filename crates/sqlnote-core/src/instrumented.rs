//! Pass-through wrappers around the database capabilities.
//!
//! Each wrapper delegates to the backend and returns its result unchanged.
//! On failure the backend error is wrapped with the query text, the bound
//! parameters, a snapshot of the context (for the `_context` variants) and
//! the caller's location. The backend error stays reachable through
//! [`std::error::Error::source`].

use crate::annotate;
use crate::chain::{self, context, location, Annotator};
use crate::stmt::Stmt;

use sqlnote_host_traits::db::{
    Context, DBValue, Error, Exec, ExecResult, Prepare, Query, QueryContext, QueryRow,
    QueryRowContext, RowHandle, Rows,
};

use std::panic::Location;

pub(crate) fn annotate_failure(
    err: Error,
    op: &str,
    query: &str,
    params: &[DBValue],
    ctx: Option<&Context>,
    location: &'static Location<'static>,
) -> anyhow::Error {
    log::trace!("{} failed at {}: {} (`{}`)", op, location, err, query);

    let mut annotators: Vec<Annotator> = vec![Box::new(annotate::with(query, params))];
    if let Some(ctx) = ctx {
        annotators.push(Box::new(context::with(ctx)));
    }
    annotators.push(Box::new(location::at(location)));
    chain::decorate(err, annotators)
}

/// Force the row to be fetched so a deferred error shows up now.
pub(crate) fn materialize(mut row: RowHandle) -> Result<RowHandle, Error> {
    row.prefetch()?;
    Ok(row)
}

#[track_caller]
pub fn exec<D>(db: &D, query: &str, params: &[DBValue]) -> anyhow::Result<ExecResult>
where
    D: Exec + ?Sized,
{
    let location = Location::caller();
    db.exec(query, params)
        .map_err(|err| annotate_failure(err, "exec", query, params, None, location))
}

#[track_caller]
pub fn query<D>(db: &D, query: &str, params: &[DBValue]) -> anyhow::Result<Rows>
where
    D: Query + ?Sized,
{
    let location = Location::caller();
    db.query(query, params)
        .map_err(|err| annotate_failure(err, "query", query, params, None, location))
}

#[track_caller]
pub fn query_context<D>(
    ctx: &Context,
    db: &D,
    query: &str,
    params: &[DBValue],
) -> anyhow::Result<Rows>
where
    D: QueryContext + ?Sized,
{
    let location = Location::caller();
    db.query_context(ctx, query, params).map_err(|err| {
        annotate_failure(err, "query_context", query, params, Some(ctx), location)
    })
}

/// Run a single-row query. The returned handle has already been fetched, so
/// "no rows" and other deferred failures come back here, annotated.
#[track_caller]
pub fn query_row<D>(db: &D, query: &str, params: &[DBValue]) -> anyhow::Result<RowHandle>
where
    D: QueryRow + ?Sized,
{
    let location = Location::caller();
    materialize(db.query_row(query, params))
        .map_err(|err| annotate_failure(err, "query_row", query, params, None, location))
}

#[track_caller]
pub fn query_row_context<D>(
    ctx: &Context,
    db: &D,
    query: &str,
    params: &[DBValue],
) -> anyhow::Result<RowHandle>
where
    D: QueryRowContext + ?Sized,
{
    let location = Location::caller();
    materialize(db.query_row_context(ctx, query, params)).map_err(|err| {
        annotate_failure(err, "query_row_context", query, params, Some(ctx), location)
    })
}

/// Compile `query` into a [`Stmt`]. The caller must [`Stmt::close`] it.
#[track_caller]
pub fn prepare<D>(db: &D, query: &str) -> anyhow::Result<Stmt>
where
    D: Prepare + ?Sized,
{
    let location = Location::caller();
    let statement = db
        .prepare(query)
        .map_err(|err| annotate_failure(err, "prepare", query, &[], None, location))?;
    Ok(Stmt::new(statement, query))
}

/// Like [`prepare`]; `ctx` covers preparation only.
#[track_caller]
pub fn prepare_context<D>(ctx: &Context, db: &D, query: &str) -> anyhow::Result<Stmt>
where
    D: Prepare + ?Sized,
{
    let location = Location::caller();
    let statement = db.prepare_context(ctx, query).map_err(|err| {
        annotate_failure(err, "prepare_context", query, &[], Some(ctx), location)
    })?;
    Ok(Stmt::new(statement, query))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::{find_cause, get};
    use sqlnote_host_traits::db::mock::MockConnection;
    use sqlnote_host_traits::db::{ErrorCode, Row};
    use sqlnote_host_traits::params;

    fn one_row() -> MockConnection {
        MockConnection::new().rows(
            vec!["id".to_string()],
            vec![Row(vec![DBValue::Int64(1)])],
        )
    }

    #[test]
    fn exec_success_is_untouched() {
        let expected = ExecResult {
            rows_affected: 3,
            last_insert_id: Some(9),
        };
        let conn = MockConnection::new().exec_result(expected);
        assert_eq!(exec(&conn, "UPDATE t SET x = 1", &[]).unwrap(), expected);
    }

    #[test]
    fn exec_failure_is_tagged() {
        let conn = MockConnection::new().fail_with(ErrorCode::ConstraintViolation);
        let err = exec(&conn, "INSERT INTO t VALUES (?)", &params![42]).unwrap_err();

        assert_eq!(
            get(&*err),
            Some(("INSERT INTO t VALUES (?)", &[DBValue::Int32(42)][..]))
        );
        assert_eq!(
            find_cause::<Error>(&*err).map(|cause| cause.code),
            Some(ErrorCode::ConstraintViolation)
        );
    }

    #[test]
    fn failure_records_caller_location() {
        let conn = MockConnection::new().fail_with(ErrorCode::ExecuteFailed);
        let line = line!() + 1;
        let err = exec(&conn, "DELETE FROM t", &[]).unwrap_err();

        let recorded = location::get(&*err).unwrap();
        assert_eq!(recorded.file(), file!());
        assert_eq!(recorded.line(), line);
    }

    #[test]
    fn query_returns_rows() {
        let conn = one_row();
        let mut rows = query(&conn, "SELECT id FROM t", &[]).unwrap();
        assert_eq!(rows.columns(), vec!["id"]);
        assert_eq!(rows.next().unwrap(), Some(Row(vec![DBValue::Int64(1)])));
        assert_eq!(rows.next().unwrap(), None);
    }

    #[test]
    fn query_context_attaches_context() {
        let conn = MockConnection::new().fail_with(ErrorCode::QueryFailed);
        let ctx = Context::new().with_value("request_id", "r-42");
        let err = query_context(&ctx, &conn, "SELECT * FROM t WHERE a = ?", &params!["x"])
            .err()
            .unwrap();

        assert_eq!(get(&*err).unwrap().0, "SELECT * FROM t WHERE a = ?");
        let values = context::get(&*err).unwrap();
        assert_eq!(values.get("request_id").map(String::as_str), Some("r-42"));
    }

    #[test]
    fn cancelled_context_surfaces_as_tagged_error() {
        let conn = one_row();
        let ctx = Context::new();
        ctx.cancel();
        let err = query_context(&ctx, &conn, "SELECT id FROM t", &[]).err().unwrap();

        assert_eq!(
            find_cause::<Error>(&*err).map(|cause| cause.code),
            Some(ErrorCode::Cancelled)
        );
        assert!(get(&*err).is_some());
    }

    #[test]
    fn query_row_annotates_deferred_no_rows() {
        let conn = MockConnection::new();
        let err = query_row(&conn, "SELECT id FROM t WHERE id = ?", &params![5])
            .err()
            .unwrap();

        assert_eq!(
            find_cause::<Error>(&*err).map(|cause| cause.code),
            Some(ErrorCode::NoRows)
        );
        assert_eq!(
            get(&*err),
            Some(("SELECT id FROM t WHERE id = ?", &[DBValue::Int32(5)][..]))
        );
    }

    #[test]
    fn query_row_hands_back_fetched_row() {
        let conn = one_row();
        let mut row = query_row(&conn, "SELECT id FROM t LIMIT 1", &[]).unwrap();
        assert_eq!(row.take().unwrap(), Row(vec![DBValue::Int64(1)]));
    }

    #[test]
    fn query_row_context_annotates_deferred_failure() {
        let conn = MockConnection::new().fail_with(ErrorCode::QueryFailed);
        let ctx = Context::new().with_value("tenant", "acme");
        let err = query_row_context(&ctx, &conn, "SELECT 1", &[]).err().unwrap();

        assert!(get(&*err).is_some());
        assert!(context::get(&*err).is_some());
        assert_eq!(
            find_cause::<Error>(&*err).map(|cause| cause.code),
            Some(ErrorCode::QueryFailed)
        );
    }

    #[test]
    fn prepare_failure_has_query_without_params() {
        let conn = MockConnection::new().fail_with(ErrorCode::PrepareFailed);
        let err = prepare(&conn, "SELEC 1").err().unwrap();
        assert_eq!(get(&*err), Some(("SELEC 1", &[][..])));
    }

    #[test]
    fn prepare_context_failure_has_query_context_and_no_params() {
        let conn = MockConnection::new().fail_with(ErrorCode::PrepareFailed);
        let ctx = Context::new().with_value("request_id", "r-7");
        let err = prepare_context(&ctx, &conn, "SELECT * FROM t WHERE id = ?")
            .err()
            .unwrap();

        assert_eq!(get(&*err), Some(("SELECT * FROM t WHERE id = ?", &[][..])));
        assert_eq!(
            context::get(&*err).unwrap().get("request_id").map(String::as_str),
            Some("r-7")
        );
        assert_eq!(
            find_cause::<Error>(&*err).map(|cause| cause.code),
            Some(ErrorCode::PrepareFailed)
        );
    }

    #[test]
    fn works_through_trait_objects() {
        let conn = MockConnection::new().fail_with(ErrorCode::ExecuteFailed);
        let db: &dyn Exec = &conn;
        let err = exec(db, "VACUUM", &[]).unwrap_err();
        assert_eq!(get(&*err).unwrap().0, "VACUUM");
    }
}
