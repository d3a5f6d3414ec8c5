#![cfg(feature = "sqlite")]

use sqlnote_core::chain::context;
use sqlnote_core::{find_cause, get, instrumented};
use sqlnote_db::sqlite::SQLiteDBConnection;
use sqlnote_host_traits::db::{Context, DBValue, Error, ErrorCode};
use sqlnote_host_traits::params;

use tempfile::TempDir;

fn open_file_db() -> (TempDir, SQLiteDBConnection) {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.db");
    let conn = SQLiteDBConnection::new(&format!("sqlite://{}", path.display())).unwrap();
    instrumented::exec(
        &conn,
        "CREATE TABLE accounts (id INTEGER PRIMARY KEY, email TEXT NOT NULL UNIQUE)",
        &[],
    )
    .unwrap();
    instrumented::exec(
        &conn,
        "INSERT INTO accounts (email) VALUES (?)",
        &params!["a@example.com"],
    )
    .unwrap();
    (dir, conn)
}

#[test]
fn duplicate_insert_is_tagged_and_keeps_driver_error() {
    let (_dir, conn) = open_file_db();

    let err = instrumented::exec(
        &conn,
        "INSERT INTO accounts (email) VALUES (?)",
        &params!["a@example.com"],
    )
    .unwrap_err();

    assert_eq!(
        get(&*err),
        Some((
            "INSERT INTO accounts (email) VALUES (?)",
            &[DBValue::Str("a@example.com".to_string())][..]
        ))
    );
    assert_eq!(
        find_cause::<Error>(&*err).unwrap().code,
        ErrorCode::ConstraintViolation
    );
    assert!(find_cause::<rusqlite::Error>(&*err).is_some());
    assert!(format!("{:#}", err).contains("UNIQUE constraint failed: accounts.email"));
}

#[test]
fn missing_row_is_tagged_at_the_call() {
    let (_dir, conn) = open_file_db();
    let ctx = Context::new().with_value("request_id", "r-9");

    let err = instrumented::query_row_context(
        &ctx,
        &conn,
        "SELECT email FROM accounts WHERE id = ?",
        &params![404],
    )
    .err()
    .unwrap();

    assert_eq!(find_cause::<Error>(&*err).unwrap().code, ErrorCode::NoRows);
    assert_eq!(get(&*err).unwrap().1, &[DBValue::Int32(404)][..]);
    assert_eq!(
        context::get(&*err).unwrap().get("request_id").map(String::as_str),
        Some("r-9")
    );
}

#[test]
fn found_row_is_returned_untouched() {
    let (_dir, conn) = open_file_db();

    let mut row = instrumented::query_row(&conn, "SELECT id, email FROM accounts", &[]).unwrap();
    let row = row.take().unwrap();
    assert_eq!(
        row.0,
        vec![DBValue::Int64(1), DBValue::Str("a@example.com".to_string())]
    );
}

#[test]
fn prepared_statement_reuses_text_and_closes() {
    let (_dir, conn) = open_file_db();

    let stmt = instrumented::prepare(&conn, "INSERT INTO accounts (email) VALUES (?)").unwrap();
    assert_eq!(stmt.number_parameters().unwrap(), 1);
    assert_eq!(stmt.exec(&params!["b@example.com"]).unwrap().rows_affected, 1);

    let err = stmt.exec(&params!["b@example.com"]).unwrap_err();
    let (query, params) = get(&*err).unwrap();
    assert_eq!(query, stmt.query_text());
    assert_eq!(params, &[DBValue::Str("b@example.com".to_string())][..]);

    stmt.close().unwrap();
}

#[test]
fn prepare_failure_is_tagged_with_text_only() {
    let (_dir, conn) = open_file_db();

    let err = instrumented::prepare(&conn, "SELECT * FROM missing_table").err().unwrap();
    assert_eq!(get(&*err), Some(("SELECT * FROM missing_table", &[][..])));
    assert_eq!(find_cause::<Error>(&*err).unwrap().code, ErrorCode::PrepareFailed);
}

#[test]
fn cancelled_context_is_reported_as_cancelled() {
    let (_dir, conn) = open_file_db();
    let ctx = Context::new();
    ctx.cancel();

    let err = instrumented::query_context(&ctx, &conn, "SELECT * FROM accounts", &[])
        .err()
        .unwrap();
    assert_eq!(find_cause::<Error>(&*err).unwrap().code, ErrorCode::Cancelled);
    assert!(get(&*err).is_some());
}
