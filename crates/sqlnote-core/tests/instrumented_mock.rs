use std::sync::Arc;
use std::thread;

use sqlnote_core::chain::{context, location};
use sqlnote_core::{find_cause, get, instrumented};
use sqlnote_host_traits::db::mock::{MockBackend, MockConnection};
use sqlnote_host_traits::db::{Context, DBTrait, DBValue, Error, ErrorCode, ExecResult, Row};
use sqlnote_host_traits::params;

#[test]
fn constraint_violation_keeps_kind_and_gains_tag() {
    let mut backend = MockBackend::new(MockConnection::new().fail_with(ErrorCode::ConstraintViolation));
    let conn = backend.open("mock".to_string()).unwrap();

    let err = instrumented::exec(&*conn, "INSERT INTO t VALUES (?)", &params![42]).unwrap_err();

    let cause = find_cause::<Error>(&*err).unwrap();
    assert_eq!(cause.code, ErrorCode::ConstraintViolation);
    assert_eq!(
        get(&*err),
        Some(("INSERT INTO t VALUES (?)", &[DBValue::Int32(42)][..]))
    );
}

#[test]
fn success_is_identical() {
    let expected = ExecResult {
        rows_affected: 1,
        last_insert_id: Some(17),
    };
    let mut backend = MockBackend::new(MockConnection::new().exec_result(expected));
    let conn = backend.open("mock".to_string()).unwrap();

    let result = instrumented::exec(&*conn, "INSERT INTO t VALUES (?)", &params![42]).unwrap();
    assert_eq!(result, expected);
}

#[test]
fn full_chain_is_available_to_callers() {
    let conn = MockConnection::new().fail_with(ErrorCode::QueryFailed);
    let ctx = Context::new()
        .with_value("request_id", "r-1")
        .with_value("user", "alice");

    let err = instrumented::query_row_context(&ctx, &conn, "SELECT * FROM t WHERE id = ?", &params![3])
        .err()
        .unwrap();

    assert!(get(&*err).is_some());
    assert_eq!(context::get(&*err).unwrap().len(), 2);
    assert_eq!(location::get(&*err).unwrap().file(), file!());
    assert_eq!(
        format!("{:#}", err).split(": ").last(),
        Some("mock failure")
    );
}

#[test]
fn delegation_happens_exactly_once() {
    let conn = MockConnection::new().rows(vec!["n".to_string()], vec![Row(vec![DBValue::Int64(1)])]);

    instrumented::exec(&conn, "UPDATE t SET n = n + 1", &[]).unwrap();
    instrumented::query(&conn, "SELECT n FROM t", &[]).unwrap();
    instrumented::query_row(&conn, "SELECT n FROM t", &[]).unwrap();
    let stmt = instrumented::prepare(&conn, "SELECT n FROM t WHERE n > ?").unwrap();
    stmt.query(&params![0]).unwrap();
    stmt.close().unwrap();

    assert_eq!(
        conn.calls(),
        vec![
            "exec: UPDATE t SET n = n + 1",
            "query: SELECT n FROM t",
            "query_row: SELECT n FROM t",
            "prepare: SELECT n FROM t WHERE n > ?",
            "stmt.query: SELECT n FROM t WHERE n > ?",
            "stmt.close: SELECT n FROM t WHERE n > ?",
        ]
    );
}

#[test]
fn concurrent_callers_get_their_own_tags() {
    let conn = Arc::new(MockConnection::new().fail_with(ErrorCode::ExecuteFailed));

    let handles: Vec<_> = (0..8i64)
        .map(|i| {
            let conn = Arc::clone(&conn);
            thread::spawn(move || {
                let err = instrumented::exec(&*conn, "UPDATE t SET v = ? WHERE id = ?", &params![i * 10, i])
                    .unwrap_err();
                let (_, params) = get(&*err).unwrap();
                params.to_vec()
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let i = i as i64;
        assert_eq!(handle.join().unwrap(), vec![DBValue::Int64(i * 10), DBValue::Int64(i)]);
    }
}
