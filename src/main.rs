use sqlnote_core::chain::{context, location};
use sqlnote_core::{annotate, instrumented};
use sqlnote_host_traits::db::{Context, DBConnection, DBValue, Rows};
use sqlnote_utils::config::Config;

use std::env;

use anyhow::{Context as _, Result};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    sqlnote_utils::log::logger::init_logger(&config.log_level)?;

    let mut args = env::args().skip(1);
    let Some(sql) = args.next() else {
        eprintln!("usage: sqlnote <sql> [params...]");
        std::process::exit(2);
    };
    let params: Vec<DBValue> = args.map(|arg| parse_param(&arg)).collect();

    let mut ctx = Context::new().with_value("command", "sqlnote");
    if let Some(timeout) = config.timeout() {
        ctx = ctx.with_timeout(timeout);
    }

    // Clones share the token, so Ctrl-C cancels the running statement
    let interrupt = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, cancelling");
            interrupt.cancel();
        }
    });

    let database = config.database.clone();
    let outcome =
        tokio::task::spawn_blocking(move || run(&database, &ctx, &sql, &params)).await?;

    if let Err(err) = outcome {
        report(&err);
        std::process::exit(1);
    }

    Ok(())
}

fn run(database: &str, ctx: &Context, sql: &str, params: &[DBValue]) -> Result<()> {
    let mut conn =
        sqlnote_db::open(database).with_context(|| format!("Failed to open {}", database))?;
    log::debug!("Opened {}", database);

    let result = if returns_rows(sql) {
        instrumented::query_context(ctx, &*conn, sql, params)
            .and_then(|rows| print_rows(rows, sql, params))
    } else {
        execute(&*conn, ctx, sql, params)
    };

    let closed = conn.close();
    result?;
    closed?;
    Ok(())
}

fn execute(conn: &dyn DBConnection, ctx: &Context, sql: &str, params: &[DBValue]) -> Result<()> {
    let stmt = instrumented::prepare_context(ctx, conn, sql)?;
    let result = stmt.exec_context(ctx, params);
    // The statement's own failure outranks a failure to release it
    let closed = stmt.close();
    let result = result?;
    closed?;

    match result.last_insert_id {
        Some(id) if result.rows_affected > 0 => {
            println!("{} row(s) affected, last insert id {}", result.rows_affected, id)
        }
        _ => println!("{} row(s) affected", result.rows_affected),
    }
    Ok(())
}

fn print_rows(mut rows: Rows, sql: &str, params: &[DBValue]) -> Result<()> {
    println!("{}", rows.columns().join("\t"));
    while let Some(row) = annotate::wrap(rows.next(), sql, params)? {
        let line: Vec<String> = row.0.iter().map(DBValue::to_string).collect();
        println!("{}", line.join("\t"));
    }
    rows.close()?;
    Ok(())
}

fn report(err: &anyhow::Error) {
    eprintln!("error: {:#}", err);

    if let Some((query, params)) = annotate::get(&**err) {
        let params: Vec<String> = params.iter().map(DBValue::to_string).collect();
        log::error!("query: {}", query);
        log::error!("params: [{}]", params.join(", "));
    }
    if let Some(values) = context::get(&**err) {
        log::error!("context: {:?}", values);
    }
    if let Some(location) = location::get(&**err) {
        log::error!("location: {}", location);
    }
}

fn returns_rows(sql: &str) -> bool {
    let upper = sql.trim_start().to_ascii_uppercase();
    let head = upper.split_whitespace().next().unwrap_or("");
    matches!(head, "SELECT" | "WITH" | "PRAGMA" | "VALUES" | "EXPLAIN")
        || upper.contains(" RETURNING ")
}

/// Command-line parameters: `null`, integers and floats are typed, everything else is text.
fn parse_param(arg: &str) -> DBValue {
    if arg.eq_ignore_ascii_case("null") {
        return DBValue::Null;
    }
    if let Ok(i) = arg.parse::<i64>() {
        return DBValue::Int64(i);
    }
    if let Ok(f) = arg.parse::<f64>() {
        return DBValue::Double(f);
    }
    DBValue::Str(arg.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlnote_host_traits::db::mock::MockConnection;
    use sqlnote_host_traits::db::{Error, ErrorCode};

    #[test]
    fn params_are_typed() {
        assert_eq!(parse_param("NULL"), DBValue::Null);
        assert_eq!(parse_param("-7"), DBValue::Int64(-7));
        assert_eq!(parse_param("2.5"), DBValue::Double(2.5));
        assert_eq!(parse_param("alice"), DBValue::Str("alice".to_string()));
    }

    #[test]
    fn row_returning_statements() {
        assert!(returns_rows("  select 1"));
        assert!(returns_rows("WITH x AS (SELECT 1) SELECT * FROM x"));
        assert!(returns_rows("DELETE FROM t WHERE id = ? RETURNING id"));
        assert!(!returns_rows("INSERT INTO t VALUES (?)"));
    }

    #[test]
    fn statement_failure_wins_over_close_failure() {
        let conn = MockConnection::new()
            .fail_statements_with(ErrorCode::ConstraintViolation)
            .fail_close_with(ErrorCode::CloseFailed);
        let ctx = Context::new();

        let err = execute(&conn, &ctx, "INSERT INTO t VALUES (?)", &[DBValue::Int64(1)])
            .unwrap_err();

        assert_eq!(
            annotate::find_cause::<Error>(&*err).map(|cause| cause.code),
            Some(ErrorCode::ConstraintViolation)
        );
        assert_eq!(
            annotate::get(&*err).unwrap().1,
            &[DBValue::Int64(1)][..]
        );
        assert_eq!(conn.closes(), 1);
    }

    #[test]
    fn close_failure_surfaces_after_success() {
        let conn = MockConnection::new().fail_close_with(ErrorCode::CloseFailed);
        let ctx = Context::new();

        let err = execute(&conn, &ctx, "DELETE FROM t", &[]).unwrap_err();
        assert_eq!(
            annotate::find_cause::<Error>(&*err).map(|cause| cause.code),
            Some(ErrorCode::CloseFailed)
        );
    }

    #[test]
    fn failures_are_annotated_end_to_end() {
        let ctx = Context::new().with_value("command", "test");
        let err = run(
            "sqlite::memory:",
            &ctx,
            "INSERT INTO missing (id) VALUES (?)",
            &[DBValue::Int64(1)],
        )
        .unwrap_err();

        let (query, params) = annotate::get(&*err).unwrap();
        assert_eq!(query, "INSERT INTO missing (id) VALUES (?)");
        assert!(params.is_empty());
        assert_eq!(location::get(&*err).unwrap().file(), file!());
    }
}
