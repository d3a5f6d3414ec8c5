//! Tags database failures with the statement and parameters that caused them.
//!
//! ```
//! use sqlnote_core::{annotate, instrumented};
//! use sqlnote_host_traits::db::{mock::MockConnection, ErrorCode};
//! use sqlnote_host_traits::params;
//!
//! let db = MockConnection::new().fail_with(ErrorCode::ConstraintViolation);
//! let err = instrumented::exec(&db, "INSERT INTO t VALUES (?)", &params![42]).unwrap_err();
//!
//! let (query, params) = annotate::get(&*err).unwrap();
//! assert_eq!(query, "INSERT INTO t VALUES (?)");
//! assert_eq!(params.len(), 1);
//! ```

pub mod annotate;
pub mod chain;
pub mod instrumented;
pub mod stmt;

pub use annotate::{find_cause, get, wrap, with, QueryError};
pub use stmt::Stmt;
