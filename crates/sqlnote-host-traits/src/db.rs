pub mod context;
pub mod db;
pub mod errors;
pub mod mock;

pub use context::Context;
pub use db::{
    Connection, DBConnection, DBRow, DBRows, DBStatement, DBTrait, DBValue, Exec, ExecResult,
    Prepare, Query, QueryContext, QueryRow, QueryRowContext, Row, RowHandle, Rows, Statement,
};
pub use errors::{Error, ErrorCode};
