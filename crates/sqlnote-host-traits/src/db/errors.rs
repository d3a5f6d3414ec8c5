use std::fmt;

/// Error returned by a database backend.
///
/// `data` carries the backend's own error (for example a `rusqlite::Error`)
/// and is exposed through [`std::error::Error::source`].
#[derive(Debug)]
pub struct Error {
    pub code: ErrorCode,
    pub data: anyhow::Error,
}

impl Error {
    pub fn new(code: ErrorCode, data: impl Into<anyhow::Error>) -> Self {
        Self {
            code,
            data: data.into(),
        }
    }

    pub fn msg(code: ErrorCode, message: impl fmt::Display) -> Self {
        Self {
            code,
            data: anyhow::anyhow!("{}", message),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.code)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&*self.data)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    ConnectionFailed,
    QueryFailed,
    ExecuteFailed,
    PrepareFailed,
    CloseFailed,
    ConstraintViolation,
    /// A single-row query matched nothing.
    NoRows,
    /// The row handle was already taken.
    RowConsumed,
    Cancelled,
    DeadlineExceeded,
    NotEnabled,
    Unknown,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let description = match self {
            ErrorCode::ConnectionFailed => "connection failed",
            ErrorCode::QueryFailed => "query failed",
            ErrorCode::ExecuteFailed => "execute failed",
            ErrorCode::PrepareFailed => "prepare failed",
            ErrorCode::CloseFailed => "close failed",
            ErrorCode::ConstraintViolation => "constraint violation",
            ErrorCode::NoRows => "no rows in result set",
            ErrorCode::RowConsumed => "row already consumed",
            ErrorCode::Cancelled => "context cancelled",
            ErrorCode::DeadlineExceeded => "context deadline exceeded",
            ErrorCode::NotEnabled => "not enabled",
            ErrorCode::Unknown => "unknown",
        };
        write!(f, "{}", description)
    }
}
