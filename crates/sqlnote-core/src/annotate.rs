use sqlnote_host_traits::db::DBValue;

use std::error::Error as StdError;
use std::fmt;

/// Upper bound on the number of layers [`walk`] visits.
pub const MAX_CHAIN_DEPTH: usize = 64;

/// A failure tagged with the statement text and bound parameters that caused it.
///
/// The original failure stays reachable through [`StdError::source`].
#[derive(Debug)]
pub struct QueryError {
    cause: anyhow::Error,
    query: String,
    params: Vec<DBValue>,
}

impl QueryError {
    pub fn new(
        cause: impl Into<anyhow::Error>,
        query: impl Into<String>,
        params: impl Into<Vec<DBValue>>,
    ) -> Self {
        Self {
            cause: cause.into(),
            query: query.into(),
            params: params.into(),
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn params(&self) -> &[DBValue] {
        &self.params
    }

    pub fn cause(&self) -> &anyhow::Error {
        &self.cause
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "executing `{}`", self.query)
    }
}

impl StdError for QueryError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&*self.cause)
    }
}

/// Tag a failed result with `query` and `params`. `Ok` passes through untouched.
pub fn wrap<T, E>(result: Result<T, E>, query: &str, params: &[DBValue]) -> anyhow::Result<T>
where
    E: Into<anyhow::Error>,
{
    result.map_err(|cause| anyhow::Error::new(QueryError::new(cause, query, params)))
}

/// A deferred [`wrap`], for composing with other annotators in
/// [`crate::chain::decorate`].
pub fn with(
    query: impl Into<String>,
    params: impl Into<Vec<DBValue>>,
) -> impl FnOnce(anyhow::Error) -> anyhow::Error + Send + 'static {
    let query = query.into();
    let params = params.into();
    move |cause| anyhow::Error::new(QueryError::new(cause, query, params))
}

/// Query text and parameters of the first [`QueryError`] in the chain.
///
/// For an `anyhow::Error`, pass `&*err`.
pub fn get<'a>(err: &'a (dyn StdError + 'static)) -> Option<(&'a str, &'a [DBValue])> {
    find_cause::<QueryError>(err).map(|tagged| (tagged.query(), tagged.params()))
}

/// First error of type `E` in the chain, starting with `err` itself.
pub fn find_cause<'a, E>(err: &'a (dyn StdError + 'static)) -> Option<&'a E>
where
    E: StdError + 'static,
{
    walk(err).find_map(|layer| layer.downcast_ref::<E>())
}

/// `err` followed by its sources, at most [`MAX_CHAIN_DEPTH`] layers.
pub fn walk<'a>(
    err: &'a (dyn StdError + 'static),
) -> impl Iterator<Item = &'a (dyn StdError + 'static)> {
    std::iter::successors(Some(err), |&layer| layer.source()).take(MAX_CHAIN_DEPTH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlnote_host_traits::db::{Error, ErrorCode};
    use sqlnote_host_traits::params;

    #[derive(Debug)]
    struct Outer(anyhow::Error);

    impl fmt::Display for Outer {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            write!(f, "loading user")
        }
    }

    impl StdError for Outer {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&*self.0)
        }
    }

    fn delegate_failure() -> Error {
        Error::msg(ErrorCode::ConstraintViolation, "UNIQUE constraint failed: t.id")
    }

    #[test]
    fn get_returns_what_wrap_stored() {
        let err = wrap(Err::<(), _>(delegate_failure()), "INSERT INTO t VALUES (?)", &params![42])
            .unwrap_err();

        let (query, params) = get(&*err).unwrap();
        assert_eq!(query, "INSERT INTO t VALUES (?)");
        assert_eq!(params, &[DBValue::Int32(42)]);
    }

    #[test]
    fn wrap_passes_ok_through() {
        let result = wrap(Ok::<_, Error>(5), "SELECT 5", &[]);
        assert_eq!(result.unwrap(), 5);
    }

    #[test]
    fn cause_kind_survives_wrapping() {
        let err = wrap(Err::<(), _>(delegate_failure()), "INSERT", &[]).unwrap_err();
        let cause = find_cause::<Error>(&*err).unwrap();
        assert_eq!(cause.code, ErrorCode::ConstraintViolation);
    }

    #[test]
    fn get_is_none_without_tag() {
        let err = anyhow::Error::new(delegate_failure());
        assert!(get(&*err).is_none());
    }

    #[test]
    fn get_sees_through_foreign_layers() {
        let tagged = wrap(Err::<(), _>(delegate_failure()), "SELECT * FROM users WHERE id = ?", &params![7i64])
            .unwrap_err();
        let outer = Outer(tagged.context("handling request"));

        let (query, params) = get(&outer).unwrap();
        assert_eq!(query, "SELECT * FROM users WHERE id = ?");
        assert_eq!(params, &[DBValue::Int64(7)]);
        assert!(find_cause::<Error>(&outer).is_some());
    }

    #[test]
    fn with_applies_like_wrap() {
        let annotate = with("DELETE FROM t WHERE id = ?", params![None::<i32>]);
        let err = annotate(anyhow::Error::new(delegate_failure()));

        let (query, params) = get(&*err).unwrap();
        assert_eq!(query, "DELETE FROM t WHERE id = ?");
        assert_eq!(params, &[DBValue::Null]);
    }

    #[test]
    fn first_tag_wins_when_nested() {
        let inner = wrap(Err::<(), _>(delegate_failure()), "inner", &[]).unwrap_err();
        let outer = wrap(Err::<(), _>(inner), "outer", &[]).unwrap_err();
        assert_eq!(get(&*outer).unwrap().0, "outer");
    }

    #[test]
    fn display_names_the_query_only() {
        let err = wrap(Err::<(), _>(delegate_failure()), "SELECT 1", &params!["secret"]).unwrap_err();
        assert_eq!(err.to_string(), "executing `SELECT 1`");
        assert_eq!(
            format!("{:#}", err),
            "executing `SELECT 1`: constraint violation: UNIQUE constraint failed: t.id"
        );
    }
}
