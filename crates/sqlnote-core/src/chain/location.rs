use crate::annotate::find_cause;

use std::error::Error as StdError;
use std::fmt;
use std::panic::Location;

/// The source location that detected a failure.
#[derive(Debug)]
pub struct LocationError {
    cause: anyhow::Error,
    location: &'static Location<'static>,
}

impl LocationError {
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }
}

impl fmt::Display for LocationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "at {}", self.location)
    }
}

impl StdError for LocationError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&*self.cause)
    }
}

pub fn at(
    location: &'static Location<'static>,
) -> impl FnOnce(anyhow::Error) -> anyhow::Error + Send + 'static {
    move |cause| anyhow::Error::new(LocationError { cause, location })
}

/// Annotator recording the location of its own caller.
#[track_caller]
pub fn here() -> impl FnOnce(anyhow::Error) -> anyhow::Error + Send + 'static {
    at(Location::caller())
}

/// Outermost recorded location in the chain.
pub fn get(err: &(dyn StdError + 'static)) -> Option<&'static Location<'static>> {
    find_cause::<LocationError>(err).map(LocationError::location)
}
