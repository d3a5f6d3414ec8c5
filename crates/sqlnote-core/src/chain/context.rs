use crate::annotate::walk;
use sqlnote_host_traits::db::Context;

use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;

/// Snapshot of a [`Context`]'s metadata taken when an error was annotated.
#[derive(Debug)]
pub struct ContextError {
    cause: anyhow::Error,
    values: BTreeMap<String, String>,
}

impl ContextError {
    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "request context [")?;
        for (i, (key, value)) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", key, value)?;
        }
        write!(f, "]")
    }
}

impl StdError for ContextError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&*self.cause)
    }
}

/// Annotator recording `ctx`'s metadata as it is now. A context without
/// metadata adds no layer.
pub fn with(ctx: &Context) -> impl FnOnce(anyhow::Error) -> anyhow::Error + Send + 'static {
    let values = ctx.values().clone();
    move |cause| {
        if values.is_empty() {
            return cause;
        }
        anyhow::Error::new(ContextError { cause, values })
    }
}

/// Metadata of every context layer in the chain, merged. Outer layers win on
/// key conflicts. `None` if the chain has no context layer.
pub fn get(err: &(dyn StdError + 'static)) -> Option<BTreeMap<String, String>> {
    let mut merged: Option<BTreeMap<String, String>> = None;
    for layer in walk(err).filter_map(|layer| layer.downcast_ref::<ContextError>()) {
        let target = merged.get_or_insert_with(BTreeMap::new);
        for (key, value) in &layer.values {
            target
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }
    merged
}
