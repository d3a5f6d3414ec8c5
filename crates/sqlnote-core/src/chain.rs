pub mod context;
pub mod location;

/// A pending annotation, applied once the error it decorates exists.
pub type Annotator = Box<dyn FnOnce(anyhow::Error) -> anyhow::Error + Send>;

/// Apply `annotators` to `err` in order. The first annotator becomes the
/// innermost layer, directly around `err`.
pub fn decorate<I>(err: impl Into<anyhow::Error>, annotators: I) -> anyhow::Error
where
    I: IntoIterator<Item = Annotator>,
{
    let err: anyhow::Error = err.into();
    annotators
        .into_iter()
        .fold(err, |err, annotate| annotate(err))
}
