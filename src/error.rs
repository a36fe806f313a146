use std::error::Error;

/// Failure of [`PrettyHandler::handle`](crate::handler::PrettyHandler::handle).
///
/// Both variants carry the name of the operation that failed so that a
/// front end printing the error can tell where it came from.
#[derive(thiserror::Error, Debug)]
pub enum HandlerError {
    /// The wrapped encoder could not serialize the record.
    #[error("{op}: encoding failed: {source}")]
    Encode {
        op: &'static str,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },

    /// The captured encoder output could not be turned back into an
    /// attribute mapping, or the mapping could not be re-rendered.
    #[error("{op}: decoding failed: {source}")]
    Decode {
        op: &'static str,
        #[source]
        source: serde_json::Error,
    },
}
