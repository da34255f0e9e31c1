use thiserror::Error;

/// Failure to deliver response metadata to the original caller
///
/// The resolver never surfaces this to handlers or callers; it is logged at
/// debug level and dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendHeaderError {
    #[error("no response header channel is attached to this call")]
    NoHeaderSender,

    #[error("response headers were already sent")]
    AlreadySent,

    #[error("invalid metadata value for {key}")]
    InvalidValue { key: &'static str },
}
