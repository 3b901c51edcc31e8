use crate::Backend;

/// Errors produced by codec sessions.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An option was out of range or doesn't apply to the selected
    /// backend. No session (and no native codec state) was created.
    #[error("invalid session configuration: {0}")]
    Config(String),

    /// A call argument was malformed. The session is unaffected.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The native codec reported an unrecoverable fault. The codec state
    /// has been released and the session can't be used anymore.
    #[error("{backend} codec error: {message}")]
    Codec { backend: Backend, message: String },

    /// The session was already finished, disposed, or retired by an
    /// earlier codec error.
    #[error("session has been finalized")]
    SessionFinalized,

    /// The worker thread of a threaded session stopped before it
    /// delivered a result.
    #[error("session worker stopped before completing the operation")]
    WorkerStopped,

    /// The worker thread of a threaded session could not be started.
    #[error("failed to spawn session worker: {0}")]
    Spawn(#[source] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub(crate) fn codec(backend: Backend, message: impl Into<String>) -> Self {
        Self::Codec {
            backend,
            message: message.into(),
        }
    }
}

impl From<Error> for std::io::Error {
    fn from(error: Error) -> Self {
        let kind = match &error {
            Error::Config(_) | Error::InvalidArgument(_) => std::io::ErrorKind::InvalidInput,
            Error::Codec { .. } => std::io::ErrorKind::InvalidData,
            Error::SessionFinalized | Error::WorkerStopped => std::io::ErrorKind::BrokenPipe,
            Error::Spawn(_) => std::io::ErrorKind::Other,
        };
        std::io::Error::new(kind, error)
    }
}
