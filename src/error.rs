use thiserror::Error;

use crate::frame::Frame;

/// Advisory classification of a failure, consumed by recovery loops built
/// above the client. The client itself never acts on the hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Restart {
    /// Unrecoverable with the same inputs (refused connection, refused
    /// credentials). Give up.
    Abort,
    /// The connection is broken or the conversation lost sync. Drop it and
    /// establish a fresh one.
    Reconnect,
    /// Transient per-message anomaly. The same operation may simply be
    /// retried on the same connection.
    Retry,
}

/// Connection-level failure causes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// The connection is already closed, or became closed mid-operation.
    #[error("connection closed")]
    Closed,
    /// The transport refused the connection at open time.
    #[error("connection refused")]
    ConnectionRefused,
    /// The server rejected the supplied credentials during the handshake.
    #[error("access refused")]
    AccessRefused,
}

/// What went wrong, independent of the restartability hint.
#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),
    /// The server sent a frame the protocol state machine did not expect.
    /// The offending frame is carried for inspection.
    #[error("unexpected {} frame", .0.command)]
    Protocol(Frame),
    /// Reserved for broker-node-level failures; not produced by this crate.
    #[error("node error: {0}")]
    Node(String),
}

/// Error type returned by every public operation: a restartability hint, an
/// error kind, and a human-readable context string.
#[derive(Debug, Error)]
#[error("{context}: {kind}")]
pub struct StompError {
    pub restart: Restart,
    pub kind: ErrorKind,
    pub context: String,
}

impl StompError {
    pub fn new(restart: Restart, kind: ErrorKind, context: impl Into<String>) -> Self {
        Self {
            restart,
            kind,
            context: context.into(),
        }
    }

    pub fn abort(kind: ErrorKind, context: impl Into<String>) -> Self {
        Self::new(Restart::Abort, kind, context)
    }

    pub fn reconnect(kind: ErrorKind, context: impl Into<String>) -> Self {
        Self::new(Restart::Reconnect, kind, context)
    }

    pub fn retry(kind: ErrorKind, context: impl Into<String>) -> Self {
        Self::new(Restart::Retry, kind, context)
    }

    /// Shorthand for the most common failure: the connection is (or just
    /// became) closed.
    pub(crate) fn closed(context: impl Into<String>) -> Self {
        Self::reconnect(ErrorKind::Connection(ConnectionError::Closed), context)
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, StompError>;
