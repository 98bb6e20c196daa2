//! Error types for the key/value server.
//!
//! Two families live here. [`CommandError`] is what a single protocol line can
//! fail with; it never escapes the command boundary and is written back to the
//! client as a fixed literal. [`ServerError`] covers the socket and task
//! failures that end a connection or, for a bind failure, the process.

use std::io;

/// A protocol-level failure for one command line.
///
/// The `Display` output is the literal sent on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// The line contained no tokens.
    #[error("emptycommand")]
    EmptyCommand,

    /// The first token is not a known command name.
    #[error("wrongcommand")]
    WrongCommand,

    /// A known command was called with too few arguments.
    #[error("protoerr")]
    Protocol,

    /// The key failed the strict format check (must start with a letter).
    #[error("invalidkey")]
    InvalidKey,
}

/// Failures outside the command protocol.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listening socket could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// A socket read or write failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A client sent more than the allowed bytes without a newline.
    #[error("line exceeds {limit} bytes")]
    LineTooLong { limit: usize },

    /// The dispatcher task is gone, so the request could not be queued or
    /// its reply never arrived.
    #[error("dispatcher is not running")]
    DispatcherClosed,
}

impl ServerError {
    pub(crate) fn bind(addr: impl Into<String>, source: io::Error) -> Self {
        ServerError::Bind {
            addr: addr.into(),
            source,
        }
    }
}

/// Outcome of a single command: the success bytes or a protocol error.
pub type Reply = Result<bytes::Bytes, CommandError>;

/// A specialized Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
