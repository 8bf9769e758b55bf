// ABOUTME: Error types covering protocol, server, connection and submission failures
// ABOUTME: Provides a single thiserror-derived enum and crate-wide Result alias

use std::io;
use thiserror::Error;

/// The crate's error currency. Every fallible operation returns `RedisResult<T>`.
#[derive(Debug, Error)]
pub enum RedisError {
    /// The reply parser observed bytes that do not form a valid reply frame.
    /// Always fatal to the connection: the engine tears down and reconnects.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A `-` error reply from the server, paired with the command that
    /// produced it when known.
    #[error("server error ({command_used:?}): {message}")]
    Server {
        command_used: Option<String>,
        message: String,
    },

    /// The transport closed, ended, or errored. Both queues are drained with
    /// this error before reconnection is attempted.
    #[error("connection lost: {0}")]
    ConnectionGone(String),

    /// `max_attempts` or `connect_timeout` was reached; reconnection has
    /// given up permanently.
    #[error("retry attempts exhausted")]
    RetryExhausted,

    /// `send_command` rejected the submission itself (null value on
    /// `set`/`setex`, a non-subscribe command while in pub/sub mode, a
    /// non-string `auth` password).
    #[error("invalid submission: {0}")]
    Validation(String),

    /// Submission arrived while not ready and the offline queue is disabled.
    #[error("stream not writable")]
    NotWritable,

    /// The endpoint string passed to [`crate::Endpoint::parse`] could not be
    /// interpreted as a host/port, URL, or socket path.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Result type alias for this crate's operations.
pub type RedisResult<T> = Result<T, RedisError>;
