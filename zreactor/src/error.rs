/// Reactor error types
///
/// Failures of the control channel, the reactor loop and the public
/// `Reactor` operations.

use std::io;
use thiserror::Error;

use zreactor_core::socket_type::Pattern;

/// Main error type for reactor operations
#[derive(Error, Debug)]
pub enum Error {
    /// Error from a socket handle
    #[error(transparent)]
    Core(#[from] zreactor_core::error::Error),

    /// Error reported by the underlying messaging library
    #[error("zmq error: {0}")]
    Zmq(#[from] zmq::Error),

    /// Control frame with a header other than MSG, KILL or PASS
    #[error("Invalid control header: {0:?}")]
    UnknownCommand(String),

    /// A socket with this location is already registered
    #[error("Socket already registered: {0}")]
    DuplicateLocation(String),

    /// No socket with this location is registered
    #[error("Socket not registered: {0}")]
    UnknownLocation(String),

    /// `push` needs exactly one registered socket
    #[error("push requires exactly one registered socket, found {0}")]
    SocketCardinality(usize),

    /// Operation that does not apply to the registered socket's pattern
    #[error("{operation} is not supported on {pattern} sockets")]
    WrongPattern {
        /// Name of the rejected operation
        operation: &'static str,
        /// Pattern of the socket it was attempted on
        pattern: Pattern,
    },

    /// The reactor has been closed or its thread has exited
    #[error("Reactor closed")]
    ReactorClosed,

    /// Producer operation invoked from the reactor thread itself
    #[error("{0} cannot be called from the reactor thread")]
    ReentrantCall(&'static str),

    /// The reactor thread panicked
    #[error("Reactor thread panicked")]
    ThreadPanicked,

    /// The reactor thread could not be started
    #[error("Failed to spawn reactor thread: {0}")]
    Spawn(#[source] io::Error),
}

/// Result type alias for reactor operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an unknown command error from the offending header
    pub fn unknown_command(header: impl Into<String>) -> Self {
        Self::UnknownCommand(header.into())
    }

    /// Check if this error is a programming error on the caller's side.
    ///
    /// These are never recovered: the offending thread is expected to stop.
    #[must_use]
    pub fn is_contract_violation(&self) -> bool {
        match self {
            Self::Core(e) => e.is_contract_violation(),
            Self::UnknownCommand(_)
            | Self::DuplicateLocation(_)
            | Self::UnknownLocation(_)
            | Self::SocketCardinality(_)
            | Self::WrongPattern { .. }
            | Self::ReentrantCall(_) => true,
            _ => false,
        }
    }

    /// Check if this error comes from socket construction or binding
    #[must_use]
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::Core(e) if e.is_configuration_error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_violations() {
        assert!(Error::SocketCardinality(0).is_contract_violation());
        assert!(Error::unknown_command("HELLO").is_contract_violation());
        assert!(Error::DuplicateLocation("tcp://*:1".into()).is_contract_violation());
        assert!(!Error::ReactorClosed.is_contract_violation());
        assert!(!Error::ThreadPanicked.is_contract_violation());
    }

    #[test]
    fn test_core_errors_keep_their_class() {
        let err: Error = zreactor_core::error::Error::InvalidPort(0).into();
        assert!(err.is_configuration_error());
        assert!(!err.is_contract_violation());
        assert_eq!(err.to_string(), "Invalid port: 0");
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Error::SocketCardinality(2).to_string(),
            "push requires exactly one registered socket, found 2"
        );
        assert_eq!(
            Error::unknown_command("HELLO").to_string(),
            "Invalid control header: \"HELLO\""
        );
    }
}
