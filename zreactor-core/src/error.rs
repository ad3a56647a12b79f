/// Socket handle error types
///
/// Every failure a `SocketHandle` or the port-range binder can report.

use thiserror::Error;

use crate::port_range::PortRange;
use crate::socket_type::Pattern;
use crate::transport::Transport;

/// Main error type for socket handle operations
#[derive(Error, Debug)]
pub enum Error {
    /// Error reported by the underlying messaging library
    #[error("zmq error: {0}")]
    Zmq(#[from] zmq::Error),

    /// Port outside the usable range (1..=65535)
    #[error("Invalid port: {0}")]
    InvalidPort(u32),

    /// Port range that is empty, inverted, or has the wrong arity
    #[error("Invalid port range: {0}")]
    InvalidPortRange(String),

    /// Protocol name that is not one of tcp, ipc, inproc
    #[error("Invalid transport: {0}")]
    InvalidTransport(String),

    /// Transport that standalone socket handles cannot use
    #[error("Transport {0} is not supported for socket handles")]
    UnsupportedTransport(Transport),

    /// Empty bind or connect address
    #[error("Address must not be empty")]
    EmptyAddress,

    /// tcp client without a port, or ipc client with one
    #[error("Port {0} for transport {1}")]
    MissingPort(&'static str, Transport),

    /// Every port in the range refused the bind
    #[error("No port in {range} could be bound on {address} (last error: {last_error})")]
    PortRangeExhausted {
        /// Address the bind was attempted on
        address: String,
        /// Ports that were tried
        range: PortRange,
        /// Failure reported for the last port
        last_error: zmq::Error,
    },

    /// Operation that does not apply to the socket's pattern
    #[error("{operation} is not supported on {pattern} sockets")]
    WrongPattern {
        /// Name of the rejected operation
        operation: &'static str,
        /// Pattern of the socket it was attempted on
        pattern: Pattern,
    },

    /// Received message with an unexpected shape
    #[error("Malformed message: {0}")]
    MalformedMessage(String),
}

/// Result type alias for socket handle operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an invalid port range error with a message
    pub fn invalid_port_range(msg: impl Into<String>) -> Self {
        Self::InvalidPortRange(msg.into())
    }

    /// Create a malformed message error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedMessage(msg.into())
    }

    /// Create a wrong pattern error
    pub const fn wrong_pattern(operation: &'static str, pattern: Pattern) -> Self {
        Self::WrongPattern { operation, pattern }
    }

    /// Check if this error was raised while constructing or binding a handle.
    ///
    /// These are never retried.
    #[must_use]
    pub const fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidPort(_)
                | Self::InvalidPortRange(_)
                | Self::InvalidTransport(_)
                | Self::UnsupportedTransport(_)
                | Self::EmptyAddress
                | Self::MissingPort(..)
                | Self::PortRangeExhausted { .. }
        )
    }

    /// Check if this error is a misuse of the handle API
    #[must_use]
    pub const fn is_contract_violation(&self) -> bool {
        matches!(self, Self::WrongPattern { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(Error::InvalidPort(0).is_configuration_error());
        assert!(Error::EmptyAddress.is_configuration_error());
        assert!(!Error::InvalidPort(0).is_contract_violation());

        let err = Error::wrong_pattern("send_to", Pattern::Rep);
        assert!(err.is_contract_violation());
        assert!(!err.is_configuration_error());
        assert_eq!(err.to_string(), "send_to is not supported on REP sockets");
    }

    #[test]
    fn test_exhausted_message() {
        let err = Error::PortRangeExhausted {
            address: "*".to_string(),
            range: PortRange::span(4321, 4323).unwrap(),
            last_error: zmq::Error::EADDRINUSE,
        };
        assert!(err.is_configuration_error());
        assert!(err.to_string().starts_with("No port in [4321, 4323) could be bound on *"));
    }
}
