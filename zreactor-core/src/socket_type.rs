//! Messaging pattern enumeration.
//!
//! This module provides the `Pattern` enum which names the socket types a
//! `SocketHandle` can wrap, and maps them onto libzmq socket types.

use std::fmt;

/// ZeroMQ messaging patterns supported by socket handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pattern {
    /// PAIR socket for exclusive bidirectional communication
    Pair,

    /// PUB socket for publishing messages to subscribers
    Pub,

    /// SUB socket for subscribing to published messages
    Sub,

    /// REQ socket for synchronous request-reply client
    Req,

    /// REP socket for synchronous request-reply server
    Rep,

    /// DEALER socket for asynchronous request-reply patterns
    Dealer,

    /// ROUTER socket for routing messages by identity
    Router,

    /// PULL socket for receiving messages from pushers
    Pull,

    /// PUSH socket for sending messages to pullers
    Push,
}

impl Pattern {
    /// Get the pattern as a string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pair => "PAIR",
            Self::Pub => "PUB",
            Self::Sub => "SUB",
            Self::Req => "REQ",
            Self::Rep => "REP",
            Self::Dealer => "DEALER",
            Self::Router => "ROUTER",
            Self::Pull => "PULL",
            Self::Push => "PUSH",
        }
    }

    /// The libzmq socket type backing this pattern.
    pub fn zmq_type(&self) -> zmq::SocketType {
        match self {
            Self::Pair => zmq::PAIR,
            Self::Pub => zmq::PUB,
            Self::Sub => zmq::SUB,
            Self::Req => zmq::REQ,
            Self::Rep => zmq::REP,
            Self::Dealer => zmq::DEALER,
            Self::Router => zmq::ROUTER,
            Self::Pull => zmq::PULL,
            Self::Push => zmq::PUSH,
        }
    }

    /// Whether frames carry a peer address (ROUTER only).
    pub fn is_addressed(&self) -> bool {
        matches!(self, Self::Router)
    }

    /// Whether sockets of this pattern can send at all.
    pub fn can_send(&self) -> bool {
        !matches!(self, Self::Sub | Self::Pull)
    }

    /// Whether sockets of this pattern can receive at all.
    pub fn can_recv(&self) -> bool {
        !matches!(self, Self::Pub | Self::Push)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
