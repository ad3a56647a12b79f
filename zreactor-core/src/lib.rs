//! zreactor Core
//!
//! This crate contains the socket building blocks the reactor multiplexes:
//! - Messaging patterns (`socket_type`)
//! - Transports and location strings (`transport`)
//! - Socket options applied at creation (`options`)
//! - Port-range binding for server sockets (`port_range`)
//! - Bound/connected socket handles with text framing (`socket`)
//! - Error types (`error`)

#![deny(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod options;
pub mod port_range;
pub mod socket;
pub mod socket_type;
pub mod transport;

pub use zmq;

// Keep it minimal to avoid API lock-in.
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::options::SocketOptions;
    pub use crate::port_range::PortRange;
    pub use crate::socket::{Role, SocketHandle, SocketStats};
    pub use crate::socket_type::Pattern;
    pub use crate::transport::Transport;
}
