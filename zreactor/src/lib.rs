//! # zreactor
//!
//! A single-threaded event loop for ZeroMQ sockets.
//!
//! One reactor thread polls an arbitrary set of sockets (REQ/REP,
//! PUSH/PULL, ROUTER/DEALER, PUB/SUB, PAIR) and hands every inbound payload
//! to an application callback. Other threads inject outbound payloads and
//! add or remove sockets through a loopback control channel instead of
//! sharing the sockets, which libzmq does not allow.
//!
//! ## Architecture
//!
//! - **`zreactor-core`**: socket handles, port-range binding, options
//! - **`zreactor`**: control channel, socket set, reactor (this crate)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use zreactor::prelude::*;
//!
//! # fn example() -> std::result::Result<(), Box<dyn std::error::Error>> {
//! let (tx, rx) = std::sync::mpsc::channel();
//! let reactor = Reactor::new(move |payload: String| {
//!     let _ = tx.send(payload);
//! })?;
//!
//! // Server socket on the first free port of [4321, 4323)
//! let range = PortRange::span(4321, 4323)?;
//! let server = SocketHandle::bind(Pattern::Rep, Transport::Tcp, "*", Some(range))?;
//! reactor.add_socket(server)?;
//!
//! // A client elsewhere talks to it
//! let mut client = SocketHandle::connect(Pattern::Req, Transport::Tcp, "127.0.0.1", Some(4321))?;
//! client.send("hello there...")?;
//! assert_eq!(rx.recv()?, "hello there...");
//!
//! // Reply through the single registered socket
//! reactor.push("OK")?;
//! assert_eq!(client.recv()?, "OK");
//!
//! reactor.join()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod command;
pub mod dev_tracing;
pub mod error;
pub mod handler;
pub mod pipe;
pub mod reactor;
mod socket_set;

pub use command::ControlCommand;
pub use error::{Error, Result};
pub use handler::MessageHandler;
pub use reactor::Reactor;

/// Everything needed to run a reactor.
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::handler::MessageHandler;
    pub use crate::reactor::Reactor;
    pub use zreactor_core::prelude::{
        Pattern, PortRange, Role, SocketHandle, SocketOptions, SocketStats, Transport,
    };
}
