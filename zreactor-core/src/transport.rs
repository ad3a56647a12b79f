//! Transport abstraction for socket locations.
//!
//! Provides the protocol half of a location string and formats complete
//! locations for tcp, ipc and inproc transports.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Transport protocol of a socket location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    /// TCP transport: `tcp://host:port`
    Tcp,
    /// IPC transport (Unix domain socket): `ipc://path`
    Ipc,
    /// In-process transport: `inproc://name`
    Inproc,
}

impl Transport {
    /// Protocol name as used in a location prefix.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Ipc => "ipc",
            Self::Inproc => "inproc",
        }
    }

    /// Returns true if locations of this transport carry a port.
    pub fn uses_ports(&self) -> bool {
        matches!(self, Self::Tcp)
    }

    /// Build a location string.
    ///
    /// # Examples
    ///
    /// ```
    /// use zreactor_core::transport::Transport;
    ///
    /// assert_eq!(Transport::Tcp.location("127.0.0.1", Some(4321)), "tcp://127.0.0.1:4321");
    /// assert_eq!(Transport::Ipc.location("/tmp/app.ipc", None), "ipc:///tmp/app.ipc");
    /// ```
    pub fn location(&self, address: &str, port: Option<u16>) -> String {
        match port {
            Some(port) => format!("{}://{}:{}", self.as_str(), address, port),
            None => format!("{}://{}", self.as_str(), address),
        }
    }

    /// Reject transports a standalone handle cannot use.
    ///
    /// Each handle owns a private context, and inproc peers must share one.
    pub(crate) fn ensure_standalone(&self) -> Result<()> {
        match self {
            Self::Tcp => Ok(()),
            #[cfg(unix)]
            Self::Ipc => Ok(()),
            #[cfg(not(unix))]
            Self::Ipc => Err(Error::UnsupportedTransport(*self)),
            Self::Inproc => Err(Error::UnsupportedTransport(*self)),
        }
    }
}

impl FromStr for Transport {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "tcp" => Ok(Self::Tcp),
            "ipc" => Ok(Self::Ipc),
            "inproc" => Ok(Self::Inproc),
            other => Err(Error::InvalidTransport(other.to_string())),
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
