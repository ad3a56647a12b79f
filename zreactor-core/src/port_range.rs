//! Port-range binding for server sockets.
//!
//! A server socket is given either a single port or a half-open range
//! `[lo, hi)`. Ports are tried in ascending order and the first one that
//! binds becomes part of the socket's location. A failed bind only moves on
//! to the next candidate; running out of candidates is fatal.

use std::fmt;

use tracing::debug;

use crate::error::{Error, Result};
use crate::transport::Transport;

/// Candidate ports for a server bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    first: u16,
    last: u16,
}

impl PortRange {
    /// A range holding exactly one port.
    pub fn single(port: u16) -> Result<Self> {
        if port == 0 {
            return Err(Error::InvalidPort(0));
        }
        Ok(Self {
            first: port,
            last: port,
        })
    }

    /// The half-open range `[lo, hi)`.
    pub fn span(lo: u16, hi: u16) -> Result<Self> {
        if lo == 0 {
            return Err(Error::InvalidPort(0));
        }
        if lo >= hi {
            return Err(Error::invalid_port_range(format!(
                "low port {lo} must be below high port {hi}"
            )));
        }
        Ok(Self {
            first: lo,
            last: hi - 1,
        })
    }

    /// First port that will be attempted.
    pub fn first(&self) -> u16 {
        self.first
    }

    /// Number of candidate ports.
    pub fn len(&self) -> usize {
        usize::from(self.last - self.first) + 1
    }

    /// Always false: a range holds at least one port.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Candidate ports in bind order.
    pub fn ports(&self) -> impl Iterator<Item = u16> {
        self.first..=self.last
    }

    /// Check whether `port` is one of the candidates.
    pub fn contains(&self, port: u16) -> bool {
        (self.first..=self.last).contains(&port)
    }
}

impl TryFrom<&[u16]> for PortRange {
    type Error = Error;

    /// Accepts `[port]` or `[lo, hi]`, the latter meaning `[lo, hi)`.
    fn try_from(ports: &[u16]) -> Result<Self> {
        match *ports {
            [port] => Self::single(port),
            [lo, hi] => Self::span(lo, hi),
            _ => Err(Error::invalid_port_range(format!(
                "expected one or two ports, got {}",
                ports.len()
            ))),
        }
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.first == self.last {
            write!(f, "[{}]", self.first)
        } else {
            write!(f, "[{}, {})", self.first, u32::from(self.last) + 1)
        }
    }
}

/// Bind `socket` to the first free port of `range` on `address`.
///
/// Returns the bound location and the chosen port.
pub fn bind_in_range(
    socket: &zmq::Socket,
    transport: Transport,
    address: &str,
    range: PortRange,
) -> Result<(String, u16)> {
    let mut last_error = zmq::Error::EADDRINUSE;

    for port in range.ports() {
        let location = transport.location(address, Some(port));
        match socket.bind(&location) {
            Ok(()) => {
                debug!(%location, "bound to port {}", port);
                return Ok((location, port));
            }
            Err(e) => {
                debug!(%location, error = %e, "failed to bind, trying next port");
                last_error = e;
            }
        }
    }

    Err(Error::PortRangeExhausted {
        address: address.to_string(),
        range,
        last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_port() {
        let range = PortRange::single(4321).unwrap();
        assert_eq!(range.len(), 1);
        assert_eq!(range.ports().collect::<Vec<_>>(), vec![4321]);
        assert_eq!(range.to_string(), "[4321]");
    }

    #[test]
    fn test_span_is_half_open() {
        let range = PortRange::span(4321, 4323).unwrap();
        assert_eq!(range.ports().collect::<Vec<_>>(), vec![4321, 4322]);
        assert!(!range.contains(4323));
        assert_eq!(range.to_string(), "[4321, 4323)");
    }

    #[test]
    fn test_span_reaching_top_port() {
        let range = PortRange::span(65534, 65535).unwrap();
        assert_eq!(range.ports().collect::<Vec<_>>(), vec![65534]);
    }

    #[test]
    fn test_invalid_ranges() {
        assert!(matches!(PortRange::single(0), Err(Error::InvalidPort(0))));
        assert!(matches!(PortRange::span(0, 10), Err(Error::InvalidPort(0))));
        assert!(matches!(
            PortRange::span(4323, 4321),
            Err(Error::InvalidPortRange(_))
        ));
        assert!(matches!(
            PortRange::span(4321, 4321),
            Err(Error::InvalidPortRange(_))
        ));
    }

    #[test]
    fn test_try_from_slice() {
        let single = PortRange::try_from(&[4321u16][..]).unwrap();
        assert_eq!(single, PortRange::single(4321).unwrap());

        let span = PortRange::try_from(&[4321u16, 4323][..]).unwrap();
        assert_eq!(span.first(), 4321);
        assert_eq!(span.len(), 2);

        let empty: &[u16] = &[];
        assert!(PortRange::try_from(empty).is_err());
        assert!(PortRange::try_from(&[1u16, 2, 3][..]).is_err());
    }
}
