//! Socket handle: one libzmq socket with its own context.
//!
//! A `SocketHandle` is created already bound (server role) or connected
//! (client role), so its location is fixed for its whole life. Dropping the
//! handle, or calling [`SocketHandle::close`], releases the socket and its
//! private context exactly once.
//!
//! # Framing
//!
//! Every application payload is one text frame. ROUTER sockets add the
//! usual envelope around it: an address frame and an empty delimiter. DEALER
//! sockets send the empty delimiter themselves so that a ROUTER peer sees the
//! same three frames a REQ client would produce.

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::options::SocketOptions;
use crate::port_range::{bind_in_range, PortRange};
use crate::socket_type::Pattern;
use crate::transport::Transport;

/// Whether the handle was bound or connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Bound to a local location
    Server,
    /// Connected to a remote location
    Client,
}

/// Per-handle traffic counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SocketStats {
    /// Payloads received
    pub rx_ok: u64,
    /// Payloads sent
    pub tx_ok: u64,
    /// Addressed messages dropped for having the wrong number of frames
    pub rx_err_short: u64,
}

/// An owned, bound or connected messaging socket.
pub struct SocketHandle {
    socket: zmq::Socket,
    _context: zmq::Context,
    pattern: Pattern,
    transport: Transport,
    location: String,
    role: Role,
    stats: SocketStats,
}

impl SocketHandle {
    /// Bind a server socket with default options.
    ///
    /// For tcp every port of `ports` is tried in order; ipc ignores `ports`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use zreactor_core::prelude::*;
    ///
    /// let range = PortRange::span(4321, 4323)?;
    /// let server = SocketHandle::bind(Pattern::Rep, Transport::Tcp, "*", Some(range))?;
    /// assert!(server.location().starts_with("tcp://*:432"));
    /// # Ok::<(), zreactor_core::error::Error>(())
    /// ```
    pub fn bind(
        pattern: Pattern,
        transport: Transport,
        address: &str,
        ports: Option<PortRange>,
    ) -> Result<Self> {
        Self::bind_with_options(pattern, transport, address, ports, &SocketOptions::default())
    }

    /// Bind a server socket with custom options.
    pub fn bind_with_options(
        pattern: Pattern,
        transport: Transport,
        address: &str,
        ports: Option<PortRange>,
        options: &SocketOptions,
    ) -> Result<Self> {
        validate(transport, address)?;
        if transport.uses_ports() && ports.is_none() {
            return Err(Error::MissingPort("required", transport));
        }

        let (context, socket) = create(pattern, options)?;
        let location = match (transport.uses_ports(), ports) {
            (true, Some(range)) => bind_in_range(&socket, transport, address, range)?.0,
            _ => {
                let location = transport.location(address, None);
                socket.bind(&location)?;
                location
            }
        };
        debug!(%location, %pattern, "socket bound");

        Ok(Self::new(context, socket, pattern, transport, location, Role::Server))
    }

    /// Connect a client socket with default options.
    ///
    /// `port` is required for tcp and must be `None` for ipc.
    pub fn connect(
        pattern: Pattern,
        transport: Transport,
        address: &str,
        port: Option<u16>,
    ) -> Result<Self> {
        Self::connect_with_options(pattern, transport, address, port, &SocketOptions::default())
    }

    /// Connect a client socket with custom options.
    pub fn connect_with_options(
        pattern: Pattern,
        transport: Transport,
        address: &str,
        port: Option<u16>,
        options: &SocketOptions,
    ) -> Result<Self> {
        validate(transport, address)?;
        match (transport.uses_ports(), port) {
            (true, None) => return Err(Error::MissingPort("required", transport)),
            (true, Some(0)) => return Err(Error::InvalidPort(0)),
            (false, Some(_)) => return Err(Error::MissingPort("not allowed", transport)),
            _ => {}
        }

        let (context, socket) = create(pattern, options)?;
        let location = transport.location(address, port);
        socket.connect(&location)?;
        debug!(%location, %pattern, "socket connected");

        Ok(Self::new(context, socket, pattern, transport, location, Role::Client))
    }

    fn new(
        context: zmq::Context,
        socket: zmq::Socket,
        pattern: Pattern,
        transport: Transport,
        location: String,
        role: Role,
    ) -> Self {
        Self {
            socket,
            _context: context,
            pattern,
            transport,
            location,
            role,
            stats: SocketStats::default(),
        }
    }

    /// Location this handle was bound or connected to.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Messaging pattern of the socket.
    pub fn pattern(&self) -> Pattern {
        self.pattern
    }

    /// Transport of the location.
    pub fn transport(&self) -> Transport {
        self.transport
    }

    /// Whether the handle is bound or connected.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Traffic counters.
    pub fn stats(&self) -> SocketStats {
        self.stats
    }

    /// Readiness entry for `zmq::poll`.
    pub fn as_poll_item(&self, events: zmq::PollEvents) -> zmq::PollItem<'_> {
        self.socket.as_poll_item(events)
    }

    /// Send one payload, blocking under back-pressure.
    pub fn send(&mut self, payload: &str) -> Result<()> {
        if self.pattern.is_addressed() || !self.pattern.can_send() {
            return Err(Error::wrong_pattern("send", self.pattern));
        }
        trace!(location = %self.location, "sending: {}", payload);

        if self.pattern == Pattern::Dealer {
            self.socket.send(&b""[..], zmq::SNDMORE)?;
        }
        self.socket.send(payload.as_bytes(), 0)?;
        self.stats.tx_ok += 1;
        Ok(())
    }

    /// Send one payload to the peer identified by `address` (ROUTER only).
    pub fn send_to(&mut self, address: &[u8], payload: &str) -> Result<()> {
        if !self.pattern.is_addressed() {
            return Err(Error::wrong_pattern("send_to", self.pattern));
        }
        trace!(location = %self.location, address = ?address, "sending: {}", payload);

        self.socket.send(address, zmq::SNDMORE)?;
        self.socket.send(&b""[..], zmq::SNDMORE)?;
        self.socket.send(payload.as_bytes(), 0)?;
        self.stats.tx_ok += 1;
        Ok(())
    }

    /// Block until one payload arrives.
    ///
    /// An empty frame is returned as an empty string.
    pub fn recv(&mut self) -> Result<String> {
        self.ensure_unaddressed_recv()?;
        let frames = self.socket.recv_multipart(0)?;
        self.unframe(frames)
    }

    /// Block until one addressed payload arrives (ROUTER only).
    ///
    /// Returns the peer address and the payload; the delimiter frame is
    /// consumed here.
    pub fn recv_from(&mut self) -> Result<(Vec<u8>, String)> {
        if !self.pattern.is_addressed() {
            return Err(Error::wrong_pattern("recv_from", self.pattern));
        }
        let frames = self.socket.recv_multipart(0)?;
        self.unframe_addressed(frames)
    }

    /// Receive one payload if one is queued, without blocking.
    ///
    /// ROUTER sockets return the address alongside the payload; every other
    /// pattern returns `None` for it.
    pub fn try_recv(&mut self) -> Result<Option<(Option<Vec<u8>>, String)>> {
        if !self.pattern.can_recv() {
            return Err(Error::wrong_pattern("try_recv", self.pattern));
        }
        let frames = match self.socket.recv_multipart(zmq::DONTWAIT) {
            Ok(frames) => frames,
            Err(zmq::Error::EAGAIN) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if self.pattern.is_addressed() {
            let (address, payload) = self.unframe_addressed(frames)?;
            Ok(Some((Some(address), payload)))
        } else {
            Ok(Some((None, self.unframe(frames)?)))
        }
    }

    /// Add a subscription prefix (SUB only).
    pub fn subscribe(&mut self, prefix: &str) -> Result<()> {
        if self.pattern != Pattern::Sub {
            return Err(Error::wrong_pattern("subscribe", self.pattern));
        }
        debug!(location = %self.location, "subscribing to <{}>", prefix);
        self.socket.set_subscribe(prefix.as_bytes())?;
        Ok(())
    }

    /// Release the socket and its context.
    pub fn close(self) {
        debug!(location = %self.location, "closing socket");
    }

    fn ensure_unaddressed_recv(&self) -> Result<()> {
        if self.pattern.is_addressed() || !self.pattern.can_recv() {
            return Err(Error::wrong_pattern("recv", self.pattern));
        }
        Ok(())
    }

    // The payload is the last frame; a DEALER sees a leading empty delimiter.
    fn unframe(&mut self, mut frames: Vec<Vec<u8>>) -> Result<String> {
        let payload = frames.pop().unwrap_or_default();
        let payload = decode(payload)?;
        trace!(location = %self.location, "received: {}", payload);
        self.stats.rx_ok += 1;
        Ok(payload)
    }

    fn unframe_addressed(&mut self, frames: Vec<Vec<u8>>) -> Result<(Vec<u8>, String)> {
        let [address, delimiter, payload]: [Vec<u8>; 3] = match frames.try_into() {
            Ok(frames) => frames,
            Err(frames) => {
                self.stats.rx_err_short += 1;
                return Err(Error::malformed(format!(
                    "expected 3 frames from ROUTER socket, got {}",
                    frames.len()
                )));
            }
        };
        if !delimiter.is_empty() {
            self.stats.rx_err_short += 1;
            return Err(Error::malformed("missing empty delimiter frame"));
        }

        let payload = decode(payload)?;
        trace!(location = %self.location, address = ?address, "received: {}", payload);
        self.stats.rx_ok += 1;
        Ok((address, payload))
    }
}

impl std::fmt::Debug for SocketHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketHandle")
            .field("pattern", &self.pattern)
            .field("location", &self.location)
            .field("role", &self.role)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

fn validate(transport: Transport, address: &str) -> Result<()> {
    transport.ensure_standalone()?;
    if address.is_empty() {
        return Err(Error::EmptyAddress);
    }
    Ok(())
}

fn create(pattern: Pattern, options: &SocketOptions) -> Result<(zmq::Context, zmq::Socket)> {
    let context = zmq::Context::new();
    let socket = context.socket(pattern.zmq_type())?;
    options.apply(&socket, pattern)?;
    Ok((context, socket))
}

fn decode(frame: Vec<u8>) -> Result<String> {
    String::from_utf8(frame).map_err(|_| Error::malformed("payload is not valid UTF-8"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_inproc() {
        let result = SocketHandle::bind(Pattern::Pair, Transport::Inproc, "name", None);
        assert!(matches!(result, Err(Error::UnsupportedTransport(Transport::Inproc))));
    }

    #[test]
    fn test_rejects_empty_address() {
        let result = SocketHandle::connect(Pattern::Req, Transport::Tcp, "", Some(4321));
        assert!(matches!(result, Err(Error::EmptyAddress)));
    }

    #[test]
    fn test_tcp_port_rules() {
        let result = SocketHandle::connect(Pattern::Req, Transport::Tcp, "127.0.0.1", None);
        assert!(matches!(result, Err(Error::MissingPort("required", Transport::Tcp))));

        let result = SocketHandle::connect(Pattern::Req, Transport::Tcp, "127.0.0.1", Some(0));
        assert!(matches!(result, Err(Error::InvalidPort(0))));

        let result = SocketHandle::bind(Pattern::Rep, Transport::Tcp, "*", None);
        assert!(matches!(result, Err(Error::MissingPort("required", Transport::Tcp))));
    }

    #[cfg(unix)]
    #[test]
    fn test_ipc_rejects_port() {
        let result = SocketHandle::connect(Pattern::Push, Transport::Ipc, "/tmp/x.ipc", Some(1));
        assert!(matches!(result, Err(Error::MissingPort("not allowed", Transport::Ipc))));
    }

    #[test]
    fn test_wrong_pattern_operations() {
        let port = portpicker::pick_unused_port().expect("no free port");
        let range = PortRange::single(port).unwrap();
        let mut router = SocketHandle::bind(Pattern::Router, Transport::Tcp, "127.0.0.1", Some(range)).unwrap();

        assert!(matches!(router.send("x"), Err(Error::WrongPattern { operation: "send", .. })));
        assert!(matches!(router.recv(), Err(Error::WrongPattern { operation: "recv", .. })));
        assert!(matches!(router.subscribe(""), Err(Error::WrongPattern { .. })));
        assert_eq!(router.try_recv().unwrap(), None);
        router.close();
    }

    #[test]
    fn test_unframe_addressed_counts_short_messages() {
        let port = portpicker::pick_unused_port().expect("no free port");
        let range = PortRange::single(port).unwrap();
        let mut router = SocketHandle::bind(Pattern::Router, Transport::Tcp, "127.0.0.1", Some(range)).unwrap();

        let result = router.unframe_addressed(vec![b"id".to_vec(), b"payload".to_vec()]);
        assert!(matches!(result, Err(Error::MalformedMessage(_))));
        let result = router.unframe_addressed(vec![b"id".to_vec(), b"x".to_vec(), b"y".to_vec()]);
        assert!(matches!(result, Err(Error::MalformedMessage(_))));
        assert_eq!(router.stats().rx_err_short, 2);

        let (address, payload) = router
            .unframe_addressed(vec![b"id".to_vec(), Vec::new(), b"hi".to_vec()])
            .unwrap();
        assert_eq!(address, b"id");
        assert_eq!(payload, "hi");
        assert_eq!(router.stats().rx_ok, 1);
    }
}
