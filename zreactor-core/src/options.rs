//! Socket configuration options
//!
//! This module provides the options a `SocketHandle` applies to its libzmq
//! socket right after creating it, before any bind or connect.

use std::time::Duration;

use crate::error::Result;
use crate::socket_type::Pattern;

/// Socket configuration options.
///
/// # Examples
///
/// ```
/// use zreactor_core::options::SocketOptions;
/// use std::time::Duration;
///
/// let opts = SocketOptions::default()
///     .with_recv_hwm(100)
///     .with_linger(Some(Duration::from_millis(250)))
///     .with_subscription("NUMERIC");
/// ```
#[derive(Debug, Clone)]
pub struct SocketOptions {
    /// High water mark for sending (ZMQ_SNDHWM)
    ///
    /// - `None`: library default
    pub send_hwm: Option<i32>,

    /// High water mark for receiving (ZMQ_RCVHWM)
    ///
    /// - `None`: library default
    pub recv_hwm: Option<i32>,

    /// Linger timeout (ZMQ_LINGER)
    ///
    /// Time to wait for pending messages to be sent before closing socket.
    /// - `None`: Wait indefinitely
    /// - `Some(Duration::ZERO)`: Close immediately, discard pending messages (default)
    /// - `Some(duration)`: Wait up to duration for messages to be sent
    pub linger: Option<Duration>,

    /// Prefixes a SUB socket subscribes to when it connects or binds.
    ///
    /// - Default: the empty prefix (receive everything)
    pub subscriptions: Vec<String>,

    /// Socket identity / routing ID (ZMQ_ROUTING_ID)
    ///
    /// Identity a ROUTER peer sees for this socket.
    /// - `None`: generated by the library (default)
    pub routing_id: Option<Vec<u8>>,
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            send_hwm: None,
            recv_hwm: None,
            linger: Some(Duration::ZERO),
            subscriptions: vec![String::new()],
            routing_id: None,
        }
    }
}

impl SocketOptions {
    /// Create options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the send high water mark.
    pub fn with_send_hwm(mut self, hwm: i32) -> Self {
        self.send_hwm = Some(hwm);
        self
    }

    /// Set the receive high water mark.
    pub fn with_recv_hwm(mut self, hwm: i32) -> Self {
        self.recv_hwm = Some(hwm);
        self
    }

    /// Set the linger timeout.
    pub fn with_linger(mut self, linger: Option<Duration>) -> Self {
        self.linger = linger;
        self
    }

    /// Subscribe to `prefix` instead of everything.
    ///
    /// The first call replaces the default empty prefix; later calls add to it.
    pub fn with_subscription(mut self, prefix: impl Into<String>) -> Self {
        if self.subscriptions.len() == 1 && self.subscriptions[0].is_empty() {
            self.subscriptions.clear();
        }
        self.subscriptions.push(prefix.into());
        self
    }

    /// Set the routing identity announced to ROUTER peers.
    pub fn with_routing_id(mut self, id: impl Into<Vec<u8>>) -> Self {
        self.routing_id = Some(id.into());
        self
    }

    /// Linger in the libzmq encoding (milliseconds, -1 for infinite).
    pub fn linger_ms(&self) -> i32 {
        match self.linger {
            None => -1,
            Some(d) => i32::try_from(d.as_millis()).unwrap_or(i32::MAX),
        }
    }

    /// Apply these options to a freshly created socket.
    pub(crate) fn apply(&self, socket: &zmq::Socket, pattern: Pattern) -> Result<()> {
        if let Some(hwm) = self.send_hwm {
            socket.set_sndhwm(hwm)?;
        }
        if let Some(hwm) = self.recv_hwm {
            socket.set_rcvhwm(hwm)?;
        }
        socket.set_linger(self.linger_ms())?;
        if let Some(id) = &self.routing_id {
            socket.set_identity(id)?;
        }
        if pattern == Pattern::Sub {
            for prefix in &self.subscriptions {
                socket.set_subscribe(prefix.as_bytes())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = SocketOptions::default();
        assert!(opts.send_hwm.is_none());
        assert!(opts.recv_hwm.is_none());
        assert_eq!(opts.linger, Some(Duration::ZERO));
        assert_eq!(opts.linger_ms(), 0);
        assert_eq!(opts.subscriptions, vec![String::new()]);
    }

    #[test]
    fn test_builder_pattern() {
        let opts = SocketOptions::new()
            .with_send_hwm(10)
            .with_recv_hwm(20)
            .with_linger(None)
            .with_routing_id("peer-1");

        assert_eq!(opts.send_hwm, Some(10));
        assert_eq!(opts.recv_hwm, Some(20));
        assert_eq!(opts.linger_ms(), -1);
        assert_eq!(opts.routing_id.as_deref(), Some(&b"peer-1"[..]));
    }

    #[test]
    fn test_subscriptions_replace_default() {
        let opts = SocketOptions::new()
            .with_subscription("NUMERIC")
            .with_subscription("LOG");
        assert_eq!(opts.subscriptions, vec!["NUMERIC".to_string(), "LOG".to_string()]);
    }

    #[test]
    fn test_linger_saturates() {
        let opts = SocketOptions::new().with_linger(Some(Duration::from_secs(u64::MAX / 1000)));
        assert_eq!(opts.linger_ms(), i32::MAX);
    }
}
