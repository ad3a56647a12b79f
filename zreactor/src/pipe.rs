//! Control channel: a connected pair of inproc PAIR sockets.
//!
//! The producer end lives with the `Reactor` handle and is written from any
//! thread (serialized by the caller). The consumer end is polled alongside
//! the application sockets on the reactor thread. Both ends hold at most one
//! outstanding message and never linger on close.

use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::trace;

use crate::command::ControlCommand;
use crate::error::{Error, Result};

/// High-water mark of both pipe ends
pub const CONTROL_HWM: i32 = 1;

/// Linger of both pipe ends, in milliseconds
pub const CONTROL_LINGER_MS: i32 = 0;

/// How often a blocked `send_while` re-checks that the consumer is alive
const LIVENESS_CHECK_MS: i64 = 100;

static NEXT_PIPE: AtomicUsize = AtomicUsize::new(0);

/// Producer end of the control channel.
pub struct ControlSender {
    socket: zmq::Socket,
}

/// Reactor-facing end of the control channel.
pub struct ControlReceiver {
    socket: zmq::Socket,
}

/// Create a connected control channel inside `context`.
pub fn pipe(context: &zmq::Context) -> Result<(ControlSender, ControlReceiver)> {
    let name = format!("inproc://zreactor-pipe-{}", NEXT_PIPE.fetch_add(1, Ordering::Relaxed));

    let producer = pipe_end(context)?;
    let consumer = pipe_end(context)?;
    producer.bind(&name)?;
    consumer.connect(&name)?;
    trace!(%name, "control pipe created");

    Ok((ControlSender { socket: producer }, ControlReceiver { socket: consumer }))
}

fn pipe_end(context: &zmq::Context) -> Result<zmq::Socket> {
    let socket = context.socket(zmq::PAIR)?;
    socket.set_linger(CONTROL_LINGER_MS)?;
    socket.set_sndhwm(CONTROL_HWM)?;
    socket.set_rcvhwm(CONTROL_HWM)?;
    Ok(socket)
}

impl ControlSender {
    /// Send a command, blocking while the pipe is full.
    pub fn send(&self, command: &ControlCommand) -> Result<()> {
        trace!(%command, "control send");
        self.socket.send(command.encode().as_bytes(), 0)?;
        Ok(())
    }

    /// Send a command, blocking while the pipe is full and `alive` holds.
    ///
    /// Returns `false` if `alive` turned false before the command was
    /// queued, so a consumer that exited cannot block the caller forever.
    pub fn send_while(&self, command: &ControlCommand, alive: impl Fn() -> bool) -> Result<bool> {
        let frame = command.encode();
        loop {
            match self.socket.send(frame.as_bytes(), zmq::DONTWAIT) {
                Ok(()) => {
                    trace!(%command, "control send");
                    return Ok(true);
                }
                Err(zmq::Error::EAGAIN) => {}
                Err(e) => return Err(e.into()),
            }
            if !alive() {
                return Ok(false);
            }

            let mut items = [self.socket.as_poll_item(zmq::POLLOUT)];
            match zmq::poll(&mut items, LIVENESS_CHECK_MS) {
                Ok(_) | Err(zmq::Error::EINTR) => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Send a command only if the pipe has room.
    ///
    /// Returns `false` when the command was not queued.
    pub fn try_send(&self, command: &ControlCommand) -> bool {
        self.socket.send(command.encode().as_bytes(), zmq::DONTWAIT).is_ok()
    }
}

impl ControlReceiver {
    /// Block until the next command arrives.
    pub fn recv(&self) -> Result<ControlCommand> {
        let frame = self.socket.recv_bytes(0)?;
        match String::from_utf8(frame) {
            Ok(frame) => ControlCommand::decode(&frame),
            Err(e) => Err(Error::unknown_command(String::from_utf8_lossy(e.as_bytes()))),
        }
    }

    /// Readiness entry for `zmq::poll`.
    pub fn as_poll_item(&self) -> zmq::PollItem<'_> {
        self.socket.as_poll_item(zmq::POLLIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipe_round_trip() {
        let context = zmq::Context::new();
        let (tx, rx) = pipe(&context).unwrap();

        tx.send(&ControlCommand::Send("hello there...".into())).unwrap();
        assert_eq!(rx.recv().unwrap(), ControlCommand::Send("hello there...".into()));

        tx.send(&ControlCommand::Noop).unwrap();
        assert_eq!(rx.recv().unwrap(), ControlCommand::Noop);

        tx.send(&ControlCommand::Kill).unwrap();
        assert_eq!(rx.recv().unwrap(), ControlCommand::Kill);
    }

    #[test]
    fn test_pipes_are_independent() {
        let context = zmq::Context::new();
        let (tx1, rx1) = pipe(&context).unwrap();
        let (tx2, rx2) = pipe(&context).unwrap();

        tx1.send(&ControlCommand::Kill).unwrap();
        tx2.send(&ControlCommand::Noop).unwrap();
        assert_eq!(rx2.recv().unwrap(), ControlCommand::Noop);
        assert_eq!(rx1.recv().unwrap(), ControlCommand::Kill);
    }

    #[test]
    fn test_try_send_reports_full_pipe() {
        let context = zmq::Context::new();
        let (tx, rx) = pipe(&context).unwrap();

        let mut queued = 0;
        while tx.try_send(&ControlCommand::Noop) {
            queued += 1;
            assert!(queued < 100, "pipe should be bounded");
        }
        assert!(queued >= 1);

        for _ in 0..queued {
            assert_eq!(rx.recv().unwrap(), ControlCommand::Noop);
        }
        tx.send(&ControlCommand::Kill).unwrap();
        assert_eq!(rx.recv().unwrap(), ControlCommand::Kill);
    }

    #[test]
    fn test_unknown_frame_is_rejected() {
        let context = zmq::Context::new();
        let (tx, rx) = pipe(&context).unwrap();

        tx.socket.send("BOGUS", 0).unwrap();
        assert!(matches!(rx.recv(), Err(Error::UnknownCommand(_))));
    }

    #[test]
    fn test_non_utf8_frame_is_rejected() {
        let context = zmq::Context::new();
        let (tx, rx) = pipe(&context).unwrap();

        tx.socket.send(&[b'M', b'S', b'G', b' ', 0xff, 0xfe][..], 0).unwrap();
        assert!(matches!(rx.recv(), Err(Error::UnknownCommand(_))));

        tx.send(&ControlCommand::Noop).unwrap();
        assert_eq!(rx.recv().unwrap(), ControlCommand::Noop);
    }

    #[test]
    fn test_send_while_gives_up_when_consumer_is_gone() {
        let context = zmq::Context::new();
        let (tx, rx) = pipe(&context).unwrap();

        while tx.try_send(&ControlCommand::Noop) {}
        assert!(!tx.send_while(&ControlCommand::Kill, || false).unwrap());

        assert_eq!(rx.recv().unwrap(), ControlCommand::Noop);
        assert!(tx.send_while(&ControlCommand::Kill, || true).unwrap());
    }
}
