//! The reactor: one thread multiplexing a socket set and a control channel.
//!
//! # Threads
//!
//! The reactor thread owns every registered `SocketHandle`, the consumer end
//! of the control pipe and the message handler. Nothing else ever touches
//! them, which is what makes the design safe without locks on the hot path:
//! libzmq sockets must not be used from two threads at once.
//!
//! Every other thread goes through the [`Reactor`] value. Its operations
//! write to the producer end of the control pipe and, for socket-set
//! changes, to a mutation queue. Both are behind one mutex so that the queue
//! order always matches the pipe order. The registry of locations has its own
//! lock, never held across a pipe send, so the handler can inspect it.
//!
//! # Socket-set changes
//!
//! `add_socket` and `remove_socket` never modify the poll set themselves.
//! They queue the change and send `PASS`; the reactor thread applies exactly
//! one queued change per `PASS` it reads, then polls the updated set. A
//! removal also flips a shared retirement flag right away, so payloads read
//! from that socket in the meantime are dropped, and waits until the reactor
//! thread acknowledges that the socket is gone.
//!
//! # Loop
//!
//! ```text
//! Running ──KILL──▶ Draining (close every socket) ──▶ Stopped
//! ```
//!
//! Each iteration blocks in `zmq::poll` with no timeout. The control endpoint
//! is checked first; when it is readable exactly one command is processed and
//! the socket set is polled again. Otherwise one payload is read from every
//! readable socket and handed to the handler, in registration order.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use flume::RecvTimeoutError;
use hashbrown::HashMap;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, trace, warn};
use zreactor_core::socket::SocketHandle;
use zreactor_core::socket_type::Pattern;

use crate::command::ControlCommand;
use crate::error::{Error, Result};
use crate::handler::MessageHandler;
use crate::pipe::{pipe, ControlReceiver, ControlSender};
use crate::socket_set::{Entry, SocketSet};

/// Name of the reactor thread unless one is given
pub const DEFAULT_THREAD_NAME: &str = "zreactor";

const REMOVAL_CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// A queued change to the socket set, applied on the reactor thread.
enum Mutation {
    Add(Entry),
    /// Acknowledged through `done` once the socket is released
    Remove { location: String, done: flume::Sender<()> },
}

struct Registration {
    pattern: Pattern,
    retired: Arc<AtomicBool>,
}

type Registry = HashMap<String, Registration>;

/// Producer ends, guarded by one lock held across blocking pipe sends.
struct Producer {
    control: ControlSender,
    mutations: flume::Sender<Mutation>,
    closed: bool,
}

impl Producer {
    fn ensure_open(&self) -> Result<()> {
        if self.closed || self.mutations.is_disconnected() {
            return Err(Error::ReactorClosed);
        }
        Ok(())
    }

    fn submit(&self, mutation: Mutation) -> Result<()> {
        self.mutations.send(mutation).map_err(|_| Error::ReactorClosed)?;
        self.control.send(&ControlCommand::Noop)
    }

    /// Queue `KILL`, giving up if the reactor thread has already exited.
    fn kill(&self) -> Result<()> {
        let queued = self
            .control
            .send_while(&ControlCommand::Kill, || !self.mutations.is_disconnected())?;
        if !queued {
            debug!("reactor thread already exited");
        }
        Ok(())
    }
}

/// Handle to a running reactor thread.
///
/// All methods take `&self`; the value can be shared across threads (for
/// example in an `Arc`). Dropping it asks the thread to stop without waiting
/// for it to exit.
///
/// The inspection methods (`contains`, `len`, `locations`, `is_closed`) never
/// wait on the reactor thread and may be called from the handler.
///
/// # Examples
///
/// ```no_run
/// use zreactor::prelude::*;
///
/// let reactor = Reactor::new(|payload: String| println!("received {payload}"))?;
///
/// let range = PortRange::span(4321, 4323)?;
/// let server = SocketHandle::bind(Pattern::Pull, Transport::Tcp, "*", Some(range))?;
/// reactor.add_socket(server)?;
///
/// // ... later
/// reactor.join()?;
/// # Ok::<(), zreactor::Error>(())
/// ```
pub struct Reactor {
    // Lock order: `producer` before `registry`. `registry` is never held
    // across a pipe send.
    producer: Mutex<Producer>,
    registry: RwLock<Registry>,
    closed: AtomicBool,
    thread: Option<JoinHandle<Result<()>>>,
    thread_id: ThreadId,
}

impl Reactor {
    /// Start a reactor thread delivering payloads to `handler`.
    pub fn new<H: MessageHandler>(handler: H) -> Result<Self> {
        Self::with_name(DEFAULT_THREAD_NAME, handler)
    }

    /// Start a reactor thread with a custom thread name.
    pub fn with_name<H: MessageHandler>(name: impl Into<String>, handler: H) -> Result<Self> {
        let context = zmq::Context::new();
        let (control_tx, control_rx) = pipe(&context)?;
        let (mutation_tx, mutation_rx) = flume::unbounded();

        let event_loop = EventLoop {
            control: control_rx,
            mutations: mutation_rx,
            sockets: SocketSet::new(),
            handler,
            state: State::Running,
        };

        let thread = thread::Builder::new()
            .name(name.into())
            .spawn(move || event_loop.run())
            .map_err(Error::Spawn)?;
        let thread_id = thread.thread().id();

        Ok(Self {
            producer: Mutex::new(Producer {
                control: control_tx,
                mutations: mutation_tx,
                closed: false,
            }),
            registry: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
            thread: Some(thread),
            thread_id,
        })
    }

    /// Hand `handle` over to the reactor thread.
    ///
    /// Fails with [`Error::DuplicateLocation`] if a socket with the same
    /// location is registered. The handle is released if the call fails
    /// after the duplicate check.
    pub fn add_socket(&self, handle: SocketHandle) -> Result<()> {
        self.ensure_producer_thread("add_socket")?;
        let producer = self.producer.lock();
        producer.ensure_open()?;

        let location = handle.location().to_string();
        let pattern = handle.pattern();
        let retired = Arc::new(AtomicBool::new(false));
        {
            let mut registry = self.registry.write();
            if registry.contains_key(&location) {
                return Err(Error::DuplicateLocation(location));
            }
            registry.insert(
                location.clone(),
                Registration {
                    pattern,
                    retired: Arc::clone(&retired),
                },
            );
        }

        if let Err(e) = producer.submit(Mutation::Add(Entry::new(handle, retired))) {
            self.registry.write().remove(&location);
            return Err(e);
        }

        debug!(%location, %pattern, "socket queued for registration");
        Ok(())
    }

    /// Stop polling the socket at `location` and release it.
    ///
    /// Blocks until the reactor thread has released the socket, so no
    /// payload from it reaches the handler once this returns.
    pub fn remove_socket(&self, location: &str) -> Result<()> {
        self.ensure_producer_thread("remove_socket")?;
        let (done_tx, done_rx) = flume::bounded(1);
        {
            let producer = self.producer.lock();
            producer.ensure_open()?;

            let registration = self
                .registry
                .write()
                .remove(location)
                .ok_or_else(|| Error::UnknownLocation(location.to_string()))?;
            registration.retired.store(true, Ordering::Release);
            producer.submit(Mutation::Remove {
                location: location.to_string(),
                done: done_tx,
            })?;
        }

        // The reactor thread releases everything on exit, acknowledged or not.
        loop {
            match done_rx.recv_timeout(REMOVAL_CHECK_INTERVAL) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) if self.thread_finished() => break,
                Err(RecvTimeoutError::Timeout) => {}
            }
        }
        debug!(%location, "socket removed");
        Ok(())
    }

    /// Send `payload` through the single registered socket.
    ///
    /// Fails with [`Error::SocketCardinality`] unless exactly one socket is
    /// registered, and with [`Error::WrongPattern`] if that socket cannot
    /// send unaddressed payloads.
    pub fn push(&self, payload: &str) -> Result<()> {
        self.ensure_producer_thread("push")?;
        let producer = self.producer.lock();
        producer.ensure_open()?;

        let pattern = {
            let registry = self.registry.read();
            let count = registry.len();
            match registry.values().next() {
                Some(registration) if count == 1 => registration.pattern,
                _ => return Err(Error::SocketCardinality(count)),
            }
        };
        if pattern.is_addressed() || !pattern.can_send() {
            return Err(Error::WrongPattern {
                operation: "push",
                pattern,
            });
        }

        producer.control.send(&ControlCommand::Send(payload.to_string()))
    }

    /// Ask the reactor thread to stop, without waiting for it to exit.
    ///
    /// Every registered socket is released on the reactor thread. Calling
    /// `close` again is a no-op.
    pub fn close(&self) -> Result<()> {
        self.ensure_producer_thread("close")?;
        let mut producer = self.producer.lock();
        if producer.closed {
            return Ok(());
        }
        producer.closed = true;
        self.closed.store(true, Ordering::Release);

        producer.kill()?;
        info!("reactor shutdown requested");
        Ok(())
    }

    /// Stop the reactor thread and wait for it to exit.
    ///
    /// Returns the error that halted the loop, if any.
    pub fn join(mut self) -> Result<()> {
        self.ensure_producer_thread("join")?;
        self.close()?;
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| Error::ThreadPanicked)?,
            None => Ok(()),
        }
    }

    /// Check whether a socket with `location` is registered.
    pub fn contains(&self, location: &str) -> bool {
        self.registry.read().contains_key(location)
    }

    /// Number of registered sockets.
    pub fn len(&self) -> usize {
        self.registry.read().len()
    }

    /// True when no socket is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Locations of the registered sockets, in no particular order.
    pub fn locations(&self) -> Vec<String> {
        self.registry.read().keys().cloned().collect()
    }

    /// Whether `close` has been called or the reactor thread has exited.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.thread_finished()
    }

    fn thread_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |thread| thread.is_finished())
    }

    // The control pipe is bounded; the reactor thread writing to it while
    // it is the only reader could block forever.
    fn ensure_producer_thread(&self, operation: &'static str) -> Result<()> {
        if thread::current().id() == self.thread_id {
            return Err(Error::ReentrantCall(operation));
        }
        Ok(())
    }
}

impl Drop for Reactor {
    fn drop(&mut self) {
        let mut producer = self.producer.lock();
        if producer.closed || producer.mutations.is_disconnected() {
            return;
        }
        producer.closed = true;
        self.closed.store(true, Ordering::Release);

        // The last handle may be owned by the handler itself.
        if thread::current().id() == self.thread_id {
            if !producer.control.try_send(&ControlCommand::Kill) {
                warn!("control pipe full, reactor thread not stopped on drop");
            }
            return;
        }
        if let Err(e) = producer.kill() {
            warn!(error = %e, "failed to stop reactor thread on drop");
        }
    }
}

impl fmt::Debug for Reactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reactor")
            .field("thread_id", &self.thread_id)
            .field("sockets", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Running,
    Draining,
    Stopped,
}

/// State owned by the reactor thread.
struct EventLoop<H> {
    control: ControlReceiver,
    mutations: flume::Receiver<Mutation>,
    sockets: SocketSet,
    handler: H,
    state: State,
}

impl<H: MessageHandler> EventLoop<H> {
    fn run(mut self) -> Result<()> {
        info!("reactor started");
        let result = self.poll_loop();
        if let Err(e) = &result {
            error!(error = %e, "reactor loop halted");
        }

        self.state = State::Draining;
        self.drain();
        self.state = State::Stopped;
        info!(state = ?self.state, "reactor stopped");
        result
    }

    fn poll_loop(&mut self) -> Result<()> {
        while self.state == State::Running {
            let ready = self.sockets.poll(&self.control)?;

            if ready.control {
                let command = self.control.recv()?;
                self.dispatch(command)?;
                continue;
            }

            for index in ready.sockets {
                self.service(index);
            }
        }
        Ok(())
    }

    fn dispatch(&mut self, command: ControlCommand) -> Result<()> {
        trace!(%command, "control command");
        match command {
            ControlCommand::Send(payload) => {
                let entry = self.sockets.single_mut()?;
                if let Err(e) = entry.handle.send(&payload) {
                    if e.is_contract_violation() {
                        return Err(e.into());
                    }
                    warn!(location = entry.handle.location(), error = %e, "send failed");
                }
            }
            ControlCommand::Kill => {
                debug!(sockets = self.sockets.len(), "kill received");
                self.state = State::Draining;
            }
            ControlCommand::Noop => self.apply_mutation()?,
        }
        Ok(())
    }

    fn apply_mutation(&mut self) -> Result<()> {
        match self.mutations.try_recv() {
            Ok(Mutation::Add(entry)) => {
                let location = entry.handle.location().to_string();
                self.sockets.insert(entry)?;
                debug!(%location, sockets = self.sockets.len(), "socket registered");
            }
            Ok(Mutation::Remove { location, done }) => {
                match self.sockets.remove(&location) {
                    Some(handle) => {
                        handle.close();
                        debug!(%location, sockets = self.sockets.len(), "socket released");
                    }
                    None => warn!(%location, "removal requested for unregistered socket"),
                }
                let _ = done.send(());
            }
            Err(_) => trace!("wakeup without pending mutation"),
        }
        Ok(())
    }

    fn service(&mut self, index: usize) {
        let Some(entry) = self.sockets.get_mut(index) else {
            return;
        };

        match entry.handle.try_recv() {
            Ok(Some((address, payload))) => {
                if entry.is_retired() {
                    trace!(location = entry.handle.location(), "dropping payload from retired socket");
                    return;
                }
                if let Some(address) = address {
                    trace!(location = entry.handle.location(), address = ?address, "addressed payload");
                }
                self.handler.on_message(payload);
            }
            Ok(None) => {}
            Err(e) => warn!(location = entry.handle.location(), error = %e, "receive failed"),
        }
    }

    fn drain(&mut self) {
        for handle in self.sockets.drain() {
            handle.close();
        }
        while let Ok(mutation) = self.mutations.try_recv() {
            if let Mutation::Add(entry) = mutation {
                entry.handle.close();
            }
        }
    }
}
