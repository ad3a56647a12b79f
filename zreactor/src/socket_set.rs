//! The reactor's live socket set and its readiness poll.
//!
//! Owned by the reactor thread. Entries keep registration order, and each
//! carries the retirement flag shared with the `Reactor` registry so that a
//! removal is visible before the reactor thread gets to apply it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use smallvec::SmallVec;
use zreactor_core::socket::SocketHandle;

use crate::error::{Error, Result};
use crate::pipe::ControlReceiver;

/// A registered socket.
#[derive(Debug)]
pub(crate) struct Entry {
    pub(crate) handle: SocketHandle,
    retired: Arc<AtomicBool>,
}

impl Entry {
    pub(crate) fn new(handle: SocketHandle, retired: Arc<AtomicBool>) -> Self {
        Self { handle, retired }
    }

    /// Removal was requested; payloads must no longer be delivered.
    pub(crate) fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }
}

/// Result of one poll round.
#[derive(Debug, Default)]
pub(crate) struct Readiness {
    /// The control endpoint has a command waiting
    pub(crate) control: bool,
    /// Indices of entries with a payload waiting
    pub(crate) sockets: SmallVec<[usize; 8]>,
}

/// Ordered set of registered sockets, unique by location.
#[derive(Debug, Default)]
pub(crate) struct SocketSet {
    entries: Vec<Entry>,
}

impl SocketSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn contains(&self, location: &str) -> bool {
        self.position(location).is_some()
    }

    fn position(&self, location: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.handle.location() == location)
    }

    pub(crate) fn insert(&mut self, entry: Entry) -> Result<()> {
        if self.contains(entry.handle.location()) {
            return Err(Error::DuplicateLocation(entry.handle.location().to_string()));
        }
        self.entries.push(entry);
        Ok(())
    }

    pub(crate) fn remove(&mut self, location: &str) -> Option<SocketHandle> {
        self.position(location).map(|i| self.entries.remove(i).handle)
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut Entry> {
        self.entries.get_mut(index)
    }

    /// The only registered socket, if exactly one is registered.
    pub(crate) fn single_mut(&mut self) -> Result<&mut Entry> {
        match self.entries.as_mut_slice() {
            [entry] => Ok(entry),
            entries => Err(Error::SocketCardinality(entries.len())),
        }
    }

    /// Block until the control endpoint or any socket is readable.
    ///
    /// Index 0 of the poll set is always the control endpoint.
    pub(crate) fn poll(&self, control: &ControlReceiver) -> Result<Readiness> {
        let mut items: Vec<zmq::PollItem<'_>> = Vec::with_capacity(self.entries.len() + 1);
        items.push(control.as_poll_item());
        items.extend(self.entries.iter().map(|e| e.handle.as_poll_item(zmq::POLLIN)));

        match zmq::poll(&mut items, -1) {
            Ok(_) => {}
            Err(zmq::Error::EINTR) => return Ok(Readiness::default()),
            Err(e) => return Err(e.into()),
        }

        Ok(Readiness {
            control: items[0].is_readable(),
            sockets: items[1..]
                .iter()
                .enumerate()
                .filter(|(_, item)| item.is_readable())
                .map(|(index, _)| index)
                .collect(),
        })
    }

    /// Remove every entry, in registration order.
    pub(crate) fn drain(&mut self) -> impl Iterator<Item = SocketHandle> + '_ {
        self.entries.drain(..).map(|e| e.handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipe::pipe;
    use crate::ControlCommand;
    use zreactor_core::prelude::{Pattern, PortRange, Transport};

    fn pull_entry() -> (Entry, u16) {
        let port = portpicker::pick_unused_port().expect("no free port");
        let range = PortRange::single(port).unwrap();
        let handle = SocketHandle::bind(Pattern::Pull, Transport::Tcp, "127.0.0.1", Some(range)).unwrap();
        (Entry::new(handle, Arc::new(AtomicBool::new(false))), port)
    }

    #[test]
    fn test_insert_rejects_duplicate_location() {
        let (entry, port) = pull_entry();
        let mut set = SocketSet::new();
        set.insert(entry).unwrap();

        let dup = SocketHandle::connect(Pattern::Push, Transport::Tcp, "127.0.0.1", Some(port)).unwrap();
        let result = set.insert(Entry::new(dup, Arc::new(AtomicBool::new(false))));
        assert!(matches!(result, Err(Error::DuplicateLocation(_))));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_remove_and_cardinality() {
        let (a, _) = pull_entry();
        let (b, _) = pull_entry();
        let location = a.handle.location().to_string();

        let mut set = SocketSet::new();
        assert!(matches!(set.single_mut(), Err(Error::SocketCardinality(0))));
        set.insert(a).unwrap();
        assert!(set.single_mut().is_ok());
        set.insert(b).unwrap();
        assert!(matches!(set.single_mut(), Err(Error::SocketCardinality(2))));

        let removed = set.remove(&location).unwrap();
        assert_eq!(removed.location(), location);
        assert!(!set.contains(&location));
        assert!(set.remove(&location).is_none());
        assert_eq!(set.drain().count(), 1);
        assert_eq!(set.len(), 0);
    }

    #[test]
    fn test_poll_reports_control_and_sockets() {
        let context = zmq::Context::new();
        let (tx, rx) = pipe(&context).unwrap();

        let (idle, _) = pull_entry();
        let (busy, port) = pull_entry();
        let mut set = SocketSet::new();
        set.insert(idle).unwrap();
        set.insert(busy).unwrap();

        let mut push = SocketHandle::connect(Pattern::Push, Transport::Tcp, "127.0.0.1", Some(port)).unwrap();
        push.send("hello there...").unwrap();

        let ready = set.poll(&rx).unwrap();
        assert!(!ready.control);
        assert_eq!(ready.sockets.as_slice(), &[1]);

        let entry = set.get_mut(1).unwrap();
        assert_eq!(entry.handle.recv().unwrap(), "hello there...");
        assert!(!entry.is_retired());

        tx.send(&ControlCommand::Noop).unwrap();
        let ready = set.poll(&rx).unwrap();
        assert!(ready.control);
        assert!(ready.sockets.is_empty());
    }
}
