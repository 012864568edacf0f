use crate::state::State;
use std::fmt;
use std::rc::Rc;

/// A state observer.
///
/// Membership in a store is keyed by handle: subscribing clones of the same
/// `Listener` twice registers it once.
#[derive(Clone)]
pub struct Listener(Rc<dyn Fn(&State)>);

impl Listener {
    /// Wrap a callback.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&State) + 'static,
    {
        Self(Rc::new(f))
    }

    /// Whether both are clones of the same handle.
    pub fn ptr_eq(&self, other: &Listener) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn notify(&self, state: &State) {
        (self.0)(state)
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Listener(<fn>)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ListenerId(u64);

/// Insertion-ordered listener registry.
#[derive(Default)]
pub(crate) struct ListenerSet {
    entries: Vec<(ListenerId, Listener)>,
    next_id: u64,
    destroyed: bool,
}

impl ListenerSet {
    /// Register `listener`, or return the id it is already registered under.
    /// A destroyed set accepts nothing.
    pub(crate) fn insert(&mut self, listener: Listener) -> Option<ListenerId> {
        if self.destroyed {
            return None;
        }
        if let Some((id, _)) = self.entries.iter().find(|(_, l)| l.ptr_eq(&listener)) {
            return Some(*id);
        }
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, listener));
        Some(id)
    }

    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    /// Point-in-time copy used for one notification pass.
    pub(crate) fn snapshot(&self) -> Vec<Listener> {
        self.entries.iter().map(|(_, l)| l.clone()).collect()
    }

    pub(crate) fn destroy(&mut self) {
        self.entries.clear();
        self.destroyed = true;
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
