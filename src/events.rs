//! Event types and listener plumbing for `NotifyingStore`.
//!
//! Every mutation is bracketed by a vetoable before-event and, if it
//! went ahead, an after-event followed by one aggregate `DataChanged`
//! event. Cursor moves emit `Next`/`Previous`/`CursorSet`. Listeners run
//! synchronously, in registration order, on the caller's stack.

use core::cell::RefCell;
use core::fmt;
use std::rc::Rc;

/// The mutating operations that emit before/after events.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Operation {
    Set,
    AddAll,
    Remove,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Set => "set",
            Operation::AddAll => "addAll",
            Operation::Remove => "remove",
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum EventKind {
    Before(Operation),
    After(Operation),
    /// Fired once after every successful mutation, tagged with its kind.
    DataChanged(Operation),
    Next,
    Previous,
    CursorSet,
}

impl EventKind {
    /// Wire-style name, e.g. `before-set` or `data-changed`.
    pub fn name(self) -> &'static str {
        match self {
            EventKind::Before(Operation::Set) => "before-set",
            EventKind::Before(Operation::AddAll) => "before-addAll",
            EventKind::Before(Operation::Remove) => "before-remove",
            EventKind::After(Operation::Set) => "after-set",
            EventKind::After(Operation::AddAll) => "after-addAll",
            EventKind::After(Operation::Remove) => "after-remove",
            EventKind::DataChanged(_) => "data-changed",
            EventKind::Next => "next",
            EventKind::Previous => "previous",
            EventKind::CursorSet => "cursor-set",
        }
    }

    pub fn is_before(self) -> bool {
        matches!(self, EventKind::Before(_))
    }

    /// The mutation this event belongs to, if any.
    pub fn operation(self) -> Option<Operation> {
        match self {
            EventKind::Before(op) | EventKind::After(op) | EventKind::DataChanged(op) => Some(op),
            _ => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Operation-specific event data. Fields only known once the mutation
/// has run are `None` in the before-phase.
pub enum Payload<'a, K, V> {
    Set {
        key: &'a K,
        value: &'a V,
    },
    AddAll {
        keys: &'a [K],
        values: Option<&'a [V]>,
    },
    Remove {
        key: &'a K,
        removed: Option<bool>,
    },
    Cursor {
        item: Option<&'a V>,
        position: usize,
    },
}

impl<K, V> Clone for Payload<'_, K, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V> Copy for Payload<'_, K, V> {}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for Payload<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Set { key, value } => f
                .debug_struct("Set")
                .field("key", key)
                .field("value", value)
                .finish(),
            Payload::AddAll { keys, values } => f
                .debug_struct("AddAll")
                .field("keys", keys)
                .field("values", values)
                .finish(),
            Payload::Remove { key, removed } => f
                .debug_struct("Remove")
                .field("key", key)
                .field("removed", removed)
                .finish(),
            Payload::Cursor { item, position } => f
                .debug_struct("Cursor")
                .field("item", item)
                .field("position", position)
                .finish(),
        }
    }
}

/// One notification. `dataset_id` lets a listener shared by several
/// stores tell them apart.
pub struct Event<'a, K, V> {
    pub kind: EventKind,
    pub dataset_id: Option<&'a str>,
    pub payload: Payload<'a, K, V>,
}

impl<'a, K, V> Event<'a, K, V> {
    pub fn new(kind: EventKind, dataset_id: Option<&'a str>, payload: Payload<'a, K, V>) -> Self {
        Self {
            kind,
            dataset_id,
            payload,
        }
    }

    pub(crate) fn with_kind(&self, kind: EventKind) -> Self {
        Self { kind, ..*self }
    }
}

impl<K, V> Clone for Event<'_, K, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V> Copy for Event<'_, K, V> {}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for Event<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("kind", &self.kind)
            .field("dataset_id", &self.dataset_id)
            .field("payload", &self.payload)
            .finish()
    }
}

/// A before-phase listener's answer.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum Verdict {
    #[default]
    Allow,
    Deny,
}

/// Receiver of store events.
///
/// `before` runs ahead of a mutation and may veto it; `notify` receives
/// every other event. Neither may mutate the store that is dispatching.
pub trait Listener<K, V> {
    fn before(&mut self, event: &Event<'_, K, V>) -> Verdict {
        let _ = event;
        Verdict::Allow
    }

    fn notify(&mut self, event: &Event<'_, K, V>);
}

/// Adapts a closure into a listener. The closure sees every event; its
/// verdict only counts in the before-phase.
pub struct FnListener<F>(pub F);

impl<K, V, F> Listener<K, V> for FnListener<F>
where
    F: FnMut(&Event<'_, K, V>) -> Verdict,
{
    fn before(&mut self, event: &Event<'_, K, V>) -> Verdict {
        (self.0)(event)
    }

    fn notify(&mut self, event: &Event<'_, K, V>) {
        let _ = (self.0)(event);
    }
}

/// A listener shared between several stores.
impl<K, V, L> Listener<K, V> for Rc<RefCell<L>>
where
    L: Listener<K, V> + ?Sized,
{
    fn before(&mut self, event: &Event<'_, K, V>) -> Verdict {
        self.borrow_mut().before(event)
    }

    fn notify(&mut self, event: &Event<'_, K, V>) {
        self.borrow_mut().notify(event)
    }
}

/// Registration handle returned by `subscribe`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

pub(crate) struct Listeners<K, V> {
    next_id: u64,
    entries: Vec<(ListenerId, Box<dyn Listener<K, V>>)>,
}

impl<K, V> Listeners<K, V> {
    pub(crate) fn new() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }

    pub(crate) fn add(&mut self, listener: Box<dyn Listener<K, V>>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, listener));
        id
    }

    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(i, _)| *i != id);
        self.entries.len() != before
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Ask every listener; the result is `Deny` if any of them denied.
    pub(crate) fn before(&mut self, event: &Event<'_, K, V>) -> Verdict {
        let mut verdict = Verdict::Allow;
        for (_, l) in self.entries.iter_mut() {
            if l.before(event) == Verdict::Deny {
                verdict = Verdict::Deny;
            }
        }
        verdict
    }

    pub(crate) fn notify(&mut self, event: &Event<'_, K, V>) {
        for (_, l) in self.entries.iter_mut() {
            l.notify(event);
        }
    }
}
