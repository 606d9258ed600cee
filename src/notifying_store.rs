//! NotifyingStore: a `LinkedStore` whose mutations emit vetoable events.
//!
//! Per mutating call (`set`, `add_all`, `remove`):
//! 1. unless muted, emit `Before(op)`; any `Deny` aborts with no change;
//! 2. apply the mutation to the inner store;
//! 3. unless muted, emit `After(op)` and then one `DataChanged(op)`.
//!
//! `add_all` closes the dispatch gate while it applies its entries, so
//! only the batch's own events fire. Muting suppresses everything.
//! Capacity eviction during `set` is silent.

use crate::chain::Link;
use crate::error::StoreError;
use crate::events::{
    Event, EventKind, FnListener, Listener, ListenerId, Listeners, Operation, Payload, Verdict,
};
use crate::guard::DispatchGate;
use crate::key_gen::{AutoKey, KeyGenerator};
use crate::linked_store::{Iter, LinkedStore, StoreOptions};
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use serde::Serialize;
use serde_json::Value;
use std::collections::hash_map::RandomState;

pub struct NotifyingStore<K, V, S = RandomState> {
    pub(crate) store: LinkedStore<K, V, S>,
    pub(crate) listeners: Listeners<K, V>,
    pub(crate) dataset_id: Option<String>,
    pub(crate) muted: bool,
    gate: DispatchGate,
    // Ordinal of the cursor, `None` when a mutation may have shifted it.
    pub(crate) position: Option<usize>,
}

impl<K, V> NotifyingStore<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::from_store(LinkedStore::new())
    }

    pub fn with_options(options: StoreOptions) -> Self {
        Self::from_store(LinkedStore::with_options(options))
    }
}

impl<K, V> Default for NotifyingStore<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> NotifyingStore<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    /// Wrap an existing store. Its contents are adopted without events.
    pub fn from_store(store: LinkedStore<K, V, S>) -> Self {
        Self {
            store,
            listeners: Listeners::new(),
            dataset_id: None,
            muted: false,
            gate: DispatchGate::new(),
            position: None,
        }
    }

    pub fn with_options_and_hasher(options: StoreOptions, hasher: S) -> Self {
        Self::from_store(LinkedStore::with_options_and_hasher(options, hasher))
    }

    pub fn with_dataset_id(mut self, id: impl Into<String>) -> Self {
        self.dataset_id = Some(id.into());
        self
    }

    pub fn dataset_id(&self) -> Option<&str> {
        self.dataset_id.as_deref()
    }

    pub fn set_dataset_id(&mut self, id: Option<String>) {
        self.dataset_id = id;
    }

    /// Read-only view of the underlying store.
    pub fn inner(&self) -> &LinkedStore<K, V, S> {
        &self.store
    }

    /// Drop every listener and hand back the plain store.
    pub fn into_inner(self) -> LinkedStore<K, V, S> {
        self.store
    }

    pub fn subscribe<L>(&mut self, listener: L) -> ListenerId
    where
        L: Listener<K, V> + 'static,
    {
        self.listeners.add(Box::new(listener))
    }

    /// Subscribe a closure that sees every event. Its verdict counts only
    /// for before-events.
    pub fn subscribe_fn<F>(&mut self, f: F) -> ListenerId
    where
        F: FnMut(&Event<'_, K, V>) -> Verdict + 'static,
    {
        self.listeners.add(Box::new(FnListener(f)))
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    pub fn unsubscribe_all(&mut self) {
        self.listeners.clear();
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Suppress every event until `unmute`.
    pub fn mute(&mut self) {
        tracing::debug!(dataset_id = ?self.dataset_id, "events muted");
        self.muted = true;
    }

    pub fn unmute(&mut self) {
        tracing::debug!(dataset_id = ?self.dataset_id, "events unmuted");
        self.muted = false;
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    fn dispatching(&self) -> bool {
        !self.muted && self.gate.is_open()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn count(&self) -> usize {
        self.store.count()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.store.contains_key(q)
    }

    pub fn peek<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.store.peek(q)
    }

    /// Lookup; promotes the entry in cache mode. Emits nothing.
    pub fn get<Q>(&mut self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        if self.store.is_cache() {
            self.position = None;
        }
        self.store.get(q)
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        self.store.iter()
    }

    /// Insert or update `key`. Returns `false` if a listener vetoed it.
    pub fn set(&mut self, key: K, value: V) -> bool {
        if !self.dispatching() {
            self.store.set(key, value);
            self.position = None;
            return true;
        }

        let dataset_id = self.dataset_id.as_deref();
        let before = Event::new(
            EventKind::Before(Operation::Set),
            dataset_id,
            Payload::Set {
                key: &key,
                value: &value,
            },
        );
        if self.listeners.before(&before) == Verdict::Deny {
            tracing::debug!(?dataset_id, "set vetoed by listener");
            return false;
        }

        let slot = self.store.set_slot(key, value);
        self.position = None;
        if let Some((key, value)) = self.store.entry_at(Link::Node(slot)) {
            let after = Event::new(
                EventKind::After(Operation::Set),
                dataset_id,
                Payload::Set { key, value },
            );
            self.listeners.notify(&after);
            self.listeners
                .notify(&after.with_kind(EventKind::DataChanged(Operation::Set)));
        }
        true
    }

    /// Insert a batch as one operation: one before/after pair and one
    /// `DataChanged`, none of the per-entry `set` events.
    pub fn add_all<I>(&mut self, entries: I) -> bool
    where
        I: IntoIterator<Item = (K, V)>,
        K: Clone,
    {
        let (keys, values): (Vec<K>, Vec<V>) = entries.into_iter().unzip();
        if self.muted {
            self.apply_batch(&keys, values);
            return true;
        }

        {
            let before = Event::new(
                EventKind::Before(Operation::AddAll),
                self.dataset_id.as_deref(),
                Payload::AddAll {
                    keys: keys.as_slice(),
                    values: Some(values.as_slice()),
                },
            );
            if self.listeners.before(&before) == Verdict::Deny {
                tracing::debug!(dataset_id = ?self.dataset_id, len = keys.len(), "add_all vetoed by listener");
                return false;
            }
        }

        self.apply_batch(&keys, values);

        let after = Event::new(
            EventKind::After(Operation::AddAll),
            self.dataset_id.as_deref(),
            Payload::AddAll {
                keys: keys.as_slice(),
                values: None,
            },
        );
        self.listeners.notify(&after);
        self.listeners
            .notify(&after.with_kind(EventKind::DataChanged(Operation::AddAll)));
        true
    }

    fn apply_batch(&mut self, keys: &[K], values: Vec<V>)
    where
        K: Clone,
    {
        self.gate.close();
        for (k, v) in keys.iter().cloned().zip(values) {
            self.set(k, v);
        }
        self.gate.open();
    }

    /// Values-only batch: keys are generated, then stored as one `add_all`.
    /// If the generator runs out, nothing is stored and no event fires.
    pub fn add_values<I>(&mut self, values: I) -> Result<Vec<String>, StoreError>
    where
        I: IntoIterator<Item = V>,
        K: From<String> + Clone,
    {
        let mut ids = Vec::new();
        let mut entries = Vec::new();
        for v in values {
            let id = self.store.key_generator_mut().next_key(None)?;
            ids.push(id.clone());
            entries.push((K::from(id), v));
        }
        self.add_all(entries);
        Ok(ids)
    }

    /// Remove `q`. Returns whether an entry was removed; a vetoed remove
    /// returns `false`. Absent keys still go through the event sequence, so
    /// the payload carries an owned copy of the key rather than the stored one.
    pub fn remove<Q>(&mut self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq + ToOwned<Owned = K>,
    {
        if self.muted {
            self.position = None;
            return self.store.remove(q);
        }

        let key = q.to_owned();
        let key = &key;
        let dataset_id = self.dataset_id.as_deref();
        let mut event = Event::new(
            EventKind::Before(Operation::Remove),
            dataset_id,
            Payload::Remove { key, removed: None },
        );
        if self.listeners.before(&event) == Verdict::Deny {
            tracing::debug!(?dataset_id, "remove vetoed by listener");
            return false;
        }

        let removed = self.store.remove(q);
        self.position = None;
        event.kind = EventKind::After(Operation::Remove);
        event.payload = Payload::Remove {
            key,
            removed: Some(removed),
        };
        self.listeners.notify(&event);
        self.listeners
            .notify(&event.with_kind(EventKind::DataChanged(Operation::Remove)));
        removed
    }

    /// Empty the store without events; the cursor returns to the sentinel.
    pub fn clear(&mut self) {
        self.store.clear();
        self.position = Some(0);
    }

    /// Push one value with every event suppressed, restoring the previous
    /// mute state afterwards.
    pub fn raw_push(&mut self, value: V) -> Result<String, StoreError>
    where
        K: From<String>,
    {
        let was_muted = self.muted;
        self.muted = true;
        let key = self.push(value);
        self.muted = was_muted;
        key
    }

    /// Release the store's contents and every listener registration.
    pub fn dispose(&mut self) {
        tracing::debug!(
            dataset_id = ?self.dataset_id,
            listeners = self.listeners.len(),
            "disposing store"
        );
        self.listeners.clear();
        self.store.clear();
        self.position = Some(0);
    }

    pub fn key_generator(&self) -> &KeyGenerator {
        self.store.key_generator()
    }

    pub fn key_generator_mut(&mut self) -> &mut KeyGenerator {
        self.store.key_generator_mut()
    }

    pub fn values_with_id(&self) -> Result<Vec<Value>, StoreError>
    where
        K: Serialize,
        V: Serialize,
    {
        self.store.values_with_id()
    }
}

impl<K, V, S> AutoKey<V> for NotifyingStore<K, V, S>
where
    K: Eq + Hash + From<String>,
    S: BuildHasher,
{
    fn generator(&self) -> &KeyGenerator {
        self.store.key_generator()
    }

    fn generator_mut(&mut self) -> &mut KeyGenerator {
        self.store.key_generator_mut()
    }

    fn store_generated(&mut self, key: String, value: V) -> bool {
        self.set(K::from(key), value)
    }
}

impl<K, V, S> fmt::Debug for NotifyingStore<K, V, S>
where
    K: Eq + Hash + fmt::Debug,
    V: fmt::Debug,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotifyingStore")
            .field("dataset_id", &self.dataset_id)
            .field("muted", &self.muted)
            .field("listeners", &self.listeners.len())
            .field("entries", &self.store)
            .finish()
    }
}
