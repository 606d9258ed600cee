//! linked-event-map: an ordered hash map with an optional LRU bound, a
//! persistent cursor, generated keys, and vetoable change events.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: build the notifying store in small layers so each piece can be
//!   reasoned about independently.
//! - Layers:
//!   - Chain<K, V>: arena-backed doubly linked list. Records live in a
//!     `SlotMap`; links are `Link::Sentinel` or `Link::Node(slot)`, so the
//!     sentinel is a value rather than a dummy record.
//!   - LinkedStore<K, V, S>: a `HashTable` index from key to slot over the
//!     chain. Adds the capacity bound, LRU promotion, the persistent
//!     cursor and the key generator.
//!   - NotifyingStore<K, V, S>: wraps LinkedStore and brackets every
//!     mutation with before/after/data-changed events; cursor moves emit
//!     next/previous/cursor-set with a 1-based position.
//!
//! Constraints
//! - Single-threaded: listeners are plain `Box<dyn Listener>` values and
//!   shared listeners use `Rc<RefCell<_>>`.
//! - O(1) average set/get/remove; promotion and eviction are O(1) link
//!   splices.
//! - The chain never holds a key twice; the index and the chain always
//!   contain exactly the same slots.
//! - `max_count == 0` means unbounded. Otherwise `len() <= max_count`
//!   after every call; eviction takes the front entry and is silent.
//!
//! Cursor
//! - The cursor is a `Link`, not a borrow. Moving it skips the sentinel
//!   while the store is non-empty, so iteration with `next`/`prev` is
//!   cyclic. Before a record is freed the cursor steps forward off it;
//!   removing the last record puts it back on the sentinel.
//!
//! Reentrancy policy
//! - LinkedStore probes the index under a debug-only `IndexProbeGuard`
//!   that names the running section. Only `K: Eq/Hash` runs during
//!   probing; a nested probe panics in debug builds.
//! - Listeners receive `&Event` and never `&mut` access to the store, so
//!   they cannot mutate it while it dispatches.
//! - `add_all` closes a dispatch gate while it applies its entries; the
//!   nested per-entry `set` calls emit nothing.
//!
//! Hasher invariants
//! - Each record stores its precomputed `u64` hash and the index always
//!   rehashes from it; `K: Hash` is never invoked after insertion.
//!
//! Notes and non-goals
//! - No persistence and no thread safety.
//! - Events are synchronous and run in registration order.
//! - A before-listener that denies aborts the operation with no change;
//!   every before-listener is still asked.

mod chain;
mod cursor;
mod error;
mod events;
mod guard;
mod key_gen;
mod linked_store;
mod linked_store_proptest;
mod notifying_cursor;
mod notifying_store;

// Public surface
pub use cursor::Direction;
pub use error::StoreError;
pub use events::{Event, EventKind, FnListener, Listener, ListenerId, Operation, Payload, Verdict};
pub use key_gen::{
    AutoKey, KeyGenConfig, KeyGenerator, DEFAULT_ID_FIELD, DEFAULT_INCREMENT, DEFAULT_VALUE_FIELD,
};
pub use linked_store::{Iter, LinkedStore, StoreOptions};
pub use notifying_store::NotifyingStore;
