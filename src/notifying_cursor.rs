//! Cursor moves on a `NotifyingStore`.
//!
//! Each move emits `Next`, `Previous` or `CursorSet` carrying the value
//! under the cursor and its 1-based position. The position wraps: moving
//! forward from the last entry reports 1, backward from the first reports
//! the count. An empty store reports 0.

use crate::cursor::Direction;
use crate::events::{Event, EventKind, Payload};
use crate::notifying_store::NotifyingStore;
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};

impl<K, V, S> NotifyingStore<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    /// Current 1-based position of the cursor, 0 at the sentinel.
    pub fn position(&self) -> usize {
        self.position
            .unwrap_or_else(|| self.store.cursor_ordinal().unwrap_or(0))
    }

    fn stepped_position(&self, dir: Direction) -> usize {
        let count = self.store.len();
        if count == 0 {
            return 0;
        }
        let from = self.position();
        match dir {
            Direction::Forward if from >= count => 1,
            Direction::Forward => from + 1,
            Direction::Backward if from <= 1 => count,
            Direction::Backward => from - 1,
        }
    }

    /// Move the cursor and emit `Next` or `Previous`.
    pub fn advance(&mut self, dir: Direction) -> Option<&V> {
        let position = self.stepped_position(dir);
        let kind = match dir {
            Direction::Forward => EventKind::Next,
            Direction::Backward => EventKind::Previous,
        };

        let Self {
            store,
            listeners,
            dataset_id,
            muted,
            position: cached,
            ..
        } = self;
        *cached = Some(position);
        let item = store.advance(dir);
        if !*muted {
            listeners.notify(&Event::new(
                kind,
                dataset_id.as_deref(),
                Payload::Cursor { item, position },
            ));
        }
        item
    }

    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<&V> {
        self.advance(Direction::Forward)
    }

    pub fn prev(&mut self) -> Option<&V> {
        self.advance(Direction::Backward)
    }

    /// Point the cursor at `key` and emit `CursorSet`. A miss emits
    /// nothing and leaves the cursor and its position alone.
    pub fn set_cursor<Q>(&mut self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let Self {
            store,
            listeners,
            dataset_id,
            muted,
            position: cached,
            ..
        } = self;
        if store.set_cursor(q).is_none() {
            return None;
        }
        let position = store.cursor_ordinal().unwrap_or(0);
        *cached = Some(position);
        let item = store.current().map(|(_, v)| v);
        if !*muted {
            listeners.notify(&Event::new(
                EventKind::CursorSet,
                dataset_id.as_deref(),
                Payload::Cursor { item, position },
            ));
        }
        item
    }

    /// Key and value under the cursor.
    pub fn current(&self) -> Option<(&K, &V)> {
        self.store.current()
    }

    pub fn reset_cursor(&mut self) {
        self.store.reset_cursor();
        self.position = Some(0);
    }

    pub fn locate<F>(&self, pred: F) -> Option<usize>
    where
        F: FnMut(&V, &K) -> bool,
    {
        self.store.locate(pred)
    }
}
