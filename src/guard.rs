//! Guards for the two kinds of nesting the store cares about.
//!
//! `IndexProbeGuard` covers the sections of `LinkedStore` that probe or
//! rewrite the hash index (`find_slot`, `set_slot`, `remove_slot`,
//! `clear`). Only `K: Eq/Hash` runs inside them, and while one is active
//! the index and the chain may briefly disagree. A key whose `Eq` or
//! `Hash` calls back into the same store would observe that state, so in
//! debug builds entering a second section panics and names both. Release
//! builds compile the guard away.
//!
//! `DispatchGate` is the always-on switch a composite operation closes so
//! that the constituent mutations it performs do not emit their own events.

#[cfg(debug_assertions)]
use core::cell::Cell;
use core::marker::PhantomData;

/// Tracks which index section of a store is running, if any.
#[derive(Debug)]
pub(crate) struct IndexProbeGuard {
    #[cfg(debug_assertions)]
    active: Cell<Option<&'static str>>,
    // Stores are single-actor; keep the guard !Send + !Sync.
    _local: PhantomData<*mut ()>,
}

impl IndexProbeGuard {
    pub(crate) const fn new() -> Self {
        Self {
            #[cfg(debug_assertions)]
            active: Cell::new(None),
            _local: PhantomData,
        }
    }

    /// Mark `section` as running until the returned token drops.
    #[inline]
    pub(crate) fn enter(&self, section: &'static str) -> ProbeToken<'_> {
        #[cfg(debug_assertions)]
        {
            if let Some(outer) = self.active.get() {
                panic!("linked store index reentered: `{section}` called while `{outer}` is probing");
            }
            self.active.set(Some(section));
            ProbeToken { owner: self }
        }

        #[cfg(not(debug_assertions))]
        {
            let _ = section;
            ProbeToken { _z: PhantomData }
        }
    }

    /// The section currently holding the index, for diagnostics.
    #[cfg(all(test, debug_assertions))]
    pub(crate) fn active(&self) -> Option<&'static str> {
        self.active.get()
    }
}

impl Default for IndexProbeGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// Releases the index section on drop.
pub(crate) struct ProbeToken<'a> {
    #[cfg(debug_assertions)]
    owner: &'a IndexProbeGuard,
    #[cfg(not(debug_assertions))]
    _z: PhantomData<&'a ()>,
}

impl Drop for ProbeToken<'_> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        self.owner.active.set(None);
    }
}

/// Open/closed switch for per-item event dispatch.
///
/// Closing is counted so that nested composites reopen the gate only when
/// the outermost one finishes.
#[derive(Debug, Default)]
pub(crate) struct DispatchGate {
    closed: u32,
}

impl DispatchGate {
    pub(crate) const fn new() -> Self {
        Self { closed: 0 }
    }

    pub(crate) fn is_open(&self) -> bool {
        self.closed == 0
    }

    pub(crate) fn close(&mut self) {
        self.closed += 1;
    }

    pub(crate) fn open(&mut self) {
        debug_assert!(self.closed > 0, "dispatch gate opened more often than closed");
        self.closed = self.closed.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::{DispatchGate, IndexProbeGuard};

    /// Invariant: sequential sections are fine; the token releases on drop.
    #[test]
    fn sections_in_sequence() {
        let g = IndexProbeGuard::new();
        {
            let _t = g.enter("find_slot");
            #[cfg(debug_assertions)]
            assert_eq!(g.active(), Some("find_slot"));
        }
        #[cfg(debug_assertions)]
        assert_eq!(g.active(), None);
        let _again = g.enter("set_slot");
    }

    /// Invariant: a nested section panics and the message names both sections.
    #[cfg(debug_assertions)]
    #[test]
    fn nested_section_panics_with_names() {
        let g = IndexProbeGuard::new();
        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _outer = g.enter("set_slot");
            let _inner = g.enter("find_slot");
        }));
        let err = res.expect_err("nested index section must panic in debug builds");
        let msg = err
            .downcast_ref::<String>()
            .cloned()
            .unwrap_or_default();
        assert!(msg.contains("`find_slot` called while `set_slot` is probing"), "{msg}");
    }

    /// Nested composites keep the gate closed until the outermost reopens it.
    #[test]
    fn gate_nests() {
        let mut g = DispatchGate::new();
        assert!(g.is_open());
        g.close();
        g.close();
        g.open();
        assert!(!g.is_open());
        g.open();
        assert!(g.is_open());
    }
}
