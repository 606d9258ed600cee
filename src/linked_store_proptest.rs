#![cfg(test)]

// Property tests for LinkedStore kept inside the crate so they can look
// at the chain and cursor directly.

use crate::linked_store::{LinkedStore, StoreOptions};
use proptest::prelude::*;
use std::fmt;
use std::hash::{BuildHasher, Hasher};

// Key newtype with Borrow<str> to exercise borrowed lookup.
#[derive(Clone, Eq, PartialEq, Hash)]
struct Key(String);
impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
impl std::borrow::Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// Pool-indexed operations so shrinking moves toward earlier keys.
#[derive(Clone, Debug)]
enum OpI {
    Set(usize, i32),
    Get(usize),
    Peek(usize),
    Remove(usize),
    SetCursor(usize),
    Next,
    Prev,
    PopFront,
    Contains(String),
}

fn key_from(pool: &[String], i: usize) -> Key {
    Key(pool[i].clone())
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z]{0,4}", 1..=8).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let op = prop_oneof![
            3 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Set(i, v)),
            1 => idx.clone().prop_map(OpI::Get),
            1 => idx.clone().prop_map(OpI::Peek),
            1 => idx.clone().prop_map(OpI::Remove),
            1 => idx.clone().prop_map(OpI::SetCursor),
            2 => Just(OpI::Next),
            1 => Just(OpI::Prev),
            1 => Just(OpI::PopFront),
            1 => "[a-z]{0,4}".prop_map(OpI::Contains),
        ];
        proptest::collection::vec(op, 1..80).prop_map(move |ops| (pool.clone(), ops))
    })
}

/// Ordered reference model: a vector in chain order plus the key under
/// the cursor.
#[derive(Default)]
struct Model {
    entries: Vec<(Key, i32)>,
    cursor: Option<Key>,
    max_count: usize,
    cache_mode: bool,
}

impl Model {
    fn index_of(&self, k: &Key) -> Option<usize> {
        self.entries.iter().position(|(kk, _)| kk == k)
    }

    fn touch(&mut self, i: usize) -> usize {
        if self.cache_mode {
            let e = self.entries.remove(i);
            self.entries.push(e);
            self.entries.len() - 1
        } else {
            i
        }
    }

    fn remove_at(&mut self, i: usize) -> (Key, i32) {
        if self.cursor.as_ref() == Some(&self.entries[i].0) {
            self.cursor = if self.entries.len() == 1 {
                None
            } else {
                Some(self.entries[(i + 1) % self.entries.len()].0.clone())
            };
        }
        self.entries.remove(i)
    }

    fn set(&mut self, k: Key, v: i32) {
        match self.index_of(&k) {
            Some(i) => {
                self.entries[i].1 = v;
                self.touch(i);
            }
            None => self.entries.push((k, v)),
        }
        while self.max_count > 0 && self.entries.len() > self.max_count {
            self.remove_at(0);
        }
    }

    fn get(&mut self, k: &Key) -> Option<i32> {
        let i = self.index_of(k)?;
        let i = self.touch(i);
        Some(self.entries[i].1)
    }

    fn step(&mut self, forward: bool) -> Option<i32> {
        let n = self.entries.len();
        if n == 0 {
            return None;
        }
        let at = match self.cursor.as_ref().and_then(|k| self.index_of(k)) {
            None if forward => 0,
            None => n - 1,
            Some(i) if forward => (i + 1) % n,
            Some(i) => (i + n - 1) % n,
        };
        self.cursor = Some(self.entries[at].0.clone());
        Some(self.entries[at].1)
    }
}

fn run_scenario<S: BuildHasher>(
    mut sut: LinkedStore<Key, i32, S>,
    pool: &[String],
    ops: Vec<OpI>,
) -> Result<(), TestCaseError> {
    let mut model = Model {
        max_count: sut.max_count(),
        cache_mode: sut.is_cache(),
        ..Model::default()
    };
    for op in ops {
        match op {
            OpI::Set(i, v) => {
                let k = key_from(pool, i);
                sut.set(k.clone(), v);
                model.set(k, v);
            }
            OpI::Get(i) => {
                let k = key_from(pool, i);
                prop_assert_eq!(sut.get(&k).copied(), model.get(&k));
            }
            OpI::Peek(i) => {
                let k = key_from(pool, i);
                let expect = model.index_of(&k).map(|i| model.entries[i].1);
                prop_assert_eq!(sut.peek(&k).copied(), expect);
            }
            OpI::Remove(i) => {
                let k = key_from(pool, i);
                let expect = model.index_of(&k).map(|i| model.remove_at(i));
                prop_assert_eq!(sut.remove_entry(&k), expect);
            }
            OpI::SetCursor(i) => {
                let k = key_from(pool, i);
                let got = sut.set_cursor(&k).copied();
                if model.index_of(&k).is_some() {
                    model.cursor = Some(k.clone());
                }
                prop_assert_eq!(got, model.get(&k));
            }
            OpI::Next => {
                prop_assert_eq!(sut.next().copied(), model.step(true));
            }
            OpI::Prev => {
                prop_assert_eq!(sut.prev().copied(), model.step(false));
            }
            OpI::PopFront => {
                let expect = if model.entries.is_empty() {
                    None
                } else {
                    Some(model.remove_at(0))
                };
                prop_assert_eq!(sut.pop_front(), expect);
            }
            OpI::Contains(s) => {
                let has_model = model.entries.iter().any(|(k, _)| k.0 == s);
                prop_assert_eq!(sut.contains_key(s.as_str()), has_model);
            }
        }

        // Post-conditions after each op
        // 1) Chain order and values match the model
        let got: Vec<(Key, i32)> = sut.iter().map(|(k, v)| (k.clone(), *v)).collect();
        prop_assert_eq!(&got, &model.entries);
        // 2) The bound holds
        if model.max_count > 0 {
            prop_assert!(sut.len() <= model.max_count);
        }
        // 3) The cursor names a live record or the sentinel
        prop_assert_eq!(sut.current().map(|(k, _)| k.clone()), model.cursor.clone());
        let ordinal = model
            .cursor
            .as_ref()
            .and_then(|k| model.index_of(k))
            .map(|i| i + 1);
        prop_assert_eq!(sut.cursor_ordinal(), ordinal);
        prop_assert_eq!(sut.len(), model.entries.len());
        // 4) The index holds exactly one live slot per chain record
        prop_assert_eq!(sut.index_len(), sut.len());
        prop_assert!(sut.index_matches_chain());
    }
    Ok(())
}

// Property: state-machine equivalence against an ordered Vec model.
// Invariants exercised across random operation sequences:
// - key set and chain order match the model after every op;
// - the count never exceeds a non-zero bound, evicting from the front;
// - in cache mode get/set/set_cursor move the entry to the back;
// - the cursor survives removal and eviction by stepping forward.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario(), max_count in 0usize..5, cache_mode in any::<bool>()) {
        let sut: LinkedStore<Key, i32> =
            LinkedStore::with_options(StoreOptions { max_count, cache_mode });
        run_scenario(sut, &pool, ops)?;
    }
}

// Collision variant using a constant hasher to stress equality resolution.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 32, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_collisions((pool, ops) in arb_scenario(), cache_mode in any::<bool>()) {
        let sut: LinkedStore<Key, i32, ConstBuildHasher> = LinkedStore::with_options_and_hasher(
            StoreOptions { max_count: 3, cache_mode },
            ConstBuildHasher,
        );
        run_scenario(sut, &pool, ops)?;
    }
}
