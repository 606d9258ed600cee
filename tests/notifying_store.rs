// NotifyingStore integration suite.
//
// Core invariants exercised:
// - Bracketing: every successful mutation emits before, after, then one
//   data-changed event; a vetoed one emits only its before-event.
// - Veto: a denied operation leaves the store exactly as it was.
// - Batching: add_all is a single operation from a listener's view.
// - Identity: dataset_id lets one listener tell several stores apart.
use linked_event_map::{
    Event, EventKind, Listener, NotifyingStore, Operation, Payload, StoreOptions, Verdict,
};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Default)]
struct Tally {
    by_name: HashMap<&'static str, usize>,
    by_dataset: HashMap<String, usize>,
    deny_keys: Vec<String>,
}

impl Listener<String, i32> for Tally {
    fn before(&mut self, event: &Event<'_, String, i32>) -> Verdict {
        *self.by_name.entry(event.kind.name()).or_default() += 1;
        match event.payload {
            Payload::Set { key, .. } | Payload::Remove { key, .. }
                if self.deny_keys.contains(key) =>
            {
                Verdict::Deny
            }
            _ => Verdict::Allow,
        }
    }

    fn notify(&mut self, event: &Event<'_, String, i32>) {
        *self.by_name.entry(event.kind.name()).or_default() += 1;
        if let Some(id) = event.dataset_id {
            *self.by_dataset.entry(id.to_owned()).or_default() += 1;
        }
    }
}

impl Tally {
    fn count(&self, name: &str) -> usize {
        self.by_name.get(name).copied().unwrap_or(0)
    }
}

// Test: data-changed fires once per successful mutation and never for vetoed ones.
// Assumes: "blocked" is denied by the listener for both set and remove.
// Verifies: counts of every event name after a mixed sequence.
#[test]
fn data_changed_counts_successful_mutations() {
    let tally = Rc::new(RefCell::new(Tally {
        deny_keys: vec!["blocked".into()],
        ..Tally::default()
    }));
    let mut m: NotifyingStore<String, i32> = NotifyingStore::new();
    m.subscribe(tally.clone());

    assert!(m.set("a".into(), 1));
    assert!(m.set("a".into(), 2));
    assert!(!m.set("blocked".into(), 3));
    assert!(m.add_all([("b".into(), 4), ("c".into(), 5)]));
    assert!(m.remove("b"));
    assert!(!m.remove("blocked"));

    let t = tally.borrow();
    assert_eq!(t.count("before-set"), 3);
    assert_eq!(t.count("after-set"), 2);
    assert_eq!(t.count("before-addAll"), 1);
    assert_eq!(t.count("after-addAll"), 1);
    assert_eq!(t.count("before-remove"), 2);
    assert_eq!(t.count("after-remove"), 1);
    assert_eq!(t.count("data-changed"), 4);
    assert_eq!(m.len(), 2);
}

// Test: veto leaves the store exactly as it was.
// Verifies: order, values and the cursor are unchanged after a denied set and remove.
#[test]
fn vetoed_operations_change_nothing() {
    let mut m: NotifyingStore<String, i32> = NotifyingStore::with_options(StoreOptions::lru(2));
    m.add_all([("a".into(), 1), ("b".into(), 2)]);
    m.set_cursor("a");
    let snapshot: Vec<_> = m.iter().map(|(k, v)| (k.clone(), *v)).collect();

    m.subscribe_fn(|e| {
        if e.kind.is_before() {
            Verdict::Deny
        } else {
            Verdict::Allow
        }
    });
    assert!(!m.set("c".into(), 3));
    assert!(!m.set("b".into(), 20));
    assert!(!m.remove("a"));
    assert!(!m.add_all([("d".into(), 4)]));

    let after: Vec<_> = m.iter().map(|(k, v)| (k.clone(), *v)).collect();
    assert_eq!(after, snapshot);
    assert_eq!(m.current(), Some((&"a".to_string(), &1)));
}

// Test: one listener shared by two stores.
// Assumes: each store carries its own dataset id.
// Verifies: events are attributed to the right store.
#[test]
fn shared_listener_sees_dataset_ids() {
    let tally = Rc::new(RefCell::new(Tally::default()));
    let mut left: NotifyingStore<String, i32> = NotifyingStore::new().with_dataset_id("left");
    let mut right: NotifyingStore<String, i32> = NotifyingStore::new().with_dataset_id("right");
    left.subscribe(tally.clone());
    right.subscribe(tally.clone());

    left.set("a".into(), 1);
    right.set("a".into(), 1);
    right.remove("a");

    let t = tally.borrow();
    // before-events go through `before`, which does not count datasets
    assert_eq!(t.by_dataset.get("left"), Some(&2));
    assert_eq!(t.by_dataset.get("right"), Some(&4));
}

// Test: add_all payloads.
// Verifies: the before-event carries keys and values; the after-event carries keys only.
#[test]
fn add_all_payloads() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    let mut m: NotifyingStore<String, i32> = NotifyingStore::new();
    m.subscribe_fn(move |e| {
        if let Payload::AddAll { keys, values } = e.payload {
            sink.borrow_mut()
                .push((e.kind, keys.to_vec(), values.map(<[i32]>::to_vec)));
        }
        Verdict::Allow
    });
    m.add_all([("x".into(), 1), ("y".into(), 2)]);

    let seen = seen.borrow();
    let keys = vec!["x".to_string(), "y".to_string()];
    assert_eq!(
        seen[0],
        (EventKind::Before(Operation::AddAll), keys.clone(), Some(vec![1, 2]))
    );
    assert_eq!(seen[1], (EventKind::After(Operation::AddAll), keys.clone(), None));
    assert_eq!(seen[2], (EventKind::DataChanged(Operation::AddAll), keys, None));
}

// Test: unsubscribe stops delivery for that listener only.
#[test]
fn unsubscribe_one_listener() {
    let first = Rc::new(RefCell::new(Tally::default()));
    let second = Rc::new(RefCell::new(Tally::default()));
    let mut m: NotifyingStore<String, i32> = NotifyingStore::new();
    let id = m.subscribe(first.clone());
    m.subscribe(second.clone());
    assert_eq!(m.listener_count(), 2);

    m.set("a".into(), 1);
    assert!(m.unsubscribe(id));
    m.set("b".into(), 2);

    assert_eq!(first.borrow().count("after-set"), 1);
    assert_eq!(second.borrow().count("after-set"), 2);
    m.unsubscribe_all();
    assert_eq!(m.listener_count(), 0);
}

// Test: generated keys flow through the event sequence.
// Verifies: push emits set events under the generated key; values_with_id exports them.
#[test]
fn generated_keys_emit_set_events() {
    use linked_event_map::AutoKey;

    let keys = Rc::new(RefCell::new(Vec::new()));
    let sink = keys.clone();
    let mut m: NotifyingStore<String, i32> = NotifyingStore::new();
    m.subscribe_fn(move |e| {
        if let (EventKind::After(Operation::Set), Payload::Set { key, .. }) = (e.kind, e.payload) {
            sink.borrow_mut().push(key.clone());
        }
        Verdict::Allow
    });
    let stored = m.store_with_id([10, 20], Some(2)).unwrap();
    assert_eq!(stored, ["01", "02"]);
    assert_eq!(*keys.borrow(), ["01", "02"]);

    let records = m.values_with_id().unwrap();
    assert_eq!(records[1], serde_json::json!({"__id__": "02", "value": 20}));
}
