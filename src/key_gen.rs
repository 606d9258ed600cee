//! Auto-increment key generation for key-less inserts.
//!
//! `KeyGenerator` is a standalone component; any store that wants
//! key-less inserts owns one and implements [`AutoKey`] to route the
//! generated keys through its own `set`. Keys are the decimal increment,
//! optionally zero-padded to a minimum width, behind an optional prefix.
//! The increment only ever grows, so a key is never handed out twice even
//! after the entry it named has been removed. Once the key for `u64::MAX`
//! has been minted the generator is exhausted and refuses further keys
//! until it is reconfigured with a new increment.

use crate::error::StoreError;
use crate::linked_store::LinkedStore;
use core::hash::{BuildHasher, Hash};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field name under which `values_with_id` records carry the key.
pub const DEFAULT_ID_FIELD: &str = "__id__";
/// Field name under which `values_with_id` wraps non-record values.
pub const DEFAULT_VALUE_FIELD: &str = "value";
/// First increment handed out by a fresh generator.
pub const DEFAULT_INCREMENT: u64 = 1;

/// Partial configuration merged into a [`KeyGenerator`]. Unset fields keep
/// their previous value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct KeyGenConfig {
    pub increment: Option<u64>,
    pub increment_prefix: Option<String>,
    pub id_field_name: Option<String>,
    pub value_field_name: Option<String>,
}

impl KeyGenConfig {
    pub fn increment(mut self, increment: u64) -> Self {
        self.increment = Some(increment);
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.increment_prefix = Some(prefix.into());
        self
    }

    pub fn id_field(mut self, name: impl Into<String>) -> Self {
        self.id_field_name = Some(name.into());
        self
    }

    pub fn value_field(mut self, name: impl Into<String>) -> Self {
        self.value_field_name = Some(name.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyGenerator {
    increment: u64,
    // Set after minting the key for `u64::MAX`.
    exhausted: bool,
    increment_prefix: String,
    id_field_name: String,
    value_field_name: String,
}

impl Default for KeyGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyGenerator {
    pub fn new() -> Self {
        Self {
            increment: DEFAULT_INCREMENT,
            exhausted: false,
            increment_prefix: String::new(),
            id_field_name: DEFAULT_ID_FIELD.to_owned(),
            value_field_name: DEFAULT_VALUE_FIELD.to_owned(),
        }
    }

    pub fn with_config(config: KeyGenConfig) -> Self {
        let mut generator = Self::new();
        generator.configure(config);
        generator
    }

    /// Merge `config` into the current state.
    pub fn configure(&mut self, config: KeyGenConfig) {
        let KeyGenConfig {
            increment,
            increment_prefix,
            id_field_name,
            value_field_name,
        } = config;
        if let Some(increment) = increment {
            self.increment = increment;
            self.exhausted = false;
        }
        if let Some(prefix) = increment_prefix {
            self.increment_prefix = prefix;
        }
        if let Some(name) = id_field_name {
            self.id_field_name = name;
        }
        if let Some(name) = value_field_name {
            self.value_field_name = name;
        }
    }

    /// Merge loosely-typed configuration. Anything other than a JSON object
    /// is ignored and leaves the configuration untouched.
    pub fn configure_value(&mut self, params: &Value) -> Result<(), StoreError> {
        if !params.is_object() {
            tracing::trace!("ignoring non-object key generator configuration");
            return Ok(());
        }
        let config = KeyGenConfig::deserialize(params).map_err(StoreError::InvalidConfig)?;
        self.configure(config);
        Ok(())
    }

    /// Snapshot of the full configuration, every field set.
    pub fn config(&self) -> KeyGenConfig {
        KeyGenConfig {
            increment: Some(self.increment),
            increment_prefix: Some(self.increment_prefix.clone()),
            id_field_name: Some(self.id_field_name.clone()),
            value_field_name: Some(self.value_field_name.clone()),
        }
    }

    /// The increment the next key will be built from.
    pub fn increment(&self) -> u64 {
        self.increment
    }

    pub fn prefix(&self) -> &str {
        &self.increment_prefix
    }

    pub fn id_field_name(&self) -> &str {
        &self.id_field_name
    }

    pub fn value_field_name(&self) -> &str {
        &self.value_field_name
    }

    /// Whether every increment up to `u64::MAX` has been handed out.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Build the next key and advance the increment.
    ///
    /// With `min_length` the decimal increment is left-padded with `'0'`
    /// up to that many digits; it is never truncated. Fails with
    /// [`StoreError::KeysExhausted`] once the increment has run out.
    pub fn next_key(&mut self, min_length: Option<usize>) -> Result<String, StoreError> {
        if self.exhausted {
            return Err(StoreError::KeysExhausted);
        }
        let width = min_length.unwrap_or(0);
        let key = format!("{}{:0width$}", self.increment_prefix, self.increment);
        match self.increment.checked_add(1) {
            Some(next) => self.increment = next,
            None => {
                tracing::warn!(prefix = %self.increment_prefix, "key generator exhausted");
                self.exhausted = true;
            }
        }
        Ok(key)
    }

    /// JSON record for one entry: objects gain the id field, anything else
    /// is wrapped as `{ id: key, value: value }`.
    pub fn with_id<K, V>(&self, key: &K, value: &V) -> Result<Value, StoreError>
    where
        K: Serialize + ?Sized,
        V: Serialize + ?Sized,
    {
        let value = serde_json::to_value(value).map_err(StoreError::Serialize)?;
        self.annotate(key, value)
    }

    fn annotate<K>(&self, key: &K, value: Value) -> Result<Value, StoreError>
    where
        K: Serialize + ?Sized,
    {
        let id = serde_json::to_value(key).map_err(StoreError::Serialize)?;
        match value {
            Value::Object(mut record) => {
                record.insert(self.id_field_name.clone(), id);
                Ok(Value::Object(record))
            }
            other => {
                let mut record = Map::new();
                record.insert(self.id_field_name.clone(), id);
                record.insert(self.value_field_name.clone(), other);
                Ok(Value::Object(record))
            }
        }
    }
}

/// Key-less inserts for a host store.
///
/// Implementors supply the generator and the insert; `store_with_id` and
/// `push` come for free.
pub trait AutoKey<V> {
    fn generator(&self) -> &KeyGenerator;

    fn generator_mut(&mut self) -> &mut KeyGenerator;

    /// Insert `value` under a freshly generated key through the host's own
    /// `set`. Returns whether the insert took effect.
    fn store_generated(&mut self, key: String, value: V) -> bool;

    /// Store each value under a generated key, in order, and return the keys.
    ///
    /// A key is consumed even when the host declines the insert. If the
    /// generator runs out part way, the values already stored stay stored
    /// and the rest are dropped with the error.
    fn store_with_id<I>(
        &mut self,
        values: I,
        min_length: Option<usize>,
    ) -> Result<Vec<String>, StoreError>
    where
        I: IntoIterator<Item = V>,
        Self: Sized,
    {
        let mut keys = Vec::new();
        for value in values {
            let key = self.generator_mut().next_key(min_length)?;
            self.store_generated(key.clone(), value);
            keys.push(key);
        }
        Ok(keys)
    }

    /// Store one value under a generated key.
    fn push(&mut self, value: V) -> Result<String, StoreError> {
        let key = self.generator_mut().next_key(None)?;
        self.store_generated(key.clone(), value);
        Ok(key)
    }
}

impl<K, V, S> AutoKey<V> for LinkedStore<K, V, S>
where
    K: Eq + Hash + From<String>,
    S: BuildHasher,
{
    fn generator(&self) -> &KeyGenerator {
        self.key_generator()
    }

    fn generator_mut(&mut self) -> &mut KeyGenerator {
        self.key_generator_mut()
    }

    fn store_generated(&mut self, key: String, value: V) -> bool {
        self.set(K::from(key), value);
        true
    }
}

impl<K, V, S> LinkedStore<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    /// Insert values under generated keys; the values-only form of `add_all`.
    pub fn add_values<I>(&mut self, values: I) -> Result<Vec<String>, StoreError>
    where
        I: IntoIterator<Item = V>,
        K: From<String>,
    {
        self.store_with_id(values, None)
    }

    /// Every entry as a JSON record carrying its key, in chain order.
    ///
    /// The result is a snapshot; the stored values are not touched.
    pub fn values_with_id(&self) -> Result<Vec<Value>, StoreError>
    where
        K: Serialize,
        V: Serialize,
    {
        let generator = self.key_generator();
        self.iter().map(|(k, v)| generator.with_id(k, v)).collect()
    }
}

impl<K, S> LinkedStore<K, Value, S>
where
    K: Eq + Hash + Serialize,
    S: BuildHasher,
{
    /// Like [`LinkedStore::values_with_id`], but object values are
    /// augmented with the id field in place before being returned.
    pub fn stamp_ids(&mut self) -> Result<Vec<Value>, StoreError> {
        let generator = self.key_generator().clone();
        let mut out = Vec::with_capacity(self.len());
        let mut failure = None;
        self.for_each_mut(|k, v| {
            if failure.is_some() {
                return;
            }
            let id = match serde_json::to_value(k) {
                Ok(id) => id,
                Err(e) => {
                    failure = Some(StoreError::Serialize(e));
                    return;
                }
            };
            match v {
                Value::Object(record) => {
                    record.insert(generator.id_field_name.clone(), id);
                    out.push(Value::Object(record.clone()));
                }
                other => match generator.annotate(k, other.clone()) {
                    Ok(record) => out.push(record),
                    Err(e) => failure = Some(e),
                },
            }
        });
        match failure {
            Some(e) => Err(e),
            None => Ok(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Invariant: keys are prefix + zero-padded increment; the increment only grows.
    #[test]
    fn next_key_formats_and_advances() {
        let mut g = KeyGenerator::new();
        assert_eq!(g.next_key(Some(3)).unwrap(), "001");
        assert_eq!(g.next_key(None).unwrap(), "2");
        assert_eq!(g.next_key(Some(0)).unwrap(), "3");
        g.configure(KeyGenConfig::default().prefix("i").increment(1234));
        assert_eq!(g.next_key(Some(3)).unwrap(), "i1234");
        assert_eq!(g.increment(), 1235);
    }

    /// Invariant: configure merges only the fields that are set.
    #[test]
    fn configure_merges() {
        let mut g = KeyGenerator::new();
        g.configure(KeyGenConfig::default().id_field("id"));
        assert_eq!(g.id_field_name(), "id");
        assert_eq!(g.value_field_name(), DEFAULT_VALUE_FIELD);
        assert_eq!(g.prefix(), "");
        assert_eq!(g.increment(), DEFAULT_INCREMENT);

        g.configure(KeyGenConfig::default().value_field("v"));
        assert_eq!(g.id_field_name(), "id");
        assert_eq!(g.value_field_name(), "v");
    }

    /// Invariant: non-object input is a silent no-op; object input merges by camelCase name.
    #[test]
    fn configure_value_contract() {
        let mut g = KeyGenerator::new();
        let before = g.clone();
        for ignored in [json!(null), json!(7), json!("increment"), json!([1, 2])] {
            g.configure_value(&ignored).unwrap();
            assert_eq!(g, before);
        }

        g.configure_value(&json!({"increment": 10, "incrementPrefix": "row-"}))
            .unwrap();
        assert_eq!(g.next_key(None).unwrap(), "row-10");
        assert_eq!(g.id_field_name(), DEFAULT_ID_FIELD);

        let err = g.configure_value(&json!({"increment": "ten"}));
        assert!(matches!(err, Err(StoreError::InvalidConfig(_))));
        assert_eq!(g.increment(), 11);
    }

    /// Invariant: config() round-trips through with_config.
    #[test]
    fn config_snapshot_restores_generator() {
        let mut g = KeyGenerator::with_config(KeyGenConfig::default().prefix("p"));
        g.next_key(None).unwrap();
        let copy = KeyGenerator::with_config(g.config());
        assert_eq!(copy, g);
    }

    /// Invariant: objects gain the id field; scalars and arrays are wrapped.
    #[test]
    fn with_id_shapes() {
        let g = KeyGenerator::new();
        assert_eq!(
            g.with_id("001", &json!({"name": "x"})).unwrap(),
            json!({"name": "x", "__id__": "001"})
        );
        assert_eq!(
            g.with_id("002", &5).unwrap(),
            json!({"__id__": "002", "value": 5})
        );
        assert_eq!(
            g.with_id(&3u32, &vec![1, 2]).unwrap(),
            json!({"__id__": 3, "value": [1, 2]})
        );
    }

    /// Invariant: store_with_id([a,b,c], 3) from a fresh generator yields 001..003
    /// and stores each value under its key.
    #[test]
    fn store_with_id_on_linked_store() {
        let mut m: LinkedStore<String, &str> = LinkedStore::new();
        let keys = m.store_with_id(["a", "b", "c"], Some(3)).unwrap();
        assert_eq!(keys, ["001", "002", "003"]);
        assert_eq!(m.peek("002"), Some(&"b"));
        assert_eq!(m.push("d").unwrap(), "4");

        m.remove("4");
        assert_eq!(m.push("e").unwrap(), "5", "removed keys are never reused");
        assert_eq!(m.add_values(["f", "g"]).unwrap(), ["6", "7"]);
        assert_eq!(m.generator().increment(), 8);
    }

    /// Invariant: values_with_id follows chain order and wraps scalars.
    #[test]
    fn values_with_id_snapshot() {
        let mut m: LinkedStore<String, String> = LinkedStore::new();
        m.set("001".into(), "x".into());
        assert_eq!(
            m.values_with_id().unwrap(),
            vec![json!({"__id__": "001", "value": "x"})]
        );

        let mut c: LinkedStore<String, i32> = LinkedStore::with_options(
            crate::linked_store::StoreOptions::lru(0),
        );
        c.add_all([("a".into(), 1), ("b".into(), 2)]);
        c.get("a");
        let ids: Vec<_> = c
            .values_with_id()
            .unwrap()
            .into_iter()
            .map(|r| r["__id__"].clone())
            .collect();
        assert_eq!(ids, [json!("b"), json!("a")]);
    }

    /// Invariant: stamp_ids writes the id into stored objects and leaves scalars as stored.
    #[test]
    fn stamp_ids_in_place() {
        let mut m: LinkedStore<String, Value> = LinkedStore::new();
        m.key_generator_mut()
            .configure(KeyGenConfig::default().id_field("id").value_field("v"));
        m.push(json!({"name": "ada"})).unwrap();
        m.push(json!(42)).unwrap();
        let out = m.stamp_ids().unwrap();
        assert_eq!(
            out,
            vec![json!({"name": "ada", "id": "1"}), json!({"id": "2", "v": 42})]
        );
        assert_eq!(m.peek("1"), Some(&json!({"name": "ada", "id": "1"})));
        assert_eq!(m.peek("2"), Some(&json!(42)));
    }

    /// Invariant: the key for u64::MAX is minted once; later requests fail
    /// without wrapping, and nothing is stored for them.
    #[test]
    fn increment_stops_at_u64_max() {
        let mut m: LinkedStore<String, i32> = LinkedStore::new();
        m.key_generator_mut()
            .configure(KeyGenConfig::default().increment(u64::MAX - 1));
        let keys = m.store_with_id([1, 2, 3], None);
        assert!(matches!(keys, Err(StoreError::KeysExhausted)));
        assert_eq!(m.len(), 2);
        assert_eq!(m.peek(u64::MAX.to_string().as_str()), Some(&2));
        assert!(m.generator().is_exhausted());
        assert_eq!(m.generator().increment(), u64::MAX);

        assert!(matches!(m.push(4), Err(StoreError::KeysExhausted)));
        assert_eq!(m.len(), 2);

        m.key_generator_mut()
            .configure(KeyGenConfig::default().increment(7));
        assert!(!m.generator().is_exhausted());
        assert_eq!(m.push(4).unwrap(), "7");
    }
}
