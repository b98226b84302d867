//! Data structures for passing keys into a batch fetch and distributing the
//! fetched values back out to the elements that asked for them.

use std::borrow::Borrow;
use std::collections::hash_map::{Entry, HashMap};
use std::fmt::Debug;
use std::hash::Hash;
use std::iter::FromIterator;

use thiserror::Error;
use tracing::trace;

/// A set of keys passed into a batch fetch function. Use the `keys` method
/// to get the set of keys, all of which will be unique, so that you can
/// execute your request. Then return a `HashMap` pairing each key you found
/// with its value; keys with no data can simply be left out.
///
/// A `KeySet` is never empty when it reaches a fetch function. If a
/// composition extracts no keys at all, the fetch is skipped entirely.
///
/// Several helpers (`map_values`, `values_from_iter`, `groups_from_iter`)
/// are provided to build the result map from the shape of data your query
/// returns.
#[derive(Debug, Clone)]
pub struct KeySet<Key> {
    // Each key is associated with a count of how many elements are requesting
    // it *past the first*; in other words, the number of times its value will
    // need to be cloned when it's distributed.
    keys: HashMap<Key, usize>,
}

impl<Key: Eq + Hash> KeySet<Key> {
    pub(crate) fn new() -> Self {
        Self {
            keys: HashMap::new(),
        }
    }

    /// Record a request for a key.
    pub(crate) fn add_key(&mut self, key: Key) {
        self.keys
            .entry(key)
            .and_modify(|count| *count += 1)
            .or_insert(0);
    }

    /// Check if there are any keys in this keyset
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Get the number of unique keys in this keyset.
    #[inline]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Get an iterator over all the keys in this keyset. These are guaranteed
    /// to be:
    ///
    /// - Unique
    /// - Never null; elements without a key never contribute one
    /// - In an arbitrary order
    pub fn keys(&self) -> impl Iterator<Item = &Key> + Clone {
        self.keys.keys()
    }

    /// Check if a key was requested.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        Key: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.keys.contains_key(key)
    }

    /// Build a result map by looking up each key individually. Keys for which
    /// `get_value` returns `None` are left out of the result.
    pub fn map_values<Value>(
        &self,
        mut get_value: impl FnMut(&Key) -> Option<Value>,
    ) -> HashMap<Key, Value>
    where
        Key: Clone,
    {
        #[derive(Debug)]
        enum Never {}

        match self.try_map_values(move |key| -> Result<Option<Value>, Never> { Ok(get_value(key)) })
        {
            Ok(values) => values,
            Err(never) => match never {},
        }
    }

    /// Fallible version of map_values. Same as map_values, but will return
    /// an error the first time `get_value` returns an error.
    pub fn try_map_values<Value, Error>(
        &self,
        mut get_value: impl FnMut(&Key) -> Result<Option<Value>, Error>,
    ) -> Result<HashMap<Key, Value>, Error>
    where
        Key: Clone,
    {
        let mut values = HashMap::with_capacity(self.len());

        for key in self.keys() {
            if let Some(value) = get_value(key)? {
                values.insert(key.clone(), value);
            }
        }

        Ok(values)
    }

    /// Pair each row returned by your query with its key, producing a 1:1
    /// result map. Every row must be keyed by one of the requested keys;
    /// duplicate rows for the same key are resolved with `on_duplicate`.
    pub fn values_from_iter<Value>(
        &self,
        on_duplicate: OnDuplicate,
        values: impl IntoIterator<Item = Value>,
    ) -> Result<HashMap<Key, Value>, IntoValuesError<Key>>
    where
        Key: Clone,
        Value: KeyedEntry<Key>,
    {
        let mut result = HashMap::with_capacity(self.len());

        for value in values {
            let key = self.requested_key(&value)?;

            match result.entry(key) {
                Entry::Vacant(entry) => {
                    entry.insert(value);
                }
                Entry::Occupied(mut entry) => match on_duplicate {
                    OnDuplicate::Ignore => {}
                    OnDuplicate::Replace => {
                        entry.insert(value);
                    }
                    OnDuplicate::Error => {
                        return Err(IntoValuesError::DuplicateKey(entry.key().clone()))
                    }
                },
            }
        }

        Ok(result)
    }

    /// Group each row returned by your query under its key, producing a 1:N
    /// result map. Rows keep their relative order within a group. Every row
    /// must be keyed by one of the requested keys.
    pub fn groups_from_iter<Value>(
        &self,
        values: impl IntoIterator<Item = Value>,
    ) -> Result<HashMap<Key, Vec<Value>>, IntoValuesError<Key>>
    where
        Key: Clone,
        Value: KeyedEntry<Key>,
    {
        let mut result: HashMap<Key, Vec<Value>> = HashMap::with_capacity(self.len());

        for value in values {
            let key = self.requested_key(&value)?;
            result.entry(key).or_default().push(value);
        }

        Ok(result)
    }

    fn requested_key<Value>(&self, value: &Value) -> Result<Key, IntoValuesError<Key>>
    where
        Key: Clone,
        Value: KeyedEntry<Key>,
    {
        let key = value.get_key();

        match self.contains(key) {
            true => Ok(key.clone()),
            false => Err(IntoValuesError::UnrequestedKey(key.clone())),
        }
    }

    /// Hand this keyset to a fetch function, unless it's empty, and pair the
    /// result with the request counts. Entries in the result for keys that
    /// were never requested are discarded.
    pub(crate) fn fetch_with<Value, Error>(
        self,
        stage: &'static str,
        fetch: impl FnOnce(&Self) -> Result<HashMap<Key, Value>, Error>,
    ) -> Result<Option<ValueSet<Key, Value>>, Error> {
        if self.is_empty() {
            trace!(stage, "no keys extracted; skipping batch fetch");
            return Ok(None);
        }

        trace!(stage, keys = self.len(), "dispatching batch fetch");
        let fetched = fetch(&self)?;

        let KeySet { mut keys } = self;
        let values = fetched
            .into_iter()
            .filter_map(move |(key, value)| {
                let count = keys.remove(&key)?;
                Some((key, ValueSetEntry { value, count }))
            })
            .collect();

        Ok(Some(ValueSet { values }))
    }
}

impl<Key: Eq + Hash> Default for KeySet<Key> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Key: Eq + Hash> Extend<Key> for KeySet<Key> {
    fn extend<I: IntoIterator<Item = Key>>(&mut self, iter: I) {
        iter.into_iter().for_each(|key| self.add_key(key))
    }
}

impl<Key: Eq + Hash> FromIterator<Key> for KeySet<Key> {
    fn from_iter<I: IntoIterator<Item = Key>>(iter: I) -> Self {
        let mut keys = Self::new();
        keys.extend(iter);
        keys
    }
}

/// Types that know their own key. Implement this for the rows your fetch
/// function loads so that [`KeySet::values_from_iter`] and
/// [`KeySet::groups_from_iter`] can pair them up with the requested keys.
pub trait KeyedEntry<Key> {
    fn get_key(&self) -> &Key;
}

impl<Key, Value> KeyedEntry<Key> for (Key, Value) {
    fn get_key(&self) -> &Key {
        &self.0
    }
}

/// What to do when a query returns more than one row for the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDuplicate {
    /// Keep the first row
    Ignore,

    /// Keep the last row
    Replace,

    /// Fail with [`IntoValuesError::DuplicateKey`]
    Error,
}

/// Error building a result map from query rows.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntoValuesError<Key> {
    #[error("row keyed by {0:?} was not requested")]
    UnrequestedKey(Key),

    #[error("more than one row keyed by {0:?}")]
    DuplicateKey(Key),
}

/// What to do with an element whose key has no entry in the fetched result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnMiss {
    /// Leave the element unmodified. This is the default.
    Skip,

    /// Call the setter anyway, with `None` (or an empty list, for composers
    /// that set lists).
    Apply,
}

impl Default for OnMiss {
    fn default() -> Self {
        OnMiss::Skip
    }
}

impl OnMiss {
    /// Decide what, if anything, the setter should be called with. The outer
    /// `Option` is `None` when the setter should not be called at all.
    #[inline]
    pub(crate) fn resolve<Value>(self, value: Option<Value>) -> Option<Option<Value>> {
        match (value, self) {
            (Some(value), _) => Some(Some(value)),
            (None, OnMiss::Apply) => Some(None),
            (None, OnMiss::Skip) => None,
        }
    }
}

#[derive(Debug)]
struct ValueSetEntry<Value> {
    count: usize,
    value: Value,
}

/// The result of a batch fetch, restricted to the requested keys and paired
/// with their request counts. Used by the composers to distribute values to
/// the elements in order.
#[derive(Debug)]
pub(crate) struct ValueSet<Key, Value> {
    values: HashMap<Key, ValueSetEntry<Value>>,
}

impl<Key: Eq + Hash, Value> ValueSet<Key, Value> {
    /// Look at a value without consuming a request for it.
    pub(crate) fn get(&self, key: &Key) -> Option<&Value> {
        self.values.get(key).map(|entry| &entry.value)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub(crate) fn values(&self) -> impl Iterator<Item = &Value> {
        self.values.values().map(|entry| &entry.value)
    }
}

impl<Key: Eq + Hash, Value: Clone> ValueSet<Key, Value> {
    /// Take a value associated with a key out of this ValueSet. If the
    /// count of this key is > 0, the value is cloned; the last request for
    /// a key receives the original.
    pub(crate) fn take(&mut self, key: Key) -> Option<Value> {
        match self.values.entry(key) {
            Entry::Vacant(..) => None,
            Entry::Occupied(entry) if entry.get().count == 0 => Some(entry.remove().value),
            Entry::Occupied(mut entry) => {
                let entry = entry.get_mut();
                entry.count -= 1;
                Some(entry.value.clone())
            }
        }
    }
}
