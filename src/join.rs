//! The baseline batch join: one key per element, one fetch per composition.

use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::hash::Hash;
use std::{iter, slice};

use tracing::trace;

use crate::data::{KeySet, OnMiss};
use crate::listing::Listing;

/// A single-key list composer. Each element yields at most one key; the
/// distinct keys of a whole list are handed to `fetch` in a single call, and
/// each element's data is handed to `set`.
///
/// This covers both 1:1 data and 1:N data that the fetch function has already
/// grouped into a single value (see also [`OneToMany`](crate::OneToMany)).
///
/// ```
/// use std::collections::HashMap;
/// use std::convert::Infallible;
/// use batchjoin::{Join, KeySet};
///
/// #[derive(Debug, Clone, PartialEq)]
/// struct User { id: u32, name: String }
///
/// struct Order { user_id: Option<u32>, user: Option<User> }
///
/// fn users_by_id(ids: &KeySet<u32>) -> Result<HashMap<u32, User>, Infallible> {
///     Ok(ids.map_values(|&id| Some(User { id, name: format!("user {}", id) })))
/// }
///
/// let join = Join::new(
///     |order: &Order| order.user_id,
///     users_by_id,
///     |order: &mut Order, user| order.user = user,
/// );
///
/// let mut orders = vec![
///     Order { user_id: Some(1), user: None },
///     Order { user_id: None, user: None },
///     Order { user_id: Some(1), user: None },
/// ];
///
/// join.compose(&mut orders).unwrap();
///
/// assert_eq!(orders[0].user.as_ref().map(|u| u.id), Some(1));
/// assert_eq!(orders[1].user, None);
/// assert_eq!(orders[2].user.as_ref().map(|u| u.id), Some(1));
/// ```
#[derive(Clone, Copy)]
pub struct Join<KeyFn, FetchFn, SetFn> {
    pub key: KeyFn,
    pub fetch: FetchFn,
    pub set: SetFn,
    pub on_miss: OnMiss,
}

impl<KeyFn, FetchFn, SetFn> Debug for Join<KeyFn, FetchFn, SetFn> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Join")
            .field("key", &"<closure>")
            .field("fetch", &"<closure>")
            .field("set", &"<closure>")
            .field("on_miss", &self.on_miss)
            .finish()
    }
}

impl<KeyFn, FetchFn, SetFn> Join<KeyFn, FetchFn, SetFn> {
    pub fn new<T, U, K, V, E>(key: KeyFn, fetch: FetchFn, set: SetFn) -> Self
    where
        KeyFn: Fn(&T) -> Option<K>,
        FetchFn: Fn(&KeySet<K>) -> Result<HashMap<K, V>, E>,
        SetFn: Fn(&mut U, Option<V>),
    {
        Self {
            key,
            fetch,
            set,
            on_miss: OnMiss::Skip,
        }
    }

    /// Set the policy for elements whose key wasn't found.
    pub fn on_miss(self, on_miss: OnMiss) -> Self {
        Self { on_miss, ..self }
    }

    /// Enrich every element of `items` in place.
    pub fn compose<T, K, V, E>(&self, items: &mut [T]) -> Result<(), E>
    where
        KeyFn: Fn(&T) -> Option<K>,
        FetchFn: Fn(&KeySet<K>) -> Result<HashMap<K, V>, E>,
        SetFn: Fn(&mut T, Option<V>),
        K: Eq + Hash,
        V: Clone,
    {
        if items.is_empty() {
            return Ok(());
        }

        let keys: KeySet<K> = items.iter().filter_map(|item| (self.key)(item)).collect();

        let mut values = match keys.fetch_with("join", &self.fetch)? {
            Some(values) => values,
            None => return Ok(()),
        };

        for item in items.iter_mut() {
            if let Some(key) = (self.key)(item) {
                if let Some(value) = self.on_miss.resolve(values.take(key)) {
                    (self.set)(item, value);
                }
            }
        }

        Ok(())
    }

    pub fn compose_one<T, K, V, E>(&self, item: &mut T) -> Result<(), E>
    where
        KeyFn: Fn(&T) -> Option<K>,
        FetchFn: Fn(&KeySet<K>) -> Result<HashMap<K, V>, E>,
        SetFn: Fn(&mut T, Option<V>),
        K: Eq + Hash,
        V: Clone,
    {
        self.compose(slice::from_mut(item))
    }

    pub fn compose_listing<T, K, V, E, L>(&self, listing: &mut L) -> Result<(), E>
    where
        KeyFn: Fn(&T) -> Option<K>,
        FetchFn: Fn(&KeySet<K>) -> Result<HashMap<K, V>, E>,
        SetFn: Fn(&mut T, Option<V>),
        K: Eq + Hash,
        V: Clone,
        L: Listing<T> + ?Sized,
    {
        self.compose(listing.items_mut())
    }

    /// Convert every element of `items` into a view, then enrich the views.
    /// Keys are still extracted from the original elements. `convert` is
    /// called exactly once per element, in order, even if no data is fetched.
    pub fn compose_into<T, U, K, V, E, C>(
        &self,
        items: impl IntoIterator<Item = T>,
        mut convert: C,
    ) -> Result<Vec<U>, E>
    where
        KeyFn: Fn(&T) -> Option<K>,
        FetchFn: Fn(&KeySet<K>) -> Result<HashMap<K, V>, E>,
        SetFn: Fn(&mut U, Option<V>),
        K: Eq + Hash,
        V: Clone,
        C: FnMut(T) -> U,
    {
        let items: Vec<T> = items.into_iter().collect();
        let keys: KeySet<K> = items.iter().filter_map(|item| (self.key)(item)).collect();
        let mut values = keys.fetch_with("join", &self.fetch)?;

        Ok(items
            .into_iter()
            .map(|item| {
                let key = (self.key)(&item);
                let mut view = convert(item);

                if let (Some(key), Some(values)) = (key, values.as_mut()) {
                    if let Some(value) = self.on_miss.resolve(values.take(key)) {
                        (self.set)(&mut view, value);
                    }
                }

                view
            })
            .collect())
    }

    pub fn compose_one_into<T, U, K, V, E, C>(&self, item: T, convert: C) -> Result<U, E>
    where
        KeyFn: Fn(&T) -> Option<K>,
        FetchFn: Fn(&KeySet<K>) -> Result<HashMap<K, V>, E>,
        SetFn: Fn(&mut U, Option<V>),
        K: Eq + Hash,
        V: Clone,
        C: FnMut(T) -> U,
    {
        match self.compose_into(iter::once(item), convert)?.pop() {
            Some(view) => Ok(view),
            None => unreachable!("compose_into returned fewer views than elements"),
        }
    }

    /// Enrich a single element using a lookup for one key, rather than the
    /// batch fetch. Useful when a per-key lookup (a cache, a primary-key
    /// query) is cheaper than building a `KeySet`. `fetch_one` is not called
    /// if the element has no key.
    pub fn compose_one_with<T, K, V, E>(
        &self,
        item: &mut T,
        fetch_one: impl FnOnce(&K) -> Result<Option<V>, E>,
    ) -> Result<(), E>
    where
        KeyFn: Fn(&T) -> Option<K>,
        SetFn: Fn(&mut T, Option<V>),
    {
        let key = match (self.key)(item) {
            Some(key) => key,
            None => return Ok(()),
        };

        trace!(stage = "join", "dispatching single-key fetch");
        if let Some(value) = self.on_miss.resolve(fetch_one(&key)?) {
            (self.set)(item, value);
        }

        Ok(())
    }

    /// Convert a single element into a view, then enrich the view using a
    /// lookup for one key. `convert` is always called.
    pub fn compose_one_into_with<T, U, K, V, E>(
        &self,
        item: T,
        convert: impl FnOnce(T) -> U,
        fetch_one: impl FnOnce(&K) -> Result<Option<V>, E>,
    ) -> Result<U, E>
    where
        KeyFn: Fn(&T) -> Option<K>,
        SetFn: Fn(&mut U, Option<V>),
    {
        let value = match (self.key)(&item) {
            Some(key) => {
                trace!(stage = "join", "dispatching single-key fetch");
                self.on_miss.resolve(fetch_one(&key)?)
            }
            None => None,
        };

        let mut view = convert(item);
        if let Some(value) = value {
            (self.set)(&mut view, value);
        }

        Ok(view)
    }
}
