//! Joining several attribute slots of the same element against one shared
//! fetch.

use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::hash::Hash;
use std::slice;

use crate::binding::{Binding, DynBinding, KeyBinding};
use crate::data::{KeySet, OnMiss};
use crate::listing::Listing;

/// A multi-binding composer. Use this when an element has more than one slot
/// holding the same kind of related data; for instance, a document with both
/// a `creator` and an `updater`, both of which are users. Composing with
/// separate [`Join`](crate::Join)s would fetch users twice; a `MultiJoin`
/// unions the keys of every binding across every element, fetches once, and
/// then resolves each binding against the shared result independently. A
/// miss for one binding never affects another.
///
/// ```
/// use std::collections::HashMap;
/// use std::convert::Infallible;
/// use batchjoin::{KeySet, MultiJoin};
///
/// struct Document {
///     creator_id: Option<u32>,
///     updater_id: Option<u32>,
///     creator: Option<String>,
///     updater: Option<String>,
/// }
///
/// fn names(ids: &KeySet<u32>) -> Result<HashMap<u32, String>, Infallible> {
///     Ok(ids.map_values(|id| Some(format!("user {}", id))))
/// }
///
/// let join = MultiJoin::new(names)
///     .bind(|doc: &Document| doc.creator_id, |doc: &mut Document, name| doc.creator = name)
///     .bind(|doc: &Document| doc.updater_id, |doc: &mut Document, name| doc.updater = name);
///
/// let mut docs = vec![Document {
///     creator_id: Some(1),
///     updater_id: Some(2),
///     creator: None,
///     updater: None,
/// }];
///
/// join.compose(&mut docs).unwrap();
///
/// assert_eq!(docs[0].creator.as_deref(), Some("user 1"));
/// assert_eq!(docs[0].updater.as_deref(), Some("user 2"));
/// ```
pub struct MultiJoin<FetchFn, B> {
    pub fetch: FetchFn,
    pub bindings: Vec<B>,
    pub on_miss: OnMiss,
}

impl<FetchFn, B> Debug for MultiJoin<FetchFn, B> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiJoin")
            .field("fetch", &"<closure>")
            .field("bindings", &self.bindings.len())
            .field("on_miss", &self.on_miss)
            .finish()
    }
}

impl<FetchFn, B> MultiJoin<FetchFn, B> {
    /// Create a composer with no bindings yet. Composing with no bindings is
    /// a no-op.
    pub fn new(fetch: FetchFn) -> Self {
        Self::with_bindings(fetch, Vec::new())
    }

    pub fn with_bindings(fetch: FetchFn, bindings: impl IntoIterator<Item = B>) -> Self {
        Self {
            fetch,
            bindings: bindings.into_iter().collect(),
            on_miss: OnMiss::Skip,
        }
    }

    /// Add a binding.
    pub fn push(mut self, binding: B) -> Self {
        self.bindings.push(binding);
        self
    }

    /// Set the policy for slots whose key wasn't found.
    pub fn on_miss(self, on_miss: OnMiss) -> Self {
        Self { on_miss, ..self }
    }

    /// Enrich every slot of every element of `items` in place.
    pub fn compose<T, K, V, E>(&self, items: &mut [T]) -> Result<(), E>
    where
        B: KeyBinding<T, T, K, V>,
        FetchFn: Fn(&KeySet<K>) -> Result<HashMap<K, V>, E>,
        K: Eq + Hash,
        V: Clone,
    {
        if items.is_empty() || self.bindings.is_empty() {
            return Ok(());
        }

        let bindings = &self.bindings;
        let keys: KeySet<K> = items
            .iter()
            .flat_map(|item| bindings.iter().filter_map(move |binding| binding.key(item)))
            .collect();

        let mut values = match keys.fetch_with("multi", &self.fetch)? {
            Some(values) => values,
            None => return Ok(()),
        };

        for item in items.iter_mut() {
            for binding in bindings {
                if let Some(key) = binding.key(item) {
                    if let Some(value) = self.on_miss.resolve(values.take(key)) {
                        binding.set(item, value);
                    }
                }
            }
        }

        Ok(())
    }

    pub fn compose_one<T, K, V, E>(&self, item: &mut T) -> Result<(), E>
    where
        B: KeyBinding<T, T, K, V>,
        FetchFn: Fn(&KeySet<K>) -> Result<HashMap<K, V>, E>,
        K: Eq + Hash,
        V: Clone,
    {
        self.compose(slice::from_mut(item))
    }

    pub fn compose_listing<T, K, V, E, L>(&self, listing: &mut L) -> Result<(), E>
    where
        B: KeyBinding<T, T, K, V>,
        FetchFn: Fn(&KeySet<K>) -> Result<HashMap<K, V>, E>,
        K: Eq + Hash,
        V: Clone,
        L: Listing<T> + ?Sized,
    {
        self.compose(listing.items_mut())
    }
}

impl<'a, FetchFn, T, K, V> MultiJoin<FetchFn, DynBinding<'a, T, K, V>> {
    /// Add a binding built from a key extractor and a setter. The closures
    /// of different bindings may all have different types.
    pub fn bind<Extract, Apply>(self, extract: Extract, apply: Apply) -> Self
    where
        Extract: Fn(&T) -> Option<K> + 'a,
        Apply: Fn(&mut T, Option<V>) + 'a,
    {
        self.push(Box::new(Binding { extract, apply }))
    }
}
