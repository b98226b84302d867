//! To-many joins: lists of related data, either fetched directly per key or
//! resolved through a junction (link) table.

use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::hash::Hash;
use std::slice;

use tracing::trace;

use crate::data::{KeySet, OnMiss, ValueSet};
use crate::listing::Listing;

/// A one-to-many composer: `fetch` maps each key directly to the list of
/// related data for that key, and `set` receives that list. Elements whose
/// key has no entry are left unset (or, under [`OnMiss::Apply`], receive an
/// empty list).
#[derive(Clone, Copy)]
pub struct OneToMany<KeyFn, FetchFn, SetFn> {
    pub key: KeyFn,
    pub fetch: FetchFn,
    pub set: SetFn,
    pub on_miss: OnMiss,
}

impl<KeyFn, FetchFn, SetFn> Debug for OneToMany<KeyFn, FetchFn, SetFn> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("OneToMany")
            .field("key", &"<closure>")
            .field("fetch", &"<closure>")
            .field("set", &"<closure>")
            .field("on_miss", &self.on_miss)
            .finish()
    }
}

impl<KeyFn, FetchFn, SetFn> OneToMany<KeyFn, FetchFn, SetFn> {
    pub fn new<T, U, K, V, E>(key: KeyFn, fetch: FetchFn, set: SetFn) -> Self
    where
        KeyFn: Fn(&T) -> Option<K>,
        FetchFn: Fn(&KeySet<K>) -> Result<HashMap<K, Vec<V>>, E>,
        SetFn: Fn(&mut U, Vec<V>),
    {
        Self {
            key,
            fetch,
            set,
            on_miss: OnMiss::Skip,
        }
    }

    pub fn on_miss(self, on_miss: OnMiss) -> Self {
        Self { on_miss, ..self }
    }

    fn apply<U, K, V>(&self, target: &mut U, key: K, values: &mut ValueSet<K, Vec<V>>)
    where
        SetFn: Fn(&mut U, Vec<V>),
        K: Eq + Hash,
        V: Clone,
    {
        if let Some(list) = self.on_miss.resolve(values.take(key)) {
            (self.set)(target, list.unwrap_or_default());
        }
    }

    pub fn compose<T, K, V, E>(&self, items: &mut [T]) -> Result<(), E>
    where
        KeyFn: Fn(&T) -> Option<K>,
        FetchFn: Fn(&KeySet<K>) -> Result<HashMap<K, Vec<V>>, E>,
        SetFn: Fn(&mut T, Vec<V>),
        K: Eq + Hash,
        V: Clone,
    {
        if items.is_empty() {
            return Ok(());
        }

        let keys: KeySet<K> = items.iter().filter_map(|item| (self.key)(item)).collect();

        let mut values = match keys.fetch_with("one-to-many", &self.fetch)? {
            Some(values) => values,
            None => return Ok(()),
        };

        for item in items.iter_mut() {
            if let Some(key) = (self.key)(item) {
                self.apply(item, key, &mut values);
            }
        }

        Ok(())
    }

    pub fn compose_one<T, K, V, E>(&self, item: &mut T) -> Result<(), E>
    where
        KeyFn: Fn(&T) -> Option<K>,
        FetchFn: Fn(&KeySet<K>) -> Result<HashMap<K, Vec<V>>, E>,
        SetFn: Fn(&mut T, Vec<V>),
        K: Eq + Hash,
        V: Clone,
    {
        self.compose(slice::from_mut(item))
    }

    pub fn compose_listing<T, K, V, E, L>(&self, listing: &mut L) -> Result<(), E>
    where
        KeyFn: Fn(&T) -> Option<K>,
        FetchFn: Fn(&KeySet<K>) -> Result<HashMap<K, Vec<V>>, E>,
        SetFn: Fn(&mut T, Vec<V>),
        K: Eq + Hash,
        V: Clone,
        L: Listing<T> + ?Sized,
    {
        self.compose(listing.items_mut())
    }

    /// Convert every element into a view, then set each view's list.
    pub fn compose_into<T, U, K, V, E, C>(
        &self,
        items: impl IntoIterator<Item = T>,
        mut convert: C,
    ) -> Result<Vec<U>, E>
    where
        KeyFn: Fn(&T) -> Option<K>,
        FetchFn: Fn(&KeySet<K>) -> Result<HashMap<K, Vec<V>>, E>,
        SetFn: Fn(&mut U, Vec<V>),
        K: Eq + Hash,
        V: Clone,
        C: FnMut(T) -> U,
    {
        let items: Vec<T> = items.into_iter().collect();
        let keys: KeySet<K> = items.iter().filter_map(|item| (self.key)(item)).collect();
        let mut values = keys.fetch_with("one-to-many", &self.fetch)?;

        Ok(items
            .into_iter()
            .map(|item| {
                let key = (self.key)(&item);
                let mut view = convert(item);

                if let (Some(key), Some(values)) = (key, values.as_mut()) {
                    self.apply(&mut view, key, values);
                }

                view
            })
            .collect())
    }

    /// Enrich a single element using a lookup of one key's list, rather than
    /// the batch fetch. `fetch_one` returning `None` is a miss; it is not
    /// called if the element has no key.
    pub fn compose_one_with<T, K, V, E>(
        &self,
        item: &mut T,
        fetch_one: impl FnOnce(&K) -> Result<Option<Vec<V>>, E>,
    ) -> Result<(), E>
    where
        KeyFn: Fn(&T) -> Option<K>,
        SetFn: Fn(&mut T, Vec<V>),
    {
        let key = match (self.key)(item) {
            Some(key) => key,
            None => return Ok(()),
        };

        trace!(stage = "one-to-many", "dispatching single-key fetch");
        if let Some(list) = self.on_miss.resolve(fetch_one(&key)?) {
            (self.set)(item, list.unwrap_or_default());
        }

        Ok(())
    }
}

/// A many-to-many composer, resolving through a junction table in two
/// stages:
///
/// 1. `links` maps the distinct keys of the list to each key's link keys
///    (for instance, a post's id to the ids of its tags).
/// 2. The union of every link key is deduplicated and handed to `fetch`,
///    which maps link keys to related data.
///
/// Each element's list is assembled from its own link keys, in link order;
/// link keys with no fetched data are silently dropped. If the data stage
/// finds nothing at all (or there were no link keys to fetch), every element
/// is treated as a miss, per its [`OnMiss`] policy. However long the
/// list, a composition makes at most two fetch calls, and no link key is
/// ever requested twice.
///
/// ```
/// use std::collections::HashMap;
/// use std::convert::Infallible;
/// use batchjoin::{Junction, KeySet};
///
/// struct Post { id: u32, tags: Vec<&'static str> }
///
/// fn tag_ids(posts: &KeySet<u32>) -> Result<HashMap<u32, Vec<u32>>, Infallible> {
///     Ok(posts.map_values(|_| Some(vec![10, 20])))
/// }
///
/// fn tags(ids: &KeySet<u32>) -> Result<HashMap<u32, &'static str>, Infallible> {
///     Ok(ids.map_values(|&id| if id == 10 { Some("rust") } else { None }))
/// }
///
/// let junction = Junction::new(
///     |post: &Post| Some(post.id),
///     tag_ids,
///     tags,
///     |post: &mut Post, tags| post.tags = tags,
/// );
///
/// let mut posts = vec![Post { id: 1, tags: vec![] }];
/// junction.compose(&mut posts).unwrap();
/// assert_eq!(posts[0].tags, ["rust"]);
/// ```
#[derive(Clone, Copy)]
pub struct Junction<KeyFn, LinkFn, FetchFn, SetFn> {
    pub key: KeyFn,
    pub links: LinkFn,
    pub fetch: FetchFn,
    pub set: SetFn,
    pub on_miss: OnMiss,
}

impl<KeyFn, LinkFn, FetchFn, SetFn> Debug for Junction<KeyFn, LinkFn, FetchFn, SetFn> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Junction")
            .field("key", &"<closure>")
            .field("links", &"<closure>")
            .field("fetch", &"<closure>")
            .field("set", &"<closure>")
            .field("on_miss", &self.on_miss)
            .finish()
    }
}

/// The state of a junction composition once both stages have run.
struct Resolved<K, L, V> {
    links: ValueSet<K, Vec<L>>,
    data: Option<ValueSet<L, V>>,
}

impl<K, L, V> Resolved<K, L, V>
where
    K: Eq + Hash,
    L: Eq + Hash,
    V: Clone,
{
    /// Assemble the related list for a key, or `None` if the key had no
    /// link entry at all, or if the data stage found nothing for any key.
    fn assemble(&self, key: &K) -> Option<Vec<V>> {
        let data = self.data.as_ref().filter(|data| !data.is_empty())?;
        let links = self.links.get(key)?;

        Some(
            links
                .iter()
                .filter_map(|link| data.get(link).cloned())
                .collect(),
        )
    }
}

impl<KeyFn, LinkFn, FetchFn, SetFn> Junction<KeyFn, LinkFn, FetchFn, SetFn> {
    pub fn new<T, U, K, L, V, E>(key: KeyFn, links: LinkFn, fetch: FetchFn, set: SetFn) -> Self
    where
        KeyFn: Fn(&T) -> Option<K>,
        LinkFn: Fn(&KeySet<K>) -> Result<HashMap<K, Vec<L>>, E>,
        FetchFn: Fn(&KeySet<L>) -> Result<HashMap<L, V>, E>,
        SetFn: Fn(&mut U, Vec<V>),
    {
        Self {
            key,
            links,
            fetch,
            set,
            on_miss: OnMiss::Skip,
        }
    }

    pub fn on_miss(self, on_miss: OnMiss) -> Self {
        Self { on_miss, ..self }
    }

    /// Run both fetch stages for the keys of `items`. Returns `None` if no
    /// element had a key.
    fn resolve<'i, T, K, L, V, E>(
        &self,
        items: impl Iterator<Item = &'i T>,
    ) -> Result<Option<Resolved<K, L, V>>, E>
    where
        T: 'i,
        KeyFn: Fn(&T) -> Option<K>,
        LinkFn: Fn(&KeySet<K>) -> Result<HashMap<K, Vec<L>>, E>,
        FetchFn: Fn(&KeySet<L>) -> Result<HashMap<L, V>, E>,
        K: Eq + Hash,
        L: Eq + Hash + Clone,
    {
        let keys: KeySet<K> = items.filter_map(|item| (self.key)(item)).collect();

        let links = match keys.fetch_with("junction links", &self.links)? {
            Some(links) => links,
            None => return Ok(None),
        };

        let link_keys: KeySet<L> = links.values().flatten().cloned().collect();
        let data = link_keys.fetch_with("junction data", &self.fetch)?;

        Ok(Some(Resolved { links, data }))
    }

    fn apply<U, K, L, V>(&self, target: &mut U, key: &K, resolved: &Resolved<K, L, V>)
    where
        SetFn: Fn(&mut U, Vec<V>),
        K: Eq + Hash,
        L: Eq + Hash,
        V: Clone,
    {
        if let Some(list) = self.on_miss.resolve(resolved.assemble(key)) {
            (self.set)(target, list.unwrap_or_default());
        }
    }

    pub fn compose<T, K, L, V, E>(&self, items: &mut [T]) -> Result<(), E>
    where
        KeyFn: Fn(&T) -> Option<K>,
        LinkFn: Fn(&KeySet<K>) -> Result<HashMap<K, Vec<L>>, E>,
        FetchFn: Fn(&KeySet<L>) -> Result<HashMap<L, V>, E>,
        SetFn: Fn(&mut T, Vec<V>),
        K: Eq + Hash,
        L: Eq + Hash + Clone,
        V: Clone,
    {
        if items.is_empty() {
            return Ok(());
        }

        let resolved = match self.resolve(items.iter())? {
            Some(resolved) => resolved,
            None => return Ok(()),
        };

        for item in items.iter_mut() {
            if let Some(key) = (self.key)(item) {
                self.apply(item, &key, &resolved);
            }
        }

        Ok(())
    }

    pub fn compose_one<T, K, L, V, E>(&self, item: &mut T) -> Result<(), E>
    where
        KeyFn: Fn(&T) -> Option<K>,
        LinkFn: Fn(&KeySet<K>) -> Result<HashMap<K, Vec<L>>, E>,
        FetchFn: Fn(&KeySet<L>) -> Result<HashMap<L, V>, E>,
        SetFn: Fn(&mut T, Vec<V>),
        K: Eq + Hash,
        L: Eq + Hash + Clone,
        V: Clone,
    {
        self.compose(slice::from_mut(item))
    }

    pub fn compose_listing<T, K, L, V, E, Li>(&self, listing: &mut Li) -> Result<(), E>
    where
        KeyFn: Fn(&T) -> Option<K>,
        LinkFn: Fn(&KeySet<K>) -> Result<HashMap<K, Vec<L>>, E>,
        FetchFn: Fn(&KeySet<L>) -> Result<HashMap<L, V>, E>,
        SetFn: Fn(&mut T, Vec<V>),
        K: Eq + Hash,
        L: Eq + Hash + Clone,
        V: Clone,
        Li: Listing<T> + ?Sized,
    {
        self.compose(listing.items_mut())
    }

    /// Convert every element into a view, then set each view's list.
    pub fn compose_into<T, U, K, L, V, E, C>(
        &self,
        items: impl IntoIterator<Item = T>,
        mut convert: C,
    ) -> Result<Vec<U>, E>
    where
        KeyFn: Fn(&T) -> Option<K>,
        LinkFn: Fn(&KeySet<K>) -> Result<HashMap<K, Vec<L>>, E>,
        FetchFn: Fn(&KeySet<L>) -> Result<HashMap<L, V>, E>,
        SetFn: Fn(&mut U, Vec<V>),
        K: Eq + Hash,
        L: Eq + Hash + Clone,
        V: Clone,
        C: FnMut(T) -> U,
    {
        let items: Vec<T> = items.into_iter().collect();
        let resolved = self.resolve(items.iter())?;

        Ok(items
            .into_iter()
            .map(|item| {
                let key = (self.key)(&item);
                let mut view = convert(item);

                if let (Some(key), Some(resolved)) = (key, resolved.as_ref()) {
                    self.apply(&mut view, &key, resolved);
                }

                view
            })
            .collect())
    }
}
