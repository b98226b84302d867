//! Joining against related data that's already in memory.

use std::fmt::{self, Debug, Formatter};
use std::slice;

use crate::data::OnMiss;
use crate::listing::Listing;

/// An in-memory join composer. Where the other composers fetch related data
/// by key, a `MemoryJoin` matches each element against a list of related data
/// the caller already has, comparing the element's key with each related
/// value's key. The first match wins.
///
/// This is a linear scan per element (O(n·m)); there's nothing to fetch, so
/// there's nothing to deduplicate. Because nothing is fetched, an in-memory
/// join cannot fail.
///
/// An empty related list is a no-op: no setter is called, even under
/// [`OnMiss::Apply`].
#[derive(Clone, Copy)]
pub struct MemoryJoin<KeyFn, RelatedKeyFn, SetFn> {
    pub key: KeyFn,
    pub related_key: RelatedKeyFn,
    pub set: SetFn,
    pub on_miss: OnMiss,
}

impl<KeyFn, RelatedKeyFn, SetFn> Debug for MemoryJoin<KeyFn, RelatedKeyFn, SetFn> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryJoin")
            .field("key", &"<closure>")
            .field("related_key", &"<closure>")
            .field("set", &"<closure>")
            .field("on_miss", &self.on_miss)
            .finish()
    }
}

impl<KeyFn, RelatedKeyFn, SetFn> MemoryJoin<KeyFn, RelatedKeyFn, SetFn> {
    pub fn new<T, U, R, K>(key: KeyFn, related_key: RelatedKeyFn, set: SetFn) -> Self
    where
        KeyFn: Fn(&T) -> Option<K>,
        RelatedKeyFn: Fn(&R) -> Option<K>,
        SetFn: Fn(&mut U, Option<&R>),
    {
        Self {
            key,
            related_key,
            set,
            on_miss: OnMiss::Skip,
        }
    }

    pub fn on_miss(self, on_miss: OnMiss) -> Self {
        Self { on_miss, ..self }
    }

    /// Find the first related value whose key equals `key`.
    fn find<'r, R, K>(&self, key: &K, related: &'r [R]) -> Option<&'r R>
    where
        RelatedKeyFn: Fn(&R) -> Option<K>,
        K: PartialEq,
    {
        related
            .iter()
            .find(|&candidate| (self.related_key)(candidate).map_or(false, |other| &other == key))
    }

    fn apply<U, R, K>(&self, key: Option<K>, target: &mut U, related: &[R])
    where
        RelatedKeyFn: Fn(&R) -> Option<K>,
        SetFn: Fn(&mut U, Option<&R>),
        K: PartialEq,
    {
        let key = match key {
            Some(key) => key,
            None => return,
        };

        if let Some(value) = self.on_miss.resolve(self.find(&key, related)) {
            (self.set)(target, value);
        }
    }

    pub fn compose<T, R, K>(&self, items: &mut [T], related: &[R])
    where
        KeyFn: Fn(&T) -> Option<K>,
        RelatedKeyFn: Fn(&R) -> Option<K>,
        SetFn: Fn(&mut T, Option<&R>),
        K: PartialEq,
    {
        if items.is_empty() || related.is_empty() {
            return;
        }

        for item in items.iter_mut() {
            let key = (self.key)(item);
            self.apply(key, item, related);
        }
    }

    pub fn compose_one<T, R, K>(&self, item: &mut T, related: &[R])
    where
        KeyFn: Fn(&T) -> Option<K>,
        RelatedKeyFn: Fn(&R) -> Option<K>,
        SetFn: Fn(&mut T, Option<&R>),
        K: PartialEq,
    {
        self.compose(slice::from_mut(item), related)
    }

    pub fn compose_listing<T, R, K, L>(&self, listing: &mut L, related: &[R])
    where
        KeyFn: Fn(&T) -> Option<K>,
        RelatedKeyFn: Fn(&R) -> Option<K>,
        SetFn: Fn(&mut T, Option<&R>),
        K: PartialEq,
        L: Listing<T> + ?Sized,
    {
        self.compose(listing.items_mut(), related)
    }

    /// Convert every element into a view, then match each view against
    /// `related`. Every element is converted, even if `related` is empty.
    pub fn compose_into<T, U, R, K, C>(
        &self,
        items: impl IntoIterator<Item = T>,
        related: &[R],
        mut convert: C,
    ) -> Vec<U>
    where
        KeyFn: Fn(&T) -> Option<K>,
        RelatedKeyFn: Fn(&R) -> Option<K>,
        SetFn: Fn(&mut U, Option<&R>),
        K: PartialEq,
        C: FnMut(T) -> U,
    {
        items
            .into_iter()
            .map(|item| {
                if related.is_empty() {
                    return convert(item);
                }

                let key = (self.key)(&item);
                let mut view = convert(item);
                self.apply(key, &mut view, related);
                view
            })
            .collect()
    }
}
