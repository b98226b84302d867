//! Joining the child collections embedded in each parent element.

use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::hash::Hash;
use std::slice;

use crate::data::{KeySet, OnMiss};
use crate::listing::Listing;

/// A nested sub-list composer. Each parent element embeds a list of children
/// (for instance, an order and its line items); each child has a key (the
/// line item's product id) and needs related data (the product). The keys
/// of every child of every parent are fetched together, once.
///
/// `children` is called twice per parent: once to collect keys and once to
/// apply data. Parents whose child list is absent or empty are skipped.
///
/// ```
/// use std::collections::HashMap;
/// use std::convert::Infallible;
/// use batchjoin::{KeySet, NestedJoin};
///
/// struct Item { product_id: Option<u32>, product: Option<String> }
/// struct Order { items: Vec<Item> }
///
/// fn products(ids: &KeySet<u32>) -> Result<HashMap<u32, String>, Infallible> {
///     Ok(ids.map_values(|id| Some(format!("product {}", id))))
/// }
///
/// let join = NestedJoin::new(
///     |order: &mut Order| Some(order.items.as_mut_slice()),
///     |item: &Item| item.product_id,
///     products,
///     |item: &mut Item, product| item.product = product,
/// );
///
/// let mut orders = vec![
///     Order { items: vec![Item { product_id: Some(7), product: None }] },
///     Order { items: vec![] },
/// ];
///
/// join.compose(&mut orders).unwrap();
/// assert_eq!(orders[0].items[0].product.as_deref(), Some("product 7"));
/// ```
#[derive(Clone, Copy)]
pub struct NestedJoin<ChildrenFn, KeyFn, FetchFn, SetFn> {
    pub children: ChildrenFn,
    pub key: KeyFn,
    pub fetch: FetchFn,
    pub set: SetFn,
    pub on_miss: OnMiss,
}

impl<ChildrenFn, KeyFn, FetchFn, SetFn> Debug for NestedJoin<ChildrenFn, KeyFn, FetchFn, SetFn> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("NestedJoin")
            .field("children", &"<closure>")
            .field("key", &"<closure>")
            .field("fetch", &"<closure>")
            .field("set", &"<closure>")
            .field("on_miss", &self.on_miss)
            .finish()
    }
}

impl<ChildrenFn, KeyFn, FetchFn, SetFn> NestedJoin<ChildrenFn, KeyFn, FetchFn, SetFn> {
    pub fn new<P, C, K, V, E>(
        children: ChildrenFn,
        key: KeyFn,
        fetch: FetchFn,
        set: SetFn,
    ) -> Self
    where
        ChildrenFn: Fn(&mut P) -> Option<&mut [C]>,
        KeyFn: Fn(&C) -> Option<K>,
        FetchFn: Fn(&KeySet<K>) -> Result<HashMap<K, V>, E>,
        SetFn: Fn(&mut C, Option<V>),
    {
        Self {
            children,
            key,
            fetch,
            set,
            on_miss: OnMiss::Skip,
        }
    }

    pub fn on_miss(self, on_miss: OnMiss) -> Self {
        Self { on_miss, ..self }
    }

    /// Enrich every child of every parent in `items`, in place.
    pub fn compose<P, C, K, V, E>(&self, items: &mut [P]) -> Result<(), E>
    where
        ChildrenFn: Fn(&mut P) -> Option<&mut [C]>,
        KeyFn: Fn(&C) -> Option<K>,
        FetchFn: Fn(&KeySet<K>) -> Result<HashMap<K, V>, E>,
        SetFn: Fn(&mut C, Option<V>),
        K: Eq + Hash,
        V: Clone,
    {
        if items.is_empty() {
            return Ok(());
        }

        let mut keys = KeySet::new();
        for parent in items.iter_mut() {
            if let Some(children) = (self.children)(parent) {
                keys.extend(children.iter().filter_map(|child| (self.key)(child)));
            }
        }

        let mut values = match keys.fetch_with("nested", &self.fetch)? {
            Some(values) => values,
            None => return Ok(()),
        };

        for parent in items.iter_mut() {
            let children = match (self.children)(parent) {
                Some(children) => children,
                None => continue,
            };

            for child in children.iter_mut() {
                if let Some(key) = (self.key)(child) {
                    if let Some(value) = self.on_miss.resolve(values.take(key)) {
                        (self.set)(child, value);
                    }
                }
            }
        }

        Ok(())
    }

    pub fn compose_one<P, C, K, V, E>(&self, item: &mut P) -> Result<(), E>
    where
        ChildrenFn: Fn(&mut P) -> Option<&mut [C]>,
        KeyFn: Fn(&C) -> Option<K>,
        FetchFn: Fn(&KeySet<K>) -> Result<HashMap<K, V>, E>,
        SetFn: Fn(&mut C, Option<V>),
        K: Eq + Hash,
        V: Clone,
    {
        self.compose(slice::from_mut(item))
    }

    pub fn compose_listing<P, C, K, V, E, L>(&self, listing: &mut L) -> Result<(), E>
    where
        ChildrenFn: Fn(&mut P) -> Option<&mut [C]>,
        KeyFn: Fn(&C) -> Option<K>,
        FetchFn: Fn(&KeySet<K>) -> Result<HashMap<K, V>, E>,
        SetFn: Fn(&mut C, Option<V>),
        K: Eq + Hash,
        V: Clone,
        L: Listing<P> + ?Sized,
    {
        self.compose(listing.items_mut())
    }
}
