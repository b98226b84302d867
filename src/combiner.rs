//! Reusable composers: a fetch source that can be combined into any element
//! type, and a fixed enrichment step for one element type.

use std::collections::HashMap;
use std::hash::Hash;
use std::slice;

use crate::binding::KeyBinding;
use crate::data::KeySet;
use crate::join::Join;
use crate::listing::Listing;
use crate::multi::MultiJoin;

/// A reusable batch source of `Value`s by `Key`: a user repository, a remote
/// product catalog, and so on. Implementors supply only `fetch`; any element
/// type with a `Key` can then be combined with the fetched data by supplying
/// a key extractor and a setter (or several, as [`KeyBinding`]s).
///
/// Every operation takes a `Context`, which is threaded through to `fetch`
/// untouched. Use it for call-scoped state like a tenant id or a database
/// transaction. Sources that need no context set `type Context = ();` and
/// are called with `&()`:
///
/// ```
/// use std::collections::HashMap;
/// use std::convert::Infallible;
/// use batchjoin::{Combiner, KeySet};
///
/// struct Squares;
///
/// impl Combiner<u32, u32> for Squares {
///     type Context = ();
///     type Error = Infallible;
///
///     fn fetch(&self, keys: &KeySet<u32>, _: &()) -> Result<HashMap<u32, u32>, Infallible> {
///         Ok(keys.map_values(|&key| Some(key * key)))
///     }
/// }
///
/// let mut pairs = vec![(3, None), (4, None)];
///
/// Squares
///     .combine(
///         &mut pairs,
///         |pair: &(u32, Option<u32>)| Some(pair.0),
///         |pair: &mut (u32, Option<u32>), square| pair.1 = square,
///         &(),
///     )
///     .unwrap();
///
/// assert_eq!(pairs, [(3, Some(9)), (4, Some(16))]);
/// ```
///
/// With a context:
///
/// ```
/// use std::collections::HashMap;
/// use std::convert::Infallible;
/// use batchjoin::{Combiner, KeySet};
///
/// struct Users;
///
/// struct Tenant(&'static str);
///
/// impl Combiner<u32, String> for Users {
///     type Context = Tenant;
///     type Error = Infallible;
///
///     fn fetch(&self, ids: &KeySet<u32>, tenant: &Tenant) -> Result<HashMap<u32, String>, Infallible> {
///         Ok(ids.map_values(|id| Some(format!("{}/user {}", tenant.0, id))))
///     }
/// }
///
/// struct Comment { author_id: Option<u32>, author: Option<String> }
///
/// let mut comments = vec![Comment { author_id: Some(3), author: None }];
///
/// Users
///     .combine(
///         &mut comments,
///         |comment: &Comment| comment.author_id,
///         |comment: &mut Comment, author| comment.author = author,
///         &Tenant("acme"),
///     )
///     .unwrap();
///
/// assert_eq!(comments[0].author.as_deref(), Some("acme/user 3"));
/// ```
pub trait Combiner<Key, Value> {
    type Context: ?Sized;
    type Error;

    /// Fetch the values for a set of keys. Keys with no value can be left out
    /// of the result.
    fn fetch(
        &self,
        keys: &KeySet<Key>,
        ctx: &Self::Context,
    ) -> Result<HashMap<Key, Value>, Self::Error>;

    /// Combine fetched values into every element of `items`, using a single
    /// key extractor and setter.
    fn combine<T>(
        &self,
        items: &mut [T],
        key: impl Fn(&T) -> Option<Key>,
        set: impl Fn(&mut T, Option<Value>),
        ctx: &Self::Context,
    ) -> Result<(), Self::Error>
    where
        Key: Eq + Hash,
        Value: Clone,
    {
        Join::new(key, |keys: &KeySet<Key>| self.fetch(keys, ctx), set).compose(items)
    }

    fn combine_one<T>(
        &self,
        item: &mut T,
        key: impl Fn(&T) -> Option<Key>,
        set: impl Fn(&mut T, Option<Value>),
        ctx: &Self::Context,
    ) -> Result<(), Self::Error>
    where
        Key: Eq + Hash,
        Value: Clone,
    {
        self.combine(slice::from_mut(item), key, set, ctx)
    }

    fn combine_listing<T, L>(
        &self,
        listing: &mut L,
        key: impl Fn(&T) -> Option<Key>,
        set: impl Fn(&mut T, Option<Value>),
        ctx: &Self::Context,
    ) -> Result<(), Self::Error>
    where
        Key: Eq + Hash,
        Value: Clone,
        L: Listing<T> + ?Sized,
    {
        self.combine(listing.items_mut(), key, set, ctx)
    }

    /// Combine fetched values into several slots of every element of
    /// `items`, with a single fetch shared by all of them.
    fn combine_bindings<T, B>(
        &self,
        items: &mut [T],
        bindings: &[B],
        ctx: &Self::Context,
    ) -> Result<(), Self::Error>
    where
        Key: Eq + Hash,
        Value: Clone,
        B: KeyBinding<T, T, Key, Value>,
    {
        MultiJoin::with_bindings(|keys: &KeySet<Key>| self.fetch(keys, ctx), bindings)
            .compose(items)
    }

    fn combine_bindings_one<T, B>(
        &self,
        item: &mut T,
        bindings: &[B],
        ctx: &Self::Context,
    ) -> Result<(), Self::Error>
    where
        Key: Eq + Hash,
        Value: Clone,
        B: KeyBinding<T, T, Key, Value>,
    {
        self.combine_bindings(slice::from_mut(item), bindings, ctx)
    }

    fn combine_bindings_listing<T, B, L>(
        &self,
        listing: &mut L,
        bindings: &[B],
        ctx: &Self::Context,
    ) -> Result<(), Self::Error>
    where
        Key: Eq + Hash,
        Value: Clone,
        B: KeyBinding<T, T, Key, Value>,
        L: Listing<T> + ?Sized,
    {
        self.combine_bindings(listing.items_mut(), bindings, ctx)
    }
}

/// A self-contained enrichment step for one element type; for instance,
/// "attach each order's customer". Implementors supply `compose` (usually by
/// forwarding to one of the composers in this crate); single elements and
/// [`Listing`]s are handled by the provided methods.
pub trait Compose<T> {
    type Error;

    fn compose(&self, items: &mut [T]) -> Result<(), Self::Error>;

    fn compose_one(&self, item: &mut T) -> Result<(), Self::Error> {
        self.compose(slice::from_mut(item))
    }

    fn compose_listing<L>(&self, listing: &mut L) -> Result<(), Self::Error>
    where
        L: Listing<T> + ?Sized,
    {
        self.compose(listing.items_mut())
    }
}

impl<T, C: Compose<T> + ?Sized> Compose<T> for &C {
    type Error = C::Error;

    fn compose(&self, items: &mut [T]) -> Result<(), Self::Error> {
        (**self).compose(items)
    }
}
