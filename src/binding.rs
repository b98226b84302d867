//! Key/setter bindings: one attribute slot of an element, described by how to
//! get its key and how to set the data found for that key.

use std::fmt::{self, Debug, Formatter};

/// One attribute slot that can be resolved by a batch fetch. `T` is the type
/// keys are extracted from, `U` is the type the setter writes into (the same
/// as `T` unless the element is converted), `K` is the key type and `V` the
/// related data type.
///
/// This is mostly used through [`Binding`], but it's a trait so that
/// bindings built from different closures can be mixed in the same
/// [`MultiJoin`](crate::MultiJoin) by boxing them (see [`DynBinding`]).
pub trait KeyBinding<T: ?Sized, U: ?Sized, K, V> {
    /// Get the key for this slot, if the element has one.
    fn key(&self, item: &T) -> Option<K>;

    /// Store the data found for this slot's key.
    fn set(&self, target: &mut U, value: Option<V>);
}

/// A boxed binding, for when several bindings with different closure types
/// need to share a collection.
pub type DynBinding<'a, T, K, V> = Box<dyn KeyBinding<T, T, K, V> + 'a>;

/// An immutable pair of key extractor and data setter.
///
/// A binding holds no state of its own, so it can be shared across calls (and
/// threads) whenever its functions can.
#[derive(Clone, Copy)]
pub struct Binding<Extract, Apply> {
    pub extract: Extract,
    pub apply: Apply,
}

impl<Extract, Apply> Binding<Extract, Apply> {
    pub fn new<T, U, K, V>(extract: Extract, apply: Apply) -> Self
    where
        T: ?Sized,
        U: ?Sized,
        Extract: Fn(&T) -> Option<K>,
        Apply: Fn(&mut U, Option<V>),
    {
        Self { extract, apply }
    }

    /// Box this binding, so that it can be stored alongside bindings built
    /// from other closures.
    pub fn boxed<'a, T, K, V>(self) -> DynBinding<'a, T, K, V>
    where
        Self: KeyBinding<T, T, K, V> + 'a,
    {
        Box::new(self)
    }
}

impl<Extract, Apply> Debug for Binding<Extract, Apply> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("extract", &"<closure>")
            .field("apply", &"<closure>")
            .finish()
    }
}

impl<T, U, K, V, Extract, Apply> KeyBinding<T, U, K, V> for Binding<Extract, Apply>
where
    T: ?Sized,
    U: ?Sized,
    Extract: Fn(&T) -> Option<K>,
    Apply: Fn(&mut U, Option<V>),
{
    #[inline]
    fn key(&self, item: &T) -> Option<K> {
        (self.extract)(item)
    }

    #[inline]
    fn set(&self, target: &mut U, value: Option<V>) {
        (self.apply)(target, value)
    }
}

impl<T, U, K, V, B> KeyBinding<T, U, K, V> for &B
where
    T: ?Sized,
    U: ?Sized,
    B: KeyBinding<T, U, K, V> + ?Sized,
{
    #[inline]
    fn key(&self, item: &T) -> Option<K> {
        (**self).key(item)
    }

    #[inline]
    fn set(&self, target: &mut U, value: Option<V>) {
        (**self).set(target, value)
    }
}

impl<T, U, K, V, B> KeyBinding<T, U, K, V> for Box<B>
where
    T: ?Sized,
    U: ?Sized,
    B: KeyBinding<T, U, K, V> + ?Sized,
{
    #[inline]
    fn key(&self, item: &T) -> Option<K> {
        (**self).key(item)
    }

    #[inline]
    fn set(&self, target: &mut U, value: Option<V>) {
        (**self).set(target, value)
    }
}
