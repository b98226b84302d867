//! Normalizing containers into the slices the composers work on.

use std::collections::VecDeque;
use std::slice;

/// A value that wraps a list of elements: a page of query results, a
/// response envelope, and so on. Every composer has a `compose_listing`
/// method accepting any `Listing`, which simply forwards the wrapped slice to
/// `compose`.
///
/// ```
/// use batchjoin::Listing;
///
/// struct Page<T> {
///     items: Vec<T>,
///     total: usize,
/// }
///
/// impl<T> Listing<T> for Page<T> {
///     fn items_mut(&mut self) -> &mut [T] {
///         &mut self.items
///     }
/// }
/// ```
pub trait Listing<T> {
    fn items_mut(&mut self) -> &mut [T];
}

impl<T> Listing<T> for [T] {
    #[inline]
    fn items_mut(&mut self) -> &mut [T] {
        self
    }
}

impl<T, const N: usize> Listing<T> for [T; N] {
    #[inline]
    fn items_mut(&mut self) -> &mut [T] {
        self
    }
}

impl<T> Listing<T> for Vec<T> {
    #[inline]
    fn items_mut(&mut self) -> &mut [T] {
        self
    }
}

impl<T> Listing<T> for VecDeque<T> {
    #[inline]
    fn items_mut(&mut self) -> &mut [T] {
        self.make_contiguous()
    }
}

/// An optional element is a list of zero or one elements.
impl<T> Listing<T> for Option<T> {
    #[inline]
    fn items_mut(&mut self) -> &mut [T] {
        match self {
            Some(item) => slice::from_mut(item),
            None => &mut [],
        }
    }
}
