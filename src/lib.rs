//! Batchjoin is a library for enriching collections of objects with related
//! data that lives somewhere else (a database, a remote service) without
//! fetching it one element at a time. It's the synchronous, collection-shaped
//! sibling of the [dataloader pattern](https://github.com/graphql/dataloader):
//! rather than collecting individual requests over a time window, you already
//! have the whole list, and batchjoin turns "for each order, look up its
//! customer" into a single lookup of every distinct customer.
//!
//! ## Overview
//!
//! As a simple example, suppose you've loaded a page of orders, and each
//! order has a `user_id`. To display them, you also need each order's user.
//! Your storage layer can load many users by id in one query:
//!
//! ```
//! # use std::collections::HashMap;
//! #[derive(Debug, Clone)]
//! struct User {
//!     id: u64,
//!     name: String,
//! }
//!
//! #[derive(Debug, Clone)]
//! struct DbError {}
//!
//! fn load_users(ids: impl Iterator<Item = u64>) -> Result<Vec<User>, DbError> {
//!     Ok(ids.map(|id| User { id, name: format!("user {}", id) }).collect())
//! }
//! ```
//!
//! Looping over the orders and calling `load_users` for each one is the
//! classic N+1 problem. With batchjoin, you describe the join once: how to get
//! the key out of an element, how to fetch a batch of keys, and how to store
//! what was found.
//!
//! A batchjoin fetch function takes a [`KeySet<K>`], which contains every
//! distinct key extracted from the list (never a duplicate, never an element
//! without a key), and returns a `Result<HashMap<K, V>, E>`. Keys with no
//! data are simply left out of the map. [`KeySet`] has a few helpers for
//! building that map from the rows your query returns; here we use
//! [`KeySet::values_from_iter`] and the [`KeyedEntry`] trait.
//!
//! ```
//! # use std::collections::HashMap;
//! use batchjoin::{IntoValuesError, KeySet, KeyedEntry, OnDuplicate};
//! # #[derive(Debug, Clone)] struct User { id: u64, name: String }
//! # #[derive(Debug, Clone)] struct DbError {}
//! # fn load_users(ids: impl Iterator<Item = u64>) -> Result<Vec<User>, DbError> { Ok(vec![]) }
//!
//! impl KeyedEntry<u64> for User {
//!     fn get_key(&self) -> &u64 {
//!         &self.id
//!     }
//! }
//!
//! #[derive(Debug)]
//! enum Error {
//!     Db(DbError),
//!     Rows(IntoValuesError<u64>),
//! }
//!
//! fn users_by_id(ids: &KeySet<u64>) -> Result<HashMap<u64, User>, Error> {
//!     let users = load_users(ids.keys().copied()).map_err(Error::Db)?;
//!
//!     // This returns an error if `users` contains a user we didn't ask
//!     // for, or (with OnDuplicate::Error) the same user twice.
//!     ids.values_from_iter(OnDuplicate::Error, users)
//!         .map_err(Error::Rows)
//! }
//! ```
//!
//! Then create a [`Join`] from a key extractor, the fetch function, and a
//! setter, and use it to compose any number of lists. The fetch function is
//! called exactly once per composition, however long the list and however
//! many elements share a key.
//!
//! ```
//! # use std::collections::HashMap;
//! # use std::convert::Infallible;
//! use batchjoin::{Join, KeySet};
//! # #[derive(Debug, Clone)] struct User { id: u64, name: String }
//! # fn users_by_id(ids: &KeySet<u64>) -> Result<HashMap<u64, User>, Infallible> {
//! #     Ok(ids.map_values(|&id| Some(User { id, name: format!("user {}", id) })))
//! # }
//!
//! struct Order {
//!     user_id: Option<u64>,
//!     user: Option<User>,
//! }
//!
//! let join = Join::new(
//!     |order: &Order| order.user_id,
//!     users_by_id,
//!     |order: &mut Order, user| order.user = user,
//! );
//!
//! let mut orders = vec![
//!     Order { user_id: Some(1), user: None },
//!     Order { user_id: Some(2), user: None },
//!     Order { user_id: Some(1), user: None },
//! ];
//!
//! join.compose(&mut orders).unwrap();
//!
//! let names: Vec<_> = orders
//!     .iter()
//!     .map(|order| order.user.as_ref().map(|user| user.name.as_str()))
//!     .collect();
//!
//! assert_eq!(names, [Some("user 1"), Some("user 2"), Some("user 1")]);
//! ```
//!
//! ## Composers
//!
//! Every composer follows the same steps: extract keys from every element,
//! deduplicate them, fetch once (skipping the fetch entirely if there are no
//! keys), then apply the results to each element in order.
//!
//! - [`Join`]: one key per element, one value per key.
//! - [`MultiJoin`]: several slots per element that hold the same kind of
//!   data (a `creator` and an `updater`, both users), resolved with one
//!   shared fetch. Each slot is described by a [`Binding`].
//! - [`OneToMany`]: one key per element, a list of values per key.
//! - [`Junction`]: many-to-many through a junction table. The first fetch maps
//!   keys to link keys, the second maps the union of every link key to
//!   values. Two fetches, total.
//! - [`NestedJoin`]: elements that embed a list of children, each of which
//!   needs a value. One fetch across every child of every element.
//! - [`MemoryJoin`]: an equality join against a list that's already in
//!   memory. No fetch at all.
//!
//! Every composer has `compose` (a slice, enriched in place), `compose_one`
//! (a single element) and `compose_listing` (any [`Listing`], such as a page
//! of results). Most also have `compose_into`, which converts each element
//! into a view type before enriching it.
//!
//! For a fetch source you'd like to reuse across many element types, with
//! explicitly threaded context, implement [`Combiner`]. For a fixed enrichment
//! step on one element type, implement [`Compose`].
//!
//! ## Design notes
//!
//! ### Missing data
//!
//! A key that doesn't appear in the fetched map is not an error. By default,
//! the element is left untouched; set [`OnMiss::Apply`] on the composer to
//! call the setter with `None` (or an empty list) instead. Elements without a
//! key are never passed to the setter, under either policy.
//!
//! ### Errors
//!
//! Errors returned by a fetch function are propagated unchanged; the
//! composition stops immediately and no element is modified. There are no
//! retries.
//!
//! ### Cloning
//!
//! Fetched values are moved into the last element requesting them and cloned
//! only for earlier elements sharing the same key. In the common case of no
//! duplicate keys, no clones will occur.
//!
//! ### Sharing
//!
//! Composers hold nothing but their functions, and every operation takes
//! `&self`. A composer can be reused for as many compositions as you like,
//! and shared between threads whenever its functions can be. Nothing is cached
//! between compositions.

mod binding;
mod combiner;
mod data;
mod join;
mod listing;
mod many;
mod memory;
mod multi;
mod nested;

pub use binding::{Binding, DynBinding, KeyBinding};
pub use combiner::{Combiner, Compose};
pub use data::{IntoValuesError, KeySet, KeyedEntry, OnDuplicate, OnMiss};
pub use join::Join;
pub use listing::Listing;
pub use many::{Junction, OneToMany};
pub use memory::MemoryJoin;
pub use multi::MultiJoin;
pub use nested::NestedJoin;
