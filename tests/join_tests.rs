//! These tests ensure that the single-key composer fetches exactly once per
//! composition and applies the results to the right elements.

use batchjoin::{Join, KeySet, Listing, OnMiss};
use std::{cell::RefCell, collections::HashMap, collections::VecDeque, convert::Infallible};

#[derive(Debug, Clone, PartialEq)]
struct Order {
    id: u32,
    user_id: Option<u32>,
    user: Option<&'static str>,
}

impl Order {
    fn new(id: u32, user_id: Option<u32>) -> Self {
        Order {
            id,
            user_id,
            user: None,
        }
    }
}

#[derive(Debug, PartialEq)]
struct OrderView {
    id: u32,
    user: Option<&'static str>,
}

/// A fetch function backed by a fixed table. Keys not in the table are left
/// out of the result.
fn table(
    entries: &'static [(u32, &'static str)],
) -> impl Fn(&KeySet<u32>) -> Result<HashMap<u32, &'static str>, Infallible> {
    move |keys: &KeySet<u32>| {
        Ok(keys.map_values(|key| {
            entries
                .iter()
                .find(|(id, _)| id == key)
                .map(|&(_, name)| name)
        }))
    }
}

/// Wrap a fetch function so that the (sorted) keys of every call are
/// recorded.
fn recorded<'a, V: 'a, E: 'a>(
    calls: &'a RefCell<Vec<Vec<u32>>>,
    fetch: impl Fn(&KeySet<u32>) -> Result<HashMap<u32, V>, E> + 'a,
) -> impl Fn(&KeySet<u32>) -> Result<HashMap<u32, V>, E> + 'a {
    move |keys: &KeySet<u32>| {
        let mut requested: Vec<u32> = keys.keys().copied().collect();
        requested.sort_unstable();
        calls.borrow_mut().push(requested);
        fetch(keys)
    }
}

const USERS: &[(u32, &str)] = &[(1, "A"), (2, "B")];

#[test]
fn test_duplicate_keys_fetch_once() {
    let calls = RefCell::new(Vec::new());
    let sets = RefCell::new(Vec::new());

    let join = Join::new(
        |order: &Order| order.user_id,
        recorded(&calls, table(USERS)),
        |order: &mut Order, user| {
            sets.borrow_mut().push((order.id, user));
            order.user = user;
        },
    );

    let mut orders = vec![
        Order::new(10, Some(1)),
        Order::new(11, Some(1)),
        Order::new(12, Some(2)),
    ];

    join.compose(&mut orders).unwrap();

    assert_eq!(*calls.borrow(), [vec![1, 2]]);
    assert_eq!(
        *sets.borrow(),
        [(10, Some("A")), (11, Some("A")), (12, Some("B"))]
    );
    assert_eq!(orders[0].user, Some("A"));
    assert_eq!(orders[1].user, Some("A"));
    assert_eq!(orders[2].user, Some("B"));
}

#[test]
fn test_missing_data_is_skipped() {
    let calls = RefCell::new(Vec::new());
    let sets = RefCell::new(Vec::new());

    let join = Join::new(
        |order: &Order| order.user_id,
        recorded(&calls, table(&[])),
        |order: &mut Order, user| sets.borrow_mut().push((order.id, user)),
    );

    let mut orders = vec![Order::new(10, Some(1))];
    join.compose(&mut orders).unwrap();

    assert_eq!(*calls.borrow(), [vec![1]]);
    assert!(sets.borrow().is_empty());
}

#[test]
fn test_missing_data_is_applied() {
    let calls = RefCell::new(Vec::new());
    let sets = RefCell::new(Vec::new());

    let join = Join::new(
        |order: &Order| order.user_id,
        recorded(&calls, table(&[])),
        |order: &mut Order, user| sets.borrow_mut().push((order.id, user)),
    )
    .on_miss(OnMiss::Apply);

    let mut orders = vec![Order::new(10, Some(1))];
    join.compose(&mut orders).unwrap();

    assert_eq!(*calls.borrow(), [vec![1]]);
    assert_eq!(*sets.borrow(), [(10, None)]);
}

/// Elements without a key are never passed to the setter, even when misses
/// are applied.
#[test]
fn test_null_keys_are_never_set() {
    let calls = RefCell::new(Vec::new());
    let sets = RefCell::new(Vec::new());

    let join = Join::new(
        |order: &Order| order.user_id,
        recorded(&calls, table(USERS)),
        |order: &mut Order, user| sets.borrow_mut().push((order.id, user)),
    )
    .on_miss(OnMiss::Apply);

    let mut orders = vec![
        Order::new(10, None),
        Order::new(11, Some(2)),
        Order::new(12, Some(3)),
        Order::new(13, None),
    ];

    join.compose(&mut orders).unwrap();

    assert_eq!(*calls.borrow(), [vec![2, 3]]);
    assert_eq!(*sets.borrow(), [(11, Some("B")), (12, None)]);
}

#[test]
fn test_no_keys_skips_fetch() {
    let calls = RefCell::new(Vec::new());
    let sets = RefCell::new(Vec::new());

    let join = Join::new(
        |order: &Order| order.user_id,
        recorded(&calls, table(USERS)),
        |order: &mut Order, user| sets.borrow_mut().push((order.id, user)),
    )
    .on_miss(OnMiss::Apply);

    let mut orders = vec![Order::new(10, None), Order::new(11, None)];
    join.compose(&mut orders).unwrap();

    let mut empty: Vec<Order> = Vec::new();
    join.compose(&mut empty).unwrap();

    assert!(calls.borrow().is_empty());
    assert!(sets.borrow().is_empty());
}

/// A failing fetch aborts the composition before any element is touched.
#[test]
fn test_fetch_error_propagates() {
    let sets = RefCell::new(Vec::new());

    let join = Join::new(
        |order: &Order| order.user_id,
        |_keys: &KeySet<u32>| -> Result<HashMap<u32, &'static str>, String> {
            Err(String::from("connection reset"))
        },
        |order: &mut Order, user| sets.borrow_mut().push((order.id, user)),
    )
    .on_miss(OnMiss::Apply);

    let mut orders = vec![Order::new(10, Some(1)), Order::new(11, Some(2))];
    let original = orders.clone();

    assert_eq!(join.compose(&mut orders), Err(String::from("connection reset")));
    assert!(sets.borrow().is_empty());
    assert_eq!(orders, original);
}

/// Entries for keys that weren't requested are ignored.
#[test]
fn test_unrequested_results_are_ignored() {
    let sets = RefCell::new(Vec::new());

    let join = Join::new(
        |order: &Order| order.user_id,
        |_keys: &KeySet<u32>| -> Result<_, Infallible> {
            Ok(vec![(1, "A"), (7, "G")].into_iter().collect())
        },
        |order: &mut Order, user| sets.borrow_mut().push((order.id, user)),
    );

    let mut orders = vec![Order::new(10, Some(1))];
    join.compose(&mut orders).unwrap();

    assert_eq!(*sets.borrow(), [(10, Some("A"))]);
}

#[test]
fn test_compose_into_preserves_order() {
    let calls = RefCell::new(Vec::new());
    let converted = RefCell::new(Vec::new());

    let join = Join::new(
        |order: &Order| order.user_id,
        recorded(&calls, table(USERS)),
        |view: &mut OrderView, user| view.user = user,
    );

    let orders = vec![
        Order::new(10, Some(2)),
        Order::new(11, None),
        Order::new(12, Some(9)),
        Order::new(13, Some(1)),
        Order::new(14, Some(2)),
    ];

    let views = join
        .compose_into(orders, |order| {
            converted.borrow_mut().push(order.id);
            OrderView {
                id: order.id,
                user: None,
            }
        })
        .unwrap();

    assert_eq!(*calls.borrow(), [vec![1, 2, 9]]);
    assert_eq!(*converted.borrow(), [10, 11, 12, 13, 14]);
    assert_eq!(
        views,
        [
            OrderView { id: 10, user: Some("B") },
            OrderView { id: 11, user: None },
            OrderView { id: 12, user: None },
            OrderView { id: 13, user: Some("A") },
            OrderView { id: 14, user: Some("B") },
        ]
    );
}

/// Even with nothing to fetch, every element is converted.
#[test]
fn test_compose_into_without_keys() {
    let calls = RefCell::new(Vec::new());

    let join = Join::new(
        |order: &Order| order.user_id,
        recorded(&calls, table(USERS)),
        |view: &mut OrderView, user| view.user = user,
    );

    let views = join
        .compose_into(vec![Order::new(10, None), Order::new(11, None)], |order| {
            OrderView {
                id: order.id,
                user: Some("unchanged"),
            }
        })
        .unwrap();

    assert!(calls.borrow().is_empty());
    assert_eq!(views.len(), 2);
    assert!(views.iter().all(|view| view.user == Some("unchanged")));

    let none = join
        .compose_into(Vec::<Order>::new(), |order| OrderView {
            id: order.id,
            user: None,
        })
        .unwrap();

    assert!(none.is_empty());
    assert!(calls.borrow().is_empty());
}

struct Page<T> {
    items: Vec<T>,
}

impl<T> Listing<T> for Page<T> {
    fn items_mut(&mut self) -> &mut [T] {
        &mut self.items
    }
}

#[test]
fn test_single_and_container_conveniences() {
    let calls = RefCell::new(Vec::new());

    let join = Join::new(
        |order: &Order| order.user_id,
        recorded(&calls, table(USERS)),
        |order: &mut Order, user| order.user = user,
    );

    let mut order = Order::new(10, Some(1));
    join.compose_one(&mut order).unwrap();
    assert_eq!(order.user, Some("A"));

    let mut page = Page {
        items: vec![Order::new(11, Some(2)), Order::new(12, Some(2))],
    };
    join.compose_listing(&mut page).unwrap();
    assert_eq!(page.items[0].user, Some("B"));
    assert_eq!(page.items[1].user, Some("B"));

    let mut deque: VecDeque<Order> = VecDeque::new();
    deque.push_back(Order::new(13, Some(1)));
    deque.push_front(Order::new(14, Some(2)));
    join.compose_listing(&mut deque).unwrap();
    assert_eq!(deque[0].user, Some("B"));
    assert_eq!(deque[1].user, Some("A"));

    let mut absent: Option<Order> = None;
    join.compose_listing(&mut absent).unwrap();

    let view = join
        .compose_one_into(Order::new(15, Some(2)), |order| OrderView {
            id: order.id,
            user: None,
        })
        .unwrap();
    assert_eq!(view, OrderView { id: 15, user: Some("B") });

    // One fetch per composition; the absent order didn't fetch at all.
    assert_eq!(*calls.borrow(), [vec![1], vec![2], vec![1, 2], vec![2]]);
}

#[test]
fn test_composing_twice_is_idempotent() {
    let sets = RefCell::new(Vec::new());

    let join = Join::new(
        |order: &Order| order.user_id,
        table(USERS),
        |order: &mut Order, user| {
            sets.borrow_mut().push((order.id, user));
            order.user = user;
        },
    )
    .on_miss(OnMiss::Apply);

    let orders = vec![
        Order::new(10, Some(2)),
        Order::new(11, Some(5)),
        Order::new(12, None),
        Order::new(13, Some(2)),
    ];

    let mut first = orders.clone();
    join.compose(&mut first).unwrap();
    let first_sets = sets.replace(Vec::new());

    let mut second = orders;
    join.compose(&mut second).unwrap();
    let second_sets = sets.replace(Vec::new());

    assert_eq!(first, second);
    assert_eq!(first_sets, second_sets);
}

/// A single element can be enriched with a per-key lookup instead of the
/// batch fetch.
#[test]
fn test_compose_one_with_lookup() {
    let calls = RefCell::new(Vec::new());
    let lookups = RefCell::new(Vec::new());

    let join = Join::new(
        |order: &Order| order.user_id,
        recorded(&calls, table(USERS)),
        |order: &mut Order, user| order.user = user,
    );

    let lookup = |id: &u32| -> Result<Option<&'static str>, Infallible> {
        lookups.borrow_mut().push(*id);
        Ok(USERS.iter().find(|(key, _)| key == id).map(|&(_, name)| name))
    };

    let mut order = Order::new(10, Some(2));
    join.compose_one_with(&mut order, lookup).unwrap();
    assert_eq!(order.user, Some("B"));

    let mut missing = Order {
        user: Some("kept"),
        ..Order::new(11, Some(9))
    };
    join.compose_one_with(&mut missing, lookup).unwrap();
    assert_eq!(missing.user, Some("kept"));

    let mut keyless = Order::new(12, None);
    join.compose_one_with(&mut keyless, lookup).unwrap();

    let refreshed = join
        .on_miss(OnMiss::Apply)
        .compose_one_into_with(
            Order::new(13, Some(9)),
            |order| Order {
                user: Some("stale"),
                ..order
            },
            lookup,
        )
        .unwrap();
    assert_eq!(refreshed.user, None);

    assert_eq!(*lookups.borrow(), [2, 9, 9]);
    assert!(calls.borrow().is_empty());
}

#[test]
fn test_compose_one_with_error() {
    let join = Join::new(
        |order: &Order| order.user_id,
        table(USERS),
        |order: &mut Order, user| order.user = user,
    )
    .on_miss(OnMiss::Apply);

    let mut order = Order {
        user: Some("kept"),
        ..Order::new(10, Some(1))
    };
    let result = join.compose_one_with(
        &mut order,
        |_id: &u32| -> Result<Option<&'static str>, String> { Err(String::from("cache offline")) },
    );

    assert_eq!(result, Err(String::from("cache offline")));
    assert_eq!(order.user, Some("kept"));
}
