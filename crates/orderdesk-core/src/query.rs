//! # Query Pipelines
//!
//! Fluent, pure transformations over collections that have already been
//! fetched from a repository.
//!
//! ## Pipeline Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Query::new(products)                                                   │
//! │     .filter(&Predicate::gt(Price, 10.00))     ← typed predicate         │
//! │     .filter_by(Product::has_description)      ← any closure             │
//! │     .order_by(|p| p.price, Descending)        ← stable                  │
//! │     .take(5)                                                            │
//! │     .into_vec()                                                         │
//! │                                                                         │
//! │  Joins are key-based:                                                   │
//! │     semi_join(&orders, |c| c.id, |o| o.client_id)   clients WITH orders │
//! │     anti_join(&details, |p| p.id, |d| d.product_id) products NEVER sold │
//! │                                                                         │
//! │  Manual joins go through Lookup, which substitutes a placeholder when   │
//! │  the related entity no longer exists instead of failing.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing here touches a store; every method consumes the pipeline and
//! returns a new one.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use crate::entity::Entity;
use crate::predicate::Predicate;

/// Sort direction for [`Query::order_by`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

// =============================================================================
// Query
// =============================================================================

/// An owned, ordered collection with LINQ-style combinators.
#[derive(Debug, Clone, PartialEq)]
pub struct Query<T> {
    items: Vec<T>,
}

impl<T> Query<T> {
    pub fn new(items: impl IntoIterator<Item = T>) -> Self {
        Self {
            items: items.into_iter().collect(),
        }
    }

    /// Keeps items for which `keep` returns true.
    pub fn filter_by(mut self, keep: impl FnMut(&T) -> bool) -> Self {
        self.items.retain(keep);
        self
    }

    /// Keeps items that have at least one related item with the same key.
    pub fn semi_join<R, K>(
        self,
        related: &[R],
        key: impl Fn(&T) -> K,
        related_key: impl Fn(&R) -> K,
    ) -> Self
    where
        K: Eq + Hash,
    {
        let present: HashSet<K> = related.iter().map(related_key).collect();
        self.filter_by(|item| present.contains(&key(item)))
    }

    /// Keeps items that have no related item with the same key.
    pub fn anti_join<R, K>(
        self,
        related: &[R],
        key: impl Fn(&T) -> K,
        related_key: impl Fn(&R) -> K,
    ) -> Self
    where
        K: Eq + Hash,
    {
        let present: HashSet<K> = related.iter().map(related_key).collect();
        self.filter_by(|item| !present.contains(&key(item)))
    }

    /// Stable sort by a computed key.
    ///
    /// The key is computed once per item, so an expensive key (an aggregate
    /// over a related collection) is fine. Ties keep their input order in
    /// both directions.
    pub fn order_by<K: Ord>(mut self, mut key: impl FnMut(&T) -> K, direction: Direction) -> Self {
        match direction {
            Direction::Ascending => self.items.sort_by_cached_key(|item| key(item)),
            Direction::Descending => self.items.sort_by_cached_key(|item| Reverse(key(item))),
        }
        self
    }

    /// Keeps at most the first `n` items.
    pub fn take(mut self, n: usize) -> Self {
        self.items.truncate(n);
        self
    }

    /// Projects every item.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Query<U> {
        Query {
            items: self.items.into_iter().map(f).collect(),
        }
    }

    /// Removes duplicates by value equality; the first occurrence wins.
    pub fn distinct(self) -> Self
    where
        T: Eq + Hash + Clone,
    {
        let mut seen = HashSet::with_capacity(self.items.len());
        self.filter_by(|item| seen.insert(item.clone()))
    }

    /// Groups items by key. Groups appear in order of their key's first
    /// appearance; items keep their relative order inside a group.
    pub fn group_by<K>(self, key: impl Fn(&T) -> K) -> Query<Group<K, T>>
    where
        K: Eq + Hash + Clone,
    {
        let mut index: HashMap<K, usize> = HashMap::new();
        let mut groups: Vec<Group<K, T>> = Vec::new();

        for item in self.items {
            let k = key(&item);
            match index.get(&k) {
                Some(&slot) => groups[slot].items.push(item),
                None => {
                    index.insert(k.clone(), groups.len());
                    groups.push(Group {
                        key: k,
                        items: vec![item],
                    });
                }
            }
        }

        Query { items: groups }
    }

    pub fn first(self) -> Option<T> {
        self.items.into_iter().next()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}

impl<T: Entity> Query<T> {
    /// Keeps entities matching a typed predicate.
    pub fn filter(self, predicate: &Predicate<T::Field>) -> Self {
        self.filter_by(|item| predicate.matches(item))
    }
}

impl<T> IntoIterator for Query<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<T> FromIterator<T> for Query<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Query::new(iter)
    }
}

// =============================================================================
// Group
// =============================================================================

/// Items sharing one key, produced by [`Query::group_by`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group<K, T> {
    pub key: K,
    pub items: Vec<T>,
}

impl<K, T> Group<K, T> {
    pub fn count(&self) -> usize {
        self.items.len()
    }

    /// Integer sum of a projection over the group.
    pub fn sum(&self, f: impl Fn(&T) -> i64) -> i64 {
        self.items.iter().map(f).sum()
    }
}

// =============================================================================
// Lookup
// =============================================================================

/// Key index over a borrowed collection, for manual joins.
///
/// When several items share a key the first one wins, matching a linear
/// "first or default" scan.
#[derive(Debug)]
pub struct Lookup<'a, K, V> {
    index: HashMap<K, &'a V>,
}

impl<'a, K: Eq + Hash, V> Lookup<'a, K, V> {
    pub fn new(items: &'a [V], key: impl Fn(&V) -> K) -> Self {
        let mut index = HashMap::with_capacity(items.len());
        for item in items {
            index.entry(key(item)).or_insert(item);
        }
        Self { index }
    }

    pub fn get(&self, key: &K) -> Option<&'a V> {
        self.index.get(key).copied()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Projects the related item, or returns `sentinel` when it is missing.
    pub fn field_or<R>(&self, key: &K, f: impl FnOnce(&V) -> R, sentinel: R) -> R {
        self.get(key).map_or(sentinel, f)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
