//! # Predicates
//!
//! Storage-independent boolean conditions over an entity's attributes.
//!
//! ## One Filter, Two Evaluators
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Predicate::between(ProductField::Price, 10.00, 50.00)                  │
//! │       │                                                                 │
//! │       ├──► matches(&product)          in-memory session, Query<T>      │
//! │       │                                                                 │
//! │       └──► orderdesk-db SQL builder    WHERE COALESCE(price BETWEEN    │
//! │                                              ? AND ?, 0)               │
//! │                                                                         │
//! │  Both evaluators agree on the edge cases:                              │
//! │    • comparisons against NULL are false (never "unknown")              │
//! │    • Contains is a case-sensitive substring test                       │
//! │    • IsEmpty is NULL or ""                                             │
//! │    • And([]) is true, Or([]) and In(f, []) are false                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Predicates are typed by the entity's `Field` enum, so naming an attribute
//! the entity does not have is a compile error rather than a runtime one.
//! Each field declares its [`ValueType`](crate::ValueType); a leaf whose value is of another
//! type never matches, in memory or in SQL.

use std::cmp::Ordering;

use crate::entity::{Entity, Field, Value};

// =============================================================================
// Comparison
// =============================================================================

/// Ordering operator of [`Predicate::Compare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparison {
    /// SQL operator.
    pub const fn symbol(self) -> &'static str {
        match self {
            Comparison::Lt => "<",
            Comparison::Le => "<=",
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
        }
    }

    /// Whether `left <op> right` holds given `left.cmp(right)`.
    pub fn holds(self, ordering: Ordering) -> bool {
        match self {
            Comparison::Lt => ordering == Ordering::Less,
            Comparison::Le => ordering != Ordering::Greater,
            Comparison::Gt => ordering == Ordering::Greater,
            Comparison::Ge => ordering != Ordering::Less,
        }
    }
}

// =============================================================================
// Predicate
// =============================================================================

/// A boolean condition over the attributes named by `F`.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate<F> {
    /// Matches everything.
    Always,
    /// Equality. `Eq(f, Value::Null)` tests for null.
    Eq(F, Value),
    Compare(F, Comparison, Value),
    /// Inclusive on both ends.
    Between(F, Value, Value),
    /// Case-sensitive substring of a text attribute.
    Contains(F, String),
    /// Null or empty text.
    IsEmpty(F),
    In(F, Vec<Value>),
    And(Vec<Predicate<F>>),
    Or(Vec<Predicate<F>>),
    Not(Box<Predicate<F>>),
}

impl<F: Field> Predicate<F> {
    pub fn eq(field: F, value: impl Into<Value>) -> Self {
        Predicate::Eq(field, value.into())
    }

    pub fn gt(field: F, value: impl Into<Value>) -> Self {
        Predicate::Compare(field, Comparison::Gt, value.into())
    }

    pub fn ge(field: F, value: impl Into<Value>) -> Self {
        Predicate::Compare(field, Comparison::Ge, value.into())
    }

    pub fn lt(field: F, value: impl Into<Value>) -> Self {
        Predicate::Compare(field, Comparison::Lt, value.into())
    }

    pub fn le(field: F, value: impl Into<Value>) -> Self {
        Predicate::Compare(field, Comparison::Le, value.into())
    }

    pub fn between(field: F, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        Predicate::Between(field, low.into(), high.into())
    }

    pub fn contains(field: F, needle: impl Into<String>) -> Self {
        Predicate::Contains(field, needle.into())
    }

    pub fn is_empty(field: F) -> Self {
        Predicate::IsEmpty(field)
    }

    pub fn one_of<V: Into<Value>>(field: F, values: impl IntoIterator<Item = V>) -> Self {
        Predicate::In(field, values.into_iter().map(Into::into).collect())
    }

    /// Conjunction with another predicate, flattening nested `And`s.
    pub fn and(self, other: Predicate<F>) -> Self {
        match self {
            Predicate::And(mut parts) => {
                parts.push(other);
                Predicate::And(parts)
            }
            first => Predicate::And(vec![first, other]),
        }
    }

    /// Disjunction with another predicate, flattening nested `Or`s.
    pub fn or(self, other: Predicate<F>) -> Self {
        match self {
            Predicate::Or(mut parts) => {
                parts.push(other);
                Predicate::Or(parts)
            }
            first => Predicate::Or(vec![first, other]),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Predicate::Not(Box::new(self))
    }

    /// Evaluates the predicate against one entity.
    pub fn matches<E>(&self, entity: &E) -> bool
    where
        E: Entity<Field = F>,
    {
        match self {
            Predicate::Always => true,
            Predicate::Eq(field, Value::Null) => entity.get(*field).is_null(),
            Predicate::Eq(field, value) => {
                entity.get(*field).compare(value) == Some(Ordering::Equal)
            }
            Predicate::Compare(field, op, value) => entity
                .get(*field)
                .compare(value)
                .is_some_and(|ordering| op.holds(ordering)),
            Predicate::Between(field, low, high) => {
                let actual = entity.get(*field);
                actual
                    .compare(low)
                    .is_some_and(|o| o != Ordering::Less)
                    && actual
                        .compare(high)
                        .is_some_and(|o| o != Ordering::Greater)
            }
            Predicate::Contains(field, needle) => entity
                .get(*field)
                .as_text()
                .is_some_and(|text| text.contains(needle.as_str())),
            Predicate::IsEmpty(field) => match entity.get(*field) {
                Value::Null => true,
                Value::Text(text) => text.is_empty(),
                _ => false,
            },
            Predicate::In(field, values) => {
                let actual = entity.get(*field);
                values
                    .iter()
                    .any(|v| actual.compare(v) == Some(Ordering::Equal))
            }
            Predicate::And(parts) => parts.iter().all(|p| p.matches(entity)),
            Predicate::Or(parts) => parts.iter().any(|p| p.matches(entity)),
            Predicate::Not(inner) => !inner.matches(entity),
        }
    }
}

impl<F> Default for Predicate<F> {
    fn default() -> Self {
        Predicate::Always
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;
    use crate::types::{Client, ClientField, Product, ProductField};

    fn products() -> Vec<Product> {
        vec![
            Product::new("A", None, Money::from_major(5)).with_id(1),
            Product::new("B", Some("Blue pen".to_string()), Money::from_major(25)).with_id(2),
            Product::new("C", Some(String::new()), Money::from_major(60)).with_id(3),
        ]
    }

    fn names(found: Vec<&Product>) -> Vec<&str> {
        found.into_iter().map(|p| p.name.as_str()).collect()
    }

    fn select<'a>(items: &'a [Product], p: &Predicate<ProductField>) -> Vec<&'a Product> {
        items.iter().filter(|item| p.matches(*item)).collect()
    }

    #[test]
    fn test_between_is_inclusive() {
        let items = products();
        let p = Predicate::between(ProductField::Price, Money::from_major(10), Money::from_major(50));
        assert_eq!(names(select(&items, &p)), vec!["B"]);

        let p = Predicate::between(ProductField::Price, Money::from_major(5), Money::from_major(25));
        assert_eq!(names(select(&items, &p)), vec!["A", "B"]);
    }

    #[test]
    fn test_comparisons() {
        let items = products();
        assert_eq!(
            names(select(&items, &Predicate::gt(ProductField::Price, Money::from_major(25)))),
            vec!["C"]
        );
        assert_eq!(
            names(select(&items, &Predicate::le(ProductField::Price, Money::from_major(25)))),
            vec!["A", "B"]
        );
    }

    #[test]
    fn test_null_never_compares() {
        let items = products();
        let p = Predicate::ge(ProductField::Description, "");
        assert_eq!(names(select(&items, &p)), vec!["B", "C"]);

        // Not over a null comparison is true, matching the SQL translation
        let p = Predicate::ge(ProductField::Description, "").not();
        assert_eq!(names(select(&items, &p)), vec!["A"]);
    }

    #[test]
    fn test_contains_is_case_sensitive() {
        let items = products();
        assert_eq!(
            names(select(&items, &Predicate::contains(ProductField::Description, "pen"))),
            vec!["B"]
        );
        assert!(select(&items, &Predicate::contains(ProductField::Description, "PEN")).is_empty());
    }

    #[test]
    fn test_is_empty_and_null_eq() {
        let items = products();
        assert_eq!(
            names(select(&items, &Predicate::is_empty(ProductField::Description))),
            vec!["A", "C"]
        );
        assert_eq!(
            names(select(&items, &Predicate::eq(ProductField::Description, Value::Null))),
            vec!["A"]
        );
    }

    #[test]
    fn test_in_and_combinators() {
        let items = products();
        let p = Predicate::one_of(ProductField::Id, [1_i64, 3]);
        assert_eq!(names(select(&items, &p)), vec!["A", "C"]);

        let p = Predicate::one_of(ProductField::Id, Vec::<i64>::new());
        assert!(select(&items, &p).is_empty());

        let p = Predicate::gt(ProductField::Price, Money::from_major(1))
            .and(Predicate::is_empty(ProductField::Description).not());
        assert_eq!(names(select(&items, &p)), vec!["B"]);

        let p = Predicate::eq(ProductField::Name, "A").or(Predicate::eq(ProductField::Name, "C"));
        assert_eq!(names(select(&items, &p)), vec!["A", "C"]);
    }

    #[test]
    fn test_empty_junctions() {
        let client = Client::new("Ana", "ana@example.com");
        assert!(Predicate::<ClientField>::And(vec![]).matches(&client));
        assert!(!Predicate::<ClientField>::Or(vec![]).matches(&client));
        assert!(Predicate::<ClientField>::default().matches(&client));
    }

    #[test]
    fn test_mismatched_types_do_not_match() {
        let client = Client::new("7", "x@y.z").with_id(7);
        assert!(!Predicate::eq(ClientField::Name, 7_i64).matches(&client));
        assert!(Predicate::eq(ClientField::Id, 7_i64).matches(&client));
    }
}
