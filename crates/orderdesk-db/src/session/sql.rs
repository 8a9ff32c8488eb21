//! # SQL Generation
//!
//! Builds the statements the SQLite session runs. Column and table names
//! come from the static `Field` / `EntityKind` metadata; every value is a
//! bound parameter.
//!
//! ## Predicate Translation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Predicate                      SQL                                     │
//! │  ─────────────────────────────  ──────────────────────────────────────  │
//! │  Always                         1                                       │
//! │  Eq(f, Null)                    f IS NULL                               │
//! │  Eq(f, v)                       COALESCE(f = ?, 0)                      │
//! │  Compare(f, op, v)              COALESCE(f op ?, 0)                     │
//! │  Between(f, a, b)               COALESCE(f BETWEEN ? AND ?, 0)          │
//! │  Contains(f, s)                 COALESCE(instr(f, ?), 0) > 0            │
//! │  IsEmpty(f)                     (f IS NULL OR f = '')                   │
//! │  In(f, [])                      0                                       │
//! │  In(f, vs)                      COALESCE(f IN (?, ...), 0)              │
//! │  And([]) / Or([])               1 / 0                                   │
//! │  And(ps) / Or(ps)               (p1 AND p2 ...) / (p1 OR p2 ...)        │
//! │  Not(p)                         NOT (p)                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every leaf evaluates to 0 or 1, never NULL, so `NOT` agrees with the
//! in-memory evaluator. `instr` is a case-sensitive byte search, unlike
//! `LIKE` which folds ASCII case.
//!
//! A leaf whose value does not fit the field's declared type is written as
//! a literal `0`. SQLite would otherwise apply column affinity (`name = 7`
//! matches the text "7") and cross-type ordering (every INTEGER sorts below
//! every TEXT), where the in-memory evaluator never matches. `Contains` on a
//! non-text field is `0` for the same reason, since `instr` casts its
//! arguments to text. Null values go through unchanged: `f op NULL` is
//! already folded to 0 by the COALESCE.

use orderdesk_core::{Entity, Field, Predicate, Value, ValueType};
use sqlx::{QueryBuilder, Sqlite};

use crate::session::Change;

/// Comma-separated column list of an entity, identity first.
pub fn column_list<T: Entity>() -> String {
    <T::Field as Field>::ALL
        .iter()
        .map(|f| f.name())
        .collect::<Vec<_>>()
        .join(", ")
}

/// `SELECT <columns> FROM <table>`, ready for a WHERE or ORDER BY.
pub fn select<T: Entity>() -> String {
    format!("SELECT {} FROM {}", column_list::<T>(), T::KIND.table())
}

pub fn push_value(qb: &mut QueryBuilder<'_, Sqlite>, value: &Value) {
    match value {
        Value::Null => qb.push_bind(Option::<i64>::None),
        Value::Integer(v) => qb.push_bind(*v),
        Value::Text(s) => qb.push_bind(s.clone()),
        Value::Timestamp(t) => qb.push_bind(*t),
    };
}

/// Appends a predicate as a WHERE-clause expression.
pub fn push_predicate<F: Field>(qb: &mut QueryBuilder<'_, Sqlite>, predicate: &Predicate<F>) {
    match predicate {
        Predicate::Always => {
            qb.push("1");
        }
        Predicate::Eq(field, Value::Null) => {
            qb.push(field.name()).push(" IS NULL");
        }
        Predicate::Eq(field, value) if !value.fits(field.value_type()) => {
            qb.push("0");
        }
        Predicate::Eq(field, value) => {
            qb.push("COALESCE(").push(field.name()).push(" = ");
            push_value(qb, value);
            qb.push(", 0)");
        }
        Predicate::Compare(field, _, value) if !value.fits(field.value_type()) => {
            qb.push("0");
        }
        Predicate::Compare(field, op, value) => {
            qb.push("COALESCE(")
                .push(field.name())
                .push(" ")
                .push(op.symbol())
                .push(" ");
            push_value(qb, value);
            qb.push(", 0)");
        }
        Predicate::Between(field, low, high)
            if !(low.fits(field.value_type()) && high.fits(field.value_type())) =>
        {
            qb.push("0");
        }
        Predicate::Between(field, low, high) => {
            qb.push("COALESCE(").push(field.name()).push(" BETWEEN ");
            push_value(qb, low);
            qb.push(" AND ");
            push_value(qb, high);
            qb.push(", 0)");
        }
        Predicate::Contains(field, _) if field.value_type() != ValueType::Text => {
            qb.push("0");
        }
        Predicate::Contains(field, needle) => {
            qb.push("COALESCE(instr(").push(field.name()).push(", ");
            qb.push_bind(needle.clone());
            qb.push("), 0) > 0");
        }
        Predicate::IsEmpty(field) => {
            qb.push("(")
                .push(field.name())
                .push(" IS NULL OR ")
                .push(field.name())
                .push(" = '')");
        }
        Predicate::In(field, values) => {
            let ty = field.value_type();
            let fitting: Vec<&Value> = values.iter().filter(|v| v.fits(ty)).collect();
            if fitting.is_empty() {
                qb.push("0");
                return;
            }

            qb.push("COALESCE(").push(field.name()).push(" IN (");
            for (i, value) in fitting.into_iter().enumerate() {
                if i > 0 {
                    qb.push(", ");
                }
                push_value(qb, value);
            }
            qb.push("), 0)");
        }
        Predicate::And(parts) => push_junction(qb, parts, " AND ", "1"),
        Predicate::Or(parts) => push_junction(qb, parts, " OR ", "0"),
        Predicate::Not(inner) => {
            qb.push("NOT (");
            push_predicate(qb, inner);
            qb.push(")");
        }
    }
}

fn push_junction<F: Field>(
    qb: &mut QueryBuilder<'_, Sqlite>,
    parts: &[Predicate<F>],
    separator: &str,
    identity: &str,
) {
    if parts.is_empty() {
        qb.push(identity);
        return;
    }

    qb.push("(");
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            qb.push(separator);
        }
        push_predicate(qb, part);
    }
    qb.push(")");
}

// =============================================================================
// Write Statements
// =============================================================================

/// `INSERT INTO <table> (<columns>) VALUES (?, ...)`
pub fn insert(change: &Change) -> QueryBuilder<'static, Sqlite> {
    let names: Vec<_> = change.columns.iter().map(|(name, _)| *name).collect();
    let mut qb = QueryBuilder::new(format!(
        "INSERT INTO {} ({}) VALUES (",
        change.kind.table(),
        names.join(", ")
    ));

    for (i, (_, value)) in change.columns.iter().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        push_value(&mut qb, value);
    }
    qb.push(")");
    qb
}

/// `UPDATE <table> SET <column> = ?, ... WHERE id = ?`
pub fn update(change: &Change) -> QueryBuilder<'static, Sqlite> {
    let mut qb = QueryBuilder::new(format!("UPDATE {} SET ", change.kind.table()));

    for (i, (name, value)) in change.columns.iter().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        qb.push(*name).push(" = ");
        push_value(&mut qb, value);
    }
    qb.push(" WHERE id = ").push_bind(change.id);
    qb
}

/// `DELETE FROM <table> WHERE id = ?`
pub fn delete(change: &Change) -> QueryBuilder<'static, Sqlite> {
    let mut qb = QueryBuilder::new(format!("DELETE FROM {} WHERE id = ", change.kind.table()));
    qb.push_bind(change.id);
    qb
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{ChangeOp, PendingKey};
    use orderdesk_core::{EntityKind, Money, Product, ProductField};

    fn where_clause(predicate: &Predicate<ProductField>) -> String {
        let mut qb = QueryBuilder::<Sqlite>::new("");
        push_predicate(&mut qb, predicate);
        qb.sql().to_string()
    }

    #[test]
    fn test_select_lists_every_column() {
        assert_eq!(
            select::<Product>(),
            "SELECT id, name, description, price FROM products"
        );
    }

    #[test]
    fn test_predicate_sql() {
        assert_eq!(
            where_clause(&Predicate::between(
                ProductField::Price,
                Money::from_major(10),
                Money::from_major(50)
            )),
            "COALESCE(price BETWEEN ? AND ?, 0)"
        );
        assert_eq!(
            where_clause(&Predicate::contains(ProductField::Description, "pen")),
            "COALESCE(instr(description, ?), 0) > 0"
        );
        assert_eq!(
            where_clause(&Predicate::is_empty(ProductField::Description).not()),
            "NOT ((description IS NULL OR description = ''))"
        );
        assert_eq!(
            where_clause(&Predicate::eq(ProductField::Description, Value::Null)),
            "description IS NULL"
        );
    }

    #[test]
    fn test_empty_junctions_and_in() {
        assert_eq!(where_clause(&Predicate::And(vec![])), "1");
        assert_eq!(where_clause(&Predicate::Or(vec![])), "0");
        assert_eq!(
            where_clause(&Predicate::one_of(ProductField::Id, Vec::<i64>::new())),
            "0"
        );
        assert_eq!(
            where_clause(
                &Predicate::gt(ProductField::Price, Money::zero())
                    .or(Predicate::one_of(ProductField::Id, [1_i64, 2]))
            ),
            "(COALESCE(price > ?, 0) OR COALESCE(id IN (?, ?), 0))"
        );
    }

    #[test]
    fn test_mismatched_values_become_false() {
        assert_eq!(where_clause(&Predicate::lt(ProductField::Price, "abc")), "0");
        assert_eq!(where_clause(&Predicate::eq(ProductField::Name, 7_i64)), "0");
        assert_eq!(
            where_clause(&Predicate::between(ProductField::Price, 1_i64, "z")),
            "0"
        );
        assert_eq!(where_clause(&Predicate::contains(ProductField::Price, "5")), "0");
        assert_eq!(
            where_clause(&Predicate::lt(ProductField::Price, "abc").not()),
            "NOT (0)"
        );
        assert_eq!(
            where_clause(&Predicate::In(
                ProductField::Id,
                vec![Value::from("1"), Value::from(2_i64)]
            )),
            "COALESCE(id IN (?), 0)"
        );
        assert_eq!(
            where_clause(&Predicate::one_of(ProductField::Id, ["1", "2"])),
            "0"
        );
    }

    #[test]
    fn test_write_statements() {
        let product = Product::new("Pen", None, Money::from_cents(150)).with_id(5);

        let change = Change::write(PendingKey::new(1), ChangeOp::Insert, &product).unwrap();
        assert_eq!(
            insert(&change).sql(),
            "INSERT INTO products (name, description, price) VALUES (?, ?, ?)"
        );

        let change = Change::write(PendingKey::new(2), ChangeOp::Update, &product).unwrap();
        assert_eq!(
            update(&change).sql(),
            "UPDATE products SET name = ?, description = ?, price = ? WHERE id = ?"
        );

        let change = Change::delete(PendingKey::new(3), EntityKind::Product, 5);
        assert_eq!(delete(&change).sql(), "DELETE FROM products WHERE id = ?");
    }
}
