// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use super::{ExpressionBuilder, SQLBuilder, SQLValue, column::Column, select::Select};

/// A predicate is a boolean expression that can be used in a WHERE or HAVING clause.
#[derive(Debug, Clone, PartialEq)]
pub enum ConcretePredicate {
    True,
    False,
    Eq(Column, Column),
    Neq(Column, Column),
    Lt(Column, Column),
    Lte(Column, Column),
    Gt(Column, Column),
    Gte(Column, Column),
    In(Column, Vec<Column>),
    NotIn(Column, Vec<Column>),
    InSelect(Column, Box<Select>),
    NotInSelect(Column, Box<Select>),
    /// Verbatim text whose `?` markers bind `params` positionally
    Raw { sql: String, params: Vec<SQLValue> },

    // Prefer ConcretePredicate::and(), which simplifies the clause
    And(Box<ConcretePredicate>, Box<ConcretePredicate>),
    // Prefer ConcretePredicate::or(), which simplifies the clause
    Or(Box<ConcretePredicate>, Box<ConcretePredicate>),
    // Prefer the `!` operator, which simplifies the clause
    Not(Box<ConcretePredicate>),
}

impl ConcretePredicate {
    /// Compare two columns and reduce to a simpler predicate if possible.
    pub fn eq(lhs: Column, rhs: Column) -> Self {
        match (&lhs, &rhs) {
            (Column::Param(v1), Column::Param(v2)) => (v1 == v2).into(),
            _ => ConcretePredicate::Eq(lhs, rhs),
        }
    }

    pub fn raw(sql: impl Into<String>, params: Vec<SQLValue>) -> Self {
        ConcretePredicate::Raw {
            sql: sql.into(),
            params,
        }
    }

    /// Logical and of two predicates, reducing to a simpler predicate if possible.
    pub fn and(lhs: Self, rhs: Self) -> Self {
        match (lhs, rhs) {
            (ConcretePredicate::False, _) | (_, ConcretePredicate::False) => {
                ConcretePredicate::False
            }
            (ConcretePredicate::True, rhs) => rhs,
            (lhs, ConcretePredicate::True) => lhs,
            (lhs, rhs) if lhs == rhs => lhs,
            (lhs, rhs) => ConcretePredicate::And(Box::new(lhs), Box::new(rhs)),
        }
    }

    /// Logical or of two predicates, reducing to a simpler predicate if possible.
    pub fn or(lhs: Self, rhs: Self) -> Self {
        match (lhs, rhs) {
            (ConcretePredicate::True, _) | (_, ConcretePredicate::True) => ConcretePredicate::True,
            (ConcretePredicate::False, rhs) => rhs,
            (lhs, ConcretePredicate::False) => lhs,
            (lhs, rhs) if lhs == rhs => lhs,
            (lhs, rhs) => ConcretePredicate::Or(Box::new(lhs), Box::new(rhs)),
        }
    }

    /// Conjoin all predicates, yielding `True` for an empty list
    pub fn conjoin(predicates: impl IntoIterator<Item = Self>) -> Self {
        predicates
            .into_iter()
            .fold(ConcretePredicate::True, ConcretePredicate::and)
    }
}

impl From<bool> for ConcretePredicate {
    fn from(b: bool) -> Self {
        if b {
            ConcretePredicate::True
        } else {
            ConcretePredicate::False
        }
    }
}

impl std::ops::Not for ConcretePredicate {
    type Output = ConcretePredicate;

    fn not(self) -> Self::Output {
        match self {
            // Reduced to a simpler form when possible, else fall back to ConcretePredicate::Not
            ConcretePredicate::True => ConcretePredicate::False,
            ConcretePredicate::False => ConcretePredicate::True,
            ConcretePredicate::Eq(lhs, rhs) => ConcretePredicate::Neq(lhs, rhs),
            ConcretePredicate::Neq(lhs, rhs) => ConcretePredicate::Eq(lhs, rhs),
            ConcretePredicate::Lt(lhs, rhs) => ConcretePredicate::Gte(lhs, rhs),
            ConcretePredicate::Lte(lhs, rhs) => ConcretePredicate::Gt(lhs, rhs),
            ConcretePredicate::Gt(lhs, rhs) => ConcretePredicate::Lte(lhs, rhs),
            ConcretePredicate::Gte(lhs, rhs) => ConcretePredicate::Lt(lhs, rhs),
            ConcretePredicate::In(lhs, rhs) => ConcretePredicate::NotIn(lhs, rhs),
            ConcretePredicate::NotIn(lhs, rhs) => ConcretePredicate::In(lhs, rhs),
            ConcretePredicate::InSelect(lhs, rhs) => ConcretePredicate::NotInSelect(lhs, rhs),
            ConcretePredicate::NotInSelect(lhs, rhs) => ConcretePredicate::InSelect(lhs, rhs),
            ConcretePredicate::Not(predicate) => *predicate,
            predicate => ConcretePredicate::Not(Box::new(predicate)),
        }
    }
}

impl ExpressionBuilder for ConcretePredicate {
    /// Build a predicate into a SQL string.
    fn build(&self, builder: &mut SQLBuilder) {
        match &self {
            ConcretePredicate::True => builder.push_str("TRUE"),
            ConcretePredicate::False => builder.push_str("FALSE"),
            ConcretePredicate::Eq(column1, column2) => {
                if column2 == &Column::Null {
                    column1.build(builder);
                    builder.push_str(" IS NULL");
                } else {
                    relational_combine(column1, column2, "=", builder)
                }
            }
            ConcretePredicate::Neq(column1, column2) => {
                if column2 == &Column::Null {
                    column1.build(builder);
                    builder.push_str(" IS NOT NULL");
                } else {
                    relational_combine(column1, column2, "<>", builder)
                }
            }
            ConcretePredicate::Lt(column1, column2) => {
                relational_combine(column1, column2, "<", builder)
            }
            ConcretePredicate::Lte(column1, column2) => {
                relational_combine(column1, column2, "<=", builder)
            }
            ConcretePredicate::Gt(column1, column2) => {
                relational_combine(column1, column2, ">", builder)
            }
            ConcretePredicate::Gte(column1, column2) => {
                relational_combine(column1, column2, ">=", builder)
            }
            // An empty list can never match (and `IN ()` is not valid SQL)
            ConcretePredicate::In(_, values) if values.is_empty() => builder.push_str("1=0"),
            ConcretePredicate::NotIn(_, values) if values.is_empty() => builder.push_str("1=1"),
            ConcretePredicate::In(column, values) => list_combine(column, values, "IN", builder),
            ConcretePredicate::NotIn(column, values) => {
                list_combine(column, values, "NOT IN", builder)
            }
            ConcretePredicate::InSelect(column, select) => {
                column.build(builder);
                builder.push_str(" IN (");
                select.build(builder);
                builder.push(')');
            }
            ConcretePredicate::NotInSelect(column, select) => {
                column.build(builder);
                builder.push_str(" NOT IN (");
                select.build(builder);
                builder.push(')');
            }
            ConcretePredicate::Raw { sql, params } => builder.push_fragment(sql, params),
            ConcretePredicate::And(predicate1, predicate2) => {
                logical_combine(predicate1, predicate2, "AND", builder)
            }
            ConcretePredicate::Or(predicate1, predicate2) => {
                logical_combine(predicate1, predicate2, "OR", builder)
            }
            ConcretePredicate::Not(predicate) => {
                builder.push_str("NOT ");
                build_operand(predicate, builder);
            }
        }
    }
}

/// Build a predicate that participates in a larger expression. Logical combinations already
/// parenthesize themselves; everything else except opaque text binds tightly enough.
fn build_operand(predicate: &ConcretePredicate, builder: &mut SQLBuilder) {
    match predicate {
        ConcretePredicate::And(..) | ConcretePredicate::Or(..) => predicate.build(builder),
        _ => {
            builder.push('(');
            predicate.build(builder);
            builder.push(')');
        }
    }
}

/// Combine two expressions with a relational operator.
fn relational_combine<E1: ExpressionBuilder, E2: ExpressionBuilder>(
    left: &E1,
    right: &E2,
    op: &'static str,
    builder: &mut SQLBuilder,
) {
    left.build(builder);
    builder.push_space();
    builder.push_str(op);
    builder.push_space();
    right.build(builder);
}

fn list_combine(column: &Column, values: &[Column], op: &'static str, builder: &mut SQLBuilder) {
    column.build(builder);
    builder.push_space();
    builder.push_str(op);
    builder.push_str(" (");
    builder.push_elems(values, ", ");
    builder.push(')');
}

/// Combine two expressions with a logical binary operator.
fn logical_combine(
    left: &ConcretePredicate,
    right: &ConcretePredicate,
    op: &'static str,
    builder: &mut SQLBuilder,
) {
    builder.push('(');
    build_nested(left, builder);
    builder.push_space();
    builder.push_str(op);
    builder.push_space();
    build_nested(right, builder);
    builder.push(')');
}

// Raw text may carry its own operators, so keep it grouped
fn build_nested(predicate: &ConcretePredicate, builder: &mut SQLBuilder) {
    if matches!(predicate, ConcretePredicate::Raw { .. }) {
        builder.push('(');
        predicate.build(builder);
        builder.push(')');
    } else {
        predicate.build(builder);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn age() -> Column {
        Column::physical("people", "age")
    }

    #[test]
    fn eq_predicate() {
        let predicate = ConcretePredicate::Eq(age(), Column::Param(5.into()));

        assert_binding!(predicate.to_sql(), r#""people"."age" = $1"#, 5);
    }

    #[test]
    fn null_comparisons() {
        assert_binding!(
            ConcretePredicate::Eq(age(), Column::Null).to_sql(),
            r#""people"."age" IS NULL"#
        );
        assert_binding!(
            (!ConcretePredicate::Eq(age(), Column::Null)).to_sql(),
            r#""people"."age" IS NOT NULL"#
        );
    }

    #[test]
    fn and_or_predicates() {
        let name = ConcretePredicate::Eq(Column::physical("people", "name"), Column::Param("foo".into()));
        let young = ConcretePredicate::Lt(age(), Column::Param(5.into()));

        assert_binding!(
            ConcretePredicate::and(name.clone(), young.clone()).to_sql(),
            r#"("people"."name" = $1 AND "people"."age" < $2)"#,
            "foo",
            5
        );
        assert_binding!(
            (!ConcretePredicate::or(name, young)).to_sql(),
            r#"NOT ("people"."name" = $1 OR "people"."age" < $2)"#,
            "foo",
            5
        );
    }

    #[test]
    fn simplification() {
        let young = ConcretePredicate::Lt(age(), Column::Param(5.into()));

        assert_eq!(
            ConcretePredicate::and(ConcretePredicate::True, young.clone()),
            young
        );
        assert_eq!(
            ConcretePredicate::or(ConcretePredicate::True, young.clone()),
            ConcretePredicate::True
        );
        assert_eq!(!young, ConcretePredicate::Gte(age(), Column::Param(5.into())));
    }

    #[test]
    fn in_lists() {
        let predicate = ConcretePredicate::In(
            age(),
            vec![Column::Param(1.into()), Column::Param(2.into())],
        );
        assert_binding!(predicate.to_sql(), r#""people"."age" IN ($1, $2)"#, 1, 2);

        assert_binding!(ConcretePredicate::In(age(), vec![]).to_sql(), "1=0");
        assert_binding!(ConcretePredicate::NotIn(age(), vec![]).to_sql(), "1=1");
    }

    #[test]
    fn raw_fragments_are_grouped() {
        let raw = ConcretePredicate::raw("age > ? OR age < ?", vec![10.into(), 2.into()]);
        let named = ConcretePredicate::Eq(Column::physical("people", "name"), Column::Param("a".into()));

        assert_binding!(
            ConcretePredicate::and(named, raw.clone()).to_sql(),
            r#"("people"."name" = $1 AND (age > $2 OR age < $3))"#,
            "a",
            10,
            2
        );
        assert_binding!(
            (!raw).to_sql(),
            "NOT (age > $1 OR age < $2)",
            10,
            2
        );
    }
}
