// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::fmt::Display;

use super::Relation;

/// A table-qualified column
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub table: String,
    pub name: String,
}

impl ColumnRef {
    pub fn new(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            name: name.into(),
        }
    }
}

impl Display for ColumnRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.table, self.name)
    }
}

/// The right-hand side of a comparison
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// The next bind in the clause's bind list
    Bind,
    Null,
    Column(ColumnRef),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl ComparisonOp {
    /// The operator matching exactly the rows this one rejects
    pub fn invert(self) -> Self {
        match self {
            ComparisonOp::Lt => ComparisonOp::GtEq,
            ComparisonOp::LtEq => ComparisonOp::Gt,
            ComparisonOp::Gt => ComparisonOp::LtEq,
            ComparisonOp::GtEq => ComparisonOp::Lt,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InList {
    Values(Vec<Operand>),
    /// Rows of another relation. Its binds travel with it, not with the enclosing clause.
    Subquery(Box<Relation>),
}

/// A node of the filter AST. Leaves are always qualified by a column, so a predicate keeps its
/// meaning when moved into a relation over another entity.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Equality(ColumnRef, Operand),
    NotEqual(ColumnRef, Operand),
    Comparison(ColumnRef, ComparisonOp, Operand),
    In(ColumnRef, InList),
    NotIn(ColumnRef, InList),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
    /// Opaque text. Each `?` consumes one bind.
    Raw(String),
}

impl Predicate {
    pub fn and(lhs: Predicate, rhs: Predicate) -> Predicate {
        Predicate::And(Box::new(lhs), Box::new(rhs))
    }

    pub fn or(lhs: Predicate, rhs: Predicate) -> Predicate {
        Predicate::Or(Box::new(lhs), Box::new(rhs))
    }

    /// Left-nested conjunction, `None` for an empty list
    pub fn conjoin(predicates: impl IntoIterator<Item = Predicate>) -> Option<Predicate> {
        predicates.into_iter().reduce(Predicate::and)
    }

    /// The column an equality predicate fixes
    pub fn equality_column(&self) -> Option<&ColumnRef> {
        match self {
            Predicate::Equality(column, _) => Some(column),
            _ => None,
        }
    }

    /// The column a leaf predicate constrains
    pub fn column(&self) -> Option<&ColumnRef> {
        match self {
            Predicate::Equality(column, _)
            | Predicate::NotEqual(column, _)
            | Predicate::Comparison(column, _, _)
            | Predicate::In(column, _)
            | Predicate::NotIn(column, _) => Some(column),
            _ => None,
        }
    }

    /// Columns constrained anywhere in this predicate
    pub fn referenced_columns(&self) -> Vec<&ColumnRef> {
        match self {
            Predicate::And(lhs, rhs) | Predicate::Or(lhs, rhs) => {
                let mut columns = lhs.referenced_columns();
                columns.extend(rhs.referenced_columns());
                columns
            }
            Predicate::Not(inner) => inner.referenced_columns(),
            _ => self.column().into_iter().collect(),
        }
    }

    /// The number of binds this predicate consumes, in textual order
    pub fn bind_count(&self) -> usize {
        fn operand_count(operand: &Operand) -> usize {
            usize::from(matches!(operand, Operand::Bind))
        }

        match self {
            Predicate::Equality(_, operand)
            | Predicate::NotEqual(_, operand)
            | Predicate::Comparison(_, _, operand) => operand_count(operand),
            Predicate::In(_, list) | Predicate::NotIn(_, list) => match list {
                InList::Values(operands) => operands.iter().map(operand_count).sum(),
                InList::Subquery(_) => 0,
            },
            Predicate::And(lhs, rhs) | Predicate::Or(lhs, rhs) => {
                lhs.bind_count() + rhs.bind_count()
            }
            Predicate::Not(inner) => inner.bind_count(),
            Predicate::Raw(text) => placeholder_count(text),
        }
    }

    /// Lower a negation into the predicate's dedicated negative form where one exists. Opaque and
    /// compound predicates are wrapped.
    pub fn invert(self) -> Predicate {
        match self {
            Predicate::Equality(column, operand) => Predicate::NotEqual(column, operand),
            Predicate::NotEqual(column, operand) => Predicate::Equality(column, operand),
            Predicate::Comparison(column, op, operand) => {
                Predicate::Comparison(column, op.invert(), operand)
            }
            Predicate::In(column, list) => Predicate::NotIn(column, list),
            Predicate::NotIn(column, list) => Predicate::In(column, list),
            Predicate::Not(inner) => *inner,
            predicate => Predicate::Not(Box::new(predicate)),
        }
    }

    /// Is this predicate known to match no row without consulting the database?
    pub fn is_contradiction(&self) -> bool {
        match self {
            Predicate::Raw(text) => {
                let normalized: String = text
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .collect::<String>()
                    .to_lowercase();
                matches!(normalized.as_str(), "1=0" | "false" | "(1=0)")
            }
            Predicate::In(_, InList::Values(values)) => values.is_empty(),
            Predicate::And(lhs, rhs) => lhs.is_contradiction() || rhs.is_contradiction(),
            Predicate::Or(lhs, rhs) => lhs.is_contradiction() && rhs.is_contradiction(),
            _ => false,
        }
    }
}

/// The number of `?` placeholders in raw text, counting any inside quoted literals
pub fn placeholder_count(text: &str) -> usize {
    text.chars().filter(|c| *c == '?').count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn age() -> ColumnRef {
        ColumnRef::new("people", "age")
    }

    #[test]
    fn inversion_lowers_to_dedicated_forms() {
        assert_eq!(
            Predicate::Equality(age(), Operand::Bind).invert(),
            Predicate::NotEqual(age(), Operand::Bind)
        );
        assert_eq!(
            Predicate::In(age(), InList::Values(vec![Operand::Bind])).invert(),
            Predicate::NotIn(age(), InList::Values(vec![Operand::Bind]))
        );
        assert_eq!(
            Predicate::Comparison(age(), ComparisonOp::Gt, Operand::Bind).invert(),
            Predicate::Comparison(age(), ComparisonOp::LtEq, Operand::Bind)
        );
        assert_eq!(
            Predicate::Raw("age > 3".into()).invert(),
            Predicate::Not(Box::new(Predicate::Raw("age > 3".into())))
        );
        assert_eq!(
            Predicate::Raw("age > 3".into()).invert().invert(),
            Predicate::Raw("age > 3".into())
        );
    }

    #[test]
    fn bind_counts() {
        let range = Predicate::and(
            Predicate::Comparison(age(), ComparisonOp::GtEq, Operand::Bind),
            Predicate::Comparison(age(), ComparisonOp::Lt, Operand::Bind),
        );
        assert_eq!(range.bind_count(), 2);
        assert_eq!(Predicate::Raw("a = ? OR b = ?".into()).bind_count(), 2);
        assert_eq!(Predicate::Equality(age(), Operand::Null).bind_count(), 0);
        assert_eq!(
            Predicate::In(
                age(),
                InList::Values(vec![Operand::Bind, Operand::Null, Operand::Bind])
            )
            .bind_count(),
            2
        );
    }

    #[test]
    fn contradictions() {
        assert!(Predicate::Raw("1=0".into()).is_contradiction());
        assert!(Predicate::Raw(" 1 = 0 ".into()).is_contradiction());
        assert!(Predicate::In(age(), InList::Values(vec![])).is_contradiction());
        assert!(!Predicate::NotIn(age(), InList::Values(vec![])).is_contradiction());
        assert!(!Predicate::Raw("age > 3".into()).is_contradiction());
    }
}
