// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::HashSet;

use indexmap::IndexMap;

use crate::sql::SQLValue;

use super::{
    bind::Bind,
    predicate::{ColumnRef, Operand, Predicate},
};

/// An ordered list of predicates (implicitly conjoined) and the binds for their placeholders.
///
/// The binds are aligned with the predicates: predicate `i` consumes the
/// `predicates[i].bind_count()` binds following those of predicates `0..i`. Every operation here
/// keeps that alignment.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WhereClause {
    predicates: Vec<Predicate>,
    binds: Vec<Bind>,
}

impl WhereClause {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(predicates: Vec<Predicate>, binds: Vec<Bind>) -> Self {
        Self { predicates, binds }
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn binds(&self) -> &[Bind] {
        &self.binds
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Each predicate paired with the binds it consumes
    pub fn aligned(&self) -> impl Iterator<Item = (&Predicate, &[Bind])> {
        let mut offset = 0;
        self.predicates.iter().map(move |predicate| {
            let start = offset.min(self.binds.len());
            offset += predicate.bind_count();
            let end = offset.min(self.binds.len());
            (predicate, &self.binds[start..end])
        })
    }

    /// Both clauses, `other` after `self`
    pub fn concat(&self, other: &WhereClause) -> WhereClause {
        let mut predicates = self.predicates.clone();
        predicates.extend(other.predicates.iter().cloned());
        let mut binds = self.binds.clone();
        binds.extend(other.binds.iter().cloned());
        WhereClause { predicates, binds }
    }

    /// Combine with `incoming`, letting its equalities replace ours on the same column. All other
    /// predicates of both sides are kept.
    pub fn merge(&self, incoming: &WhereClause) -> WhereClause {
        let overridden: HashSet<&ColumnRef> = incoming
            .predicates
            .iter()
            .filter_map(Predicate::equality_column)
            .collect();

        self.retain(|predicate| {
            predicate
                .equality_column()
                .is_none_or(|column| !overridden.contains(column))
        })
        .concat(incoming)
    }

    /// Negate every predicate. Binds are untouched since only operators change.
    pub fn invert(&self) -> WhereClause {
        WhereClause {
            predicates: self
                .predicates
                .iter()
                .cloned()
                .map(Predicate::invert)
                .collect(),
            binds: self.binds.clone(),
        }
    }

    /// Drop every predicate constraining one of `columns`, together with its binds
    pub fn except_columns(&self, columns: &[&ColumnRef]) -> WhereClause {
        self.retain(|predicate| {
            !predicate
                .referenced_columns()
                .iter()
                .any(|column| columns.contains(column))
        })
    }

    /// Keep the predicates matching `keep`, dropping the binds of the others
    fn retain(&self, keep: impl Fn(&Predicate) -> bool) -> WhereClause {
        let mut predicates = vec![];
        let mut binds = vec![];

        for (predicate, predicate_binds) in self.aligned() {
            if keep(predicate) {
                predicates.push(predicate.clone());
                binds.extend(predicate_binds.iter().cloned());
            }
        }

        WhereClause { predicates, binds }
    }

    /// A single predicate standing for the whole clause, `None` if it has none
    pub fn to_predicate(&self) -> Option<Predicate> {
        Predicate::conjoin(self.predicates.iter().cloned())
    }

    /// Values fixed by an equality on a column of `table`, keyed by column name
    pub fn equalities(&self, table: &str) -> IndexMap<String, SQLValue> {
        self.aligned()
            .filter_map(|(predicate, binds)| match predicate {
                Predicate::Equality(column, operand) if column.table == table => {
                    let value = match operand {
                        Operand::Bind => binds.first()?.value.clone(),
                        Operand::Null => SQLValue::Null,
                        Operand::Column(_) => return None,
                    };
                    Some((column.name.clone(), value))
                }
                _ => None,
            })
            .collect()
    }

    /// Is any predicate known to match no row?
    pub fn is_contradiction(&self) -> bool {
        self.predicates.iter().any(Predicate::is_contradiction)
    }

    /// The number of binds the predicates consume. Equal to `binds().len()` for well-formed
    /// clauses.
    pub fn expected_bind_count(&self) -> usize {
        self.predicates.iter().map(Predicate::bind_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use crate::relation::predicate::ComparisonOp;

    use super::*;

    fn column(name: &str) -> ColumnRef {
        ColumnRef::new("posts", name)
    }

    fn equality(name: &str, value: impl Into<SQLValue>) -> WhereClause {
        WhereClause::new(
            vec![Predicate::Equality(column(name), Operand::Bind)],
            vec![Bind::new(column(name), value, None)],
        )
    }

    fn greater(name: &str, value: impl Into<SQLValue>) -> WhereClause {
        WhereClause::new(
            vec![Predicate::Comparison(
                column(name),
                ComparisonOp::Gt,
                Operand::Bind,
            )],
            vec![Bind::new(column(name), value, None)],
        )
    }

    #[test]
    fn incoming_equality_overwrites() {
        let base = equality("state", "draft").concat(&equality("author_id", 1));
        let merged = base.merge(&equality("state", "published"));

        assert_eq!(
            merged.predicates(),
            &[
                Predicate::Equality(column("author_id"), Operand::Bind),
                Predicate::Equality(column("state"), Operand::Bind),
            ]
        );
        let values: Vec<_> = merged.binds().iter().map(|b| b.value.clone()).collect();
        assert_eq!(values, vec![SQLValue::from(1), SQLValue::from("published")]);
    }

    #[test]
    fn other_predicates_are_kept() {
        let merged = greater("score", 5).merge(&equality("score", 10));

        assert_eq!(merged.predicates().len(), 2);
        assert_eq!(merged.binds().len(), 2);
    }

    #[test]
    fn binds_stay_aligned_when_dropping_after_a_raw_fragment() {
        let base = WhereClause::new(
            vec![Predicate::Raw("a = ? AND b = ?".into())],
            vec![Bind::positional(1), Bind::positional(2)],
        )
        .concat(&equality("state", "draft"))
        .concat(&greater("score", 3));

        let merged = base.merge(&equality("state", "published"));
        let values: Vec<_> = merged.binds().iter().map(|b| b.value.clone()).collect();

        assert_eq!(
            values,
            vec![
                SQLValue::from(1),
                SQLValue::from(2),
                SQLValue::from(3),
                SQLValue::from("published")
            ]
        );
        assert_eq!(merged.expected_bind_count(), merged.binds().len());
    }

    #[test]
    fn merging_empty_is_identity() {
        let base = equality("state", "draft").concat(&greater("score", 3));
        assert_eq!(base.merge(&WhereClause::empty()), base);
    }

    #[test]
    fn inversion_keeps_binds() {
        let clause = equality("state", "draft");
        let inverted = clause.invert();

        assert_eq!(
            inverted.predicates(),
            &[Predicate::NotEqual(column("state"), Operand::Bind)]
        );
        assert_eq!(inverted.binds(), clause.binds());
    }

    #[test]
    fn except_columns_drops_every_kind() {
        let clause = greater("score", 3)
            .concat(&equality("score", 4))
            .concat(&equality("state", "draft"));
        let score = column("score");
        let rest = clause.except_columns(&[&score]);

        assert_eq!(rest, equality("state", "draft"));
    }

    #[test]
    fn equalities_read_bound_values() {
        let clause = equality("state", "draft")
            .concat(&greater("score", 3))
            .concat(&WhereClause::new(
                vec![Predicate::Equality(column("deleted_at"), Operand::Null)],
                vec![],
            ));
        let values = clause.equalities("posts");

        assert_eq!(values.get("state"), Some(&SQLValue::from("draft")));
        assert_eq!(values.get("deleted_at"), Some(&SQLValue::Null));
        assert!(!values.contains_key("score"));
    }
}
