// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use super::{Relation, bind::Bind, predicate::Predicate, push_unique, where_clause::WhereClause};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlternativeKind {
    /// Rows matching any fragment
    Positive,
    /// Rows matching no fragment
    Negative,
}

/// Extend `context` with the disjunction (or its negation) of the fragments' where clauses.
///
/// Each fragment's predicates are conjoined into one, and the fragments are nested into `Or`s in
/// order. Their binds are appended in the same order so placeholders stay aligned. Joins,
/// includes and references of the fragments are added to the context without duplicates. A null
/// fragment contributes no predicate; a fragment without conditions matches every row.
pub(super) fn combine(
    kind: AlternativeKind,
    context: &Relation,
    fragments: &[Relation],
) -> Relation {
    let mut alternatives: Vec<Predicate> = vec![];
    let mut binds: Vec<Bind> = vec![];
    let mut matches_all = false;

    for fragment in fragments {
        if fragment.is_null() {
            continue;
        }
        match fragment.where_clause().to_predicate() {
            Some(predicate) => {
                alternatives.push(predicate);
                binds.extend(fragment.where_clause().binds().iter().cloned());
            }
            None => matches_all = true,
        }
    }

    let combined = if matches_all {
        match kind {
            // Or-ing with "every row" leaves the context's rows unchanged
            AlternativeKind::Positive => None,
            AlternativeKind::Negative => Some(contradiction()),
        }
    } else {
        match (kind, alternatives.into_iter().reduce(Predicate::or)) {
            (AlternativeKind::Positive, Some(disjunction)) => Some(disjunction),
            // No alternative at all matches nothing
            (AlternativeKind::Positive, None) => Some(contradiction()),
            (AlternativeKind::Negative, Some(disjunction)) => {
                Some(Predicate::Not(Box::new(disjunction)))
            }
            (AlternativeKind::Negative, None) => None,
        }
    };
    if matches_all {
        binds.clear();
    }

    context.edit(|values| {
        if let Some(predicate) = combined {
            let clause = WhereClause::new(vec![predicate], binds);
            values.where_clause = values.where_clause.concat(&clause);
        }

        for fragment in fragments {
            let fragment = fragment.values();
            for join in &fragment.joins {
                push_unique(&mut values.joins, join.clone());
            }
            for name in &fragment.includes {
                push_unique(&mut values.includes, name.clone());
            }
            for name in &fragment.eager_load {
                push_unique(&mut values.eager_load, name.clone());
            }
            for name in &fragment.references {
                push_unique(&mut values.references, name.clone());
            }
        }
    })
}

fn contradiction() -> Predicate {
    Predicate::Raw("1=0".to_string())
}
