// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use tracing::warn;

use super::{JoinSpec, Relation, RelationValues, push_unique};

/// Combines two relations into one.
///
/// Single-valued parts (limit, offset, lock, from, distinct) are taken from `other` only when the
/// relation leaves them unset. Multi-valued parts (projections, group keys, orderings, extension
/// tags, joins, includes) are concatenated with duplicates removed, unless `other` reordered, in
/// which case its ordering replaces ours. Where and having clauses merge with
/// [`WhereClause::merge`](super::WhereClause::merge), letting `other`'s equalities win.
pub struct Merger<'a> {
    relation: &'a Relation,
    other: &'a Relation,
}

impl<'a> Merger<'a> {
    pub fn new(relation: &'a Relation, other: &'a Relation) -> Self {
        Self { relation, other }
    }

    pub fn merge(self) -> Relation {
        // A relation known to be empty contributes nothing
        if self.other.is_null() {
            return self.relation.clone();
        }
        if self.relation.is_null() {
            return self.other.clone();
        }

        let other = self.other.values();
        let joins = self.merged_joins();

        self.relation.edit(|values| {
            merge_single_values(values, other);
            merge_multi_values(values, other);

            values.where_clause = values.where_clause.merge(&other.where_clause);
            values.having_clause = values.having_clause.merge(&other.having_clause);

            for join in joins {
                push_unique(&mut values.joins, join);
            }
        })
    }

    /// Joins of `other` to add. Association joins of a relation over another entity only mean
    /// something if the association also exists on ours.
    fn merged_joins(&self) -> Vec<JoinSpec> {
        let other_joins = self.other.join_specs();

        if self.relation.entity() == self.other.entity() {
            return other_joins.to_vec();
        }

        other_joins
            .iter()
            .filter(|join| match join {
                JoinSpec::Association(name) => {
                    let resolved = self
                        .relation
                        .resolver()
                        .resolve(self.relation.entity(), name)
                        .is_some();
                    if !resolved {
                        warn!(
                            "Dropping join {} merged from {} into {}: no such association",
                            name,
                            self.other.entity().name,
                            self.relation.entity().name
                        );
                    }
                    resolved
                }
                JoinSpec::Raw(_) => true,
            })
            .cloned()
            .collect()
    }
}

fn merge_single_values(values: &mut RelationValues, other: &RelationValues) {
    if values.limit.is_none() {
        values.limit = other.limit;
    }
    if values.offset.is_none() {
        values.offset = other.offset;
    }
    if values.lock.is_none() {
        values.lock = other.lock.clone();
    }
    if values.from.is_none() {
        values.from = other.from.clone();
    }
    values.distinct = values.distinct || other.distinct;
}

fn merge_multi_values(values: &mut RelationValues, other: &RelationValues) {
    for projection in &other.projections {
        push_unique(&mut values.projections, projection.clone());
    }
    for key in &other.group_keys {
        push_unique(&mut values.group_keys, key.clone());
    }
    for tag in &other.extensions {
        push_unique(&mut values.extensions, tag.clone());
    }
    for name in &other.includes {
        push_unique(&mut values.includes, name.clone());
    }
    for name in &other.eager_load {
        push_unique(&mut values.eager_load, name.clone());
    }
    for name in &other.references {
        push_unique(&mut values.references, name.clone());
    }

    if other.reordering {
        values.order = other.order.clone();
        values.reordering = true;
    } else {
        for spec in &other.order {
            push_unique(&mut values.order, spec.clone());
        }
    }
}
