// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use crate::{
    database_error::DatabaseError,
    relation::{JoinSpec, Relation},
    sql::{Column, ConcretePredicate, Join, JoinKind, Table},
};

/// Compute the joins a relation needs on top of `table`: its explicit joins (inner joins for
/// associations, verbatim text for raw joins) followed by left outer joins for eager loaded and
/// referenced included associations. An association is joined at most once.
pub fn compute_join(table: Table, relation: &Relation) -> Result<Table, DatabaseError> {
    let mut joined: Vec<&str> = vec![];
    let mut table = table;

    for spec in relation.join_specs() {
        match spec {
            JoinSpec::Association(name) => {
                if !joined.contains(&name.as_str()) {
                    table = join_association(table, relation, name, JoinKind::Inner)?;
                    joined.push(name.as_str());
                }
            }
            JoinSpec::Raw(fragment) => table = table.raw_join(fragment.clone()),
        }
    }

    for name in outer_joined(relation) {
        if !joined.contains(&name.as_str()) {
            table = join_association(table, relation, name, JoinKind::LeftOuter)?;
            joined.push(name.as_str());
        }
    }

    Ok(table)
}

/// Does [`compute_join`] join anything to the relation's table?
pub(crate) fn has_joins(relation: &Relation) -> bool {
    !relation.join_specs().is_empty() || outer_joined(relation).next().is_some()
}

/// Eager loaded and referenced included associations
fn outer_joined(relation: &Relation) -> impl Iterator<Item = &String> {
    relation.eager_load_values().iter().chain(
        relation
            .includes_values()
            .iter()
            .filter(|name| relation.references_values().contains(*name)),
    )
}

fn join_association(
    table: Table,
    relation: &Relation,
    name: &str,
    kind: JoinKind,
) -> Result<Table, DatabaseError> {
    let entity = relation.entity();
    let association = relation.resolver().resolve(entity, name).ok_or_else(|| {
        DatabaseError::Argument(format!(
            "Association named '{name}' was not found on {}",
            entity.name
        ))
    })?;

    let (owner_column, target_column) = association.join_columns(entity);
    let predicate = ConcretePredicate::Eq(
        Column::physical(owner_column.table, owner_column.name),
        Column::physical(target_column.table, target_column.name),
    );

    Ok(table.join(|left| {
        Join::new(
            left,
            Table::physical(association.target.table.clone()),
            kind,
            predicate,
        )
    }))
}

#[cfg(test)]
mod tests {
    use crate::{sql::ExpressionBuilder, testing::fixtures::BlogFixture};

    use super::*;

    #[test]
    fn association_and_outer_joins() {
        let fixture = BlogFixture::new();
        let authors = fixture
            .authors()
            .joins("posts")
            .includes("avatar")
            .references("avatar")
            .includes("posts");

        assert_binding!(
            compute_join(Table::physical("authors"), &authors)
                .unwrap()
                .to_sql(),
            r#""authors" INNER JOIN "posts" ON "authors"."id" = "posts"."author_id" LEFT OUTER JOIN "avatars" ON "authors"."id" = "avatars"."author_id""#
        );
    }

    #[test]
    fn unknown_association() {
        let fixture = BlogFixture::new();
        let posts = fixture.posts().joins("tags");

        assert!(matches!(
            compute_join(Table::physical("posts"), &posts),
            Err(DatabaseError::Argument(_))
        ));
    }
}
