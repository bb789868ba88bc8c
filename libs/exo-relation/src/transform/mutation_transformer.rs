// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use indexmap::IndexMap;

use crate::{
    database_error::DatabaseError,
    relation::{Bind, Projection, Relation, UnscopeField},
    sql::{Column, ConcretePredicate, Delete, Insert, SQLValue, Update},
};

use super::{
    join_util::has_joins, predicate_transformer::to_concrete_predicate,
    select_transformer::to_select,
};

/// Lower a relation and column assignments into an update of the matching rows.
///
/// Relations that a single `UPDATE ... WHERE` cannot express (joins, ordering, limits, grouping,
/// distinct or a FROM override) update the rows whose identity is selected by the relation.
pub(crate) fn to_update(
    relation: &Relation,
    assignments: &[(&str, SQLValue)],
) -> Result<Update, DatabaseError> {
    if assignments.is_empty() {
        return Err(DatabaseError::Argument(
            "Empty list of attributes to change".to_string(),
        ));
    }

    let values = relation.values();
    let needs_subselect = has_joins(relation)
        || !values.order.is_empty()
        || values.limit.is_some()
        || values.offset.is_some()
        || !values.group_keys.is_empty()
        || !values.having_clause.is_empty()
        || values.distinct
        || values.from.is_some();

    let column_values = assignments
        .iter()
        .map(|(name, value)| Ok((name.to_string(), Column::Param(cast(relation, name, value)?))))
        .collect::<Result<Vec<_>, DatabaseError>>()?;

    Ok(Update {
        table: relation.entity().table.clone(),
        predicate: mutation_predicate(relation, needs_subselect)?,
        column_values,
    })
}

/// Lower a relation into a delete of the matching rows.
pub(crate) fn to_delete(relation: &Relation) -> Result<Delete, DatabaseError> {
    let values = relation.values();

    let invalid: Vec<&str> = [
        ("limit", values.limit.is_some()),
        ("offset", values.offset.is_some()),
        ("distinct", values.distinct),
        ("group", !values.group_keys.is_empty()),
        ("having", !values.having_clause.is_empty()),
    ]
    .into_iter()
    .filter_map(|(name, present)| present.then_some(name))
    .collect();

    if !invalid.is_empty() {
        return Err(DatabaseError::InvalidOptionCombination(format!(
            "delete_all doesn't support {}",
            invalid.join(", ")
        )));
    }

    let needs_subselect = has_joins(relation) || values.from.is_some();

    Ok(Delete {
        table: relation.entity().table.clone(),
        predicate: mutation_predicate(relation, needs_subselect)?,
    })
}

/// Lower attribute values into an insert returning the new identity. Equality conditions of the
/// relation supply defaults for attributes not given.
pub(crate) fn to_insert(
    relation: &Relation,
    attributes: &[(&str, SQLValue)],
) -> Result<Insert, DatabaseError> {
    let mut row: IndexMap<String, SQLValue> = relation.scope_for_create();
    for (name, value) in attributes {
        row.insert(name.to_string(), value.clone());
    }

    let mut columns = Vec::with_capacity(row.len());
    let mut values = Vec::with_capacity(row.len());
    for (name, value) in &row {
        values.push(Column::Param(cast(relation, name, value)?));
        columns.push(name.clone());
    }

    let entity = relation.entity();
    Ok(Insert {
        table: entity.table.clone(),
        columns,
        values,
        returning: vec![Column::physical(
            entity.table.clone(),
            entity.primary_key.clone(),
        )],
    })
}

fn cast(relation: &Relation, name: &str, value: &SQLValue) -> Result<SQLValue, DatabaseError> {
    let entity = relation.entity();
    let typ = entity.attribute_type(name).ok_or_else(|| {
        DatabaseError::Argument(format!("Unknown attribute '{name}' for {}", entity.name))
    })?;

    Ok(Bind::new(entity.column(name), value.clone(), Some(typ)).cast_value())
}

fn mutation_predicate(
    relation: &Relation,
    needs_subselect: bool,
) -> Result<ConcretePredicate, DatabaseError> {
    if !needs_subselect {
        return to_concrete_predicate(relation.where_clause());
    }

    let primary_key = relation.entity().primary_key_column();
    let identities = relation
        .unscope(&[UnscopeField::Select, UnscopeField::Lock])
        .select_projections(vec![Projection::Column(primary_key.clone())]);

    Ok(ConcretePredicate::InSelect(
        Column::physical(primary_key.table, primary_key.name),
        Box::new(to_select(&identities)?),
    ))
}

#[cfg(test)]
mod tests {
    use crate::{
        relation::{AttributeMap, Condition},
        sql::{ExpressionBuilder, Ordering},
        testing::fixtures::BlogFixture,
    };

    use super::*;

    #[test]
    fn simple_update() {
        let fixture = BlogFixture::new();
        let posts = fixture
            .posts()
            .filter(AttributeMap::new().with("state", "draft"))
            .unwrap();

        assert_binding!(
            to_update(&posts, &[("score", "7".into())]).unwrap().to_sql(),
            r#"UPDATE "posts" SET "score" = $1 WHERE "posts"."state" = $2"#,
            7,
            "draft"
        );
    }

    #[test]
    fn update_with_limit_goes_through_identities() {
        let fixture = BlogFixture::new();
        let posts = fixture.posts().order("score", Ordering::Desc).limit(2);

        assert_binding!(
            to_update(&posts, &[("state", "featured".into())])
                .unwrap()
                .to_sql(),
            r#"UPDATE "posts" SET "state" = $1 WHERE "posts"."id" IN (SELECT "posts"."id" FROM "posts" ORDER BY "posts"."score" DESC LIMIT $2)"#,
            "featured",
            2
        );
    }

    #[test]
    fn update_requires_assignments() {
        let fixture = BlogFixture::new();

        assert!(matches!(
            to_update(&fixture.posts(), &[]),
            Err(DatabaseError::Argument(_))
        ));
        assert!(matches!(
            to_update(&fixture.posts(), &[("missing", 1.into())]),
            Err(DatabaseError::Argument(_))
        ));
    }

    #[test]
    fn delete_through_join() {
        let fixture = BlogFixture::new();
        let posts = fixture
            .posts()
            .joins("author")
            .filter(Condition::sql_with_binds("authors.age < ?", vec![18.into()]))
            .unwrap();

        assert_binding!(
            to_delete(&posts).unwrap().to_sql(),
            r#"DELETE FROM "posts" WHERE "posts"."id" IN (SELECT "posts"."id" FROM "posts" INNER JOIN "authors" ON "posts"."author_id" = "authors"."id" WHERE authors.age < $1)"#,
            18
        );
    }

    #[test]
    fn mutations_through_referenced_include() {
        let fixture = BlogFixture::new();
        let posts = fixture
            .posts()
            .includes("author")
            .references("author")
            .filter(Condition::sql_with_binds("authors.name = ?", vec!["Grace".into()]))
            .unwrap();

        assert_binding!(
            to_update(&posts, &[("score", 0.into())]).unwrap().to_sql(),
            r#"UPDATE "posts" SET "score" = $1 WHERE "posts"."id" IN (SELECT "posts"."id" FROM "posts" LEFT OUTER JOIN "authors" ON "posts"."author_id" = "authors"."id" WHERE authors.name = $2)"#,
            0,
            "Grace"
        );
        assert_binding!(
            to_delete(&posts).unwrap().to_sql(),
            r#"DELETE FROM "posts" WHERE "posts"."id" IN (SELECT "posts"."id" FROM "posts" LEFT OUTER JOIN "authors" ON "posts"."author_id" = "authors"."id" WHERE authors.name = $1)"#,
            "Grace"
        );
    }

    #[test]
    fn unreferenced_include_is_not_joined() {
        let fixture = BlogFixture::new();
        let posts = fixture.posts().includes("author");

        assert_binding!(
            to_delete(&posts).unwrap().to_sql(),
            r#"DELETE FROM "posts""#
        );
    }

    #[test]
    fn delete_rejects_limits() {
        let fixture = BlogFixture::new();

        let err = to_delete(&fixture.posts().limit(3).distinct()).unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidOptionCombination(_)));
        assert!(err.to_string().contains("limit, distinct"));
    }

    #[test]
    fn insert_uses_scope_defaults() {
        let fixture = BlogFixture::new();
        let posts = fixture
            .posts()
            .filter(AttributeMap::new().with("state", "draft").with("author_id", 3))
            .unwrap();

        assert_binding!(
            to_insert(&posts, &[("title", "Hello".into()), ("author_id", 4.into())])
                .unwrap()
                .to_sql(),
            r#"INSERT INTO "posts" ("state", "author_id", "title") VALUES ($1, $2, $3) RETURNING "id""#,
            "draft",
            4,
            "Hello"
        );
    }
}
