// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use tracing::instrument;

use crate::{
    database_error::DatabaseError,
    relation::{AssociationKind, FromClause, GroupKey, OrderSpec, Projection, Relation},
    sql::{Column, GroupBy, Limit, Offset, OrderBy, OrderByElement, Select, Table},
};

use super::{join_util::compute_join, predicate_transformer::to_concrete_predicate};

/// Lower a relation into a select of its rows.
#[instrument(name = "select_transformer::to_select", level = "trace", skip_all)]
pub(crate) fn to_select(relation: &Relation) -> Result<Select, DatabaseError> {
    let (table, star) = base_table(relation)?;
    let table = compute_join(table, relation)?;

    let columns = if relation.projections().is_empty() {
        vec![Column::Star(star)]
    } else {
        relation.projections().iter().map(projection_column).collect()
    };

    let group_by = if relation.group_keys().is_empty() {
        None
    } else {
        Some(GroupBy(
            relation
                .group_keys()
                .iter()
                .map(|key| group_key_column(relation, key))
                .collect::<Result<_, _>>()?,
        ))
    };

    Ok(Select {
        table,
        columns,
        distinct: relation.is_distinct(),
        predicate: to_concrete_predicate(relation.where_clause())?,
        group_by,
        having: to_concrete_predicate(relation.having_clause())?,
        order_by: to_order_by(relation.order_specs()),
        limit: relation.limit_value().map(Limit),
        offset: relation.offset_value().map(Offset),
        lock: relation.lock_value().map(|lock| lock.to_sql()),
    })
}

/// The FROM table (before joins) and the table whose columns `*` stands for
fn base_table(relation: &Relation) -> Result<(Table, Option<String>), DatabaseError> {
    Ok(match relation.from_value() {
        None => {
            let table = relation.entity().table.clone();
            (Table::physical(table.clone()), Some(table))
        }
        Some(FromClause::Raw(text)) => (Table::Raw(text.clone()), None),
        Some(FromClause::Subquery { relation, alias }) => (
            Table::sub_select(to_select(relation)?, alias.clone()),
            Some(alias.clone()),
        ),
    })
}

pub(crate) fn projection_column(projection: &Projection) -> Column {
    match projection {
        Projection::Column(column) => Column::physical(column.table.clone(), column.name.clone()),
        Projection::Raw(text) => Column::Raw(text.clone()),
    }
}

/// The column a group key groups by. Associations group by their foreign key.
pub(crate) fn group_key_column(
    relation: &Relation,
    key: &GroupKey,
) -> Result<Column, DatabaseError> {
    match key {
        GroupKey::Column(column) => Ok(Column::physical(column.table.clone(), column.name.clone())),
        GroupKey::Raw(text) => Ok(Column::Raw(text.clone())),
        GroupKey::Association(name) => {
            let entity = relation.entity();
            match relation.resolver().resolve(entity, name) {
                Some(association) if association.kind == AssociationKind::BelongsTo => Ok(
                    Column::physical(entity.table.clone(), association.foreign_key.clone()),
                ),
                Some(_) => Err(DatabaseError::Argument(format!(
                    "Cannot group {} by {name}: only belongs-to associations can be grouped by",
                    entity.name
                ))),
                None => Err(DatabaseError::Argument(format!(
                    "Association named '{name}' was not found on {}",
                    entity.name
                ))),
            }
        }
    }
}

pub(crate) fn to_order_by(specs: &[OrderSpec]) -> Option<OrderBy> {
    if specs.is_empty() {
        return None;
    }

    Some(OrderBy(
        specs
            .iter()
            .map(|spec| match spec {
                OrderSpec::Column(column, ordering) => OrderByElement::Expr(
                    Column::physical(column.table.clone(), column.name.clone()),
                    *ordering,
                ),
                OrderSpec::Raw(text) => OrderByElement::Raw(text.clone()),
            })
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use crate::{
        relation::{AttributeMap, Condition, LockMode},
        sql::{ExpressionBuilder, Ordering},
        testing::fixtures::BlogFixture,
    };

    use super::*;

    #[test]
    fn default_projection() {
        let fixture = BlogFixture::new();

        assert_binding!(
            to_select(&fixture.posts()).unwrap().to_sql(),
            r#"SELECT "posts".* FROM "posts""#
        );
    }

    #[test]
    fn all_clauses() {
        let fixture = BlogFixture::new();
        let posts = fixture
            .posts()
            .joins("author")
            .filter(AttributeMap::new().with("author", AttributeMap::new().with("name", "Sam")))
            .unwrap()
            .select(&["id", "title"])
            .distinct()
            .order("title", Ordering::Asc)
            .limit(10)
            .offset(5)
            .lock(LockMode::Update);

        assert_binding!(
            to_select(&posts).unwrap().to_sql(),
            r#"SELECT DISTINCT "posts"."id", "posts"."title" FROM "posts" INNER JOIN "authors" ON "posts"."author_id" = "authors"."id" WHERE "authors"."name" = $1 ORDER BY "posts"."title" ASC LIMIT $2 OFFSET $3 FOR UPDATE"#,
            "Sam",
            10,
            5
        );
    }

    #[test]
    fn grouping_and_having() {
        let fixture = BlogFixture::new();
        let posts = fixture
            .posts()
            .select(&["author_id", "count(*)"])
            .group(&["author"])
            .having(Condition::sql_with_binds("count(*) > ?", vec![2.into()]))
            .unwrap();

        assert_binding!(
            to_select(&posts).unwrap().to_sql(),
            r#"SELECT "posts"."author_id", count(*) FROM "posts" GROUP BY "posts"."author_id" HAVING count(*) > $1"#,
            2
        );
    }

    #[test]
    fn subquery_predicates_carry_their_own_binds() {
        let fixture = BlogFixture::new();
        let adults = fixture
            .authors()
            .filter(Condition::sql_with_binds("authors.age >= ?", vec![18.into()]))
            .unwrap();
        let posts = fixture
            .posts()
            .filter(AttributeMap::new().with("state", "published"))
            .unwrap()
            .filter(AttributeMap::new().with("author_id", adults))
            .unwrap();

        assert_binding!(
            to_select(&posts).unwrap().to_sql(),
            r#"SELECT "posts".* FROM "posts" WHERE ("posts"."state" = $1 AND "posts"."author_id" IN (SELECT "authors"."id" FROM "authors" WHERE authors.age >= $2))"#,
            "published",
            18
        );
    }

    #[test]
    fn from_subquery() {
        let fixture = BlogFixture::new();
        let recent = fixture.posts().order("id", Ordering::Desc).limit(3);
        let posts = fixture.posts().from(FromClause::Subquery {
            relation: Box::new(recent),
            alias: "posts".into(),
        });

        assert_binding!(
            to_select(&posts).unwrap().to_sql(),
            r#"SELECT "posts".* FROM (SELECT "posts".* FROM "posts" ORDER BY "posts"."id" DESC LIMIT $1) AS "posts""#,
            3
        );
    }

    #[test]
    fn grouping_by_has_many_is_rejected() {
        let fixture = BlogFixture::new();
        let authors = fixture.authors().group(&["posts"]);

        assert!(matches!(
            to_select(&authors),
            Err(DatabaseError::Argument(_))
        ));
    }
}
