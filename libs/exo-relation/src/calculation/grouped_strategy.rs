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
    relation::{GroupKey, UnscopeField},
    transform::select_transformer::{group_key_column, to_select},
};

use super::{
    aggregate_plan::{AggregatePlan, GroupedPlan},
    calculation_strategy::{CalculationContext, CalculationStrategy, aggregate_columns},
};

/// One row per group: the group keys followed by the aggregates. Having, ordering, limit and
/// offset of the relation apply to the groups.
pub(crate) struct GroupedStrategy {}

impl CalculationStrategy for GroupedStrategy {
    fn id(&self) -> &'static str {
        "GroupedStrategy"
    }

    fn suitable(&self, context: &CalculationContext) -> bool {
        !context.relation.group_keys().is_empty()
    }

    fn plan(&self, context: &CalculationContext) -> Result<AggregatePlan, DatabaseError> {
        let relation = context.relation;
        let entity = relation.entity();
        let keys = relation.group_keys();

        let owner = match keys {
            [GroupKey::Association(name)] => relation.resolver().resolve(entity, name),
            _ if keys.iter().any(|k| matches!(k, GroupKey::Association(_))) => {
                return Err(DatabaseError::Argument(format!(
                    "Grouping {} by an association requires it to be the only group key",
                    entity.name
                )));
            }
            _ => None,
        };

        let mut key_columns = vec![];
        let mut key_aliases = vec![];
        for key in keys {
            let alias = context.connection.table_alias_for(&match key {
                GroupKey::Column(column) if column.table == entity.table => column.name.clone(),
                GroupKey::Column(column) => format!("{}_{}", column.table, column.name),
                GroupKey::Raw(text) => text.clone(),
                GroupKey::Association(_) => group_key_column(relation, key)?.output_name(),
            });
            key_columns.push(group_key_column(relation, key)?.aliased(alias.clone()));
            key_aliases.push(alias);
        }

        let (aggregates, aliases) = aggregate_columns(context);

        let mut select = to_select(&relation.unscope(&[
            UnscopeField::Select,
            UnscopeField::Lock,
            UnscopeField::Distinct,
        ]))?;
        select.columns = key_columns.into_iter().chain(aggregates).collect();

        Ok(AggregatePlan::Grouped(GroupedPlan {
            select,
            key_aliases,
            aliases,
            columns: context.columns.clone(),
            owner,
        }))
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        calculation::operation::{AggregateColumn, Operation},
        relation::{Condition, Relation},
        sql::ExpressionBuilder,
        testing::{MemoryConnection, fixtures::BlogFixture},
    };

    use super::*;

    fn grouped_plan(
        relation: &Relation,
        operation: Operation,
        column: &str,
    ) -> Result<AggregatePlan, DatabaseError> {
        let connection = MemoryConnection::new();
        let context = CalculationContext {
            relation,
            operation,
            columns: vec![AggregateColumn::resolve(relation, column)],
            connection: &connection,
        };
        GroupedStrategy {}.plan(&context)
    }

    #[test]
    fn group_by_column_with_having() {
        let fixture = BlogFixture::new();
        let posts = fixture
            .posts()
            .group(&["state"])
            .having(Condition::sql_with_binds("COUNT(*) > ?", vec![1.into()]))
            .unwrap()
            .order_raw("count_all DESC")
            .limit(5);

        let AggregatePlan::Grouped(plan) = grouped_plan(&posts, Operation::Count, "all").unwrap()
        else {
            panic!("expected a grouped plan");
        };
        assert_eq!(plan.key_aliases, vec!["state"]);
        assert_eq!(plan.owner, None);
        assert_binding!(
            plan.select.to_sql(),
            r#"SELECT "posts"."state" AS "state", COUNT(*) AS "count_all" FROM "posts" GROUP BY "posts"."state" HAVING COUNT(*) > $1 ORDER BY count_all DESC LIMIT $2"#,
            1,
            5
        );
    }

    #[test]
    fn group_by_association() {
        let fixture = BlogFixture::new();
        let posts = fixture.posts().group(&["author"]);

        let AggregatePlan::Grouped(plan) = grouped_plan(&posts, Operation::Sum, "score").unwrap()
        else {
            panic!("expected a grouped plan");
        };
        assert_eq!(plan.key_aliases, vec!["author_id"]);
        assert_eq!(plan.owner.map(|a| a.name), Some("author".to_string()));
        assert_binding!(
            plan.select.to_sql(),
            r#"SELECT "posts"."author_id" AS "author_id", SUM("posts"."score") AS "sum_score" FROM "posts" GROUP BY "posts"."author_id""#
        );
    }

    #[test]
    fn association_must_be_the_only_key() {
        let fixture = BlogFixture::new();
        let posts = fixture.posts().group(&["author", "state"]);

        assert!(matches!(
            grouped_plan(&posts, Operation::Count, "all"),
            Err(DatabaseError::Argument(_))
        ));
    }
}
