// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use super::{
    ExpressionBuilder, SQLBuilder, column::Column, group_by::GroupBy, limit::Limit,
    offset::Offset, order::OrderBy, predicate::ConcretePredicate, table::Table,
};

/// A select statement
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    /// The table to select from
    pub table: Table,
    /// The columns to select
    pub columns: Vec<Column>,
    /// Whether to select only distinct rows
    pub distinct: bool,
    /// The predicate to filter the rows
    pub predicate: ConcretePredicate,
    /// The group by clause
    pub group_by: Option<GroupBy>,
    /// The predicate to filter groups
    pub having: ConcretePredicate,
    /// The order by clause
    pub order_by: Option<OrderBy>,
    /// The limit clause
    pub limit: Option<Limit>,
    /// The offset clause
    pub offset: Option<Offset>,
    /// A row-locking suffix such as `FOR UPDATE`
    pub lock: Option<String>,
}

impl Select {
    /// A plain `SELECT <columns> FROM <table>` to be refined by setting the remaining fields
    pub fn new(table: Table, columns: Vec<Column>) -> Self {
        Self {
            table,
            columns,
            distinct: false,
            predicate: ConcretePredicate::True,
            group_by: None,
            having: ConcretePredicate::True,
            order_by: None,
            limit: None,
            offset: None,
            lock: None,
        }
    }
}

impl ExpressionBuilder for Select {
    fn build(&self, builder: &mut SQLBuilder) {
        builder.push_str("SELECT ");
        if self.distinct {
            builder.push_str("DISTINCT ");
        }
        builder.push_elems(&self.columns, ", ");

        builder.push_str(" FROM ");
        self.table.build(builder);

        // Avoid correct, but inelegant "WHERE TRUE" clause
        if self.predicate != ConcretePredicate::True {
            builder.push_str(" WHERE ");
            self.predicate.build(builder);
        }
        if let Some(group_by) = &self.group_by {
            builder.push_space();
            group_by.build(builder);
        }
        if self.having != ConcretePredicate::True {
            builder.push_str(" HAVING ");
            self.having.build(builder);
        }
        if let Some(order_by) = &self.order_by {
            builder.push_space();
            order_by.build(builder);
        }
        if let Some(limit) = &self.limit {
            builder.push_space();
            limit.build(builder);
        }
        if let Some(offset) = &self.offset {
            builder.push_space();
            offset.build(builder);
        }
        if let Some(lock) = &self.lock {
            builder.push_space();
            builder.push_str(lock);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::sql::{
        function::Function,
        order::{OrderByElement, Ordering},
    };

    use super::*;

    #[test]
    fn full_select() {
        let select = Select {
            predicate: ConcretePredicate::Gt(
                Column::physical("posts", "score"),
                Column::Param(3.into()),
            ),
            order_by: Some(OrderBy(vec![OrderByElement::Expr(
                Column::physical("posts", "id"),
                Ordering::Asc,
            )])),
            limit: Some(Limit(10)),
            offset: Some(Offset(20)),
            lock: Some("FOR UPDATE".into()),
            ..Select::new(
                Table::physical("posts"),
                vec![Column::Star(Some("posts".into()))],
            )
        };

        assert_binding!(
            select.to_sql(),
            r#"SELECT "posts".* FROM "posts" WHERE "posts"."score" > $1 ORDER BY "posts"."id" ASC LIMIT $2 OFFSET $3 FOR UPDATE"#,
            3,
            10,
            20
        );
    }

    #[test]
    fn grouped_select() {
        let author = Column::physical("posts", "author_id");
        let count = Column::function(Function::Count, false, Column::Star(None));
        let select = Select {
            group_by: Some(GroupBy(vec![author.clone()])),
            having: ConcretePredicate::Gt(count.clone(), Column::Param(1.into())),
            ..Select::new(
                Table::physical("posts"),
                vec![author.aliased("author_id"), count.aliased("count_all")],
            )
        };

        assert_binding!(
            select.to_sql(),
            r#"SELECT "posts"."author_id" AS "author_id", COUNT(*) AS "count_all" FROM "posts" GROUP BY "posts"."author_id" HAVING COUNT(*) > $1"#,
            1
        );
    }

    #[test]
    fn aggregate_over_sub_select() {
        let inner = Select {
            limit: Some(Limit(10)),
            ..Select::new(
                Table::physical("items"),
                vec![Column::physical("items", "value").aliased("value")],
            )
        };
        let outer = Select::new(
            Table::sub_select(inner, "subquery_for_sum"),
            vec![Column::function(
                Function::Sum,
                false,
                Column::physical("subquery_for_sum", "value"),
            )],
        );

        assert_binding!(
            outer.to_sql(),
            r#"SELECT SUM("subquery_for_sum"."value") FROM (SELECT "items"."value" AS "value" FROM "items" LIMIT $1) AS "subquery_for_sum""#,
            10
        );
    }
}
