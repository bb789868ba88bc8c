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
    sql::{Column, Select, Table},
    transform::select_transformer::to_select,
};

use super::{
    aggregate_plan::{AggregatePlan, ScalarPlan},
    calculation_strategy::{CalculationContext, CalculationStrategy, aggregated_expression},
    operation::AggregateColumn,
};

/// Aggregate over a limited (or offset) relation. The relation, restricted to the aggregated
/// columns, becomes a sub-query so that the aggregate sees exactly the limited rows:
///
/// ```sql
/// SELECT SUM("subquery_for_sum"."value") AS "sum_value"
/// FROM (SELECT "items"."value" AS "value" FROM "items" ORDER BY ... LIMIT $1) AS "subquery_for_sum"
/// ```
pub(crate) struct SubQueryStrategy {}

impl CalculationStrategy for SubQueryStrategy {
    fn id(&self) -> &'static str {
        "SubQueryStrategy"
    }

    fn suitable(&self, context: &CalculationContext) -> bool {
        let relation = context.relation;
        relation.group_keys().is_empty()
            && (relation.limit_value().is_some() || relation.offset_value().is_some())
    }

    fn plan(&self, context: &CalculationContext) -> Result<AggregatePlan, DatabaseError> {
        let subquery_alias = format!("subquery_for_{}", context.operation.name());

        let mut inner_columns: Vec<Column> = vec![];
        let mut inner_names: Vec<String> = vec![];
        let mut outer_columns = vec![];
        let mut aliases = vec![];

        for column in &context.columns {
            let (inner_name, inner_column) = match column {
                AggregateColumn::All => ("one".to_string(), Column::Raw("1".to_string())),
                _ => (
                    context.connection.table_alias_for(column.alias_name()),
                    aggregated_expression(column),
                ),
            };
            if !inner_names.contains(&inner_name) {
                inner_columns.push(inner_column.aliased(inner_name.clone()));
                inner_names.push(inner_name.clone());
            }

            let argument = match column {
                AggregateColumn::All => Column::Star(None),
                _ => Column::physical(subquery_alias.clone(), inner_name),
            };
            let alias = context.aggregate_alias(column);
            outer_columns.push(
                Column::function(context.operation.function(), false, argument)
                    .aliased(alias.clone()),
            );
            aliases.push(alias);
        }

        let mut inner = to_select(context.relation)?;
        inner.columns = inner_columns;
        inner.lock = None;

        Ok(AggregatePlan::SubQuery(ScalarPlan {
            select: Select::new(Table::sub_select(inner, subquery_alias), outer_columns),
            aliases,
            columns: context.columns.clone(),
        }))
    }
}
