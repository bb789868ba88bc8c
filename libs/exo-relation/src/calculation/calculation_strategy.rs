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
    relation::Relation,
    sql::{Column, connect::connection::Connection},
};

use super::{
    aggregate_plan::AggregatePlan,
    operation::{AggregateColumn, Operation},
};

/// What a calculation strategy plans for
pub(crate) struct CalculationContext<'a> {
    pub relation: &'a Relation,
    pub operation: Operation,
    pub columns: Vec<AggregateColumn>,
    /// Supplies aliases
    pub connection: &'a dyn Connection,
}

impl CalculationContext<'_> {
    /// The alias of the aggregate over `column` (`count_all`, `sum_score`)
    pub fn aggregate_alias(&self, column: &AggregateColumn) -> String {
        self.connection.table_alias_for(&format!(
            "{}_{}",
            self.operation.name(),
            column.alias_name()
        ))
    }
}

/// A way to compute an aggregate over a relation.
pub(crate) trait CalculationStrategy {
    /// A unique identifier for this strategy (for debugging purposes)
    fn id(&self) -> &'static str;

    /// Can this strategy plan the calculation?
    fn suitable(&self, context: &CalculationContext) -> bool;

    fn plan(&self, context: &CalculationContext) -> Result<AggregatePlan, DatabaseError>;
}

/// The expression an aggregate applies to
pub(super) fn aggregated_expression(column: &AggregateColumn) -> Column {
    match column {
        AggregateColumn::All => Column::Star(None),
        AggregateColumn::Attribute { column, .. } => {
            Column::physical(column.table.clone(), column.name.clone())
        }
        AggregateColumn::Raw(text) => Column::Raw(text.clone()),
    }
}

/// The aliased aggregate over each requested column, applied to the relation's own rows
pub(super) fn aggregate_columns(context: &CalculationContext) -> (Vec<Column>, Vec<String>) {
    let distinct = context.relation.is_distinct() && context.operation.honours_distinct();

    context
        .columns
        .iter()
        .map(|column| {
            let alias = context.aggregate_alias(column);
            let expression = Column::function(
                context.operation.function(),
                distinct && *column != AggregateColumn::All,
                aggregated_expression(column),
            )
            .aliased(alias.clone());
            (expression, alias)
        })
        .unzip()
}
