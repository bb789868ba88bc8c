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
    relation::UnscopeField,
    transform::select_transformer::to_select,
};

use super::{
    aggregate_plan::{AggregatePlan, ScalarPlan},
    calculation_strategy::{CalculationContext, CalculationStrategy, aggregate_columns},
};

/// Aggregate directly over the relation's rows. Orderings are dropped since they don't change
/// an aggregate (and Postgres rejects ordering by non-aggregated columns).
pub(crate) struct SimpleStrategy {}

impl CalculationStrategy for SimpleStrategy {
    fn id(&self) -> &'static str {
        "SimpleStrategy"
    }

    fn suitable(&self, context: &CalculationContext) -> bool {
        let relation = context.relation;
        relation.group_keys().is_empty()
            && relation.limit_value().is_none()
            && relation.offset_value().is_none()
    }

    fn plan(&self, context: &CalculationContext) -> Result<AggregatePlan, DatabaseError> {
        let relation = context.relation.unscope(&[
            UnscopeField::Select,
            UnscopeField::Order,
            UnscopeField::Lock,
            UnscopeField::Distinct,
        ]);

        let mut select = to_select(&relation)?;
        let (columns, aliases) = aggregate_columns(context);
        select.columns = columns;

        Ok(AggregatePlan::Simple(ScalarPlan {
            select,
            aliases,
            columns: context.columns.clone(),
        }))
    }
}
