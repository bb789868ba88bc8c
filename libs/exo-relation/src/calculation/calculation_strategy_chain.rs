// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use tracing::debug;

use crate::database_error::DatabaseError;

use super::{
    aggregate_plan::AggregatePlan,
    calculation_strategy::{CalculationContext, CalculationStrategy},
    grouped_strategy::GroupedStrategy,
    null_strategy::NullStrategy,
    simple_strategy::SimpleStrategy,
    subquery_strategy::SubQueryStrategy,
};

/// Chain of calculation strategies, most specific first.
pub(crate) struct CalculationStrategyChain<'s> {
    strategies: Vec<&'s dyn CalculationStrategy>,
}

impl<'s> CalculationStrategyChain<'s> {
    pub fn new(strategies: Vec<&'s dyn CalculationStrategy>) -> Self {
        Self { strategies }
    }

    /// Plan with the first suitable strategy
    pub fn plan(&self, context: &CalculationContext) -> Result<AggregatePlan, DatabaseError> {
        let strategy = self
            .strategies
            .iter()
            .find(|s| s.suitable(context))
            .ok_or_else(|| {
                DatabaseError::Argument(format!(
                    "No strategy can calculate {} over {}",
                    context.operation,
                    context.relation.entity().name
                ))
            })?;

        debug!("Using calculation strategy: {}", strategy.id());

        strategy.plan(context)
    }
}

impl Default for CalculationStrategyChain<'_> {
    fn default() -> Self {
        Self::new(vec![
            &NullStrategy {},
            &GroupedStrategy {},
            &SubQueryStrategy {},
            &SimpleStrategy {},
        ])
    }
}
