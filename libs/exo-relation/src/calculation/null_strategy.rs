// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use crate::database_error::DatabaseError;

use super::{
    aggregate_plan::AggregatePlan,
    calculation_strategy::{CalculationContext, CalculationStrategy},
};

/// Relations known to match no row need no statement
pub(crate) struct NullStrategy {}

impl CalculationStrategy for NullStrategy {
    fn id(&self) -> &'static str {
        "NullStrategy"
    }

    fn suitable(&self, context: &CalculationContext) -> bool {
        context.relation.is_null()
    }

    fn plan(&self, context: &CalculationContext) -> Result<AggregatePlan, DatabaseError> {
        Ok(AggregatePlan::Identity {
            grouped: !context.relation.group_keys().is_empty(),
        })
    }
}
