// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Aggregates over relations.
//!
//! A calculation is planned by the first suitable strategy of a [chain](CalculationStrategyChain):
//! relations matching no row need no statement, grouped relations yield a row per group, limited
//! relations aggregate over a sub-query and everything else aggregates directly.

mod aggregate_plan;
mod calculation_strategy;
mod calculation_strategy_chain;
mod grouped_strategy;
mod null_strategy;
mod operation;
mod result_cast;
mod simple_strategy;
mod subquery_strategy;

use indexmap::IndexMap;
use pg_bigdecimal::BigDecimal;
use tracing::instrument;

use crate::{
    database_error::DatabaseError,
    relation::{Association, AttributeMap, AttributeValue, Relation},
    sql::{Row, SQLOperation, SQLValue, connect::connection::Connection},
    transform::select_transformer::to_select,
};

pub use aggregate_plan::{AggregatePlan, GroupedPlan, ScalarPlan};
pub use operation::{AggregateColumn, Operation};

use calculation_strategy::CalculationContext;
use calculation_strategy_chain::CalculationStrategyChain;
use result_cast::{cast_result, identity_result};

/// The result of a calculation
#[derive(Debug, Clone, PartialEq)]
pub enum Calculated {
    /// The aggregate over one column. `None` when absent (the average of no rows).
    Scalar(Option<SQLValue>),
    /// The aggregates over several columns, in the requested order
    Scalars(Vec<Option<SQLValue>>),
    Grouped(GroupedCalculation),
}

impl Calculated {
    fn from_values(mut values: Vec<Option<SQLValue>>) -> Calculated {
        if values.len() == 1 {
            Calculated::Scalar(values.pop().flatten())
        } else {
            Calculated::Scalars(values)
        }
    }

    /// The single aggregate of an ungrouped calculation over one column
    pub fn into_scalar(self) -> Result<Option<SQLValue>, DatabaseError> {
        match self {
            Calculated::Scalar(value) => Ok(value),
            Calculated::Scalars(_) => Err(DatabaseError::Argument(
                "Calculation over several columns has no single result".to_string(),
            )),
            Calculated::Grouped(_) => Err(DatabaseError::Argument(
                "Grouped calculation has no single result; use `calculate`".to_string(),
            )),
        }
    }
}

/// A group's key as returned by a grouped calculation
#[derive(Debug, Clone, PartialEq)]
pub enum GroupKeyValue {
    Value(SQLValue),
    /// One value per group key, for relations grouped by several keys
    Values(Vec<SQLValue>),
    /// The owning record, for relations grouped by an association
    Record(Row),
}

/// Per-group results in the order the database returned the groups
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GroupedCalculation {
    entries: Vec<(GroupKeyValue, Calculated)>,
}

impl GroupedCalculation {
    pub fn entries(&self) -> &[(GroupKeyValue, Calculated)] {
        &self.entries
    }

    pub fn keys(&self) -> impl Iterator<Item = &GroupKeyValue> {
        self.entries.iter().map(|(key, _)| key)
    }

    pub fn get(&self, key: &GroupKeyValue) -> Option<&Calculated> {
        self.entries
            .iter()
            .find_map(|(k, value)| (k == key).then_some(value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Relation {
    /// Calculate `operation` over `columns` (`all`/`*` for every row, attribute names, or raw
    /// expressions). Counting with no column counts every row.
    #[instrument(name = "Relation::calculate", skip_all, fields(entity = %self.entity().name, %operation))]
    pub async fn calculate(
        &self,
        connection: &dyn Connection,
        operation: Operation,
        columns: &[&str],
    ) -> Result<Calculated, DatabaseError> {
        let columns: Vec<AggregateColumn> = match (columns, operation) {
            ([], Operation::Count) => vec![AggregateColumn::All.for_count(self)],
            ([], _) => {
                return Err(DatabaseError::Argument(format!(
                    "Calculating {operation} requires a column"
                )));
            }
            (columns, Operation::Count) => columns
                .iter()
                .map(|c| AggregateColumn::resolve(self, c).for_count(self))
                .collect(),
            (columns, _) => columns
                .iter()
                .map(|c| AggregateColumn::resolve(self, c))
                .collect(),
        };

        let context = CalculationContext {
            relation: self,
            operation,
            columns,
            connection,
        };

        match CalculationStrategyChain::default().plan(&context)? {
            AggregatePlan::Identity { grouped: true } => {
                Ok(Calculated::Grouped(GroupedCalculation::default()))
            }
            AggregatePlan::Identity { grouped: false } => Ok(Calculated::from_values(
                context
                    .columns
                    .iter()
                    .map(|_| identity_result(operation))
                    .collect(),
            )),
            AggregatePlan::Simple(plan) | AggregatePlan::SubQuery(plan) => {
                let rows = connection
                    .query(&SQLOperation::Select(plan.select))
                    .await?;
                let row = rows.first();

                let values = plan
                    .aliases
                    .iter()
                    .zip(&plan.columns)
                    .map(|(alias, column)| {
                        let value = row
                            .and_then(|row| row.get(alias))
                            .cloned()
                            .unwrap_or(SQLValue::Null);
                        cast_result(operation, column, value)
                    })
                    .collect::<Result<_, _>>()?;

                Ok(Calculated::from_values(values))
            }
            AggregatePlan::Grouped(plan) => self.calculate_grouped(connection, operation, plan).await,
        }
    }

    async fn calculate_grouped(
        &self,
        connection: &dyn Connection,
        operation: Operation,
        plan: GroupedPlan,
    ) -> Result<Calculated, DatabaseError> {
        let rows = connection
            .query(&SQLOperation::Select(plan.select))
            .await?;

        let raw_keys: Vec<Vec<SQLValue>> = rows
            .iter()
            .map(|row| {
                plan.key_aliases
                    .iter()
                    .map(|alias| row.get(alias).cloned().unwrap_or(SQLValue::Null))
                    .collect()
            })
            .collect();

        let owners = match &plan.owner {
            Some(association) => {
                let mut ids: Vec<SQLValue> = vec![];
                for key in raw_keys.iter().filter_map(|key| key.first()) {
                    if !key.is_null() && !ids.contains(key) {
                        ids.push(key.clone());
                    }
                }
                self.load_owners(connection, association, ids).await?
            }
            None => IndexMap::new(),
        };

        let mut entries = Vec::with_capacity(rows.len());
        for (row, mut key) in rows.iter().zip(raw_keys) {
            let key = if plan.owner.is_some() {
                let value = key.pop().unwrap_or(SQLValue::Null);
                match owners.get(&value) {
                    Some(owner) => GroupKeyValue::Record(owner.clone()),
                    None => GroupKeyValue::Value(value),
                }
            } else if key.len() == 1 {
                GroupKeyValue::Value(key.pop().unwrap_or(SQLValue::Null))
            } else {
                GroupKeyValue::Values(key)
            };

            let values = plan
                .aliases
                .iter()
                .zip(&plan.columns)
                .map(|(alias, column)| {
                    let value = row.get(alias).cloned().unwrap_or(SQLValue::Null);
                    cast_result(operation, column, value)
                })
                .collect::<Result<_, _>>()?;

            entries.push((key, Calculated::from_values(values)));
        }

        Ok(Calculated::Grouped(GroupedCalculation { entries }))
    }

    /// The owning rows of the given identities, looked up in one statement
    async fn load_owners(
        &self,
        connection: &dyn Connection,
        association: &Association,
        ids: Vec<SQLValue>,
    ) -> Result<IndexMap<SQLValue, Row>, DatabaseError> {
        if ids.is_empty() {
            return Ok(IndexMap::new());
        }

        let target = &association.target;
        let owners = Relation::new(target.clone(), self.resolver().clone()).filter(
            AttributeMap::new().with(target.primary_key.clone(), AttributeValue::List(ids)),
        )?;
        let rows = connection
            .query(&SQLOperation::Select(to_select(&owners)?))
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let id = row.get(&target.primary_key)?.clone();
                Some((id, row))
            })
            .collect())
    }

    /// The number of rows
    pub async fn count(&self, connection: &dyn Connection) -> Result<i64, DatabaseError> {
        let value = self
            .calculate(connection, Operation::Count, &[])
            .await?
            .into_scalar()?;
        Ok(value.and_then(|v| v.as_i64()).unwrap_or(0))
    }

    /// The sum of a column, zero over no rows
    pub async fn sum(
        &self,
        connection: &dyn Connection,
        column: &str,
    ) -> Result<SQLValue, DatabaseError> {
        let value = self
            .calculate(connection, Operation::Sum, &[column])
            .await?
            .into_scalar()?;
        Ok(value.unwrap_or(SQLValue::Int(0)))
    }

    pub async fn average(
        &self,
        connection: &dyn Connection,
        column: &str,
    ) -> Result<Option<BigDecimal>, DatabaseError> {
        let value = self
            .calculate(connection, Operation::Average, &[column])
            .await?
            .into_scalar()?;
        Ok(value.and_then(|v| v.as_decimal()))
    }

    pub async fn minimum(
        &self,
        connection: &dyn Connection,
        column: &str,
    ) -> Result<Option<SQLValue>, DatabaseError> {
        self.calculate(connection, Operation::Minimum, &[column])
            .await?
            .into_scalar()
    }

    pub async fn maximum(
        &self,
        connection: &dyn Connection,
        column: &str,
    ) -> Result<Option<SQLValue>, DatabaseError> {
        self.calculate(connection, Operation::Maximum, &[column])
            .await?
            .into_scalar()
    }
}
