// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use crate::{relation::Association, sql::Select};

use super::operation::AggregateColumn;

/// How a calculation is carried out
#[derive(Debug, Clone, PartialEq)]
pub enum AggregatePlan {
    /// The relation matches no row: the result is the operation's identity, with no statement
    Identity { grouped: bool },
    /// One statement selecting the aggregates over the relation's rows
    Simple(ScalarPlan),
    /// The aggregates over a limited sub-query of the relation's rows
    SubQuery(ScalarPlan),
    /// One row per group
    Grouped(GroupedPlan),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScalarPlan {
    pub select: Select,
    /// Output names of the aggregates, aligned with the requested columns
    pub aliases: Vec<String>,
    pub columns: Vec<AggregateColumn>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupedPlan {
    pub select: Select,
    pub key_aliases: Vec<String>,
    pub aliases: Vec<String>,
    pub columns: Vec<AggregateColumn>,
    /// Set when the single group key is an association: keys are replaced by the owning rows
    pub owner: Option<Association>,
}
