// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::{fmt::Display, str::FromStr};

use crate::{
    database_error::DatabaseError,
    relation::{ColumnRef, Projection, Relation},
    sql::{Function, PhysicalColumnType},
};

/// An aggregate a relation can be calculated with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Count,
    Sum,
    Average,
    Minimum,
    Maximum,
}

impl Operation {
    pub fn function(&self) -> Function {
        match self {
            Operation::Count => Function::Count,
            Operation::Sum => Function::Sum,
            Operation::Average => Function::Avg,
            Operation::Minimum => Function::Min,
            Operation::Maximum => Function::Max,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operation::Count => "count",
            Operation::Sum => "sum",
            Operation::Average => "average",
            Operation::Minimum => "minimum",
            Operation::Maximum => "maximum",
        }
    }

    /// Can the aggregate apply to distinct values only?
    pub(crate) fn honours_distinct(&self) -> bool {
        matches!(self, Operation::Count | Operation::Sum)
    }
}

impl FromStr for Operation {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "count" => Ok(Operation::Count),
            "sum" => Ok(Operation::Sum),
            "average" | "avg" => Ok(Operation::Average),
            "minimum" | "min" => Ok(Operation::Minimum),
            "maximum" | "max" => Ok(Operation::Maximum),
            _ => Err(DatabaseError::Argument(format!(
                "Unknown calculation operation '{s}'"
            ))),
        }
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The column an aggregate applies to
#[derive(Debug, Clone, PartialEq)]
pub enum AggregateColumn {
    /// Every row (`all` or `*`)
    All,
    /// A known column, typed when it is an attribute of the relation's entity
    Attribute {
        name: String,
        column: ColumnRef,
        column_type: Option<PhysicalColumnType>,
    },
    /// An unvalidated expression
    Raw(String),
}

impl AggregateColumn {
    pub fn resolve(relation: &Relation, name: &str) -> AggregateColumn {
        if name == "all" || name == "*" {
            return AggregateColumn::All;
        }

        match relation.column_ref(name) {
            Some(column) => {
                let entity = relation.entity();
                let column_type = if column.table == entity.table {
                    entity.attribute_type(&column.name)
                } else {
                    None
                };
                AggregateColumn::Attribute {
                    name: name.to_string(),
                    column,
                    column_type,
                }
            }
            None => AggregateColumn::Raw(name.to_string()),
        }
    }

    /// The column `count(all)` counts. A distinct relation counts distinct identities (or its
    /// single projection), since `COUNT(DISTINCT *)` is not a thing.
    pub(crate) fn for_count(self, relation: &Relation) -> AggregateColumn {
        if self != AggregateColumn::All {
            return self;
        }

        match relation.projections() {
            [Projection::Column(column)] => AggregateColumn::resolve(relation, &column.to_string()),
            [Projection::Raw(text)] if relation.is_distinct() => AggregateColumn::Raw(text.clone()),
            _ if relation.is_distinct() => {
                let primary_key = relation.entity().primary_key.clone();
                AggregateColumn::resolve(relation, &primary_key)
            }
            _ => AggregateColumn::All,
        }
    }

    pub fn column_type(&self) -> Option<PhysicalColumnType> {
        match self {
            AggregateColumn::Attribute { column_type, .. } => *column_type,
            _ => None,
        }
    }

    /// The name used to derive aliases
    pub fn alias_name(&self) -> &str {
        match self {
            AggregateColumn::All => "all",
            AggregateColumn::Attribute { name, .. } => name,
            AggregateColumn::Raw(text) => text,
        }
    }
}
