// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use crate::sql::{PhysicalColumnType, SQLValue};

use super::predicate::ColumnRef;

/// A value bound to one placeholder of a clause, remembering which column it was bound for (if
/// any) and the column's declared type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Bind {
    pub column: Option<ColumnRef>,
    pub value: SQLValue,
    pub column_type: Option<PhysicalColumnType>,
}

impl Bind {
    pub fn new(
        column: ColumnRef,
        value: impl Into<SQLValue>,
        column_type: Option<PhysicalColumnType>,
    ) -> Self {
        Self {
            column: Some(column),
            value: value.into(),
            column_type,
        }
    }

    /// A bind for a placeholder in raw text, not tied to a column
    pub fn positional(value: impl Into<SQLValue>) -> Self {
        Self {
            column: None,
            value: value.into(),
            column_type: None,
        }
    }

    /// The value cast to the column's type. A value with no faithful representation is passed
    /// through for the database to reject or coerce.
    pub fn cast_value(&self) -> SQLValue {
        match self.column_type {
            Some(typ) => typ.cast(&self.value).unwrap_or_else(|_| self.value.clone()),
            None => self.value.clone(),
        }
    }
}
