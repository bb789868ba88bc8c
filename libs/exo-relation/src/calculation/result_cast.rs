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
    sql::{PhysicalColumnType, SQLValue},
};

use super::operation::{AggregateColumn, Operation};

/// Cast a raw aggregate to the operation's result type. `None` stands for an absent result
/// (the average, minimum or maximum of no rows).
pub(crate) fn cast_result(
    operation: Operation,
    column: &AggregateColumn,
    value: SQLValue,
) -> Result<Option<SQLValue>, DatabaseError> {
    match operation {
        Operation::Count => Ok(Some(match value {
            SQLValue::Null => SQLValue::Int(0),
            value => PhysicalColumnType::Int.cast(&value)?,
        })),
        Operation::Sum => {
            let value = match value {
                SQLValue::Null => SQLValue::Int(0),
                value => value,
            };
            Ok(Some(cast_to_column(column, value)?))
        }
        Operation::Average => match value {
            SQLValue::Null => Ok(None),
            value => Ok(Some(PhysicalColumnType::Decimal.cast(&value)?)),
        },
        Operation::Minimum | Operation::Maximum => match value {
            SQLValue::Null => Ok(None),
            value => Ok(Some(cast_to_column(column, value)?)),
        },
    }
}

/// The identity result of an operation over no rows
pub(crate) fn identity_result(operation: Operation) -> Option<SQLValue> {
    match operation {
        Operation::Count | Operation::Sum => Some(SQLValue::Int(0)),
        Operation::Average | Operation::Minimum | Operation::Maximum => None,
    }
}

fn cast_to_column(column: &AggregateColumn, value: SQLValue) -> Result<SQLValue, DatabaseError> {
    match column.column_type() {
        Some(typ) => typ.cast(&value),
        None => Ok(value),
    }
}

#[cfg(test)]
mod tests {
    use pg_bigdecimal::BigDecimal;

    use crate::relation::ColumnRef;

    use super::*;

    fn score() -> AggregateColumn {
        AggregateColumn::Attribute {
            name: "score".into(),
            column: ColumnRef::new("posts", "score"),
            column_type: Some(PhysicalColumnType::Int),
        }
    }

    #[test]
    fn sums_take_the_column_type() {
        assert_eq!(
            cast_result(
                Operation::Sum,
                &score(),
                SQLValue::Decimal(BigDecimal::from(55))
            )
            .unwrap(),
            Some(SQLValue::Int(55))
        );
        assert_eq!(
            cast_result(Operation::Sum, &score(), SQLValue::Null).unwrap(),
            Some(SQLValue::Int(0))
        );
    }

    #[test]
    fn averages_are_decimal_or_absent() {
        assert_eq!(
            cast_result(Operation::Average, &score(), SQLValue::Int(4)).unwrap(),
            Some(SQLValue::Decimal(BigDecimal::from(4)))
        );
        assert_eq!(
            cast_result(Operation::Average, &score(), SQLValue::Null).unwrap(),
            None
        );
    }

    #[test]
    fn counts_are_integers() {
        assert_eq!(
            cast_result(Operation::Count, &AggregateColumn::All, SQLValue::Int(3)).unwrap(),
            Some(SQLValue::Int(3))
        );
        assert_eq!(
            cast_result(Operation::Maximum, &AggregateColumn::All, SQLValue::Null).unwrap(),
            None
        );
    }
}
