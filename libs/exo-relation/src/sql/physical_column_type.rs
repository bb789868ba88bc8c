// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::str::FromStr;

use pg_bigdecimal::BigDecimal;

use crate::database_error::DatabaseError;

use super::{SQLValue, sql_value::decimal_from_f64};

/// The declared type of an entity attribute. Used to cast bound values and calculation results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhysicalColumnType {
    Int,
    Float,
    Decimal,
    String,
    Boolean,
}

impl PhysicalColumnType {
    /// Cast a value to this type, failing if the value has no faithful representation (for
    /// example, `"abc"` as an integer). NULL casts to NULL.
    pub fn cast(&self, value: &SQLValue) -> Result<SQLValue, DatabaseError> {
        let cast_error = || {
            DatabaseError::Validation(format!(
                "Cannot cast {} value '{value}' to {self:?}",
                value.type_name()
            ))
        };

        if value.is_null() {
            return Ok(SQLValue::Null);
        }

        match self {
            PhysicalColumnType::Int => match value {
                SQLValue::Int(i) => Ok(SQLValue::Int(*i)),
                SQLValue::Float(_) | SQLValue::Decimal(_) => {
                    let f = value.as_f64().ok_or_else(cast_error)?;
                    if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
                        Ok(SQLValue::Int(f as i64))
                    } else {
                        Err(cast_error())
                    }
                }
                SQLValue::Text(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(SQLValue::Int)
                    .map_err(|_| cast_error()),
                _ => Err(cast_error()),
            },
            PhysicalColumnType::Float => match value {
                SQLValue::Text(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(SQLValue::Float)
                    .map_err(|_| cast_error()),
                _ => value.as_f64().map(SQLValue::Float).ok_or_else(cast_error),
            },
            PhysicalColumnType::Decimal => match value {
                SQLValue::Text(s) => BigDecimal::from_str(s.trim())
                    .map(SQLValue::Decimal)
                    .map_err(|_| cast_error()),
                SQLValue::Float(f) => decimal_from_f64(*f)
                    .map(SQLValue::Decimal)
                    .ok_or_else(cast_error),
                _ => value
                    .as_decimal()
                    .map(SQLValue::Decimal)
                    .ok_or_else(cast_error),
            },
            PhysicalColumnType::String => Ok(SQLValue::Text(value.to_string())),
            PhysicalColumnType::Boolean => match value {
                SQLValue::Bool(b) => Ok(SQLValue::Bool(*b)),
                SQLValue::Int(0) => Ok(SQLValue::Bool(false)),
                SQLValue::Int(1) => Ok(SQLValue::Bool(true)),
                SQLValue::Text(s) => match s.trim().to_lowercase().as_str() {
                    "true" | "t" | "1" => Ok(SQLValue::Bool(true)),
                    "false" | "f" | "0" => Ok(SQLValue::Bool(false)),
                    _ => Err(cast_error()),
                },
                _ => Err(cast_error()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_casts() {
        let int = PhysicalColumnType::Int;
        assert_eq!(int.cast(&"42".into()).unwrap(), SQLValue::Int(42));
        assert_eq!(int.cast(&SQLValue::Float(3.0)).unwrap(), SQLValue::Int(3));
        assert_eq!(int.cast(&SQLValue::Null).unwrap(), SQLValue::Null);
        assert!(int.cast(&"abc".into()).is_err());
        assert!(int.cast(&SQLValue::Float(3.5)).is_err());
    }

    #[test]
    fn decimal_and_boolean_casts() {
        assert_eq!(
            PhysicalColumnType::Decimal.cast(&SQLValue::Int(7)).unwrap(),
            SQLValue::Decimal(BigDecimal::from(7))
        );
        assert_eq!(
            PhysicalColumnType::Boolean.cast(&"t".into()).unwrap(),
            SQLValue::Bool(true)
        );
        assert_eq!(
            PhysicalColumnType::String.cast(&SQLValue::Int(7)).unwrap(),
            SQLValue::Text("7".into())
        );
    }
}
