// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::{
    cmp::Ordering,
    fmt::Display,
    hash::{Hash, Hasher},
    str::FromStr,
};

use bytes::BytesMut;
use pg_bigdecimal::{BigDecimal, PgNumeric};
use tokio_postgres::types::{IsNull, ToSql, Type, to_sql_checked};

/// A value bound to a placeholder or read back from a row.
///
/// Unlike a plain `Box<dyn ToSql>`, this type can be compared, hashed and ordered, which the
/// merge algebra (structural equality of predicates and binds) and the in-memory connection
/// need.
#[derive(Debug, Clone)]
pub enum SQLValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(BigDecimal),
    Text(String),
}

impl SQLValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SQLValue::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SQLValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SQLValue::Int(i) => Some(*i as f64),
            SQLValue::Float(f) => Some(*f),
            SQLValue::Decimal(d) => d.to_string().parse().ok(),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<BigDecimal> {
        match self {
            SQLValue::Int(i) => Some(BigDecimal::from(*i)),
            SQLValue::Float(f) => decimal_from_f64(*f),
            SQLValue::Decimal(d) => Some(d.clone()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SQLValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SQLValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Compare two values the way a database would: numbers compare across representations and
    /// NULL is incomparable.
    pub fn sql_cmp(&self, other: &SQLValue) -> Option<Ordering> {
        match (self, other) {
            (SQLValue::Null, _) | (_, SQLValue::Null) => None,
            (SQLValue::Bool(l), SQLValue::Bool(r)) => Some(l.cmp(r)),
            (SQLValue::Int(l), SQLValue::Int(r)) => Some(l.cmp(r)),
            (SQLValue::Text(l), SQLValue::Text(r)) => Some(l.cmp(r)),
            (SQLValue::Decimal(_), _) | (_, SQLValue::Decimal(_)) => {
                match (self.as_decimal(), other.as_decimal()) {
                    (Some(l), Some(r)) => Some(l.cmp(&r)),
                    _ => None,
                }
            }
            (SQLValue::Int(_) | SQLValue::Float(_), SQLValue::Int(_) | SQLValue::Float(_)) => {
                self.as_f64()?.partial_cmp(&other.as_f64()?)
            }
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            SQLValue::Null => "null",
            SQLValue::Bool(_) => "boolean",
            SQLValue::Int(_) => "integer",
            SQLValue::Float(_) => "float",
            SQLValue::Decimal(_) => "decimal",
            SQLValue::Text(_) => "text",
        }
    }
}

pub(crate) fn decimal_from_f64(value: f64) -> Option<BigDecimal> {
    if value.is_finite() {
        BigDecimal::from_str(&value.to_string()).ok()
    } else {
        None
    }
}

impl PartialEq for SQLValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (SQLValue::Null, SQLValue::Null) => true,
            (SQLValue::Bool(l), SQLValue::Bool(r)) => l == r,
            (SQLValue::Int(l), SQLValue::Int(r)) => l == r,
            (SQLValue::Float(l), SQLValue::Float(r)) => l.to_bits() == r.to_bits(),
            (SQLValue::Decimal(l), SQLValue::Decimal(r)) => l == r,
            (SQLValue::Text(l), SQLValue::Text(r)) => l == r,
            _ => false,
        }
    }
}

impl Eq for SQLValue {}

impl Hash for SQLValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            SQLValue::Null => {}
            SQLValue::Bool(b) => b.hash(state),
            SQLValue::Int(i) => i.hash(state),
            SQLValue::Float(f) => f.to_bits().hash(state),
            SQLValue::Decimal(d) => d.hash(state),
            SQLValue::Text(s) => s.hash(state),
        }
    }
}

impl Display for SQLValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SQLValue::Null => f.write_str("NULL"),
            SQLValue::Bool(b) => write!(f, "{b}"),
            SQLValue::Int(i) => write!(f, "{i}"),
            SQLValue::Float(v) => write!(f, "{v}"),
            SQLValue::Decimal(d) => write!(f, "{d}"),
            SQLValue::Text(s) => f.write_str(s),
        }
    }
}

macro_rules! impl_from_integer {
    ($($t:ty),*) => {
        $(
            impl From<$t> for SQLValue {
                fn from(value: $t) -> Self {
                    SQLValue::Int(value as i64)
                }
            }
        )*
    };
}

impl_from_integer!(i16, i32, i64, u8, u16, u32);

impl From<f64> for SQLValue {
    fn from(value: f64) -> Self {
        SQLValue::Float(value)
    }
}

impl From<f32> for SQLValue {
    fn from(value: f32) -> Self {
        SQLValue::Float(value as f64)
    }
}

impl From<bool> for SQLValue {
    fn from(value: bool) -> Self {
        SQLValue::Bool(value)
    }
}

impl From<&str> for SQLValue {
    fn from(value: &str) -> Self {
        SQLValue::Text(value.to_string())
    }
}

impl From<String> for SQLValue {
    fn from(value: String) -> Self {
        SQLValue::Text(value)
    }
}

impl From<BigDecimal> for SQLValue {
    fn from(value: BigDecimal) -> Self {
        SQLValue::Decimal(value)
    }
}

impl<T: Into<SQLValue>> From<Option<T>> for SQLValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(SQLValue::Null)
    }
}

impl ToSql for SQLValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            SQLValue::Null => Ok(IsNull::Yes),
            SQLValue::Bool(b) => b.to_sql(ty, out),
            SQLValue::Int(i) => {
                if *ty == Type::INT2 {
                    i16::try_from(*i)?.to_sql(ty, out)
                } else if *ty == Type::INT4 {
                    i32::try_from(*i)?.to_sql(ty, out)
                } else if *ty == Type::FLOAT4 {
                    (*i as f32).to_sql(ty, out)
                } else if *ty == Type::FLOAT8 {
                    (*i as f64).to_sql(ty, out)
                } else if *ty == Type::NUMERIC {
                    PgNumeric {
                        n: Some(BigDecimal::from(*i)),
                    }
                    .to_sql(ty, out)
                } else {
                    i.to_sql(ty, out)
                }
            }
            SQLValue::Float(f) => {
                if *ty == Type::FLOAT4 {
                    (*f as f32).to_sql(ty, out)
                } else if *ty == Type::NUMERIC {
                    PgNumeric {
                        n: decimal_from_f64(*f),
                    }
                    .to_sql(ty, out)
                } else {
                    f.to_sql(ty, out)
                }
            }
            SQLValue::Decimal(d) => {
                if *ty == Type::FLOAT8 {
                    let value: f64 = d.to_string().parse()?;
                    value.to_sql(ty, out)
                } else {
                    PgNumeric { n: Some(d.clone()) }.to_sql(ty, out)
                }
            }
            SQLValue::Text(s) => s.as_str().to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}
