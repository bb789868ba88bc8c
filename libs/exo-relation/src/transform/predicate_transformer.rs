// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::slice::Iter;

use crate::{
    database_error::DatabaseError,
    relation::{Bind, ColumnRef, InList, Operand, Predicate, WhereClause},
    sql::{Column, ConcretePredicate, SQLValue},
};

use super::select_transformer::to_select;

/// Lower a where (or having) clause into one concrete predicate, substituting binds for
/// placeholders in textual order.
pub(crate) fn to_concrete_predicate(
    clause: &WhereClause,
) -> Result<ConcretePredicate, DatabaseError> {
    let mut binds = BindCursor {
        binds: clause.binds().iter(),
    };

    let predicates = clause
        .predicates()
        .iter()
        .map(|predicate| lower(predicate, &mut binds))
        .collect::<Result<Vec<_>, _>>()?;

    let remaining = binds.binds.len();
    if remaining > 0 {
        return Err(DatabaseError::Argument(format!(
            "{remaining} bind value(s) left without a placeholder"
        )));
    }

    Ok(ConcretePredicate::conjoin(predicates))
}

struct BindCursor<'a> {
    binds: Iter<'a, Bind>,
}

impl BindCursor<'_> {
    fn next(&mut self) -> Result<SQLValue, DatabaseError> {
        self.binds
            .next()
            .map(Bind::cast_value)
            .ok_or_else(|| DatabaseError::Argument("Missing value for a bind placeholder".into()))
    }
}

fn column(column: &ColumnRef) -> Column {
    Column::physical(column.table.clone(), column.name.clone())
}

fn operand(operand: &Operand, binds: &mut BindCursor<'_>) -> Result<Column, DatabaseError> {
    Ok(match operand {
        Operand::Bind => Column::Param(binds.next()?),
        Operand::Null => Column::Null,
        Operand::Column(c) => column(c),
    })
}

fn lower(
    predicate: &Predicate,
    binds: &mut BindCursor<'_>,
) -> Result<ConcretePredicate, DatabaseError> {
    use crate::relation::ComparisonOp;

    Ok(match predicate {
        Predicate::Equality(c, o) => ConcretePredicate::eq(column(c), operand(o, binds)?),
        Predicate::NotEqual(c, o) => !ConcretePredicate::eq(column(c), operand(o, binds)?),
        Predicate::Comparison(c, op, o) => {
            let (lhs, rhs) = (column(c), operand(o, binds)?);
            match op {
                ComparisonOp::Lt => ConcretePredicate::Lt(lhs, rhs),
                ComparisonOp::LtEq => ConcretePredicate::Lte(lhs, rhs),
                ComparisonOp::Gt => ConcretePredicate::Gt(lhs, rhs),
                ComparisonOp::GtEq => ConcretePredicate::Gte(lhs, rhs),
            }
        }
        Predicate::In(c, list) => lower_in(c, list, binds)?,
        Predicate::NotIn(c, list) => !lower_in(c, list, binds)?,
        Predicate::And(lhs, rhs) => {
            let lhs = lower(lhs, binds)?;
            let rhs = lower(rhs, binds)?;
            if is_repeated(&lhs, &rhs) {
                ConcretePredicate::And(Box::new(lhs), Box::new(rhs))
            } else {
                ConcretePredicate::and(lhs, rhs)
            }
        }
        Predicate::Or(lhs, rhs) => {
            let lhs = lower(lhs, binds)?;
            let rhs = lower(rhs, binds)?;
            if is_repeated(&lhs, &rhs) {
                ConcretePredicate::Or(Box::new(lhs), Box::new(rhs))
            } else {
                ConcretePredicate::or(lhs, rhs)
            }
        }
        Predicate::Not(inner) => !lower(inner, binds)?,
        Predicate::Raw(text) => {
            let params = (0..predicate.bind_count())
                .map(|_| binds.next())
                .collect::<Result<Vec<_>, _>>()?;
            ConcretePredicate::raw(text.clone(), params)
        }
    })
}

/// Both sides of a combination are rendered even when equal, so every bind of the relation keeps
/// its placeholder
fn is_repeated(lhs: &ConcretePredicate, rhs: &ConcretePredicate) -> bool {
    lhs == rhs && !matches!(lhs, ConcretePredicate::True | ConcretePredicate::False)
}

fn lower_in(
    c: &ColumnRef,
    list: &InList,
    binds: &mut BindCursor<'_>,
) -> Result<ConcretePredicate, DatabaseError> {
    Ok(match list {
        InList::Values(operands) => ConcretePredicate::In(
            column(c),
            operands
                .iter()
                .map(|o| operand(o, binds))
                .collect::<Result<Vec<_>, _>>()?,
        ),
        InList::Subquery(relation) => {
            ConcretePredicate::InSelect(column(c), Box::new(to_select(relation)?))
        }
    })
}
