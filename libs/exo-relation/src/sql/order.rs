// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use super::{ExpressionBuilder, SQLBuilder, column::Column};

#[derive(Debug, Clone, PartialEq, Eq, Copy, Hash)]
pub enum Ordering {
    Asc,
    Desc,
}

impl Ordering {
    pub fn reverse(self) -> Self {
        match self {
            Ordering::Asc => Ordering::Desc,
            Ordering::Desc => Ordering::Asc,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OrderByElement {
    Expr(Column, Ordering),
    /// Verbatim text, possibly carrying its own direction (`created_at DESC`)
    Raw(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy(pub Vec<OrderByElement>);

impl ExpressionBuilder for OrderByElement {
    fn build(&self, builder: &mut SQLBuilder) {
        match self {
            OrderByElement::Expr(column, ordering) => {
                column.build(builder);
                builder.push_space();

                if *ordering == Ordering::Asc {
                    builder.push_str("ASC");
                } else {
                    builder.push_str("DESC");
                }
            }
            OrderByElement::Raw(text) => builder.push_str(text),
        }
    }
}

impl ExpressionBuilder for OrderBy {
    fn build(&self, builder: &mut SQLBuilder) {
        builder.push_str("ORDER BY ");
        builder.push_elems(&self.0, ", ");
    }
}
