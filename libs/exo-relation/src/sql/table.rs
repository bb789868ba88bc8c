// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use super::{ExpressionBuilder, SQLBuilder, join::Join, select::Select};

/// A table-like concept that can be used in the FROM clause of a select.
#[derive(Debug, Clone, PartialEq)]
pub enum Table {
    /// A physical table, optionally aliased (`"posts" AS "p"`)
    Physical { name: String, alias: Option<String> },
    /// A join between two tables
    Join(Join),
    /// A sub-select such as `(SELECT ...) AS "subquery_for_sum"`
    SubSelect { select: Box<Select>, alias: String },
    /// Verbatim text (a FROM override supplied by the caller)
    Raw(String),
    /// A table followed by a verbatim join fragment (`"posts" INNER JOIN comments ON ...`)
    RawJoin { left: Box<Table>, fragment: String },
}

impl Table {
    pub fn physical(name: impl Into<String>) -> Self {
        Table::Physical {
            name: name.into(),
            alias: None,
        }
    }

    pub fn sub_select(select: Select, alias: impl Into<String>) -> Self {
        Table::SubSelect {
            select: Box::new(select),
            alias: alias.into(),
        }
    }

    pub fn join(self, join: impl FnOnce(Table) -> Join) -> Self {
        Table::Join(join(self))
    }

    pub fn raw_join(self, fragment: impl Into<String>) -> Self {
        Table::RawJoin {
            left: Box::new(self),
            fragment: fragment.into(),
        }
    }
}

impl ExpressionBuilder for Table {
    fn build(&self, builder: &mut SQLBuilder) {
        match self {
            Table::Physical { name, alias } => {
                builder.push_identifier(name);
                if let Some(alias) = alias {
                    builder.push_str(" AS ");
                    builder.push_identifier(alias);
                }
            }
            Table::Join(join) => join.build(builder),
            Table::SubSelect { select, alias } => {
                builder.push('(');
                select.build(builder);
                builder.push_str(") AS ");
                builder.push_identifier(alias);
            }
            Table::Raw(text) => builder.push_str(text),
            Table::RawJoin { left, fragment } => {
                left.build(builder);
                builder.push_space();
                builder.push_str(fragment);
            }
        }
    }
}
