// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use super::{ExpressionBuilder, SQLBuilder, column::Column};

/// An insert operation of a single row.
#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    /// The table to insert into.
    pub table: String,
    /// The columns to insert into.
    pub columns: Vec<String>,
    /// The values to insert, aligned with `columns`.
    pub values: Vec<Column>,
    /// The columns to return.
    pub returning: Vec<Column>,
}

impl ExpressionBuilder for Insert {
    /// Build an insert statement of the form `INSERT INTO <table> (<columns>) VALUES (<values>)
    /// RETURNING <returning>`. With no columns, the row is inserted with `DEFAULT VALUES`.
    fn build(&self, builder: &mut SQLBuilder) {
        builder.push_str("INSERT INTO ");
        builder.push_identifier(&self.table);

        if self.columns.is_empty() {
            builder.push_str(" DEFAULT VALUES");
        } else {
            builder.push_str(" (");
            builder.push_iter(self.columns.iter(), ", ", |builder, column| {
                builder.push_identifier(column);
            });
            builder.push_str(") VALUES (");
            builder.push_elems(&self.values, ", ");
            builder.push(')');
        }

        if !self.returning.is_empty() {
            builder.push_str(" RETURNING ");
            builder.without_fully_qualified_column_names(|builder| {
                builder.push_elems(&self.returning, ", ");
            });
        }
    }
}
