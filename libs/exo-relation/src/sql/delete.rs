// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use super::{ExpressionBuilder, SQLBuilder, predicate::ConcretePredicate};

/// A delete operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    /// The table to delete from.
    pub table: String,
    /// The predicate to filter rows by.
    pub predicate: ConcretePredicate,
}

impl ExpressionBuilder for Delete {
    /// Build a delete operation for the `DELETE FROM <table> WHERE <predicate>`. The `WHERE`
    /// clause is omitted if the predicate is `true`.
    fn build(&self, builder: &mut SQLBuilder) {
        builder.push_str("DELETE FROM ");
        builder.push_identifier(&self.table);

        if self.predicate != ConcretePredicate::True {
            builder.push_str(" WHERE ");
            self.predicate.build(builder);
        }
    }
}
