// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use super::{
    ExpressionBuilder, SQLBuilder, delete::Delete, insert::Insert, select::Select, update::Update,
};

/// Top-level SQL operation, which may be executed by the database.
#[derive(Debug, Clone, PartialEq)]
pub enum SQLOperation {
    Select(Select),
    Insert(Insert),
    Delete(Delete),
    Update(Update),
}

impl ExpressionBuilder for SQLOperation {
    fn build(&self, builder: &mut SQLBuilder) {
        match self {
            SQLOperation::Select(select) => select.build(builder),
            SQLOperation::Insert(insert) => insert.build(builder),
            SQLOperation::Delete(delete) => delete.build(builder),
            SQLOperation::Update(update) => update.build(builder),
        }
    }
}
