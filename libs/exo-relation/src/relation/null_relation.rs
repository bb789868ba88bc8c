// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use super::Relation;

impl Relation {
    /// Is this relation known to match no row? Executing a null relation sends nothing to the
    /// connection.
    pub fn is_null(&self) -> bool {
        self.limit_value() == Some(0) || self.where_clause().is_contradiction()
    }
}
