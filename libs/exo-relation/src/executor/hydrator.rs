// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use crate::{database_error::DatabaseError, sql::Row};

/// Turns raw rows into domain records.
pub trait Hydrator {
    type Record;

    fn hydrate(&self, row: Row) -> Result<Self::Record, DatabaseError>;
}

/// Keeps rows as they are
#[derive(Debug, Clone, Copy, Default)]
pub struct RowHydrator;

impl Hydrator for RowHydrator {
    type Record = Row;

    fn hydrate(&self, row: Row) -> Result<Row, DatabaseError> {
        Ok(row)
    }
}

impl<F, R> Hydrator for F
where
    F: Fn(Row) -> Result<R, DatabaseError>,
{
    type Record = R;

    fn hydrate(&self, row: Row) -> Result<R, DatabaseError> {
        self(row)
    }
}
