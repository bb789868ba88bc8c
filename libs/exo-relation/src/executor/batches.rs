// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use futures::Stream;
use tracing::{instrument, warn};

use async_stream::try_stream;

use crate::{
    config::{DEFAULT_BATCH_SIZE, DatabaseConfig},
    database_error::DatabaseError,
    relation::{
        Bind, ComparisonOp, Operand, Predicate, Projection, Relation, UnscopeField, WhereClause,
    },
    sql::{Ordering, Row, SQLOperation, SQLValue, connect::connection::Connection},
    transform::select_transformer::to_select,
};

/// How to scan a relation in batches
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOptions {
    /// Rows per batch, [`DEFAULT_BATCH_SIZE`] if not set
    pub batch_size: Option<usize>,
    /// The smallest identity to scan from
    pub start: Option<SQLValue>,
}

impl BatchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Batches of the configured size
    pub fn from_config(config: &DatabaseConfig) -> Self {
        Self {
            batch_size: Some(config.batch_size),
            start: None,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn with_start(mut self, start: impl Into<SQLValue>) -> Self {
        self.start = Some(start.into());
        self
    }
}

#[derive(Debug, Clone)]
enum LowerBound {
    None,
    AtLeast(SQLValue),
    After(SQLValue),
    /// The previous batch was the last one
    Exhausted,
}

/// Forward-only, keyset-paginated scan over a relation in identity order.
///
/// Each batch selects the next `batch_size` rows whose identity is greater than the last identity
/// of the previous batch. A batch smaller than `batch_size` is the last one.
pub struct BatchCursor<'a> {
    relation: Relation,
    connection: &'a dyn Connection,
    batch_size: usize,
    lower_bound: LowerBound,
}

impl<'a> BatchCursor<'a> {
    pub fn new(
        relation: &Relation,
        connection: &'a dyn Connection,
        options: BatchOptions,
    ) -> Result<Self, DatabaseError> {
        let batch_size = options.batch_size.unwrap_or(DEFAULT_BATCH_SIZE);
        if batch_size == 0 {
            return Err(DatabaseError::Argument(
                "Batch size must be positive".to_string(),
            ));
        }

        let entity = relation.entity();
        let primary_key = entity.primary_key_column();
        let projects_identity = relation.projections().is_empty()
            || relation.projections().iter().any(|projection| match projection {
                Projection::Column(column) => *column == primary_key,
                Projection::Raw(text) => {
                    text.trim() == entity.primary_key || text.trim() == primary_key.to_string()
                }
            });
        if !projects_identity {
            return Err(DatabaseError::Argument(format!(
                "The identity column {primary_key} must be selected to scan in batches"
            )));
        }

        // Checked before the limit is replaced: a relation limited to no row has no batches
        let exhausted = relation.is_null();

        if !relation.order_specs().is_empty() {
            warn!("Ignoring the order of the relation: batches are ordered by {primary_key}");
        }
        if !exhausted && (relation.limit_value().is_some() || relation.offset_value().is_some()) {
            warn!("Ignoring the limit and offset of the relation: batches set their own");
        }

        let relation = relation
            .unscope(&[UnscopeField::Order, UnscopeField::Limit, UnscopeField::Offset])
            .order(&entity.primary_key, Ordering::Asc)
            .limit(i64::try_from(batch_size).unwrap_or(i64::MAX));

        let lower_bound = if exhausted {
            LowerBound::Exhausted
        } else {
            match options.start {
                Some(start) => LowerBound::AtLeast(start),
                None => LowerBound::None,
            }
        };

        Ok(Self {
            relation,
            connection,
            batch_size,
            lower_bound,
        })
    }

    /// The next batch, `None` once the scan is complete
    #[instrument(name = "BatchCursor::next_batch", skip_all, fields(entity = %self.relation.entity().name))]
    pub async fn next_batch(&mut self) -> Result<Option<Vec<Row>>, DatabaseError> {
        let page = match &self.lower_bound {
            LowerBound::Exhausted => return Ok(None),
            LowerBound::None => self.relation.clone(),
            LowerBound::AtLeast(start) => self.bounded(ComparisonOp::GtEq, start.clone()),
            LowerBound::After(last) => self.bounded(ComparisonOp::Gt, last.clone()),
        };

        let rows = self
            .connection
            .query(&SQLOperation::Select(to_select(&page)?))
            .await?;

        if rows.len() < self.batch_size {
            self.lower_bound = LowerBound::Exhausted;
        } else {
            let primary_key = &self.relation.entity().primary_key;
            let last = rows
                .last()
                .and_then(|row| row.get(primary_key))
                .cloned()
                .ok_or_else(|| {
                    DatabaseError::Argument(format!(
                        "Batch rows carry no {primary_key} to continue from"
                    ))
                })?;
            self.lower_bound = LowerBound::After(last);
        }

        Ok(if rows.is_empty() { None } else { Some(rows) })
    }

    fn bounded(&self, op: ComparisonOp, value: SQLValue) -> Relation {
        let entity = self.relation.entity();
        let primary_key = entity.primary_key_column();
        let clause = WhereClause::new(
            vec![Predicate::Comparison(
                primary_key.clone(),
                op,
                Operand::Bind,
            )],
            vec![Bind::new(primary_key, value, entity.primary_key_type())],
        );

        self.relation
            .edit(|values| values.where_clause = values.where_clause.concat(&clause))
    }

    /// The remaining batches as a stream
    pub fn into_stream(mut self) -> impl Stream<Item = Result<Vec<Row>, DatabaseError>> + 'a {
        try_stream! {
            while let Some(batch) = self.next_batch().await? {
                yield batch;
            }
        }
    }
}

impl Relation {
    /// Scan the relation in batches (see [`BatchCursor`])
    pub fn in_batches<'a>(
        &self,
        connection: &'a dyn Connection,
        options: BatchOptions,
    ) -> Result<BatchCursor<'a>, DatabaseError> {
        BatchCursor::new(self, connection, options)
    }

    /// Every row of the relation, fetched in batches
    pub fn find_each<'a>(
        &self,
        connection: &'a dyn Connection,
        options: BatchOptions,
    ) -> impl Stream<Item = Result<Row, DatabaseError>> + use<'a> {
        let relation = self.clone();

        try_stream! {
            let mut cursor = BatchCursor::new(&relation, connection, options)?;
            while let Some(batch) = cursor.next_batch().await? {
                for row in batch {
                    yield row;
                }
            }
        }
    }
}
