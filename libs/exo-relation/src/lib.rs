// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

/// The core idea in this library is that of a [Relation]: an immutable, chainable description of
/// a query over one [Entity]. Each refinement (`filter`, `joins`, `order`, `limit`, ...) returns a
/// new relation that shares its unchanged clause values with the one it was derived from, so
/// relations can be handed around and refined freely. Relations combine with [Merger] and with
/// `any_of`/`none_of`, and a relation known to match nothing ([Relation::none]) never reaches the
/// database.
///
/// Nothing is executed until a finder (`load`, `first`, `find`, `pluck`, ...), a calculation
/// (`count`, `sum`, grouped calculations), a batch cursor ([BatchCursor]) or a bulk mutation
/// (`update_all`, `delete_all`) runs against a [Connection]. At that point the relation is lowered
/// to an SQL operation and rendered with `$n` placeholders for its binds.
///
/// [PostgresConnection] runs statements through a connection pool. Enabling the `test-support`
/// feature exposes an in-memory connection and fixtures for tests of code built on relations.
#[macro_use]
pub mod sql;
pub mod calculation;
pub mod config;
pub mod database_error;
pub mod executor;
pub mod relation;
mod transform;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

/// Public types at the root level of this crate
pub use calculation::{Calculated, GroupKeyValue, GroupedCalculation, Operation};
pub use config::{DatabaseConfig, Environment, MapEnvironment, SystemEnvironment};
pub use database_error::DatabaseError;
pub use executor::{BatchCursor, BatchOptions, Hydrator, RowHydrator};
pub use relation::{
    AlternativeKind, Association, AssociationKind, AssociationRegistry, AssociationResolver,
    AttributeMap, AttributeValue, Bind, Condition, Entity, Merger, Predicate, Relation,
    WhereClause,
};
pub use sql::{
    PhysicalColumnType, Row, SQLOperation, SQLValue,
    connect::{connection::Connection, postgres::PostgresConnection},
};

pub use pg_bigdecimal::BigDecimal;
