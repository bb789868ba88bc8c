// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The concrete SQL layer: a small AST for the statements a relation lowers to, the builder that
//! renders it with `$n` placeholders, and the connection seam that executes it.

#[macro_use]
#[cfg(test)]
mod test_util;

mod column;
mod delete;
mod expression_builder;
mod function;
mod group_by;
mod insert;
mod join;
mod limit;
mod offset;
mod order;
mod physical_column_type;
mod predicate;
mod row;
mod select;
mod sql_builder;
mod sql_operation;
mod sql_value;
mod table;
mod update;

pub mod connect;

pub use column::Column;
pub use delete::Delete;
pub use expression_builder::ExpressionBuilder;
pub use function::Function;
pub use group_by::GroupBy;
pub use insert::Insert;
pub use join::{Join, JoinKind};
pub use limit::Limit;
pub use offset::Offset;
pub use order::{OrderBy, OrderByElement, Ordering};
pub use physical_column_type::PhysicalColumnType;
pub use predicate::ConcretePredicate;
pub use row::Row;
pub use select::Select;
pub use sql_builder::SQLBuilder;
pub use sql_operation::SQLOperation;
pub use sql_value::SQLValue;
pub(crate) use sql_value::decimal_from_f64;
pub use table::Table;
pub use update::Update;
