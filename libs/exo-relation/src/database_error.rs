// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// A finder that requires a row found none. Only raised by the finder façade.
    #[error("Couldn't find {entity} with {condition}")]
    NotFound { entity: String, condition: String },

    /// A mutation was asked to run on a relation carrying clauses it cannot express.
    #[error("Invalid option combination: {0}")]
    InvalidOptionCombination(String),

    /// Malformed caller input (unsupported condition shape, unknown operation, etc.)
    #[error("Argument error: {0}")]
    Argument(String),

    #[error("Validation: {0}")]
    Validation(String),

    #[error("Delegate: {0}")]
    Delegate(#[from] tokio_postgres::Error),

    #[error("Pool: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error("{0} {1}")]
    WithContext(String, #[source] Box<DatabaseError>),

    #[error("{0}")]
    BoxedError(#[from] Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl DatabaseError {
    pub fn with_context(self, context: String) -> DatabaseError {
        DatabaseError::WithContext(context, Box::new(self))
    }

    pub fn not_found(entity: impl Into<String>, condition: impl Into<String>) -> DatabaseError {
        DatabaseError::NotFound {
            entity: entity.into(),
            condition: condition.into(),
        }
    }

    /// Is this (possibly wrapped) error a `NotFound`?
    pub fn is_not_found(&self) -> bool {
        match self {
            DatabaseError::NotFound { .. } => true,
            DatabaseError::WithContext(_, source) => source.is_not_found(),
            _ => false,
        }
    }
}

pub trait WithContext {
    fn with_context(self, context: String) -> Self;
}

impl<T> WithContext for Result<T, DatabaseError> {
    fn with_context(self, context: String) -> Result<T, DatabaseError> {
        self.map_err(|e| e.with_context(context))
    }
}
