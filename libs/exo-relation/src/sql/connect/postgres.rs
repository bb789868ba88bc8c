// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::str::FromStr;

use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use pg_bigdecimal::PgNumeric;
use tokio_postgres::{
    Config,
    types::{ToSql, Type},
};
use tracing::{debug, error, instrument};

use crate::{
    config::DatabaseConfig,
    database_error::DatabaseError,
    sql::{Row, SQLOperation, SQLValue},
};

use super::connection::Connection;

/// A [`Connection`] backed by a pool of Postgres clients.
pub struct PostgresConnection {
    pool: Pool,
}

impl PostgresConnection {
    pub async fn from_config(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let mut pg_config = Config::from_str(&config.url).map_err(|e| {
            DatabaseError::Delegate(e)
                .with_context("Failed to parse PostgreSQL connection string".into())
        })?;

        if let Some(user) = &config.user {
            pg_config.user(user);
        }
        if let Some(password) = &config.password {
            pg_config.password(password);
        }

        if pg_config.get_user().is_none() {
            return Err(DatabaseError::Config("Database user must be specified as a part of EXO_POSTGRES_URL or through EXO_POSTGRES_USER".into()));
        }

        let manager_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };
        let manager = Manager::from_config(pg_config, tokio_postgres::NoTls, manager_config);

        let pool = Pool::builder(manager)
            .max_size(config.pool_size)
            .build()
            .map_err(|e| DatabaseError::Config(format!("Failed to create DB pool: {e}")))?;

        let connection = Self { pool };

        if config.check_connection_on_startup {
            let _ = connection.pool.get().await?;
        }

        Ok(connection)
    }

    pub fn from_pool(pool: Pool) -> Self {
        Self { pool }
    }

    async fn run_query(
        &self,
        operation: &SQLOperation,
    ) -> Result<Vec<tokio_postgres::Row>, DatabaseError> {
        let (stmt, params) = self.render(operation);
        let params: Vec<&(dyn ToSql + Sync)> = params
            .iter()
            .map(|p| p as &(dyn ToSql + Sync))
            .collect();

        debug!("Executing SQL operation: {}", stmt);

        let client = self.pool.get().await?;
        client.query(&stmt, &params[..]).await.map_err(|e| {
            error!("Failed to execute query: {e:?}");
            DatabaseError::Delegate(e).with_context("Database operation failed".into())
        })
    }
}

#[async_trait]
impl Connection for PostgresConnection {
    #[instrument(name = "PostgresConnection::query", skip_all)]
    async fn query(&self, operation: &SQLOperation) -> Result<Vec<Row>, DatabaseError> {
        self.run_query(operation)
            .await?
            .iter()
            .map(to_row)
            .collect()
    }

    #[instrument(name = "PostgresConnection::execute", skip_all)]
    async fn execute(&self, operation: &SQLOperation) -> Result<u64, DatabaseError> {
        let (stmt, params) = self.render(operation);
        let params: Vec<&(dyn ToSql + Sync)> = params
            .iter()
            .map(|p| p as &(dyn ToSql + Sync))
            .collect();

        debug!("Executing SQL operation: {}", stmt);

        let client = self.pool.get().await?;
        client.execute(&stmt, &params[..]).await.map_err(|e| {
            error!("Failed to execute statement: {e:?}");
            DatabaseError::Delegate(e).with_context("Database operation failed".into())
        })
    }
}

fn to_row(pg_row: &tokio_postgres::Row) -> Result<Row, DatabaseError> {
    let mut row = Row::new();
    for (index, column) in pg_row.columns().iter().enumerate() {
        row.insert(column.name(), column_value(pg_row, index, column.type_())?);
    }
    Ok(row)
}

fn column_value(
    pg_row: &tokio_postgres::Row,
    index: usize,
    typ: &Type,
) -> Result<SQLValue, DatabaseError> {
    let value: SQLValue = if *typ == Type::BOOL {
        pg_row.try_get::<_, Option<bool>>(index)?.into()
    } else if *typ == Type::INT2 {
        pg_row.try_get::<_, Option<i16>>(index)?.into()
    } else if *typ == Type::INT4 {
        pg_row.try_get::<_, Option<i32>>(index)?.into()
    } else if *typ == Type::INT8 {
        pg_row.try_get::<_, Option<i64>>(index)?.into()
    } else if *typ == Type::FLOAT4 {
        pg_row.try_get::<_, Option<f32>>(index)?.into()
    } else if *typ == Type::FLOAT8 {
        pg_row.try_get::<_, Option<f64>>(index)?.into()
    } else if *typ == Type::NUMERIC {
        pg_row
            .try_get::<_, Option<PgNumeric>>(index)?
            .and_then(|numeric| numeric.n)
            .into()
    } else if *typ == Type::TEXT
        || *typ == Type::VARCHAR
        || *typ == Type::BPCHAR
        || *typ == Type::NAME
    {
        pg_row.try_get::<_, Option<String>>(index)?.into()
    } else {
        return Err(DatabaseError::Validation(format!(
            "Unsupported column type {typ} in result row"
        )));
    };
    Ok(value)
}
