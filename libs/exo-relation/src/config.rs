// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Configuration read from the process environment (or a map standing in for it in tests).

use std::collections::HashMap;
use std::sync::Arc;

use crate::database_error::DatabaseError;

pub const EXO_POSTGRES_URL: &str = "EXO_POSTGRES_URL";
pub const EXO_POSTGRES_USER: &str = "EXO_POSTGRES_USER";
pub const EXO_POSTGRES_PASSWORD: &str = "EXO_POSTGRES_PASSWORD";
pub const EXO_CONNECTION_POOL_SIZE: &str = "EXO_CONNECTION_POOL_SIZE";
pub const EXO_CHECK_CONNECTION_ON_STARTUP: &str = "EXO_CHECK_CONNECTION_ON_STARTUP";
pub const EXO_BATCH_SIZE: &str = "EXO_BATCH_SIZE";

pub const DEFAULT_POOL_SIZE: usize = 10;
pub const DEFAULT_BATCH_SIZE: usize = 1000;

pub trait Environment: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn enabled(&self, key: &str, default_value: bool) -> Result<bool, DatabaseError> {
        match self.get(key) {
            Some(value) => match value.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" | "enabled" | "enable" => Ok(true),
                "false" | "0" | "no" | "off" | "disabled" | "disable" => Ok(false),
                _ => Err(DatabaseError::Config(format!(
                    "Invalid value for {key}: {value}. Expected true, 1, yes, on, enabled, enable OR false, 0, no, off, disabled, disable"
                ))),
            },
            None => Ok(default_value),
        }
    }

    fn get_or_else(&self, key: &str, default_value: &str) -> String {
        self.get(key).unwrap_or(default_value.to_string())
    }

    /// A positive integer setting, or `default_value` when unset
    fn positive_usize(&self, key: &str, default_value: usize) -> Result<usize, DatabaseError> {
        match self.get(key) {
            Some(value) => match value.trim().parse::<usize>() {
                Ok(parsed) if parsed > 0 => Ok(parsed),
                _ => Err(DatabaseError::Config(format!(
                    "Invalid value for {key}: {value}. Expected a positive integer"
                ))),
            },
            None => Ok(default_value),
        }
    }
}

pub struct SystemEnvironment;

impl Environment for SystemEnvironment {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Clone, Default)]
pub struct MapEnvironment {
    values: HashMap<String, String>,
    fallback: Option<Arc<dyn Environment>>,
}

impl Environment for MapEnvironment {
    fn get(&self, key: &str) -> Option<String> {
        self.values
            .get(key)
            .cloned()
            .or_else(|| self.fallback.as_ref().and_then(|fb| fb.get(key)))
    }
}

impl<const N: usize> From<[(&str, &str); N]> for MapEnvironment {
    fn from(values: [(&str, &str); N]) -> Self {
        Self {
            values: HashMap::from_iter(
                values
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v.to_string())),
            ),
            fallback: None,
        }
    }
}

impl MapEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_with_fallback(fallback: Arc<dyn Environment>) -> Self {
        Self {
            values: HashMap::new(),
            fallback: Some(fallback),
        }
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }
}

/// Settings for connecting to Postgres and for scanning in batches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub pool_size: usize,
    pub check_connection_on_startup: bool,
    pub batch_size: usize,
}

impl DatabaseConfig {
    pub fn from_env(env: &dyn Environment) -> Result<Self, DatabaseError> {
        let url = env.get(EXO_POSTGRES_URL).ok_or(DatabaseError::Config(format!(
            "Env {EXO_POSTGRES_URL} must be provided"
        )))?;

        Ok(Self {
            url,
            user: env.get(EXO_POSTGRES_USER),
            password: env.get(EXO_POSTGRES_PASSWORD),
            pool_size: env.positive_usize(EXO_CONNECTION_POOL_SIZE, DEFAULT_POOL_SIZE)?,
            check_connection_on_startup: env.enabled(EXO_CHECK_CONNECTION_ON_STARTUP, true)?,
            batch_size: env.positive_usize(EXO_BATCH_SIZE, DEFAULT_BATCH_SIZE)?,
        })
    }
}
