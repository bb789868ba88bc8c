// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use async_trait::async_trait;

use crate::{
    database_error::DatabaseError,
    sql::{ExpressionBuilder, Row, SQLOperation, SQLValue},
};

/// The storage backend a relation executes against. Rendering happens on this side of the seam
/// (see [`Connection::render`]); implementations only run the resulting text and binds.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Run a statement that yields rows (a select, or a mutation with `RETURNING`).
    async fn query(&self, operation: &SQLOperation) -> Result<Vec<Row>, DatabaseError>;

    /// Run a statement and report the number of affected rows.
    async fn execute(&self, operation: &SQLOperation) -> Result<u64, DatabaseError>;

    /// Render an operation to its text and the values bound to its `$n` placeholders.
    fn render(&self, operation: &SQLOperation) -> (String, Vec<SQLValue>) {
        operation.to_sql()
    }

    /// Quote a value as an SQL literal.
    fn quote(&self, value: &SQLValue) -> String {
        match value {
            SQLValue::Null => "NULL".to_string(),
            SQLValue::Bool(true) => "TRUE".to_string(),
            SQLValue::Bool(false) => "FALSE".to_string(),
            SQLValue::Int(_) | SQLValue::Float(_) | SQLValue::Decimal(_) => value.to_string(),
            SQLValue::Text(text) => format!("'{}'", text.replace('\'', "''")),
        }
    }

    /// A name usable as a column alias. Postgres truncates identifiers at 63 bytes.
    fn table_alias_for(&self, name: &str) -> String {
        let alias: String = name
            .to_lowercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        let alias = alias.trim_matches('_');
        alias.chars().take(63).collect()
    }
}

/// Substitute each `$n` placeholder in `statement` with the quoted `n`-th value.
pub fn inline_params(
    statement: &str,
    params: &[SQLValue],
    quote: impl Fn(&SQLValue) -> String,
) -> String {
    let mut result = String::with_capacity(statement.len());
    let mut chars = statement.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let mut digits = String::new();
        while let Some(d) = chars.peek().filter(|d| d.is_ascii_digit()) {
            digits.push(*d);
            chars.next();
        }

        match digits
            .parse::<usize>()
            .ok()
            .and_then(|index| params.get(index.wrapping_sub(1)))
        {
            Some(param) => result.push_str(&quote(param)),
            None => {
                result.push('$');
                result.push_str(&digits);
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RenderOnly;

    #[async_trait]
    impl Connection for RenderOnly {
        async fn query(&self, _operation: &SQLOperation) -> Result<Vec<Row>, DatabaseError> {
            Ok(vec![])
        }

        async fn execute(&self, _operation: &SQLOperation) -> Result<u64, DatabaseError> {
            Ok(0)
        }
    }

    #[test]
    fn quoting() {
        assert_eq!(RenderOnly.quote(&"O'Brien".into()), "'O''Brien'");
        assert_eq!(RenderOnly.quote(&SQLValue::Null), "NULL");
        assert_eq!(RenderOnly.quote(&12.into()), "12");
    }

    #[test]
    fn aliases() {
        assert_eq!(RenderOnly.table_alias_for("count_all"), "count_all");
        assert_eq!(RenderOnly.table_alias_for("SUM(posts.score)"), "sum_posts_score");
        assert_eq!(RenderOnly.table_alias_for(&"x".repeat(80)).len(), 63);
    }

    #[test]
    fn inlining() {
        let inlined = inline_params(
            r#"SELECT * FROM "t" WHERE "t"."a" = $1 AND "t"."b" IN ($2, $10)"#,
            &["x".into(), 2.into()],
            |value| RenderOnly.quote(value),
        );

        assert_eq!(
            inlined,
            r#"SELECT * FROM "t" WHERE "t"."a" = 'x' AND "t"."b" IN (2, $10)"#
        );
    }
}
