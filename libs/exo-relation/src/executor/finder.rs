// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::{
    database_error::DatabaseError,
    relation::{AttributeMap, AttributeValue, Condition, Relation, UnscopeField},
    sql::{
        Ordering, PhysicalColumnType, Row, SQLOperation, SQLValue,
        connect::connection::{Connection, inline_params},
    },
    transform::select_transformer::to_select,
};

use super::hydrator::Hydrator;

impl Relation {
    /// The rows of the relation. The first call runs the select; later calls on this relation
    /// (or its unedited clones) reuse the rows.
    #[instrument(name = "Relation::load", skip_all, fields(entity = %self.entity().name))]
    pub async fn load(&self, connection: &dyn Connection) -> Result<Arc<Vec<Row>>, DatabaseError> {
        self.records()
            .get_or_try_init(|| self.fetch(connection))
            .await
            .cloned()
    }

    async fn fetch(&self, connection: &dyn Connection) -> Result<Arc<Vec<Row>>, DatabaseError> {
        if self.is_null() {
            debug!("Skipping the select of a relation matching no row");
            return Ok(Arc::new(vec![]));
        }

        let rows = connection
            .query(&SQLOperation::Select(to_select(self)?))
            .await?;
        Ok(Arc::new(rows))
    }

    /// The records of the relation
    pub async fn load_with<H: Hydrator>(
        &self,
        connection: &dyn Connection,
        hydrator: &H,
    ) -> Result<Vec<H::Record>, DatabaseError> {
        let rows = self.load(connection).await?;
        rows.iter()
            .cloned()
            .map(|row| hydrator.hydrate(row))
            .collect()
    }

    /// The row with the given identity. An identity that cannot be an identity of the entity
    /// finds nothing.
    pub async fn find(
        &self,
        connection: &dyn Connection,
        id: impl Into<SQLValue>,
    ) -> Result<Row, DatabaseError> {
        let id = id.into();
        let entity = self.entity();
        let condition = format!("'{}'={id}", entity.primary_key);

        let id = self.cast_identity(&id, &condition)?;
        self.filter(AttributeMap::new().with(entity.primary_key.clone(), id))?
            .take(connection)
            .await?
            .ok_or_else(|| DatabaseError::not_found(&entity.name, condition))
    }

    /// The rows with the given identities, in the order given. Every identity must be found.
    pub async fn find_many(
        &self,
        connection: &dyn Connection,
        ids: Vec<SQLValue>,
    ) -> Result<Vec<Row>, DatabaseError> {
        let entity = self.entity();
        let condition = format!(
            "'{}' IN ({})",
            entity.primary_key,
            ids.iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let ids = ids
            .iter()
            .map(|id| self.cast_identity(id, &condition))
            .collect::<Result<Vec<_>, _>>()?;
        let rows = self
            .filter(
                AttributeMap::new()
                    .with(entity.primary_key.clone(), AttributeValue::List(ids.clone())),
            )?
            .load(connection)
            .await?;

        ids.iter()
            .map(|id| {
                rows.iter()
                    .find(|row| row.get(&entity.primary_key) == Some(id))
                    .cloned()
                    .ok_or_else(|| DatabaseError::not_found(&entity.name, condition.clone()))
            })
            .collect()
    }

    fn cast_identity(&self, id: &SQLValue, condition: &str) -> Result<SQLValue, DatabaseError> {
        let entity = self.entity();
        entity
            .primary_key_type()
            .unwrap_or(PhysicalColumnType::Int)
            .cast(id)
            .map_err(|_| DatabaseError::not_found(&entity.name, condition))
    }

    /// Some row matching `condition`
    pub async fn find_by(
        &self,
        connection: &dyn Connection,
        condition: impl Into<Condition>,
    ) -> Result<Option<Row>, DatabaseError> {
        self.filter(condition)?.take(connection).await
    }

    /// Some row matching `condition`, which must exist
    pub async fn find_by_or_err(
        &self,
        connection: &dyn Connection,
        condition: impl Into<Condition>,
    ) -> Result<Row, DatabaseError> {
        let condition = condition.into();
        let description = format!("{condition:?}");

        self.find_by(connection, condition)
            .await?
            .ok_or_else(|| DatabaseError::not_found(&self.entity().name, description))
    }

    /// The first row in the relation's order (its identity if unordered)
    pub async fn first(&self, connection: &dyn Connection) -> Result<Option<Row>, DatabaseError> {
        Ok(self.first_n(connection, 1).await?.into_iter().next())
    }

    pub async fn first_n(
        &self,
        connection: &dyn Connection,
        n: usize,
    ) -> Result<Vec<Row>, DatabaseError> {
        if let Some(rows) = self.loaded_rows() {
            return Ok(rows.iter().take(n).cloned().collect());
        }

        let limit = self.bounded_limit(n);
        let rows = self.ordered().limit(limit).load(connection).await?;
        Ok(rows.as_ref().clone())
    }

    pub async fn first_or_err(&self, connection: &dyn Connection) -> Result<Row, DatabaseError> {
        self.first(connection)
            .await?
            .ok_or_else(|| self.not_found())
    }

    /// The last row in the relation's order (its identity if unordered)
    pub async fn last(&self, connection: &dyn Connection) -> Result<Option<Row>, DatabaseError> {
        Ok(self.last_n(connection, 1).await?.pop())
    }

    /// The last `n` rows, in the relation's order
    pub async fn last_n(
        &self,
        connection: &dyn Connection,
        n: usize,
    ) -> Result<Vec<Row>, DatabaseError> {
        // Reversing the order of a limited relation would pick different rows
        let rows = if self.limit_value().is_some() || self.offset_value().is_some() {
            self.load(connection).await?
        } else if let Some(rows) = self.loaded_rows() {
            rows
        } else {
            let mut rows = self
                .ordered()
                .reverse_order()
                .limit(as_limit(n))
                .load(connection)
                .await?
                .as_ref()
                .clone();
            rows.reverse();
            return Ok(rows);
        };

        let skip = rows.len().saturating_sub(n);
        Ok(rows.iter().skip(skip).cloned().collect())
    }

    pub async fn last_or_err(&self, connection: &dyn Connection) -> Result<Row, DatabaseError> {
        self.last(connection)
            .await?
            .ok_or_else(|| self.not_found())
    }

    /// Some row, in no particular order
    pub async fn take(&self, connection: &dyn Connection) -> Result<Option<Row>, DatabaseError> {
        Ok(self.take_n(connection, 1).await?.into_iter().next())
    }

    pub async fn take_n(
        &self,
        connection: &dyn Connection,
        n: usize,
    ) -> Result<Vec<Row>, DatabaseError> {
        if let Some(rows) = self.loaded_rows() {
            return Ok(rows.iter().take(n).cloned().collect());
        }

        let rows = self.limit(self.bounded_limit(n)).load(connection).await?;
        Ok(rows.as_ref().clone())
    }

    pub async fn take_or_err(&self, connection: &dyn Connection) -> Result<Row, DatabaseError> {
        self.take(connection)
            .await?
            .ok_or_else(|| self.not_found())
    }

    /// Does any row match?
    #[instrument(name = "Relation::exists", skip_all, fields(entity = %self.entity().name))]
    pub async fn exists(&self, connection: &dyn Connection) -> Result<bool, DatabaseError> {
        if let Some(rows) = self.loaded_rows() {
            return Ok(!rows.is_empty());
        }
        if self.is_null() {
            return Ok(false);
        }

        let existence = self
            .unscope(&[UnscopeField::Select, UnscopeField::Order])
            .select(&["1 AS one"])
            .limit(1);
        let rows = connection
            .query(&SQLOperation::Select(to_select(&existence)?))
            .await?;

        Ok(!rows.is_empty())
    }

    /// The values of `columns` for each row
    pub async fn pluck(
        &self,
        connection: &dyn Connection,
        columns: &[&str],
    ) -> Result<Vec<Vec<SQLValue>>, DatabaseError> {
        let cached = self.projections().is_empty()
            && columns.iter().all(|c| self.entity().has_attribute(c));
        if let Some(rows) = self.loaded_rows().filter(|_| cached) {
            return Ok(rows
                .iter()
                .map(|row| {
                    columns
                        .iter()
                        .map(|c| row.get(c).cloned().unwrap_or(SQLValue::Null))
                        .collect()
                })
                .collect());
        }
        if self.is_null() {
            return Ok(vec![]);
        }

        let relation = self.unscope(&[UnscopeField::Select]).select(columns);
        let rows = connection
            .query(&SQLOperation::Select(to_select(&relation)?))
            .await?;

        Ok(rows.into_iter().map(Row::into_values).collect())
    }

    /// The identities of the rows
    pub async fn ids(&self, connection: &dyn Connection) -> Result<Vec<SQLValue>, DatabaseError> {
        let primary_key = self.entity().primary_key.clone();
        Ok(self
            .pluck(connection, &[primary_key.as_str()])
            .await?
            .into_iter()
            .filter_map(|values| values.into_iter().next())
            .collect())
    }

    /// The select with its binds inlined, for diagnostics
    pub fn to_sql(&self, connection: &dyn Connection) -> Result<String, DatabaseError> {
        let operation = SQLOperation::Select(to_select(self)?);
        let (statement, params) = connection.render(&operation);
        Ok(inline_params(&statement, &params, |value| {
            connection.quote(value)
        }))
    }

    /// The relation ordered by its identity unless already ordered
    fn ordered(&self) -> Relation {
        if self.order_specs().is_empty() {
            self.order(&self.entity().primary_key, Ordering::Asc)
        } else {
            self.clone()
        }
    }

    /// `n`, capped by the relation's own limit
    fn bounded_limit(&self, n: usize) -> i64 {
        let n = as_limit(n);
        match self.limit_value() {
            Some(limit) => limit.min(n),
            None => n,
        }
    }

    fn not_found(&self) -> DatabaseError {
        let condition = match self.where_clause().to_predicate() {
            Some(predicate) => format!("{predicate:?}"),
            None => "no condition".to_string(),
        };
        DatabaseError::not_found(&self.entity().name, condition)
    }
}

fn as_limit(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use crate::{
        executor::RowHydrator,
        relation::AttributeMap,
        testing::fixtures::BlogFixture,
    };

    use super::*;

    fn ids(rows: &[Row]) -> Vec<i64> {
        rows.iter()
            .filter_map(|row| row.get("id").and_then(SQLValue::as_i64))
            .collect()
    }

    #[test_log::test(tokio::test)]
    async fn first_and_last_follow_identity() {
        let fixture = BlogFixture::new();
        let connection = fixture.connection_with_items(20);
        let items = fixture.items();

        let first = items.first(&connection).await.unwrap().unwrap();
        assert_eq!(first.get("id"), Some(&SQLValue::Int(1)));

        let last = items.last(&connection).await.unwrap().unwrap();
        assert_eq!(last.get("id"), Some(&SQLValue::Int(20)));

        let last_three = items.last_n(&connection, 3).await.unwrap();
        assert_eq!(ids(&last_three), vec![18, 19, 20]);

        let first_two = items.first_n(&connection, 2).await.unwrap();
        assert_eq!(ids(&first_two), vec![1, 2]);
    }

    #[test_log::test(tokio::test)]
    async fn last_of_ordered_relation() {
        let fixture = BlogFixture::new();
        let connection = fixture.connection();
        let posts = fixture.posts().order("score", Ordering::Desc);

        let last = posts.last(&connection).await.unwrap().unwrap();
        assert_eq!(last.get("score"), Some(&SQLValue::Int(10)));

        let last_two = posts.last_n(&connection, 2).await.unwrap();
        assert_eq!(ids(&last_two), vec![3, 1]);
    }

    #[test_log::test(tokio::test)]
    async fn find_by_identity() {
        let fixture = BlogFixture::new();
        let connection = fixture.connection();
        let posts = fixture.posts();

        let post = posts.find(&connection, 3).await.unwrap();
        assert_eq!(post.get("title"), Some(&SQLValue::Text("Closures".into())));

        // Castable text identities are accepted
        assert!(posts.find(&connection, "4").await.is_ok());

        let missing = posts.find(&connection, 42).await.unwrap_err();
        assert!(missing.is_not_found());

        // Not an identity at all: still a NotFound, and nothing is sent
        let before = connection.statement_count();
        let invalid = posts.find(&connection, "abc").await.unwrap_err();
        assert!(invalid.is_not_found());
        assert_eq!(connection.statement_count(), before);
    }

    #[test_log::test(tokio::test)]
    async fn find_many_requires_every_identity() {
        let fixture = BlogFixture::new();
        let connection = fixture.connection();
        let posts = fixture.posts();

        let found = posts
            .find_many(&connection, vec![4.into(), 2.into()])
            .await
            .unwrap();
        assert_eq!(ids(&found), vec![4, 2]);

        assert!(
            posts
                .find_many(&connection, vec![1.into(), 99.into()])
                .await
                .unwrap_err()
                .is_not_found()
        );
    }

    #[test_log::test(tokio::test)]
    async fn required_finders() {
        let fixture = BlogFixture::new();
        let connection = fixture.connection();
        let nothing = fixture
            .posts()
            .filter(AttributeMap::new().with("state", "deleted"))
            .unwrap();

        assert!(nothing.first_or_err(&connection).await.unwrap_err().is_not_found());
        assert!(nothing.last_or_err(&connection).await.unwrap_err().is_not_found());
        assert!(nothing.take_or_err(&connection).await.unwrap_err().is_not_found());
        assert!(
            fixture
                .posts()
                .find_by_or_err(&connection, AttributeMap::new().with("title", "Nope"))
                .await
                .unwrap_err()
                .is_not_found()
        );

        let by_title = fixture
            .posts()
            .find_by(&connection, AttributeMap::new().with("title", "Traits"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_title.get("id"), Some(&SQLValue::Int(4)));
    }

    #[test_log::test(tokio::test)]
    async fn loaded_relations_answer_from_cache() {
        let fixture = BlogFixture::new();
        let connection = fixture.connection();
        let posts = fixture.posts().order("id", Ordering::Asc);

        let rows = posts.load(&connection).await.unwrap();
        assert_eq!(rows.len(), 5);
        assert!(posts.is_loaded());
        let count = connection.statement_count();

        let cloned = posts.clone();
        assert_eq!(cloned.load(&connection).await.unwrap().len(), 5);
        assert_eq!(ids(&posts.first_n(&connection, 2).await.unwrap()), vec![1, 2]);
        assert_eq!(ids(&posts.last_n(&connection, 1).await.unwrap()), vec![5]);
        assert!(posts.exists(&connection).await.unwrap());
        assert_eq!(posts.pluck(&connection, &["id"]).await.unwrap().len(), 5);
        assert_eq!(connection.statement_count(), count);

        // An edited relation has its own cache
        let limited = posts.limit(2);
        assert!(!limited.is_loaded());
        assert_eq!(limited.load(&connection).await.unwrap().len(), 2);
        assert_eq!(connection.statement_count(), count + 1);
    }

    #[test_log::test(tokio::test)]
    async fn null_relations_send_nothing() {
        let fixture = BlogFixture::new();
        let connection = fixture.connection();
        let none = fixture.posts().none();

        assert!(none.load(&connection).await.unwrap().is_empty());
        assert!(!none.exists(&connection).await.unwrap());
        assert!(none.pluck(&connection, &["title"]).await.unwrap().is_empty());
        assert!(fixture.posts().limit(0).ids(&connection).await.unwrap().is_empty());
        assert_eq!(connection.statement_count(), 0);
    }

    #[test_log::test(tokio::test)]
    async fn pluck_and_hydrate() {
        let fixture = BlogFixture::new();
        let connection = fixture.connection();
        let published = fixture
            .posts()
            .filter(AttributeMap::new().with("state", "published"))
            .unwrap()
            .order("id", Ordering::Asc);

        assert_eq!(
            published.pluck(&connection, &["id", "score"]).await.unwrap(),
            vec![
                vec![SQLValue::Int(1), SQLValue::Int(10)],
                vec![SQLValue::Int(2), SQLValue::Int(30)],
                vec![SQLValue::Int(4), SQLValue::Int(50)],
            ]
        );
        assert_eq!(
            published.ids(&connection).await.unwrap(),
            vec![SQLValue::Int(1), SQLValue::Int(2), SQLValue::Int(4)]
        );

        let titles = published
            .load_with(&connection, &|row: Row| {
                row.get("title")
                    .and_then(|title| title.as_str().map(str::to_string))
                    .ok_or_else(|| DatabaseError::Validation("title".into()))
            })
            .await
            .unwrap();
        assert_eq!(titles, vec!["Ownership", "Generics", "Traits"]);

        let rows = published.load_with(&connection, &RowHydrator).await.unwrap();
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn renders_with_inlined_binds() {
        let fixture = BlogFixture::new();
        let connection = fixture.connection();
        let posts = fixture
            .posts()
            .filter(AttributeMap::new().with("title", "It's"))
            .unwrap()
            .limit(2);

        assert_eq!(
            posts.to_sql(&connection).unwrap(),
            r#"SELECT "posts".* FROM "posts" WHERE "posts"."title" = 'It''s' LIMIT 2"#
        );
    }
}
