// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use tracing::{debug, instrument};

use crate::{
    database_error::DatabaseError,
    relation::Relation,
    sql::{SQLOperation, SQLValue, connect::connection::Connection},
    transform::mutation_transformer::{to_delete, to_insert, to_update},
};

impl Relation {
    /// Assign `assignments` to every matching row, returning the number of rows updated
    #[instrument(name = "Relation::update_all", skip_all, fields(entity = %self.entity().name))]
    pub async fn update_all(
        &self,
        connection: &dyn Connection,
        assignments: &[(&str, SQLValue)],
    ) -> Result<u64, DatabaseError> {
        if self.is_null() {
            debug!("Skipping the update of a relation matching no row");
            return Ok(0);
        }

        let update = to_update(self, assignments)?;
        connection.execute(&SQLOperation::Update(update)).await
    }

    /// Delete every matching row, returning the number of rows deleted
    #[instrument(name = "Relation::delete_all", skip_all, fields(entity = %self.entity().name))]
    pub async fn delete_all(&self, connection: &dyn Connection) -> Result<u64, DatabaseError> {
        if self.is_null() {
            debug!("Skipping the delete of a relation matching no row");
            return Ok(0);
        }

        let delete = to_delete(self)?;
        connection.execute(&SQLOperation::Delete(delete)).await
    }

    /// Insert a row, defaulting attributes from the relation's equality conditions. Returns the
    /// identity of the new row.
    #[instrument(name = "Relation::insert", skip_all, fields(entity = %self.entity().name))]
    pub async fn insert(
        &self,
        connection: &dyn Connection,
        attributes: &[(&str, SQLValue)],
    ) -> Result<SQLValue, DatabaseError> {
        let insert = to_insert(self, attributes)?;
        let rows = connection.query(&SQLOperation::Insert(insert)).await?;

        let primary_key = &self.entity().primary_key;
        rows.first()
            .and_then(|row| row.get(primary_key))
            .cloned()
            .ok_or_else(|| {
                DatabaseError::Validation(format!(
                    "Insert into {} returned no {primary_key}",
                    self.entity().table
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        relation::{AttributeMap, Condition},
        sql::Ordering,
        testing::fixtures::BlogFixture,
    };

    use super::*;

    #[test_log::test(tokio::test)]
    async fn update_matching_rows() {
        let fixture = BlogFixture::new();
        let connection = fixture.connection();
        let drafts = fixture
            .posts()
            .filter(AttributeMap::new().with("state", "published"))
            .unwrap();

        let updated = drafts
            .update_all(&connection, &[("state", "archived".into())])
            .await
            .unwrap();
        assert_eq!(updated, 3);
        assert_eq!(
            fixture
                .posts()
                .filter(AttributeMap::new().with("state", "archived"))
                .unwrap()
                .count(&connection)
                .await
                .unwrap(),
            4
        );
    }

    #[test_log::test(tokio::test)]
    async fn update_limited_rows() {
        let fixture = BlogFixture::new();
        let connection = fixture.connection();

        let updated = fixture
            .posts()
            .order("score", Ordering::Desc)
            .limit(2)
            .update_all(&connection, &[("score", 0.into())])
            .await
            .unwrap();
        assert_eq!(updated, 2);
        assert_eq!(
            fixture.posts().sum(&connection, "score").await.unwrap(),
            SQLValue::Int(60)
        );
    }

    #[test_log::test(tokio::test)]
    async fn delete_through_join() {
        let fixture = BlogFixture::new();
        let connection = fixture.connection();

        let deleted = fixture
            .posts()
            .joins("author")
            .filter(Condition::sql_with_binds("authors.name = ?", vec!["Grace".into()]))
            .unwrap()
            .delete_all(&connection)
            .await
            .unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(fixture.posts().count(&connection).await.unwrap(), 3);
    }

    #[test_log::test(tokio::test)]
    async fn mutations_through_referenced_include() {
        let fixture = BlogFixture::new();
        let connection = fixture.connection();
        let graces = fixture
            .posts()
            .includes("author")
            .references("author")
            .filter(Condition::sql_with_binds("authors.name = ?", vec!["Grace".into()]))
            .unwrap();

        assert_eq!(graces.load(&connection).await.unwrap().len(), 2);
        assert_eq!(
            graces
                .update_all(&connection, &[("score", 0.into())])
                .await
                .unwrap(),
            2
        );
        assert_eq!(
            fixture.posts().sum(&connection, "score").await.unwrap(),
            SQLValue::Int(90)
        );

        assert_eq!(graces.delete_all(&connection).await.unwrap(), 2);
        assert_eq!(fixture.posts().count(&connection).await.unwrap(), 3);
    }

    #[test_log::test(tokio::test)]
    async fn null_mutations_send_nothing() {
        let fixture = BlogFixture::new();
        let connection = fixture.connection();

        assert_eq!(fixture.posts().none().delete_all(&connection).await.unwrap(), 0);
        assert_eq!(
            fixture
                .posts()
                .limit(0)
                .update_all(&connection, &[("score", 1.into())])
                .await
                .unwrap(),
            0
        );
        // The null check comes first, even for options a delete can't express
        assert_eq!(
            fixture.posts().limit(0).delete_all(&connection).await.unwrap(),
            0
        );
        assert_eq!(connection.statement_count(), 0);

        assert!(matches!(
            fixture.posts().offset(1).delete_all(&connection).await,
            Err(DatabaseError::InvalidOptionCombination(_))
        ));
        assert_eq!(connection.statement_count(), 0);
    }

    #[test_log::test(tokio::test)]
    async fn insert_with_scope_defaults() {
        let fixture = BlogFixture::new();
        let connection = fixture.connection();
        let adas_drafts = fixture
            .posts()
            .filter(AttributeMap::new().with("author_id", 1).with("state", "draft"))
            .unwrap();

        let id = adas_drafts
            .insert(&connection, &[("title", "Macros".into()), ("score", 5.into())])
            .await
            .unwrap();
        assert_eq!(id, SQLValue::Int(6));

        let post = fixture.posts().find(&connection, id).await.unwrap();
        assert_eq!(post.get("author_id"), Some(&SQLValue::Int(1)));
        assert_eq!(post.get("state"), Some(&SQLValue::Text("draft".into())));
        assert_eq!(adas_drafts.count(&connection).await.unwrap(), 1);
    }
}
