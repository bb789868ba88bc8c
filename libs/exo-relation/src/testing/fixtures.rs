// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! A small blog schema (authors, their posts and avatars) and a numbered `items` table, for tests
//! of relations and of code built on them.

use std::sync::Arc;

use crate::{
    relation::{AssociationRegistry, Entity, Relation},
    sql::{PhysicalColumnType, Row, SQLValue},
};

use super::MemoryConnection;

pub struct BlogFixture {
    authors: Arc<Entity>,
    posts: Arc<Entity>,
    avatars: Arc<Entity>,
    items: Arc<Entity>,
    registry: Arc<AssociationRegistry>,
}

impl BlogFixture {
    pub fn new() -> Self {
        let authors = Arc::new(
            Entity::new("Author", "authors", "id")
                .with_attribute("name", PhysicalColumnType::String)
                .with_attribute("age", PhysicalColumnType::Int),
        );
        let posts = Arc::new(
            Entity::new("Post", "posts", "id")
                .with_attribute("title", PhysicalColumnType::String)
                .with_attribute("state", PhysicalColumnType::String)
                .with_attribute("score", PhysicalColumnType::Int)
                .with_attribute("author_id", PhysicalColumnType::Int),
        );
        let avatars = Arc::new(
            Entity::new("Avatar", "avatars", "id")
                .with_attribute("author_id", PhysicalColumnType::Int)
                .with_attribute("url", PhysicalColumnType::String),
        );
        let items = Arc::new(
            Entity::new("Item", "items", "id").with_attribute("value", PhysicalColumnType::Int),
        );

        let registry = AssociationRegistry::new()
            .belongs_to(&posts, "author", "author_id", authors.clone())
            .has_many(&authors, "posts", "author_id", posts.clone())
            .has_one(&authors, "avatar", "author_id", avatars.clone())
            .belongs_to(&avatars, "author", "author_id", authors.clone());

        Self {
            authors,
            posts,
            avatars,
            items,
            registry: Arc::new(registry),
        }
    }

    pub fn authors(&self) -> Relation {
        self.relation(&self.authors)
    }

    pub fn posts(&self) -> Relation {
        self.relation(&self.posts)
    }

    pub fn avatars(&self) -> Relation {
        self.relation(&self.avatars)
    }

    pub fn items(&self) -> Relation {
        self.relation(&self.items)
    }

    fn relation(&self, entity: &Arc<Entity>) -> Relation {
        Relation::new(entity.clone(), self.registry.clone())
    }

    /// A connection holding two authors, five posts and one avatar
    ///
    /// | post | title     | state     | score | author  |
    /// |------|-----------|-----------|-------|---------|
    /// | 1    | Ownership | published | 10    | 1 Ada   |
    /// | 2    | Generics  | published | 30    | 1 Ada   |
    /// | 3    | Closures  | draft     | 20    | 2 Grace |
    /// | 4    | Traits    | published | 50    | 1 Ada   |
    /// | 5    | Lifetimes | archived  | 40    | 2 Grace |
    pub fn connection(&self) -> MemoryConnection {
        let authors = vec![author(1, "Ada", 36), author(2, "Grace", 45)];
        let posts = vec![
            post(1, "Ownership", "published", 10, 1),
            post(2, "Generics", "published", 30, 1),
            post(3, "Closures", "draft", 20, 2),
            post(4, "Traits", "published", 50, 1),
            post(5, "Lifetimes", "archived", 40, 2),
        ];
        let avatars = vec![
            Row::new()
                .with("id", 1)
                .with("author_id", 1)
                .with("url", "https://example.com/ada.png"),
        ];

        MemoryConnection::new()
            .with_table("authors", authors)
            .with_table("posts", posts)
            .with_table("avatars", avatars)
            .with_table("items", vec![])
    }

    /// The blog data along with items `1..=count`, each valued at three times its id
    pub fn connection_with_items(&self, count: i64) -> MemoryConnection {
        let items = (1..=count)
            .map(|id| Row::new().with("id", id).with("value", id * 3))
            .collect();

        self.connection().with_table("items", items)
    }
}

impl Default for BlogFixture {
    fn default() -> Self {
        Self::new()
    }
}

fn author(id: i64, name: &str, age: i64) -> Row {
    Row::from_pairs([
        ("id", SQLValue::Int(id)),
        ("name", name.into()),
        ("age", SQLValue::Int(age)),
    ])
}

fn post(id: i64, title: &str, state: &str, score: i64, author_id: i64) -> Row {
    Row::new()
        .with("id", id)
        .with("title", title)
        .with("state", state)
        .with("score", score)
        .with("author_id", author_id)
}
