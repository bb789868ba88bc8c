// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::{collections::HashMap, fmt::Debug, sync::Arc};

use indexmap::IndexMap;

use crate::sql::PhysicalColumnType;

use super::predicate::ColumnRef;

/// A table-backed entity: its name (used in diagnostics), table, identity column and typed
/// attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub name: String,
    pub table: String,
    pub primary_key: String,
    pub attributes: IndexMap<String, PhysicalColumnType>,
}

impl Entity {
    /// An entity with an integer identity column
    pub fn new(
        name: impl Into<String>,
        table: impl Into<String>,
        primary_key: impl Into<String>,
    ) -> Self {
        let primary_key = primary_key.into();
        let mut attributes = IndexMap::new();
        attributes.insert(primary_key.clone(), PhysicalColumnType::Int);

        Self {
            name: name.into(),
            table: table.into(),
            primary_key,
            attributes,
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, typ: PhysicalColumnType) -> Self {
        self.attributes.insert(name.into(), typ);
        self
    }

    pub fn attribute_type(&self, name: &str) -> Option<PhysicalColumnType> {
        self.attributes.get(name).copied()
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn primary_key_type(&self) -> Option<PhysicalColumnType> {
        self.attribute_type(&self.primary_key)
    }

    pub fn column(&self, name: impl Into<String>) -> ColumnRef {
        ColumnRef::new(self.table.clone(), name)
    }

    pub fn primary_key_column(&self) -> ColumnRef {
        self.column(self.primary_key.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationKind {
    /// The owner holds the foreign key (`posts.author_id -> authors.id`)
    BelongsTo,
    /// The target holds the foreign key (`authors.id <- posts.author_id`), many rows
    HasMany,
    /// The target holds the foreign key, at most one row
    HasOne,
}

/// A named relationship from an owner entity to a target entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Association {
    pub name: String,
    pub kind: AssociationKind,
    pub foreign_key: String,
    pub target: Arc<Entity>,
}

impl Association {
    /// The `(owner side, target side)` columns equated by a join from `owner` along this
    /// association.
    pub fn join_columns(&self, owner: &Entity) -> (ColumnRef, ColumnRef) {
        match self.kind {
            AssociationKind::BelongsTo => (
                owner.column(self.foreign_key.clone()),
                self.target.primary_key_column(),
            ),
            AssociationKind::HasMany | AssociationKind::HasOne => (
                owner.primary_key_column(),
                self.target.column(self.foreign_key.clone()),
            ),
        }
    }
}

/// Expands a relationship name into the association it names.
pub trait AssociationResolver: Send + Sync + Debug {
    fn resolve(&self, entity: &Entity, name: &str) -> Option<Association>;
}

/// An [`AssociationResolver`] holding associations registered per owner entity.
#[derive(Debug, Default, Clone)]
pub struct AssociationRegistry {
    associations: HashMap<(String, String), Association>,
}

impl AssociationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn belongs_to(
        self,
        owner: &Entity,
        name: impl Into<String>,
        foreign_key: impl Into<String>,
        target: Arc<Entity>,
    ) -> Self {
        self.register(owner, name, AssociationKind::BelongsTo, foreign_key, target)
    }

    pub fn has_many(
        self,
        owner: &Entity,
        name: impl Into<String>,
        foreign_key: impl Into<String>,
        target: Arc<Entity>,
    ) -> Self {
        self.register(owner, name, AssociationKind::HasMany, foreign_key, target)
    }

    pub fn has_one(
        self,
        owner: &Entity,
        name: impl Into<String>,
        foreign_key: impl Into<String>,
        target: Arc<Entity>,
    ) -> Self {
        self.register(owner, name, AssociationKind::HasOne, foreign_key, target)
    }

    fn register(
        mut self,
        owner: &Entity,
        name: impl Into<String>,
        kind: AssociationKind,
        foreign_key: impl Into<String>,
        target: Arc<Entity>,
    ) -> Self {
        let name = name.into();
        self.associations.insert(
            (owner.name.clone(), name.clone()),
            Association {
                name,
                kind,
                foreign_key: foreign_key.into(),
                target,
            },
        );
        self
    }
}

impl AssociationResolver for AssociationRegistry {
    fn resolve(&self, entity: &Entity, name: &str) -> Option<Association> {
        self.associations
            .get(&(entity.name.clone(), name.to_string()))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_columns_follow_the_foreign_key() {
        let authors = Arc::new(Entity::new("Author", "authors", "id"));
        let posts = Arc::new(
            Entity::new("Post", "posts", "id").with_attribute("author_id", PhysicalColumnType::Int),
        );
        let registry = AssociationRegistry::new()
            .belongs_to(&posts, "author", "author_id", authors.clone())
            .has_many(&authors, "posts", "author_id", posts.clone());

        let author = registry.resolve(&posts, "author").unwrap();
        assert_eq!(
            author.join_columns(&posts),
            (
                ColumnRef::new("posts", "author_id"),
                ColumnRef::new("authors", "id")
            )
        );

        let posts_of = registry.resolve(&authors, "posts").unwrap();
        assert_eq!(
            posts_of.join_columns(&authors),
            (
                ColumnRef::new("authors", "id"),
                ColumnRef::new("posts", "author_id")
            )
        );

        assert!(registry.resolve(&posts, "comments").is_none());
    }
}
