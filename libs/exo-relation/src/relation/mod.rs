// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The relation: an immutable, incrementally built query over one entity.
//!
//! Every builder method takes `&self` and returns a new [`Relation`]. Clones share their clause
//! values until one of them is edited, at which point the edited copy gets its own values and a
//! fresh (empty) cache of loaded rows.

mod alternative;
mod bind;
mod entity;
mod merger;
mod null_relation;
mod predicate;
mod predicate_builder;
mod values;
mod where_clause;

use std::sync::Arc;

use indexmap::IndexMap;
use tokio::sync::OnceCell;

use crate::{
    database_error::DatabaseError,
    sql::{Ordering, Row, SQLValue},
};

pub use alternative::AlternativeKind;
pub use bind::Bind;
pub use entity::{Association, AssociationKind, AssociationRegistry, AssociationResolver, Entity};
pub use merger::Merger;
pub use predicate::{ColumnRef, ComparisonOp, InList, Operand, Predicate, placeholder_count};
pub use predicate_builder::{AttributeMap, AttributeValue, Condition, PredicateBuilder};
pub use values::{FromClause, GroupKey, JoinSpec, LockMode, OrderSpec, Projection, UnscopeField};
pub use where_clause::WhereClause;

/// The clause values of a relation
#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct RelationValues {
    pub where_clause: WhereClause,
    pub having_clause: WhereClause,
    pub joins: Vec<JoinSpec>,
    pub includes: Vec<String>,
    pub eager_load: Vec<String>,
    pub references: Vec<String>,
    pub projections: Vec<Projection>,
    pub group_keys: Vec<GroupKey>,
    pub order: Vec<OrderSpec>,
    /// The order replaces (rather than extends) the order of a relation this is merged into
    pub reordering: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub lock: Option<LockMode>,
    pub from: Option<FromClause>,
    pub distinct: bool,
    pub extensions: Vec<String>,
}

#[derive(Clone)]
pub struct Relation {
    entity: Arc<Entity>,
    resolver: Arc<dyn AssociationResolver>,
    values: Arc<RelationValues>,
    /// Rows loaded by the first execution, shared by clones until one of them is edited
    records: Arc<OnceCell<Arc<Vec<Row>>>>,
}

impl Relation {
    /// An unfiltered relation over all rows of `entity`
    pub fn new(entity: Arc<Entity>, resolver: Arc<dyn AssociationResolver>) -> Self {
        Self {
            entity,
            resolver,
            values: Arc::new(RelationValues::default()),
            records: Arc::new(OnceCell::new()),
        }
    }

    pub fn entity(&self) -> &Arc<Entity> {
        &self.entity
    }

    pub fn resolver(&self) -> &Arc<dyn AssociationResolver> {
        &self.resolver
    }

    pub(crate) fn values(&self) -> &RelationValues {
        &self.values
    }

    pub(crate) fn records(&self) -> &OnceCell<Arc<Vec<Row>>> {
        &self.records
    }

    /// A copy with `edit` applied to its values and an empty row cache
    pub(crate) fn edit(&self, edit: impl FnOnce(&mut RelationValues)) -> Relation {
        let mut values = self.values.clone();
        edit(Arc::make_mut(&mut values));
        self.with_values(values)
    }

    fn with_values(&self, values: Arc<RelationValues>) -> Relation {
        Relation {
            entity: self.entity.clone(),
            resolver: self.resolver.clone(),
            values,
            records: Arc::new(OnceCell::new()),
        }
    }

    /// An unfiltered relation over the same entity
    pub fn unscoped(&self) -> Relation {
        Relation::new(self.entity.clone(), self.resolver.clone())
    }

    pub fn where_clause(&self) -> &WhereClause {
        &self.values.where_clause
    }

    pub fn having_clause(&self) -> &WhereClause {
        &self.values.having_clause
    }

    pub fn join_specs(&self) -> &[JoinSpec] {
        &self.values.joins
    }

    pub fn includes_values(&self) -> &[String] {
        &self.values.includes
    }

    pub fn eager_load_values(&self) -> &[String] {
        &self.values.eager_load
    }

    pub fn references_values(&self) -> &[String] {
        &self.values.references
    }

    pub fn projections(&self) -> &[Projection] {
        &self.values.projections
    }

    pub fn group_keys(&self) -> &[GroupKey] {
        &self.values.group_keys
    }

    pub fn order_specs(&self) -> &[OrderSpec] {
        &self.values.order
    }

    pub fn is_reordering(&self) -> bool {
        self.values.reordering
    }

    pub fn limit_value(&self) -> Option<i64> {
        self.values.limit
    }

    pub fn offset_value(&self) -> Option<i64> {
        self.values.offset
    }

    pub fn lock_value(&self) -> Option<&LockMode> {
        self.values.lock.as_ref()
    }

    pub fn from_value(&self) -> Option<&FromClause> {
        self.values.from.as_ref()
    }

    pub fn is_distinct(&self) -> bool {
        self.values.distinct
    }

    pub fn extensions(&self) -> &[String] {
        &self.values.extensions
    }

    /// Has this relation (or a clone sharing its cache) been executed?
    pub fn is_loaded(&self) -> bool {
        self.records.initialized()
    }

    /// Rows of a loaded relation
    pub fn loaded_rows(&self) -> Option<Arc<Vec<Row>>> {
        self.records.get().cloned()
    }

    /// Resolve an attribute name (`score`) or a qualified name (`posts.score`) to a column.
    /// Anything else is not a column and is used verbatim.
    pub(crate) fn column_ref(&self, name: &str) -> Option<ColumnRef> {
        match name.split_once('.') {
            Some((table, column)) if is_identifier(table) && is_identifier(column) => {
                Some(ColumnRef::new(table, column))
            }
            Some(_) => None,
            None if self.entity.has_attribute(name) => Some(self.entity.column(name)),
            None => None,
        }
    }

    pub(crate) fn predicate_builder(&self) -> PredicateBuilder<'_> {
        PredicateBuilder::new(&self.entity, self.resolver.as_ref())
    }

    /// Rows matching `condition` as well
    pub fn filter(&self, condition: impl Into<Condition>) -> Result<Relation, DatabaseError> {
        let clause = self.predicate_builder().build(condition.into())?;
        Ok(self.edit(|values| values.where_clause = values.where_clause.concat(&clause)))
    }

    /// Rows not matching `condition`, each of its predicates negated
    pub fn filter_not(&self, condition: impl Into<Condition>) -> Result<Relation, DatabaseError> {
        let clause = self.predicate_builder().build(condition.into())?.invert();
        Ok(self.edit(|values| values.where_clause = values.where_clause.concat(&clause)))
    }

    /// Replace every existing predicate on the columns `condition` constrains
    pub fn rewhere(&self, condition: impl Into<Condition>) -> Result<Relation, DatabaseError> {
        let clause = self.predicate_builder().build(condition.into())?;
        let columns: Vec<&ColumnRef> = clause
            .predicates()
            .iter()
            .flat_map(Predicate::referenced_columns)
            .collect();
        let kept = self.values.where_clause.except_columns(&columns);

        Ok(self.edit(|values| values.where_clause = kept.concat(&clause)))
    }

    /// Filter groups
    pub fn having(&self, condition: impl Into<Condition>) -> Result<Relation, DatabaseError> {
        let clause = self.predicate_builder().build(condition.into())?;
        Ok(self.edit(|values| values.having_clause = values.having_clause.concat(&clause)))
    }

    /// Inner join an association of the entity
    pub fn joins(&self, association: &str) -> Relation {
        self.add_join(JoinSpec::Association(association.to_string()))
    }

    /// Join with verbatim text
    pub fn joins_raw(&self, sql: &str) -> Relation {
        self.add_join(JoinSpec::Raw(sql.to_string()))
    }

    fn add_join(&self, join: JoinSpec) -> Relation {
        self.edit(|values| push_unique(&mut values.joins, join))
    }

    /// Preload an association. Once [referenced](Self::references), it is left outer joined.
    pub fn includes(&self, association: &str) -> Relation {
        self.edit(|values| push_unique(&mut values.includes, association.to_string()))
    }

    /// Preload an association through a left outer join
    pub fn eager_load(&self, association: &str) -> Relation {
        self.edit(|values| push_unique(&mut values.eager_load, association.to_string()))
    }

    /// Mark an included association as used by conditions, forcing its join
    pub fn references(&self, association: &str) -> Relation {
        self.edit(|values| push_unique(&mut values.references, association.to_string()))
    }

    /// Restrict the selected columns. Unknown names (`count(*)`, `1 AS one`) are used verbatim.
    pub fn select(&self, columns: &[&str]) -> Relation {
        let projections: Vec<Projection> = columns
            .iter()
            .map(|name| match self.column_ref(name) {
                Some(column) => Projection::Column(column),
                None => Projection::Raw(name.to_string()),
            })
            .collect();
        self.select_projections(projections)
    }

    pub(crate) fn select_projections(&self, projections: Vec<Projection>) -> Relation {
        self.edit(|values| {
            for projection in projections {
                push_unique(&mut values.projections, projection);
            }
        })
    }

    /// Group by columns, raw expressions or belongs-to associations
    pub fn group(&self, keys: &[&str]) -> Relation {
        let keys: Vec<GroupKey> = keys
            .iter()
            .map(|name| {
                if let Some(column) = self.column_ref(name) {
                    GroupKey::Column(column)
                } else if self.resolver.resolve(&self.entity, name).is_some() {
                    GroupKey::Association(name.to_string())
                } else {
                    GroupKey::Raw(name.to_string())
                }
            })
            .collect();

        self.edit(|values| {
            for key in keys {
                push_unique(&mut values.group_keys, key);
            }
        })
    }

    /// Append an ordering
    pub fn order(&self, column: &str, ordering: Ordering) -> Relation {
        let spec = self.order_spec(column, ordering);
        self.edit(|values| push_unique(&mut values.order, spec))
    }

    /// Append a verbatim ordering such as `lower(name) DESC`
    pub fn order_raw(&self, sql: &str) -> Relation {
        self.edit(|values| push_unique(&mut values.order, OrderSpec::Raw(sql.to_string())))
    }

    /// Replace the ordering
    pub fn reorder(&self, column: &str, ordering: Ordering) -> Relation {
        let spec = self.order_spec(column, ordering);
        self.edit(|values| {
            values.order = vec![spec];
            values.reordering = true;
        })
    }

    /// Replace the ordering with verbatim text
    pub fn reorder_raw(&self, sql: &str) -> Relation {
        self.edit(|values| {
            values.order = vec![OrderSpec::Raw(sql.to_string())];
            values.reordering = true;
        })
    }

    fn order_spec(&self, column: &str, ordering: Ordering) -> OrderSpec {
        match self.column_ref(column) {
            Some(column) => OrderSpec::Column(column, ordering),
            None => OrderSpec::Raw(match ordering {
                Ordering::Asc => format!("{column} ASC"),
                Ordering::Desc => format!("{column} DESC"),
            }),
        }
    }

    /// Reverse every ordering. An unordered relation is reversed along its identity column.
    pub fn reverse_order(&self) -> Relation {
        let primary_key = self.entity.primary_key_column();
        self.edit(|values| {
            values.order = if values.order.is_empty() {
                vec![OrderSpec::Column(primary_key, Ordering::Desc)]
            } else {
                values.order.iter().map(OrderSpec::reverse).collect()
            };
            values.reordering = true;
        })
    }

    /// Clear parts of the relation
    pub fn unscope(&self, fields: &[UnscopeField]) -> Relation {
        self.edit(|values| {
            for field in fields {
                match field {
                    UnscopeField::Where => values.where_clause = WhereClause::empty(),
                    UnscopeField::Having => values.having_clause = WhereClause::empty(),
                    UnscopeField::Joins => values.joins.clear(),
                    UnscopeField::Includes => {
                        values.includes.clear();
                        values.eager_load.clear();
                        values.references.clear();
                    }
                    UnscopeField::Select => values.projections.clear(),
                    UnscopeField::Group => values.group_keys.clear(),
                    UnscopeField::Order => {
                        values.order.clear();
                        values.reordering = false;
                    }
                    UnscopeField::Limit => values.limit = None,
                    UnscopeField::Offset => values.offset = None,
                    UnscopeField::Lock => values.lock = None,
                    UnscopeField::From => values.from = None,
                    UnscopeField::Distinct => values.distinct = false,
                    UnscopeField::Extending => values.extensions.clear(),
                }
            }
        })
    }

    pub fn limit(&self, limit: i64) -> Relation {
        self.edit(|values| values.limit = Some(limit))
    }

    pub fn offset(&self, offset: i64) -> Relation {
        self.edit(|values| values.offset = Some(offset))
    }

    pub fn lock(&self, lock: LockMode) -> Relation {
        self.edit(|values| values.lock = Some(lock))
    }

    pub fn from(&self, from: FromClause) -> Relation {
        self.edit(|values| values.from = Some(from))
    }

    pub fn distinct(&self) -> Relation {
        self.edit(|values| values.distinct = true)
    }

    /// Tag the relation with a named extension
    pub fn extending(&self, tag: &str) -> Relation {
        self.edit(|values| push_unique(&mut values.extensions, tag.to_string()))
    }

    /// A relation matching no row
    pub fn none(&self) -> Relation {
        let none = WhereClause::new(vec![Predicate::Raw("1=0".to_string())], vec![]);
        self.edit(|values| values.where_clause = values.where_clause.concat(&none))
    }

    /// Combine with `other` (see [`Merger`])
    pub fn merge(&self, other: &Relation) -> Relation {
        Merger::new(self, other).merge()
    }

    /// Rows matching any of the fragments' conditions
    pub fn any_of(&self, fragments: &[Relation]) -> Relation {
        alternative::combine(AlternativeKind::Positive, self, fragments)
    }

    /// Rows matching none of the fragments' conditions
    pub fn none_of(&self, fragments: &[Relation]) -> Relation {
        alternative::combine(AlternativeKind::Negative, self, fragments)
    }

    /// Attribute values fixed by equality conditions on the entity's own columns
    pub fn where_values_hash(&self) -> IndexMap<String, SQLValue> {
        self.values.where_clause.equalities(&self.entity.table)
    }

    /// Defaults for records created through this relation
    pub fn scope_for_create(&self) -> IndexMap<String, SQLValue> {
        self.where_values_hash()
    }
}

impl std::fmt::Debug for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relation")
            .field("entity", &self.entity.name)
            .field("values", &self.values)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

impl PartialEq for Relation {
    fn eq(&self, other: &Self) -> bool {
        self.entity == other.entity && self.values == other.values
    }
}

pub(crate) fn push_unique<T: PartialEq>(items: &mut Vec<T>, item: T) {
    if !items.contains(&item) {
        items.push(item);
    }
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use crate::testing::fixtures::BlogFixture;

    use super::*;

    #[test]
    fn edits_do_not_touch_the_original() {
        let fixture = BlogFixture::new();
        let posts = fixture.posts();
        let published = posts.filter(AttributeMap::new().with("state", "published")).unwrap();
        let limited = published.limit(5);

        assert!(posts.where_clause().is_empty());
        assert_eq!(published.where_clause().predicates().len(), 1);
        assert_eq!(published.limit_value(), None);
        assert_eq!(limited.limit_value(), Some(5));
        assert_eq!(limited.where_clause(), published.where_clause());
    }

    #[test]
    fn rewhere_replaces_conditions_on_the_same_column() {
        let fixture = BlogFixture::new();
        let posts = fixture
            .posts()
            .filter(Condition::sql_with_binds("posts.score > ?", vec![1.into()]))
            .unwrap()
            .filter(AttributeMap::new().with("score", AttributeValue::range(2, 8)))
            .unwrap()
            .filter(AttributeMap::new().with("state", "draft"))
            .unwrap();

        let rewhered = posts
            .rewhere(AttributeMap::new().with("score", 10))
            .unwrap();

        assert_eq!(
            rewhered.where_clause().predicates(),
            &[
                Predicate::Raw("posts.score > ?".into()),
                Predicate::Equality(ColumnRef::new("posts", "state"), Operand::Bind),
                Predicate::Equality(ColumnRef::new("posts", "score"), Operand::Bind),
            ]
        );
        let values: Vec<_> = rewhered
            .where_clause()
            .binds()
            .iter()
            .map(|bind| bind.value.clone())
            .collect();
        assert_eq!(
            values,
            vec![SQLValue::from(1), SQLValue::from("draft"), SQLValue::from(10)]
        );
    }

    #[test]
    fn filter_not_inverts() {
        let fixture = BlogFixture::new();
        let posts = fixture
            .posts()
            .filter_not(AttributeMap::new().with("state", "draft"))
            .unwrap();

        assert_eq!(
            posts.where_clause().predicates(),
            &[Predicate::NotEqual(
                ColumnRef::new("posts", "state"),
                Operand::Bind
            )]
        );
    }

    #[test]
    fn reverse_order_of_unordered_uses_identity() {
        let fixture = BlogFixture::new();
        assert_eq!(
            fixture.posts().reverse_order().order_specs(),
            &[OrderSpec::Column(ColumnRef::new("posts", "id"), Ordering::Desc)]
        );
        assert_eq!(
            fixture
                .posts()
                .order("title", Ordering::Asc)
                .order_raw("created_at DESC")
                .reverse_order()
                .order_specs(),
            &[
                OrderSpec::Column(ColumnRef::new("posts", "title"), Ordering::Desc),
                OrderSpec::Raw("created_at ASC".into()),
            ]
        );
    }

    #[test]
    fn group_by_association() {
        let fixture = BlogFixture::new();
        let grouped = fixture.posts().group(&["author", "state", "date(created_at)"]);

        assert_eq!(
            grouped.group_keys(),
            &[
                GroupKey::Association("author".into()),
                GroupKey::Column(ColumnRef::new("posts", "state")),
                GroupKey::Raw("date(created_at)".into()),
            ]
        );
    }

    #[test]
    fn unscope_clears_fields() {
        let fixture = BlogFixture::new();
        let posts = fixture
            .posts()
            .filter(AttributeMap::new().with("state", "draft"))
            .unwrap()
            .order("id", Ordering::Desc)
            .limit(3)
            .unscope(&[UnscopeField::Where, UnscopeField::Limit]);

        assert!(posts.where_clause().is_empty());
        assert_eq!(posts.limit_value(), None);
        assert_eq!(posts.order_specs().len(), 1);
    }

    #[test]
    fn scope_for_create_reads_equalities() {
        let fixture = BlogFixture::new();
        let posts = fixture
            .posts()
            .filter(AttributeMap::new().with("state", "draft").with("author_id", 3))
            .unwrap()
            .filter(AttributeMap::new().with("score", AttributeValue::list([1, 2])))
            .unwrap();

        let defaults = posts.scope_for_create();
        assert_eq!(defaults.get("state"), Some(&SQLValue::from("draft")));
        assert_eq!(defaults.get("author_id"), Some(&SQLValue::from(3)));
        assert!(!defaults.contains_key("score"));
    }
}
