// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::{
    ops::{Range, RangeInclusive},
    sync::Arc,
};

use pg_bigdecimal::BigDecimal;

use crate::{
    database_error::DatabaseError,
    sql::{PhysicalColumnType, SQLValue},
};

use super::{
    Relation,
    bind::Bind,
    entity::{AssociationResolver, Entity},
    predicate::{ColumnRef, ComparisonOp, InList, Operand, Predicate, placeholder_count},
    values::Projection,
    where_clause::WhereClause,
};

/// Condition input accepted by [`Relation::filter`] and friends
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Verbatim text with no placeholders
    Sql(String),
    /// Verbatim text whose `?` placeholders take the given values in order.
    ///
    /// The text is not parsed, so every `?` is a placeholder, including one
    /// inside a quoted literal. `title = 'why?'` is rejected with
    /// [`DatabaseError::Argument`]; pass the literal as a bind instead
    /// (`title = ?` with `"why?"`).
    SqlWithBinds(String, Vec<SQLValue>),
    /// Attribute (or `table.column`) to value
    Attributes(AttributeMap),
}

impl Condition {
    pub fn sql(text: impl Into<String>) -> Self {
        Condition::Sql(text.into())
    }

    pub fn sql_with_binds(text: impl Into<String>, binds: Vec<SQLValue>) -> Self {
        Condition::SqlWithBinds(text.into(), binds)
    }
}

impl From<&str> for Condition {
    fn from(text: &str) -> Self {
        Condition::Sql(text.to_string())
    }
}

impl From<AttributeMap> for Condition {
    fn from(attributes: AttributeMap) -> Self {
        Condition::Attributes(attributes)
    }
}

/// Ordered attribute conditions
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AttributeMap(Vec<(String, AttributeValue)>);

impl AttributeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.0.push((key.into(), value.into()));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// Equal to the value (`IS NULL` for NULL)
    Value(SQLValue),
    /// Any of the values
    List(Vec<SQLValue>),
    /// Between `start` (inclusive) and `end`
    Range {
        start: SQLValue,
        end: SQLValue,
        exclusive: bool,
    },
    /// Among the rows of another relation (its identity column unless it selects something else)
    Subquery(Box<Relation>),
    /// Conditions on the columns of a joined table or association
    Nested(AttributeMap),
}

impl AttributeValue {
    pub fn null() -> Self {
        AttributeValue::Value(SQLValue::Null)
    }

    pub fn list<T: Into<SQLValue>>(values: impl IntoIterator<Item = T>) -> Self {
        AttributeValue::List(values.into_iter().map(Into::into).collect())
    }

    /// An inclusive range
    pub fn range(start: impl Into<SQLValue>, end: impl Into<SQLValue>) -> Self {
        AttributeValue::Range {
            start: start.into(),
            end: end.into(),
            exclusive: false,
        }
    }

    /// A range excluding `end`
    pub fn exclusive_range(start: impl Into<SQLValue>, end: impl Into<SQLValue>) -> Self {
        AttributeValue::Range {
            start: start.into(),
            end: end.into(),
            exclusive: true,
        }
    }
}

macro_rules! impl_from_scalar {
    ($($t:ty),*) => {
        $(
            impl From<$t> for AttributeValue {
                fn from(value: $t) -> Self {
                    AttributeValue::Value(value.into())
                }
            }
        )*
    };
}

impl_from_scalar!(
    i16, i32, i64, u8, u16, u32, f32, f64, bool, &str, String, BigDecimal, SQLValue
);

impl<T: Into<SQLValue>> From<Vec<T>> for AttributeValue {
    fn from(values: Vec<T>) -> Self {
        AttributeValue::list(values)
    }
}

impl<T: Into<SQLValue>> From<Range<T>> for AttributeValue {
    fn from(range: Range<T>) -> Self {
        AttributeValue::exclusive_range(range.start, range.end)
    }
}

impl<T: Into<SQLValue>> From<RangeInclusive<T>> for AttributeValue {
    fn from(range: RangeInclusive<T>) -> Self {
        let (start, end) = range.into_inner();
        AttributeValue::range(start, end)
    }
}

impl From<Relation> for AttributeValue {
    fn from(relation: Relation) -> Self {
        AttributeValue::Subquery(Box::new(relation))
    }
}

impl From<AttributeMap> for AttributeValue {
    fn from(map: AttributeMap) -> Self {
        AttributeValue::Nested(map)
    }
}

/// Turns [`Condition`]s into predicates and binds for one entity
pub struct PredicateBuilder<'a> {
    entity: &'a Arc<Entity>,
    resolver: &'a dyn AssociationResolver,
}

/// Where a key's column lives and how its values are typed
struct Target {
    table: String,
    entity: Option<Arc<Entity>>,
}

impl<'a> PredicateBuilder<'a> {
    pub fn new(entity: &'a Arc<Entity>, resolver: &'a dyn AssociationResolver) -> Self {
        Self { entity, resolver }
    }

    pub fn build(&self, condition: Condition) -> Result<WhereClause, DatabaseError> {
        match condition {
            Condition::Sql(text) => self.build_sql(text, vec![]),
            Condition::SqlWithBinds(text, values) => self.build_sql(text, values),
            Condition::Attributes(attributes) => {
                let mut clause = WhereClause::empty();
                for (key, value) in attributes.iter() {
                    clause = clause.concat(&self.build_attribute(key, value)?);
                }
                Ok(clause)
            }
        }
    }

    fn build_sql(&self, text: String, values: Vec<SQLValue>) -> Result<WhereClause, DatabaseError> {
        let expected = placeholder_count(&text);
        if expected != values.len() {
            return Err(DatabaseError::Argument(format!(
                "wrong number of bind variables ({} for {expected}) in: {text}",
                values.len()
            )));
        }
        if text.trim().is_empty() {
            return Ok(WhereClause::empty());
        }

        Ok(WhereClause::new(
            vec![Predicate::Raw(text)],
            values.into_iter().map(Bind::positional).collect(),
        ))
    }

    fn build_attribute(
        &self,
        key: &str,
        value: &AttributeValue,
    ) -> Result<WhereClause, DatabaseError> {
        if let AttributeValue::Nested(map) = value {
            let target = self.nested_target(key);
            let mut clause = WhereClause::empty();
            for (column, value) in map.iter() {
                if matches!(value, AttributeValue::Nested(_)) {
                    return Err(DatabaseError::Argument(format!(
                        "Conditions on {key}.{column} nest too deeply"
                    )));
                }
                clause = clause.concat(&self.build_column(&target, column, value)?);
            }
            return Ok(clause);
        }

        match key.split_once('.') {
            Some((table, column)) => {
                let target = Target {
                    table: table.to_string(),
                    entity: (table == self.entity.table).then(|| self.entity.clone()),
                };
                self.build_column(&target, column, value)
            }
            None => {
                let target = Target {
                    table: self.entity.table.clone(),
                    entity: Some(self.entity.clone()),
                };
                self.build_column(&target, key, value)
            }
        }
    }

    fn nested_target(&self, key: &str) -> Target {
        match self.resolver.resolve(self.entity, key) {
            Some(association) => Target {
                table: association.target.table.clone(),
                entity: Some(association.target.clone()),
            },
            None if key == self.entity.table => Target {
                table: key.to_string(),
                entity: Some(self.entity.clone()),
            },
            None => Target {
                table: key.to_string(),
                entity: None,
            },
        }
    }

    fn build_column(
        &self,
        target: &Target,
        name: &str,
        value: &AttributeValue,
    ) -> Result<WhereClause, DatabaseError> {
        let column = ColumnRef::new(target.table.clone(), name);
        let column_type = target
            .entity
            .as_ref()
            .and_then(|entity| entity.attribute_type(name));
        let bind = |value: &SQLValue| Bind::new(column.clone(), cast(column_type, value), column_type);

        let clause = match value {
            AttributeValue::Value(SQLValue::Null) => WhereClause::new(
                vec![Predicate::Equality(column.clone(), Operand::Null)],
                vec![],
            ),
            AttributeValue::Value(value) => WhereClause::new(
                vec![Predicate::Equality(column.clone(), Operand::Bind)],
                vec![bind(value)],
            ),
            AttributeValue::List(values) => {
                let (nulls, present): (Vec<&SQLValue>, Vec<&SQLValue>) =
                    values.iter().partition(|value| value.is_null());
                let binds: Vec<Bind> = present.iter().map(|value| bind(*value)).collect();
                let in_list = Predicate::In(
                    column.clone(),
                    InList::Values(vec![Operand::Bind; binds.len()]),
                );

                let predicate = match (nulls.is_empty(), present.is_empty()) {
                    (true, _) => in_list,
                    (false, true) => Predicate::Equality(column.clone(), Operand::Null),
                    (false, false) => Predicate::or(
                        in_list,
                        Predicate::Equality(column.clone(), Operand::Null),
                    ),
                };
                WhereClause::new(vec![predicate], binds)
            }
            AttributeValue::Range {
                start,
                end,
                exclusive,
            } => {
                let upper = if *exclusive {
                    ComparisonOp::Lt
                } else {
                    ComparisonOp::LtEq
                };
                WhereClause::new(
                    vec![Predicate::and(
                        Predicate::Comparison(column.clone(), ComparisonOp::GtEq, Operand::Bind),
                        Predicate::Comparison(column.clone(), upper, Operand::Bind),
                    )],
                    vec![bind(start), bind(end)],
                )
            }
            AttributeValue::Subquery(relation) => {
                let relation = if relation.projections().is_empty() {
                    relation.select_projections(vec![Projection::Column(
                        relation.entity().primary_key_column(),
                    )])
                } else {
                    relation.as_ref().clone()
                };
                WhereClause::new(
                    vec![Predicate::In(
                        column.clone(),
                        InList::Subquery(Box::new(relation)),
                    )],
                    vec![],
                )
            }
            AttributeValue::Nested(_) => {
                return Err(DatabaseError::Argument(format!(
                    "Unsupported nested condition for column {column}"
                )));
            }
        };

        Ok(clause)
    }
}

/// Cast to the column's type where possible, keeping the value as given otherwise
fn cast(column_type: Option<PhysicalColumnType>, value: &SQLValue) -> SQLValue {
    match column_type {
        Some(typ) => typ.cast(value).unwrap_or_else(|_| value.clone()),
        None => value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::fixtures::BlogFixture;

    use super::*;

    fn build(condition: impl Into<Condition>) -> Result<WhereClause, DatabaseError> {
        let fixture = BlogFixture::new();
        let posts = fixture.posts();
        posts.predicate_builder().build(condition.into())
    }

    fn bound_values(clause: &WhereClause) -> Vec<SQLValue> {
        clause.binds().iter().map(|bind| bind.value.clone()).collect()
    }

    fn posts(name: &str) -> ColumnRef {
        ColumnRef::new("posts", name)
    }

    #[test]
    fn scalar_values_cast_to_attribute_types() {
        let clause = build(AttributeMap::new().with("score", "7").with("state", "draft")).unwrap();

        assert_eq!(
            clause.predicates(),
            &[
                Predicate::Equality(posts("score"), Operand::Bind),
                Predicate::Equality(posts("state"), Operand::Bind),
            ]
        );
        assert_eq!(bound_values(&clause), vec![SQLValue::Int(7), "draft".into()]);
    }

    #[test]
    fn null_values() {
        let clause = build(AttributeMap::new().with("author_id", AttributeValue::null())).unwrap();

        assert_eq!(
            clause.predicates(),
            &[Predicate::Equality(posts("author_id"), Operand::Null)]
        );
        assert!(clause.binds().is_empty());
    }

    #[test]
    fn lists() {
        let clause = build(AttributeMap::new().with("score", vec![1, 2])).unwrap();
        assert_eq!(
            clause.predicates(),
            &[Predicate::In(
                posts("score"),
                InList::Values(vec![Operand::Bind, Operand::Bind])
            )]
        );

        let with_null = build(AttributeMap::new().with(
            "score",
            AttributeValue::List(vec![1.into(), SQLValue::Null]),
        ))
        .unwrap();
        assert_eq!(
            with_null.predicates(),
            &[Predicate::or(
                Predicate::In(posts("score"), InList::Values(vec![Operand::Bind])),
                Predicate::Equality(posts("score"), Operand::Null)
            )]
        );
        assert_eq!(bound_values(&with_null), vec![SQLValue::Int(1)]);

        let empty = build(AttributeMap::new().with("score", Vec::<i32>::new())).unwrap();
        assert!(empty.is_contradiction());
    }

    #[test]
    fn ranges() {
        let clause = build(AttributeMap::new().with("score", 1..10)).unwrap();

        assert_eq!(
            clause.predicates(),
            &[Predicate::and(
                Predicate::Comparison(posts("score"), ComparisonOp::GtEq, Operand::Bind),
                Predicate::Comparison(posts("score"), ComparisonOp::Lt, Operand::Bind),
            )]
        );
        assert_eq!(bound_values(&clause), vec![SQLValue::Int(1), SQLValue::Int(10)]);
    }

    #[test]
    fn subqueries_select_identity() {
        let fixture = BlogFixture::new();
        let adults = fixture
            .authors()
            .filter(Condition::sql("authors.age >= 18"))
            .unwrap();
        let clause = fixture
            .posts()
            .predicate_builder()
            .build(AttributeMap::new().with("author_id", adults).into())
            .unwrap();

        match &clause.predicates()[0] {
            Predicate::In(column, InList::Subquery(relation)) => {
                assert_eq!(column, &posts("author_id"));
                assert_eq!(
                    relation.projections(),
                    &[Projection::Column(ColumnRef::new("authors", "id"))]
                );
            }
            other => panic!("Unexpected predicate {other:?}"),
        }
    }

    #[test]
    fn nested_and_dotted_keys() {
        let clause = build(
            AttributeMap::new()
                .with("author", AttributeMap::new().with("name", "Sam"))
                .with("authors.age", 30),
        )
        .unwrap();

        assert_eq!(
            clause.predicates(),
            &[
                Predicate::Equality(ColumnRef::new("authors", "name"), Operand::Bind),
                Predicate::Equality(ColumnRef::new("authors", "age"), Operand::Bind),
            ]
        );
    }

    #[test]
    fn raw_text_binds_must_match_placeholders() {
        let clause = build(Condition::sql_with_binds(
            "posts.score > ? AND posts.score < ?",
            vec![1.into(), 5.into()],
        ))
        .unwrap();
        assert_eq!(clause.binds().len(), 2);

        assert!(matches!(
            build(Condition::sql_with_binds("posts.score > ?", vec![])),
            Err(DatabaseError::Argument(_))
        ));
        assert!(matches!(
            build(Condition::sql("posts.score > ?")),
            Err(DatabaseError::Argument(_))
        ));
    }

    #[test]
    fn question_mark_in_literal_counts_as_placeholder() {
        assert!(matches!(
            build(Condition::sql("posts.title = 'why?'")),
            Err(DatabaseError::Argument(_))
        ));

        let clause = build(Condition::sql_with_binds(
            "posts.title = ?",
            vec!["why?".into()],
        ))
        .unwrap();
        assert_eq!(clause.predicates(), &[Predicate::Raw("posts.title = ?".to_string())]);
        assert_eq!(bound_values(&clause), vec!["why?".into()]);
    }
}
