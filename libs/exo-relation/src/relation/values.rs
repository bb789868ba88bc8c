// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use crate::sql::Ordering;

use super::{Relation, predicate::ColumnRef};

/// A join requested on a relation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JoinSpec {
    /// An association of the relation's entity, resolved when the relation is rendered
    Association(String),
    /// Verbatim join text such as `INNER JOIN tags ON tags.post_id = posts.id`
    Raw(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Projection {
    Column(ColumnRef),
    Raw(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OrderSpec {
    Column(ColumnRef, Ordering),
    Raw(String),
}

impl OrderSpec {
    /// The same ordering, reversed. Raw text has its trailing direction toggled (per comma
    /// separated term).
    pub fn reverse(&self) -> OrderSpec {
        match self {
            OrderSpec::Column(column, ordering) => {
                OrderSpec::Column(column.clone(), ordering.reverse())
            }
            OrderSpec::Raw(text) => OrderSpec::Raw(
                text.split(',')
                    .map(|term| reverse_term(term.trim()))
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
        }
    }
}

fn reverse_term(term: &str) -> String {
    let upper = term.to_ascii_uppercase();
    if upper.ends_with(" DESC") {
        format!("{} ASC", term[..term.len() - 5].trim_end())
    } else if upper.ends_with(" ASC") {
        format!("{} DESC", term[..term.len() - 4].trim_end())
    } else {
        format!("{term} DESC")
    }
}

/// A grouping key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupKey {
    Column(ColumnRef),
    Raw(String),
    /// A belongs-to association, grouped by its foreign key. Calculations report the owning
    /// records as keys.
    Association(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LockMode {
    Update,
    Share,
    Raw(String),
}

impl LockMode {
    pub fn to_sql(&self) -> String {
        match self {
            LockMode::Update => "FOR UPDATE".to_string(),
            LockMode::Share => "FOR SHARE".to_string(),
            LockMode::Raw(text) => text.clone(),
        }
    }
}

/// Replacement for the relation's table in the FROM clause
#[derive(Debug, Clone, PartialEq)]
pub enum FromClause {
    Raw(String),
    Subquery { relation: Box<Relation>, alias: String },
}

/// Parts of a relation [`Relation::unscope`] can clear
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnscopeField {
    Where,
    Having,
    Joins,
    Includes,
    Select,
    Group,
    Order,
    Limit,
    Offset,
    Lock,
    From,
    Distinct,
    Extending,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_orders_toggle_direction() {
        assert_eq!(
            OrderSpec::Raw("created_at DESC, name".into()).reverse(),
            OrderSpec::Raw("created_at ASC, name DESC".into())
        );
        assert_eq!(
            OrderSpec::Raw("score asc".into()).reverse(),
            OrderSpec::Raw("score DESC".into())
        );
    }

    #[test]
    fn column_orders_flip() {
        let column = ColumnRef::new("posts", "id");
        assert_eq!(
            OrderSpec::Column(column.clone(), Ordering::Asc).reverse(),
            OrderSpec::Column(column, Ordering::Desc)
        );
    }
}
