// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use super::{ExpressionBuilder, SQLBuilder, predicate::ConcretePredicate, table::Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    LeftOuter,
}

/// Represents a join between two tables. Joins nest to the left, so `a JOIN b JOIN c` is
/// `Join { left: Join { left: a, right: b }, right: c }`.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    /// The left table in the join such as `posts`.
    left: Box<Table>,
    /// The right table in the join such as `authors`.
    right: Box<Table>,
    kind: JoinKind,
    /// The join predicate such as `posts.author_id = authors.id`.
    predicate: ConcretePredicate,
}

impl Join {
    pub fn new(left: Table, right: Table, kind: JoinKind, predicate: ConcretePredicate) -> Self {
        Join {
            left: Box::new(left),
            right: Box::new(right),
            kind,
            predicate,
        }
    }

    pub fn left(&self) -> &Table {
        &self.left
    }

    pub fn right(&self) -> &Table {
        &self.right
    }

    pub fn kind(&self) -> JoinKind {
        self.kind
    }

    pub fn predicate(&self) -> &ConcretePredicate {
        &self.predicate
    }
}

impl ExpressionBuilder for Join {
    /// Build expression of the form `<left> INNER JOIN <right> ON <predicate>`.
    fn build(&self, builder: &mut SQLBuilder) {
        self.left.build(builder);
        builder.push_str(match self.kind {
            JoinKind::Inner => " INNER JOIN ",
            JoinKind::LeftOuter => " LEFT OUTER JOIN ",
        });
        self.right.build(builder);
        builder.push_str(" ON ");
        self.predicate.build(builder);
    }
}

#[cfg(test)]
mod tests {
    use crate::sql::column::Column;

    use super::*;

    #[test]
    fn basic_join() {
        let table = Table::physical("posts").join(|left| {
            Join::new(
                left,
                Table::physical("authors"),
                JoinKind::Inner,
                ConcretePredicate::Eq(
                    Column::physical("posts", "author_id"),
                    Column::physical("authors", "id"),
                ),
            )
        });

        assert_binding!(
            table.to_sql(),
            r#""posts" INNER JOIN "authors" ON "posts"."author_id" = "authors"."id""#
        );
    }

    #[test]
    fn nested_outer_join_with_raw_fragment() {
        let table = Table::physical("posts")
            .raw_join("INNER JOIN tags ON tags.post_id = posts.id")
            .join(|left| {
                Join::new(
                    left,
                    Table::physical("authors"),
                    JoinKind::LeftOuter,
                    ConcretePredicate::Eq(
                        Column::physical("posts", "author_id"),
                        Column::physical("authors", "id"),
                    ),
                )
            });

        assert_binding!(
            table.to_sql(),
            r#""posts" INNER JOIN tags ON tags.post_id = posts.id LEFT OUTER JOIN "authors" ON "posts"."author_id" = "authors"."id""#
        );
    }
}
