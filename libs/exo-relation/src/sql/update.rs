// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use super::{ExpressionBuilder, SQLBuilder, column::Column, predicate::ConcretePredicate};

/// An update operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    /// The table to update.
    pub table: String,
    /// The predicate to filter rows to update.
    pub predicate: ConcretePredicate,
    /// The columns to update and their values.
    pub column_values: Vec<(String, Column)>,
}

impl ExpressionBuilder for Update {
    /// Build the update statement for the form `UPDATE <table> SET <column = value, ...> WHERE
    /// <predicate>`. The `WHERE` is omitted if the predicate is `True`.
    fn build(&self, builder: &mut SQLBuilder) {
        builder.push_str("UPDATE ");
        builder.push_identifier(&self.table);

        builder.push_str(" SET ");
        builder.push_iter(
            self.column_values.iter(),
            ", ",
            |builder, (column, value)| {
                builder.without_fully_qualified_column_names(|builder| {
                    builder.push_column(self.table.as_str(), column.as_str());
                });

                builder.push_str(" = ");

                value.build(builder);
            },
        );

        if self.predicate != ConcretePredicate::True {
            builder.push_str(" WHERE ");
            self.predicate.build(builder);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_with_predicate() {
        let update = Update {
            table: "posts".into(),
            predicate: ConcretePredicate::Eq(
                Column::physical("posts", "author_id"),
                Column::Param(7.into()),
            ),
            column_values: vec![
                ("title".into(), Column::Param("new".into())),
                ("score".into(), Column::Null),
            ],
        };

        assert_binding!(
            update.to_sql(),
            r#"UPDATE "posts" SET "title" = $1, "score" = NULL WHERE "posts"."author_id" = $2"#,
            "new",
            7
        );
    }
}
