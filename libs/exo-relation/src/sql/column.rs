// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use super::{ExpressionBuilder, SQLBuilder, SQLValue, function::Function, select::Select};

/// A column-like concept covering any usage where a table column could be used. For example, in
/// a predicate you can say `first_name = 'Sam'` or `first_name = last_name`. Here, first_name,
/// last_name, and `'Sam'` all serve as columns from our perspective.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// An actual column in a table (or a table alias such as a sub-select's alias)
    Physical { table: String, name: String },
    /// A literal value. This will be mapped to a placeholder to avoid SQL injection.
    Param(SQLValue),
    /// A null value
    Null,
    /// All columns of a table. If the table is `None` should translate to `*`, else `"table".*`
    Star(Option<String>),
    /// An unvalidated expression rendered verbatim (`1`, `lower(name)`, ...)
    Raw(String),
    /// An aggregate function applied to a column. For example, `COUNT(DISTINCT "posts"."id")`.
    Function {
        function: Function,
        distinct: bool,
        arg: Box<Column>,
    },
    /// A column with an output name (`<column> AS "alias"`)
    Aliased { column: Box<Column>, alias: String },
    /// A sub-select query.
    SubSelect(Box<Select>),
}

impl Column {
    pub fn physical(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Physical {
            table: table.into(),
            name: name.into(),
        }
    }

    pub fn function(function: Function, distinct: bool, arg: Column) -> Self {
        Self::Function {
            function,
            distinct,
            arg: Box::new(arg),
        }
    }

    pub fn aliased(self, alias: impl Into<String>) -> Self {
        Self::Aliased {
            column: Box::new(self),
            alias: alias.into(),
        }
    }

    /// The name under which this column shows up in a result row
    pub fn output_name(&self) -> String {
        match self {
            Column::Physical { name, .. } => name.clone(),
            Column::Aliased { alias, .. } => alias.clone(),
            Column::Function { function, .. } => function.name().to_lowercase(),
            Column::Raw(expr) => expr.clone(),
            Column::Star(_) => "*".to_string(),
            Column::Param(_) | Column::Null | Column::SubSelect(_) => "?column?".to_string(),
        }
    }

    /// Does this column (or any nested one) apply an aggregate function?
    pub fn is_aggregate(&self) -> bool {
        match self {
            Column::Function { .. } => true,
            Column::Aliased { column, .. } => column.is_aggregate(),
            _ => false,
        }
    }
}

impl ExpressionBuilder for Column {
    fn build(&self, builder: &mut SQLBuilder) {
        match self {
            Column::Physical { table, name } => builder.push_column(table, name),
            Column::Param(value) => builder.push_param(value.clone()),
            Column::Null => builder.push_str("NULL"),
            Column::Star(table) => {
                if let Some(table) = table {
                    builder.push_identifier(table);
                    builder.push('.');
                }
                builder.push('*');
            }
            Column::Raw(expr) => builder.push_str(expr),
            Column::Function {
                function,
                distinct,
                arg,
            } => {
                builder.push_str(function.name());
                builder.push('(');
                if *distinct {
                    builder.push_str("DISTINCT ");
                }
                arg.build(builder);
                builder.push(')');
            }
            Column::Aliased { column, alias } => {
                column.build(builder);
                builder.push_str(" AS ");
                builder.push_identifier(alias);
            }
            Column::SubSelect(select) => {
                builder.push('(');
                select.build(builder);
                builder.push(')');
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn physical_column() {
        assert_binding!(
            Column::physical("people", "age").to_sql(),
            r#""people"."age""#
        );
    }

    #[test]
    fn distinct_count_with_alias() {
        let column = Column::function(Function::Count, true, Column::physical("posts", "id"))
            .aliased("count_id");

        assert_binding!(
            column.to_sql(),
            r#"COUNT(DISTINCT "posts"."id") AS "count_id""#
        );
        assert_eq!(column.output_name(), "count_id");
        assert!(column.is_aggregate());
    }

    #[test]
    fn star_and_params() {
        assert_binding!(Column::Star(Some("posts".into())).to_sql(), r#""posts".*"#);
        assert_binding!(Column::Param(SQLValue::Int(5)).to_sql(), "$1", 5);
    }
}
