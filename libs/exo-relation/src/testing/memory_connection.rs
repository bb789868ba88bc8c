// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::{
    cmp::Ordering as CmpOrdering,
    collections::HashMap,
    sync::{
        Mutex, MutexGuard, PoisonError,
        atomic::{AtomicUsize, Ordering as AtomicOrdering},
    },
};

use async_trait::async_trait;
use pg_bigdecimal::BigDecimal;
use tracing::debug;

use crate::{
    database_error::DatabaseError,
    sql::{
        Column, ConcretePredicate, Delete, Function, GroupBy, Insert, JoinKind, OrderBy,
        OrderByElement, Ordering, Row, SQLOperation, SQLValue, Select, Table, Update,
        connect::connection::Connection,
    },
};

type Tables = HashMap<String, Vec<Row>>;

/// One row per table of the FROM clause, keyed by the table's name (or alias)
type Scope = Vec<(String, Row)>;

/// A [`Connection`] over in-memory tables. It evaluates statements directly on the AST, covering
/// what relations lower to: joins, sub-selects, grouping and aggregates, ordering (NULLs last when
/// ascending) and simple raw fragments (`1=0`, `<column> <op> ?`, `COUNT(*) > ?`).
///
/// Every statement is counted and logged, so tests can assert that nothing was sent.
#[derive(Debug, Default)]
pub struct MemoryConnection {
    tables: Mutex<Tables>,
    statements: Mutex<Vec<String>>,
    statement_count: AtomicUsize,
}

impl MemoryConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, name: impl Into<String>, rows: Vec<Row>) -> Self {
        self.tables
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), rows);
        self
    }

    /// The current rows of a table
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.tables().get(table).cloned().unwrap_or_default()
    }

    /// The number of statements run so far
    pub fn statement_count(&self) -> usize {
        self.statement_count.load(AtomicOrdering::SeqCst)
    }

    /// The text of the statements run so far
    pub fn statements(&self) -> Vec<String> {
        self.statements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, operation: &SQLOperation) {
        let (statement, params) = self.render(operation);
        debug!("Executing in memory: {statement} {params:?}");

        self.statement_count.fetch_add(1, AtomicOrdering::SeqCst);
        self.statements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(statement);
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn query(&self, operation: &SQLOperation) -> Result<Vec<Row>, DatabaseError> {
        self.record(operation);
        let mut tables = self.tables();

        match operation {
            SQLOperation::Select(select) => Evaluator { tables: &tables }.select(select),
            SQLOperation::Insert(insert) => insert_row(&mut tables, insert).map(|row| vec![row]),
            SQLOperation::Update(update) => update_rows(&mut tables, update).map(|_| vec![]),
            SQLOperation::Delete(delete) => delete_rows(&mut tables, delete).map(|_| vec![]),
        }
    }

    async fn execute(&self, operation: &SQLOperation) -> Result<u64, DatabaseError> {
        self.record(operation);
        let mut tables = self.tables();

        match operation {
            SQLOperation::Select(select) => Evaluator { tables: &tables }
                .select(select)
                .map(|rows| rows.len() as u64),
            SQLOperation::Insert(insert) => insert_row(&mut tables, insert).map(|_| 1),
            SQLOperation::Update(update) => update_rows(&mut tables, update),
            SQLOperation::Delete(delete) => delete_rows(&mut tables, delete),
        }
    }
}

fn unsupported(what: impl std::fmt::Display) -> DatabaseError {
    DatabaseError::Validation(format!("Unsupported by the memory connection: {what}"))
}

fn table_rows<'t>(tables: &'t Tables, name: &str) -> Result<&'t Vec<Row>, DatabaseError> {
    tables
        .get(name)
        .ok_or_else(|| DatabaseError::Validation(format!("relation \"{name}\" does not exist")))
}

/// Rows of `table` matching `predicate`, by position
fn matching_rows(
    tables: &Tables,
    table: &str,
    predicate: &ConcretePredicate,
) -> Result<Vec<usize>, DatabaseError> {
    let evaluator = Evaluator { tables };
    let mut matching = vec![];

    for (index, row) in table_rows(tables, table)?.iter().enumerate() {
        let scope = vec![(table.to_string(), row.clone())];
        if evaluator.predicate(predicate, &Context::row(&scope))? == Some(true) {
            matching.push(index);
        }
    }

    Ok(matching)
}

fn update_rows(tables: &mut Tables, update: &Update) -> Result<u64, DatabaseError> {
    let matching = matching_rows(tables, &update.table, &update.predicate)?;

    let mut changes = vec![];
    {
        let evaluator = Evaluator { tables: &*tables };
        let rows = table_rows(tables, &update.table)?;
        for index in &matching {
            let scope = vec![(update.table.clone(), rows[*index].clone())];
            let context = Context::row(&scope);
            let values = update
                .column_values
                .iter()
                .map(|(column, value)| Ok((column.clone(), evaluator.value(value, &context)?)))
                .collect::<Result<Vec<_>, DatabaseError>>()?;
            changes.push((*index, values));
        }
    }

    let rows = tables
        .get_mut(&update.table)
        .ok_or_else(|| unsupported("update of a missing table"))?;
    for (index, values) in changes {
        if let Some(row) = rows.get_mut(index) {
            for (column, value) in values {
                row.insert(column, value);
            }
        }
    }

    Ok(matching.len() as u64)
}

fn delete_rows(tables: &mut Tables, delete: &Delete) -> Result<u64, DatabaseError> {
    let matching = matching_rows(tables, &delete.table, &delete.predicate)?;

    let rows = tables
        .get_mut(&delete.table)
        .ok_or_else(|| unsupported("delete from a missing table"))?;
    let mut index = 0;
    rows.retain(|_| {
        let keep = !matching.contains(&index);
        index += 1;
        keep
    });

    Ok(matching.len() as u64)
}

/// Insert a row, numbering returned columns that were not given after the largest existing value
fn insert_row(tables: &mut Tables, insert: &Insert) -> Result<Row, DatabaseError> {
    let rows = tables.entry(insert.table.clone()).or_default();

    let mut row = Row::new();
    for (column, value) in insert.columns.iter().zip(&insert.values) {
        let value = match value {
            Column::Param(value) => value.clone(),
            Column::Null => SQLValue::Null,
            other => return Err(unsupported(format!("insert value {other:?}"))),
        };
        row.insert(column.clone(), value);
    }

    let mut returned = Row::new();
    for column in &insert.returning {
        let name = column.output_name();
        if !row.contains(&name) {
            let next = rows
                .iter()
                .filter_map(|existing| existing.get(&name).and_then(SQLValue::as_i64))
                .max()
                .unwrap_or(0)
                + 1;
            row.insert(name.clone(), next);
        }
        returned.insert(name.clone(), row.get(&name).cloned().unwrap_or(SQLValue::Null));
    }

    rows.push(row);
    Ok(returned)
}

/// What columns are evaluated against: a single scope, or a group of scopes when aggregating
struct Context<'s> {
    scopes: &'s [Scope],
    grouped: bool,
}

impl<'s> Context<'s> {
    fn row(scope: &'s Scope) -> Self {
        Context {
            scopes: std::slice::from_ref(scope),
            grouped: false,
        }
    }

    fn lookup(&self, table: &str, column: &str) -> Result<SQLValue, DatabaseError> {
        let Some(scope) = self.scopes.first() else {
            return Ok(SQLValue::Null);
        };

        scope
            .iter()
            .find(|(name, _)| name == table)
            .map(|(_, row)| row.get(column).cloned().unwrap_or(SQLValue::Null))
            .ok_or_else(|| {
                DatabaseError::Validation(format!(
                    "missing FROM-clause entry for table \"{table}\""
                ))
            })
    }

    fn lookup_unqualified(&self, column: &str) -> Result<SQLValue, DatabaseError> {
        let Some(scope) = self.scopes.first() else {
            return Ok(SQLValue::Null);
        };

        scope
            .iter()
            .find_map(|(_, row)| row.get(column).cloned())
            .ok_or_else(|| DatabaseError::Validation(format!("column \"{column}\" does not exist")))
    }
}

struct Evaluator<'t> {
    tables: &'t Tables,
}

impl Evaluator<'_> {
    fn select(&self, select: &Select) -> Result<Vec<Row>, DatabaseError> {
        let mut filtered = vec![];
        for scope in self.table(&select.table)? {
            if self.predicate(&select.predicate, &Context::row(&scope))? == Some(true) {
                filtered.push(scope);
            }
        }

        let aggregating = select.group_by.is_some()
            || select.having != ConcretePredicate::True
            || select.columns.iter().any(Column::is_aggregate);

        // Each output row with the scopes it was computed from
        let mut candidates: Vec<(Row, Vec<Scope>)> = vec![];
        if aggregating {
            for group in self.groups(filtered, select.group_by.as_ref())? {
                let context = Context {
                    scopes: &group,
                    grouped: true,
                };
                if self.predicate(&select.having, &context)? != Some(true) {
                    continue;
                }
                let row = self.output_row(&select.columns, &context)?;
                candidates.push((row, group));
            }
        } else {
            for scope in filtered {
                let row = self.output_row(&select.columns, &Context::row(&scope))?;
                candidates.push((row, vec![scope]));
            }
        }

        let mut rows = match &select.order_by {
            Some(order_by) => self.sort(candidates, order_by, aggregating)?,
            None => candidates.into_iter().map(|(row, _)| row).collect(),
        };

        if select.distinct {
            let mut unique: Vec<Row> = Vec::with_capacity(rows.len());
            for row in rows {
                if !unique.contains(&row) {
                    unique.push(row);
                }
            }
            rows = unique;
        }

        let offset = select.offset.map_or(0, |o| o.0.max(0) as usize);
        let limit = select.limit.map_or(usize::MAX, |l| l.0.max(0) as usize);
        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }

    fn groups(
        &self,
        scopes: Vec<Scope>,
        group_by: Option<&GroupBy>,
    ) -> Result<Vec<Vec<Scope>>, DatabaseError> {
        let Some(GroupBy(keys)) = group_by else {
            // Aggregating without grouping yields one row, even over no rows
            return Ok(vec![scopes]);
        };

        let mut groups: Vec<(Vec<SQLValue>, Vec<Scope>)> = vec![];
        for scope in scopes {
            let key = keys
                .iter()
                .map(|key| self.value(key, &Context::row(&scope)))
                .collect::<Result<Vec<_>, _>>()?;
            match groups.iter_mut().find(|(existing, _)| *existing == key) {
                Some((_, members)) => members.push(scope),
                None => groups.push((key, vec![scope])),
            }
        }

        Ok(groups.into_iter().map(|(_, members)| members).collect())
    }

    fn sort(
        &self,
        candidates: Vec<(Row, Vec<Scope>)>,
        order_by: &OrderBy,
        grouped: bool,
    ) -> Result<Vec<Row>, DatabaseError> {
        let mut keyed = vec![];
        for (row, scopes) in candidates {
            let context = Context {
                scopes: &scopes,
                grouped,
            };
            let keys = order_by
                .0
                .iter()
                .map(|element| self.order_key(element, &row, &context))
                .collect::<Result<Vec<_>, _>>()?;
            keyed.push((keys, row));
        }

        keyed.sort_by(|(left, _), (right, _)| {
            left.iter()
                .zip(right)
                .map(|((l, ordering), (r, _))| match ordering {
                    Ordering::Asc => compare_nulls_last(l, r),
                    Ordering::Desc => compare_nulls_last(l, r).reverse(),
                })
                .find(|ordering| *ordering != CmpOrdering::Equal)
                .unwrap_or(CmpOrdering::Equal)
        });

        Ok(keyed.into_iter().map(|(_, row)| row).collect())
    }

    fn order_key(
        &self,
        element: &OrderByElement,
        row: &Row,
        context: &Context,
    ) -> Result<(SQLValue, Ordering), DatabaseError> {
        match element {
            OrderByElement::Expr(column, ordering) => Ok((self.value(column, context)?, *ordering)),
            OrderByElement::Raw(text) => {
                let text = text.trim();
                let upper = text.to_ascii_uppercase();
                let (expression, ordering) = if upper.ends_with(" DESC") {
                    (&text[..text.len() - 5], Ordering::Desc)
                } else if upper.ends_with(" ASC") {
                    (&text[..text.len() - 4], Ordering::Asc)
                } else {
                    (text, Ordering::Asc)
                };
                let expression = expression.trim();

                // Output names (aliases) come first, as in Postgres
                let value = match row.get(expression) {
                    Some(value) => value.clone(),
                    None => self.raw_value(expression, context)?,
                };
                Ok((value, ordering))
            }
        }
    }

    fn output_row(&self, columns: &[Column], context: &Context) -> Result<Row, DatabaseError> {
        let mut row = Row::new();

        for column in columns {
            match column {
                Column::Star(table) => {
                    if let Some(scope) = context.scopes.first() {
                        for (name, scoped) in scope {
                            if table.as_ref().is_none_or(|t| t == name) {
                                for (column, value) in scoped.iter() {
                                    row.insert(column, value.clone());
                                }
                            }
                        }
                    }
                }
                Column::Aliased { column, alias } => {
                    row.insert(alias.clone(), self.value(column, context)?);
                }
                Column::Raw(text) => {
                    let (expression, name) = split_alias(text);
                    row.insert(name, self.raw_value(expression, context)?);
                }
                column => {
                    row.insert(column.output_name(), self.value(column, context)?);
                }
            }
        }

        Ok(row)
    }

    fn table(&self, table: &Table) -> Result<Vec<Scope>, DatabaseError> {
        match table {
            Table::Physical { name, alias } => {
                let scope_name = alias.as_ref().unwrap_or(name);
                Ok(table_rows(self.tables, name)?
                    .iter()
                    .map(|row| vec![(scope_name.clone(), row.clone())])
                    .collect())
            }
            Table::SubSelect { select, alias } => Ok(self
                .select(select)?
                .into_iter()
                .map(|row| vec![(alias.clone(), row)])
                .collect()),
            Table::Join(join) => {
                let left = self.table(join.left())?;
                let right = self.table(join.right())?;
                let mut joined = vec![];

                for left_scope in left {
                    let mut matched = false;
                    for right_scope in &right {
                        let mut scope = left_scope.clone();
                        scope.extend(right_scope.iter().cloned());
                        if self.predicate(join.predicate(), &Context::row(&scope))? == Some(true) {
                            matched = true;
                            joined.push(scope);
                        }
                    }

                    if !matched && join.kind() == JoinKind::LeftOuter {
                        let mut scope = left_scope;
                        scope.extend(scope_names(join.right()).into_iter().map(|n| (n, Row::new())));
                        joined.push(scope);
                    }
                }

                Ok(joined)
            }
            Table::Raw(text) => Err(unsupported(format!("FROM {text}"))),
            Table::RawJoin { fragment, .. } => Err(unsupported(format!("join {fragment}"))),
        }
    }

    /// Three-valued evaluation: `None` is SQL's unknown
    fn predicate(
        &self,
        predicate: &ConcretePredicate,
        context: &Context,
    ) -> Result<Option<bool>, DatabaseError> {
        let compare = |l: &Column, r: &Column, test: fn(CmpOrdering) -> bool| {
            let (l, r) = (self.value(l, context)?, self.value(r, context)?);
            Ok::<_, DatabaseError>(l.sql_cmp(&r).map(test))
        };

        Ok(match predicate {
            ConcretePredicate::True => Some(true),
            ConcretePredicate::False => Some(false),
            ConcretePredicate::Eq(l, Column::Null) => Some(self.value(l, context)?.is_null()),
            ConcretePredicate::Neq(l, Column::Null) => Some(!self.value(l, context)?.is_null()),
            ConcretePredicate::Eq(l, r) => compare(l, r, CmpOrdering::is_eq)?,
            ConcretePredicate::Neq(l, r) => compare(l, r, CmpOrdering::is_ne)?,
            ConcretePredicate::Lt(l, r) => compare(l, r, CmpOrdering::is_lt)?,
            ConcretePredicate::Lte(l, r) => compare(l, r, CmpOrdering::is_le)?,
            ConcretePredicate::Gt(l, r) => compare(l, r, CmpOrdering::is_gt)?,
            ConcretePredicate::Gte(l, r) => compare(l, r, CmpOrdering::is_ge)?,
            ConcretePredicate::In(column, list) => {
                let values = list
                    .iter()
                    .map(|c| self.value(c, context))
                    .collect::<Result<Vec<_>, _>>()?;
                contains(&self.value(column, context)?, &values)
            }
            ConcretePredicate::NotIn(column, list) => {
                let values = list
                    .iter()
                    .map(|c| self.value(c, context))
                    .collect::<Result<Vec<_>, _>>()?;
                contains(&self.value(column, context)?, &values).map(|b| !b)
            }
            ConcretePredicate::InSelect(column, select) => {
                let values = self.first_column(select)?;
                contains(&self.value(column, context)?, &values)
            }
            ConcretePredicate::NotInSelect(column, select) => {
                let values = self.first_column(select)?;
                contains(&self.value(column, context)?, &values).map(|b| !b)
            }
            ConcretePredicate::Raw { sql, params } => self.raw_predicate(sql, params, context)?,
            ConcretePredicate::And(l, r) => {
                match (self.predicate(l, context)?, self.predicate(r, context)?) {
                    (Some(false), _) | (_, Some(false)) => Some(false),
                    (Some(true), Some(true)) => Some(true),
                    _ => None,
                }
            }
            ConcretePredicate::Or(l, r) => {
                match (self.predicate(l, context)?, self.predicate(r, context)?) {
                    (Some(true), _) | (_, Some(true)) => Some(true),
                    (Some(false), Some(false)) => Some(false),
                    _ => None,
                }
            }
            ConcretePredicate::Not(p) => self.predicate(p, context)?.map(|b| !b),
        })
    }

    fn raw_predicate(
        &self,
        sql: &str,
        params: &[SQLValue],
        context: &Context,
    ) -> Result<Option<bool>, DatabaseError> {
        let text = strip_parens(sql);
        match text.to_ascii_uppercase().replace(' ', "").as_str() {
            "1=0" | "FALSE" => return Ok(Some(false)),
            "1=1" | "TRUE" => return Ok(Some(true)),
            _ => {}
        }

        let mut params = params.iter();
        for (operator, test) in COMPARISONS {
            if let Some((lhs, rhs)) = text.split_once(operator) {
                let lhs = self.raw_value(lhs, context)?;
                let rhs = if rhs.trim() == "?" {
                    params
                        .next()
                        .cloned()
                        .ok_or_else(|| unsupported(format!("missing bind in {sql}")))?
                } else {
                    self.raw_value(rhs, context)?
                };
                return Ok(lhs.sql_cmp(&rhs).map(test));
            }
        }

        Err(unsupported(format!("predicate {sql}")))
    }

    fn first_column(&self, select: &Select) -> Result<Vec<SQLValue>, DatabaseError> {
        Ok(self
            .select(select)?
            .iter()
            .map(|row| row.get_index(0).cloned().unwrap_or(SQLValue::Null))
            .collect())
    }

    fn value(&self, column: &Column, context: &Context) -> Result<SQLValue, DatabaseError> {
        match column {
            Column::Physical { table, name } => context.lookup(table, name),
            Column::Param(value) => Ok(value.clone()),
            Column::Null => Ok(SQLValue::Null),
            Column::Raw(text) => self.raw_value(split_alias(text).0, context),
            Column::Aliased { column, .. } => self.value(column, context),
            Column::SubSelect(select) => Ok(self
                .first_column(select)?
                .into_iter()
                .next()
                .unwrap_or(SQLValue::Null)),
            Column::Star(_) => Err(unsupported("* as a value")),
            Column::Function {
                function,
                distinct,
                arg,
            } => {
                if !context.grouped {
                    return Err(DatabaseError::Validation(format!(
                        "aggregate function {} outside of an aggregating select",
                        function.name()
                    )));
                }

                let mut values = vec![];
                for scope in context.scopes {
                    let value = match arg.as_ref() {
                        Column::Star(_) => SQLValue::Bool(true),
                        arg => self.value(arg, &Context::row(scope))?,
                    };
                    if !value.is_null() && !(*distinct && values.contains(&value)) {
                        values.push(value);
                    }
                }

                aggregate(*function, values)
            }
        }
    }

    /// Values of the small expression language raw fragments use: literals, (qualified) column
    /// names and `COUNT(*)`
    fn raw_value(&self, text: &str, context: &Context) -> Result<SQLValue, DatabaseError> {
        let text = strip_parens(text);

        if let Ok(int) = text.parse::<i64>() {
            return Ok(SQLValue::Int(int));
        }
        if text.len() >= 2 && text.starts_with('\'') && text.ends_with('\'') {
            return Ok(SQLValue::Text(text[1..text.len() - 1].replace("''", "'")));
        }

        match text.to_ascii_uppercase().as_str() {
            "NULL" => return Ok(SQLValue::Null),
            "TRUE" => return Ok(SQLValue::Bool(true)),
            "FALSE" => return Ok(SQLValue::Bool(false)),
            "COUNT(*)" => {
                return self.value(
                    &Column::function(Function::Count, false, Column::Star(None)),
                    context,
                );
            }
            _ => {}
        }

        match text.split_once('.') {
            Some((table, column)) if is_identifier(table) && is_identifier(column) => {
                context.lookup(table, column)
            }
            None if is_identifier(text) => context.lookup_unqualified(text),
            _ => Err(unsupported(format!("expression {text}"))),
        }
    }
}

const COMPARISONS: [(&str, fn(CmpOrdering) -> bool); 7] = [
    (">=", CmpOrdering::is_ge),
    ("<=", CmpOrdering::is_le),
    ("<>", CmpOrdering::is_ne),
    ("!=", CmpOrdering::is_ne),
    ("=", CmpOrdering::is_eq),
    ("<", CmpOrdering::is_lt),
    (">", CmpOrdering::is_gt),
];

fn aggregate(function: Function, values: Vec<SQLValue>) -> Result<SQLValue, DatabaseError> {
    if function == Function::Count {
        return Ok(SQLValue::Int(values.len() as i64));
    }
    if values.is_empty() {
        return Ok(SQLValue::Null);
    }

    match function {
        Function::Sum if values.iter().all(|v| matches!(v, SQLValue::Int(_))) => Ok(SQLValue::Int(
            values.iter().filter_map(SQLValue::as_i64).sum(),
        )),
        Function::Sum => decimal_sum(&values).map(SQLValue::Decimal),
        Function::Avg => {
            let count = BigDecimal::from(values.len() as i64);
            decimal_sum(&values).map(|sum| SQLValue::Decimal(sum / count))
        }
        Function::Min | Function::Max => {
            let wanted = if function == Function::Min {
                CmpOrdering::Less
            } else {
                CmpOrdering::Greater
            };
            let mut values = values.into_iter();
            let first = values.next().unwrap_or(SQLValue::Null);
            Ok(values.fold(first, |best, value| {
                if value.sql_cmp(&best) == Some(wanted) {
                    value
                } else {
                    best
                }
            }))
        }
        Function::Count => Ok(SQLValue::Int(values.len() as i64)),
    }
}

fn decimal_sum(values: &[SQLValue]) -> Result<BigDecimal, DatabaseError> {
    values.iter().try_fold(BigDecimal::from(0), |sum, value| {
        value
            .as_decimal()
            .map(|d| sum + d)
            .ok_or_else(|| unsupported(format!("sum of {} values", value.type_name())))
    })
}

/// SQL's `IN`: true if any value is equal, unknown if none is but a NULL is involved
fn contains(value: &SQLValue, values: &[SQLValue]) -> Option<bool> {
    if values.is_empty() {
        return Some(false);
    }
    if value.is_null() {
        return None;
    }

    let mut unknown = false;
    for candidate in values {
        match value.sql_cmp(candidate) {
            Some(CmpOrdering::Equal) => return Some(true),
            None => unknown = true,
            Some(_) => {}
        }
    }

    if unknown { None } else { Some(false) }
}

fn compare_nulls_last(left: &SQLValue, right: &SQLValue) -> CmpOrdering {
    match (left.is_null(), right.is_null()) {
        (true, true) => CmpOrdering::Equal,
        (true, false) => CmpOrdering::Greater,
        (false, true) => CmpOrdering::Less,
        (false, false) => left.sql_cmp(right).unwrap_or(CmpOrdering::Equal),
    }
}

fn scope_names(table: &Table) -> Vec<String> {
    match table {
        Table::Physical { name, alias } => vec![alias.clone().unwrap_or_else(|| name.clone())],
        Table::SubSelect { alias, .. } => vec![alias.clone()],
        Table::Join(join) => {
            let mut names = scope_names(join.left());
            names.extend(scope_names(join.right()));
            names
        }
        Table::RawJoin { left, .. } => scope_names(left),
        Table::Raw(_) => vec![],
    }
}

/// `expr AS alias` into the expression and its output name
fn split_alias(text: &str) -> (&str, String) {
    let upper = text.to_ascii_uppercase();
    match upper.rfind(" AS ") {
        Some(position) => (
            text[..position].trim(),
            text[position + 4..].trim().trim_matches('"').to_string(),
        ),
        None => (text.trim(), text.trim().to_string()),
    }
}

fn strip_parens(text: &str) -> &str {
    let mut text = text.trim();
    while text.starts_with('(') && text.ends_with(')') && balanced(&text[1..text.len() - 1]) {
        text = text[1..text.len() - 1].trim();
    }
    text
}

fn balanced(text: &str) -> bool {
    let mut depth = 0i32;
    for c in text.chars() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

fn is_identifier(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use crate::sql::Limit;

    use super::*;

    fn connection() -> MemoryConnection {
        MemoryConnection::new().with_table(
            "people",
            vec![
                Row::new().with("id", 1).with("name", "Ada").with("age", 36),
                Row::new().with("id", 2).with("name", "Linus").with("age", SQLValue::Null),
                Row::new().with("id", 3).with("name", "Grace").with("age", 45),
            ],
        )
    }

    #[tokio::test]
    async fn orders_nulls_last_and_limits() {
        let connection = connection();
        let select = Select {
            order_by: Some(OrderBy(vec![OrderByElement::Expr(
                Column::physical("people", "age"),
                Ordering::Asc,
            )])),
            limit: Some(Limit(2)),
            ..Select::new(Table::physical("people"), vec![Column::physical("people", "name")])
        };

        let rows = connection.query(&SQLOperation::Select(select)).await.unwrap();
        assert_eq!(
            rows,
            vec![Row::new().with("name", "Ada"), Row::new().with("name", "Grace")]
        );
        assert_eq!(connection.statement_count(), 1);
        assert_eq!(
            connection.statements(),
            vec![r#"SELECT "people"."name" FROM "people" ORDER BY "people"."age" ASC LIMIT $1"#]
        );
    }

    #[tokio::test]
    async fn three_valued_predicates() {
        let connection = connection();
        let select = Select {
            predicate: ConcretePredicate::Not(Box::new(ConcretePredicate::Raw {
                sql: "age > ?".into(),
                params: vec![40.into()],
            })),
            ..Select::new(Table::physical("people"), vec![Column::physical("people", "id")])
        };

        // Linus' unknown age is neither over nor under 40
        let rows = connection.query(&SQLOperation::Select(select)).await.unwrap();
        assert_eq!(rows, vec![Row::new().with("id", 1)]);
    }

    #[tokio::test]
    async fn aggregates_over_no_rows() {
        let connection = connection();
        let select = Select {
            predicate: ConcretePredicate::False,
            ..Select::new(
                Table::physical("people"),
                vec![
                    Column::function(Function::Count, false, Column::Star(None)).aliased("count"),
                    Column::function(Function::Max, false, Column::physical("people", "age"))
                        .aliased("max"),
                ],
            )
        };

        let rows = connection.query(&SQLOperation::Select(select)).await.unwrap();
        assert_eq!(
            rows,
            vec![Row::new().with("count", 0).with("max", SQLValue::Null)]
        );
    }

    #[tokio::test]
    async fn mutations() {
        let connection = connection();

        let inserted = connection
            .query(&SQLOperation::Insert(Insert {
                table: "people".into(),
                columns: vec!["name".into()],
                values: vec![Column::Param("Barbara".into())],
                returning: vec![Column::physical("people", "id")],
            }))
            .await
            .unwrap();
        assert_eq!(inserted, vec![Row::new().with("id", 4)]);

        let updated = connection
            .execute(&SQLOperation::Update(Update {
                table: "people".into(),
                predicate: ConcretePredicate::Eq(
                    Column::physical("people", "age"),
                    Column::Null,
                ),
                column_values: vec![("age".into(), Column::Param(50.into()))],
            }))
            .await
            .unwrap();
        assert_eq!(updated, 2);

        let deleted = connection
            .execute(&SQLOperation::Delete(Delete {
                table: "people".into(),
                predicate: ConcretePredicate::Gte(
                    Column::physical("people", "age"),
                    Column::Param(45.into()),
                ),
            }))
            .await
            .unwrap();
        assert_eq!(deleted, 3);
        assert_eq!(connection.rows("people").len(), 1);
    }
}
