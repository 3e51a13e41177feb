use std::cmp::Ordering;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::column::FilterOp;
use crate::database::{ColumnView, Database};
use crate::error::{Result, StoreError};
use crate::flags::ColumnFlags;
use crate::row_selection::RowSelection;
use crate::value::Value;

/// A leaf predicate `column OP value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub column: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Constraint {
    pub fn new(column: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            op,
            value: value.into(),
        }
    }
}

/// One `ORDER BY` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub column: String,
    pub desc: bool,
}

/// A single-table query: conjunctive constraints, ordering, projection and limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub table: String,
    pub constraints: Vec<Constraint>,
    pub orders: Vec<Order>,
    /// Projected columns; `None` means `SELECT *`.
    pub columns: Option<Vec<String>>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            constraints: vec![],
            orders: vec![],
            columns: None,
            limit: None,
        }
    }

    pub fn filter(
        mut self,
        column: impl Into<String>,
        op: FilterOp,
        value: impl Into<Value>,
    ) -> Self {
        self.constraints.push(Constraint::new(column, op, value));
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, desc: bool) -> Self {
        self.orders.push(Order {
            column: column.into(),
            desc,
        });
        self
    }

    pub fn select<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Represents the result of a successful query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    /// The names of the columns included in the result set.
    pub columns: Vec<String>,
    /// The actual data, returned as a vector of rows, where each row is a vector of [Value].
    pub rows: Vec<Vec<Value>>,
}

/// Shared flag a caller flips to stop a running query.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, AtomicOrdering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(AtomicOrdering::Relaxed)
    }

    fn check(&self, table: &str) -> Result<()> {
        if self.is_cancelled() {
            warn!(table, "query cancelled");
            return Err(StoreError::Cancelled);
        }
        Ok(())
    }
}

impl Database {
    /// Rows of `table` satisfying every constraint.
    ///
    /// Constraints answered from the column flags (id lookups, SORTED ranges, SET_ID
    /// membership) run first and narrow the candidates; the remaining constraints are
    /// evaluated by a scan over the surviving rows only. The scan checks `token` every
    /// [crate::StoreConfig::scan_chunk_rows] rows.
    ///
    /// # Errors
    /// - [StoreError::UnknownTable] / [StoreError::UnknownColumn] on lookup failures.
    /// - [StoreError::TypeMismatch] if a literal cannot be compared with its column.
    /// - [StoreError::Cancelled] once `token` is cancelled.
    pub fn filter(
        &self,
        table: &str,
        constraints: &[Constraint],
        token: &CancellationToken,
    ) -> Result<RowSelection> {
        let row_count = self.row_count(table)?;
        let mut indexed = vec![];
        let mut scanned = vec![];
        for constraint in constraints {
            let view = self.column(table, &constraint.column)?;
            view.check_literal(&constraint.value)?;
            if view.is_indexed(constraint.op) {
                indexed.push((view, constraint));
            } else {
                scanned.push((view, constraint));
            }
        }
        debug!(
            table,
            indexed = indexed.len(),
            scanned = scanned.len(),
            "planned filter"
        );

        let mut selection = RowSelection::all(row_count);
        for (view, constraint) in &indexed {
            token.check(table)?;
            let found = view.find_range(constraint.op, &constraint.value)?;
            selection = selection.intersect(&found);
            if selection.is_empty() {
                return Ok(RowSelection::empty());
            }
        }
        if scanned.is_empty() {
            return Ok(selection);
        }

        let chunk = self.config().scan_chunk_rows.max(1);
        let candidates = selection.to_vec();
        let mut matched = Vec::with_capacity(candidates.len());
        for rows in candidates.chunks(chunk) {
            token.check(table)?;
            matched.extend(rows.iter().copied().filter(|&row| {
                scanned
                    .iter()
                    .all(|(view, c)| view.matches(row, c.op, &c.value))
            }));
        }
        Ok(RowSelection::from_rows(row_count, matched))
    }

    /// Runs a query: filter, then sort, then limit, then projection.
    ///
    /// # Errors
    /// See [Database::filter]; projected and ordering columns must also exist.
    pub fn execute(&self, query: &Query, token: &CancellationToken) -> Result<QueryResult> {
        let table = query.table.as_str();
        let selection = self.filter(table, &query.constraints, token)?;

        let columns = match &query.columns {
            Some(columns) => columns.clone(),
            None => self.select_star_columns(table)?,
        };
        let views = columns
            .iter()
            .map(|name| self.column(table, name))
            .collect::<Result<Vec<_>>>()?;

        let mut rows = selection.to_vec();
        if !query.orders.is_empty() {
            self.sort(table, &mut rows, &query.orders, token)?;
        }
        rows.truncate(query.limit.unwrap_or(usize::MAX));

        let rows = rows
            .into_iter()
            .map(|row| views.iter().map(|view| view.get(row)).collect::<Result<Vec<_>>>())
            .collect::<Result<Vec<_>>>()?;
        Ok(QueryResult { columns, rows })
    }

    /// Sorts the selected rows in place by the `ORDER BY` keys.
    ///
    /// Multi-column sorting: if the first key compares equal, the next one decides, and so
    /// on. The sort is stable, so rows equal on every key keep their storage order. A single
    /// ascending key on a SORTED column (the id included) is already satisfied by storage
    /// order and is skipped.
    fn sort(
        &self,
        table: &str,
        rows: &mut Vec<usize>,
        orders: &[Order],
        token: &CancellationToken,
    ) -> Result<()> {
        let views = orders
            .iter()
            .map(|order| -> Result<(ColumnView<'_>, bool)> {
                Ok((self.column(table, &order.column)?, order.desc))
            })
            .collect::<Result<Vec<_>>>()?;

        if let [(view, false)] = views.as_slice() {
            if view.flags().contains(ColumnFlags::SORTED) {
                return Ok(());
            }
        }
        token.check(table)?;

        let mut keyed = rows
            .iter()
            .map(|&row| -> Result<(usize, Vec<Value>)> {
                let keys = views
                    .iter()
                    .map(|(view, _)| view.get(row))
                    .collect::<Result<Vec<Value>>>()?;
                Ok((row, keys))
            })
            .collect::<Result<Vec<_>>>()?;

        keyed.sort_by(|(_, a), (_, b)| {
            for (i, (_, is_desc)) in views.iter().enumerate() {
                let mut ord = a[i].sort_cmp(&b[i]);
                if *is_desc {
                    ord = ord.reverse();
                }
                // if it's not equal no need to compare more
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });

        *rows = keyed.into_iter().map(|(row, _)| row).collect();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_type::DataType;
    use crate::table::{ColumnDef, TableSchema};

    fn users() -> Database {
        let mut db = Database::new();
        db.register_table(TableSchema {
            name: "users".into(),
            parent: None,
            columns: vec![
                ColumnDef::required("ts", DataType::Int64, ColumnFlags::SORTED),
                ColumnDef::required("name", DataType::String, ColumnFlags::NONE),
                ColumnDef::nullable("score", DataType::Int64, ColumnFlags::NONE),
                ColumnDef::nullable("secret", DataType::String, ColumnFlags::HIDDEN),
            ]
            .into(),
        })
        .unwrap();
        let rows = [
            (10, "Alice", Some(100)),
            (20, "Bob", Some(100)),
            (30, "Charlie", Some(50)),
            (40, "Dave", None),
        ];
        for (ts, name, score) in rows {
            db.add_row(
                "users",
                &[
                    ("ts", Value::Int(ts)),
                    ("name", Value::from(name)),
                    ("score", Value::from(score)),
                ],
            )
            .unwrap();
        }
        db
    }

    // ─────────────────────────────────────────────────────────────
    // Test 1 : SELECT * hides HIDDEN columns
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_query_star() {
        let db = users();
        let res = db
            .execute(&Query::new("users"), &CancellationToken::new())
            .unwrap();
        assert_eq!(res.columns, vec!["id", "ts", "name", "score"]);
        assert_eq!(res.rows.len(), 4);
        assert_eq!(res.rows[3][3], Value::Null);
    }

    // ─────────────────────────────────────────────────────────────
    // Test 2 : sorted and scanned constraints combine
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_query_with_constraints() {
        let db = users();
        let query = Query::new("users")
            .filter("ts", FilterOp::Ge, 20)
            .filter("score", FilterOp::Lt, 200)
            .select(["name"]);
        let res = db.execute(&query, &CancellationToken::new()).unwrap();
        assert_eq!(
            res.rows,
            vec![vec![Value::from("Bob")], vec![Value::from("Charlie")]]
        );
    }

    // ─────────────────────────────────────────────────────────────
    // Test 3 : NULL handling
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_query_null_constraints() {
        let db = users();
        let token = CancellationToken::new();
        let sel = db
            .filter("users", &[Constraint::new("score", FilterOp::IsNull, Value::Null)], &token)
            .unwrap();
        assert_eq!(sel.to_vec(), vec![3]);

        // NULL never compares equal, not even to NULL.
        let sel = db
            .filter("users", &[Constraint::new("score", FilterOp::Eq, Value::Null)], &token)
            .unwrap();
        assert!(sel.is_empty());

        let sel = db
            .filter("users", &[Constraint::new("score", FilterOp::Ne, 100)], &token)
            .unwrap();
        assert_eq!(sel.to_vec(), vec![2]);
    }

    // ─────────────────────────────────────────────────────────────
    // Test 4 : multi-column ORDER BY with LIMIT
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_query_order_by_multiple_columns() {
        let db = users();
        let query = Query::new("users")
            .order_by("score", true)
            .order_by("name", false)
            .select(["name"])
            .limit(3);
        let res = db.execute(&query, &CancellationToken::new()).unwrap();
        assert_eq!(
            res.rows,
            vec![
                vec![Value::from("Alice")],
                vec![Value::from("Bob")],
                vec![Value::from("Charlie")],
            ]
        );
    }

    // ─────────────────────────────────────────────────────────────
    // Test 5 : ORDER BY on a sorted column
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_query_order_by_sorted_column() {
        let db = users();
        let asc = db
            .execute(
                &Query::new("users").order_by("ts", false).select(["ts"]),
                &CancellationToken::new(),
            )
            .unwrap();
        assert_eq!(asc.rows[0][0], Value::Int(10));

        let desc = db
            .execute(
                &Query::new("users").order_by("id", true).select(["ts"]).limit(2),
                &CancellationToken::new(),
            )
            .unwrap();
        assert_eq!(desc.rows, vec![vec![Value::Int(40)], vec![Value::Int(30)]]);
    }

    // ─────────────────────────────────────────────────────────────
    // Test 6 : bind errors
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_query_errors() {
        let db = users();
        let token = CancellationToken::new();
        assert!(matches!(
            db.execute(&Query::new("users").select(["nope"]), &token),
            Err(StoreError::UnknownColumn { .. })
        ));
        assert!(matches!(
            db.execute(&Query::new("nope"), &token),
            Err(StoreError::UnknownTable(_))
        ));
        assert!(matches!(
            db.execute(&Query::new("users").filter("ts", FilterOp::Eq, "ten"), &token),
            Err(StoreError::TypeMismatch { .. })
        ));
    }

    // ─────────────────────────────────────────────────────────────
    // Test 7 : cancellation
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_cancelled_query() {
        let db = users();
        let token = CancellationToken::new();
        token.cancel();
        let query = Query::new("users").filter("score", FilterOp::Gt, 0);
        assert_eq!(db.execute(&query, &token), Err(StoreError::Cancelled));
    }
}
