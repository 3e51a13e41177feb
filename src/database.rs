use std::cmp::Ordering;
use std::collections::HashMap;

use allocative::Allocative;
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::column::{Column, FilterOp, sorted_search};
use crate::config::{ReferenceChecks, StoreConfig};
use crate::data_type::DataType;
use crate::error::{Result, StoreError};
use crate::flags::ColumnFlags;
use crate::row_selection::RowSelection;
use crate::string_pool::StringPool;
use crate::table::{ID_COLUMN, Table, TableSchema};
use crate::value::Value;

static ID_TYPE: DataType = DataType::Uint32;

/// Metadata of a column as seen from a table, inherited columns included.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: DataType,
    pub optional: bool,
    pub flags: ColumnFlags,
    /// Table whose storage holds the column.
    pub owner: String,
}

/// A column addressed from a table, possibly stored by one of its ancestors.
///
/// Rows are always expressed in the addressing table's row space: reads walk the parent row
/// maps down to the owner's storage, and search results are mapped back up.
#[derive(Debug)]
pub struct ColumnView<'a> {
    table: &'a Table,
    owner: &'a Table,
    owner_handle: usize,
    /// `None` for the implicit id column.
    column: Option<(usize, &'a Column)>,
    /// Parent row maps from `table` up to (excluding) `owner`.
    maps: Vec<&'a [u32]>,
}

impl<'a> ColumnView<'a> {
    pub fn name(&self) -> &str {
        self.column.map_or(ID_COLUMN, |(_, col)| col.name.as_str())
    }

    /// Name of the table storing the column.
    pub fn owner(&self) -> &'a str {
        &self.owner.name
    }

    pub fn data_type(&self) -> &'a DataType {
        self.column.map_or(&ID_TYPE, |(_, col)| &col.data_type)
    }

    /// Flags of the column; the id column is reported as SORTED.
    pub fn flags(&self) -> ColumnFlags {
        self.column.map_or(ColumnFlags::SORTED, |(_, col)| col.flags)
    }

    pub fn optional(&self) -> bool {
        self.column.is_some_and(|(_, col)| col.optional)
    }

    pub fn is_id(&self) -> bool {
        self.column.is_none()
    }

    pub fn row_count(&self) -> usize {
        self.table.row_count()
    }

    fn storage_row(&self, row: usize) -> usize {
        self.maps.iter().fold(row, |row, map| map[row] as usize)
    }

    /// Value of the column at `row` of the addressing table.
    pub fn get(&self, row: usize) -> Result<Value> {
        if row >= self.row_count() {
            return Err(StoreError::OutOfRange {
                index: row,
                len: self.row_count(),
            });
        }
        match self.column {
            None => Ok(Value::Int(self.table.id(row)? as i64)),
            Some((_, col)) => col.get(self.storage_row(row)),
        }
    }

    /// Compares a row with a literal, `None` for NULL rows, incomparable values and rows past
    /// the end.
    pub fn compare_row(&self, row: usize, literal: &Value) -> Option<Ordering> {
        if row >= self.row_count() {
            return None;
        }
        match self.column {
            None => Value::Int(self.table.id(row).ok()? as i64).sql_cmp(literal),
            Some((_, col)) => col.compare_row(self.storage_row(row), literal),
        }
    }

    /// Evaluates `col OP literal` on a single row.
    pub fn matches(&self, row: usize, op: FilterOp, literal: &Value) -> bool {
        match op {
            FilterOp::IsNull => self.get(row).is_ok_and(|v| v.is_null()),
            FilterOp::IsNotNull => self.get(row).is_ok_and(|v| !v.is_null()),
            _ => op.matches(self.compare_row(row, literal)),
        }
    }

    pub fn check_literal(&self, literal: &Value) -> Result<()> {
        match self.column {
            Some((_, col)) => col.check_literal(literal),
            None if matches!(literal, Value::Text(_)) => Err(StoreError::TypeMismatch {
                expected: ID_TYPE.name(),
                found: literal.type_name().into(),
            }),
            None => Ok(()),
        }
    }

    /// Returns true when `op` is answered without scanning every row: id lookups, binary
    /// searches on SORTED data and set-id membership.
    pub fn is_indexed(&self, op: FilterOp) -> bool {
        let flags = self.flags();
        let range_or_ne = op.is_range_op() || op == FilterOp::Ne;
        (flags.contains(ColumnFlags::SORTED) && range_or_ne)
            || (flags.contains(ColumnFlags::SET_ID) && op == FilterOp::Eq)
    }

    /// Rows of the addressing table satisfying `col OP literal`.
    pub fn find_range(&self, op: FilterOp, literal: &Value) -> Result<RowSelection> {
        let Some((_, col)) = self.column else {
            return self.find_ids(op, literal);
        };
        if col.is_set_id() && !col.is_sorted() && op == FilterOp::Eq {
            if let Some(head) = literal.as_int().and_then(|v| u32::try_from(v).ok()) {
                let members = col.set_id_members(head)?;
                let owner_rows = RowSelection::from_rows(
                    col.len(),
                    members.into_iter().map(|row| row as usize),
                );
                return Ok(self.map_down(owner_rows));
            }
        }
        Ok(self.map_down(col.find_range(op, literal)?))
    }

    fn find_ids(&self, op: FilterOp, literal: &Value) -> Result<RowSelection> {
        let len = self.row_count();
        match op {
            FilterOp::IsNull => return Ok(RowSelection::empty()),
            FilterOp::IsNotNull => return Ok(RowSelection::all(len)),
            _ => {}
        }
        if literal.is_unordered() {
            return Ok(RowSelection::empty());
        }
        self.check_literal(literal)?;
        if op == FilterOp::Ne {
            let eq = sorted_search(len, FilterOp::Eq, |row| self.compare_row(row, literal));
            return Ok(RowSelection::Range(eq).complement(len));
        }
        Ok(RowSelection::Range(sorted_search(len, op, |row| {
            self.compare_row(row, literal)
        })))
    }

    /// Rows of the addressing table whose set-id value is `head`.
    pub fn set_id_members(&self, head: u32) -> Result<Vec<u32>> {
        let Some((_, col)) = self.column else {
            return Err(StoreError::TypeMismatch {
                expected: "SET_ID column".into(),
                found: "column \"id\"".into(),
            });
        };
        let members = col.set_id_members(head)?;
        Ok(self.maps.iter().rev().fold(members, |members, map| {
            members
                .into_iter()
                .filter_map(|row| map.binary_search(&row).ok().map(|i| i as u32))
                .collect()
        }))
    }

    fn map_down(&self, selection: RowSelection) -> RowSelection {
        self.maps
            .iter()
            .rev()
            .fold(selection, |selection, map| map_selection(selection, map))
    }
}

/// Maps a selection over parent rows to the child rows extending them.
fn map_selection(selection: RowSelection, parent_rows: &[u32]) -> RowSelection {
    match selection {
        RowSelection::Range(range) => {
            let lo = parent_rows.partition_point(|&p| (p as usize) < range.start);
            let hi = parent_rows.partition_point(|&p| (p as usize) < range.end);
            RowSelection::Range(lo..hi.max(lo))
        }
        RowSelection::Bits(bits) => RowSelection::from_rows(
            parent_rows.len(),
            parent_rows
                .iter()
                .enumerate()
                .filter(|(_, p)| bits.get(**p as usize).is_some_and(|bit| *bit))
                .map(|(row, _)| row),
        ),
    }
}

/// A trace-processing session: the single owner of every table and of the string pool.
///
/// Tables are declared up front with [Database::register_table], filled in append order with
/// [Database::add_row]/[Database::extend_row], and queried through the read-only accessors.
/// Reads take `&self` and may run on several threads; writes take `&mut self`, so the borrow
/// checker keeps ingestion and querying of one session apart.
#[derive(Debug, Default, Allocative)]
pub struct Database {
    tables: Vec<Table>,
    by_name: HashMap<String, usize>,
    strings: StringPool,
    #[allocative(skip)]
    config: StoreConfig,
}

impl Database {
    /// Creates a new, empty session with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn strings(&self) -> &StringPool {
        &self.strings
    }

    /// Declares a table.
    ///
    /// # Errors
    /// - [StoreError::SchemaViolation] if the name is taken, a column shadows an inherited
    ///   column, or a column definition is invalid.
    /// - [StoreError::UnknownTable] if the parent or a referenced table is not registered yet.
    pub fn register_table(&mut self, schema: TableSchema) -> Result<()> {
        let name = schema.name.to_string();
        if self.by_name.contains_key(&name) {
            return Err(StoreError::schema(
                &name,
                format!("Table {name} already exists in the database"),
            ));
        }
        let parent = match &schema.parent {
            Some(parent) => Some(self.handle(parent)?),
            None => None,
        };
        for def in schema.columns.iter() {
            if let Some(parent) = parent {
                if self.locate(&self.chain(parent), &def.name).is_some() {
                    return Err(StoreError::schema(
                        &name,
                        format!("column {:?} shadows an inherited column", def.name),
                    ));
                }
            }
            if let DataType::TableId(target) = &def.data_type {
                if *target != name && !self.by_name.contains_key(&**target) {
                    return Err(StoreError::UnknownTable(target.to_string()));
                }
            }
        }

        let table = Table::new(schema, parent)?;
        debug!(
            table = %name,
            columns = table.columns.len(),
            parent = ?parent.map(|p| self.tables[p].name.as_str()),
            "registered table"
        );
        self.by_name.insert(name, self.tables.len());
        self.tables.push(table);
        Ok(())
    }

    fn handle(&self, name: &str) -> Result<usize> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| StoreError::UnknownTable(name.to_owned()))
    }

    /// The table followed by its ancestors, closest first.
    fn chain(&self, handle: usize) -> Vec<usize> {
        let mut chain = vec![handle];
        let mut current = handle;
        while let Some(link) = &self.tables[current].parent {
            chain.push(link.table);
            current = link.table;
        }
        chain
    }

    /// Finds `(level in chain, column index)` of the table owning column `name`.
    fn locate(&self, chain: &[usize], name: &str) -> Option<(usize, usize)> {
        chain.iter().enumerate().find_map(|(level, &handle)| {
            self.tables[handle]
                .column_index(name)
                .map(|index| (level, index))
        })
    }

    /// Retrieves a table by name.
    pub fn table(&self, name: &str) -> Result<&Table> {
        Ok(&self.tables[self.handle(name)?])
    }

    /// Returns the names of all registered tables, in registration order.
    pub fn list_tables(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    /// Resolves a column of `table`, walking up the parent chain if the table does not own it.
    /// `"id"` resolves to the implicit row-id column.
    pub fn column(&self, table: &str, name: &str) -> Result<ColumnView<'_>> {
        let handle = self.handle(table)?;
        let addressed = &self.tables[handle];
        if name == ID_COLUMN {
            return Ok(ColumnView {
                table: addressed,
                owner: addressed,
                owner_handle: handle,
                column: None,
                maps: vec![],
            });
        }

        let mut maps = vec![];
        let mut current = handle;
        loop {
            let owner = &self.tables[current];
            if let Some(index) = owner.column_index(name) {
                return Ok(ColumnView {
                    table: addressed,
                    owner,
                    owner_handle: current,
                    column: Some((index, &owner.columns[index])),
                    maps,
                });
            }
            match &owner.parent {
                Some(link) => {
                    maps.push(link.rows.as_slice());
                    current = link.table;
                }
                None => return Err(StoreError::unknown_column(table, name)),
            }
        }
    }

    /// Column metadata: the id column, then inherited columns (root first), then own columns.
    pub fn enumerate_columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let handle = self.handle(table)?;
        let mut infos = vec![ColumnInfo {
            name: ID_COLUMN.to_owned(),
            data_type: ID_TYPE.clone(),
            optional: false,
            flags: ColumnFlags::SORTED,
            owner: self.tables[handle].name.clone(),
        }];
        for &level in self.chain(handle).iter().rev() {
            let owner = &self.tables[level];
            infos.extend(owner.columns.iter().map(|col| ColumnInfo {
                name: col.name.clone(),
                data_type: col.data_type.clone(),
                optional: col.optional,
                flags: col.flags,
                owner: owner.name.clone(),
            }));
        }
        Ok(infos)
    }

    /// Columns projected by `SELECT *`: every column except the HIDDEN ones.
    pub fn select_star_columns(&self, table: &str) -> Result<Vec<String>> {
        Ok(self
            .enumerate_columns(table)?
            .into_iter()
            .filter(|info| !info.flags.contains(ColumnFlags::HIDDEN))
            .map(|info| info.name)
            .collect())
    }

    pub fn row_count(&self, table: &str) -> Result<usize> {
        Ok(self.table(table)?.row_count())
    }

    /// Positional read of one value.
    pub fn get(&self, table: &str, column: &str, row: usize) -> Result<Value> {
        self.column(table, column)?.get(row)
    }

    /// Rows of `table` satisfying `column OP literal`, using the column's flags to avoid scans.
    pub fn find_range(
        &self,
        table: &str,
        column: &str,
        op: FilterOp,
        literal: &Value,
    ) -> Result<RowSelection> {
        self.column(table, column)?.find_range(op, literal)
    }

    /// Rows of `table` whose SET_ID `column` equals `head`.
    pub fn set_id_members(&self, table: &str, column: &str, head: u32) -> Result<Vec<u32>> {
        self.column(table, column)?.set_id_members(head)
    }

    /// Maps a row id of `table` to its storage index.
    pub fn resolve_id(&self, table: &str, id: u32) -> Result<usize> {
        self.table(table)?.resolve_id(id)
    }

    /// Strings are only interned once their row has been accepted.
    fn intern_row(&mut self, row: Vec<Value>) -> Vec<Value> {
        row.iter().map(|value| self.intern(value)).collect()
    }

    fn intern(&mut self, value: &Value) -> Value {
        match value {
            Value::Text(s) => Value::Text(self.strings.intern(s)),
            other => other.clone(),
        }
    }

    /// Appends one row to `table`, creating the matching rows of every ancestor in the same
    /// step. `values` may name any own or inherited column; omitted optional columns are NULL.
    ///
    /// Every level is validated before anything is written, so a rejected row leaves all
    /// tables untouched. Returns the id of the new row.
    ///
    /// # Errors
    /// [StoreError::SchemaViolation] for unknown, duplicate or missing required columns, values
    /// of the wrong type, broken SORTED/SET_ID invariants, and (with eager reference checks)
    /// table-id values which do not resolve.
    pub fn add_row(&mut self, table: &str, values: &[(&str, Value)]) -> Result<u32> {
        let result = self.try_add_row(table, values);
        match &result {
            Ok(id) => trace!(table, id, "appended row"),
            Err(err) => warn!(table, error = %err, "rejected row"),
        }
        result
    }

    fn try_add_row(&mut self, table: &str, values: &[(&str, Value)]) -> Result<u32> {
        let handle = self.handle(table)?;
        let chain = self.chain(handle);

        let mut per_level: Vec<Vec<Option<Value>>> = vec![vec![]; chain.len()];
        for (name, value) in values {
            if *name == ID_COLUMN {
                return Err(StoreError::schema(table, "id is assigned on append"));
            }
            let (level, index) = self
                .locate(&chain, name)
                .ok_or_else(|| StoreError::schema(table, format!("unknown column {name:?}")))?;
            let slots = &mut per_level[level];
            if slots.len() <= index {
                slots.resize(index + 1, None);
            }
            if slots[index].replace(value.clone()).is_some() {
                return Err(StoreError::schema(
                    table,
                    format!("column {name:?} given twice"),
                ));
            }
        }

        let mut prepared = Vec::with_capacity(chain.len());
        for (level, slots) in per_level.into_iter().enumerate() {
            let target = &self.tables[chain[level]];
            let row = target.prepare(slots)?;
            target.check(&row)?;
            self.check_references(target, &row)?;
            prepared.push(row);
        }

        let mut link = None;
        let mut id = 0;
        for (level, row) in prepared.into_iter().enumerate().rev() {
            let row = self.intern_row(row);
            let target = &mut self.tables[chain[level]];
            id = target.commit(row, link)?;
            link = Some(((target.row_count() - 1) as u32, id));
        }
        Ok(id)
    }

    /// Appends a row to the child `table` extending the existing parent row `parent_id`.
    /// Only the child's own columns may be given. Parent ids must be extended in increasing
    /// order, each at most once.
    ///
    /// # Errors
    /// [StoreError::SchemaViolation] if `table` has no parent, the parent row does not exist,
    /// or the row is invalid (see [Database::add_row]).
    pub fn extend_row(
        &mut self,
        table: &str,
        parent_id: u32,
        values: &[(&str, Value)],
    ) -> Result<u32> {
        let result = self.try_extend_row(table, parent_id, values);
        match &result {
            Ok(id) => trace!(table, id, "extended parent row"),
            Err(err) => warn!(table, parent_id, error = %err, "rejected row"),
        }
        result
    }

    fn try_extend_row(
        &mut self,
        table: &str,
        parent_id: u32,
        values: &[(&str, Value)],
    ) -> Result<u32> {
        let handle = self.handle(table)?;
        let child = &self.tables[handle];
        let Some(link) = &child.parent else {
            return Err(StoreError::schema(table, "not a child table"));
        };
        let parent = &self.tables[link.table];
        let parent_row = parent.resolve_id(parent_id).map_err(|_| {
            StoreError::schema(
                table,
                format!("parent row with id {parent_id} does not exist in {}", parent.name),
            )
        })? as u32;
        if link.rows.last().is_some_and(|&last| last >= parent_row) {
            return Err(StoreError::schema(
                table,
                format!("parent row with id {parent_id} is already extended or out of order"),
            ));
        }

        let mut indexed = Vec::with_capacity(values.len());
        for (name, value) in values {
            let index = child.column_index(name).ok_or_else(|| {
                StoreError::schema(table, format!("{name:?} is not an own column of {table}"))
            })?;
            indexed.push((index, value));
        }

        let mut slots: Vec<Option<Value>> = vec![];
        for (index, value) in indexed {
            if slots.len() <= index {
                slots.resize(index + 1, None);
            }
            if slots[index].replace(value.clone()).is_some() {
                return Err(StoreError::schema(table, "column given twice"));
            }
        }

        let child = &self.tables[handle];
        let row = child.prepare(slots)?;
        child.check(&row)?;
        self.check_references(child, &row)?;
        let row = self.intern_row(row);
        self.tables[handle].commit(row, Some((parent_row, parent_id)))
    }

    /// With eager reference checks, rejects table-id values that do not resolve yet.
    fn check_references(&self, table: &Table, row: &[Value]) -> Result<()> {
        if self.config.reference_checks == ReferenceChecks::Lazy {
            return Ok(());
        }
        for (col, value) in table.columns.iter().zip(row) {
            self.check_reference(table, col, value)?;
        }
        Ok(())
    }

    fn check_reference(&self, table: &Table, col: &Column, value: &Value) -> Result<()> {
        let Some(target) = col.data_type.referenced_table(&table.name) else {
            return Ok(());
        };
        let Some(id) = value.as_int() else {
            return Ok(());
        };
        if self.table(target)?.resolve_id(id as u32).is_err() {
            return Err(StoreError::schema(
                &table.name,
                format!("{}: id {id} does not exist in {target}", col.name),
            ));
        }
        Ok(())
    }

    /// Overwrites a value of a MUTABLE column (e.g. closing an open-ended duration).
    ///
    /// # Errors
    /// [StoreError::ImmutableColumn] for any column not flagged MUTABLE (the id included),
    /// [StoreError::OutOfRange] past the last row.
    pub fn set_value(&mut self, table: &str, column: &str, row: usize, value: Value) -> Result<()> {
        let (owner, index, storage_row) = {
            let view = self.column(table, column)?;
            let Some((index, _)) = view.column else {
                return Err(StoreError::ImmutableColumn {
                    table: table.to_owned(),
                    column: column.to_owned(),
                });
            };
            if row >= view.row_count() {
                return Err(StoreError::OutOfRange {
                    index: row,
                    len: view.row_count(),
                });
            }
            (view.owner_handle, index, view.storage_row(row))
        };
        let owner_table = &self.tables[owner];
        owner_table.check_set(index, storage_row, &value)?;
        if self.config.reference_checks == ReferenceChecks::Eager {
            self.check_reference(owner_table, &owner_table.columns[index], &value)?;
        }
        let value = self.intern(&value);
        self.tables[owner].set(index, storage_row, &value)
    }

    /// Follows the table-id column `fk_column` of `row` and reads `target_column` of the
    /// referenced row. Since ids are dense, this is a direct index lookup rather than a join.
    ///
    /// Returns `NULL` when the foreign key is `NULL`.
    ///
    /// # Errors
    /// [StoreError::TypeMismatch] if `fk_column` is not a table-id column,
    /// [StoreError::OutOfRange] for a dangling reference.
    pub fn join_value(
        &self,
        table: &str,
        fk_column: &str,
        row: usize,
        target_column: &str,
    ) -> Result<Value> {
        let view = self.column(table, fk_column)?;
        let target = referenced_table(&view)?;
        let Some(id) = view.get(row)?.as_int() else {
            return Ok(Value::Null);
        };
        let index = self.resolve_id(target, id as u32)?;
        self.get(target, target_column, index)
    }

    /// Checks at plan time that `fk_column` may be joined with the ids of `target_table`:
    /// the column must reference that table or one of its ancestors (child ids are a subset
    /// of their parent's).
    pub fn check_join(&self, table: &str, fk_column: &str, target_table: &str) -> Result<()> {
        let view = self.column(table, fk_column)?;
        let referenced = referenced_table(&view)?;
        let target = self.handle(target_table)?;
        let compatible = self
            .chain(target)
            .iter()
            .any(|&handle| self.tables[handle].name == referenced);
        if compatible {
            Ok(())
        } else {
            Err(StoreError::TypeMismatch {
                expected: format!("id({referenced})"),
                found: format!("id({target_table})"),
            })
        }
    }

    /// Verifies that every table-id value of `table` resolves in its target table.
    /// Meant to run once ingestion of both sides is complete.
    pub fn validate_references(&self, table: &str) -> Result<()> {
        let source = self.table(table)?;
        for col in &source.columns {
            let Some(target_name) = col.data_type.referenced_table(&source.name) else {
                continue;
            };
            let target = self.table(target_name)?;
            for row in 0..source.row_count() {
                let Some(id) = col.get(row)?.as_int() else {
                    continue;
                };
                if target.resolve_id(id as u32).is_err() {
                    return Err(StoreError::DanglingReference {
                        table: source.name.clone(),
                        column: col.name.clone(),
                        row,
                        target: target.name.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Re-checks every storage invariant of every table, parent row maps included.
    pub fn check_invariants(&self) -> Result<()> {
        for table in &self.tables {
            table.check_invariants()?;
            let Some(link) = &table.parent else {
                continue;
            };
            let parent = &self.tables[link.table];
            for (row, (&parent_row, &id)) in link.rows.iter().zip(&link.ids).enumerate() {
                if parent.id(parent_row as usize).ok() != Some(id) {
                    return Err(StoreError::schema(
                        &table.name,
                        format!("row {row} does not share its id with parent row {parent_row}"),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Estimated heap footprint of the session, in bytes.
    pub fn memory_usage(&self) -> usize {
        allocative::size_of_unique_allocated_data(self)
    }
}

fn referenced_table<'a>(view: &ColumnView<'a>) -> Result<&'a str> {
    view.data_type()
        .referenced_table(view.owner())
        .ok_or_else(|| StoreError::TypeMismatch {
            expected: "table id column".into(),
            found: view.data_type().name(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::ColumnDef;

    fn sample_schema() -> TableSchema {
        TableSchema {
            name: "sample".into(),
            parent: None,
            columns: vec![
                ColumnDef::required("ts", DataType::Int64, ColumnFlags::SORTED),
                ColumnDef::required("cpu", DataType::Uint32, ColumnFlags::NONE),
            ]
            .into(),
        }
    }

    fn cpu_sample_schema() -> TableSchema {
        TableSchema {
            name: "cpu_sample".into(),
            parent: Some("sample".into()),
            columns: vec![ColumnDef::nullable(
                "priority",
                DataType::Int32,
                ColumnFlags::NONE,
            )]
            .into(),
        }
    }

    fn session() -> Database {
        let mut db = Database::new();
        db.register_table(sample_schema()).unwrap();
        db.register_table(cpu_sample_schema()).unwrap();
        db
    }

    #[test]
    fn test_register_and_list_tables() {
        let db = session();
        assert_eq!(db.list_tables(), vec!["sample", "cpu_sample"]);
        assert!(db.table("cpu_sample").unwrap().is_child());
        assert_eq!(
            db.table("nope").unwrap_err(),
            StoreError::UnknownTable("nope".into())
        );
    }

    #[test]
    fn test_duplicate_table_error() {
        let mut db = session();
        let err = db.register_table(sample_schema()).unwrap_err();
        assert!(matches!(err, StoreError::SchemaViolation { .. }));
    }

    #[test]
    fn test_register_requires_known_parent_and_targets() {
        let mut db = Database::new();
        assert_eq!(
            db.register_table(cpu_sample_schema()),
            Err(StoreError::UnknownTable("sample".into()))
        );

        let dangling = TableSchema {
            name: "callsite".into(),
            parent: None,
            columns: vec![ColumnDef::required(
                "frame_id",
                DataType::table_id("frame"),
                ColumnFlags::NONE,
            )]
            .into(),
        };
        assert_eq!(
            db.register_table(dangling),
            Err(StoreError::UnknownTable("frame".into()))
        );
    }

    #[test]
    fn test_child_cannot_shadow_parent_column() {
        let mut db = Database::new();
        db.register_table(sample_schema()).unwrap();
        let shadowing = TableSchema {
            name: "bad".into(),
            parent: Some("sample".into()),
            columns: vec![ColumnDef::required("ts", DataType::Int64, ColumnFlags::NONE)].into(),
        };
        assert!(db.register_table(shadowing).is_err());
    }

    #[test]
    fn test_add_row_creates_parent_rows() {
        let mut db = session();
        db.add_row("sample", &[("ts", Value::Int(10)), ("cpu", Value::Int(0))])
            .unwrap();
        let id = db
            .add_row(
                "cpu_sample",
                &[
                    ("ts", Value::Int(20)),
                    ("cpu", Value::Int(1)),
                    ("priority", Value::Int(-2)),
                ],
            )
            .unwrap();

        assert_eq!(id, 1);
        assert_eq!(db.row_count("sample"), Ok(2));
        assert_eq!(db.row_count("cpu_sample"), Ok(1));
        assert_eq!(db.get("cpu_sample", "ts", 0), Ok(Value::Int(20)));
        assert_eq!(db.get("cpu_sample", "id", 0), Ok(Value::Int(1)));
        assert_eq!(db.resolve_id("cpu_sample", 1), Ok(0));
        assert!(db.resolve_id("cpu_sample", 0).is_err());
        assert!(db.check_invariants().is_ok());
    }

    #[test]
    fn test_rejected_row_is_atomic_across_levels() {
        let mut db = session();
        // The child value is invalid: nothing may land in the parent either.
        let err = db.add_row(
            "cpu_sample",
            &[
                ("ts", Value::Int(1)),
                ("cpu", Value::Int(0)),
                ("priority", Value::Text("high".into())),
            ],
        );
        assert!(matches!(err, Err(StoreError::SchemaViolation { .. })));
        assert_eq!(db.row_count("sample"), Ok(0));
        assert_eq!(db.row_count("cpu_sample"), Ok(0));
    }

    #[test]
    fn test_add_row_errors() {
        let mut db = session();
        assert!(db.add_row("sample", &[("ts", Value::Int(1))]).is_err());
        assert!(
            db.add_row(
                "sample",
                &[("ts", Value::Int(1)), ("cpu", Value::Int(0)), ("x", Value::Int(0))]
            )
            .is_err()
        );
        assert!(
            db.add_row(
                "sample",
                &[("ts", Value::Int(1)), ("ts", Value::Int(2)), ("cpu", Value::Int(0))]
            )
            .is_err()
        );
        assert!(
            db.add_row("sample", &[("id", Value::Int(0)), ("ts", Value::Int(1))])
                .is_err()
        );
        assert_eq!(
            db.add_row("missing", &[]),
            Err(StoreError::UnknownTable("missing".into()))
        );
    }

    #[test]
    fn test_extend_row() {
        let mut db = session();
        for ts in [5, 6, 7] {
            db.add_row("sample", &[("ts", Value::Int(ts)), ("cpu", Value::Int(0))])
                .unwrap();
        }

        assert!(matches!(
            db.extend_row("cpu_sample", 9, &[]),
            Err(StoreError::SchemaViolation { .. })
        ));

        assert_eq!(
            db.extend_row("cpu_sample", 1, &[("priority", Value::Int(3))]),
            Ok(1)
        );
        assert_eq!(db.get("cpu_sample", "ts", 0), Ok(Value::Int(6)));
        assert_eq!(db.get("cpu_sample", "priority", 0), Ok(Value::Int(3)));

        // Already extended, then out of order.
        assert!(db.extend_row("cpu_sample", 1, &[]).is_err());
        assert!(db.extend_row("cpu_sample", 0, &[]).is_err());
        // Inherited columns cannot be set through extend_row.
        assert!(db.extend_row("cpu_sample", 2, &[("ts", Value::Int(7))]).is_err());
        assert!(db.extend_row("sample", 0, &[]).is_err());
        assert_eq!(db.extend_row("cpu_sample", 2, &[]), Ok(2));
        assert_eq!(db.get("cpu_sample", "priority", 1), Ok(Value::Null));
    }

    #[test]
    fn test_inherited_sorted_find_range() {
        let mut db = session();
        for ts in 0..10 {
            if ts % 3 == 0 {
                db.add_row("cpu_sample", &[("ts", Value::Int(ts)), ("cpu", Value::Int(0))])
                    .unwrap();
            } else {
                db.add_row("sample", &[("ts", Value::Int(ts)), ("cpu", Value::Int(1))])
                    .unwrap();
            }
        }
        // cpu_sample holds ts 0, 3, 6, 9.
        let sel = db
            .find_range("cpu_sample", "ts", FilterOp::Ge, &Value::Int(4))
            .unwrap();
        assert_eq!(sel, RowSelection::Range(2..4));

        let cpu0 = db
            .find_range("cpu_sample", "cpu", FilterOp::Eq, &Value::Int(0))
            .unwrap();
        assert_eq!(cpu0.to_vec(), vec![0, 1, 2, 3]);

        let ids = db
            .find_range("cpu_sample", "id", FilterOp::Gt, &Value::Int(3))
            .unwrap();
        assert_eq!(ids, RowSelection::Range(2..4));
        let id_eq = db
            .find_range("cpu_sample", "id", FilterOp::Eq, &Value::Int(4))
            .unwrap();
        assert!(id_eq.is_empty());
    }

    #[test]
    fn test_enumerate_columns() {
        let db = session();
        let names: Vec<(String, String)> = db
            .enumerate_columns("cpu_sample")
            .unwrap()
            .into_iter()
            .map(|info| (info.name, info.owner))
            .collect();
        assert_eq!(
            names,
            vec![
                ("id".to_string(), "cpu_sample".to_string()),
                ("ts".to_string(), "sample".to_string()),
                ("cpu".to_string(), "sample".to_string()),
                ("priority".to_string(), "cpu_sample".to_string()),
            ]
        );
        assert!(matches!(
            db.column("cpu_sample", "dur"),
            Err(StoreError::UnknownColumn { .. })
        ));
    }

    #[test]
    fn test_set_value_requires_mutable() {
        let mut db = Database::new();
        db.register_table(TableSchema {
            name: "slice".into(),
            parent: None,
            columns: vec![
                ColumnDef::required("ts", DataType::Int64, ColumnFlags::SORTED),
                ColumnDef::nullable("dur", DataType::Int64, ColumnFlags::MUTABLE),
            ]
            .into(),
        })
        .unwrap();
        db.add_row("slice", &[("ts", Value::Int(100))]).unwrap();

        db.set_value("slice", "dur", 0, Value::Int(25)).unwrap();
        assert_eq!(db.get("slice", "dur", 0), Ok(Value::Int(25)));
        assert!(matches!(
            db.set_value("slice", "ts", 0, Value::Int(1)),
            Err(StoreError::ImmutableColumn { .. })
        ));
        assert!(matches!(
            db.set_value("slice", "id", 0, Value::Int(1)),
            Err(StoreError::ImmutableColumn { .. })
        ));
        assert!(matches!(
            db.set_value("slice", "dur", 4, Value::Int(1)),
            Err(StoreError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_strings_are_interned() {
        let mut db = Database::new();
        db.register_table(TableSchema {
            name: "frame".into(),
            parent: None,
            columns: vec![ColumnDef::required("name", DataType::String, ColumnFlags::NONE)].into(),
        })
        .unwrap();
        for _ in 0..3 {
            db.add_row("frame", &[("name", Value::from("main"))]).unwrap();
        }
        assert_eq!(db.strings().len(), 1);
        assert!(db.memory_usage() > 0);
    }

    #[test]
    fn test_rejected_rows_do_not_intern() {
        let mut db = Database::new();
        db.register_table(TableSchema {
            name: "frame".into(),
            parent: None,
            columns: vec![
                ColumnDef::required("name", DataType::String, ColumnFlags::NONE),
                ColumnDef::required("depth", DataType::Uint32, ColumnFlags::NONE),
                ColumnDef::nullable("label", DataType::String, ColumnFlags::MUTABLE),
            ]
            .into(),
        })
        .unwrap();
        db.add_row("frame", &[("name", Value::from("main")), ("depth", Value::Int(0))])
            .unwrap();
        assert_eq!(db.strings().len(), 1);

        let rejected = [("name", Value::from("ghost")), ("depth", Value::Int(-1))];
        assert!(db.add_row("frame", &rejected).is_err());
        assert!(db.set_value("frame", "label", 5, Value::from("late")).is_err());
        assert!(db.set_value("frame", "depth", 0, Value::from("late")).is_err());
        assert_eq!(db.strings().len(), 1);
        assert!(db.strings().get("ghost").is_none());

        db.set_value("frame", "label", 0, Value::from("late")).unwrap();
        assert_eq!(db.strings().len(), 2);
        assert_eq!(db.get("frame", "label", 0), Ok(Value::from("late")));
    }

    #[test]
    fn test_uint64_round_trip() {
        let mut db = Database::new();
        db.register_table(TableSchema {
            name: "mapping".into(),
            parent: None,
            columns: vec![ColumnDef::required("end", DataType::Uint64, ColumnFlags::NONE)].into(),
        })
        .unwrap();
        db.add_row("mapping", &[("end", Value::from(u64::MAX))]).unwrap();
        db.add_row("mapping", &[("end", Value::Int(4096))]).unwrap();

        assert_eq!(db.get("mapping", "end", 0), Ok(Value::Uint(u64::MAX)));
        assert_eq!(db.get("mapping", "end", 1), Ok(Value::Int(4096)));
        let above = db
            .find_range("mapping", "end", FilterOp::Gt, &Value::Int(i64::MAX))
            .unwrap();
        assert_eq!(above.to_vec(), vec![0]);
    }
}
