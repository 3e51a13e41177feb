use std::borrow::Cow;
use std::collections::HashSet;

use allocative::Allocative;
use serde::{Deserialize, Serialize};

use crate::column::Column;
use crate::data_type::DataType;
use crate::error::{Result, StoreError};
use crate::flags::ColumnFlags;
use crate::value::Value;

/// Name of the implicit row-id column every table exposes.
pub const ID_COLUMN: &str = "id";

/// Column definition in the schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: Cow<'static, str>,
    pub data_type: DataType,
    pub optional: bool,
    pub flags: ColumnFlags,
}

impl ColumnDef {
    /// A column which rejects `NULL`.
    pub const fn required(name: &'static str, data_type: DataType, flags: ColumnFlags) -> Self {
        Self {
            name: Cow::Borrowed(name),
            data_type,
            optional: false,
            flags,
        }
    }

    /// A column which accepts `NULL`.
    pub const fn nullable(name: &'static str, data_type: DataType, flags: ColumnFlags) -> Self {
        Self {
            name: Cow::Borrowed(name),
            data_type,
            optional: true,
            flags,
        }
    }

    fn to_column(&self) -> Column {
        let column = Column::new(&*self.name, self.data_type.clone()).with_flags(self.flags);
        if self.optional {
            column.optional()
        } else {
            column
        }
    }
}

/// Declaration of a table: its columns and, for child tables, the parent it extends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: Cow<'static, str>,
    pub parent: Option<Cow<'static, str>>,
    pub columns: Cow<'static, [ColumnDef]>,
}

impl TableSchema {
    pub const fn root(name: &'static str, columns: &'static [ColumnDef]) -> Self {
        Self {
            name: Cow::Borrowed(name),
            parent: None,
            columns: Cow::Borrowed(columns),
        }
    }

    /// A table whose rows extend rows of `parent` and share its id space.
    pub const fn child(
        name: &'static str,
        parent: &'static str,
        columns: &'static [ColumnDef],
    ) -> Self {
        Self {
            name: Cow::Borrowed(name),
            parent: Some(Cow::Borrowed(parent)),
            columns: Cow::Borrowed(columns),
        }
    }
}

/// Link from a child table to the parent rows it extends.
#[derive(Debug, Allocative)]
pub(crate) struct ParentLink {
    /// Position of the parent in the session.
    pub(crate) table: usize,
    /// `rows[i]` is the parent row extended by child row `i`; strictly increasing.
    pub(crate) rows: Vec<u32>,
    /// `ids[i]` is the id of child row `i`, shared with every ancestor; strictly increasing.
    pub(crate) ids: Vec<u32>,
}

/// An append-only set of equal-length columns.
///
/// Root tables assign ids densely (`id == row`). Child tables own only their extra columns and
/// map each row to the parent row it extends; inherited columns are reached through the owning
/// [crate::Database].
#[derive(Debug, Allocative)]
pub struct Table {
    pub name: String,
    #[allocative(skip)]
    pub schema: TableSchema,
    pub columns: Vec<Column>,
    row_count: usize,
    pub(crate) parent: Option<ParentLink>,
}

impl Table {
    /// Builds an empty table. `parent` is the session position of the parent table.
    ///
    /// # Errors
    /// [StoreError::SchemaViolation] on duplicate column names, a column named `id`, or
    /// invalid flag combinations.
    pub(crate) fn new(schema: TableSchema, parent: Option<usize>) -> Result<Self> {
        let mut seen = HashSet::new();
        for def in schema.columns.iter() {
            if def.name == ID_COLUMN {
                return Err(StoreError::schema(
                    &schema.name,
                    "column name \"id\" is reserved for the row id",
                ));
            }
            if !seen.insert(&*def.name) {
                return Err(StoreError::schema(
                    &schema.name,
                    format!("duplicate column {:?}", def.name),
                ));
            }
            def.flags
                .validate(&def.data_type, def.optional)
                .map_err(|reason| {
                    StoreError::schema(&schema.name, format!("column {:?}: {reason}", def.name))
                })?;
        }

        let columns = schema.columns.iter().map(ColumnDef::to_column).collect();
        Ok(Self {
            name: schema.name.to_string(),
            schema,
            columns,
            row_count: 0,
            parent: parent.map(|table| ParentLink {
                table,
                rows: vec![],
                ids: vec![],
            }),
        })
    }

    /// Current number of rows; equal to the length of every column.
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn is_child(&self) -> bool {
        self.parent.is_some()
    }

    /// Looks up one of the table's own columns.
    /// Inherited columns are resolved by [crate::Database::column].
    pub fn column(&self, name: &str) -> Result<&Column> {
        self.columns
            .iter()
            .find(|col| col.name == name)
            .ok_or_else(|| StoreError::unknown_column(&self.name, name))
    }

    pub(crate) fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|col| col.name == name)
    }

    /// Id of the row at `row`.
    pub fn id(&self, row: usize) -> Result<u32> {
        if row >= self.row_count {
            return Err(StoreError::OutOfRange {
                index: row,
                len: self.row_count,
            });
        }
        Ok(match &self.parent {
            None => row as u32,
            Some(link) => link.ids[row],
        })
    }

    /// Maps a row id to its storage index.
    ///
    /// Identity for root tables; a binary search over the (increasing) ids of a child table,
    /// whose id space is a subset of its parent's.
    ///
    /// # Errors
    /// [StoreError::OutOfRange] if no row of this table carries `id`.
    pub fn resolve_id(&self, id: u32) -> Result<usize> {
        let not_found = StoreError::OutOfRange {
            index: id as usize,
            len: self.row_count,
        };
        match &self.parent {
            None if (id as usize) < self.row_count => Ok(id as usize),
            None => Err(not_found),
            Some(link) => link.ids.binary_search(&id).map_err(|_| not_found),
        }
    }

    /// Parent row extended by `row`, if this is a child table.
    pub fn parent_row(&self, row: usize) -> Option<u32> {
        self.parent.as_ref().and_then(|link| link.rows.get(row).copied())
    }

    /// Orders the supplied values by column, filling absent optional columns with `NULL`.
    ///
    /// `values[i]` is the value supplied for own column `i`, if any.
    pub(crate) fn prepare(&self, mut values: Vec<Option<Value>>) -> Result<Vec<Value>> {
        values.resize(self.columns.len(), None);
        self.columns
            .iter()
            .zip(values)
            .map(|(col, value)| match value {
                Some(value) => Ok(value),
                None if col.optional => Ok(Value::Null),
                None => Err(StoreError::schema(
                    &self.name,
                    format!("missing required column {:?}", col.name),
                )),
            })
            .collect()
    }

    /// Validates a prepared row against every column without mutating anything.
    pub(crate) fn check(&self, values: &[Value]) -> Result<()> {
        if values.len() != self.columns.len() {
            return Err(StoreError::schema(
                &self.name,
                format!(
                    "size of the row mismatched with the size of a table row, {} vs {}",
                    values.len(),
                    self.columns.len()
                ),
            ));
        }
        for (col, value) in self.columns.iter().zip(values) {
            col.check(value)
                .map_err(|reason| StoreError::schema(&self.name, reason))?;
        }
        Ok(())
    }

    /// Appends a row already accepted by [Table::check].
    ///
    /// `link` is `(parent row, id)` for child tables and ignored for root tables.
    /// Returns the id of the new row.
    pub(crate) fn commit(&mut self, values: Vec<Value>, link: Option<(u32, u32)>) -> Result<u32> {
        let row = self.row_count;
        for (i, value) in values.iter().enumerate() {
            if let Err(reason) = self.columns[i].push_unchecked(value) {
                for col in &mut self.columns[..i] {
                    col.truncate(row);
                }
                return Err(StoreError::schema(&self.name, reason));
            }
        }
        let id = match (&mut self.parent, link) {
            (Some(parent), Some((parent_row, id))) => {
                parent.rows.push(parent_row);
                parent.ids.push(id);
                id
            }
            _ => row as u32,
        };
        self.row_count += 1;
        Ok(id)
    }

    /// Checks that [Table::set] would accept `value`, without writing it.
    pub(crate) fn check_set(&self, column: usize, row: usize, value: &Value) -> Result<()> {
        let col = &self.columns[column];
        if !col.flags.contains(ColumnFlags::MUTABLE) {
            return Err(StoreError::ImmutableColumn {
                table: self.name.clone(),
                column: col.name.clone(),
            });
        }
        if row >= self.row_count {
            return Err(StoreError::OutOfRange {
                index: row,
                len: self.row_count,
            });
        }
        col.check_set(row, value)
            .map_err(|reason| StoreError::schema(&self.name, reason))
    }

    /// Overwrites one value of a MUTABLE column in place.
    pub(crate) fn set(&mut self, column: usize, row: usize, value: &Value) -> Result<()> {
        self.check_set(column, row, value)?;
        self.columns[column]
            .set(row, value)
            .map_err(|reason| StoreError::schema(&self.name, reason))
    }

    /// Checks the row-count invariant and every column's data invariants.
    pub fn check_invariants(&self) -> Result<()> {
        for col in &self.columns {
            if col.len() != self.row_count {
                return Err(StoreError::schema(
                    &self.name,
                    format!(
                        "column {:?} has {} rows, table has {}",
                        col.name,
                        col.len(),
                        self.row_count
                    ),
                ));
            }
            col.check_invariants()
                .map_err(|reason| StoreError::schema(&self.name, reason))?;
        }
        if let Some(link) = &self.parent {
            let increasing = |v: &[u32]| v.windows(2).all(|w| w[0] < w[1]);
            if link.rows.len() != self.row_count
                || !increasing(&link.rows)
                || !increasing(&link.ids)
            {
                return Err(StoreError::schema(&self.name, "corrupt parent row mapping"));
            }
        }
        Ok(())
    }
}
