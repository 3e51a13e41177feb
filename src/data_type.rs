use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Physical type of a column.
/// Optionality is not part of the type: it is declared next to it in the column definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// A 32-bit signed integer.
    Int32,
    /// A 32-bit unsigned integer.
    Uint32,
    /// A 64-bit signed integer.
    Int64,
    /// A 64-bit unsigned integer.
    Uint64,
    /// A 64-bit floating-point number.
    Double,
    /// An interned UTF-8 string.
    String,
    /// A row id of the named table.
    TableId(Cow<'static, str>),
    /// A row id of the table owning the column.
    SelfId,
}

impl DataType {
    /// Builds a [DataType::TableId] pointing at `table`.
    pub const fn table_id(table: &'static str) -> Self {
        Self::TableId(Cow::Borrowed(table))
    }

    /// Returns true for every integer-backed type, row-id references included.
    pub fn is_integer(&self) -> bool {
        !matches!(self, Self::Double | Self::String)
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, Self::String)
    }

    /// Returns true if the column holds row ids of some table.
    pub fn is_reference(&self) -> bool {
        matches!(self, Self::TableId(_) | Self::SelfId)
    }

    /// Name of the table referenced by this type, resolving [DataType::SelfId] to `owner`.
    pub fn referenced_table<'a>(&'a self, owner: &'a str) -> Option<&'a str> {
        match self {
            Self::TableId(table) => Some(&**table),
            Self::SelfId => Some(owner),
            _ => None,
        }
    }

    /// Inclusive integer bounds accepted by the type, `None` for non-integer types.
    pub(crate) fn int_bounds(&self) -> Option<(i128, i128)> {
        match self {
            Self::Int32 => Some((i32::MIN as i128, i32::MAX as i128)),
            Self::Uint32 | Self::TableId(_) | Self::SelfId => Some((0, u32::MAX as i128)),
            Self::Int64 => Some((i64::MIN as i128, i64::MAX as i128)),
            Self::Uint64 => Some((0, u64::MAX as i128)),
            Self::Double | Self::String => None,
        }
    }

    /// Short, SQL-ish name used in error messages and column metadata.
    pub fn name(&self) -> String {
        match self {
            Self::Int32 => "int32".into(),
            Self::Uint32 => "uint32".into(),
            Self::Int64 => "int64".into(),
            Self::Uint64 => "uint64".into(),
            Self::Double => "double".into(),
            Self::String => "string".into(),
            Self::TableId(table) => format!("id({table})"),
            Self::SelfId => "id(self)".into(),
        }
    }
}
