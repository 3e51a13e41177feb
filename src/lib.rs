pub mod column;
pub mod config;
pub mod data_type;
pub mod database;
pub mod error;
pub mod flags;
pub mod query;
pub mod row_selection;
pub mod string_pool;
pub mod table;
pub mod tables;
pub mod value;

pub use column::{Column, ColumnData, FilterOp, SetIdIndex};
pub use config::{ReferenceChecks, StoreConfig};
pub use data_type::DataType;
pub use database::{ColumnInfo, ColumnView, Database};
pub use error::{Result, StoreError};
pub use flags::ColumnFlags;
pub use query::{CancellationToken, Constraint, Order, Query, QueryResult};
pub use row_selection::RowSelection;
pub use string_pool::StringPool;
pub use table::{ColumnDef, ID_COLUMN, Table, TableSchema};
pub use value::Value;
