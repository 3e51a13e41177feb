//! Static descriptors of the profiler tables.
//!
//! Every table is a `const` [TableSchema]; [register_profiler_tables] declares them in an
//! order where each parent and each referenced table precedes its users.

use crate::data_type::DataType;
use crate::database::Database;
use crate::error::Result;
use crate::flags::ColumnFlags;
use crate::table::{ColumnDef, TableSchema};

const NONE: ColumnFlags = ColumnFlags::NONE;

const STACK_PROFILE_MAPPING_COLUMNS: &[ColumnDef] = &[
    ColumnDef::required("build_id", DataType::String, NONE),
    ColumnDef::required("exact_offset", DataType::Int64, NONE),
    ColumnDef::required("start_offset", DataType::Int64, NONE),
    ColumnDef::required("start", DataType::Int64, NONE),
    ColumnDef::required("end", DataType::Int64, NONE),
    ColumnDef::required("load_bias", DataType::Int64, NONE),
    ColumnDef::required("name", DataType::String, NONE),
];

/// Executable mappings referenced by frames.
pub const STACK_PROFILE_MAPPING: TableSchema = TableSchema::root(
    "stack_profile_mapping",
    STACK_PROFILE_MAPPING_COLUMNS,
);

const STACK_PROFILE_FRAME_COLUMNS: &[ColumnDef] = &[
    ColumnDef::required("name", DataType::String, NONE),
    ColumnDef::required(
        "mapping",
        DataType::table_id("stack_profile_mapping"),
        NONE,
    ),
    ColumnDef::required("rel_pc", DataType::Int64, NONE),
    ColumnDef::nullable("symbol_set_id", DataType::Uint32, ColumnFlags::MUTABLE),
    ColumnDef::nullable("deobfuscated_name", DataType::String, ColumnFlags::MUTABLE),
];

pub const STACK_PROFILE_FRAME: TableSchema = TableSchema::root(
    "stack_profile_frame",
    STACK_PROFILE_FRAME_COLUMNS,
);

const STACK_PROFILE_CALLSITE_COLUMNS: &[ColumnDef] = &[
    ColumnDef::required("depth", DataType::Uint32, NONE),
    ColumnDef::nullable("parent_id", DataType::SelfId, NONE),
    ColumnDef::required("frame_id", DataType::table_id("stack_profile_frame"), NONE),
];

/// Call-stack tree: each callsite points at its caller through `parent_id`.
pub const STACK_PROFILE_CALLSITE: TableSchema = TableSchema::root(
    "stack_profile_callsite",
    STACK_PROFILE_CALLSITE_COLUMNS,
);

const STACK_SAMPLE_COLUMNS: &[ColumnDef] = &[
    ColumnDef::required("ts", DataType::Int64, ColumnFlags::SORTED),
    ColumnDef::required(
        "callsite_id",
        DataType::table_id("stack_profile_callsite"),
        NONE,
    ),
];

pub const STACK_SAMPLE: TableSchema = TableSchema::root("stack_sample", STACK_SAMPLE_COLUMNS);

const CPU_PROFILE_STACK_SAMPLE_COLUMNS: &[ColumnDef] = &[
    ColumnDef::required("utid", DataType::Uint32, NONE),
    ColumnDef::required("process_priority", DataType::Int32, NONE),
];

/// CPU profiler samples; extends [STACK_SAMPLE] and shares its ids.
pub const CPU_PROFILE_STACK_SAMPLE: TableSchema = TableSchema::child(
    "cpu_profile_stack_sample",
    "stack_sample",
    CPU_PROFILE_STACK_SAMPLE_COLUMNS,
);

const PERF_SAMPLE_COLUMNS: &[ColumnDef] = &[
    ColumnDef::required("ts", DataType::Int64, ColumnFlags::SORTED),
    ColumnDef::required("utid", DataType::Uint32, NONE),
    ColumnDef::required("cpu", DataType::Uint32, NONE),
    ColumnDef::required("cpu_mode", DataType::String, NONE),
    ColumnDef::nullable(
        "callsite_id",
        DataType::table_id("stack_profile_callsite"),
        NONE,
    ),
    ColumnDef::nullable("unwind_error", DataType::String, NONE),
    ColumnDef::required("perf_session_id", DataType::Uint32, NONE),
];

pub const PERF_SAMPLE: TableSchema = TableSchema::root("perf_sample", PERF_SAMPLE_COLUMNS);

const STACK_PROFILE_SYMBOL_COLUMNS: &[ColumnDef] = &[
    ColumnDef::required(
        "symbol_set_id",
        DataType::Uint32,
        ColumnFlags::SORTED.union(ColumnFlags::SET_ID),
    ),
    ColumnDef::required("name", DataType::String, NONE),
    ColumnDef::required("source_file", DataType::String, NONE),
    ColumnDef::required("line_number", DataType::Uint32, NONE),
];

/// Symbolization results; all rows of one frame's symbol set are contiguous.
pub const STACK_PROFILE_SYMBOL: TableSchema = TableSchema::root(
    "stack_profile_symbol",
    STACK_PROFILE_SYMBOL_COLUMNS,
);

const HEAP_PROFILE_ALLOCATION_COLUMNS: &[ColumnDef] = &[
    ColumnDef::required("ts", DataType::Int64, NONE),
    ColumnDef::required("upid", DataType::Uint32, NONE),
    ColumnDef::required("heap_name", DataType::String, NONE),
    ColumnDef::required(
        "callsite_id",
        DataType::table_id("stack_profile_callsite"),
        NONE,
    ),
    ColumnDef::required("count", DataType::Int64, NONE),
    ColumnDef::required("size", DataType::Int64, NONE),
];

pub const HEAP_PROFILE_ALLOCATION: TableSchema = TableSchema::root(
    "heap_profile_allocation",
    HEAP_PROFILE_ALLOCATION_COLUMNS,
);

const HEAP_GRAPH_CLASS_COLUMNS: &[ColumnDef] = &[
    ColumnDef::required("name", DataType::String, NONE),
    ColumnDef::nullable("deobfuscated_name", DataType::String, ColumnFlags::MUTABLE),
    ColumnDef::nullable("location", DataType::String, NONE),
    ColumnDef::nullable("superclass_id", DataType::SelfId, ColumnFlags::MUTABLE),
    ColumnDef::nullable("classloader_id", DataType::Uint32, NONE),
    ColumnDef::required("kind", DataType::String, NONE),
];

pub const HEAP_GRAPH_CLASS: TableSchema = TableSchema::root(
    "heap_graph_class",
    HEAP_GRAPH_CLASS_COLUMNS,
);

const HEAP_GRAPH_OBJECT_COLUMNS: &[ColumnDef] = &[
    ColumnDef::required("upid", DataType::Uint32, NONE),
    ColumnDef::required("graph_sample_ts", DataType::Int64, NONE),
    ColumnDef::required("self_size", DataType::Int64, NONE),
    ColumnDef::required("native_size", DataType::Int64, ColumnFlags::MUTABLE),
    ColumnDef::nullable(
        "reference_set_id",
        DataType::Uint32,
        ColumnFlags::DENSE.union(ColumnFlags::MUTABLE),
    ),
    ColumnDef::required("reachable", DataType::Int32, ColumnFlags::MUTABLE),
    ColumnDef::required("type_id", DataType::table_id("heap_graph_class"), NONE),
    ColumnDef::nullable("root_type", DataType::String, ColumnFlags::MUTABLE),
    ColumnDef::required(
        "root_distance",
        DataType::Int32,
        ColumnFlags::HIDDEN.union(ColumnFlags::MUTABLE),
    ),
];

/// Objects of a heap graph. Reachability and root information are filled in once the whole
/// graph has been seen, hence the MUTABLE columns.
pub const HEAP_GRAPH_OBJECT: TableSchema = TableSchema::root(
    "heap_graph_object",
    HEAP_GRAPH_OBJECT_COLUMNS,
);

const HEAP_GRAPH_REFERENCE_COLUMNS: &[ColumnDef] = &[
    ColumnDef::required(
        "reference_set_id",
        DataType::Uint32,
        ColumnFlags::SORTED.union(ColumnFlags::SET_ID),
    ),
    ColumnDef::required("owner_id", DataType::table_id("heap_graph_object"), NONE),
    ColumnDef::nullable("owned_id", DataType::table_id("heap_graph_object"), NONE),
    ColumnDef::required("field_name", DataType::String, NONE),
    ColumnDef::required("field_type_name", DataType::String, NONE),
    ColumnDef::nullable("deobfuscated_field_name", DataType::String, ColumnFlags::MUTABLE),
];

/// Outgoing references of heap graph objects, grouped per owner into reference sets.
pub const HEAP_GRAPH_REFERENCE: TableSchema = TableSchema::root(
    "heap_graph_reference",
    HEAP_GRAPH_REFERENCE_COLUMNS,
);

const EXPERIMENTAL_FLAMEGRAPH_NODES_COLUMNS: &[ColumnDef] = &[
    ColumnDef::required(
        "ts",
        DataType::Int64,
        ColumnFlags::SORTED.union(ColumnFlags::HIDDEN),
    ),
    ColumnDef::required("upid", DataType::Uint32, ColumnFlags::HIDDEN),
    ColumnDef::required("profile_type", DataType::String, ColumnFlags::HIDDEN),
    ColumnDef::required("focus_str", DataType::String, ColumnFlags::HIDDEN),
    ColumnDef::required("depth", DataType::Uint32, NONE),
    ColumnDef::required("name", DataType::String, NONE),
    ColumnDef::required("map_name", DataType::String, NONE),
    ColumnDef::required("count", DataType::Int64, NONE),
    ColumnDef::required("cumulative_count", DataType::Int64, NONE),
    ColumnDef::required("size", DataType::Int64, NONE),
    ColumnDef::required("cumulative_size", DataType::Int64, NONE),
    ColumnDef::required("alloc_count", DataType::Int64, NONE),
    ColumnDef::required("cumulative_alloc_count", DataType::Int64, NONE),
    ColumnDef::required("alloc_size", DataType::Int64, NONE),
    ColumnDef::required("cumulative_alloc_size", DataType::Int64, NONE),
    ColumnDef::nullable("parent_id", DataType::SelfId, NONE),
    ColumnDef::nullable("source_file", DataType::String, NONE),
    ColumnDef::nullable("line_number", DataType::Uint32, NONE),
    ColumnDef::nullable("upid_group", DataType::String, NONE),
];

/// Flamegraph nodes computed on demand. The HIDDEN columns are the request parameters.
pub const EXPERIMENTAL_FLAMEGRAPH_NODES: TableSchema = TableSchema::root(
    "experimental_flamegraph_nodes",
    EXPERIMENTAL_FLAMEGRAPH_NODES_COLUMNS,
);

/// Every profiler table, in registration order.
pub const PROFILER_TABLES: &[TableSchema] = &[
    STACK_PROFILE_MAPPING,
    STACK_PROFILE_FRAME,
    STACK_PROFILE_CALLSITE,
    STACK_SAMPLE,
    CPU_PROFILE_STACK_SAMPLE,
    PERF_SAMPLE,
    STACK_PROFILE_SYMBOL,
    HEAP_PROFILE_ALLOCATION,
    HEAP_GRAPH_CLASS,
    HEAP_GRAPH_OBJECT,
    HEAP_GRAPH_REFERENCE,
    EXPERIMENTAL_FLAMEGRAPH_NODES,
];

/// Declares every profiler table in `db`.
pub fn register_profiler_tables(db: &mut Database) -> Result<()> {
    for schema in PROFILER_TABLES {
        db.register_table(schema.clone())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn test_register_profiler_tables() {
        let mut db = Database::new();
        register_profiler_tables(&mut db).unwrap();
        assert_eq!(db.list_tables().len(), PROFILER_TABLES.len());
        assert!(db.table("cpu_profile_stack_sample").unwrap().is_child());
        // Registering twice fails on the first duplicate.
        assert!(register_profiler_tables(&mut db).is_err());
    }

    #[test]
    fn test_hidden_columns_not_in_select_star() {
        let mut db = Database::new();
        register_profiler_tables(&mut db).unwrap();
        let star = db.select_star_columns("experimental_flamegraph_nodes").unwrap();
        assert_eq!(star[0], "id");
        assert!(!star.iter().any(|c| c == "ts" || c == "focus_str"));

        let star = db.select_star_columns("heap_graph_object").unwrap();
        assert!(!star.contains(&"root_distance".to_string()));
        assert!(star.contains(&"reference_set_id".to_string()));
    }

    #[test]
    fn test_cpu_sample_inherits_stack_sample() {
        let mut db = Database::new();
        register_profiler_tables(&mut db).unwrap();
        let columns: Vec<String> = db
            .enumerate_columns("cpu_profile_stack_sample")
            .unwrap()
            .into_iter()
            .map(|info| info.name)
            .collect();
        assert_eq!(
            columns,
            vec!["id", "ts", "callsite_id", "utid", "process_priority"]
        );

        let id = db
            .add_row(
                "cpu_profile_stack_sample",
                &[
                    ("ts", Value::Int(100)),
                    ("callsite_id", Value::Int(0)),
                    ("utid", Value::Int(3)),
                    ("process_priority", Value::Int(-10)),
                ],
            )
            .unwrap();
        assert_eq!(db.get("stack_sample", "ts", id as usize), Ok(Value::Int(100)));
    }
}
