use tracedb::tables::register_profiler_tables;
use tracedb::{CancellationToken, Database, FilterOp, Query, Result, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut db = Database::new();
    register_profiler_tables(&mut db)?;

    let mapping = db.add_row(
        "stack_profile_mapping",
        &[
            ("build_id", Value::from("b0d1")),
            ("exact_offset", Value::Int(0)),
            ("start_offset", Value::Int(0)),
            ("start", Value::Int(0x7000)),
            ("end", Value::Int(0x9000)),
            ("load_bias", Value::Int(0)),
            ("name", Value::from("libc.so")),
        ],
    )?;
    let mut parent = Value::Null;
    for (depth, name) in ["main", "run", "poll"].into_iter().enumerate() {
        let frame = db.add_row(
            "stack_profile_frame",
            &[
                ("name", Value::from(name)),
                ("mapping", Value::from(mapping)),
                ("rel_pc", Value::Int(0x10 * depth as i64)),
            ],
        )?;
        let callsite = db.add_row(
            "stack_profile_callsite",
            &[
                ("depth", Value::Int(depth as i64)),
                ("parent_id", parent),
                ("frame_id", Value::from(frame)),
            ],
        )?;
        parent = Value::from(callsite);
    }

    for (i, ts) in [70, 71, 72].into_iter().enumerate() {
        db.add_row(
            "cpu_profile_stack_sample",
            &[
                ("ts", Value::Int(ts)),
                ("callsite_id", Value::Int(i as i64)),
                ("utid", Value::Int(1)),
                ("process_priority", Value::Int(0)),
            ],
        )?;
    }
    for table in ["stack_profile_frame", "stack_profile_callsite", "stack_sample"] {
        db.validate_references(table)?;
    }

    let query = Query::new("cpu_profile_stack_sample")
        .filter("ts", FilterOp::Ge, 71)
        .order_by("ts", true)
        .select(["id", "ts", "callsite_id"]);
    let token = CancellationToken::new();
    let result = db.execute(&query, &token)?;
    info!(columns = ?result.columns, rows = ?result.rows, "query result");

    let selection = db.filter("cpu_profile_stack_sample", &query.constraints, &token)?;
    for row in selection.iter() {
        let frame = db.join_value("cpu_profile_stack_sample", "callsite_id", row, "frame_id")?;
        info!(row, ?frame, "sample frame");
    }
    info!(bytes = db.memory_usage(), "session memory");
    Ok(())
}
