use serde::{Deserialize, Serialize};

/// When foreign-key (table-id) values are checked against their target table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceChecks {
    /// Values are accepted as-is at append time; [crate::Database::validate_references]
    /// checks them once ingestion of both tables is complete.
    #[default]
    Lazy,
    /// Every appended table-id value must already resolve in its target table.
    Eager,
}

/// Session-wide tuning knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Number of rows a linear scan processes between two cancellation checks.
    pub scan_chunk_rows: usize,
    pub reference_checks: ReferenceChecks,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            scan_chunk_rows: 4096,
            reference_checks: ReferenceChecks::Lazy,
        }
    }
}
