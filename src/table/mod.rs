//! # Tabular Data Module
//!
//! Rows flowing through the connectors are ordered JSON objects: one row per image path
//! or text value, with output columns appended by the parallelizer and formatters.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`Row`] | Ordered column name -> value mapping |
//! | [`ColumnNameRegistry`] | Collision-free output column naming |
//! | [`ColumnDescriptions`] | Insert-only column documentation |
//! | [`TableSink`] | Schema-first table writer boundary |
//! | [`MemoryTable`] / [`JsonLinesSink`] | Sink implementations |

mod columns;
mod sink;

pub use columns::{
    generate_unique, ApiColumnNames, ColumnDescriptions, ColumnNameRegistry, MAX_SUFFIX,
};
pub use sink::{JsonLinesSink, MemoryTable, TableSink};

use serde_json::Value;

/// One unit of work plus its accumulated output columns, in column order.
pub type Row = serde_json::Map<String, Value>;

/// Value written to an output cell that has nothing to report.
pub fn empty_cell() -> Value {
    Value::String(String::new())
}

/// Null and "" both count as empty.
pub fn is_empty_cell(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

/// Column names of a table, taken from its first row.
pub fn schema_of(rows: &[Row]) -> Vec<String> {
    rows.first()
        .map(|row| row.keys().cloned().collect())
        .unwrap_or_default()
}
