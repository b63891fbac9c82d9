//! Key-batch shaping for key-addressed deletes and reads.

use crate::executor::{KeyBatch, Row};
use serde_json::Value as JsonValue;

/// Shape lookup rows into the engine's key-batch argument.
///
/// A single-column key becomes a flat scalar list; a composite key becomes a list of
/// `[column, value]` pairs per row, in primary-key order. Missing key values are null.
pub fn shape_keys(primary: &[String], rows: &[Row]) -> KeyBatch {
    let value_of = |row: &Row, column: &String| row.get(column).cloned().unwrap_or(JsonValue::Null);
    if primary.len() == 1 {
        KeyBatch::Single(rows.iter().map(|row| value_of(row, &primary[0])).collect())
    } else {
        KeyBatch::Composite(
            rows.iter()
                .map(|row| {
                    primary
                        .iter()
                        .map(|column| (column.clone(), value_of(row, column)))
                        .collect()
                })
                .collect(),
        )
    }
}
