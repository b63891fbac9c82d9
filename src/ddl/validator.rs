//! Column change whitelist.
//!
//! The engine alters a column in place only for:
//! - STRING <-> BYTES type toggles
//! - length changes (including MAX) on STRING/BYTES
//! - nullability toggles when no single-column index covers the column
//! - switching the commit-timestamp option on or off
//!
//! Everything else is rejected with a tagged [`Unsupported`] reason before any native
//! call is made.

use super::generator::{build_alter_column, check_column_supported};
use super::StatementPair;
use crate::error::Unsupported;
use crate::schema::{Column, ColumnDefault, Table};

/// Validate a change of `old` into `new` on `table`.
///
/// Returns the ALTER COLUMN pair when the change touches native column metadata, `None`
/// when it is bookkeeping only (unique flag, literal default handled elsewhere, ...).
pub fn validate_column_change(
    table: &Table,
    old: &Column,
    new: &Column,
) -> Result<Option<StatementPair>, Unsupported> {
    if old.name != new.name {
        return Err(Unsupported::ColumnRename {
            from: old.name.clone(),
            to: new.name.clone(),
        });
    }
    let column = &new.name;

    let type_changed = old.column_type != new.column_type;
    if type_changed && !old.column_type.is_convertible_to(&new.column_type) {
        return Err(Unsupported::TypeChange {
            column: column.clone(),
            from: old.type_sql(),
            to: new.type_sql(),
        });
    }

    let length_changed = old.effective_length() != new.effective_length();
    if length_changed && !type_changed && !new.column_type.has_length() {
        return Err(Unsupported::LengthChange {
            column: column.clone(),
        });
    }

    let nullability_changed = old.nullable != new.nullable;
    if nullability_changed {
        let covering = table
            .single_column_index(&old.name)
            .map(|index| index.name_for(&table.name))
            .or_else(|| {
                table
                    .single_column_foreign_key(&old.name)
                    .map(|fk| fk.name_for(&table.name))
            });
        if let Some(index) = covering {
            return Err(Unsupported::IndexedNullability {
                column: column.clone(),
                index,
            });
        }
    }

    let default_changed = old.default != new.default;
    if default_changed && !is_commit_timestamp_toggle(&old.default, &new.default) {
        return Err(Unsupported::DefaultChange {
            column: column.clone(),
        });
    }

    if old.primary != new.primary {
        return Err(Unsupported::PrimaryKeyChange {
            column: column.clone(),
        });
    }
    let attribute = if old.as_expression != new.as_expression {
        Some("as-expression")
    } else if old.charset != new.charset {
        Some("charset")
    } else if old.collation != new.collation {
        Some("collation")
    } else if old.enum_values != new.enum_values {
        Some("enum")
    } else if old.generated_type != new.generated_type {
        Some("generated-type")
    } else if old.is_array != new.is_array {
        Some("array")
    } else {
        None
    };
    if let Some(attribute) = attribute {
        return Err(Unsupported::ColumnAttribute {
            column: column.clone(),
            attribute,
        });
    }
    check_column_supported(new)?;

    if type_changed || length_changed || nullability_changed || default_changed {
        Ok(Some(build_alter_column(&table.name, old, new)))
    } else {
        Ok(None)
    }
}

fn is_commit_timestamp_toggle(old: &Option<ColumnDefault>, new: &Option<ColumnDefault>) -> bool {
    matches!(
        (old, new),
        (None, Some(ColumnDefault::CommitTimestamp)) | (Some(ColumnDefault::CommitTimestamp), None)
    )
}
