//! Render table, column, index and foreign-key definitions as engine DDL.
//!
//! Every builder returns up/down pairs. Drop builders are the create builders with the
//! direction swapped, so a down statement is always the exact text of its counterpart.
//!
//! Structural rules of the engine:
//! - the primary key is declared once at table level and never changes
//! - a foreign key is realized as interleaving in the parent table (at creation) or as
//!   an index interleaved in the parent (afterwards)
//! - unique constraints and unique columns are realized as unique indices

use super::{quote, quote_list, StatementPair};
use crate::error::Unsupported;
use crate::schema::{
    unique_name, Column, ColumnType, ForeignKey, ReferentialAction, Table, TableIndex,
};

const COMMIT_TIMESTAMP_ON: &str = " OPTIONS (allow_commit_timestamp=true)";
const COMMIT_TIMESTAMP_OFF: &str = " OPTIONS (allow_commit_timestamp=null)";

/// Reject column attributes the engine has no equivalent for
pub fn check_column_supported(column: &Column) -> Result<(), Unsupported> {
    let attribute = if column.enum_values.is_some() {
        Some("enum")
    } else if column.charset.is_some() {
        Some("charset")
    } else if column.collation.is_some() {
        Some("collation")
    } else if column.comment.is_some() {
        Some("comment")
    } else if column.as_expression.is_some() {
        Some("as-expression")
    } else if column.generated_type.is_some() {
        Some("generated-type")
    } else if column.zerofill {
        Some("zerofill")
    } else if column.unsigned {
        Some("unsigned")
    } else if column.on_update.is_some() {
        Some("on-update")
    } else {
        None
    };
    if let Some(attribute) = attribute {
        return Err(Unsupported::ColumnAttribute {
            column: column.name.clone(),
            attribute,
        });
    }
    if column.has_commit_timestamp() && column.column_type != ColumnType::Timestamp {
        return Err(Unsupported::CommitTimestampType {
            column: column.name.clone(),
        });
    }
    Ok(())
}

pub fn check_index_supported(table: &str, index: &TableIndex) -> Result<(), Unsupported> {
    if index.fulltext {
        return Err(Unsupported::FulltextIndex {
            index: index.name_for(table),
        });
    }
    Ok(())
}

pub fn check_foreign_key_supported(table: &str, foreign_key: &ForeignKey) -> Result<(), Unsupported> {
    match foreign_key.on_update {
        None | Some(ReferentialAction::NoAction) => {}
        Some(_) => {
            return Err(Unsupported::ForeignKeyOnUpdate {
                foreign_key: foreign_key.name_for(table),
            })
        }
    }
    match foreign_key.on_delete {
        None | Some(ReferentialAction::Cascade) | Some(ReferentialAction::NoAction) => Ok(()),
        Some(action) => Err(Unsupported::OnDeleteAction {
            foreign_key: foreign_key.name_for(table),
            action: action.as_sql().to_string(),
        }),
    }
}

fn column_definition(column: &Column) -> String {
    let mut definition = format!("{} {}", quote(&column.name), column.type_sql());
    if !column.nullable {
        definition.push_str(" NOT NULL");
    }
    if column.has_commit_timestamp() {
        definition.push_str(COMMIT_TIMESTAMP_ON);
    }
    definition
}

/// Definition used by ALTER COLUMN; clears the commit-timestamp option when `previous`
/// had it and `target` does not
fn alter_column_definition(target: &Column, previous: &Column) -> String {
    let mut definition = format!("{} {}", quote(&target.name), target.type_sql());
    if !target.nullable {
        definition.push_str(" NOT NULL");
    }
    if target.has_commit_timestamp() {
        definition.push_str(COMMIT_TIMESTAMP_ON);
    } else if previous.has_commit_timestamp() {
        definition.push_str(COMMIT_TIMESTAMP_OFF);
    }
    definition
}

/// Unique indices for unique columns and unique constraints not yet backed by one.
///
/// Idempotent: running it on a table that already carries the result yields nothing.
pub fn synthesize_unique_indices(table: &Table) -> Vec<TableIndex> {
    let mut synthesized: Vec<TableIndex> = Vec::new();
    let covered = |columns: &[String], synthesized: &[TableIndex]| {
        table.has_unique_index_on(columns)
            || synthesized.iter().any(|i| i.columns.as_slice() == columns)
    };

    for unique in &table.uniques {
        if !covered(&unique.columns, &synthesized) {
            synthesized.push(unique.backing_index(&table.name));
        }
    }
    for column in table.columns.iter().filter(|c| c.unique && !c.primary) {
        let columns = vec![column.name.clone()];
        if !covered(&columns, &synthesized) {
            let name = unique_name(&table.name, &columns);
            synthesized.push(TableIndex::new(columns).named(name).unique());
        }
    }
    synthesized
}

/// CREATE TABLE plus one CREATE INDEX per declared or synthesized index
pub fn build_create_table(
    table: &Table,
    include_foreign_keys: bool,
) -> Result<Vec<StatementPair>, Unsupported> {
    check_table_supported(table)?;
    let parent = if include_foreign_keys {
        if table.foreign_keys.len() > 1 {
            return Err(Unsupported::MultipleInterleaveParents {
                table: table.name.clone(),
            });
        }
        table.foreign_keys.first()
    } else {
        None
    };
    if let Some(foreign_key) = parent {
        check_foreign_key_supported(&table.name, foreign_key)?;
    }

    let mut pairs = vec![StatementPair::new(
        create_table_statement(table, parent),
        format!("DROP TABLE {}", quote(&table.name)),
    )];
    for index in table.indices.iter().chain(synthesize_unique_indices(table).iter()) {
        pairs.push(build_create_index(&table.name, index)?);
    }
    Ok(pairs)
}

/// Inverse of table creation: indices first, then the table.
///
/// The recreating statement keeps the interleave clause of the cached table whether or
/// not `include_foreign_keys` is set; with it, index-backed foreign keys are dropped
/// before the table as well.
pub fn build_drop_table(
    table: &Table,
    include_foreign_keys: bool,
) -> Result<Vec<StatementPair>, Unsupported> {
    check_table_supported(table)?;
    let parent = table.interleave_parent();
    if let Some(foreign_key) = parent {
        check_foreign_key_supported(&table.name, foreign_key)?;
    }

    let mut creates = vec![StatementPair::new(
        create_table_statement(table, parent),
        format!("DROP TABLE {}", quote(&table.name)),
    )];
    if include_foreign_keys {
        for foreign_key in table.foreign_keys.iter().filter(|fk| !fk.interleaved) {
            check_foreign_key_supported(&table.name, foreign_key)?;
            creates.push(foreign_key_index_pair(&table.name, foreign_key));
        }
    }
    for index in table.indices.iter().chain(synthesize_unique_indices(table).iter()) {
        creates.push(build_create_index(&table.name, index)?);
    }
    Ok(creates
        .into_iter()
        .rev()
        .map(StatementPair::inverted)
        .collect())
}

fn check_table_supported(table: &Table) -> Result<(), Unsupported> {
    if !table.checks.is_empty() {
        return Err(Unsupported::CheckConstraint {
            table: table.name.clone(),
        });
    }
    for column in &table.columns {
        check_column_supported(column)?;
    }
    for index in &table.indices {
        check_index_supported(&table.name, index)?;
    }
    Ok(())
}

fn create_table_statement(table: &Table, parent: Option<&ForeignKey>) -> String {
    let definitions: Vec<String> = table.columns.iter().map(column_definition).collect();
    let mut statement = format!(
        "CREATE TABLE {} ({})",
        quote(&table.name),
        definitions.join(", ")
    );
    let primary = table.primary_column_names();
    if !primary.is_empty() {
        statement.push_str(&format!(" PRIMARY KEY ({})", quote_list(&primary)));
    }
    if let Some(foreign_key) = parent {
        statement.push_str(&format!(
            ", INTERLEAVE IN PARENT {}",
            quote(&foreign_key.referenced_table)
        ));
        if let Some(action) = foreign_key.on_delete {
            statement.push_str(&format!(" ON DELETE {}", action.as_sql()));
        }
    }
    statement
}

pub fn build_create_index(table: &str, index: &TableIndex) -> Result<StatementPair, Unsupported> {
    check_index_supported(table, index)?;
    let name = index.name_for(table);
    let mut up = String::from("CREATE ");
    if index.unique {
        up.push_str("UNIQUE ");
    }
    if index.spatial {
        up.push_str("NULL_FILTERED ");
    }
    up.push_str(&format!(
        "INDEX {} ON {} ({})",
        quote(&name),
        quote(table),
        quote_list(&index.columns)
    ));
    Ok(StatementPair::new(up, format!("DROP INDEX {}", quote(&name))))
}

pub fn build_drop_index(table: &str, index: &TableIndex) -> Result<StatementPair, Unsupported> {
    Ok(build_create_index(table, index)?.inverted())
}

/// Backing index of a foreign key on an existing table, interleaved in the parent
pub fn build_create_foreign_key(
    table: &str,
    foreign_key: &ForeignKey,
) -> Result<StatementPair, Unsupported> {
    check_foreign_key_supported(table, foreign_key)?;
    if foreign_key.on_delete == Some(ReferentialAction::Cascade) {
        return Err(Unsupported::CascadeWithoutInterleave {
            foreign_key: foreign_key.name_for(table),
        });
    }
    Ok(foreign_key_index_pair(table, foreign_key))
}

pub fn build_drop_foreign_key(
    table: &str,
    foreign_key: &ForeignKey,
) -> Result<StatementPair, Unsupported> {
    check_foreign_key_supported(table, foreign_key)?;
    Ok(foreign_key_index_pair(table, foreign_key).inverted())
}

fn foreign_key_index_pair(table: &str, foreign_key: &ForeignKey) -> StatementPair {
    let name = foreign_key.name_for(table);
    StatementPair::new(
        format!(
            "CREATE INDEX {} ON {} ({}), INTERLEAVE IN {}",
            quote(&name),
            quote(table),
            quote_list(&foreign_key.columns),
            quote(&foreign_key.referenced_table)
        ),
        format!("DROP INDEX {}", quote(&name)),
    )
}

pub fn build_add_column(table: &str, column: &Column) -> Result<StatementPair, Unsupported> {
    check_column_supported(column)?;
    Ok(StatementPair::new(
        format!(
            "ALTER TABLE {} ADD COLUMN {}",
            quote(table),
            column_definition(column)
        ),
        format!(
            "ALTER TABLE {} DROP COLUMN {}",
            quote(table),
            quote(&column.name)
        ),
    ))
}

pub fn build_drop_column(table: &str, column: &Column) -> Result<StatementPair, Unsupported> {
    Ok(build_add_column(table, column)?.inverted())
}

/// ALTER COLUMN to `new`, with the ALTER COLUMN back to `old` as down
pub fn build_alter_column(table: &str, old: &Column, new: &Column) -> StatementPair {
    StatementPair::new(
        format!(
            "ALTER TABLE {} ALTER COLUMN {}",
            quote(table),
            alter_column_definition(new, old)
        ),
        format!(
            "ALTER TABLE {} ALTER COLUMN {}",
            quote(table),
            alter_column_definition(old, new)
        ),
    )
}
