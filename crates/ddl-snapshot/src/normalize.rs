//! Canonical forms for schema elements.
//!
//! Two elements that differ only in keyword case, surrounding whitespace,
//! or (for column definitions) internal whitespace runs normalize to equal
//! values. The autodetector compares normalized values only.

use crate::state::{
    ColumnState, ForeignKeyState, IndexFieldState, IndexState, SchemaState, TableState,
};

/// Collapses whitespace runs in a column definition to single spaces.
#[must_use]
pub fn normalize_definition(definition: &str) -> String {
    definition.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Upper-cases and trims an index class.
#[must_use]
pub fn normalize_index_class(class: &str) -> String {
    class.trim().to_uppercase()
}

/// Upper-cases and trims a referential action.
#[must_use]
pub fn normalize_action(action: &str) -> String {
    action.trim().to_uppercase()
}

/// Returns the canonical form of an index field.
#[must_use]
pub fn normalize_index_field(field: &IndexFieldState) -> IndexFieldState {
    IndexFieldState {
        column: field.column.trim().to_string(),
        expression: field.expression.trim().to_string(),
        sort: field.sort.trim().to_uppercase(),
        collate: field.collate.trim().to_string(),
        length: field.length,
    }
}

/// Returns the canonical form of an index.
///
/// Fields naming neither a column nor an expression are dropped.
#[must_use]
pub fn normalize_index(index: &IndexState) -> IndexState {
    IndexState {
        class: normalize_index_class(&index.class),
        index_type: index.index_type.trim().to_string(),
        where_clause: index.where_clause.trim().to_string(),
        comment: index.comment.trim().to_string(),
        option: index.option.trim().to_string(),
        fields: index
            .fields
            .iter()
            .map(normalize_index_field)
            .filter(|f| !f.column.is_empty() || !f.expression.is_empty())
            .collect(),
    }
}

fn trimmed_non_empty(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(String::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

/// Returns the canonical form of a foreign key. Empty column entries are dropped.
#[must_use]
pub fn normalize_foreign_key(fk: &ForeignKeyState) -> ForeignKeyState {
    ForeignKeyState {
        columns: trimmed_non_empty(&fk.columns),
        ref_table: fk.ref_table.trim().to_string(),
        ref_columns: trimmed_non_empty(&fk.ref_columns),
        on_delete: normalize_action(&fk.on_delete),
        on_update: normalize_action(&fk.on_update),
    }
}

/// Structural signature of a foreign key:
/// `columns|ref_table|ref_columns|on_delete|on_update`.
///
/// Two differently named constraints with the same signature are duplicates.
#[must_use]
pub fn foreign_key_signature(fk: &ForeignKeyState) -> String {
    let fk = normalize_foreign_key(fk);
    [
        fk.columns.join(","),
        fk.ref_table,
        fk.ref_columns.join(","),
        fk.on_delete,
        fk.on_update,
    ]
    .join("|")
}

/// Returns the canonical form of a table.
#[must_use]
pub fn normalize_table(table: &TableState) -> TableState {
    TableState {
        columns: table
            .columns
            .iter()
            .map(|(name, col)| {
                (
                    name.clone(),
                    ColumnState::new(normalize_definition(&col.definition)),
                )
            })
            .collect(),
        indexes: table
            .indexes
            .iter()
            .map(|(name, idx)| (name.clone(), normalize_index(idx)))
            .filter(|(_, idx)| !idx.fields.is_empty())
            .collect(),
        foreign_keys: table
            .foreign_keys
            .iter()
            .map(|(name, fk)| (name.clone(), normalize_foreign_key(fk)))
            .collect(),
        primary_keys: trimmed_non_empty(&table.primary_keys),
    }
}

/// Returns the canonical form of a whole snapshot.
#[must_use]
pub fn normalize_state(state: &SchemaState) -> SchemaState {
    SchemaState {
        tables: state
            .tables
            .iter()
            .map(|(name, table)| (name.clone(), normalize_table(table)))
            .collect(),
    }
}
