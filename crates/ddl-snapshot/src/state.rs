//! Schema state model.
//!
//! A [`SchemaState`] is one complete snapshot of the declared schema. It is
//! what gets persisted between runs and what the autodetector compares.
//! Every name-keyed collection is a `BTreeMap`, so iteration (and therefore
//! rendered SQL and the persisted JSON) is always in sorted-name order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_zero(value: &usize) -> bool {
    *value == 0
}

/// A full schema snapshot: tables keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaState {
    /// Tables keyed by name. A missing key means the table does not exist.
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub tables: BTreeMap<String, TableState>,
}

fn deserialize_null_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl SchemaState {
    /// Creates an empty schema state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a table.
    #[must_use]
    pub fn table(mut self, name: impl Into<String>, table: TableState) -> Self {
        self.tables.insert(name.into(), table);
        self
    }

    /// Gets a table by name.
    #[must_use]
    pub fn get_table(&self, name: &str) -> Option<&TableState> {
        self.tables.get(name)
    }

    /// Returns table names in sorted order.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Returns true if the snapshot has no tables.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// State of a single table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableState {
    /// Column definitions keyed by column name.
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub columns: BTreeMap<String, ColumnState>,
    /// Secondary indexes keyed by index name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub indexes: BTreeMap<String, IndexState>,
    /// Foreign key constraints keyed by constraint name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub foreign_keys: BTreeMap<String, ForeignKeyState>,
    /// Primary key columns, in declared order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub primary_keys: Vec<String>,
}

impl TableState {
    /// Creates an empty table state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a column.
    #[must_use]
    pub fn column(mut self, name: impl Into<String>, definition: impl Into<String>) -> Self {
        self.columns
            .insert(name.into(), ColumnState::new(definition));
        self
    }

    /// Sets the primary key columns.
    #[must_use]
    pub fn primary_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_keys = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Adds an index.
    #[must_use]
    pub fn index(mut self, name: impl Into<String>, index: IndexState) -> Self {
        self.indexes.insert(name.into(), index);
        self
    }

    /// Adds a foreign key constraint.
    #[must_use]
    pub fn foreign_key(mut self, name: impl Into<String>, fk: ForeignKeyState) -> Self {
        self.foreign_keys.insert(name.into(), fk);
        self
    }

    /// Gets a column by name.
    #[must_use]
    pub fn get_column(&self, name: &str) -> Option<&ColumnState> {
        self.columns.get(name)
    }
}

/// A column's type/constraint fragment, e.g. `bigint unsigned NOT NULL`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnState {
    /// Definition text following the column name.
    pub definition: String,
}

impl ColumnState {
    /// Creates a column state.
    #[must_use]
    pub fn new(definition: impl Into<String>) -> Self {
        Self {
            definition: definition.into(),
        }
    }
}

/// A secondary index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexState {
    /// Index class (`UNIQUE`, `FULLTEXT`, `SPATIAL`, or empty).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub class: String,
    /// Storage method rendered with `USING`, e.g. `btree`.
    #[serde(default, rename = "type", skip_serializing_if = "String::is_empty")]
    pub index_type: String,
    /// Partial-index predicate. Never produced by introspection; a loaded
    /// snapshot carrying one is rejected.
    #[serde(default, rename = "where", skip_serializing_if = "String::is_empty")]
    pub where_clause: String,
    /// Index comment.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
    /// Free-form trailing SQL, e.g. `WITH PARSER ngram`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub option: String,
    /// Indexed fields in key order.
    #[serde(default)]
    pub fields: Vec<IndexFieldState>,
}

impl IndexState {
    /// Creates an index over the given columns.
    #[must_use]
    pub fn on_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: columns.into_iter().map(IndexFieldState::column).collect(),
            ..Self::default()
        }
    }

    /// Sets the index class.
    #[must_use]
    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.class = class.into();
        self
    }

    /// Marks the index as unique.
    #[must_use]
    pub fn unique(self) -> Self {
        self.class("UNIQUE")
    }

    /// Sets the storage method.
    #[must_use]
    pub fn using(mut self, index_type: impl Into<String>) -> Self {
        self.index_type = index_type.into();
        self
    }

    /// Sets the comment.
    #[must_use]
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Sets the trailing option text.
    #[must_use]
    pub fn option(mut self, option: impl Into<String>) -> Self {
        self.option = option.into();
        self
    }

    /// Appends a field.
    #[must_use]
    pub fn field(mut self, field: IndexFieldState) -> Self {
        self.fields.push(field);
        self
    }
}

/// One key part of an index: a column or a raw expression.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexFieldState {
    /// Indexed column name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub column: String,
    /// Raw SQL expression; takes precedence over `column`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub expression: String,
    /// `ASC` or `DESC`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sort: String,
    /// Collation name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub collate: String,
    /// Key prefix length; 0 means unspecified.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub length: usize,
}

impl IndexFieldState {
    /// Creates a column key part.
    #[must_use]
    pub fn column(name: impl Into<String>) -> Self {
        Self {
            column: name.into(),
            ..Self::default()
        }
    }

    /// Creates an expression key part.
    #[must_use]
    pub fn expression(expr: impl Into<String>) -> Self {
        Self {
            expression: expr.into(),
            ..Self::default()
        }
    }

    /// Sets the sort direction.
    #[must_use]
    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = sort.into();
        self
    }

    /// Sets the collation.
    #[must_use]
    pub fn collate(mut self, collate: impl Into<String>) -> Self {
        self.collate = collate.into();
        self
    }

    /// Sets the key prefix length.
    #[must_use]
    pub const fn length(mut self, length: usize) -> Self {
        self.length = length;
        self
    }
}

/// A foreign key constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyState {
    /// Referencing columns, in order.
    #[serde(default)]
    pub columns: Vec<String>,
    /// Referenced table.
    #[serde(default)]
    pub ref_table: String,
    /// Referenced columns, same length as `columns`.
    #[serde(default)]
    pub ref_columns: Vec<String>,
    /// ON DELETE action; empty means the dialect default.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub on_delete: String,
    /// ON UPDATE action; empty means the dialect default.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub on_update: String,
}

impl ForeignKeyState {
    /// Creates a constraint from `columns` to `ref_table(ref_columns)`.
    #[must_use]
    pub fn new<I, J, S, T>(columns: I, ref_table: impl Into<String>, ref_columns: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            ref_table: ref_table.into(),
            ref_columns: ref_columns.into_iter().map(Into::into).collect(),
            on_delete: String::new(),
            on_update: String::new(),
        }
    }

    /// Sets the ON DELETE action.
    #[must_use]
    pub fn on_delete(mut self, action: impl Into<String>) -> Self {
        self.on_delete = action.into();
        self
    }

    /// Sets the ON UPDATE action.
    #[must_use]
    pub fn on_update(mut self, action: impl Into<String>) -> Self {
        self.on_update = action.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_builder() {
        let table = TableState::new()
            .column("id", "bigint unsigned")
            .column("name", "varchar(64)")
            .primary_key(["id"])
            .index("idx_name", IndexState::on_columns(["name"]).unique());

        assert_eq!(table.columns.len(), 2);
        assert_eq!(table.primary_keys, vec!["id"]);
        assert_eq!(table.indexes["idx_name"].class, "UNIQUE");
        assert_eq!(
            table.get_column("name").map(|c| c.definition.as_str()),
            Some("varchar(64)")
        );
    }

    #[test]
    fn test_table_names_sorted() {
        let state = SchemaState::new()
            .table("zeta", TableState::new())
            .table("alpha", TableState::new())
            .table("mid", TableState::new());
        let names: Vec<&str> = state.table_names().collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_optional_keys_omitted() {
        let state = SchemaState::new().table("t", TableState::new().column("id", "int"));
        let json = serde_json::to_value(&state).unwrap();
        let table = &json["tables"]["t"];
        assert!(table.get("indexes").is_none());
        assert!(table.get("foreign_keys").is_none());
        assert!(table.get("primary_keys").is_none());
        assert_eq!(table["columns"]["id"]["definition"], "int");
    }

    #[test]
    fn test_index_field_keys() {
        let index = IndexState::on_columns(["name"]).using("btree");
        let json = serde_json::to_value(&index).unwrap();
        assert_eq!(json["type"], "btree");
        assert!(json.get("class").is_none());
        assert!(json.get("where").is_none());
        assert_eq!(json["fields"][0]["column"], "name");
        assert!(json["fields"][0].get("length").is_none());
    }

    #[test]
    fn test_null_tables_deserialize_empty() {
        let state: SchemaState = serde_json::from_str(r#"{"tables": null}"#).unwrap();
        assert!(state.is_empty());
        let state: SchemaState = serde_json::from_str("{}").unwrap();
        assert!(state.is_empty());
    }
}
