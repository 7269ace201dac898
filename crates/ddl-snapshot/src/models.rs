//! Model descriptors.
//!
//! A [`ModelSchema`] describes what the application expects one table to
//! look like: its fields, the index tags attached to them, and its
//! relations to other models. Descriptors are plain data, built in code
//! with the builder methods or deserialized from JSON, and turned into a
//! [`SchemaState`](crate::state::SchemaState) by
//! [`compute_current_state`](crate::introspect::compute_current_state).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{MigrateError, Result};

/// Default value for a column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultValue {
    /// No default value.
    #[default]
    None,
    /// NULL default.
    Null,
    /// Boolean default.
    Bool(bool),
    /// Integer default.
    Integer(i64),
    /// Float default.
    Float(f64),
    /// String default.
    String(String),
    /// SQL expression (e.g., `CURRENT_TIMESTAMP`).
    Expression(String),
}

impl DefaultValue {
    /// Returns the SQL representation of this default value.
    #[must_use]
    pub fn to_sql(&self) -> Option<String> {
        match self {
            Self::None => None,
            Self::Null => Some("NULL".to_string()),
            Self::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
            Self::Integer(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::String(s) => Some(format!("'{}'", s.replace('\'', "''"))),
            Self::Expression(expr) => Some(expr.clone()),
        }
    }
}

/// Foreign key action (ON DELETE, ON UPDATE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForeignKeyAction {
    /// No action (error if referenced row is deleted/updated).
    NoAction,
    /// Restrict (same as `NoAction` but checked immediately).
    Restrict,
    /// Cascade the delete/update to referencing rows.
    Cascade,
    /// Set the foreign key column to NULL.
    SetNull,
    /// Set the foreign key column to its default value.
    SetDefault,
}

impl ForeignKeyAction {
    /// Returns the SQL representation of this action.
    #[must_use]
    pub const fn to_sql(self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }
}

/// One field of a model, mapped to one column.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    /// Field name. Used as the column name unless `column` is set.
    pub name: String,
    /// Explicit column name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub column: String,
    /// `MySQL` data type, e.g. `bigint unsigned` or `varchar(128)`.
    #[serde(rename = "type")]
    pub data_type: String,
    /// Whether the column rejects NULL.
    #[serde(default)]
    pub not_null: bool,
    /// Whether the column auto-increments.
    #[serde(default)]
    pub auto_increment: bool,
    /// Default value.
    #[serde(default)]
    pub default: DefaultValue,
    /// Column comment.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
    /// Whether this column is part of the primary key.
    #[serde(default)]
    pub primary_key: bool,
    /// Excluded from the schema entirely.
    #[serde(default)]
    pub ignore: bool,
    /// Index tags, e.g. `index:idx_users_name,sort:desc` or `uniqueIndex`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl FieldSchema {
    /// Creates a new field with the given data type.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column: String::new(),
            data_type: data_type.into(),
            not_null: false,
            auto_increment: false,
            default: DefaultValue::None,
            comment: String::new(),
            primary_key: false,
            ignore: false,
            tags: Vec::new(),
        }
    }

    /// Sets an explicit column name.
    #[must_use]
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    /// Sets the column as NOT NULL.
    #[must_use]
    pub const fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// Sets the column to auto-increment.
    #[must_use]
    pub const fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn default(mut self, value: DefaultValue) -> Self {
        self.default = value;
        self
    }

    /// Sets the column comment.
    #[must_use]
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Marks the column as part of the primary key.
    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Excludes the field from the schema.
    #[must_use]
    pub const fn ignore(mut self) -> Self {
        self.ignore = true;
        self
    }

    /// Attaches an index tag.
    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Returns the column name this field maps to.
    #[must_use]
    pub fn column_name(&self) -> &str {
        let column = self.column.trim();
        if column.is_empty() {
            self.name.trim()
        } else {
            column
        }
    }

    /// Returns the column definition: data type followed by modifiers.
    #[must_use]
    pub fn definition(&self) -> String {
        let mut parts = vec![self.data_type.trim().to_string()];
        if self.not_null {
            parts.push("NOT NULL".to_string());
        }
        if self.auto_increment {
            parts.push("AUTO_INCREMENT".to_string());
        }
        if let Some(default) = self.default.to_sql() {
            parts.push(format!("DEFAULT {default}"));
        }
        if !self.comment.is_empty() {
            parts.push(format!("COMMENT '{}'", self.comment.replace('\'', "''")));
        }
        parts.retain(|p| !p.is_empty());
        parts.join(" ")
    }
}

/// How a relation maps onto a foreign key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// The declaring table holds the foreign key.
    BelongsTo,
    /// The target table holds a foreign key to the declaring table.
    HasOne,
    /// Same placement as `HasOne`.
    HasMany,
    /// A join table holds foreign keys to both sides.
    ManyToMany,
}

/// A relation from the declaring model to another table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationSchema {
    /// Relation name, used in the default constraint name.
    pub name: String,
    /// Relation kind.
    pub kind: RelationKind,
    /// Target table.
    pub target: String,
    /// Referencing columns (on the table that holds the constraint).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub foreign_key: Vec<String>,
    /// Referenced columns. Defaults to the referenced table's primary key.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,
    /// Constraint name. `None` means `fk_<table>_<relation>`; an empty
    /// string is rejected. On a many-to-many relation it names the
    /// constraint to the target table only; the constraint back to the
    /// declaring table keeps `fk_<join>_<table>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<String>,
    /// ON DELETE action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_delete: Option<ForeignKeyAction>,
    /// ON UPDATE action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_update: Option<ForeignKeyAction>,
    /// Join table name (many-to-many only).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub join_table: String,
    /// Join table columns pointing at the declaring table.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub join_foreign_key: Vec<String>,
    /// Join table columns pointing at the target table.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub join_references: Vec<String>,
}

impl RelationSchema {
    fn new(kind: RelationKind, name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            target: target.into(),
            foreign_key: Vec::new(),
            references: Vec::new(),
            constraint: None,
            on_delete: None,
            on_update: None,
            join_table: String::new(),
            join_foreign_key: Vec::new(),
            join_references: Vec::new(),
        }
    }

    /// The declaring table references `target` through `columns`.
    #[must_use]
    pub fn belongs_to<I, S>(name: impl Into<String>, target: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut rel = Self::new(RelationKind::BelongsTo, name, target);
        rel.foreign_key = columns.into_iter().map(Into::into).collect();
        rel
    }

    /// `target` references the declaring table through `columns`, one row.
    #[must_use]
    pub fn has_one<I, S>(name: impl Into<String>, target: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut rel = Self::new(RelationKind::HasOne, name, target);
        rel.foreign_key = columns.into_iter().map(Into::into).collect();
        rel
    }

    /// `target` references the declaring table through `columns`, many rows.
    #[must_use]
    pub fn has_many<I, S>(name: impl Into<String>, target: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut rel = Self::new(RelationKind::HasMany, name, target);
        rel.foreign_key = columns.into_iter().map(Into::into).collect();
        rel
    }

    /// Both tables are linked through `join_table`.
    #[must_use]
    pub fn many_to_many(
        name: impl Into<String>,
        target: impl Into<String>,
        join_table: impl Into<String>,
    ) -> Self {
        let mut rel = Self::new(RelationKind::ManyToMany, name, target);
        rel.join_table = join_table.into();
        rel
    }

    /// Sets the referenced columns.
    #[must_use]
    pub fn references<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.references = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the constraint name. On a many-to-many relation only the
    /// constraint to the target table takes it.
    #[must_use]
    pub fn constraint(mut self, name: impl Into<String>) -> Self {
        self.constraint = Some(name.into());
        self
    }

    /// Sets the ON DELETE action.
    #[must_use]
    pub const fn on_delete(mut self, action: ForeignKeyAction) -> Self {
        self.on_delete = Some(action);
        self
    }

    /// Sets the ON UPDATE action.
    #[must_use]
    pub const fn on_update(mut self, action: ForeignKeyAction) -> Self {
        self.on_update = Some(action);
        self
    }

    /// Sets the join table columns for each side, overriding the
    /// `<table>_<key>` defaults.
    #[must_use]
    pub fn join_columns<I, J, S, T>(mut self, foreign_key: I, references: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        self.join_foreign_key = foreign_key.into_iter().map(Into::into).collect();
        self.join_references = references.into_iter().map(Into::into).collect();
        self
    }
}

/// Descriptor of one model (one table).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelSchema {
    /// Table name.
    pub table: String,
    /// Fields in declaration order.
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
    /// Relations to other tables.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relations: Vec<RelationSchema>,
}

impl ModelSchema {
    /// Creates a new model for `table`.
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    /// Adds a field.
    #[must_use]
    pub fn field(mut self, field: FieldSchema) -> Self {
        self.fields.push(field);
        self
    }

    /// Adds a relation.
    #[must_use]
    pub fn relation(mut self, relation: RelationSchema) -> Self {
        self.relations.push(relation);
        self
    }

    /// Gets a non-ignored field by column name.
    #[must_use]
    pub fn get_field(&self, column: &str) -> Option<&FieldSchema> {
        self.fields
            .iter()
            .find(|f| !f.ignore && f.column_name() == column)
    }

    /// Primary key column names, sorted.
    #[must_use]
    pub fn primary_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .fields
            .iter()
            .filter(|f| !f.ignore && f.primary_key && !f.column_name().is_empty())
            .map(|f| f.column_name().to_string())
            .collect();
        keys.sort();
        keys
    }
}

/// Parses a list of model descriptors from JSON.
///
/// # Errors
///
/// Returns the JSON error if `json` is not an array of model descriptors.
pub fn parse_models(json: &str) -> serde_json::Result<Vec<ModelSchema>> {
    serde_json::from_str(json)
}

/// Default index priority; lower sorts first within a composite index.
pub const DEFAULT_INDEX_PRIORITY: i32 = 10;

const INDEX_SETTINGS: &[&str] = &[
    "CLASS",
    "TYPE",
    "WHERE",
    "COMMENT",
    "OPTION",
    "SORT",
    "COLLATE",
    "LENGTH",
    "PRIORITY",
    "EXPRESSION",
    "COMPOSITE",
    "UNIQUE",
];

/// A parsed index tag.
///
/// Grammar: `index[:name][,key:value...]` or `uniqueIndex[:name][,...]`.
/// Keys are case-insensitive; a bare key sets itself as its value
/// (`unique` is `UNIQUE:UNIQUE`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexTag {
    /// Resolved index name.
    pub name: String,
    /// Tag was `uniqueIndex`.
    pub unique_index: bool,
    /// Settings keyed by upper-cased key.
    pub settings: BTreeMap<String, String>,
}

impl IndexTag {
    /// Parses `raw` as declared on `table`.`field` (mapped to `column`).
    ///
    /// An empty name defaults to `idx_<table>_<column>`, or
    /// `idx_<table>_<composite>` when a `composite` setting is present.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::InvalidIndexTag`] for an unknown tag key or
    /// setting and for a non-numeric `length` or `priority`, and
    /// [`MigrateError::EmptyCompositeIndex`] for a `composite` setting
    /// without an identifier.
    pub fn parse(table: &str, field: &str, column: &str, raw: &str) -> Result<Self> {
        let invalid = || MigrateError::InvalidIndexTag {
            table: table.to_string(),
            field: field.to_string(),
            tag: raw.to_string(),
        };

        let value = raw.trim();
        let (key, rest) = value.split_once(':').unwrap_or((value, ""));
        let unique_index = match key.trim().to_uppercase().as_str() {
            "INDEX" => false,
            "UNIQUEINDEX" => true,
            _ => return Err(invalid()),
        };

        let (name, setting_text) = rest
            .split_once(',')
            .map_or((rest.trim(), ""), |(name, settings)| (name.trim(), settings));
        let settings = parse_settings(setting_text).ok_or_else(invalid)?;

        let name = if name.is_empty() {
            let suffix = match settings.get("COMPOSITE") {
                Some(composite) if composite.is_empty() || composite == "COMPOSITE" => {
                    return Err(MigrateError::EmptyCompositeIndex {
                        table: table.to_string(),
                        field: field.to_string(),
                    });
                }
                Some(composite) => composite.as_str(),
                None => column,
            };
            index_name(table, suffix)
        } else {
            name.to_string()
        };

        Ok(Self {
            name,
            unique_index,
            settings,
        })
    }

    /// Returns a setting value, or `""` if absent.
    #[must_use]
    pub fn setting(&self, key: &str) -> &str {
        self.settings.get(key).map_or("", String::as_str)
    }

    /// Index class implied by the tag: `UNIQUE` for `uniqueIndex` or a
    /// `unique` setting, otherwise the `class` setting.
    #[must_use]
    pub fn class(&self) -> String {
        if self.unique_index || self.settings.contains_key("UNIQUE") {
            "UNIQUE".to_string()
        } else {
            self.setting("CLASS").to_uppercase()
        }
    }

    /// Key prefix length, 0 when unset.
    #[must_use]
    pub fn length(&self) -> usize {
        self.setting("LENGTH").parse().unwrap_or(0)
    }

    /// Position within a composite index.
    #[must_use]
    pub fn priority(&self) -> i32 {
        self.setting("PRIORITY")
            .parse()
            .unwrap_or(DEFAULT_INDEX_PRIORITY)
    }
}

/// Parses comma-separated `key:value` settings. A bare key is its own
/// value. Returns `None` for an unknown key or a non-numeric `LENGTH` or
/// `PRIORITY`.
fn parse_settings(text: &str) -> Option<BTreeMap<String, String>> {
    let mut settings = BTreeMap::new();
    for entry in text.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (key, value) = entry.split_once(':').map_or_else(
            || (entry.to_uppercase(), entry.to_uppercase()),
            |(k, v)| (k.trim().to_uppercase(), v.trim().to_string()),
        );
        if !INDEX_SETTINGS.contains(&key.as_str()) {
            return None;
        }
        settings.insert(key, value);
    }

    let numeric_ok = ["LENGTH", "PRIORITY"]
        .iter()
        .filter_map(|key| settings.get(*key))
        .all(|v| v.parse::<i64>().is_ok());
    numeric_ok.then_some(settings)
}

/// Default index name: `idx_<table>_<suffix>`, with dots replaced.
#[must_use]
pub fn index_name(table: &str, suffix: &str) -> String {
    format!("idx_{table}_{suffix}").replace('.', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_definition() {
        let id = FieldSchema::new("id", "bigint unsigned")
            .auto_increment()
            .primary_key();
        assert_eq!(id.definition(), "bigint unsigned AUTO_INCREMENT");

        let status = FieldSchema::new("status", "tinyint unsigned")
            .not_null()
            .default(DefaultValue::Integer(1))
            .comment("user's state");
        assert_eq!(
            status.definition(),
            "tinyint unsigned NOT NULL DEFAULT 1 COMMENT 'user''s state'"
        );
    }

    #[test]
    fn test_column_name_falls_back_to_name() {
        assert_eq!(FieldSchema::new("name", "text").column_name(), "name");
        assert_eq!(
            FieldSchema::new("Name", "text").column("display_name").column_name(),
            "display_name"
        );
    }

    #[test]
    fn test_primary_keys_sorted() {
        let model = ModelSchema::new("pairs")
            .field(FieldSchema::new("b", "int").primary_key())
            .field(FieldSchema::new("a", "int").primary_key())
            .field(FieldSchema::new("skip", "int").primary_key().ignore());
        assert_eq!(model.primary_keys(), vec!["a", "b"]);
    }

    #[test]
    fn test_parse_index_tag_with_settings() {
        let tag = IndexTag::parse(
            "users",
            "Name",
            "name",
            "index:idx_users_name,sort:desc,length:16,collate:utf8mb4_bin,type:btree,comment:index_comment",
        )
        .unwrap();
        assert_eq!(tag.name, "idx_users_name");
        assert_eq!(tag.setting("SORT"), "desc");
        assert_eq!(tag.setting("TYPE"), "btree");
        assert_eq!(tag.setting("COMMENT"), "index_comment");
        assert_eq!(tag.length(), 16);
        assert_eq!(tag.priority(), DEFAULT_INDEX_PRIORITY);
        assert_eq!(tag.class(), "");
    }

    #[test]
    fn test_parse_index_tag_default_names() {
        let tag = IndexTag::parse("users", "Email", "email", "uniqueIndex").unwrap();
        assert_eq!(tag.name, "idx_users_email");
        assert_eq!(tag.class(), "UNIQUE");

        let tag = IndexTag::parse("users", "Email", "email", "index:,composite:contact").unwrap();
        assert_eq!(tag.name, "idx_users_contact");

        let tag = IndexTag::parse("users", "Email", "email", "index:,unique").unwrap();
        assert_eq!(tag.class(), "UNIQUE");
    }

    #[test]
    fn test_parse_index_tag_empty_composite() {
        for raw in ["index:,composite", "index:,composite:"] {
            let err = IndexTag::parse("items", "Value", "value", raw).unwrap_err();
            assert_eq!(
                err.to_string(),
                "Invalid empty composite index tag on items.Value"
            );
        }
    }

    #[test]
    fn test_parse_index_tag_rejects_unknown() {
        assert!(matches!(
            IndexTag::parse("t", "f", "f", "key:idx_f"),
            Err(MigrateError::InvalidIndexTag { .. })
        ));
        assert!(matches!(
            IndexTag::parse("t", "f", "f", "index:idx_f,bogus:1"),
            Err(MigrateError::InvalidIndexTag { .. })
        ));
        assert!(matches!(
            IndexTag::parse("t", "f", "f", "index:idx_f,length:abc"),
            Err(MigrateError::InvalidIndexTag { .. })
        ));
    }

    #[test]
    fn test_parse_models_json() {
        let json = r#"[
            {
                "table": "users",
                "fields": [
                    {"name": "id", "type": "bigint unsigned", "primary_key": true, "auto_increment": true},
                    {"name": "status", "type": "tinyint unsigned", "default": {"integer": 1}},
                    {"name": "email", "type": "varchar(255)", "tags": ["uniqueIndex"]}
                ],
                "relations": [
                    {"name": "team", "kind": "belongs_to", "target": "teams", "foreign_key": ["team_id"], "on_delete": "set_null"}
                ]
            }
        ]"#;
        let models = parse_models(json).unwrap();
        assert_eq!(models.len(), 1);
        let users = &models[0];
        assert_eq!(users.fields[1].definition(), "tinyint unsigned DEFAULT 1");
        assert_eq!(users.relations[0].kind, RelationKind::BelongsTo);
        assert_eq!(users.relations[0].on_delete, Some(ForeignKeyAction::SetNull));
        assert_eq!(users.relations[0].constraint, None);
    }
}
