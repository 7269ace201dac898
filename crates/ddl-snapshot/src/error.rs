//! Error types for snapshot diffing and migration generation.

use std::path::PathBuf;

/// Errors that can occur while building, diffing, or persisting schema state.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// A migration was requested without a name.
    #[error("Migration name is required")]
    MissingName,

    /// An index declares a partial (WHERE) predicate.
    #[error("Table `{table}` index `{index}` uses where=\"{predicate}\", which is unsupported for MySQL migrations")]
    PartialIndex {
        /// Table owning the index.
        table: String,
        /// Index name.
        index: String,
        /// The rejected predicate.
        predicate: String,
    },

    /// A `composite` index setting was given without an identifier.
    #[error("Invalid empty composite index tag on {table}.{field}")]
    EmptyCompositeIndex {
        /// Table owning the field.
        table: String,
        /// Field carrying the tag.
        field: String,
    },

    /// An index tag could not be parsed.
    #[error("Invalid index tag `{tag}` on {table}.{field}")]
    InvalidIndexTag {
        /// Table owning the field.
        table: String,
        /// Field carrying the tag.
        field: String,
        /// Raw tag text.
        tag: String,
    },

    /// A foreign key constraint has no name.
    #[error("Table `{table}` has unnamed foreign key constraint")]
    UnnamedForeignKey {
        /// Table owning the constraint.
        table: String,
    },

    /// A foreign key constraint is structurally invalid.
    #[error("Table `{table}` constraint `{constraint}` {reason}")]
    InvalidForeignKey {
        /// Table owning the constraint.
        table: String,
        /// Constraint name.
        constraint: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Two constraints share a name but disagree on their definition.
    #[error("Table `{table}` has conflicting foreign key definition for `{constraint}`")]
    ConflictingForeignKey {
        /// Table owning the constraint.
        table: String,
        /// Constraint name.
        constraint: String,
    },

    /// Two models declare the same table.
    #[error("Table `{0}` is declared by more than one model")]
    DuplicateTable(String),

    /// A relation or index refers to a column the model does not have.
    #[error("Table `{table}` has no column `{column}`")]
    UnknownColumn {
        /// Table name.
        table: String,
        /// Missing column.
        column: String,
    },

    /// IO error (reading/writing snapshot or migration files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse a snapshot or model file.
    #[error("Failed to parse '{path}': {source}")]
    ParseError {
        /// Path to the file.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Multiple errors occurred.
    #[error("Multiple errors occurred:\n{}", .0.iter().map(|e| format!("  - {e}")).collect::<Vec<_>>().join("\n"))]
    Multiple(Vec<MigrateError>),
}

impl MigrateError {
    /// Returns true for caller-input problems detected before any file is written.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        match self {
            Self::Io(_) | Self::ParseError { .. } | Self::Serialization(_) => false,
            Self::Multiple(errors) => errors.iter().all(Self::is_validation),
            _ => true,
        }
    }
}

/// Result type for snapshot and migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
