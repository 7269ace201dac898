//! Snapshot-based schema migrations for `MySQL`.
//!
//! `ddl-snapshot` keeps a JSON snapshot of the schema recorded after the last
//! generated migration. Each run compares that snapshot with the schema the
//! application's models describe now and writes a forward script and an
//! exact rollback script for the difference.
//!
//! # Architecture
//!
//! - **State** - The canonical snapshot model (`SchemaState` and friends)
//! - **Normalize** - Canonical forms, so formatting noise never diffs
//! - **Autodetector** - Diffs two snapshots into ordered operation pairs
//! - **Dialect** - Renders each operation as `MySQL` DDL
//! - **Models / Introspect** - Model descriptors and the state they imply
//! - **Snapshot / Writer / Generator** - Files on disk
//!
//! # Example
//!
//! ```rust
//! use ddl_snapshot::prelude::*;
//!
//! let previous = SchemaState::new().table(
//!     "users",
//!     TableState::new().column("name", "varchar(32)"),
//! );
//! let current = SchemaState::new().table(
//!     "users",
//!     TableState::new().column("name", "varchar(128)"),
//! );
//!
//! let (up, down) = diff(&previous, &current);
//! assert_eq!(up, vec!["ALTER TABLE `users` MODIFY COLUMN `name` varchar(128);"]);
//! assert_eq!(down, vec!["ALTER TABLE `users` MODIFY COLUMN `name` varchar(32);"]);
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Generate a migration pair from model changes
//! ddl-snapshot --models models.json make-migrations --name "add user avatar"
//!
//! # Adopt an existing database without generating SQL
//! ddl-snapshot --models models.json sync-state
//!
//! # Diff two snapshot files
//! ddl-snapshot diff --from old.json --to new.json
//! ```

pub mod autodetector;
pub mod dialect;
pub mod error;
pub mod generator;
pub mod introspect;
pub mod models;
pub mod normalize;
pub mod operations;
pub mod snapshot;
pub mod state;
pub mod writer;

pub use autodetector::{diff, diff_operations};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::autodetector::{diff, diff_operations, Autodetector};
    pub use crate::dialect::{IndexClass, MigrationDialect, MySqlDialect};
    pub use crate::error::{MigrateError, Result};
    pub use crate::generator::{
        make_migrations, plan_migrations, sync_schema_state, GeneratorOptions,
        MakeMigrationsResult,
    };
    pub use crate::introspect::compute_current_state;
    pub use crate::models::{
        parse_models, DefaultValue, FieldSchema, ForeignKeyAction, ModelSchema, RelationKind,
        RelationSchema,
    };
    pub use crate::operations::{MigrationOperation, MigrationPlan, OperationKind};
    pub use crate::snapshot::{load_snapshot, save_snapshot};
    pub use crate::state::{
        ColumnState, ForeignKeyState, IndexFieldState, IndexState, SchemaState, TableState,
    };
    pub use crate::writer::{sanitize_name, MigrationWriter};
}
