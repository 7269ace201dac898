//! Autodetector for generating migrations from snapshot changes.
//!
//! This module compares two schema snapshots and produces the ordered
//! operation pairs that turn `previous` into `current`, plus their inverses.
//!
//! Ordering is part of correctness:
//!
//! 1. New tables are created (indexes inline).
//! 2. Foreign keys of new tables are added, once every new table exists.
//! 3. Removed tables are dropped. Their foreign keys get down-only restore
//!    operations placed before the drop, so the rollback recreates the table
//!    first and the constraints after it.
//! 4. Tables present on both sides are diffed individually: foreign key
//!    drops, then column changes, then index changes, then foreign key adds.
//!
//! Every enumeration walks names in sorted order, so identical inputs always
//! produce identical output.

use std::collections::BTreeMap;

use tracing::debug;

use crate::dialect::{MigrationDialect, MySqlDialect};
use crate::normalize::normalize_state;
use crate::operations::{MigrationOperation, MigrationPlan, OperationKind};
use crate::state::{ForeignKeyState, SchemaState, TableState};

/// Detects schema changes and generates migration operations.
#[derive(Debug, Clone, Default)]
pub struct Autodetector<D: MigrationDialect = MySqlDialect> {
    dialect: D,
}

impl Autodetector<MySqlDialect> {
    /// Creates a new autodetector using the `MySQL` dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            dialect: MySqlDialect::new(),
        }
    }
}

impl<D: MigrationDialect> Autodetector<D> {
    /// Creates a new autodetector rendering SQL with `dialect`.
    #[must_use]
    pub const fn with_dialect(dialect: D) -> Self {
        Self { dialect }
    }

    /// Returns the dialect.
    #[must_use]
    pub const fn dialect(&self) -> &D {
        &self.dialect
    }

    /// Compares two snapshots and returns the operations needed to transform
    /// `previous` into `current`.
    ///
    /// Both inputs are normalized first, so elements that differ only in
    /// formatting produce no operation.
    #[must_use]
    pub fn diff(&self, previous: &SchemaState, current: &SchemaState) -> MigrationPlan {
        let previous = normalize_state(previous);
        let current = normalize_state(current);
        let mut plan = MigrationPlan::new();

        let new_tables: Vec<(&String, &TableState)> = current
            .tables
            .iter()
            .filter(|(name, _)| !previous.tables.contains_key(*name))
            .collect();

        for &(name, table) in &new_tables {
            debug!(table = %name, "New table");
            plan.push(MigrationOperation::new(
                OperationKind::CreateTable,
                name,
                "",
                self.dialect.create_table_sql(name, table),
                self.dialect.drop_table_sql(name),
            ));
        }

        for &(name, table) in &new_tables {
            for (fk_name, fk) in &table.foreign_keys {
                plan.push(self.add_foreign_key_op(name, fk_name, fk));
            }
        }

        for (name, table) in &previous.tables {
            if current.tables.contains_key(name) {
                continue;
            }
            debug!(table = %name, "Removed table");
            for (fk_name, fk) in &table.foreign_keys {
                plan.push(MigrationOperation::new(
                    OperationKind::RestoreForeignKey,
                    name,
                    fk_name,
                    "",
                    self.dialect.add_foreign_key_sql(name, fk_name, fk),
                ));
            }
            plan.push(MigrationOperation::new(
                OperationKind::DropTable,
                name,
                "",
                self.dialect.drop_table_sql(name),
                self.dialect.create_table_sql(name, table),
            ));
        }

        for (name, cur) in &current.tables {
            if let Some(prev) = previous.tables.get(name) {
                let ops = self.diff_table(name, prev, cur);
                if !ops.is_empty() {
                    debug!(table = %name, operations = ops.len(), "Modified table");
                }
                plan.extend(ops);
            }
        }

        plan
    }

    /// Compares two versions of one table. Both must already be normalized.
    #[must_use]
    pub fn diff_table(
        &self,
        table: &str,
        prev: &TableState,
        cur: &TableState,
    ) -> Vec<MigrationOperation> {
        let (fk_drops, fk_adds) =
            self.diff_foreign_keys(table, &prev.foreign_keys, &cur.foreign_keys);

        let mut operations = fk_drops;
        operations.extend(self.diff_columns(table, prev, cur));
        operations.extend(self.diff_indexes(table, prev, cur));
        operations.extend(fk_adds);
        operations
    }

    /// Added and modified columns in `cur` order, then dropped columns.
    fn diff_columns(
        &self,
        table: &str,
        prev: &TableState,
        cur: &TableState,
    ) -> Vec<MigrationOperation> {
        let mut operations = Vec::new();

        for (column, cur_col) in &cur.columns {
            match prev.columns.get(column) {
                None => operations.push(MigrationOperation::new(
                    OperationKind::AddColumn,
                    table,
                    column,
                    self.dialect.add_column_sql(table, column, &cur_col.definition),
                    self.dialect.drop_column_sql(table, column),
                )),
                Some(prev_col) if prev_col.definition != cur_col.definition => {
                    operations.push(MigrationOperation::new(
                        OperationKind::ModifyColumn,
                        table,
                        column,
                        self.dialect.modify_column_sql(table, column, &cur_col.definition),
                        self.dialect.modify_column_sql(table, column, &prev_col.definition),
                    ));
                }
                Some(_) => {}
            }
        }

        for (column, prev_col) in &prev.columns {
            if !cur.columns.contains_key(column) {
                operations.push(MigrationOperation::new(
                    OperationKind::DropColumn,
                    table,
                    column,
                    self.dialect.drop_column_sql(table, column),
                    self.dialect.add_column_sql(table, column, &prev_col.definition),
                ));
            }
        }

        operations
    }

    /// Created and recreated indexes, then dropped indexes. A changed index
    /// is dropped and recreated in both directions.
    fn diff_indexes(
        &self,
        table: &str,
        prev: &TableState,
        cur: &TableState,
    ) -> Vec<MigrationOperation> {
        let mut operations = Vec::new();

        for (index_name, cur_idx) in &cur.indexes {
            match prev.indexes.get(index_name) {
                None => operations.push(MigrationOperation::new(
                    OperationKind::CreateIndex,
                    table,
                    index_name,
                    self.dialect.create_index_sql(table, index_name, cur_idx),
                    self.dialect.drop_index_sql(table, index_name),
                )),
                Some(prev_idx) if prev_idx != cur_idx => {
                    let drop = self.dialect.drop_index_sql(table, index_name);
                    let create = self.dialect.create_index_sql(table, index_name, cur_idx);
                    let restore = self.dialect.create_index_sql(table, index_name, prev_idx);
                    operations.push(MigrationOperation::new(
                        OperationKind::RecreateIndex,
                        table,
                        index_name,
                        format!("{drop}\n{create}"),
                        format!("{drop}\n{restore}"),
                    ));
                }
                Some(_) => {}
            }
        }

        for (index_name, prev_idx) in &prev.indexes {
            if !cur.indexes.contains_key(index_name) {
                operations.push(MigrationOperation::new(
                    OperationKind::DropIndex,
                    table,
                    index_name,
                    self.dialect.drop_index_sql(table, index_name),
                    self.dialect.create_index_sql(table, index_name, prev_idx),
                ));
            }
        }

        operations
    }

    /// Compares foreign keys and returns `(drops, adds)`.
    ///
    /// A changed constraint appears in both lists: dropped with its old
    /// definition and re-added with its new one.
    #[must_use]
    pub fn diff_foreign_keys(
        &self,
        table: &str,
        prev: &BTreeMap<String, ForeignKeyState>,
        cur: &BTreeMap<String, ForeignKeyState>,
    ) -> (Vec<MigrationOperation>, Vec<MigrationOperation>) {
        let mut drops = Vec::new();
        let mut adds = Vec::new();

        for (name, prev_fk) in prev {
            match cur.get(name) {
                None => drops.push(self.drop_foreign_key_op(table, name, prev_fk)),
                Some(cur_fk) if cur_fk != prev_fk => {
                    drops.push(self.drop_foreign_key_op(table, name, prev_fk));
                    adds.push(self.add_foreign_key_op(table, name, cur_fk));
                }
                Some(_) => {}
            }
        }

        for (name, cur_fk) in cur {
            if !prev.contains_key(name) {
                adds.push(self.add_foreign_key_op(table, name, cur_fk));
            }
        }

        (drops, adds)
    }

    fn add_foreign_key_op(
        &self,
        table: &str,
        name: &str,
        fk: &ForeignKeyState,
    ) -> MigrationOperation {
        MigrationOperation::new(
            OperationKind::AddForeignKey,
            table,
            name,
            self.dialect.add_foreign_key_sql(table, name, fk),
            self.dialect.drop_foreign_key_sql(table, name),
        )
    }

    fn drop_foreign_key_op(
        &self,
        table: &str,
        name: &str,
        fk: &ForeignKeyState,
    ) -> MigrationOperation {
        MigrationOperation::new(
            OperationKind::DropForeignKey,
            table,
            name,
            self.dialect.drop_foreign_key_sql(table, name),
            self.dialect.add_foreign_key_sql(table, name, fk),
        )
    }
}

/// Diffs two snapshots with the `MySQL` dialect and returns the ordered operations.
#[must_use]
pub fn diff_operations(previous: &SchemaState, current: &SchemaState) -> MigrationPlan {
    Autodetector::new().diff(previous, current)
}

/// Diffs two snapshots and returns `(up, down)` statement lists.
///
/// `down` is already in execution order (reverse of emission). Both are empty
/// when nothing changed.
#[must_use]
pub fn diff(previous: &SchemaState, current: &SchemaState) -> (Vec<String>, Vec<String>) {
    diff_operations(previous, current).into_statements()
}
