//! Migration operations.
//!
//! The autodetector emits [`MigrationOperation`]s: a forward (`up`) statement
//! paired with its exact structural inverse (`down`). A [`MigrationPlan`] is
//! an ordered list of them. The forward script runs `up` halves in order; the
//! reverse script runs `down` halves in reverse order.

use serde::{Deserialize, Serialize};

/// What a migration operation does to the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Create a table (with its indexes inline).
    CreateTable,
    /// Drop a table.
    DropTable,
    /// Down-only: re-add a dropped table's foreign key.
    RestoreForeignKey,
    /// Add a column.
    AddColumn,
    /// Drop a column.
    DropColumn,
    /// Change a column's definition.
    ModifyColumn,
    /// Create an index.
    CreateIndex,
    /// Drop an index.
    DropIndex,
    /// Drop and recreate a changed index.
    RecreateIndex,
    /// Add a foreign key constraint.
    AddForeignKey,
    /// Drop a foreign key constraint.
    DropForeignKey,
}

/// A forward statement and its inverse. Either half may be empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationOperation {
    /// What the forward half does.
    pub kind: OperationKind,
    /// Table the operation targets.
    pub table: String,
    /// Name of the column, index, or constraint involved (empty for tables).
    pub object: String,
    /// Forward SQL.
    pub up: String,
    /// Rollback SQL.
    pub down: String,
}

impl MigrationOperation {
    /// Creates an operation.
    #[must_use]
    pub fn new(
        kind: OperationKind,
        table: impl Into<String>,
        object: impl Into<String>,
        up: impl Into<String>,
        down: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            table: table.into(),
            object: object.into(),
            up: up.into(),
            down: down.into(),
        }
    }

    /// Returns true if the forward half has a statement.
    #[must_use]
    pub fn has_up(&self) -> bool {
        !self.up.trim().is_empty()
    }

    /// Returns true if the rollback half has a statement.
    #[must_use]
    pub fn has_down(&self) -> bool {
        !self.down.trim().is_empty()
    }

    /// Returns a human-readable description of this operation.
    #[must_use]
    pub fn description(&self) -> String {
        match self.kind {
            OperationKind::CreateTable => format!("Create table '{}'", self.table),
            OperationKind::DropTable => format!("Drop table '{}'", self.table),
            OperationKind::RestoreForeignKey => format!(
                "Restore foreign key '{}' on table '{}' (rollback only)",
                self.object, self.table
            ),
            OperationKind::AddColumn => {
                format!("Add column '{}' to table '{}'", self.object, self.table)
            }
            OperationKind::DropColumn => {
                format!("Drop column '{}' from table '{}'", self.object, self.table)
            }
            OperationKind::ModifyColumn => {
                format!("Modify column '{}' in table '{}'", self.object, self.table)
            }
            OperationKind::CreateIndex => {
                format!("Create index '{}' on table '{}'", self.object, self.table)
            }
            OperationKind::DropIndex => {
                format!("Drop index '{}' from table '{}'", self.object, self.table)
            }
            OperationKind::RecreateIndex => {
                format!("Recreate index '{}' on table '{}'", self.object, self.table)
            }
            OperationKind::AddForeignKey => format!(
                "Add foreign key '{}' to table '{}'",
                self.object, self.table
            ),
            OperationKind::DropForeignKey => format!(
                "Drop foreign key '{}' from table '{}'",
                self.object, self.table
            ),
        }
    }
}

/// An ordered list of operation pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationPlan {
    /// Operations in forward order.
    pub operations: Vec<MigrationOperation>,
}

impl MigrationPlan {
    /// Creates an empty plan.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an operation.
    pub fn push(&mut self, operation: MigrationOperation) {
        self.operations.push(operation);
    }

    /// Appends several operations.
    pub fn extend(&mut self, operations: impl IntoIterator<Item = MigrationOperation>) {
        self.operations.extend(operations);
    }

    /// Returns true if there is nothing to run in either direction.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations
            .iter()
            .all(|op| !op.has_up() && !op.has_down())
    }

    /// Returns the number of operations.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.operations.len()
    }

    /// Non-empty forward statements, in emission order.
    #[must_use]
    pub fn up_statements(&self) -> Vec<String> {
        self.operations
            .iter()
            .filter(|op| op.has_up())
            .map(|op| op.up.clone())
            .collect()
    }

    /// Non-empty rollback statements, in reverse emission order.
    #[must_use]
    pub fn down_statements(&self) -> Vec<String> {
        self.operations
            .iter()
            .rev()
            .filter(|op| op.has_down())
            .map(|op| op.down.clone())
            .collect()
    }

    /// Splits the plan into `(up, down)` statement lists.
    #[must_use]
    pub fn into_statements(self) -> (Vec<String>, Vec<String>) {
        (self.up_statements(), self.down_statements())
    }
}

impl IntoIterator for MigrationPlan {
    type Item = MigrationOperation;
    type IntoIter = std::vec::IntoIter<MigrationOperation>;

    fn into_iter(self) -> Self::IntoIter {
        self.operations.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(up: &str, down: &str) -> MigrationOperation {
        MigrationOperation::new(OperationKind::AddColumn, "t", "c", up, down)
    }

    #[test]
    fn test_down_statements_are_reversed() {
        let mut plan = MigrationPlan::new();
        plan.push(op("A;", "undo A;"));
        plan.push(op("B;", "undo B;"));
        plan.push(op("C;", "undo C;"));

        assert_eq!(plan.up_statements(), vec!["A;", "B;", "C;"]);
        assert_eq!(plan.down_statements(), vec!["undo C;", "undo B;", "undo A;"]);
    }

    #[test]
    fn test_empty_halves_skipped() {
        let mut plan = MigrationPlan::new();
        plan.push(op("", "restore;"));
        plan.push(op("drop;", "create;"));

        let (up, down) = plan.into_statements();
        assert_eq!(up, vec!["drop;"]);
        assert_eq!(down, vec!["create;", "restore;"]);
    }

    #[test]
    fn test_plan_is_empty() {
        let mut plan = MigrationPlan::new();
        assert!(plan.is_empty());
        plan.push(op(" ", ""));
        assert!(plan.is_empty());
        plan.push(op("", "x;"));
        assert!(!plan.is_empty());
    }

    #[test]
    fn test_description() {
        let op = MigrationOperation::new(
            OperationKind::DropForeignKey,
            "children",
            "fk_children_parent",
            "ALTER TABLE ...",
            "ALTER TABLE ...",
        );
        assert_eq!(
            op.description(),
            "Drop foreign key 'fk_children_parent' from table 'children'"
        );
    }
}
