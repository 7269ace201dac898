//! Database dialect implementations.
//!
//! A dialect knows how to render each DDL statement the autodetector needs
//! from the canonical state model. Every method returns one complete
//! statement terminated by `;`, except [`MigrationDialect::table_index_definition`]
//! which renders a clause for the body of `CREATE TABLE`.

mod mysql;

pub use mysql::{IndexClass, MySqlDialect};

use crate::state::{ForeignKeyState, IndexState, TableState};

/// Trait for database-specific DDL generation.
pub trait MigrationDialect: Send + Sync {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Quote an identifier (table name, column name, etc.).
    fn quote_identifier(&self, name: &str) -> String;

    /// Quote a string literal, doubling embedded single quotes.
    fn quote_string(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    /// Quotes and comma-joins a column list.
    fn quoted_columns(&self, columns: &[String]) -> String {
        columns
            .iter()
            .map(|c| self.quote_identifier(c.trim()))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `CREATE TABLE` with columns, primary key, and index clauses.
    fn create_table_sql(&self, name: &str, table: &TableState) -> String;

    /// `DROP TABLE IF EXISTS`.
    fn drop_table_sql(&self, name: &str) -> String;

    /// `ALTER TABLE ... ADD COLUMN`.
    fn add_column_sql(&self, table: &str, column: &str, definition: &str) -> String;

    /// `ALTER TABLE ... DROP COLUMN`.
    fn drop_column_sql(&self, table: &str, column: &str) -> String;

    /// `ALTER TABLE ... MODIFY COLUMN`.
    fn modify_column_sql(&self, table: &str, column: &str, definition: &str) -> String;

    /// Standalone `CREATE INDEX`.
    fn create_index_sql(&self, table: &str, name: &str, index: &IndexState) -> String;

    /// `DROP INDEX ... ON`.
    fn drop_index_sql(&self, table: &str, name: &str) -> String;

    /// Index clause for the body of `CREATE TABLE` (no trailing `;`).
    fn table_index_definition(&self, name: &str, index: &IndexState) -> String;

    /// `ALTER TABLE ... ADD CONSTRAINT ... FOREIGN KEY`.
    fn add_foreign_key_sql(&self, table: &str, name: &str, fk: &ForeignKeyState) -> String;

    /// `ALTER TABLE ... DROP FOREIGN KEY`.
    fn drop_foreign_key_sql(&self, table: &str, name: &str) -> String;
}
