//! `MySQL` dialect for migrations.
//!
//! Identifiers are backtick-quoted. `MySQL` has no statement to alter an
//! index or a foreign key in place, so the autodetector always drops and
//! recreates those; this module only renders the individual statements.

use crate::normalize::{normalize_foreign_key, normalize_index, normalize_index_class};
use crate::state::{ForeignKeyState, IndexFieldState, IndexState, TableState};

use super::MigrationDialect;

/// Index class, parsed case-insensitively. Unknown classes behave as plain keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IndexClass {
    /// Plain secondary index.
    #[default]
    Plain,
    /// `UNIQUE`.
    Unique,
    /// `FULLTEXT`.
    Fulltext,
    /// `SPATIAL`.
    Spatial,
}

impl IndexClass {
    /// Parses a class keyword.
    #[must_use]
    pub fn parse(class: &str) -> Self {
        match normalize_index_class(class).as_str() {
            "UNIQUE" => Self::Unique,
            "FULLTEXT" => Self::Fulltext,
            "SPATIAL" => Self::Spatial,
            _ => Self::Plain,
        }
    }

    /// Prefix for `CREATE <prefix>INDEX`.
    #[must_use]
    pub const fn create_prefix(self) -> &'static str {
        match self {
            Self::Plain => "",
            Self::Unique => "UNIQUE ",
            Self::Fulltext => "FULLTEXT ",
            Self::Spatial => "SPATIAL ",
        }
    }

    /// Key keyword inside `CREATE TABLE`.
    #[must_use]
    pub const fn key_prefix(self) -> &'static str {
        match self {
            Self::Plain => "KEY",
            Self::Unique => "UNIQUE KEY",
            Self::Fulltext => "FULLTEXT KEY",
            Self::Spatial => "SPATIAL KEY",
        }
    }
}

/// `MySQL` migration dialect.
#[derive(Debug, Clone, Default)]
pub struct MySqlDialect;

impl MySqlDialect {
    /// Creates a new `MySQL` dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Renders one key part followed by its sort direction. Prefix length
    /// and `COLLATE` apply to column parts only; an expression part is
    /// emitted as written.
    fn index_field_sql(&self, field: &IndexFieldState) -> String {
        let expression = field.expression.trim();
        let mut sql = if expression.is_empty() {
            let mut column = self.quote_identifier(field.column.trim());
            if field.length > 0 {
                column.push_str(&format!("({})", field.length));
            }
            let collate = field.collate.trim();
            if !collate.is_empty() {
                column.push_str(" COLLATE ");
                column.push_str(collate);
            }
            column
        } else {
            expression.to_string()
        };

        let sort = field.sort.trim();
        if !sort.is_empty() {
            sql.push(' ');
            sql.push_str(&sort.to_uppercase());
        }
        sql
    }

    fn index_fields_sql(&self, fields: &[IndexFieldState]) -> String {
        fields
            .iter()
            .map(|f| self.index_field_sql(f))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Trailing `USING`, `COMMENT`, and option text shared by both index forms.
    fn index_options_sql(&self, index: &IndexState) -> String {
        let mut sql = String::new();
        if !index.index_type.is_empty() {
            sql.push_str(" USING ");
            sql.push_str(&index.index_type);
        }
        if !index.comment.is_empty() {
            sql.push_str(" COMMENT ");
            sql.push_str(&self.quote_string(&index.comment));
        }
        if !index.option.is_empty() {
            sql.push(' ');
            sql.push_str(&index.option);
        }
        sql
    }
}

impl MigrationDialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn create_table_sql(&self, name: &str, table: &TableState) -> String {
        let mut defs: Vec<String> = table
            .columns
            .iter()
            .map(|(column, state)| {
                format!("  {} {}", self.quote_identifier(column), state.definition)
            })
            .collect();

        if !table.primary_keys.is_empty() {
            defs.push(format!(
                "  PRIMARY KEY ({})",
                self.quoted_columns(&table.primary_keys)
            ));
        }

        for (index_name, index) in &table.indexes {
            defs.push(format!(
                "  {}",
                self.table_index_definition(index_name, index)
            ));
        }

        format!(
            "CREATE TABLE {} (\n{}\n);",
            self.quote_identifier(name),
            defs.join(",\n")
        )
    }

    fn drop_table_sql(&self, name: &str) -> String {
        format!("DROP TABLE IF EXISTS {};", self.quote_identifier(name))
    }

    fn add_column_sql(&self, table: &str, column: &str, definition: &str) -> String {
        format!(
            "ALTER TABLE {} ADD COLUMN {} {};",
            self.quote_identifier(table),
            self.quote_identifier(column),
            definition
        )
    }

    fn drop_column_sql(&self, table: &str, column: &str) -> String {
        format!(
            "ALTER TABLE {} DROP COLUMN {};",
            self.quote_identifier(table),
            self.quote_identifier(column)
        )
    }

    fn modify_column_sql(&self, table: &str, column: &str, definition: &str) -> String {
        format!(
            "ALTER TABLE {} MODIFY COLUMN {} {};",
            self.quote_identifier(table),
            self.quote_identifier(column),
            definition
        )
    }

    fn create_index_sql(&self, table: &str, name: &str, index: &IndexState) -> String {
        let index = normalize_index(index);
        format!(
            "CREATE {}INDEX {} ON {} ({}){};",
            IndexClass::parse(&index.class).create_prefix(),
            self.quote_identifier(name),
            self.quote_identifier(table),
            self.index_fields_sql(&index.fields),
            self.index_options_sql(&index)
        )
    }

    fn drop_index_sql(&self, table: &str, name: &str) -> String {
        format!(
            "DROP INDEX {} ON {};",
            self.quote_identifier(name),
            self.quote_identifier(table)
        )
    }

    fn table_index_definition(&self, name: &str, index: &IndexState) -> String {
        let index = normalize_index(index);
        format!(
            "{} {} ({}){}",
            IndexClass::parse(&index.class).key_prefix(),
            self.quote_identifier(name),
            self.index_fields_sql(&index.fields),
            self.index_options_sql(&index)
        )
    }

    fn add_foreign_key_sql(&self, table: &str, name: &str, fk: &ForeignKeyState) -> String {
        let fk = normalize_foreign_key(fk);
        let mut parts = vec![
            format!(
                "ALTER TABLE {} ADD CONSTRAINT {}",
                self.quote_identifier(table),
                self.quote_identifier(name)
            ),
            format!("FOREIGN KEY ({})", self.quoted_columns(&fk.columns)),
            format!(
                "REFERENCES {} ({})",
                self.quote_identifier(&fk.ref_table),
                self.quoted_columns(&fk.ref_columns)
            ),
        ];
        if !fk.on_delete.is_empty() {
            parts.push(format!("ON DELETE {}", fk.on_delete));
        }
        if !fk.on_update.is_empty() {
            parts.push(format!("ON UPDATE {}", fk.on_update));
        }
        format!("{};", parts.join(" "))
    }

    fn drop_foreign_key_sql(&self, table: &str, name: &str) -> String {
        format!(
            "ALTER TABLE {} DROP FOREIGN KEY {};",
            self.quote_identifier(table),
            self.quote_identifier(name)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dialect() -> MySqlDialect {
        MySqlDialect::new()
    }

    fn name_index() -> IndexState {
        IndexState::default()
            .class("unique")
            .using("btree")
            .comment("O'Brien")
            .option("WITH PARSER ngram")
            .field(
                IndexFieldState::column("name")
                    .length(16)
                    .collate("utf8mb4_bin")
                    .sort("desc"),
            )
    }

    #[test]
    fn test_create_index_full() {
        let sql = dialect().create_index_sql("users", "idx_users_name", &name_index());
        assert_eq!(
            sql,
            "CREATE UNIQUE INDEX `idx_users_name` ON `users` (`name`(16) COLLATE utf8mb4_bin DESC) USING btree COMMENT 'O''Brien' WITH PARSER ngram;"
        );
    }

    #[test]
    fn test_table_index_definition() {
        let sql = dialect().table_index_definition("idx_users_name", &name_index());
        assert_eq!(
            sql,
            "UNIQUE KEY `idx_users_name` (`name`(16) COLLATE utf8mb4_bin DESC) USING btree COMMENT 'O''Brien' WITH PARSER ngram"
        );
    }

    #[test]
    fn test_drop_index() {
        assert_eq!(
            dialect().drop_index_sql("users", "idx_users_name"),
            "DROP INDEX `idx_users_name` ON `users`;"
        );
    }

    #[test]
    fn test_expression_field_ignores_length_and_collate() {
        let index = IndexState::default().field(
            IndexFieldState::expression(" (LOWER(email)) ")
                .length(8)
                .collate("utf8mb4_bin")
                .sort("asc"),
        );
        let table_clause = dialect().table_index_definition("idx_lower_email", &index);
        assert_eq!(table_clause, "KEY `idx_lower_email` ((LOWER(email)) ASC)");
        assert!(!table_clause.contains("COLLATE"));
        assert_eq!(
            dialect().create_index_sql("users", "idx_lower_email", &index),
            "CREATE INDEX `idx_lower_email` ON `users` ((LOWER(email)) ASC);"
        );
    }

    #[test]
    fn test_index_class_prefixes() {
        assert_eq!(IndexClass::parse("unique").create_prefix(), "UNIQUE ");
        assert_eq!(IndexClass::parse("fulltext").create_prefix(), "FULLTEXT ");
        assert_eq!(IndexClass::parse("spatial").create_prefix(), "SPATIAL ");
        assert_eq!(IndexClass::parse("normal").create_prefix(), "");

        assert_eq!(IndexClass::parse("unique").key_prefix(), "UNIQUE KEY");
        assert_eq!(IndexClass::parse("fulltext").key_prefix(), "FULLTEXT KEY");
        assert_eq!(IndexClass::parse("spatial").key_prefix(), "SPATIAL KEY");
        assert_eq!(IndexClass::parse("").key_prefix(), "KEY");
    }

    #[test]
    fn test_create_table() {
        let table = TableState::new()
            .column("parent_id", "bigint unsigned")
            .column("id", "bigint unsigned NOT NULL")
            .primary_key(["parent_id", "id"])
            .index("idx_b", IndexState::on_columns(["parent_id"]))
            .index("idx_a", IndexState::on_columns(["id"]).unique());

        let sql = dialect().create_table_sql("children", &table);
        assert_eq!(
            sql,
            "CREATE TABLE `children` (\n  \
             `id` bigint unsigned NOT NULL,\n  \
             `parent_id` bigint unsigned,\n  \
             PRIMARY KEY (`parent_id`, `id`),\n  \
             UNIQUE KEY `idx_a` (`id`),\n  \
             KEY `idx_b` (`parent_id`)\n);"
        );
    }

    #[test]
    fn test_columns_and_table_statements() {
        let d = dialect();
        assert_eq!(d.drop_table_sql("t"), "DROP TABLE IF EXISTS `t`;");
        assert_eq!(
            d.add_column_sql("t", "c", "bigint unsigned"),
            "ALTER TABLE `t` ADD COLUMN `c` bigint unsigned;"
        );
        assert_eq!(d.drop_column_sql("t", "c"), "ALTER TABLE `t` DROP COLUMN `c`;");
        assert_eq!(
            d.modify_column_sql("t", "name", "varchar(32)"),
            "ALTER TABLE `t` MODIFY COLUMN `name` varchar(32);"
        );
    }

    #[test]
    fn test_foreign_key_statements() {
        let fk = ForeignKeyState::new(["parent_id"], "parents", ["id"])
            .on_delete("cascade")
            .on_update("CASCADE");
        assert_eq!(
            dialect().add_foreign_key_sql("children", "fk_children_parent", &fk),
            "ALTER TABLE `children` ADD CONSTRAINT `fk_children_parent` FOREIGN KEY (`parent_id`) REFERENCES `parents` (`id`) ON DELETE CASCADE ON UPDATE CASCADE;"
        );
        assert_eq!(
            dialect().drop_foreign_key_sql("children", "fk_children_parent"),
            "ALTER TABLE `children` DROP FOREIGN KEY `fk_children_parent`;"
        );
    }

    #[test]
    fn test_foreign_key_without_actions() {
        let fk = ForeignKeyState::new(["a_id", "b_id"], "pairs", ["a", "b"]);
        assert_eq!(
            dialect().add_foreign_key_sql("t", "fk_t_pairs", &fk),
            "ALTER TABLE `t` ADD CONSTRAINT `fk_t_pairs` FOREIGN KEY (`a_id`, `b_id`) REFERENCES `pairs` (`a`, `b`);"
        );
    }

    #[test]
    fn test_quote_identifier_escapes_backticks() {
        assert_eq!(dialect().quote_identifier("we`ird"), "`we``ird`");
        assert_eq!(dialect().quote_string("it's"), "'it''s'");
    }
}
