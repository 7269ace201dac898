//! Migration file writer.
//!
//! Each generated migration is a pair of plain SQL files sharing a stem:
//! `<version>_<name>.up.sql` and `<version>_<name>.down.sql`. Statements are
//! separated by a blank line and the file ends with a single newline.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::Result;
use crate::operations::MigrationPlan;

/// Name used when sanitizing leaves nothing.
pub const FALLBACK_MIGRATION_NAME: &str = "auto_migration";

/// Version format for migration files: local time, to the second.
pub const VERSION_FORMAT: &str = "%Y%m%d%H%M%S";

/// Turns free text into a file-name-safe migration name.
///
/// Lower-cases, keeps ASCII letters and digits, collapses every other run
/// of characters into one `_`, and trims `_` from both ends.
#[must_use]
pub fn sanitize_name(raw: &str) -> String {
    let mut name = String::with_capacity(raw.len());
    let mut last_underscore = false;
    for c in raw.trim().to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            name.push(c);
            last_underscore = false;
        } else if !last_underscore {
            name.push('_');
            last_underscore = true;
        }
    }
    let name = name.trim_matches('_');
    if name.is_empty() {
        FALLBACK_MIGRATION_NAME.to_string()
    } else {
        name.to_string()
    }
}

/// Generates a migration file stem: `<version>_<sanitized name>`.
#[must_use]
pub fn generate_migration_name(version: &str, name: &str) -> String {
    format!("{version}_{}", sanitize_name(name))
}

/// Renders statements as a migration file body.
#[must_use]
pub fn render_statements(statements: &[String]) -> String {
    let mut body = statements.join("\n\n");
    body.push('\n');
    body
}

/// Writes the up/down file pair for one migration.
#[derive(Debug, Clone)]
pub struct MigrationWriter {
    stem: String,
}

impl MigrationWriter {
    /// Creates a writer for `<version>_<sanitized name>`.
    #[must_use]
    pub fn new(version: &str, name: &str) -> Self {
        Self {
            stem: generate_migration_name(version, name),
        }
    }

    /// Returns the file stem shared by both files.
    #[must_use]
    pub fn stem(&self) -> &str {
        &self.stem
    }

    /// Path of the forward script inside `dir`.
    #[must_use]
    pub fn up_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.up.sql", self.stem))
    }

    /// Path of the rollback script inside `dir`.
    #[must_use]
    pub fn down_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.down.sql", self.stem))
    }

    /// Renders `(up, down)` file bodies for a plan.
    #[must_use]
    pub fn generate(&self, plan: &MigrationPlan) -> (String, String) {
        (
            render_statements(&plan.up_statements()),
            render_statements(&plan.down_statements()),
        )
    }

    /// Writes both files into `dir` and returns their paths.
    ///
    /// If the second write fails the first file is removed, so a failed
    /// run leaves no half-written migration behind.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::Io`](crate::error::MigrateError::Io) if
    /// either file cannot be written.
    pub fn write(&self, dir: &Path, plan: &MigrationPlan) -> Result<(PathBuf, PathBuf)> {
        let (up, down) = self.generate(plan);
        let up_path = self.up_path(dir);
        let down_path = self.down_path(dir);

        fs::write(&up_path, up)?;
        if let Err(e) = fs::write(&down_path, down) {
            remove_quietly(&up_path);
            return Err(e.into());
        }

        info!(path = %up_path.display(), "Created migration");
        info!(path = %down_path.display(), "Created migration");
        Ok((up_path, down_path))
    }
}

/// Removes a file written earlier in a failed run.
pub(crate) fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        warn!(path = %path.display(), error = %e, "Failed to remove partial migration file");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::{MigrationOperation, OperationKind};

    #[test]
    fn test_sanitize_name() {
        let cases = [
            ("Add User Avatar", "add_user_avatar"),
            ("  add---field###name  ", "add_field_name"),
            ("____", "auto_migration"),
            ("中文 name with 123", "name_with_123"),
            ("mix.UPPER.and-lower_1234", "mix_upper_and_lower_1234"),
            ("", "auto_migration"),
        ];
        for (input, expected) in cases {
            assert_eq!(sanitize_name(input), expected, "input: {input:?}");
        }
    }

    #[test]
    fn test_generate_migration_name() {
        assert_eq!(
            generate_migration_name("20260101120000", "Add Users"),
            "20260101120000_add_users"
        );
    }

    #[test]
    fn test_render_statements() {
        let body = render_statements(&["A;".to_string(), "B;".to_string()]);
        assert_eq!(body, "A;\n\nB;\n");
    }

    #[test]
    fn test_write_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut plan = MigrationPlan::new();
        plan.push(MigrationOperation::new(
            OperationKind::AddColumn,
            "t",
            "c",
            "ALTER TABLE `t` ADD COLUMN `c` int;",
            "ALTER TABLE `t` DROP COLUMN `c`;",
        ));

        let writer = MigrationWriter::new("20260101120000", "add c");
        let (up, down) = writer.write(dir.path(), &plan).unwrap();

        assert!(up.ends_with("20260101120000_add_c.up.sql"));
        assert!(down.ends_with("20260101120000_add_c.down.sql"));
        assert_eq!(
            fs::read_to_string(up).unwrap(),
            "ALTER TABLE `t` ADD COLUMN `c` int;\n"
        );
        assert_eq!(
            fs::read_to_string(down).unwrap(),
            "ALTER TABLE `t` DROP COLUMN `c`;\n"
        );
    }

    #[test]
    fn test_write_into_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let writer = MigrationWriter::new("20260101120000", "x");
        assert!(writer.write(&missing, &MigrationPlan::new()).is_err());
        assert!(!writer.up_path(&missing).exists());
    }
}
