//! Migration generation.
//!
//! Ties the pieces together: load the snapshot, compute the current state
//! from the models, diff, write the SQL pair, then save the new snapshot.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{debug, info};

use crate::autodetector::Autodetector;
use crate::error::{MigrateError, Result};
use crate::introspect::compute_current_state;
use crate::models::ModelSchema;
use crate::operations::MigrationPlan;
use crate::snapshot::{load_snapshot, save_snapshot};
use crate::writer::{remove_quietly, MigrationWriter, VERSION_FORMAT};

/// Default migrations directory, relative to the working directory.
pub const DEFAULT_MIGRATIONS_DIR: &str = "database/migrations";

/// Default snapshot file name inside the migrations directory.
pub const DEFAULT_STATE_FILE: &str = ".schema_state.json";

/// Where migrations and the snapshot live.
#[derive(Debug, Clone, Default)]
pub struct GeneratorOptions {
    /// Migrations directory. Blank means [`DEFAULT_MIGRATIONS_DIR`].
    pub dir: Option<PathBuf>,
    /// Snapshot file. Blank means `<dir>/`[`DEFAULT_STATE_FILE`].
    pub state_file: Option<PathBuf>,
    /// Fixed migration version; the current local time when unset.
    pub version: Option<String>,
}

impl GeneratorOptions {
    /// Creates options with all defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the migrations directory.
    #[must_use]
    pub fn dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    /// Sets the snapshot file.
    #[must_use]
    pub fn state_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_file = Some(path.into());
        self
    }

    /// Pins the migration version instead of using the clock.
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Returns the migrations directory as an absolute path.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::Io`] if the working directory cannot be read.
    pub fn migrations_dir(&self) -> Result<PathBuf> {
        let dir = non_blank(self.dir.as_deref())
            .map_or_else(|| PathBuf::from(DEFAULT_MIGRATIONS_DIR), Path::to_path_buf);
        Ok(std::path::absolute(dir)?)
    }

    /// Like [`migrations_dir`](Self::migrations_dir), creating the directory
    /// if it is missing.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::Io`] if the directory cannot be created.
    pub fn resolve_dir(&self) -> Result<PathBuf> {
        let dir = self.migrations_dir()?;
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Resolves the snapshot path against an already resolved `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::Io`] if the working directory cannot be read.
    pub fn resolve_state_file(&self, dir: &Path) -> Result<PathBuf> {
        let path = non_blank(self.state_file.as_deref())
            .map_or_else(|| dir.join(DEFAULT_STATE_FILE), Path::to_path_buf);
        Ok(std::path::absolute(path)?)
    }

    fn resolve_version(&self) -> String {
        match self.version.as_deref().map(str::trim) {
            Some(version) if !version.is_empty() => version.to_string(),
            _ => Local::now().format(VERSION_FORMAT).to_string(),
        }
    }
}

fn non_blank(path: Option<&Path>) -> Option<&Path> {
    path.filter(|p| !p.as_os_str().to_string_lossy().trim().is_empty())
}

/// Outcome of [`make_migrations`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MakeMigrationsResult {
    /// Whether any change was detected (and files written).
    pub changed: bool,
    /// Forward script, when written.
    pub up_path: Option<PathBuf>,
    /// Rollback script, when written.
    pub down_path: Option<PathBuf>,
    /// Resolved snapshot path, set even when nothing changed.
    pub state_path: PathBuf,
}

/// Generates a migration pair for the difference between the stored
/// snapshot and `models`, then records `models` as the new snapshot.
///
/// Nothing is written when the schema is unchanged. If a write fails after
/// some files were created, those files are removed before returning.
///
/// # Errors
///
/// Returns [`MigrateError::MissingName`] for a blank `name`, any validation
/// error from [`compute_current_state`], and I/O or parse errors from the
/// snapshot and migration files.
pub fn make_migrations(
    models: &[ModelSchema],
    name: &str,
    options: &GeneratorOptions,
) -> Result<MakeMigrationsResult> {
    if name.trim().is_empty() {
        return Err(MigrateError::MissingName);
    }

    let dir = options.resolve_dir()?;
    let state_path = options.resolve_state_file(&dir)?;
    let mut result = MakeMigrationsResult {
        state_path: state_path.clone(),
        ..MakeMigrationsResult::default()
    };

    let previous = load_snapshot(&state_path)?;
    let current = compute_current_state(models)?;

    let plan = Autodetector::new().diff(&previous, &current);
    if plan.up_statements().is_empty() {
        info!("No changes detected");
        return Ok(result);
    }
    debug!(operations = plan.len(), "Detected changes");
    for op in &plan.operations {
        debug!("{}", op.description());
    }

    let writer = MigrationWriter::new(&options.resolve_version(), name);
    let (up_path, down_path) = writer.write(&dir, &plan)?;
    if let Err(e) = save_snapshot(&state_path, &current) {
        remove_quietly(&up_path);
        remove_quietly(&down_path);
        return Err(e);
    }

    result.changed = true;
    result.up_path = Some(up_path);
    result.down_path = Some(down_path);
    Ok(result)
}

/// Computes the operations [`make_migrations`] would write, touching
/// nothing on disk.
///
/// # Errors
///
/// Returns the snapshot and validation errors [`make_migrations`] would.
pub fn plan_migrations(
    models: &[ModelSchema],
    options: &GeneratorOptions,
) -> Result<MigrationPlan> {
    let dir = options.migrations_dir()?;
    let previous = load_snapshot(&options.resolve_state_file(&dir)?)?;
    let current = compute_current_state(models)?;
    Ok(Autodetector::new().diff(&previous, &current))
}

/// Records `models` as the snapshot without generating SQL.
///
/// Used to adopt an existing database: the next [`make_migrations`] run
/// only produces what changed after this point.
///
/// # Errors
///
/// Returns validation errors from [`compute_current_state`] and I/O errors
/// from writing the snapshot.
pub fn sync_schema_state(models: &[ModelSchema], options: &GeneratorOptions) -> Result<PathBuf> {
    let dir = options.resolve_dir()?;
    let state_path = options.resolve_state_file(&dir)?;
    let current = compute_current_state(models)?;
    save_snapshot(&state_path, &current)?;
    info!(path = %state_path.display(), tables = current.tables.len(), "Synced schema state");
    Ok(state_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldSchema;

    fn users() -> ModelSchema {
        ModelSchema::new("users")
            .field(FieldSchema::new("id", "bigint unsigned").auto_increment().primary_key())
            .field(FieldSchema::new("name", "varchar(64)"))
    }

    #[test]
    fn test_name_required() {
        let err = make_migrations(&[users()], "   ", &GeneratorOptions::new()).unwrap_err();
        assert!(matches!(err, MigrateError::MissingName));
    }

    #[test]
    fn test_default_state_file_inside_dir() {
        let dir = tempfile::tempdir().unwrap();
        let options = GeneratorOptions::new().dir(dir.path().join("migrations"));
        let resolved = options.resolve_dir().unwrap();
        assert!(resolved.is_dir());
        assert_eq!(
            options.resolve_state_file(&resolved).unwrap(),
            resolved.join(DEFAULT_STATE_FILE)
        );
    }

    #[test]
    fn test_plan_does_not_create_dir() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("not_yet");
        let options = GeneratorOptions::new().dir(&target);

        let plan = plan_migrations(&[users()], &options).unwrap();
        assert_eq!(plan.len(), 1);
        assert!(!target.exists());
    }

    #[test]
    fn test_sync_then_no_change() {
        let dir = tempfile::tempdir().unwrap();
        let options = GeneratorOptions::new().dir(dir.path());

        let state_path = sync_schema_state(&[users()], &options).unwrap();
        assert!(state_path.exists());

        let result = make_migrations(&[users()], "noop", &options).unwrap();
        assert!(!result.changed);
        assert_eq!(result.up_path, None);
        assert_eq!(result.state_path, state_path);
        let sql_files = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(std::result::Result::ok)
            .filter(|e| e.path().extension().is_some_and(|x| x == "sql"))
            .count();
        assert_eq!(sql_files, 0);
    }

    #[test]
    fn test_creates_sql_files_and_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let options = GeneratorOptions::new()
            .dir(dir.path())
            .version("20260101120000");

        let result = make_migrations(&[users()], "Create Users", &options).unwrap();
        assert!(result.changed);
        let up = result.up_path.unwrap();
        let down = result.down_path.unwrap();
        assert_eq!(
            up.file_name().unwrap(),
            "20260101120000_create_users.up.sql"
        );
        assert!(fs::read_to_string(&up).unwrap().starts_with("CREATE TABLE `users` ("));
        assert_eq!(
            fs::read_to_string(&down).unwrap(),
            "DROP TABLE IF EXISTS `users`;\n"
        );
        assert!(result.state_path.exists());
    }

    #[test]
    fn test_unreadable_snapshot_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        // a directory in place of the snapshot file cannot be read
        let state = dir.path().join("state");
        fs::create_dir_all(&state).unwrap();
        let options = GeneratorOptions::new()
            .dir(dir.path())
            .state_file(&state)
            .version("20260101120000");

        assert!(make_migrations(&[users()], "broken", &options).is_err());
        assert!(!dir.path().join("20260101120000_broken.up.sql").exists());
        assert!(!dir.path().join("20260101120000_broken.down.sql").exists());
    }
}
