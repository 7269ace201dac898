//! Snapshot persistence.
//!
//! The snapshot is the [`SchemaState`] recorded after the last generated
//! migration, stored as pretty-printed JSON. A missing or blank file means
//! "no previous state", so the first run generates the whole schema.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{MigrateError, Result};
use crate::state::SchemaState;

/// Reads a snapshot from `path`.
///
/// Returns an empty state if the file does not exist or contains only
/// whitespace. A `null` tables value reads as no tables.
///
/// # Errors
///
/// Returns [`MigrateError::Io`] if the file cannot be read,
/// [`MigrateError::ParseError`] if it is not a valid snapshot, and
/// [`MigrateError::PartialIndex`] if a recorded index carries a `where`
/// predicate.
pub fn load_snapshot(path: &Path) -> Result<SchemaState> {
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "No snapshot file, starting from empty state");
            return Ok(SchemaState::new());
        }
        Err(e) => return Err(e.into()),
    };

    if data.trim().is_empty() {
        warn!(path = %path.display(), "Snapshot file is empty, starting from empty state");
        return Ok(SchemaState::new());
    }

    let state: SchemaState =
        serde_json::from_str(&data).map_err(|source| MigrateError::ParseError {
            path: path.to_path_buf(),
            source,
        })?;
    reject_partial_indexes(&state)?;
    debug!(path = %path.display(), tables = state.tables.len(), "Loaded snapshot");
    Ok(state)
}

/// Partial indexes cannot be rendered for `MySQL`, so a snapshot carrying one
/// is refused rather than diffed.
fn reject_partial_indexes(state: &SchemaState) -> Result<()> {
    for (table, table_state) in &state.tables {
        for (index, index_state) in &table_state.indexes {
            let predicate = index_state.where_clause.trim();
            if !predicate.is_empty() {
                return Err(MigrateError::PartialIndex {
                    table: table.clone(),
                    index: index.clone(),
                    predicate: predicate.to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Renders a snapshot as it is stored on disk: two-space indented JSON
/// followed by a newline.
///
/// # Errors
///
/// Returns [`MigrateError::Serialization`] if encoding fails.
pub fn snapshot_to_string(state: &SchemaState) -> Result<String> {
    let mut json = serde_json::to_string_pretty(state)?;
    json.push('\n');
    Ok(json)
}

/// Writes a snapshot to `path`, replacing any existing file. Missing parent
/// directories are created.
///
/// # Errors
///
/// Returns [`MigrateError::Io`] if a directory or the file cannot be written.
pub fn save_snapshot(path: &Path, state: &SchemaState) -> Result<()> {
    let json = snapshot_to_string(state)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, json)?;
    debug!(path = %path.display(), tables = state.tables.len(), "Saved snapshot");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ForeignKeyState, IndexFieldState, IndexState, TableState};

    fn sample() -> SchemaState {
        SchemaState::new().table(
            "users",
            TableState::new()
                .column("id", "bigint unsigned")
                .column("name", "varchar(128)")
                .primary_key(["id"])
                .index(
                    "idx_users_name",
                    IndexState::default()
                        .unique()
                        .using("btree")
                        .field(IndexFieldState::column("name").length(16).sort("DESC")),
                )
                .foreign_key(
                    "fk_users_team",
                    ForeignKeyState::new(["id"], "teams", ["id"]).on_delete("CASCADE"),
                ),
        )
    }

    #[test]
    fn test_missing_file_is_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let state = load_snapshot(&dir.path().join("absent.json")).unwrap();
        assert!(state.is_empty());
    }

    #[test]
    fn test_blank_file_is_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "  \n\t ").unwrap();
        assert!(load_snapshot(&path).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{not json").unwrap();
        let err = load_snapshot(&path).unwrap_err();
        assert!(matches!(err, MigrateError::ParseError { .. }));
    }

    #[test]
    fn test_partial_index_in_snapshot_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut state = sample();
        if let Some(index) = state
            .tables
            .get_mut("users")
            .and_then(|t| t.indexes.get_mut("idx_users_name"))
        {
            index.where_clause = " name IS NOT NULL ".to_string();
        }
        save_snapshot(&path, &state).unwrap();

        let err = load_snapshot(&path).unwrap_err();
        assert!(err.is_validation());
        match err {
            MigrateError::PartialIndex {
                table,
                index,
                predicate,
            } => {
                assert_eq!(table, "users");
                assert_eq!(index, "idx_users_name");
                assert_eq!(predicate, "name IS NOT NULL");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");
        let state = sample();

        save_snapshot(&path, &state).unwrap();
        let loaded = load_snapshot(&path).unwrap();
        assert_eq!(loaded, state);

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.ends_with("}\n"));
        assert!(raw.starts_with("{\n  \"tables\": {"));
    }

    #[test]
    fn test_empty_state_written_with_tables_key() {
        let rendered = snapshot_to_string(&SchemaState::new()).unwrap();
        assert_eq!(rendered, "{\n  \"tables\": {}\n}\n");
    }
}
