//! Current-state computation from model descriptors.
//!
//! [`compute_current_state`] turns the application's models into the
//! canonical [`SchemaState`] the autodetector diffs against the snapshot.
//! It rejects anything the diff engine cannot express (partial indexes,
//! unnamed or conflicting constraints) before any SQL is generated.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{MigrateError, Result};
use crate::models::{FieldSchema, IndexTag, ModelSchema, RelationKind, RelationSchema};
use crate::normalize::{foreign_key_signature, normalize_definition, normalize_foreign_key};
use crate::state::{
    ColumnState, ForeignKeyState, IndexFieldState, IndexState, SchemaState, TableState,
};

/// Reserved name of the primary key index; never emitted as a secondary index.
const PRIMARY_INDEX: &str = "PRIMARY";

/// A foreign key attached to `table`, before deduplication.
#[derive(Debug, Clone)]
struct Constraint {
    table: String,
    name: String,
    fk: ForeignKeyState,
}

/// Builds the schema state the given models describe.
///
/// Tables are keyed by name; two models for the same table are an error.
/// Many-to-many join tables are synthesized and, when several relations
/// name the same join table, the first definition wins. Foreign keys are
/// collected across all tables in sorted table/relation order and attached
/// only to tables that exist in the result.
///
/// # Errors
///
/// Returns a validation error for duplicate tables, unknown relation
/// targets, or conflicting foreign keys. All problems found are reported
/// together as [`MigrateError::Multiple`] when there is more than one.
pub fn compute_current_state(models: &[ModelSchema]) -> Result<SchemaState> {
    let mut by_table: BTreeMap<String, &ModelSchema> = BTreeMap::new();
    for model in models {
        let table = model.table.trim();
        if table.is_empty() {
            debug!("Skipping model without a table name");
            continue;
        }
        if by_table.insert(table.to_string(), model).is_some() {
            return Err(MigrateError::DuplicateTable(table.to_string()));
        }
    }

    let mut tables = BTreeMap::new();
    let mut errors = Vec::new();
    for (name, model) in &by_table {
        match build_table(name, model) {
            Ok(table) => {
                tables.insert(name.clone(), table);
            }
            Err(e) => errors.push(e),
        }
    }
    match errors.len() {
        0 => {}
        1 => return Err(errors.remove(0)),
        _ => return Err(MigrateError::Multiple(errors)),
    }

    let mut constraints = Vec::new();
    for (name, model) in &by_table {
        let mut relations: Vec<&RelationSchema> = model.relations.iter().collect();
        relations.sort_by(|a, b| a.name.cmp(&b.name));
        for relation in relations {
            if relation.kind == RelationKind::ManyToMany {
                let join = relation.join_table.trim();
                if !join.is_empty() && !tables.contains_key(join) {
                    debug!(table = %join, "Adding join table");
                    tables.insert(join.to_string(), join_table(name, relation, &by_table)?);
                }
            }
            constraints.extend(relation_constraints(name, relation, &by_table)?);
        }
    }

    let mut foreign_keys = collect_foreign_keys(constraints)?;
    for (name, table) in &mut tables {
        if let Some(fks) = foreign_keys.remove(name) {
            table.foreign_keys = fks;
        }
    }
    for table in foreign_keys.keys() {
        debug!(table = %table, "Dropping foreign keys for table outside the schema");
    }

    Ok(SchemaState { tables })
}

/// Builds one table's columns, primary key, and secondary indexes.
fn build_table(name: &str, model: &ModelSchema) -> Result<TableState> {
    let mut table = TableState::new();

    for field in model.fields.iter().filter(|f| !f.ignore) {
        let column = field.column_name();
        if column.is_empty() {
            continue;
        }
        let definition = normalize_definition(&field.definition());
        if definition.is_empty() {
            continue;
        }
        table
            .columns
            .insert(column.to_string(), ColumnState::new(definition));
        if field.primary_key {
            table.primary_keys.push(column.to_string());
        }
    }
    table.primary_keys.sort();

    table.indexes = build_indexes(name, model)?;
    Ok(table)
}

/// Index definition being assembled from one or more field tags.
#[derive(Default)]
struct PendingIndex {
    state: IndexState,
    fields: Vec<(i32, IndexFieldState)>,
}

fn build_indexes(table: &str, model: &ModelSchema) -> Result<BTreeMap<String, IndexState>> {
    let mut pending: BTreeMap<String, PendingIndex> = BTreeMap::new();

    for field in model.fields.iter().filter(|f| !f.ignore) {
        for raw in field.tags.iter().filter(|t| !t.trim().is_empty()) {
            let tag = IndexTag::parse(table, &field.name, field.column_name(), raw)?;
            if tag.name.eq_ignore_ascii_case(PRIMARY_INDEX) {
                continue;
            }
            let entry = pending.entry(tag.name.clone()).or_default();
            merge_tag(&mut entry.state, &tag);
            entry.fields.push((tag.priority(), index_field(field, &tag)));
        }
    }

    let mut indexes = BTreeMap::new();
    for (name, mut index) in pending {
        if !index.state.where_clause.is_empty() {
            return Err(MigrateError::PartialIndex {
                table: table.to_string(),
                index: name,
                predicate: index.state.where_clause,
            });
        }
        // stable: equal priorities keep declaration order
        index.fields.sort_by_key(|(priority, _)| *priority);
        index.state.fields = index
            .fields
            .into_iter()
            .map(|(_, f)| f)
            .filter(|f| !f.column.is_empty() || !f.expression.is_empty())
            .collect();
        if index.state.fields.is_empty() {
            continue;
        }
        indexes.insert(name, index.state);
    }
    Ok(indexes)
}

/// Fills index-level settings the first field to declare them wins.
fn merge_tag(state: &mut IndexState, tag: &IndexTag) {
    fn fill(slot: &mut String, value: &str) {
        if slot.is_empty() {
            *slot = value.trim().to_string();
        }
    }
    fill(&mut state.class, &tag.class());
    fill(&mut state.index_type, tag.setting("TYPE"));
    fill(&mut state.where_clause, tag.setting("WHERE"));
    fill(&mut state.comment, tag.setting("COMMENT"));
    fill(&mut state.option, tag.setting("OPTION"));
}

fn index_field(field: &FieldSchema, tag: &IndexTag) -> IndexFieldState {
    IndexFieldState {
        column: field.column_name().to_string(),
        expression: tag.setting("EXPRESSION").trim().to_string(),
        sort: tag.setting("SORT").trim().to_uppercase(),
        collate: tag.setting("COLLATE").trim().to_string(),
        length: tag.length(),
    }
}

/// Columns `table` is referenced by: explicit `references`, else its primary key.
fn referenced_columns(
    declared: &[String],
    table: &str,
    models: &BTreeMap<String, &ModelSchema>,
) -> Vec<String> {
    if !declared.is_empty() {
        return declared.to_vec();
    }
    models
        .get(table)
        .map(|m| m.primary_keys())
        .unwrap_or_default()
}

fn constraint_name(table: &str, relation: &RelationSchema, fallback: &str) -> Result<String> {
    match &relation.constraint {
        Some(name) if name.trim().is_empty() => Err(MigrateError::UnnamedForeignKey {
            table: table.to_string(),
        }),
        Some(name) => Ok(name.trim().to_string()),
        None => Ok(fallback.to_string()),
    }
}

fn foreign_key(
    table: &str,
    name: &str,
    columns: Vec<String>,
    ref_table: &str,
    ref_columns: Vec<String>,
    relation: &RelationSchema,
) -> Result<ForeignKeyState> {
    let invalid = |reason: &str| MigrateError::InvalidForeignKey {
        table: table.to_string(),
        constraint: name.to_string(),
        reason: reason.to_string(),
    };
    if columns.is_empty() || ref_columns.is_empty() {
        return Err(invalid("has empty key columns"));
    }
    if columns.len() != ref_columns.len() {
        return Err(invalid("has mismatched key columns"));
    }
    if columns.iter().chain(&ref_columns).any(|c| c.trim().is_empty()) {
        return Err(invalid("has empty column names"));
    }
    let mut fk = ForeignKeyState::new(columns, ref_table.trim(), ref_columns);
    if let Some(action) = relation.on_delete {
        fk = fk.on_delete(action.to_sql());
    }
    if let Some(action) = relation.on_update {
        fk = fk.on_update(action.to_sql());
    }
    Ok(normalize_foreign_key(&fk))
}

/// Constraints one relation contributes, tagged with the table that holds them.
fn relation_constraints(
    owner: &str,
    relation: &RelationSchema,
    models: &BTreeMap<String, &ModelSchema>,
) -> Result<Vec<Constraint>> {
    match relation.kind {
        RelationKind::BelongsTo => belongs_to_constraint(owner, relation, models).map(|c| vec![c]),
        RelationKind::HasOne | RelationKind::HasMany => {
            has_constraint(owner, relation, models).map(|c| vec![c])
        }
        RelationKind::ManyToMany => many_to_many_constraints(owner, relation, models),
    }
}

/// The declaring table holds the constraint and references the target.
fn belongs_to_constraint(
    owner: &str,
    relation: &RelationSchema,
    models: &BTreeMap<String, &ModelSchema>,
) -> Result<Constraint> {
    let target = relation.target.trim();
    let name = constraint_name(owner, relation, &format!("fk_{owner}_{}", relation.name))?;
    if let Some(model) = models.get(owner) {
        if let Some(column) = relation
            .foreign_key
            .iter()
            .find(|c| model.get_field(c.trim()).is_none())
        {
            return Err(MigrateError::UnknownColumn {
                table: owner.to_string(),
                column: column.clone(),
            });
        }
    }
    let fk = foreign_key(
        owner,
        &name,
        relation.foreign_key.clone(),
        target,
        referenced_columns(&relation.references, target, models),
        relation,
    )?;
    Ok(Constraint {
        table: owner.to_string(),
        name,
        fk,
    })
}

/// The target table holds the constraint and references the declaring table.
fn has_constraint(
    owner: &str,
    relation: &RelationSchema,
    models: &BTreeMap<String, &ModelSchema>,
) -> Result<Constraint> {
    let target = relation.target.trim();
    let name = constraint_name(target, relation, &format!("fk_{owner}_{}", relation.name))?;
    let fk = foreign_key(
        target,
        &name,
        relation.foreign_key.clone(),
        owner,
        referenced_columns(&relation.references, owner, models),
        relation,
    )?;
    Ok(Constraint {
        table: target.to_string(),
        name,
        fk,
    })
}

/// One side of a many-to-many join table.
struct JoinSide {
    /// Referenced table.
    table: String,
    /// Referenced columns, the table's primary key.
    refs: Vec<String>,
    /// Join table columns pointing at `refs`.
    columns: Vec<String>,
    /// Constraint name on the join table.
    constraint: String,
}

/// Resolves both sides of a many-to-many relation, owner first.
///
/// Join columns default to `<table>_<key>`. A relation from a table to
/// itself would produce the same names twice, so its target side uses
/// `<relation>_<key>` instead. The owner-side constraint is always
/// `fk_<join>_<owner>`; the target-side one is `fk_<join>_<relation>` unless
/// the relation names its constraint explicitly.
fn join_sides(
    owner: &str,
    relation: &RelationSchema,
    models: &BTreeMap<String, &ModelSchema>,
) -> Result<(String, [JoinSide; 2])> {
    let join = relation.join_table.trim();
    let invalid = |reason: String| MigrateError::InvalidForeignKey {
        table: if join.is_empty() { owner } else { join }.to_string(),
        constraint: relation.name.clone(),
        reason,
    };
    if join.is_empty() {
        return Err(invalid("has no join table".to_string()));
    }

    let target = relation.target.trim();
    let target_prefix = if target == owner {
        relation.name.trim()
    } else {
        target
    };
    let side = |table: &str, prefix: &str, declared: &[String], constraint: String| {
        if !models.contains_key(table) {
            return Err(invalid(format!("references unknown table `{table}`")));
        }
        let refs = referenced_columns(&[], table, models);
        let columns: Vec<String> = if declared.is_empty() {
            refs.iter().map(|c| format!("{prefix}_{c}")).collect()
        } else {
            declared.iter().map(|c| c.trim().to_string()).collect()
        };
        Ok(JoinSide {
            table: table.to_string(),
            refs,
            columns,
            constraint,
        })
    };

    let owner_side = side(
        owner,
        owner,
        &relation.join_foreign_key,
        format!("fk_{join}_{owner}"),
    )?;
    let target_side = side(
        target,
        target_prefix,
        &relation.join_references,
        constraint_name(join, relation, &format!("fk_{join}_{}", relation.name))?,
    )?;

    if owner_side
        .columns
        .iter()
        .any(|c| target_side.columns.contains(c))
    {
        return Err(invalid("has overlapping join columns".to_string()));
    }
    if owner_side.constraint == target_side.constraint {
        return Err(MigrateError::ConflictingForeignKey {
            table: join.to_string(),
            constraint: owner_side.constraint,
        });
    }
    Ok((join.to_string(), [owner_side, target_side]))
}

/// Both join table constraints of a many-to-many relation.
fn many_to_many_constraints(
    owner: &str,
    relation: &RelationSchema,
    models: &BTreeMap<String, &ModelSchema>,
) -> Result<Vec<Constraint>> {
    let (join, sides) = join_sides(owner, relation, models)?;
    sides
        .into_iter()
        .map(|side| -> Result<Constraint> {
            let fk = foreign_key(
                &join,
                &side.constraint,
                side.columns,
                &side.table,
                side.refs,
                relation,
            )?;
            Ok(Constraint {
                table: join.clone(),
                name: side.constraint,
                fk,
            })
        })
        .collect()
}

/// Synthesizes a many-to-many join table: one column per referenced key
/// on each side, typed like the referenced column and NOT NULL, with a
/// composite primary key over all of them.
fn join_table(
    owner: &str,
    relation: &RelationSchema,
    models: &BTreeMap<String, &ModelSchema>,
) -> Result<TableState> {
    let (_, sides) = join_sides(owner, relation, models)?;
    let mut table = TableState::new();

    for side in &sides {
        let Some(model) = models.get(&side.table) else {
            continue;
        };
        for (reference, column) in side.refs.iter().zip(&side.columns) {
            let field = model
                .get_field(reference)
                .ok_or_else(|| MigrateError::UnknownColumn {
                    table: side.table.clone(),
                    column: reference.clone(),
                })?;
            let definition = normalize_definition(&format!("{} NOT NULL", field.data_type));
            table = table.column(column.clone(), definition);
            table.primary_keys.push(column.clone());
        }
    }
    table.primary_keys.sort();
    Ok(table)
}

/// Groups constraints by table, deduplicating structurally equal ones.
///
/// Of two constraints with the same signature the lexicographically smaller
/// name is kept. Two constraints with the same name and different
/// definitions are an error.
fn collect_foreign_keys(
    constraints: Vec<Constraint>,
) -> Result<BTreeMap<String, BTreeMap<String, ForeignKeyState>>> {
    let mut by_table: BTreeMap<String, BTreeMap<String, ForeignKeyState>> = BTreeMap::new();
    let mut signatures: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();

    for Constraint { table, name, fk } in constraints {
        let fks = by_table.entry(table.clone()).or_default();
        let seen = signatures.entry(table.clone()).or_default();
        let signature = foreign_key_signature(&fk);

        if let Some(existing) = seen.get(&signature).cloned() {
            if name < existing {
                debug!(
                    table = %table,
                    kept = %name,
                    dropped = %existing,
                    "Deduplicated foreign key"
                );
                fks.remove(&existing);
                fks.insert(name.clone(), fk);
                seen.insert(signature, name);
            }
            continue;
        }

        if let Some(existing) = fks.get(&name) {
            if *existing != fk {
                return Err(MigrateError::ConflictingForeignKey {
                    table,
                    constraint: name,
                });
            }
            continue;
        }

        fks.insert(name.clone(), fk);
        seen.insert(signature, name);
    }
    Ok(by_table)
}
