//! Structural diff of two schema snapshots.
//!
//! A [`DiffSession`] runs two passes: upgrade (old → new) and downgrade
//! (new → old). The passes share the session's rename memo, so a rename
//! confirmed on the upgrade pass is replayed, never re-asked, on the downgrade
//! pass. Each pass keeps its own join-table dedup set because a many-to-many
//! relation is visible from both related entities.
//!
//! # Limitations
//!
//! Generated index and foreign key names are derived from the table and
//! column names at the time they are created. Renaming a table, or renaming
//! an indexed or unique column, leaves the existing index under its old
//! generated name. A later change to that index looks it up by the new
//! name, so such renames are best followed by dropping and recreating the
//! index by hand.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::dialect::{self, index_name, Dialect, MigrationDialect};
use crate::error::{MigrateError, Result};
use crate::operations::{MigrationOperation, OperationKind};
use crate::resolver::{ConfirmRename, RenameResolver};
use crate::schema::{
    ColumnDescriptor, EntityDescriptor, ForeignKeyDescriptor, IndexDescriptor,
    ManyToManyDescriptor, SchemaSnapshot,
};
use crate::sequencer::OperationSequencer;

/// Direction of a diff pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Old snapshot to new snapshot.
    Upgrade,
    /// New snapshot back to old snapshot.
    Downgrade,
}

/// Options for the diff engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffOptions {
    /// Dialect to render operations for.
    #[serde(default)]
    pub dialect: Dialect,
    /// MySQL server version; `5.x` renders renames with `CHANGE`.
    #[serde(default)]
    pub mysql_server_version: Option<String>,
}

impl DiffOptions {
    /// Creates options for `dialect`.
    #[must_use]
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            mysql_server_version: None,
        }
    }

    /// Sets the MySQL server version.
    #[must_use]
    pub fn mysql_server_version(mut self, version: impl Into<String>) -> Self {
        self.mysql_server_version = Some(version.into());
        self
    }
}

/// Sequenced operations of both passes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationDiff {
    /// Operations turning the old schema into the new one.
    pub upgrade: Vec<MigrationOperation>,
    /// Operations turning the new schema back into the old one.
    pub downgrade: Vec<MigrationOperation>,
}

impl MigrationDiff {
    /// Returns true if neither pass produced an operation.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.upgrade.is_empty() && self.downgrade.is_empty()
    }
}

/// Compares snapshots and produces dialect-rendered operations.
///
/// The engine holds no per-diff state and can be reused; every diff runs in a
/// fresh [`DiffSession`].
#[derive(Debug, Clone, Default)]
pub struct DiffEngine {
    options: DiffOptions,
}

impl DiffEngine {
    /// Creates an engine.
    #[must_use]
    pub fn new(options: DiffOptions) -> Self {
        Self { options }
    }

    /// Returns the engine options.
    #[must_use]
    pub fn options(&self) -> &DiffOptions {
        &self.options
    }

    /// Starts a session whose rename decisions come from `confirmer`.
    pub fn session<'a>(&self, confirmer: &'a mut dyn ConfirmRename) -> DiffSession<'a> {
        DiffSession {
            adapter: dialect::adapter(
                self.options.dialect,
                self.options.mysql_server_version.as_deref(),
            ),
            resolver: RenameResolver::new(confirmer),
            sequencer: OperationSequencer::new(),
            upgrade_join_tables: BTreeSet::new(),
            downgrade_join_tables: BTreeSet::new(),
        }
    }

    /// Diffs `old` against `new` in a fresh session.
    pub fn diff(
        &self,
        old: &SchemaSnapshot,
        new: &SchemaSnapshot,
        confirmer: &mut dyn ConfirmRename,
    ) -> Result<MigrationDiff> {
        self.session(confirmer).run(old, new)
    }
}

/// State of one diff invocation: the rename memo and the join-table dedup
/// sets. Consumed by [`DiffSession::run`].
pub struct DiffSession<'a> {
    adapter: Box<dyn MigrationDialect>,
    resolver: RenameResolver<'a>,
    sequencer: OperationSequencer,
    upgrade_join_tables: BTreeSet<String>,
    downgrade_join_tables: BTreeSet<String>,
}

impl DiffSession<'_> {
    /// Returns the dialect the session renders for.
    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.adapter.dialect()
    }

    /// Validates both snapshots and runs the upgrade pass followed by the
    /// downgrade pass. Any unsupported operation aborts the whole diff.
    pub fn run(mut self, old: &SchemaSnapshot, new: &SchemaSnapshot) -> Result<MigrationDiff> {
        old.validate()?;
        new.validate()?;

        let result = self.run_passes(old, new);
        match &result {
            Ok(diff) => info!(
                dialect = %self.dialect(),
                upgrade = diff.upgrade.len(),
                downgrade = diff.downgrade.len(),
                "Diff complete"
            ),
            Err(MigrateError::UnsupportedOperation { dialect, operation }) => {
                warn!(%dialect, %operation, "Aborting diff on unsupported operation");
            }
            Err(_) => {}
        }
        result
    }

    fn run_passes(&mut self, old: &SchemaSnapshot, new: &SchemaSnapshot) -> Result<MigrationDiff> {
        let upgrade = self.pass(Direction::Upgrade, old, new)?;
        let downgrade = self.pass(Direction::Downgrade, new, old)?;
        Ok(MigrationDiff { upgrade, downgrade })
    }

    fn pass(
        &mut self,
        direction: Direction,
        source: &SchemaSnapshot,
        target: &SchemaSnapshot,
    ) -> Result<Vec<MigrationOperation>> {
        debug!(?direction, "Starting diff pass");
        let mut ops = Vec::new();

        let created = dependency_order(
            target,
            target
                .entities
                .keys()
                .filter(|name| !source.entities.contains_key(*name))
                .map(String::as_str)
                .collect(),
        );
        match direction {
            Direction::Upgrade => {
                for entity in created {
                    self.create_entity(direction, entity, target, &mut ops)?;
                }
            }
            // The old definition of an entity dropped since OLD is not
            // reconstructed on the downgrade pass.
            Direction::Downgrade if !created.is_empty() => {
                debug!(
                    entities = created.len(),
                    "Entities dropped since the old snapshot are not recreated"
                );
            }
            Direction::Downgrade => {}
        }

        for (name, new_entity) in &target.entities {
            if let Some(old_entity) = source.get(name) {
                self.diff_entity(direction, old_entity, new_entity, source, target, &mut ops)?;
            }
        }

        let mut dropped = dependency_order(
            source,
            source
                .entities
                .keys()
                .filter(|name| !target.entities.contains_key(*name))
                .map(String::as_str)
                .collect(),
        );
        dropped.reverse();
        for entity in dropped {
            self.drop_entity(direction, entity, &mut ops)?;
        }

        let ops = self.sequencer.sequence(ops);
        debug!(?direction, operations = ops.len(), "Finished diff pass");
        Ok(ops)
    }

    fn claim_join_table(&mut self, direction: Direction, through: &str) -> bool {
        let seen = match direction {
            Direction::Upgrade => &mut self.upgrade_join_tables,
            Direction::Downgrade => &mut self.downgrade_join_tables,
        };
        seen.insert(through.to_string())
    }

    // ========================================================================
    // Entities
    // ========================================================================

    fn create_entity(
        &mut self,
        direction: Direction,
        entity: &EntityDescriptor,
        target: &SchemaSnapshot,
        ops: &mut Vec<MigrationOperation>,
    ) -> Result<()> {
        ops.push(MigrationOperation::immediate(
            OperationKind::CreateTable {
                table: entity.table.clone(),
            },
            self.adapter.create_table(entity, target)?,
        ));
        for m2m in &entity.many_to_many {
            self.create_join_table(direction, m2m, target, ops)?;
        }
        Ok(())
    }

    fn drop_entity(
        &mut self,
        direction: Direction,
        entity: &EntityDescriptor,
        ops: &mut Vec<MigrationOperation>,
    ) -> Result<()> {
        for m2m in &entity.many_to_many {
            self.drop_join_table(direction, &m2m.through, ops)?;
        }
        ops.push(MigrationOperation::immediate(
            OperationKind::DropTable {
                table: entity.table.clone(),
            },
            [self.adapter.drop_table(&entity.table)?],
        ));
        Ok(())
    }

    fn create_join_table(
        &mut self,
        direction: Direction,
        m2m: &ManyToManyDescriptor,
        target: &SchemaSnapshot,
        ops: &mut Vec<MigrationOperation>,
    ) -> Result<()> {
        if !self.claim_join_table(direction, &m2m.through) {
            return Ok(());
        }
        ops.push(MigrationOperation::deferred(
            OperationKind::CreateJoinTable {
                table: m2m.through.clone(),
            },
            self.adapter.create_join_table(m2m, target)?,
        ));
        Ok(())
    }

    fn drop_join_table(
        &mut self,
        direction: Direction,
        through: &str,
        ops: &mut Vec<MigrationOperation>,
    ) -> Result<()> {
        if !self.claim_join_table(direction, through) {
            return Ok(());
        }
        ops.push(MigrationOperation::deferred(
            OperationKind::DropJoinTable {
                table: through.to_string(),
            },
            [self.adapter.drop_join_table(through)?],
        ));
        Ok(())
    }

    fn diff_entity(
        &mut self,
        direction: Direction,
        old: &EntityDescriptor,
        new: &EntityDescriptor,
        source: &SchemaSnapshot,
        target: &SchemaSnapshot,
        ops: &mut Vec<MigrationOperation>,
    ) -> Result<()> {
        // Deferred destructive operations run before everything else in the
        // pass and address the table by its source name.
        let tables = Tables {
            source: &old.table,
            target: &new.table,
        };

        if tables.source != tables.target {
            ops.push(MigrationOperation::immediate(
                OperationKind::RenameTable {
                    from: old.table.clone(),
                    to: new.table.clone(),
                },
                [self.adapter.rename_table(tables.source, tables.target)?],
            ));
        }

        let old_indexes = old.index_set();
        let new_indexes = new.index_set();
        for index in old_indexes.difference(&new_indexes) {
            ops.push(self.drop_index_op(tables.source, index)?);
        }
        for index in new_indexes.difference(&old_indexes) {
            ops.push(self.add_index_op(tables.target, index)?);
        }

        if old.primary_key.db_column != new.primary_key.db_column {
            ops.push(self.rename_op(tables.target, &old.primary_key, &new.primary_key)?);
        }

        let old_m2m: BTreeMap<&str, &ManyToManyDescriptor> = old
            .many_to_many
            .iter()
            .map(|m| (m.through.as_str(), m))
            .collect();
        let new_m2m: BTreeMap<&str, &ManyToManyDescriptor> = new
            .many_to_many
            .iter()
            .map(|m| (m.through.as_str(), m))
            .collect();
        for (through, m2m) in &new_m2m {
            if !old_m2m.contains_key(through) {
                self.create_join_table(direction, m2m, target, ops)?;
            }
        }
        for through in old_m2m.keys() {
            if !new_m2m.contains_key(through) {
                self.drop_join_table(direction, through, ops)?;
            }
        }

        self.diff_columns(direction, old, new, tables, ops)?;
        self.diff_foreign_keys(old, new, source, target, tables, ops)
    }

    // ========================================================================
    // Columns
    // ========================================================================

    fn diff_columns(
        &mut self,
        direction: Direction,
        old: &EntityDescriptor,
        new: &EntityDescriptor,
        tables: Tables<'_>,
        ops: &mut Vec<MigrationOperation>,
    ) -> Result<()> {
        let removed: Vec<&ColumnDescriptor> = old
            .columns
            .iter()
            .filter(|c| new.get_column(&c.name).is_none())
            .collect();
        let added: Vec<&ColumnDescriptor> = new
            .columns
            .iter()
            .filter(|c| old.get_column(&c.name).is_none())
            .collect();
        let mut claimed: HashSet<&str> = HashSet::new();

        for &column in &added {
            // Only the logical name changed: nothing to rename physically.
            let same_column = removed
                .iter()
                .copied()
                .find(|c| !claimed.contains(c.name.as_str()) && c.db_column == column.db_column);
            if let Some(previous) = same_column {
                claimed.insert(previous.name.as_str());
                self.diff_column(previous, column, tables, ops)?;
                continue;
            }

            // The downgrade pass renames back whichever column the upgrade
            // pass confirmed. Otherwise the first structural match wins, in
            // declaration order.
            let replayed = match direction {
                Direction::Upgrade => None,
                Direction::Downgrade => self
                    .resolver
                    .renamed_to(&new.name, &column.name)
                    .and_then(|renamed| {
                        removed
                            .iter()
                            .copied()
                            .find(|c| !claimed.contains(c.name.as_str()) && c.name == renamed)
                    }),
            };
            let candidate = replayed.or_else(|| {
                removed
                    .iter()
                    .copied()
                    .find(|c| !claimed.contains(c.name.as_str()) && c.same_shape(column))
            });
            if let Some(previous) = candidate {
                if self
                    .resolver
                    .confirm(direction, &new.name, &previous.name, &column.name)
                {
                    claimed.insert(previous.name.as_str());
                    ops.push(self.rename_op(tables.target, previous, column)?);
                    continue;
                }
            }

            ops.push(MigrationOperation::immediate(
                OperationKind::AddColumn {
                    table: tables.target.to_string(),
                    column: column.db_column.clone(),
                },
                self.adapter.add_column(tables.target, column)?,
            ));
            if let Some(index) = column.implied_index() {
                ops.push(self.add_index_op(tables.target, &index)?);
            }
        }

        for &column in &removed {
            if claimed.contains(column.name.as_str()) {
                continue;
            }
            ops.push(MigrationOperation::immediate(
                OperationKind::DropColumn {
                    table: tables.target.to_string(),
                    column: column.db_column.clone(),
                },
                [self.adapter.drop_column(tables.target, &column.db_column)?],
            ));
            if let Some(index) = column.implied_index() {
                ops.push(self.drop_index_op(tables.source, &index)?);
            }
        }

        for column in &new.columns {
            if let Some(previous) = old.get_column(&column.name) {
                self.diff_column(previous, column, tables, ops)?;
            }
        }
        Ok(())
    }

    fn diff_column(
        &self,
        old: &ColumnDescriptor,
        new: &ColumnDescriptor,
        tables: Tables<'_>,
        ops: &mut Vec<MigrationOperation>,
    ) -> Result<()> {
        let table = tables.target;
        let column_kind = |make: fn(String, String) -> OperationKind| {
            make(table.to_string(), new.db_column.clone())
        };

        if old.db_column != new.db_column {
            ops.push(self.rename_op(table, old, new)?);
        }

        let old_index = old.implied_index();
        let new_index = new.implied_index();
        if old_index != new_index {
            if let Some(index) = &old_index {
                ops.push(self.drop_index_op(tables.source, index)?);
            }
            if let Some(index) = &new_index {
                ops.push(self.add_index_op(table, index)?);
            }
        }

        if old.default != new.default && !old.default.is_callable() && !new.default.is_callable()
        {
            ops.push(MigrationOperation::immediate(
                column_kind(|table, column| OperationKind::AlterDefault { table, column }),
                [self.adapter.alter_default(table, new)?],
            ));
        }

        if old.nullable != new.nullable {
            ops.push(MigrationOperation::immediate(
                column_kind(|table, column| OperationKind::AlterNullability { table, column }),
                [self.adapter.alter_nullability(table, new)?],
            ));
        }

        if old.description != new.description {
            ops.push(MigrationOperation::immediate(
                column_kind(|table, column| OperationKind::SetComment { table, column }),
                [self.adapter.set_comment(table, new)?],
            ));
        }

        let dialect = self.dialect();
        if old.kind != new.kind
            || old.physical_type.for_dialect(dialect) != new.physical_type.for_dialect(dialect)
        {
            ops.push(MigrationOperation::immediate(
                column_kind(|table, column| OperationKind::ModifyColumn { table, column }),
                [self.adapter.modify_column(table, new)?],
            ));
        }
        Ok(())
    }

    fn rename_op(
        &self,
        table: &str,
        old: &ColumnDescriptor,
        new: &ColumnDescriptor,
    ) -> Result<MigrationOperation> {
        let sql = self.adapter.rename_column(table, &old.db_column, new)?;
        let kind = if self.adapter.supports_native_rename() {
            OperationKind::RenameColumn {
                table: table.to_string(),
                from: old.db_column.clone(),
                to: new.db_column.clone(),
            }
        } else {
            OperationKind::ModifyColumn {
                table: table.to_string(),
                column: new.db_column.clone(),
            }
        };
        Ok(MigrationOperation::immediate(kind, [sql]))
    }

    fn add_index_op(&self, table: &str, index: &IndexDescriptor) -> Result<MigrationOperation> {
        Ok(MigrationOperation::deferred(
            OperationKind::AddIndex {
                table: table.to_string(),
                name: index_name(table, index),
            },
            [self.adapter.add_index(table, index)?],
        ))
    }

    fn drop_index_op(&self, table: &str, index: &IndexDescriptor) -> Result<MigrationOperation> {
        Ok(MigrationOperation::deferred(
            OperationKind::DropIndex {
                table: table.to_string(),
                name: index_name(table, index),
            },
            [self.adapter.drop_index(table, index)?],
        ))
    }

    // ========================================================================
    // Foreign keys
    // ========================================================================

    fn diff_foreign_keys(
        &self,
        old: &EntityDescriptor,
        new: &EntityDescriptor,
        source: &SchemaSnapshot,
        target: &SchemaSnapshot,
        tables: Tables<'_>,
        ops: &mut Vec<MigrationOperation>,
    ) -> Result<()> {
        let old_fks: BTreeMap<&str, &ForeignKeyDescriptor> = old
            .foreign_keys
            .iter()
            .map(|fk| (fk.source_column.as_str(), fk))
            .collect();
        let new_fks: BTreeMap<&str, &ForeignKeyDescriptor> = new
            .foreign_keys
            .iter()
            .map(|fk| (fk.source_column.as_str(), fk))
            .collect();

        for (column, old_fk) in &old_fks {
            let changed = match new_fks.get(column) {
                Some(new_fk) => fk_changed(old_fk, new_fk, source, target)?,
                None => true,
            };
            if changed && old_fk.db_constraint {
                let target_table = source.table_of(&old_fk.target_entity)?;
                ops.push(MigrationOperation::deferred(
                    OperationKind::DropForeignKey {
                        table: tables.source.to_string(),
                        name: dialect::foreign_key_name(tables.source, old_fk, target_table),
                    },
                    [self.adapter.drop_foreign_key(tables.source, old_fk, target_table)?],
                ));
            }
        }

        for (column, new_fk) in &new_fks {
            let changed = match old_fks.get(column) {
                Some(old_fk) => fk_changed(old_fk, new_fk, source, target)?,
                None => true,
            };
            if changed && new_fk.db_constraint {
                let target_table = target.table_of(&new_fk.target_entity)?;
                ops.push(MigrationOperation::deferred(
                    OperationKind::AddForeignKey {
                        table: tables.target.to_string(),
                        name: dialect::foreign_key_name(tables.target, new_fk, target_table),
                    },
                    [self.adapter.add_foreign_key(tables.target, new_fk, target_table)?],
                ));
            }
        }
        Ok(())
    }
}

/// Table names of an entity on both sides of a pass.
#[derive(Debug, Clone, Copy)]
struct Tables<'t> {
    source: &'t str,
    target: &'t str,
}

fn fk_changed(
    old: &ForeignKeyDescriptor,
    new: &ForeignKeyDescriptor,
    source: &SchemaSnapshot,
    target: &SchemaSnapshot,
) -> Result<bool> {
    Ok(source.table_of(&old.target_entity)? != target.table_of(&new.target_entity)?
        || old.target_column != new.target_column
        || old.on_delete != new.on_delete
        || old.db_constraint != new.db_constraint)
}

/// Orders `names` so that entities referenced by foreign keys come before the
/// entities referencing them. Members of a cycle follow in name order.
fn dependency_order<'s>(
    snapshot: &'s SchemaSnapshot,
    names: BTreeSet<&'s str>,
) -> Vec<&'s EntityDescriptor> {
    let mut in_degree: BTreeMap<&str, usize> = names.iter().map(|name| (*name, 0)).collect();
    let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

    for name in &names {
        let Some(entity) = snapshot.get(name) else {
            continue;
        };
        let targets: BTreeSet<&str> = entity
            .foreign_keys
            .iter()
            .map(|fk| fk.target_entity.as_str())
            .filter(|target| target != name && names.contains(target))
            .collect();
        for target in targets {
            *in_degree.entry(name).or_insert(0) += 1;
            dependents.entry(target).or_default().push(name);
        }
    }

    // Kahn's algorithm for topological sort
    let mut queue: VecDeque<&str> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(name, _)| *name)
        .collect();
    let mut ordered: Vec<&str> = Vec::with_capacity(names.len());

    while let Some(name) = queue.pop_front() {
        ordered.push(name);
        if let Some(children) = dependents.get(name) {
            for child in children {
                if let Some(degree) = in_degree.get_mut(child) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(child);
                    }
                }
            }
        }
    }

    if ordered.len() != names.len() {
        let placed: HashSet<&str> = ordered.iter().copied().collect();
        let cyclic: Vec<&str> = names
            .iter()
            .copied()
            .filter(|name| !placed.contains(name))
            .collect();
        ordered.extend(cyclic);
    }

    ordered
        .into_iter()
        .filter_map(|name| snapshot.get(name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{AlwaysRename, NeverRename};
    use crate::schema::{int, varchar, ForeignKeyAction, JoinLeg, PhysicalType};

    fn user() -> EntityDescriptor {
        EntityDescriptor::new("models.User", "user", int("id").generated())
            .column(varchar("username", 20).unique())
    }

    fn engine(dialect: Dialect) -> DiffEngine {
        DiffEngine::new(DiffOptions::new(dialect))
    }

    fn kinds(ops: &[MigrationOperation]) -> Vec<&'static str> {
        ops.iter().map(|op| op.kind.name()).collect()
    }

    #[test]
    fn test_identical_snapshots_produce_nothing() {
        let snapshot = SchemaSnapshot::new().with_entity(user());
        let diff = engine(Dialect::MySql)
            .diff(&snapshot, &snapshot, &mut AlwaysRename)
            .unwrap();
        assert!(diff.is_empty());
    }

    #[test]
    fn test_invalid_snapshot_fails_before_diffing() {
        let good = SchemaSnapshot::new().with_entity(user());
        let bad = SchemaSnapshot::new().with_entity(
            user().foreign_key(ForeignKeyDescriptor::new("x", "missing_id", "models.User")),
        );
        let err = engine(Dialect::Postgres)
            .diff(&good, &bad, &mut AlwaysRename)
            .unwrap_err();
        assert!(matches!(err, MigrateError::InvalidSnapshot(_)));
    }

    #[test]
    fn test_created_entities_follow_fk_dependencies() {
        let old = SchemaSnapshot::new();
        let new = SchemaSnapshot::new()
            .with_entity(
                EntityDescriptor::new("models.Author", "author", int("id").generated())
                    .column(int("zone_id"))
                    .foreign_key(ForeignKeyDescriptor::new("zone", "zone_id", "models.Zone")),
            )
            .with_entity(EntityDescriptor::new("models.Zone", "zone", int("id").generated()));
        let diff = engine(Dialect::Postgres)
            .diff(&old, &new, &mut AlwaysRename)
            .unwrap();
        let tables: Vec<_> = diff.upgrade.iter().map(|op| op.kind.table()).collect();
        assert_eq!(tables, vec!["zone", "author"]);
        let tables: Vec<_> = diff.downgrade.iter().map(|op| op.kind.table()).collect();
        assert_eq!(tables, vec!["author", "zone"]);
    }

    #[test]
    fn test_dropped_entity_not_recreated_on_downgrade() {
        let old = SchemaSnapshot::new()
            .with_entity(user())
            .with_entity(EntityDescriptor::new("models.Tag", "tag", int("id").generated()));
        let new = SchemaSnapshot::new().with_entity(user());
        let diff = engine(Dialect::MySql)
            .diff(&old, &new, &mut AlwaysRename)
            .unwrap();
        assert_eq!(kinds(&diff.upgrade), vec!["DropTable"]);
        assert!(diff.downgrade.is_empty());
    }

    #[test]
    fn test_table_rename() {
        let old = SchemaSnapshot::new().with_entity(user());
        let mut renamed = user();
        renamed.table = "account".to_string();
        let new = SchemaSnapshot::new().with_entity(renamed);
        let diff = engine(Dialect::Postgres)
            .diff(&old, &new, &mut AlwaysRename)
            .unwrap();
        assert_eq!(
            diff.upgrade[0].sql(),
            "ALTER TABLE \"user\" RENAME TO \"account\""
        );
        assert_eq!(
            diff.downgrade[0].sql(),
            "ALTER TABLE \"account\" RENAME TO \"user\""
        );
    }

    #[test]
    fn test_logical_rename_without_physical_change_is_silent() {
        let old = SchemaSnapshot::new().with_entity(user());
        let new = SchemaSnapshot::new().with_entity(
            EntityDescriptor::new("models.User", "user", int("id").generated())
                .column(varchar("login", 20).unique().db_column("username")),
        );
        let mut asked = false;
        let mut confirmer = |_: &str| {
            asked = true;
            true
        };
        let diff = engine(Dialect::MySql)
            .diff(&old, &new, &mut confirmer)
            .unwrap();
        assert!(diff.is_empty());
        assert!(!asked);
    }

    #[test]
    fn test_column_changes_emit_alterations() {
        let old = SchemaSnapshot::new().with_entity(
            user().column(varchar("email", 100)),
        );
        let new = SchemaSnapshot::new().with_entity(
            user().column(varchar("email", 200).nullable().description("Contact")),
        );
        let diff = engine(Dialect::Postgres)
            .diff(&old, &new, &mut NeverRename)
            .unwrap();
        assert_eq!(
            kinds(&diff.upgrade),
            vec!["AlterNullability", "SetComment", "ModifyColumn"]
        );
        assert_eq!(
            diff.upgrade[2].sql(),
            "ALTER TABLE \"user\" ALTER COLUMN \"email\" TYPE VARCHAR(200) USING \"email\"::VARCHAR(200)"
        );
        assert_eq!(
            diff.downgrade[0].sql(),
            "ALTER TABLE \"user\" ALTER COLUMN \"email\" SET NOT NULL"
        );
    }

    #[test]
    fn test_callable_default_changes_are_ignored() {
        use crate::schema::{ColumnDefault, LiteralValue};
        let old = SchemaSnapshot::new().with_entity(
            user().column(varchar("token", 36).default_value(ColumnDefault::Callable("uuid4".into()))),
        );
        let new = SchemaSnapshot::new().with_entity(
            user().column(
                varchar("token", 36)
                    .default_value(ColumnDefault::Literal(LiteralValue::String("x".into()))),
            ),
        );
        let diff = engine(Dialect::MySql)
            .diff(&old, &new, &mut NeverRename)
            .unwrap();
        assert!(diff.is_empty());
    }

    #[test]
    fn test_index_flag_flip_adds_and_drops_index() {
        let old = SchemaSnapshot::new().with_entity(user().column(varchar("email", 200)));
        let new = SchemaSnapshot::new().with_entity(user().column(varchar("email", 200).unique()));
        let diff = engine(Dialect::MySql)
            .diff(&old, &new, &mut NeverRename)
            .unwrap();
        assert_eq!(
            diff.upgrade,
            vec![MigrationOperation::deferred(
                OperationKind::AddIndex {
                    table: "user".into(),
                    name: "uid_user_email_1b4f1c".into(),
                },
                ["ALTER TABLE `user` ADD UNIQUE INDEX `uid_user_email_1b4f1c` (`email`)"],
            )]
        );
        assert_eq!(
            diff.downgrade[0].sql(),
            "ALTER TABLE `user` DROP INDEX `uid_user_email_1b4f1c`"
        );
    }

    #[test]
    fn test_foreign_key_target_change_drops_and_readds() {
        let base = SchemaSnapshot::new()
            .with_entity(user())
            .with_entity(EntityDescriptor::new("models.Team", "team", int("id").generated()));
        let old = base.clone().with_entity(
            EntityDescriptor::new("models.Post", "post", int("id").generated())
                .column(int("owner_id"))
                .foreign_key(ForeignKeyDescriptor::new("owner", "owner_id", "models.User")),
        );
        let new = base.with_entity(
            EntityDescriptor::new("models.Post", "post", int("id").generated())
                .column(int("owner_id"))
                .foreign_key(
                    ForeignKeyDescriptor::new("owner", "owner_id", "models.Team")
                        .on_delete(ForeignKeyAction::Cascade),
                ),
        );
        let diff = engine(Dialect::Postgres)
            .diff(&old, &new, &mut NeverRename)
            .unwrap();
        assert_eq!(kinds(&diff.upgrade), vec!["DropForeignKey", "AddForeignKey"]);
        assert!(diff.upgrade[1].sql().contains("REFERENCES \"team\""));
    }

    #[test]
    fn test_unenforced_foreign_key_emits_nothing() {
        let old = SchemaSnapshot::new().with_entity(user()).with_entity(
            EntityDescriptor::new("models.Post", "post", int("id").generated())
                .column(int("owner_id")),
        );
        let new = SchemaSnapshot::new().with_entity(user()).with_entity(
            EntityDescriptor::new("models.Post", "post", int("id").generated())
                .column(int("owner_id"))
                .foreign_key(
                    ForeignKeyDescriptor::new("owner", "owner_id", "models.User")
                        .without_constraint(),
                ),
        );
        let diff = engine(Dialect::Sqlite)
            .diff(&old, &new, &mut NeverRename)
            .unwrap();
        assert!(diff.is_empty());
    }

    #[test]
    fn test_join_table_constraint_flag_is_ignored() {
        let leg = |column: &str, entity: &str| JoinLeg::new(column, PhysicalType::new("INT"), entity);
        let group = |db_constraint: bool| {
            let mut m2m = ManyToManyDescriptor::new(
                "group_user",
                leg("user_id", "models.User"),
                leg("group_id", "models.Group"),
            );
            m2m.db_constraint = db_constraint;
            EntityDescriptor::new("models.Group", "group", int("id").generated()).many_to_many(m2m)
        };
        let old = SchemaSnapshot::new().with_entity(user()).with_entity(group(true));
        let new = SchemaSnapshot::new().with_entity(user()).with_entity(group(false));
        let diff = engine(Dialect::MySql)
            .diff(&old, &new, &mut NeverRename)
            .unwrap();
        assert!(diff.is_empty());
    }

    #[test]
    fn test_legacy_mysql_rename_is_tagged_modify() {
        let old = SchemaSnapshot::new().with_entity(user().column(varchar("name", 200).nullable()));
        let new =
            SchemaSnapshot::new().with_entity(user().column(varchar("title", 200).nullable()));
        let diff = DiffEngine::new(DiffOptions::new(Dialect::MySql).mysql_server_version("5.7.40"))
            .diff(&old, &new, &mut AlwaysRename)
            .unwrap();
        assert_eq!(kinds(&diff.upgrade), vec!["ModifyColumn"]);
        assert_eq!(
            diff.upgrade[0].sql(),
            "ALTER TABLE `user` CHANGE `name` `title` VARCHAR(200)"
        );
        assert_eq!(
            diff.downgrade[0].sql(),
            "ALTER TABLE `user` CHANGE `title` `name` VARCHAR(200)"
        );
    }

    #[test]
    fn test_first_structural_match_wins() {
        let old = SchemaSnapshot::new().with_entity(
            user()
                .column(varchar("first", 50).nullable())
                .column(varchar("second", 50).nullable()),
        );
        let new = SchemaSnapshot::new().with_entity(user().column(varchar("renamed", 50).nullable()));
        let mut prompts = Vec::new();
        let mut confirmer = |prompt: &str| {
            prompts.push(prompt.to_string());
            true
        };
        let diff = engine(Dialect::Postgres)
            .diff(&old, &new, &mut confirmer)
            .unwrap();
        assert_eq!(prompts, vec!["Rename 'first' to 'renamed' in models.User?"]);
        assert_eq!(kinds(&diff.upgrade), vec!["RenameColumn", "DropColumn"]);
        assert_eq!(
            diff.upgrade[1].kind,
            OperationKind::DropColumn {
                table: "user".into(),
                column: "second".into(),
            }
        );
        assert_eq!(kinds(&diff.downgrade), vec!["RenameColumn", "AddColumn"]);
        assert_eq!(
            diff.downgrade[0].kind,
            OperationKind::RenameColumn {
                table: "user".into(),
                from: "renamed".into(),
                to: "first".into(),
            }
        );
    }

    #[test]
    fn test_downgrade_renames_back_the_confirmed_column() {
        let old = SchemaSnapshot::new().with_entity(user().column(varchar("x", 50).nullable()));
        let new = SchemaSnapshot::new().with_entity(
            user()
                .column(varchar("a", 50).nullable())
                .column(varchar("b", 50).nullable()),
        );
        let mut prompts = Vec::new();
        let mut confirmer = |prompt: &str| {
            prompts.push(prompt.to_string());
            prompts.len() == 2
        };
        let diff = engine(Dialect::Postgres)
            .diff(&old, &new, &mut confirmer)
            .unwrap();

        assert_eq!(
            prompts,
            vec![
                "Rename 'x' to 'a' in models.User?",
                "Rename 'x' to 'b' in models.User?"
            ]
        );
        assert_eq!(kinds(&diff.upgrade), vec!["AddColumn", "RenameColumn"]);
        assert_eq!(
            diff.upgrade[1].sql(),
            r#"ALTER TABLE "user" RENAME COLUMN "x" TO "b""#
        );
        assert_eq!(kinds(&diff.downgrade), vec!["RenameColumn", "DropColumn"]);
        assert_eq!(
            diff.downgrade[0].sql(),
            r#"ALTER TABLE "user" RENAME COLUMN "b" TO "x""#
        );
        assert_eq!(
            diff.downgrade[1].kind,
            OperationKind::DropColumn {
                table: "user".into(),
                column: "a".into(),
            }
        );
    }

    #[test]
    fn test_dependency_order_tolerates_cycles() {
        let snapshot = SchemaSnapshot::new()
            .with_entity(
                EntityDescriptor::new("models.A", "a", int("id"))
                    .column(int("b_id"))
                    .foreign_key(ForeignKeyDescriptor::new("b", "b_id", "models.B")),
            )
            .with_entity(
                EntityDescriptor::new("models.B", "b", int("id"))
                    .column(int("a_id"))
                    .foreign_key(ForeignKeyDescriptor::new("a", "a_id", "models.A")),
            );
        let ordered = dependency_order(&snapshot, ["models.A", "models.B"].into_iter().collect());
        let names: Vec<_> = ordered.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["models.A", "models.B"]);
    }
}
