//! Version planning.
//!
//! The planner turns a completed diff into a [`MigrationVersion`]: it picks
//! the next sequence number from the store, stamps the creation time,
//! collapses repeated operations, and enforces the maximum length of the
//! version name.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::artifact::render_artifact;
use crate::error::{MigrateError, Result};
use crate::operations::MigrationOperation;
use crate::store::MigrationStore;

/// Default maximum length of a version name.
pub const DEFAULT_MAX_VERSION_LENGTH: usize = 255;

/// Label given to the first version of a store.
pub const INITIAL_LABEL: &str = "init";

/// Lifecycle of a migration version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VersionState {
    /// Built by the planner, not yet written.
    Planned,
    /// Written to the store.
    Persisted,
    /// Applied to a database by external tooling.
    Applied,
    /// Reverted by external tooling.
    Reverted,
}

/// A planned migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationVersion {
    /// Sequence number, one past the store's latest.
    pub sequence: u64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Human label.
    pub label: String,
    /// Upgrade operations, in execution order.
    pub upgrade: Vec<MigrationOperation>,
    /// Downgrade operations, in execution order.
    pub downgrade: Vec<MigrationOperation>,
    state: VersionState,
}

impl MigrationVersion {
    /// Version identifier: `{sequence}_{%Y%m%d%H%M%S}_{label}`.
    #[must_use]
    pub fn name(&self) -> String {
        format!(
            "{}_{}_{}",
            self.sequence,
            self.created_at.format("%Y%m%d%H%M%S"),
            self.label
        )
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> VersionState {
        self.state
    }

    /// Whether the version may still be replaced by a regenerated one.
    #[must_use]
    pub fn is_replaceable(&self) -> bool {
        matches!(self.state, VersionState::Planned | VersionState::Persisted)
    }

    /// Whether the version can be reverted: a version with upgrade operations
    /// but no downgrade operations cannot.
    #[must_use]
    pub fn has_downgrade(&self) -> bool {
        !self.downgrade.is_empty() || self.upgrade.is_empty()
    }

    /// Renders the migration artifact.
    #[must_use]
    pub fn render(&self) -> String {
        render_artifact(&self.upgrade, &self.downgrade)
    }

    fn transition(&mut self, from: &[VersionState], to: VersionState) -> Result<()> {
        if !from.contains(&self.state) {
            return Err(MigrateError::InvalidState(format!(
                "version '{}' cannot move from {:?} to {to:?}",
                self.name(),
                self.state
            )));
        }
        self.state = to;
        Ok(())
    }

    /// Records that the version was written to a store.
    pub fn mark_persisted(&mut self) -> Result<()> {
        self.transition(&[VersionState::Planned], VersionState::Persisted)
    }

    /// Records that external tooling applied the version.
    pub fn mark_applied(&mut self) -> Result<()> {
        self.transition(
            &[VersionState::Persisted, VersionState::Reverted],
            VersionState::Applied,
        )
    }

    /// Records that external tooling reverted the version.
    pub fn mark_reverted(&mut self) -> Result<()> {
        if !self.has_downgrade() {
            return Err(MigrateError::NoDowngrade(self.name()));
        }
        self.transition(&[VersionState::Applied], VersionState::Reverted)
    }
}

/// Assigns sequence numbers and persists versions.
#[derive(Debug, Clone)]
pub struct VersionPlanner {
    max_version_length: usize,
}

impl Default for VersionPlanner {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_VERSION_LENGTH)
    }
}

impl VersionPlanner {
    /// Creates a planner enforcing `max_version_length`.
    #[must_use]
    pub fn new(max_version_length: usize) -> Self {
        Self { max_version_length }
    }

    /// Plans a version from sequenced operations, stamped now.
    ///
    /// Returns `Ok(None)` when there are no upgrade operations.
    pub fn plan(
        &self,
        store: &dyn MigrationStore,
        upgrade: Vec<MigrationOperation>,
        downgrade: Vec<MigrationOperation>,
        label: &str,
    ) -> Result<Option<MigrationVersion>> {
        self.plan_at(store, upgrade, downgrade, label, Utc::now())
    }

    /// Like [`VersionPlanner::plan`] with an explicit timestamp.
    pub fn plan_at(
        &self,
        store: &dyn MigrationStore,
        upgrade: Vec<MigrationOperation>,
        downgrade: Vec<MigrationOperation>,
        label: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<MigrationVersion>> {
        if upgrade.is_empty() {
            return Ok(None);
        }
        self.build(store, upgrade, downgrade, label, now).map(Some)
    }

    /// Plans an intentionally empty version, e.g. for hand-written SQL.
    pub fn plan_empty(&self, store: &dyn MigrationStore, label: &str) -> Result<MigrationVersion> {
        self.build(store, Vec::new(), Vec::new(), label, Utc::now())
    }

    fn build(
        &self,
        store: &dyn MigrationStore,
        mut upgrade: Vec<MigrationOperation>,
        mut downgrade: Vec<MigrationOperation>,
        label: &str,
        now: DateTime<Utc>,
    ) -> Result<MigrationVersion> {
        let (sequence, label) = match store.latest_sequence_number()? {
            Some(latest) => (latest + 1, label),
            None => (0, INITIAL_LABEL),
        };
        upgrade.dedup();
        downgrade.dedup();

        let version = MigrationVersion {
            sequence,
            created_at: now,
            label: label.to_string(),
            upgrade,
            downgrade,
            state: VersionState::Planned,
        };
        let name = version.name();
        if name.len() > self.max_version_length {
            return Err(MigrateError::VersionNameTooLong {
                name,
                max: self.max_version_length,
            });
        }

        info!(
            version = %name,
            upgrade = version.upgrade.len(),
            downgrade = version.downgrade.len(),
            "Planned migration version"
        );
        Ok(version)
    }

    /// Writes `version` to `store` and marks it persisted.
    pub fn persist(&self, store: &mut dyn MigrationStore, version: &mut MigrationVersion) -> Result<()> {
        if version.state() != VersionState::Planned {
            return Err(MigrateError::InvalidState(format!(
                "version '{}' was already persisted",
                version.name()
            )));
        }
        store.record_version(version)?;
        version.mark_persisted()?;
        info!(version = %version.name(), "Persisted migration version");
        Ok(())
    }
}
