//! End-to-end migration generation: diff, plan, persist.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::dialect::Dialect;
use crate::diff::{DiffEngine, DiffOptions};
use crate::error::Result;
use crate::planner::{MigrationVersion, VersionPlanner, DEFAULT_MAX_VERSION_LENGTH};
use crate::resolver::ConfirmRename;
use crate::schema::SchemaSnapshot;
use crate::store::MigrationStore;

/// Configuration for a [`Migrator`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigratorConfig {
    /// Dialect to render migrations for.
    pub dialect: Dialect,
    /// MySQL server version, consulted only for the MySQL dialect.
    pub mysql_server_version: Option<String>,
    /// Maximum length of a version name.
    pub max_version_length: usize,
}

impl Default for MigratorConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl MigratorConfig {
    /// Creates the default configuration: Postgres, names up to 255 bytes.
    #[must_use]
    pub fn new() -> Self {
        Self {
            dialect: Dialect::Postgres,
            mysql_server_version: None,
            max_version_length: DEFAULT_MAX_VERSION_LENGTH,
        }
    }

    /// Sets the dialect.
    #[must_use]
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Sets the MySQL server version.
    #[must_use]
    pub fn with_mysql_server_version(mut self, version: impl Into<String>) -> Self {
        self.mysql_server_version = Some(version.into());
        self
    }

    /// Sets the maximum version name length.
    #[must_use]
    pub fn with_max_version_length(mut self, max: usize) -> Self {
        self.max_version_length = max;
        self
    }

    /// Diff options derived from this configuration.
    #[must_use]
    pub fn diff_options(&self) -> DiffOptions {
        DiffOptions {
            dialect: self.dialect,
            mysql_server_version: self.mysql_server_version.clone(),
        }
    }
}

/// Generates and stores migration versions from snapshot pairs.
#[derive(Debug, Clone)]
pub struct Migrator {
    config: MigratorConfig,
    engine: DiffEngine,
    planner: VersionPlanner,
}

impl Default for Migrator {
    fn default() -> Self {
        Self::new(MigratorConfig::default())
    }
}

impl Migrator {
    /// Creates a migrator.
    #[must_use]
    pub fn new(config: MigratorConfig) -> Self {
        let engine = DiffEngine::new(config.diff_options());
        let planner = VersionPlanner::new(config.max_version_length);
        Self {
            config,
            engine,
            planner,
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &MigratorConfig {
        &self.config
    }

    /// Diffs `old` against `new` and persists the resulting version.
    ///
    /// Returns `Ok(None)` when the snapshots are equivalent. The store is not
    /// touched unless diffing and planning both succeed.
    pub fn migrate(
        &self,
        old: &SchemaSnapshot,
        new: &SchemaSnapshot,
        label: &str,
        store: &mut dyn MigrationStore,
        confirmer: &mut dyn ConfirmRename,
    ) -> Result<Option<MigrationVersion>> {
        let diff = self.engine.diff(old, new, confirmer)?;
        let Some(mut version) = self.planner.plan(&*store, diff.upgrade, diff.downgrade, label)?
        else {
            info!(dialect = %self.config.dialect, "No changes detected");
            return Ok(None);
        };
        self.planner.persist(store, &mut version)?;
        Ok(Some(version))
    }

    /// Persists an intentionally empty version.
    pub fn migrate_empty(
        &self,
        label: &str,
        store: &mut dyn MigrationStore,
    ) -> Result<MigrationVersion> {
        let mut version = self.planner.plan_empty(&*store, label)?;
        self.planner.persist(store, &mut version)?;
        Ok(version)
    }
}
