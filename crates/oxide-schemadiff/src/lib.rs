//! Reversible, dialect-aware schema migrations from snapshot diffs.
//!
//! `oxide-schemadiff` compares two snapshots of a data model and produces a
//! migration that moves a database from the old shape to the new one, plus
//! the migration that moves it back:
//! - Both directions are computed in one session, so an interactively
//!   confirmed rename is asked once and mirrored on the way back
//! - Operations that must wait for others (indexes, foreign keys, join
//!   tables) are deferred and sequenced around the immediate ones
//! - SQL is rendered for MySQL, PostgreSQL, or SQLite; an operation a
//!   dialect cannot express aborts the whole migration
//!
//! # Architecture
//!
//! - **Schema** - Entity, column, relation, and index descriptors
//! - **Diff** - Two-pass structural comparison of snapshots
//! - **Resolver** - Rename confirmation, memoized across passes
//! - **Sequencer** - Deferred vs. immediate operation ordering
//! - **Dialect** - Database-specific SQL generation
//! - **Planner** - Sequence numbering and version lifecycle
//! - **Store** - Where artifacts are written
//!
//! # Example
//!
//! ```rust
//! use oxide_schemadiff::prelude::*;
//!
//! let old = SchemaSnapshot::new().with_entity(
//!     EntityDescriptor::new("models.Post", "post", int("id").generated())
//!         .column(varchar("name", 200)),
//! );
//! let new = SchemaSnapshot::new().with_entity(
//!     EntityDescriptor::new("models.Post", "post", int("id").generated())
//!         .column(varchar("title", 200)),
//! );
//!
//! let migrator = Migrator::new(MigratorConfig::new().with_dialect(Dialect::Postgres));
//! let mut store = MemoryStore::new();
//! let version = migrator
//!     .migrate(&old, &new, "rename_title", &mut store, &mut AlwaysRename)
//!     .unwrap()
//!     .unwrap();
//!
//! assert_eq!(
//!     version.upgrade[0].sql(),
//!     r#"ALTER TABLE "post" RENAME COLUMN "name" TO "title""#
//! );
//! assert_eq!(
//!     version.downgrade[0].sql(),
//!     r#"ALTER TABLE "post" RENAME COLUMN "title" TO "name""#
//! );
//! ```

pub mod artifact;
pub mod dialect;
pub mod diff;
pub mod error;
pub mod migrator;
pub mod operations;
pub mod planner;
pub mod resolver;
pub mod schema;
pub mod sequencer;
pub mod store;

pub use error::{MigrateError, Result};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::artifact::{parse_artifact, render_artifact, ArtifactContent};
    pub use crate::dialect::{
        adapter, Dialect, MigrationDialect, MysqlDialect, PostgresDialect, SqliteDialect,
    };
    pub use crate::diff::{DiffEngine, DiffOptions, DiffSession, Direction, MigrationDiff};
    pub use crate::error::{MigrateError, Result};
    pub use crate::migrator::{Migrator, MigratorConfig};
    pub use crate::operations::{MigrationOperation, OperationKind};
    pub use crate::planner::{MigrationVersion, VersionPlanner, VersionState};
    pub use crate::resolver::{AlwaysRename, ConfirmRename, NeverRename, RenameResolver};
    pub use crate::schema::{
        bigint, boolean, datetime, decimal, int, json, text, uuid, varchar, ColumnDefault,
        ColumnDescriptor, EntityDescriptor, ForeignKeyAction, ForeignKeyDescriptor,
        IndexDescriptor, JoinLeg, LiteralValue, ManyToManyDescriptor, PhysicalType, ScalarKind,
        SchemaSnapshot,
    };
    pub use crate::sequencer::OperationSequencer;
    pub use crate::store::{DirectoryStore, MemoryStore, MigrationStore, StoredVersion};
}
