//! Database dialect implementations.
//!
//! Each dialect renders abstract schema operations into SQL for one database
//! family. Every render either returns SQL text or fails with
//! [`MigrateError::UnsupportedOperation`]; there is no shared fallback.
//!
//! [`MigrateError::UnsupportedOperation`]: crate::error::MigrateError::UnsupportedOperation

mod mysql;
mod postgres;
mod sqlite;

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub use mysql::MysqlDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

use crate::error::Result;
use crate::schema::{
    ColumnDefault, ColumnDescriptor, EntityDescriptor, ForeignKeyDescriptor, IndexDescriptor,
    ManyToManyDescriptor, SchemaSnapshot,
};

/// Supported database families.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// MySQL / MariaDB.
    #[serde(alias = "mariadb")]
    MySql,
    /// PostgreSQL.
    #[default]
    #[serde(alias = "postgresql")]
    Postgres,
    /// SQLite.
    Sqlite,
}

impl Dialect {
    /// Returns the dialect name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::Postgres => "postgres",
            Self::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

mod private {
    pub trait Sealed {}

    impl Sealed for super::MysqlDialect {}
    impl Sealed for super::PostgresDialect {}
    impl Sealed for super::SqliteDialect {}
}

/// Renders schema operations for one database family.
///
/// The trait is sealed: the set of dialects is fixed by [`Dialect`].
pub trait MigrationDialect: private::Sealed + Send + Sync {
    /// Returns the dialect this adapter renders for.
    fn dialect(&self) -> Dialect;

    /// Quotes an identifier (table name, column name, etc.).
    fn quote_identifier(&self, name: &str) -> String;

    /// Renders a data column definition, without index clauses.
    fn column_definition(&self, column: &ColumnDescriptor) -> String;

    /// Renders `CREATE TABLE` for an entity, including its indexes and
    /// enforced foreign keys. FK targets are resolved through `snapshot`.
    /// Dialects without inline indexes or comments return extra statements.
    fn create_table(
        &self,
        entity: &EntityDescriptor,
        snapshot: &SchemaSnapshot,
    ) -> Result<Vec<String>>;

    /// Renders `DROP TABLE`.
    fn drop_table(&self, table: &str) -> Result<String>;

    /// Renders a table rename.
    fn rename_table(&self, from: &str, to: &str) -> Result<String>;

    /// Renders adding a column, followed by its comment where the dialect
    /// sets comments separately.
    fn add_column(&self, table: &str, column: &ColumnDescriptor) -> Result<Vec<String>>;

    /// Renders dropping a column.
    fn drop_column(&self, table: &str, column: &str) -> Result<String>;

    /// Renders a change of column type.
    fn modify_column(&self, table: &str, column: &ColumnDescriptor) -> Result<String>;

    /// Renders renaming physical column `from` to `to.db_column`.
    fn rename_column(&self, table: &str, from: &str, to: &ColumnDescriptor) -> Result<String>;

    /// Whether [`MigrationDialect::rename_column`] renders a true rename.
    /// When false the statement also redefines the column.
    fn supports_native_rename(&self) -> bool;

    /// Renders setting (or dropping) the column default to `column.default`.
    fn alter_default(&self, table: &str, column: &ColumnDescriptor) -> Result<String>;

    /// Renders a change of nullability to `column.nullable`.
    fn alter_nullability(&self, table: &str, column: &ColumnDescriptor) -> Result<String>;

    /// Renders a change of comment to `column.description`.
    fn set_comment(&self, table: &str, column: &ColumnDescriptor) -> Result<String>;

    /// Renders creating an index.
    fn add_index(&self, table: &str, index: &IndexDescriptor) -> Result<String>;

    /// Renders dropping an index.
    fn drop_index(&self, table: &str, index: &IndexDescriptor) -> Result<String>;

    /// Renders adding a foreign-key constraint.
    fn add_foreign_key(
        &self,
        table: &str,
        fk: &ForeignKeyDescriptor,
        target_table: &str,
    ) -> Result<String>;

    /// Renders dropping a foreign-key constraint.
    fn drop_foreign_key(
        &self,
        table: &str,
        fk: &ForeignKeyDescriptor,
        target_table: &str,
    ) -> Result<String>;

    /// Renders creating a many-to-many join table.
    fn create_join_table(
        &self,
        m2m: &ManyToManyDescriptor,
        snapshot: &SchemaSnapshot,
    ) -> Result<Vec<String>>;

    /// Renders dropping a many-to-many join table.
    fn drop_join_table(&self, through: &str) -> Result<String>;
}

/// Builds the adapter for `dialect`. A MySQL server version starting with
/// `5.` selects rendering without `RENAME COLUMN`.
#[must_use]
pub fn adapter(dialect: Dialect, mysql_server_version: Option<&str>) -> Box<dyn MigrationDialect> {
    match dialect {
        Dialect::MySql => Box::new(
            mysql_server_version.map_or_else(MysqlDialect::new, MysqlDialect::with_server_version),
        ),
        Dialect::Postgres => Box::new(PostgresDialect::new()),
        Dialect::Sqlite => Box::new(SqliteDialect::new()),
    }
}

// ============================================================================
// Constraint naming
// ============================================================================

fn truncated(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

fn short_hash(parts: &[&str], len: usize) -> String {
    let mut hex = format!("{:x}", Sha256::digest(parts.join(";").as_bytes()));
    hex.truncate(len);
    hex
}

/// Deterministic name of an index on `table`. An explicit name wins.
///
/// The name depends on the current table and column names, so it is not
/// carried over when either is renamed.
#[must_use]
pub fn index_name(table: &str, index: &IndexDescriptor) -> String {
    if let Some(name) = &index.name {
        return name.clone();
    }
    let prefix = if index.unique { "uid" } else { "idx" };
    let first = index.columns.first().map_or("", String::as_str);
    let mut parts = vec![table];
    parts.extend(index.columns.iter().map(String::as_str));
    format!(
        "{prefix}_{}_{}_{}",
        truncated(table, 11),
        truncated(first, 7),
        short_hash(&parts, 6)
    )
}

/// Deterministic name of a foreign-key constraint.
#[must_use]
pub fn foreign_key_name(table: &str, fk: &ForeignKeyDescriptor, target_table: &str) -> String {
    format!(
        "fk_{}_{}_{}",
        truncated(table, 8),
        truncated(target_table, 8),
        short_hash(
            &[table, &fk.source_column, target_table, &fk.target_column],
            8
        )
    )
}

// ============================================================================
// Shared rendering helpers
// ============================================================================

/// Quotes a string literal.
pub(crate) fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Renders the column default as SQL, or `None` when nothing is rendered.
pub(crate) fn default_sql(dialect: Dialect, default: &ColumnDefault) -> Option<String> {
    match default {
        ColumnDefault::None | ColumnDefault::Callable(_) => None,
        ColumnDefault::Literal(value) => Some(value.to_sql(dialect)),
        ColumnDefault::GeneratedAtWrite { on_update } => Some(match (dialect, on_update) {
            (Dialect::MySql, true) => {
                "CURRENT_TIMESTAMP(6) ON UPDATE CURRENT_TIMESTAMP(6)".to_string()
            }
            (Dialect::MySql, false) => "CURRENT_TIMESTAMP(6)".to_string(),
            _ => "CURRENT_TIMESTAMP".to_string(),
        }),
    }
}

/// Comma-separated quoted column list.
pub(crate) fn column_list(dialect: &dyn MigrationDialect, columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| dialect.quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Indexes carried by a new table: column-implied ones first, then the
/// entity's explicit and unique-together indexes.
pub(crate) fn table_indexes(entity: &EntityDescriptor) -> Vec<IndexDescriptor> {
    let mut indexes: Vec<IndexDescriptor> = Vec::new();
    let implied = entity.columns.iter().filter_map(ColumnDescriptor::implied_index);
    for index in implied.chain(entity.index_set()) {
        if !indexes.contains(&index) {
            indexes.push(index);
        }
    }
    indexes
}

/// The enforced foreign key using `column` as its source, if any.
pub(crate) fn enforced_fk_for<'a>(
    entity: &'a EntityDescriptor,
    column: &str,
) -> Option<&'a ForeignKeyDescriptor> {
    entity
        .foreign_keys
        .iter()
        .find(|fk| fk.db_constraint && fk.source_column == column)
}
