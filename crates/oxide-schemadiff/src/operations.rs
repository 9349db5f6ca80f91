//! Migration operations.
//!
//! An operation pairs an abstract schema change with the SQL rendered for it
//! by a dialect, and records whether its position depends on other operations
//! in the same migration (deferred) or not (immediate).

use std::fmt;

use serde::{Deserialize, Serialize};

/// The abstract schema change an operation performs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    /// Create a table.
    CreateTable {
        /// Table name.
        table: String,
    },
    /// Drop a table.
    DropTable {
        /// Table name.
        table: String,
    },
    /// Rename a table.
    RenameTable {
        /// Current table name.
        from: String,
        /// New table name.
        to: String,
    },
    /// Add a column.
    AddColumn {
        /// Table name.
        table: String,
        /// Physical column name.
        column: String,
    },
    /// Drop a column.
    DropColumn {
        /// Table name.
        table: String,
        /// Physical column name.
        column: String,
    },
    /// Change a column's type (or, on dialects without native rename, its name).
    ModifyColumn {
        /// Table name.
        table: String,
        /// Physical column name.
        column: String,
    },
    /// Rename a column.
    RenameColumn {
        /// Table name.
        table: String,
        /// Current physical column name.
        from: String,
        /// New physical column name.
        to: String,
    },
    /// Set or drop a column default.
    AlterDefault {
        /// Table name.
        table: String,
        /// Physical column name.
        column: String,
    },
    /// Change a column's nullability.
    AlterNullability {
        /// Table name.
        table: String,
        /// Physical column name.
        column: String,
    },
    /// Change a column's comment.
    SetComment {
        /// Table name.
        table: String,
        /// Physical column name.
        column: String,
    },
    /// Create an index.
    AddIndex {
        /// Table name.
        table: String,
        /// Index name.
        name: String,
    },
    /// Drop an index.
    DropIndex {
        /// Table name.
        table: String,
        /// Index name.
        name: String,
    },
    /// Add a foreign-key constraint.
    AddForeignKey {
        /// Table name.
        table: String,
        /// Constraint name.
        name: String,
    },
    /// Drop a foreign-key constraint.
    DropForeignKey {
        /// Table name.
        table: String,
        /// Constraint name.
        name: String,
    },
    /// Create a many-to-many join table.
    CreateJoinTable {
        /// Join-table name.
        table: String,
    },
    /// Drop a many-to-many join table.
    DropJoinTable {
        /// Join-table name.
        table: String,
    },
}

impl OperationKind {
    /// Short variant name, as used in error messages.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateTable { .. } => "CreateTable",
            Self::DropTable { .. } => "DropTable",
            Self::RenameTable { .. } => "RenameTable",
            Self::AddColumn { .. } => "AddColumn",
            Self::DropColumn { .. } => "DropColumn",
            Self::ModifyColumn { .. } => "ModifyColumn",
            Self::RenameColumn { .. } => "RenameColumn",
            Self::AlterDefault { .. } => "AlterDefault",
            Self::AlterNullability { .. } => "AlterNullability",
            Self::SetComment { .. } => "SetComment",
            Self::AddIndex { .. } => "AddIndex",
            Self::DropIndex { .. } => "DropIndex",
            Self::AddForeignKey { .. } => "AddForeignKey",
            Self::DropForeignKey { .. } => "DropForeignKey",
            Self::CreateJoinTable { .. } => "CreateJoinTable",
            Self::DropJoinTable { .. } => "DropJoinTable",
        }
    }

    /// Whether the operation creates something (`Create*` / `Add*`).
    #[must_use]
    pub fn is_additive(&self) -> bool {
        matches!(
            self,
            Self::CreateTable { .. }
                | Self::AddColumn { .. }
                | Self::AddIndex { .. }
                | Self::AddForeignKey { .. }
                | Self::CreateJoinTable { .. }
        )
    }

    /// Whether the operation removes something (`Drop*`).
    #[must_use]
    pub fn is_destructive(&self) -> bool {
        matches!(
            self,
            Self::DropTable { .. }
                | Self::DropColumn { .. }
                | Self::DropIndex { .. }
                | Self::DropForeignKey { .. }
                | Self::DropJoinTable { .. }
        )
    }

    /// The table the operation touches. For a table rename this is the new name.
    #[must_use]
    pub fn table(&self) -> &str {
        match self {
            Self::RenameTable { to, .. } => to,
            Self::CreateTable { table }
            | Self::DropTable { table }
            | Self::AddColumn { table, .. }
            | Self::DropColumn { table, .. }
            | Self::ModifyColumn { table, .. }
            | Self::RenameColumn { table, .. }
            | Self::AlterDefault { table, .. }
            | Self::AlterNullability { table, .. }
            | Self::SetComment { table, .. }
            | Self::AddIndex { table, .. }
            | Self::DropIndex { table, .. }
            | Self::AddForeignKey { table, .. }
            | Self::DropForeignKey { table, .. }
            | Self::CreateJoinTable { table }
            | Self::DropJoinTable { table } => table,
        }
    }

    /// Returns a human-readable description.
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::CreateTable { table } => format!("Create table '{table}'"),
            Self::DropTable { table } => format!("Drop table '{table}'"),
            Self::RenameTable { from, to } => format!("Rename table '{from}' to '{to}'"),
            Self::AddColumn { table, column } => {
                format!("Add column '{column}' to table '{table}'")
            }
            Self::DropColumn { table, column } => {
                format!("Drop column '{column}' from table '{table}'")
            }
            Self::ModifyColumn { table, column } => {
                format!("Modify column '{column}' in table '{table}'")
            }
            Self::RenameColumn { table, from, to } => {
                format!("Rename column '{from}' to '{to}' in table '{table}'")
            }
            Self::AlterDefault { table, column } => {
                format!("Alter default of '{column}' in table '{table}'")
            }
            Self::AlterNullability { table, column } => {
                format!("Alter nullability of '{column}' in table '{table}'")
            }
            Self::SetComment { table, column } => {
                format!("Set comment of '{column}' in table '{table}'")
            }
            Self::AddIndex { table, name } => format!("Create index '{name}' on table '{table}'"),
            Self::DropIndex { table, name } => format!("Drop index '{name}' on table '{table}'"),
            Self::AddForeignKey { table, name } => {
                format!("Add foreign key '{name}' to table '{table}'")
            }
            Self::DropForeignKey { table, name } => {
                format!("Drop foreign key '{name}' from table '{table}'")
            }
            Self::CreateJoinTable { table } => format!("Create join table '{table}'"),
            Self::DropJoinTable { table } => format!("Drop join table '{table}'"),
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description())
    }
}

/// A single rendered migration operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MigrationOperation {
    /// What the operation does.
    pub kind: OperationKind,
    /// SQL statements rendered for the session's dialect, without trailing
    /// delimiters.
    pub statements: Vec<String>,
    /// Whether the sequencer moves the operation to the front or back.
    pub deferred: bool,
}

impl MigrationOperation {
    /// Creates an operation that keeps its emission position.
    #[must_use]
    pub fn immediate<I, S>(kind: OperationKind, statements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind,
            statements: statements.into_iter().map(Into::into).collect(),
            deferred: false,
        }
    }

    /// Creates an operation that is merged by kind.
    #[must_use]
    pub fn deferred<I, S>(kind: OperationKind, statements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            deferred: true,
            ..Self::immediate(kind, statements)
        }
    }

    /// All statements as one SQL text, separated by `;` and a newline.
    #[must_use]
    pub fn sql(&self) -> String {
        self.statements.join(";\n")
    }
}
