//! MySQL dialect.
//!
//! Indexes and foreign keys of a new table are rendered inline. Comments are
//! column attributes, so changing one redefines the column. Servers older than
//! 8.0 have no `RENAME COLUMN`; renames are rendered as `CHANGE`.

use crate::error::Result;
use crate::schema::{
    ColumnDefault, ColumnDescriptor, EntityDescriptor, ForeignKeyDescriptor, IndexDescriptor,
    ManyToManyDescriptor, SchemaSnapshot,
};

use super::{
    column_list, default_sql, enforced_fk_for, foreign_key_name, index_name, quote_literal,
    table_indexes, Dialect, MigrationDialect,
};

/// MySQL migration dialect.
#[derive(Debug, Clone)]
pub struct MysqlDialect {
    native_rename: bool,
}

impl Default for MysqlDialect {
    fn default() -> Self {
        Self::new()
    }
}

impl MysqlDialect {
    /// Creates a dialect for MySQL 8.0 and later.
    #[must_use]
    pub fn new() -> Self {
        Self {
            native_rename: true,
        }
    }

    /// Creates a dialect for the given server version (e.g. `"5.7.40"`).
    #[must_use]
    pub fn with_server_version(version: &str) -> Self {
        Self {
            native_rename: !version.trim().starts_with("5."),
        }
    }

    fn primary_key_definition(&self, pk: &ColumnDescriptor) -> String {
        let mut sql = format!(
            "{} {} NOT NULL PRIMARY KEY",
            self.quote_identifier(&pk.db_column),
            pk.physical_type.for_dialect(Dialect::MySql)
        );
        if pk.generated {
            sql.push_str(" AUTO_INCREMENT");
        }
        if let Some(comment) = &pk.description {
            sql.push_str(&format!(" COMMENT {}", quote_literal(comment)));
        }
        sql
    }

    fn foreign_key_clause(&self, fk: &ForeignKeyDescriptor, target_table: &str) -> String {
        format!(
            "FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {}",
            self.quote_identifier(&fk.source_column),
            self.quote_identifier(target_table),
            self.quote_identifier(&fk.target_column),
            fk.on_delete.to_sql()
        )
    }

    fn modify(&self, table: &str, column: &ColumnDescriptor) -> String {
        format!(
            "ALTER TABLE {} MODIFY COLUMN {}",
            self.quote_identifier(table),
            self.column_definition(column)
        )
    }

    fn table_options(description: Option<&str>) -> String {
        let mut options = String::from(" CHARACTER SET utf8mb4");
        if let Some(comment) = description {
            options.push_str(&format!(" COMMENT={}", quote_literal(comment)));
        }
        options
    }
}

impl MigrationDialect for MysqlDialect {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn column_definition(&self, column: &ColumnDescriptor) -> String {
        let mut parts = vec![
            self.quote_identifier(&column.db_column),
            column.physical_type.for_dialect(Dialect::MySql).to_string(),
        ];
        if !column.nullable {
            parts.push("NOT NULL".to_string());
        }
        if let Some(default) = default_sql(Dialect::MySql, &column.default) {
            parts.push(format!("DEFAULT {default}"));
        }
        if let Some(comment) = &column.description {
            parts.push(format!("COMMENT {}", quote_literal(comment)));
        }
        parts.join(" ")
    }

    fn create_table(
        &self,
        entity: &EntityDescriptor,
        snapshot: &SchemaSnapshot,
    ) -> Result<Vec<String>> {
        let mut lines = vec![self.primary_key_definition(&entity.primary_key)];
        lines.extend(entity.columns.iter().map(|c| self.column_definition(c)));

        for index in table_indexes(entity) {
            let keyword = if index.unique { "UNIQUE KEY" } else { "KEY" };
            lines.push(format!(
                "{keyword} {} ({})",
                self.quote_identifier(&index_name(&entity.table, &index)),
                column_list(self, &index.columns)
            ));
        }

        for column in &entity.columns {
            if let Some(fk) = enforced_fk_for(entity, &column.db_column) {
                let target_table = snapshot.table_of(&fk.target_entity)?;
                lines.push(format!(
                    "CONSTRAINT {} {}",
                    self.quote_identifier(&foreign_key_name(&entity.table, fk, target_table)),
                    self.foreign_key_clause(fk, target_table)
                ));
            }
        }

        Ok(vec![format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n){}",
            self.quote_identifier(&entity.table),
            lines.join(",\n    "),
            Self::table_options(entity.description.as_deref())
        )])
    }

    fn drop_table(&self, table: &str) -> Result<String> {
        Ok(format!("DROP TABLE IF EXISTS {}", self.quote_identifier(table)))
    }

    fn rename_table(&self, from: &str, to: &str) -> Result<String> {
        Ok(format!(
            "ALTER TABLE {} RENAME TO {}",
            self.quote_identifier(from),
            self.quote_identifier(to)
        ))
    }

    fn add_column(&self, table: &str, column: &ColumnDescriptor) -> Result<Vec<String>> {
        Ok(vec![format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.quote_identifier(table),
            self.column_definition(column)
        )])
    }

    fn drop_column(&self, table: &str, column: &str) -> Result<String> {
        Ok(format!(
            "ALTER TABLE {} DROP COLUMN {}",
            self.quote_identifier(table),
            self.quote_identifier(column)
        ))
    }

    fn modify_column(&self, table: &str, column: &ColumnDescriptor) -> Result<String> {
        Ok(self.modify(table, column))
    }

    fn rename_column(&self, table: &str, from: &str, to: &ColumnDescriptor) -> Result<String> {
        if self.native_rename {
            Ok(format!(
                "ALTER TABLE {} RENAME COLUMN {} TO {}",
                self.quote_identifier(table),
                self.quote_identifier(from),
                self.quote_identifier(&to.db_column)
            ))
        } else {
            Ok(format!(
                "ALTER TABLE {} CHANGE {} {}",
                self.quote_identifier(table),
                self.quote_identifier(from),
                self.column_definition(to)
            ))
        }
    }

    fn supports_native_rename(&self) -> bool {
        self.native_rename
    }

    fn alter_default(&self, table: &str, column: &ColumnDescriptor) -> Result<String> {
        // Timestamp defaults (and ON UPDATE) can only be set by redefining the column.
        if matches!(column.default, ColumnDefault::GeneratedAtWrite { .. }) {
            return Ok(self.modify(table, column));
        }
        let action = default_sql(Dialect::MySql, &column.default)
            .map_or_else(|| "DROP DEFAULT".to_string(), |d| format!("SET DEFAULT {d}"));
        Ok(format!(
            "ALTER TABLE {} ALTER COLUMN {} {action}",
            self.quote_identifier(table),
            self.quote_identifier(&column.db_column)
        ))
    }

    fn alter_nullability(&self, table: &str, column: &ColumnDescriptor) -> Result<String> {
        Ok(self.modify(table, column))
    }

    fn set_comment(&self, table: &str, column: &ColumnDescriptor) -> Result<String> {
        Ok(self.modify(table, column))
    }

    fn add_index(&self, table: &str, index: &IndexDescriptor) -> Result<String> {
        Ok(format!(
            "ALTER TABLE {} ADD {}INDEX {} ({})",
            self.quote_identifier(table),
            if index.unique { "UNIQUE " } else { "" },
            self.quote_identifier(&index_name(table, index)),
            column_list(self, &index.columns)
        ))
    }

    fn drop_index(&self, table: &str, index: &IndexDescriptor) -> Result<String> {
        Ok(format!(
            "ALTER TABLE {} DROP INDEX {}",
            self.quote_identifier(table),
            self.quote_identifier(&index_name(table, index))
        ))
    }

    fn add_foreign_key(
        &self,
        table: &str,
        fk: &ForeignKeyDescriptor,
        target_table: &str,
    ) -> Result<String> {
        Ok(format!(
            "ALTER TABLE {} ADD CONSTRAINT {} {}",
            self.quote_identifier(table),
            self.quote_identifier(&foreign_key_name(table, fk, target_table)),
            self.foreign_key_clause(fk, target_table)
        ))
    }

    fn drop_foreign_key(
        &self,
        table: &str,
        fk: &ForeignKeyDescriptor,
        target_table: &str,
    ) -> Result<String> {
        Ok(format!(
            "ALTER TABLE {} DROP FOREIGN KEY {}",
            self.quote_identifier(table),
            self.quote_identifier(&foreign_key_name(table, fk, target_table))
        ))
    }

    fn create_join_table(
        &self,
        m2m: &ManyToManyDescriptor,
        snapshot: &SchemaSnapshot,
    ) -> Result<Vec<String>> {
        let backward_table = snapshot.table_of(&m2m.backward.target_entity)?;
        let forward_table = snapshot.table_of(&m2m.forward.target_entity)?;
        let mut lines = vec![
            format!(
                "{} {} NOT NULL",
                self.quote_identifier(&m2m.backward.column),
                m2m.backward.physical_type.for_dialect(Dialect::MySql)
            ),
            format!(
                "{} {} NOT NULL",
                self.quote_identifier(&m2m.forward.column),
                m2m.forward.physical_type.for_dialect(Dialect::MySql)
            ),
        ];
        if m2m.db_constraint {
            lines.push(format!(
                "FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE CASCADE",
                self.quote_identifier(&m2m.backward.column),
                self.quote_identifier(backward_table),
                self.quote_identifier(&m2m.backward.target_column)
            ));
            lines.push(format!(
                "FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {}",
                self.quote_identifier(&m2m.forward.column),
                self.quote_identifier(forward_table),
                self.quote_identifier(&m2m.forward.target_column),
                m2m.on_delete.to_sql()
            ));
        }
        Ok(vec![format!(
            "CREATE TABLE {} (\n    {}\n){}",
            self.quote_identifier(&m2m.through),
            lines.join(",\n    "),
            Self::table_options(m2m.description.as_deref())
        )])
    }

    fn drop_join_table(&self, through: &str) -> Result<String> {
        self.drop_table(through)
    }
}
