//! PostgreSQL dialect.
//!
//! Indexes and comments are separate statements, returned after the
//! operation's main statement.

use crate::error::Result;
use crate::schema::{
    ColumnDescriptor, EntityDescriptor, ForeignKeyDescriptor, IndexDescriptor,
    ManyToManyDescriptor, ScalarKind, SchemaSnapshot,
};

use super::{
    column_list, default_sql, enforced_fk_for, foreign_key_name, index_name, quote_literal,
    table_indexes, Dialect, MigrationDialect,
};

/// PostgreSQL migration dialect.
#[derive(Debug, Clone, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    /// Creates a new PostgreSQL dialect.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn primary_key_definition(&self, pk: &ColumnDescriptor) -> String {
        let sql_type = if pk.generated {
            match pk.kind {
                ScalarKind::SmallInt => "SMALLSERIAL",
                ScalarKind::BigInt => "BIGSERIAL",
                _ => "SERIAL",
            }
        } else {
            pk.physical_type.for_dialect(Dialect::Postgres)
        };
        format!(
            "{} {sql_type} NOT NULL PRIMARY KEY",
            self.quote_identifier(&pk.db_column)
        )
    }

    fn create_index_sql(&self, table: &str, index: &IndexDescriptor) -> String {
        format!(
            "CREATE {}INDEX {} ON {} ({})",
            if index.unique { "UNIQUE " } else { "" },
            self.quote_identifier(&index_name(table, index)),
            self.quote_identifier(table),
            column_list(self, &index.columns)
        )
    }

    fn column_comment_sql(&self, table: &str, column: &ColumnDescriptor) -> String {
        format!(
            "COMMENT ON COLUMN {}.{} IS {}",
            self.quote_identifier(table),
            self.quote_identifier(&column.db_column),
            column
                .description
                .as_deref()
                .map_or_else(|| "NULL".to_string(), quote_literal)
        )
    }

    fn table_comment_sql(&self, table: &str, comment: &str) -> String {
        format!(
            "COMMENT ON TABLE {} IS {}",
            self.quote_identifier(table),
            quote_literal(comment)
        )
    }

    fn references(
        &self,
        target_table: &str,
        target_column: &str,
        on_delete: &str,
    ) -> String {
        format!(
            "REFERENCES {} ({}) ON DELETE {on_delete}",
            self.quote_identifier(target_table),
            self.quote_identifier(target_column)
        )
    }

    fn alter_column(&self, table: &str, column: &str, action: &str) -> String {
        format!(
            "ALTER TABLE {} ALTER COLUMN {} {action}",
            self.quote_identifier(table),
            self.quote_identifier(column)
        )
    }
}

impl MigrationDialect for PostgresDialect {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn column_definition(&self, column: &ColumnDescriptor) -> String {
        let mut parts = vec![
            self.quote_identifier(&column.db_column),
            column.physical_type.for_dialect(Dialect::Postgres).to_string(),
        ];
        if !column.nullable {
            parts.push("NOT NULL".to_string());
        }
        if let Some(default) = default_sql(Dialect::Postgres, &column.default) {
            parts.push(format!("DEFAULT {default}"));
        }
        parts.join(" ")
    }

    fn create_table(
        &self,
        entity: &EntityDescriptor,
        snapshot: &SchemaSnapshot,
    ) -> Result<Vec<String>> {
        let mut lines = vec![self.primary_key_definition(&entity.primary_key)];
        for column in &entity.columns {
            let mut line = self.column_definition(column);
            if let Some(fk) = enforced_fk_for(entity, &column.db_column) {
                let target_table = snapshot.table_of(&fk.target_entity)?;
                line.push_str(&format!(
                    " CONSTRAINT {} {}",
                    self.quote_identifier(&foreign_key_name(&entity.table, fk, target_table)),
                    self.references(target_table, &fk.target_column, fk.on_delete.to_sql())
                ));
            }
            lines.push(line);
        }

        let mut statements = vec![format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
            self.quote_identifier(&entity.table),
            lines.join(",\n    ")
        )];
        statements.extend(
            table_indexes(entity)
                .iter()
                .map(|index| self.create_index_sql(&entity.table, index)),
        );
        if let Some(comment) = &entity.description {
            statements.push(self.table_comment_sql(&entity.table, comment));
        }
        statements.extend(
            std::iter::once(&entity.primary_key)
                .chain(&entity.columns)
                .filter(|c| c.description.is_some())
                .map(|c| self.column_comment_sql(&entity.table, c)),
        );
        Ok(statements)
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
        let mut statements = vec![format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.quote_identifier(table),
            self.column_definition(column)
        )];
        if column.description.is_some() {
            statements.push(self.column_comment_sql(table, column));
        }
        Ok(statements)
    }

    fn drop_column(&self, table: &str, column: &str) -> Result<String> {
        Ok(format!(
            "ALTER TABLE {} DROP COLUMN {}",
            self.quote_identifier(table),
            self.quote_identifier(column)
        ))
    }

    fn modify_column(&self, table: &str, column: &ColumnDescriptor) -> Result<String> {
        let sql_type = column.physical_type.for_dialect(Dialect::Postgres);
        Ok(self.alter_column(
            table,
            &column.db_column,
            &format!(
                "TYPE {sql_type} USING {}::{sql_type}",
                self.quote_identifier(&column.db_column)
            ),
        ))
    }

    fn rename_column(&self, table: &str, from: &str, to: &ColumnDescriptor) -> Result<String> {
        Ok(format!(
            "ALTER TABLE {} RENAME COLUMN {} TO {}",
            self.quote_identifier(table),
            self.quote_identifier(from),
            self.quote_identifier(&to.db_column)
        ))
    }

    fn supports_native_rename(&self) -> bool {
        true
    }

    fn alter_default(&self, table: &str, column: &ColumnDescriptor) -> Result<String> {
        let action = default_sql(Dialect::Postgres, &column.default)
            .map_or_else(|| "DROP DEFAULT".to_string(), |d| format!("SET DEFAULT {d}"));
        Ok(self.alter_column(table, &column.db_column, &action))
    }

    fn alter_nullability(&self, table: &str, column: &ColumnDescriptor) -> Result<String> {
        let action = if column.nullable {
            "DROP NOT NULL"
        } else {
            "SET NOT NULL"
        };
        Ok(self.alter_column(table, &column.db_column, action))
    }

    fn set_comment(&self, table: &str, column: &ColumnDescriptor) -> Result<String> {
        Ok(self.column_comment_sql(table, column))
    }

    fn add_index(&self, table: &str, index: &IndexDescriptor) -> Result<String> {
        Ok(self.create_index_sql(table, index))
    }

    fn drop_index(&self, table: &str, index: &IndexDescriptor) -> Result<String> {
        Ok(format!(
            "DROP INDEX {}",
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
            "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) {}",
            self.quote_identifier(table),
            self.quote_identifier(&foreign_key_name(table, fk, target_table)),
            self.quote_identifier(&fk.source_column),
            self.references(target_table, &fk.target_column, fk.on_delete.to_sql())
        ))
    }

    fn drop_foreign_key(
        &self,
        table: &str,
        fk: &ForeignKeyDescriptor,
        target_table: &str,
    ) -> Result<String> {
        Ok(format!(
            "ALTER TABLE {} DROP CONSTRAINT {}",
            self.quote_identifier(table),
            self.quote_identifier(&foreign_key_name(table, fk, target_table))
        ))
    }

    fn create_join_table(
        &self,
        m2m: &ManyToManyDescriptor,
        snapshot: &SchemaSnapshot,
    ) -> Result<Vec<String>> {
        let mut backward = format!(
            "{} {} NOT NULL",
            self.quote_identifier(&m2m.backward.column),
            m2m.backward.physical_type.for_dialect(Dialect::Postgres)
        );
        let mut forward = format!(
            "{} {} NOT NULL",
            self.quote_identifier(&m2m.forward.column),
            m2m.forward.physical_type.for_dialect(Dialect::Postgres)
        );
        if m2m.db_constraint {
            backward.push(' ');
            backward.push_str(&self.references(
                snapshot.table_of(&m2m.backward.target_entity)?,
                &m2m.backward.target_column,
                "CASCADE",
            ));
            forward.push(' ');
            forward.push_str(&self.references(
                snapshot.table_of(&m2m.forward.target_entity)?,
                &m2m.forward.target_column,
                m2m.on_delete.to_sql(),
            ));
        }
        let mut statements = vec![format!(
            "CREATE TABLE {} (\n    {backward},\n    {forward}\n)",
            self.quote_identifier(&m2m.through)
        )];
        if let Some(comment) = &m2m.description {
            statements.push(self.table_comment_sql(&m2m.through, comment));
        }
        Ok(statements)
    }

    fn drop_join_table(&self, through: &str) -> Result<String> {
        self.drop_table(through)
    }
}
