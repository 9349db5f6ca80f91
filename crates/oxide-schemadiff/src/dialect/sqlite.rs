//! SQLite dialect for migrations.
//!
//! SQLite has limited ALTER TABLE support. Dropping or redefining columns and
//! adding or dropping constraints would need the table-recreation strategy,
//! which this dialect does not attempt: those operations are reported as
//! unsupported.

use crate::error::{MigrateError, Result};
use crate::schema::{
    ColumnDescriptor, EntityDescriptor, ForeignKeyDescriptor, IndexDescriptor,
    ManyToManyDescriptor, SchemaSnapshot,
};

use super::{
    column_list, default_sql, enforced_fk_for, index_name, table_indexes, Dialect,
    MigrationDialect,
};

/// SQLite migration dialect.
#[derive(Debug, Clone, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    /// Creates a new SQLite dialect.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn unsupported(operation: &str) -> MigrateError {
        MigrateError::unsupported(Dialect::Sqlite, operation)
    }

    fn primary_key_definition(&self, pk: &ColumnDescriptor) -> String {
        if pk.generated {
            format!(
                "{} INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL",
                self.quote_identifier(&pk.db_column)
            )
        } else {
            format!(
                "{} {} NOT NULL PRIMARY KEY",
                self.quote_identifier(&pk.db_column),
                pk.physical_type.for_dialect(Dialect::Sqlite)
            )
        }
    }

    fn comment(description: Option<&str>) -> String {
        description.map_or_else(String::new, |c| {
            format!(" /* {} */", c.replace("*/", "* /"))
        })
    }

    fn references(&self, target_table: &str, target_column: &str, on_delete: &str) -> String {
        format!(
            " REFERENCES {} ({}) ON DELETE {on_delete}",
            self.quote_identifier(target_table),
            self.quote_identifier(target_column)
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
}

impl MigrationDialect for SqliteDialect {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn column_definition(&self, column: &ColumnDescriptor) -> String {
        let mut parts = vec![
            self.quote_identifier(&column.db_column),
            column.physical_type.for_dialect(Dialect::Sqlite).to_string(),
        ];
        if !column.nullable {
            parts.push("NOT NULL".to_string());
        }
        if let Some(default) = default_sql(Dialect::Sqlite, &column.default) {
            parts.push(format!("DEFAULT {default}"));
        }
        parts.join(" ")
    }

    fn create_table(
        &self,
        entity: &EntityDescriptor,
        snapshot: &SchemaSnapshot,
    ) -> Result<Vec<String>> {
        let mut lines = vec![format!(
            "{}{}",
            self.primary_key_definition(&entity.primary_key),
            Self::comment(entity.primary_key.description.as_deref())
        )];
        for column in &entity.columns {
            let mut line = self.column_definition(column);
            if let Some(fk) = enforced_fk_for(entity, &column.db_column) {
                line.push_str(&self.references(
                    snapshot.table_of(&fk.target_entity)?,
                    &fk.target_column,
                    fk.on_delete.to_sql(),
                ));
            }
            line.push_str(&Self::comment(column.description.as_deref()));
            lines.push(line);
        }

        let mut statements = vec![format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n){}",
            self.quote_identifier(&entity.table),
            lines.join(",\n    "),
            Self::comment(entity.description.as_deref())
        )];
        statements.extend(
            table_indexes(entity)
                .iter()
                .map(|index| self.create_index_sql(&entity.table, index)),
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
        Ok(vec![format!(
            "ALTER TABLE {} ADD COLUMN {}{}",
            self.quote_identifier(table),
            self.column_definition(column),
            Self::comment(column.description.as_deref())
        )])
    }

    fn drop_column(&self, _table: &str, _column: &str) -> Result<String> {
        Err(Self::unsupported("DropColumn"))
    }

    fn modify_column(&self, _table: &str, _column: &ColumnDescriptor) -> Result<String> {
        Err(Self::unsupported("ModifyColumn"))
    }

    /// Requires SQLite 3.25.0+.
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

    fn alter_default(&self, _table: &str, _column: &ColumnDescriptor) -> Result<String> {
        Err(Self::unsupported("AlterDefault"))
    }

    fn alter_nullability(&self, _table: &str, _column: &ColumnDescriptor) -> Result<String> {
        Err(Self::unsupported("AlterNullability"))
    }

    fn set_comment(&self, _table: &str, _column: &ColumnDescriptor) -> Result<String> {
        Err(Self::unsupported("SetComment"))
    }

    fn add_index(&self, table: &str, index: &IndexDescriptor) -> Result<String> {
        Ok(self.create_index_sql(table, index))
    }

    fn drop_index(&self, table: &str, index: &IndexDescriptor) -> Result<String> {
        Ok(format!(
            "DROP INDEX IF EXISTS {}",
            self.quote_identifier(&index_name(table, index))
        ))
    }

    fn add_foreign_key(
        &self,
        _table: &str,
        _fk: &ForeignKeyDescriptor,
        _target_table: &str,
    ) -> Result<String> {
        Err(Self::unsupported("AddForeignKey"))
    }

    fn drop_foreign_key(
        &self,
        _table: &str,
        _fk: &ForeignKeyDescriptor,
        _target_table: &str,
    ) -> Result<String> {
        Err(Self::unsupported("DropForeignKey"))
    }

    fn create_join_table(
        &self,
        m2m: &ManyToManyDescriptor,
        snapshot: &SchemaSnapshot,
    ) -> Result<Vec<String>> {
        let mut backward = format!(
            "{} {} NOT NULL",
            self.quote_identifier(&m2m.backward.column),
            m2m.backward.physical_type.for_dialect(Dialect::Sqlite)
        );
        let mut forward = format!(
            "{} {} NOT NULL",
            self.quote_identifier(&m2m.forward.column),
            m2m.forward.physical_type.for_dialect(Dialect::Sqlite)
        );
        if m2m.db_constraint {
            backward.push_str(&self.references(
                snapshot.table_of(&m2m.backward.target_entity)?,
                &m2m.backward.target_column,
                "CASCADE",
            ));
            forward.push_str(&self.references(
                snapshot.table_of(&m2m.forward.target_entity)?,
                &m2m.forward.target_column,
                m2m.on_delete.to_sql(),
            ));
        }
        Ok(vec![format!(
            "CREATE TABLE {} (\n    {backward},\n    {forward}\n){}",
            self.quote_identifier(&m2m.through),
            Self::comment(m2m.description.as_deref())
        )])
    }

    fn drop_join_table(&self, through: &str) -> Result<String> {
        self.drop_table(through)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{int, varchar, ForeignKeyAction, JoinLeg, PhysicalType};

    fn dialect() -> SqliteDialect {
        SqliteDialect::new()
    }

    fn snapshot() -> SchemaSnapshot {
        SchemaSnapshot::new()
            .with_entity(EntityDescriptor::new("models.User", "user", int("id").generated()))
            .with_entity(
                EntityDescriptor::new("models.Category", "category", int("id").generated())
                    .column(varchar("slug", 100).description("Slug"))
                    .column(int("user_id"))
                    .foreign_key(
                        ForeignKeyDescriptor::new("user", "user_id", "models.User")
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .unique_together(["slug", "user_id"]),
            )
    }

    #[test]
    fn test_create_table() {
        let snapshot = snapshot();
        let statements = dialect()
            .create_table(snapshot.get("models.Category").unwrap(), &snapshot)
            .unwrap();
        assert_eq!(statements.len(), 2);
        assert_eq!(
            statements[0],
            "CREATE TABLE IF NOT EXISTS \"category\" (\n    \
             \"id\" INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,\n    \
             \"slug\" VARCHAR(100) NOT NULL /* Slug */,\n    \
             \"user_id\" INT NOT NULL REFERENCES \"user\" (\"id\") ON DELETE CASCADE\n\
             )"
        );
        assert!(statements[1].starts_with("CREATE UNIQUE INDEX \"uid_category_slug_"));
        assert!(statements[1].ends_with("ON \"category\" (\"slug\", \"user_id\")"));
    }

    #[test]
    fn test_unsupported_operations() {
        let column = varchar("name", 10);
        let fk = ForeignKeyDescriptor::new("user", "user_id", "models.User");
        let results = [
            dialect().drop_column("user", "name"),
            dialect().modify_column("user", &column),
            dialect().alter_default("user", &column),
            dialect().alter_nullability("user", &column),
            dialect().set_comment("user", &column),
            dialect().add_foreign_key("post", &fk, "user"),
            dialect().drop_foreign_key("post", &fk, "user"),
        ];
        for result in results {
            match result {
                Err(MigrateError::UnsupportedOperation { dialect, .. }) => {
                    assert_eq!(dialect, Dialect::Sqlite);
                }
                other => panic!("Expected UnsupportedOperation, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_drop_column_names_operation() {
        match dialect().drop_column("user", "name") {
            Err(MigrateError::UnsupportedOperation { operation, .. }) => {
                assert_eq!(operation, "DropColumn");
            }
            other => panic!("Expected UnsupportedOperation, got {other:?}"),
        }
    }

    #[test]
    fn test_rename_column() {
        assert_eq!(
            dialect()
                .rename_column("post", "name", &varchar("title", 200))
                .unwrap(),
            "ALTER TABLE \"post\" RENAME COLUMN \"name\" TO \"title\""
        );
    }

    #[test]
    fn test_indexes() {
        let index = IndexDescriptor::new(["name"]);
        assert_eq!(
            dialect().add_index("category", &index).unwrap(),
            "CREATE INDEX \"idx_category_name_8b0cb9\" ON \"category\" (\"name\")"
        );
        assert_eq!(
            dialect().drop_index("category", &index).unwrap(),
            "DROP INDEX IF EXISTS \"idx_category_name_8b0cb9\""
        );
    }

    #[test]
    fn test_create_join_table_without_constraints() {
        let snapshot = snapshot();
        let mut m2m = ManyToManyDescriptor::new(
            "category_user",
            JoinLeg::new("user_id", PhysicalType::new("INT"), "models.User"),
            JoinLeg::new("category_id", PhysicalType::new("INT"), "models.Category"),
        );
        m2m.db_constraint = false;
        assert_eq!(
            dialect().create_join_table(&m2m, &snapshot).unwrap(),
            vec![
                "CREATE TABLE \"category_user\" (\n    \
                 \"category_id\" INT NOT NULL,\n    \
                 \"user_id\" INT NOT NULL\n\
                 )"
            ]
        );
    }
}
