//! End-to-end scenarios: snapshot pairs diffed, planned, and stored.

mod common;

use common::{category, diff, kinds, post, snapshot, tag, user};
use oxide_schemadiff::prelude::*;

const DIALECTS: [Dialect; 3] = [Dialect::MySql, Dialect::Postgres, Dialect::Sqlite];

// =============================================================================
// Idempotence and inverse consistency
// =============================================================================

#[test]
fn test_identical_snapshots_are_a_noop_for_every_dialect() {
    let schema = snapshot([user(), category(), post(), tag()]);
    for dialect in DIALECTS {
        let result = diff(dialect, &schema, &schema, &mut AlwaysRename);
        assert!(result.is_empty(), "{dialect}: {result:?}");
    }
}

#[test]
fn test_downgrade_mirrors_reverse_upgrade() {
    let a = snapshot([user(), post(), tag()]);

    let mut changed_user = user();
    changed_user.columns.retain(|c| c.name != "email");
    changed_user = changed_user.column(text("bio").nullable());
    let mut changed_post = post();
    changed_post.columns[1] = text("body");
    changed_post.columns[0] = varchar("name", 200).description("Headline");
    let b = snapshot([changed_user, changed_post, tag()]);

    let forward = diff(Dialect::Postgres, &a, &b, &mut NeverRename);
    let backward = diff(Dialect::Postgres, &b, &a, &mut NeverRename);

    assert!(!forward.upgrade.is_empty());
    assert_eq!(forward.upgrade, backward.downgrade);
    assert_eq!(forward.downgrade, backward.upgrade);

    let touched: Vec<&str> = forward.upgrade.iter().map(|op| op.kind.table()).collect();
    assert!(touched.iter().all(|t| *t == "user" || *t == "post"));
}

// =============================================================================
// New and removed entities
// =============================================================================

#[test]
fn test_new_entity_is_created_and_dropped_on_downgrade() {
    let old = snapshot([user()]);
    let new = snapshot([user(), category()]);
    let result = diff(Dialect::MySql, &old, &new, &mut NeverRename);

    assert_eq!(kinds(&result.upgrade), vec!["CreateTable"]);
    assert!(result.upgrade[0].sql().contains(
        "CONSTRAINT `fk_category_user_e2e3874c` FOREIGN KEY (`user_id`) \
         REFERENCES `user` (`id`) ON DELETE CASCADE"
    ));
    assert_eq!(kinds(&result.downgrade), vec!["DropTable"]);
    assert_eq!(result.downgrade[0].sql(), "DROP TABLE IF EXISTS `category`");
}

#[test]
fn test_referenced_entity_is_created_first_and_dropped_last() {
    let old = SchemaSnapshot::new();
    let new = snapshot([category(), user()]);
    let result = diff(Dialect::Postgres, &old, &new, &mut NeverRename);

    let created: Vec<&str> = result.upgrade.iter().map(|op| op.kind.table()).collect();
    assert_eq!(created, vec!["user", "category"]);
    let dropped: Vec<&str> = result.downgrade.iter().map(|op| op.kind.table()).collect();
    assert_eq!(dropped, vec!["category", "user"]);
}

#[test]
fn test_removed_entity_has_no_downgrade() {
    let old = snapshot([user(), category()]);
    let new = snapshot([user()]);

    let migrator = Migrator::new(MigratorConfig::new().with_dialect(Dialect::MySql));
    let mut store = MemoryStore::new();
    migrator.migrate_empty("init", &mut store).unwrap();
    let mut version = migrator
        .migrate(&old, &new, "drop_category", &mut store, &mut NeverRename)
        .unwrap()
        .unwrap();

    assert_eq!(kinds(&version.upgrade), vec!["DropTable"]);
    assert!(version.downgrade.is_empty());

    let stored = store.list_versions().unwrap();
    assert_eq!(stored.len(), 2);
    assert!(!stored[1].content.has_downgrade());
    assert!(matches!(
        stored[1].content.downgrade(),
        Err(MigrateError::NoDowngrade(_))
    ));

    version.mark_applied().unwrap();
    assert!(matches!(
        version.mark_reverted(),
        Err(MigrateError::NoDowngrade(_))
    ));
}

// =============================================================================
// Renames
// =============================================================================

fn renamed_post() -> SchemaSnapshot {
    let mut renamed = post();
    renamed.columns[0] = varchar("title", 200);
    snapshot([renamed, tag()])
}

#[test]
fn test_confirmed_rename_is_mirrored_without_second_prompt() {
    let old = snapshot([post(), tag()]);
    let new = renamed_post();
    let mut prompts = Vec::new();
    let mut confirmer = |prompt: &str| {
        prompts.push(prompt.to_string());
        true
    };

    let result = diff(Dialect::Postgres, &old, &new, &mut confirmer);

    assert_eq!(prompts, vec!["Rename 'name' to 'title' in models.Post?"]);
    assert_eq!(kinds(&result.upgrade), vec!["RenameColumn"]);
    assert_eq!(
        result.upgrade[0].sql(),
        r#"ALTER TABLE "post" RENAME COLUMN "name" TO "title""#
    );
    assert_eq!(kinds(&result.downgrade), vec!["RenameColumn"]);
    assert_eq!(
        result.downgrade[0].sql(),
        r#"ALTER TABLE "post" RENAME COLUMN "title" TO "name""#
    );
}

#[test]
fn test_declined_rename_becomes_add_and_drop() {
    let old = snapshot([post(), tag()]);
    let new = renamed_post();
    let mut calls = 0;
    let mut confirmer = |_: &str| {
        calls += 1;
        false
    };

    let result = diff(Dialect::MySql, &old, &new, &mut confirmer);

    assert_eq!(calls, 1);
    assert_eq!(kinds(&result.upgrade), vec!["AddColumn", "DropColumn"]);
    assert_eq!(
        result.upgrade[1].sql(),
        "ALTER TABLE `post` DROP COLUMN `name`"
    );
    assert_eq!(kinds(&result.downgrade), vec!["AddColumn", "DropColumn"]);
    assert_eq!(
        result.downgrade[1].sql(),
        "ALTER TABLE `post` DROP COLUMN `title`"
    );
}

// =============================================================================
// Sequencing
// =============================================================================

#[test]
fn test_index_drops_lead_and_index_adds_trail() {
    let old = snapshot([user()]);
    let mut changed = user();
    changed.columns.retain(|c| c.name != "username");
    changed = changed.column(varchar("handle", 40).indexed());
    let new = snapshot([changed]);

    let result = diff(Dialect::Postgres, &old, &new, &mut NeverRename);

    assert_eq!(
        kinds(&result.upgrade),
        vec!["DropIndex", "AddColumn", "DropColumn", "AddIndex"]
    );
    assert_eq!(
        result.upgrade[0].sql(),
        r#"DROP INDEX "uid_user_usernam_9987ab""#
    );
    assert_eq!(
        kinds(&result.downgrade),
        vec!["DropIndex", "AddColumn", "DropColumn", "AddIndex"]
    );
    assert!(result.downgrade[3].sql().contains("uid_user_usernam_9987ab"));
}

#[test]
fn test_index_on_existing_column_follows_added_column() {
    let old = snapshot([user()]);
    let mut changed = user();
    changed.columns[1] = varchar("email", 200)
        .description("Contact address")
        .unique();
    changed = changed.column(text("bio").nullable());
    let new = snapshot([changed]);

    let result = diff(Dialect::Postgres, &old, &new, &mut NeverRename);

    assert_eq!(kinds(&result.upgrade), vec!["AddColumn", "AddIndex"]);
    assert_eq!(
        result.upgrade[0].sql(),
        r#"ALTER TABLE "user" ADD COLUMN "bio" TEXT"#
    );
    assert!(result.upgrade[1]
        .sql()
        .ends_with(r#"ON "user" ("email")"#));
    assert_eq!(kinds(&result.downgrade), vec!["DropIndex", "DropColumn"]);
}

#[test]
fn test_index_drop_on_existing_column_precedes_column_drop() {
    let old = snapshot([user()]);
    let mut changed = user();
    changed.columns[0] = varchar("username", 20);
    changed.columns.retain(|c| c.name != "email");
    let new = snapshot([changed]);

    let result = diff(Dialect::Postgres, &old, &new, &mut NeverRename);

    assert_eq!(kinds(&result.upgrade), vec!["DropIndex", "DropColumn"]);
    assert_eq!(
        result.upgrade[0].sql(),
        r#"DROP INDEX "uid_user_usernam_9987ab""#
    );
    assert_eq!(
        result.upgrade[1].sql(),
        r#"ALTER TABLE "user" DROP COLUMN "email""#
    );

    assert_eq!(kinds(&result.downgrade), vec!["AddColumn", "AddIndex"]);
    assert_eq!(
        result.downgrade[0].statements,
        vec![
            r#"ALTER TABLE "user" ADD COLUMN "email" VARCHAR(200) NOT NULL"#.to_string(),
            r#"COMMENT ON COLUMN "user"."email" IS 'Contact address'"#.to_string(),
        ]
    );
}

#[test]
fn test_join_table_created_once_for_both_sides() {
    let old = SchemaSnapshot::new();
    let new = snapshot([post(), tag()]);

    let result = diff(Dialect::Postgres, &old, &new, &mut NeverRename);

    assert_eq!(
        kinds(&result.upgrade),
        vec!["CreateTable", "CreateTable", "CreateJoinTable"]
    );
    assert_eq!(
        kinds(&result.downgrade),
        vec!["DropJoinTable", "DropTable", "DropTable"]
    );
    assert_eq!(result.downgrade[0].sql(), r#"DROP TABLE IF EXISTS "post_tag""#);
}

// =============================================================================
// Dialect gating and persistence
// =============================================================================

#[test]
fn test_unsupported_operation_writes_no_artifact() {
    let tmp = tempfile::tempdir().unwrap();
    let mut store = DirectoryStore::open(tmp.path().join("migrations")).unwrap();
    let migrator = Migrator::new(MigratorConfig::new().with_dialect(Dialect::Sqlite));

    let initial = snapshot([user()]);
    migrator
        .migrate(&SchemaSnapshot::new(), &initial, "init", &mut store, &mut NeverRename)
        .unwrap()
        .unwrap();

    let mut changed = user();
    changed.columns.retain(|c| c.name != "email");
    let err = migrator
        .migrate(&initial, &snapshot([changed]), "drop_email", &mut store, &mut NeverRename)
        .unwrap_err();

    match err {
        MigrateError::UnsupportedOperation { dialect, operation } => {
            assert_eq!(dialect, Dialect::Sqlite);
            assert_eq!(operation, "DropColumn");
        }
        other => panic!("Expected UnsupportedOperation, got {other:?}"),
    }
    assert_eq!(store.list_versions().unwrap().len(), 1);
    assert_eq!(std::fs::read_dir(store.dir()).unwrap().count(), 1);
}

#[test]
fn test_artifact_written_to_directory() {
    let tmp = tempfile::tempdir().unwrap();
    let mut store = DirectoryStore::open(tmp.path()).unwrap();
    let migrator = Migrator::new(MigratorConfig::new().with_dialect(Dialect::Postgres));

    migrator.migrate_empty("init", &mut store).unwrap();
    let version = migrator
        .migrate(
            &snapshot([user()]),
            &snapshot([user(), category()]),
            "add_category",
            &mut store,
            &mut NeverRename,
        )
        .unwrap()
        .unwrap();

    assert_eq!(version.sequence, 1);
    let path = store.dir().join(format!("{}.sql", version.name()));
    let text = std::fs::read_to_string(path).unwrap();
    assert!(text.starts_with("-- upgrade --\nCREATE TABLE IF NOT EXISTS \"category\""));
    assert!(text.ends_with("-- downgrade --\nDROP TABLE IF EXISTS \"category\";\n"));

    let stored = store.list_versions().unwrap();
    assert_eq!(stored[1].name, version.name());
    assert_eq!(
        stored[1].content.downgrade().unwrap(),
        &["DROP TABLE IF EXISTS \"category\"".to_string()]
    );
}

#[test]
fn test_snapshot_survives_json() {
    let schema = snapshot([user(), category(), post(), tag()]);
    let restored = SchemaSnapshot::from_json(&schema.to_json().unwrap()).unwrap();
    assert_eq!(restored, schema);
    assert!(diff(Dialect::MySql, &schema, &restored, &mut NeverRename).is_empty());
}
