#![allow(dead_code)]

use oxide_schemadiff::prelude::*;

pub fn user() -> EntityDescriptor {
    EntityDescriptor::new("models.User", "user", int("id").generated())
        .column(varchar("username", 20).unique())
        .column(varchar("email", 200).description("Contact address"))
}

pub fn category() -> EntityDescriptor {
    EntityDescriptor::new("models.Category", "category", int("id").generated())
        .column(varchar("slug", 100))
        .column(varchar("name", 200))
        .column(int("user_id"))
        .foreign_key(
            ForeignKeyDescriptor::new("user", "user_id", "models.User")
                .on_delete(ForeignKeyAction::Cascade),
        )
}

fn post_tag() -> ManyToManyDescriptor {
    ManyToManyDescriptor::new(
        "post_tag",
        JoinLeg::new("tag_id", PhysicalType::new("INT"), "models.Tag"),
        JoinLeg::new("post_id", PhysicalType::new("INT"), "models.Post"),
    )
}

pub fn post() -> EntityDescriptor {
    EntityDescriptor::new("models.Post", "post", int("id").generated())
        .column(varchar("name", 200))
        .column(text("body").nullable())
        .many_to_many(post_tag())
}

pub fn tag() -> EntityDescriptor {
    EntityDescriptor::new("models.Tag", "tag", int("id").generated())
        .column(varchar("label", 50))
        .many_to_many(post_tag().mirrored())
}

pub fn snapshot(entities: impl IntoIterator<Item = EntityDescriptor>) -> SchemaSnapshot {
    entities
        .into_iter()
        .fold(SchemaSnapshot::new(), SchemaSnapshot::with_entity)
}

pub fn kinds(ops: &[MigrationOperation]) -> Vec<&'static str> {
    ops.iter().map(|op| op.kind.name()).collect()
}

pub fn diff(
    dialect: Dialect,
    old: &SchemaSnapshot,
    new: &SchemaSnapshot,
    confirmer: &mut dyn ConfirmRename,
) -> MigrationDiff {
    DiffEngine::new(DiffOptions::new(dialect))
        .diff(old, new, confirmer)
        .unwrap_or_else(|e| panic!("Diff failed: {e}"))
}
