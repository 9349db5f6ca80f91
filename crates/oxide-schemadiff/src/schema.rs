//! Schema snapshot types.
//!
//! A [`SchemaSnapshot`] is the complete structural description of a modeled
//! schema at one point in time. Two snapshots are compared by the diff engine;
//! neither is mutated during comparison.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::dialect::Dialect;
use crate::error::{MigrateError, Result};

/// Logical scalar kind of a column, independent of the dialect's physical type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarKind {
    /// 16-bit integer.
    SmallInt,
    /// 32-bit integer.
    Int,
    /// 64-bit integer.
    BigInt,
    /// Boolean.
    Bool,
    /// Bounded character string.
    Char,
    /// Unbounded text.
    Text,
    /// Fixed-point decimal.
    Decimal,
    /// Floating point.
    Float,
    /// Date only.
    Date,
    /// Time only.
    Time,
    /// Date and time.
    Datetime,
    /// JSON document.
    Json,
    /// UUID.
    Uuid,
    /// Binary data.
    Binary,
}

/// Physical column type with optional per-dialect overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalType {
    /// Type used when a dialect has no override.
    pub default: String,
    /// Dialect-specific replacements for `default`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub overrides: BTreeMap<Dialect, String>,
}

impl PhysicalType {
    /// Creates a physical type without overrides.
    #[must_use]
    pub fn new(default: impl Into<String>) -> Self {
        Self {
            default: default.into(),
            overrides: BTreeMap::new(),
        }
    }

    /// Adds an override for one dialect.
    #[must_use]
    pub fn with_override(mut self, dialect: Dialect, sql_type: impl Into<String>) -> Self {
        self.overrides.insert(dialect, sql_type.into());
        self
    }

    /// Returns the type to render for `dialect`.
    #[must_use]
    pub fn for_dialect(&self, dialect: Dialect) -> &str {
        self.overrides
            .get(&dialect)
            .map_or(self.default.as_str(), String::as_str)
    }
}

/// A literal column default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LiteralValue {
    /// NULL default.
    Null,
    /// Boolean default.
    Bool(bool),
    /// Integer default.
    Integer(i64),
    /// Float default.
    Float(f64),
    /// String default.
    String(String),
    /// Raw SQL expression.
    Expression(String),
}

impl LiteralValue {
    /// Returns the SQL representation of this literal for `dialect`.
    #[must_use]
    pub fn to_sql(&self, dialect: Dialect) -> String {
        match self {
            Self::Null => "NULL".to_string(),
            Self::Bool(b) => match (dialect, b) {
                (Dialect::Postgres, true) => "TRUE".to_string(),
                (Dialect::Postgres, false) => "FALSE".to_string(),
                (_, true) => "1".to_string(),
                (_, false) => "0".to_string(),
            },
            Self::Integer(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::String(s) => format!("'{}'", s.replace('\'', "''")),
            Self::Expression(expr) => expr.clone(),
        }
    }
}

/// Default of a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum ColumnDefault {
    /// No default.
    #[default]
    None,
    /// A literal value.
    Literal(LiteralValue),
    /// Filled with the current timestamp when the row is written.
    GeneratedAtWrite {
        /// Also refreshed on every update.
        on_update: bool,
    },
    /// Computed by application code; cannot be compared or rendered.
    Callable(String),
}

impl ColumnDefault {
    /// Whether this default is the non-comparable callable marker.
    #[must_use]
    pub fn is_callable(&self) -> bool {
        matches!(self, Self::Callable(_))
    }
}

/// Foreign key action (ON DELETE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ForeignKeyAction {
    /// No action (error if referenced row is deleted).
    #[default]
    NoAction,
    /// Restrict (same as NoAction but checked immediately).
    Restrict,
    /// Cascade the delete to referencing rows.
    Cascade,
    /// Set the foreign key column to NULL.
    SetNull,
    /// Set the foreign key column to its default value.
    SetDefault,
}

impl ForeignKeyAction {
    /// Returns the SQL representation of this action.
    #[must_use]
    pub fn to_sql(&self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }
}

fn default_true() -> bool {
    true
}

/// Description of a data column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Logical (model field) name.
    pub name: String,
    /// Physical column name.
    pub db_column: String,
    /// Logical scalar kind.
    pub kind: ScalarKind,
    /// Physical type, per dialect.
    pub physical_type: PhysicalType,
    /// Whether the column allows NULL values.
    #[serde(default)]
    pub nullable: bool,
    /// Whether the column has a UNIQUE index.
    #[serde(default)]
    pub unique: bool,
    /// Whether the column has a plain index.
    #[serde(default)]
    pub indexed: bool,
    /// Column default.
    #[serde(default)]
    pub default: ColumnDefault,
    /// Column comment.
    #[serde(default)]
    pub description: Option<String>,
    /// Whether the database generates the value (auto-increment keys).
    #[serde(default)]
    pub generated: bool,
}

impl ColumnDescriptor {
    /// Creates a NOT NULL column whose physical name equals its logical name.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ScalarKind, physical_type: PhysicalType) -> Self {
        let name = name.into();
        Self {
            db_column: name.clone(),
            name,
            kind,
            physical_type,
            nullable: false,
            unique: false,
            indexed: false,
            default: ColumnDefault::None,
            description: None,
            generated: false,
        }
    }

    /// Sets the physical column name.
    #[must_use]
    pub fn db_column(mut self, db_column: impl Into<String>) -> Self {
        self.db_column = db_column.into();
        self
    }

    /// Allows NULL values.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Adds a UNIQUE index.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Adds a plain index.
    #[must_use]
    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    /// Sets the default.
    #[must_use]
    pub fn default_value(mut self, default: ColumnDefault) -> Self {
        self.default = default;
        self
    }

    /// Sets the column comment.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Marks the value as database-generated.
    #[must_use]
    pub fn generated(mut self) -> Self {
        self.generated = true;
        self
    }

    /// Overrides the physical type for one dialect.
    #[must_use]
    pub fn type_for(mut self, dialect: Dialect, sql_type: impl Into<String>) -> Self {
        self.physical_type = self.physical_type.with_override(dialect, sql_type);
        self
    }

    /// Whether the column carries any index. A unique column always does.
    #[must_use]
    pub fn has_index(&self) -> bool {
        self.unique || self.indexed
    }

    /// Whether both columns are identical apart from their names.
    #[must_use]
    pub fn same_shape(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.physical_type == other.physical_type
            && self.nullable == other.nullable
            && self.unique == other.unique
            && self.indexed == other.indexed
            && self.default == other.default
            && self.description == other.description
            && self.generated == other.generated
    }

    /// The single-column index implied by `unique`/`indexed`, if any.
    #[must_use]
    pub fn implied_index(&self) -> Option<IndexDescriptor> {
        if !self.has_index() {
            return None;
        }
        let index = IndexDescriptor::new([self.db_column.clone()]);
        Some(if self.unique { index.unique() } else { index })
    }
}

/// `INT` column.
#[must_use]
pub fn int(name: impl Into<String>) -> ColumnDescriptor {
    ColumnDescriptor::new(name, ScalarKind::Int, PhysicalType::new("INT"))
}

/// `BIGINT` column.
#[must_use]
pub fn bigint(name: impl Into<String>) -> ColumnDescriptor {
    ColumnDescriptor::new(name, ScalarKind::BigInt, PhysicalType::new("BIGINT"))
}

/// `VARCHAR(max_length)` column.
#[must_use]
pub fn varchar(name: impl Into<String>, max_length: usize) -> ColumnDescriptor {
    ColumnDescriptor::new(
        name,
        ScalarKind::Char,
        PhysicalType::new(format!("VARCHAR({max_length})")),
    )
}

/// Unbounded text column.
#[must_use]
pub fn text(name: impl Into<String>) -> ColumnDescriptor {
    ColumnDescriptor::new(
        name,
        ScalarKind::Text,
        PhysicalType::new("TEXT").with_override(Dialect::MySql, "LONGTEXT"),
    )
}

/// Boolean column.
#[must_use]
pub fn boolean(name: impl Into<String>) -> ColumnDescriptor {
    ColumnDescriptor::new(
        name,
        ScalarKind::Bool,
        PhysicalType::new("BOOL").with_override(Dialect::Sqlite, "INT"),
    )
}

/// Timestamp column.
#[must_use]
pub fn datetime(name: impl Into<String>) -> ColumnDescriptor {
    ColumnDescriptor::new(
        name,
        ScalarKind::Datetime,
        PhysicalType::new("TIMESTAMP")
            .with_override(Dialect::MySql, "DATETIME(6)")
            .with_override(Dialect::Postgres, "TIMESTAMPTZ"),
    )
}

/// `DECIMAL(precision,scale)` column.
#[must_use]
pub fn decimal(name: impl Into<String>, precision: u8, scale: u8) -> ColumnDescriptor {
    ColumnDescriptor::new(
        name,
        ScalarKind::Decimal,
        PhysicalType::new(format!("DECIMAL({precision},{scale})"))
            .with_override(Dialect::Sqlite, "VARCHAR(40)"),
    )
}

/// JSON column.
#[must_use]
pub fn json(name: impl Into<String>) -> ColumnDescriptor {
    ColumnDescriptor::new(
        name,
        ScalarKind::Json,
        PhysicalType::new("JSON").with_override(Dialect::Postgres, "JSONB"),
    )
}

/// UUID column.
#[must_use]
pub fn uuid(name: impl Into<String>) -> ColumnDescriptor {
    ColumnDescriptor::new(
        name,
        ScalarKind::Uuid,
        PhysicalType::new("CHAR(36)").with_override(Dialect::Postgres, "UUID"),
    )
}

/// A foreign-key relation from one entity to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyDescriptor {
    /// Logical relation name.
    pub name: String,
    /// Physical source column in the owning table.
    pub source_column: String,
    /// Referenced entity name.
    pub target_entity: String,
    /// Referenced physical column.
    pub target_column: String,
    /// Action on delete.
    #[serde(default)]
    pub on_delete: ForeignKeyAction,
    /// Whether a physical constraint backs the relation.
    #[serde(default = "default_true")]
    pub db_constraint: bool,
}

impl ForeignKeyDescriptor {
    /// Creates an enforced relation targeting `target_entity.id`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        source_column: impl Into<String>,
        target_entity: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            source_column: source_column.into(),
            target_entity: target_entity.into(),
            target_column: "id".to_string(),
            on_delete: ForeignKeyAction::NoAction,
            db_constraint: true,
        }
    }

    /// Sets the referenced column.
    #[must_use]
    pub fn target_column(mut self, column: impl Into<String>) -> Self {
        self.target_column = column.into();
        self
    }

    /// Sets the ON DELETE action.
    #[must_use]
    pub fn on_delete(mut self, action: ForeignKeyAction) -> Self {
        self.on_delete = action;
        self
    }

    /// Keeps the relation logical only.
    #[must_use]
    pub fn without_constraint(mut self) -> Self {
        self.db_constraint = false;
        self
    }
}

/// One side of a join table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinLeg {
    /// Column in the join table.
    pub column: String,
    /// Physical type of the join column.
    pub physical_type: PhysicalType,
    /// Entity the column references.
    pub target_entity: String,
    /// Referenced physical column.
    pub target_column: String,
}

impl JoinLeg {
    /// Creates a leg referencing `target_entity.id`.
    #[must_use]
    pub fn new(
        column: impl Into<String>,
        physical_type: PhysicalType,
        target_entity: impl Into<String>,
    ) -> Self {
        Self {
            column: column.into(),
            physical_type,
            target_entity: target_entity.into(),
            target_column: "id".to_string(),
        }
    }
}

/// A many-to-many relation backed by a join table.
///
/// The same relation is usually visible from both related entities; the
/// join-table name (`through`) identifies it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManyToManyDescriptor {
    /// Join-table name.
    pub through: String,
    /// Leg pointing at the related entity.
    pub forward: JoinLeg,
    /// Leg pointing back at the declaring entity.
    pub backward: JoinLeg,
    /// ON DELETE action of the forward leg.
    #[serde(default)]
    pub on_delete: ForeignKeyAction,
    /// Whether the join columns carry FK constraints.
    #[serde(default = "default_true")]
    pub db_constraint: bool,
    /// Join-table comment.
    #[serde(default)]
    pub description: Option<String>,
}

impl ManyToManyDescriptor {
    /// Creates an enforced relation with cascading deletes.
    #[must_use]
    pub fn new(through: impl Into<String>, forward: JoinLeg, backward: JoinLeg) -> Self {
        Self {
            through: through.into(),
            forward,
            backward,
            on_delete: ForeignKeyAction::Cascade,
            db_constraint: true,
            description: None,
        }
    }

    /// Sets the join-table comment.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The same relation as seen from the other entity.
    #[must_use]
    pub fn mirrored(&self) -> Self {
        Self {
            forward: self.backward.clone(),
            backward: self.forward.clone(),
            ..self.clone()
        }
    }
}

/// An index over physical columns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IndexDescriptor {
    /// Indexed physical columns, in order.
    pub columns: Vec<String>,
    /// Whether the index is unique.
    #[serde(default)]
    pub unique: bool,
    /// Explicit name; generated when absent.
    #[serde(default)]
    pub name: Option<String>,
}

impl IndexDescriptor {
    /// Creates a plain index.
    #[must_use]
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            unique: false,
            name: None,
        }
    }

    /// Makes the index unique.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Gives the index an explicit name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Description of one entity (table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDescriptor {
    /// Qualified entity name.
    pub name: String,
    /// Physical table name.
    pub table: String,
    /// Primary-key column.
    pub primary_key: ColumnDescriptor,
    /// Data columns, in rendering order.
    #[serde(default)]
    pub columns: Vec<ColumnDescriptor>,
    /// Foreign-key relations.
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKeyDescriptor>,
    /// Many-to-many relations.
    #[serde(default)]
    pub many_to_many: Vec<ManyToManyDescriptor>,
    /// Explicit indexes.
    #[serde(default)]
    pub indexes: Vec<IndexDescriptor>,
    /// Unique-together column tuples.
    #[serde(default)]
    pub unique_together: Vec<Vec<String>>,
    /// Table comment.
    #[serde(default)]
    pub description: Option<String>,
}

impl EntityDescriptor {
    /// Creates an entity with only a primary key.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        table: impl Into<String>,
        primary_key: ColumnDescriptor,
    ) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            primary_key,
            columns: Vec::new(),
            foreign_keys: Vec::new(),
            many_to_many: Vec::new(),
            indexes: Vec::new(),
            unique_together: Vec::new(),
            description: None,
        }
    }

    /// Adds a data column.
    #[must_use]
    pub fn column(mut self, column: ColumnDescriptor) -> Self {
        self.columns.push(column);
        self
    }

    /// Adds a foreign-key relation.
    #[must_use]
    pub fn foreign_key(mut self, fk: ForeignKeyDescriptor) -> Self {
        self.foreign_keys.push(fk);
        self
    }

    /// Adds a many-to-many relation.
    #[must_use]
    pub fn many_to_many(mut self, m2m: ManyToManyDescriptor) -> Self {
        self.many_to_many.push(m2m);
        self
    }

    /// Adds an explicit index.
    #[must_use]
    pub fn index(mut self, index: IndexDescriptor) -> Self {
        self.indexes.push(index);
        self
    }

    /// Adds a unique-together tuple.
    #[must_use]
    pub fn unique_together<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unique_together
            .push(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the table comment.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Looks up a data column by logical name.
    #[must_use]
    pub fn get_column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Returns the set of table-level indexes: explicit indexes plus
    /// unique-together tuples.
    #[must_use]
    pub fn index_set(&self) -> BTreeSet<IndexDescriptor> {
        self.indexes
            .iter()
            .cloned()
            .chain(
                self.unique_together
                    .iter()
                    .map(|cols| IndexDescriptor::new(cols.iter().cloned()).unique()),
            )
            .collect()
    }

    fn physical_columns(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary_key.db_column.as_str())
            .chain(self.columns.iter().map(|c| c.db_column.as_str()))
    }

    fn validate(&self, snapshot: &SchemaSnapshot) -> Result<()> {
        let invalid = |message: String| {
            Err(MigrateError::InvalidSnapshot(format!(
                "entity '{}': {message}",
                self.name
            )))
        };

        if self.table.is_empty() {
            return invalid("empty table name".to_string());
        }

        let mut names = HashSet::new();
        for column in std::iter::once(&self.primary_key).chain(&self.columns) {
            if !names.insert(column.name.as_str()) {
                return invalid(format!("duplicate column '{}'", column.name));
            }
        }

        let mut physical = HashSet::new();
        for db_column in self.physical_columns() {
            if !physical.insert(db_column) {
                return invalid(format!("duplicate physical column '{db_column}'"));
            }
        }

        for fk in &self.foreign_keys {
            if !physical.contains(fk.source_column.as_str()) {
                return invalid(format!(
                    "foreign key '{}' uses unknown column '{}'",
                    fk.name, fk.source_column
                ));
            }
            if !snapshot.entities.contains_key(&fk.target_entity) {
                return invalid(format!(
                    "foreign key '{}' targets unknown entity '{}'",
                    fk.name, fk.target_entity
                ));
            }
        }

        for m2m in &self.many_to_many {
            for leg in [&m2m.forward, &m2m.backward] {
                if !snapshot.entities.contains_key(&leg.target_entity) {
                    return invalid(format!(
                        "join table '{}' targets unknown entity '{}'",
                        m2m.through, leg.target_entity
                    ));
                }
            }
        }

        for index in self.index_set() {
            if index.columns.is_empty() {
                return invalid("index without columns".to_string());
            }
            if let Some(column) = index.columns.iter().find(|c| !physical.contains(c.as_str())) {
                return invalid(format!("index over unknown column '{column}'"));
            }
        }

        Ok(())
    }
}

/// Complete structural description of a schema at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    /// Entities by qualified name.
    pub entities: BTreeMap<String, EntityDescriptor>,
}

impl SchemaSnapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entity, keyed by its name.
    #[must_use]
    pub fn with_entity(mut self, entity: EntityDescriptor) -> Self {
        self.insert(entity);
        self
    }

    /// Inserts or replaces an entity.
    pub fn insert(&mut self, entity: EntityDescriptor) {
        self.entities.insert(entity.name.clone(), entity);
    }

    /// Looks up an entity.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&EntityDescriptor> {
        self.entities.get(name)
    }

    /// Resolves an entity name to its table name.
    pub fn table_of(&self, entity: &str) -> Result<&str> {
        self.entities
            .get(entity)
            .map(|e| e.table.as_str())
            .ok_or_else(|| MigrateError::InvalidSnapshot(format!("unknown entity '{entity}'")))
    }

    /// Checks the snapshot for structural mistakes.
    pub fn validate(&self) -> Result<()> {
        let mut tables = HashSet::new();
        for (key, entity) in &self.entities {
            if key != &entity.name {
                return Err(MigrateError::InvalidSnapshot(format!(
                    "entity '{}' stored under key '{key}'",
                    entity.name
                )));
            }
            if !tables.insert(entity.table.as_str()) {
                return Err(MigrateError::InvalidSnapshot(format!(
                    "table '{}' declared by more than one entity",
                    entity.table
                )));
            }
            entity.validate(self)?;
        }
        Ok(())
    }

    /// Parses and validates a snapshot from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Self = serde_json::from_str(json)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Serializes the snapshot to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
