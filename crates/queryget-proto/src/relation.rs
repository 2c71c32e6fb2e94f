//! Relation links carried by relation predicates and eager-load projections.

use serde::{Deserialize, Serialize};

/// How a parent row reaches its related rows.
///
/// Both columns are fully qualified. For an owning relation the parent
/// column is the foreign key and the related column the owner key; for an
/// owned relation it is the other way around.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationLink {
    /// Relation accessor name on the parent entity.
    pub name: String,
    /// Storage table of the related entity.
    pub table: String,
    /// Qualified key column on the parent side.
    pub parent_column: String,
    /// Qualified key column on the related side.
    pub related_column: String,
    /// Type discriminator for polymorphic relations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub morph: Option<MorphConstraint>,
}

impl RelationLink {
    /// Create a link between two qualified key columns.
    pub fn new(
        name: impl Into<String>,
        table: impl Into<String>,
        parent_column: impl Into<String>,
        related_column: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            parent_column: parent_column.into(),
            related_column: related_column.into(),
            morph: None,
        }
    }

    /// Add a polymorphic type constraint.
    pub fn with_morph(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.morph = Some(MorphConstraint {
            column: column.into(),
            value: value.into(),
        });
        self
    }
}

/// `column = value` restriction identifying the entity type on a polymorphic link.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MorphConstraint {
    /// Qualified type column.
    pub column: String,
    /// Entity type name stored in the column.
    pub value: String,
}
