//! Relation accessors between entities.

use queryget_proto::RelationLink;
use serde::{Deserialize, Serialize};

use super::EntityDef;

/// Kind of a relation, seen from the entity that declares it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// The declaring entity holds the foreign key (belongs-to).
    Owning,
    /// The related entity holds the foreign key (has-one / has-many).
    Owned,
    /// Owning, with a type column next to the foreign key (morph-to).
    PolymorphicOwning,
    /// Owned, with a type column on the related entity (morph-one / morph-many).
    PolymorphicOwned,
    /// Linked through a pivot table. Not supported by the planner.
    ManyToMany,
}

impl RelationKind {
    /// Check if the foreign key lives on the declaring entity.
    pub fn is_owning(&self) -> bool {
        matches!(self, RelationKind::Owning | RelationKind::PolymorphicOwning)
    }

    /// Check if the relation carries a type column.
    pub fn is_polymorphic(&self) -> bool {
        matches!(
            self,
            RelationKind::PolymorphicOwning | RelationKind::PolymorphicOwned
        )
    }
}

/// A relation accessor on an entity.
///
/// `foreign_key` and `owner_key` are unqualified column names. For owning
/// kinds the foreign key is on the declaring entity and the owner key on the
/// related entity; owned kinds swap the sides. An empty owner key names the
/// primary key of the entity that holds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDef {
    /// Accessor name.
    pub name: String,
    /// Name of the related entity.
    pub related_entity: String,
    /// Relation kind.
    pub kind: RelationKind,
    /// Foreign key column.
    #[serde(default)]
    pub foreign_key: String,
    /// Key column the foreign key points at; empty for the primary key.
    #[serde(default)]
    pub owner_key: String,
    /// Type column for polymorphic relations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub morph_type: Option<String>,
}

impl RelationDef {
    fn with_kind(
        name: impl Into<String>,
        kind: RelationKind,
        related_entity: impl Into<String>,
        foreign_key: impl Into<String>,
        owner_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            related_entity: related_entity.into(),
            kind,
            foreign_key: foreign_key.into(),
            owner_key: owner_key.into(),
            morph_type: None,
        }
    }

    /// Create a belongs-to relation: `self.foreign_key -> related.owner_key`.
    pub fn owning(
        name: impl Into<String>,
        related_entity: impl Into<String>,
        foreign_key: impl Into<String>,
        owner_key: impl Into<String>,
    ) -> Self {
        Self::with_kind(name, RelationKind::Owning, related_entity, foreign_key, owner_key)
    }

    /// Create a has-one/has-many relation: `related.foreign_key -> self.owner_key`.
    pub fn owned(
        name: impl Into<String>,
        related_entity: impl Into<String>,
        foreign_key: impl Into<String>,
        owner_key: impl Into<String>,
    ) -> Self {
        Self::with_kind(name, RelationKind::Owned, related_entity, foreign_key, owner_key)
    }

    /// Create a morph-to relation with its type column on the declaring entity.
    pub fn polymorphic_owning(
        name: impl Into<String>,
        related_entity: impl Into<String>,
        foreign_key: impl Into<String>,
        morph_type: impl Into<String>,
        owner_key: impl Into<String>,
    ) -> Self {
        let mut relation = Self::with_kind(
            name,
            RelationKind::PolymorphicOwning,
            related_entity,
            foreign_key,
            owner_key,
        );
        relation.morph_type = Some(morph_type.into());
        relation
    }

    /// Create a morph-one/morph-many relation with its type column on the related entity.
    pub fn polymorphic_owned(
        name: impl Into<String>,
        related_entity: impl Into<String>,
        foreign_key: impl Into<String>,
        morph_type: impl Into<String>,
        owner_key: impl Into<String>,
    ) -> Self {
        let mut relation = Self::with_kind(
            name,
            RelationKind::PolymorphicOwned,
            related_entity,
            foreign_key,
            owner_key,
        );
        relation.morph_type = Some(morph_type.into());
        relation
    }

    /// Create a many-to-many relation.
    pub fn many_to_many(name: impl Into<String>, related_entity: impl Into<String>) -> Self {
        Self::with_kind(name, RelationKind::ManyToMany, related_entity, "", "id")
    }

    /// Check if this is a many-to-many relation.
    pub fn is_many_to_many(&self) -> bool {
        self.kind == RelationKind::ManyToMany
    }

    /// Owner key column on `owner`, falling back to its primary key.
    pub fn owner_column<'a>(&'a self, owner: &'a EntityDef) -> &'a str {
        if self.owner_key.is_empty() {
            &owner.key
        } else {
            &self.owner_key
        }
    }

    /// Key link between a parent row and its related rows.
    ///
    /// Returns `None` for many-to-many relations.
    pub fn link(&self, parent: &EntityDef, related: &EntityDef) -> Option<RelationLink> {
        let (parent_column, related_column) = match self.kind {
            RelationKind::ManyToMany => return None,
            RelationKind::Owning | RelationKind::PolymorphicOwning => (
                parent.column(&self.foreign_key),
                related.column(self.owner_column(related)),
            ),
            RelationKind::Owned | RelationKind::PolymorphicOwned => (
                parent.column(self.owner_column(parent)),
                related.column(&self.foreign_key),
            ),
        };
        let link = RelationLink::new(&self.name, &related.table, parent_column, related_column);

        Some(match (self.kind, &self.morph_type) {
            (RelationKind::PolymorphicOwning, Some(morph)) => {
                link.with_morph(parent.column(morph), &related.name)
            }
            (RelationKind::PolymorphicOwned, Some(morph)) => {
                link.with_morph(related.column(morph), &parent.name)
            }
            _ => link,
        })
    }

    /// Qualified columns the parent must select to hydrate this relation.
    pub fn parent_key_columns(&self, parent: &EntityDef) -> Vec<String> {
        match self.kind {
            RelationKind::Owning => vec![parent.column(&self.foreign_key)],
            RelationKind::PolymorphicOwning => {
                let mut columns = vec![parent.column(&self.foreign_key)];
                columns.extend(self.morph_type.as_deref().map(|m| parent.column(m)));
                columns
            }
            RelationKind::Owned | RelationKind::PolymorphicOwned => {
                vec![parent.column(self.owner_column(parent))]
            }
            RelationKind::ManyToMany => vec![],
        }
    }

    /// Qualified columns the related entity must select to be matched to its parent.
    pub fn child_key_columns(&self, related: &EntityDef) -> Vec<String> {
        match self.kind {
            RelationKind::Owning | RelationKind::PolymorphicOwning => {
                vec![related.column(self.owner_column(related))]
            }
            RelationKind::Owned => vec![related.column(&self.foreign_key)],
            RelationKind::PolymorphicOwned => {
                let mut columns = vec![related.column(&self.foreign_key)];
                columns.extend(self.morph_type.as_deref().map(|m| related.column(m)));
                columns
            }
            RelationKind::ManyToMany => vec![],
        }
    }
}
