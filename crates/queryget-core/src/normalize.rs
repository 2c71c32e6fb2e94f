//! Declaration normalization.
//!
//! Every declaration kind is normalized into a canonical
//! `alias -> (mode, key)` table. Queryable entries come first and are
//! overridden alias by alias by the kind-specific declarations.

use std::collections::BTreeMap;

use crate::catalog::{Declaration, DeclarationKind, EntityDef};
use crate::error::{Error, Result};

/// One normalized alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableEntry {
    /// Public alias.
    pub alias: String,
    /// Declared mode, preserved verbatim.
    pub mode: Option<String>,
    /// Storage key: column, relation accessor or hook key.
    pub key: String,
    /// Related entity when the key names a relation accessor.
    pub related_entity: Option<String>,
}

impl TableEntry {
    /// Check if the key names a relation accessor.
    pub fn is_relation(&self) -> bool {
        self.related_entity.is_some()
    }
}

/// Canonical lookup table for one entity and declaration kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedTable {
    entity: String,
    kind: DeclarationKind,
    entries: BTreeMap<String, TableEntry>,
}

impl NormalizedTable {
    /// Normalize the declarations of `kind` on an entity.
    ///
    /// Fails when the entity declares neither the kind nor any queryable
    /// entry contributing to it.
    pub fn normalize(entity: &EntityDef, kind: DeclarationKind) -> Result<Self> {
        let shared = match kind {
            DeclarationKind::Queryable => None,
            _ => entity.queryable.as_deref(),
        };
        let own = entity.declarations(kind);

        if shared.is_none() && own.is_none() {
            return match kind {
                DeclarationKind::Queryable => Ok(Self::empty(entity, kind)),
                DeclarationKind::Filterable => Err(Error::NotFilterable(entity.name.clone())),
                DeclarationKind::Sortable => Err(Error::NotSortable(entity.name.clone())),
                DeclarationKind::Selectable => Err(Error::NotSelectable(entity.name.clone())),
            };
        }

        let mut table = Self::empty(entity, kind);
        for decl in shared.unwrap_or_default() {
            if decl.capabilities().allows(kind) {
                table.insert(entity, decl)?;
            }
        }
        for decl in own.unwrap_or_default() {
            table.insert(entity, decl)?;
        }
        Ok(table)
    }

    fn empty(entity: &EntityDef, kind: DeclarationKind) -> Self {
        Self {
            entity: entity.name.clone(),
            kind,
            entries: BTreeMap::new(),
        }
    }

    fn insert(&mut self, entity: &EntityDef, decl: &Declaration) -> Result<()> {
        validate(entity, decl)?;
        let key = decl.key().to_string();
        let related_entity = entity.relation(&key).map(|r| r.related_entity.clone());
        self.entries.insert(
            decl.alias().to_string(),
            TableEntry {
                alias: decl.alias().to_string(),
                mode: decl.mode().map(str::to_string),
                key,
                related_entity,
            },
        );
        Ok(())
    }

    /// Entity the table belongs to.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Declaration kind of the table.
    pub fn kind(&self) -> DeclarationKind {
        self.kind
    }

    /// Look up an alias.
    pub fn get(&self, alias: &str) -> Option<&TableEntry> {
        self.entries.get(alias)
    }

    /// Entries in alias order.
    pub fn entries(&self) -> impl Iterator<Item = &TableEntry> {
        self.entries.values()
    }

    /// Aliases in order.
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of aliases.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no alias is declared.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Check every declaration of an entity without building tables.
pub fn validate_entity(entity: &EntityDef) -> Result<()> {
    for kind in [
        DeclarationKind::Queryable,
        DeclarationKind::Filterable,
        DeclarationKind::Sortable,
        DeclarationKind::Selectable,
    ] {
        for decl in entity.declarations(kind).unwrap_or_default() {
            validate(entity, decl)?;
        }
    }
    Ok(())
}

fn validate(entity: &EntityDef, decl: &Declaration) -> Result<()> {
    let invalid = |reason: String| Error::InvalidDeclaration {
        entity: entity.name.clone(),
        reason,
    };

    let alias = decl.alias();
    if alias.trim().is_empty() {
        return Err(invalid("empty alias".to_string()));
    }
    if alias.contains(['$', '.', ',']) || alias == "*" {
        return Err(invalid(format!("alias {alias:?} contains a reserved character")));
    }
    if decl.key().trim().is_empty() {
        return Err(invalid(format!("alias {alias:?} has an empty key")));
    }
    Ok(())
}
