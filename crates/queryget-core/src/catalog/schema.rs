//! JSON schema files.
//!
//! A schema file describes entities without hooks:
//!
//! ```json
//! {
//!   "entities": [
//!     {
//!       "name": "Order",
//!       "table": "orders",
//!       "relations": [
//!         { "name": "buyer", "related_entity": "Customer", "kind": "owning",
//!           "foreign_key": "customer_id" }
//!       ],
//!       "filterable": { "customer": "relation:buyer", "status": "in:" },
//!       "sortable": ["created_at", "status"]
//!     }
//!   ]
//! }
//! ```
//!
//! Declarations are either a list of bare aliases (optionally mixed with
//! `{ "alias": "shorthand" }` objects) or an object mapping aliases to
//! shorthands.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use super::declaration::Declaration;
use super::entity::EntityDef;
use super::relation::RelationDef;
use crate::error::Result;

/// A parsed schema file.
#[derive(Debug, Clone, Deserialize)]
pub struct Schema {
    /// Entity descriptions, in file order.
    pub entities: Vec<EntitySchema>,
}

/// One entity in a schema file.
#[derive(Debug, Clone, Deserialize)]
pub struct EntitySchema {
    pub name: String,
    pub table: String,
    #[serde(default = "default_key")]
    pub key: String,
    #[serde(default)]
    pub relations: Vec<RelationDef>,
    #[serde(default)]
    pub queryable: Option<RawDeclarations>,
    #[serde(default)]
    pub filterable: Option<RawDeclarations>,
    #[serde(default)]
    pub sortable: Option<RawDeclarations>,
    #[serde(default)]
    pub selectable: Option<RawDeclarations>,
}

fn default_key() -> String {
    "id".to_string()
}

/// Declarations as written in a schema file.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawDeclarations {
    /// `["id", "title", { "customer": "relation:buyer" }]`
    List(Vec<RawItem>),
    /// `{ "customer": "relation:buyer", "title": "string:" }`
    Map(BTreeMap<String, String>),
}

/// One item of a declaration list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawItem {
    Bare(String),
    Entries(BTreeMap<String, String>),
}

impl RawDeclarations {
    /// Parse every shorthand into a declaration.
    pub fn parse(&self) -> Vec<Declaration> {
        fn entries(map: &BTreeMap<String, String>) -> impl Iterator<Item = Declaration> + '_ {
            map.iter().map(|(alias, raw)| Declaration::entry(alias, raw))
        }

        match self {
            RawDeclarations::Map(map) => entries(map).collect(),
            RawDeclarations::List(items) => items
                .iter()
                .flat_map(|item| -> Vec<Declaration> {
                    match item {
                        RawItem::Bare(alias) => vec![Declaration::bare(alias)],
                        RawItem::Entries(map) => entries(map).collect(),
                    }
                })
                .collect(),
        }
    }
}

impl Schema {
    /// Parse a schema from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read and parse a schema file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Convert into entity descriptors.
    pub fn into_entities(self) -> Vec<EntityDef> {
        self.entities.into_iter().map(EntitySchema::into_entity).collect()
    }
}

impl EntitySchema {
    /// Convert into an entity descriptor.
    pub fn into_entity(self) -> EntityDef {
        let mut entity = EntityDef::new(self.name, self.table).with_key(self.key);
        for relation in self.relations {
            entity = entity.with_relation(relation);
        }
        entity.queryable = self.queryable.as_ref().map(RawDeclarations::parse);
        entity.filterable = self.filterable.as_ref().map(RawDeclarations::parse);
        entity.sortable = self.sortable.as_ref().map(RawDeclarations::parse);
        entity.selectable = self.selectable.as_ref().map(RawDeclarations::parse);
        entity
    }
}
