//! Entity catalog.
//!
//! The catalog describes entities, their relation accessors, capability
//! declarations and hooks. Everything here is read-only once registered.

mod declaration;
mod entity;
mod hooks;
mod relation;
mod schema;

pub use declaration::{Capabilities, Declaration, DeclarationKind};
pub use entity::EntityDef;
pub use hooks::{
    mode_key, CustomJoin, EntityHooks, FilterHook, JoinContext, JoinHook, SelectContext,
    SelectHook, SortHook,
};
pub use relation::{RelationDef, RelationKind};
pub use schema::{EntitySchema, RawDeclarations, RawItem, Schema};
