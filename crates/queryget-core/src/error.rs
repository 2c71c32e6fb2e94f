//! Core error types.

use thiserror::Error;

/// Errors raised while registering entities or compiling a plan.
///
/// Unknown aliases, unresolvable sort paths and exhausted depth are not
/// errors; those requests are skipped. Everything here fails the whole
/// plan-building call.
#[derive(Debug, Error)]
pub enum Error {
    /// Entity is not registered.
    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    /// Entity name registered twice.
    #[error("entity already registered: {0}")]
    DuplicateEntity(String),

    /// A declaration names a relation the entity does not have.
    #[error("{entity} has no relation {relation}")]
    UnknownRelation { entity: String, relation: String },

    /// Relation kind cannot be used for the requested operation.
    #[error("relation {entity}.{relation} is not supported for {operation}")]
    UnsupportedRelation {
        entity: String,
        relation: String,
        operation: &'static str,
    },

    /// Entity declares no filterable aliases.
    #[error("{0} is not filterable")]
    NotFilterable(String),

    /// Entity declares no sortable aliases.
    #[error("{0} is not sortable")]
    NotSortable(String),

    /// Entity declares no selectable aliases.
    #[error("{0} is not selectable")]
    NotSelectable(String),

    /// Malformed declaration entry.
    #[error("invalid declaration on {entity}: {reason}")]
    InvalidDeclaration { entity: String, reason: String },

    /// Malformed only/except/unselect glob pattern.
    #[error("invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    /// Request value cannot be interpreted by the filter mode.
    #[error("invalid value for filter {key}: {reason}")]
    InvalidFilterValue { key: String, reason: String },

    /// A registered hook failed.
    #[error("hook {name} failed: {reason}")]
    Hook { name: String, reason: String },

    /// Plan IR error.
    #[error("plan error: {0}")]
    Plan(#[from] queryget_proto::Error),

    /// Schema file could not be parsed.
    #[error("schema error: {0}")]
    Schema(#[from] serde_json::Error),

    /// Schema file could not be read.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a hook failure.
    pub fn hook(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Hook {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid filter value error.
    pub fn invalid_value(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidFilterValue {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;
