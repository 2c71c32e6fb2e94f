//! Capability declarations.
//!
//! An entity lists its public aliases in up to four declaration maps. Each
//! entry is written in one of three shorthands:
//!
//! - bare: `"title"`, the alias is also the storage key and the mode is left
//!   at its default
//! - `"mode:key"`: `"relation:buyer"`, `"string:title"`, or `":title"` for the
//!   default mode
//! - `"key"`: a value without delimiter names the storage key; the mode stays
//!   at its default
//!
//! Queryable entries may end with a capability list such as
//! `"string:title|filter|sort"`. Without one the entry feeds every table.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The four declaration maps an entity can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclarationKind {
    /// Shared declarations feeding filter, sort and select tables.
    Queryable,
    /// Filter aliases.
    Filterable,
    /// Sort aliases.
    Sortable,
    /// Selection aliases.
    Selectable,
}

impl DeclarationKind {
    /// Capability name used in queryable suffixes and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeclarationKind::Queryable => "all",
            DeclarationKind::Filterable => "filter",
            DeclarationKind::Sortable => "sort",
            DeclarationKind::Selectable => "select",
        }
    }
}

impl fmt::Display for DeclarationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which tables a queryable entry contributes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Capabilities {
    pub filter: bool,
    pub sort: bool,
    pub select: bool,
}

impl Capabilities {
    /// Every capability.
    pub const ALL: Capabilities = Capabilities {
        filter: true,
        sort: true,
        select: true,
    };

    /// No capability.
    pub const NONE: Capabilities = Capabilities {
        filter: false,
        sort: false,
        select: false,
    };

    /// Parse a `|filter|sort|` style list. Unknown words are ignored.
    pub fn parse(list: &str) -> Self {
        let mut caps = Capabilities::NONE;
        for word in list.split('|').map(str::trim) {
            match word.to_ascii_lowercase().as_str() {
                "all" => caps = Capabilities::ALL,
                "filter" => caps.filter = true,
                "sort" => caps.sort = true,
                "select" => caps.select = true,
                _ => {}
            }
        }
        caps
    }

    /// Check if the entry contributes to a table of the given kind.
    pub fn allows(&self, kind: DeclarationKind) -> bool {
        match kind {
            DeclarationKind::Queryable => self.filter && self.sort && self.select,
            DeclarationKind::Filterable => self.filter,
            DeclarationKind::Sortable => self.sort,
            DeclarationKind::Selectable => self.select,
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Capabilities::ALL
    }
}

/// One declaration entry, parsed from its shorthand at registration time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "form", rename_all = "snake_case")]
pub enum Declaration {
    /// Alias only; the alias is the storage key.
    Bare { alias: String },
    /// Alias mapped to a storage key, with an optional mode.
    Typed {
        alias: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mode: Option<String>,
        key: String,
    },
    /// Fully specified entry with an explicit capability set.
    Full {
        alias: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mode: Option<String>,
        key: String,
        #[serde(default)]
        capabilities: Capabilities,
    },
}

impl Declaration {
    /// Bare entry: alias and key are the same, mode is the default.
    pub fn bare(alias: impl Into<String>) -> Self {
        Declaration::Bare {
            alias: alias.into(),
        }
    }

    /// Parse an `alias => "mode:key|caps"` entry.
    pub fn entry(alias: impl Into<String>, raw: &str) -> Self {
        let alias = alias.into();
        let (spec, caps) = match raw.split_once('|') {
            Some((spec, caps)) => (spec, Some(Capabilities::parse(caps))),
            None => (raw, None),
        };

        let (mode, key) = match spec.split_once(':') {
            Some((mode, key)) => (non_empty(mode), key.trim()),
            None => (None, spec.trim()),
        };
        let key = if key.is_empty() {
            alias.clone()
        } else {
            key.to_string()
        };

        match caps {
            Some(capabilities) => Declaration::Full {
                alias,
                mode,
                key,
                capabilities,
            },
            None => Declaration::Typed { alias, mode, key },
        }
    }

    /// Fully specified entry.
    pub fn full(
        alias: impl Into<String>,
        mode: Option<&str>,
        key: impl Into<String>,
        capabilities: Capabilities,
    ) -> Self {
        Declaration::Full {
            alias: alias.into(),
            mode: mode.and_then(non_empty),
            key: key.into(),
            capabilities,
        }
    }

    /// Public alias.
    pub fn alias(&self) -> &str {
        match self {
            Declaration::Bare { alias }
            | Declaration::Typed { alias, .. }
            | Declaration::Full { alias, .. } => alias,
        }
    }

    /// Storage key: a column, a relation accessor or a hook key.
    pub fn key(&self) -> &str {
        match self {
            Declaration::Bare { alias } => alias,
            Declaration::Typed { key, .. } | Declaration::Full { key, .. } => key,
        }
    }

    /// Declared mode, if any.
    pub fn mode(&self) -> Option<&str> {
        match self {
            Declaration::Bare { .. } => None,
            Declaration::Typed { mode, .. } | Declaration::Full { mode, .. } => mode.as_deref(),
        }
    }

    /// Capability set. Only queryable entries are restricted by it.
    pub fn capabilities(&self) -> Capabilities {
        match self {
            Declaration::Full { capabilities, .. } => *capabilities,
            _ => Capabilities::ALL,
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare() {
        let d = Declaration::bare("title");
        assert_eq!(d.alias(), "title");
        assert_eq!(d.key(), "title");
        assert_eq!(d.mode(), None);
    }

    #[test]
    fn test_mode_and_key() {
        let d = Declaration::entry("customer", "relation:buyer");
        assert_eq!(d.alias(), "customer");
        assert_eq!(d.key(), "buyer");
        assert_eq!(d.mode(), Some("relation"));
        assert_eq!(d.capabilities(), Capabilities::ALL);
    }

    #[test]
    fn test_key_without_delimiter() {
        let d = Declaration::entry("headline", "title");
        assert_eq!(d.key(), "title");
        assert_eq!(d.mode(), None);
    }

    #[test]
    fn test_empty_mode_and_key() {
        let d = Declaration::entry("headline", ":title");
        assert_eq!(d.mode(), None);
        assert_eq!(d.key(), "title");

        let d = Declaration::entry("title", "string:");
        assert_eq!(d.mode(), Some("string"));
        assert_eq!(d.key(), "title");
    }

    #[test]
    fn test_capability_suffix() {
        let d = Declaration::entry("title", "string:title|filter|sort");
        assert_eq!(d.key(), "title");
        let caps = d.capabilities();
        assert!(caps.allows(DeclarationKind::Filterable));
        assert!(caps.allows(DeclarationKind::Sortable));
        assert!(!caps.allows(DeclarationKind::Selectable));

        let d = Declaration::entry("title", "string:title|all|");
        assert_eq!(d.capabilities(), Capabilities::ALL);
    }

    #[test]
    fn test_unknown_mode_preserved() {
        let d = Declaration::entry("near", "geohash:location");
        assert_eq!(d.mode(), Some("geohash"));
        assert_eq!(d.key(), "location");
    }
}
