//! Selection compilation.
//!
//! Requested alias paths are first expanded into a [`SelectionTree`] of
//! concrete aliases (wildcards resolved, scope and depth applied), then
//! turned into a [`Projection`](queryget_proto::Projection) with qualified
//! columns and the key columns each relation needs.

mod compiler;
mod pattern;

use std::collections::{BTreeMap, BTreeSet};

pub use compiler::{expand_selection, project_selection, resolve_selection};
pub use pattern::{PatternTree, SelectionScope};

/// Concrete aliases selected at one level and the relations below it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionTree {
    /// Column aliases.
    pub columns: BTreeSet<String>,
    /// Relation aliases with their own selections.
    pub relations: BTreeMap<String, SelectionTree>,
}

impl SelectionTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() && self.relations.is_empty()
    }

    /// Union another tree into this one.
    pub fn merge(&mut self, other: SelectionTree) {
        self.columns.extend(other.columns);
        for (alias, child) in other.relations {
            self.relations.entry(alias).or_default().merge(child);
        }
    }

    /// Remove every alias the patterns cover.
    ///
    /// Relations left without any selected alias are detached.
    pub fn remove(&mut self, patterns: &PatternTree) {
        self.columns.retain(|alias| !patterns.covers(alias));
        self.relations.retain(|alias, child| {
            if patterns.covers(alias) {
                return false;
            }
            let below = patterns.descend(alias);
            if !below.is_empty() {
                child.remove(&below);
            }
            !child.is_empty()
        });
    }

    /// Dotted paths of every selected alias, sorted.
    pub fn paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_paths("", &mut out);
        out
    }

    fn collect_paths(&self, prefix: &str, out: &mut Vec<String>) {
        for column in &self.columns {
            out.push(format!("{prefix}{column}"));
        }
        for (alias, child) in &self.relations {
            child.collect_paths(&format!("{prefix}{alias}."), out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(columns: &[&str]) -> SelectionTree {
        SelectionTree {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            relations: BTreeMap::new(),
        }
    }

    #[test]
    fn test_merge_unions() {
        let mut a = tree(&["id", "title"]);
        a.relations.insert("author".into(), tree(&["name"]));
        let mut b = tree(&["title", "body"]);
        b.relations.insert("author".into(), tree(&["bio"]));

        a.merge(b);
        assert_eq!(
            a.paths(),
            vec!["body", "id", "title", "author.bio", "author.name"]
        );
    }

    #[test]
    fn test_remove_detaches_empty_relations() {
        let mut t = tree(&["id", "title", "created_at"]);
        t.relations.insert("author".into(), tree(&["name", "bio"]));
        t.relations.insert("editor".into(), tree(&["name"]));

        t.remove(&PatternTree::parse(["*_at", "author.*", "editor.bio"]).unwrap());
        assert_eq!(t.paths(), vec!["id", "title", "editor.name"]);
    }

    #[test]
    fn test_remove_relation_by_alias() {
        let mut t = tree(&["id"]);
        t.relations.insert("author".into(), tree(&["name"]));
        t.remove(&PatternTree::parse(["author"]).unwrap());
        assert!(t.relations.is_empty());
    }
}
