//! Per-segment glob pattern trees.
//!
//! `["author.*", "title", "comments.author"]` becomes a tree whose levels
//! mirror relation levels. A pattern that ends at a level covers everything
//! below the aliases it matches.

use glob::{MatchOptions, Pattern};

use crate::error::{Error, Result};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// A level of glob patterns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatternTree {
    nodes: Vec<PatternNode>,
}

#[derive(Debug, Clone, PartialEq)]
struct PatternNode {
    pattern: Pattern,
    /// `None` when a pattern ends here.
    children: Option<PatternTree>,
}

impl PatternTree {
    /// Build a tree from dotted glob paths.
    pub fn parse<I, S>(paths: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tree = PatternTree::default();
        for path in paths {
            let path = path.as_ref().trim();
            if path.is_empty() {
                continue;
            }
            let segments: Vec<&str> = path.split('.').collect();
            tree.insert(&segments, path)?;
        }
        Ok(tree)
    }

    fn insert(&mut self, segments: &[&str], path: &str) -> Result<()> {
        let Some((first, rest)) = segments.split_first() else {
            return Ok(());
        };
        let node = match self.nodes.iter().position(|n| n.pattern.as_str() == *first) {
            Some(i) => &mut self.nodes[i],
            None => {
                let pattern = Pattern::new(first).map_err(|source| Error::InvalidPattern {
                    pattern: path.to_string(),
                    source,
                })?;
                self.nodes.push(PatternNode {
                    pattern,
                    children: Some(PatternTree::default()),
                });
                let last = self.nodes.len() - 1;
                &mut self.nodes[last]
            }
        };

        if rest.is_empty() {
            node.children = None;
            Ok(())
        } else {
            match node.children.as_mut() {
                Some(children) => children.insert(rest, path),
                // Already covered by a shorter pattern.
                None => Ok(()),
            }
        }
    }

    /// Check if any pattern at this level matches the alias.
    pub fn matches(&self, alias: &str) -> bool {
        self.nodes
            .iter()
            .any(|n| n.pattern.matches_with(alias, MATCH_OPTIONS))
    }

    /// Check if a pattern ending at this level matches the alias.
    pub fn covers(&self, alias: &str) -> bool {
        self.nodes
            .iter()
            .any(|n| n.children.is_none() && n.pattern.matches_with(alias, MATCH_OPTIONS))
    }

    /// Patterns for the level below an alias, merged across every matching
    /// pattern that continues past this level.
    pub fn descend(&self, alias: &str) -> PatternTree {
        let mut merged = PatternTree::default();
        for node in &self.nodes {
            if let Some(children) = &node.children {
                if node.pattern.matches_with(alias, MATCH_OPTIONS) {
                    merged.nodes.extend(children.nodes.iter().cloned());
                }
            }
        }
        merged
    }

    /// Check if the tree holds no pattern.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Restriction applied to a selection, level by level.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum SelectionScope {
    /// Every declared alias is selectable.
    #[default]
    All,
    /// Only aliases matching the patterns.
    Only(PatternTree),
    /// Every alias except those the patterns cover.
    Except(PatternTree),
}

impl SelectionScope {
    /// Restrict to matching paths.
    pub fn only<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(SelectionScope::Only(PatternTree::parse(patterns)?))
    }

    /// Exclude matching paths.
    pub fn except<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(SelectionScope::Except(PatternTree::parse(patterns)?))
    }

    /// Check if an alias at this level may be selected.
    pub fn allows(&self, alias: &str) -> bool {
        match self {
            SelectionScope::All => true,
            SelectionScope::Only(tree) => tree.matches(alias),
            SelectionScope::Except(tree) => !tree.covers(alias),
        }
    }

    /// Scope for the level below a relation alias.
    pub fn child(&self, alias: &str) -> SelectionScope {
        match self {
            SelectionScope::All => SelectionScope::All,
            SelectionScope::Only(tree) => {
                if tree.covers(alias) {
                    SelectionScope::All
                } else {
                    SelectionScope::Only(tree.descend(alias))
                }
            }
            SelectionScope::Except(tree) => {
                let below = tree.descend(alias);
                if below.is_empty() {
                    SelectionScope::All
                } else {
                    SelectionScope::Except(below)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_match() {
        let tree = PatternTree::parse(["title", "author.*", "*_at"]).unwrap();
        assert!(tree.matches("title"));
        assert!(tree.matches("created_at"));
        assert!(tree.matches("author"));
        assert!(!tree.matches("body"));

        assert!(tree.covers("title"));
        assert!(!tree.covers("author"));
        assert!(tree.descend("author").covers("anything"));
    }

    #[test]
    fn test_shorter_pattern_wins() {
        let tree = PatternTree::parse(["author.bio", "author"]).unwrap();
        assert!(tree.covers("author"));

        let tree = PatternTree::parse(["author", "author.bio"]).unwrap();
        assert!(tree.covers("author"));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(matches!(
            PatternTree::parse(["[title"]),
            Err(Error::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_only_scope() {
        let scope = SelectionScope::only(["title", "author.name"]).unwrap();
        assert!(scope.allows("title"));
        assert!(scope.allows("author"));
        assert!(!scope.allows("body"));

        let child = scope.child("author");
        assert!(child.allows("name"));
        assert!(!child.allows("bio"));

        let scope = SelectionScope::only(["author"]).unwrap();
        assert_eq!(scope.child("author"), SelectionScope::All);
    }

    #[test]
    fn test_except_scope() {
        let scope = SelectionScope::except(["secret", "author.email"]).unwrap();
        assert!(!scope.allows("secret"));
        assert!(scope.allows("author"));
        assert!(!scope.child("author").allows("email"));
        assert!(scope.child("author").allows("name"));
        assert_eq!(scope.child("comments"), SelectionScope::All);
    }
}
