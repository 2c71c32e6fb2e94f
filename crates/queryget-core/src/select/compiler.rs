use std::collections::BTreeMap;

use queryget_proto::{ColumnSelect, Projection, RelationProjection};
use tracing::{trace, warn};

use super::{SelectionScope, SelectionTree};
use crate::catalog::{DeclarationKind, EntityDef, RelationDef, SelectContext};
use crate::error::{Error, Result};
use crate::registry::EntityRegistry;

/// Expand requested alias paths and build the projection in one step.
pub fn resolve_selection<S: AsRef<str>>(
    registry: &EntityRegistry,
    entity: &str,
    requested: &[S],
    scope: &SelectionScope,
    depth: usize,
) -> Result<Projection> {
    let tree = expand_selection(registry, entity, requested, scope, depth)?;
    project_selection(registry, entity, &tree)
}

/// Expand requested alias paths into concrete aliases.
///
/// `*` stands for every non-relation alias at its level; a bare relation
/// alias stands for `relation.*`. Aliases outside the scope or not declared
/// selectable are skipped, and relations are only expanded while `depth`
/// is above zero.
pub fn expand_selection<S: AsRef<str>>(
    registry: &EntityRegistry,
    entity: &str,
    requested: &[S],
    scope: &SelectionScope,
    depth: usize,
) -> Result<SelectionTree> {
    let def = registry.get(entity)?;
    let table = registry.table(entity, DeclarationKind::Selectable)?;

    // first segment -> remainders; `None` marks a path ending at this level
    let mut grouped: BTreeMap<&str, Vec<Option<&str>>> = BTreeMap::new();
    for path in requested {
        let path = path.as_ref().trim();
        if path.is_empty() {
            continue;
        }
        let (first, rest) = match path.split_once('.') {
            Some((first, rest)) => (first, Some(rest)),
            None => (path, None),
        };
        grouped.entry(first).or_default().push(rest);
    }

    let mut tree = SelectionTree::new();
    if grouped.remove("*").is_some() {
        for entry in table.entries() {
            if !entry.is_relation() && scope.allows(&entry.alias) {
                tree.columns.insert(entry.alias.clone());
            }
        }
    }

    for (alias, rests) in grouped {
        let Some(entry) = table.get(alias) else {
            trace!(entity, alias, "not a selectable alias");
            continue;
        };
        if !scope.allows(alias) {
            trace!(entity, alias, "outside selection scope");
            continue;
        }

        let Some(relation) = def.relation(&entry.key) else {
            tree.columns.insert(alias.to_string());
            continue;
        };
        if relation.is_many_to_many() {
            return Err(Error::UnsupportedRelation {
                entity: def.name.clone(),
                relation: relation.name.clone(),
                operation: "select",
            });
        }
        if depth == 0 {
            warn!(entity, relation = %relation.name, "selection depth exhausted, relation dropped");
            continue;
        }

        let child_paths: Vec<&str> = rests.iter().map(|rest| rest.unwrap_or("*")).collect();
        let child = expand_selection(
            registry,
            &relation.related_entity,
            &child_paths,
            &scope.child(alias),
            depth - 1,
        )?;
        tree.relations
            .entry(alias.to_string())
            .or_default()
            .merge(child);
    }

    Ok(tree)
}

/// Build the projection for an expanded selection.
///
/// Columns are qualified and aliased, or produced by the entity's select
/// hook for the key. Every relation adds the key columns needed to match
/// related rows back to their parent on both sides.
pub fn project_selection(
    registry: &EntityRegistry,
    entity: &str,
    tree: &SelectionTree,
) -> Result<Projection> {
    let def = registry.get(entity)?;
    let table = registry.table(entity, DeclarationKind::Selectable)?;
    let mut projection = Projection::new();

    for alias in &tree.columns {
        let Some(entry) = table.get(alias) else {
            continue;
        };
        projection.push_column(select_column(&def, alias, &entry.key)?);
    }

    for (alias, child_tree) in &tree.relations {
        let Some(relation) = table.get(alias).and_then(|e| def.relation(&e.key)) else {
            continue;
        };
        let related = registry.get(&relation.related_entity)?;
        let link = relation
            .link(&def, &related)
            .ok_or_else(|| unsupported(&def, relation))?;

        for column in relation.parent_key_columns(&def) {
            projection.push_column(ColumnSelect::raw(column));
        }

        let mut child = project_selection(registry, &related.name, child_tree)?;
        for column in relation.child_key_columns(&related) {
            child.push_column(ColumnSelect::raw(column));
        }

        match projection.relations.get_mut(&link.name) {
            Some(existing) => merge_projection(&mut existing.projection, child),
            None => {
                projection.relations.insert(
                    link.name.clone(),
                    RelationProjection {
                        link,
                        projection: child,
                    },
                );
            }
        }
    }

    Ok(projection)
}

fn select_column(def: &EntityDef, alias: &str, key: &str) -> Result<ColumnSelect> {
    match def.hooks.select(key) {
        Some(hook) => hook(&SelectContext {
            table: &def.table,
            alias,
            key,
        }),
        None => Ok(ColumnSelect::aliased(def.column(key), alias)),
    }
}

fn merge_projection(into: &mut Projection, other: Projection) {
    for column in other.columns {
        into.push_column(column);
    }
    for (name, relation) in other.relations {
        match into.relations.get_mut(&name) {
            Some(existing) => merge_projection(&mut existing.projection, relation.projection),
            None => {
                into.relations.insert(name, relation);
            }
        }
    }
}

fn unsupported(def: &EntityDef, relation: &RelationDef) -> Error {
    Error::UnsupportedRelation {
        entity: def.name.clone(),
        relation: relation.name.clone(),
        operation: "select",
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use queryget_proto::RelationLink;

    use super::*;
    use crate::catalog::Declaration;

    fn registry() -> EntityRegistry {
        let registry = EntityRegistry::new();
        registry
            .register(
                EntityDef::new("Post", "posts")
                    .with_relation(RelationDef::owning("author", "User", "author_id", "id"))
                    .with_relation(RelationDef::owned("comments", "Comment", "post_id", "id"))
                    .with_relation(RelationDef::many_to_many("tags", "Tag"))
                    .with_selectable([
                        Declaration::bare("id"),
                        Declaration::entry("headline", "title"),
                        Declaration::bare("score"),
                        Declaration::bare("author"),
                        Declaration::entry("replies", "comments"),
                        Declaration::bare("tags"),
                    ])
                    .with_select_hook("score", |ctx| {
                        Ok(ColumnSelect::expression(
                            format!("({0}.likes - {0}.dislikes)", ctx.table),
                            ctx.alias,
                        ))
                    }),
            )
            .unwrap();
        registry
            .register(
                EntityDef::new("User", "users")
                    .with_selectable([Declaration::bare("name"), Declaration::bare("bio")]),
            )
            .unwrap();
        registry
            .register(
                EntityDef::new("Comment", "comments")
                    .with_relation(RelationDef::owning("writer", "User", "user_id", "id"))
                    .with_selectable([Declaration::bare("body"), Declaration::bare("writer")]),
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_star_and_nested_path() {
        let registry = registry();
        let projection = resolve_selection(
            &registry,
            "Post",
            &["*", "author.bio"],
            &SelectionScope::All,
            5,
        )
        .unwrap();

        assert_eq!(
            projection.columns,
            vec![
                ColumnSelect::aliased("posts.title", "headline"),
                ColumnSelect::aliased("posts.id", "id"),
                ColumnSelect::expression("(posts.likes - posts.dislikes)", "score"),
                ColumnSelect::raw("posts.author_id"),
            ]
        );
        let author = projection.relation("author").unwrap();
        assert_eq!(
            author.link,
            RelationLink::new("author", "users", "posts.author_id", "users.id")
        );
        assert_eq!(
            author.projection.columns,
            vec![
                ColumnSelect::aliased("users.bio", "bio"),
                ColumnSelect::raw("users.id"),
            ]
        );
    }

    #[test]
    fn test_bare_relation_selects_its_columns() {
        let registry = registry();
        let projection =
            resolve_selection(&registry, "Post", &["replies"], &SelectionScope::All, 5).unwrap();

        assert_eq!(projection.columns, vec![ColumnSelect::raw("posts.id")]);
        let comments = projection.relation("comments").unwrap();
        assert_eq!(
            comments.projection.columns,
            vec![
                ColumnSelect::aliased("comments.body", "body"),
                ColumnSelect::raw("comments.post_id"),
            ]
        );
    }

    #[test]
    fn test_depth_limits_relations() {
        let registry = registry();
        let paths = ["id", "replies.writer.name"];

        let none = resolve_selection(&registry, "Post", &paths, &SelectionScope::All, 0).unwrap();
        assert!(none.relations.is_empty());
        assert_eq!(none.columns, vec![ColumnSelect::aliased("posts.id", "id")]);

        let one = resolve_selection(&registry, "Post", &paths, &SelectionScope::All, 1).unwrap();
        let comments = one.relation("comments").unwrap();
        assert!(comments.projection.relations.is_empty());

        let two = resolve_selection(&registry, "Post", &paths, &SelectionScope::All, 2).unwrap();
        assert_eq!(two.depth(), 2);
    }

    #[test]
    fn test_scope() {
        let registry = registry();
        let only = SelectionScope::only(["id", "author.name"]).unwrap();
        let tree = expand_selection(&registry, "Post", &["*", "author"], &only, 5).unwrap();
        assert_eq!(tree.paths(), vec!["id", "author.name"]);

        let except = SelectionScope::except(["score", "author.bio"]).unwrap();
        let tree = expand_selection(&registry, "Post", &["*", "author"], &except, 5).unwrap();
        assert_eq!(tree.paths(), vec!["headline", "id", "author.name"]);
    }

    #[test]
    fn test_unknown_aliases_skipped() {
        let registry = registry();
        let tree =
            expand_selection(&registry, "Post", &["nope", "author.nope"], &SelectionScope::All, 5)
                .unwrap();
        assert!(tree.columns.is_empty());
        assert!(tree.relations["author"].is_empty());
    }

    #[test]
    fn test_many_to_many_fails() {
        let registry = registry();
        assert!(matches!(
            expand_selection(&registry, "Post", &["tags"], &SelectionScope::All, 5),
            Err(Error::UnsupportedRelation { operation: "select", .. })
        ));
    }
}
