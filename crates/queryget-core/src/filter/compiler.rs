use std::sync::Arc;

use tracing::trace;

use super::{CompiledFilter, FilterMode, FilterStep, FilterTarget};
use crate::catalog::DeclarationKind;
use crate::error::{Error, Result};
use crate::registry::EntityRegistry;

/// Canonical form of a filter key, or `None` when it names no filterable
/// alias.
///
/// Paths after a non-relation alias are dropped and an empty relation
/// remainder collapses onto the alias, so every request key that compiles to
/// the same filter shares one canonical key. Broken relation declarations
/// keep the key unchanged and fail later in [`compile_filter`].
pub(crate) fn canonical_key(
    registry: &EntityRegistry,
    entity: &str,
    key: &str,
) -> Result<Option<String>> {
    let (alias, rest) = match key.split_once('$') {
        Some((alias, rest)) => (alias, rest),
        None => (key, ""),
    };

    let table = registry.table(entity, DeclarationKind::Filterable)?;
    let Some(entry) = table.get(alias) else {
        return Ok(None);
    };
    if FilterMode::parse(entry.mode.as_deref()) != FilterMode::Relation || rest.is_empty() {
        return Ok(Some(alias.to_string()));
    }

    let def = registry.get(entity)?;
    let Some(related) = def
        .relation(&entry.key)
        .filter(|relation| !relation.is_many_to_many())
        .map(|relation| relation.related_entity.as_str())
    else {
        return Ok(Some(key.to_string()));
    };
    if !registry.contains(related) {
        return Ok(Some(key.to_string()));
    }
    Ok(canonical_key(registry, related, rest)?.map(|child| format!("{alias}${child}")))
}

/// Compile a filter key against an entity.
///
/// The key grammar is `segment ('$' segment)*`. The first segment is looked
/// up in the entity's filter table; relation aliases compile the remainder
/// against the related entity, and an empty remainder tests existence.
///
/// Returns `Ok(None)` when the first segment is not a filterable alias, or
/// when a relation remainder does not compile. A relation alias whose key is
/// not a relation accessor is a configuration error.
pub fn compile_filter(
    registry: &EntityRegistry,
    entity: &str,
    key: &str,
) -> Result<Option<CompiledFilter>> {
    let (alias, rest) = match key.split_once('$') {
        Some((alias, rest)) => (alias, Some(rest)),
        None => (key, None),
    };

    let def = registry.get(entity)?;
    let table = registry.table(entity, DeclarationKind::Filterable)?;
    let Some(entry) = table.get(alias) else {
        trace!(entity, key, "not a filterable alias");
        return Ok(None);
    };

    let mode = FilterMode::parse(entry.mode.as_deref());
    let target = FilterTarget {
        table: def.table.clone(),
        alias: alias.to_string(),
        column: def.column(&entry.key),
    };

    let step = match mode {
        FilterMode::Relation => {
            let relation = def.relation(&entry.key).ok_or_else(|| Error::UnknownRelation {
                entity: def.name.clone(),
                relation: entry.key.clone(),
            })?;
            let unsupported = || Error::UnsupportedRelation {
                entity: def.name.clone(),
                relation: relation.name.clone(),
                operation: "filter",
            };
            if relation.is_many_to_many() {
                return Err(unsupported());
            }
            let related = registry.get(&relation.related_entity)?;
            let link = relation.link(&def, &related).ok_or_else(unsupported)?;

            match rest.filter(|r| !r.is_empty()) {
                None => FilterStep::Relation { link, child: None },
                Some(rest) => match registry.filter(&related.name, rest)? {
                    Some(child) => FilterStep::Relation {
                        link,
                        child: Some(child),
                    },
                    None => {
                        trace!(entity, key, related = %related.name, "relation filter remainder not filterable");
                        return Ok(None);
                    }
                },
            }
        }
        mode => {
            if rest.is_some() {
                trace!(entity, key, "ignoring path after non-relation alias");
            }
            let mode_hook = entry
                .mode
                .as_deref()
                .filter(|_| mode.is_overridable() && mode != FilterMode::Default)
                .and_then(|m| def.hooks.mode_filter(m).map(|hook| (m, hook)));
            let alias_hook = matches!(mode, FilterMode::Default | FilterMode::Custom(_))
                .then(|| def.hooks.custom_filter(alias))
                .flatten();

            match (mode_hook, alias_hook) {
                (Some((name, hook)), _) => FilterStep::Hook {
                    name: format!("mode {name}"),
                    hook: Arc::clone(hook),
                    target,
                },
                (None, Some(hook)) => FilterStep::Hook {
                    name: format!("filter {alias}"),
                    hook: Arc::clone(hook),
                    target,
                },
                (None, None) => FilterStep::Column { mode, target },
            }
        }
    };

    Ok(Some(CompiledFilter {
        entity: def.name.clone(),
        key: key.to_string(),
        step,
    }))
}
