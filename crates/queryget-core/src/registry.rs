//! Entity registry and normalized table cache.
//!
//! The registry owns every entity descriptor and lazily memoizes what is
//! derived from them: normalized declaration tables and compiled filters.
//! Derived values are pure functions of the registered descriptors, so a
//! racing recomputation produces an identical value and the first insert
//! wins.
//!
//! Compiled filters are keyed by canonical filter key, and only keys that
//! name a declared filter are stored, so the cache is bounded by the
//! declarations rather than by the request keys seen.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::debug;

use crate::catalog::{DeclarationKind, EntityDef, Schema};
use crate::error::{Error, Result};
use crate::filter::{canonical_key, compile_filter, CompiledFilter};
use crate::normalize::{validate_entity, NormalizedTable};

/// Cache counters.
#[derive(Debug, Default)]
pub struct CacheStats {
    table_hits: AtomicU64,
    table_misses: AtomicU64,
    filter_hits: AtomicU64,
    filter_misses: AtomicU64,
}

impl CacheStats {
    /// Normalized table lookups served from cache.
    pub fn table_hits(&self) -> u64 {
        self.table_hits.load(Ordering::Relaxed)
    }

    /// Normalized table lookups that had to normalize.
    pub fn table_misses(&self) -> u64 {
        self.table_misses.load(Ordering::Relaxed)
    }

    /// Filter lookups served from cache.
    pub fn filter_hits(&self) -> u64 {
        self.filter_hits.load(Ordering::Relaxed)
    }

    /// Filter lookups that had to compile.
    pub fn filter_misses(&self) -> u64 {
        self.filter_misses.load(Ordering::Relaxed)
    }

    /// Combined hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let hits = self.table_hits() + self.filter_hits();
        let total = hits + self.table_misses() + self.filter_misses();
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

/// Process-wide registry of entities.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    entities: RwLock<HashMap<String, Arc<EntityDef>>>,
    tables: DashMap<(String, DeclarationKind), Arc<NormalizedTable>>,
    filters: DashMap<(String, String), Arc<CompiledFilter>>,
    stats: CacheStats,
}

impl EntityRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every entity of a schema file.
    pub fn from_schema(schema: Schema) -> Result<Self> {
        let registry = Self::new();
        for entity in schema.into_entities() {
            registry.register(entity)?;
        }
        Ok(registry)
    }

    /// Register an entity.
    ///
    /// Declarations are validated here; tables are built on first use.
    pub fn register(&self, entity: EntityDef) -> Result<Arc<EntityDef>> {
        validate_entity(&entity)?;

        let mut entities = self.entities.write();
        if entities.contains_key(&entity.name) {
            return Err(Error::DuplicateEntity(entity.name));
        }
        debug!(entity = %entity.name, table = %entity.table, "registered entity");
        let entity = Arc::new(entity);
        entities.insert(entity.name.clone(), entity.clone());
        Ok(entity)
    }

    /// Get an entity by name.
    pub fn get(&self, name: &str) -> Result<Arc<EntityDef>> {
        self.entities
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownEntity(name.to_string()))
    }

    /// Check if an entity is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.entities.read().contains_key(name)
    }

    /// Registered entity names, sorted.
    pub fn entity_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entities.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Normalized declaration table for an entity, built once.
    pub fn table(&self, entity: &str, kind: DeclarationKind) -> Result<Arc<NormalizedTable>> {
        let cache_key = (entity.to_string(), kind);
        if let Some(table) = self.tables.get(&cache_key) {
            self.stats.table_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(table.clone());
        }
        self.stats.table_misses.fetch_add(1, Ordering::Relaxed);

        let def = self.get(entity)?;
        let table = Arc::new(NormalizedTable::normalize(&def, kind)?);
        debug!(entity, %kind, aliases = table.len(), "normalized declarations");
        Ok(self.tables.entry(cache_key).or_insert(table).clone())
    }

    /// Compiled filter for a request key on an entity, built once.
    ///
    /// `None` means the key does not name a filterable alias; such keys are
    /// never stored. Fatal errors are returned every time and never cached.
    pub fn filter(&self, entity: &str, key: &str) -> Result<Option<Arc<CompiledFilter>>> {
        let Some(canonical) = canonical_key(self, entity, key)? else {
            return Ok(None);
        };
        let cache_key = (entity.to_string(), canonical);
        if let Some(filter) = self.filters.get(&cache_key) {
            self.stats.filter_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Some(filter.clone()));
        }
        self.stats.filter_misses.fetch_add(1, Ordering::Relaxed);

        // Compiled without holding a shard lock: relation filters recurse
        // back into this cache.
        let Some(compiled) = compile_filter(self, entity, &cache_key.1)? else {
            return Ok(None);
        };
        debug!(entity, key = %cache_key.1, "compiled filter");
        Ok(Some(self.filters.entry(cache_key).or_insert(Arc::new(compiled)).clone()))
    }

    /// Number of compiled filters held in the cache.
    pub fn cached_filters(&self) -> usize {
        self.filters.len()
    }

    /// Cache counters.
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Drop every derived table and compiled filter.
    pub fn clear_cache(&self) {
        self.tables.clear();
        self.filters.clear();
    }
}
