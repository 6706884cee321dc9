//! Long-lived role cache shared between operations
//!
//! Role and membership changes are not observed automatically: every mutation
//! path must call `evict_scope` / `evict_identity`. Entries also expire after
//! a TTL as a backstop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::roles::RoleSet;
use crate::types::{Identity, RoleIdSet, ScopeId};

/// Shared cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedCacheConfig {
    /// Maximum entries per map
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Entry time-to-live in seconds
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_capacity() -> usize {
    10_000
}

fn default_ttl_secs() -> u64 {
    60
}

impl Default for SharedCacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            ttl_secs: default_ttl_secs(),
        }
    }
}

impl SharedCacheConfig {
    /// TTL as a duration
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Cache entry with TTL
#[derive(Debug, Clone)]
struct CacheEntry<T> {
    value: T,
    created_at: Instant,
}

impl<T: Clone> CacheEntry<T> {
    fn new(value: T) -> Self {
        Self {
            value,
            created_at: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() > ttl
    }
}

/// Statistics about cache performance
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits
    pub hits: usize,
    /// Number of cache misses
    pub misses: usize,
    /// Number of expired entries encountered
    pub expirations: usize,
    /// Total number of entries in cache
    pub entries: usize,
}

impl CacheStats {
    /// Calculates the cache hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Thread-safe role set and reach cache
pub struct SharedRoleCache {
    /// Scope -> role set
    role_sets: DashMap<ScopeId, CacheEntry<Arc<RoleSet>>>,
    /// (identity, scope) -> reach
    reach: DashMap<(Identity, ScopeId), CacheEntry<Arc<RoleIdSet>>>,
    config: SharedCacheConfig,
    stats: DashMap<String, usize>,
}

impl SharedRoleCache {
    /// Create a cache
    pub fn new(config: SharedCacheConfig) -> Self {
        Self {
            role_sets: DashMap::new(),
            reach: DashMap::new(),
            config,
            stats: DashMap::new(),
        }
    }

    /// Cached role set of a scope
    pub fn role_set(&self, scope_id: &str) -> Option<Arc<RoleSet>> {
        let ttl = self.config.ttl();

        if let Some(entry) = self.role_sets.get(scope_id) {
            if !entry.is_expired(ttl) {
                self.increment_stat("hits");
                return Some(Arc::clone(&entry.value));
            }
            drop(entry);
            self.role_sets.remove(scope_id);
            self.increment_stat("expirations");
            return None;
        }

        self.increment_stat("misses");
        None
    }

    /// Store a role set unless the cache is full
    pub fn put_role_set(&self, role_set: Arc<RoleSet>) {
        if self.role_sets.len() < self.config.capacity {
            self.role_sets
                .insert(role_set.scope_id().clone(), CacheEntry::new(role_set));
        }
    }

    /// Cached reach of an identity in a scope
    pub fn reach(&self, identity: &Identity, scope_id: &str) -> Option<Arc<RoleIdSet>> {
        let key = (identity.clone(), scope_id.to_string());
        let ttl = self.config.ttl();

        if let Some(entry) = self.reach.get(&key) {
            if !entry.is_expired(ttl) {
                self.increment_stat("hits");
                return Some(Arc::clone(&entry.value));
            }
            drop(entry);
            self.reach.remove(&key);
            self.increment_stat("expirations");
            return None;
        }

        self.increment_stat("misses");
        None
    }

    /// Store a reach unless the cache is full
    pub fn put_reach(&self, identity: &Identity, scope_id: &str, reach: Arc<RoleIdSet>) {
        if self.reach.len() < self.config.capacity {
            self.reach
                .insert((identity.clone(), scope_id.to_string()), CacheEntry::new(reach));
        }
    }

    /// Drop everything derived from one scope's roles
    pub fn evict_scope(&self, scope_id: &str) {
        self.role_sets.remove(scope_id);
        self.reach.retain(|(_, scope), _| scope != scope_id);
        info!("Evicted scope {} from shared role cache", scope_id);
    }

    /// Drop one identity's reach in one scope after its membership changed
    ///
    /// Memberships live in the principal's proxy role, which is part of the
    /// scope's role set, so that set goes too. Other identities' reaches in
    /// the scope are unaffected and stay cached.
    pub fn evict_identity(&self, identity: &Identity, scope_id: &str) {
        self.role_sets.remove(scope_id);
        self.reach.remove(&(identity.clone(), scope_id.to_string()));
        info!("Evicted {} in scope {} from shared role cache", identity, scope_id);
    }

    /// Removes expired entries from the cache
    pub fn cleanup_expired(&self) {
        let ttl = self.config.ttl();
        self.role_sets.retain(|_, entry| !entry.is_expired(ttl));
        self.reach.retain(|_, entry| !entry.is_expired(ttl));
    }

    /// Clears the cache
    pub fn clear(&self) {
        self.role_sets.clear();
        self.reach.clear();
        self.stats.clear();
    }

    /// Returns cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.get_stat("hits"),
            misses: self.get_stat("misses"),
            expirations: self.get_stat("expirations"),
            entries: self.role_sets.len() + self.reach.len(),
        }
    }

    /// Configuration in use
    pub fn config(&self) -> &SharedCacheConfig {
        &self.config
    }

    fn increment_stat(&self, key: &str) {
        self.stats
            .entry(key.to_string())
            .and_modify(|count| *count += 1)
            .or_insert(1);
    }

    fn get_stat(&self, key: &str) -> usize {
        self.stats.get(key).map(|v| *v).unwrap_or(0)
    }
}

impl Default for SharedRoleCache {
    fn default() -> Self {
        Self::new(SharedCacheConfig::default())
    }
}
