pub mod vector;

use std::{fmt::Debug, sync::Arc, time::{Duration, Instant}};

use ahash::RandomState;
use dashmap::DashMap;
use indexmap::IndexMap;

use crate::error::CacheError;

/// Key/value cache store keyed by opaque strings.
/// Only get/set atomicity per key is expected, no cross-key transactions.
pub trait CacheBackend: Send + Sync + Debug {
    /// Name used in errors and logs
    fn name(&self) -> &str;

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Store `value` under `key`, last write wins
    fn set(&self, key: &str, value: Vec<u8>) -> Result<(), CacheError>;

    fn delete(&self, key: &str) -> Result<(), CacheError>;
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    #[inline]
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-process cache backend with an optional time-to-live
#[derive(Debug)]
pub struct MemoryCache {
    name: String,
    entries: DashMap<Box<str>, CacheEntry, RandomState>,
    ttl: Option<Duration>,
}

impl MemoryCache {
    /// Entries never expire
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: DashMap::with_hasher(RandomState::new()),
            ttl: None,
        }
    }

    /// Entries expire `ttl` after they were set
    pub fn with_ttl(name: impl Into<String>, ttl: Duration) -> Self {
        Self {
            ttl: Some(ttl),
            ..Self::new(name)
        }
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Number of stored entries, expired ones included until touched
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CacheBackend for MemoryCache {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let now = Instant::now();
        match self.entries.get(key) {
            None => return Ok(None),
            Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
            Some(_) => {}
        }
        // expired; the read guard is released by now
        self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        Ok(None)
    }

    fn set(&self, key: &str, value: Vec<u8>) -> Result<(), CacheError> {
        let expires_at = self.ttl.map(|ttl| Instant::now() + ttl);
        self.entries.insert(key.into(), CacheEntry { value, expires_at });
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Named cache backends, e.g. a dedicated `"comparison"` store next to the
/// general purpose `"default"` one.
#[derive(Debug, Clone, Default)]
pub struct CacheRegistry {
    backends: IndexMap<String, Arc<dyn CacheBackend>>,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding a single in-memory backend under `name`
    pub fn with_memory(name: &str) -> Self {
        Self::new().with_backend(name, Arc::new(MemoryCache::new(name)))
    }

    pub fn with_backend(mut self, name: impl Into<String>, backend: Arc<dyn CacheBackend>) -> Self {
        self.register(name, backend);
        self
    }

    /// Register `backend` under `name`, replacing any previous one
    pub fn register(&mut self, name: impl Into<String>, backend: Arc<dyn CacheBackend>) {
        self.backends.insert(name.into(), backend);
    }

    /// Look a backend up by name
    pub fn get(&self, name: &str) -> Result<Arc<dyn CacheBackend>, CacheError> {
        self.backends
            .get(name)
            .cloned()
            .ok_or_else(|| CacheError::InvalidBackend(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.backends.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.backends.keys().map(String::as_str)
    }
}
