//! Time-bounded cache of reverse geocode results
//!
//! Entries expire lazily: an expired entry is only noticed (and evicted) by
//! the `get` that finds it. There is no background sweep.
//!
//! The cache itself is not synchronized. `GeocodingClient` keeps it behind a
//! mutex and takes the lock separately for `get` and `put`, so two concurrent
//! misses for one key may both write; the values are identical and the last
//! write wins.
//!
//! Keys are the quantized vendor coordinate alone. Search radius and detail
//! level are not part of the key: single and batch lookups populate the same
//! entries, and a hit is returned whichever options asked for it.

use crate::constants::cache::GEOCODE_TTL_MS;
use crate::error::{Error, Result};
use crate::geo::AddressResult;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Source of the current time in Unix milliseconds
pub trait Clock: Send + Sync + fmt::Debug {
    fn now_ms(&self) -> i64;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Manually advanced clock for deterministic tests and replays
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicI64,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now_ms: AtomicI64::new(start_ms),
        }
    }

    pub fn advance(&self, by: Duration) {
        let ms = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, now_ms: i64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

/// A cached reverse geocode result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub value: AddressResult,
    pub inserted_at_ms: i64,
}

/// Cache size and keys
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub size: usize,
    pub keys: Vec<String>,
}

/// Time-bounded key/value cache of reverse geocode results
#[derive(Debug)]
pub struct GeocodeCache {
    entries: HashMap<String, CacheEntry>,
    ttl_ms: i64,
    clock: Arc<dyn Clock>,
}

impl GeocodeCache {
    /// Create an empty cache with the default one-hour TTL
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_ttl(clock, Duration::from_millis(GEOCODE_TTL_MS.unsigned_abs()))
    }

    /// Create an empty cache with a custom TTL
    pub fn with_ttl(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl_ms: i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX),
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms.unsigned_abs())
    }

    fn is_expired(&self, entry: &CacheEntry, now_ms: i64) -> bool {
        now_ms.saturating_sub(entry.inserted_at_ms) > self.ttl_ms
    }

    /// Look up a key, evicting it if it has outlived the TTL
    pub fn get(&mut self, key: &str) -> Option<AddressResult> {
        let now = self.clock.now_ms();
        let entry = self.entries.get(key)?;

        if self.is_expired(entry, now) {
            debug!(key, "geocode cache entry expired");
            self.entries.remove(key);
            return None;
        }

        Some(entry.value.clone())
    }

    /// Store a value, replacing any previous entry for the key
    pub fn put(&mut self, key: impl Into<String>, value: AddressResult) {
        let key = key.into();
        let entry = CacheEntry {
            key: key.clone(),
            value,
            inserted_at_ms: self.clock.now_ms(),
        };
        self.entries.insert(key, entry);
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drop expired entries, returning how many were removed
    pub fn purge_expired(&mut self) -> usize {
        let now = self.clock.now_ms();
        let ttl_ms = self.ttl_ms;
        let before = self.entries.len();
        self.entries
            .retain(|_, e| now.saturating_sub(e.inserted_at_ms) <= ttl_ms);
        before - self.entries.len()
    }

    /// Current size and keys (sorted)
    ///
    /// Expired-but-unvisited entries still count until a `get` or
    /// `purge_expired` removes them.
    pub fn stats(&self) -> CacheStats {
        let mut keys: Vec<String> = self.entries.keys().cloned().collect();
        keys.sort();
        CacheStats {
            size: keys.len(),
            keys,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write a JSON snapshot of the live entries
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let now = self.clock.now_ms();
        let live: Vec<&CacheEntry> = self
            .entries
            .values()
            .filter(|e| !self.is_expired(e, now))
            .collect();

        let content = serde_json::to_string_pretty(&live)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Load a snapshot written by [`save_to`](Self::save_to)
    ///
    /// A missing file yields an empty cache; expired entries are dropped.
    pub fn load_from(path: &Path, clock: Arc<dyn Clock>, ttl: Duration) -> Result<Self> {
        let mut cache = Self::with_ttl(clock, ttl);
        if !path.exists() {
            return Ok(cache);
        }

        let content = fs::read_to_string(path)?;
        let entries: Vec<CacheEntry> = serde_json::from_str(&content).map_err(|e| {
            Error::Config(format!("Failed to parse geocode cache {}: {}", path.display(), e))
        })?;

        for entry in entries {
            cache.entries.insert(entry.key.clone(), entry);
        }
        let dropped = cache.purge_expired();
        debug!(loaded = cache.len(), dropped, "geocode cache loaded");

        Ok(cache)
    }
}
