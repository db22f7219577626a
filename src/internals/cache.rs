//! Response cache for successful generations
//!
//! Entries are keyed by a fingerprint of `(provider, model, prompt,
//! parameters)`. The store is bounded: inserting into a full cache evicts one
//! entry chosen by the configured [`EvictionPolicy`]. Expired entries behave
//! as misses and are dropped when touched or swept by
//! [`ResponseCache::cleanup_expired`].
//!
//! All state sits behind one mutex so "check capacity, evict, insert" is
//! atomic with respect to concurrent lookups.

use crate::core_types::{GenerationResponse, Parameters};
use crate::logging::{log_debug, log_trace};
use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;

/// Hex characters kept from each digest (128 bits).
const DIGEST_HEX_LEN: usize = 32;

/// Which entry to drop when the cache is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicy {
    /// Least recently accessed
    #[default]
    Lru,
    /// Fewest accesses; ties go to the least recently used
    Lfu,
    /// Oldest insertion, regardless of access pattern
    Ttl,
}

impl EvictionPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "lru" => Some(Self::Lru),
            "lfu" => Some(Self::Lfu),
            "ttl" => Some(Self::Ttl),
            _ => None,
        }
    }
}

/// Deterministic cache key for a request.
///
/// Parameters are serialized with sorted keys, so maps holding the same pairs
/// always produce the same key. The result stays human-inspectable:
/// `provider:model:promptHash:paramsHash`.
pub fn fingerprint(provider: &str, model: &str, prompt: &str, parameters: &Parameters) -> String {
    let sorted: BTreeMap<&String, &serde_json::Value> = parameters.iter().collect();
    // Serializing string-keyed maps of JSON values cannot fail
    let serialized = serde_json::to_string(&sorted).unwrap_or_default();

    format!(
        "{provider}:{model}:{}:{}",
        short_digest(prompt.as_bytes()),
        short_digest(serialized.as_bytes())
    )
}

fn short_digest(bytes: &[u8]) -> String {
    let mut encoded = hex::encode(Sha256::digest(bytes));
    encoded.truncate(DIGEST_HEX_LEN);
    encoded
}

/// A cached response with access bookkeeping.
///
/// `provider` and `model` are the ones the key was fingerprinted from, which
/// may differ from `response.provider` after a fallback.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub provider: String,
    pub model: String,
    pub response: GenerationResponse,
    pub stored_at: Instant,
    pub ttl: Duration,
    pub access_count: u64,
    pub last_accessed_at: Instant,
}

impl CacheEntry {
    fn new(
        provider: String,
        model: String,
        response: GenerationResponse,
        ttl: Duration,
        now: Instant,
    ) -> Self {
        Self {
            provider,
            model,
            response,
            stored_at: now,
            ttl,
            access_count: 0,
            last_accessed_at: now,
        }
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) > self.ttl
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub evictions: u64,
    pub expired: u64,
    pub invalidations: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: u64,
    misses: u64,
    evictions: u64,
    expired: u64,
    invalidations: u64,
}

struct CacheState {
    // Unbounded: capacity is enforced here so the policy picks the victim
    entries: LruCache<String, CacheEntry>,
    counters: Counters,
}

/// Bounded, policy-driven response cache.
pub struct ResponseCache {
    state: Mutex<CacheState>,
    max_size: usize,
    default_ttl: Duration,
    policy: EvictionPolicy,
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("max_size", &self.max_size)
            .field("default_ttl", &self.default_ttl)
            .field("policy", &self.policy)
            .field("size", &self.len())
            .finish()
    }
}

impl ResponseCache {
    pub fn new(max_size: usize, default_ttl: Duration, policy: EvictionPolicy) -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: LruCache::unbounded(),
                counters: Counters::default(),
            }),
            max_size: max_size.max(1),
            default_ttl,
            policy,
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up a key. Expired entries count as misses and are removed.
    pub fn get(&self, key: &str) -> Option<GenerationResponse> {
        let now = Instant::now();
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let expired = state.entries.peek(key).map(|entry| entry.is_expired_at(now));
        match expired {
            None => {
                state.counters.misses += 1;
                return None;
            }
            Some(true) => {
                state.entries.pop(key);
                state.counters.expired += 1;
                state.counters.misses += 1;
                log_trace!(cache_key = %key, "Cache entry expired on lookup");
                return None;
            }
            Some(false) => {}
        }

        // get_mut promotes the entry to most recently used
        let response = state.entries.get_mut(key).map(|entry| {
            entry.access_count += 1;
            entry.last_accessed_at = now;
            entry.response.clone()
        });
        state.counters.hits += 1;
        response
    }

    /// Store a response scoped to the provider and model that served it.
    pub fn set(&self, key: impl Into<String>, response: GenerationResponse, ttl: Option<Duration>) {
        let provider = response.provider.clone();
        let model = response.model.clone();
        self.set_for(&provider, &model, key, response, ttl);
    }

    /// Store a response under `key`, scoped to `provider` and `model` for
    /// later invalidation. Evicts one entry first when full and `key` is new.
    pub fn set_for(
        &self,
        provider: &str,
        model: &str,
        key: impl Into<String>,
        response: GenerationResponse,
        ttl: Option<Duration>,
    ) {
        let key = key.into();
        let now = Instant::now();
        let entry = CacheEntry::new(
            provider.to_string(),
            model.to_string(),
            response,
            ttl.unwrap_or(self.default_ttl),
            now,
        );
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if !state.entries.contains(&key) && state.entries.len() >= self.max_size {
            if let Some(victim) = self.select_victim(&state.entries) {
                state.entries.pop(&victim);
                state.counters.evictions += 1;
                log_debug!(
                    cache_key = %victim,
                    policy = ?self.policy,
                    "Evicted cache entry to make room"
                );
            }
        }

        state.entries.put(key, entry);
    }

    fn select_victim(&self, entries: &LruCache<String, CacheEntry>) -> Option<String> {
        match self.policy {
            EvictionPolicy::Lru => entries.peek_lru().map(|(key, _)| key.clone()),
            // iter() runs most- to least-recent; reversing makes ties fall on the LRU entry
            EvictionPolicy::Lfu => entries
                .iter()
                .rev()
                .min_by_key(|(_, entry)| entry.access_count)
                .map(|(key, _)| key.clone()),
            EvictionPolicy::Ttl => entries
                .iter()
                .min_by_key(|(_, entry)| entry.stored_at)
                .map(|(key, _)| key.clone()),
        }
    }

    /// Remove one entry. Returns whether it existed.
    pub fn invalidate(&self, key: &str) -> bool {
        let mut state = self.state.lock();
        let removed = state.entries.pop(key).is_some();
        if removed {
            state.counters.invalidations += 1;
        }
        removed
    }

    /// Remove every entry scoped to `provider`. Returns the count.
    pub fn invalidate_provider(&self, provider: &str) -> usize {
        self.invalidate_where(|entry| entry.provider == provider)
    }

    /// Remove every entry scoped to exactly `provider` and `model`.
    pub fn invalidate_model(&self, provider: &str, model: &str) -> usize {
        self.invalidate_where(|entry| entry.provider == provider && entry.model == model)
    }

    // Scope fields are compared whole; provider and model names may contain ':'
    fn invalidate_where(&self, predicate: impl Fn(&CacheEntry) -> bool) -> usize {
        let mut state = self.state.lock();
        let doomed: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, entry)| predicate(entry))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &doomed {
            state.entries.pop(key);
        }
        state.counters.invalidations += doomed.len() as u64;
        doomed.len()
    }

    /// Drop all entries whose TTL has passed. Returns the count.
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut state = self.state.lock();
        let expired: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            state.entries.pop(key);
        }
        state.counters.expired += expired.len() as u64;
        expired.len()
    }

    /// Empty the cache. Counters are kept.
    pub fn clear(&self) {
        self.state.lock().entries.clear();
    }

    /// Snapshot of an entry's bookkeeping without touching recency or counters.
    pub fn peek_entry(&self, key: &str) -> Option<CacheEntry> {
        self.state.lock().entries.peek(key).cloned()
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        let lookups = state.counters.hits + state.counters.misses;
        CacheStats {
            size: state.entries.len(),
            max_size: self.max_size,
            hits: state.counters.hits,
            misses: state.counters.misses,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                state.counters.hits as f64 / lookups as f64
            },
            evictions: state.counters.evictions,
            expired: state.counters.expired,
            invalidations: state.counters.invalidations,
        }
    }
}
