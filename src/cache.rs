//! Disk-backed request cache.
//!
//! Every external call goes through here so repeated runs (and offline
//! reruns) see identical payloads. One JSON file per key under
//! `<root>/<namespace>/`. Writes land in a temporary file first and are
//! renamed into place, so concurrent writers of the same key end with one
//! complete entry (last writer wins) and readers never observe a partial one.

use std::fs;
use std::hash::Hasher;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use fxhash::FxHasher64;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::error::Result;

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// One persisted cache record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub payload: serde_json::Value,
    /// Unix seconds.
    pub fetched_at: u64,
    /// Lifetime in seconds; 0 or less never expires.
    pub ttl: i64,
    checksum: String,
}

impl CacheEntry {
    pub fn new(
        key: impl Into<String>,
        payload: serde_json::Value,
        fetched_at: u64,
        ttl: i64,
    ) -> Self {
        let checksum = payload_checksum(&payload);
        Self {
            key: key.into(),
            payload,
            fetched_at,
            ttl,
            checksum,
        }
    }

    pub fn is_expired(&self, now: u64) -> bool {
        if self.ttl <= 0 {
            return false;
        }
        now.saturating_sub(self.fetched_at) > self.ttl as u64
    }

    fn is_intact(&self) -> bool {
        self.checksum == payload_checksum(&self.payload)
    }
}

/// Deterministic key for a request description.
///
/// `serde_json` objects keep their keys sorted, so logically identical
/// requests hash the same whatever order the fields were inserted in.
pub fn cache_key(request: &serde_json::Value) -> String {
    let mut hasher = FxHasher64::default();
    hasher.write(request.to_string().as_bytes());
    format!("{:016x}", hasher.finish())
}

fn payload_checksum(payload: &serde_json::Value) -> String {
    let mut hasher = FxHasher64::default();
    hasher.write(payload.to_string().as_bytes());
    format!("{:016x}", hasher.finish())
}

pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or(0)
}

#[derive(Debug, Clone)]
pub struct RequestCache {
    dir: PathBuf,
    default_ttl: i64,
}

impl RequestCache {
    /// Creates `<root>/<namespace>` if needed.
    pub fn new(root: impl AsRef<Path>, namespace: &str, default_ttl: i64) -> Result<Self> {
        let dir = root.as_ref().join(namespace);
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, default_ttl })
    }

    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        Self::new(&config.root, &config.namespace, config.default_ttl_secs)
    }

    pub fn default_ttl(&self) -> i64 {
        self.default_ttl
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    /// Returns the payload, or `None` when absent, expired or corrupted.
    /// Expired entries are removed from disk.
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.get_at(key, now_secs())
    }

    pub fn get_at(&self, key: &str, now: u64) -> Option<serde_json::Value> {
        let path = self.path_for(key);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(_) => return None,
        };

        let entry: CacheEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(err) => {
                warn!(key, error = %err, "cache entry unreadable, treating as miss");
                return None;
            }
        };

        if entry.key != key || !entry.is_intact() {
            warn!(key, "cache entry failed integrity check, treating as miss");
            return None;
        }

        if entry.is_expired(now) {
            debug!(key, fetched_at = entry.fetched_at, ttl = entry.ttl, "cache entry expired");
            let _ = fs::remove_file(&path);
            return None;
        }

        Some(entry.payload)
    }

    /// Stores `payload` under `key` with an explicit ttl.
    pub fn put(&self, key: &str, payload: serde_json::Value, ttl: i64) -> Result<()> {
        self.put_entry(&CacheEntry::new(key, payload, now_secs(), ttl))
    }

    pub fn put_entry(&self, entry: &CacheEntry) -> Result<()> {
        let path = self.path_for(&entry.key);
        let tmp_path = self.dir.join(format!(
            ".{}.{}.{}.tmp",
            entry.key,
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        let bytes = serde_json::to_vec(entry)?;
        if let Err(err) = fs::write(&tmp_path, bytes).and_then(|_| fs::rename(&tmp_path, &path)) {
            let _ = fs::remove_file(&tmp_path);
            return Err(err.into());
        }
        Ok(())
    }

    /// Serves from cache or runs `fetch` and stores its result with the
    /// default ttl. Fetch errors are returned untouched and nothing is stored.
    /// A failed write is logged; the fetched value is still returned.
    pub fn get_or_fetch<T, F>(&self, key: &str, fetch: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T>,
    {
        if let Some(payload) = self.get(key) {
            match serde_json::from_value::<T>(payload) {
                Ok(value) => {
                    debug!(key, "cache hit");
                    return Ok(value);
                }
                Err(err) => {
                    warn!(key, error = %err, "cached payload has unexpected shape, refetching");
                }
            }
        }

        let value = fetch()?;
        let payload = serde_json::to_value(&value)?;
        if let Err(err) = self.put(key, payload, self.default_ttl) {
            warn!(key, error = %err, "failed to write cache entry");
        }
        Ok(value)
    }
}
