//! # Storage Management Module
//!
//! ## Purpose
//! Persistent local cache for fetched API payloads, keyed by normalized
//! vehicle query and endpoint kind, using an embedded database.
//!
//! ## Input/Output Specification
//! - **Input**: Raw JSON payloads from the remote data client
//! - **Output**: Cached payload retrieval with a freshness window, stale
//!   reads for the fallback path, cache statistics
//! - **Storage**: Sled embedded database, bincode-encoded entries,
//!   optional gzip compression for large payloads
//!
//! ## Key Features
//! - At most one live entry per (query key, endpoint kind) pair
//! - All-or-nothing writes via sled's atomic per-key insert
//! - Freshness-based staleness only; no pressure-driven eviction
//! - Explicit store handle, opened once at process start

use crate::config::CacheStoreConfig;
use crate::errors::{IntakeError, Result};
use crate::EndpointKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A cached API response with its fetch timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Raw response payload as fetched
    pub payload: String,
    /// When the payload was fetched
    pub fetched_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Age of the entry relative to `now`, in whole seconds.
    pub fn age_seconds(&self, now: DateTime<Utc>) -> i64 {
        (now - self.fetched_at).num_seconds()
    }

    /// Whether the entry is inside the freshness window.
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl_hours: u64) -> bool {
        let age = self.age_seconds(now);
        age >= 0 && (age as u64) <= ttl_hours * 3600
    }
}

/// On-disk representation; the payload may be gzip-compressed.
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    compressed: bool,
    body: Vec<u8>,
    fetched_at: DateTime<Utc>,
}

/// Cache statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub database_size_bytes: u64,
}

/// Local cache store backed by sled
pub struct CacheStore {
    config: CacheStoreConfig,
    db: Arc<sled::Db>,
    entries: Arc<sled::Tree>,
}

impl CacheStore {
    /// Open the cache store at the configured path
    pub async fn open(config: CacheStoreConfig) -> Result<Self> {
        if let Some(parent) = config.db_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let db = sled::open(&config.db_path).map_err(|e| IntakeError::DatabaseConnection {
            db_path: config.db_path.to_string_lossy().to_string(),
            reason: e.to_string(),
        })?;

        let entries = db
            .open_tree("api_cache")
            .map_err(|e| IntakeError::DatabaseConnection {
                db_path: config.db_path.to_string_lossy().to_string(),
                reason: format!("Failed to open cache tree: {}", e),
            })?;

        tracing::info!(
            "Cache store opened at {:?} with {} entries",
            config.db_path,
            entries.len()
        );

        Ok(Self {
            config,
            db: Arc::new(db),
            entries: Arc::new(entries),
        })
    }

    fn entry_key(query_key: &str, kind: EndpointKind) -> String {
        format!("{}::{}", kind.as_str(), query_key)
    }

    /// Return the cached entry for (key, kind) if present and inside the
    /// freshness window, else a miss.
    pub async fn get(&self, query_key: &str, kind: EndpointKind) -> Result<Option<CacheEntry>> {
        let entry = self.read_entry(query_key, kind)?;

        match entry {
            Some(entry) if entry.is_fresh(Utc::now(), self.config.ttl_hours) => {
                tracing::debug!("Cache hit (fresh) for {} {}", kind, query_key);
                Ok(Some(entry))
            }
            Some(_) => {
                tracing::debug!("Cache entry stale for {} {}", kind, query_key);
                Ok(None)
            }
            None => {
                tracing::debug!("Cache miss for {} {}", kind, query_key);
                Ok(None)
            }
        }
    }

    /// Return the most recent cached entry regardless of age. This is the
    /// serve-stale-on-error path.
    pub async fn get_stale_ok(
        &self,
        query_key: &str,
        kind: EndpointKind,
    ) -> Result<Option<CacheEntry>> {
        self.read_entry(query_key, kind)
    }

    /// Write or overwrite the entry for (key, kind), stamped with the
    /// current time. The write is all-or-nothing per sled's insert.
    pub async fn put(&self, query_key: &str, kind: EndpointKind, payload: &str) -> Result<()> {
        self.put_at(query_key, kind, payload, Utc::now())
    }

    pub(crate) fn put_at(
        &self,
        query_key: &str,
        kind: EndpointKind,
        payload: &str,
        fetched_at: DateTime<Utc>,
    ) -> Result<()> {
        let compress = self.config.enable_compression
            && payload.len() >= self.config.compression_threshold_bytes;

        let body = if compress {
            compress_payload(payload)?
        } else {
            payload.as_bytes().to_vec()
        };

        let stored = StoredEntry {
            compressed: compress,
            body,
            fetched_at,
        };

        let key = Self::entry_key(query_key, kind);
        let value = bincode::serialize(&stored)?;
        self.entries.insert(key.as_bytes(), value)?;
        self.entries.flush()?;

        tracing::debug!(
            "Cached {} payload for {} ({} bytes{})",
            kind,
            query_key,
            payload.len(),
            if compress { ", compressed" } else { "" }
        );
        Ok(())
    }

    fn read_entry(&self, query_key: &str, kind: EndpointKind) -> Result<Option<CacheEntry>> {
        let key = Self::entry_key(query_key, kind);

        let Some(value) = self.entries.get(key.as_bytes())? else {
            return Ok(None);
        };

        let stored: StoredEntry = bincode::deserialize(&value)?;
        let payload = if stored.compressed {
            decompress_payload(&stored.body)?
        } else {
            String::from_utf8(stored.body).map_err(|e| IntakeError::Serialization {
                message: format!("cached payload is not UTF-8: {}", e),
            })?
        };

        Ok(Some(CacheEntry {
            payload,
            fetched_at: stored.fetched_at,
        }))
    }

    /// Get cache statistics
    pub async fn stats(&self) -> Result<CacheStats> {
        Ok(CacheStats {
            total_entries: self.entries.len(),
            database_size_bytes: self.db.size_on_disk()?,
        })
    }
}

/// Compress a payload with gzip
fn compress_payload(payload: &str) -> Result<Vec<u8>> {
    use std::io::Write;

    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder
        .write_all(payload.as_bytes())
        .map_err(|e| IntakeError::Internal {
            message: format!("compression failed: {}", e),
        })?;

    encoder.finish().map_err(|e| IntakeError::Internal {
        message: format!("compression finish failed: {}", e),
    })
}

/// Decompress a gzip payload
fn decompress_payload(data: &[u8]) -> Result<String> {
    use std::io::Read;

    let mut decoder = flate2::read::GzDecoder::new(data);
    let mut decompressed = String::new();
    decoder
        .read_to_string(&mut decompressed)
        .map_err(|e| IntakeError::Internal {
            message: format!("decompression failed: {}", e),
        })?;

    Ok(decompressed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VehicleKey;
    use chrono::Duration;

    fn test_config(dir: &tempfile::TempDir) -> CacheStoreConfig {
        CacheStoreConfig {
            db_path: dir.path().join("cache.db"),
            ttl_hours: 24,
            enable_compression: true,
            compression_threshold_bytes: 64,
        }
    }

    #[tokio::test]
    async fn round_trips_within_freshness_window() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(test_config(&dir)).await.unwrap();

        let key = VehicleKey::new(2021, "Toyota", "Camry").cache_key();
        store
            .put(&key, EndpointKind::Recalls, r#"{"Count":0,"results":[]}"#)
            .await
            .unwrap();

        let entry = store.get(&key, EndpointKind::Recalls).await.unwrap();
        assert_eq!(
            entry.unwrap().payload,
            r#"{"Count":0,"results":[]}"#.to_string()
        );
    }

    #[tokio::test]
    async fn misses_after_freshness_window_elapses() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(test_config(&dir)).await.unwrap();

        let key = "2020|honda|accord";
        let stale_stamp = Utc::now() - Duration::hours(25);
        store
            .put_at(key, EndpointKind::Complaints, "{}", stale_stamp)
            .unwrap();

        assert!(store
            .get(key, EndpointKind::Complaints)
            .await
            .unwrap()
            .is_none());

        // The stale path still sees it.
        let stale = store
            .get_stale_ok(key, EndpointKind::Complaints)
            .await
            .unwrap();
        assert_eq!(stale.unwrap().fetched_at, stale_stamp);
    }

    #[tokio::test]
    async fn new_put_overwrites_prior_entry() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(test_config(&dir)).await.unwrap();

        let key = "2019|ford|f150";
        store.put(key, EndpointKind::Recalls, "old").await.unwrap();
        store.put(key, EndpointKind::Recalls, "new").await.unwrap();

        let entry = store.get(key, EndpointKind::Recalls).await.unwrap();
        assert_eq!(entry.unwrap().payload, "new");
        assert_eq!(store.stats().await.unwrap().total_entries, 1);
    }

    #[tokio::test]
    async fn endpoint_kinds_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(test_config(&dir)).await.unwrap();

        let key = "2019|ford|f150";
        store.put(key, EndpointKind::Recalls, "recalls").await.unwrap();
        store
            .put(key, EndpointKind::Complaints, "complaints")
            .await
            .unwrap();

        let entry = store.get(key, EndpointKind::Recalls).await.unwrap();
        assert_eq!(entry.unwrap().payload, "recalls");
    }

    #[tokio::test]
    async fn equivalent_keys_collide_after_normalization() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(test_config(&dir)).await.unwrap();

        let a = VehicleKey::new(2021, "  TOYOTA ", "Camry").cache_key();
        let b = VehicleKey::new(2021, "toyota", " camry").cache_key();
        assert_eq!(a, b);

        store.put(&a, EndpointKind::Complaints, "x").await.unwrap();
        assert!(store.get(&b, EndpointKind::Complaints).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn compresses_large_payloads_transparently() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(test_config(&dir)).await.unwrap();

        let payload = "x".repeat(4096);
        store
            .put("k", EndpointKind::VinDecode, &payload)
            .await
            .unwrap();

        let entry = store.get("k", EndpointKind::VinDecode).await.unwrap();
        assert_eq!(entry.unwrap().payload, payload);
    }
}
