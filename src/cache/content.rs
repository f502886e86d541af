// ABOUTME: Content-addressed payload cache with LRU eviction and lazy TTL expiry
// ABOUTME: Stores raw bytes by SHA-256 digest and memoizes decoded data-URI descriptors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::data_uri::{decode_data_uri, is_data_uri};
use super::CacheConfig;
use bytes::Bytes;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

/// Descriptor returned in place of an inline `data:` URI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataUriDescriptor {
    /// Path serving the decoded payload
    pub url: String,
    /// Media type declared by the URI
    pub content_type: String,
    /// Decoded payload length
    pub size_bytes: usize,
}

/// Payload returned by a successful lookup
#[derive(Debug, Clone)]
pub struct CachedPayload {
    /// Stored media type
    pub content_type: String,
    /// Stored bytes
    pub bytes: Bytes,
}

/// Point-in-time view of cache occupancy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContentCacheStats {
    /// Byte payload entries currently held
    pub byte_entries: usize,
    /// Data-URI descriptors currently held
    pub data_uri_entries: usize,
    /// Total bytes across all byte payload entries
    pub stored_bytes: usize,
}

#[derive(Debug, Clone)]
struct ByteEntry {
    content_type: String,
    bytes: Bytes,
    stored_at: Instant,
}

#[derive(Debug, Clone)]
struct DataUriEntry {
    descriptor: DataUriDescriptor,
    digest: String,
    stored_at: Instant,
}

fn is_expired(stored_at: Instant, ttl: Duration) -> bool {
    !ttl.is_zero() && stored_at.elapsed() >= ttl
}

struct CacheState {
    bytes: LruCache<String, ByteEntry>,
    data_uris: LruCache<String, DataUriEntry>,
}

/// Process-wide content cache shared by all streaming connections.
///
/// Both maps sit behind one mutex. Every store, lookup and eviction is a single
/// critical section and no lock is held while decoding base64 or hashing.
pub struct ContentCache {
    state: Mutex<CacheState>,
    ttl: Duration,
    url_prefix: String,
}

impl ContentCache {
    const FALLBACK_CAPACITY: NonZeroUsize = match NonZeroUsize::new(1) {
        Some(n) => n,
        None => unreachable!(),
    };

    /// Create a cache from configuration
    #[must_use]
    pub fn new(config: &CacheConfig) -> Self {
        let byte_capacity =
            NonZeroUsize::new(config.byte_capacity()).unwrap_or(Self::FALLBACK_CAPACITY);
        let uri_capacity =
            NonZeroUsize::new(config.data_uri_capacity()).unwrap_or(Self::FALLBACK_CAPACITY);

        Self {
            state: Mutex::new(CacheState {
                bytes: LruCache::new(byte_capacity),
                data_uris: LruCache::new(uri_capacity),
            }),
            ttl: config.ttl,
            url_prefix: config.url_prefix.trim_end_matches('/').to_owned(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        // A panic while holding the lock cannot leave the LRU maps half-updated
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn url_for(&self, digest: &str) -> String {
        format!("{}/{digest}", self.url_prefix)
    }

    /// Hex SHA-256 digest used as the content key
    #[must_use]
    pub fn digest(bytes: &[u8]) -> String {
        hex::encode(Sha256::digest(bytes))
    }

    /// Store a byte payload and return the path serving it.
    ///
    /// Empty input is a no-op returning `None`. Storing identical bytes again
    /// returns the same path and only refreshes recency.
    pub fn store_bytes(&self, media_type: &str, bytes: &[u8]) -> Option<String> {
        if bytes.is_empty() {
            return None;
        }
        let digest = Self::digest(bytes);
        let content_type = media_type.trim();
        self.insert(digest.clone(), content_type, Bytes::copy_from_slice(bytes));
        Some(self.url_for(&digest))
    }

    fn insert(&self, digest: String, content_type: &str, bytes: Bytes) {
        let mut state = self.lock();
        if let Some(entry) = state.bytes.get_mut(&digest) {
            entry.stored_at = Instant::now();
            if entry.content_type.is_empty() && !content_type.is_empty() {
                content_type.clone_into(&mut entry.content_type);
            }
            return;
        }
        let evicted = state.bytes.push(
            digest.clone(),
            ByteEntry {
                content_type: content_type.to_owned(),
                bytes,
                stored_at: Instant::now(),
            },
        );
        drop(state);

        if let Some((old_digest, _)) = evicted.filter(|(key, _)| *key != digest) {
            debug!(digest = %old_digest, "content cache evicted least recently used payload");
        }
    }

    /// Look up a payload by digest.
    ///
    /// An entry older than the TTL is evicted and reported as absent. A hit
    /// refreshes both recency and the stored timestamp.
    pub fn get(&self, digest: &str) -> Option<CachedPayload> {
        let mut state = self.lock();
        let expired = match state.bytes.get_mut(digest) {
            None => return None,
            Some(entry) if is_expired(entry.stored_at, self.ttl) => true,
            Some(entry) => {
                entry.stored_at = Instant::now();
                return Some(CachedPayload {
                    content_type: entry.content_type.clone(),
                    bytes: entry.bytes.clone(),
                });
            }
        };
        if expired {
            state.bytes.pop(digest);
        }
        drop(state);
        debug!(digest = %digest, "content cache entry expired on lookup");
        None
    }

    /// Replace a base64 `data:` URI with a cache-backed descriptor.
    ///
    /// Returns `None` for any value that is not a base64 `data:` URI. Repeat
    /// calls with the same literal string are served from the descriptor cache
    /// without decoding again, as long as the backing bytes are still cached.
    pub fn maybe_store_data_uri(&self, value: &str) -> Option<DataUriDescriptor> {
        if !is_data_uri(value) {
            return None;
        }
        let literal_key = Self::digest(value.as_bytes());

        if let Some(descriptor) = self.cached_descriptor(&literal_key) {
            return Some(descriptor);
        }

        let decoded = decode_data_uri(value)?;
        let size_bytes = decoded.bytes.len();
        let digest = Self::digest(&decoded.bytes);
        self.insert(digest.clone(), &decoded.media_type, Bytes::from(decoded.bytes));

        let descriptor = DataUriDescriptor {
            url: self.url_for(&digest),
            content_type: decoded.media_type,
            size_bytes,
        };
        self.lock().data_uris.push(
            literal_key,
            DataUriEntry {
                descriptor: descriptor.clone(),
                digest,
                stored_at: Instant::now(),
            },
        );
        Some(descriptor)
    }

    fn cached_descriptor(&self, literal_key: &str) -> Option<DataUriDescriptor> {
        let mut state = self.lock();
        let (descriptor, digest) = match state.data_uris.get_mut(literal_key) {
            None => return None,
            Some(entry) if is_expired(entry.stored_at, self.ttl) => (None, None),
            Some(entry) => {
                entry.stored_at = Instant::now();
                (Some(entry.descriptor.clone()), Some(entry.digest.clone()))
            }
        };

        // The descriptor is only useful while its bytes are still served
        let backing_alive = digest.as_deref().is_some_and(|digest| {
            state.bytes.get_mut(digest).is_some_and(|entry| {
                if is_expired(entry.stored_at, self.ttl) {
                    false
                } else {
                    entry.stored_at = Instant::now();
                    true
                }
            })
        });
        if backing_alive {
            return descriptor;
        }
        state.data_uris.pop(literal_key);
        None
    }

    /// Current occupancy
    #[must_use]
    pub fn stats(&self) -> ContentCacheStats {
        let state = self.lock();
        ContentCacheStats {
            byte_entries: state.bytes.len(),
            data_uri_entries: state.data_uris.len(),
            stored_bytes: state.bytes.iter().map(|(_, entry)| entry.bytes.len()).sum(),
        }
    }
}

impl Default for ContentCache {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}
