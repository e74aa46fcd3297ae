//! Storage adapter interface and the in-memory implementation.
//!
//! Storage is consumed only by the user-data middleware; the dispatch core
//! itself never touches it. Operations are infallible from the caller's
//! point of view — adapters for real backends are expected to log and
//! absorb their own I/O errors, since a broken user-data read should not
//! fail an otherwise healthy update pipeline. Consistency guarantees across
//! concurrent writers are the backend's business, not this crate's.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::trace;

/// Per-user key-value storage with optional entry expiry.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Reads one value.
    async fn get(&self, user_id: i64, key: &str) -> Option<Value>;

    /// Writes one value, optionally expiring after `ttl`.
    async fn set(&self, user_id: i64, key: &str, value: Value, ttl: Option<Duration>);

    /// Deletes one value.
    async fn delete(&self, user_id: i64, key: &str);

    /// Reads all live values for a user.
    async fn get_all(&self, user_id: i64) -> HashMap<String, Value>;

    /// Deletes all values for a user.
    async fn clear(&self, user_id: i64);
}

struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-memory [`StorageAdapter`] with lazy TTL expiry.
///
/// Expired entries are dropped on access rather than by a sweeper task;
/// suitable for tests and single-process bots.
#[derive(Default)]
pub struct MemoryStorage {
    users: Mutex<HashMap<i64, HashMap<String, Entry>>>,
}

impl MemoryStorage {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageAdapter for MemoryStorage {
    async fn get(&self, user_id: i64, key: &str) -> Option<Value> {
        let now = Instant::now();
        let mut users = self.users.lock();
        let entries = users.get_mut(&user_id)?;
        match entries.get(key) {
            Some(entry) if entry.expired(now) => {
                entries.remove(key);
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }

    async fn set(&self, user_id: i64, key: &str, value: Value, ttl: Option<Duration>) {
        trace!(user_id, key, ttl = ?ttl, "storage set");
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.users
            .lock()
            .entry(user_id)
            .or_default()
            .insert(key.to_string(), Entry { value, expires_at });
    }

    async fn delete(&self, user_id: i64, key: &str) {
        if let Some(entries) = self.users.lock().get_mut(&user_id) {
            entries.remove(key);
        }
    }

    async fn get_all(&self, user_id: i64) -> HashMap<String, Value> {
        let now = Instant::now();
        let mut users = self.users.lock();
        let Some(entries) = users.get_mut(&user_id) else {
            return HashMap::new();
        };
        entries.retain(|_, entry| !entry.expired(now));
        entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.value.clone()))
            .collect()
    }

    async fn clear(&self, user_id: i64) {
        self.users.lock().remove(&user_id);
    }
}
