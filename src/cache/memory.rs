use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use crate::core::{BackendError, Result};

use super::{CacheStore, Clock, SystemClock, slice_window};

#[derive(Debug, Clone)]
enum Payload {
    Bytes(Vec<u8>),
    List(Vec<String>),
}

#[derive(Debug, Clone)]
struct CacheEntry {
    payload: Payload,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

fn wrong_type(key: &str) -> BackendError {
    BackendError::Cache(format!(
        "WRONGTYPE operation against key '{}' holding the wrong kind of value",
        key
    ))
}

/// In-process [`CacheStore`] with lazy TTL expiry.
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    clock: Arc<dyn Clock>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.entries
            .read()
            .map(|entries| entries.values().filter(|e| e.is_live(now)).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remaining time to live, `None` for absent or persistent keys.
    pub fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        let now = self.clock.now();
        let entries = self.entries.read()?;
        Ok(entries
            .get(key)
            .filter(|e| e.is_live(now))
            .and_then(|e| e.expires_at)
            .map(|at| at.saturating_duration_since(now)))
    }

    /// Drops expired keys.
    pub fn purge_expired(&self) -> Result<usize> {
        let now = self.clock.now();
        let mut entries = self.entries.write()?;
        let before = entries.len();
        entries.retain(|_, e| e.is_live(now));
        Ok(before - entries.len())
    }

    fn live<T>(&self, key: &str, read: impl FnOnce(&CacheEntry) -> Result<T>) -> Result<Option<T>> {
        let now = self.clock.now();
        let entries = self.entries.read()?;
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => read(entry).map(Some),
            _ => Ok(None),
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.live(key, |entry| match &entry.payload {
            Payload::Bytes(bytes) => Ok(bytes.clone()),
            Payload::List(_) => Err(wrong_type(key).into()),
        })
    }

    fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        let expires_at = ttl.map(|ttl| self.clock.now() + ttl);
        self.entries.write()?.insert(
            key.to_string(),
            CacheEntry {
                payload: Payload::Bytes(value.to_vec()),
                expires_at,
            },
        );
        Ok(())
    }

    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.live(key, |_| Ok(()))?.is_some())
    }

    fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let now = self.clock.now();
        let mut entries = self.entries.write()?;
        match entries.get_mut(key) {
            Some(entry) if entry.is_live(now) => {
                entry.expires_at = Some(now + ttl);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn delete(&self, key: &str) -> Result<bool> {
        let now = self.clock.now();
        Ok(self
            .entries
            .write()?
            .remove(key)
            .is_some_and(|e| e.is_live(now)))
    }

    fn list_push(&self, key: &str, values: &[String]) -> Result<usize> {
        let now = self.clock.now();
        let mut entries = self.entries.write()?;

        if entries.get(key).is_some_and(|e| !e.is_live(now)) {
            entries.remove(key);
        }
        if values.is_empty() {
            return match entries.get(key) {
                Some(CacheEntry { payload: Payload::List(list), .. }) => Ok(list.len()),
                Some(_) => Err(wrong_type(key).into()),
                None => Ok(0),
            };
        }

        let entry = entries.entry(key.to_string()).or_insert_with(|| CacheEntry {
            payload: Payload::List(Vec::new()),
            expires_at: None,
        });
        match &mut entry.payload {
            Payload::List(list) => {
                list.extend(values.iter().cloned());
                Ok(list.len())
            }
            Payload::Bytes(_) => Err(wrong_type(key).into()),
        }
    }

    fn list_len(&self, key: &str) -> Result<usize> {
        Ok(self
            .live(key, |entry| match &entry.payload {
                Payload::List(list) => Ok(list.len()),
                Payload::Bytes(_) => Err(wrong_type(key).into()),
            })?
            .unwrap_or(0))
    }

    fn list_slice(&self, key: &str, offset: i64, limit: Option<i64>) -> Result<Vec<String>> {
        Ok(self
            .live(key, |entry| match &entry.payload {
                Payload::List(list) => Ok(list[slice_window(list.len(), offset, limit)].to_vec()),
                Payload::Bytes(_) => Err(wrong_type(key).into()),
            })?
            .unwrap_or_default())
    }
}
