use crate::core::cache::Cache;
use crate::core::error::Result;
use crate::core::models::OwnerId;
use crate::core::store::{EntityStore, Record};
use async_trait::async_trait;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

struct CacheValue<V> {
    value: V,
    expires_at: Option<Instant>,
}

/// In-memory cache backed by a HashMap behind an async mutex.
///
/// Expiry uses the tokio clock so tests can pause and advance time.
pub struct MemoryCache<K, V> {
    inner: Arc<Mutex<HashMap<K, CacheValue<V>>>>,
}

impl<K, V> MemoryCache<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<K, V> Default for MemoryCache<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<K, V> Cache<K, V> for MemoryCache<K, V>
where
    K: Eq + Hash + Send + Sync + std::fmt::Debug + 'static,
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &K) -> Option<V> {
        let mut cache = self.inner.lock().await;
        let expired = match cache.get(key) {
            Some(entry) => entry.expires_at.is_some_and(|expiry| expiry <= Instant::now()),
            None => {
                debug!("Cache MISS for key: {:?}", key);
                return None;
            }
        };
        if expired {
            debug!("Cache entry expired for key: {:?}", key);
            cache.remove(key);
            return None;
        }
        debug!("Cache HIT for key: {:?}", key);
        cache.get(key).map(|entry| entry.value.clone())
    }

    async fn put(&self, key: K, value: V, ttl: Option<Duration>) {
        let expires_at = ttl.map(|duration| Instant::now() + duration);
        let cache_value = CacheValue { value, expires_at };

        let mut cache = self.inner.lock().await;
        debug!("Cache PUT for key: {:?}", key);
        cache.insert(key, cache_value);
    }

    async fn remove(&self, key: &K) {
        let mut cache = self.inner.lock().await;
        cache.remove(key);
        debug!("Cache REMOVE for key: {:?}", key);
    }

    async fn clear(&self) {
        let mut cache = self.inner.lock().await;
        cache.clear();
        debug!("Cache CLEAR");
    }
}

/// Entity store kept entirely in memory. Used by tests and by embedders
/// that persist records elsewhere.
pub struct MemoryStore<T: Record> {
    records: Mutex<HashMap<Uuid, T>>,
}

impl<T: Record> MemoryStore<T> {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
        }
    }
}

impl<T: Record> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Record> EntityStore<T> for MemoryStore<T> {
    async fn create(&self, record: T) -> Result<T> {
        let mut records = self.records.lock().await;
        debug!(kind = T::KIND, id = %record.id(), "Creating record");
        records.insert(record.id(), record.clone());
        Ok(record)
    }

    async fn find_by_owner(&self, owner: &OwnerId) -> Result<Vec<T>> {
        let records = self.records.lock().await;
        Ok(records
            .values()
            .filter(|r| r.owner() == owner)
            .cloned()
            .collect())
    }

    async fn find_by_id_and_owner(&self, id: Uuid, owner: &OwnerId) -> Result<Option<T>> {
        let records = self.records.lock().await;
        Ok(records.get(&id).filter(|r| r.owner() == owner).cloned())
    }

    async fn update_by_id_and_owner(
        &self,
        id: Uuid,
        owner: &OwnerId,
        record: T,
    ) -> Result<Option<T>> {
        if record.id() != id || record.owner() != owner {
            debug!(kind = T::KIND, %id, "Refusing update that changes id or owner");
            return Ok(None);
        }
        let mut records = self.records.lock().await;
        match records.get_mut(&id) {
            Some(existing) if existing.owner() == owner => {
                *existing = record.clone();
                Ok(Some(record))
            }
            _ => Ok(None),
        }
    }

    async fn delete_by_id_and_owner(&self, id: Uuid, owner: &OwnerId) -> Result<Option<T>> {
        let mut records = self.records.lock().await;
        if records.get(&id).is_some_and(|r| r.owner() == owner) {
            return Ok(records.remove(&id));
        }
        Ok(None)
    }
}
