pub mod barbers;
pub mod tracking;

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::AppError;

/// String-valued key-value persistence shared by every party.
///
/// Writes are plain overwrites: concurrent writers to the same key race and
/// the last one wins.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError>;

    async fn set(&self, key: &str, value: String) -> Result<(), AppError>;

    async fn remove(&self, key: &str) -> Result<(), AppError>;

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, AppError>;
}

#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), AppError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), AppError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, AppError> {
        Ok(self
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect())
    }
}

/// Wraps a store and delays every call by a random duration in
/// `[min, max]`, standing in for a remote backend.
pub struct LatencyStore<S> {
    inner: S,
    min: Duration,
    max: Duration,
}

impl<S> LatencyStore<S> {
    pub fn new(inner: S, min: Duration, max: Duration) -> Self {
        Self {
            inner,
            min: min.min(max),
            max,
        }
    }

    async fn delay(&self) {
        let span = if self.max > self.min {
            rand::thread_rng().gen_range(self.min..=self.max)
        } else {
            self.max
        };

        if !span.is_zero() {
            tokio::time::sleep(span).await;
        }
    }
}

#[async_trait]
impl<S: KeyValueStore> KeyValueStore for LatencyStore<S> {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        self.delay().await;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: String) -> Result<(), AppError> {
        self.delay().await;
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), AppError> {
        self.delay().await;
        self.inner.remove(key).await
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, AppError> {
        self.delay().await;
        self.inner.keys_with_prefix(prefix).await
    }
}

pub(crate) async fn get_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, AppError> {
    match store.get(key).await? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|err| AppError::Internal(format!("corrupt record {key}: {err}"))),
        None => Ok(None),
    }
}

pub(crate) async fn set_json<T: Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), AppError> {
    let raw = serde_json::to_string(value)
        .map_err(|err| AppError::Internal(format!("failed to serialize {key}: {err}")))?;
    store.set(key, raw).await
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{KeyValueStore, LatencyStore, MemoryStore};

    #[tokio::test]
    async fn memory_store_overwrites_and_lists_by_prefix() {
        let store = MemoryStore::new();
        store.set("tracking:a", "1".to_string()).await.unwrap();
        store.set("tracking:a", "2".to_string()).await.unwrap();
        store.set("barber:b", "3".to_string()).await.unwrap();

        assert_eq!(store.get("tracking:a").await.unwrap().as_deref(), Some("2"));
        assert_eq!(
            store.keys_with_prefix("tracking:").await.unwrap(),
            vec!["tracking:a".to_string()]
        );

        store.remove("tracking:a").await.unwrap();
        assert_eq!(store.get("tracking:a").await.unwrap(), None);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn latency_store_delays_calls() {
        let store = LatencyStore::new(
            MemoryStore::new(),
            Duration::from_millis(300),
            Duration::from_millis(1500),
        );

        let start = tokio::time::Instant::now();
        store.set("k", "v".to_string()).await.unwrap();
        let elapsed = start.elapsed();

        assert!(elapsed >= Duration::from_millis(300));
        assert!(elapsed <= Duration::from_millis(1600));
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
    }
}
