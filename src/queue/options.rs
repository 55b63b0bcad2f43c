//! Persisted key/value options with a read-through cache.
//!
//! Values are stored as JSON. The first read of a key is memoized, including
//! misses (the default is cached with the current time). Writes go to the
//! store first and then to the cache; they are visible to this process only.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::sqlite::SqliteStorage;
use super::types::now_ms;
use crate::error::QueueResult;

pub const QUEUE_PAUSED: &str = "queue_paused";
pub const TAKEOVER_CLIENT: &str = "takeover_client";

#[derive(Debug, Clone)]
struct CachedOption {
    value: Value,
    updated_at: i64,
}

pub struct Options {
    inner: Mutex<OptionsInner>,
}

struct OptionsInner {
    storage: SqliteStorage,
    cache: HashMap<String, CachedOption>,
}

impl Options {
    pub fn new(storage: SqliteStorage) -> Self {
        Self {
            inner: Mutex::new(OptionsInner {
                storage,
                cache: HashMap::new(),
            }),
        }
    }

    /// Read `key`, falling back to `default` on a miss.
    pub fn get<T>(&self, key: &str, default: T) -> QueueResult<T>
    where
        T: Serialize + DeserializeOwned,
    {
        self.get_with_timestamp(key, default).map(|(value, _)| value)
    }

    /// Read `key` together with its last-updated timestamp (ms).
    pub fn get_with_timestamp<T>(&self, key: &str, default: T) -> QueueResult<(T, i64)>
    where
        T: Serialize + DeserializeOwned,
    {
        let mut inner = self.inner.lock();

        if let Some(cached) = inner.cache.get(key) {
            let value = serde_json::from_value(cached.value.clone())?;
            return Ok((value, cached.updated_at));
        }

        let cached = match inner.storage.load_option(key)? {
            Some((Some(raw), updated_at)) => CachedOption {
                value: serde_json::from_str(&raw)?,
                updated_at,
            },
            Some((None, updated_at)) => CachedOption {
                value: serde_json::to_value(&default)?,
                updated_at,
            },
            None => CachedOption {
                value: serde_json::to_value(&default)?,
                updated_at: now_ms(),
            },
        };

        let value = serde_json::from_value(cached.value.clone())?;
        let updated_at = cached.updated_at;
        inner.cache.insert(key.to_string(), cached);
        Ok((value, updated_at))
    }

    /// Upsert `key` and refresh the cache. Returns the timestamp written.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> QueueResult<i64> {
        let value = serde_json::to_value(value)?;
        let updated_at = now_ms();

        let mut inner = self.inner.lock();
        inner
            .storage
            .save_option(key, &serde_json::to_string(&value)?, updated_at)?;
        inner
            .cache
            .insert(key.to_string(), CachedOption { value, updated_at });
        Ok(updated_at)
    }
}
