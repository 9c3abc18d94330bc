use redis::AsyncCommands;
use serde::{Serialize, de::DeserializeOwned};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::Mutex;
use tracing::warn;

pub async fn redis_get<T: DeserializeOwned>(client: &redis::Client, key: &str) -> Option<T> {
    let mut conn = match client.get_multiplexed_async_connection().await {
        Ok(c) => c,
        Err(err) => {
            warn!(target = "catalog.api", error = %err, "redis unavailable for idempotency lookup");
            return None;
        }
    };
    let s: Option<String> = conn.get(key).await.ok();
    s.and_then(|v| serde_json::from_str(&v).ok())
}

pub async fn redis_set<T: Serialize>(client: &redis::Client, key: &str, value: &T, ttl_secs: u64) {
    if let Ok(mut conn) = client.get_multiplexed_async_connection().await
        && let Ok(json) = serde_json::to_string(value)
    {
        let _: Result<(), _> = conn.set_ex(key, json, ttl_secs).await;
    }
}

/// Replays responses for repeated `Idempotency-Key`s, through Redis when
/// `REDIS_URL` is set and an in-process map otherwise.
#[derive(Clone)]
pub struct IdempotencyCache<T> {
    redis: Option<redis::Client>,
    local: Arc<Mutex<HashMap<String, T>>>,
    ttl_secs: u64,
}

impl<T: Clone + Serialize + DeserializeOwned> IdempotencyCache<T> {
    pub fn from_env() -> Self {
        let redis = std::env::var("REDIS_URL")
            .ok()
            .and_then(|u| redis::Client::open(u).ok());
        let ttl_secs = std::env::var("IDEMPOTENCY_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(3600);
        Self::new(redis, ttl_secs)
    }

    pub fn new(redis: Option<redis::Client>, ttl_secs: u64) -> Self {
        Self {
            redis,
            local: Arc::new(Mutex::new(HashMap::new())),
            ttl_secs,
        }
    }

    /// Keys are scoped per org so tenants never replay each other's results.
    pub fn scoped_key(scope: &str, org_id: &str, key: &str) -> String {
        format!("idem:{scope}:{org_id}:{key}")
    }

    pub async fn get(&self, key: &str) -> Option<T> {
        match &self.redis {
            Some(client) => redis_get(client, key).await,
            None => self.local.lock().await.get(key).cloned(),
        }
    }

    pub async fn put(&self, key: &str, value: &T) {
        match &self.redis {
            Some(client) => redis_set(client, key, value, self.ttl_secs).await,
            None => {
                self.local
                    .lock()
                    .await
                    .insert(key.to_string(), value.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mekari::PushReport;

    #[tokio::test]
    async fn local_map_replays_stored_value() {
        let cache: IdempotencyCache<PushReport> = IdempotencyCache::new(None, 60);
        let key = IdempotencyCache::<PushReport>::scoped_key("push", "acme", "abc");
        assert_eq!(key, "idem:push:acme:abc");
        assert!(cache.get(&key).await.is_none());

        let report = PushReport {
            attempted: 2,
            created_count: 1,
            updated_count: 1,
            errors: Vec::new(),
        };
        cache.put(&key, &report).await;
        let replayed = cache.get(&key).await.expect("stored");
        assert_eq!(replayed.attempted, 2);
        assert!(
            cache
                .get(&IdempotencyCache::<PushReport>::scoped_key("push", "other", "abc"))
                .await
                .is_none()
        );
    }
}
