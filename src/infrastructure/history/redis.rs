use async_trait::async_trait;
use deadpool_redis::{
    redis::{AsyncCommands, AsyncIter},
    Config, Connection, Pool, Runtime,
};

use crate::domain::{ports::ChatHistoryStore, DomainError, Message};

pub type RedisPool = Pool;

pub fn create_pool(redis_url: &str) -> Result<RedisPool, DomainError> {
    let cfg = Config::from_url(redis_url);
    cfg.create_pool(Some(Runtime::Tokio1))
        .map_err(|e| DomainError::external(format!("Redis pool error: {e}")))
}

/// Session history kept as one Redis list per session, one JSON message per element.
#[derive(Clone)]
pub struct RedisChatHistory {
    pool: RedisPool,
    key_prefix: String,
    ttl_seconds: Option<u64>,
}

impl RedisChatHistory {
    pub fn new(pool: RedisPool, key_prefix: impl Into<String>) -> Self {
        Self {
            pool,
            key_prefix: key_prefix.into(),
            ttl_seconds: None,
        }
    }

    /// Expire a session this long after its last append.
    pub fn with_ttl(mut self, ttl_seconds: Option<u64>) -> Self {
        self.ttl_seconds = ttl_seconds;
        self
    }

    pub fn key(&self, session_id: &str) -> String {
        format!("{}:{}", self.key_prefix, session_id)
    }

    async fn conn(&self) -> Result<Connection, DomainError> {
        self.pool
            .get()
            .await
            .map_err(|e| DomainError::external(format!("Redis pool error: {e}")))
    }
}

fn redis_err(e: deadpool_redis::redis::RedisError) -> DomainError {
    DomainError::external(format!("Redis error: {e}"))
}

#[async_trait]
impl ChatHistoryStore for RedisChatHistory {
    async fn get(&self, session_id: &str) -> Result<Vec<Message>, DomainError> {
        let mut conn = self.conn().await?;
        let items: Vec<String> = conn
            .lrange(self.key(session_id), 0, -1)
            .await
            .map_err(redis_err)?;

        items
            .iter()
            .map(|item| {
                serde_json::from_str::<Message>(item)
                    .map_err(|e| DomainError::internal(format!("corrupt history entry: {e}")))
            })
            .collect()
    }

    async fn append(&self, session_id: &str, messages: &[Message]) -> Result<(), DomainError> {
        if messages.is_empty() {
            return Ok(());
        }

        let items = messages
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| DomainError::internal(e.to_string()))?;
        let key = self.key(session_id);

        let mut conn = self.conn().await?;
        conn.rpush::<_, _, ()>(&key, items).await.map_err(redis_err)?;

        if let Some(ttl) = self.ttl_seconds {
            conn.expire::<_, ()>(&key, ttl as i64)
                .await
                .map_err(redis_err)?;
        }
        Ok(())
    }

    async fn clear(&self, session_id: &str) -> Result<(), DomainError> {
        let mut conn = self.conn().await?;
        conn.del::<_, ()>(self.key(session_id))
            .await
            .map_err(redis_err)
    }

    async fn sessions(&self) -> Result<Vec<String>, DomainError> {
        let mut conn = self.conn().await?;
        let prefix = format!("{}:", self.key_prefix);
        let mut keys = Vec::new();
        let mut iter: AsyncIter<String> = conn
            .scan_match(format!("{prefix}*"))
            .await
            .map_err(redis_err)?;
        while let Some(key) = iter.next_item().await {
            keys.push(key);
        }

        Ok(session_ids(&prefix, keys))
    }
}

/// Session ids behind `prefix`, sorted. SCAN may report a key more than once.
fn session_ids(prefix: &str, keys: Vec<String>) -> Vec<String> {
    let mut ids: Vec<String> = keys
        .into_iter()
        .filter_map(|k| k.strip_prefix(prefix).map(str::to_string))
        .collect();
    ids.sort();
    ids.dedup();
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_namespaced() {
        let pool = create_pool("redis://localhost:6379").unwrap();
        let store = RedisChatHistory::new(pool, "message_store");

        assert_eq!(store.key("abc123"), "message_store:abc123");
    }

    #[test]
    fn test_scanned_keys_become_sorted_unique_ids() {
        let keys = vec![
            "message_store:b".to_string(),
            "message_store:a".to_string(),
            "message_store:b".to_string(),
            "other:c".to_string(),
        ];

        assert_eq!(session_ids("message_store:", keys), vec!["a", "b"]);
    }
}
