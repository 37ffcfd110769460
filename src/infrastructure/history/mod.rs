mod in_memory;
mod redis;

pub use in_memory::InMemoryChatHistory;
pub use redis::{create_pool, RedisChatHistory, RedisPool};
