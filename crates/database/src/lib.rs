pub mod balance_store;
pub mod redis_client;

pub use balance_store::RedisBalanceStore;
pub use redis_client::{connect, create_redis_client, create_redis_pool, RedisPool};
