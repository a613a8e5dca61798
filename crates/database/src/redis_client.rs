use anyhow::Context;
use redis::{aio::ConnectionManager, Client};
use tracing::info;

pub type RedisPool = ConnectionManager;

pub async fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url).context("Invalid Redis URL")?;
    info!("Redis client created");
    Ok(client)
}

/// Connection manager that has answered a PING
pub async fn create_redis_pool(client: Client) -> anyhow::Result<RedisPool> {
    let mut pool = ConnectionManager::new(client)
        .await
        .context("Failed to open Redis connection")?;

    redis::cmd("PING")
        .query_async::<_, String>(&mut pool)
        .await
        .context("Redis did not answer PING")?;

    info!("Redis connection manager ready");
    Ok(pool)
}

pub async fn connect(redis_url: &str) -> anyhow::Result<RedisPool> {
    let client = create_redis_client(redis_url).await?;
    create_redis_pool(client).await
}
