use async_trait::async_trait;
use redis::AsyncCommands;
use shared::models::{BalanceData, WalletIdentity};
use shared::{CachedBalances, Error, PersistentCacheStore, Result};
use tracing::{debug, warn};

use crate::RedisPool;

/// Balance cache persisted in a single Redis hash
///
/// Each field is a wallet storage key and each value the JSON-encoded
/// balance. Entries never expire; stale rows for disabled wallets are simply
/// never looked up.
#[derive(Clone)]
pub struct RedisBalanceStore {
    redis_pool: RedisPool,
    cache_key: String,
}

impl RedisBalanceStore {
    pub fn new(redis_pool: RedisPool, cache_key: impl Into<String>) -> Self {
        Self {
            redis_pool,
            cache_key: cache_key.into(),
        }
    }

    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }

    fn encode_entry(identity: &WalletIdentity, data: &BalanceData) -> Result<(String, String)> {
        let json = serde_json::to_string(data)?;
        Ok((identity.storage_key(), json))
    }

    fn decode_entry(field: &str, json: &str) -> Option<(WalletIdentity, BalanceData)> {
        let identity = match WalletIdentity::from_storage_key(field) {
            Some(identity) => identity,
            None => {
                warn!("Skipping cache entry with malformed key: {}", field);
                return None;
            }
        };

        match serde_json::from_str::<BalanceData>(json) {
            Ok(data) => Some((identity, data)),
            Err(e) => {
                warn!("Skipping undecodable cache entry {}: {}", field, e);
                None
            }
        }
    }
}

#[async_trait]
impl PersistentCacheStore for RedisBalanceStore {
    async fn load_all(&self) -> Result<CachedBalances> {
        debug!("Loading balance cache from {}", self.cache_key);

        let mut conn = self.redis_pool.clone();
        let raw: Vec<(String, String)> = conn
            .hgetall(&self.cache_key)
            .await
            .map_err(|e| Error::Redis(format!("Failed to load balance cache: {}", e)))?;

        let entries: CachedBalances = raw
            .iter()
            .filter_map(|(field, json)| Self::decode_entry(field, json))
            .collect();

        debug!("Loaded {} cached balances", entries.len());
        Ok(entries)
    }

    async fn upsert(&self, entries: CachedBalances) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let fields = entries
            .iter()
            .map(|(identity, data)| Self::encode_entry(identity, data))
            .collect::<Result<Vec<_>>>()?;

        let mut conn = self.redis_pool.clone();
        conn.hset_multiple::<_, _, _, ()>(&self.cache_key, &fields)
            .await
            .map_err(|e| Error::Redis(format!("Failed to upsert balance cache: {}", e)))?;

        debug!("Stored {} balances in {}", fields.len(), self.cache_key);
        Ok(())
    }
}
