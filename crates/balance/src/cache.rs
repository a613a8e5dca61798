use async_trait::async_trait;
use shared::config::CacheConfig;
use shared::models::{BalanceData, WalletIdentity};
use shared::{CachedBalances, PersistentCacheStore, Result};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

/// Writes accepted by the cache but not yet handed to the store
///
/// A later value for the same wallet replaces the earlier one, so this holds
/// at most one entry per wallet no matter how far the store falls behind.
type PendingWrites = Arc<Mutex<CachedBalances>>;

/// Cold-start balances held in memory with write-through to a persistent store
///
/// The store is read once at load time. Writes are merged into a pending set
/// and flushed by a background task, so the caller never waits on I/O and
/// the store always ends with the latest value per wallet.
pub struct BalanceCache {
    entries: CachedBalances,
    pending: PendingWrites,
    wake_tx: mpsc::Sender<()>,
}

impl BalanceCache {
    /// Read every entry from the store; a failed read starts empty
    pub async fn load(store: Arc<dyn PersistentCacheStore>) -> Self {
        let entries = match store.load_all().await {
            Ok(entries) => {
                info!("Loaded {} cached balances", entries.len());
                entries
            }
            Err(e) => {
                warn!("Failed to load balance cache, starting empty: {}", e);
                CachedBalances::new()
            }
        };

        Self::with_entries(store, entries)
    }

    fn with_entries(store: Arc<dyn PersistentCacheStore>, entries: CachedBalances) -> Self {
        let pending = PendingWrites::default();
        // One queued wake-up is enough, the writer takes everything pending
        let (wake_tx, wake_rx) = mpsc::channel(1);
        tokio::spawn(run_writer(store, pending.clone(), wake_rx));

        Self {
            entries,
            pending,
            wake_tx,
        }
    }

    pub fn get(&self, wallet: &WalletIdentity) -> Option<&BalanceData> {
        self.entries.get(wallet)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn set(&mut self, wallet: WalletIdentity, data: BalanceData) {
        self.set_many(std::iter::once((wallet, data)));
    }

    /// Record adapter-confirmed balances; unchanged values are not rewritten
    pub fn set_many(&mut self, balances: impl IntoIterator<Item = (WalletIdentity, BalanceData)>) {
        let mut changed = CachedBalances::new();

        for (wallet, data) in balances {
            if self.entries.get(&wallet) == Some(&data) {
                continue;
            }
            self.entries.insert(wallet.clone(), data.clone());
            changed.insert(wallet, data);
        }

        if changed.is_empty() {
            return;
        }

        lock_pending(&self.pending).extend(changed);

        match self.wake_tx.try_send(()) {
            Ok(()) | Err(mpsc::error::TrySendError::Full(())) => {}
            Err(mpsc::error::TrySendError::Closed(())) => {
                warn!("Balance cache writer is gone, dropping write");
            }
        }
    }
}

fn lock_pending(pending: &PendingWrites) -> std::sync::MutexGuard<'_, CachedBalances> {
    // The map stays consistent even if a holder panicked
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Flushes pending writes on every wake-up; exits once the cache is dropped
///
/// A queued wake-up outlives the sender, so writes made just before the drop
/// are still flushed.
async fn run_writer(
    store: Arc<dyn PersistentCacheStore>,
    pending: PendingWrites,
    mut wake: mpsc::Receiver<()>,
) {
    while wake.recv().await.is_some() {
        let entries = std::mem::take(&mut *lock_pending(&pending));
        if entries.is_empty() {
            continue;
        }

        let count = entries.len();
        match store.upsert(entries).await {
            Ok(()) => debug!("Persisted {} cached balances", count),
            Err(e) => warn!("Failed to persist {} cached balances: {}", count, e),
        }
    }
    debug!("Balance cache writer stopped");
}

/// Process-local store, used when no Redis is configured and in tests
#[derive(Default)]
pub struct InMemoryCacheStore {
    entries: RwLock<CachedBalances>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: CachedBalances) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }
}

#[async_trait]
impl PersistentCacheStore for InMemoryCacheStore {
    async fn load_all(&self) -> Result<CachedBalances> {
        Ok(self.entries.read().await.clone())
    }

    async fn upsert(&self, entries: CachedBalances) -> Result<()> {
        self.entries.write().await.extend(entries);
        Ok(())
    }
}

/// Redis-backed store when configured and reachable, in-memory otherwise
pub async fn open_cache_store(config: &CacheConfig) -> Arc<dyn PersistentCacheStore> {
    let Some(redis_url) = config.redis_url.as_deref() else {
        info!("No REDIS_URL configured, balance cache is in-memory only");
        return Arc::new(InMemoryCacheStore::new());
    };

    match database::connect(redis_url).await {
        Ok(pool) => {
            info!("Balance cache persisted in Redis hash {}", config.cache_key);
            Arc::new(database::RedisBalanceStore::new(pool, config.cache_key.clone()))
        }
        Err(e) => {
            warn!("Redis unavailable, balance cache is in-memory only: {}", e);
            Arc::new(InMemoryCacheStore::new())
        }
    }
}
