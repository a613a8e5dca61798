mod cache;
mod engine;
mod filter;
pub mod sorter;
mod subscriptions;
mod total;

pub use cache::{open_cache_store, BalanceCache, InMemoryCacheStore};
pub use engine::{BalanceEngine, EngineEvent};
pub use filter::{native_tokens, AlwaysVisible, BalanceFilter};
pub use subscriptions::Generation;
pub use total::TotalBalance;

use shared::config::{BalanceConfig, EngineConfig};
use shared::models::{BalanceSnapshot, SortType, Wallet, WalletIdentity};
use shared::{AdapterSource, Error, PersistentCacheStore, RateSource, Result, WalletSource};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info, warn};

/// Collaborators the balance service is built from
#[derive(Clone)]
pub struct BalanceSources {
    pub wallets: Arc<dyn WalletSource>,
    pub rates: Arc<dyn RateSource>,
    pub adapters: Arc<dyn AdapterSource>,
    pub cache_store: Arc<dyn PersistentCacheStore>,
}

/// Live, sorted and filtered balances for the enabled wallets
///
/// Owns the engine task. Consumers read snapshots and issue commands here;
/// the engine applies every change on its own task in arrival order.
pub struct BalanceService {
    wallets: Arc<dyn WalletSource>,
    rates: Arc<dyn RateSource>,
    adapters: Arc<dyn AdapterSource>,
    events_tx: mpsc::Sender<EngineEvent>,
    snapshot_rx: watch::Receiver<Arc<BalanceSnapshot>>,
    disabled_tx: broadcast::Sender<WalletIdentity>,
    stopped: AtomicBool,
    runtime: Handle,
    engine_handle: JoinHandle<()>,
}

impl BalanceService {
    /// Load the cache, build the initial list and start following the sources
    pub async fn start(sources: BalanceSources, config: EngineConfig) -> Self {
        Self::start_with_filter(sources, config, BalanceFilter::default()).await
    }

    /// Open the configured cache store, then start as [`BalanceService::start`]
    pub async fn start_from_config(
        wallets: Arc<dyn WalletSource>,
        rates: Arc<dyn RateSource>,
        adapters: Arc<dyn AdapterSource>,
        config: &BalanceConfig,
    ) -> Self {
        let cache_store = open_cache_store(&config.cache).await;
        let sources = BalanceSources {
            wallets,
            rates,
            adapters,
            cache_store,
        };

        Self::start(sources, config.engine.clone()).await
    }

    pub async fn start_with_filter(
        sources: BalanceSources,
        config: EngineConfig,
        filter: BalanceFilter,
    ) -> Self {
        let cache = BalanceCache::load(sources.cache_store.clone()).await;

        let (events_tx, events_rx) = mpsc::channel(config.event_channel_capacity.max(1));
        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(BalanceSnapshot {
            sort_type: config.default_sort_type,
            ..BalanceSnapshot::default()
        }));
        let (disabled_tx, _) = broadcast::channel(config.disabled_channel_capacity.max(1));

        let mut engine = BalanceEngine::new(
            sources.rates.clone(),
            sources.adapters.clone(),
            cache,
            filter,
            events_tx.clone(),
            snapshot_tx,
            config.default_sort_type,
        );

        // Subscribe first so no change between the read and the subscription is lost
        let notifications = sources.wallets.change_notifications();
        let initial = match sources.wallets.active_wallets().await {
            Ok(wallets) => wallets,
            Err(e) => {
                warn!("Failed to read active wallets, starting empty: {}", e);
                Vec::new()
            }
        };
        let _ = engine.handle(EngineEvent::WalletsChanged(initial));
        engine.follow_wallets(notifications);

        let runtime = Handle::current();
        let engine_handle = runtime.spawn(engine.run(events_rx));
        info!("Balance service started");

        Self {
            wallets: sources.wallets,
            rates: sources.rates,
            adapters: sources.adapters,
            events_tx,
            snapshot_rx,
            disabled_tx,
            stopped: AtomicBool::new(false),
            runtime,
            engine_handle,
        }
    }

    /// Latest published snapshot
    pub fn current(&self) -> Arc<BalanceSnapshot> {
        self.snapshot_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<BalanceSnapshot>> {
        self.snapshot_rx.clone()
    }

    /// Snapshot stream starting with the current one; intermediate snapshots may be skipped
    pub fn snapshots(&self) -> WatchStream<Arc<BalanceSnapshot>> {
        WatchStream::new(self.snapshot_rx.clone())
    }

    pub fn total(&self) -> TotalBalance {
        TotalBalance::from(self.current().as_ref())
    }

    pub fn disabled_wallet_notifications(&self) -> broadcast::Receiver<WalletIdentity> {
        self.disabled_tx.subscribe()
    }

    pub fn is_running(&self) -> bool {
        !self.stopped.load(Ordering::SeqCst) && !self.events_tx.is_closed()
    }

    pub async fn set_sort_type(&self, sort_type: SortType) {
        if !self.is_running() {
            debug!("Ignoring sort change, balance service is cleared");
            return;
        }

        if self
            .events_tx
            .send(EngineEvent::SortTypeChanged(sort_type))
            .await
            .is_err()
        {
            debug!("Balance engine gone, sort change dropped");
        }
    }

    /// Ask rates and adapters to refetch; results arrive through their streams
    ///
    /// Runs on the runtime the service was started on, so callers outside that
    /// runtime may trigger it too.
    pub fn refresh(&self) {
        if !self.is_running() {
            debug!("Ignoring refresh, balance service is cleared");
            return;
        }

        let rates = self.rates.clone();
        let adapters = self.adapters.clone();
        self.runtime.spawn(async move {
            let (rates_result, adapters_result) = tokio::join!(rates.refresh(), adapters.refresh());
            if let Err(e) = rates_result {
                warn!("Rate refresh failed: {}", e);
            }
            if let Err(e) = adapters_result {
                warn!("Adapter refresh failed: {}", e);
            }
        });
    }

    /// Enable a wallet; the list updates once the wallet source reports the change
    pub async fn enable(&self, wallet: Wallet) -> Result<()> {
        self.ensure_running()?;
        self.wallets.enable(wallet).await
    }

    /// Disable a wallet and announce it on the disabled-wallet channel
    pub async fn disable(&self, wallet: Wallet) -> Result<()> {
        self.ensure_running()?;

        let identity = wallet.identity();
        self.wallets.disable(wallet).await?;

        // No subscribers is not an error
        let _ = self.disabled_tx.send(identity.clone());
        info!("Wallet {} disabled", identity);
        Ok(())
    }

    /// Stop the engine and drop every subscription; later calls do nothing
    pub async fn clear(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }

        let (ack_tx, ack_rx) = oneshot::channel();
        if self.events_tx.send(EngineEvent::Clear(ack_tx)).await.is_err() {
            debug!("Balance engine already gone");
            return;
        }
        let _ = ack_rx.await;
    }

    fn ensure_running(&self) -> Result<()> {
        if self.is_running() {
            Ok(())
        } else {
            Err(Error::EngineStopped)
        }
    }
}

impl Drop for BalanceService {
    fn drop(&mut self) {
        self.engine_handle.abort();
    }
}
