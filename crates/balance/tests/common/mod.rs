//! Scriptable wallet, rate and adapter sources for service-level tests

#![allow(dead_code)]

use async_trait::async_trait;
use balance::{BalanceSources, InMemoryCacheStore};
use chrono::Utc;
use futures::stream::{BoxStream, StreamExt};
use rust_decimal::Decimal;
use shared::models::{
    Account, AccountType, AdapterState, BalanceData, BalanceSnapshot, BlockchainType, CoinPrice,
    Token, Wallet, WalletIdentity,
};
use shared::{
    AdapterSource, CachedBalances, Error, PriceMap, RateSource, Result, WalletSource,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::BroadcastStream;

fn hot_stream<T: Clone + Send + 'static>(rx: broadcast::Receiver<T>) -> BoxStream<'static, T> {
    BroadcastStream::new(rx)
        .filter_map(|value| async move { value.ok() })
        .boxed()
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("debug")
        .try_init();
}

pub struct FakeWalletSource {
    wallets: Mutex<Vec<Wallet>>,
    changes: broadcast::Sender<Vec<Wallet>>,
    pub fail_enable: AtomicBool,
}

impl FakeWalletSource {
    pub fn new(initial: Vec<Wallet>) -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            wallets: Mutex::new(initial),
            changes,
            fail_enable: AtomicBool::new(false),
        }
    }

    fn publish(&self, wallets: Vec<Wallet>) {
        let _ = self.changes.send(wallets);
    }
}

#[async_trait]
impl WalletSource for FakeWalletSource {
    async fn active_wallets(&self) -> Result<Vec<Wallet>> {
        Ok(self.wallets.lock().unwrap().clone())
    }

    fn change_notifications(&self) -> BoxStream<'static, Vec<Wallet>> {
        hot_stream(self.changes.subscribe())
    }

    async fn enable(&self, wallet: Wallet) -> Result<()> {
        if self.fail_enable.load(Ordering::SeqCst) {
            return Err(Error::WalletSource("wallet storage is read-only".to_string()));
        }

        let wallets = {
            let mut wallets = self.wallets.lock().unwrap();
            if !wallets.iter().any(|w| w.identity() == wallet.identity()) {
                wallets.push(wallet);
            }
            wallets.clone()
        };
        self.publish(wallets);
        Ok(())
    }

    async fn disable(&self, wallet: Wallet) -> Result<()> {
        let wallets = {
            let mut wallets = self.wallets.lock().unwrap();
            wallets.retain(|w| w.identity() != wallet.identity());
            wallets.clone()
        };
        self.publish(wallets);
        Ok(())
    }
}

pub struct FakeRateSource {
    latest: Mutex<PriceMap>,
    updates: broadcast::Sender<PriceMap>,
    pub refreshes: AtomicUsize,
}

impl FakeRateSource {
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(64);
        Self {
            latest: Mutex::new(PriceMap::new()),
            updates,
            refreshes: AtomicUsize::new(0),
        }
    }

    /// Known before anyone subscribes
    pub fn set_latest(&self, coin_uid: &str, value: Decimal) {
        self.latest
            .lock()
            .unwrap()
            .insert(coin_uid.to_string(), Some(price(value)));
    }

    pub fn push(&self, prices: PriceMap) {
        self.latest
            .lock()
            .unwrap()
            .extend(prices.iter().map(|(uid, price)| (uid.clone(), price.clone())));
        let _ = self.updates.send(prices);
    }
}

#[async_trait]
impl RateSource for FakeRateSource {
    fn subscribe(&self, coin_uids: &[String]) -> BoxStream<'static, PriceMap> {
        let coin_uids = coin_uids.to_vec();
        hot_stream(self.updates.subscribe())
            .map(move |prices| {
                prices
                    .into_iter()
                    .filter(|(uid, _)| coin_uids.contains(uid))
                    .collect::<PriceMap>()
            })
            .filter(|prices| futures::future::ready(!prices.is_empty()))
            .boxed()
    }

    fn latest_snapshot(&self, coin_uids: &[String]) -> PriceMap {
        self.latest
            .lock()
            .unwrap()
            .iter()
            .filter(|(uid, _)| coin_uids.contains(*uid))
            .map(|(uid, price)| (uid.clone(), price.clone()))
            .collect()
    }

    async fn refresh(&self) -> Result<()> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct AdapterEntry {
    balance: Option<BalanceData>,
    state: AdapterState,
    send_allowed: bool,
}

pub struct FakeAdapterSource {
    entries: Mutex<HashMap<WalletIdentity, AdapterEntry>>,
    wallets: Mutex<Vec<Wallet>>,
    ready: broadcast::Sender<()>,
    updates: broadcast::Sender<WalletIdentity>,
    pub refreshes: AtomicUsize,
    pub fail_refresh: AtomicBool,
}

impl FakeAdapterSource {
    pub fn new() -> Self {
        let (ready, _) = broadcast::channel(16);
        let (updates, _) = broadcast::channel(64);
        Self {
            entries: Mutex::new(HashMap::new()),
            wallets: Mutex::new(Vec::new()),
            ready,
            updates,
            refreshes: AtomicUsize::new(0),
            fail_refresh: AtomicBool::new(false),
        }
    }

    /// Set a wallet's adapter view without notifying anyone
    pub fn set(&self, wallet: &Wallet, available: Decimal, state: AdapterState) {
        let send_allowed = state.is_synced();
        self.entries.lock().unwrap().insert(
            wallet.identity(),
            AdapterEntry {
                balance: Some(BalanceData::new(available)),
                state,
                send_allowed,
            },
        );
    }

    /// Set a wallet's adapter view and emit a per-wallet update
    pub fn report(&self, wallet: &Wallet, available: Decimal, state: AdapterState) {
        self.set(wallet, available, state);
        let _ = self.updates.send(wallet.identity());
    }

    pub fn fire_ready(&self) {
        let _ = self.ready.send(());
    }

    pub fn wallet_count(&self) -> usize {
        self.wallets.lock().unwrap().len()
    }
}

#[async_trait]
impl AdapterSource for FakeAdapterSource {
    fn set_wallets(&self, wallets: &[Wallet]) {
        *self.wallets.lock().unwrap() = wallets.to_vec();
    }

    fn ready_notifications(&self) -> BoxStream<'static, ()> {
        hot_stream(self.ready.subscribe())
    }

    fn wallet_updates(&self) -> BoxStream<'static, WalletIdentity> {
        hot_stream(self.updates.subscribe())
    }

    fn balance_data(&self, wallet: &Wallet) -> Option<BalanceData> {
        self.entries
            .lock()
            .unwrap()
            .get(&wallet.identity())
            .and_then(|entry| entry.balance.clone())
    }

    fn state(&self, wallet: &Wallet) -> AdapterState {
        self.entries
            .lock()
            .unwrap()
            .get(&wallet.identity())
            .map(|entry| entry.state.clone())
            .unwrap_or_else(AdapterState::unknown)
    }

    fn send_allowed(&self, wallet: &Wallet) -> bool {
        self.entries
            .lock()
            .unwrap()
            .get(&wallet.identity())
            .map_or(false, |entry| entry.send_allowed)
    }

    async fn refresh(&self) -> Result<()> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        if self.fail_refresh.load(Ordering::SeqCst) {
            return Err(Error::Adapter("rpc timeout".to_string()));
        }
        Ok(())
    }
}

pub struct Fixture {
    pub wallets: Arc<FakeWalletSource>,
    pub rates: Arc<FakeRateSource>,
    pub adapters: Arc<FakeAdapterSource>,
    pub store: Arc<InMemoryCacheStore>,
}

impl Fixture {
    pub fn new(initial: Vec<Wallet>, cached: CachedBalances) -> Self {
        Self {
            wallets: Arc::new(FakeWalletSource::new(initial)),
            rates: Arc::new(FakeRateSource::new()),
            adapters: Arc::new(FakeAdapterSource::new()),
            store: Arc::new(InMemoryCacheStore::with_entries(cached)),
        }
    }

    pub fn sources(&self) -> BalanceSources {
        BalanceSources {
            wallets: self.wallets.clone(),
            rates: self.rates.clone(),
            adapters: self.adapters.clone(),
            cache_store: self.store.clone(),
        }
    }
}

pub fn mnemonic_account() -> Account {
    Account {
        id: "account-1".to_string(),
        name: "Main".to_string(),
        account_type: AccountType::Mnemonic,
    }
}

pub fn watch_account() -> Account {
    Account {
        id: "watch-1".to_string(),
        name: "Watched".to_string(),
        account_type: AccountType::EvmAddress {
            address: "0x52908400098527886e0f7030069857d2e4169ee7".to_string(),
        },
    }
}

pub fn wallet(
    coin_name: &str,
    coin_code: &str,
    blockchain: BlockchainType,
    native: bool,
    account: &Account,
) -> Wallet {
    let uid = coin_code.to_lowercase();
    let token = Token {
        query_id: format!("{}|{}", uid, if native { "native" } else { "token" }),
        coin_uid: uid,
        coin_name: coin_name.to_string(),
        coin_code: coin_code.to_string(),
        blockchain,
        decimals: 18,
        native,
    };
    Wallet::new(token, account.clone())
}

pub fn price(value: Decimal) -> CoinPrice {
    CoinPrice {
        value,
        timestamp: Utc::now(),
        change_percent: None,
    }
}

/// Wait until a published snapshot satisfies `predicate`
pub async fn wait_for<F>(
    snapshots: &mut watch::Receiver<Arc<BalanceSnapshot>>,
    predicate: F,
) -> Arc<BalanceSnapshot>
where
    F: FnMut(&Arc<BalanceSnapshot>) -> bool,
{
    let snapshot = tokio::time::timeout(Duration::from_secs(2), snapshots.wait_for(predicate))
        .await
        .expect("timed out waiting for snapshot")
        .expect("balance engine stopped");
    Arc::clone(&*snapshot)
}

pub fn codes(snapshot: &BalanceSnapshot) -> Vec<String> {
    snapshot
        .items
        .iter()
        .map(|item| item.wallet.token.coin_code.clone())
        .collect()
}

pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(30)).await;
}
