//! Collaborators feeding the balance engine
//!
//! Each source is injected into the engine as a trait object. Streams returned
//! here are hot: they deliver only what happens after the call, and dropping a
//! stream is how the engine unsubscribes.

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::collections::HashMap;

use crate::models::{AdapterState, BalanceData, CoinPrice, Wallet, WalletIdentity};
use crate::Result;

/// Sparse price update keyed by coin uid. `None` clears a price, a missing key leaves it alone.
pub type PriceMap = HashMap<String, Option<CoinPrice>>;

/// Persisted balances keyed by wallet identity
pub type CachedBalances = HashMap<WalletIdentity, BalanceData>;

/// Owner of the enabled wallet set
#[async_trait]
pub trait WalletSource: Send + Sync {
    /// Wallets enabled right now
    async fn active_wallets(&self) -> Result<Vec<Wallet>>;

    /// Full wallet list after every membership change
    fn change_notifications(&self) -> BoxStream<'static, Vec<Wallet>>;

    async fn enable(&self, wallet: Wallet) -> Result<()>;

    async fn disable(&self, wallet: Wallet) -> Result<()>;
}

/// Fiat price quotes per coin uid
#[async_trait]
pub trait RateSource: Send + Sync {
    fn subscribe(&self, coin_uids: &[String]) -> BoxStream<'static, PriceMap>;

    /// Latest known quotes, answered from local state without I/O
    fn latest_snapshot(&self, coin_uids: &[String]) -> PriceMap;

    async fn refresh(&self) -> Result<()>;
}

/// Chain adapters reporting sync state and balances per wallet
#[async_trait]
pub trait AdapterSource: Send + Sync {
    /// Replace the wallets the adapter layer should run for
    fn set_wallets(&self, wallets: &[Wallet]);

    /// Fires once adapters for the current wallet set are live
    fn ready_notifications(&self) -> BoxStream<'static, ()>;

    /// Fires whenever one wallet's balance, state or send eligibility changes
    fn wallet_updates(&self) -> BoxStream<'static, WalletIdentity>;

    /// `None` while no adapter exists for the wallet
    fn balance_data(&self, wallet: &Wallet) -> Option<BalanceData>;

    fn state(&self, wallet: &Wallet) -> AdapterState;

    fn send_allowed(&self, wallet: &Wallet) -> bool;

    async fn refresh(&self) -> Result<()>;
}

/// Durable identity to balance map surviving restarts
#[async_trait]
pub trait PersistentCacheStore: Send + Sync {
    async fn load_all(&self) -> Result<CachedBalances>;

    async fn upsert(&self, entries: CachedBalances) -> Result<()>;
}
