//! Single-writer balance aggregation
//!
//! Every input (wallet list changes, adapter readiness and per-wallet updates,
//! price updates, sort changes, teardown) is an [`EngineEvent`] on one queue.
//! The engine drains that queue on its own task and handles one event at a
//! time, so no two updates interleave on the item collection. Every handled
//! event ends with a freshly sorted and filtered snapshot.

use futures::stream::BoxStream;
use shared::models::{
    Account, AdapterState, BalanceData, BalanceItem, BalanceSnapshot, SortType, Wallet,
    WalletIdentity,
};
use shared::{AdapterSource, PriceMap, RateSource};
use std::collections::{BTreeSet, HashSet};
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info};

use crate::cache::BalanceCache;
use crate::filter::BalanceFilter;
use crate::sorter;
use crate::subscriptions::{Generation, Subscription, UpstreamSubscriptions};

#[derive(Debug)]
pub enum EngineEvent {
    WalletsChanged(Vec<Wallet>),
    AdaptersReady {
        generation: Generation,
    },
    AdapterUpdated {
        generation: Generation,
        wallet: WalletIdentity,
    },
    RatesUpdated {
        generation: Generation,
        prices: PriceMap,
    },
    SortTypeChanged(SortType),
    Clear(oneshot::Sender<()>),
}

pub struct BalanceEngine {
    rates: Arc<dyn RateSource>,
    adapters: Arc<dyn AdapterSource>,
    cache: BalanceCache,
    filter: BalanceFilter,
    events_tx: mpsc::Sender<EngineEvent>,
    snapshot_tx: watch::Sender<Arc<BalanceSnapshot>>,
    items: Vec<BalanceItem>,
    sort_type: SortType,
    is_watch_account: bool,
    hide_zero_balances: bool,
    upstream: UpstreamSubscriptions,
    wallet_subscription: Option<Subscription>,
}

impl BalanceEngine {
    pub fn new(
        rates: Arc<dyn RateSource>,
        adapters: Arc<dyn AdapterSource>,
        cache: BalanceCache,
        filter: BalanceFilter,
        events_tx: mpsc::Sender<EngineEvent>,
        snapshot_tx: watch::Sender<Arc<BalanceSnapshot>>,
        sort_type: SortType,
    ) -> Self {
        Self {
            rates,
            adapters,
            cache,
            filter,
            events_tx,
            snapshot_tx,
            items: Vec::new(),
            sort_type,
            is_watch_account: false,
            hide_zero_balances: false,
            upstream: UpstreamSubscriptions::default(),
            wallet_subscription: None,
        }
    }

    /// Route wallet list notifications into the engine queue
    pub fn follow_wallets(&mut self, notifications: BoxStream<'static, Vec<Wallet>>) {
        self.wallet_subscription = Some(Subscription::forward(
            "wallet list",
            notifications,
            self.events_tx.clone(),
            EngineEvent::WalletsChanged,
        ));
    }

    /// Drain the queue until a clear request arrives
    pub async fn run(mut self, mut events: mpsc::Receiver<EngineEvent>) {
        info!("Balance engine started");

        while let Some(event) = events.recv().await {
            if self.handle(event).is_break() {
                break;
            }
        }

        info!("Balance engine stopped");
    }

    /// Apply one event to the collection and publish the result
    pub fn handle(&mut self, event: EngineEvent) -> ControlFlow<()> {
        match event {
            EngineEvent::WalletsChanged(wallets) => self.on_wallets_changed(wallets),
            EngineEvent::AdaptersReady { generation } => self.on_adapters_ready(generation),
            EngineEvent::AdapterUpdated { generation, wallet } => {
                self.on_adapter_updated(generation, wallet)
            }
            EngineEvent::RatesUpdated { generation, prices } => {
                self.on_rates_updated(generation, prices)
            }
            EngineEvent::SortTypeChanged(sort_type) => {
                debug!("Sort type changed to {}", sort_type);
                self.sort_type = sort_type;
                self.publish();
            }
            EngineEvent::Clear(ack) => {
                self.teardown();
                let _ = ack.send(());
                return ControlFlow::Break(());
            }
        }

        ControlFlow::Continue(())
    }

    pub fn generation(&self) -> Generation {
        self.upstream.generation()
    }

    /// Rebuild the collection for a new wallet list
    ///
    /// The account flags come from the first wallet's account, since the wallet
    /// list is the only view of the active account. An empty list therefore
    /// reports a non-watch account with zero balances shown, even when the
    /// active account is a watch account.
    fn on_wallets_changed(&mut self, wallets: Vec<Wallet>) {
        let mut seen = HashSet::new();
        let wallets: Vec<Wallet> = wallets
            .into_iter()
            .filter(|wallet| seen.insert(wallet.identity()))
            .collect();

        let account = wallets.first().map(|wallet| &wallet.account);
        self.is_watch_account = account.map_or(false, Account::is_watch_account);
        self.hide_zero_balances = account.map_or(false, Account::hide_zero_balances);

        let generation = self.upstream.renew();
        let coin_uids = coin_uids(&wallets);
        self.subscribe_adapters(generation, &wallets);
        self.subscribe_rates(generation, &coin_uids);
        debug!(
            "Installed {} upstream subscriptions for generation {}",
            self.upstream.active_count(),
            generation
        );

        let prices = if coin_uids.is_empty() {
            PriceMap::new()
        } else {
            self.rates.latest_snapshot(&coin_uids)
        };

        self.items = wallets
            .into_iter()
            .map(|wallet| {
                let balance_data = self
                    .cache
                    .get(&wallet.identity())
                    .cloned()
                    .unwrap_or_default();
                let coin_price = prices.get(wallet.coin_uid()).cloned().flatten();

                BalanceItem {
                    wallet,
                    balance_data,
                    state: AdapterState::unknown(),
                    coin_price,
                    send_allowed: false,
                }
            })
            .collect();

        info!(
            "Wallet list changed: {} wallets, generation {}",
            self.items.len(),
            generation
        );
        self.publish();
    }

    fn subscribe_adapters(&mut self, generation: Generation, wallets: &[Wallet]) {
        // Subscribe before handing over the wallets so the first ready signal is not missed
        self.upstream.push(Subscription::forward(
            "adapter ready",
            self.adapters.ready_notifications(),
            self.events_tx.clone(),
            move |()| EngineEvent::AdaptersReady { generation },
        ));
        self.upstream.push(Subscription::forward(
            "adapter updates",
            self.adapters.wallet_updates(),
            self.events_tx.clone(),
            move |wallet| EngineEvent::AdapterUpdated { generation, wallet },
        ));

        self.adapters.set_wallets(wallets);
    }

    fn subscribe_rates(&mut self, generation: Generation, coin_uids: &[String]) {
        if coin_uids.is_empty() {
            return;
        }

        self.upstream.push(Subscription::forward(
            "rates",
            self.rates.subscribe(coin_uids),
            self.events_tx.clone(),
            move |prices| EngineEvent::RatesUpdated { generation, prices },
        ));
    }

    fn on_adapters_ready(&mut self, generation: Generation) {
        if !self.is_current(generation, "adapters ready") {
            return;
        }

        let mut confirmed = Vec::new();
        for item in &mut self.items {
            if let Some(data) = apply_adapter(self.adapters.as_ref(), item) {
                confirmed.push((item.identity(), data));
            }
        }
        self.cache.set_many(confirmed);

        debug!("Adapters ready for generation {}", generation);
        self.publish();
    }

    fn on_adapter_updated(&mut self, generation: Generation, wallet: WalletIdentity) {
        if !self.is_current(generation, "adapter update") {
            return;
        }

        let Some(item) = self.items.iter_mut().find(|item| item.identity() == wallet) else {
            debug!("Adapter update for unknown wallet {}", wallet);
            return;
        };

        if let Some(data) = apply_adapter(self.adapters.as_ref(), item) {
            self.cache.set(wallet, data);
        }
        self.publish();
    }

    fn on_rates_updated(&mut self, generation: Generation, prices: PriceMap) {
        if !self.is_current(generation, "rate update") {
            return;
        }

        for item in &mut self.items {
            if let Some(price) = prices.get(item.wallet.coin_uid()) {
                item.coin_price = price.clone();
            }
        }

        debug!("Applied {} price updates", prices.len());
        self.publish();
    }

    fn is_current(&self, generation: Generation, what: &str) -> bool {
        if self.upstream.is_current(generation) {
            return true;
        }

        debug!(
            "Discarding stale {} from generation {} (current {})",
            what,
            generation,
            self.upstream.generation()
        );
        false
    }

    fn teardown(&mut self) {
        self.wallet_subscription = None;
        self.upstream.cancel();
        self.items.clear();
        self.is_watch_account = false;
        self.hide_zero_balances = false;
        self.publish();
        info!("Balance engine cleared");
    }

    fn publish(&self) {
        let sorted = sorter::sorted(self.items.clone(), self.sort_type);
        let items = self.filter.apply(sorted, self.hide_zero_balances);

        self.snapshot_tx.send_replace(Arc::new(BalanceSnapshot {
            items,
            sort_type: self.sort_type,
            is_watch_account: self.is_watch_account,
            hide_zero_balances: self.hide_zero_balances,
        }));
    }
}

/// Copy adapter state onto the item; returns the balance to persist, if any
fn apply_adapter(adapters: &dyn AdapterSource, item: &mut BalanceItem) -> Option<BalanceData> {
    let balance = adapters.balance_data(&item.wallet);
    if let Some(data) = &balance {
        item.balance_data = data.clone();
    }
    item.state = adapters.state(&item.wallet);
    item.send_allowed = adapters.send_allowed(&item.wallet);
    balance
}

fn coin_uids(wallets: &[Wallet]) -> Vec<String> {
    wallets
        .iter()
        .map(|wallet| wallet.coin_uid().to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
