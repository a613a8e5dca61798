use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

// Identity models

/// Composite key of one balance row: one token held by one account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WalletIdentity {
    pub token_query_id: String,
    pub account_id: String,
}

impl WalletIdentity {
    pub fn new(token_query_id: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            token_query_id: token_query_id.into(),
            account_id: account_id.into(),
        }
    }

    /// Flat string form used as a storage field name: `{account_len}:{account_id}|{token_query_id}`
    ///
    /// The byte length prefix keeps the split unambiguous when either part contains `|`.
    pub fn storage_key(&self) -> String {
        format!(
            "{}:{}|{}",
            self.account_id.len(),
            self.account_id,
            self.token_query_id
        )
    }

    /// Inverse of [`WalletIdentity::storage_key`]
    pub fn from_storage_key(key: &str) -> Option<Self> {
        let (len, rest) = key.split_once(':')?;
        let len: usize = len.parse().ok()?;
        let account_id = rest.get(..len)?;
        let token_query_id = rest.get(len..)?.strip_prefix('|')?;
        if account_id.is_empty() || token_query_id.is_empty() {
            return None;
        }
        Some(Self::new(token_query_id, account_id))
    }
}

impl fmt::Display for WalletIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.token_query_id, self.account_id)
    }
}

// Blockchain models

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockchainType {
    Bitcoin,
    Ethereum,
    BinanceSmartChain,
    Polygon,
    Avalanche,
    Optimism,
    ArbitrumOne,
    Solana,
    Tron,
    Ton,
    Zcash,
    Monero,
    Litecoin,
    BitcoinCash,
    Dash,
    Stellar,
    Unsupported(String),
}

impl BlockchainType {
    /// Fixed display priority, lower values are listed first
    pub fn priority(&self) -> u32 {
        match self {
            BlockchainType::Bitcoin => 1,
            BlockchainType::Ethereum => 2,
            BlockchainType::BinanceSmartChain => 3,
            BlockchainType::Polygon => 4,
            BlockchainType::Avalanche => 5,
            BlockchainType::Optimism => 6,
            BlockchainType::ArbitrumOne => 7,
            BlockchainType::Solana => 8,
            BlockchainType::Tron => 9,
            BlockchainType::Ton => 10,
            BlockchainType::Zcash => 11,
            BlockchainType::Monero => 12,
            BlockchainType::Litecoin => 13,
            BlockchainType::BitcoinCash => 14,
            BlockchainType::Dash => 15,
            BlockchainType::Stellar => 16,
            BlockchainType::Unsupported(_) => u32::MAX,
        }
    }
}

/// A coin as issued on one blockchain
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token {
    pub query_id: String,
    /// Rate key shared by every token of the same coin
    pub coin_uid: String,
    pub coin_name: String,
    pub coin_code: String,
    pub blockchain: BlockchainType,
    pub decimals: u32,
    /// Base-currency asset of its blockchain
    pub native: bool,
}

// Account models

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AccountType {
    Mnemonic,
    PrivateKey,
    HardwareCard,
    EvmAddress { address: String },
    SolanaAddress { address: String },
    TronAddress { address: String },
    TonAddress { address: String },
    BitcoinAddress { address: String },
    HdExtendedKey { public: bool },
}

impl AccountType {
    pub fn is_watch(&self) -> bool {
        match self {
            AccountType::EvmAddress { .. }
            | AccountType::SolanaAddress { .. }
            | AccountType::TronAddress { .. }
            | AccountType::TonAddress { .. }
            | AccountType::BitcoinAddress { .. } => true,
            AccountType::HdExtendedKey { public } => *public,
            AccountType::Mnemonic | AccountType::PrivateKey | AccountType::HardwareCard => false,
        }
    }

    /// Address-watch accounts discover every token on their chain, so empty rows are hidden
    pub fn hides_zero_balances(&self) -> bool {
        matches!(
            self,
            AccountType::EvmAddress { .. }
                | AccountType::SolanaAddress { .. }
                | AccountType::TronAddress { .. }
                | AccountType::TonAddress { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub name: String,
    pub account_type: AccountType,
}

impl Account {
    pub fn is_watch_account(&self) -> bool {
        self.account_type.is_watch()
    }

    pub fn hide_zero_balances(&self) -> bool {
        self.account_type.hides_zero_balances()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Wallet {
    pub token: Token,
    pub account: Account,
}

impl Wallet {
    pub fn new(token: Token, account: Account) -> Self {
        Self { token, account }
    }

    pub fn identity(&self) -> WalletIdentity {
        WalletIdentity::new(self.token.query_id.clone(), self.account.id.clone())
    }

    pub fn coin_uid(&self) -> &str {
        &self.token.coin_uid
    }
}

// Balance models

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceData {
    pub available: Decimal,
    #[serde(default)]
    pub time_locked: Decimal,
    #[serde(default)]
    pub pending: Decimal,
    #[serde(default)]
    pub not_relayed: Decimal,
    #[serde(default)]
    pub stacking_unpaid: Decimal,
}

impl BalanceData {
    pub fn new(available: Decimal) -> Self {
        Self {
            available,
            ..Default::default()
        }
    }

    /// Spendable amount plus every locked component
    pub fn total(&self) -> Decimal {
        self.available + self.time_locked + self.pending + self.not_relayed + self.stacking_unpaid
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AdapterState {
    Synced,
    Syncing { progress: Option<u32> },
    SearchingTxs { count: u32 },
    NotSynced { error: String },
}

impl AdapterState {
    /// Placeholder state used until the adapter layer reports in
    pub fn unknown() -> Self {
        AdapterState::NotSynced {
            error: "unknown".to_string(),
        }
    }

    pub fn is_synced(&self) -> bool {
        matches!(self, AdapterState::Synced)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinPrice {
    pub value: Decimal,
    pub timestamp: DateTime<Utc>,
    pub change_percent: Option<Decimal>,
}

/// Engine unit of truth, one per enabled wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceItem {
    pub wallet: Wallet,
    pub balance_data: BalanceData,
    pub state: AdapterState,
    pub coin_price: Option<CoinPrice>,
    pub send_allowed: bool,
}

impl BalanceItem {
    pub fn identity(&self) -> WalletIdentity {
        self.wallet.identity()
    }

    /// Total balance valued at the current price, if a price is known
    pub fn fiat_value(&self) -> Option<Decimal> {
        self.coin_price
            .as_ref()
            .map(|price| self.balance_data.total() * price.value)
    }
}

// Sorting

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortType {
    #[default]
    Value,
    Name,
    PercentGrowth,
}

impl SortType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortType::Value => "value",
            SortType::Name => "name",
            SortType::PercentGrowth => "percent_growth",
        }
    }
}

impl fmt::Display for SortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "value" => Ok(SortType::Value),
            "name" => Ok(SortType::Name),
            "percent_growth" | "percentgrowth" => Ok(SortType::PercentGrowth),
            other => Err(Error::Validation(format!("Unknown sort type: {}", other))),
        }
    }
}

/// One immutable, sorted and filtered publication of the balance list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub items: Vec<BalanceItem>,
    pub sort_type: SortType,
    pub is_watch_account: bool,
    pub hide_zero_balances: bool,
}
