pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod sources;

pub use config::BalanceConfig;
pub use error::{Error, Result};
pub use logging::{init_logging, LogFormat};
pub use sources::{
    AdapterSource, CachedBalances, PersistentCacheStore, PriceMap, RateSource, WalletSource,
};
