use serde::Deserialize;
use std::env;

use crate::logging::LogFormat;
use crate::models::SortType;

#[derive(Debug, Clone, Deserialize)]
pub struct BalanceConfig {
    pub cache: CacheConfig,
    pub engine: EngineConfig,
    /// Subscriber output format (default: json)
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Redis URL for the persistent balance cache; `None` keeps the cache in memory
    pub redis_url: Option<String>,
    /// Redis hash key holding every cache entry (default: balance:cache)
    pub cache_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Sort type applied until the consumer picks another one (default: value)
    pub default_sort_type: SortType,
    /// Capacity of the engine event queue (default: 256)
    pub event_channel_capacity: usize,
    /// Buffer size of the disabled-wallet broadcast (default: 32)
    pub disabled_channel_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            cache_key: "balance:cache".to_string(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_sort_type: SortType::Value,
            event_channel_capacity: 256,
            disabled_channel_capacity: 32,
        }
    }
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            engine: EngineConfig::default(),
            log_format: LogFormat::default(),
        }
    }
}

impl BalanceConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        Ok(BalanceConfig {
            cache: CacheConfig {
                redis_url: env::var("REDIS_URL").ok().filter(|url| !url.is_empty()),
                cache_key: env::var("BALANCE_CACHE_KEY")
                    .unwrap_or_else(|_| "balance:cache".to_string()),
            },
            engine: EngineConfig {
                default_sort_type: env::var("BALANCE_DEFAULT_SORT")
                    .unwrap_or_else(|_| "value".to_string())
                    .parse()?,
                event_channel_capacity: env::var("BALANCE_EVENT_CHANNEL_CAPACITY")
                    .unwrap_or_else(|_| "256".to_string())
                    .parse()?,
                disabled_channel_capacity: env::var("BALANCE_DISABLED_CHANNEL_CAPACITY")
                    .unwrap_or_else(|_| "32".to_string())
                    .parse()?,
            },
            log_format: env::var("BALANCE_LOG_FORMAT")
                .unwrap_or_else(|_| "json".to_string())
                .parse()?,
        })
    }
}
