use serde::Deserialize;
use std::str::FromStr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::Error;

/// Output format of the global subscriber
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Structured lines for log shipping
    #[default]
    Json,
    /// Multi-line human output for development
    Pretty,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            other => Err(Error::Validation(format!("Unknown log format: {}", other))),
        }
    }
}

/// Install the global subscriber; returns false if one was already installed
///
/// `RUST_LOG` wins over the format's default filter.
pub fn init_logging(format: LogFormat) -> bool {
    let default_directives = match format {
        LogFormat::Json => "info,redis=warn",
        LogFormat::Pretty => "debug,redis=warn",
    };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));

    let fmt_layer = match format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .json()
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .pretty()
            .boxed(),
    };

    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("Logging initialized ({:?})", format);
    }
    installed
}
