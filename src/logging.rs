//! Logging bootstrap for applications embedding the broadcaster

use serde::{Deserialize, Serialize};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Log level preset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    /// Debug for this crate, info for dependencies
    Verbose,
    Debug,
    Trace,
}

/// Output format of the fmt layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogLevel {
    /// Level after applying `-v` style verbosity (count overrides level)
    pub fn with_verbosity(self, verbose_count: u8) -> Self {
        match verbose_count {
            0 => self,
            1 => LogLevel::Verbose,
            2 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }

    /// `EnvFilter` directive for this level
    pub fn filter(&self) -> &'static str {
        match self {
            LogLevel::Error => "sfu_broadcaster=error,reqwest=error",
            LogLevel::Warn => "sfu_broadcaster=warn,reqwest=warn",
            LogLevel::Info => "sfu_broadcaster=info,reqwest=info",
            LogLevel::Verbose => "sfu_broadcaster=debug,reqwest=info",
            LogLevel::Debug => "sfu_broadcaster=debug,reqwest=debug",
            LogLevel::Trace => "sfu_broadcaster=trace,reqwest=debug",
        }
    }
}

/// Install the global subscriber
///
/// `RUST_LOG` takes priority over `level`. Calling this twice prints an
/// error to stderr and leaves the first subscriber in place.
pub fn init_logging(level: LogLevel, verbose_count: u8, format: LogFormat) {
    let filter = level.with_verbosity(verbose_count).filter();

    // Environment variable takes highest priority
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
    };

    if let Err(err) = result {
        eprintln!("failed to initialize tracing: {}", err);
    }
}
