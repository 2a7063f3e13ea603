use crate::error::ConfigError;
use crate::models::{ProviderConfig, SymbolSource, SymbolSources};
use crate::rpc::FetchOptions;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ServerConfig {
    pub listen_ip: Option<String>,
    pub port: Option<u16>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct FeedsConfig {
    /// Minimum time between two refresh cycles.
    pub heartbeat_secs: u64,
    /// How often the scheduler wakes up to check whether a cycle is due.
    pub tick_secs: u64,
    pub max_response_bytes: u64,
    pub request_timeout_secs: u64,
    pub parallel_providers: bool,
}

impl Default for FeedsConfig {
    fn default() -> Self {
        FeedsConfig {
            heartbeat_secs: 10 * 60,
            tick_secs: 5,
            max_response_bytes: 200,
            request_timeout_secs: 30,
            parallel_providers: false,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub persist: bool,
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            persist: true,
            path: "latest_answers.db".to_string(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SymbolConfig {
    pub address: String,
    pub network: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub feeds: FeedsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default = "default_providers")]
    pub providers: BTreeMap<String, ProviderConfig>,
    #[serde(default = "default_symbols")]
    pub symbols: BTreeMap<String, SymbolConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            server: ServerConfig::default(),
            feeds: FeedsConfig::default(),
            storage: StorageConfig::default(),
            providers: default_providers(),
            symbols: default_symbols(),
        }
    }
}

impl AppConfig {
    pub fn from_toml(config_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(config_str)?)
    }

    pub fn heartbeat_interval(&self) -> Result<Duration, ConfigError> {
        if self.feeds.heartbeat_secs == 0 {
            return Err(ConfigError::ZeroHeartbeat);
        }
        Ok(Duration::from_secs(self.feeds.heartbeat_secs))
    }

    /// Per-request ceiling for provider calls. Zero would fail every request.
    pub fn request_timeout(&self) -> Result<Duration, ConfigError> {
        if self.feeds.request_timeout_secs == 0 {
            return Err(ConfigError::ZeroRequestTimeout);
        }
        Ok(Duration::from_secs(self.feeds.request_timeout_secs))
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            max_response_bytes: self.feeds.max_response_bytes,
            parallel_providers: self.feeds.parallel_providers,
        }
    }

    /// Resolves every symbol's network into its provider set and validates the
    /// provider sets themselves.
    pub fn symbol_sources(&self) -> Result<SymbolSources, ConfigError> {
        for (network, provider) in &self.providers {
            if provider.urls.is_empty() {
                return Err(ConfigError::NoProviders {
                    network: network.clone(),
                });
            }
            if provider.threshold == 0 {
                return Err(ConfigError::ZeroThreshold {
                    network: network.clone(),
                });
            }
            if provider.threshold as usize > provider.urls.len() {
                warn!(
                    network = %network,
                    threshold = provider.threshold,
                    providers = provider.urls.len(),
                    "threshold exceeds provider count, consensus is unreachable"
                );
            }
        }

        self.symbols
            .iter()
            .map(|(symbol, cfg)| {
                let provider = self.providers.get(&cfg.network).ok_or_else(|| {
                    ConfigError::UnknownNetwork {
                        symbol: symbol.clone(),
                        network: cfg.network.clone(),
                    }
                })?;
                let source = SymbolSource {
                    address: cfg.address.clone(),
                    network: cfg.network.clone(),
                    provider: provider.clone(),
                };
                Ok((symbol.clone(), source))
            })
            .collect()
    }
}

/// Loads `path`, falling back to the built-in feeds when the file does not exist.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    match fs::read_to_string(path) {
        Ok(config_str) => AppConfig::from_toml(&config_str),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!(path = %path.display(), "config file not found, using built-in defaults");
            Ok(AppConfig::default())
        }
        Err(source) => Err(ConfigError::Read {
            path: path.display().to_string(),
            source,
        }),
    }
}

fn default_providers() -> BTreeMap<String, ProviderConfig> {
    let ethereum = ProviderConfig {
        threshold: 2,
        urls: vec![
            "https://rpc.ankr.com/eth".to_string(),
            "https://rpc.flashbots.net/".to_string(),
            "https://api.mycryptoapi.com/eth".to_string(),
        ],
    };
    let bsc = ProviderConfig {
        threshold: 2,
        urls: vec![
            "https://bsc-dataseed1.binance.org/".to_string(),
            "https://bsc-dataseed1.defibit.io/".to_string(),
            "https://bsc-dataseed1.ninicoin.io/".to_string(),
        ],
    };
    BTreeMap::from([
        ("ethereum".to_string(), ethereum),
        ("bsc".to_string(), bsc),
    ])
}

fn default_symbols() -> BTreeMap<String, SymbolConfig> {
    [
        ("eth_usd", "0x5f4ec3df9cbd43714fe2740f5e3616155c5b8419", "ethereum"),
        ("btc_usd", "0xf4030086522a5beea4988f8ca5b36dbc97bee88c", "ethereum"),
        ("link_usd", "0x2c1d072e956affc0d435cb7ac38ef18d24d9127c", "ethereum"),
        ("aave_usd", "0x547a514d5e3769680ce22b2361c10ea13619e8a9", "ethereum"),
        ("bnb_usd", "0x14e613ac84a31f709eadbdf89c6cc390fdc9540a", "ethereum"),
        ("uni_usd", "0x553303d460ee0afb37edff9be42922d8ff63220e", "ethereum"),
        ("icp_usd", "0x84210d9013a30c6ab169e28840a6cc54b60fa042", "bsc"),
    ]
    .into_iter()
    .map(|(symbol, address, network)| {
        (
            symbol.to_string(),
            SymbolConfig {
                address: address.to_string(),
                network: network.to_string(),
            },
        )
    })
    .collect()
}
