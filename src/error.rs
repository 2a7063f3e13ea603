use thiserror::Error;

/// Everything that can go wrong between asking one provider for a feed value
/// and holding a number. Each variant names the provider it came from; the
/// rendered message is what ends up in `LatestAnswer::errors`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("transport error ({provider}): {cause}")]
    Transport { provider: String, cause: String },

    #[error("decode error ({provider}): {cause}")]
    Decode { provider: String, cause: String },

    #[error("parse error ({provider}): {cause}")]
    Parse { provider: String, cause: String },

    #[error("response error ({provider}): status {status}")]
    ResponseStatus { provider: String, status: u16 },

    #[error("rpc error ({provider}): code {code}, message {message}")]
    Application {
        provider: String,
        code: i64,
        message: String,
    },
}

impl FetchError {
    pub fn provider(&self) -> &str {
        match self {
            FetchError::Transport { provider, .. }
            | FetchError::Decode { provider, .. }
            | FetchError::Parse { provider, .. }
            | FetchError::ResponseStatus { provider, .. }
            | FetchError::Application { provider, .. } => provider,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("network `{network}` has an empty provider list")]
    NoProviders { network: String },

    #[error("network `{network}` has threshold 0, must be at least 1")]
    ZeroThreshold { network: String },

    #[error("symbol `{symbol}` references unknown network `{network}`")]
    UnknownNetwork { symbol: String, network: String },

    #[error("heartbeat interval must be greater than zero")]
    ZeroHeartbeat,

    #[error("request timeout must be greater than zero")]
    ZeroRequestTimeout,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("rocksdb error: {0}")]
    Rocks(#[from] rocksdb::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
