use chrono::{DateTime, Utc};
use ethers::types::I256;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Provider set for one upstream network (e.g. "ethereum", "bsc").
///
/// `threshold` is the number of agreeing providers needed for consensus. A
/// threshold above `urls.len()` is accepted but can never be reached.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub threshold: u32,
    pub urls: Vec<String>,
}

/// Where a symbol's answer comes from: the feed contract and the providers
/// of the network it lives on.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SymbolSource {
    pub address: String,
    pub network: String,
    pub provider: ProviderConfig,
}

pub type SymbolSources = BTreeMap<String, SymbolSource>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub body: Vec<u8>,
    pub max_response_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Headers vary between providers and requests, so they never reach the pipeline.
    pub fn without_headers(self) -> Self {
        HttpResponse {
            headers: Vec::new(),
            ..self
        }
    }
}

/// A transport-level success from one provider for one symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawProviderResponse {
    pub provider: String,
    pub response: HttpResponse,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedAnswer {
    pub provider: String,
    pub answer: I256,
}

/// Output of the fan-out stage for one symbol.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolFetch {
    pub successes: Vec<RawProviderResponse>,
    pub errors: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct LatestAnswer {
    #[serde(with = "decimal::vec")]
    pub answers: Vec<I256>,
    pub consensus: bool,
    #[serde(with = "decimal::option")]
    pub heaviest_answer: Option<I256>,
    pub errors: Vec<String>,
    pub time: DateTime<Utc>,
}

pub type LatestAnswers = BTreeMap<String, Option<LatestAnswer>>;

/// Feed values are `int256`; they travel as decimal strings so no JSON reader
/// rounds them.
mod decimal {
    use ethers::types::I256;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    fn parse<E: Error>(value: &str) -> Result<I256, E> {
        I256::from_dec_str(value).map_err(E::custom)
    }

    pub mod vec {
        use super::*;

        #[allow(clippy::ptr_arg)]
        pub fn serialize<S: Serializer>(values: &Vec<I256>, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.collect_seq(values.iter().map(|v| v.to_string()))
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<I256>, D::Error> {
            Vec::<String>::deserialize(deserializer)?
                .iter()
                .map(|v| parse(v))
                .collect()
        }
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(value: &Option<I256>, serializer: S) -> Result<S::Ok, S::Error> {
            match value {
                Some(v) => serializer.serialize_some(&v.to_string()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<I256>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|v| parse(&v))
                .transpose()
        }
    }
}
