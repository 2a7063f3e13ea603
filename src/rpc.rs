use crate::error::FetchError;
use crate::models::{HttpRequest, HttpResponse, RawProviderResponse, SymbolFetch, SymbolSource};
use async_trait::async_trait;
use futures::future::join_all;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// Selector of `latestAnswer()` (first four bytes of its Keccak-256 hash).
pub const LATEST_ANSWER_SELECTOR: &str = "0x50d25bcd";

/// Outbound HTTP capability. Implementations must give up on a request once
/// the body grows past `max_response_bytes` and must eventually time out, so a
/// refresh cycle never waits on one provider forever.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, request: HttpRequest) -> Result<HttpResponse, String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    pub max_response_bytes: u64,
    pub parallel_providers: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        FetchOptions {
            max_response_bytes: 200,
            parallel_providers: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Value,
    pub method: String,
    pub params: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub id: Value,
    pub result: Option<String>,
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

/// `eth_call` of `latestAnswer()` on `address` at the latest block.
pub fn latest_answer_call(address: &str) -> JsonRpcRequest {
    JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        id: json!(1),
        method: "eth_call".to_string(),
        params: Some(json!([
            { "to": address, "data": LATEST_ANSWER_SELECTOR },
            "latest"
        ])),
    }
}

pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::ClientBuilder::new()
            .pool_idle_timeout(Duration::from_secs(300))
            .pool_max_idle_per_host(20)
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .tcp_keepalive(Duration::from_secs(30))
            .user_agent("data-feeds/0.1")
            .build()?;
        Ok(ReqwestTransport { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn post(&self, request: HttpRequest) -> Result<HttpResponse, String> {
        let limit = request.max_response_bytes;
        let mut response = self
            .client
            .post(&request.url)
            .header(CONTENT_TYPE, "application/json")
            .body(request.body)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if let Some(len) = response.content_length() {
            if len > limit {
                return Err(format!("response of {} bytes exceeds limit of {} bytes", len, limit));
            }
        }

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        // Content-Length may be missing or wrong; count what actually arrives.
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| e.to_string())? {
            if (body.len() + chunk.len()) as u64 > limit {
                return Err(format!("response exceeds limit of {} bytes", limit));
            }
            body.extend_from_slice(&chunk);
        }

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// Asks every provider of `source` for the feed's latest answer, one attempt
/// each, and splits the outcomes into transport successes and error strings.
/// Both lists keep the configured provider order.
pub async fn fetch_symbol(
    transport: &dyn Transport,
    symbol: &str,
    source: &SymbolSource,
    options: &FetchOptions,
) -> SymbolFetch {
    let body = match serde_json::to_vec(&latest_answer_call(&source.address)) {
        Ok(body) => body,
        Err(e) => {
            return SymbolFetch {
                successes: Vec::new(),
                errors: vec![format!("request encoding error ({}): {}", symbol, e)],
            };
        }
    };

    let calls = source.provider.urls.iter().map(|url| {
        let request = HttpRequest {
            url: url.clone(),
            body: body.clone(),
            max_response_bytes: options.max_response_bytes,
        };
        async move { (url, transport.post(request).await) }
    });

    let replies = if options.parallel_providers {
        join_all(calls).await
    } else {
        let mut replies = Vec::with_capacity(source.provider.urls.len());
        for call in calls {
            replies.push(call.await);
        }
        replies
    };

    let mut fetch = SymbolFetch::default();
    for (url, reply) in replies {
        match reply {
            Ok(response) => {
                debug!(symbol = %symbol, provider = %url, status = response.status, "provider responded");
                fetch.successes.push(RawProviderResponse {
                    provider: url.clone(),
                    response: response.without_headers(),
                });
            }
            Err(cause) => {
                let err = FetchError::Transport {
                    provider: url.clone(),
                    cause,
                };
                warn!(symbol = %symbol, error = %err, "provider request failed");
                fetch.errors.push(err.to_string());
            }
        }
    }
    fetch
}
