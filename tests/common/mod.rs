#![allow(dead_code)]

use async_trait::async_trait;
use data_feeds::models::{HttpRequest, HttpResponse, ProviderConfig, SymbolSource, SymbolSources};
use data_feeds::rpc::Transport;
use ethers::abi::{self, Token};
use ethers::types::I256;
use ethers::utils::hex;
use std::collections::HashMap;
use std::sync::Mutex;

pub type Reply = Result<HttpResponse, String>;

/// In-memory provider network: each URL (optionally narrowed to one feed
/// address) answers with a canned reply and every call is recorded in order.
/// Unscripted URLs refuse the connection.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<HashMap<(String, Option<String>), Reply>>,
    calls: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, url: &str, reply: Reply) -> Self {
        self.set(url, reply);
        self
    }

    pub fn reply_for(self, url: &str, address: &str, reply: Reply) -> Self {
        self.replies
            .lock()
            .unwrap()
            .insert((url.to_string(), Some(address.to_string())), reply);
        self
    }

    pub fn set(&self, url: &str, reply: Reply) {
        self.replies
            .lock()
            .unwrap()
            .insert((url.to_string(), None), reply);
    }

    pub fn calls(&self) -> Vec<HttpRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn called_urls(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.url).collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn post(&self, request: HttpRequest) -> Result<HttpResponse, String> {
        self.calls.lock().unwrap().push(request.clone());
        let address = called_address(&request);
        let replies = self.replies.lock().unwrap();
        replies
            .get(&(request.url.clone(), Some(address)))
            .or_else(|| replies.get(&(request.url.clone(), None)))
            .cloned()
            .unwrap_or_else(|| Err("connection refused".to_string()))
    }
}

/// The `to` field of the `eth_call` in a request body.
pub fn called_address(request: &HttpRequest) -> String {
    let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
    body["params"][0]["to"].as_str().unwrap().to_string()
}

/// ABI encoding of an `int256` return value.
pub fn encode_int256(value: I256) -> String {
    format!("0x{}", hex::encode(abi::encode(&[Token::Int(value.into_raw())])))
}

pub fn int(value: i64) -> I256 {
    I256::from(value)
}

pub fn ints(values: &[i64]) -> Vec<I256> {
    values.iter().map(|&v| int(v)).collect()
}

pub fn http(status: u16, body: &str) -> Reply {
    Ok(HttpResponse {
        status,
        headers: vec![("date".to_string(), "Mon, 19 Oct 2026 00:00:00 GMT".to_string())],
        body: body.as_bytes().to_vec(),
    })
}

pub fn answer(value: i64) -> Reply {
    int256_answer(int(value))
}

pub fn int256_answer(value: I256) -> Reply {
    http(
        200,
        &format!(
            r#"{{"jsonrpc":"2.0","id":1,"result":"{}"}}"#,
            encode_int256(value)
        ),
    )
}

pub fn rpc_error(code: i64, message: &str) -> Reply {
    http(
        200,
        &format!(
            r#"{{"jsonrpc":"2.0","id":1,"error":{{"code":{},"message":"{}"}}}}"#,
            code, message
        ),
    )
}

pub fn source(address: &str, network: &str, threshold: u32, urls: &[&str]) -> SymbolSource {
    SymbolSource {
        address: address.to_string(),
        network: network.to_string(),
        provider: ProviderConfig {
            threshold,
            urls: urls.iter().map(|u| u.to_string()).collect(),
        },
    }
}

pub const ETH_URLS: [&str; 4] = [
    "https://eth-a.example",
    "https://eth-b.example",
    "https://eth-c.example",
    "https://eth-d.example",
];

pub const BSC_URLS: [&str; 3] = [
    "https://bsc-a.example",
    "https://bsc-b.example",
    "https://bsc-c.example",
];

pub fn sources() -> SymbolSources {
    SymbolSources::from([
        ("btc_usd".to_string(), source("0xb7c", "ethereum", 2, &ETH_URLS)),
        ("eth_usd".to_string(), source("0xe74", "ethereum", 2, &ETH_URLS)),
        ("icp_usd".to_string(), source("0x1cb", "bsc", 2, &BSC_URLS)),
    ])
}
