//! Turns one provider's raw HTTP reply into a feed value, or into the error
//! explaining why it cannot be used. Stages run in a fixed order and the
//! first failure wins.

use crate::error::FetchError;
use crate::models::{DecodedAnswer, RawProviderResponse};
use crate::rpc::JsonRpcResponse;
use ethers::abi::{self, ParamType, Token};
use ethers::types::{Bytes, I256};
use tracing::{debug, warn};

const HTTP_OK: u16 = 200;

pub fn decode_answer(raw: &RawProviderResponse) -> Result<DecodedAnswer, FetchError> {
    let provider = &raw.provider;

    let text = std::str::from_utf8(&raw.response.body).map_err(|e| FetchError::Decode {
        provider: provider.clone(),
        cause: e.to_string(),
    })?;

    let envelope: JsonRpcResponse =
        serde_json::from_str(text).map_err(|e| FetchError::Parse {
            provider: provider.clone(),
            cause: e.to_string(),
        })?;

    if raw.response.status != HTTP_OK {
        return Err(FetchError::ResponseStatus {
            provider: provider.clone(),
            status: raw.response.status,
        });
    }

    if let Some(error) = envelope.error {
        return Err(FetchError::Application {
            provider: provider.clone(),
            code: error.code,
            message: error.message,
        });
    }

    let result = envelope.result.ok_or_else(|| FetchError::Parse {
        provider: provider.clone(),
        cause: "response has neither result nor error".to_string(),
    })?;

    let answer = parse_int256(&result).map_err(|cause| FetchError::Parse {
        provider: provider.clone(),
        cause,
    })?;

    Ok(DecodedAnswer {
        provider: provider.clone(),
        answer,
    })
}

/// Runs every response through the pipeline. Answers and errors both keep
/// provider order; nothing is dropped or deduplicated.
pub fn decode_answers(
    symbol: &str,
    responses: &[RawProviderResponse],
) -> (Vec<DecodedAnswer>, Vec<String>) {
    let mut answers = Vec::with_capacity(responses.len());
    let mut errors = Vec::new();

    for raw in responses {
        match decode_answer(raw) {
            Ok(answer) => {
                debug!(
                    symbol = %symbol,
                    provider = %answer.provider,
                    answer = %answer.answer,
                    "decoded provider answer"
                );
                answers.push(answer);
            }
            Err(err) => {
                warn!(
                    symbol = %symbol,
                    provider = %err.provider(),
                    error = %err,
                    "discarding provider response"
                );
                errors.push(err.to_string());
            }
        }
    }

    (answers, errors)
}

/// Decodes the `eth_call` return data of `latestAnswer()`: one ABI word
/// holding a two's-complement `int256`.
pub fn parse_int256(result: &str) -> Result<I256, String> {
    let data: Bytes = result
        .parse()
        .map_err(|e| format!("result `{}` is not hex data: {}", result, e))?;

    let tokens = abi::decode(&[ParamType::Int(256)], &data)
        .map_err(|e| format!("result `{}` is not an int256: {}", result, e))?;

    match tokens.as_slice() {
        [Token::Int(raw)] => Ok(I256::from_raw(*raw)),
        _ => Err(format!("result `{}` did not decode to a single int256", result)),
    }
}
