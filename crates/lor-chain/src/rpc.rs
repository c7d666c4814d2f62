//! JSON-RPC access to the chain node.
//!
//! Only four calls are needed: submit a signed transaction, read its status,
//! ask whether its blockhash can still be included, and ask the node whether
//! it is healthy. Errors are reported raw; deciding what is retryable is the
//! caller's job.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use solana_sdk::hash::Hash;
use solana_sdk::transaction::VersionedTransaction;

use crate::tx::TransactionExt;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RpcError {
    /// The request did not complete within the client timeout.
    #[error("rpc timeout: {0}")]
    Timeout(String),
    /// Connection refused, DNS failure, reset, TLS failure.
    #[error("rpc transport error: {0}")]
    Transport(String),
    /// Non-2xx HTTP status from the node or its gateway.
    #[error("rpc http status {status}")]
    Http { status: u16 },
    /// A JSON-RPC error object.
    #[error("rpc error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<Value>,
    },
    #[error("rpc decode error: {0}")]
    Decode(String),
}

impl RpcError {
    fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RpcError::Timeout(e.to_string())
        } else if e.is_decode() {
            RpcError::Decode(e.to_string())
        } else {
            RpcError::Transport(e.to_string())
        }
    }
}

/// Status of a submitted transaction as reported by `getSignatureStatuses`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureStatus {
    pub slot: u64,
    #[serde(default)]
    pub confirmations: Option<u64>,
    /// Present when the transaction landed but failed on chain.
    #[serde(default)]
    pub err: Option<Value>,
    /// "processed" | "confirmed" | "finalized"
    #[serde(default)]
    pub confirmation_status: Option<String>,
}

/// Chain node operations used by the submission pipeline.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Submit a fully signed transaction. Returns the transaction id.
    async fn send_transaction(&self, tx: &VersionedTransaction) -> Result<String, RpcError>;

    /// `None` while the node has not seen the signature.
    async fn signature_status(&self, signature: &str) -> Result<Option<SignatureStatus>, RpcError>;

    /// Whether a transaction using `blockhash` can still be included.
    /// Once this is `false`, an unconfirmed transaction will never land.
    async fn is_blockhash_valid(&self, blockhash: &Hash) -> Result<bool, RpcError>;

    async fn health(&self) -> Result<(), RpcError>;
}

/// [`ChainRpc`] over HTTP JSON-RPC 2.0.
///
/// The URL usually embeds a provider key; it is never logged.
#[derive(Clone)]
pub struct HttpChainRpc {
    http: reqwest::Client,
    url: String,
    preflight_commitment: String,
}

impl std::fmt::Debug for HttpChainRpc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpChainRpc")
            .field("url", &"<REDACTED>")
            .field("preflight_commitment", &self.preflight_commitment)
            .finish()
    }
}

#[derive(Deserialize)]
struct RpcEnvelope {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Deserialize)]
struct StatusesResult {
    value: Vec<Option<SignatureStatus>>,
}

#[derive(Deserialize)]
struct BlockhashValidResult {
    value: bool,
}

impl HttpChainRpc {
    pub fn new(
        url: impl Into<String>,
        preflight_commitment: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, RpcError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RpcError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            url: url.into(),
            preflight_commitment: preflight_commitment.into(),
        })
    }

    async fn call(&self, method: &'static str, params: Value) -> Result<Value, RpcError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let resp = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(RpcError::from_reqwest)?;

        let status = resp.status();
        // Nodes return JSON-RPC errors with 200, but some gateways wrap them
        // in 4xx/5xx with a JSON body; prefer the error object when present.
        let text = resp.text().await.map_err(RpcError::from_reqwest)?;
        let envelope: Option<RpcEnvelope> = serde_json::from_str(&text).ok();

        match envelope {
            Some(RpcEnvelope {
                error: Some(err), ..
            }) => {
                debug!(method, code = err.code, "rpc returned error object");
                Err(RpcError::Rpc {
                    code: err.code,
                    message: err.message,
                    data: err.data,
                })
            }
            _ if !status.is_success() => Err(RpcError::Http {
                status: status.as_u16(),
            }),
            Some(RpcEnvelope {
                result: Some(result),
                ..
            }) => Ok(result),
            Some(_) => Err(RpcError::Decode(format!("{method}: missing result"))),
            None => Err(RpcError::Decode(format!("{method}: body is not json-rpc"))),
        }
    }
}

#[async_trait]
impl ChainRpc for HttpChainRpc {
    async fn send_transaction(&self, tx: &VersionedTransaction) -> Result<String, RpcError> {
        let encoded = tx
            .to_base64()
            .map_err(|e| RpcError::Decode(format!("sendTransaction: {e}")))?;
        // The node keeps rebroadcasting until the blockhash expires; the
        // pipeline only rebuilds after that.
        let result = self
            .call(
                "sendTransaction",
                json!([
                    encoded,
                    {
                        "encoding": "base64",
                        "skipPreflight": false,
                        "preflightCommitment": self.preflight_commitment,
                    }
                ]),
            )
            .await?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| RpcError::Decode("sendTransaction: result is not a string".into()))
    }

    async fn signature_status(&self, signature: &str) -> Result<Option<SignatureStatus>, RpcError> {
        let result = self
            .call(
                "getSignatureStatuses",
                json!([[signature], { "searchTransactionHistory": false }]),
            )
            .await?;
        let parsed: StatusesResult = serde_json::from_value(result)
            .map_err(|e| RpcError::Decode(format!("getSignatureStatuses: {e}")))?;
        Ok(parsed.value.into_iter().next().flatten())
    }

    async fn is_blockhash_valid(&self, blockhash: &Hash) -> Result<bool, RpcError> {
        // Asked at the tip: a blockhash gone there can no longer be included.
        let result = self
            .call(
                "isBlockhashValid",
                json!([blockhash.to_string(), { "commitment": "processed" }]),
            )
            .await?;
        let parsed: BlockhashValidResult = serde_json::from_value(result)
            .map_err(|e| RpcError::Decode(format!("isBlockhashValid: {e}")))?;
        Ok(parsed.value)
    }

    async fn health(&self) -> Result<(), RpcError> {
        let result = self.call("getHealth", json!([])).await?;
        match result.as_str() {
            Some("ok") => Ok(()),
            _ => Err(RpcError::Decode(format!("getHealth: unexpected {result}"))),
        }
    }
}
