//! Jupiter limit-order REST API.
//!
//! Write endpoints return base64 transactions that still need the owner's
//! signature. Read endpoints return the records in `lor-schemas`.

use std::time::Duration;

use async_trait::async_trait;
use lor_chain::{parse_pubkey, transaction_from_base64, Pubkey, VersionedTransaction};
use lor_schemas::{CountPayload, OpenOrder, OrderHistoryItem, TradeHistoryItem};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    BuiltOrder, CancelOrderParams, CreateOrderParams, HistoryPage, LimitOrderVenue, VenueError,
};

pub const DEFAULT_BASE_URL: &str = "https://jup.ag/api/limit/v1";

/// Venue error text kept for logs and classification.
const MAX_ERROR_TEXT: usize = 200;

/// HTTP adapter for the venue.
///
/// The API key, when configured, is sent as `x-api-key` and never logged.
#[derive(Clone)]
pub struct JupiterLimitOrderApi {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for JupiterLimitOrderApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JupiterLimitOrderApi")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateOrderBody {
    owner: String,
    in_amount: String,
    out_amount: String,
    input_mint: String,
    output_mint: String,
    expired_at: Option<i64>,
    base: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateOrderResponse {
    tx: String,
    order_pubkey: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CancelOrdersBody {
    owner: String,
    fee_payer: String,
    orders: Vec<String>,
}

#[derive(Deserialize)]
struct CancelOrdersResponse {
    #[serde(default)]
    tx: Option<String>,
    #[serde(default)]
    txs: Vec<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl JupiterLimitOrderApi {
    pub fn new(timeout: Duration) -> Result<Self, VenueError> {
        Self::new_with_base_url(DEFAULT_BASE_URL, timeout)
    }

    pub fn new_with_base_url(
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, VenueError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VenueError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key: None,
        })
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    fn with_key(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.header("x-api-key", key),
            None => req,
        }
    }

    async fn read<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        req: reqwest::RequestBuilder,
    ) -> Result<T, VenueError> {
        let resp = self
            .with_key(req)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        let text = resp.text().await.map_err(from_reqwest)?;

        if !status.is_success() {
            debug!(endpoint, status = status.as_u16(), "venue returned error status");
            return Err(VenueError::Api {
                status: status.as_u16(),
                message: error_text(&text),
            });
        }

        serde_json::from_str(&text).map_err(|e| VenueError::Decode(format!("{endpoint}: {e}")))
    }

    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        query: &[(&str, String)],
    ) -> Result<T, VenueError> {
        let req = self.http.get(self.url(endpoint)).query(query);
        self.read(endpoint, req).await
    }

    fn page_query(page: &HistoryPage) -> Vec<(&'static str, String)> {
        let mut q = vec![
            ("wallet", page.wallet.to_string()),
            ("take", page.take.to_string()),
        ];
        if let Some(cursor) = &page.cursor {
            q.push(("cursor", cursor.clone()));
        }
        q
    }
}

fn from_reqwest(e: reqwest::Error) -> VenueError {
    if e.is_timeout() {
        VenueError::Timeout(e.to_string())
    } else if e.is_decode() {
        VenueError::Decode(e.to_string())
    } else {
        VenueError::Transport(e.to_string())
    }
}

/// Prefer the venue's `error`/`message` field; fall back to the raw body.
fn error_text(body: &str) -> String {
    let picked = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error.or(b.message))
        .unwrap_or_else(|| body.trim().to_string());
    picked.chars().take(MAX_ERROR_TEXT).collect()
}

#[async_trait]
impl LimitOrderVenue for JupiterLimitOrderApi {
    fn name(&self) -> &'static str {
        "jupiter-limit-v1"
    }

    async fn create_order(&self, params: &CreateOrderParams) -> Result<BuiltOrder, VenueError> {
        let owner = params.owner.to_string();
        let body = CreateOrderBody {
            in_amount: params.in_amount.to_string(),
            out_amount: params.out_amount.to_string(),
            input_mint: params.input_mint.to_string(),
            output_mint: params.output_mint.to_string(),
            expired_at: params.expired_at,
            // The order account is derived from `base`; using the owner keeps
            // the owner as the only required signer.
            base: owner.clone(),
            owner,
        };
        let req = self.http.post(self.url("createOrder")).json(&body);
        let resp: CreateOrderResponse = self.read("createOrder", req).await?;

        let tx = transaction_from_base64(&resp.tx)?;
        let order_pubkey = parse_pubkey(&resp.order_pubkey)
            .map_err(|e| VenueError::Decode(format!("createOrder: orderPubkey: {e}")))?;
        Ok(BuiltOrder { tx, order_pubkey })
    }

    async fn cancel_order(&self, params: &CancelOrderParams) -> Result<VersionedTransaction, VenueError> {
        let owner = params.owner.to_string();
        let body = CancelOrdersBody {
            fee_payer: owner.clone(),
            owner,
            orders: vec![params.order_pubkey.to_string()],
        };
        let req = self.http.post(self.url("cancelOrders")).json(&body);
        let resp: CancelOrdersResponse = self.read("cancelOrders", req).await?;

        let encoded = resp
            .tx
            .or_else(|| resp.txs.into_iter().next())
            .ok_or_else(|| VenueError::Decode("cancelOrders: no transaction returned".into()))?;
        Ok(transaction_from_base64(&encoded)?)
    }

    async fn get_orders(&self, owner: &Pubkey) -> Result<Vec<OpenOrder>, VenueError> {
        let wallet = owner.to_string();
        let orders: Vec<OpenOrder> = self
            .get("openOrders", &[("wallet", wallet.clone())])
            .await?;
        // The venue filters by wallet already; keep only what the owner made.
        Ok(orders.into_iter().filter(|o| o.is_owned_by(&wallet)).collect())
    }

    async fn get_order_history(
        &self,
        page: &HistoryPage,
    ) -> Result<Vec<OrderHistoryItem>, VenueError> {
        self.get("orderHistory", &Self::page_query(page)).await
    }

    async fn get_order_history_count(&self, wallet: &Pubkey) -> Result<u64, VenueError> {
        let count: CountPayload = self
            .get("orderHistoryCount", &[("wallet", wallet.to_string())])
            .await?;
        Ok(count.value())
    }

    async fn get_trade_history(
        &self,
        page: &HistoryPage,
    ) -> Result<Vec<TradeHistoryItem>, VenueError> {
        self.get("tradeHistory", &Self::page_query(page)).await
    }

    async fn get_trade_history_count(&self, wallet: &Pubkey) -> Result<u64, VenueError> {
        let count: CountPayload = self
            .get("tradeHistoryCount", &[("wallet", wallet.to_string())])
            .await?;
        Ok(count.value())
    }
}
