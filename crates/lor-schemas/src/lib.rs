//! Records returned by the limit-order venue.
//!
//! These types mirror the venue's JSON payloads (camelCase) and are re-served
//! to HTTP clients by the history endpoint. Amounts stay as decimal strings so
//! nothing is rounded on the way through. No business logic lives here.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Open orders
// ---------------------------------------------------------------------------

/// An order account that is still live on chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenOrder {
    /// Address of the order account (the identifier clients cancel by).
    pub public_key: String,
    pub account: OrderAccount,
}

/// Decoded state of an on-chain order account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderAccount {
    /// Wallet that created the order and may cancel it.
    pub maker: String,
    pub input_mint: String,
    pub output_mint: String,
    #[serde(default)]
    pub ori_in_amount: Option<String>,
    #[serde(default)]
    pub ori_out_amount: Option<String>,
    #[serde(default)]
    pub in_amount: Option<String>,
    #[serde(default)]
    pub out_amount: Option<String>,
    /// Unix seconds, `None` for orders that never expire.
    #[serde(default)]
    pub expired_at: Option<i64>,
    #[serde(default)]
    pub base: Option<String>,
    #[serde(default)]
    pub waiting: Option<bool>,
}

impl OpenOrder {
    pub fn is_owned_by(&self, wallet: &str) -> bool {
        self.account.maker == wallet
    }
}

// ---------------------------------------------------------------------------
// Order history
// ---------------------------------------------------------------------------

/// One row of a wallet's order history (created, cancelled or completed orders).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderHistoryItem {
    /// Monotonic venue row id; doubles as the pagination cursor.
    pub id: i64,
    pub order_key: String,
    #[serde(default)]
    pub maker: Option<String>,
    pub input_mint: String,
    pub output_mint: String,
    #[serde(default)]
    pub in_amount: Option<String>,
    #[serde(default)]
    pub ori_in_amount: Option<String>,
    #[serde(default)]
    pub out_amount: Option<String>,
    #[serde(default)]
    pub ori_out_amount: Option<String>,
    #[serde(default)]
    pub expired_at: Option<String>,
    /// "Completed" | "Cancelled" | "Open" (venue-defined).
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub create_txid: Option<String>,
    #[serde(default)]
    pub cancel_txid: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

// ---------------------------------------------------------------------------
// Trade history
// ---------------------------------------------------------------------------

/// One fill against an order owned by the wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeHistoryItem {
    pub id: i64,
    #[serde(default)]
    pub in_amount: Option<String>,
    #[serde(default)]
    pub out_amount: Option<String>,
    #[serde(default)]
    pub txid: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub order: Option<TradeOrderRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeOrderRef {
    #[serde(default)]
    pub id: Option<i64>,
    pub order_key: String,
    #[serde(default)]
    pub input_mint: Option<String>,
    #[serde(default)]
    pub output_mint: Option<String>,
}

// ---------------------------------------------------------------------------
// Counts
// ---------------------------------------------------------------------------

/// The venue answers count queries either with a bare number or with
/// `{"count": n}` depending on the endpoint version; accept both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CountPayload {
    Bare(u64),
    Wrapped { count: u64 },
}

impl CountPayload {
    pub fn value(self) -> u64 {
        match self {
            CountPayload::Bare(n) | CountPayload::Wrapped { count: n } => n,
        }
    }
}
