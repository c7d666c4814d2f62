//! lor-venue
//!
//! The limit-order venue as seen by the relay.
//!
//! This crate owns the venue abstraction and the HTTP adapter for the venue's
//! REST API. It builds nothing itself: the venue returns base64 transactions
//! (unsigned by the owner) and paginated read models. Callers decide what to
//! sign, what to retry and how to report failures.

pub mod jupiter;

use async_trait::async_trait;
use lor_chain::{Pubkey, TxError, VersionedTransaction};
use lor_schemas::{OpenOrder, OrderHistoryItem, TradeHistoryItem};
use thiserror::Error;

pub use jupiter::JupiterLimitOrderApi;

/// Raw venue failure. Classification happens in the execution layer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VenueError {
    #[error("venue timeout: {0}")]
    Timeout(String),
    #[error("venue transport error: {0}")]
    Transport(String),
    /// Non-2xx status. `message` is the venue's own text, truncated.
    #[error("venue http status {status}: {message}")]
    Api { status: u16, message: String },
    #[error("venue decode error: {0}")]
    Decode(String),
    /// The venue returned a transaction the relay cannot parse.
    #[error("venue returned an invalid transaction: {0}")]
    InvalidTransaction(#[from] TxError),
}

/// Inputs for a new limit order. Amounts are in the mints' base units.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateOrderParams {
    pub owner: Pubkey,
    pub input_mint: Pubkey,
    pub output_mint: Pubkey,
    pub in_amount: u64,
    pub out_amount: u64,
    /// Unix seconds. `None` means the order never expires.
    pub expired_at: Option<i64>,
}

/// The venue's answer to `createOrder`: a transaction for the owner to sign
/// and the address the order account will have once it lands.
#[derive(Debug, Clone)]
pub struct BuiltOrder {
    pub tx: VersionedTransaction,
    pub order_pubkey: Pubkey,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CancelOrderParams {
    pub owner: Pubkey,
    pub order_pubkey: Pubkey,
}

/// One page of a wallet's history.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryPage {
    pub wallet: Pubkey,
    pub take: u32,
    /// Opaque cursor from a previous page, passed through unchanged.
    pub cursor: Option<String>,
}

/// Pluggable venue interface.
#[async_trait]
pub trait LimitOrderVenue: Send + Sync {
    fn name(&self) -> &'static str;

    async fn create_order(&self, params: &CreateOrderParams) -> Result<BuiltOrder, VenueError>;

    async fn cancel_order(&self, params: &CancelOrderParams) -> Result<VersionedTransaction, VenueError>;

    /// Open orders whose maker is `owner`.
    async fn get_orders(&self, owner: &Pubkey) -> Result<Vec<OpenOrder>, VenueError>;

    async fn get_order_history(
        &self,
        page: &HistoryPage,
    ) -> Result<Vec<OrderHistoryItem>, VenueError>;

    async fn get_order_history_count(&self, wallet: &Pubkey) -> Result<u64, VenueError>;

    async fn get_trade_history(
        &self,
        page: &HistoryPage,
    ) -> Result<Vec<TradeHistoryItem>, VenueError>;

    async fn get_trade_history_count(&self, wallet: &Pubkey) -> Result<u64, VenueError>;
}
