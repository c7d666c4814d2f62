//! History aggregation: five read-only venue queries, run concurrently,
//! merged into one report. A failed query blanks only its own field.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use lor_schemas::{OpenOrder, OrderHistoryItem, TradeHistoryItem};
use lor_venue::{HistoryPage, LimitOrderVenue, VenueError};
use serde::Serialize;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::classify::classify_venue;
use crate::error::{ErrorCode, RelayError};
use crate::validate::HistoryCommand;

/// Sanitized per-field failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub code: ErrorCode,
    pub message: String,
}

impl From<&RelayError> for FieldError {
    fn from(e: &RelayError) -> Self {
        Self {
            code: e.code,
            message: e.message.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryReport {
    pub orders: Option<Vec<OpenOrder>>,
    pub order_history: Option<Vec<OrderHistoryItem>>,
    pub order_history_count: Option<u64>,
    pub trade_history: Option<Vec<TradeHistoryItem>>,
    pub trade_history_count: Option<u64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<&'static str, FieldError>,
}

pub struct HistoryAggregator {
    venue: Arc<dyn LimitOrderVenue>,
    query_timeout: Duration,
}

impl HistoryAggregator {
    pub fn new(venue: Arc<dyn LimitOrderVenue>, query_timeout: Duration) -> Self {
        Self {
            venue,
            query_timeout,
        }
    }

    /// Fails only when every query failed, with the first failure in field
    /// order.
    pub async fn aggregate(&self, cmd: &HistoryCommand) -> Result<HistoryReport, RelayError> {
        let page = HistoryPage {
            wallet: cmd.wallet,
            take: cmd.take,
            cursor: cmd.cursor.clone(),
        };
        let venue = self.venue.as_ref();

        let (orders, order_history, order_history_count, trade_history, trade_history_count) = tokio::join!(
            self.query("orders", venue.get_orders(&cmd.wallet)),
            self.query("orderHistory", venue.get_order_history(&page)),
            self.query("orderHistoryCount", venue.get_order_history_count(&cmd.wallet)),
            self.query("tradeHistory", venue.get_trade_history(&page)),
            self.query("tradeHistoryCount", venue.get_trade_history_count(&cmd.wallet)),
        );

        let mut errors = BTreeMap::new();
        let mut first_failure: Option<RelayError> = None;
        let orders = settle("orders", orders, &mut errors, &mut first_failure);
        let order_history = settle("orderHistory", order_history, &mut errors, &mut first_failure);
        let order_history_count = settle(
            "orderHistoryCount",
            order_history_count,
            &mut errors,
            &mut first_failure,
        );
        let trade_history = settle("tradeHistory", trade_history, &mut errors, &mut first_failure);
        let trade_history_count = settle(
            "tradeHistoryCount",
            trade_history_count,
            &mut errors,
            &mut first_failure,
        );

        if errors.len() == 5 {
            if let Some(e) = first_failure {
                warn!(wallet = %cmd.wallet, "all history queries failed");
                return Err(e);
            }
        }

        info!(
            wallet = %cmd.wallet,
            take = cmd.take,
            failed = errors.len(),
            "history aggregated"
        );
        Ok(HistoryReport {
            orders,
            order_history,
            order_history_count,
            trade_history,
            trade_history_count,
            errors,
        })
    }

    async fn query<T>(
        &self,
        field: &'static str,
        fut: impl Future<Output = Result<T, VenueError>>,
    ) -> Result<T, RelayError> {
        match timeout(self.query_timeout, fut).await {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(e)) => {
                warn!(field, error = %e, "history query failed");
                Err(classify_venue(&e).into_read_error(field))
            }
            Err(_) => {
                warn!(field, "history query timed out");
                Err(RelayError::upstream_unavailable(format!(
                    "{field}: upstream timed out"
                )))
            }
        }
    }
}

fn settle<T>(
    field: &'static str,
    res: Result<T, RelayError>,
    errors: &mut BTreeMap<&'static str, FieldError>,
    first_failure: &mut Option<RelayError>,
) -> Option<T> {
    match res {
        Ok(v) => Some(v),
        Err(e) => {
            errors.insert(field, FieldError::from(&e));
            first_failure.get_or_insert(e);
            None
        }
    }
}
