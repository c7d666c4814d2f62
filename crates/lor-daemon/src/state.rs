//! Shared runtime state for lor-daemon.
//!
//! Everything here is built once at startup and shared read-only through
//! `Arc`; handlers receive `State<Arc<AppState>>` from Axum.

use std::sync::Arc;

use lor_chain::ChainRpc;
use lor_config::RelayConfig;
use lor_execution::{HistoryAggregator, RequestValidator, RetryPolicy, SubmissionPipeline};
use lor_venue::LimitOrderVenue;
use serde::Serialize;

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health responses.
#[derive(Clone, Debug, Serialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self {
            service: "lor-daemon",
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Handle shared across all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Static build metadata.
    pub build: BuildInfo,
    pub validator: RequestValidator,
    /// Shared with spawned submission tasks, hence the `Arc`.
    pub pipeline: Arc<SubmissionPipeline>,
    pub aggregator: Arc<HistoryAggregator>,
    /// Chain client, kept here for `/health`.
    pub rpc: Arc<dyn ChainRpc>,
}

impl AppState {
    /// Wire the relay components from config and the two process-wide clients.
    pub fn new(cfg: &RelayConfig, venue: Arc<dyn LimitOrderVenue>, rpc: Arc<dyn ChainRpc>) -> Self {
        let policy = RetryPolicy::from(&cfg.submission);
        // Each history sub-query gets the same budget as a whole submission.
        let aggregator = HistoryAggregator::new(Arc::clone(&venue), policy.request_timeout);
        let pipeline =
            SubmissionPipeline::new(venue, Arc::clone(&rpc), policy, cfg.chain.commitment);

        Self {
            build: BuildInfo::default(),
            validator: RequestValidator::new(cfg.orders.clone(), cfg.history.clone()),
            pipeline: Arc::new(pipeline),
            aggregator: Arc::new(aggregator),
            rpc,
        }
    }
}
