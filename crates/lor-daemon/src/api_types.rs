//! Response bodies for the relay HTTP surface.
//!
//! Success bodies for create-order and order-history are the execution
//! crate's own serializable types; only the envelopes owned by the daemon
//! live here.

use serde::Serialize;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Body of every 4xx/5xx response. `error` is always sanitized.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

// ---------------------------------------------------------------------------
// POST /cancel-order
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct CancelResponse {
    pub txid: String,
}

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
    /// "ok" | "unhealthy"
    pub rpc: &'static str,
}
