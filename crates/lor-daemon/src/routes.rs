//! Axum router and all HTTP handlers for lor-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Every handler validates first, so a rejected body never
//! reaches the venue or the chain.

use std::{future::Future, sync::Arc};

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use lor_execution::{ErrorCode, RelayError};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::{
    api_types::{CancelResponse, ErrorResponse, HealthResponse},
    state::AppState,
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/create-order", post(create_order))
        .route("/order-history", post(order_history))
        .route("/cancel-order", post(cancel_order))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Error envelope
// ---------------------------------------------------------------------------

/// A [`RelayError`] on its way out as `{error, code, [reason]}`.
pub(crate) struct ApiError(RelayError);

impl From<RelayError> for ApiError {
    fn from(e: RelayError) -> Self {
        Self(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(RelayError::validation(format!(
            "request body is not valid JSON: {}",
            rejection.body_text()
        )))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status =
            StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        match err.code {
            ErrorCode::InternalError => error!(code = %err.code, error = %err.message, "request failed"),
            _ if status.is_server_error() => {
                warn!(code = %err.code, reason = ?err.reason, error = %err.message, "request failed")
            }
            _ => info!(code = %err.code, error = %err.message, "request rejected"),
        }

        (
            status,
            Json(ErrorResponse {
                error: err.message,
                code: err.code.as_str(),
                reason: err.reason.map(|r| r.as_str()),
            }),
        )
            .into_response()
    }
}

/// Run a submission in its own task so a client disconnect cannot cancel it
/// halfway through; the handler only awaits the outcome.
async fn detached<T, F>(fut: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: Future<Output = Result<T, RelayError>> + Send + 'static,
{
    match tokio::spawn(fut).await {
        Ok(res) => res.map_err(ApiError::from),
        Err(join_err) => {
            error!(error = %join_err, "submission task aborted");
            Err(RelayError::internal("submission task aborted").into())
        }
    }
}

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let (status, rpc) = match st.rpc.health().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(e) => {
            warn!(error = %e, "rpc health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
        }
    };

    (
        status,
        Json(HealthResponse {
            ok: status == StatusCode::OK,
            service: st.build.service,
            version: st.build.version,
            rpc,
        }),
    )
}

// ---------------------------------------------------------------------------
// POST /create-order
// ---------------------------------------------------------------------------

pub(crate) async fn create_order(
    State(st): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body?;
    let cmd = st.validator.create_order(&body)?;

    let pipeline = Arc::clone(&st.pipeline);
    let created = detached(async move { pipeline.create_order(&cmd).await }).await?;

    info!(order = %created.order_pubkey, txid = %created.txid, "order created");
    Ok((StatusCode::CREATED, Json(created)))
}

// ---------------------------------------------------------------------------
// POST /order-history
// ---------------------------------------------------------------------------

pub(crate) async fn order_history(
    State(st): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body?;
    let cmd = st.validator.order_history(&body)?;
    let report = st.aggregator.aggregate(&cmd).await?;
    Ok((StatusCode::OK, Json(report)))
}

// ---------------------------------------------------------------------------
// POST /cancel-order
// ---------------------------------------------------------------------------

pub(crate) async fn cancel_order(
    State(st): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body?;
    let cmd = st.validator.cancel_order(&body)?;

    let pipeline = Arc::clone(&st.pipeline);
    let order = cmd.order_pubkey;
    let txid = detached(async move { pipeline.cancel_order(&cmd).await }).await?;

    info!(%order, %txid, "order cancelled");
    Ok((StatusCode::OK, Json(CancelResponse { txid })))
}
