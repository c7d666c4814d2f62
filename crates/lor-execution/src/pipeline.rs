//! Submission pipeline: build via the venue, sign with the owner's key,
//! submit to the chain, wait for confirmation, retry what is retryable.
//!
//! A signed transaction is kept until it confirms, fails on chain, or the
//! node reports its blockhash expired with the signature still unknown.
//! Only then is a fresh one built, so at most one transaction per request
//! can land.

use std::future::Future;
use std::sync::Arc;

use lor_chain::{ChainRpc, Hash, Keypair, Pubkey, TransactionExt, VersionedTransaction};
use lor_config::Commitment;
use lor_venue::{CancelOrderParams, CreateOrderParams, LimitOrderVenue, VenueError};
use serde::Serialize;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::classify::{
    classify_rpc, classify_tx_err, classify_venue, send_outcome_unknown, FailureClass,
    RetryableKind,
};
use crate::error::RelayError;
use crate::retry::RetryPolicy;
use crate::state::{Submission, SubmissionEvent};
use crate::validate::{CancelCommand, CreateOrderCommand};

/// A confirmed order creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedOrder {
    #[serde(rename = "orderPubKey", with = "lor_chain::pubkey_str")]
    pub order_pubkey: Pubkey,
    pub txid: String,
}

enum Attempt<T> {
    Confirmed(T, String),
    Failed(FailureClass),
}

enum Confirmation {
    Confirmed,
    Failed(FailureClass),
    /// The blockhash expired and the transaction never landed.
    Expired,
}

pub struct SubmissionPipeline {
    venue: Arc<dyn LimitOrderVenue>,
    rpc: Arc<dyn ChainRpc>,
    policy: RetryPolicy,
    commitment: Commitment,
}

impl SubmissionPipeline {
    pub fn new(
        venue: Arc<dyn LimitOrderVenue>,
        rpc: Arc<dyn ChainRpc>,
        policy: RetryPolicy,
        commitment: Commitment,
    ) -> Self {
        Self {
            venue,
            rpc,
            policy,
            commitment,
        }
    }

    pub async fn create_order(&self, cmd: &CreateOrderCommand) -> Result<CreatedOrder, RelayError> {
        let request_id = Uuid::new_v4().to_string();
        let params = CreateOrderParams {
            owner: cmd.owner.pubkey(),
            input_mint: cmd.input_mint,
            output_mint: cmd.output_mint,
            in_amount: cmd.in_amount,
            out_amount: cmd.out_amount,
            expired_at: cmd.expired_at,
        };
        info!(
            request_id = %request_id,
            venue = self.venue.name(),
            owner = %params.owner,
            input_mint = %params.input_mint,
            output_mint = %params.output_mint,
            "create order accepted"
        );

        let venue = self.venue.as_ref();
        let params = &params;
        let (order_pubkey, txid) = self
            .submit(&request_id, "create order", cmd.owner.keypair(), move || async move {
                let built = venue.create_order(params).await?;
                Ok::<_, VenueError>((built.tx, built.order_pubkey))
            })
            .await?;

        info!(request_id = %request_id, order = %order_pubkey, txid = %txid, "order created");
        Ok(CreatedOrder { order_pubkey, txid })
    }

    /// Cancel an open order of the owner. Returns the cancel transaction id.
    ///
    /// The order must currently be open and made by the owner; otherwise the
    /// result is `NotFound` and nothing is built. A second cancel of the same
    /// order therefore also yields `NotFound`.
    pub async fn cancel_order(&self, cmd: &CancelCommand) -> Result<String, RelayError> {
        let request_id = Uuid::new_v4().to_string();
        let owner = cmd.owner.pubkey();
        info!(
            request_id = %request_id,
            venue = self.venue.name(),
            owner = %owner,
            order = %cmd.order_pubkey,
            "cancel order accepted"
        );

        match timeout(
            self.policy.request_timeout,
            self.ensure_open_order(&request_id, &owner, &cmd.order_pubkey),
        )
        .await
        {
            Ok(res) => res?,
            Err(_) => {
                warn!(request_id = %request_id, "open order lookup timed out");
                return Err(RelayError::upstream_unavailable(
                    "open orders: upstream timed out",
                ));
            }
        }

        let params = CancelOrderParams {
            owner,
            order_pubkey: cmd.order_pubkey,
        };
        let venue = self.venue.as_ref();
        let params = &params;
        let ((), txid) = self
            .submit(&request_id, "cancel order", cmd.owner.keypair(), move || async move {
                let tx = venue.cancel_order(params).await?;
                Ok::<_, VenueError>((tx, ()))
            })
            .await?;

        info!(request_id = %request_id, txid = %txid, "order cancelled");
        Ok(txid)
    }

    async fn ensure_open_order(
        &self,
        request_id: &str,
        owner: &Pubkey,
        order: &Pubkey,
    ) -> Result<(), RelayError> {
        let orders = self.venue.get_orders(owner).await.map_err(|e| {
            warn!(request_id, error = %e, "open order lookup failed");
            classify_venue(&e).into_read_error("open orders")
        })?;

        let wallet = owner.to_string();
        let target = order.to_string();
        if orders
            .iter()
            .any(|o| o.public_key == target && o.is_owned_by(&wallet))
        {
            Ok(())
        } else {
            info!(request_id, order = %target, "order is not an open order of owner");
            Err(RelayError::not_found("order not found for owner"))
        }
    }

    /// Run the build/sign/submit/confirm loop under the request budget.
    async fn submit<T, F, Fut>(
        &self,
        request_id: &str,
        action: &'static str,
        owner: &Keypair,
        build: F,
    ) -> Result<(T, String), RelayError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<(VersionedTransaction, T), VenueError>>,
    {
        let mut sub = Submission::new();
        let outcome = timeout(
            self.policy.request_timeout,
            self.run(&mut sub, request_id, action, owner, &build),
        )
        .await;

        match outcome {
            Ok(res) => res,
            Err(_) => {
                step(&mut sub, request_id, SubmissionEvent::Timeout)?;
                warn!(
                    request_id,
                    action,
                    attempts = sub.attempts,
                    reached_network = sub.reached_network,
                    "request budget exhausted"
                );
                Err(exhausted(&sub, action))
            }
        }
    }

    async fn run<T, F, Fut>(
        &self,
        sub: &mut Submission,
        request_id: &str,
        action: &'static str,
        owner: &Keypair,
        build: &F,
    ) -> Result<(T, String), RelayError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<(VersionedTransaction, T), VenueError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let class = match self
                .attempt(sub, request_id, attempt, owner, build)
                .await?
            {
                Attempt::Confirmed(value, txid) => return Ok((value, txid)),
                Attempt::Failed(class) => class,
            };

            match class {
                FailureClass::Retryable(kind) => {
                    step(sub, request_id, SubmissionEvent::RetryableFailure)?;
                    if !self.policy.has_attempts_left(attempt) {
                        step(sub, request_id, SubmissionEvent::Timeout)?;
                        warn!(
                            request_id,
                            action,
                            attempt,
                            reason = kind.as_str(),
                            reached_network = sub.reached_network,
                            "retries exhausted"
                        );
                        return Err(exhausted(sub, action));
                    }
                    let delay = self.policy.backoff_for(attempt);
                    warn!(
                        request_id,
                        action,
                        attempt,
                        reason = kind.as_str(),
                        backoff_ms = delay.as_millis() as u64,
                        "attempt failed, retrying"
                    );
                    sleep(delay).await;
                }
                FailureClass::Terminal(reason) => {
                    step(sub, request_id, SubmissionEvent::TerminalFailure)?;
                    warn!(request_id, action, attempt, reason = reason.as_str(), "terminal failure");
                    return Err(RelayError::submission_failed(reason, action));
                }
                FailureClass::Internal => {
                    step(sub, request_id, SubmissionEvent::TerminalFailure)?;
                    error!(request_id, action, attempt, "unexpected upstream response");
                    return Err(RelayError::internal(format!(
                        "{action}: unexpected upstream response"
                    )));
                }
            }
        }
    }

    async fn attempt<T, F, Fut>(
        &self,
        sub: &mut Submission,
        request_id: &str,
        attempt: u32,
        owner: &Keypair,
        build: &F,
    ) -> Result<Attempt<T>, RelayError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<(VersionedTransaction, T), VenueError>>,
    {
        let (mut tx, value) = match build().await {
            Ok(built) => built,
            Err(e) => {
                warn!(request_id, attempt, error = %e, "venue build failed");
                return Ok(Attempt::Failed(classify_venue(&e)));
            }
        };
        step(sub, request_id, SubmissionEvent::Built)?;

        if let Err(e) = tx.sign_as(owner) {
            error!(request_id, attempt, error = %e, "venue transaction cannot be signed by owner");
            return Ok(Attempt::Failed(FailureClass::Internal));
        }
        if !tx.is_fully_signed() {
            error!(request_id, attempt, "venue transaction needs signers other than the owner");
            return Ok(Attempt::Failed(FailureClass::Internal));
        }
        step(sub, request_id, SubmissionEvent::Signed)?;

        let blockhash = *tx.message.recent_blockhash();
        let txid = match self.rpc.send_transaction(&tx).await {
            Ok(sig) => sig,
            // The node may hold it already; follow it by its own signature.
            Err(e) if send_outcome_unknown(&e) => match tx.txid() {
                Some(local) => {
                    warn!(
                        request_id,
                        attempt,
                        error = %e,
                        txid = %local,
                        "send outcome unknown, tracking signature"
                    );
                    local
                }
                None => {
                    error!(request_id, attempt, "signed transaction has no signature");
                    return Ok(Attempt::Failed(FailureClass::Internal));
                }
            },
            Err(e) => {
                warn!(request_id, attempt, error = %e, "send failed");
                return Ok(Attempt::Failed(classify_rpc(&e)));
            }
        };
        step(sub, request_id, SubmissionEvent::Submitted)?;
        info!(request_id, attempt, txid = %txid, "transaction submitted");

        match self.await_confirmation(request_id, &txid, &blockhash).await {
            Confirmation::Confirmed => {
                step(sub, request_id, SubmissionEvent::Confirmed)?;
                Ok(Attempt::Confirmed(value, txid))
            }
            Confirmation::Failed(class) => Ok(Attempt::Failed(class)),
            Confirmation::Expired => {
                info!(request_id, attempt, txid = %txid, "blockhash expired before the transaction landed");
                Ok(Attempt::Failed(FailureClass::Retryable(
                    RetryableKind::BlockhashExpired,
                )))
            }
        }
    }

    /// Poll until the transaction reaches the commitment, fails on chain, or
    /// can provably no longer land. While its blockhash is valid this keeps
    /// waiting; the request budget bounds the wait.
    async fn await_confirmation(
        &self,
        request_id: &str,
        txid: &str,
        blockhash: &Hash,
    ) -> Confirmation {
        let check_expiry_from = Instant::now() + self.policy.attempt_confirm_timeout;
        let mut seen = false;
        loop {
            match self.rpc.signature_status(txid).await {
                Ok(Some(status)) => {
                    if let Some(err) = &status.err {
                        warn!(request_id, txid, err = %err, "transaction failed on chain");
                        return Confirmation::Failed(classify_tx_err(err));
                    }
                    // Nodes that omit confirmationStatus report rooted
                    // transactions with `confirmations: null`.
                    let level = status.confirmation_status.as_deref().unwrap_or(
                        if status.confirmations.is_none() {
                            "finalized"
                        } else {
                            "processed"
                        },
                    );
                    if self.commitment.is_satisfied_by(level) {
                        return Confirmation::Confirmed;
                    }
                    seen = true;
                }
                Ok(None) => {}
                Err(e) => debug!(request_id, txid, error = %e, "status poll failed"),
            }

            if !seen
                && Instant::now() >= check_expiry_from
                && self.can_no_longer_land(request_id, txid, blockhash).await
            {
                return Confirmation::Expired;
            }
            sleep(self.policy.confirm_poll).await;
        }
    }

    /// The blockhash has expired and the node still does not know the
    /// signature. Any doubt answers `false`.
    async fn can_no_longer_land(&self, request_id: &str, txid: &str, blockhash: &Hash) -> bool {
        match self.rpc.is_blockhash_valid(blockhash).await {
            Ok(true) => {
                debug!(request_id, txid, "blockhash still valid, waiting");
                false
            }
            // It may have landed between the last poll and the expiry.
            Ok(false) => matches!(self.rpc.signature_status(txid).await, Ok(None)),
            Err(e) => {
                debug!(request_id, txid, error = %e, "blockhash check failed");
                false
            }
        }
    }
}

fn step(
    sub: &mut Submission,
    request_id: &str,
    event: SubmissionEvent,
) -> Result<(), RelayError> {
    match sub.apply(event) {
        Ok(state) => {
            debug!(request_id, ?event, ?state, attempts = sub.attempts, "submission transition");
            Ok(())
        }
        Err(e) => {
            error!(request_id, error = %e, "submission state machine violated");
            Err(RelayError::internal("submission state machine violated"))
        }
    }
}

/// Nothing landed within the budget. If any attempt reached the node the
/// outcome is unknown, otherwise the upstream was never usable.
fn exhausted(sub: &Submission, action: &str) -> RelayError {
    if sub.reached_network {
        RelayError::confirmation_timeout(format!("{action} was not confirmed in time"))
    } else {
        RelayError::upstream_unavailable(format!("{action}: upstream unavailable"))
    }
}
