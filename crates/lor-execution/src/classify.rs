//! Failure classification.
//!
//! Collaborators report raw errors ([`RpcError`], [`VenueError`], on-chain
//! status `err` values). This module decides which of them are worth another
//! attempt and which end the request, and turns the outcome into a sanitized
//! [`RelayError`].

use lor_chain::RpcError;
use lor_venue::VenueError;
use serde_json::Value;

use crate::error::{FailureReason, RelayError};

/// JSON-RPC "node is unhealthy / behind" code.
const RPC_NODE_UNHEALTHY: i64 = -32005;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryableKind {
    RpcTimeout,
    Unreachable,
    BlockhashExpired,
    NodeUnhealthy,
    VenueUnavailable,
}

impl RetryableKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetryableKind::RpcTimeout => "rpc_timeout",
            RetryableKind::Unreachable => "unreachable",
            RetryableKind::BlockhashExpired => "blockhash_expired",
            RetryableKind::NodeUnhealthy => "node_unhealthy",
            RetryableKind::VenueUnavailable => "venue_unavailable",
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            RetryableKind::RpcTimeout => "upstream timed out",
            RetryableKind::Unreachable => "upstream unreachable",
            RetryableKind::BlockhashExpired => "transaction expired before confirmation",
            RetryableKind::NodeUnhealthy => "chain node unhealthy",
            RetryableKind::VenueUnavailable => "order venue unavailable",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Retryable(RetryableKind),
    Terminal(FailureReason),
    /// Malformed collaborator payload or a relay bug.
    Internal,
}

impl FailureClass {
    /// Error for a read-only call. Reads have no submission to fail, so
    /// anything the venue refuses is reported as the upstream being unusable.
    pub fn into_read_error(self, what: &str) -> RelayError {
        match self {
            FailureClass::Retryable(kind) => {
                RelayError::upstream_unavailable(format!("{what}: {}", kind.describe()))
            }
            FailureClass::Terminal(_) => {
                RelayError::upstream_unavailable(format!("{what}: request refused upstream"))
            }
            FailureClass::Internal => {
                RelayError::internal(format!("{what}: unexpected upstream response"))
            }
        }
    }
}

pub fn classify_rpc(err: &RpcError) -> FailureClass {
    match err {
        RpcError::Timeout(_) => FailureClass::Retryable(RetryableKind::RpcTimeout),
        RpcError::Transport(_) => FailureClass::Retryable(RetryableKind::Unreachable),
        RpcError::Http { .. } => FailureClass::Retryable(RetryableKind::Unreachable),
        RpcError::Decode(_) => FailureClass::Internal,
        RpcError::Rpc {
            code,
            message,
            data,
        } => classify_rpc_error_object(*code, message, data.as_ref()),
    }
}

/// A failed send whose transaction may still have reached the node. A
/// timed-out request can have been delivered before the response was lost;
/// every other error means the node did not accept it.
pub fn send_outcome_unknown(err: &RpcError) -> bool {
    matches!(err, RpcError::Timeout(_))
}

fn classify_rpc_error_object(code: i64, message: &str, data: Option<&Value>) -> FailureClass {
    let msg = message.to_ascii_lowercase();
    let data_text = data.map(Value::to_string).unwrap_or_default();

    if code == RPC_NODE_UNHEALTHY || msg.contains("node is unhealthy") || msg.contains("node is behind")
    {
        return FailureClass::Retryable(RetryableKind::NodeUnhealthy);
    }
    if msg.contains("blockhash not found")
        || msg.contains("blockhash expired")
        || data_text.contains("BlockhashNotFound")
    {
        return FailureClass::Retryable(RetryableKind::BlockhashExpired);
    }
    if msg.contains("insufficient funds")
        || msg.contains("insufficientfundsforfee")
        || msg.contains("no record of a prior credit")
        || data_text.contains("InsufficientFunds")
        || has_custom_error(&msg, 0x1)
    {
        return FailureClass::Terminal(FailureReason::InsufficientFunds);
    }
    if msg.contains("invalid mint")
        || msg.contains("invalid account data")
        || msg.contains("invalidaccountdata")
        || data_text.contains("InvalidAccountData")
    {
        return FailureClass::Terminal(FailureReason::InvalidMint);
    }
    FailureClass::Terminal(FailureReason::Rejected)
}

/// `custom program error: 0x<code>` with exactly that code; `0x1` must not
/// match `0x1771`.
fn has_custom_error(lower_msg: &str, code: u32) -> bool {
    const MARKER: &str = "custom program error: 0x";
    lower_msg.match_indices(MARKER).any(|(at, _)| {
        let hex: String = lower_msg[at + MARKER.len()..]
            .chars()
            .take_while(|c| c.is_ascii_hexdigit())
            .collect();
        u32::from_str_radix(&hex, 16).ok() == Some(code)
    })
}

/// Classify the `err` of a landed transaction. Landed failures are final
/// except for a blockhash the cluster no longer recognizes.
pub fn classify_tx_err(err: &Value) -> FailureClass {
    let text = err.to_string();
    if text.contains("BlockhashNotFound") {
        return FailureClass::Retryable(RetryableKind::BlockhashExpired);
    }
    if text.contains("InsufficientFunds") || is_instruction_custom(err, 1) {
        return FailureClass::Terminal(FailureReason::InsufficientFunds);
    }
    FailureClass::Terminal(FailureReason::ProgramError)
}

/// `{"InstructionError": [idx, {"Custom": code}]}`
fn is_instruction_custom(err: &Value, code: u64) -> bool {
    err.get("InstructionError")
        .and_then(|v| v.get(1))
        .and_then(|v| v.get("Custom"))
        .and_then(Value::as_u64)
        == Some(code)
}

pub fn classify_venue(err: &VenueError) -> FailureClass {
    match err {
        VenueError::Timeout(_) => FailureClass::Retryable(RetryableKind::RpcTimeout),
        VenueError::Transport(_) => FailureClass::Retryable(RetryableKind::Unreachable),
        VenueError::Api { status, message } => match *status {
            429 | 500..=599 => FailureClass::Retryable(RetryableKind::VenueUnavailable),
            400..=499 if message.to_ascii_lowercase().contains("mint") => {
                FailureClass::Terminal(FailureReason::InvalidMint)
            }
            400..=499 => FailureClass::Terminal(FailureReason::Rejected),
            _ => FailureClass::Retryable(RetryableKind::VenueUnavailable),
        },
        VenueError::Decode(_) | VenueError::InvalidTransaction(_) => FailureClass::Internal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rpc(code: i64, message: &str) -> RpcError {
        RpcError::Rpc {
            code,
            message: message.into(),
            data: None,
        }
    }

    #[test]
    fn only_a_timed_out_send_may_have_been_delivered() {
        assert!(send_outcome_unknown(&RpcError::Timeout("t".into())));
        assert!(!send_outcome_unknown(&RpcError::Transport("refused".into())));
        assert!(!send_outcome_unknown(&RpcError::Http { status: 503 }));
        assert!(!send_outcome_unknown(&rpc(-32002, "Transaction simulation failed")));
    }

    #[test]
    fn rpc_transport_failures_are_retryable() {
        assert_eq!(
            classify_rpc(&RpcError::Timeout("t".into())),
            FailureClass::Retryable(RetryableKind::RpcTimeout)
        );
        assert_eq!(
            classify_rpc(&RpcError::Transport("refused".into())),
            FailureClass::Retryable(RetryableKind::Unreachable)
        );
        assert_eq!(
            classify_rpc(&RpcError::Http { status: 503 }),
            FailureClass::Retryable(RetryableKind::Unreachable)
        );
    }

    #[test]
    fn rpc_error_objects() {
        assert_eq!(
            classify_rpc(&rpc(-32002, "Transaction simulation failed: Blockhash not found")),
            FailureClass::Retryable(RetryableKind::BlockhashExpired)
        );
        assert_eq!(
            classify_rpc(&rpc(-32005, "Node is behind by 42 slots")),
            FailureClass::Retryable(RetryableKind::NodeUnhealthy)
        );
        assert_eq!(
            classify_rpc(&rpc(
                -32002,
                "Transaction simulation failed: Attempt to debit an account but found no record of a prior credit."
            )),
            FailureClass::Terminal(FailureReason::InsufficientFunds)
        );
        assert_eq!(
            classify_rpc(&rpc(
                -32002,
                "Transaction simulation failed: Error processing Instruction 2: custom program error: 0x1"
            )),
            FailureClass::Terminal(FailureReason::InsufficientFunds)
        );
        assert_eq!(
            classify_rpc(&rpc(-32002, "invalid account data for instruction")),
            FailureClass::Terminal(FailureReason::InvalidMint)
        );
        assert_eq!(
            classify_rpc(&rpc(-32602, "invalid params")),
            FailureClass::Terminal(FailureReason::Rejected)
        );
        assert_eq!(
            classify_rpc(&RpcError::Decode("x".into())),
            FailureClass::Internal
        );
    }

    #[test]
    fn custom_error_code_matches_exactly() {
        assert!(has_custom_error("custom program error: 0x1", 0x1));
        assert!(!has_custom_error("custom program error: 0x1771", 0x1));
        assert!(has_custom_error("custom program error: 0x1771", 0x1771));
        assert!(!has_custom_error("no marker here", 0x1));
    }

    #[test]
    fn data_field_is_consulted() {
        let err = RpcError::Rpc {
            code: -32002,
            message: "Transaction simulation failed".into(),
            data: Some(json!({"err": "BlockhashNotFound"})),
        };
        assert_eq!(
            classify_rpc(&err),
            FailureClass::Retryable(RetryableKind::BlockhashExpired)
        );
    }

    #[test]
    fn landed_transaction_errors() {
        assert_eq!(
            classify_tx_err(&json!("BlockhashNotFound")),
            FailureClass::Retryable(RetryableKind::BlockhashExpired)
        );
        assert_eq!(
            classify_tx_err(&json!("InsufficientFundsForFee")),
            FailureClass::Terminal(FailureReason::InsufficientFunds)
        );
        assert_eq!(
            classify_tx_err(&json!({"InstructionError": [0, {"Custom": 1}]})),
            FailureClass::Terminal(FailureReason::InsufficientFunds)
        );
        assert_eq!(
            classify_tx_err(&json!({"InstructionError": [1, {"Custom": 6001}]})),
            FailureClass::Terminal(FailureReason::ProgramError)
        );
    }

    #[test]
    fn venue_statuses() {
        let api = |status, message: &str| VenueError::Api {
            status,
            message: message.into(),
        };
        assert_eq!(
            classify_venue(&api(429, "slow down")),
            FailureClass::Retryable(RetryableKind::VenueUnavailable)
        );
        assert_eq!(
            classify_venue(&api(502, "bad gateway")),
            FailureClass::Retryable(RetryableKind::VenueUnavailable)
        );
        assert_eq!(
            classify_venue(&api(400, "Invalid inputMint")),
            FailureClass::Terminal(FailureReason::InvalidMint)
        );
        assert_eq!(
            classify_venue(&api(400, "amount too small")),
            FailureClass::Terminal(FailureReason::Rejected)
        );
        assert_eq!(
            classify_venue(&VenueError::Decode("x".into())),
            FailureClass::Internal
        );
        assert_eq!(
            classify_venue(&VenueError::Transport("refused".into())),
            FailureClass::Retryable(RetryableKind::Unreachable)
        );
    }

    #[test]
    fn read_errors_are_sanitized() {
        let e = classify_venue(&VenueError::Api {
            status: 400,
            message: "internal stack trace here".into(),
        })
        .into_read_error("orderHistory");
        assert_eq!(e.http_status(), 502);
        assert!(!e.message.contains("stack trace"));
    }
}
