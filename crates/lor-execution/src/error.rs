//! The relay's HTTP-facing error taxonomy.
//!
//! Every failure leaving the relay is a [`RelayError`]: a stable [`ErrorCode`],
//! a sanitized message, and for submission failures a [`FailureReason`].
//! Collaborator payloads never end up in `message`.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorCode {
    ValidationError,
    InvalidAddress,
    InvalidAmount,
    SubmissionFailed,
    ConfirmationTimeout,
    NotFound,
    UpstreamUnavailable,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValidationError => "ValidationError",
            ErrorCode::InvalidAddress => "InvalidAddress",
            ErrorCode::InvalidAmount => "InvalidAmount",
            ErrorCode::SubmissionFailed => "SubmissionFailed",
            ErrorCode::ConfirmationTimeout => "ConfirmationTimeout",
            ErrorCode::NotFound => "NotFound",
            ErrorCode::UpstreamUnavailable => "UpstreamUnavailable",
            ErrorCode::InternalError => "InternalError",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            ErrorCode::ValidationError | ErrorCode::InvalidAddress | ErrorCode::InvalidAmount => {
                400
            }
            ErrorCode::NotFound => 404,
            ErrorCode::SubmissionFailed | ErrorCode::UpstreamUnavailable => 502,
            ErrorCode::ConfirmationTimeout => 504,
            ErrorCode::InternalError => 500,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a submission failed terminally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureReason {
    InsufficientFunds,
    InvalidMint,
    ProgramError,
    Rejected,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::InsufficientFunds => "INSUFFICIENT_FUNDS",
            FailureReason::InvalidMint => "INVALID_MINT",
            FailureReason::ProgramError => "PROGRAM_ERROR",
            FailureReason::Rejected => "REJECTED",
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            FailureReason::InsufficientFunds => "insufficient funds",
            FailureReason::InvalidMint => "invalid mint",
            FailureReason::ProgramError => "on-chain program error",
            FailureReason::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct RelayError {
    pub code: ErrorCode,
    pub message: String,
    pub reason: Option<FailureReason>,
}

impl RelayError {
    fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            reason: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    pub fn invalid_address(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidAddress, message)
    }

    pub fn invalid_amount(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidAmount, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn confirmation_timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfirmationTimeout, message)
    }

    pub fn upstream_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UpstreamUnavailable, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn submission_failed(reason: FailureReason, context: &str) -> Self {
        Self {
            code: ErrorCode::SubmissionFailed,
            message: format!("{context} failed: {}", reason.describe()),
            reason: Some(reason),
        }
    }

    pub fn http_status(&self) -> u16 {
        self.code.http_status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(RelayError::validation("x").http_status(), 400);
        assert_eq!(RelayError::invalid_address("x").http_status(), 400);
        assert_eq!(RelayError::invalid_amount("x").http_status(), 400);
        assert_eq!(RelayError::not_found("x").http_status(), 404);
        assert_eq!(
            RelayError::submission_failed(FailureReason::Rejected, "create").http_status(),
            502
        );
        assert_eq!(RelayError::upstream_unavailable("x").http_status(), 502);
        assert_eq!(RelayError::confirmation_timeout("x").http_status(), 504);
        assert_eq!(RelayError::internal("x").http_status(), 500);
    }

    #[test]
    fn submission_failure_carries_reason_code() {
        let e = RelayError::submission_failed(FailureReason::InsufficientFunds, "create order");
        assert_eq!(e.code, ErrorCode::SubmissionFailed);
        assert_eq!(e.reason.map(|r| r.as_str()), Some("INSUFFICIENT_FUNDS"));
        assert_eq!(e.message, "create order failed: insufficient funds");
        assert_eq!(
            e.to_string(),
            "SubmissionFailed: create order failed: insufficient funds"
        );
    }
}
