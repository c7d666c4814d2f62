//! Submission state machine.
//!
//! One [`Submission`] tracks a single create or cancel request from the
//! moment it is validated until it reaches a terminal state:
//!
//! ```text
//!  Validated ──Built──► Built ──Signed──► Signed ──Submitted──► Submitted ──Confirmed──► Confirmed
//!      │                  │                  │                      │
//!      └──────────────────┴──── RetryableFailure ───────────────────┘
//!                                      │
//!                                      ▼
//!                                  Retrying ──Built──► Built (fresh blockhash)
//!
//!  any live state ──TerminalFailure──► TerminalFailure
//!  any live state ──Timeout──────────► TimedOut
//! ```
//!
//! Illegal events return [`TransitionError`]; the pipeline reports them as an
//! internal error.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubmissionState {
    Validated,
    Built,
    Signed,
    Submitted,
    Retrying,
    /// **Terminal.**
    Confirmed,
    /// **Terminal.**
    TerminalFailure,
    /// **Terminal.**
    TimedOut,
}

impl SubmissionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Confirmed | Self::TerminalFailure | Self::TimedOut
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionEvent {
    /// The venue returned a transaction.
    Built,
    /// The owner's signature is in place.
    Signed,
    /// The node accepted the transaction.
    Submitted,
    /// The transaction reached the required commitment.
    Confirmed,
    RetryableFailure,
    TerminalFailure,
    /// Attempts or the request budget ran out.
    Timeout,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("illegal submission transition: {from:?} + {event:?}")]
pub struct TransitionError {
    pub from: SubmissionState,
    pub event: SubmissionEvent,
}

#[derive(Debug, Clone)]
pub struct Submission {
    pub state: SubmissionState,
    /// Number of transactions built so far.
    pub attempts: u32,
    /// Whether any attempt got a transaction accepted by the node.
    pub reached_network: bool,
}

impl Default for Submission {
    fn default() -> Self {
        Self::new()
    }
}

impl Submission {
    pub fn new() -> Self {
        Self {
            state: SubmissionState::Validated,
            attempts: 0,
            reached_network: false,
        }
    }

    pub fn apply(&mut self, event: SubmissionEvent) -> Result<SubmissionState, TransitionError> {
        use SubmissionEvent as E;
        use SubmissionState::*;

        let next = match (self.state, event) {
            (Validated | Retrying, E::Built) => {
                self.attempts += 1;
                Built
            }
            (Built, E::Signed) => Signed,
            (Signed, E::Submitted) => {
                self.reached_network = true;
                Submitted
            }
            (Submitted, E::Confirmed) => Confirmed,

            // A failed venue call leaves the request in Validated/Retrying.
            (Validated | Retrying | Built | Signed | Submitted, E::RetryableFailure) => Retrying,

            (Validated | Retrying | Built | Signed | Submitted, E::TerminalFailure) => {
                TerminalFailure
            }
            (Validated | Retrying | Built | Signed | Submitted, E::Timeout) => TimedOut,

            (from, event) => return Err(TransitionError { from, event }),
        };
        self.state = next;
        Ok(next)
    }
}
