//! lor-execution
//!
//! Everything between the HTTP surface and the collaborators:
//!
//! - [`RequestValidator`]: raw JSON → typed commands, no side effects.
//! - [`SubmissionPipeline`]: build, sign, submit and confirm with bounded
//!   retries, tracked by the [`Submission`] state machine.
//! - [`HistoryAggregator`]: concurrent history queries with per-field
//!   failure reporting.
//! - [`classify`]: collaborator failures → retryable / terminal, and the
//!   stable [`RelayError`] taxonomy the daemon renders.

pub mod classify;
mod error;
mod history;
mod pipeline;
mod retry;
mod state;
mod validate;

pub use classify::{FailureClass, RetryableKind};
pub use error::{ErrorCode, FailureReason, RelayError};
pub use history::{FieldError, HistoryAggregator, HistoryReport};
pub use pipeline::{CreatedOrder, SubmissionPipeline};
pub use retry::RetryPolicy;
pub use state::{Submission, SubmissionEvent, SubmissionState, TransitionError};
pub use validate::{
    CancelCommand, CreateOrderCommand, HistoryCommand, OwnerKey, RequestValidator,
};
