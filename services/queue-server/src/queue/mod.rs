//! Queue core: token lifecycle transitions and the assignment scheduler.

mod lifecycle;
mod scheduler;
pub mod worker;

pub use lifecycle::Lifecycle;
pub use scheduler::{CycleStats, Scheduler};
pub use worker::SchedulerWorker;

use thiserror::Error;

use crate::domain::{CounterId, TokenNumber};
use crate::store::StoreError;

/// Result type for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Errors from lifecycle transitions and scheduling.
///
/// `NotServable` is flow control, not a fault: callers on the periodic and
/// manual paths treat "nothing servable right now" as routine.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("token #{0} is not servable under the fairness rule")]
    NotServable(TokenNumber),

    #[error("counter {0} is busy or does not exist")]
    CounterUnavailable(CounterId),

    #[error("token #{0} has already been completed")]
    AlreadyCompleted(TokenNumber),

    #[error("token #{0} not found")]
    TokenNotFound(TokenNumber),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
