//! Customer notifications.
//!
//! Delivery is best-effort and side-effect only: a failed or skipped SMS is
//! logged and discarded, and never blocks or fails a queue transition. The
//! core never retries; that is the provider's concern.

mod messages;
mod twilio;

pub use messages::{assigned_message, collected_message, confirmation_message, next_in_line_message};
pub use twilio::TwilioNotifier;

use async_trait::async_trait;
use tracing::debug;

/// Boundary contract for SMS delivery.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send a message. Returns whether delivery was accepted by the
    /// provider; callers may ignore the result.
    async fn notify(&self, destination: &str, message: &str) -> bool;
}

/// Notifier used when SMS is disabled; logs instead of sending.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, destination: &str, _message: &str) -> bool {
        debug!(destination, "SMS disabled; dropping notification");
        false
    }
}
