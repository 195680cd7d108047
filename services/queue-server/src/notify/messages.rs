//! SMS message texts.

use chrono::{DateTime, Utc};

/// Sent when a token is issued.
pub fn confirmation_message(customer_name: &str, token_number: i64, est_wait_minutes: u64) -> String {
    format!(
        "Hi {customer_name}, your token #{token_number} is confirmed. \
         Estimated wait: {est_wait_minutes} minutes. \
         You will receive an update when a counter is assigned."
    )
}

/// Sent when a token is assigned to a counter.
pub fn assigned_message(
    customer_name: &str,
    token_number: i64,
    counter_name: &str,
    started_at: DateTime<Utc>,
) -> String {
    format!(
        "Hi {customer_name}, your token #{token_number} is now being served at \
         counter {counter_name}. Service started at {}. Please proceed soon.",
        started_at.format("%H:%M")
    )
}

/// Sent to the next fairly-servable token when a counter frees up.
pub fn next_in_line_message(token_number: i64, est_wait_minutes: u64) -> String {
    format!(
        "Update for token #{token_number}: a counter will be allotted soon. \
         Estimated wait: {est_wait_minutes} minutes. \
         Please be ready to proceed to the waiting area."
    )
}

/// Sent when a token has been served and collected.
pub fn collected_message(token_number: i64, completed_at: DateTime<Utc>) -> String {
    format!(
        "Your token #{token_number} has been served and collected at {}. \
         Thank you for visiting!",
        completed_at.format("%H:%M")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn confirmation_includes_token_and_wait() {
        let msg = confirmation_message("Asha", 7, 8);
        assert!(msg.contains("token #7"));
        assert!(msg.contains("8 minutes"));
    }

    #[test]
    fn assigned_includes_counter_and_time() {
        let at = Utc.with_ymd_and_hms(2026, 1, 5, 14, 30, 0).unwrap();
        let msg = assigned_message("Asha", 7, "Counter 2", at);
        assert!(msg.contains("counter Counter 2"));
        assert!(msg.contains("14:30"));
    }
}
