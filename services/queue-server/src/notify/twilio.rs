//! Twilio SMS adapter.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::SmsConfig;

use super::Notifier;

const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";

/// Sends SMS through the Twilio Messages API.
///
/// Prefers a messaging service SID when configured, otherwise falls back to
/// a plain from-number.
pub struct TwilioNotifier {
    http: reqwest::Client,
    config: SmsConfig,
}

impl TwilioNotifier {
    pub fn new(config: SmsConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl Notifier for TwilioNotifier {
    async fn notify(&self, destination: &str, message: &str) -> bool {
        let to = format_destination(destination);

        let mut params: Vec<(&str, &str)> = vec![("To", &to), ("Body", message)];
        if let Some(sid) = self.config.messaging_service_sid.as_deref() {
            params.push(("MessagingServiceSid", sid));
        } else if let Some(from) = self.config.from_number.as_deref() {
            params.push(("From", from));
        } else {
            warn!("No Twilio messaging service SID or from-number configured; dropping SMS");
            return false;
        }

        let url = format!(
            "{TWILIO_API_BASE}/Accounts/{}/Messages.json",
            self.config.account_sid
        );

        let result = self
            .http
            .post(&url)
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&params)
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => {
                debug!(destination = %to, "SMS sent");
                true
            }
            Ok(resp) => {
                warn!(destination = %to, status = %resp.status(), "SMS rejected by provider");
                false
            }
            Err(e) => {
                warn!(destination = %to, error = %e, "SMS sending failed");
                false
            }
        }
    }
}

/// Bare 10-digit numbers get the Indian country prefix, matching how
/// customers enter their numbers at the kiosk.
fn format_destination(destination: &str) -> String {
    if destination.len() == 10 && destination.bytes().all(|b| b.is_ascii_digit()) {
        format!("+91{destination}")
    } else {
        destination.to_string()
    }
}
