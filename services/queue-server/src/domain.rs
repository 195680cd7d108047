//! Core domain types for the token queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Token numbers double as identity and fairness priority key.
pub type TokenNumber = i64;

/// Counter identifier.
pub type CounterId = i64;

/// Serving lifecycle state of a token.
///
/// An explicit three-state machine; transitions only move forward and only
/// through the lifecycle manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenState {
    Waiting,
    Serving,
    Completed,
}

impl TokenState {
    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Serving => "serving",
            Self::Completed => "completed",
        }
    }

    /// Parse the storage representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "waiting" => Some(Self::Waiting),
            "serving" => Some(Self::Serving),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

impl std::fmt::Display for TokenState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A customer's queue ticket.
///
/// Invariants (enforced by the lifecycle manager):
/// - `started_serving` is set iff state ∈ {Serving, Completed}
/// - `completed_serving` is set iff state = Completed
/// - `assigned_counter` is set iff state = Serving
#[derive(Debug, Clone)]
pub struct Token {
    pub token_number: TokenNumber,
    pub customer_name: String,
    pub phone_number: Option<String>,
    pub issued_at: DateTime<Utc>,
    pub state: TokenState,
    pub started_serving: Option<DateTime<Utc>>,
    pub completed_serving: Option<DateTime<Utc>>,
    pub assigned_counter: Option<CounterId>,
}

/// A physical service point serving one token at a time.
///
/// `is_available` is false iff `current_token` is set; at most one token
/// references a counter at any time, enforced by the assignment routine.
#[derive(Debug, Clone)]
pub struct Counter {
    pub id: CounterId,
    pub name: String,
    pub is_available: bool,
    pub current_token: Option<TokenNumber>,
    pub last_completed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_round_trips_through_storage_form() {
        for state in [TokenState::Waiting, TokenState::Serving, TokenState::Completed] {
            assert_eq!(TokenState::parse(state.as_str()), Some(state));
        }
        assert_eq!(TokenState::parse("served"), None);
    }
}
