//! Token lifecycle manager.
//!
//! Owns the legal state transitions of a single token. All token and
//! counter mutation goes through here; no other code path touches
//! `is_available`, `current_token`, or the token state directly.

use std::sync::Arc;

use chrono::Utc;
use tokenq_fairness::FairnessPolicy;
use tracing::warn;

use crate::domain::{Counter, Token, TokenState};
use crate::store::QueueStore;

use super::{QueueError, QueueResult};

pub struct Lifecycle {
    store: Arc<dyn QueueStore>,
    policy: FairnessPolicy,
}

impl Lifecycle {
    pub fn new(store: Arc<dyn QueueStore>, policy: FairnessPolicy) -> Self {
        Self { store, policy }
    }

    /// Check fairness eligibility against the current waiting set.
    ///
    /// A token is servable iff it is waiting and within the fairness window
    /// of the earliest waiting token.
    pub async fn is_fairly_servable(&self, token: &Token) -> QueueResult<bool> {
        if token.state != TokenState::Waiting {
            return Ok(false);
        }
        let waiting = self.store.waiting_tokens().await?;
        let earliest = waiting.first().map(|t| t.token_number);
        Ok(self.policy.is_within_window(token.token_number, earliest))
    }

    /// Transition a token to Serving at the given counter.
    ///
    /// Fails with [`QueueError::NotServable`] without mutating anything when
    /// the fairness check does not hold. On success the token and counter
    /// are persisted as one atomic pair. Callers must hold the scheduler's
    /// assignment lock so the eligibility check and the mutation are not
    /// interleaved with another assignment.
    pub async fn start_serving(
        &self,
        token: &Token,
        counter: &Counter,
    ) -> QueueResult<(Token, Counter)> {
        if !self.is_fairly_servable(token).await? {
            return Err(QueueError::NotServable(token.token_number));
        }

        let now = Utc::now();
        let mut token = token.clone();
        token.state = TokenState::Serving;
        token.started_serving = Some(now);
        token.assigned_counter = Some(counter.id);

        let mut counter = counter.clone();
        counter.is_available = false;
        counter.current_token = Some(token.token_number);

        self.store.save_assignment(&token, &counter).await?;
        Ok((token, counter))
    }

    /// Transition a token to Completed and free its counter.
    ///
    /// Fails with [`QueueError::AlreadyCompleted`] on a completed token, so
    /// a counter can never be double-freed and `completed_serving` is never
    /// overwritten.
    pub async fn complete_serving(&self, token: &Token) -> QueueResult<Token> {
        if token.state == TokenState::Completed {
            return Err(QueueError::AlreadyCompleted(token.token_number));
        }

        let now = Utc::now();
        let mut token = token.clone();
        token.state = TokenState::Completed;
        token.completed_serving = Some(now);
        let assigned = token.assigned_counter.take();

        match assigned {
            Some(counter_id) => match self.store.counter(counter_id).await? {
                Some(mut counter) => {
                    counter.is_available = true;
                    counter.current_token = None;
                    counter.last_completed_at = Some(now);
                    self.store.save_assignment(&token, &counter).await?;
                }
                None => {
                    warn!(
                        token_number = token.token_number,
                        counter_id, "Assigned counter no longer exists; completing token anyway"
                    );
                    self.store.save_token(&token).await?;
                }
            },
            None => self.store.save_token(&token).await?,
        }

        Ok(token)
    }
}
