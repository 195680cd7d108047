//! Assignment scheduler.
//!
//! Pairs free counters with the next fairly-servable token and sweeps for
//! serving sessions that exceeded the maximum serving time. Entered both by
//! the periodic worker ([`run_cycle`](Scheduler::run_cycle)) and by manual
//! staff actions ([`assign_single`](Scheduler::assign_single),
//! [`complete`](Scheduler::complete)).

use std::sync::Arc;

use chrono::Utc;
use tokenq_fairness::{FairnessPolicy, ServingDeadline};
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::domain::{Counter, CounterId, Token, TokenNumber};
use crate::store::QueueStore;

use super::{Lifecycle, QueueError, QueueResult};

/// Statistics from one scheduling cycle.
#[derive(Debug, Default, Clone, Copy)]
pub struct CycleStats {
    pub assigned: u32,
    pub timed_out: u32,
}

pub struct Scheduler {
    store: Arc<dyn QueueStore>,
    lifecycle: Lifecycle,
    policy: FairnessPolicy,
    deadline: ServingDeadline,
    // Serializes every select+transition sequence. The periodic cycle and
    // manual staff actions may race on the same token or counter; exactly
    // one may win. Contention is human-paced, so one global lock is enough.
    assign_lock: Mutex<()>,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn QueueStore>,
        policy: FairnessPolicy,
        deadline: ServingDeadline,
    ) -> Self {
        let lifecycle = Lifecycle::new(store.clone(), policy);
        Self {
            store,
            lifecycle,
            policy,
            deadline,
            assign_lock: Mutex::new(()),
        }
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// Issue a new waiting token. The store allocates the number, so no
    /// assignment lock is needed.
    pub async fn issue_token(
        &self,
        customer_name: &str,
        phone_number: Option<&str>,
    ) -> QueueResult<Token> {
        let token = self.store.create_token(customer_name, phone_number).await?;
        info!(
            token_number = token.token_number,
            "Issued token to {}", token.customer_name
        );
        Ok(token)
    }

    /// Peek at the next fairly-servable token without assigning it.
    pub async fn next_servable(&self) -> QueueResult<Option<Token>> {
        self.next_servable_snapshot().await
    }

    async fn next_servable_snapshot(&self) -> QueueResult<Option<Token>> {
        let waiting = self.store.waiting_tokens().await?;
        let numbers: Vec<TokenNumber> = waiting.iter().map(|t| t.token_number).collect();
        let Some(picked) = self.policy.next_servable(&numbers) else {
            return Ok(None);
        };
        Ok(waiting.into_iter().find(|t| t.token_number == picked))
    }

    /// One full scheduling cycle: an assignment pass over every free
    /// counter, then a sweep force-completing overdue serving sessions.
    /// The sweep runs even when no counter is free.
    #[instrument(skip(self))]
    pub async fn run_cycle(&self) -> QueueResult<CycleStats> {
        let _guard = self.assign_lock.lock().await;
        let mut stats = CycleStats::default();

        for counter in self.store.available_counters().await? {
            match self.assign_to_counter(&counter).await {
                Ok(Some(token)) => {
                    info!(
                        token_number = token.token_number,
                        counter_id = counter.id,
                        counter = %counter.name,
                        "Assigned token to counter"
                    );
                    stats.assigned += 1;
                }
                // Nothing servable; later counters would see the same queue.
                Ok(None) => break,
                Err(e) => {
                    warn!(counter_id = counter.id, error = %e, "Failed to assign counter");
                }
            }
        }

        stats.timed_out = self.sweep_overdue().await?;

        if stats.assigned > 0 || stats.timed_out > 0 {
            info!(
                assigned = stats.assigned,
                timed_out = stats.timed_out,
                "Scheduling cycle complete"
            );
        }

        Ok(stats)
    }

    /// Manually assign the next servable token to one counter.
    ///
    /// Fails with [`QueueError::CounterUnavailable`] when the counter does
    /// not exist or is busy. Returns `None` when nothing is servable, a
    /// routine outcome for the caller.
    pub async fn assign_single(&self, counter_id: CounterId) -> QueueResult<Option<Token>> {
        let _guard = self.assign_lock.lock().await;

        let counter = self
            .store
            .counter(counter_id)
            .await?
            .filter(|c| c.is_available)
            .ok_or(QueueError::CounterUnavailable(counter_id))?;

        self.assign_to_counter(&counter).await
    }

    /// Mark a token served and free its counter.
    pub async fn complete(&self, token_number: TokenNumber) -> QueueResult<Token> {
        let _guard = self.assign_lock.lock().await;

        let token = self
            .store
            .token(token_number)
            .await?
            .ok_or(QueueError::TokenNotFound(token_number))?;
        self.lifecycle.complete_serving(&token).await
    }

    /// Administrative full clear: every token deleted, every counter made
    /// available, token numbering re-seeded to 1.
    pub async fn reset(&self) -> QueueResult<()> {
        let _guard = self.assign_lock.lock().await;

        self.store.delete_all_tokens().await?;
        self.store.reset_counters().await?;
        info!("Queue reset; token numbering restarts from 1");
        Ok(())
    }

    // Caller holds the assignment lock.
    async fn assign_to_counter(&self, counter: &Counter) -> QueueResult<Option<Token>> {
        let Some(token) = self.next_servable_snapshot().await? else {
            return Ok(None);
        };
        let (token, _) = self.lifecycle.start_serving(&token, counter).await?;
        Ok(Some(token))
    }

    // Caller holds the assignment lock.
    async fn sweep_overdue(&self) -> QueueResult<u32> {
        let now = Utc::now();
        let mut timed_out = 0;

        for token in self.store.serving_tokens().await? {
            let Some(started) = token.started_serving else {
                continue;
            };
            if !self.deadline.is_overdue(started, now) {
                continue;
            }
            match self.lifecycle.complete_serving(&token).await {
                Ok(_) => {
                    warn!(
                        token_number = token.token_number,
                        "Auto-completed token after exceeding max serving time"
                    );
                    timed_out += 1;
                }
                Err(e) => {
                    warn!(token_number = token.token_number, error = %e, "Failed to auto-complete token");
                }
            }
        }

        Ok(timed_out)
    }
}
