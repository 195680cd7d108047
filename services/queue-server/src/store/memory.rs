//! In-memory queue store for dev mode and tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tokenq_fairness::{counter_rank_key, rank_free_counters};

use crate::domain::{Counter, CounterId, Token, TokenNumber, TokenState};

use super::{QueueStore, StoreError};

#[derive(Default)]
struct MemoryInner {
    next_token_number: i64,
    next_counter_id: i64,
    tokens: BTreeMap<TokenNumber, Token>,
    counters: BTreeMap<CounterId, Counter>,
}

/// In-process store. A single mutex over the whole queue state makes every
/// operation, including the coupled token+counter write, atomic.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn tokens_where<F>(&self, pred: F) -> Vec<Token>
    where
        F: Fn(&Token) -> bool,
    {
        let inner = self.inner.lock().await;
        inner.tokens.values().filter(|t| pred(t)).cloned().collect()
    }
}

#[async_trait]
impl QueueStore for MemoryStore {
    async fn create_token(
        &self,
        customer_name: &str,
        phone_number: Option<&str>,
    ) -> Result<Token, StoreError> {
        let mut inner = self.inner.lock().await;
        inner.next_token_number += 1;
        let token = Token {
            token_number: inner.next_token_number,
            customer_name: customer_name.to_string(),
            phone_number: phone_number.map(str::to_string),
            issued_at: Utc::now(),
            state: TokenState::Waiting,
            started_serving: None,
            completed_serving: None,
            assigned_counter: None,
        };
        inner.tokens.insert(token.token_number, token.clone());
        Ok(token)
    }

    async fn token(&self, token_number: TokenNumber) -> Result<Option<Token>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.tokens.get(&token_number).cloned())
    }

    async fn waiting_tokens(&self) -> Result<Vec<Token>, StoreError> {
        // BTreeMap iteration is already ascending by token number.
        Ok(self.tokens_where(|t| t.state == TokenState::Waiting).await)
    }

    async fn serving_tokens(&self) -> Result<Vec<Token>, StoreError> {
        Ok(self.tokens_where(|t| t.state == TokenState::Serving).await)
    }

    async fn active_tokens(&self) -> Result<Vec<Token>, StoreError> {
        Ok(self
            .tokens_where(|t| t.state != TokenState::Completed)
            .await)
    }

    async fn served_tokens(&self, limit: i64) -> Result<Vec<Token>, StoreError> {
        let mut served = self
            .tokens_where(|t| t.state == TokenState::Completed)
            .await;
        served.sort_by(|a, b| b.issued_at.cmp(&a.issued_at));
        served.truncate(limit.max(0) as usize);
        Ok(served)
    }

    async fn waiting_ahead(&self, token_number: TokenNumber) -> Result<u64, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .tokens
            .values()
            .filter(|t| t.state != TokenState::Completed && t.token_number < token_number)
            .count() as u64)
    }

    async fn create_counter(&self, name: &str) -> Result<Counter, StoreError> {
        let mut inner = self.inner.lock().await;
        inner.next_counter_id += 1;
        let counter = Counter {
            id: inner.next_counter_id,
            name: name.to_string(),
            is_available: true,
            current_token: None,
            last_completed_at: None,
        };
        inner.counters.insert(counter.id, counter.clone());
        Ok(counter)
    }

    async fn counter(&self, id: CounterId) -> Result<Option<Counter>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.counters.get(&id).cloned())
    }

    async fn counters(&self) -> Result<Vec<Counter>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.counters.values().cloned().collect())
    }

    async fn available_counters(&self) -> Result<Vec<Counter>, StoreError> {
        let free: Vec<Counter> = {
            let inner = self.inner.lock().await;
            inner
                .counters
                .values()
                .filter(|c| c.is_available)
                .cloned()
                .collect()
        };
        Ok(rank_free_counters(free, |c| {
            counter_rank_key(c.last_completed_at, c.id)
        }))
    }

    async fn save_token(&self, token: &Token) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.tokens.insert(token.token_number, token.clone());
        Ok(())
    }

    async fn save_assignment(&self, token: &Token, counter: &Counter) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.tokens.insert(token.token_number, token.clone());
        inner.counters.insert(counter.id, counter.clone());
        Ok(())
    }

    async fn delete_all_tokens(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.tokens.clear();
        inner.next_token_number = 0;
        Ok(())
    }

    async fn reset_counters(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        for counter in inner.counters.values_mut() {
            counter.is_available = true;
            counter.current_token = None;
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn token_numbers_are_monotonic_from_one() {
        let store = MemoryStore::new();
        let a = store.create_token("Asha", None).await.unwrap();
        let b = store.create_token("Bilal", None).await.unwrap();
        assert_eq!(a.token_number, 1);
        assert_eq!(b.token_number, 2);
    }

    #[tokio::test]
    async fn delete_all_tokens_reseeds_numbering() {
        let store = MemoryStore::new();
        store.create_token("Asha", None).await.unwrap();
        store.create_token("Bilal", None).await.unwrap();
        store.delete_all_tokens().await.unwrap();
        let fresh = store.create_token("Chitra", None).await.unwrap();
        assert_eq!(fresh.token_number, 1);
    }

    #[tokio::test]
    async fn available_counters_ranked_oldest_idle_first() {
        let store = MemoryStore::new();
        let a = store.create_counter("Counter A").await.unwrap();
        let b = store.create_counter("Counter B").await.unwrap();

        // Counter A has completed once; B has never been used.
        let mut used = a.clone();
        used.last_completed_at = Some(Utc::now());
        let token = store.create_token("Asha", None).await.unwrap();
        store.save_assignment(&token, &used).await.unwrap();

        let ranked = store.available_counters().await.unwrap();
        let ids: Vec<i64> = ranked.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![b.id, a.id]);
    }
}
