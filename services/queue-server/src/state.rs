//! Application state shared across request handlers.

use std::sync::Arc;

use crate::notify::Notifier;
use crate::queue::Scheduler;
use crate::store::QueueStore;

/// Shared application state.
///
/// Passed to all request handlers via Axum's state extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    store: Arc<dyn QueueStore>,
    scheduler: Arc<Scheduler>,
    notifier: Arc<dyn Notifier>,
    per_token_minutes: u32,
}

impl AppState {
    pub fn new(
        store: Arc<dyn QueueStore>,
        scheduler: Arc<Scheduler>,
        notifier: Arc<dyn Notifier>,
        per_token_minutes: u32,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                store,
                scheduler,
                notifier,
                per_token_minutes,
            }),
        }
    }

    pub fn store(&self) -> &dyn QueueStore {
        self.inner.store.as_ref()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    pub fn notifier(&self) -> &dyn Notifier {
        self.inner.notifier.as_ref()
    }

    pub fn per_token_minutes(&self) -> u32 {
        self.inner.per_token_minutes
    }
}
