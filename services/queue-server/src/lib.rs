//! Queue management service.
//!
//! Customers obtain numbered tokens, staff assign tokens to service
//! counters under a fairness-bounded policy, and customers receive SMS
//! updates. See `queue` for the scheduler core and `store` for the
//! repository boundary.

pub mod api;
pub mod config;
pub mod domain;
pub mod notify;
pub mod queue;
pub mod state;
pub mod store;
