//! API v1 routes.

mod counters;
mod queue;
mod tokens;

use axum::Router;

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/tokens", tokens::routes())
        .nest("/counters", counters::routes())
        .nest("/queue", queue::routes())
}
