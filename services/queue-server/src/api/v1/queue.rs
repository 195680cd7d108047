//! Administrative queue operations.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::post, Router};

use crate::api::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/reset", post(reset_queue))
}

/// Clear all tokens and free every counter. Token numbering restarts from 1.
async fn reset_queue(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    state.scheduler().reset().await?;
    Ok(StatusCode::NO_CONTENT)
}
