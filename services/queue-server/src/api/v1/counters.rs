//! Counter API endpoints: creation, listing, manual assignment.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::domain::{Counter, CounterId, TokenNumber};
use crate::notify::assigned_message;
use crate::state::AppState;

use super::tokens::TokenResponse;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_counter).get(list_counters))
        .route("/{counter_id}/assign", post(assign_next))
}

// =============================================================================
// Request/Response Types
// =============================================================================

/// Request to create a counter.
#[derive(Debug, Deserialize)]
pub struct CreateCounterRequest {
    pub name: String,
}

/// A counter as exposed over the API.
#[derive(Debug, Serialize)]
pub struct CounterResponse {
    pub id: CounterId,
    pub name: String,
    pub is_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_token: Option<TokenNumber>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_completed_at: Option<DateTime<Utc>>,
}

impl From<Counter> for CounterResponse {
    fn from(counter: Counter) -> Self {
        Self {
            id: counter.id,
            name: counter.name,
            is_available: counter.is_available,
            current_token: counter.current_token,
            last_completed_at: counter.last_completed_at,
        }
    }
}

/// Response for listing counters.
#[derive(Debug, Serialize)]
pub struct ListCountersResponse {
    pub items: Vec<CounterResponse>,
}

/// Response for a manual assignment.
#[derive(Debug, Serialize)]
pub struct AssignResponse {
    /// The assigned token, or null when nothing is servable right now.
    pub assigned: Option<TokenResponse>,
}

// =============================================================================
// Handlers
// =============================================================================

async fn create_counter(
    State(state): State<AppState>,
    Json(req): Json<CreateCounterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::bad_request(
            "invalid_counter_name",
            "name must not be empty",
        ));
    }

    let counter = state.store().create_counter(name).await?;
    Ok((StatusCode::CREATED, Json(CounterResponse::from(counter))))
}

async fn list_counters(
    State(state): State<AppState>,
) -> Result<Json<ListCountersResponse>, ApiError> {
    let counters = state.store().counters().await?;
    Ok(Json(ListCountersResponse {
        items: counters.into_iter().map(CounterResponse::from).collect(),
    }))
}

async fn assign_next(
    State(state): State<AppState>,
    Path(counter_id): Path<CounterId>,
) -> Result<Json<AssignResponse>, ApiError> {
    let assigned = state.scheduler().assign_single(counter_id).await?;

    if let Some(token) = &assigned {
        if let Some(phone) = token.phone_number.as_deref() {
            let counter_name = state
                .store()
                .counter(counter_id)
                .await?
                .map(|c| c.name)
                .unwrap_or_else(|| format!("{counter_id}"));
            let started_at = token.started_serving.unwrap_or_else(Utc::now);
            let message = assigned_message(
                &token.customer_name,
                token.token_number,
                &counter_name,
                started_at,
            );
            state.notifier().notify(phone, &message).await;
        }
    }

    Ok(Json(AssignResponse {
        assigned: assigned.map(TokenResponse::from),
    }))
}
