//! Token API endpoints: issuance, status, listing, completion.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokenq_fairness::estimated_wait_minutes;

use crate::api::error::ApiError;
use crate::domain::{Token, TokenNumber, TokenState};
use crate::notify::{collected_message, confirmation_message, next_in_line_message};
use crate::state::AppState;

/// Served-token listings show the most recent entries only.
const SERVED_LIST_LIMIT: i64 = 20;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(issue_token).get(list_tokens))
        .route("/{token_number}", get(token_status))
        .route("/{token_number}/complete", post(complete_token))
}

// =============================================================================
// Request/Response Types
// =============================================================================

/// Request to issue a new token.
#[derive(Debug, Deserialize)]
pub struct IssueTokenRequest {
    /// Customer display name.
    pub customer_name: String,

    /// Optional phone number for SMS updates.
    #[serde(default)]
    pub phone_number: Option<String>,
}

/// A token as exposed over the API.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token_number: TokenNumber,
    pub customer_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    pub state: TokenState,
    pub issued_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_serving: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_serving: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_counter: Option<i64>,
}

impl From<Token> for TokenResponse {
    fn from(token: Token) -> Self {
        Self {
            token_number: token.token_number,
            customer_name: token.customer_name,
            phone_number: token.phone_number,
            state: token.state,
            issued_at: token.issued_at,
            started_serving: token.started_serving,
            completed_serving: token.completed_serving,
            assigned_counter: token.assigned_counter,
        }
    }
}

/// Response for token issuance.
#[derive(Debug, Serialize)]
pub struct IssueTokenResponse {
    pub token: TokenResponse,
    pub tokens_ahead: u64,
    pub est_wait_minutes: u64,
}

/// Response for a token status query.
#[derive(Debug, Serialize)]
pub struct TokenStatusResponse {
    pub token: TokenResponse,

    /// Lowest active token number, i.e. the queue head.
    pub current_serving: Option<TokenNumber>,

    pub tokens_ahead: u64,
    pub est_wait_minutes: u64,
}

/// Query parameters for listing tokens.
#[derive(Debug, Deserialize)]
pub struct ListTokensQuery {
    /// "active" (default) or "served".
    pub state: Option<String>,
}

/// Response for listing tokens.
#[derive(Debug, Serialize)]
pub struct ListTokensResponse {
    pub items: Vec<TokenResponse>,
}

// =============================================================================
// Handlers
// =============================================================================

async fn issue_token(
    State(state): State<AppState>,
    Json(req): Json<IssueTokenRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let customer_name = req.customer_name.trim();
    if customer_name.is_empty() {
        return Err(ApiError::bad_request(
            "invalid_customer_name",
            "customer_name must not be empty",
        ));
    }

    let token = state
        .scheduler()
        .issue_token(customer_name, req.phone_number.as_deref())
        .await?;

    let tokens_ahead = state.store().waiting_ahead(token.token_number).await?;
    let est_wait_minutes = estimated_wait_minutes(tokens_ahead, state.per_token_minutes());

    if let Some(phone) = token.phone_number.as_deref() {
        let message =
            confirmation_message(&token.customer_name, token.token_number, est_wait_minutes);
        state.notifier().notify(phone, &message).await;
    }

    Ok((
        StatusCode::CREATED,
        Json(IssueTokenResponse {
            token: token.into(),
            tokens_ahead,
            est_wait_minutes,
        }),
    ))
}

async fn token_status(
    State(state): State<AppState>,
    Path(token_number): Path<TokenNumber>,
) -> Result<Json<TokenStatusResponse>, ApiError> {
    let token = state
        .store()
        .token(token_number)
        .await?
        .ok_or_else(|| ApiError::not_found("token_not_found", format!("token #{token_number} not found")))?;

    let current_serving = state
        .store()
        .active_tokens()
        .await?
        .first()
        .map(|t| t.token_number);
    let tokens_ahead = state.store().waiting_ahead(token_number).await?;
    let est_wait_minutes = estimated_wait_minutes(tokens_ahead, state.per_token_minutes());

    Ok(Json(TokenStatusResponse {
        token: token.into(),
        current_serving,
        tokens_ahead,
        est_wait_minutes,
    }))
}

async fn list_tokens(
    State(state): State<AppState>,
    Query(query): Query<ListTokensQuery>,
) -> Result<Json<ListTokensResponse>, ApiError> {
    let tokens = match query.state.as_deref() {
        None | Some("active") => state.store().active_tokens().await?,
        Some("served") => state.store().served_tokens(SERVED_LIST_LIMIT).await?,
        Some(other) => {
            return Err(ApiError::bad_request(
                "invalid_state_filter",
                format!("unknown state filter '{other}'; expected 'active' or 'served'"),
            ))
        }
    };

    Ok(Json(ListTokensResponse {
        items: tokens.into_iter().map(TokenResponse::from).collect(),
    }))
}

async fn complete_token(
    State(state): State<AppState>,
    Path(token_number): Path<TokenNumber>,
) -> Result<Json<TokenResponse>, ApiError> {
    let token = state.scheduler().complete(token_number).await?;

    if let Some(phone) = token.phone_number.as_deref() {
        let completed_at = token.completed_serving.unwrap_or_else(Utc::now);
        let message = collected_message(token.token_number, completed_at);
        state.notifier().notify(phone, &message).await;
    }

    // A counter just freed up; give the next fairly-servable customer a
    // heads-up with a fresh wait estimate.
    if let Some(next) = state.scheduler().next_servable().await? {
        if let Some(phone) = next.phone_number.as_deref() {
            let ahead = state.store().waiting_ahead(next.token_number).await?;
            let est = estimated_wait_minutes(ahead, state.per_token_minutes());
            let message = next_in_line_message(next.token_number, est);
            state.notifier().notify(phone, &message).await;
        }
    }

    Ok(Json(token.into()))
}
