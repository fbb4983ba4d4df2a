//! # Routes
//!
//! - `POST /events`: provider webhook intake
//! - `GET /receipts/{token_id}`: tiered verification

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use receipt_vault::{EventOutcome, TokenId, VerificationResult};

use crate::error::ApiError;
use crate::state::AppState;

/// Acknowledgement of a webhook delivery.
#[derive(Debug, Serialize)]
pub struct EventAck {
    pub received: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_id: Option<TokenId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected: Option<String>,
}

/// Build the vault router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/events", post(receive_event))
        .route("/receipts/{token_id}", get(verify_receipt))
}

async fn receive_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<EventAck>, ApiError> {
    let signature = headers
        .get(&state.signature_header)
        .and_then(|v| v.to_str().ok());

    let ack = match state.vault.handle_event(&body, signature).await? {
        EventOutcome::Ignored => EventAck {
            received: true,
            token_id: None,
            rejected: None,
        },
        EventOutcome::Issued(commitment) => EventAck {
            received: true,
            token_id: Some(commitment.token_id),
            rejected: None,
        },
        EventOutcome::Rejected(reason) => EventAck {
            received: true,
            token_id: None,
            rejected: Some(reason),
        },
    };
    Ok(Json(ack))
}

async fn verify_receipt(
    State(state): State<AppState>,
    Path(token_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<VerificationResult>, ApiError> {
    // No ledger entry can carry an unparseable id.
    let token_id: TokenId = token_id
        .parse()
        .map_err(|_| ApiError::NotFound(format!("token {token_id}")))?;

    // A header that is not valid UTF-8 still counts as a presented credential.
    let authorization = headers
        .get(AUTHORIZATION)
        .map(|v| v.to_str().unwrap_or_default());

    let result = state
        .vault
        .verify(token_id, authorization)
        .await?;

    match result {
        VerificationResult::Unauthorized { .. } => Err(ApiError::Unauthorized),
        result => Ok(Json(result)),
    }
}
