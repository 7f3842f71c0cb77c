//! Cards

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use simplebank_types::MaskedCard;
use std::sync::Arc;
use uuid::Uuid;

use crate::dto::{CardIssuedResponse, CreateCardRequest};
use crate::error::ApiResult;
use crate::extractors::{CurrentUser, ValidatedJson};
use crate::state::AppState;

/// POST /api/cards
pub async fn issue_card(
    State(state): State<Arc<AppState>>,
    CurrentUser(principal): CurrentUser,
    ValidatedJson(request): ValidatedJson<CreateCardRequest>,
) -> ApiResult<(StatusCode, Json<CardIssuedResponse>)> {
    let card = state
        .services
        .cards
        .issue(&principal, request.account_id)
        .await?;
    Ok((StatusCode::CREATED, Json(card.into())))
}

/// GET /api/accounts/:account_id/cards
pub async fn list_account_cards(
    State(state): State<Arc<AppState>>,
    CurrentUser(principal): CurrentUser,
    Path(account_id): Path<Uuid>,
) -> ApiResult<Json<Vec<MaskedCard>>> {
    let cards = state.services.cards.list(&principal, account_id).await?;
    Ok(Json(cards))
}
