//! Deposits, transfers and card payments

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::dto::{CardPaymentRequest, DepositRequest, MovementResponse, TransferRequest};
use crate::error::ApiResult;
use crate::extractors::{CurrentUser, ValidatedJson};
use crate::state::AppState;

/// POST /api/deposits
pub async fn deposit(
    State(state): State<Arc<AppState>>,
    CurrentUser(principal): CurrentUser,
    ValidatedJson(request): ValidatedJson<DepositRequest>,
) -> ApiResult<Json<MovementResponse>> {
    let entry = state
        .services
        .transactions
        .deposit(&principal, request.account_id, request.amount)
        .await?;
    Ok(Json(MovementResponse::success(entry)))
}

/// POST /api/transfers
pub async fn transfer(
    State(state): State<Arc<AppState>>,
    CurrentUser(principal): CurrentUser,
    ValidatedJson(request): ValidatedJson<TransferRequest>,
) -> ApiResult<Json<MovementResponse>> {
    let entry = state
        .services
        .transactions
        .transfer(
            &principal,
            request.from_account_id,
            request.to_account_id,
            request.amount,
        )
        .await?;
    Ok(Json(MovementResponse::success(entry)))
}

/// POST /api/payments/card
pub async fn card_payment(
    State(state): State<Arc<AppState>>,
    CurrentUser(principal): CurrentUser,
    ValidatedJson(request): ValidatedJson<CardPaymentRequest>,
) -> ApiResult<Json<MovementResponse>> {
    let entry = state
        .services
        .transactions
        .card_payment(
            &principal,
            request.card_id,
            &request.cvv,
            request.amount,
            &request.merchant,
        )
        .await?;
    Ok(Json(MovementResponse::success(entry)))
}
