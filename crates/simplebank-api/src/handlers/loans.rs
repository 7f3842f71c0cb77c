//! Loans

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use simplebank_types::{Installment, Loan};
use std::sync::Arc;
use uuid::Uuid;

use crate::dto::LoanRequest;
use crate::error::ApiResult;
use crate::extractors::{CurrentUser, ValidatedJson};
use crate::state::AppState;

/// POST /api/loans
pub async fn apply_for_loan(
    State(state): State<Arc<AppState>>,
    CurrentUser(principal): CurrentUser,
    ValidatedJson(request): ValidatedJson<LoanRequest>,
) -> ApiResult<(StatusCode, Json<Loan>)> {
    let loan = state
        .services
        .loans
        .apply(&principal, request.account_id, request.amount, request.term_months)
        .await?;
    Ok((StatusCode::CREATED, Json(loan)))
}

/// GET /api/loans/:loan_id/schedule
pub async fn loan_schedule(
    State(state): State<Arc<AppState>>,
    CurrentUser(principal): CurrentUser,
    Path(loan_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Installment>>> {
    let schedule = state.services.loans.schedule(&principal, loan_id).await?;
    Ok(Json(schedule))
}
