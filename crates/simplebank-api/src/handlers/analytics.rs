//! Account history, summaries and forecasts

use axum::{
    extract::{Path, State},
    Json,
};
use simplebank_core::{BalanceForecast, FinancialSummary};
use simplebank_types::JournalEntry;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::extractors::CurrentUser;
use crate::state::AppState;

/// GET /api/analytics/transactions/:account_id
pub async fn account_transactions(
    State(state): State<Arc<AppState>>,
    CurrentUser(principal): CurrentUser,
    Path(account_id): Path<Uuid>,
) -> ApiResult<Json<Vec<JournalEntry>>> {
    let entries = state
        .services
        .transactions
        .history(&principal, account_id)
        .await?;
    Ok(Json(entries))
}

/// GET /api/analytics/summary/:user_id
pub async fn financial_summary(
    State(state): State<Arc<AppState>>,
    CurrentUser(principal): CurrentUser,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<FinancialSummary>> {
    let summary = state.services.analytics.summary(&principal, user_id).await?;
    Ok(Json(summary))
}

/// GET /api/analytics/forecast
pub async fn balance_forecast(
    State(state): State<Arc<AppState>>,
    CurrentUser(principal): CurrentUser,
) -> ApiResult<Json<BalanceForecast>> {
    let forecast = state.services.analytics.forecast(&principal).await?;
    Ok(Json(forecast))
}
