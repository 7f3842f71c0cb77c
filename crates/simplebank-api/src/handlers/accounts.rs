//! Accounts

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use simplebank_types::Account;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::extractors::CurrentUser;
use crate::state::AppState;

/// POST /api/accounts
pub async fn create_account(
    State(state): State<Arc<AppState>>,
    CurrentUser(principal): CurrentUser,
) -> ApiResult<(StatusCode, Json<Account>)> {
    let account = state.services.accounts.open(&principal).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

/// GET /api/users/:user_id/accounts
pub async fn list_user_accounts(
    State(state): State<Arc<AppState>>,
    CurrentUser(principal): CurrentUser,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Account>>> {
    let accounts = state.services.accounts.list(&principal, user_id).await?;
    Ok(Json(accounts))
}
