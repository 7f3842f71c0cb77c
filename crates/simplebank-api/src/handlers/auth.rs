//! Registration and login

use axum::{extract::State, http::StatusCode, Json};
use simplebank_core::NewUser;
use simplebank_types::User;
use std::sync::Arc;

use crate::dto::{LoginRequest, LoginResponse, RegisterRequest};
use crate::error::ApiResult;
use crate::extractors::ValidatedJson;
use crate::state::AppState;

/// POST /register
pub async fn register(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let user = state
        .services
        .users
        .register(NewUser {
            username: request.username,
            email: request.email,
            password: request.password,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /login
pub async fn login(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let outcome = state
        .services
        .users
        .login(&request.username, &request.password)
        .await?;

    Ok(Json(LoginResponse {
        message: "Login successful".to_string(),
        token: outcome.token.token,
        user_id: outcome.user.id,
        expires_at: outcome.token.expires_at,
    }))
}
