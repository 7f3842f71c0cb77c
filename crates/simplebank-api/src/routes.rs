//! Route table

use axum::{
    routing::{get, post},
    Router,
};
use simplebank_auth::AuthLayer;
use std::sync::Arc;

use crate::handlers;
use crate::state::AppState;

/// Unauthenticated endpoints
pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login))
}

/// Endpoints under `/api`, all behind the token check
pub fn api_routes(state: &AppState) -> Router<Arc<AppState>> {
    Router::new()
        .route("/accounts", post(handlers::accounts::create_account))
        .route(
            "/users/:user_id/accounts",
            get(handlers::accounts::list_user_accounts),
        )
        .route("/cards", post(handlers::cards::issue_card))
        .route(
            "/accounts/:account_id/cards",
            get(handlers::cards::list_account_cards),
        )
        .route("/payments/card", post(handlers::transactions::card_payment))
        .route("/transfers", post(handlers::transactions::transfer))
        .route("/deposits", post(handlers::transactions::deposit))
        .route("/loans", post(handlers::loans::apply_for_loan))
        .route("/loans/:loan_id/schedule", get(handlers::loans::loan_schedule))
        .nest("/analytics", analytics_routes())
        .layer(AuthLayer::new(state.jwt.clone()))
}

fn analytics_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/transactions/:account_id",
            get(handlers::analytics::account_transactions),
        )
        .route("/summary/:user_id", get(handlers::analytics::financial_summary))
        .route("/forecast", get(handlers::analytics::balance_forecast))
}
