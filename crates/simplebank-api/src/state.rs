//! Application state shared across handlers

use simplebank_auth::JwtService;
use simplebank_core::BankServices;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub services: BankServices,
    /// Token verification for the auth layer
    pub jwt: Arc<JwtService>,
}

impl AppState {
    pub fn new(services: BankServices, jwt: Arc<JwtService>) -> Self {
        Self { services, jwt }
    }
}
