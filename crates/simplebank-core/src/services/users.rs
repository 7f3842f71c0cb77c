//! Registration and login

use serde::Deserialize;
use simplebank_auth::{AuthError, IssuedToken, JwtService, PasswordService};
use simplebank_db::{DbError, Repository};
use simplebank_types::{Clock, User};
use std::sync::Arc;

use crate::error::{BankError, BankResult};
use crate::notifier::{notify_in_background, welcome_body, Notifier, WELCOME_SUBJECT};

/// Registration input
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// A successful login
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: User,
    pub token: IssuedToken,
}

pub struct UserService {
    repo: Arc<dyn Repository>,
    passwords: Arc<PasswordService>,
    jwt: Arc<JwtService>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl UserService {
    pub fn new(
        repo: Arc<dyn Repository>,
        passwords: Arc<PasswordService>,
        jwt: Arc<JwtService>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repo,
            passwords,
            jwt,
            notifier,
            clock,
        }
    }

    /// Create a user and send the welcome mail in the background
    pub async fn register(&self, input: NewUser) -> BankResult<User> {
        let username = input.username.trim();
        let email = input.email.trim();

        if username.is_empty() {
            return Err(BankError::validation("Username is required"));
        }
        if email.is_empty() {
            return Err(BankError::validation("Email is required"));
        }
        if !email.contains('@') {
            return Err(BankError::validation("Invalid email address"));
        }
        if input.password.is_empty() {
            return Err(BankError::validation("Password is required"));
        }

        let password_hash = self.passwords.hash_password(&input.password)?;
        let user = User::new(
            username.to_string(),
            email.to_string(),
            password_hash,
            self.clock.now(),
        );

        self.repo.add_user(&user).await.map_err(|e| match e {
            DbError::Duplicate(_) => BankError::Conflict("Username or email already taken".to_string()),
            other => other.into(),
        })?;

        tracing::info!(user_id = %user.id, username = %user.username, "User registered");

        notify_in_background(
            self.notifier.clone(),
            user.email.clone(),
            WELCOME_SUBJECT.to_string(),
            welcome_body(&user.username),
        );

        Ok(user)
    }

    /// Check credentials and sign a token
    ///
    /// An unknown username and a wrong password are indistinguishable.
    pub async fn login(&self, username: &str, password: &str) -> BankResult<LoginOutcome> {
        let user = self
            .repo
            .get_user_by_username(username.trim())
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let valid = self
            .passwords
            .verify_password(password, &user.password_hash)
            .unwrap_or(false);
        if !valid {
            tracing::debug!(user_id = %user.id, "Login rejected");
            return Err(AuthError::InvalidCredentials.into());
        }

        let token = self.jwt.issue_token(user.id)?;
        tracing::info!(user_id = %user.id, "User logged in");

        Ok(LoginOutcome { user, token })
    }
}
