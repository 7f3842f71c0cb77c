//! Simple Bank Authentication
//!
//! - [`PasswordService`]: salted Argon2id hashing with an optional pepper
//! - [`JwtService`]: HS256 bearer tokens valid for 24 hours
//! - [`AuthLayer`]: tower middleware that turns a valid `Authorization`
//!   header into a [`simplebank_types::Principal`] request extension
//!
//! The password service also hashes card CVVs, which need the same
//! slow-hash properties as passwords.

pub mod config;
pub mod error;
pub mod jwt;
pub mod middleware;
pub mod password;

pub use config::{AuthConfig, JwtConfig, PasswordConfig};
pub use error::{AuthError, AuthResult};
pub use jwt::{IssuedToken, JwtService, TokenClaims};
pub use middleware::{AuthLayer, AuthMiddleware};
pub use password::PasswordService;
