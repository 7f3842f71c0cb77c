//! Simple Bank Types - domain entities shared by every layer
//!
//! This crate defines:
//!
//! - Users, accounts and cards
//! - Loans and their amortization installments
//! - Journal entries describing every money movement
//! - Money rounding helpers (two decimals, banker's rounding)
//! - The authenticated [`Principal`] and the injectable [`Clock`]
//!
//! Identifiers are plain UUIDs so that rows map directly onto storage.

pub mod account;
pub mod card;
pub mod clock;
pub mod error;
pub mod journal;
pub mod loan;
pub mod money;
pub mod principal;
pub mod user;

pub use account::*;
pub use card::*;
pub use clock::*;
pub use error::*;
pub use journal::*;
pub use loan::*;
pub use money::*;
pub use principal::*;
pub use user::*;
