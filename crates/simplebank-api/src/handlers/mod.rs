//! Request handlers

pub mod accounts;
pub mod analytics;
pub mod auth;
pub mod cards;
pub mod health;
pub mod loans;
pub mod transactions;
