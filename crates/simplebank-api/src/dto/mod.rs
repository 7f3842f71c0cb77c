//! Request and response bodies

pub mod auth;
pub mod card;
pub mod loan;
pub mod transaction;

pub use auth::*;
pub use card::*;
pub use loan::*;
pub use transaction::*;
