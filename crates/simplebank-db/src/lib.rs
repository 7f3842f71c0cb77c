//! Simple Bank Database Layer
//!
//! Persistence for users, accounts, cards, loans and the money journal.
//!
//! # Architecture
//!
//! - [`Repository`]: the transactional contract every service and the
//!   billing worker talk to
//! - [`PgRepository`]: PostgreSQL with row-level locks
//! - [`MemoryRepository`]: a single-mutex store for tests and demos
//!
//! Both backends enforce the same rules: balances never go negative, money
//! movements and their journal entries commit together, and an installment
//! is settled at most once.

pub mod config;
pub mod error;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod repository;

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

pub use config::DatabaseConfig;
pub use error::{DbError, DbResult};
pub use memory::MemoryRepository;
pub use postgres::PgRepository;
pub use repository::{Posting, Repository};

/// PostgreSQL connection pool
pub struct Database {
    pub pg: PgPool,
}

impl Database {
    /// Connect to PostgreSQL
    pub async fn connect(config: &DatabaseConfig) -> DbResult<Self> {
        info!("Connecting to PostgreSQL: {}", config.url_masked());

        let pg = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(std::time::Duration::from_secs(config.acquire_timeout_secs))
            .connect(&config.url)
            .await
            .map_err(|e| DbError::Connection(format!("PostgreSQL: {}", e)))?;

        info!("Connected to PostgreSQL");
        Ok(Self { pg })
    }

    /// Run embedded migrations
    pub async fn migrate(&self) -> DbResult<()> {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations")
            .run(&self.pg)
            .await
            .map_err(|e| DbError::Migration(e.to_string()))?;
        info!("Migrations complete");
        Ok(())
    }

    /// Repository over this pool
    pub fn repository(&self) -> PgRepository {
        PgRepository::new(self.pg.clone())
    }
}
