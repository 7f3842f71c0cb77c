//! Simple Bank Server
//!
//! Serves the banking REST API and runs the loan billing worker in the
//! same process.
//!
//! # Usage
//!
//! ```bash
//! # PostgreSQL storage, keys from the environment
//! JWT_SECRET=... CARD_HMAC_KEY=... CARD_PUBLIC_KEY_PATH=card.pub.pem simplebank-server
//!
//! # Throwaway in-memory instance
//! simplebank-server --storage memory
//!
//! # Nested overrides
//! SIMPLEBANK__SERVER__PORT=9000 simplebank-server --config bank.toml
//! ```

mod config;

use std::sync::Arc;

use chrono::Utc;
use clap::Parser;
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use simplebank_api::{create_router, ApiConfig, AppState};
use simplebank_auth::{JwtService, PasswordService};
use simplebank_core::{
    notifier_from_config, BankDeps, BankServices, BillingWorker, CachedKeyRateProvider,
    CbrKeyRateProvider, KeyRateProvider,
};
use simplebank_crypto::{CardCipher, CardMac, RsaCardCipher};
use simplebank_db::{Database, MemoryRepository, Repository};
use simplebank_types::{Clock, SystemClock};

use crate::config::{CardKeySettings, LoggingConfig, ServerConfig, StorageBackend};

/// Key size for the throwaway card key pair of in-memory instances
const EPHEMERAL_KEY_BITS: usize = 2048;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Simple Bank - accounts, cards, transfers and loans over HTTP
#[derive(Parser, Debug)]
#[command(name = "simplebank-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML, JSON, or YAML)
    #[arg(short, long, env = "SIMPLEBANK_CONFIG")]
    config: Option<String>,

    /// Host to bind to
    #[arg(long, env = "SIMPLEBANK_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "SIMPLEBANK_PORT")]
    port: Option<u16>,

    /// Storage backend
    #[arg(long, env = "SIMPLEBANK_STORAGE", value_enum)]
    storage: Option<StorageBackend>,

    /// Apply database migrations before serving
    #[arg(long, env = "SIMPLEBANK_MIGRATE")]
    migrate: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "SIMPLEBANK_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format (json, pretty)
    #[arg(long, env = "SIMPLEBANK_LOG_FORMAT")]
    log_format: Option<String>,
}

impl Args {
    fn apply(self, config: &mut ServerConfig) {
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(storage) = self.storage {
            config.storage.backend = storage;
        }
        if self.migrate {
            config.storage.migrate = true;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
        if let Some(format) = self.log_format {
            config.logging.format = format;
        }
    }
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut server_config = ServerConfig::load(args.config.as_deref())?;
    args.apply(&mut server_config);

    init_logging(&server_config.logging);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        storage = ?server_config.storage.backend,
        "Starting Simple Bank server"
    );

    server_config.validate()?;

    let repo = init_repository(&server_config).await?;
    let cipher = init_cipher(&server_config.cards, server_config.storage.backend)?;
    let jwt = Arc::new(JwtService::new(server_config.auth.jwt.clone()));

    let upstream = CbrKeyRateProvider::new(&server_config.rates)?;
    let rates: Arc<dyn KeyRateProvider> = Arc::new(CachedKeyRateProvider::new(
        Arc::new(upstream),
        server_config.rates.cache_ttl,
    ));

    let notifier = notifier_from_config(&server_config.smtp)?;
    if !server_config.smtp.is_configured() {
        tracing::warn!("SMTP relay not configured, notifications will only be logged");
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let services = BankServices::new(BankDeps {
        repo: repo.clone(),
        clock: clock.clone(),
        passwords: Arc::new(PasswordService::new(server_config.auth.password.clone())),
        jwt: jwt.clone(),
        cipher,
        mac: Arc::new(CardMac::new(server_config.cards.hmac_key.as_bytes())),
        rates: rates.clone(),
        notifier,
        config: server_config.bank.clone(),
    });

    // Warm the cache; a failure here only means loans start on the fallback base
    let today = Utc::now().date_naive();
    match rates.key_rate(today).await {
        Ok(rate) => tracing::info!(%rate, "Key rate loaded"),
        Err(e) => tracing::warn!(
            error = %e,
            fallback = %server_config.bank.fallback_base_rate,
            "Key rate unavailable, loans will use the fallback base rate"
        ),
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = if server_config.worker.enabled {
        let worker = BillingWorker::new(
            repo.clone(),
            services.loans.clone(),
            clock,
            server_config.worker.period,
        );
        Some(tokio::spawn(worker.run(shutdown_rx)))
    } else {
        tracing::info!("Billing worker disabled");
        None
    };

    let state = Arc::new(AppState::new(services, jwt));
    let api_config = ApiConfig {
        request_timeout: server_config.server.request_timeout,
        enable_cors: server_config.server.enable_cors,
        enable_tracing: true,
    };
    let app = create_router(state, api_config);

    let addr = server_config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(%addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if let Some(handle) = worker {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Billing worker terminated abnormally");
        }
    }

    tracing::info!("Server shutdown complete");

    Ok(())
}

// =============================================================================
// Initialization Functions
// =============================================================================

fn init_logging(config: &LoggingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    match config.format.as_str() {
        "json" => {
            subscriber
                .with(fmt::layer().json().with_target(true))
                .init();
        }
        _ => {
            subscriber
                .with(fmt::layer().pretty().with_target(true))
                .init();
        }
    }
}

async fn init_repository(config: &ServerConfig) -> anyhow::Result<Arc<dyn Repository>> {
    match config.storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage, all data is lost on exit");
            Ok(Arc::new(MemoryRepository::new()))
        }
        StorageBackend::Postgres => {
            tracing::info!(url = %config.database.url_masked(), "Connecting to database...");

            let db = Database::connect(&config.database).await?;
            if config.storage.migrate {
                db.migrate().await?;
                tracing::info!("Database migrations applied");
            }

            Ok(Arc::new(db.repository()))
        }
    }
}

fn init_cipher(
    keys: &CardKeySettings,
    backend: StorageBackend,
) -> anyhow::Result<Arc<dyn CardCipher>> {
    match &keys.public_key_path {
        Some(public) => {
            let cipher = RsaCardCipher::from_files(public, keys.private_key_path.as_deref())?;
            if keys.private_key_path.is_none() {
                tracing::warn!("No card private key, card listings will be fully masked");
            }
            Ok(Arc::new(cipher))
        }
        None if backend == StorageBackend::Memory => {
            tracing::warn!("No card key configured, generating an ephemeral key pair");
            Ok(Arc::new(RsaCardCipher::generate(EPHEMERAL_KEY_BITS)?))
        }
        None => anyhow::bail!("CARD_PUBLIC_KEY_PATH is required with PostgreSQL storage"),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, starting graceful shutdown"),
        _ = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}
