//! Server Configuration
//!
//! Layered: built-in defaults, then `config/default.toml`, then
//! `config/{SIMPLEBANK_ENV}.toml`, then an explicit `--config` file, then
//! `SIMPLEBANK__SECTION__KEY` environment variables. The flat variables
//! documented for deployment (`JWT_SECRET`, `DATABASE_URL`, ...) are applied
//! last.

use anyhow::{bail, Context};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use simplebank_auth::AuthConfig;
use simplebank_core::{BankConfig, RateProviderConfig, SmtpConfig, WorkerConfig};
use simplebank_db::DatabaseConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Minimum length of signing and MAC keys
const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ServerSettings,
    pub storage: StorageSettings,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub cards: CardKeySettings,
    pub smtp: SmtpConfig,
    pub rates: RateProviderConfig,
    pub bank: BankConfig,
    pub worker: WorkerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    pub enable_cors: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout: Duration::from_secs(30),
            enable_cors: false,
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", self.host, self.port))
    }
}

/// Where state is kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    /// Apply embedded migrations at startup (PostgreSQL only)
    pub migrate: bool,
}

/// Card protection keys
///
/// Both paths take PEM files (SPKI public key, PKCS#8 private key), not
/// OpenPGP armored keyrings, which are rejected at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CardKeySettings {
    #[serde(skip_serializing)]
    pub hmac_key: String,
    /// PEM public key used to encrypt card numbers
    pub public_key_path: Option<PathBuf>,
    /// PEM private key; without it listings show fully masked numbers
    pub private_key_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
    /// `json` or `pretty`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load every layer, reading the process environment
    pub fn load(config_path: Option<&str>) -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();

        let env_name = std::env::var("SIMPLEBANK_ENV").unwrap_or_else(|_| "development".to_string());

        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{}", env_name)).required(false));

        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("SIMPLEBANK")
                .separator("__")
                .try_parsing(true),
        );

        let mut server_config: ServerConfig = builder
            .build()
            .context("failed to read configuration")?
            .try_deserialize()
            .context("invalid configuration")?;

        server_config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(server_config)
    }

    /// Apply the flat deployment variables on top of the layered values
    pub fn apply_env_overrides<F>(&mut self, get: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = get("JWT_SECRET") {
            self.auth.jwt.secret = v;
        }
        if let Some(v) = get("CARD_HMAC_KEY") {
            self.cards.hmac_key = v;
        }
        if let Some(v) = get("CARD_PUBLIC_KEY_PATH") {
            self.cards.public_key_path = Some(PathBuf::from(v));
        }
        if let Some(v) = get("CARD_PRIVATE_KEY_PATH") {
            self.cards.private_key_path = Some(PathBuf::from(v));
        }
        if let Some(v) = get("DATABASE_URL") {
            self.database.url = v;
        }
        if let Some(v) = get("SMTP_HOST") {
            self.smtp.relay = v;
        }
        if let Some(v) = get("SMTP_PORT") {
            self.smtp.port = v.parse().with_context(|| format!("SMTP_PORT: {}", v))?;
        }
        if let Some(v) = get("SMTP_USERNAME") {
            self.smtp.username = v;
        }
        if let Some(v) = get("SMTP_PASSWORD") {
            self.smtp.password = v;
        }
        if let Some(v) = get("SMTP_FROM") {
            self.smtp.from_email = v;
        }
        if let Some(v) = get("WORKER_PERIOD_SECS") {
            let secs: u64 = v.parse().with_context(|| format!("WORKER_PERIOD_SECS: {}", v))?;
            self.worker.period = Duration::from_secs(secs);
        }
        if let Some(v) = get("DAILY_PENALTY_RATE") {
            self.bank.daily_penalty_rate =
                Decimal::from_str(&v).with_context(|| format!("DAILY_PENALTY_RATE: {}", v))?;
        }
        Ok(())
    }

    /// Reject settings the server cannot run safely with
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.auth.jwt.secret.len() < MIN_SECRET_LEN {
            bail!("JWT secret must be at least {} bytes. Set JWT_SECRET.", MIN_SECRET_LEN);
        }
        if self.cards.hmac_key.len() < MIN_SECRET_LEN {
            bail!("Card HMAC key must be at least {} bytes. Set CARD_HMAC_KEY.", MIN_SECRET_LEN);
        }
        if self.storage.backend == StorageBackend::Postgres && self.cards.public_key_path.is_none() {
            bail!("CARD_PUBLIC_KEY_PATH is required with PostgreSQL storage");
        }
        if self.worker.period.is_zero() {
            bail!("Worker period must be positive");
        }
        if self.bank.daily_penalty_rate < Decimal::ZERO {
            bail!("Daily penalty rate cannot be negative");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn valid() -> ServerConfig {
        let mut config = ServerConfig::default();
        config.auth.jwt.secret = "j".repeat(32);
        config.cards.hmac_key = "h".repeat(32);
        config.cards.public_key_path = Some(PathBuf::from("/keys/card.pub.pem"));
        config
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.storage.backend, StorageBackend::Postgres);
        assert_eq!(config.worker.period, Duration::from_secs(12 * 3600));
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_flat_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("JWT_SECRET", "from-env"),
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_PORT", "2525"),
            ("WORKER_PERIOD_SECS", "60"),
            ("DAILY_PENALTY_RATE", "0.002"),
            ("DATABASE_URL", "postgres://u:p@db/bank"),
        ]
        .into_iter()
        .collect();

        let mut config = ServerConfig::default();
        config
            .apply_env_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.auth.jwt.secret, "from-env");
        assert_eq!(config.smtp.relay, "smtp.example.com");
        assert_eq!(config.smtp.port, 2525);
        assert_eq!(config.worker.period, Duration::from_secs(60));
        assert_eq!(config.bank.daily_penalty_rate, Decimal::new(2, 3));
        assert_eq!(config.database.url, "postgres://u:p@db/bank");
    }

    #[test]
    fn test_bad_override_is_an_error() {
        let mut config = ServerConfig::default();
        let result = config.apply_env_overrides(|k| (k == "SMTP_PORT").then(|| "many".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_validation() {
        assert!(valid().validate().is_ok());

        let mut short_secret = valid();
        short_secret.auth.jwt.secret = "short".to_string();
        assert!(short_secret.validate().is_err());

        let mut no_key = valid();
        no_key.cards.public_key_path = None;
        assert!(no_key.validate().is_err());

        no_key.storage.backend = StorageBackend::Memory;
        assert!(no_key.validate().is_ok());
    }

    #[test]
    fn test_toml_sections() {
        let config: ServerConfig = config::Config::builder()
            .add_source(config::File::from_str(
                r#"
                [server]
                port = 9000

                [storage]
                backend = "memory"

                [worker]
                period = "15m"

                [auth.jwt]
                secret = "toml-secret"
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.worker.period, Duration::from_secs(900));
        assert_eq!(config.auth.jwt.secret, "toml-secret");
        assert_eq!(config.auth.jwt.issuer, "simplebank");
    }
}
