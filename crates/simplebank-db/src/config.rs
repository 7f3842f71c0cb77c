//! Database configuration

use serde::{Deserialize, Serialize};

/// PostgreSQL pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum pool connections
    pub max_connections: u32,
    /// Minimum idle connections
    pub min_connections: u32,
    /// Connection acquire timeout in seconds
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/simplebank".to_string()),
            max_connections: 20,
            min_connections: 2,
            acquire_timeout_secs: 30,
        }
    }
}

impl DatabaseConfig {
    /// Mask the password part of the URL for logging
    pub fn url_masked(&self) -> String {
        mask_url(&self.url)
    }
}

fn mask_url(url: &str) -> String {
    let (Some(at_pos), Some(scheme_end)) = (url.rfind('@'), url.find("://")) else {
        return url.to_string();
    };
    if at_pos < scheme_end {
        return url.to_string();
    }

    let scheme = &url[..scheme_end + 3];
    let user_pass = &url[scheme_end + 3..at_pos];
    match user_pass.find(':') {
        Some(colon_pos) => format!("{}{}:***{}", scheme, &user_pass[..colon_pos], &url[at_pos..]),
        None => url.to_string(),
    }
}
