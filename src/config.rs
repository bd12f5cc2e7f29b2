use once_cell::sync::Lazy;
use std::env;
use std::path::PathBuf;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub host: String,
    pub port: u16,

    // Database
    pub db_path: PathBuf,

    // Probe endpoints
    pub sonar_host_url: String,
    pub probe_timeout_secs: u64,

    // Build info
    pub version: String,

    // Logging
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            // Server
            host: env::var("SHIPWRIGHT_API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("SHIPWRIGHT_API_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8000),

            // Database
            db_path: PathBuf::from(
                env::var("SHIPWRIGHT_DB_PATH")
                    .unwrap_or_else(|_| "/data/shipwright.db".to_string()),
            ),

            // Probes
            sonar_host_url: env::var("SHIPWRIGHT_SONAR_HOST_URL")
                .unwrap_or_else(|_| "https://sonarcloud.io".to_string()),
            probe_timeout_secs: env::var("SHIPWRIGHT_PROBE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),

            // Build info
            version: env!("CARGO_PKG_VERSION").to_string(),

            // Logging
            log_level: env::var("SHIPWRIGHT_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        }
    }

    pub fn db_url(&self) -> String {
        format!("sqlite://{}?mode=rwc", self.db_path.display())
    }
}

pub static CONFIG: Lazy<Config> = Lazy::new(Config::from_env);
