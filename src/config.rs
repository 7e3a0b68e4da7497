use serde::{Deserialize, Serialize};
use std::env;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub jwt: JwtConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
    #[serde(default)]
    pub demo: DemoConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Browser origins allowed by CORS. Empty allows any origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            allowed_origins: Vec::new(),
        }
    }
}

/// Where the key/value snapshot lives. No path means everything stays in memory.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub access_token_expires_in: i64,  // seconds
    pub refresh_token_expires_in: i64, // seconds, also the session lifetime
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: "change-me-in-production".to_string(),
            access_token_expires_in: 7200,
            refresh_token_expires_in: 604_800,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub bcrypt_cost: u32,
    pub reset_token_expires_in: i64, // seconds
    pub otp_expires_in: i64,         // seconds
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            bcrypt_cost: bcrypt::DEFAULT_COST,
            reset_token_expires_in: 24 * 3600,
            otp_expires_in: 600,
        }
    }
}

/// Out-of-band delivery of reset tokens and OTP codes.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NotifierConfig {
    /// When set, notifications are POSTed here as JSON; otherwise they are logged.
    #[serde(default)]
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoConfig {
    pub seed_data: bool,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self { seed_data: true }
    }
}

impl Config {
    pub fn from_toml() -> AppResult<Self> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        let mut config: Config = match std::fs::read_to_string(&config_path) {
            Ok(config_str) => toml::from_str(&config_str).map_err(|e| {
                AppError::ConfigError(format!("failed to parse {config_path}: {e}"))
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::info!("No config file at {config_path}, using defaults and environment");
                Config::default()
            }
            Err(e) => {
                return Err(AppError::ConfigError(format!(
                    "failed to read {config_path}: {e}"
                )));
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
            env::var(name).ok().and_then(|v| v.parse::<T>().ok())
        }

        if let Ok(v) = env::var("SERVER_HOST") {
            self.server.host = v;
        }
        if let Some(p) = parse_env("SERVER_PORT") {
            self.server.port = p;
        }
        if let Ok(v) = env::var("CORS_ALLOWED_ORIGINS") {
            self.server.allowed_origins = v
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Ok(v) = env::var("STORAGE_PATH") {
            self.storage.path = if v.is_empty() { None } else { Some(v) };
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            self.jwt.secret = v;
        }
        if let Some(n) = parse_env("JWT_ACCESS_EXPIRES_IN") {
            self.jwt.access_token_expires_in = n;
        }
        if let Some(n) = parse_env("JWT_REFRESH_EXPIRES_IN") {
            self.jwt.refresh_token_expires_in = n;
        }
        if let Some(n) = parse_env("BCRYPT_COST") {
            self.security.bcrypt_cost = n;
        }
        if let Some(n) = parse_env("RESET_TOKEN_EXPIRES_IN") {
            self.security.reset_token_expires_in = n;
        }
        if let Some(n) = parse_env("OTP_EXPIRES_IN") {
            self.security.otp_expires_in = n;
        }
        if let Ok(v) = env::var("NOTIFIER_WEBHOOK_URL") {
            self.notifier.webhook_url = if v.is_empty() { None } else { Some(v) };
        }
        if let Some(b) = parse_env("SEED_DEMO_DATA") {
            self.demo.seed_data = b;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [server]
            host = "127.0.0.1"
            port = 9000

            [storage]
            path = "data/store.json"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert!(config.server.allowed_origins.is_empty());
        assert_eq!(config.storage.path.as_deref(), Some("data/store.json"));
        assert_eq!(config.security.reset_token_expires_in, 86_400);
        assert!(config.demo.seed_data);
        assert!(config.notifier.webhook_url.is_none());
    }
}
