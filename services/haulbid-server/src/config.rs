//! Server Configuration
//!
//! Layered in order: `--config <file>`, `config/default`, `config/local`, then
//! `HAULBID__SECTION__KEY` environment variables. CLI flags are applied on top
//! in `main`.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use haulbid_api::ApiConfig;
use haulbid_auth::AuthConfig;
use haulbid_db::DatabaseConfig;
use haulbid_marketplace::MarketplaceConfig;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ServerSettings,
    pub storage: StorageSettings,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub marketplace: MarketplaceConfig,
    pub api: ApiConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

/// Server binding settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// How long in-flight requests may drain after a shutdown signal
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            shutdown_timeout: Duration::from_secs(30),
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

/// Where marketplace records live
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    /// Apply embedded migrations at boot (postgres only)
    pub run_migrations: bool,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Postgres,
            run_migrations: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Prometheus exporter, served on its own port
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9090,
        }
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

impl ServerConfig {
    pub fn load(config_path: Option<&str>) -> anyhow::Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        builder = builder
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("HAULBID")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("api.cors_origins")
                    .try_parsing(true),
            );

        Self::from_config(builder.build()?)
    }

    fn from_config(config: config::Config) -> anyhow::Result<Self> {
        config
            .try_deserialize()
            .context("configuration could not be parsed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{File, FileFormat};

    fn parse(toml: &str) -> ServerConfig {
        let config = config::Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap();
        ServerConfig::from_config(config).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse("");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.storage.backend, StorageBackend::Postgres);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.auth.password.bcrypt_cost, 10);
        assert!(config.auth.jwt.secret.is_empty());
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn test_sections_override_defaults() {
        let config = parse(
            r#"
            [server]
            port = 8080
            shutdown_timeout = "5s"

            [storage]
            backend = "memory"

            [auth.jwt]
            secret = "0123456789abcdef0123456789abcdef"
            token_lifetime = "1d"

            [auth.rate_limit]
            login_window = "10m"

            [marketplace]
            store_timeout = "2s"

            [api]
            cors_origins = ["https://haulbid.example"]
            "#,
        );

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.shutdown_timeout, Duration::from_secs(5));
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.auth.jwt.token_lifetime, Duration::from_secs(86_400));
        assert_eq!(config.auth.rate_limit.login_window, Duration::from_secs(600));
        assert_eq!(config.auth.rate_limit.login_attempts, 5);
        assert_eq!(config.marketplace.store_timeout, Duration::from_secs(2));
        assert_eq!(config.api.cors_origins, vec!["https://haulbid.example"]);
        assert!(config.auth.validate().is_ok());
    }

    #[test]
    fn test_bad_backend_is_an_error() {
        let config = config::Config::builder()
            .add_source(File::from_str("[storage]\nbackend = \"sled\"", FileFormat::Toml))
            .build()
            .unwrap();
        assert!(ServerConfig::from_config(config).is_err());
    }

    #[test]
    fn test_socket_addr() {
        let settings = ServerSettings {
            host: "127.0.0.1".into(),
            port: 4000,
            ..Default::default()
        };
        assert_eq!(settings.socket_addr().unwrap().port(), 4000);

        let bad = ServerSettings {
            host: "not a host".into(),
            ..Default::default()
        };
        assert!(bad.socket_addr().is_err());
    }
}
