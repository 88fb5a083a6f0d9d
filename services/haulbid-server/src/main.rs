//! HaulBid API Server
//!
//! Serves the delivery marketplace over HTTP: customers post orders,
//! delivery companies bid, customers accept a bid and rate the carrier.
//!
//! # Usage
//!
//! ```bash
//! # PostgreSQL backend, secret from the environment
//! JWT_SECRET=... DATABASE_URL=postgres://... haulbid-server
//!
//! # Single instance, everything in memory
//! haulbid-server --storage memory --jwt-secret "$(openssl rand -hex 32)"
//!
//! # Environment overrides
//! HAULBID__SERVER__PORT=8080 HAULBID__AUTH__RATE_LIMIT__LOGIN_ATTEMPTS=10 haulbid-server
//! ```

mod config;

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tokio::sync::Notify;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use haulbid_api::{create_router, AppState};
use haulbid_audit::{AuditSink, TracingAuditSink};
use haulbid_db::Database;

use crate::config::{LogFormat, LoggingConfig, ServerConfig, StorageBackend};

// =============================================================================
// CLI Arguments
// =============================================================================

/// HaulBid API Server
#[derive(Parser, Debug)]
#[command(name = "haulbid-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML, JSON, or YAML)
    #[arg(short, long, env = "HAULBID_CONFIG")]
    config: Option<String>,

    #[arg(long, env = "HAULBID_HOST")]
    host: Option<String>,

    #[arg(short, long, env = "HAULBID_PORT")]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error); `RUST_LOG` wins when set
    #[arg(long, env = "HAULBID_LOG_LEVEL")]
    log_level: Option<String>,

    #[arg(long, env = "HAULBID_LOG_FORMAT", value_enum)]
    log_format: Option<LogFormat>,

    /// Storage backend
    #[arg(long, env = "HAULBID_STORAGE", value_enum)]
    storage: Option<StorageBackend>,

    /// PostgreSQL connection URL
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Redis connection URL, enables shared rate-limit counters
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,

    /// JWT signing secret, at least 32 bytes
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,

    /// Code required to register an admin account
    #[arg(long, env = "ADMIN_REGISTRATION_CODE", hide_env_values = true)]
    admin_code: Option<String>,
}

impl Args {
    /// Flags win over every config layer
    fn apply(self, config: &mut ServerConfig) {
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
        if let Some(format) = self.log_format {
            config.logging.format = format;
        }
        if let Some(backend) = self.storage {
            config.storage.backend = backend;
        }
        if let Some(url) = self.database_url {
            config.database.postgres_url = url;
        }
        if let Some(url) = self.redis_url.filter(|u| !u.is_empty()) {
            config.database.redis_url = Some(url);
        }
        if let Some(secret) = self.jwt_secret {
            config.auth.jwt.secret = secret;
        }
        if let Some(code) = self.admin_code.filter(|c| !c.is_empty()) {
            config.auth.admin_registration_code = Some(code);
        }
    }
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    let mut server_config = ServerConfig::load(args.config.as_deref())?;
    args.apply(&mut server_config);

    init_logging(&server_config.logging)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        backend = ?server_config.storage.backend,
        "Starting HaulBid server"
    );

    if let Err(problems) = server_config.auth.validate() {
        for problem in &problems {
            tracing::error!(problem = %problem, "invalid auth configuration");
        }
        anyhow::bail!("auth configuration rejected: {}", problems.join("; "));
    }
    if server_config.auth.admin_registration_code.is_none() {
        tracing::warn!("No admin registration code configured; admin sign-up is disabled");
    }

    let db = init_database(&server_config).await?;

    if server_config.metrics.enabled {
        start_metrics_exporter(server_config.metrics.port)?;
    }

    let audit: Arc<dyn AuditSink> = Arc::new(TracingAuditSink::new());
    let state = AppState::assemble(
        db,
        server_config.auth.clone(),
        &server_config.marketplace,
        audit,
    );
    let app = create_router(Arc::new(state), server_config.api.clone());

    let addr = server_config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!(%addr, "Server listening");

    let stopping = Arc::new(Notify::new());
    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(stopping.clone()))
    .into_future();

    let drain_timeout = server_config.server.shutdown_timeout;
    tokio::select! {
        result = server => result?,
        _ = async {
            stopping.notified().await;
            tokio::time::sleep(drain_timeout).await;
        } => {
            tracing::warn!(
                timeout_secs = drain_timeout.as_secs(),
                "In-flight requests did not drain in time, exiting"
            );
        }
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

// =============================================================================
// Initialization Functions
// =============================================================================

fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .context("invalid log level")?;

    let subscriber = tracing_subscriber::registry().with(env_filter);

    match config.format {
        LogFormat::Json => subscriber
            .with(fmt::layer().json().with_target(true))
            .try_init()?,
        LogFormat::Pretty => subscriber
            .with(fmt::layer().pretty().with_target(true))
            .try_init()?,
    }

    Ok(())
}

async fn init_database(config: &ServerConfig) -> anyhow::Result<Database> {
    let db = match config.storage.backend {
        StorageBackend::Postgres => {
            let db = Database::connect(&config.database)
                .await
                .context("failed to connect to PostgreSQL")?;
            if config.storage.run_migrations {
                db.migrate().await.context("migrations failed")?;
            }
            db
        }
        StorageBackend::Memory => {
            tracing::warn!("Memory backend: data is lost on restart");
            Database::in_memory(Some(&config.database))
                .await
                .context("failed to initialize the memory backend")?
        }
    };

    let health = db.health_check().await;
    if !health.healthy {
        anyhow::bail!(
            "storage health check failed (postgres: {}, redis: {})",
            health.postgres,
            health.redis
        );
    }
    tracing::info!(
        backend = db.backend(),
        postgres = health.postgres,
        redis = health.redis,
        "Storage ready"
    );

    Ok(db)
}

/// Install the Prometheus recorder with its own HTTP listener
fn start_metrics_exporter(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("failed to start the metrics exporter")?;
    tracing::info!(port, "Metrics exporter listening");
    Ok(())
}

// =============================================================================
// Graceful Shutdown
// =============================================================================

/// Resolves on Ctrl+C or SIGTERM and wakes `stopping` so the drain timer starts
async fn shutdown_signal(stopping: Arc<Notify>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, initiating graceful shutdown"),
        _ = terminate => tracing::info!("Received SIGTERM, initiating graceful shutdown"),
    }

    stopping.notify_one();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let args = Args::parse_from([
            "haulbid-server",
            "--port",
            "8080",
            "--storage",
            "memory",
            "--log-format",
            "json",
        ]);
        assert_eq!(args.port, Some(8080));
        assert_eq!(args.storage, Some(StorageBackend::Memory));
        assert_eq!(args.log_format, Some(LogFormat::Json));
    }

    #[test]
    fn test_flags_override_config() {
        let args = Args::parse_from([
            "haulbid-server",
            "--jwt-secret",
            "0123456789abcdef0123456789abcdef",
            "--redis-url",
            "redis://cache:6379",
            "--admin-code",
            "",
        ]);
        let mut config = ServerConfig::default();
        args.apply(&mut config);

        assert_eq!(config.auth.jwt.secret.len(), 32);
        assert_eq!(config.database.redis_url.as_deref(), Some("redis://cache:6379"));
        assert!(config.auth.admin_registration_code.is_none());
        assert!(config.auth.validate().is_ok());
    }

    #[test]
    fn test_missing_secret_is_rejected() {
        let config = ServerConfig::default();
        assert!(config.auth.validate().is_err());
    }

    #[tokio::test]
    async fn test_memory_backend_boots() {
        let mut config = ServerConfig::default();
        config.storage.backend = StorageBackend::Memory;
        let db = init_database(&config).await.unwrap();
        assert_eq!(db.backend(), "memory");
    }
}
