//! Scheduling Analytics Ingestion
//!
//! Keeps a star schema of teachers, departments, subjects, semesters and
//! schedule facts in step with upstream domain events, and serves aggregate
//! queries over it:
//! - Redpanda pull subscriptions, one per topic group
//! - Subject routing and idempotent denormalization
//! - ClickHouse (or in-memory) materialized store
//! - Read-only HTTP query surface with health probes

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::signal;
use tracing::{error, info, warn};

use analytics_core::{AnalyticsStore, MemoryStore, QueryConfig};
use api::{router, AppState};
use clickhouse_client::{ClickHouseClient, ClickHouseConfig, ClickHouseStore};
use redpanda::{BusConfig, KafkaConnector};
use telemetry::{health, init_tracing_from_env};
use worker::{Denormalizer, EventRouter, IngestionSupervisor, SupervisorConfig};

/// Which store backs the star schema.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum StoreBackend {
    #[default]
    Clickhouse,
    Memory,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreConfig {
    #[serde(default)]
    backend: StoreBackend,
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Config {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,

    #[serde(default)]
    bus: BusConfig,

    #[serde(default)]
    store: StoreConfig,

    #[serde(default)]
    clickhouse: ClickHouseConfig,

    #[serde(default)]
    query: QueryConfig,

    #[serde(default)]
    supervisor: SupervisorConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            bus: BusConfig::default(),
            store: StoreConfig::default(),
            clickhouse: ClickHouseConfig::default(),
            query: QueryConfig::default(),
            supervisor: SupervisorConfig::default(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // rustls 0.23+ needs a crypto provider before the first TLS handshake
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("rustls crypto provider already installed");
    }

    dotenvy::dotenv().ok();
    init_tracing_from_env();

    info!("Starting analytics ingestion v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    info!(
        backend = ?config.store.backend,
        bus_enabled = config.bus.enabled,
        brokers = %config.bus.broker_string(),
        groups = config.bus.groups.len(),
        "Loaded configuration"
    );

    let store = open_store(&config).await?;

    // Ingestion
    let supervisor = if config.bus.is_active() {
        Some(start_ingestion(&config, store.clone()).await)
    } else {
        warn!("Bus disabled or no brokers configured, ingestion skipped");
        health().bus.set_unhealthy("ingestion disabled");
        None
    };

    // HTTP
    let app = router(AppState::from_store(store, &config.query));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid server address")?;

    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutting down...");

    if let Some(supervisor) = supervisor {
        supervisor.shutdown().await;
    }

    info!("Shutdown complete");
    Ok(())
}

/// Build the configured store, creating the ClickHouse schema when needed.
async fn open_store(config: &Config) -> Result<Arc<dyn AnalyticsStore>> {
    let store: Arc<dyn AnalyticsStore> = match config.store.backend {
        StoreBackend::Clickhouse => {
            let client = ClickHouseClient::new(config.clickhouse.clone())
                .context("Failed to create ClickHouse client")?;

            if let Err(e) = clickhouse_client::schema::init_schema(&client).await {
                error!("Failed to initialize ClickHouse schema: {}", e);
            }

            Arc::new(ClickHouseStore::new(client))
        }
        StoreBackend::Memory => {
            warn!("Using in-memory store; state is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    match store.ping().await {
        Ok(()) => {
            health().store.set_healthy();
            info!(backend = store.backend(), "Store connection: healthy");
        }
        Err(e) => {
            health().store.set_unhealthy(e.to_string());
            error!(backend = store.backend(), error = %e, "Store connection: unhealthy");
        }
    }

    Ok(store)
}

/// Subscribe every topic group and start the periodic metrics log.
async fn start_ingestion(
    config: &Config,
    store: Arc<dyn AnalyticsStore>,
) -> Arc<IngestionSupervisor> {
    let topics: Vec<String> = config.bus.groups.iter().map(|g| g.topic.clone()).collect();
    let missing = redpanda::health::missing_topics(&config.bus, &topics).await;
    if !missing.is_empty() {
        warn!(topics = ?missing, "Topics not found on the bus; subscriptions will wait for them");
    }

    let router = Arc::new(EventRouter::new(Denormalizer::new(store)));
    let supervisor = Arc::new(IngestionSupervisor::new(
        Arc::new(KafkaConnector::new(config.bus.clone())),
        router,
        config.bus.clone(),
        config.supervisor.clone(),
    ));

    supervisor.start_all().await;
    // Stops on its own once the supervisor's root token is cancelled
    let _metrics_logger = supervisor.spawn_metrics_logger();
    supervisor
}

/// Load configuration from files and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        .add_source(config::Config::try_from(&Config::default())?)
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix("ANALYTICS")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut config: Config = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Flat overrides for nested keys whose field names contain underscores,
/// which the `__` separator cannot express reliably.
fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(brokers) = var("ANALYTICS_BUS_BROKERS") {
        config.bus.brokers = brokers
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }
    if let Some(enabled) = var("ANALYTICS_BUS_ENABLED") {
        config.bus.enabled = matches!(enabled.trim(), "1" | "true" | "yes");
    }
    if let Some(username) = var("ANALYTICS_BUS_SASL_USERNAME") {
        config.bus.sasl_username = Some(username);
    }
    if let Some(password) = var("ANALYTICS_BUS_SASL_PASSWORD") {
        config.bus.sasl_password = Some(password);
    }
    if let Some(backend) = var("ANALYTICS_STORE_BACKEND") {
        match backend.trim() {
            "memory" => config.store.backend = StoreBackend::Memory,
            "clickhouse" => config.store.backend = StoreBackend::Clickhouse,
            other => warn!(backend = other, "Unknown store backend, keeping {:?}", config.store.backend),
        }
    }

    if let Some(url) = var("ANALYTICS_CLICKHOUSE_URL") {
        config.clickhouse.url = url;
    }
    if let Some(database) = var("ANALYTICS_CLICKHOUSE_DATABASE") {
        config.clickhouse.database = database;
    }
    if let Some(username) = var("ANALYTICS_CLICKHOUSE_USERNAME") {
        config.clickhouse.username = Some(username);
    }
    if let Some(password) = var("ANALYTICS_CLICKHOUSE_PASSWORD") {
        config.clickhouse.password = Some(password);
    }
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
