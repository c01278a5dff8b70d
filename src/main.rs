//!
//! OIOI roaming bridge service.
//! Reads configuration from TOML file (~/.config/oioi-bridge/config.toml).

use std::sync::Arc;

use tracing::{error, info};

use oioi_bridge::adapter::CpoAdapter;
use oioi_bridge::config::{default_config_path, AppConfig};
use oioi_bridge::notifications::create_event_bus;
use oioi_bridge::partner::{HttpPartnerClient, PartnerApi};
use oioi_bridge::session::{InMemorySessionStore, SessionStore};
use oioi_bridge::shared::{listen_for_shutdown_signals, ShutdownSignal};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Load configuration ─────────────────────────────────────
    let config_path = std::env::var("OIOI_BRIDGE_CONFIG")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| default_config_path());
    let app_cfg = match AppConfig::load(&config_path) {
        Ok(cfg) => {
            // Initialize logging with configured level
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.logging.level)),
                )
                .init();
            info!("Configuration loaded from {}", config_path.display());
            cfg
        }
        Err(e) => {
            tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::new("info"))
                .init();
            error!("Failed to load config: {}. Using defaults.", e);
            AppConfig::default()
        }
    };

    info!("Starting OIOI roaming bridge...");

    // ── Prometheus metrics exporter ────────────────────────────
    if app_cfg.metrics.enabled {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .install()
            .expect("Failed to install Prometheus metrics exporter");
        info!("📊 Prometheus metrics exporter installed");
    }

    // ── Partner client, stores, event bus ──────────────────────
    let client: Arc<dyn PartnerApi> =
        Arc::new(HttpPartnerClient::new(app_cfg.partner_client_config())?);
    let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
    let event_bus = create_event_bus();
    info!("🔔 Event bus initialized");

    let shutdown = ShutdownSignal::new();

    // ── Adapter ────────────────────────────────────────────────
    let adapter = Arc::new(CpoAdapter::new(
        client,
        store,
        event_bus.clone(),
        app_cfg.adapter_config(),
        shutdown.clone(),
    ));
    adapter.clone().start();

    // Log adapter events for operators
    let mut subscriber = event_bus.subscribe();
    tokio::spawn(async move {
        while let Some(message) = subscriber.recv().await {
            info!(event = message.event.event_type(), "Adapter event");
        }
    });

    tokio::spawn(listen_for_shutdown_signals(shutdown.clone()));

    shutdown.wait().await;

    // The flush tasks run a final drain on shutdown; give them a moment
    info!("⏳ Waiting for final queue drains...");
    tokio::time::sleep(std::time::Duration::from_secs(2)).await;
    info!("✅ Shutdown complete");

    Ok(())
}
