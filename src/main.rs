//! Proxykey - Entry Point
//!
//! Issues requests against the configured API through the proxy pool.
//!
//! Usage: `proxykey [path]` (default path `/`). `PROXYKEY_REQUEST_COUNT` sets
//! the number of requests, so rotation across the pool can be observed.

use anyhow::Context;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use proxykey::{ApiClient, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env().context("failed to load configuration")?;

    // Initialize tracing
    init_tracing(&config);
    info!("Starting proxykey");

    let client = ApiClient::from_config(&config).context("failed to build API client")?;
    if client.pool().is_empty() {
        info!("No proxies configured, requests go out directly");
    } else {
        info!("Rotating across {} proxies", client.pool().len());
    }

    let path = std::env::args().nth(1).unwrap_or_else(|| "/".to_string());

    tokio::select! {
        _ = run_requests(&client, &path, config.run.request_count) => {},
        _ = signal::ctrl_c() => warn!("Interrupted"),
    }

    info!("Proxykey stopped");
    Ok(())
}

async fn run_requests(client: &ApiClient, path: &str, count: usize) {
    for attempt in 1..=count {
        match client.get(path).await {
            Ok(response) => info!(attempt, status = %response.status(), "Request finished"),
            Err(e) if e.is_transport_error() => {
                error!(attempt, "Request failed in transport: {}", e)
            }
            Err(e) => error!(attempt, "Request failed: {}", e),
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("proxykey={}", config.log.level)));
    let registry = tracing_subscriber::registry().with(filter);

    if config.log.format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
