//! # API Gateway
//!
//! Request-admission gateway: validates bearer tokens against named schemes,
//! resolves routes and streams requests to downstream services.
//!
//! ## Usage
//!
//! ```bash
//! # Start with default configuration
//! api-gateway
//!
//! # Start with a config file
//! api-gateway --config /path/to/gateway.yaml
//!
//! # Environment overrides
//! GATEWAY_CONFIG=/etc/gateway.yaml GATEWAY_PORT=9000 api-gateway
//! ```

use anyhow::Context;
use clap::Parser;
use gateway_config::{ConfigLoader, ConfigWatcher, GatewayConfig, CONFIG_PATH_ENV};
use gateway_routing::{RouteTable, SharedRouteTable};
use gateway_security::{SchemeSelector, SchemeSet};
use gateway_server::{AppState, Server};
use gateway_telemetry::{init_logging, LogFormat, LoggingConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Command line arguments
#[derive(Debug, Parser)]
#[command(name = "api-gateway", version, about)]
struct Args {
    /// Configuration file (YAML, TOML or JSON)
    #[arg(short, long, env = CONFIG_PATH_ENV)]
    config: Option<PathBuf>,

    /// Disable route hot reload
    #[arg(long)]
    no_watch: bool,
}

/// Application entry point
#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = run(args).await {
        // Logging may not be initialized yet.
        eprintln!("api-gateway: {e:#}");
        error!(error = %format!("{e:#}"), "Gateway failed");
        std::process::exit(1);
    }
}

/// Main application logic
async fn run(args: Args) -> anyhow::Result<()> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = &args.config {
        loader = loader.with_path(path);
    }
    let config = loader.load().await.context("loading configuration")?;

    let format: LogFormat = config.logging.format.parse()?;
    init_logging(&LoggingConfig::new(config.logging.level.clone()).with_format(format))?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        "Starting API gateway"
    );

    let schemes = SchemeSet::from_config(&config.schemes).context("building token schemes")?;
    let routes = RouteTable::from_config(&config.routes).context("building route table")?;
    routes
        .check_schemes(|name| schemes.get(name).is_some())
        .context("checking route schemes")?;
    info!(
        schemes = schemes.len(),
        routes = routes.len(),
        "Admission policy ready"
    );

    let schemes = Arc::new(schemes);
    let routes = Arc::new(SharedRouteTable::new(routes));
    let state = AppState::builder()
        .config(config.clone())
        .routes(routes.clone())
        .authenticator(Arc::new(SchemeSelector::new(schemes.clone())))
        .build()?;

    if !args.no_watch && loader.path().is_some() {
        spawn_route_reload(&state, loader, routes, schemes).await?;
    }

    Server::new(&config.server, state).run().await?;
    Ok(())
}

/// Watch the configuration file and swap in new route tables.
///
/// Only routes are reloaded; scheme and listener changes need a restart, and
/// a table naming a scheme the running gateway lacks is rejected.
async fn spawn_route_reload(
    state: &AppState,
    loader: ConfigLoader,
    routes: Arc<SharedRouteTable>,
    schemes: Arc<SchemeSet>,
) -> anyhow::Result<()> {
    let mut watcher = ConfigWatcher::new(loader).context("watching configuration file")?;
    let current: GatewayConfig = (*state.config).clone();

    let handle = tokio::spawn(async move {
        while let Some(result) = watcher.next_config().await {
            match result {
                Ok(next) => {
                    if scheme_names(&next) != scheme_names(&current)
                        || next.server.bind_address() != current.server.bind_address()
                    {
                        warn!("Scheme or listener changes require a restart and were ignored");
                    }
                    // A rejected table leaves the previous one in service.
                    let _ = routes
                        .reload_checked(&next.routes, |name| schemes.get(name).is_some());
                }
                Err(e) => warn!(error = %e, "Configuration reload failed, keeping current routes"),
            }
        }
    });
    state.shutdown.register_task(handle).await;
    Ok(())
}

fn scheme_names(config: &GatewayConfig) -> Vec<&str> {
    config.schemes.iter().map(|s| s.name.as_str()).collect()
}
