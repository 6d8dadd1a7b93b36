//! Entry point: loads configuration, wires the Worker Pool, Multi-Server
//! Poller, Request Handler, and Agent Service together, and runs until a
//! signal or the consecutive-error circuit breaker stops it.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use mitchell_agent::config::{self, CliArgs};
use mitchell_agent::handler::RequestHandler;
use mitchell_agent::service::AgentService;
use mitchell_browser::WorkerPool;
use mitchell_poller::MultiServerPoller;
use tracing_subscriber::EnvFilter;

/// Exit code used for both a fatal configuration error and a tripped
/// consecutive-error circuit breaker, per spec §6.2.
const EXIT_FAILURE: u8 = 1;

/// The portal's main application URL, per spec §1's opaque-capability
/// treatment of ShopKeyPro: every Worker's Browser Driver navigates here on
/// `connect()` before resolving which of the logged-in/login-form/
/// session-limit landing states it's in.
const PORTAL_URL: &str = "https://www.shopkeypro.com/";

#[tokio::main]
async fn main() -> ExitCode {
    let cli = CliArgs::parse();

    let config = match config::load(cli) {
        Ok(config) => config,
        Err(err) => {
            // The tracing subscriber isn't installed yet at this point
            // (its own level comes from the config we just failed to
            // load), so a config error is reported directly to stderr.
            eprintln!("configuration error: {err}");
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    init_tracing(&config.log_level);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "agent stopped");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(config: mitchell_agent::config::AgentConfig) -> mitchell_types::Result<()> {
    let server_urls = config.server_urls()?;
    let worker_pool_config = config.worker_pool_config()?;
    let max_workers = worker_pool_config.max_workers;

    let pool = Arc::new(WorkerPool::new(
        worker_pool_config,
        PORTAL_URL,
        config.mitchell_username.clone().unwrap_or_default(),
        config.mitchell_password.clone().unwrap_or_default(),
    ));
    let poller = Arc::new(MultiServerPoller::new(server_urls, config.shop_id.clone())?);
    let handler = Arc::new(RequestHandler::new(&config)?);

    let service = AgentService::new(
        Arc::clone(&pool),
        Arc::clone(&poller),
        handler,
        max_workers,
        Duration::from_secs_f64(config.poll_interval),
        Duration::from_secs_f64(config.error_backoff),
    );

    let shutdown = service.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("received shutdown signal");
            shutdown.cancel();
        }
    });

    tracing::info!(
        shop_id = %config.shop_id,
        servers = config.server_url.len(),
        scaling_mode = %config.scaling_mode,
        "mitchell-agent starting"
    );

    service.run().await
}
